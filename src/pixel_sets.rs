use crate::error::{Error, Result};

/// Slot/pixel sentinel, the `usize` rendition of a `-1` marker in a dense
/// index array.
pub const NO_PIXEL: usize = usize::MAX;
pub const NO_SLOT: usize = usize::MAX;

/// Dense bookkeeping for disjoint sets of pixels (flat zones).
///
/// Four parallel arrays carry the whole state:
/// - `pixel_to_index[p]`: slot of the set `p` belongs to. Written for every
///   pixel during construction; after a merge only the loser's representative
///   is redirected to the winning slot.
/// - `index_to_pixel[i]`: representative (head) pixel of slot `i`, or
///   [`NO_PIXEL`] once the slot is retired by a merge.
/// - `size_sets[i]`: number of pixels in slot `i` (0 when retired).
/// - `pixels_next[p]`: next pixel in the circular membership list of `p`'s
///   set.
///
/// Membership lists are circular so that two sets concatenate by swapping one
/// `pixels_next` entry each: the O(1) splice every merge relies on.
#[derive(Debug, Clone)]
pub struct PixelSets {
    pub(crate) pixel_to_index: Vec<usize>,
    pub(crate) index_to_pixel: Vec<usize>,
    pub(crate) size_sets: Vec<usize>,
    pub(crate) pixels_next: Vec<usize>,
    active_sets: usize,
}

fn try_filled(len: usize, value: usize) -> Result<Vec<usize>> {
    let mut elems = Vec::new();
    elems.try_reserve_exact(len)?;
    elems.resize(len, value);
    Ok(elems)
}

impl PixelSets {
    /// Allocates slots for up to one set per pixel; `shrink_to_num_sets`
    /// trims the slot arrays once the true count is known.
    pub fn with_num_pixels(num_pixels: usize) -> Result<Self> {
        Ok(Self {
            pixel_to_index: try_filled(num_pixels, NO_SLOT)?,
            index_to_pixel: try_filled(num_pixels, NO_PIXEL)?,
            size_sets: try_filled(num_pixels, 0)?,
            pixels_next: try_filled(num_pixels, NO_PIXEL)?,
            active_sets: num_pixels,
        })
    }

    pub fn num_pixels(&self) -> usize {
        self.pixel_to_index.len()
    }

    /// Total slots ever created, retired ones included.
    pub fn num_slots(&self) -> usize {
        self.index_to_pixel.len()
    }

    /// Sets that have not been merged away. O(1).
    pub fn num_active_sets(&self) -> usize {
        self.active_sets
    }

    pub fn is_active_slot(&self, slot: usize) -> bool {
        self.index_to_pixel[slot] != NO_PIXEL
    }

    pub fn slot_of_pixel(&self, pixel: usize) -> usize {
        self.pixel_to_index[pixel]
    }

    pub fn pixel_of_slot(&self, slot: usize) -> usize {
        self.index_to_pixel[slot]
    }

    fn checked_slot(&self, rep: usize) -> Result<usize> {
        let num_pixels = self.num_pixels();
        if rep >= num_pixels {
            return Err(Error::InvalidPixel {
                pixel: rep,
                num_pixels,
            });
        }
        let slot = self.pixel_to_index[rep];
        if slot == NO_SLOT || !self.is_active_slot(slot) {
            return Err(Error::StaleHandle { rep });
        }
        Ok(slot)
    }

    pub fn num_pixels_in_set(&self, rep: usize) -> Result<usize> {
        Ok(self.size_sets[self.checked_slot(rep)?])
    }

    pub fn num_pixels_in_sets(&self, reps: &[usize]) -> Result<usize> {
        let mut sum = 0;
        for &rep in reps {
            sum += self.num_pixels_in_set(rep)?;
        }
        Ok(sum)
    }

    /// Trims the per-slot arrays to the number of sets actually discovered.
    pub fn shrink_to_num_sets(&mut self, num_sets: usize) {
        self.index_to_pixel.truncate(num_sets);
        self.size_sets.truncate(num_sets);
        self.active_sets = num_sets;
    }

    /// Fuses the loser's set into the winner's: adds the sizes, splices the
    /// circular pixel lists, retires the loser's slot and redirects lookups
    /// through the loser's representative to the winning slot. Union-find
    /// `parent` updates are the caller's job.
    ///
    /// No-op when either representative resolves to a retired slot or both
    /// resolve to the same slot.
    pub fn merge_sets_by_rep(&mut self, rep_winner: usize, rep_loser: usize) {
        let slot_winner = self.pixel_to_index[rep_winner];
        let slot_loser = self.pixel_to_index[rep_loser];
        if slot_winner == NO_SLOT
            || slot_loser == NO_SLOT
            || slot_winner == slot_loser
            || !self.is_active_slot(slot_winner)
            || !self.is_active_slot(slot_loser)
        {
            return;
        }

        self.size_sets[slot_winner] += self.size_sets[slot_loser];

        // O(1) splice: the lists are disjoint circles, so swapping the two
        // head successors concatenates them into one circle.
        self.pixels_next.swap(rep_winner, rep_loser);

        self.size_sets[slot_loser] = 0;
        self.index_to_pixel[slot_loser] = NO_PIXEL;
        self.pixel_to_index[rep_loser] = slot_winner;
        self.active_sets -= 1;
    }

    /// Lazy walk over the pixels of one set, starting at its head. Empty for
    /// a retired slot. Restartable as long as no merge touched the set in
    /// between.
    pub fn iter_pixels_of_set(&self, rep: usize) -> impl Iterator<Item = usize> + '_ {
        let slot = self.pixel_to_index.get(rep).copied().unwrap_or(NO_SLOT);
        let (head, len) = if slot != NO_SLOT && self.is_active_slot(slot) {
            (self.index_to_pixel[slot], self.size_sets[slot])
        } else {
            (NO_PIXEL, 0)
        };

        let mut cur = head;
        (0..len).map(move |_| {
            let pixel = cur;
            cur = self.pixels_next[pixel];
            pixel
        })
    }

    /// Chains [`iter_pixels_of_set`] over several representatives; reps that
    /// resolve to retired slots contribute nothing.
    pub fn iter_pixels_of_sets<'a>(
        &'a self,
        reps: &'a [usize],
    ) -> impl Iterator<Item = usize> + 'a {
        reps.iter().flat_map(move |&rep| self.iter_pixels_of_set(rep))
    }

    /// Representatives of all active slots, in slot order.
    pub fn iter_representatives(&self) -> impl Iterator<Item = usize> + '_ {
        self.index_to_pixel
            .iter()
            .copied()
            .filter(|&pixel| pixel != NO_PIXEL)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        error::Error,
        pixel_sets::{NO_PIXEL, PixelSets},
    };

    /// Two sets over six pixels: {0, 1, 2} headed by 0 and {3, 4, 5} headed
    /// by 3, each a circular list in pixel order.
    fn two_sets() -> PixelSets {
        let mut sets = PixelSets::with_num_pixels(6).unwrap();
        for (slot, head) in [(0, 0), (1, 3)] {
            sets.index_to_pixel[slot] = head;
            sets.size_sets[slot] = 3;
            for offset in 0..3 {
                sets.pixel_to_index[head + offset] = slot;
                sets.pixels_next[head + offset] = head + (offset + 1) % 3;
            }
        }
        sets.shrink_to_num_sets(2);
        sets
    }

    #[test]
    fn sizes_and_representatives() {
        let sets = two_sets();
        assert_eq!(sets.num_slots(), 2);
        assert_eq!(sets.num_active_sets(), 2);
        assert_eq!(sets.num_pixels_in_set(0).unwrap(), 3);
        assert_eq!(sets.num_pixels_in_set(3).unwrap(), 3);
        assert_eq!(sets.num_pixels_in_sets(&[0, 3]).unwrap(), 6);
        assert_eq!(sets.iter_representatives().collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn iteration_follows_the_circle() {
        let sets = two_sets();
        assert_eq!(sets.iter_pixels_of_set(0).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(sets.iter_pixels_of_set(3).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(
            sets.iter_pixels_of_sets(&[0, 3]).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4, 5]
        );

        // Restartable: a second walk yields the same sequence.
        assert_eq!(sets.iter_pixels_of_set(0).count(), 3);
    }

    #[test]
    fn merge_splices_in_constant_time() {
        let mut sets = two_sets();
        sets.merge_sets_by_rep(0, 3);

        assert_eq!(sets.num_active_sets(), 1);
        assert_eq!(sets.num_pixels_in_set(0).unwrap(), 6);
        assert!(!sets.is_active_slot(1));
        assert_eq!(sets.pixel_of_slot(1), NO_PIXEL);

        // The loser's representative now resolves to the winning slot.
        assert_eq!(sets.slot_of_pixel(3), 0);
        assert_eq!(sets.num_pixels_in_set(3).unwrap(), 6);

        // One circle of six distinct pixels, back to the head at the end.
        let mut walked: Vec<usize> = sets.iter_pixels_of_set(0).collect();
        assert_eq!(walked.len(), 6);
        walked.sort_unstable();
        assert_eq!(walked, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn merge_with_retired_slot_is_a_no_op() {
        let mut sets = two_sets();
        sets.merge_sets_by_rep(0, 3);
        let before = sets.clone();

        sets.merge_sets_by_rep(0, 3);
        assert_eq!(sets.num_active_sets(), before.num_active_sets());
        assert_eq!(sets.size_sets, before.size_sets);
        assert_eq!(sets.pixels_next, before.pixels_next);
    }

    #[test]
    fn interior_pixel_of_a_merged_set_is_stale() {
        let mut sets = two_sets();
        sets.merge_sets_by_rep(0, 3);

        // Pixel 4 was never a representative; its recorded slot is retired.
        assert!(matches!(
            sets.num_pixels_in_set(4),
            Err(Error::StaleHandle { rep: 4 })
        ));
        assert!(matches!(
            sets.num_pixels_in_set(99),
            Err(Error::InvalidPixel { pixel: 99, .. })
        ));
    }
}
