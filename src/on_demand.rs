use crate::{
    adjacency::AdjacencyRelation,
    error::{Error, Result},
    flood::discover_flat_zones,
    graph::ZoneGraph,
    image::Image,
    pixel_sets::{NO_PIXEL, PixelSets},
    stamp::StampSet,
    union_find::UnionFind,
};
use std::rc::Rc;

/// Per-zone singly linked lists of border pixels, plus the cursors used to
/// refilter them incrementally after merges. `head`/`tail`/`count`/`cursor`
/// are indexed by slot, `next` by pixel; [`NO_PIXEL`] terminates.
#[derive(Debug, Clone)]
struct BorderLists {
    head: Vec<usize>,
    tail: Vec<usize>,
    next: Vec<usize>,
    count: Vec<usize>,
    cursor: Vec<usize>,
    cursor_prev: Vec<usize>,
    dirty: Vec<bool>,
}

impl BorderLists {
    fn with_num_pixels(num_pixels: usize) -> Result<Self> {
        fn try_filled(len: usize, value: usize) -> Result<Vec<usize>> {
            let mut elems = Vec::new();
            elems.try_reserve_exact(len)?;
            elems.resize(len, value);
            Ok(elems)
        }
        Ok(Self {
            head: try_filled(num_pixels, NO_PIXEL)?,
            tail: try_filled(num_pixels, NO_PIXEL)?,
            next: try_filled(num_pixels, NO_PIXEL)?,
            count: try_filled(num_pixels, 0)?,
            cursor: Vec::new(),
            cursor_prev: Vec::new(),
            dirty: Vec::new(),
        })
    }

    fn append(&mut self, slot: usize, pixel: usize) {
        if self.head[slot] == NO_PIXEL {
            self.head[slot] = pixel;
        } else {
            self.next[self.tail[slot]] = pixel;
        }
        self.tail[slot] = pixel;
        self.next[pixel] = NO_PIXEL;
        self.count[slot] += 1;
    }

    fn shrink_to_num_sets(&mut self, num_sets: usize) {
        self.head.truncate(num_sets);
        self.tail.truncate(num_sets);
        self.count.truncate(num_sets);
        self.cursor = self.head.clone();
        self.cursor_prev = vec![NO_PIXEL; num_sets];
        self.dirty = vec![false; num_sets];
    }

    fn reset_cursor(&mut self, slot: usize) {
        self.cursor[slot] = self.head[slot];
        self.cursor_prev[slot] = NO_PIXEL;
    }

    /// O(1) tail splice of the loser's list onto the winner's.
    fn concat(&mut self, winner: usize, loser: usize) {
        let loser_head = self.head[loser];
        if loser_head != NO_PIXEL {
            if self.head[winner] == NO_PIXEL {
                self.head[winner] = loser_head;
            } else {
                self.next[self.tail[winner]] = loser_head;
            }
            self.tail[winner] = self.tail[loser];
            self.count[winner] += self.count[loser];
        }
        self.head[loser] = NO_PIXEL;
        self.tail[loser] = NO_PIXEL;
        self.count[loser] = 0;
        self.cursor[loser] = NO_PIXEL;
        self.cursor_prev[loser] = NO_PIXEL;
        self.dirty[loser] = false;
    }

    /// How many border pixels a single query is willing to re-test; balances
    /// per-query latency against how fast the list converges to the true
    /// border.
    fn refilter_budget(&self, slot: usize) -> usize {
        let count = self.count[slot];
        if count == 0 {
            return 0;
        }
        let budget = if count < 64 {
            8
        } else if count < 256 {
            16
        } else if count < 1024 {
            count / 8
        } else {
            count / 4
        };
        budget.clamp(8, 4096)
    }

    /// Walks up to `budget` pixels from the cursor, unlinking every pixel for
    /// which `still_border` is false. The cursor parks where the walk stopped;
    /// [`NO_PIXEL`] means the pass reached the end of the list.
    fn refilter_step(
        &mut self,
        slot: usize,
        budget: usize,
        mut still_border: impl FnMut(usize) -> bool,
    ) {
        if budget == 0 {
            return;
        }
        let mut current = self.cursor[slot];
        let mut prev = self.cursor_prev[slot];
        if current == NO_PIXEL {
            current = self.head[slot];
            prev = NO_PIXEL;
        }

        let mut processed = 0;
        while current != NO_PIXEL && processed < budget {
            let next = self.next[current];
            if !still_border(current) {
                if prev == NO_PIXEL {
                    self.head[slot] = next;
                } else {
                    self.next[prev] = next;
                }
                if self.tail[slot] == current {
                    self.tail[slot] = prev;
                }
                self.next[current] = NO_PIXEL;
                self.count[slot] -= 1;
            } else {
                prev = current;
            }
            current = next;
            processed += 1;
        }

        self.cursor[slot] = current;
        self.cursor_prev[slot] = prev;
        if self.head[slot] == NO_PIXEL {
            self.tail[slot] = NO_PIXEL;
            self.cursor[slot] = NO_PIXEL;
            self.cursor_prev[slot] = NO_PIXEL;
        } else if current == NO_PIXEL {
            self.cursor_prev[slot] = NO_PIXEL;
        }
    }
}

/// True while `pixel` still touches a zone other than `root`.
fn still_border(
    adjacency: &AdjacencyRelation,
    sets: &PixelSets,
    union: &mut UnionFind,
    pixel: usize,
    root: usize,
) -> bool {
    for neighbor in adjacency.neighbors(pixel) {
        if union.find(sets.slot_of_pixel(neighbor)) != root {
            return true;
        }
    }
    false
}

/// Flat-zone graph that stores no neighbour lists at all. Each zone keeps a
/// linked list of its border pixels; adjacency queries walk that list and
/// resolve every cross-zone neighbour through the union-find, deduplicated
/// with a generation stamp. Merges are O(1): union, pixel-list splice and a
/// tail splice of the border lists. A merged border list may contain pixels
/// that became interior, so it is marked dirty and re-filtered a bounded
/// number of pixels per query instead of being rescanned eagerly.
#[derive(Debug, Clone)]
pub struct OnDemandZoneGraph<T = u8> {
    image: Image<T>,
    adjacency: Rc<AdjacencyRelation>,
    sets: PixelSets,
    union: UnionFind,
    border: BorderLists,
    stamps: StampSet,
    scratch_candidates: Vec<usize>,
}

impl<T: Copy + Eq> OnDemandZoneGraph<T> {
    pub fn new(image: Image<T>, radius: f64) -> Result<Self> {
        let adjacency = Rc::new(AdjacencyRelation::new(image.rows(), image.cols(), radius)?);
        Self::with_adjacency(image, adjacency)
    }

    pub fn with_adjacency(image: Image<T>, adjacency: Rc<AdjacencyRelation>) -> Result<Self> {
        if adjacency.rows() != image.rows() || adjacency.cols() != image.cols() {
            return Err(Error::DimensionMismatch {
                rows: image.rows(),
                cols: image.cols(),
                adj_rows: adjacency.rows(),
                adj_cols: adjacency.cols(),
            });
        }

        let num_pixels = image.size();
        let mut sets = PixelSets::with_num_pixels(num_pixels)?;
        let mut border = BorderLists::with_num_pixels(num_pixels)?;

        let num_zones = discover_flat_zones(&image, &adjacency, &mut sets, |slot, pixel| {
            border.append(slot, pixel);
        })?;
        border.shrink_to_num_sets(num_zones);

        let mut scratch_candidates = Vec::new();
        scratch_candidates.try_reserve(num_zones.min(64))?;

        Ok(Self {
            image,
            adjacency,
            sets,
            union: UnionFind::new(num_zones),
            border,
            stamps: StampSet::new(num_zones),
            scratch_candidates,
        })
    }

    pub fn image(&self) -> &Image<T> {
        &self.image
    }

    pub fn adjacency(&self) -> &Rc<AdjacencyRelation> {
        &self.adjacency
    }

    pub fn pixel_sets(&self) -> &PixelSets {
        &self.sets
    }

    fn checked_slot(&self, rep: usize) -> Result<usize> {
        let num_pixels = self.sets.num_pixels();
        if rep >= num_pixels {
            return Err(Error::InvalidPixel {
                pixel: rep,
                num_pixels,
            });
        }
        Ok(self.sets.slot_of_pixel(rep))
    }

    fn root_of_rep(&mut self, rep: usize) -> Result<usize> {
        let slot = self.checked_slot(rep)?;
        Ok(self.union.find(slot))
    }

    /// Current border-list length of the zone `rep` resolves to. The list may
    /// still carry interior pixels that a few more queries will refilter out.
    pub fn border_len(&mut self, rep: usize) -> Result<usize> {
        let root = self.root_of_rep(rep)?;
        Ok(self.border.count[root])
    }

    pub fn iter_pixels_of_zones<'a>(
        &'a self,
        reps: &'a [usize],
    ) -> impl Iterator<Item = usize> + 'a {
        self.sets.iter_pixels_of_sets(reps)
    }

    /// Fast-path adjacency walk for a graph that has seen no merges: slots
    /// are their own roots, so the union-find lookups are skipped.
    pub fn for_each_adjacent_zone_unmerged(
        &mut self,
        rep: usize,
        mut emit: impl FnMut(usize),
    ) -> Result<()> {
        let slot = self.checked_slot(rep)?;
        if !self.sets.is_active_slot(slot) {
            return Err(Error::StaleHandle { rep });
        }

        self.stamps.reset_all();
        let Self {
            border,
            sets,
            adjacency,
            stamps,
            ..
        } = self;
        let mut cursor = border.head[slot];
        while cursor != NO_PIXEL {
            let next = border.next[cursor];
            for neighbor in adjacency.neighbors(cursor) {
                let slot_q = sets.slot_of_pixel(neighbor);
                if slot_q == slot || stamps.is_marked(slot_q) {
                    continue;
                }
                stamps.mark(slot_q);
                let rep_q = sets.pixel_of_slot(slot_q);
                if rep_q != NO_PIXEL {
                    emit(rep_q);
                }
            }
            cursor = next;
        }
        Ok(())
    }

    /// Direct adjacency test without any cached state: scans the pixels of
    /// the smaller zone and resolves neighbour roots through the union-find.
    pub fn are_adjacent_by_pixels(&mut self, rep_a: usize, rep_b: usize) -> Result<bool> {
        let root_a = self.root_of_rep(rep_a)?;
        let root_b = self.root_of_rep(rep_b)?;
        if root_a == root_b {
            return Ok(false);
        }

        let (scan_root, other_root) = if self.sets.size_sets[root_b] < self.sets.size_sets[root_a]
        {
            (root_b, root_a)
        } else {
            (root_a, root_b)
        };

        let Self {
            union,
            sets,
            adjacency,
            ..
        } = self;
        let mut pixel = sets.pixel_of_slot(scan_root);
        for _ in 0..sets.size_sets[scan_root] {
            for neighbor in adjacency.neighbors(pixel) {
                if union.find(sets.slot_of_pixel(neighbor)) == other_root {
                    return Ok(true);
                }
            }
            pixel = sets.pixels_next[pixel];
        }
        Ok(false)
    }

    /// Stamps every root adjacent to `root`, walking its border list once.
    /// Leaves the marks in the current stamp generation for the caller.
    fn mark_adjacent_roots(&mut self, root: usize) {
        self.stamps.reset_all();
        let Self {
            border,
            union,
            sets,
            adjacency,
            stamps,
            ..
        } = self;
        let mut cursor = border.head[root];
        while cursor != NO_PIXEL {
            let next = border.next[cursor];
            for neighbor in adjacency.neighbors(cursor) {
                let root_q = union.find(sets.slot_of_pixel(neighbor));
                if root_q != root {
                    stamps.mark(root_q);
                }
            }
            cursor = next;
        }
    }
}

impl<T: Copy + Eq> ZoneGraph for OnDemandZoneGraph<T> {
    fn num_zones(&self) -> usize {
        self.sets.num_slots()
    }

    fn num_active_zones(&self) -> usize {
        self.sets.num_active_sets()
    }

    fn num_pixels_in_zone(&self, rep: usize) -> Result<usize> {
        self.sets.num_pixels_in_set(rep)
    }

    fn find_representative(&mut self, rep: usize) -> Result<usize> {
        let root = self.root_of_rep(rep)?;
        Ok(self.sets.pixel_of_slot(root))
    }

    fn for_each_adjacent_zone(&mut self, rep: usize, mut emit: impl FnMut(usize)) -> Result<()> {
        let root = self.root_of_rep(rep)?;

        if self.border.dirty[root] {
            let budget = self.border.refilter_budget(root);
            {
                let Self {
                    border,
                    union,
                    sets,
                    adjacency,
                    ..
                } = self;
                border.refilter_step(root, budget, |pixel| {
                    still_border(adjacency, sets, union, pixel, root)
                });
            }
            if self.border.cursor[root] == NO_PIXEL {
                self.border.dirty[root] = false;
            }
        }

        self.stamps.reset_all();
        let Self {
            border,
            union,
            sets,
            adjacency,
            stamps,
            ..
        } = self;
        let mut cursor = border.head[root];
        while cursor != NO_PIXEL {
            let next = border.next[cursor];
            for neighbor in adjacency.neighbors(cursor) {
                let root_q = union.find(sets.slot_of_pixel(neighbor));
                if root_q == root || stamps.is_marked(root_q) {
                    continue;
                }
                stamps.mark(root_q);
                let rep_q = sets.pixel_of_slot(root_q);
                if rep_q != NO_PIXEL {
                    emit(rep_q);
                }
            }
            cursor = next;
        }
        Ok(())
    }

    fn iter_zone_representatives(&self) -> impl Iterator<Item = usize> + '_ {
        self.sets.iter_representatives()
    }

    fn iter_pixels_of_zone(&self, rep: usize) -> Result<impl Iterator<Item = usize> + '_> {
        let slot = self.checked_slot(rep)?;
        if !self.sets.is_active_slot(slot) {
            return Err(Error::StaleHandle { rep });
        }
        Ok(self.sets.iter_pixels_of_set(rep))
    }

    fn merge_zones(&mut self, rep_winner: usize, rep_loser: usize) -> Result<usize> {
        let root_winner = self.root_of_rep(rep_winner)?;
        let root_loser = self.root_of_rep(rep_loser)?;
        let winner_rep = self.sets.pixel_of_slot(root_winner);
        if root_winner == root_loser {
            return Ok(winner_rep);
        }
        let loser_rep = self.sets.pixel_of_slot(root_loser);

        self.union.union_into(root_winner, root_loser);
        self.sets.merge_sets_by_rep(winner_rep, loser_rep);

        // The concatenated list may now hold interior pixels (former border
        // against the zone just absorbed); refilter lazily, query by query.
        self.border.concat(root_winner, root_loser);
        self.border.dirty[root_winner] = true;
        self.border.reset_cursor(root_winner);
        Ok(winner_rep)
    }

    fn merge_adjacent_candidates_in_place(
        &mut self,
        rep_base: usize,
        candidates: &mut Vec<usize>,
    ) -> Result<usize> {
        let root_base = self.root_of_rep(rep_base)?;
        let base_rep = self.sets.pixel_of_slot(root_base);

        // Adjacency is stamped once, against the border as it is now; merges
        // further down do not re-qualify candidates that only become
        // adjacent through them.
        self.mark_adjacent_roots(root_base);

        let mut losers = std::mem::take(&mut self.scratch_candidates);
        losers.clear();
        let mut winner_rep = base_rep;
        for &rep in candidates.iter() {
            let root = self.root_of_rep(rep)?;
            if root == root_base || !self.stamps.is_marked(root) {
                continue;
            }
            let canon = self.sets.pixel_of_slot(root);
            losers.push(canon);
            winner_rep = winner_rep.min(canon);
        }
        if winner_rep != base_rep {
            losers.push(base_rep);
        }

        for position in 0..losers.len() {
            let loser_rep = losers[position];
            if loser_rep != winner_rep {
                self.merge_zones(winner_rep, loser_rep)?;
            }
        }
        losers.clear();
        self.scratch_candidates = losers;

        // Contract: candidates keeps the unmerged entries plus the winner,
        // exactly once.
        let winner_root = self.root_of_rep(winner_rep)?;
        let union = &mut self.union;
        let sets = &self.sets;
        candidates.retain(|&rep| union.find(sets.slot_of_pixel(rep)) != winner_root);
        candidates.push(winner_rep);
        Ok(winner_rep)
    }

    fn merge_bases_with_adjacent_candidates_in_place(
        &mut self,
        bases: &[usize],
        candidates: &mut Vec<usize>,
        winner_hint: Option<usize>,
    ) -> Result<usize> {
        if bases.is_empty() {
            return Err(Error::EmptyBases);
        }
        let hint = winner_hint.unwrap_or_else(|| bases.iter().copied().min().unwrap());
        let winner_rep = self.find_representative(hint)?;

        for &rep in bases {
            let canon = self.find_representative(rep)?;
            if canon != winner_rep {
                self.merge_zones(winner_rep, canon)?;
            }
        }
        self.merge_adjacent_candidates_in_place(winner_rep, candidates)
    }

    /// Edges are never materialized in this strategy.
    fn num_edges(&self) -> Option<usize> {
        None
    }

    fn average_degree(&self) -> Option<f64> {
        None
    }
}
