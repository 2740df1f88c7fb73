use crate::{
    adjacency::AdjacencyRelation, error::Result, image::Image, pixel_sets::PixelSets,
    queue::FastQueue,
};

/// Discovers the flat zones of `image` by BFS over same-level neighbours and
/// seeds `sets` with them: one slot per zone, `pixel_to_index` written for
/// every pixel, membership chained through `pixels_next` and closed into a
/// circle whose head (and representative) is the zone's smallest pixel id.
///
/// `on_border(slot, pixel)` fires once for every pixel with at least one
/// neighbour at a different level, in BFS order per zone; each strategy
/// stores borders its own way. Ends with `shrink_to_num_sets` and returns the
/// zone count.
pub(crate) fn discover_flat_zones<T: Copy + Eq>(
    image: &Image<T>,
    adjacency: &AdjacencyRelation,
    sets: &mut PixelSets,
    mut on_border: impl FnMut(usize, usize),
) -> Result<usize> {
    let num_pixels = image.size();
    let img = image.as_slice();

    let mut visited = Vec::new();
    visited.try_reserve_exact(num_pixels)?;
    visited.resize(num_pixels, false);

    let mut queue = FastQueue::with_capacity(num_pixels / 4 + 1);
    let mut num_zones = 0;

    for seed in 0..num_pixels {
        if visited[seed] {
            continue;
        }

        let slot = num_zones;
        num_zones += 1;
        let level = img[seed];
        let mut tail = seed;
        let mut zone_size = 0usize;

        queue.push(seed);
        visited[seed] = true;
        sets.pixel_to_index[seed] = slot;
        sets.index_to_pixel[slot] = seed;

        while let Some(pixel) = queue.pop() {
            zone_size += 1;
            let mut has_diff = false;
            for neighbor in adjacency.neighbors(pixel) {
                if !visited[neighbor] && img[neighbor] == level {
                    visited[neighbor] = true;
                    queue.push(neighbor);
                    sets.pixel_to_index[neighbor] = slot;
                    sets.pixels_next[tail] = neighbor;
                    tail = neighbor;
                } else if img[neighbor] != level {
                    has_diff = true;
                }
            }
            if has_diff {
                on_border(slot, pixel);
            }
        }

        // Close the circular membership list.
        sets.pixels_next[tail] = seed;
        sets.size_sets[slot] = zone_size;
    }

    sets.shrink_to_num_sets(num_zones);
    log::debug!("flood fill: {num_zones} flat zones over {num_pixels} pixels");
    Ok(num_zones)
}

#[cfg(test)]
mod test {
    use crate::{
        adjacency::AdjacencyRelation, flood::discover_flat_zones, image::Image,
        pixel_sets::PixelSets,
    };

    fn discover<const W: usize, const H: usize>(
        pixels: [[u8; W]; H],
    ) -> (PixelSets, Vec<(usize, usize)>) {
        let image = Image::from_rows_array(pixels);
        let adjacency = AdjacencyRelation::four(H, W).unwrap();
        let mut sets = PixelSets::with_num_pixels(image.size()).unwrap();
        let mut border = Vec::new();
        discover_flat_zones(&image, &adjacency, &mut sets, |slot, pixel| {
            border.push((slot, pixel));
        })
        .unwrap();
        (sets, border)
    }

    #[test]
    fn constant_image_is_one_zone_without_border() {
        let (sets, border) = discover([[5u8, 5], [5, 5]]);
        assert_eq!(sets.num_slots(), 1);
        assert_eq!(sets.num_pixels_in_set(0).unwrap(), 4);
        assert!(border.is_empty());

        let mut pixels: Vec<usize> = sets.iter_pixels_of_set(0).collect();
        pixels.sort_unstable();
        assert_eq!(pixels, vec![0, 1, 2, 3]);
    }

    #[test]
    fn representative_is_the_smallest_pixel() {
        let (sets, _) = discover([[1u8, 2], [2, 2]]);
        assert_eq!(sets.num_slots(), 2);
        assert_eq!(sets.iter_representatives().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(sets.num_pixels_in_set(0).unwrap(), 1);
        assert_eq!(sets.num_pixels_in_set(1).unwrap(), 3);
    }

    #[test]
    fn every_pixel_of_a_checkerboard_is_border() {
        let (sets, border) = discover([[1u8, 2, 1], [2, 1, 2], [1, 2, 1]]);
        assert_eq!(sets.num_slots(), 9);
        assert_eq!(border.len(), 9);
        // Zone slots are discovered in pixel order, so slot == pixel here.
        for (slot, pixel) in border {
            assert_eq!(slot, pixel);
        }
    }

    #[test]
    fn zone_sizes_cover_the_image() {
        let (sets, _) = discover([[0u8, 0, 1], [0, 1, 1], [1, 1, 1]]);
        assert_eq!(sets.num_slots(), 2);
        let total: usize = sets
            .iter_representatives()
            .map(|rep| sets.num_pixels_in_set(rep).unwrap())
            .sum();
        assert_eq!(total, 9);
    }
}
