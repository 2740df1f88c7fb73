use crate::error::{Error, Result};
use itertools::iproduct;
use smallvec::SmallVec;

/// Pixel neighbourhood oracle for a `rows x cols` grid, parameterised by
/// radius: the neighbourhood of a pixel is every offset `(dy, dx) != (0, 0)`
/// with `dy² + dx² <= radius²`. Radius 1.0 gives 4-adjacency, radius 1.5
/// gives 8-adjacency. Neighbours crossing the image border are elided by the
/// iterators.
///
/// Immutable after construction; share one relation across graphs over the
/// same image with `Rc`.
#[derive(Debug, Clone)]
pub struct AdjacencyRelation {
    rows: usize,
    cols: usize,
    offsets: SmallVec<[(i64, i64); 8]>,
    forward_offsets: SmallVec<[(i64, i64); 8]>,
}

impl AdjacencyRelation {
    pub fn new(rows: usize, cols: usize, radius: f64) -> Result<Self> {
        if !(radius > 0.0) {
            return Err(Error::InvalidRadius { radius });
        }
        if rows == 0 || cols == 0 {
            return Err(Error::EmptyImage { rows, cols });
        }

        let reach = radius.floor() as i64;
        let squared = radius * radius;
        let offsets: SmallVec<[(i64, i64); 8]> = iproduct!(-reach..=reach, -reach..=reach)
            .filter(|&(dy, dx)| (dy, dx) != (0, 0))
            .filter(|&(dy, dx)| ((dy * dy + dx * dx) as f64) <= squared)
            .collect();

        // The half with a strictly positive linear displacement; emitting
        // edges over this half visits each unordered pixel pair once.
        let forward_offsets = offsets
            .iter()
            .copied()
            .filter(|&(dy, dx)| dy > 0 || (dy == 0 && dx > 0))
            .collect();

        Ok(Self {
            rows,
            cols,
            offsets,
            forward_offsets,
        })
    }

    /// 4-adjacency.
    pub fn four(rows: usize, cols: usize) -> Result<Self> {
        Self::new(rows, cols, 1.0)
    }

    /// 8-adjacency.
    pub fn eight(rows: usize, cols: usize) -> Result<Self> {
        Self::new(rows, cols, 1.5)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn num_pixels(&self) -> usize {
        self.rows * self.cols
    }

    /// Neighbourhood size away from the border.
    pub fn degree(&self) -> usize {
        self.offsets.len()
    }

    /// All in-bounds neighbours of `pixel`.
    pub fn neighbors(&self, pixel: usize) -> impl Iterator<Item = usize> + '_ {
        self.apply(pixel, &self.offsets)
    }

    /// In-bounds neighbours of `pixel` with a higher linear id.
    pub fn neighbors_forward(&self, pixel: usize) -> impl Iterator<Item = usize> + '_ {
        self.apply(pixel, &self.forward_offsets)
    }

    fn apply<'a>(
        &'a self,
        pixel: usize,
        offsets: &'a [(i64, i64)],
    ) -> impl Iterator<Item = usize> + 'a {
        debug_assert!(pixel < self.num_pixels());
        let row = (pixel / self.cols) as i64;
        let col = (pixel % self.cols) as i64;
        let (rows, cols) = (self.rows as i64, self.cols as i64);
        offsets.iter().filter_map(move |&(dy, dx)| {
            let (r, c) = (row + dy, col + dx);
            (r >= 0 && r < rows && c >= 0 && c < cols).then(|| (r * cols + c) as usize)
        })
    }
}

#[cfg(test)]
mod test {
    use crate::{adjacency::AdjacencyRelation, error::Error};
    use itertools::Itertools;

    #[test]
    fn four_adjacency_offsets() {
        let adj = AdjacencyRelation::four(3, 3).unwrap();
        assert_eq!(adj.degree(), 4);

        // Center pixel of a 3x3 grid.
        let neighbors: Vec<usize> = adj.neighbors(4).sorted().collect();
        assert_eq!(neighbors, vec![1, 3, 5, 7]);
    }

    #[test]
    fn eight_adjacency_offsets() {
        let adj = AdjacencyRelation::eight(3, 3).unwrap();
        assert_eq!(adj.degree(), 8);

        let neighbors: Vec<usize> = adj.neighbors(4).sorted().collect();
        assert_eq!(neighbors, vec![0, 1, 2, 3, 5, 6, 7, 8]);
    }

    #[test]
    fn border_neighbours_are_elided() {
        let adj = AdjacencyRelation::four(3, 3).unwrap();
        let corner: Vec<usize> = adj.neighbors(0).sorted().collect();
        assert_eq!(corner, vec![1, 3]);

        let edge: Vec<usize> = adj.neighbors(5).sorted().collect();
        assert_eq!(edge, vec![2, 4, 8]);
    }

    #[test]
    fn forward_emits_each_pair_once() {
        let adj = AdjacencyRelation::eight(4, 5).unwrap();
        let mut pairs = Vec::new();
        for p in 0..adj.num_pixels() {
            for q in adj.neighbors_forward(p) {
                assert!(q > p);
                pairs.push((p, q));
            }
        }
        let unique = pairs.iter().unique().count();
        assert_eq!(unique, pairs.len());

        // Forward half plus its mirror is the full relation.
        let full: usize = (0..adj.num_pixels()).map(|p| adj.neighbors(p).count()).sum();
        assert_eq!(pairs.len() * 2, full);
    }

    #[test]
    fn rejects_non_positive_radius() {
        assert!(matches!(
            AdjacencyRelation::new(2, 2, 0.0),
            Err(Error::InvalidRadius { .. })
        ));
        assert!(matches!(
            AdjacencyRelation::new(2, 2, -1.5),
            Err(Error::InvalidRadius { .. })
        ));
    }
}
