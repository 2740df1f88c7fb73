use crate::error::Result;

/// Strategy-independent surface of a flat-zone graph. The tree-adjustment
/// layers are written once against this trait and stay oblivious to whether
/// adjacency is materialized ([`EagerZoneGraph`]) or recomputed from border
/// pixels ([`OnDemandZoneGraph`]).
///
/// Queries take `&mut self` because union-find path compression and border
/// refiltering rewrite internal state; the exclusive borrow is also exactly
/// the serialization the engine demands, so queries and merges on one graph
/// instance never interleave.
///
/// Representatives are pixel ids. Any member pixel of a zone resolves through
/// [`find_representative`]; operations that look a slot up without
/// canonicalizing report [`Error::StaleHandle`] for pixels whose recorded
/// slot was retired by a merge.
///
/// [`EagerZoneGraph`]: crate::eager::EagerZoneGraph
/// [`OnDemandZoneGraph`]: crate::on_demand::OnDemandZoneGraph
/// [`find_representative`]: ZoneGraph::find_representative
/// [`Error::StaleHandle`]: crate::error::Error::StaleHandle
pub trait ZoneGraph {
    /// Zones discovered at construction; stable across merges.
    fn num_zones(&self) -> usize;

    /// Zones that have not been merged away. Equals the number of union-find
    /// roots.
    fn num_active_zones(&self) -> usize;

    fn num_pixels_in_zone(&self, rep: usize) -> Result<usize>;

    /// Canonical representative of the zone containing `rep`. Idempotent.
    fn find_representative(&mut self, rep: usize) -> Result<usize>;

    /// Calls `emit` once per neighbouring zone, with that zone's canonical
    /// representative. No order guarantee.
    fn for_each_adjacent_zone(&mut self, rep: usize, emit: impl FnMut(usize)) -> Result<()>;

    /// Representatives of the currently active zones, in slot order.
    fn iter_zone_representatives(&self) -> impl Iterator<Item = usize> + '_;

    /// Lazy walk over the pixels of the zone `rep` resolves to.
    fn iter_pixels_of_zone(&self, rep: usize) -> Result<impl Iterator<Item = usize> + '_>;

    /// Fuses the loser's zone into the winner's, unconditionally. The first
    /// argument names the survivor; returns its canonical representative.
    fn merge_zones(&mut self, rep_winner: usize, rep_loser: usize) -> Result<usize>;

    /// Fuses into the base's zone every candidate that is actually adjacent
    /// to it; the smallest representative among the base and the adjacent
    /// candidates wins. `candidates` is edited in place: on return it holds
    /// exactly the winner plus the entries that did not merge. Returns the
    /// winner.
    fn merge_adjacent_candidates_in_place(
        &mut self,
        rep_base: usize,
        candidates: &mut Vec<usize>,
    ) -> Result<usize>;

    /// Like [`merge_adjacent_candidates_in_place`], but first fuses `bases`
    /// (zones the caller guarantees to be mutually connected)
    /// unconditionally. The winner is `winner_hint` if given, otherwise the
    /// smallest base representative.
    ///
    /// [`merge_adjacent_candidates_in_place`]: ZoneGraph::merge_adjacent_candidates_in_place
    fn merge_bases_with_adjacent_candidates_in_place(
        &mut self,
        bases: &[usize],
        candidates: &mut Vec<usize>,
        winner_hint: Option<usize>,
    ) -> Result<usize>;

    /// Undirected edge count; `None` when the strategy does not materialize
    /// edges.
    fn num_edges(&self) -> Option<usize>;

    /// Mean neighbour count per active zone; `None` when the strategy does
    /// not materialize edges.
    fn average_degree(&self) -> Option<f64>;
}

#[cfg(test)]
mod test {
    use crate::{
        eager::EagerZoneGraph, graph::ZoneGraph, image::Image, on_demand::OnDemandZoneGraph,
    };
    use itertools::Itertools;

    /// Adjacency of every active zone, sorted, in slot order.
    fn materialize(graph: &mut impl ZoneGraph) -> Vec<(usize, Vec<usize>)> {
        let reps: Vec<usize> = graph.iter_zone_representatives().collect();
        reps.into_iter()
            .map(|rep| {
                let mut neighbors = Vec::new();
                graph
                    .for_each_adjacent_zone(rep, |r| neighbors.push(r))
                    .unwrap();
                neighbors.sort_unstable();
                (rep, neighbors)
            })
            .collect()
    }

    fn adjacency_of(graph: &mut impl ZoneGraph, rep: usize) -> Vec<usize> {
        let mut neighbors = Vec::new();
        graph
            .for_each_adjacent_zone(rep, |r| neighbors.push(r))
            .unwrap();
        neighbors.sort_unstable();
        neighbors
    }

    /// The end-to-end behaviour both strategies must share, on 4-adjacency.
    fn run_conformance<G: ZoneGraph>(mut build: impl FnMut(Image<u8>) -> G) {
        // Constant image: one zone, no neighbours.
        let mut graph = build(Image::from_rows_array([[5u8, 5], [5, 5]]));
        assert_eq!(graph.num_zones(), 1);
        assert_eq!(graph.num_active_zones(), 1);
        assert_eq!(graph.num_pixels_in_zone(0).unwrap(), 4);
        assert_eq!(adjacency_of(&mut graph, 0), Vec::<usize>::new());
        assert_eq!(graph.iter_zone_representatives().collect_vec(), vec![0]);

        // Singleton against an L-shaped zone.
        let mut graph = build(Image::from_rows_array([[1u8, 2], [2, 2]]));
        assert_eq!(graph.num_zones(), 2);
        assert_eq!(graph.num_pixels_in_zone(0).unwrap(), 1);
        assert_eq!(graph.num_pixels_in_zone(1).unwrap(), 3);
        assert_eq!(adjacency_of(&mut graph, 0), vec![1]);
        assert_eq!(adjacency_of(&mut graph, 1), vec![0]);

        // Checkerboard: nine singletons with corner/edge/center degrees.
        let mut graph = build(Image::from_rows_array([[1u8, 2, 1], [2, 1, 2], [1, 2, 1]]));
        assert_eq!(graph.num_zones(), 9);
        for corner in [0, 2, 6, 8] {
            assert_eq!(adjacency_of(&mut graph, corner).len(), 2);
        }
        for edge in [1, 3, 5, 7] {
            assert_eq!(adjacency_of(&mut graph, edge).len(), 3);
        }
        assert_eq!(adjacency_of(&mut graph, 4), vec![1, 3, 5, 7]);

        // Two nested zones, then the pairwise merge: the caller's winner
        // names the result and the loser's rep canonicalizes to it.
        let mut graph = build(Image::from_rows_array([[0u8, 0, 1], [0, 1, 1], [1, 1, 1]]));
        assert_eq!(graph.num_zones(), 2);
        assert_eq!(graph.num_pixels_in_zone(0).unwrap(), 3);
        assert_eq!(graph.num_pixels_in_zone(2).unwrap(), 6);
        assert_eq!(adjacency_of(&mut graph, 0), vec![2]);
        assert_eq!(adjacency_of(&mut graph, 2), vec![0]);

        let winner = graph.merge_zones(0, 2).unwrap();
        assert_eq!(winner, 0);
        assert_eq!(graph.num_active_zones(), 1);
        assert_eq!(graph.num_pixels_in_zone(0).unwrap(), 9);
        assert_eq!(adjacency_of(&mut graph, 0), Vec::<usize>::new());
        assert_eq!(graph.find_representative(2).unwrap(), 0);

        // Laws: idempotent canonicalization, merge redirects the loser.
        let rep = graph.find_representative(7).unwrap();
        assert_eq!(graph.find_representative(rep).unwrap(), rep);

        let mut pixels = graph.iter_pixels_of_zone(0).unwrap().collect_vec();
        pixels.sort_unstable();
        assert_eq!(pixels, (0..9).collect_vec());

        // Three stripes: middle zone bridges the outer two.
        let mut graph = build(Image::from_rows_array([[1u8, 1, 1], [2, 2, 2], [3, 3, 3]]));
        assert_eq!(graph.num_zones(), 3);
        assert_eq!(adjacency_of(&mut graph, 0), vec![3]);
        assert_eq!(adjacency_of(&mut graph, 3), vec![0, 6]);
        assert_eq!(adjacency_of(&mut graph, 6), vec![3]);

        // Candidate merge: only the adjacent candidate fuses, the vector
        // ends up with the winner plus the unmerged entry.
        let mut candidates = vec![3, 6];
        let winner = graph
            .merge_adjacent_candidates_in_place(0, &mut candidates)
            .unwrap();
        assert_eq!(winner, 0);
        assert_eq!(graph.num_active_zones(), 2);
        candidates.sort_unstable();
        assert_eq!(candidates, vec![0, 6]);
        assert_eq!(adjacency_of(&mut graph, 0), vec![6]);
        assert_eq!(adjacency_of(&mut graph, 6), vec![0]);
    }

    #[test]
    fn conformance_eager() {
        run_conformance(|image| EagerZoneGraph::new(image, 1.0).unwrap());
    }

    #[test]
    fn conformance_on_demand() {
        run_conformance(|image| OnDemandZoneGraph::new(image, 1.0).unwrap());
    }

    /// Building both strategies over one image yields identical adjacency,
    /// and keeps doing so through an arbitrary interleaving of merges.
    #[test]
    fn strategies_agree_on_random_images() {
        fastrand::seed(0x5eed_cafe);
        for _ in 0..25 {
            let rows = fastrand::usize(2..8);
            let cols = fastrand::usize(2..8);
            let pixels = (0..rows * cols).map(|_| fastrand::u8(0..4)).collect();
            let image = Image::from_vec(rows, cols, pixels).unwrap();
            let radius = if fastrand::bool() { 1.0 } else { 1.5 };

            let mut eager = EagerZoneGraph::new(image.clone(), radius).unwrap();
            let mut on_demand = OnDemandZoneGraph::new(image, radius).unwrap();
            assert_eq!(materialize(&mut eager), materialize(&mut on_demand));

            for _ in 0..6 {
                let reps = eager.iter_zone_representatives().collect_vec();
                if reps.len() < 2 {
                    break;
                }
                let base = reps[fastrand::usize(0..reps.len())];
                let neighbors = adjacency_of(&mut eager, base);
                if neighbors.is_empty() {
                    continue;
                }
                let other = neighbors[fastrand::usize(0..neighbors.len())];
                let (winner, loser) = (base.min(other), base.max(other));

                let merged_eager = eager.merge_zones(winner, loser).unwrap();
                let merged_on_demand = on_demand.merge_zones(winner, loser).unwrap();
                assert_eq!(merged_eager, merged_on_demand);

                assert_eq!(materialize(&mut eager), materialize(&mut on_demand));
                assert!(eager.check_consistency().is_ok());
                assert_eq!(eager.num_active_zones(), on_demand.num_active_zones());
            }
        }
    }

    /// Bulk merges agree across strategies too.
    #[test]
    fn strategies_agree_on_candidate_merges() {
        fastrand::seed(0xba5e);
        for _ in 0..15 {
            let rows = fastrand::usize(3..7);
            let cols = fastrand::usize(3..7);
            let pixels = (0..rows * cols).map(|_| fastrand::u8(0..3)).collect();
            let image = Image::from_vec(rows, cols, pixels).unwrap();

            let mut eager = EagerZoneGraph::new(image.clone(), 1.0).unwrap();
            let mut on_demand = OnDemandZoneGraph::new(image, 1.0).unwrap();

            let reps = eager.iter_zone_representatives().collect_vec();
            let base = reps[fastrand::usize(0..reps.len())];
            let mut candidates_eager = reps
                .iter()
                .copied()
                .filter(|_| fastrand::bool())
                .collect_vec();
            let mut candidates_on_demand = candidates_eager.clone();

            let winner_eager = eager
                .merge_adjacent_candidates_in_place(base, &mut candidates_eager)
                .unwrap();
            let winner_on_demand = on_demand
                .merge_adjacent_candidates_in_place(base, &mut candidates_on_demand)
                .unwrap();

            assert_eq!(winner_eager, winner_on_demand);
            assert_eq!(
                candidates_eager.iter().sorted().collect_vec(),
                candidates_on_demand.iter().sorted().collect_vec()
            );
            assert_eq!(materialize(&mut eager), materialize(&mut on_demand));
            assert!(eager.check_consistency().is_ok());
        }
    }
}

