use crate::{
    adjacency::AdjacencyRelation,
    adjacent_set::{AdjacentZoneSet, LocalPrefilter64},
    error::{Error, Result},
    flood::discover_flat_zones,
    graph::ZoneGraph,
    image::Image,
    pixel_sets::PixelSets,
    union_find::UnionFind,
};
use ahash::AHashSet;
use std::rc::Rc;

/// Flat-zone graph that materializes every neighbour list at construction.
///
/// A first BFS pass assigns each pixel its zone and flags boundary pixels;
/// a second pass walks only the boundary, emitting each cross-level edge once
/// (forward neighbours + a per-source-zone prefilter) into the lower slot's
/// list; `mirror_and_finalize` then completes the reverse edges and
/// canonicalizes all lists. Merges rewire the loser's neighbours onto the
/// winner and retire the loser's slot; queries afterwards are straight reads
/// of the winner's list.
#[derive(Debug, Clone)]
pub struct EagerZoneGraph<T = u8> {
    image: Image<T>,
    adjacency: Rc<AdjacencyRelation>,
    sets: PixelSets,
    union: UnionFind,
    adjacent: Vec<AdjacentZoneSet>,
    scratch_candidates: Vec<usize>,
}

/// Expected neighbour count for a zone of the given area; compact zones have
/// perimeter ~ sqrt(area).
fn guess_degree(area: usize) -> usize {
    (10 + (2.2 * (area as f64).sqrt()) as usize).min(64)
}

impl<T: Copy + Eq> EagerZoneGraph<T> {
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

        let mut is_boundary = Vec::new();
        is_boundary.try_reserve_exact(num_pixels)?;
        is_boundary.resize(num_pixels, false);

        let num_zones = discover_flat_zones(&image, &adjacency, &mut sets, |_, pixel| {
            is_boundary[pixel] = true;
        })?;

        let mut adjacent = Vec::new();
        adjacent.try_reserve_exact(num_zones)?;
        for slot in 0..num_zones {
            let mut list = AdjacentZoneSet::new();
            list.reserve(guess_degree(sets.size_sets[slot]));
            adjacent.push(list);
        }

        // Emit each cross-level edge once, towards the lower slot; the
        // prefilter drops repeats while the scan stays inside one source
        // zone (boundary pixels of a zone are contiguous in pixel order
        // often enough for this to pay).
        let img = image.as_slice();
        let mut prefilter = LocalPrefilter64::new();
        for pixel in 0..num_pixels {
            if !is_boundary[pixel] {
                continue;
            }
            let slot_p = sets.slot_of_pixel(pixel);
            if slot_p != prefilter.current_zone() {
                prefilter.reset(slot_p);
            }
            for neighbor in adjacency.neighbors_forward(pixel) {
                if img[neighbor] == img[pixel] {
                    continue;
                }
                let slot_q = sets.slot_of_pixel(neighbor);
                if prefilter.contains(slot_q) {
                    continue;
                }
                prefilter.insert(slot_q);

                if slot_p < slot_q {
                    let rep_q = sets.pixel_of_slot(slot_q);
                    adjacent[slot_p].append_unchecked(rep_q);
                } else {
                    let rep_p = sets.pixel_of_slot(slot_p);
                    adjacent[slot_q].append_unchecked(rep_p);
                }
            }
        }
        AdjacentZoneSet::mirror_and_finalize(&mut adjacent, &sets);

        let mut scratch_candidates = Vec::new();
        scratch_candidates.try_reserve(num_zones.min(64))?;

        let graph = Self {
            image,
            adjacency,
            sets,
            union: UnionFind::new(num_zones),
            adjacent,
            scratch_candidates,
        };
        log::debug!(
            "eager flat-zone graph: {} zones, {} edges",
            num_zones,
            graph.num_edges().unwrap_or(0)
        );
        Ok(graph)
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

    /// Direct read of a zone's neighbour set. The slot reached through `rep`
    /// must be active; pass a canonical representative.
    pub fn adjacent_zones(&self, rep: usize) -> Result<&AdjacentZoneSet> {
        let slot = self.checked_slot(rep)?;
        if !self.sets.is_active_slot(slot) {
            return Err(Error::StaleHandle { rep });
        }
        Ok(&self.adjacent[slot])
    }

    /// True if the base's zone is adjacent to any of `reps`.
    pub fn is_adjacent_to_any(&mut self, rep_base: usize, reps: &[usize]) -> Result<bool> {
        let root = self.root_of_rep(rep_base)?;
        let list = &self.adjacent[root];
        Ok(reps.iter().any(|&rep| list.contains(rep)))
    }

    pub fn iter_pixels_of_zones<'a>(
        &'a self,
        reps: &'a [usize],
    ) -> impl Iterator<Item = usize> + 'a {
        self.sets.iter_pixels_of_sets(reps)
    }

    /// Union-find attach plus the pixel-side fusion; adjacency rewiring is
    /// the caller's job and happens first.
    fn unite(&mut self, slot_winner: usize, slot_loser: usize) {
        let root_winner = self.union.find(slot_winner);
        let root_loser = self.union.find(slot_loser);
        if root_winner == root_loser {
            return;
        }
        let rep_winner = self.sets.pixel_of_slot(root_winner);
        let rep_loser = self.sets.pixel_of_slot(root_loser);
        self.union.union_into(root_winner, root_loser);
        self.sets.merge_sets_by_rep(rep_winner, rep_loser);
    }

    /// Moves every edge of the loser onto the winner, symmetrically and
    /// without self-loops, and empties the loser's list.
    fn rewire_loser_into_winner(&mut self, slot_winner: usize, rep_winner: usize, rep_loser: usize) {
        let slot_loser = self.sets.slot_of_pixel(rep_loser);
        let adj_loser = self.adjacent[slot_loser].take();
        for neighbor_rep in adj_loser.iter() {
            if neighbor_rep == rep_winner {
                continue;
            }
            let slot_n = self.sets.slot_of_pixel(neighbor_rep);
            self.adjacent[slot_winner].insert(neighbor_rep);
            self.adjacent[slot_n].insert(rep_winner);
            self.adjacent[slot_n].erase(rep_loser);
        }
        self.adjacent[slot_winner].erase(rep_loser);
    }

    /// Validates the graph against its own invariants: no self-loops, no
    /// duplicate neighbours, neighbours are active roots, adjacency is
    /// symmetric. Debug aid; cost is proportional to the remaining edges.
    pub fn check_consistency(&self) -> ConsistencyReport {
        let mut report = ConsistencyReport::default();
        for slot in 0..self.union.len() {
            if !self.union.is_root(slot) {
                continue;
            }
            report.active_roots += 1;
            let rep = self.sets.pixel_of_slot(slot);
            let mut seen: AHashSet<usize> = AHashSet::with_capacity(self.adjacent[slot].len());
            report.half_edges += self.adjacent[slot].len();

            for neighbor_rep in self.adjacent[slot].iter() {
                if neighbor_rep == rep {
                    report.self_loops += 1;
                    continue;
                }
                if !seen.insert(neighbor_rep) {
                    report.duplicate_neighbors += 1;
                }
                let slot_n = self.sets.slot_of_pixel(neighbor_rep);
                if !self.union.is_root(slot_n) || !self.sets.is_active_slot(slot_n) {
                    report.non_root_neighbors += 1;
                    continue;
                }
                if !self.adjacent[slot_n].contains(rep) {
                    report.asymmetric_edges += 1;
                }
            }
        }
        report
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub active_roots: usize,
    pub half_edges: usize,
    pub self_loops: usize,
    pub duplicate_neighbors: usize,
    pub non_root_neighbors: usize,
    pub asymmetric_edges: usize,
}

impl ConsistencyReport {
    pub fn is_ok(&self) -> bool {
        self.self_loops == 0
            && self.duplicate_neighbors == 0
            && self.non_root_neighbors == 0
            && self.asymmetric_edges == 0
    }
}

impl<T: Copy + Eq> ZoneGraph for EagerZoneGraph<T> {
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
        for neighbor_rep in self.adjacent[root].iter() {
            emit(neighbor_rep);
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
        self.rewire_loser_into_winner(root_winner, winner_rep, loser_rep);
        self.unite(root_winner, root_loser);
        Ok(winner_rep)
    }

    fn merge_adjacent_candidates_in_place(
        &mut self,
        rep_base: usize,
        candidates: &mut Vec<usize>,
    ) -> Result<usize> {
        let root_base = self.root_of_rep(rep_base)?;
        let base_rep = self.sets.pixel_of_slot(root_base);

        // Canonicalize the candidates, then keep those actually adjacent to
        // the base; the smallest pixel among survivors and base wins.
        let mut losers = std::mem::take(&mut self.scratch_candidates);
        losers.clear();
        for &rep in candidates.iter() {
            let root = self.root_of_rep(rep)?;
            if root == root_base {
                continue;
            }
            losers.push(self.sets.pixel_of_slot(root));
        }
        let adj_base = &self.adjacent[root_base];
        losers.retain(|&rep| adj_base.contains(rep));

        let mut winner_rep = base_rep;
        for &rep in &losers {
            winner_rep = winner_rep.min(rep);
        }
        if winner_rep != base_rep {
            losers.push(base_rep);
        }
        let slot_winner = self.sets.slot_of_pixel(winner_rep);

        for position in 0..losers.len() {
            let loser_rep = losers[position];
            if loser_rep == winner_rep {
                continue;
            }
            // Duplicate candidates collapse onto the winner after the first
            // merge; skip them.
            let slot_loser = self.sets.slot_of_pixel(loser_rep);
            if self.union.find(slot_loser) == self.union.find(slot_winner) {
                continue;
            }
            self.rewire_loser_into_winner(slot_winner, winner_rep, loser_rep);
            self.unite(slot_winner, slot_loser);
        }

        losers.clear();
        self.scratch_candidates = losers;

        // Contract: candidates keeps the unmerged entries plus the winner,
        // exactly once.
        let winner_root = self.union.find(slot_winner);
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
        let slot_winner = self.sets.slot_of_pixel(winner_rep);

        for &rep in bases {
            let root = self.root_of_rep(rep)?;
            if root == self.union.find(slot_winner) {
                continue;
            }
            let loser_rep = self.sets.pixel_of_slot(root);
            self.rewire_loser_into_winner(slot_winner, winner_rep, loser_rep);
            self.unite(slot_winner, root);
        }

        self.merge_adjacent_candidates_in_place(winner_rep, candidates)
    }

    fn num_edges(&self) -> Option<usize> {
        let half_edges: usize = self.adjacent.iter().map(|list| list.len()).sum();
        Some(half_edges / 2)
    }

    fn average_degree(&self) -> Option<f64> {
        let half_edges: usize = self.adjacent.iter().map(|list| list.len()).sum();
        Some(half_edges as f64 / self.num_active_zones() as f64)
    }
}
