/// Fork of https://raw.githubusercontent.com/tov/disjoint-sets-rs/master/src/array.rs
/// License: https://github.com/tov/disjoint-sets-rs/blob/master/LICENSE-MIT
///
/// Trimmed to a parents-only forest over zone slots: merges always elect a
/// winner (smallest representative pixel, or the caller's choice), so there
/// is no union by rank; the winner's root stays the root.

#[derive(Debug, Clone)]
pub struct UnionFind {
    parents: Vec<usize>,
}

impl UnionFind {
    pub fn new(size: usize) -> Self {
        UnionFind {
            parents: (0..size).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn is_root(&self, element: usize) -> bool {
        self.parents[element] == element
    }

    /// Attaches the set rooted at `loser` under the set rooted at `winner`.
    /// Both arguments must be roots.
    pub fn union_into(&mut self, winner: usize, loser: usize) {
        debug_assert!(self.is_root(winner));
        debug_assert!(self.is_root(loser));
        debug_assert_ne!(winner, loser);
        self.parents[loser] = winner;
    }

    /// Finds the representative of the given element's set. Iterative, with
    /// path halving, so pathological chains cannot exhaust the stack.
    /// https://en.wikipedia.org/wiki/Disjoint-set_data_structure#Finding_set_representatives
    pub fn find(&mut self, mut element: usize) -> usize {
        let mut parent = self.parents[element];
        while element != parent {
            let grandparent = self.parents[parent];
            self.parents[element] = grandparent;
            element = parent;
            parent = grandparent;
        }
        element
    }

    pub fn count_roots(&self) -> usize {
        self.parents
            .iter()
            .enumerate()
            .filter(|&(element, &parent)| element == parent)
            .count()
    }
}

#[cfg(test)]
mod test {
    use crate::union_find::UnionFind;

    #[test]
    fn union_into_keeps_the_winner_as_root() {
        let mut forest = UnionFind::new(5);
        assert_eq!(forest.count_roots(), 5);

        forest.union_into(2, 4);
        forest.union_into(2, 0);
        assert_eq!(forest.find(4), 2);
        assert_eq!(forest.find(0), 2);
        assert_eq!(forest.find(2), 2);
        assert_eq!(forest.count_roots(), 3);
        assert!(forest.is_root(2));
        assert!(!forest.is_root(4));
    }

    #[test]
    fn find_compresses_long_chains() {
        let n = 10_000;
        let mut forest = UnionFind::new(n);
        // Worst-case chain 0 <- 1 <- 2 <- ...
        for element in 1..n {
            forest.union_into(element, element - 1);
        }
        assert_eq!(forest.find(0), n - 1);
        assert_eq!(forest.find(0), n - 1);
        assert_eq!(forest.count_roots(), 1);
    }
}
