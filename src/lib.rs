//! Flat-zone graphs for morphological component-tree adjustment.
//!
//! A grayscale image decomposes into *flat zones*: maximal connected regions
//! of constant value. This crate builds and maintains the graph of adjacency
//! between those zones while they are merged, which is the substrate
//! component-tree construction and pruning algorithms operate on.
//!
//! Two interchangeable strategies implement the [`ZoneGraph`] surface:
//! - [`EagerZoneGraph`] materializes every neighbour list at construction and
//!   rewires them on merge; queries are straight reads.
//! - [`OnDemandZoneGraph`] stores only each zone's border pixels and computes
//!   adjacency per query, refiltering stale border entries incrementally
//!   after merges.
//!
//! Both share the same engine underneath: a dense pixel-set manager with
//! circular membership lists spliced in O(1), and a union-find over zone
//! slots whose winners are elected by smallest representative pixel.
//!
//! ```
//! use zonegraph::{EagerZoneGraph, Image, ZoneGraph};
//!
//! # fn main() -> zonegraph::Result<()> {
//! let image = Image::from_rows_array([[0u8, 0, 1], [0, 1, 1], [1, 1, 1]]);
//! let mut graph = EagerZoneGraph::new(image, 1.0)?;
//! assert_eq!(graph.num_zones(), 2);
//!
//! let winner = graph.merge_zones(0, 2)?;
//! assert_eq!(winner, 0);
//! assert_eq!(graph.find_representative(2)?, 0);
//! # Ok(())
//! # }
//! ```

pub mod adjacency;
pub mod adjacent_set;
pub mod eager;
pub mod error;
mod flood;
pub mod graph;
pub mod image;
pub mod on_demand;
pub mod pixel_sets;
pub mod queue;
pub mod stamp;
pub mod union_find;

pub use crate::{
    adjacency::AdjacencyRelation,
    eager::EagerZoneGraph,
    error::{Error, Result},
    graph::ZoneGraph,
    image::{Image, ImageU8},
    on_demand::OnDemandZoneGraph,
};
