//! Vector similarity index.

mod index;

pub use index::{RebuildStats, VectorIndex};
