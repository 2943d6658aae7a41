//! Plain in-memory containers backing sources, cloners and sort-aware
//! operators.

pub mod indexed;
pub mod keyed;
pub mod sorted;

pub use indexed::IndexedStore;
pub use keyed::KeyedStore;
pub use sorted::{Comparator, SortedStore};
