//! Reactive observable collections: keyed caches and ordered lists whose
//! mutations are published as structured change sets to subscribers, and
//! which compose through an operator algebra (filter, transform, sort,
//! group, join, aggregate, paginate, expire, buffer) into derived
//! reactive collections.
//!
//! # Basic usage
//!
//! ```rust
//! use reactive_collections::cache::SourceCache;
//!
//! #[derive(Clone)]
//! struct Person {
//!     name: &'static str,
//!     age: u32,
//! }
//!
//! let people: SourceCache<&str, Person> = SourceCache::new(|p: &Person| p.name);
//! people
//!     .edit(|w| {
//!         w.add_or_update(Person { name: "Alice", age: 30 });
//!         Ok::<_, std::convert::Infallible>(())
//!     })
//!     .unwrap();
//! assert_eq!(people.count(), 1);
//! ```
//!
//! Every mutation to a [`cache::SourceCache`] or [`list::SourceList`] is
//! published as a [`change_set::ChangeSet`]/[`change_set::ListChangeSet`] to
//! anyone who calls `connect()`; operators under [`operator`] consume that
//! stream and produce a derived one, and [`materialize`] turns a derived
//! stream back into an owned, queryable collection.

pub mod binding;
pub mod cache;
pub mod change;
pub mod change_set;
pub mod connect;
pub mod contracts;
pub mod disposable;
pub mod error;
pub mod list;
pub mod list_change;
pub mod materialize;
pub mod operator;
pub mod reducer;
pub mod scheduler;
pub mod store;
pub mod subject;

pub use crate::{
    cache::SourceCache,
    change::Change,
    change_set::{ChangeSet, ListChangeSet},
    list::SourceList,
    list_change::ListChange,
};
