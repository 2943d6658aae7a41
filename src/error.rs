//! Error types raised by sources and operators.
//!
//! None of these wrap a third-party error type, so plain `derive_more`
//! boilerplate (matching the rest of the workspace's hand-rolled error
//! enums) is enough; no `failure`/`std::error::Error` trait objects are
//! needed anywhere in this crate.

use derive_more::Display;

/// Raised by [`crate::cache::SourceCache::edit`] when the mutator closure
/// returns an error and the source's [`crate::cache::ErrorPolicy`] is
/// [`crate::cache::ErrorPolicy::SurfaceToCaller`].
///
/// Wraps the caller-supplied error type `E` unchanged; it exists only to
/// give `edit()` call sites a name to match on alongside
/// [`ListMutationError`].
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[display(fmt = "edit mutator failed: {_0}")]
pub struct CacheMutationError<E>(pub E);

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for CacheMutationError<E> {}

/// Raised by [`crate::list::SourceList::edit`] when a positional mutation
/// is out of bounds; the whole transaction aborts without emitting a
/// change set.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ListMutationError<E> {
    /// `remove_at` / `remove_range` / `refresh_at` / `replace_at` was
    /// called with an index outside the current bounds of the list.
    #[display(fmt = "index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// The offending index.
        index: usize,
        /// The list's length at the time of the call.
        len: usize,
    },
    /// The mutator closure itself returned an error.
    #[display(fmt = "edit mutator failed: {_0}")]
    Mutator(E),
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for ListMutationError<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_are_human_readable() {
        assert_eq!(
            ListMutationError::<()>::IndexOutOfRange { index: 5, len: 2 }.to_string(),
            "index 5 out of range (len 2)"
        );
    }
}
