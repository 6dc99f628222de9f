// Allow pre-existing clippy lints across the codebase
#![allow(
    clippy::collapsible_if,
    clippy::len_without_is_empty,
    clippy::doc_lazy_continuation,
    clippy::empty_line_after_doc_comments,
    clippy::needless_range_loop
)]

/// Use mimalloc as the global allocator for all binaries.
/// Sorting allocates one small Vec per line; mimalloc's thread-local
/// caches keep that cheap across the worker threads.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod common;
pub mod sort;
