//! Descriptor transport.
//!
//! A [`Fetcher`] turns a URL into descriptor text. The registry only sees
//! the trait, so tests swap in [`MemoryFetcher`] while the shell binary uses
//! [`HttpFetcher`].

pub mod fetch;

pub use fetch::{Fetcher, HttpFetcher, MAX_DESCRIPTOR_SIZE, MemoryFetcher};
