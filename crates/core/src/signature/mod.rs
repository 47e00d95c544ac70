//! Declarative descriptions of on-screen conditions.
//!
//! A [`Signature`] names something the recognition host can look for: a text
//! pattern or a named visual feature, optionally restricted to a [`Region`].
//! Hits are reported as absolute [`Location`] boxes.

mod types;

pub use types::{Location, Offset, Pattern, Region, Signature};
