//! Domain types - core business entities
//!
//! The canonical types shared by the store, the pipeline and the CLI,
//! independent of persistence or display concerns.

pub mod config;
pub mod number;
