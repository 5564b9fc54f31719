//! Pure computation used by the pipeline stages.

pub mod primality;
