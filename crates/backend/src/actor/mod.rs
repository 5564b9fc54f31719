//! Actor-based concurrency primitives
//!
//! Each pipeline stage runs as its own task and owns its state. Stages talk
//! only through bounded `mpsc` channels, so the flusher's buffer and shard id
//! are plain fields rather than shared, locked state.
//!
//! # Streaming Pipeline
//!
//! ```text
//! Sequencer → Evaluators → Router → Flusher
//!                               └→ Reporter
//! ```
//!
//! See [`pipeline::PipelineConfig`] for configuration and [`message`] for the
//! message types.

pub mod message;
pub mod pipeline;

#[cfg(test)]
mod __tests__;
