//! Tailoring pipeline: Extraction → Scoring → Transformation.
//!
//! Every stage builds a prompt, makes exactly one model call through `ModelInvoker`,
//! and decodes the reply into a validated type. A stage failure ends the run.

pub mod cleaner;
pub mod decoder;
pub mod error;
pub mod extraction;
pub mod handlers;
pub mod prompts;
pub mod scoring;
pub mod sequencer;
pub mod stage;
pub mod transformation;

pub use sequencer::StageSequencer;
