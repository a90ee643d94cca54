//! Diagram outputs. These are lossy projections of the model, so they only
//! generate.

pub mod dot;
pub mod graph;
pub mod markdown;
pub mod mermaid;

pub use graph::{DetailLevel, Graph};
