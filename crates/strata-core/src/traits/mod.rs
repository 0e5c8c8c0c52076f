//! Collaborator traits consumed by the engine.

mod compressor;
mod embedder;

pub use compressor::*;
pub use embedder::*;
