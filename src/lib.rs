//! pmctx
//!
//! Keeps every agent call of a multi-agent project-management assistant
//! inside its model's context window. See [`pmctx_core`] for the engine;
//! this crate re-exports it.

pub use pmctx_core::*;
