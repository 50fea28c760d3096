//! Model lifecycle and the compute-resource contract.
//!
//! [`manager::ModelManager`] owns the single heavyweight pipeline: it loads
//! it once in the background, reports its state without blocking, and
//! forwards inference calls once it is ready. Pipelines plug in through the
//! [`pipeline::PipelineLoader`] and [`pipeline::Pipeline`] traits;
//! [`procedural`] provides the built-in deterministic renderer.

pub mod config;
pub mod manager;
pub mod parallelism;
pub mod pipeline;
pub mod procedural;
