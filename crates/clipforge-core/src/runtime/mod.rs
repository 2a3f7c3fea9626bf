//! Task runtime: planning, state tracking and execution of clip pipelines.

pub mod executor;
pub mod orchestrator;
pub mod pipeline;
pub mod storage;
pub mod types;

#[cfg(test)]
mod tests;
