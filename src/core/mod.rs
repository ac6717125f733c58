// src/core/mod.rs — Core iteration engine

pub mod combiner;
pub mod orchestrator;
pub mod policy;
pub mod prompts;
pub mod types;
