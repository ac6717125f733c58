// src/lib.rs — Library root for chartsmith

pub mod cache;
pub mod chart;
pub mod clarifier;
pub mod cli;
pub mod core;
pub mod evaluator;
pub mod infra;
pub mod learner;
pub mod provider;
pub mod util;
