// src/learner/mod.rs — Prompt revision between iterations

pub mod reviser;

pub use reviser::{Revision, Reviser};
