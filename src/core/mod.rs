//! Core type definitions, error taxonomy, and kernel-wide constants

pub mod constants;
pub mod error;
pub mod rng;
pub mod types;
