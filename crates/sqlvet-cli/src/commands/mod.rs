//! CLI command implementations for sqlvet.

pub mod audit;
pub mod estimate;
pub mod exec;
pub mod fingerprint;
pub mod rules;
