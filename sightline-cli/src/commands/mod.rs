//! Subcommand implementations.

pub mod compare;
pub mod fingerprint;
pub mod priority;
pub mod quota;
pub mod recognize;
