//! Utilities

pub mod metrics;
