//! Utility modules for Quarry.

pub mod distance;
