//! Core primitives: tick time and fixed-point share math

pub mod shares;
pub mod time;
