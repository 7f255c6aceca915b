// Campaign-health signals and trade classification. Pure functions, no I/O.

pub mod engine;
pub mod trade;
