pub mod distribution;
pub mod simplifier;
pub mod summary;
