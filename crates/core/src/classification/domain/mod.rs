pub mod classifier;
pub mod ranking;
