pub mod cache;
pub mod pattern;
pub mod variation;
