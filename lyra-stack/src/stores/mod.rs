//! Stack store implementations

pub mod local;

pub use local::LocalStackStore;
