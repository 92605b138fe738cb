pub mod cluster;
pub mod placement;

// Re-export cluster types
pub use cluster::*;
// Re-export placement types
pub use placement::*;
