//! Connected player tracking and event delivery

pub mod registry;

pub use registry::{Player, PlayerRegistry};
