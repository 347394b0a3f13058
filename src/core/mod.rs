//! Core application primitives (run state, shutdown)

pub mod runtime;
pub mod shutdown;

pub use runtime::*;
pub use shutdown::*;
