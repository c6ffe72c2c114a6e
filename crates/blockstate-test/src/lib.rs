//! blockstate Test Harness - Tools for exercising blocks under test
//!
//! This crate provides:
//! - A deterministic deferred-callback host (timers without a runtime)
//! - Call recorders for handlers and settlement listeners
//! - Tracing setup for test binaries

pub mod deferred;
pub mod logging;
pub mod recorder;

pub use deferred::*;
pub use logging::*;
pub use recorder::*;
