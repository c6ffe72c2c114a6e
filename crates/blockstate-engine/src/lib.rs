//! blockstate Engine - Reactive state blocks
//!
//! This crate implements the block runtime:
//! - Schemas of constants, derived fields, value cells, field reducers,
//!   groups and nested blocks
//! - Tree resolution in declaration order
//! - Block factory and instances holding the current/previous snapshots
//! - Handlers with synchronous cascades and deferred updates
//! - Handler composition and path watches

pub mod block;
pub mod handler;
pub mod instance;
pub mod leaf;
pub mod resolve;
pub mod schema;

pub use block::*;
pub use handler::*;
pub use instance::*;
pub use leaf::*;
pub use resolve::*;
pub use schema::*;

pub use blockstate_core::*;
