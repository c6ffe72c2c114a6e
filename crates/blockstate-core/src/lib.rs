//! blockstate Core - Shared primitives for reactive state blocks
//!
//! This crate defines the types used across the blockstate workspace:
//! - Field paths addressing a location inside a snapshot tree
//! - JSON tree helpers (patch merging, path assignment)
//! - Error and result types

pub mod error;
pub mod path;
pub mod tree;

pub use error::*;
pub use path::*;
pub use tree::*;
