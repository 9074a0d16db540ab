//! # Domain Layer (Inner Hexagon)
//!
//! Pure bridge concepts: contexts, messages, traps, keys and resource
//! accounting. No storage and no interpreter access happens here.

pub mod context;
pub mod keys;
pub mod messages;
pub mod resources;
pub mod trap;

pub use context::*;
pub use keys::*;
pub use messages::*;
pub use resources::*;
pub use trap::*;
