//! Immutable metadata describing a node, separate from the runtime state
//! [`crate::topology::Topology`] wires it into.
//!
//! Splitting a typed description schema from the runtime assembly mirrors
//! how a chip family's static description (pins, memory map, cores) is kept
//! apart from the runtime session that attaches to one: the description is
//! built once, validated, and then never mutated again.

mod base;
mod mux;
mod network;
mod register;
mod tap;

pub use base::AssemblyDescription;
pub use mux::{MuxDescription, MuxEntry};
pub use network::NetworkDescription;
pub use register::RegisterDescription;
pub use tap::TapDescription;
