//! `I2CClient` and `ParallelToSerial`: node kinds with no implemented
//! `apply`/host-callback behavior. This module keeps them as real,
//! nameable node kinds — so a topology can still be built with one in it —
//! rather than silently omitting them or making them a silent no-op, which
//! would hide the gap instead of surfacing it.

use crate::error::{Result, ScanModelError};
use crate::rvf::Rvf;
use crate::topology::Topology;
use crate::NodeId;

/// Which unimplemented kind a [`super::NodeKind::Stub`] node stands in for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StubKind {
    /// `I2CClient`.
    I2cClient,
    /// `ParallelToSerial`.
    ParallelToSerial,
}

/// Runtime state for a stub node. Carries no mutable state of its own,
/// since nothing it does ever succeeds.
pub struct StubState {
    kind: StubKind,
}

impl StubState {
    /// Builds a stub node of the given kind.
    pub fn new(kind: StubKind) -> Self {
        StubState { kind }
    }

    pub(crate) fn kind_name(&self) -> &'static str {
        match self.kind {
            StubKind::I2cClient => "I2CClient",
            StubKind::ParallelToSerial => "ParallelToSerial",
        }
    }
}

fn not_implemented(topology: &Topology, id: NodeId, op: &'static str) -> ScanModelError {
    let kind = topology
        .with_stub(id, |s| s.kind_name())
        .unwrap_or("stub");
    ScanModelError::NotImplemented { kind, op }
}

/// A no-op: nothing ever marks a stub node pending, since neither
/// [`host_callback`] nor [`resp_handler`] below it ever succeeds.
pub fn apply(_topology: &Topology, _id: NodeId) -> Result<()> {
    Ok(())
}

/// Always fails: a stub node never accepts a request.
pub fn host_callback(topology: &Topology, id: NodeId, _rvf: Rvf) -> Result<()> {
    Err(not_implemented(topology, id, "host_callback"))
}

/// Always fails: a stub node never produces a response to route.
pub fn resp_handler(topology: &Topology, id: NodeId, _rvf: Rvf) -> Result<()> {
    Err(not_implemented(topology, id, "resp_handler"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_callback_reports_not_implemented() {
        let topology = Topology::new();
        let stub = topology.define_i2c_client("i2c1");
        let err = host_callback(&topology, stub, Rvf::new(stub, crate::rvf::Command::Write, crate::bitvector::BitVector::zeros(0))).unwrap_err();
        assert!(matches!(err, ScanModelError::NotImplemented { kind: "I2CClient", op: "host_callback" }));
    }
}
