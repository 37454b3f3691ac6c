//! `PortalRegister`: a leaf register reached through a two-phase
//! addressing handshake — an `ADDRESS` request establishing which bus
//! location the next data transaction targets, followed by the ordinary
//! `WRITE`/`WRITE_READ`.
//!
//! A naive rendezvous on this handshake (wait on a condition variable
//! without holding its paired mutex) can lose a notification fired between
//! the unlock and the wait. This module avoids that entirely with an
//! explicit two-state machine ([`Phase`]) driven by [`apply`] and
//! [`resp_handler`]: there is no wait to race, because nothing ever blocks.

use parking_lot::Mutex;

use crate::bitvector::BitVector;
use crate::description::RegisterDescription;
use crate::error::{Result, ScanModelError};
use crate::rvf::{Command, Rvf};
use crate::topology::Topology;
use crate::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Plain,
    Capturing,
}

enum Phase {
    Idle,
    AwaitingAddressAck(Op, BitVector),
    AwaitingDataAck(Op),
}

struct Inner {
    value: BitVector,
    read_value: Option<BitVector>,
    queued: Option<Op>,
    phase: Phase,
}

/// Runtime state for a `PortalRegister` node.
pub struct PortalState {
    pub(crate) description: RegisterDescription,
    /// This register's fixed address on the shared bus its parent fronts.
    address: BitVector,
    inner: Mutex<Inner>,
}

impl PortalState {
    /// Builds a portal register at `address`, initialized to its
    /// description's safe value.
    pub fn new(description: RegisterDescription, address: BitVector) -> Self {
        let value = description.safe_value().clone();
        PortalState {
            description,
            address,
            inner: Mutex::new(Inner {
                value,
                read_value: None,
                queued: None,
                phase: Phase::Idle,
            }),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        !matches!(self.inner.lock().phase, Phase::Idle)
    }
}

fn queue(topology: &Topology, id: NodeId, value: BitVector, op: Op) -> Result<()> {
    let name = topology.name(id);
    let reg_length = topology.with_portal(id, |p| p.description.reg_length())?;
    if value.len() != reg_length {
        return Err(ScanModelError::LengthMismatch {
            name,
            expected: reg_length,
            actual: value.len(),
        });
    }
    topology.with_portal(id, |p| {
        let mut inner = p.inner.lock();
        inner.value = value.clone();
        inner.queued = Some(op);
    })?;
    topology.mark_pending();
    Ok(())
}

/// Queues a plain write through the address-then-data handshake.
pub fn write(topology: &Topology, id: NodeId, value: BitVector) -> Result<()> {
    queue(topology, id, value, Op::Plain)
}

/// Queues a capturing write-read through the address-then-data handshake.
pub fn write_read(topology: &Topology, id: NodeId, value: BitVector) -> Result<()> {
    queue(topology, id, value, Op::Capturing)
}

/// Returns the most recently captured value, or
/// [`ScanModelError::NotSynchronized`] if the handshake has not completed a
/// capturing transaction yet.
pub fn read(topology: &Topology, id: NodeId) -> Result<BitVector> {
    let name = topology.name(id);
    topology
        .with_portal(id, |p| p.inner.lock().read_value.clone())?
        .ok_or(ScanModelError::NotSynchronized(name))
}

/// Advances the handshake: begins the address phase if a write is queued
/// and the register is idle. The data phase is driven entirely from
/// [`resp_handler`] once the address ack arrives. [`write`]/[`write_read`]
/// already marked this access pending; the address phase dispatched here
/// reuses that mark rather than adding a second one.
pub fn apply(topology: &Topology, id: NodeId) -> Result<()> {
    let dispatch = topology.with_portal(id, |p| {
        let mut inner = p.inner.lock();
        if !matches!(inner.phase, Phase::Idle) {
            return None;
        }
        inner.queued.take().map(|op| {
            let value = inner.value.clone();
            inner.phase = Phase::AwaitingAddressAck(op, value);
        })
    })?;
    if dispatch.is_none() {
        return Ok(());
    }
    let address = topology.with_portal(id, |p| p.address.clone())?;
    let name = topology.name(id);
    let iface = topology
        .client_interface(id)
        .ok_or_else(|| ScanModelError::NotWired(name))?;
    iface.request(Rvf::new(id, Command::Address, address));
    Ok(())
}

/// Processes either leg of the handshake: the `ADDRESS` ack kicks off the
/// data phase, and the data response (`WRITE`/`WRITE_READ`) completes it.
pub fn resp_handler(topology: &Topology, id: NodeId, rvf: Rvf) -> Result<()> {
    if rvf.command == Command::Address {
        let next = topology.with_portal(id, |p| {
            let mut inner = p.inner.lock();
            match std::mem::replace(&mut inner.phase, Phase::Idle) {
                Phase::AwaitingAddressAck(op, value) => {
                    inner.phase = Phase::AwaitingDataAck(op);
                    Some((op, value))
                }
                other => {
                    inner.phase = other;
                    None
                }
            }
        })?;
        topology.clear_pending();
        let Some((op, value)) = next else {
            return Ok(());
        };
        let command = match op {
            Op::Plain => Command::Write,
            Op::Capturing => Command::WriteRead,
        };
        let name = topology.name(id);
        let iface = topology
            .client_interface(id)
            .ok_or_else(|| ScanModelError::NotWired(name))?;
        topology.mark_pending();
        iface.request(Rvf::new(id, command, value));
        return Ok(());
    }

    topology.with_portal(id, |p| {
        let mut inner = p.inner.lock();
        if matches!(inner.phase, Phase::AwaitingDataAck(_)) {
            if rvf.command == Command::WriteRead {
                inner.read_value = Some(rvf.payload.clone());
            }
            inner.phase = Phase::Idle;
        }
    })?;
    topology.clear_pending();
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn fresh(topology: &Topology) -> NodeId {
        let portal = topology.define_portal_register(
            RegisterDescription::new("bus_reg", 8, BitVector::zeros(8)).unwrap(),
            BitVector::from_u64(0x10, 8),
        );
        let root = topology.define_data_register(
            RegisterDescription::new("root", 1, BitVector::zeros(1)).unwrap(),
            crate::assembly::register::Direction::ReadWrite,
        );
        topology.wire_children(root, &[portal]).unwrap();
        portal
    }

    #[test]
    fn apply_begins_with_the_address_phase() {
        let topology = Topology::new();
        let portal = fresh(&topology);
        write(&topology, portal, BitVector::from_u64(0x55, 8)).unwrap();
        apply(&topology, portal).unwrap();
        assert!(topology.with_portal(portal, |p| p.is_pending()).unwrap());
    }

    #[test]
    fn address_ack_starts_the_data_phase() {
        let topology = Topology::new();
        let portal = fresh(&topology);
        write_read(&topology, portal, BitVector::from_u64(0x55, 8)).unwrap();
        apply(&topology, portal).unwrap();
        resp_handler(&topology, portal, Rvf::new(portal, Command::Address, BitVector::zeros(8))).unwrap();
        assert!(topology.with_portal(portal, |p| p.is_pending()).unwrap());
    }

    #[test]
    fn data_ack_completes_a_capturing_transaction() {
        let topology = Topology::new();
        let portal = fresh(&topology);
        write_read(&topology, portal, BitVector::from_u64(0x55, 8)).unwrap();
        apply(&topology, portal).unwrap();
        resp_handler(&topology, portal, Rvf::new(portal, Command::Address, BitVector::zeros(8))).unwrap();
        resp_handler(
            &topology,
            portal,
            Rvf::new(portal, Command::WriteRead, BitVector::from_u64(0xaa, 8)),
        )
        .unwrap();
        assert_eq!(read(&topology, portal).unwrap(), BitVector::from_u64(0xaa, 8));
        assert!(!topology.with_portal(portal, |p| p.is_pending()).unwrap());
    }
}
