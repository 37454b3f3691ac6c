//! `DataRegister` and `ScanRegister`: the two leaf node kinds, and the
//! synchronous key-register primitive [`mux`](super::mux) uses internally.
//!
//! Both leaf kinds queue a requested value locally, then on the next
//! [`crate::topology::Topology::apply_node`] pass hand it to their parent as
//! one [`Rvf`] across their [`crate::interface::AccessInterface`] client
//! edge. `DataRegister` speaks `WRITE`/`READ`/`WRITE_READ`; `ScanRegister`
//! speaks the scan-chain equivalents `SCAN`/`CAPSCAN`. The two protocols
//! differ only in which [`Command`] pair they use, so [`Op`] — "plain" or
//! "capturing" — is the one axis this module actually branches on.

use parking_lot::Mutex;

use crate::bitvector::BitVector;
use crate::description::RegisterDescription;
use crate::error::{Result, ScanModelError};
use crate::rvf::{Command, Rvf};
use crate::topology::Topology;
use crate::NodeId;

/// Whether a register accepts writes, reads, or both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Only [`write`]/[`write_read`] are permitted.
    WriteOnly,
    /// Only [`read`] is permitted.
    ReadOnly,
    /// Both are permitted.
    ReadWrite,
}

/// Which wire protocol a register's requests use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafProtocol {
    /// `WRITE` / `READ` / `WRITE_READ` — `DataRegister`.
    Data,
    /// `SCAN` / `CAPSCAN` — `ScanRegister`.
    Scan,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    /// Drive a new value in; no prior value is captured.
    Plain,
    /// Drive a new value in and capture the value shifted out ahead of it.
    Capturing,
}

struct Inner {
    value: BitVector,
    read_value: Option<BitVector>,
    queued: Option<Op>,
    awaiting: bool,
}

/// Runtime state for a `DataRegister` or `ScanRegister` node.
pub struct RegisterState {
    pub(crate) description: RegisterDescription,
    pub(crate) direction: Direction,
    pub(crate) protocol: LeafProtocol,
    inner: Mutex<Inner>,
}

impl RegisterState {
    /// Builds a register initialized to its description's safe value, with
    /// nothing queued and no captured value yet.
    pub fn new(description: RegisterDescription, direction: Direction, protocol: LeafProtocol) -> Self {
        let value = description.safe_value().clone();
        RegisterState {
            description,
            direction,
            protocol,
            inner: Mutex::new(Inner {
                value,
                read_value: None,
                queued: None,
                awaiting: false,
            }),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        let inner = self.inner.lock();
        inner.queued.is_some() || inner.awaiting
    }
}

fn queue(topology: &Topology, id: NodeId, value: BitVector, op: Op) -> Result<()> {
    let name = topology.name(id);
    let (direction, reg_length) = topology.with_register(id, |r| (r.direction, r.description.reg_length()))?;
    if direction == Direction::ReadOnly {
        return Err(ScanModelError::WriteToReadOnly(name));
    }
    if value.len() != reg_length {
        return Err(ScanModelError::LengthMismatch {
            name,
            expected: reg_length,
            actual: value.len(),
        });
    }
    topology.with_register(id, |r| {
        let mut inner = r.inner.lock();
        inner.value = value.clone();
        inner.queued = Some(op);
    })?;
    topology.mark_pending();
    Ok(())
}

/// Queues `value` to be written with no captured response (`WRITE`/`SCAN`).
pub fn write(topology: &Topology, id: NodeId, value: BitVector) -> Result<()> {
    queue(topology, id, value, Op::Plain)
}

/// Queues `value` to be written, capturing the value shifted out ahead of
/// it; the captured value becomes visible through [`read`] once the
/// response has been processed (`WRITE_READ`/`CAPSCAN`).
pub fn write_read(topology: &Topology, id: NodeId, value: BitVector) -> Result<()> {
    queue(topology, id, value, Op::Capturing)
}

/// Returns the most recently captured value.
///
/// Fails with [`ScanModelError::ReadFromWriteOnly`] if this register never
/// permits reads, or [`ScanModelError::NotSynchronized`] if no capturing
/// access has completed yet.
pub fn read(topology: &Topology, id: NodeId) -> Result<BitVector> {
    let name = topology.name(id);
    let direction = topology.with_register(id, |r| r.direction)?;
    if direction == Direction::WriteOnly {
        return Err(ScanModelError::ReadFromWriteOnly(name));
    }
    topology
        .with_register(id, |r| r.inner.lock().read_value.clone())?
        .ok_or(ScanModelError::NotSynchronized(name))
}

/// If a value is queued, dispatches it across this register's client edge.
/// The access was already marked pending by [`write`]/[`write_read`]; this
/// only performs the dispatch, it does not mark a second time.
pub fn apply(topology: &Topology, id: NodeId) -> Result<()> {
    let dispatch = topology.with_register(id, |r| {
        let mut inner = r.inner.lock();
        inner.queued.take().map(|op| {
            inner.awaiting = true;
            (op, inner.value.clone())
        })
    })?;
    let Some((op, value)) = dispatch else {
        return Ok(());
    };
    let protocol = topology.with_register(id, |r| r.protocol)?;
    let command = match (protocol, op) {
        (LeafProtocol::Data, Op::Plain) => Command::Write,
        (LeafProtocol::Data, Op::Capturing) => Command::WriteRead,
        (LeafProtocol::Scan, Op::Plain) => Command::Scan,
        (LeafProtocol::Scan, Op::Capturing) => Command::CapScan,
    };
    let name = topology.name(id);
    let iface = topology
        .client_interface(id)
        .ok_or_else(|| ScanModelError::NotWired(name))?;
    iface.request(Rvf::new(id, command, value));
    Ok(())
}

/// Processes the response to a previously dispatched request.
pub fn resp_handler(topology: &Topology, id: NodeId, rvf: Rvf) -> Result<()> {
    topology.with_register(id, |r| {
        let mut inner = r.inner.lock();
        if matches!(rvf.command, Command::WriteRead | Command::CapScan) {
            inner.read_value = Some(rvf.payload.clone());
        }
        inner.awaiting = false;
    })?;
    topology.clear_pending();
    Ok(())
}

/// Reads a register's current committed value without involving the
/// request/response machinery above.
///
/// Used only by [`super::mux`] to inspect a key register: a mux's key
/// register is not itself wired onto the scan chain (nothing ever selects
/// it), so the mux reads and writes it as a plain local value rather than
/// issuing it a request the way a real child would receive one.
pub(crate) fn peek(topology: &Topology, id: NodeId) -> Result<BitVector> {
    topology.with_register(id, |r| r.inner.lock().value.clone())
}

/// Synchronously overwrites a key register's value, bypassing the
/// queue/dispatch cycle [`write`] goes through. See [`peek`].
pub(crate) fn poke(topology: &Topology, id: NodeId, value: BitVector) -> Result<()> {
    topology.with_register(id, |r| r.inner.lock().value = value)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::description::RegisterDescription;

    fn fresh_topology_with_leaf(
        direction: Direction,
        protocol: LeafProtocol,
    ) -> (Topology, NodeId, NodeId) {
        let topology = Topology::new();
        let root = topology.define_data_register(
            RegisterDescription::new("root", 4, BitVector::zeros(4)).unwrap(),
            Direction::ReadWrite,
        );
        let child = match protocol {
            LeafProtocol::Data => topology.define_data_register(
                RegisterDescription::new("leaf", 4, BitVector::zeros(4)).unwrap(),
                direction,
            ),
            LeafProtocol::Scan => topology.define_scan_register(
                RegisterDescription::new("leaf", 4, BitVector::zeros(4)).unwrap(),
                direction,
            ),
        };
        topology.wire_children(root, &[child]).unwrap();
        topology.set_root(root).unwrap();
        (topology, root, child)
    }

    #[test_case(Direction::WriteOnly; "write only")]
    #[test_case(Direction::ReadWrite; "read write")]
    fn write_then_apply_dispatches_a_request(direction: Direction) {
        let (topology, _root, leaf) = fresh_topology_with_leaf(direction, LeafProtocol::Data);
        write(&topology, leaf, BitVector::from_u64(0b1010, 4)).unwrap();
        assert!(topology.with_register(leaf, |r| r.is_pending()).unwrap());
        apply(&topology, leaf).unwrap();
    }

    #[test]
    fn write_rejects_read_only() {
        let (topology, _root, leaf) = fresh_topology_with_leaf(Direction::ReadOnly, LeafProtocol::Data);
        let err = write(&topology, leaf, BitVector::zeros(4)).unwrap_err();
        assert!(matches!(err, ScanModelError::WriteToReadOnly(_)));
    }

    #[test]
    fn read_before_sync_is_an_error() {
        let (topology, _root, leaf) = fresh_topology_with_leaf(Direction::ReadWrite, LeafProtocol::Data);
        let err = read(&topology, leaf).unwrap_err();
        assert!(matches!(err, ScanModelError::NotSynchronized(_)));
    }

    #[test]
    fn resp_handler_populates_read_value_only_for_capturing_ops() {
        let (topology, _root, leaf) = fresh_topology_with_leaf(Direction::ReadWrite, LeafProtocol::Data);
        resp_handler(&topology, leaf, Rvf::new(leaf, Command::WriteRead, BitVector::from_u64(5, 4))).unwrap();
        assert_eq!(read(&topology, leaf).unwrap(), BitVector::from_u64(5, 4));
    }

    #[test]
    fn peek_and_poke_bypass_the_queue() {
        let (topology, _root, leaf) = fresh_topology_with_leaf(Direction::ReadWrite, LeafProtocol::Data);
        poke(&topology, leaf, BitVector::from_u64(9, 4)).unwrap();
        assert_eq!(peek(&topology, leaf).unwrap(), BitVector::from_u64(9, 4));
        assert!(!topology.with_register(leaf, |r| r.is_pending()).unwrap());
    }
}
