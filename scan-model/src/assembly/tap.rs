//! The IEEE 1149.1 test access port: the one node kind with a fixed,
//! always-exactly-two-children shape — an instruction register and a
//! DR-side selector mux — and the node responsible for turning `SIR`/`SIRNC`
//! and `SDR`/`SDRNC` into the generic `SCAN`/`CAPSCAN` vocabulary the rest of
//! the tree speaks.

use parking_lot::Mutex;

use super::unknown_command;
use crate::bitvector::BitVector;
use crate::description::TapDescription;
use crate::error::{Result, ScanModelError};
use crate::rvf::{Command, Rvf};
use crate::topology::Topology;
use crate::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Ir,
    Dr,
}

struct Inner {
    queued: Option<(Side, Command, BitVector)>,
}

/// Runtime state for a TAP node.
pub struct TapState {
    pub(crate) description: TapDescription,
    inner: Mutex<Inner>,
}

impl TapState {
    /// Builds a TAP with nothing queued. [`crate::topology::Topology`]
    /// wires the instruction register and DR-mux children on right after
    /// construction.
    pub fn new(description: TapDescription) -> Self {
        TapState {
            description,
            inner: Mutex::new(Inner { queued: None }),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.inner.lock().queued.is_some()
    }
}

fn side_for(topology: &Topology, id: NodeId, child: NodeId) -> Option<Side> {
    let children = topology.children(id);
    if children.first() == Some(&child) {
        Some(Side::Ir)
    } else if children.get(1) == Some(&child) {
        Some(Side::Dr)
    } else {
        None
    }
}

/// Handles a request from the IR register or the DR-mux, queuing it for
/// [`apply`] to forward upward as `SIR`/`SIRNC`/`SDR`/`SDRNC`.
///
/// Rejects a second request arriving before the first has been dispatched:
/// from the same side this is [`ScanModelError::CompetingPaths`]; from the
/// other side it is [`ScanModelError::ScanModeConflict`], since a TAP cannot
/// shift its instruction and data registers in the same cycle.
pub fn host_callback(topology: &Topology, id: NodeId, rvf: Rvf) -> Result<()> {
    let child = rvf.uid;
    match rvf.command {
        Command::Scan | Command::CapScan => {
            let side = side_for(topology, id, child)
                .ok_or_else(|| ScanModelError::NotWired(topology.name(id)))?;
            let name = topology.name(id);
            topology.with_tap(id, |t| {
                let mut inner = t.inner.lock();
                match inner.queued.as_ref().map(|(s, _, _)| *s) {
                    Some(existing) if existing == side => Err(ScanModelError::CompetingPaths(name.clone())),
                    Some(_) => Err(ScanModelError::ScanModeConflict(name.clone())),
                    None => {
                        inner.queued = Some((side, rvf.command, rvf.payload.clone()));
                        Ok(())
                    }
                }
            })?
        }
        Command::ListCb => {
            // The textual command listing is `Topology::list_callbacks`; this
            // wire ack just confirms the command itself was understood.
            if let Some(iface) = topology.host_interface(id) {
                iface.response(Rvf::new(child, Command::ListCb, BitVector::zeros(0)));
            }
            Ok(())
        }
        other => Err(unknown_command(&topology.name(id), other)),
    }
}

/// If a request is queued, forwards it as `SIR`/`SIRNC` (IR side) or
/// `SDR`/`SDRNC` (DR side).
pub fn apply(topology: &Topology, id: NodeId) -> Result<()> {
    let dispatch = topology.with_tap(id, |t| t.inner.lock().queued.take())?;
    let Some((side, command, payload)) = dispatch else {
        return Ok(());
    };
    let outgoing = match (side, command) {
        (Side::Ir, Command::CapScan) => Command::Sir,
        (Side::Ir, Command::Scan) => Command::SirNc,
        (Side::Dr, Command::CapScan) => Command::Sdr,
        (Side::Dr, Command::Scan) => Command::SdrNc,
        _ => unreachable!("tap only ever queues Scan/CapScan"),
    };
    let name = topology.name(id);
    let iface = topology
        .client_interface(id)
        .ok_or_else(|| ScanModelError::NotWired(name))?;
    topology.mark_pending();
    iface.request(Rvf::new(id, outgoing, payload));
    Ok(())
}

/// Forwards the scan response back down to whichever side (IR or DR) most
/// recently requested across this TAP's host edge, translating the
/// controller's `SIR`/`SDR` vocabulary back to the generic `SCAN`.
pub fn resp_handler(topology: &Topology, id: NodeId, rvf: Rvf) -> Result<()> {
    let generic = match rvf.command {
        Command::Sir | Command::Sdr => Command::CapScan,
        Command::SirNc | Command::SdrNc => Command::Scan,
        other => other,
    };
    if let Some(iface) = topology.host_interface(id) {
        iface.response(Rvf::new(rvf.uid, generic, rvf.payload));
    }
    topology.clear_pending();
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::assembly::register::Direction;
    use crate::description::{MuxDescription, RegisterDescription};

    fn board() -> (Topology, NodeId, NodeId, NodeId) {
        let topology = Topology::new();
        let ir = topology.define_scan_register(
            RegisterDescription::new("ir", 4, BitVector::zeros(4)).unwrap(),
            Direction::ReadWrite,
        );
        let bypass = topology.define_data_register(
            RegisterDescription::new("bypass", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        let mut desc = MuxDescription::new("drmux", 4).unwrap();
        desc.add_entry(BitVector::from_u64(0, 4), None, bypass).unwrap();
        let drmux = topology.define_scan_mux(desc, ir).unwrap();
        topology.wire_children(drmux, &[bypass]).unwrap();
        let tap = topology
            .define_tap(TapDescription::new("u1", 4).unwrap(), ir, drmux)
            .unwrap();
        (topology, tap, ir, drmux)
    }

    #[test]
    fn ir_side_request_is_queued() {
        let (topology, tap, ir, _drmux) = board();
        host_callback(&topology, tap, Rvf::new(ir, Command::Scan, BitVector::zeros(4))).unwrap();
        assert!(topology.with_tap(tap, |t| t.is_pending()).unwrap());
    }

    #[test]
    fn ir_then_dr_in_one_cycle_is_scan_mode_conflict() {
        let (topology, tap, ir, drmux) = board();
        host_callback(&topology, tap, Rvf::new(ir, Command::Scan, BitVector::zeros(4))).unwrap();
        let err = host_callback(&topology, tap, Rvf::new(drmux, Command::Scan, BitVector::zeros(1))).unwrap_err();
        assert!(matches!(err, ScanModelError::ScanModeConflict(_)));
    }

    #[test]
    fn apply_translates_ir_scan_to_sir() {
        let (topology, tap, ir, _drmux) = board();
        host_callback(&topology, tap, Rvf::new(ir, Command::CapScan, BitVector::zeros(4))).unwrap();
        apply(&topology, tap).unwrap();
        assert!(!topology.with_tap(tap, |t| t.is_pending()).unwrap());
    }
}
