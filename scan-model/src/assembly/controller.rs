//! `JTAGControllerAssembly`: the root node adapting a real (or simulated)
//! [`crate::driver::JtagController`] into the tree.
//!
//! Unlike every other internal node kind, a controller never forwards a
//! request further up — it IS the top of the tree — so it answers its
//! single child synchronously from [`host_callback`] instead of queuing
//! anything for [`apply`] to dispatch later.

use std::sync::Arc;

use super::unknown_command;
use crate::bitvector::BitVector;
use crate::driver::JtagController;
use crate::error::Result;
use crate::rvf::{Command, Rvf};
use crate::topology::Topology;
use crate::NodeId;

/// Runtime state for a `JTAGControllerAssembly` node.
pub struct ControllerState {
    driver: Arc<dyn JtagController>,
}

impl ControllerState {
    /// Builds a controller adapter around `driver`.
    pub fn new(driver: Arc<dyn JtagController>) -> Self {
        ControllerState { driver }
    }

    pub(crate) fn is_pending(&self) -> bool {
        false
    }
}

fn respond(topology: &Topology, id: NodeId, child: NodeId, command: Command, payload: BitVector) {
    if let Some(iface) = topology.host_interface(id) {
        iface.response(Rvf::new(child, command, payload));
    }
}

/// Performs one `SIR`/`SIRNC`/`SDR`/`SDRNC` scan against the underlying
/// driver and answers immediately; `SIRNC`/`SDRNC` still perform the scan
/// but the captured response is thrown away, returning an all-zero response
/// instead of the driver's real `tdo`.
pub fn host_callback(topology: &Topology, id: NodeId, rvf: Rvf) -> Result<()> {
    match rvf.command {
        Command::Sir | Command::SirNc => {
            let len = rvf.payload.len();
            let driver = topology.with_controller(id, |c| Arc::clone(&c.driver))?;
            let tdo = driver.scan_ir(len, &rvf.payload.to_hex());
            let payload = if rvf.command == Command::SirNc {
                BitVector::zeros(len)
            } else {
                BitVector::from_hex(&tdo, len)?
            };
            respond(topology, id, rvf.uid, rvf.command, payload);
            Ok(())
        }
        Command::Sdr | Command::SdrNc => {
            let len = rvf.payload.len();
            let driver = topology.with_controller(id, |c| Arc::clone(&c.driver))?;
            let tdo = driver.scan_dr(len, &rvf.payload.to_hex());
            let payload = if rvf.command == Command::SdrNc {
                BitVector::zeros(len)
            } else {
                BitVector::from_hex(&tdo, len)?
            };
            respond(topology, id, rvf.uid, rvf.command, payload);
            Ok(())
        }
        Command::ListCb => {
            // The textual command listing is `Topology::list_callbacks`; this
            // wire ack just confirms the command itself was understood.
            respond(topology, id, rvf.uid, Command::ListCb, BitVector::zeros(0));
            Ok(())
        }
        other => Err(unknown_command(&topology.name(id), other)),
    }
}

/// A controller never has anything of its own to forward; it always
/// answers synchronously from [`host_callback`].
pub fn apply(_topology: &Topology, _id: NodeId) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::driver::LoopbackController;

    fn board() -> (Topology, NodeId, NodeId) {
        let topology = Topology::new();
        let tap_stub = topology.define_data_register(
            crate::description::RegisterDescription::new("stub", 4, BitVector::zeros(4)).unwrap(),
            crate::assembly::register::Direction::ReadWrite,
        );
        let controller = topology
            .define_jtag_controller_assembly("jc1", Arc::new(LoopbackController), tap_stub)
            .unwrap();
        (topology, controller, tap_stub)
    }

    #[test]
    fn sir_round_trips_through_loopback() {
        let (topology, controller, tap_stub) = board();
        host_callback(
            &topology,
            controller,
            Rvf::new(tap_stub, Command::Sir, BitVector::from_u64(0b1010, 4)),
        )
        .unwrap();
    }

    #[test]
    fn sirnc_discards_captured_response() {
        let (topology, controller, tap_stub) = board();
        host_callback(
            &topology,
            controller,
            Rvf::new(tap_stub, Command::SirNc, BitVector::from_u64(0b1010, 4)),
        )
        .unwrap();
    }
}
