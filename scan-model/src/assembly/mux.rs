//! `DataMux` and `ScanMux`: the selector node that routes a parent-facing
//! access down to exactly one of several children, based on the code
//! currently held in an internal key register.
//!
//! A `ScanMux`'s selector behavior is identical to `DataMux`'s — an address
//! map from code to child, a default entry, the same select-then-forward
//! dance — and the only real difference is which [`Command`] pair it
//! forwards, so [`MuxProtocol`] parameterizes one shared implementation over
//! both rather than duplicating it.

use parking_lot::Mutex;

use super::{register, unknown_command};
use crate::bitvector::BitVector;
use crate::description::MuxDescription;
use crate::error::{Result, ScanModelError};
use crate::rvf::{Command, Rvf};
use crate::topology::Topology;
use crate::NodeId;

/// Which command pair a mux forwards to its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MuxProtocol {
    /// `WRITE` / `READ` / `WRITE_READ` — `DataMux`.
    Parallel,
    /// `SCAN` / `CAPSCAN` — `ScanMux`.
    Serial,
}

struct Inner {
    selected: Option<NodeId>,
    queued: Option<(Command, BitVector)>,
    /// Counts child requests received since the last [`apply`] consumed
    /// one. A mux routes to exactly one active child at a time, so more
    /// than one child issuing a request inside the same pending cycle
    /// means two callers raced for mutually exclusive paths.
    pending_count: u32,
}

/// Runtime state for a `DataMux` or `ScanMux` node.
pub struct MuxState {
    pub(crate) description: MuxDescription,
    pub(crate) protocol: MuxProtocol,
    /// The register holding the current selector code. An existing node
    /// elsewhere in the tree — a TAP's own IR register, say — accessed
    /// directly via [`register::peek`]/[`register::poke`] rather than
    /// through a request/response cycle.
    pub(crate) keyreg: NodeId,
    inner: Mutex<Inner>,
}

impl MuxState {
    /// Builds a mux whose key register is `keyreg`, a register already
    /// defined elsewhere in the [`crate::topology::Topology`].
    pub fn new(description: MuxDescription, protocol: MuxProtocol, keyreg: NodeId) -> Self {
        MuxState {
            description,
            protocol,
            keyreg,
            inner: Mutex::new(Inner {
                selected: None,
                queued: None,
                pending_count: 0,
            }),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.inner.lock().queued.is_some()
    }
}

fn protocol_accepts(protocol: MuxProtocol, command: Command) -> bool {
    matches!(
        (protocol, command),
        (MuxProtocol::Parallel, Command::Write | Command::Read | Command::WriteRead)
            | (MuxProtocol::Serial, Command::Scan | Command::CapScan)
    )
}

/// Decodes the key register and returns the currently selected child,
/// substituting (and rewriting the key register to) the address map's
/// default entry if the current code matches nothing.
fn resolve_selected(topology: &Topology, id: NodeId) -> Result<Option<NodeId>> {
    let keyreg = topology.with_mux(id, |m| m.keyreg)?;
    let code = register::peek(topology, keyreg)?;
    let direct = topology.with_mux(id, |m| m.description.lookup(&code).map(|e| e.child))?;
    let selected = match direct {
        Some(child) => Some(child),
        None => {
            let default_code = topology.with_mux(id, |m| m.description.default_code().cloned())?;
            match default_code {
                Some(default_code) => {
                    register::poke(topology, keyreg, default_code.clone())?;
                    topology.with_mux(id, |m| m.description.lookup(&default_code).map(|e| e.child))?
                }
                None => None,
            }
        }
    };
    topology.with_mux(id, |m| m.inner.lock().selected = selected)?;
    Ok(selected)
}

/// Ensures `child` is the mux's active selection, rewriting the key
/// register if it is not already.
fn select_child(topology: &Topology, id: NodeId, child: NodeId) -> Result<()> {
    let current = resolve_selected(topology, id)?;
    if current == Some(child) {
        return Ok(());
    }
    let entry = topology.with_mux(id, |m| m.description.entry_for_child(child).cloned())?;
    let entry = entry.ok_or_else(|| ScanModelError::UnknownSelectorCode {
        mux: topology.name(id),
        uid: child,
    })?;
    let keyreg = topology.with_mux(id, |m| m.keyreg)?;
    register::poke(topology, keyreg, entry.code.clone())?;
    topology.with_mux(id, |m| m.inner.lock().selected = Some(child))?;
    Ok(())
}

/// Whether `child` is currently the mux's selected path, compared via
/// `entity_name` rather than uid — two different node instances sharing a
/// name are indistinguishable to a caller that only knows the name it asked
/// for.
pub fn is_active(topology: &Topology, id: NodeId, child: NodeId) -> Result<bool> {
    match resolve_selected(topology, id)? {
        Some(selected) => Ok(topology.name(selected) == topology.name(child)),
        None => Ok(false),
    }
}

/// This mux's address map, in declaration order.
pub fn entries(topology: &Topology, id: NodeId) -> Result<Vec<crate::description::MuxEntry>> {
    topology.with_mux(id, |m| m.description.entries().to_vec())
}

/// Handles a request issued by one of this mux's children: selects that
/// child, then queues the request to be forwarded upward on the next
/// [`apply`] pass.
pub fn host_callback(topology: &Topology, id: NodeId, rvf: Rvf) -> Result<()> {
    let child = rvf.uid;
    match rvf.command {
        Command::Write | Command::Read | Command::WriteRead | Command::Scan | Command::CapScan => {
            let protocol = topology.with_mux(id, |m| m.protocol)?;
            if !protocol_accepts(protocol, rvf.command) {
                return Err(unknown_command(&topology.name(id), rvf.command));
            }
            select_child(topology, id, child)?;
            let name = topology.name(id);
            topology.with_mux(id, |m| {
                let mut inner = m.inner.lock();
                inner.queued = Some((rvf.command, rvf.payload.clone()));
                inner.pending_count += 1;
                if inner.pending_count > 1 {
                    Err(ScanModelError::CompetingPaths(name.clone()))
                } else {
                    Ok(())
                }
            })?
        }
        Command::Address => {
            let keyreg = topology.with_mux(id, |m| m.keyreg)?;
            let reg_length = topology.with_register(keyreg, |r| r.description.reg_length())?;
            if rvf.payload.len() != reg_length {
                return Err(ScanModelError::LengthMismatch {
                    name: topology.name(id),
                    expected: reg_length,
                    actual: rvf.payload.len(),
                });
            }
            register::poke(topology, keyreg, rvf.payload.clone())?;
            topology.with_mux(id, |m| m.inner.lock().selected = None)?;
            if let Some(iface) = topology.host_interface(id) {
                iface.response(Rvf::new(child, Command::Address, rvf.payload));
            }
            Ok(())
        }
        Command::IsActive => {
            let active = is_active(topology, id, child)?;
            if let Some(iface) = topology.host_interface(id) {
                iface.response(Rvf::new(child, Command::IsActive, BitVector::from_u64(active as u64, 1)));
            }
            Ok(())
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

/// If a request is queued, forwards it across this mux's client edge.
pub fn apply(topology: &Topology, id: NodeId) -> Result<()> {
    let dispatch = topology.with_mux(id, |m| {
        let mut inner = m.inner.lock();
        inner.pending_count = 0;
        inner.queued.take()
    })?;
    let Some((command, payload)) = dispatch else {
        return Ok(());
    };
    let name = topology.name(id);
    let iface = topology
        .client_interface(id)
        .ok_or_else(|| ScanModelError::NotWired(name))?;
    topology.mark_pending();
    iface.request(Rvf::new(id, command, payload));
    Ok(())
}

/// Forwards a response received from above back down to whichever child
/// most recently requested across this mux's host edge.
pub fn resp_handler(topology: &Topology, id: NodeId, rvf: Rvf) -> Result<()> {
    if let Some(iface) = topology.host_interface(id) {
        iface.response(Rvf::new(rvf.uid, rvf.command, rvf.payload));
    }
    topology.clear_pending();
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::description::RegisterDescription;

    fn board() -> (Topology, NodeId, NodeId, NodeId) {
        let topology = Topology::new();
        let bypass = topology.define_data_register(
            RegisterDescription::new("bypass", 1, BitVector::zeros(1)).unwrap(),
            register::Direction::ReadWrite,
        );
        let idcode = topology.define_data_register(
            RegisterDescription::new("idcode", 4, BitVector::zeros(4)).unwrap(),
            register::Direction::ReadOnly,
        );
        let keyreg = topology.define_data_register(
            RegisterDescription::new("keyreg", 2, BitVector::zeros(2)).unwrap(),
            register::Direction::ReadWrite,
        );
        let mut desc = MuxDescription::new("m1", 2).unwrap();
        desc.add_entry(BitVector::from_u64(0, 2), Some("BYPASS".into()), bypass).unwrap();
        desc.add_entry(BitVector::from_u64(1, 2), Some("IDCODE".into()), idcode).unwrap();
        let mux = topology.define_data_mux(desc, keyreg).unwrap();
        topology.wire_children(mux, &[bypass, idcode]).unwrap();
        (topology, mux, bypass, idcode)
    }

    #[test]
    fn resolve_selected_falls_back_to_default_code() {
        let (topology, mux, bypass, _idcode) = board();
        assert_eq!(resolve_selected(&topology, mux).unwrap(), Some(bypass));
    }

    #[test]
    fn select_child_rewrites_keyreg() {
        let (topology, mux, _bypass, idcode) = board();
        select_child(&topology, mux, idcode).unwrap();
        assert_eq!(resolve_selected(&topology, mux).unwrap(), Some(idcode));
    }

    #[test]
    fn select_child_rejects_uid_with_no_entry() {
        let (topology, mux, _bypass, _idcode) = board();
        let err = select_child(&topology, mux, 999).unwrap_err();
        assert!(matches!(err, ScanModelError::UnknownSelectorCode { .. }));
    }

    #[test]
    fn host_callback_selects_then_queues_request() {
        let (topology, mux, _bypass, idcode) = board();
        host_callback(&topology, mux, Rvf::new(idcode, Command::Read, BitVector::zeros(0))).unwrap();
        assert!(topology.with_mux(mux, |m| m.is_pending()).unwrap());
        assert_eq!(resolve_selected(&topology, mux).unwrap(), Some(idcode));
    }

    #[test]
    fn host_callback_rejects_protocol_mismatch() {
        let (topology, mux, _bypass, idcode) = board();
        let err = host_callback(&topology, mux, Rvf::new(idcode, Command::Scan, BitVector::zeros(4))).unwrap_err();
        assert!(matches!(err, ScanModelError::UnknownCommand { .. }));
    }

    #[test]
    fn two_children_pending_in_one_cycle_is_competing_paths() {
        let (topology, mux, bypass, idcode) = board();
        host_callback(&topology, mux, Rvf::new(bypass, Command::Write, BitVector::zeros(1))).unwrap();
        let err = host_callback(&topology, mux, Rvf::new(idcode, Command::Read, BitVector::zeros(0))).unwrap_err();
        assert!(matches!(err, ScanModelError::CompetingPaths(_)));
    }

    #[test]
    fn address_writes_keyreg_directly_and_acks_without_queuing() {
        let (topology, mux, _bypass, idcode) = board();
        host_callback(&topology, mux, Rvf::new(idcode, Command::Address, BitVector::from_u64(1, 2))).unwrap();
        assert_eq!(resolve_selected(&topology, mux).unwrap(), Some(idcode));
        assert!(!topology.with_mux(mux, |m| m.is_pending()).unwrap());
    }

    #[test]
    fn is_active_compares_by_entity_name_not_uid() {
        let (topology, mux, bypass, idcode) = board();
        assert!(is_active(&topology, mux, bypass).unwrap());
        assert!(!is_active(&topology, mux, idcode).unwrap());

        // A node sharing the selected child's name, even at a different
        // uid, still reads as active.
        let alias = topology.define_data_register(
            RegisterDescription::new("bypass", 1, BitVector::zeros(1)).unwrap(),
            register::Direction::ReadWrite,
        );
        assert_ne!(alias, bypass);
        assert!(is_active(&topology, mux, alias).unwrap());
    }

    #[test]
    fn apply_resets_pending_count_for_the_next_cycle() {
        let (topology, mux, bypass, _idcode) = board();
        host_callback(&topology, mux, Rvf::new(bypass, Command::Write, BitVector::zeros(1))).unwrap();
        apply(&topology, mux).unwrap();
        host_callback(&topology, mux, Rvf::new(bypass, Command::Write, BitVector::zeros(1))).unwrap();
        assert!(topology.with_mux(mux, |m| m.is_pending()).unwrap());
    }
}
