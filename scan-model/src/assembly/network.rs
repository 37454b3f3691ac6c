//! `JTAGNetwork` and `IJTAGNetwork`: aggregator nodes that concatenate
//! several children's contributions into one physical scan.
//!
//! Unlike [`super::mux`], a network node has no key register and performs no
//! selection — it exists to let several sibling sub-trees share one path
//! toward the root without a TAP or mux in between them. Every child that is
//! heard from in a cycle gets a slot in `segments`, indexed by its position
//! among the node's children; `apply` concatenates every slot, in order,
//! into one outgoing request. Segments persist across cycles — a child that
//! stays quiet keeps contributing whatever it last sent.
//!
//! `JTAGNetwork` children speak `SIR`/`SIRNC`/`SDR`/`SDRNC` directly (the
//! network sits where a TAP would, translating IR/DR scans) and guards
//! against mixing IR- and DR-side children in the same cycle
//! ([`ScanModelError::ScanModeConflict`]) — `IJTAGNetwork` children speak
//! `SCAN`/`CAPSCAN` and have no such distinction to conflict over.

use parking_lot::Mutex;

use super::unknown_command;
use crate::bitvector::BitVector;
use crate::description::NetworkDescription;
use crate::error::{Result, ScanModelError};
use crate::rvf::{Command, Rvf};
use crate::topology::Topology;
use crate::NodeId;

/// Which concrete network kind this node models.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkProtocol {
    /// `JTAGNetwork` — children speak `SIR`/`SIRNC`/`SDR`/`SDRNC`.
    Jtag,
    /// `IJTAGNetwork` — children speak `SCAN`/`CAPSCAN`.
    Ijtag,
}

struct Inner {
    /// One slot per child, indexed by position in [`Topology::children`].
    /// Lazily sized to the child count the first time any child is heard
    /// from, then left in place across cycles.
    segments: Vec<BitVector>,
    pending: bool,
    capture: bool,
    /// `JTAGNetwork` only: `Some(true)` once a DR-side child has queued this
    /// cycle, `Some(false)` once an IR-side child has. Mixing the two is the
    /// one real conflict a network guards against.
    data_mode: Option<bool>,
}

/// Runtime state for a `JTAGNetwork` or `IJTAGNetwork` node.
pub struct NetworkState {
    pub(crate) description: NetworkDescription,
    pub(crate) protocol: NetworkProtocol,
    inner: Mutex<Inner>,
}

impl NetworkState {
    /// Builds an empty network node; children are attached afterward via
    /// [`crate::topology::Topology::wire_children`].
    pub fn new(description: NetworkDescription, protocol: NetworkProtocol) -> Self {
        NetworkState {
            description,
            protocol,
            inner: Mutex::new(Inner {
                segments: Vec::new(),
                pending: false,
                capture: false,
                data_mode: None,
            }),
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.inner.lock().pending
    }
}

fn ensure_segments(topology: &Topology, id: NodeId) -> Result<()> {
    let count = topology.children(id).len();
    topology.with_network(id, |n| {
        let mut inner = n.inner.lock();
        if inner.segments.len() != count {
            inner.segments = vec![BitVector::zeros(0); count];
        }
    })
}

fn child_index(topology: &Topology, id: NodeId, child: NodeId) -> Option<usize> {
    topology.children(id).iter().position(|c| *c == child)
}

/// Whether `command` is a DR-side command (`true`), IR-side (`false`), or
/// not a `JTAGNetwork` command at all (`None`).
fn jtag_side(command: Command) -> Option<(bool, bool)> {
    match command {
        Command::Sir => Some((false, true)),
        Command::SirNc => Some((false, false)),
        Command::Sdr => Some((true, true)),
        Command::SdrNc => Some((true, false)),
        _ => None,
    }
}

/// Queues a child's contribution into its segment slot, marking the whole
/// node pending; the physical scan is not dispatched until [`apply`] runs.
pub fn host_callback(topology: &Topology, id: NodeId, rvf: Rvf) -> Result<()> {
    let child = rvf.uid;
    let protocol = topology.with_network(id, |n| n.protocol)?;
    match protocol {
        NetworkProtocol::Jtag => match jtag_side(rvf.command) {
            Some((is_dr, captures)) => {
                ensure_segments(topology, id)?;
                let name = topology.name(id);
                let index = child_index(topology, id, child)
                    .ok_or_else(|| ScanModelError::NotWired(name.clone()))?;
                topology.with_network(id, |n| {
                    let mut inner = n.inner.lock();
                    match inner.data_mode {
                        Some(existing) if existing != is_dr => {
                            return Err(ScanModelError::ScanModeConflict(name.clone()));
                        }
                        _ => {}
                    }
                    inner.data_mode = Some(is_dr);
                    inner.segments[index] = rvf.payload.clone();
                    inner.pending = true;
                    inner.capture |= captures;
                    Ok(())
                })?
            }
            None => match rvf.command {
                Command::IsActive => {
                    respond_inline(topology, id, child, Command::IsActive, BitVector::from_u64(1, 1));
                    Ok(())
                }
                Command::ListCb => {
                    // The textual command listing is `Topology::list_callbacks`;
                    // this wire ack just confirms the command was understood.
                    respond_inline(topology, id, child, Command::ListCb, BitVector::zeros(0));
                    Ok(())
                }
                other => Err(unknown_command(&topology.name(id), other)),
            },
        },
        NetworkProtocol::Ijtag => match rvf.command {
            Command::Scan | Command::CapScan => {
                ensure_segments(topology, id)?;
                let name = topology.name(id);
                let index = child_index(topology, id, child)
                    .ok_or_else(|| ScanModelError::NotWired(name))?;
                let captures = rvf.command == Command::CapScan;
                topology.with_network(id, |n| {
                    let mut inner = n.inner.lock();
                    inner.segments[index] = rvf.payload.clone();
                    inner.pending = true;
                    inner.capture |= captures;
                })
            }
            Command::IsActive => {
                respond_inline(topology, id, child, Command::IsActive, BitVector::from_u64(1, 1));
                Ok(())
            }
            Command::ListCb => {
                // The textual command listing is `Topology::list_callbacks`;
                // this wire ack just confirms the command was understood.
                respond_inline(topology, id, child, Command::ListCb, BitVector::zeros(0));
                Ok(())
            }
            other => Err(unknown_command(&topology.name(id), other)),
        },
    }
}

fn respond_inline(topology: &Topology, id: NodeId, child: NodeId, command: Command, payload: BitVector) {
    if let Some(iface) = topology.host_interface(id) {
        iface.response(Rvf::new(child, command, payload));
    }
}

/// Concatenates every segment, in child order, into one outgoing request.
pub fn apply(topology: &Topology, id: NodeId) -> Result<()> {
    let name = topology.name(id);
    let dispatch = topology.with_network(id, |n| {
        let mut inner = n.inner.lock();
        if !inner.pending {
            return Ok(None);
        }
        let command = match n.protocol {
            NetworkProtocol::Jtag => match (inner.data_mode, inner.capture) {
                (Some(true), true) => Command::Sdr,
                (Some(true), false) => Command::SdrNc,
                (Some(false), true) => Command::Sir,
                (Some(false), false) => Command::SirNc,
                (None, _) => return Err(ScanModelError::Sync(format!("{name}: pending network request has no data_mode"))),
            },
            NetworkProtocol::Ijtag => {
                if inner.capture {
                    Command::CapScan
                } else {
                    Command::Scan
                }
            }
        };
        let payload = BitVector::concat(&inner.segments);
        inner.pending = false;
        inner.capture = false;
        inner.data_mode = None;
        Ok(Some((command, payload)))
    })??;
    let Some((command, payload)) = dispatch else {
        return Ok(());
    };
    let iface = topology
        .client_interface(id)
        .ok_or_else(|| ScanModelError::NotWired(name))?;
    topology.mark_pending();
    iface.request(Rvf::new(id, command, payload));
    Ok(())
}

/// Slices the one physical response back into each child's segment and
/// forwards each slice directly to that child's own resp_handler.
///
/// A network's host edge can have several children with requests
/// outstanding in the same cycle, which is exactly the case an
/// [`crate::interface::AccessInterface`]'s single-most-recent-requester
/// correlation cannot route correctly (see
/// [`crate::topology::Topology::dispatch_resp_handler_direct`]) — so this
/// bypasses that edge's `response()` queue entirely and dispatches straight
/// to each child by id.
pub fn resp_handler(topology: &Topology, id: NodeId, rvf: Rvf) -> Result<()> {
    let protocol = topology.with_network(id, |n| n.protocol)?;
    let generic = match protocol {
        NetworkProtocol::Jtag => match rvf.command {
            Command::Sir | Command::Sdr => Command::CapScan,
            Command::SirNc | Command::SdrNc => Command::Scan,
            other => other,
        },
        NetworkProtocol::Ijtag => rvf.command,
    };
    let children = topology.children(id);
    let lengths: Vec<usize> = topology.with_network(id, |n| {
        n.inner.lock().segments.iter().map(|s| s.len()).collect()
    })?;
    let mut start = 0;
    for (child, len) in children.iter().zip(lengths.iter()) {
        let slice = rvf.payload.slice(start, *len)?;
        topology.dispatch_resp_handler_direct(*child, Rvf::new(*child, generic, slice));
        start += len;
    }
    topology.clear_pending();
    Ok(())
}
