//! The scan-tree node taxonomy.
//!
//! [`NodeKind`] is a closed set of node variants — Leaf, Linker and Super
//! assemblies are collapsed into concrete kinds distinguished by a protocol
//! tag rather than a runtime class hierarchy. [`crate::topology::Topology`]
//! holds every node in one arena and dispatches `apply`/host-callback/
//! response handling to the matching submodule below by matching on it.

pub mod controller;
pub mod mux;
pub mod network;
pub mod portal;
pub mod register;
pub mod stub;
pub mod tap;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::interface::AccessInterface;
use crate::rvf::Command;
use crate::NodeId;

pub use controller::ControllerState;
pub use mux::{MuxProtocol, MuxState};
pub use network::{NetworkProtocol, NetworkState};
pub use portal::PortalState;
pub use register::{Direction, LeafProtocol, RegisterState};
pub use stub::StubState;
pub use tap::TapState;

/// Whether a linker node's downstream path is currently known to be routed
/// somewhere.
///
/// Nothing in this crate branches on it; it is kept current purely as a
/// diagnostic surfaced through `Topology::dump`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathState {
    /// The node currently routes to a selected child.
    Active,
    /// No child is currently selected (or the node has no children).
    Inactive,
}

/// The closed set of node kinds a scan tree can contain.
///
/// A `Leaf` is `DataRegister`/`ScanRegister` (distinguished by
/// [`register::LeafProtocol`]); a `Linker` is `DataMux`/`ScanMux`
/// (distinguished by [`mux::MuxProtocol`]) or `Tap`; a `Super` is
/// `JtagNetwork`/`IjtagNetwork` (distinguished by
/// [`network::NetworkProtocol`]), `JtagControllerAssembly`, `PortalRegister`
/// or one of the two unimplemented stub kinds.
pub enum NodeKind {
    /// `DataRegister` or `ScanRegister`.
    Register(RegisterState),
    /// `DataMux` or `ScanMux`.
    Mux(MuxState),
    /// The IEEE 1149.1 TAP.
    Tap(TapState),
    /// `JTAGNetwork` or `IJTAGNetwork`.
    Network(NetworkState),
    /// The root adapter to an external [`crate::driver::JtagController`].
    Controller(ControllerState),
    /// The two-phase addressed bus register.
    Portal(PortalState),
    /// `I2CClient` or `ParallelToSerial` — unimplemented stub kinds.
    Stub(StubState),
}

impl NodeKind {
    /// A short tag for diagnostics (`Topology::dump`) and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Register(s) => match s.protocol {
                LeafProtocol::Data => "DataRegister",
                LeafProtocol::Scan => "ScanRegister",
            },
            NodeKind::Mux(s) => match s.protocol {
                MuxProtocol::Parallel => "DataMux",
                MuxProtocol::Serial => "ScanMux",
            },
            NodeKind::Tap(_) => "TAP",
            NodeKind::Network(s) => match s.protocol {
                NetworkProtocol::Jtag => "JTAGNetwork",
                NetworkProtocol::Ijtag => "IJTAGNetwork",
            },
            NodeKind::Controller(_) => "JTAGControllerAssembly",
            NodeKind::Portal(_) => "PortalRegister",
            NodeKind::Stub(s) => s.kind_name(),
        }
    }

    /// Whether this node currently reports a pending aggregated access,
    /// used only by [`crate::topology::Topology::dump`].
    pub fn is_pending(&self) -> bool {
        match self {
            NodeKind::Register(s) => s.is_pending(),
            NodeKind::Mux(s) => s.is_pending(),
            NodeKind::Tap(s) => s.is_pending(),
            NodeKind::Network(s) => s.is_pending(),
            NodeKind::Controller(s) => s.is_pending(),
            NodeKind::Portal(s) => s.is_pending(),
            NodeKind::Stub(_) => false,
        }
    }

    /// The commands this node kind answers, in a stable order, plus the
    /// always-present `LISTCB` diagnostic every node implicitly supports.
    /// Backs [`crate::topology::Topology::list_callbacks`].
    pub fn supported_commands(&self) -> Vec<Command> {
        let mut cmds = match self {
            NodeKind::Register(s) => match s.protocol {
                LeafProtocol::Data => vec![Command::Write, Command::Read, Command::WriteRead],
                LeafProtocol::Scan => vec![Command::Scan, Command::CapScan],
            },
            NodeKind::Mux(s) => {
                let mut cmds = match s.protocol {
                    MuxProtocol::Parallel => vec![Command::Write, Command::Read, Command::WriteRead],
                    MuxProtocol::Serial => vec![Command::Scan, Command::CapScan],
                };
                cmds.push(Command::IsActive);
                cmds.push(Command::Address);
                cmds
            }
            NodeKind::Tap(_) => vec![Command::Scan, Command::CapScan],
            NodeKind::Network(s) => {
                let mut cmds = match s.protocol {
                    NetworkProtocol::Jtag => vec![Command::Sir, Command::SirNc, Command::Sdr, Command::SdrNc],
                    NetworkProtocol::Ijtag => vec![Command::Scan, Command::CapScan],
                };
                cmds.push(Command::IsActive);
                cmds
            }
            NodeKind::Controller(_) => vec![Command::Sir, Command::SirNc, Command::Sdr, Command::SdrNc],
            NodeKind::Portal(_) => vec![Command::Address, Command::Write, Command::Read, Command::WriteRead],
            NodeKind::Stub(_) => vec![],
        };
        cmds.push(Command::ListCb);
        cmds
    }
}

/// One vertex in a scan tree.
///
/// Structural fields (`name`, `parent`, `children`, the two
/// [`AccessInterface`] edges, `visible`) are set once by
/// [`crate::topology::Topology`]'s factory/wiring methods and never change
/// afterward; the mutable runtime state specific to each kind lives behind
/// its own `parking_lot::Mutex` inside [`NodeKind`], scoped to just the
/// fields that actually vary.
pub struct Node {
    pub(crate) uid: NodeId,
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) visible: bool,
    pub(crate) path_state: Mutex<PathState>,
    /// The edge to this node's parent; `None` only for the root.
    pub(crate) client_interface: Option<Arc<AccessInterface>>,
    /// The edge to this node's children; `None` for nodes with none.
    pub(crate) host_interface: Option<Arc<AccessInterface>>,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub(crate) fn new(uid: NodeId, name: String, visible: bool, kind: NodeKind) -> Self {
        Node {
            uid,
            name,
            parent: None,
            children: Vec::new(),
            visible,
            path_state: Mutex::new(PathState::Inactive),
            client_interface: None,
            host_interface: None,
            kind,
        }
    }
}

/// A command reaching a node with no handler registered for it — every
/// `host_callback` implementation below routes its unmatched arm through
/// this helper so the wording stays consistent.
pub(crate) fn unknown_command(node: &str, command: crate::rvf::Command) -> crate::error::ScanModelError {
    crate::error::ScanModelError::UnknownCommand {
        node: node.to_string(),
        command: command.as_str().to_string(),
    }
}
