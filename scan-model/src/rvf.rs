//! The request/response value frame (RVF) exchanged across an
//! [`crate::interface::AccessInterface`].

use std::fmt;

use crate::bitvector::BitVector;
use crate::NodeId;

/// The commands a node can send or receive along an
/// [`crate::interface::AccessInterface`] edge.
///
/// This is a closed set rather than a free-form string: every node kind's
/// host-callback dispatch is a `match` over `Command`, so an unhandled
/// variant is a compile error instead of a forgotten `if` branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Write a value into a register, no response expected.
    Write,
    /// Read the last-captured value out of a register.
    Read,
    /// Write a value and return the value captured just before the write
    /// took effect, in one round trip.
    WriteRead,
    /// Internal two-phase addressing handshake used by
    /// [`crate::assembly::portal::PortalRegister`]; never forwarded past the
    /// node that issues it.
    Address,
    /// Ask a mux/network node whether a given child is currently the
    /// selected path.
    IsActive,
    /// Drive one scan cycle (IR or DR, depending on context) down to the
    /// controller.
    Scan,
    /// Same as [`Command::Scan`] but the captured response is discarded by
    /// the controller (`SIRNC`/`SDRNC` semantics collapse onto this at the
    /// controller boundary).
    CapScan,
    /// Shift the instruction register, capturing the prior value.
    Sir,
    /// Shift the instruction register without capturing.
    SirNc,
    /// Shift a data register, capturing the prior value.
    Sdr,
    /// Shift a data register without capturing.
    SdrNc,
    /// Diagnostic: list the commands a node supports.
    ListCb,
}

impl Command {
    /// The exact wire token this command is rendered as. Kept as the literal
    /// strings the driver boundary expects rather than `Debug` output, so
    /// renaming a variant never silently changes the wire format.
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Write => "WRITE",
            Command::Read => "READ",
            Command::WriteRead => "WRITE_READ",
            Command::Address => "ADDRESS",
            Command::IsActive => "ISACTIVE",
            Command::Scan => "SCAN",
            Command::CapScan => "CAPSCAN",
            Command::Sir => "SIR",
            Command::SirNc => "SIRNC",
            Command::Sdr => "SDR",
            Command::SdrNc => "SDRNC",
            Command::ListCb => "LISTCB",
        }
    }

    /// All commands a node might advertise in a `LISTCB` response, in a
    /// stable order.
    pub fn all() -> &'static [Command] {
        &[
            Command::Write,
            Command::Read,
            Command::WriteRead,
            Command::Address,
            Command::IsActive,
            Command::Scan,
            Command::CapScan,
            Command::Sir,
            Command::SirNc,
            Command::Sdr,
            Command::SdrNc,
            Command::ListCb,
        ]
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request or response value frame: `{uid, command, payload}`.
///
/// `uid` identifies the node the frame concerns: for a request, the node
/// that issued it; for a response, the node the response is addressed back
/// to. An [`crate::interface::AccessInterface`]'s response worker correlates
/// a response with the uid of whichever request most recently crossed that
/// same edge, not with any uid embedded in the response payload itself —
/// this mirrors how a physical scan chain has no way to tag a shift result
/// with its originator, only the order transactions were issued in.
#[derive(Clone, Debug)]
pub struct Rvf {
    /// The node this frame concerns.
    pub uid: NodeId,
    /// The operation being requested or acknowledged.
    pub command: Command,
    /// The value carried by this frame. Zero-length for commands that carry
    /// no payload (e.g. `LISTCB` requests).
    pub payload: BitVector,
}

impl Rvf {
    /// Builds a new frame.
    pub fn new(uid: NodeId, command: Command, payload: BitVector) -> Self {
        Rvf { uid, command, payload }
    }
}
