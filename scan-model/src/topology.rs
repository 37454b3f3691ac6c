//! The scan tree itself: an arena of [`Node`](crate::assembly::Node)s, the
//! factory methods that build one up, and the dispatch glue that routes
//! `apply`/host-callback/response traffic to the right
//! [`crate::assembly`] submodule.
//!
//! Every node lives in one `Vec<Node>` behind a `parking_lot::RwLock`,
//! indexed by its [`NodeId`] (its index). The arena is append-only and is
//! only ever written to while a topology is being constructed, strictly
//! before a [`crate::scheduler::Scheduler`] is started against it — once
//! traffic starts flowing, every access below takes a read lock, and since
//! no writer ever contends with them again, nested read-lock acquisitions
//! (e.g. a `with_mux` closure that calls `topology.name()`) are safe by
//! construction rather than merely by luck.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::assembly::mux::MuxProtocol;
use crate::assembly::network::NetworkProtocol;
use crate::assembly::register::{Direction, LeafProtocol};
use crate::assembly::stub::StubKind;
use crate::assembly::{
    controller, mux, network, portal, register, stub, tap, ControllerState, MuxState, Node,
    NodeKind, NetworkState, PortalState, RegisterState, StubState, TapState,
};
use crate::bitvector::BitVector;
use crate::description::{MuxDescription, NetworkDescription, RegisterDescription, TapDescription};
use crate::driver::JtagController;
use crate::error::{Result, ScanModelError};
use crate::interface::{AccessInterface, StopSwitch, StopWatch};
use crate::pending::PendingTracker;
use crate::rvf::Rvf;
use crate::NodeId;

enum KindTag {
    Register,
    Mux,
    Tap,
    Network,
    Controller,
    Portal,
    Stub,
}

struct Inner {
    nodes: RwLock<Vec<Node>>,
    next_uid: AtomicU32,
    root: Mutex<Option<NodeId>>,
    pending: Arc<PendingTracker>,
    stop: Mutex<StopSwitch>,
    last_error: Mutex<Option<ScanModelError>>,
}

/// A cloneable handle onto a scan tree.
///
/// Cloning a `Topology` is cheap (an `Arc` bump) and every clone refers to
/// the same underlying tree — this is what lets
/// [`crate::interface::AccessInterface`] callbacks close over a `Topology`
/// and call back into it from a worker thread.
#[derive(Clone)]
pub struct Topology(Arc<Inner>);

impl Topology {
    /// Builds an empty topology with nothing defined yet.
    pub fn new() -> Self {
        Topology(Arc::new(Inner {
            nodes: RwLock::new(Vec::new()),
            next_uid: AtomicU32::new(0),
            root: Mutex::new(None),
            pending: Arc::new(PendingTracker::new()),
            stop: Mutex::new(StopSwitch::new()),
            last_error: Mutex::new(None),
        }))
    }

    fn alloc(&self, name: String, visible: bool, kind: NodeKind) -> NodeId {
        let uid = self.0.next_uid.fetch_add(1, Ordering::SeqCst);
        let mut nodes = self.0.nodes.write();
        debug_assert_eq!(uid as usize, nodes.len());
        nodes.push(Node::new(uid, name, visible, kind));
        uid
    }

    // ---- factory methods --------------------------------------------

    /// Defines a `DataRegister` leaf.
    pub fn define_data_register(&self, description: RegisterDescription, direction: Direction) -> NodeId {
        let name = description.entity_name().to_string();
        self.alloc(
            name,
            true,
            NodeKind::Register(RegisterState::new(description, direction, LeafProtocol::Data)),
        )
    }

    /// Defines a `ScanRegister` leaf.
    pub fn define_scan_register(&self, description: RegisterDescription, direction: Direction) -> NodeId {
        let name = description.entity_name().to_string();
        self.alloc(
            name,
            true,
            NodeKind::Register(RegisterState::new(description, direction, LeafProtocol::Scan)),
        )
    }

    /// Defines a `PortalRegister` leaf at bus address `address`.
    pub fn define_portal_register(&self, description: RegisterDescription, address: BitVector) -> NodeId {
        let name = description.entity_name().to_string();
        self.alloc(name, true, NodeKind::Portal(PortalState::new(description, address)))
    }

    fn check_keyreg_length(&self, description: &MuxDescription, keyreg: NodeId) -> Result<()> {
        let reg_length = self.with_register(keyreg, |r| r.description.reg_length())?;
        if reg_length != description.code_length() {
            return Err(ScanModelError::LengthMismatch {
                name: description.entity_name().to_string(),
                expected: description.code_length(),
                actual: reg_length,
            });
        }
        Ok(())
    }

    /// Defines a `DataMux` whose active child is selected by the value
    /// currently held in `keyreg` — an already-defined register, typically
    /// one also wired elsewhere in the tree (e.g. a TAP's instruction
    /// register doubling as a DR-mux's selector). Its own children (the
    /// muxed sub-registers) are attached afterward with
    /// [`Self::wire_children`].
    ///
    /// Like the source's `DataMux`, a mux is invisible in dotted paths: a
    /// mux's own muxed children are addressed as if they hung directly off
    /// the mux's parent (e.g. `"JC1.U1.BSR"`, not `"JC1.U1.M1.BSR"`).
    pub fn define_data_mux(&self, description: MuxDescription, keyreg: NodeId) -> Result<NodeId> {
        self.check_keyreg_length(&description, keyreg)?;
        let name = description.entity_name().to_string();
        Ok(self.alloc(name, false, NodeKind::Mux(MuxState::new(description, MuxProtocol::Parallel, keyreg))))
    }

    /// Defines a `ScanMux` whose active child is selected by the value
    /// currently held in `keyreg`. See [`Self::define_data_mux`].
    pub fn define_scan_mux(&self, description: MuxDescription, keyreg: NodeId) -> Result<NodeId> {
        self.check_keyreg_length(&description, keyreg)?;
        let name = description.entity_name().to_string();
        Ok(self.alloc(name, false, NodeKind::Mux(MuxState::new(description, MuxProtocol::Serial, keyreg))))
    }

    /// Defines a TAP and wires its fixed two children: `ir` (the
    /// instruction register) and `dr_mux` (the DR-side selector).
    pub fn define_tap(&self, description: TapDescription, ir: NodeId, dr_mux: NodeId) -> Result<NodeId> {
        let name = description.entity_name().to_string();
        let tap = self.alloc(name, true, NodeKind::Tap(TapState::new(description)));
        self.wire_children(tap, &[ir, dr_mux])?;
        Ok(tap)
    }

    /// Defines a `JTAGNetwork`. Its children are attached afterward with
    /// [`Self::wire_children`]. Like a mux, a network is invisible in
    /// dotted paths — its children are addressed as if wired directly to
    /// its parent, matching the source's `JTAGNetwork.visible = False`.
    pub fn define_jtag_network(&self, description: NetworkDescription) -> NodeId {
        let name = description.entity_name().to_string();
        self.alloc(name, false, NodeKind::Network(NetworkState::new(description, NetworkProtocol::Jtag)))
    }

    /// Defines an `IJTAGNetwork`. See [`Self::define_jtag_network`].
    pub fn define_ijtag_network(&self, description: NetworkDescription) -> NodeId {
        let name = description.entity_name().to_string();
        self.alloc(name, false, NodeKind::Network(NetworkState::new(description, NetworkProtocol::Ijtag)))
    }

    /// Defines a `JTAGControllerAssembly` driving `driver`, with `child` as
    /// its single downstream node (typically a TAP).
    pub fn define_jtag_controller_assembly(
        &self,
        name: impl Into<String>,
        driver: Arc<dyn JtagController>,
        child: NodeId,
    ) -> Result<NodeId> {
        let node = self.alloc(name.into(), true, NodeKind::Controller(ControllerState::new(driver)));
        self.wire_children(node, &[child])?;
        Ok(node)
    }

    /// Defines an unimplemented `I2CClient` stub.
    pub fn define_i2c_client(&self, name: impl Into<String>) -> NodeId {
        self.alloc(name.into(), true, NodeKind::Stub(StubState::new(StubKind::I2cClient)))
    }

    /// Defines an unimplemented `ParallelToSerial` stub.
    pub fn define_parallel_to_serial(&self, name: impl Into<String>) -> NodeId {
        self.alloc(name.into(), true, NodeKind::Stub(StubState::new(StubKind::ParallelToSerial)))
    }

    /// Marks `id` as this topology's root, the node
    /// [`crate::scheduler::Scheduler`] drives `apply` from.
    pub fn set_root(&self, id: NodeId) -> Result<()> {
        self.ensure_valid(id)?;
        *self.0.root.lock() = Some(id);
        Ok(())
    }

    /// This topology's root, if [`Self::set_root`] has been called.
    pub fn root(&self) -> Option<NodeId> {
        *self.0.root.lock()
    }

    /// Wires `parent`'s host edge to `children`'s client edge across one
    /// shared [`AccessInterface`] — the "one interface per (parent, full
    /// child set)" topology every board configuration in this crate's test
    /// suite uses.
    pub fn wire_children(&self, parent: NodeId, children: &[NodeId]) -> Result<Arc<AccessInterface>> {
        if matches!(self.kind_tag(parent)?, KindTag::Register | KindTag::Portal) {
            return Err(ScanModelError::LeafCannotHaveChildren(self.name(parent)));
        }
        let mut seen = HashSet::new();
        for &child in children {
            if !seen.insert(self.name(child)) {
                return Err(ScanModelError::DuplicateChildName(self.name(child)));
            }
        }

        let watch = self.0.stop.lock().watch();
        let iface = Arc::new(AccessInterface::new(watch));

        let host = self.clone();
        iface.set_req_callback(move |rvf| host.dispatch_host_callback(parent, rvf));
        for &child in children {
            let client = self.clone();
            iface.set_resp_callback(child, move |rvf| client.dispatch_resp_handler(child, rvf));
        }

        let mut nodes = self.0.nodes.write();
        {
            let node = nodes
                .get_mut(parent as usize)
                .ok_or(ScanModelError::UnknownUid(parent))?;
            node.host_interface = Some(Arc::clone(&iface));
            node.children = children.to_vec();
        }
        for &child in children {
            let node = nodes
                .get_mut(child as usize)
                .ok_or(ScanModelError::UnknownUid(child))?;
            node.client_interface = Some(Arc::clone(&iface));
            node.parent = Some(parent);
        }
        Ok(iface)
    }

    // ---- node accessors ------------------------------------------------

    fn ensure_valid(&self, id: NodeId) -> Result<()> {
        if (id as usize) < self.0.nodes.read().len() {
            Ok(())
        } else {
            Err(ScanModelError::UnknownUid(id))
        }
    }

    /// This node's name, unique among its siblings.
    pub fn name(&self, id: NodeId) -> String {
        self.0
            .nodes
            .read()
            .get(id as usize)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }

    /// Whether this node appears in a dotted path.
    pub fn visible(&self, id: NodeId) -> bool {
        self.0.nodes.read().get(id as usize).map(|n| n.visible).unwrap_or(false)
    }

    /// This node's parent, if any.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.0.nodes.read().get(id as usize).and_then(|n| n.parent)
    }

    /// This node's children, in wiring order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.0
            .nodes
            .read()
            .get(id as usize)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    /// The edge toward this node's parent.
    pub fn client_interface(&self, id: NodeId) -> Option<Arc<AccessInterface>> {
        self.0.nodes.read().get(id as usize).and_then(|n| n.client_interface.clone())
    }

    /// The edge toward this node's children.
    pub fn host_interface(&self, id: NodeId) -> Option<Arc<AccessInterface>> {
        self.0.nodes.read().get(id as usize).and_then(|n| n.host_interface.clone())
    }

    fn kind_tag(&self, id: NodeId) -> Result<KindTag> {
        let nodes = self.0.nodes.read();
        let node = nodes.get(id as usize).ok_or(ScanModelError::UnknownUid(id))?;
        Ok(match &node.kind {
            NodeKind::Register(_) => KindTag::Register,
            NodeKind::Mux(_) => KindTag::Mux,
            NodeKind::Tap(_) => KindTag::Tap,
            NodeKind::Network(_) => KindTag::Network,
            NodeKind::Controller(_) => KindTag::Controller,
            NodeKind::Portal(_) => KindTag::Portal,
            NodeKind::Stub(_) => KindTag::Stub,
        })
    }

    /// Runs `f` against the register at `id`, failing if `id` names a
    /// different kind of node.
    pub(crate) fn with_register<T>(&self, id: NodeId, f: impl FnOnce(&RegisterState) -> T) -> Result<T> {
        let nodes = self.0.nodes.read();
        let node = nodes.get(id as usize).ok_or(ScanModelError::UnknownUid(id))?;
        match &node.kind {
            NodeKind::Register(r) => Ok(f(r)),
            _ => Err(wrong_kind(&node.name, "register")),
        }
    }

    pub(crate) fn with_mux<T>(&self, id: NodeId, f: impl FnOnce(&MuxState) -> T) -> Result<T> {
        let nodes = self.0.nodes.read();
        let node = nodes.get(id as usize).ok_or(ScanModelError::UnknownUid(id))?;
        match &node.kind {
            NodeKind::Mux(m) => Ok(f(m)),
            _ => Err(wrong_kind(&node.name, "mux")),
        }
    }

    pub(crate) fn with_tap<T>(&self, id: NodeId, f: impl FnOnce(&TapState) -> T) -> Result<T> {
        let nodes = self.0.nodes.read();
        let node = nodes.get(id as usize).ok_or(ScanModelError::UnknownUid(id))?;
        match &node.kind {
            NodeKind::Tap(t) => Ok(f(t)),
            _ => Err(wrong_kind(&node.name, "TAP")),
        }
    }

    pub(crate) fn with_network<T>(&self, id: NodeId, f: impl FnOnce(&NetworkState) -> T) -> Result<T> {
        let nodes = self.0.nodes.read();
        let node = nodes.get(id as usize).ok_or(ScanModelError::UnknownUid(id))?;
        match &node.kind {
            NodeKind::Network(n) => Ok(f(n)),
            _ => Err(wrong_kind(&node.name, "network")),
        }
    }

    pub(crate) fn with_controller<T>(&self, id: NodeId, f: impl FnOnce(&ControllerState) -> T) -> Result<T> {
        let nodes = self.0.nodes.read();
        let node = nodes.get(id as usize).ok_or(ScanModelError::UnknownUid(id))?;
        match &node.kind {
            NodeKind::Controller(c) => Ok(f(c)),
            _ => Err(wrong_kind(&node.name, "controller")),
        }
    }

    pub(crate) fn with_portal<T>(&self, id: NodeId, f: impl FnOnce(&PortalState) -> T) -> Result<T> {
        let nodes = self.0.nodes.read();
        let node = nodes.get(id as usize).ok_or(ScanModelError::UnknownUid(id))?;
        match &node.kind {
            NodeKind::Portal(p) => Ok(f(p)),
            _ => Err(wrong_kind(&node.name, "portal register")),
        }
    }

    pub(crate) fn with_stub<T>(&self, id: NodeId, f: impl FnOnce(&StubState) -> T) -> Result<T> {
        let nodes = self.0.nodes.read();
        let node = nodes.get(id as usize).ok_or(ScanModelError::UnknownUid(id))?;
        match &node.kind {
            NodeKind::Stub(s) => Ok(f(s)),
            _ => Err(wrong_kind(&node.name, "stub")),
        }
    }

    /// Queues a plain write at the node named by a resolved path, dispatching
    /// to [`register::write`] or [`portal::write`] depending on what kind of
    /// leaf it names. Used by [`crate::scheduler::Scheduler::write`].
    pub(crate) fn dispatch_write(&self, id: NodeId, value: BitVector) -> Result<()> {
        match self.kind_tag(id)? {
            KindTag::Register => register::write(self, id, value),
            KindTag::Portal => portal::write(self, id, value),
            _ => Err(ScanModelError::NotWired(self.name(id))),
        }
    }

    /// Queues a capturing write-read at the node named by a resolved path.
    /// See [`Self::dispatch_write`].
    pub(crate) fn dispatch_write_read(&self, id: NodeId, value: BitVector) -> Result<()> {
        match self.kind_tag(id)? {
            KindTag::Register => register::write_read(self, id, value),
            KindTag::Portal => portal::write_read(self, id, value),
            _ => Err(ScanModelError::NotWired(self.name(id))),
        }
    }

    /// Returns the most recently captured value at the node named by a
    /// resolved path. See [`Self::dispatch_write`].
    pub(crate) fn dispatch_read(&self, id: NodeId) -> Result<BitVector> {
        match self.kind_tag(id)? {
            KindTag::Register => register::read(self, id),
            KindTag::Portal => portal::read(self, id),
            _ => Err(ScanModelError::NotWired(self.name(id))),
        }
    }

    // ---- pending / error plumbing --------------------------------------

    pub(crate) fn mark_pending(&self) {
        self.0.pending.mark();
    }

    pub(crate) fn clear_pending(&self) {
        self.0.pending.clear();
    }

    /// How many accesses are currently in flight anywhere in this
    /// topology. [`crate::scheduler::Scheduler`] loops `apply_node` while
    /// this is above zero.
    pub fn pending_count(&self) -> i64 {
        self.0.pending.get()
    }

    pub(crate) fn record_error(&self, err: ScanModelError) {
        tracing::error!(error = %err, "recording topology error");
        *self.0.last_error.lock() = Some(err);
    }

    /// Takes the most recently recorded asynchronous error, if any.
    pub fn take_error(&self) -> Option<ScanModelError> {
        self.0.last_error.lock().take()
    }

    /// A watch on this topology's stop switch, handed to
    /// [`crate::scheduler::Scheduler`] so it can trip the same switch every
    /// [`AccessInterface`] worker thread listens on.
    pub(crate) fn stop_watch(&self) -> StopWatch {
        self.0.stop.lock().watch()
    }

    /// Trips every [`AccessInterface`] worker thread's stop switch.
    pub(crate) fn stop(&self) {
        self.0.stop.lock().stop();
    }

    // ---- traversal ------------------------------------------------------

    /// Recursively applies every child before dispatching this node's own
    /// queued request, if any. One call is one traversal pass;
    /// [`crate::scheduler::Scheduler`] repeats this while
    /// [`Self::pending_count`] is above zero to converge across the
    /// host-callback/apply race described on [`crate::assembly`].
    pub fn apply_node(&self, id: NodeId) -> Result<()> {
        for child in self.children(id) {
            self.apply_node(child)?;
        }
        match self.kind_tag(id)? {
            KindTag::Register => register::apply(self, id),
            KindTag::Mux => mux::apply(self, id),
            KindTag::Tap => tap::apply(self, id),
            KindTag::Network => network::apply(self, id),
            KindTag::Controller => controller::apply(self, id),
            KindTag::Portal => portal::apply(self, id),
            KindTag::Stub => stub::apply(self, id),
        }
    }

    fn dispatch_host_callback(&self, id: NodeId, rvf: Rvf) {
        let result = self.kind_tag(id).and_then(|tag| match tag {
            KindTag::Mux => mux::host_callback(self, id, rvf),
            KindTag::Tap => tap::host_callback(self, id, rvf),
            KindTag::Network => network::host_callback(self, id, rvf),
            KindTag::Controller => controller::host_callback(self, id, rvf),
            KindTag::Portal => Err(ScanModelError::NotWired(self.name(id))),
            KindTag::Stub => stub::host_callback(self, id, rvf),
            KindTag::Register => Err(ScanModelError::NotWired(self.name(id))),
        });
        if let Err(err) = result {
            self.record_error(err);
        }
    }

    /// Routes `rvf` straight to `id`'s own resp_handler, bypassing whatever
    /// interface would otherwise carry it.
    ///
    /// Used by [`network`] alone: a network's host edge can have several
    /// children with requests outstanding in the same cycle, and an
    /// [`crate::interface::AccessInterface`] only ever correlates a response
    /// with the single most recent requester on that edge (see
    /// [`crate::rvf::Rvf`]'s doc comment) — fine for every other node kind,
    /// which only ever has one child active at a time, but not enough once a
    /// network's one physical scan response has to fan back out to several
    /// children at once. The network already knows exactly which child each
    /// slice belongs to, so it hands it here directly instead of forcing
    /// that back through the single-requester correlation.
    pub(crate) fn dispatch_resp_handler_direct(&self, id: NodeId, rvf: Rvf) {
        self.dispatch_resp_handler(id, rvf);
    }

    fn dispatch_resp_handler(&self, id: NodeId, rvf: Rvf) {
        let result = self.kind_tag(id).and_then(|tag| match tag {
            KindTag::Register => register::resp_handler(self, id, rvf),
            KindTag::Mux => mux::resp_handler(self, id, rvf),
            KindTag::Tap => tap::resp_handler(self, id, rvf),
            KindTag::Network => network::resp_handler(self, id, rvf),
            KindTag::Portal => portal::resp_handler(self, id, rvf),
            KindTag::Stub => stub::resp_handler(self, id, rvf),
            KindTag::Controller => Err(ScanModelError::NotWired(self.name(id))),
        });
        if let Err(err) = result {
            self.record_error(err);
        }
    }

    // ---- path resolution -------------------------------------------------

    /// Resolves a dotted path (e.g. `"U1.BSR"`) to a node uid, starting the
    /// walk at `root`'s children — `root` itself is never a path segment,
    /// matching [`Self::get_assembly_path`], which likewise excludes `root`
    /// from the path it reconstructs, so the two are inverses of each
    /// other. Transparently recurses through invisible children without
    /// consuming a path token, mirroring how the key register and similar
    /// internal nodes never appear in a dotted path.
    pub fn get_assembly_uid(&self, root: NodeId, path: &str) -> Result<NodeId> {
        let tokens: Vec<&str> = path.split('.').collect();
        self.resolve_tokens(root, path, &tokens)
    }

    fn resolve_tokens(&self, current: NodeId, full_path: &str, tokens: &[&str]) -> Result<NodeId> {
        let Some((head, rest)) = tokens.split_first() else {
            return Ok(current);
        };
        for child in self.children(current) {
            if self.visible(child) {
                if self.name(child) == *head {
                    return self.resolve_tokens(child, full_path, rest);
                }
            } else if let Ok(found) = self.resolve_tokens(child, full_path, tokens) {
                return Ok(found);
            }
        }
        Err(ScanModelError::UnknownPathToken {
            path: full_path.to_string(),
            token: (*head).to_string(),
        })
    }

    /// Reconstructs the dotted path leading to `id`, walking up through
    /// parents and collecting only visible names. The root itself is never
    /// included — it is never a path segment `get_assembly_uid` consumes
    /// either, which is what makes the two inverses of each other.
    pub fn get_assembly_path(&self, id: NodeId) -> Result<String> {
        self.ensure_valid(id)?;
        let mut segments = Vec::new();
        let mut current = id;
        loop {
            let Some(parent) = self.parent(current) else {
                break;
            };
            if self.visible(current) {
                segments.push(self.name(current));
            }
            current = parent;
        }
        segments.reverse();
        Ok(segments.join("."))
    }

    /// The `LISTCB` diagnostic: a comma-separated list of the commands `id`
    /// answers, including the `LISTCB` entry itself that every node
    /// implicitly supports.
    pub fn list_callbacks(&self, id: NodeId) -> Result<String> {
        self.ensure_valid(id)?;
        let nodes = self.0.nodes.read();
        let node = &nodes[id as usize];
        let names: Vec<&'static str> = node.kind.supported_commands().iter().map(|c| c.as_str()).collect();
        Ok(names.join(","))
    }

    /// Renders the whole tree (including invisible nodes) as an indented
    /// diagnostic dump: kind, name, uid, and whether a node currently
    /// reports a pending access.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        if let Some(root) = self.root() {
            self.dump_node(root, 0, &mut out);
        }
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        let nodes = self.0.nodes.read();
        let Some(node) = nodes.get(id as usize) else {
            return;
        };
        let kind = node.kind.kind_name();
        let pending = node.kind.is_pending();
        out.push_str(&"  ".repeat(depth));
        out.push_str(&format!(
            "{kind} '{name}' (uid {uid}{visible}{pending_mark})\n",
            name = node.name,
            uid = node.uid,
            visible = if node.visible { "" } else { ", hidden" },
            pending_mark = if pending { ", pending" } else { "" },
        ));
        let children = node.children.clone();
        drop(nodes);
        for child in children {
            self.dump_node(child, depth + 1, out);
        }
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

fn wrong_kind(name: &str, expected: &str) -> ScanModelError {
    ScanModelError::Other(anyhow::anyhow!("node '{name}' is not a {expected}"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::description::RegisterDescription;

    #[test]
    fn path_resolution_round_trips() {
        let topology = Topology::new();
        let leaf = topology.define_data_register(
            RegisterDescription::new("bsr", 4, BitVector::zeros(4)).unwrap(),
            Direction::ReadWrite,
        );
        let root = topology.define_data_register(
            RegisterDescription::new("u1", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        topology.wire_children(root, &[leaf]).unwrap();
        topology.set_root(root).unwrap();

        let found = topology.get_assembly_uid(root, "bsr").unwrap();
        assert_eq!(found, leaf);

        let path = topology.get_assembly_path(leaf).unwrap();
        assert_eq!(path, "bsr");
        assert_eq!(topology.get_assembly_uid(root, &path).unwrap(), leaf);
    }

    #[test]
    fn mux_is_invisible_in_dotted_paths() {
        let topology = Topology::new();
        let ir = topology.define_scan_register(
            RegisterDescription::new("ir", 4, BitVector::zeros(4)).unwrap(),
            Direction::ReadWrite,
        );
        let bypass = topology.define_scan_register(
            RegisterDescription::new("bypass", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        let mut desc = crate::description::MuxDescription::new("m1", 4).unwrap();
        desc.add_entry(BitVector::from_u64(0, 4), None, bypass).unwrap();
        let m1 = topology.define_scan_mux(desc, ir).unwrap();
        topology.wire_children(m1, &[bypass]).unwrap();
        let tap = topology
            .define_tap(crate::description::TapDescription::new("u1", 4).unwrap(), ir, m1)
            .unwrap();
        topology.set_root(tap).unwrap();

        // "bypass" resolves straight through the mux without "m1" appearing
        // in the path, and the reverse path omits it (and the root "u1")
        // too, so the two directions round-trip.
        assert_eq!(topology.get_assembly_uid(tap, "bypass").unwrap(), bypass);
        let path = topology.get_assembly_path(bypass).unwrap();
        assert_eq!(path, "bypass");
        assert_eq!(topology.get_assembly_uid(tap, &path).unwrap(), bypass);
    }

    #[test]
    fn define_mux_rejects_keyreg_length_mismatch() {
        let topology = Topology::new();
        let keyreg = topology.define_data_register(
            RegisterDescription::new("keyreg", 2, BitVector::zeros(2)).unwrap(),
            Direction::ReadWrite,
        );
        let desc = crate::description::MuxDescription::new("m1", 4).unwrap();
        let err = topology.define_data_mux(desc, keyreg).unwrap_err();
        assert!(matches!(err, ScanModelError::LengthMismatch { .. }));
    }

    #[test]
    fn unknown_token_is_an_error() {
        let topology = Topology::new();
        let root = topology.define_data_register(
            RegisterDescription::new("u1", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        topology.set_root(root).unwrap();
        let err = topology.get_assembly_uid(root, "missing").unwrap_err();
        assert!(matches!(err, ScanModelError::UnknownPathToken { .. }));
    }

    #[test]
    fn wire_children_rejects_duplicate_names() {
        let topology = Topology::new();
        let a = topology.define_data_register(
            RegisterDescription::new("x", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        let b = topology.define_data_register(
            RegisterDescription::new("x", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        let root = topology.define_data_register(
            RegisterDescription::new("root", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        let err = topology.wire_children(root, &[a, b]).unwrap_err();
        assert!(matches!(err, ScanModelError::DuplicateChildName(_)));
    }

    #[test]
    fn wire_children_rejects_leaf_parent() {
        let topology = Topology::new();
        let leaf = topology.define_data_register(
            RegisterDescription::new("leaf", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        let other = topology.define_data_register(
            RegisterDescription::new("other", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        let err = topology.wire_children(leaf, &[other]).unwrap_err();
        assert!(matches!(err, ScanModelError::LeafCannotHaveChildren(_)));
    }

    #[test]
    fn list_callbacks_includes_protocol_commands_and_listcb_itself() {
        let topology = Topology::new();
        let root = topology.define_data_register(
            RegisterDescription::new("u1", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        topology.set_root(root).unwrap();
        assert_eq!(topology.list_callbacks(root).unwrap(), "WRITE,READ,WRITE_READ,LISTCB");
    }
}
