//! The cycle engine: batches pending leaf accesses, drives the `apply`
//! traversal to convergence, and hands the user a path-addressed
//! `write`/`write_read`/`read`/`apply` façade.
//!
//! A worker thread owns the traversal. The public `apply()` call and the
//! worker rendezvous across a pair of single-pulse `crossbeam_channel`
//! bounded(1) channels — one carrying the "start a cycle" pulse, the other
//! carrying the cycle's result back — without the lost-wakeup hazard a bare
//! condition variable invites (see [`crate::assembly::portal`]'s own note
//! on that).

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::bitvector::BitVector;
use crate::error::{Result, ScanModelError};
use crate::topology::Topology;
use crate::NodeId;

/// How long [`Scheduler::apply`] waits for one cycle to converge before
/// giving up. `Duration::ZERO` disables the watchdog entirely, mirroring
/// `watchdog_us = 0`.
const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(5);

struct WorkerParts {
    start_rx: Receiver<()>,
    done_tx: Sender<Result<()>>,
}

struct Inner {
    topology: Topology,
    root: NodeId,
    apply_timeout: Duration,
    start_tx: Mutex<Option<Sender<()>>>,
    done_rx: Mutex<Option<Receiver<Result<()>>>>,
    worker_parts: Mutex<Option<WorkerParts>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// A process-wide façade driving one [`Topology`] to convergence.
///
/// Cloning a `Scheduler` is cheap and every clone drives the same
/// underlying worker thread and topology.
#[derive(Clone)]
pub struct Scheduler(Arc<Inner>);

impl Scheduler {
    /// Builds a scheduler over `topology`, rooted at `root`, with the
    /// default apply watchdog. The worker thread is not spawned until
    /// [`Self::start`] is called (or implicitly, the first time
    /// [`Self::apply`] is).
    pub fn new(topology: Topology, root: NodeId) -> Self {
        Self::with_apply_timeout(topology, root, DEFAULT_APPLY_TIMEOUT)
    }

    /// Builds a scheduler with an explicit apply watchdog. `Duration::ZERO`
    /// disables it.
    pub fn with_apply_timeout(topology: Topology, root: NodeId, apply_timeout: Duration) -> Self {
        let (start_tx, start_rx) = bounded(1);
        let (done_tx, done_rx) = bounded(1);
        Scheduler(Arc::new(Inner {
            topology,
            root,
            apply_timeout,
            start_tx: Mutex::new(Some(start_tx)),
            done_rx: Mutex::new(Some(done_rx)),
            worker_parts: Mutex::new(Some(WorkerParts { start_rx, done_tx })),
            handle: Mutex::new(None),
        }))
    }

    /// Spawns the worker thread. Idempotent: calling this again (or after
    /// [`Self::apply`] has already started it) is a no-op.
    pub fn start(&self) {
        let mut handle = self.0.handle.lock();
        if handle.is_some() {
            return;
        }
        let Some(parts) = self.0.worker_parts.lock().take() else {
            return;
        };
        let topology = self.0.topology.clone();
        let root = self.0.root;
        let apply_timeout = self.0.apply_timeout;
        let spawned = thread::Builder::new()
            .name("scan-model-scheduler".into())
            .spawn(move || {
                while parts.start_rx.recv().is_ok() {
                    let result = drive_to_convergence(&topology, root, apply_timeout);
                    if parts.done_tx.send(result).is_err() {
                        break;
                    }
                }
            })
            .expect("spawn scheduler worker thread");
        *handle = Some(spawned);
    }

    /// Trips the topology's stop event (shutting down every
    /// [`crate::interface::AccessInterface`] worker thread) and joins the
    /// scheduler's own worker.
    pub fn stop(&self) {
        self.0.start_tx.lock().take();
        self.0.topology.stop();
        if let Some(handle) = self.0.handle.lock().take() {
            let _ = handle.join();
        }
    }

    /// Queues a plain write at `path`. Does not itself wait for completion;
    /// call [`Self::apply`] to drive the cycle.
    pub fn write(&self, path: &str, value: BitVector) -> Result<()> {
        let id = self.resolve(path)?;
        self.0.topology.dispatch_write(id, value)
    }

    /// Queues a capturing write-read at `path`. The captured value becomes
    /// visible through [`Self::read`] once [`Self::apply`] has converged.
    pub fn write_read(&self, path: &str, value: BitVector) -> Result<()> {
        let id = self.resolve(path)?;
        self.0.topology.dispatch_write_read(id, value)
    }

    /// Returns the most recently captured value at `path`.
    pub fn read(&self, path: &str) -> Result<BitVector> {
        let id = self.resolve(path)?;
        self.0.topology.dispatch_read(id)
    }

    /// Drives one batched cycle to completion: starts the worker if it is
    /// not already running, signals it, and blocks until every access
    /// queued since the last `apply()` has been dispatched and answered (or
    /// the watchdog fires).
    pub fn apply(&self) -> Result<()> {
        self.start();
        let start_tx = self.0.start_tx.lock();
        let tx = start_tx
            .as_ref()
            .ok_or_else(|| ScanModelError::Sync("scheduler is stopped".into()))?;
        tx.send(())
            .map_err(|_| ScanModelError::Sync("scheduler worker is not running".into()))?;
        drop(start_tx);

        let done_rx = self.0.done_rx.lock();
        let rx = done_rx
            .as_ref()
            .ok_or_else(|| ScanModelError::Sync("scheduler is stopped".into()))?;
        rx.recv()
            .map_err(|_| ScanModelError::Sync("scheduler worker disconnected before finishing".into()))?
    }

    fn resolve(&self, path: &str) -> Result<NodeId> {
        self.0.topology.get_assembly_uid(self.0.root, path)
    }
}

/// Repeatedly runs one [`Topology::apply_node`] pass over `root` while any
/// access remains outstanding. Sleeps briefly between passes so the
/// [`crate::interface::AccessInterface`] worker threads get a chance to run
/// host callbacks and resp_handlers queued by the previous pass.
fn drive_to_convergence(topology: &Topology, root: NodeId, timeout: Duration) -> Result<()> {
    let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
    while topology.pending_count() > 0 {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return Err(ScanModelError::Sync(format!(
                    "apply did not converge within {timeout:?} ({count} access(es) still pending)",
                    count = topology.pending_count()
                )));
            }
        }
        topology.apply_node(root)?;
        if topology.pending_count() > 0 {
            thread::sleep(Duration::from_micros(200));
        }
    }
    match topology.take_error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::assembly::register::Direction;
    use crate::description::RegisterDescription;
    use crate::driver::LoopbackController;

    fn board() -> (Topology, NodeId) {
        let topology = Topology::new();
        let ir = topology.define_scan_register(
            RegisterDescription::new("ir", 4, BitVector::zeros(4)).unwrap(),
            Direction::ReadWrite,
        );
        let bypass = topology.define_data_register(
            RegisterDescription::new("bypass", 1, BitVector::zeros(1)).unwrap(),
            Direction::ReadWrite,
        );
        let mut desc = crate::description::MuxDescription::new("drmux", 4).unwrap();
        desc.add_entry(BitVector::from_u64(0, 4), None, bypass).unwrap();
        let drmux = topology.define_scan_mux(desc, ir).unwrap();
        topology.wire_children(drmux, &[bypass]).unwrap();
        let tap = topology
            .define_tap(crate::description::TapDescription::new("u1", 4).unwrap(), ir, drmux)
            .unwrap();
        let controller = topology
            .define_jtag_controller_assembly("jc1", Arc::new(LoopbackController), tap)
            .unwrap();
        topology.set_root(controller).unwrap();
        (topology, controller)
    }

    #[test]
    fn write_read_round_trips_through_a_loopback_controller() {
        let (topology, root) = board();
        let scheduler = Scheduler::new(topology, root);
        scheduler.write_read("u1.bypass", BitVector::from_u64(1, 1)).unwrap();
        scheduler.apply().unwrap();
        assert_eq!(scheduler.read("u1.bypass").unwrap(), BitVector::from_u64(1, 1));
        scheduler.stop();
    }

    #[test]
    fn apply_with_nothing_queued_converges_immediately() {
        let (topology, root) = board();
        let scheduler = Scheduler::new(topology, root);
        scheduler.apply().unwrap();
        scheduler.stop();
    }

    #[test]
    fn unresolved_path_is_reported_before_queuing() {
        let (topology, root) = board();
        let scheduler = Scheduler::new(topology, root);
        let err = scheduler.write("u1.nonexistent", BitVector::zeros(1)).unwrap_err();
        assert!(matches!(err, ScanModelError::UnknownPathToken { .. }));
        scheduler.stop();
    }
}
