//! The bidirectional, asynchronous edge connecting adjacent nodes in a scan
//! tree.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use parking_lot::Mutex;

use crate::rvf::Rvf;
use crate::NodeId;

type ReqCallback = Box<dyn Fn(Rvf) + Send + Sync>;
type RespCallback = Box<dyn Fn(Rvf) + Send + Sync>;

/// The writable half of a global stop signal, shared by every
/// [`AccessInterface`] a [`crate::scheduler::Scheduler`] owns.
///
/// Dropping (or calling [`StopSwitch::stop`] on) the last `StopSwitch`
/// disconnects the channel every [`StopWatch`] clone is listening on, which
/// wakes every worker thread at once — the channel-closure broadcast is the
/// mechanism, not any message actually sent.
pub struct StopSwitch {
    tx: Option<Sender<()>>,
    watch: StopWatch,
}

impl StopSwitch {
    /// Creates a new stop switch, not yet tripped.
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        StopSwitch {
            tx: Some(tx),
            watch: StopWatch(rx),
        }
    }

    /// Hands out a clone-able watcher that [`AccessInterface`] worker
    /// threads select on.
    pub fn watch(&self) -> StopWatch {
        self.watch.clone()
    }

    /// Trips the switch: every outstanding [`StopWatch`] observes a closed
    /// channel on its next `select!` iteration.
    pub fn stop(&mut self) {
        self.tx.take();
    }
}

impl Default for StopSwitch {
    fn default() -> Self {
        Self::new()
    }
}

/// A clone-able handle workers use to notice a [`StopSwitch::stop`] call.
#[derive(Clone)]
pub struct StopWatch(Receiver<()>);

impl StopWatch {
    fn receiver(&self) -> &Receiver<()> {
        &self.0
    }
}

/// An async, bidirectional edge between a host (parent-side) node and one or
/// more client (child-side) nodes.
///
/// Requests always flow toward a single registered host callback: whichever
/// node owns this interface's host side. Responses flow back out to
/// whichever child most recently issued a request across this edge — nodes
/// that expect a response register themselves in [`Self::set_resp_callback`]
/// keyed by their own uid, but the dispatch key actually used at response
/// time is the uid captured off the *request*, matching spec behavior where
/// an interface only ever has one request outstanding at a time.
///
/// Two unbounded FIFOs and two dedicated worker threads implement this:
/// enqueuing never blocks the caller, and callbacks run off the caller's
/// stack, decoupling a child's `apply()` step from the host's handling of
/// it.
pub struct AccessInterface {
    shared: Arc<Shared>,
    req_tx: Sender<Rvf>,
    resp_tx: Sender<Rvf>,
}

struct Shared {
    req_cb: Mutex<Option<ReqCallback>>,
    resp_cbs: Mutex<HashMap<NodeId, RespCallback>>,
    current_uid: Mutex<Option<NodeId>>,
}

impl AccessInterface {
    /// Builds a new interface and spawns its two worker threads. Workers
    /// exit as soon as `stop` observes its switch being tripped, or this
    /// interface's own FIFOs are dropped.
    pub fn new(stop: StopWatch) -> Self {
        let shared = Arc::new(Shared {
            req_cb: Mutex::new(None),
            resp_cbs: Mutex::new(HashMap::new()),
            current_uid: Mutex::new(None),
        });

        let (req_tx, req_rx) = unbounded::<Rvf>();
        let (resp_tx, resp_rx) = unbounded::<Rvf>();

        spawn_req_worker(Arc::clone(&shared), req_rx, stop.clone());
        spawn_resp_worker(Arc::clone(&shared), resp_rx, stop);

        AccessInterface {
            shared,
            req_tx,
            resp_tx,
        }
    }

    /// Registers the single callback invoked for every request crossing this
    /// interface. Only one host ever owns an interface's host side, so a
    /// second call replaces the first.
    pub fn set_req_callback(&self, cb: impl Fn(Rvf) + Send + Sync + 'static) {
        *self.shared.req_cb.lock() = Some(Box::new(cb));
    }

    /// Registers the callback invoked for responses addressed to `uid`.
    pub fn set_resp_callback(&self, uid: NodeId, cb: impl Fn(Rvf) + Send + Sync + 'static) {
        self.shared.resp_cbs.lock().insert(uid, Box::new(cb));
    }

    /// Enqueues a request. Returns immediately; the registered request
    /// callback runs on this interface's worker thread.
    pub fn request(&self, rvf: Rvf) {
        tracing::trace!(uid = rvf.uid, command = %rvf.command, "access interface request enqueued");
        let _ = self.req_tx.send(rvf);
    }

    /// Enqueues a response. Returns immediately; the response callback
    /// registered for whichever uid most recently requested across this
    /// edge runs on this interface's worker thread.
    pub fn response(&self, rvf: Rvf) {
        tracing::trace!(uid = rvf.uid, command = %rvf.command, "access interface response enqueued");
        let _ = self.resp_tx.send(rvf);
    }
}

fn spawn_req_worker(shared: Arc<Shared>, req_rx: Receiver<Rvf>, stop: StopWatch) {
    thread::Builder::new()
        .name("scan-model-access-req".into())
        .spawn(move || loop {
            select! {
                recv(req_rx) -> msg => match msg {
                    Ok(rvf) => {
                        *shared.current_uid.lock() = Some(rvf.uid);
                        let cb = shared.req_cb.lock();
                        if let Some(cb) = cb.as_ref() {
                            cb(rvf);
                        } else {
                            tracing::warn!(uid = rvf.uid, "request dropped: no host callback registered");
                        }
                    }
                    Err(_) => break,
                },
                recv(stop.receiver()) -> _ => break,
            }
        })
        .expect("spawn access interface request worker");
}

fn spawn_resp_worker(shared: Arc<Shared>, resp_rx: Receiver<Rvf>, stop: StopWatch) {
    thread::Builder::new()
        .name("scan-model-access-resp".into())
        .spawn(move || loop {
            select! {
                recv(resp_rx) -> msg => match msg {
                    Ok(rvf) => {
                        let current = *shared.current_uid.lock();
                        if let Some(uid) = current {
                            let cbs = shared.resp_cbs.lock();
                            if let Some(cb) = cbs.get(&uid) {
                                cb(rvf);
                            } else {
                                tracing::warn!(uid, "response dropped: no client callback registered for current uid");
                            }
                        } else {
                            tracing::warn!("response dropped: no request has crossed this interface yet");
                        }
                    }
                    Err(_) => break,
                },
                recv(stop.receiver()) -> _ => break,
            }
        })
        .expect("spawn access interface response worker");
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bitvector::BitVector;
    use crate::rvf::Command;

    #[test]
    fn request_invokes_registered_host_callback() {
        let mut stop = StopSwitch::new();
        let interface = AccessInterface::new(stop.watch());

        let (tx, rx) = mpsc::channel();
        interface.set_req_callback(move |rvf| {
            tx.send(rvf.uid).unwrap();
        });

        interface.request(Rvf::new(7, Command::Write, BitVector::zeros(4)));
        let got = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(got, 7);

        stop.stop();
    }

    #[test]
    fn response_dispatches_to_uid_of_most_recent_request() {
        let mut stop = StopSwitch::new();
        let interface = AccessInterface::new(stop.watch());

        let (tx, rx) = mpsc::channel();
        interface.set_resp_callback(3, move |rvf| {
            tx.send(rvf.command).unwrap();
        });
        interface.set_req_callback(|_| {});

        interface.request(Rvf::new(3, Command::Read, BitVector::zeros(0)));
        interface.response(Rvf::new(3, Command::Read, BitVector::from_u64(1, 4)));

        let got = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(got, Command::Read);

        stop.stop();
    }
}
