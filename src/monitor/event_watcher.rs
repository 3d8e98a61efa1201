//! Process lifecycle event subscription
//!
//! Owns a dedicated worker thread that subscribes to OS process start/stop
//! notifications. The preferred high-fidelity trace stream needs elevated
//! privileges; when it is refused, the watcher falls back to the
//! lower-fidelity instance creation/deletion stream and periodically retries
//! the trace stream in the background.
//!
//! # State machine
//!
//! ```text
//! Unavailable ──Start()──▶ Trace
//!       │                    ▲
//!       │            recovery│(every 30s, unless suppressed)
//!       └──Start()──▶ Instance
//!
//! any state ──Stop()──▶ Unavailable
//! ```
//!
//! A permission failure on the trace stream is remembered for the session:
//! further automatic trace attempts are suppressed so the watcher does not
//! hammer a subscription it can never get. If both streams fail, the watcher
//! reports `Unavailable` and the caller relies on its periodic polling
//! backstop.
//!
//! # Threading
//!
//! The underlying subscription API requires that all handles are created,
//! polled, and torn down on one thread. Every public operation enqueues a
//! command to the worker and blocks on a synchronous acknowledgement with a
//! bounded timeout; callers never touch the handles. Event notifications are
//! forwarded over an unbounded channel so dispatch never blocks the worker.
//! Malformed payloads (missing pid or name) are dropped silently.

use crate::error::{HdrSyncError, Result};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, warn};

/// Which notification stream a subscription uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// High-fidelity process start/stop trace stream (needs privileges)
    Trace,
    /// Lower-fidelity instance creation/deletion stream
    Instance,
}

/// Watcher state as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// No active subscription
    Unavailable,
    /// Subscribed to the trace stream
    Trace,
    /// Subscribed to the fallback instance stream
    Instance,
}

/// Start or stop of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A process started
    Started,
    /// A process stopped
    Stopped,
}

/// One event as delivered by a stream, possibly partially populated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawProcessEvent {
    /// Start or stop
    pub kind: EventKind,
    /// Process id, when the payload carried one
    pub pid: Option<u32>,
    /// Process name, when the payload carried one
    pub name: Option<String>,
}

/// One complete, validated event dispatched to the consumer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessLifecycleEvent {
    /// Start or stop
    pub kind: EventKind,
    /// Process id
    pub pid: u32,
    /// Process name
    pub name: String,
    /// Monotonic sequence id assigned on dispatch
    pub sequence: u64,
    /// Which stream delivered the event
    pub stream: StreamMode,
    /// When the worker observed the event
    pub observed_at: SystemTime,
}

/// An open notification stream, polled by the worker
pub trait EventStream {
    /// Wait up to `timeout` for events and return everything that is ready
    fn poll(&mut self, timeout: Duration) -> Result<Vec<RawProcessEvent>>;
}

/// Opens notification streams on the worker thread
///
/// The factory is moved into the worker, so any thread-affine setup (COM
/// apartment and friends) happens where the handles will live.
pub trait EventStreamFactory: Send + 'static {
    /// Open a subscription in the requested mode
    fn open(&mut self, mode: StreamMode) -> Result<Box<dyn EventStream>>;
}

/// Tuning knobs for the watcher
#[derive(Debug, Clone)]
pub struct WatcherOptions {
    /// How often to retry the trace stream while on the fallback stream
    pub recovery_interval: Duration,
    /// How long callers wait for the worker to acknowledge an operation
    pub op_timeout: Duration,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            recovery_interval: Duration::from_secs(30),
            op_timeout: Duration::from_secs(5),
        }
    }
}

/// How long the worker waits for events in one poll pass
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// How long the worker sleeps on its command channel while idle
const IDLE_WAIT: Duration = Duration::from_millis(250);

/// Consecutive poll failures tolerated before the subscription is torn down
const MAX_POLL_FAILURES: u32 = 5;

enum WatcherCommand {
    Start(mpsc::SyncSender<Result<WatcherState>>),
    Stop(mpsc::SyncSender<()>),
    TrySwitchToTrace(mpsc::SyncSender<Result<bool>>),
    QueryState(mpsc::SyncSender<WatcherState>),
    Shutdown,
}

/// Handle to the process event worker
///
/// All public operations are marshaled onto the worker thread and block the
/// caller until the worker confirms completion, bounded by
/// [`WatcherOptions::op_timeout`].
pub struct ProcessEventWatcher {
    command_tx: mpsc::Sender<WatcherCommand>,
    op_timeout: Duration,
    handle: Option<JoinHandle<()>>,
}

impl ProcessEventWatcher {
    /// Spawn the worker thread; no subscription is attempted until
    /// [`ProcessEventWatcher::start`]
    pub fn spawn<F: EventStreamFactory>(
        factory: F,
        event_tx: mpsc::Sender<ProcessLifecycleEvent>,
        options: WatcherOptions,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel();
        let recovery_interval = options.recovery_interval;
        let handle = std::thread::Builder::new()
            .name("process-events".to_string())
            .spawn(move || {
                Worker::new(factory, event_tx, recovery_interval).run(&command_rx);
            })
            .expect("failed to spawn process event worker thread");

        Self {
            command_tx,
            op_timeout: options.op_timeout,
            handle: Some(handle),
        }
    }

    /// Subscribe, preferring the trace stream and falling back to the
    /// instance stream; returns the resulting state
    pub fn start(&self) -> Result<WatcherState> {
        self.request(WatcherCommand::Start)?
    }

    /// Tear down any active subscription
    ///
    /// A timeout here is treated as best-effort: the teardown still happens
    /// on the worker whenever it gets there, and shutdown must not fail over
    /// it.
    pub fn stop(&self) {
        if self.request(WatcherCommand::Stop).is_err() {
            warn!("Event worker did not confirm stop in time; teardown is best-effort");
        }
    }

    /// Attempt to switch from the fallback stream to the trace stream
    ///
    /// No-op success when already on the trace stream; fails immediately
    /// when trace retries are suppressed for the session.
    pub fn try_switch_to_trace(&self) -> Result<bool> {
        self.request(WatcherCommand::TrySwitchToTrace)?
    }

    /// Current watcher state
    pub fn state(&self) -> WatcherState {
        self.request(WatcherCommand::QueryState)
            .unwrap_or(WatcherState::Unavailable)
    }

    fn request<T>(
        &self,
        make: impl FnOnce(mpsc::SyncSender<T>) -> WatcherCommand,
    ) -> Result<T> {
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        self.command_tx
            .send(make(ack_tx))
            .map_err(|_| HdrSyncError::WorkerUnavailable("worker thread exited".to_string()))?;
        ack_rx.recv_timeout(self.op_timeout).map_err(|_| {
            HdrSyncError::WorkerUnavailable("timed out waiting for event worker".to_string())
        })
    }
}

impl Drop for ProcessEventWatcher {
    fn drop(&mut self) {
        let _ = self.command_tx.send(WatcherCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct Worker<F> {
    factory: F,
    event_tx: mpsc::Sender<ProcessLifecycleEvent>,
    active: Option<(StreamMode, Box<dyn EventStream>)>,
    state: WatcherState,
    trace_suppressed: bool,
    last_recovery_attempt: Instant,
    recovery_interval: Duration,
    sequence: u64,
    poll_failures: u32,
}

impl<F: EventStreamFactory> Worker<F> {
    fn new(
        factory: F,
        event_tx: mpsc::Sender<ProcessLifecycleEvent>,
        recovery_interval: Duration,
    ) -> Self {
        Self {
            factory,
            event_tx,
            active: None,
            state: WatcherState::Unavailable,
            trace_suppressed: false,
            last_recovery_attempt: Instant::now(),
            recovery_interval,
            sequence: 0,
            poll_failures: 0,
        }
    }

    fn run(mut self, command_rx: &mpsc::Receiver<WatcherCommand>) {
        debug!("Process event worker started");
        loop {
            match command_rx.try_recv() {
                Ok(command) => {
                    if self.handle_command(command) {
                        break;
                    }
                    continue;
                }
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            if self.active.is_some() {
                self.maybe_recover_trace();
                self.poll_active();
            } else {
                // Idle: nothing to poll, block on the command channel
                match command_rx.recv_timeout(IDLE_WAIT) {
                    Ok(command) => {
                        if self.handle_command(command) {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }
        self.teardown();
        debug!("Process event worker exited");
    }

    /// Returns true when the worker should shut down
    fn handle_command(&mut self, command: WatcherCommand) -> bool {
        match command {
            WatcherCommand::Start(ack) => {
                let result = self.do_start();
                let _ = ack.send(result);
                false
            }
            WatcherCommand::Stop(ack) => {
                self.teardown();
                let _ = ack.send(());
                false
            }
            WatcherCommand::TrySwitchToTrace(ack) => {
                let result = self.try_switch_to_trace();
                let _ = ack.send(result);
                false
            }
            WatcherCommand::QueryState(ack) => {
                let _ = ack.send(self.state);
                false
            }
            WatcherCommand::Shutdown => true,
        }
    }

    fn do_start(&mut self) -> Result<WatcherState> {
        if self.active.is_some() {
            return Ok(self.state);
        }

        match self.factory.open(StreamMode::Trace) {
            Ok(stream) => {
                self.install(StreamMode::Trace, stream);
                info!("Subscribed to process trace stream");
                return Ok(self.state);
            }
            Err(e) => {
                if e.is_permission_denied() {
                    warn!(
                        "Trace stream denied, suppressing further trace attempts this session: {e}"
                    );
                    self.trace_suppressed = true;
                } else {
                    warn!("Trace stream unavailable: {e}");
                }
            }
        }

        match self.factory.open(StreamMode::Instance) {
            Ok(stream) => {
                self.install(StreamMode::Instance, stream);
                self.last_recovery_attempt = Instant::now();
                info!("Subscribed to fallback instance stream");
                Ok(self.state)
            }
            Err(e) => {
                self.state = WatcherState::Unavailable;
                error!("Both event streams unavailable, relying on polling: {e}");
                Err(e)
            }
        }
    }

    fn try_switch_to_trace(&mut self) -> Result<bool> {
        if self.state == WatcherState::Trace {
            return Ok(true);
        }
        if self.trace_suppressed {
            return Err(HdrSyncError::SubscriptionDenied(
                "trace stream retries suppressed for this session".to_string(),
            ));
        }

        self.last_recovery_attempt = Instant::now();
        match self.factory.open(StreamMode::Trace) {
            Ok(stream) => {
                // Install the new subscription first, then tear down the old
                // one, so no event window exists without a subscription
                let replaced = self.active.replace((StreamMode::Trace, stream));
                self.state = WatcherState::Trace;
                self.poll_failures = 0;
                drop(replaced);
                info!("Switched to process trace stream");
                Ok(true)
            }
            Err(e) => {
                if e.is_permission_denied() {
                    warn!("Trace stream still denied, suppressing further attempts: {e}");
                    self.trace_suppressed = true;
                }
                Err(e)
            }
        }
    }

    /// Timer-driven recovery transition: while on the fallback stream and
    /// not suppressed, periodically try to get the trace stream back
    fn maybe_recover_trace(&mut self) {
        if self.state != WatcherState::Instance
            || self.trace_suppressed
            || self.last_recovery_attempt.elapsed() < self.recovery_interval
        {
            return;
        }
        match self.try_switch_to_trace() {
            Ok(_) => {}
            Err(e) => debug!("Trace recovery attempt failed: {e}"),
        }
    }

    fn poll_active(&mut self) {
        let Some((mode, stream)) = self.active.as_mut() else {
            return;
        };
        let mode = *mode;

        match stream.poll(POLL_TIMEOUT) {
            Ok(events) => {
                self.poll_failures = 0;
                for raw in events {
                    self.dispatch(mode, raw);
                }
            }
            Err(e) => {
                self.poll_failures += 1;
                warn!(
                    "Event stream poll failed ({}/{MAX_POLL_FAILURES}): {e}",
                    self.poll_failures
                );
                if self.poll_failures >= MAX_POLL_FAILURES {
                    error!("Event stream failing persistently, tearing down subscription");
                    self.teardown();
                }
            }
        }
    }

    fn dispatch(&mut self, stream: StreamMode, raw: RawProcessEvent) {
        // Malformed payloads are dropped without surfacing anything
        let (Some(pid), Some(name)) = (raw.pid, raw.name) else {
            debug!("Dropping partially-populated event payload");
            return;
        };

        self.sequence += 1;
        let event = ProcessLifecycleEvent {
            kind: raw.kind,
            pid,
            name,
            sequence: self.sequence,
            stream,
            observed_at: SystemTime::now(),
        };
        // Unbounded send never blocks the worker; a closed consumer just
        // means nobody is listening anymore
        let _ = self.event_tx.send(event);
    }

    fn teardown(&mut self) {
        if self.active.take().is_some() {
            info!("Process event subscription torn down");
        }
        self.state = WatcherState::Unavailable;
        self.poll_failures = 0;
    }

    fn install(&mut self, mode: StreamMode, stream: Box<dyn EventStream>) {
        self.active = Some((mode, stream));
        self.state = match mode {
            StreamMode::Trace => WatcherState::Trace,
            StreamMode::Instance => WatcherState::Instance,
        };
        self.poll_failures = 0;
    }
}
