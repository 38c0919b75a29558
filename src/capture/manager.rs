use log::{debug, info, warn};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::console::status::StatusReport;
use crate::models::filter::DisplayFilter;
use crate::models::packet::{PacketRecord, Protocol};
use crate::models::stats::{CaptureStats, StatsSnapshot};

/// How often the supervisor re-checks the running flag
pub const SUPERVISOR_TICK: Duration = Duration::from_millis(200);

/// Operator-controlled flags read by the ingestion loop on every packet
#[derive(Debug, Clone, Default)]
pub struct ControlState {
    /// Rendering suspended; statistics keep counting
    pub paused: bool,

    /// Active display filter
    pub filter: DisplayFilter,
}

/// Receiving side of the shutdown signal
pub type ShutdownListener = watch::Receiver<bool>;

/// Shared state of one capture run.
///
/// Owned behind an `Arc` by the ingestion loop, the command loop and the
/// supervisor. Statistics and control flags sit behind separate mutexes so
/// a status report never waits on a filter change and vice versa.
pub struct CaptureManager {
    /// Counters and rate window; every access goes through this lock
    stats: Mutex<CaptureStats>,

    /// Pause flag and display filter
    control: Mutex<ControlState>,

    /// `true` once the run has been stopped. Flips exactly once.
    shutdown: watch::Sender<bool>,
}

impl CaptureManager {
    /// Create the state for a new run
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            stats: Mutex::new(CaptureStats::started_at(Instant::now())),
            control: Mutex::new(ControlState::default()),
            shutdown,
        }
    }

    /// Count one ingested packet
    pub fn record_packet(&self, protocol: Protocol) {
        self.stats.lock().record(protocol, Instant::now());
    }

    /// Copy of the current counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.lock().snapshot()
    }

    /// Whether `packet` should be printed: not paused and accepted by the filter
    pub fn should_render(&self, packet: &PacketRecord) -> bool {
        let control = self.control.lock();
        !control.paused && control.filter.matches(packet)
    }

    pub fn set_paused(&self, paused: bool) {
        self.control.lock().paused = paused;
        debug!("Rendering {}", if paused { "paused" } else { "resumed" });
    }

    /// Replace the display filter wholesale
    pub fn set_filter(&self, filter: DisplayFilter) {
        debug!("Display filter set to {} ({:?})", filter, filter.rule());
        self.control.lock().filter = filter;
    }

    /// Snapshot of statistics and control state for the status line
    pub fn status(&self) -> StatusReport {
        let stats = self.stats();
        let control = self.control.lock();
        StatusReport {
            stats,
            paused: control.paused,
            filter: control.filter.expression().to_string(),
        }
    }

    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow()
    }

    /// Stop the run. Returns `true` for the call that actually flipped the flag.
    pub fn stop(&self) -> bool {
        let flipped = self.shutdown.send_if_modified(|stopped| {
            if *stopped {
                false
            } else {
                *stopped = true;
                true
            }
        });
        if flipped {
            info!("Capture run stopping");
        }
        flipped
    }

    /// Subscribe to the shutdown signal
    pub fn shutdown_listener(&self) -> ShutdownListener {
        self.shutdown.subscribe()
    }

    /// Block until the run is stopped by a command, the end of the provider
    /// stream, or an interrupt from the terminal.
    pub async fn wait_for_shutdown(&self) {
        let mut listener = self.shutdown_listener();
        let mut tick = tokio::time::interval(SUPERVISOR_TICK);
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);
        let mut interrupt_armed = true;

        loop {
            tokio::select! {
                _ = stopped(&mut listener) => break,
                result = &mut interrupt, if interrupt_armed => match result {
                    Ok(()) => {
                        info!("Interrupt received");
                        self.stop();
                        break;
                    }
                    Err(e) => {
                        warn!("Unable to listen for interrupts: {}", e);
                        interrupt_armed = false;
                    }
                },
                _ = tick.tick() => {
                    if !self.is_running() {
                        break;
                    }
                }
            }
        }
    }
}

/// Resolve once the run has been stopped
pub async fn stopped(listener: &mut ShutdownListener) {
    // A dropped sender means the manager is gone, which is a stop as well.
    let _ = listener.wait_for(|stopped| *stopped).await;
}
