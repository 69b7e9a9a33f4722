//! Async scan session.
//!
//! One tokio task owns the whole pipeline: it opens the frame source,
//! pulls the newest frame, decodes a centered region, runs the result
//! through the dedup filter and delivers accepted codes over an event
//! channel. Manual entry and single-frame capture arrive as commands on
//! the same loop, so they obey the same filter.
//!
//! A generation counter guards deliveries: once `stop` is called (or the
//! controller is dropped), in-flight results from the old session are
//! discarded instead of reaching the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::capture::{FrameFeed, FrameSource, LumaFrame};
use crate::config::DecodeBackend;
use crate::decode::{self, DecodeStrategy, DecoderKind, ScanEvent};
use crate::error::ScanError;
use crate::scan::{
    CooldownFilter, ScanConfig, ScanMode, SessionState, SessionStats, SharedSeen, Suppression,
};

const EVENT_CHANNEL_CAPACITY: usize = 32;
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Updates a session pushes to its consumer.
#[derive(Debug)]
pub enum ScanUpdate {
    /// Capture is live and decoding with the named engine.
    Activated { decoder: DecoderKind },
    /// An accepted (filter-passing) code.
    Code(ScanEvent),
    /// A requested single-frame capture found no code.
    NothingDetected,
    /// Capture failed; the session stays up for manual entry.
    Failed { error: ScanError },
    /// The session has wound down. Always the last update.
    Closed { stats: SessionStats },
}

enum Command {
    Manual(String),
    CaptureStill,
}

/// Handle to a running scan session.
pub struct ScanController {
    generation: u64,
    live_generation: Arc<AtomicU64>,
    state_rx: watch::Receiver<SessionState>,
    stop_tx: watch::Sender<bool>,
    cmd_tx: mpsc::Sender<Command>,
    task: Option<JoinHandle<()>>,
}

impl ScanController {
    /// Spawns a session. `strategy` of `None` selects an engine via the
    /// capability probe. Returns the controller and the update stream.
    pub fn start(
        cfg: ScanConfig,
        source: Box<dyn FrameSource>,
        strategy: Option<Box<dyn DecodeStrategy>>,
        seen: SharedSeen,
    ) -> (Self, mpsc::Receiver<ScanUpdate>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let live_generation = Arc::new(AtomicU64::new(1));

        let task = SessionTask {
            cfg,
            generation: 1,
            live: live_generation.clone(),
            seen,
            events: event_tx,
            state: state_tx,
            stop: stop_rx,
            commands: cmd_rx,
        };
        let handle = tokio::spawn(run_session(task, source, strategy));

        (
            Self {
                generation: 1,
                live_generation,
                state_rx,
                stop_tx,
                cmd_tx,
                task: Some(handle),
            },
            event_rx,
        )
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Submits a hand-typed code. It runs through the same dedup filter
    /// as camera reads. Empty input is ignored.
    pub async fn enter_manual(&self, value: &str) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return;
        }
        if self
            .cmd_tx
            .send(Command::Manual(trimmed.to_string()))
            .await
            .is_err()
        {
            debug!("manual entry after session closed");
        }
    }

    /// Asks the session to report on the next frame even if nothing
    /// decodes. A miss, or having no live capture at all, surfaces as
    /// [`ScanUpdate::NothingDetected`].
    pub async fn capture_still(&self) {
        if self.cmd_tx.send(Command::CaptureStill).await.is_err() {
            debug!("capture request after session closed");
        }
    }

    /// Stops the session and waits for the camera to be released. After
    /// this returns no further `Code` updates will be delivered.
    pub async fn stop(&mut self) {
        self.live_generation
            .store(self.generation + 1, Ordering::Release);
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.task.take() {
            if handle.await.is_err() {
                warn!("session task panicked during stop");
            }
        }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.live_generation
            .store(self.generation + 1, Ordering::Release);
        let _ = self.stop_tx.send(true);
    }
}

struct SessionTask {
    cfg: ScanConfig,
    generation: u64,
    live: Arc<AtomicU64>,
    seen: SharedSeen,
    events: mpsc::Sender<ScanUpdate>,
    state: watch::Sender<SessionState>,
    stop: watch::Receiver<bool>,
    commands: mpsc::Receiver<Command>,
}

impl SessionTask {
    fn set_state(&self, next: SessionState) {
        let _ = self.state.send(next);
    }

    /// Sends an update unless a newer generation has gone live.
    async fn emit(&self, update: ScanUpdate) {
        if self.live.load(Ordering::Acquire) != self.generation {
            debug!("dropping update from superseded session");
            return;
        }
        let _ = self.events.send(update).await;
    }

    /// Runs a value through the filter. Returns true if it was
    /// delivered, false if suppressed.
    async fn deliver(
        &self,
        filter: &mut CooldownFilter,
        stats: &mut SessionStats,
        event: ScanEvent,
    ) -> bool {
        let verdict = {
            let seen = self.seen.read();
            filter.check(&event.value, event.timestamp, &seen)
        };
        match verdict {
            Some(Suppression::Cooldown) => {
                stats.suppressed += 1;
                debug!("suppressed re-read of {:?} inside cooldown", event.value);
                false
            }
            Some(Suppression::AlreadySeen) => {
                stats.suppressed += 1;
                debug!("suppressed already-accepted {:?}", event.value);
                false
            }
            None => {
                filter.record(&event.value, event.timestamp);
                stats.hits += 1;
                self.emit(ScanUpdate::Code(event)).await;
                true
            }
        }
    }
}

async fn next_frame(feed: &mut Option<FrameFeed>) -> Option<LumaFrame> {
    match feed {
        Some(active) => active.latest().await,
        None => std::future::pending::<Option<LumaFrame>>().await,
    }
}

async fn run_session(
    mut task: SessionTask,
    source: Box<dyn FrameSource>,
    strategy: Option<Box<dyn DecodeStrategy>>,
) {
    task.set_state(SessionState::Initializing);
    info!("scan session starting on {}", source.describe());

    let mut strategy =
        strategy.unwrap_or_else(|| decode::select_strategy(DecodeBackend::Auto));

    let mut feed = match tokio::task::spawn_blocking(move || source.open()).await {
        Ok(Ok(feed)) => {
            task.set_state(SessionState::Active);
            task.emit(ScanUpdate::Activated {
                decoder: strategy.kind(),
            })
            .await;
            Some(feed)
        }
        Ok(Err(e)) => {
            warn!("capture open failed: {e}");
            task.set_state(SessionState::Error);
            task.emit(ScanUpdate::Failed { error: e }).await;
            None
        }
        Err(e) => {
            warn!("capture open task failed: {e}");
            task.set_state(SessionState::Error);
            task.emit(ScanUpdate::Failed {
                error: ScanError::CameraUnavailable {
                    detail: "capture setup panicked".to_string(),
                },
            })
            .await;
            None
        }
    };

    let mut filter = CooldownFilter::new(task.cfg.cooldown);
    let mut stats = SessionStats::default();
    let mut still_pending = false;
    // While set, frame decoding is paused; commands still process.
    let mut resume_at: Option<tokio::time::Instant> = None;
    let mut commands_open = true;

    loop {
        tokio::select! {
            changed = task.stop.changed() => {
                if changed.is_err() || *task.stop.borrow() {
                    break;
                }
            }
            cmd = task.commands.recv(), if commands_open => {
                match cmd {
                    Some(Command::Manual(value)) => {
                        stats.manual_entries += 1;
                        let accepted = task
                            .deliver(&mut filter, &mut stats, ScanEvent::new(value))
                            .await;
                        if accepted && task.cfg.mode == ScanMode::SingleShot {
                            break;
                        }
                    }
                    Some(Command::CaptureStill) => {
                        if feed.is_some() {
                            still_pending = true;
                        } else {
                            // No frames are coming; answer now.
                            task.emit(ScanUpdate::NothingDetected).await;
                        }
                    }
                    None => {
                        commands_open = false;
                    }
                }
            }
            _ = tokio::time::sleep_until(resume_at.unwrap_or_else(tokio::time::Instant::now)),
                if resume_at.is_some() =>
            {
                debug!("cooldown elapsed, resuming decode");
                resume_at = None;
            }
            frame = next_frame(&mut feed), if feed.is_some() && resume_at.is_none() => {
                match frame {
                    Some(frame) => {
                        stats.frames_seen += 1;
                        let roi = decode::roi_crop(&frame, task.cfg.roi_fraction);
                        let decoded = strategy.decode(&roi);
                        if still_pending {
                            still_pending = false;
                            if decoded.is_none() {
                                task.emit(ScanUpdate::NothingDetected).await;
                            }
                        }
                        if let Some(event) = decoded {
                            let accepted =
                                task.deliver(&mut filter, &mut stats, event).await;
                            if accepted {
                                match task.cfg.mode {
                                    ScanMode::SingleShot => break,
                                    ScanMode::Continuous => {
                                        resume_at = Some(
                                            tokio::time::Instant::now() + task.cfg.cooldown,
                                        );
                                    }
                                }
                            }
                        }
                    }
                    None => {
                        warn!("frame source ended unexpectedly");
                        task.set_state(SessionState::Error);
                        task.emit(ScanUpdate::Failed {
                            error: ScanError::CameraUnavailable {
                                detail: "frame stream ended".to_string(),
                            },
                        })
                        .await;
                        feed = None;
                        // A parked still request can no longer resolve
                        // against a frame.
                        if still_pending {
                            still_pending = false;
                            task.emit(ScanUpdate::NothingDetected).await;
                        }
                    }
                }
            }
        }
    }

    // Camera release happens before the closed notification so a caller
    // awaiting stop() can reopen the device immediately.
    if let Some(mut active) = feed.take() {
        active.close();
    }
    // Teardown lands in Stopped from every state; a capture failure was
    // already surfaced through its Failed update.
    task.set_state(SessionState::Stopped);
    info!(
        "scan session closed: {} hits, {} suppressed, {} manual",
        stats.hits, stats.suppressed, stats.manual_entries
    );
    // Closed bypasses the generation guard so the consumer always
    // learns the session ended.
    let _ = task.events.send(ScanUpdate::Closed { stats }).await;
}
