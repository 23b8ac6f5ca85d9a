//! Stateful slide tracking.
//!
//! A `TrackerSession` owns everything one tracked presentation needs: the
//! optionally loaded document, the published position, and the state
//! machine that follows the live window across poll cycles. `Tracker` is
//! the running handle; it spawns the poll loop and delivers change
//! notifications over a channel.
//!
//! The session is single-writer: only the poll loop (or a caller driving
//! `tick` directly) mutates it.

use crate::config::Config;
use crate::detector::Detector;
use crate::ocr::OcrFallback;
use crate::types::{DetectionMethod, DetectionResult, Document, SlideContent, TrackError};
use crate::window::WindowSource;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

/// Stale sessions this many times older than the stale threshold drop back
/// to Unbound and clear their published position.
const UNBIND_MISS_FACTOR: u32 = 10;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No window bound; discovery runs each cycle
    Unbound,
    /// A presentation window was seen in the latest snapshots
    Bound,
    /// The bound window has been missing from recent snapshots
    Stale,
}

/// A position change, delivered once per change in timestamp order.
#[derive(Debug, Clone)]
pub struct Notification {
    pub result: DetectionResult,
    /// Content of the slide now showing, from the loaded document or, for
    /// document-less sessions, recognized from the window's pixels
    pub content: Option<SlideContent>,
}

/// Candidate result held back until it persists across cycles
struct PendingResult {
    current: u32,
    method: DetectionMethod,
    cycles_seen: u32,
}

pub struct TrackerSession {
    config: Config,
    windows: Arc<dyn WindowSource>,
    detector: Detector,
    document: Option<Document>,
    state: TrackerState,
    published: Option<DetectionResult>,
    pending: Option<PendingResult>,
    miss_count: u32,
    /// Cursor for manual navigation, independent of live detection
    cursor: u32,
    /// Set when the last cycle ran OCR, stretches the next sleep
    used_ocr: bool,
}

impl TrackerSession {
    pub fn new(config: Config, windows: Arc<dyn WindowSource>, ocr: Option<OcrFallback>) -> Self {
        // Config can switch OCR off even when the host injected a backend
        let ocr = if config.ocr.enabled { ocr } else { None };
        let detector = Detector::new(config.detection.clone(), ocr);
        Self {
            config,
            windows,
            detector,
            document: None,
            state: TrackerState::Unbound,
            published: None,
            pending: None,
            miss_count: 0,
            cursor: 1,
            used_ocr: false,
        }
    }

    /// Load the presentation document backing this session. Synchronous;
    /// tracking works without it, at reduced fidelity.
    pub fn load(&mut self, path: &Path) -> Result<(), TrackError> {
        let document = crate::document::load(path)?;
        self.cursor = self.cursor.min(document.total_slides).max(1);
        self.document = Some(document);
        Ok(())
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// The most recently published position, if any.
    pub fn current(&self) -> Option<&DetectionResult> {
        self.published.as_ref()
    }

    /// Bind to a live presentation window now. Fails with
    /// `DetectionUnavailable` when none is visible.
    pub fn bind_to_live_window(&mut self) -> Result<(), TrackError> {
        let snapshot = self.windows.list_windows();
        match self.detector.pick_candidate(&snapshot) {
            Some(window) => {
                info!("Bound to window {} ({:?})", window.id, window.title);
                self.state = TrackerState::Bound;
                self.miss_count = 0;
                Ok(())
            }
            None => Err(TrackError::DetectionUnavailable),
        }
    }

    /// Jump the manual cursor to slide `n`. No wraparound: out-of-range
    /// indices fail and leave the cursor unchanged.
    pub fn goto(&mut self, n: u32) -> Result<SlideContent, TrackError> {
        let doc = self
            .document
            .as_ref()
            .ok_or(TrackError::DetectionUnavailable)?;
        let content = doc.slide(n)?.clone();
        self.cursor = n;
        Ok(content)
    }

    /// Advance the manual cursor one slide.
    pub fn next(&mut self) -> Result<SlideContent, TrackError> {
        self.goto(self.cursor + 1)
    }

    /// Step the manual cursor back one slide.
    pub fn previous(&mut self) -> Result<SlideContent, TrackError> {
        if self.cursor <= 1 {
            let total = self.document.as_ref().map(|d| d.total_slides).unwrap_or(0);
            return Err(TrackError::IndexOutOfRange {
                requested: 0,
                total,
            });
        }
        self.goto(self.cursor - 1)
    }

    /// 1-based indices of slides whose text contains `text`.
    pub fn search(&self, text: &str) -> Result<Vec<u32>, TrackError> {
        let doc = self
            .document
            .as_ref()
            .ok_or(TrackError::DetectionUnavailable)?;
        Ok(doc.search(text))
    }

    /// Content of slide `n` from the loaded document.
    pub fn get_slide_content(&self, n: u32) -> Result<SlideContent, TrackError> {
        let doc = self
            .document
            .as_ref()
            .ok_or(TrackError::DetectionUnavailable)?;
        Ok(doc.slide(n)?.clone())
    }

    /// Run one poll cycle: snapshot, detect, reconcile, notify on change.
    pub async fn tick(&mut self) -> Option<Notification> {
        self.used_ocr = false;
        let snapshot = self.windows.list_windows();

        let candidate = match self.detector.pick_candidate(&snapshot) {
            Some(window) => window.clone(),
            None => {
                self.register_miss();
                return None;
            }
        };

        if self.state != TrackerState::Bound {
            // Window (re)appeared; no reload needed, next detection
            // publishes against the existing document
            info!("Presentation window visible, session bound");
            self.state = TrackerState::Bound;
        }
        self.miss_count = 0;

        let last_current = self.published.as_ref().map(|p| p.position.current);
        let result = self
            .detector
            .detect(&snapshot, self.document.as_ref(), last_current)
            .await?;
        self.used_ocr = result.method == DetectionMethod::Ocr;

        let accepted = self.reconcile(result)?;
        self.revise_document_total(&accepted);

        let changed = match &self.published {
            Some(previous) => {
                previous.position.current != accepted.position.current
                    || previous.position.total != accepted.position.total
                    || previous.position.mode != accepted.position.mode
            }
            None => true,
        };

        self.cursor = accepted.position.current;
        self.published = Some(accepted.clone());

        if !changed {
            trace!("Position unchanged at {}", accepted.position.current);
            return None;
        }

        let content = match self
            .document
            .as_ref()
            .and_then(|doc| doc.slide(accepted.position.current).ok().cloned())
        {
            Some(content) => Some(content),
            None => {
                let recognized = self
                    .detector
                    .recognize_slide(&candidate, accepted.position.current)
                    .await;
                if recognized.is_some() {
                    self.used_ocr = true;
                }
                recognized
            }
        };

        debug!(
            "Position changed to {}/{:?} via {}",
            accepted.position.current,
            accepted.position.total,
            accepted.method.as_str()
        );

        Some(Notification {
            result: accepted,
            content,
        })
    }

    /// Flapping suppression: a result whose slide disagrees with the
    /// published one through a *different* method must persist for
    /// `flap_hold_cycles` consecutive cycles before it wins. Same-method
    /// disagreements (the presenter actually moved) pass straight through,
    /// as does any real result over a published Default placeholder.
    fn reconcile(&mut self, result: DetectionResult) -> Option<DetectionResult> {
        let hold = self.config.detection.flap_hold_cycles;

        let published = match &self.published {
            Some(published) => published,
            None => {
                self.pending = None;
                return Some(result);
            }
        };

        if published.method == DetectionMethod::Default && result.supersedes(published) {
            self.pending = None;
            return Some(result);
        }

        let disagrees = result.position.current != published.position.current;
        let cross_method = result.method != published.method;

        if !disagrees || !cross_method {
            self.pending = None;
            return Some(result);
        }

        let cycles_seen = match &self.pending {
            Some(p) if p.current == result.position.current && p.method == result.method => {
                p.cycles_seen + 1
            }
            _ => 1,
        };

        if cycles_seen >= hold {
            debug!(
                "Cross-method result {} via {} held for {} cycles, accepting",
                result.position.current,
                result.method.as_str(),
                cycles_seen
            );
            self.pending = None;
            return Some(result);
        }

        trace!(
            "Holding cross-method result {} via {} ({}/{} cycles)",
            result.position.current,
            result.method.as_str(),
            cycles_seen,
            hold
        );
        self.pending = Some(PendingResult {
            current: result.position.current,
            method: result.method,
            cycles_seen,
        });
        None
    }

    /// A trusted live total larger than an estimated document total
    /// revises the document upward.
    fn revise_document_total(&mut self, result: &DetectionResult) {
        if result.method != DetectionMethod::TitleParse {
            return;
        }
        let Some(total) = result.position.total else {
            return;
        };
        if let Some(doc) = &mut self.document {
            if doc.total_is_estimate() && doc.revise_total_upward(total) {
                info!("Revised document total upward to {}", total);
            }
        }
    }

    fn register_miss(&mut self) {
        self.miss_count += 1;
        let threshold = self.config.polling.stale_after_misses;

        if self.state == TrackerState::Bound && self.miss_count >= threshold {
            info!("Window missing for {} cycles, session stale", self.miss_count);
            self.state = TrackerState::Stale;
            self.pending = None;
        } else if self.state == TrackerState::Stale
            && self.miss_count >= threshold * UNBIND_MISS_FACTOR
        {
            info!("Window gone, unbinding session");
            self.state = TrackerState::Unbound;
            self.published = None;
        }
    }

    /// Sleep before the next cycle, stretched while stale or after OCR.
    fn next_interval(&self) -> Duration {
        let polling = &self.config.polling;
        let mut secs = polling.base_interval_seconds.max(1);
        if self.state == TrackerState::Stale {
            secs *= polling.stale_interval_multiplier.max(1);
        }
        if self.used_ocr {
            secs *= polling.ocr_interval_multiplier.max(1);
        }
        Duration::from_secs(secs)
    }

    /// Poll until shutdown flips or the notification channel closes.
    /// Returns the session so callers can inspect or resume it. Shutdown
    /// races the cycle itself, so an in-flight capture is dropped rather
    /// than awaited to completion.
    pub async fn run(
        mut self,
        tx: mpsc::Sender<Notification>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.next_interval()) => {}
                _ = shutdown.changed() => {
                    debug!("Shutdown signalled, stopping poll loop");
                    break;
                }
            }

            tokio::select! {
                notification = self.tick() => {
                    if let Some(notification) = notification {
                        if tx.send(notification).await.is_err() {
                            debug!("Notification channel closed, stopping poll loop");
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Shutdown signalled mid-cycle, stopping poll loop");
                    break;
                }
            }
        }
        self
    }
}

/// Handle to a running tracker. Dropping it without `stop` leaves the poll
/// task running until its channel closes.
pub struct Tracker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<TrackerSession>,
}

impl Tracker {
    /// Spawn the poll loop for a session.
    pub fn start(session: TrackerSession, tx: mpsc::Sender<Notification>) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let handle = tokio::spawn(session.run(tx, rx));
        Self { shutdown, handle }
    }

    /// Stop the poll loop and get the session back. No notification is
    /// delivered after this returns. Returns `None` when the poll task
    /// panicked or was aborted.
    pub async fn stop(self) -> Option<TrackerSession> {
        let _ = self.shutdown.send(true);
        match self.handle.await {
            Ok(session) => Some(session),
            Err(e) => {
                error!("Tracker task did not shut down cleanly: {}", e);
                None
            }
        }
    }
}
