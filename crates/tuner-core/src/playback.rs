//! Playback coordination.
//!
//! `PlaybackCoordinator` owns "what station is active" and the transitions
//! between idle/loading/playing/paused/failed.  The actual media work is
//! delegated to a `MediaBackend`: `open` hands back a command handle plus a
//! signal channel, and the coordinator's per-session watcher task folds
//! those signals into the published state.
//!
//! Exactly one station is active at a time.  Starting station B while A is
//! active abandons A's session without a terminal state for it; any signal
//! A's session still emits is discarded by a sequence check taken under the
//! coordinator lock, so no observer ever sees two stations active.

use std::sync::Arc;

use rand::seq::SliceRandom;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use crate::station::Station;

// ── backend contract ──────────────────────────────────────────────────────────

/// Asynchronous signals from an open media session.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaSignal {
    /// The stream is ready and audio is flowing.
    Ready,
    /// The session is dead.  Timeouts and codec/transport errors all land
    /// here; the coordinator does not distinguish them.
    Failed(String),
    /// Best-effort free-text "now playing" string from in-stream metadata.
    NowPlaying(String),
}

#[derive(Debug, PartialEq, Eq)]
pub enum SessionCommand {
    SetPaused(bool),
    Stop,
}

/// Cheaply cloneable command handle for one session, backed by an mpsc
/// channel into the backend's session task.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn new(tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { tx }
    }

    pub async fn set_paused(&self, paused: bool) -> anyhow::Result<()> {
        self.tx
            .send(SessionCommand::SetPaused(paused))
            .await
            .map_err(|_| anyhow::anyhow!("media session gone"))
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.tx
            .send(SessionCommand::Stop)
            .await
            .map_err(|_| anyhow::anyhow!("media session gone"))
    }
}

/// The platform media capability.  `open` must return promptly: connecting
/// and codec negotiation happen in the background, and the outcome arrives
/// as `Ready` or `Failed` on the signal channel.
pub trait MediaBackend: Send + Sync + 'static {
    fn open(&self, url: &str) -> anyhow::Result<(SessionHandle, mpsc::Receiver<MediaSignal>)>;
}

// ── state ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading {
        station_id: String,
    },
    Playing {
        station_id: String,
    },
    Paused {
        station_id: String,
    },
    /// Terminal until the user retries with a fresh `play`.
    Failed {
        station_id: String,
        reason: String,
    },
}

impl PlaybackState {
    /// The station currently holding the session, if any.  `Failed` keeps
    /// the id for display but the station is no longer active.
    pub fn active_station_id(&self) -> Option<&str> {
        match self {
            PlaybackState::Loading { station_id }
            | PlaybackState::Playing { station_id }
            | PlaybackState::Paused { station_id } => Some(station_id),
            PlaybackState::Idle | PlaybackState::Failed { .. } => None,
        }
    }

    pub fn is_playing(&self, station_id: &str) -> bool {
        matches!(self, PlaybackState::Playing { station_id: id } if id == station_id)
    }
}

// ── coordinator ───────────────────────────────────────────────────────────────

struct ActiveSession {
    station_id: String,
    handle: SessionHandle,
    watcher: tokio::task::JoinHandle<()>,
}

struct Inner {
    /// Bumped on every `play`.  A watcher only applies a signal while its
    /// own sequence is still current.
    seq: u64,
    active: Option<ActiveSession>,
}

struct Shared {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<PlaybackState>,
    now_playing_tx: watch::Sender<Option<String>>,
}

pub struct PlaybackCoordinator<B: MediaBackend> {
    backend: B,
    shared: Arc<Shared>,
}

impl<B: MediaBackend> PlaybackCoordinator<B> {
    pub fn new(backend: B) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        let (now_playing_tx, _) = watch::channel(None);
        Self {
            backend,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    seq: 0,
                    active: None,
                }),
                state_tx,
                now_playing_tx,
            }),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state_tx.subscribe()
    }

    pub fn now_playing(&self) -> Option<String> {
        self.shared.now_playing_tx.borrow().clone()
    }

    pub fn subscribe_now_playing(&self) -> watch::Receiver<Option<String>> {
        self.shared.now_playing_tx.subscribe()
    }

    /// Start playing `station`, superseding any active session.
    pub async fn play(&self, station: &Station) {
        let mut inner = self.shared.inner.lock().await;
        supersede(&mut inner).await;
        inner.seq += 1;
        let seq = inner.seq;
        let station_id = station.station_id.clone();

        info!("play {} ({})", station.name.trim(), station_id);
        self.shared.now_playing_tx.send_replace(None);

        match self.backend.open(station.playback_url()) {
            Ok((handle, signals)) => {
                self.shared.state_tx.send_replace(PlaybackState::Loading {
                    station_id: station_id.clone(),
                });
                let watcher = tokio::spawn(watch_session(
                    Arc::clone(&self.shared),
                    seq,
                    station_id.clone(),
                    signals,
                ));
                inner.active = Some(ActiveSession {
                    station_id,
                    handle,
                    watcher,
                });
            }
            Err(e) => {
                warn!("backend refused to open session: {}", e);
                self.shared.state_tx.send_replace(PlaybackState::Failed {
                    station_id,
                    reason: e.to_string(),
                });
                inner.active = None;
            }
        }
    }

    /// Pause the active session.  Only meaningful while `Playing`; the
    /// active station id is retained so the UI can resume in place.
    pub async fn pause(&self) {
        let inner = self.shared.inner.lock().await;
        let PlaybackState::Playing { station_id } = self.shared.state_tx.borrow().clone() else {
            return;
        };
        let Some(active) = &inner.active else { return };
        match active.handle.set_paused(true).await {
            Ok(()) => {
                self.shared
                    .state_tx
                    .send_replace(PlaybackState::Paused { station_id });
            }
            Err(e) => warn!("pause failed: {}", e),
        }
    }

    /// Same station: pause/resume symmetrically (resume reuses the open
    /// session, no reopen).  Anything else — including a failed session for
    /// the same station — is a fresh `play`.
    pub async fn toggle_play_pause(&self, station: &Station) {
        let same = |id: &String| id == &station.station_id;
        let state = self.state();
        match &state {
            PlaybackState::Playing { station_id } if same(station_id) => self.pause().await,
            PlaybackState::Paused { station_id } if same(station_id) => self.resume().await,
            // Still settling; let Loading resolve before taking commands.
            PlaybackState::Loading { station_id } if same(station_id) => {}
            _ => self.play(station).await,
        }
    }

    /// Pick one of `candidates` uniformly at random and play it.  An empty
    /// slice is a no-op.
    pub async fn play_random(&self, candidates: &[Station]) {
        let station = {
            let mut rng = rand::thread_rng();
            candidates.choose(&mut rng).cloned()
        };
        if let Some(station) = station {
            self.play(&station).await;
        }
    }

    async fn resume(&self) {
        let inner = self.shared.inner.lock().await;
        let PlaybackState::Paused { station_id } = self.shared.state_tx.borrow().clone() else {
            return;
        };
        let Some(active) = &inner.active else { return };
        match active.handle.set_paused(false).await {
            Ok(()) => {
                self.shared
                    .state_tx
                    .send_replace(PlaybackState::Playing { station_id });
            }
            Err(e) => warn!("resume failed: {}", e),
        }
    }
}

/// Abandon the current session, if any.  The underlying I/O is told to stop
/// but not awaited; its eventual completion is ignored once superseded.
async fn supersede(inner: &mut Inner) {
    if let Some(prev) = inner.active.take() {
        debug!("superseding session for {}", prev.station_id);
        prev.watcher.abort();
        let _ = prev.handle.stop().await;
    }
}

async fn watch_session(
    shared: Arc<Shared>,
    seq: u64,
    station_id: String,
    mut signals: mpsc::Receiver<MediaSignal>,
) {
    while let Some(signal) = signals.recv().await {
        // Stale-completion guard: the check and the state write happen
        // under the same lock `play` takes to bump the sequence.
        let inner = shared.inner.lock().await;
        if inner.seq != seq {
            debug!("discarding stale signal {:?} for {}", signal, station_id);
            return;
        }
        match signal {
            MediaSignal::Ready => {
                info!("stream ready for {}", station_id);
                shared.state_tx.send_replace(PlaybackState::Playing {
                    station_id: station_id.clone(),
                });
            }
            MediaSignal::Failed(reason) => {
                warn!("session for {} failed: {}", station_id, reason);
                shared.state_tx.send_replace(PlaybackState::Failed {
                    station_id: station_id.clone(),
                    reason,
                });
                return;
            }
            MediaSignal::NowPlaying(title) => {
                debug!("now playing on {}: {}", station_id, title);
                shared.now_playing_tx.send_replace(Some(title));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_station_id() {
        assert_eq!(PlaybackState::Idle.active_station_id(), None);
        assert_eq!(
            PlaybackState::Loading {
                station_id: "a".into()
            }
            .active_station_id(),
            Some("a")
        );
        assert_eq!(
            PlaybackState::Paused {
                station_id: "a".into()
            }
            .active_station_id(),
            Some("a")
        );
        // Failed keeps the id for display but is not active.
        assert_eq!(
            PlaybackState::Failed {
                station_id: "a".into(),
                reason: "x".into()
            }
            .active_station_id(),
            None
        );
    }

    #[test]
    fn test_is_playing() {
        let state = PlaybackState::Playing {
            station_id: "a".into(),
        };
        assert!(state.is_playing("a"));
        assert!(!state.is_playing("b"));
    }
}
