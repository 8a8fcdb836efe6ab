//! mpv-backed media sessions.
//!
//! Each `open` spawns a dedicated mpv process playing the stream URL and a
//! session task that owns its JSON IPC socket.  The task translates mpv
//! property observations into `MediaSignal`s and session commands into IPC
//! writes:
//!
//! ```text
//!   open(url)
//!     └── session task
//!           ├── core-idle goes false (first time)  → MediaSignal::Ready
//!           ├── icy-title property change          → MediaSignal::NowPlaying
//!           ├── end-file / process exit / timeout  → MediaSignal::Failed
//!           └── SessionCommand::{SetPaused, Stop}  → set_property / kill
//! ```
//!
//! The session owns the process: `Stop` (or the handle being dropped) kills
//! mpv and removes the socket.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tuner_core::playback::{MediaBackend, MediaSignal, SessionCommand, SessionHandle};

// observe_property ids; matched in property-change events.
const OBS_CORE_IDLE: u64 = 1;
const OBS_ICY_TITLE: u64 = 2;

pub struct MpvBackend {
    load_timeout: Duration,
    next_session: AtomicU64,
}

impl MpvBackend {
    pub fn new(load_timeout: Duration) -> Self {
        Self {
            load_timeout,
            next_session: AtomicU64::new(1),
        }
    }
}

impl MediaBackend for MpvBackend {
    fn open(&self, url: &str) -> anyhow::Result<(SessionHandle, mpsc::Receiver<MediaSignal>)> {
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let socket = socket_path(session);
        let (signal_tx, signal_rx) = mpsc::channel(32);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        tokio::spawn(run_session(
            url.to_string(),
            socket,
            self.load_timeout,
            signal_tx,
            cmd_rx,
        ));
        Ok((SessionHandle::new(cmd_tx), signal_rx))
    }
}

fn socket_path(session: u64) -> PathBuf {
    std::env::temp_dir().join(format!("tuner-mpv-{}-{}.sock", std::process::id(), session))
}

async fn run_session(
    url: String,
    socket: PathBuf,
    load_timeout: Duration,
    signal_tx: mpsc::Sender<MediaSignal>,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
) {
    let fail = |reason: String| {
        let tx = signal_tx.clone();
        async move {
            let _ = tx.send(MediaSignal::Failed(reason)).await;
        }
    };

    let mut child = match spawn_mpv(&url, &socket) {
        Ok(child) => child,
        Err(e) => {
            fail(format!("failed to spawn mpv: {e}")).await;
            return;
        }
    };

    let stream = match connect_ipc(&socket).await {
        Ok(stream) => stream,
        Err(e) => {
            fail(e.to_string()).await;
            let _ = child.kill().await;
            let _ = tokio::fs::remove_file(&socket).await;
            return;
        }
    };
    info!("mpv session up for {}", url);

    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    for (id, name) in [(OBS_CORE_IDLE, "core-idle"), (OBS_ICY_TITLE, "metadata/by-key/icy-title")] {
        if let Err(e) = write_command(&mut writer, json!(["observe_property", id, name])).await {
            warn!("observe_property {} failed: {}", name, e);
        }
    }

    let mut ready = false;
    let deadline = tokio::time::sleep(load_timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            () = &mut deadline, if !ready => {
                fail("timed out waiting for stream".to_string()).await;
                break;
            }

            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if let Some(signal) = translate_event(&line, &mut ready) {
                            if signal_tx.send(signal).await.is_err() {
                                break; // coordinator abandoned the session
                            }
                        }
                    }
                    Ok(None) | Err(_) => {
                        fail("mpv exited".to_string()).await;
                        break;
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::SetPaused(paused)) => {
                        if let Err(e) = write_command(&mut writer, json!(["set_property", "pause", paused])).await {
                            fail(format!("pause command failed: {e}")).await;
                            break;
                        }
                    }
                    Some(SessionCommand::Stop) | None => break,
                }
            }
        }
    }

    let _ = child.kill().await;
    let _ = tokio::fs::remove_file(&socket).await;
    debug!("mpv session for {} torn down", url);
}

fn spawn_mpv(url: &str, socket: &PathBuf) -> anyhow::Result<tokio::process::Child> {
    let child = tokio::process::Command::new("mpv")
        .arg("--no-video")
        .arg(format!("--input-ipc-server={}", socket.display()))
        .arg("--quiet")
        .arg(url)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true)
        .spawn()?;
    Ok(child)
}

async fn connect_ipc(socket: &PathBuf) -> anyhow::Result<UnixStream> {
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if socket.exists() {
            if let Ok(stream) = UnixStream::connect(socket).await {
                return Ok(stream);
            }
        }
    }
    anyhow::bail!("mpv IPC socket did not appear")
}

async fn write_command<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    command: Value,
) -> anyhow::Result<()> {
    let mut raw = serde_json::to_string(&json!({ "command": command }))?;
    raw.push('\n');
    writer.write_all(raw.as_bytes()).await?;
    Ok(())
}

/// Map one IPC line to an outbound signal, if it carries one.  Command
/// responses (anything with a request_id) and unknown events are dropped.
fn translate_event(line: &str, ready: &mut bool) -> Option<MediaSignal> {
    let event: Value = serde_json::from_str(line.trim()).ok()?;
    if event.get("request_id").is_some() {
        return None;
    }
    match event.get("event")?.as_str()? {
        "property-change" => {
            let id = event.get("id")?.as_u64()?;
            let data = event.get("data").unwrap_or(&Value::Null);
            match id {
                // First un-idle means audio is flowing.
                OBS_CORE_IDLE if data.as_bool() == Some(false) && !*ready => {
                    *ready = true;
                    Some(MediaSignal::Ready)
                }
                OBS_ICY_TITLE => data
                    .as_str()
                    .filter(|s| !s.is_empty())
                    .map(|s| MediaSignal::NowPlaying(s.to_string())),
                _ => None,
            }
        }
        "end-file" => {
            let reason = event
                .get("reason")
                .and_then(|r| r.as_str())
                .unwrap_or("unknown");
            Some(MediaSignal::Failed(format!("stream ended: {reason}")))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_unidle_is_ready_exactly_once() {
        let mut ready = false;
        let line = r#"{"event":"property-change","id":1,"name":"core-idle","data":false}"#;
        assert_eq!(translate_event(line, &mut ready), Some(MediaSignal::Ready));
        assert_eq!(translate_event(line, &mut ready), None);
    }

    #[test]
    fn test_icy_title_becomes_now_playing() {
        let mut ready = true;
        let line = r#"{"event":"property-change","id":2,"name":"metadata/by-key/icy-title","data":"Artist - Track"}"#;
        assert_eq!(
            translate_event(line, &mut ready),
            Some(MediaSignal::NowPlaying("Artist - Track".to_string()))
        );
    }

    #[test]
    fn test_end_file_is_failure() {
        let mut ready = true;
        let line = r#"{"event":"end-file","reason":"error"}"#;
        assert_eq!(
            translate_event(line, &mut ready),
            Some(MediaSignal::Failed("stream ended: error".to_string()))
        );
    }

    #[test]
    fn test_responses_and_noise_are_dropped() {
        let mut ready = false;
        assert_eq!(
            translate_event(r#"{"request_id":4,"error":"success"}"#, &mut ready),
            None
        );
        assert_eq!(translate_event("not json", &mut ready), None);
        assert_eq!(
            translate_event(r#"{"event":"playback-restart"}"#, &mut ready),
            None
        );
    }
}
