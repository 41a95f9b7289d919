use crate::infra::tmux::Multiplexer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Lines captured per tick, counted from the bottom of the pane.
const CAPTURE_LINES: i32 = 30;
/// Only the tail of the capture is classified.
const CLASSIFY_LINES: usize = 5;

/// Phrases that usually mean the agent is waiting on the user.
const PROMPT_MARKERS: &[&str] = &[
    "do you want",
    "would you like",
    "shall i",
    "should i",
    "(y/n)",
    "[y/n]",
    "(yes/no)",
    "continue?",
    "proceed?",
    "press enter",
    "waiting for input",
    "approve",
    "allow this",
];

/// A session that started waiting on the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptEvent {
    pub session: String,
    /// Last classified lines, for a notification body.
    pub excerpt: String,
}

/// Last few lines of `content`, lower-cased.
fn tail_lines(content: &str) -> Vec<String> {
    let lines: Vec<&str> = content.trim_end().lines().collect();
    let start = lines.len().saturating_sub(CLASSIFY_LINES);
    lines[start..]
        .iter()
        .map(|l| l.trim_end().to_lowercase())
        .collect()
}

/// Heuristic: does the bottom of the pane look like a question to the user?
pub fn looks_like_prompt(content: &str) -> bool {
    tail_lines(content).iter().any(|line| {
        PROMPT_MARKERS.iter().any(|m| line.contains(m)) || line.ends_with('?')
    })
}

/// Per-session monitor state. `tick` is one poll; the spawned task just
/// calls it on an interval.
#[derive(Debug)]
pub struct PromptWatch {
    name: String,
    last_capture: Option<String>,
    waiting: bool,
}

impl PromptWatch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_capture: None,
            waiting: false,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Poll once. Returns an event only on a not-waiting to waiting edge.
    pub async fn tick(&mut self, mux: &dyn Multiplexer) -> Option<PromptEvent> {
        match mux.exists(&self.name).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                debug!(session = %self.name, error = %e, "monitor capture failed");
                return None;
            }
        }

        let content = match mux.capture_pane(&self.name, -CAPTURE_LINES).await {
            Ok(c) => c,
            Err(e) => {
                debug!(session = %self.name, error = %e, "monitor capture failed");
                return None;
            }
        };
        if self.last_capture.as_deref() == Some(content.as_str()) {
            return None;
        }

        let waiting = looks_like_prompt(&content);
        let event = (waiting && !self.waiting).then(|| PromptEvent {
            session: self.name.clone(),
            excerpt: tail_lines(&content).join("\n"),
        });
        self.waiting = waiting;
        self.last_capture = Some(content);
        event
    }
}

/// Stops the monitor task when `stop` is called or the handle is dropped.
pub struct MonitorHandle {
    stop: Option<oneshot::Sender<()>>,
    _task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Idempotent: only the first call signals the task.
    pub fn stop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start polling `name` every `interval`. Events go to `events` with
/// `try_send`; a full channel drops the event rather than stalling the poll.
pub fn spawn_monitor(
    mux: Arc<dyn Multiplexer>,
    name: String,
    interval: Duration,
    events: mpsc::Sender<PromptEvent>,
) -> MonitorHandle {
    let (stop_tx, mut stop_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let mut watch = PromptWatch::new(name);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    if let Some(event) = watch.tick(mux.as_ref()).await {
                        info!(session = %event.session, "session is waiting for input");
                        if events.try_send(event).is_err() {
                            debug!("prompt event dropped");
                        }
                    }
                }
            }
        }
        debug!(session = %watch.name, "monitor stopped");
    });
    MonitorHandle {
        stop: Some(stop_tx),
        _task: task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::fake::FakeMultiplexer;

    #[test]
    fn classifies_question_markers() {
        assert!(looks_like_prompt("Editing file\nDo you want to apply this edit?\n"));
        assert!(looks_like_prompt("Overwrite config (y/N)"));
        assert!(looks_like_prompt("What should the function be called?   \n\n"));
        assert!(!looks_like_prompt("Compiling hangar v0.1.0\nFinished dev"));
    }

    #[test]
    fn only_the_tail_is_classified() {
        let content = "Would you like tea?\n1\n2\n3\n4\n5\n";
        assert!(!looks_like_prompt(content));
    }

    #[test]
    fn short_content_is_fine() {
        assert!(!looks_like_prompt(""));
        assert!(looks_like_prompt("proceed?"));
    }

    #[tokio::test]
    async fn missing_session_skips_tick() {
        let mux = FakeMultiplexer::default();
        let mut watch = PromptWatch::new("ghost");
        assert!(watch.tick(&mux).await.is_none());
        assert_eq!(mux.capture_count(), 0);
        assert!(!watch.is_waiting());
    }

    #[tokio::test]
    async fn emits_once_per_waiting_edge() {
        let mux = FakeMultiplexer::default();
        mux.insert("a");
        let mut watch = PromptWatch::new("a");

        mux.set_content("a", "working on it");
        assert!(watch.tick(&mux).await.is_none());

        mux.set_content("a", "Do you want to continue?");
        let event = watch.tick(&mux).await.unwrap();
        assert_eq!(event.session, "a");
        assert!(watch.is_waiting());

        // Still waiting, new content: no second event.
        mux.set_content("a", "Do you want to continue? (y/n)");
        assert!(watch.tick(&mux).await.is_none());

        mux.set_content("a", "ok, running tests");
        assert!(watch.tick(&mux).await.is_none());
        assert!(!watch.is_waiting());

        mux.set_content("a", "Shall I commit?");
        assert!(watch.tick(&mux).await.is_some());
    }

    #[tokio::test]
    async fn identical_capture_is_not_reclassified() {
        let mux = FakeMultiplexer::default();
        mux.insert("a");
        mux.set_content("a", "Proceed?");
        let mut watch = PromptWatch::new("a");
        assert!(watch.tick(&mux).await.is_some());
        assert!(watch.tick(&mux).await.is_none());
        assert!(watch.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_monitor_delivers_and_stops() {
        let mux = Arc::new(FakeMultiplexer::default());
        mux.insert("a");
        mux.set_content("a", "Would you like me to continue?");
        let (tx, mut rx) = mpsc::channel(4);
        let mut handle = spawn_monitor(
            mux.clone() as Arc<dyn Multiplexer>,
            "a".into(),
            Duration::from_secs(2),
            tx,
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.session, "a");

        handle.stop();
        handle.stop();
        // Channel closes once the task exits and drops its sender.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn full_channel_drops_instead_of_blocking() {
        let mux = Arc::new(FakeMultiplexer::default());
        mux.insert("a");
        mux.insert("b");
        mux.set_content("a", "Proceed?");
        mux.set_content("b", "Proceed?");
        let (tx, mut rx) = mpsc::channel(1);
        let _ha = spawn_monitor(mux.clone(), "a".into(), Duration::from_secs(2), tx.clone());
        let _hb = spawn_monitor(mux.clone(), "b".into(), Duration::from_secs(2), tx);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
