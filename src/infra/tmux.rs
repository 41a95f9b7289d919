use crate::error::HangarError;
use crate::infra::pty::{self, AttachTable, DoneSignal};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How often `create` polls for the new session to appear.
pub const CREATE_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// How long `create` waits before giving up with `CreationTimeout`.
pub const CREATE_TIMEOUT: Duration = Duration::from_secs(2);

/// Environment variables exported into every agent pane.
pub const ENV_SESSION: &str = "HANGAR_SESSION";
pub const ENV_EXECUTION_ID: &str = "HANGAR_EXECUTION_ID";
pub const ENV_DEBUG: &str = "HANGAR_DEBUG";
pub const ENV_HOME: &str = "HANGAR_HOME";

/// A live tmux session as reported by `list-sessions`.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSession {
    pub name: String,
    pub created: i64,
    pub attached: bool,
    pub windows: u32,
}

/// What to run inside a freshly created session.
#[derive(Debug, Clone)]
pub struct AgentLaunch {
    /// Path of this binary; the pane re-enters it with `start`.
    pub exe: PathBuf,
    pub data_dir: PathBuf,
    pub execution_id: String,
    pub debug: bool,
}

/// Per-session tmux options applied after creation.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub mouse: bool,
    pub history_limit: u32,
    pub status_bar: bool,
}

/// Operations the rest of the crate needs from the terminal multiplexer.
///
/// The `create` and `rename` defaults hold the pre-checks and polling; an
/// implementation only supplies the raw primitives.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    async fn exists(&self, name: &str) -> Result<bool, HangarError>;
    /// Raw `new-session`; does not wait for the session to appear.
    async fn new_session(&self, name: &str, workdir: Option<&Path>) -> Result<(), HangarError>;
    async fn list(&self) -> Result<Vec<LiveSession>, HangarError>;
    async fn kill(&self, name: &str) -> Result<(), HangarError>;
    /// Raw `rename-session`; use `rename` for the checked version.
    async fn rename_session(&self, old: &str, new: &str) -> Result<(), HangarError>;
    async fn send_keys(&self, name: &str, keys: &[&str]) -> Result<(), HangarError>;
    async fn capture_pane(&self, name: &str, start_line: i32) -> Result<String, HangarError>;
    async fn attach(&self, name: &str) -> Result<DoneSignal, HangarError>;
    fn detach(&self, name: &str) -> Result<(), HangarError>;

    async fn apply_options(&self, _name: &str, _opts: &SessionOptions) -> Result<(), HangarError> {
        Ok(())
    }

    /// Load a tmux config file into the running server.
    async fn source_config(&self, _path: &Path) -> Result<(), HangarError> {
        Ok(())
    }

    /// Type `text` literally, then press Enter.
    async fn send_text(&self, name: &str, text: &str) -> Result<(), HangarError> {
        self.send_keys(name, &["-l", text]).await?;
        self.send_keys(name, &["Enter"]).await
    }

    /// Create a session and, once it is observable, type the agent startup
    /// command into it. The two steps are separate: the session can exist
    /// before the agent runs.
    async fn create(
        &self,
        name: &str,
        workdir: Option<&Path>,
        launch: Option<&AgentLaunch>,
    ) -> Result<LiveSession, HangarError> {
        if self.exists(name).await? {
            return Err(HangarError::AlreadyExists(name.to_string()));
        }
        self.new_session(name, workdir).await?;

        let started = tokio::time::Instant::now();
        loop {
            if self.exists(name).await? {
                break;
            }
            if started.elapsed() >= CREATE_TIMEOUT {
                return Err(HangarError::CreationTimeout {
                    name: name.to_string(),
                    waited_ms: CREATE_TIMEOUT.as_millis() as u64,
                });
            }
            tokio::time::sleep(CREATE_POLL_INTERVAL).await;
        }
        info!(session = name, "tmux session created");

        if let Some(launch) = launch {
            let cmd = startup_command(name, workdir, launch);
            self.send_keys(name, &[cmd.as_str(), "Enter"]).await?;
            info!(session = name, execution_id = %launch.execution_id, "agent launch sent");
        }

        Ok(LiveSession {
            name: name.to_string(),
            created: chrono::Utc::now().timestamp(),
            attached: false,
            windows: 1,
        })
    }

    /// Rename after checking both names; nothing changes when a check fails.
    async fn rename(&self, old: &str, new: &str) -> Result<(), HangarError> {
        if !self.exists(old).await? {
            return Err(HangarError::NotFound(old.to_string()));
        }
        if self.exists(new).await? {
            return Err(HangarError::AlreadyExists(new.to_string()));
        }
        self.rename_session(old, new).await
    }
}

/// Quote `s` for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Shell line typed into a new pane: cd, export identity, exec `start`.
pub fn startup_command(name: &str, workdir: Option<&Path>, launch: &AgentLaunch) -> String {
    let mut parts = vec![];
    if let Some(dir) = workdir {
        parts.push(format!("cd {}", shell_quote(&dir.to_string_lossy())));
    }
    let mut exports = vec![
        format!("{ENV_SESSION}={}", shell_quote(name)),
        format!("{ENV_EXECUTION_ID}={}", shell_quote(&launch.execution_id)),
        format!("{ENV_HOME}={}", shell_quote(&launch.data_dir.to_string_lossy())),
    ];
    if launch.debug {
        exports.push(format!("{ENV_DEBUG}=1"));
    }
    parts.push(format!("export {}", exports.join(" ")));
    parts.push(format!(
        "exec {} start {}",
        shell_quote(&launch.exe.to_string_lossy()),
        shell_quote(name)
    ));
    parts.join(" && ")
}

/// Exact-match session target, so `foo` never resolves to `foobar`.
fn session_target(name: &str) -> String {
    format!("={name}")
}

/// Active pane of the exactly-named session.
fn pane_target(name: &str) -> String {
    format!("={name}:")
}

/// tmux's "nothing to list" conditions: no server, or a server with no sessions.
pub fn is_no_sessions(output: &str) -> bool {
    output.contains("no server running")
        || output.contains("no sessions")
        || (output.contains("error connecting to") && output.contains("No such file or directory"))
}

pub fn parse_session_list(output: &str) -> Vec<LiveSession> {
    output
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 4 || parts[0].is_empty() {
                return None;
            }
            Some(LiveSession {
                name: parts[0].to_string(),
                created: parts[1].parse().unwrap_or(0),
                attached: parts[2].parse::<u32>().unwrap_or(0) > 0,
                windows: parts[3].parse().unwrap_or(0),
            })
        })
        .collect()
}

/// Shells out to the `tmux` binary. Constructed once per process and passed
/// to whatever needs it.
pub struct TmuxClient {
    socket: Option<String>,
    attachments: Arc<AttachTable>,
}

impl TmuxClient {
    pub fn new(socket: Option<String>) -> Self {
        Self {
            socket,
            attachments: Arc::new(AttachTable::default()),
        }
    }

    /// Check if tmux is installed
    pub fn is_available() -> bool {
        which::which("tmux").is_ok()
    }

    fn base_args(&self) -> Vec<String> {
        match &self.socket {
            Some(s) => vec!["-L".to_string(), s.clone()],
            None => vec![],
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("tmux");
        cmd.args(self.base_args()).args(args);
        cmd
    }

    /// Full argv for `tmux attach-session`, used by the PTY spawner.
    fn attach_argv(&self, name: &str) -> Vec<String> {
        let mut argv = vec!["tmux".to_string()];
        argv.extend(self.base_args());
        argv.extend(["attach-session".to_string(), "-t".to_string(), session_target(name)]);
        argv
    }

    /// Run tmux, retrying transient server failures. Non-zero exits carry the
    /// combined stdout/stderr.
    async fn run(&self, args: &[&str]) -> Result<String, HangarError> {
        let mut last_err = None;

        for attempt in 0..3u32 {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(50 * 2u64.pow(attempt))).await;
            }
            debug!(args = ?args, attempt, "tmux");

            match self.command(args).output().await {
                Ok(output) => {
                    if output.status.success() {
                        return Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string());
                    }
                    let combined = format!(
                        "{}{}",
                        String::from_utf8_lossy(&output.stdout),
                        String::from_utf8_lossy(&output.stderr)
                    )
                    .trim()
                    .to_string();
                    if attempt < 2 && is_transient_tmux_error(&combined) {
                        debug!(args = ?args, attempt, "tmux transient failure, retrying");
                        last_err = Some(combined);
                        continue;
                    }
                    return Err(HangarError::ExternalTool {
                        command: format!("tmux {}", args.join(" ")),
                        output: combined,
                    });
                }
                Err(e) => {
                    if attempt < 2 && is_transient_io_error(&e) {
                        debug!(args = ?args, attempt, error = %e, "tmux IO error, retrying");
                        last_err = Some(e.to_string());
                        continue;
                    }
                    return Err(HangarError::from(e));
                }
            }
        }

        Err(HangarError::ExternalTool {
            command: format!("tmux {}", args.join(" ")),
            output: format!("failed after 3 attempts: {}", last_err.unwrap_or_default()),
        })
    }
}

#[async_trait]
impl Multiplexer for TmuxClient {
    async fn exists(&self, name: &str) -> Result<bool, HangarError> {
        let output = self
            .command(&["has-session", "-t", &session_target(name)])
            .output()
            .await?;
        Ok(output.status.success())
    }

    async fn new_session(&self, name: &str, workdir: Option<&Path>) -> Result<(), HangarError> {
        let dir = workdir.map(|d| d.to_string_lossy().to_string());
        let mut args = vec!["new-session", "-d", "-s", name];
        if let Some(dir) = &dir {
            args.extend(["-c", dir.as_str()]);
        }
        self.run(&args).await.map(|_| ())
    }

    async fn list(&self) -> Result<Vec<LiveSession>, HangarError> {
        let format = "#{session_name}\t#{session_created}\t#{session_attached}\t#{session_windows}";
        match self.run(&["list-sessions", "-F", format]).await {
            Ok(out) => Ok(parse_session_list(&out)),
            Err(HangarError::ExternalTool { output, .. }) if is_no_sessions(&output) => Ok(vec![]),
            Err(e) => Err(e),
        }
    }

    async fn kill(&self, name: &str) -> Result<(), HangarError> {
        if self.attachments.is_attached(name) {
            let _ = self.attachments.detach(name);
        }
        self.run(&["kill-session", "-t", &session_target(name)])
            .await
            .map(|_| ())
    }

    async fn rename_session(&self, old: &str, new: &str) -> Result<(), HangarError> {
        self.run(&["rename-session", "-t", &session_target(old), new])
            .await
            .map(|_| ())
    }

    async fn send_keys(&self, name: &str, keys: &[&str]) -> Result<(), HangarError> {
        let target = pane_target(name);
        let mut args = vec!["send-keys", "-t", target.as_str()];
        args.extend_from_slice(keys);
        self.run(&args).await.map(|_| ())
    }

    async fn capture_pane(&self, name: &str, start_line: i32) -> Result<String, HangarError> {
        let start = start_line.to_string();
        self.run(&["capture-pane", "-p", "-t", &pane_target(name), "-S", &start])
            .await
    }

    async fn apply_options(&self, name: &str, opts: &SessionOptions) -> Result<(), HangarError> {
        let target = session_target(name);
        let on_off = |b: bool| if b { "on" } else { "off" };
        let history = opts.history_limit.to_string();
        self.run(&["set-option", "-t", &target, "mouse", on_off(opts.mouse)])
            .await?;
        self.run(&["set-option", "-t", &target, "history-limit", &history])
            .await?;
        self.run(&["set-option", "-t", &target, "status", on_off(opts.status_bar)])
            .await
            .map(|_| ())
    }

    async fn source_config(&self, path: &Path) -> Result<(), HangarError> {
        let path = path.to_string_lossy();
        self.run(&["source-file", &path]).await.map(|_| ())
    }

    async fn attach(&self, name: &str) -> Result<DoneSignal, HangarError> {
        if !self.exists(name).await? {
            return Err(HangarError::NotFound(name.to_string()));
        }
        let argv = self.attach_argv(name);
        let table = Arc::clone(&self.attachments);
        let session = name.to_string();
        self.attachments
            .attach(name, move || pty::spawn_attach(argv, table, session))
    }

    fn detach(&self, name: &str) -> Result<(), HangarError> {
        self.attachments.detach(name)
    }
}

/// Check if an IO error is transient and worth retrying.
fn is_transient_io_error(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::Interrupted
    )
}

/// Check if a tmux message indicates a transient failure.
fn is_transient_tmux_error(output: &str) -> bool {
    output.contains("server exited") || output.contains("lost server")
}

/// Best-effort kill used by cleanup paths: logs instead of failing.
pub async fn kill_quietly(mux: &dyn Multiplexer, name: &str) {
    match mux.exists(name).await {
        Ok(true) => {
            if let Err(e) = mux.kill(name).await {
                warn!(session = name, error = %e, "failed to kill tmux session");
            }
        }
        Ok(false) => {}
        Err(e) => warn!(session = name, error = %e, "could not query tmux session"),
    }
}
