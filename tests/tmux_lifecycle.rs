//! Runs against a real tmux server on a private socket. Skipped when tmux is
//! not installed.

use hangar::error::HangarError;
use hangar::infra::tmux::{Multiplexer, TmuxClient};
use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Private server; killed on drop so failed tests don't leak it.
struct Server {
    socket: String,
    client: TmuxClient,
}

impl Server {
    fn start() -> Option<Self> {
        if !TmuxClient::is_available() {
            eprintln!("tmux not installed, skipping");
            return None;
        }
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let socket = format!("hangar-test-{}-{n}", std::process::id());
        let client = TmuxClient::new(Some(socket.clone()));
        Some(Self { socket, client })
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = std::process::Command::new("tmux")
            .args(["-L", &self.socket, "kill-server"])
            .output();
    }
}

#[tokio::test]
async fn list_without_server_is_empty() {
    let Some(server) = Server::start() else {
        return;
    };
    assert!(server.client.list().await.unwrap().is_empty());
    assert!(!server.client.exists("nothing").await.unwrap());
}

#[tokio::test]
async fn create_exists_kill() {
    let Some(server) = Server::start() else {
        return;
    };
    let dir = tempfile::tempdir().unwrap();
    let mux = &server.client;

    mux.create("alpha", Some(dir.path()), None).await.unwrap();
    assert!(mux.exists("alpha").await.unwrap());
    // Exact matching: a prefix is not the session.
    assert!(!mux.exists("alp").await.unwrap());

    let names: Vec<String> = mux.list().await.unwrap().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["alpha"]);

    assert!(matches!(
        mux.create("alpha", None, None).await,
        Err(HangarError::AlreadyExists(_))
    ));

    mux.kill("alpha").await.unwrap();
    assert!(!mux.exists("alpha").await.unwrap());
}

#[tokio::test]
async fn rename_round_trip() {
    let Some(server) = Server::start() else {
        return;
    };
    let mux = &server.client;
    mux.create("one", None, None).await.unwrap();

    mux.rename("one", "two").await.unwrap();
    assert!(!mux.exists("one").await.unwrap());
    assert!(mux.exists("two").await.unwrap());

    mux.rename("two", "one").await.unwrap();
    assert!(mux.exists("one").await.unwrap());

    assert!(matches!(
        mux.rename("missing", "x").await,
        Err(HangarError::NotFound(_))
    ));
}

#[tokio::test]
async fn send_and_capture() {
    let Some(server) = Server::start() else {
        return;
    };
    let mux = &server.client;
    mux.create("echo", None, None).await.unwrap();
    mux.send_text("echo", "echo hangar-marker-$((40+2))").await.unwrap();

    let mut found = false;
    for _ in 0..40 {
        let content = mux.capture_pane("echo", -50).await.unwrap();
        if content.contains("hangar-marker-42") {
            found = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert!(found, "command output never appeared in the pane");
}
