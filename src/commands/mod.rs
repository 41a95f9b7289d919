pub mod attach;
pub mod delete;
pub mod edit;
pub mod hooks;
pub mod list;
pub mod new;
pub mod notify;
pub mod pane;
pub mod rename;
pub mod shell;
pub mod start;

use crate::config::GlobalConfig;
use crate::infra::state::RegistryStore;
use crate::infra::tmux::{AgentLaunch, Multiplexer};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a lifecycle operation needs, built once in `main` (or by the
/// dashboard) and passed down.
pub struct Context {
    pub store: RegistryStore,
    pub mux: Arc<dyn Multiplexer>,
    pub config: GlobalConfig,
    /// This executable, re-entered inside panes as `hangar start`.
    pub exe: PathBuf,
}

impl Context {
    pub fn new(store: RegistryStore, mux: Arc<dyn Multiplexer>, config: GlobalConfig) -> Self {
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("hangar"));
        Self {
            store,
            mux,
            config,
            exe,
        }
    }

    pub fn launch(&self, execution_id: &str) -> AgentLaunch {
        AgentLaunch {
            exe: self.exe.clone(),
            data_dir: self.store.data_dir().to_path_buf(),
            execution_id: execution_id.to_string(),
            debug: self.config.debug_env,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::infra::fake::FakeMultiplexer;
    use tempfile::TempDir;

    /// Context over a temp registry and an in-memory multiplexer.
    pub struct TestContext {
        pub ctx: Context,
        pub mux: Arc<FakeMultiplexer>,
        _dir: TempDir,
    }

    impl TestContext {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mux = Arc::new(FakeMultiplexer::default());
            let mut ctx = Context::new(
                RegistryStore::new(dir.path()),
                mux.clone(),
                GlobalConfig::default(),
            );
            ctx.exe = PathBuf::from("/usr/bin/hangar");
            Self { ctx, mux, _dir: dir }
        }

        /// For owners of the context (the dashboard); the dir must outlive it.
        pub fn into_parts(self) -> (Context, Arc<FakeMultiplexer>, TempDir) {
            (self.ctx, self.mux, self._dir)
        }
    }
}
