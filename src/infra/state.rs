use crate::domain::registry::RegistryState;
use crate::domain::session::{Session, SessionState};
use crate::error::HangarError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Durable session registry shared by the controller and short-lived hook
/// processes.
///
/// Every read-modify-write holds an exclusive `flock` on `registry.lock` for
/// its whole duration, and commits by writing a temp file and renaming it
/// over `registry.json`. A crash mid-write leaves the previous document.
pub struct RegistryStore {
    data_dir: PathBuf,
    registry_file: PathBuf,
    lock_file: PathBuf,
}

/// Advisory lock held until dropped.
struct RegistryLock {
    file: File,
}

impl RegistryLock {
    fn acquire(path: &Path, exclusive: bool) -> Result<Self, HangarError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| persistence("open lock file", e))?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|e| persistence("lock registry", e))?;
        Ok(Self { file })
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn persistence(what: &str, err: impl std::fmt::Display) -> HangarError {
    HangarError::Persistence(format!("{what}: {err}"))
}

impl RegistryStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            registry_file: data_dir.join("registry.json"),
            lock_file: data_dir.join("registry.lock"),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn registry_file(&self) -> &Path {
        &self.registry_file
    }

    fn ensure_dir(&self) -> Result<(), HangarError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| persistence("create data dir", e))
    }

    /// Load the registry. A missing or empty document is an empty registry.
    pub fn load(&self) -> Result<RegistryState, HangarError> {
        self.ensure_dir()?;
        let _lock = RegistryLock::acquire(&self.lock_file, false)?;
        self.read_unlocked()
    }

    fn read_unlocked(&self) -> Result<RegistryState, HangarError> {
        let content = match fs::read_to_string(&self.registry_file) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RegistryState::default()),
            Err(e) => return Err(persistence("read registry", e)),
        };
        if content.trim().is_empty() {
            return Ok(RegistryState::default());
        }
        let mut state: RegistryState =
            serde_json::from_str(&content).map_err(|e| persistence("parse registry", e))?;
        state.normalize();
        Ok(state)
    }

    fn write_unlocked(&self, state: &RegistryState) -> Result<(), HangarError> {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let json =
            serde_json::to_string_pretty(state).map_err(|e| persistence("encode registry", e))?;
        let tmp = self.data_dir.join(format!(
            "registry.{}.{}.tmp",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed),
        ));
        let result = (|| {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.registry_file)
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(persistence("write registry", e));
        }
        Ok(())
    }

    /// Replace the whole registry. The stored revision always moves forward,
    /// even if `state` was loaded before another process saved.
    pub fn save(&self, state: &RegistryState) -> Result<u64, HangarError> {
        self.ensure_dir()?;
        let _lock = RegistryLock::acquire(&self.lock_file, true)?;
        // A document that does not parse is never overwritten.
        let on_disk = self.read_unlocked()?.revision;
        let mut next = state.clone();
        next.normalize();
        next.revision = on_disk.max(state.revision) + 1;
        next.updated_at = Some(chrono::Utc::now());
        self.write_unlocked(&next)?;
        Ok(next.revision)
    }

    /// Apply `f` to the current registry under the exclusive lock and commit
    /// the result. Nothing is written when `f` fails.
    pub fn update<T>(
        &self,
        f: impl FnOnce(&mut RegistryState) -> Result<T, HangarError>,
    ) -> Result<T, HangarError> {
        self.update_if(|state| f(state).map(|out| (out, true)))
    }

    /// Like `update`, but `f` decides whether anything needs committing.
    pub fn update_if<T>(
        &self,
        f: impl FnOnce(&mut RegistryState) -> Result<(T, bool), HangarError>,
    ) -> Result<T, HangarError> {
        self.ensure_dir()?;
        let _lock = RegistryLock::acquire(&self.lock_file, true)?;
        let mut state = self.read_unlocked()?;
        let (out, commit) = f(&mut state)?;
        if !commit {
            return Ok(out);
        }
        state.revision += 1;
        state.updated_at = Some(chrono::Utc::now());
        self.write_unlocked(&state)?;
        debug!(revision = state.revision, "registry committed");
        Ok(out)
    }

    pub fn get(&self, name: &str) -> Result<Session, HangarError> {
        self.load()?
            .get(name)
            .cloned()
            .ok_or_else(|| HangarError::NotFound(name.to_string()))
    }

    pub fn add(&self, session: Session) -> Result<(), HangarError> {
        self.update(|reg| reg.add(session))
    }

    pub fn delete(&self, name: &str) -> Result<Session, HangarError> {
        self.update(|reg| reg.delete(name))
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<(), HangarError> {
        self.update(|reg| reg.rename(old, new))
    }

    pub fn swap_positions(&self, a: &str, b: &str) -> Result<(), HangarError> {
        self.update(|reg| reg.swap_positions(a, b))
    }

    pub fn update_state(&self, name: &str, state: SessionState) -> Result<(), HangarError> {
        self.update(|reg| reg.update_state(name, state))
    }

    pub fn update_display_name(&self, name: &str, display: &str) -> Result<(), HangarError> {
        self.update(|reg| reg.update_display_name(name, display))
    }

    pub fn toggle_flag(&self, name: &str) -> Result<bool, HangarError> {
        self.update(|reg| reg.toggle_flag(name))
    }

    pub fn toggle_archive(&self, name: &str) -> Result<bool, HangarError> {
        self.update(|reg| reg.toggle_archive(name))
    }

    pub fn set_comment(&self, name: &str, comment: &str) -> Result<(), HangarError> {
        self.update(|reg| reg.set_comment(name, comment))
    }

    pub fn set_status(&self, name: &str, status: &str) -> Result<(), HangarError> {
        self.update(|reg| reg.set_status(name, status))
    }

    pub fn set_shell_session(&self, name: &str, shell: Option<String>) -> Result<(), HangarError> {
        self.update(|reg| reg.set_shell_session(name, shell))
    }

    pub fn set_execution_id(&self, name: &str, id: &str) -> Result<(), HangarError> {
        self.update(|reg| reg.set_execution_id(name, id))
    }
}
