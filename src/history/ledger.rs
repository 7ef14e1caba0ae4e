// Ledger persistence backends
use crate::error::{RatesError, Result};
use crate::models::Ledger;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Whole-document persistence for the rate ledger.
///
/// `load` returns an empty ledger when nothing has been stored yet. `store`
/// replaces the whole document; readers must never observe a partial write.
pub trait LedgerBackend: Send + Sync {
    fn load(&self) -> Result<Ledger>;
    fn store(&self, ledger: &Ledger) -> Result<()>;
}

/// JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl LedgerBackend for FileLedger {
    fn load(&self) -> Result<Ledger> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Ledger::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(Ledger::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn store(&self, ledger: &Ledger) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let document = serde_json::to_string_pretty(ledger)?;

        // Write aside, then rename over the document
        let staging = self.staging_path();
        fs::write(&staging, document)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

/// In-process ledger for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    document: RwLock<Ledger>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerBackend for MemoryLedger {
    fn load(&self) -> Result<Ledger> {
        self.document
            .read()
            .map(|ledger| ledger.clone())
            .map_err(|_| poisoned())
    }

    fn store(&self, ledger: &Ledger) -> Result<()> {
        let mut guard = self
            .document
            .write()
            .map_err(|_| poisoned())?;
        *guard = ledger.clone();
        Ok(())
    }
}

fn poisoned() -> RatesError {
    RatesError::Io(std::io::Error::new(
        ErrorKind::Other,
        "memory ledger lock poisoned",
    ))
}
