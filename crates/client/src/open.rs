//! Opening chosen books with an external command.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use shelf_core::Book;
use tokio::process::Command;

/// Dispatches a book to whatever should show it. Returns true if it was launched.
#[async_trait]
pub trait Opener: Send + Sync {
    async fn open(&self, book: &Book) -> bool;
}

/// Remembers whether executables exist on `PATH`.
#[derive(Debug, Default)]
pub struct AvailabilityCache {
    known: Mutex<HashMap<String, bool>>,
}

impl AvailabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `program`, searching `PATH` only the first time it is asked about.
    pub fn is_available(&self, program: &str) -> bool {
        *self.known().entry(program.to_string()).or_insert_with(|| find_executable(program).is_some())
    }

    pub fn cached(&self, program: &str) -> Option<bool> {
        self.known().get(program).copied()
    }

    fn known(&self) -> MutexGuard<'_, HashMap<String, bool>> {
        self.known.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata().map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0).unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

fn find_executable(program: &str) -> Option<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) {
        let path = PathBuf::from(program);
        return is_executable(&path).then_some(path);
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).map(|dir| dir.join(program)).find(|candidate| is_executable(candidate))
}

/// Runs a configured command with the book URL as the last argument.
#[derive(Debug)]
pub struct CommandOpener {
    program: String,
    args: Vec<String>,
    availability: AvailabilityCache,
}

impl CommandOpener {
    /// `command` is split on whitespace; the first word is the program.
    pub fn new(command: &str) -> Self {
        let mut words = command.split_whitespace().map(String::from);
        let program = words.next().unwrap_or_default();
        Self { program, args: words.collect(), availability: AvailabilityCache::new() }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn availability(&self) -> &AvailabilityCache {
        &self.availability
    }
}

#[async_trait]
impl Opener for CommandOpener {
    async fn open(&self, book: &Book) -> bool {
        let Some(url) = book.url.as_deref() else {
            tracing::info!(position = book.position, "no link for {:?}, not opening", book.title);
            return false;
        };

        if self.program.is_empty() || !self.availability.is_available(&self.program) {
            tracing::warn!(command = %self.program, "browser command not found on PATH");
            return false;
        }

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => {
                tracing::debug!(command = %self.program, url, "opened book");
                true
            }
            Ok(status) => {
                tracing::warn!(command = %self.program, url, "browser command exited with {}", status);
                false
            }
            Err(e) => {
                tracing::warn!(command = %self.program, url, "failed to run browser command: {}", e);
                false
            }
        }
    }
}

/// Logs what would be opened without launching anything.
#[derive(Debug, Default)]
pub struct DryRunOpener;

#[async_trait]
impl Opener for DryRunOpener {
    async fn open(&self, book: &Book) -> bool {
        tracing::info!(position = book.position, url = ?book.url, "not opening {:?}", book.title);
        false
    }
}
