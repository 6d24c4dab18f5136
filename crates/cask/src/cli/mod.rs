//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::time::Duration;

use cask_common::paths::DEFAULT_NAMESPACE;
use cask_common::{CaskError, CaskPaths, CaskResult, id};
use cask_volume::{LockGuard, VolumeService, VolumeStore};
use clap::{CommandFactory, Parser, Subcommand};
use color_eyre::eyre::Result;

use crate::containers::StateDir;

pub mod container;
pub mod volume;

pub use container::ContainerCommand;
pub use volume::VolumeCommand;

/// Cask - Docker-compatible volume management
#[derive(Parser)]
#[command(name = "cask")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root directory for cask data
    #[arg(long, global = true, env = "CASK_ROOT")]
    pub data_root: Option<PathBuf>,

    /// Namespace isolating volumes and containers
    #[arg(
        short,
        long,
        global = true,
        env = "CASK_NAMESPACE",
        default_value = DEFAULT_NAMESPACE
    )]
    pub namespace: String,

    /// Give up waiting for the volume store lock after this many seconds
    #[arg(long, global = true, env = "CASK_LOCK_TIMEOUT", value_name = "SECONDS")]
    pub lock_timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage volumes
    #[command(subcommand)]
    Volume(VolumeCommand),

    /// Manage container records
    #[command(subcommand)]
    Container(ContainerCommand),

    /// Generate shell completion scripts
    Completion {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

/// Resolved data root and namespace shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// Data root paths.
    pub paths: CaskPaths,
    /// Active namespace.
    pub namespace: String,
    /// Deadline for acquiring the store lock; `None` waits forever.
    pub lock_timeout: Option<Duration>,
}

impl Context {
    /// Build a context, validating the namespace.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidArgument`] for a malformed namespace.
    pub fn new(paths: CaskPaths, namespace: impl Into<String>) -> CaskResult<Self> {
        let namespace = namespace.into();
        id::validate(&namespace)
            .map_err(|_| CaskError::invalid_argument(format!("invalid namespace {namespace:?}")))?;
        Ok(Self {
            paths,
            namespace,
            lock_timeout: None,
        })
    }

    /// Set the deadline for acquiring the store lock.
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Open the volume store of the active namespace.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store directory cannot be created.
    pub fn store(&self) -> CaskResult<VolumeStore> {
        VolumeStore::open(&self.paths, &self.namespace)
    }

    /// Container records of the active namespace.
    #[must_use]
    pub fn states(&self) -> StateDir {
        StateDir::new(self.paths.containers(&self.namespace))
    }

    /// Hold the store lock for a whole command.
    ///
    /// Waits at most the configured timeout, or forever without one.
    ///
    /// # Errors
    ///
    /// Returns a storage error of kind `WouldBlock` when the deadline passes.
    pub fn lock<'a>(&self, store: &'a VolumeStore) -> CaskResult<LockGuard<'a>> {
        match self.lock_timeout {
            Some(timeout) => store.guard_timeout(timeout),
            None => store.guard(),
        }
    }

    /// Hold the store lock for a command only when a deadline is configured.
    ///
    /// Without one, each store operation takes the lock itself.
    ///
    /// # Errors
    ///
    /// See [`Context::lock`].
    pub fn deadline_lock<'a>(&self, store: &'a VolumeStore) -> CaskResult<Option<LockGuard<'a>>> {
        if self.lock_timeout.is_some() {
            self.lock(store).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Volume operations aware of this namespace's containers.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be opened.
    pub fn service(&self) -> CaskResult<VolumeService<StateDir>> {
        Ok(VolumeService::new(self.store()?, self.states()))
    }
}

impl Cli {
    /// Execute the CLI command.
    pub fn execute(self) -> Result<()> {
        let paths = self
            .data_root
            .map_or_else(CaskPaths::new, CaskPaths::with_root);
        tracing::debug!(root = %paths.root.display(), namespace = %self.namespace, "Resolved configuration");

        let lock_timeout = self.lock_timeout.map(Duration::from_secs);
        let context = || {
            Context::new(paths.clone(), self.namespace.clone())
                .map(|ctx| ctx.with_lock_timeout(lock_timeout))
        };

        match self.command {
            Commands::Volume(command) => command.execute(&context()?),
            Commands::Container(command) => command.execute(&context()?),
            Commands::Completion { shell } => {
                let mut cmd = Self::command();
                clap_complete::generate(shell, &mut cmd, "cask", &mut std::io::stdout());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cask", "volume", "ls", "-n", "ns1", "--data-root", "/tmp/root", "-q",
        ])
        .unwrap();
        assert_eq!(cli.namespace, "ns1");
        assert_eq!(cli.data_root, Some(PathBuf::from("/tmp/root")));
        assert_eq!(cli.lock_timeout, None);
    }

    #[test]
    fn lock_timeout_bounds_the_wait() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = Context::new(CaskPaths::with_root(temp.path()), "default")
            .unwrap()
            .with_lock_timeout(Some(Duration::from_millis(30)));
        let holder = ctx.store().unwrap();
        let waiter = ctx.store().unwrap();

        let held = ctx.lock(&holder).unwrap();
        let err = ctx.deadline_lock(&waiter).unwrap_err();
        assert_eq!(err.kind(), cask_common::ErrorKind::Storage);
        drop(held);

        assert!(ctx.deadline_lock(&waiter).unwrap().is_some());
        let unbounded = ctx.clone().with_lock_timeout(None);
        assert!(unbounded.deadline_lock(&holder).unwrap().is_none());
    }

    #[test]
    fn rejects_bad_namespace() {
        let err = Context::new(CaskPaths::with_root("/tmp/x"), "../up").unwrap_err();
        assert_eq!(err.kind(), cask_common::ErrorKind::InvalidArgument);
    }
}
