use crate::factory::{PlatformProcessHandle, PlatformProcessManager, PlatformProcessManagerFactory};
use spaces_launcher_core::{
    CancellationToken, Launcher, LauncherConfig, LauncherError, LauncherStdOut, NotStarted,
    Outcome, ProcessId, ProcessManagerFactory, Running,
};
use std::sync::Arc;

/// High-level platform-independent launcher
pub struct SpacesLauncher<Status> {
    inner: Launcher<Status, PlatformProcessManager>,
}

impl SpacesLauncher<NotStarted> {
    /// Create a launcher that prints to the process's standard output
    pub fn new(config: LauncherConfig) -> Self {
        let manager = PlatformProcessManagerFactory::create_process_manager();
        Self {
            inner: Launcher::new(config, Arc::new(manager)),
        }
    }

    pub fn new_with_output(config: LauncherConfig, out: LauncherStdOut) -> Self {
        let manager = PlatformProcessManagerFactory::create_process_manager();
        Self {
            inner: Launcher::new_with_output(config, Arc::new(manager), out),
        }
    }

    /// Launcher for an arbitrary command, everything else left at its defaults
    pub fn for_command<S: ToString, I: IntoIterator<Item = S>>(
        command: impl Into<String>,
        args: I,
        out: LauncherStdOut,
    ) -> Result<Self, LauncherError> {
        let config = LauncherConfig::builder()
            .command(command)
            .args(args)
            .build()
            .map_err(|e| LauncherError::Configuration(e.to_string()))?;
        Ok(Self::new_with_output(config, out))
    }

    pub fn config(&self) -> &LauncherConfig {
        self.inner.config()
    }

    pub async fn print_banner(&self) -> Result<(), LauncherError> {
        self.inner.print_banner().await
    }

    /// Spawn the application without printing the banner
    pub async fn start(self) -> Result<SpacesLauncher<Running<PlatformProcessHandle>>, LauncherError> {
        let inner = self.inner.start().await?;
        Ok(SpacesLauncher { inner })
    }

    /// Banner, spawn, relay output and wait: the whole launch in one call
    pub async fn run(self, shutdown: CancellationToken) -> Result<Outcome, LauncherError> {
        self.inner.run(shutdown).await
    }
}

impl SpacesLauncher<Running<PlatformProcessHandle>> {
    pub fn pid(&self) -> Option<ProcessId> {
        self.inner.pid()
    }

    pub async fn supervise(self, shutdown: CancellationToken) -> Result<Outcome, LauncherError> {
        self.inner.supervise(shutdown).await
    }
}
