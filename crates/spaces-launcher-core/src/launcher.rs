use crate::codec::{Lines, lines};
use crate::config::LauncherConfig;
use crate::error::LauncherError;
use crate::outcome::Outcome;
use crate::process::{
    MergedOutput, ProcessHandle, ProcessId, ProcessManager, SpawnSpec, TerminationResult,
};
use crate::stdio::LauncherStdOut;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on reaping a child after it has been force killed
const REAP_TIMEOUT: Duration = Duration::from_secs(1);

pub struct NotStarted;

pub struct Running<Handle> {
    handle: Handle,
    lines: Lines<MergedOutput>,
}

/// Supervises exactly one child process for its whole lifetime.
///
/// `Launcher<NotStarted, _>` becomes `Launcher<Running<_>, _>` once the child has been
/// spawned, and [`Launcher::supervise`] consumes it into a final [`Outcome`].
pub struct Launcher<Status, Manager> {
    config: LauncherConfig,
    process_manager: Arc<Manager>,
    out: LauncherStdOut,
    status: Status,
}

impl<Status, Manager> Launcher<Status, Manager> {
    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }
}

impl<Manager: ProcessManager> Launcher<NotStarted, Manager> {
    pub fn new(config: LauncherConfig, process_manager: Arc<Manager>) -> Self {
        Self::new_with_output(config, process_manager, LauncherStdOut::stdout())
    }

    pub fn new_with_output(
        config: LauncherConfig,
        process_manager: Arc<Manager>,
        out: LauncherStdOut,
    ) -> Self {
        Self {
            config,
            process_manager,
            out,
            status: NotStarted,
        }
    }

    pub async fn print_banner(&self) -> Result<(), LauncherError> {
        let config = &self.config;
        self.out
            .print_line(&format!("🕉️ Starting {} - {}", config.app_name, config.tagline))
            .await?;
        self.out
            .print_line(&format!("🌸 Listening on port {}", config.port.display()))
            .await?;
        self.out.print_line("🛡️ Divine protection activated").await?;
        Ok(())
    }

    /// Spawn the configured command. Nothing is read from the child here.
    pub async fn start(self) -> Result<Launcher<Running<Manager::Handle>, Manager>, LauncherError> {
        if self.config.port_number().is_none() {
            warn!(port = %self.config.port.display(), "PORT is not a valid port number, forwarding it unchanged");
        }

        let spec = SpawnSpec::from(&self.config);
        debug!(command = %self.config.command_line(), "spawning application");

        let mut handle = self
            .process_manager
            .spawn_process(&spec)
            .await
            .map_err(|source| LauncherError::startup_failure(&self.config.command, source))?;

        let Some(output) = handle.take_output() else {
            if let Err(e) = handle.kill().await {
                warn!(error = %e, "failed to kill child without an output stream");
            }
            return Err(LauncherError::Other(anyhow::anyhow!(
                "spawned process has no output stream"
            )));
        };

        info!(
            pid = ?handle.get_pid(),
            command = %self.config.command_line(),
            "application started"
        );

        Ok(Launcher {
            config: self.config,
            process_manager: self.process_manager,
            out: self.out,
            status: Running {
                handle,
                lines: lines(output),
            },
        })
    }

    /// Print the banner, start the child and supervise it until it exits or
    /// `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<Outcome, LauncherError> {
        self.print_banner().await?;

        let out = self.out.clone();
        let app_name = self.config.app_name.clone();

        match self.start().await {
            Ok(running) => running.supervise(shutdown).await,
            Err(e) => {
                error!(error = %e, "application did not start");
                out.print_line(&format!("❌ Error starting {app_name}: {e}"))
                    .await?;
                Err(e)
            }
        }
    }
}

impl<Manager: ProcessManager> Launcher<Running<Manager::Handle>, Manager> {
    pub fn pid(&self) -> Option<ProcessId> {
        self.status.handle.get_pid()
    }

    /// Relay the child's output line by line until it closes, then wait for the
    /// child to exit. Cancelling `shutdown` at any point switches to a graceful stop.
    pub async fn supervise(self, shutdown: CancellationToken) -> Result<Outcome, LauncherError> {
        let Launcher {
            config,
            process_manager,
            out,
            status: Running {
                mut handle,
                mut lines,
            },
        } = self;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    return stop(&config, process_manager.as_ref(), &out, &mut handle, &mut lines).await;
                }
                next = lines.next() => match next {
                    Some(Ok(line)) => {
                        if let Err(e) = out.print_line(&line).await {
                            error!(error = %e, "cannot relay application output, stopping it");
                            shut_down(&config, process_manager.as_ref(), &out, &mut handle, &mut lines).await;
                            return Err(e.into());
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "failed to read application output");
                        break;
                    }
                    None => break,
                },
            }
        }

        debug!("application output closed, waiting for exit");

        let status = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                return stop(&config, process_manager.as_ref(), &out, &mut handle, &mut lines).await;
            }
            status = handle.wait() => status?,
        };

        let outcome = Outcome::from_exit_status(status);
        info!(%outcome, "application finished");
        Ok(outcome)
    }
}

/// Graceful stop on request: the notice, then [`shut_down`].
async fn stop<Manager: ProcessManager>(
    config: &LauncherConfig,
    process_manager: &Manager,
    out: &LauncherStdOut,
    handle: &mut Manager::Handle,
    lines: &mut Lines<MergedOutput>,
) -> Result<Outcome, LauncherError> {
    let notice = out
        .print_line(&format!("\n🙏 Gracefully shutting down {}", config.app_name))
        .await;
    info!(pid = ?handle.get_pid(), "shutdown requested, asking application to stop");

    shut_down(config, process_manager, out, handle, lines).await;

    notice?;
    Ok(Outcome::Interrupted)
}

/// Termination request, bounded wait while still relaying output, then a forced kill
/// if the child is still around. Always leaves the child stopped.
async fn shut_down<Manager: ProcessManager>(
    config: &LauncherConfig,
    process_manager: &Manager,
    out: &LauncherStdOut,
    handle: &mut Manager::Handle,
    lines: &mut Lines<MergedOutput>,
) {
    match process_manager.terminate_gracefully(handle).await {
        TerminationResult::Success | TerminationResult::ProcessNotFound => {}
        other => warn!(result = ?other, "termination request was not delivered"),
    }

    let drained = tokio::time::timeout(config.grace_period(), async {
        let mut relaying = true;
        while let Some(next) = lines.next().await {
            match next {
                Ok(line) if relaying => {
                    if let Err(e) = out.print_line(&line).await {
                        debug!(error = %e, "output closed during shutdown, discarding the rest");
                        relaying = false;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "stopped reading output during shutdown");
                    break;
                }
            }
        }
        handle.wait().await
    })
    .await;

    match drained {
        Ok(Ok(status)) => info!(%status, "application stopped"),
        Ok(Err(e)) => warn!(error = %e, "lost track of application during shutdown"),
        Err(_) => {
            warn!(
                grace_period_ms = config.grace_period_ms,
                "application still running after grace period, killing it"
            );
            match process_manager.force_kill(handle).await {
                TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                other => warn!(result = ?other, "force kill failed"),
            }
            if tokio::time::timeout(REAP_TIMEOUT, handle.wait()).await.is_err() {
                warn!("application did not exit after being killed");
            }
        }
    }
}
