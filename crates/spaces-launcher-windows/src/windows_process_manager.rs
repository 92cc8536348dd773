#[cfg(windows)]
mod windows_impl {
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use spaces_launcher_core::*;
    use std::os::windows::io::OwnedHandle;
    use std::process::{ExitStatus, Stdio};
    use sysinfo::System;
    use tokio::process::{Child, Command};
    use tracing::{debug, info, warn};
    use windows::Win32::System::Console::{CTRL_BREAK_EVENT, GenerateConsoleCtrlEvent};

    /// Keeps console interrupts aimed at the launcher away from the child
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

    /// Windows-specific process handle implementation
    pub struct WindowsProcessHandle {
        child: Child,
        command: String,
        args: Vec<String>,
        output: Option<MergedOutput>,
    }

    impl WindowsProcessHandle {
        pub fn new(child: Child, command: String, args: Vec<String>, output: MergedOutput) -> Self {
            Self {
                child,
                command,
                args,
                output: Some(output),
            }
        }
    }

    #[async_trait]
    impl ProcessHandle for WindowsProcessHandle {
        fn get_pid(&self) -> Option<ProcessId> {
            self.child.id().map(ProcessId::from)
        }

        fn get_command(&self) -> &str {
            &self.command
        }

        fn get_args(&self) -> &[String] {
            &self.args
        }

        fn take_output(&mut self) -> Option<MergedOutput> {
            self.output.take()
        }

        async fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
            Ok(self.child.try_wait()?)
        }

        async fn wait(&mut self) -> Result<ExitStatus> {
            Ok(self.child.wait().await?)
        }

        async fn kill(&mut self) -> Result<()> {
            self.child
                .kill()
                .await
                .map_err(|e| anyhow!("Failed to kill process: {}", e))
        }
    }

    /// Windows-specific process manager built on `taskkill`
    pub struct WindowsProcessManager {
        system: std::sync::Mutex<System>,
    }

    impl Default for WindowsProcessManager {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessLifecycle for WindowsProcessManager {
        type Handle = WindowsProcessHandle;

        async fn spawn_process(&self, spec: &SpawnSpec) -> std::io::Result<WindowsProcessHandle> {
            let (reader, writer) = std::io::pipe()?;
            let stderr_writer = writer.try_clone()?;

            let mut cmd = Command::new(&spec.command);
            cmd.args(&spec.args)
                .envs(&spec.env)
                .stdin(Stdio::null())
                .stdout(writer)
                .stderr(stderr_writer)
                .creation_flags(CREATE_NEW_PROCESS_GROUP)
                .kill_on_drop(true);

            if let Some(dir) = &spec.working_dir {
                cmd.current_dir(dir);
            }

            let spawned = cmd.spawn();
            drop(cmd);
            let child = spawned?;

            // Anonymous pipes cannot be registered with the reactor on Windows, so
            // reads go through tokio's blocking pool instead
            let output =
                tokio::fs::File::from_std(std::fs::File::from(OwnedHandle::from(reader)));

            if let Some(pid) = child.id() {
                info!(
                    pid = %pid,
                    command = %spec.command,
                    args = ?spec.args,
                    "Spawned Windows process"
                );
            }

            Ok(WindowsProcessHandle::new(
                child,
                spec.command.clone(),
                spec.args.clone(),
                Box::pin(output),
            ))
        }
    }

    #[async_trait]
    impl ProcessTermination for WindowsProcessManager {
        async fn terminate_gracefully(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
            let Some(pid) = handle.get_pid() else {
                return TerminationResult::ProcessNotFound;
            };

            // Console programs such as node ignore a polite taskkill, but stop on
            // Ctrl-Break sent to their process group
            match send_ctrl_break(pid) {
                Ok(()) => {
                    info!(pid = %pid, "Sent Ctrl-Break to process group");
                    return TerminationResult::Success;
                }
                Err(e) => debug!(pid = %pid, error = %e, "Ctrl-Break failed, trying taskkill"),
            }

            match taskkill(pid, false).await {
                Ok(true) => {
                    info!(pid = %pid, "Sent graceful termination to process tree");
                    TerminationResult::Success
                }
                Ok(false) => {
                    warn!(pid = %pid, "Graceful termination was refused");
                    TerminationResult::Failed("taskkill refused graceful termination".into())
                }
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Failed to gracefully terminate process");
                    TerminationResult::Failed(format!("Graceful termination failed: {e}"))
                }
            }
        }

        async fn force_kill(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
            let Some(pid) = handle.get_pid() else {
                return TerminationResult::ProcessNotFound;
            };

            let result = match taskkill(pid, true).await {
                Ok(true) => {
                    info!(pid = %pid, "Force killed process tree");
                    TerminationResult::Success
                }
                Ok(false) => {
                    info!(pid = %pid, "Process tree not found for force kill");
                    TerminationResult::ProcessNotFound
                }
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Failed to force kill process tree");
                    TerminationResult::Failed(format!("Force kill failed: {e}"))
                }
            };

            if let Err(e) = handle.kill().await {
                debug!(error = %e, "Handle kill cleanup failed");
            }

            result
        }

        async fn find_child_processes(&self, parent_pid: ProcessId) -> Result<Vec<ProcessId>> {
            let mut system = self
                .system
                .lock()
                .map_err(|_| anyhow!("process table lock poisoned"))?;
            system.refresh_processes_specifics(
                sysinfo::ProcessesToUpdate::All,
                true,
                sysinfo::ProcessRefreshKind::nothing(),
            );

            let mut children = Vec::new();
            Self::find_children_recursive(&system, parent_pid.0, &mut children);

            Ok(children.into_iter().map(ProcessId::from).collect())
        }
    }

    impl WindowsProcessManager {
        /// Recursively find all child processes, deepest first
        fn find_children_recursive(system: &System, parent_pid: u32, result: &mut Vec<u32>) {
            for (pid, process) in system.processes() {
                if process.parent().is_some_and(|ppid| ppid.as_u32() == parent_pid) {
                    let child_pid = pid.as_u32();
                    Self::find_children_recursive(system, child_pid, result);
                    result.push(child_pid);
                }
            }
        }
    }

    impl ProcessManager for WindowsProcessManager {
        fn new() -> Self {
            debug!("Initializing Windows process manager");
            Self {
                system: std::sync::Mutex::new(System::new()),
            }
        }
    }

    /// Deliver Ctrl-Break to the process group led by `pid`. Children are spawned
    /// with `CREATE_NEW_PROCESS_GROUP`, so the group id is the child's pid.
    fn send_ctrl_break(pid: ProcessId) -> windows::core::Result<()> {
        // SAFETY: no pointers are passed; an unknown group id is reported as an error.
        unsafe { GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid.0) }
    }

    /// Run `taskkill /T` against `pid`, adding `/F` when `force` is set
    async fn taskkill(pid: ProcessId, force: bool) -> Result<bool> {
        let pid = pid.to_string();
        let mut args = vec!["/T", "/PID", pid.as_str()];
        if force {
            args.push("/F");
        }

        let output = Command::new("taskkill").args(&args).output().await?;

        Ok(output.status.success())
    }

}

#[cfg(windows)]
pub use windows_impl::{WindowsProcessHandle, WindowsProcessManager};
