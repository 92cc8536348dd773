#[cfg(unix)]
mod unix_impl {
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid as NixPid;
    use spaces_launcher_core::{
        MergedOutput, ProcessHandle, ProcessId, ProcessLifecycle, ProcessManager,
        ProcessTermination, SpawnSpec, TerminationResult,
    };
    use std::os::fd::OwnedFd;
    use std::process::{ExitStatus, Stdio};
    use sysinfo::System;
    use tokio::net::unix::pipe;
    use tokio::process::{Child, Command};
    use tracing::{debug, info, warn};

    /// Unix-specific process handle implementation
    pub struct UnixProcessHandle {
        child: Child,
        command: String,
        args: Vec<String>,
        output: Option<MergedOutput>,
    }

    impl UnixProcessHandle {
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
    impl ProcessHandle for UnixProcessHandle {
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

    /// Unix-specific process manager.
    ///
    /// Every child gets its own process group so termination requests reach the
    /// whole tree it starts (`npm` runs the actual server as a grandchild).
    pub struct UnixProcessManager {
        system: std::sync::Mutex<System>,
    }

    impl Default for UnixProcessManager {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessLifecycle for UnixProcessManager {
        type Handle = UnixProcessHandle;

        async fn spawn_process(&self, spec: &SpawnSpec) -> std::io::Result<UnixProcessHandle> {
            // One pipe for both stdout and stderr keeps their relative order intact
            let (reader, writer) = std::io::pipe()?;
            let stderr_writer = writer.try_clone()?;

            let mut cmd = Command::new(&spec.command);
            cmd.args(&spec.args)
                .envs(&spec.env)
                .stdin(Stdio::null())
                .stdout(writer)
                .stderr(stderr_writer)
                .process_group(0)
                .kill_on_drop(true);

            if let Some(dir) = &spec.working_dir {
                cmd.current_dir(dir);
            }

            let spawned = cmd.spawn();
            // The parent's write ends must be closed or the reader never sees EOF
            drop(cmd);
            let mut child = spawned?;

            let output = match pipe::Receiver::from_owned_fd(OwnedFd::from(reader)) {
                Ok(output) => output,
                Err(e) => {
                    if let Err(kill_err) = child.start_kill() {
                        warn!(error = %kill_err, "failed to kill child after pipe setup error");
                    }
                    return Err(e);
                }
            };

            if let Some(pid) = child.id() {
                info!(
                    pid,
                    command = %spec.command,
                    args = ?spec.args,
                    "Spawned Unix process"
                );
            }

            Ok(UnixProcessHandle::new(
                child,
                spec.command.clone(),
                spec.args.clone(),
                Box::pin(output),
            ))
        }
    }

    #[async_trait]
    impl ProcessTermination for UnixProcessManager {
        async fn terminate_gracefully(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
            match handle.get_pid() {
                Some(pid) => signal_group(pid, Signal::SIGTERM),
                None => TerminationResult::ProcessNotFound,
            }
        }

        async fn force_kill(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
            let Some(pid) = handle.get_pid() else {
                return TerminationResult::ProcessNotFound;
            };

            // Collected first: once the group is gone orphans get reparented and
            // can no longer be found through their parent
            let descendants = match self.find_child_processes(pid).await {
                Ok(descendants) => descendants,
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Failed to enumerate child processes");
                    Vec::new()
                }
            };

            let result = signal_group(pid, Signal::SIGKILL);

            for child_pid in descendants {
                match signal_process(child_pid, Signal::SIGKILL) {
                    TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                    other => {
                        warn!(pid = %child_pid, result = ?other, "Failed to kill child process");
                    }
                }
            }

            // Reap the child so it does not linger as a zombie
            if let Err(e) = handle.kill().await {
                debug!(pid = %pid, error = %e, "Handle kill cleanup failed");
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

    impl UnixProcessManager {
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

    impl ProcessManager for UnixProcessManager {
        fn new() -> Self {
            debug!("Initializing Unix process manager");
            Self {
                system: std::sync::Mutex::new(System::new()),
            }
        }
    }

    /// Signal the process group led by `pid`, falling back to the process itself
    /// when the group no longer exists.
    fn signal_group(pid: ProcessId, sig: Signal) -> TerminationResult {
        let pgid = NixPid::from_raw(pid.0 as i32);

        match signal::killpg(pgid, sig) {
            Ok(()) => {
                info!(pid = %pid, signal = ?sig, "Signalled process group");
                TerminationResult::Success
            }
            Err(Errno::ESRCH) => signal_process(pid, sig),
            Err(Errno::EPERM) => {
                warn!(pid = %pid, signal = ?sig, "Permission denied to signal process group");
                TerminationResult::AccessDenied
            }
            Err(e) => {
                warn!(pid = %pid, signal = ?sig, error = %e, "Failed to signal process group");
                TerminationResult::Failed(format!("{sig:?} to process group failed: {e}"))
            }
        }
    }

    fn signal_process(pid: ProcessId, sig: Signal) -> TerminationResult {
        match signal::kill(NixPid::from_raw(pid.0 as i32), sig) {
            Ok(()) => {
                info!(pid = %pid, signal = ?sig, "Signalled process");
                TerminationResult::Success
            }
            Err(Errno::ESRCH) => {
                debug!(pid = %pid, "Process not found (already terminated)");
                TerminationResult::ProcessNotFound
            }
            Err(Errno::EPERM) => {
                warn!(pid = %pid, signal = ?sig, "Permission denied to signal process");
                TerminationResult::AccessDenied
            }
            Err(e) => {
                warn!(pid = %pid, signal = ?sig, error = %e, "Failed to signal process");
                TerminationResult::Failed(format!("{sig:?} failed: {e}"))
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use spaces_launcher_core::lines;
        use std::os::unix::process::ExitStatusExt;
        use std::time::Duration;
        use tokio_stream::StreamExt;

        async fn read_lines(handle: &mut UnixProcessHandle) -> Vec<String> {
            let mut frames = lines(handle.take_output().unwrap());
            let mut out = Vec::new();
            while let Some(line) = frames.next().await {
                out.push(line.unwrap());
            }
            out
        }

        fn sh(script: &str) -> SpawnSpec {
            SpawnSpec::new("sh").args(["-c", script])
        }

        fn assert_process_handle<H: ProcessHandle + 'static>() {}

        #[test]
        fn test_handle_is_a_process_handle() {
            assert_process_handle::<UnixProcessHandle>();
        }

        #[tokio::test]
        async fn test_stdout_and_stderr_are_merged_in_order() {
            let manager = UnixProcessManager::new();
            let mut handle = manager
                .spawn_process(&sh("echo out; echo err >&2; echo done"))
                .await
                .unwrap();

            assert!(handle.get_pid().is_some());
            assert_eq!(read_lines(&mut handle).await, vec!["out", "err", "done"]);
            assert!(handle.wait().await.unwrap().success());
            assert!(handle.take_output().is_none());
        }

        #[tokio::test]
        async fn test_env_and_working_directory() {
            let manager = UnixProcessManager::new();
            let spec = sh("echo \"$PORT:$(pwd)\"").env("PORT", "1234").working_dir("/");
            let mut handle = manager.spawn_process(&spec).await.unwrap();

            assert_eq!(read_lines(&mut handle).await, vec!["1234:/"]);
        }

        #[tokio::test]
        async fn test_exit_code_is_reported() {
            let manager = UnixProcessManager::new();
            let mut handle = manager.spawn_process(&sh("exit 7")).await.unwrap();

            assert!(read_lines(&mut handle).await.is_empty());
            assert_eq!(handle.wait().await.unwrap().code(), Some(7));
        }

        #[tokio::test]
        async fn test_missing_binary_fails_to_spawn() {
            let manager = UnixProcessManager::new();
            let err = manager
                .spawn_process(&SpawnSpec::new("definitely-not-a-real-binary-xyz"))
                .await
                .err()
                .unwrap();

            assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
        }

        #[tokio::test]
        async fn test_missing_working_directory_fails_to_spawn() {
            let manager = UnixProcessManager::new();
            let spec = sh("true").working_dir("/definitely/not/a/dir");

            assert!(manager.spawn_process(&spec).await.is_err());
        }

        #[tokio::test]
        async fn test_terminate_gracefully_sends_sigterm() {
            let manager = UnixProcessManager::new();
            let mut handle = manager
                .spawn_process(&SpawnSpec::new("sleep").args(["30"]))
                .await
                .unwrap();

            let result = manager.terminate_gracefully(&mut handle).await;
            assert_eq!(result, TerminationResult::Success);

            let status = tokio::time::timeout(Duration::from_secs(5), handle.wait())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(status.signal(), Some(Signal::SIGTERM as i32));
        }

        #[tokio::test]
        async fn test_force_kill_stops_child_ignoring_sigterm() {
            let manager = UnixProcessManager::new();
            let mut handle = manager
                .spawn_process(&sh(
                    "trap '' TERM; echo ready; while true; do sleep 1; done",
                ))
                .await
                .unwrap();

            let mut frames = lines(handle.take_output().unwrap());
            assert_eq!(frames.next().await.unwrap().unwrap(), "ready");

            manager.terminate_gracefully(&mut handle).await;
            tokio::time::sleep(Duration::from_millis(200)).await;
            assert!(handle.try_wait().await.unwrap().is_none());

            assert_eq!(
                manager.force_kill(&mut handle).await,
                TerminationResult::Success
            );
            let status = handle.wait().await.unwrap();
            assert_eq!(status.signal(), Some(Signal::SIGKILL as i32));
        }

        #[tokio::test]
        async fn test_find_child_processes() {
            let manager = UnixProcessManager::new();
            let mut handle = manager
                .spawn_process(&sh("sleep 30 & echo started; wait"))
                .await
                .unwrap();

            let mut frames = lines(handle.take_output().unwrap());
            assert_eq!(frames.next().await.unwrap().unwrap(), "started");

            let pid = handle.get_pid().unwrap();
            let children = manager.find_child_processes(pid).await.unwrap();
            assert!(!children.is_empty());

            assert_eq!(
                manager.force_kill(&mut handle).await,
                TerminationResult::Success
            );
            assert!(handle.wait().await.unwrap().signal().is_some());
        }

        #[tokio::test]
        async fn test_terminate_after_exit_is_not_found() {
            let manager = UnixProcessManager::new();
            let mut handle = manager.spawn_process(&sh("true")).await.unwrap();
            handle.wait().await.unwrap();

            assert_eq!(
                manager.terminate_gracefully(&mut handle).await,
                TerminationResult::ProcessNotFound
            );
        }
    }
}

// Re-export the Unix implementation when on Unix systems
#[cfg(unix)]
pub use unix_impl::{UnixProcessHandle, UnixProcessManager};
