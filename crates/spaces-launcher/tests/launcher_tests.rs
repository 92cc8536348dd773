#![cfg(unix)]

use spaces_launcher::{
    CancellationToken, CapturedOutput, LauncherConfig, LauncherError, LauncherStdOut, Outcome,
    SpacesLauncher,
};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::AsyncWrite;

const BANNER_LINES: usize = 3;

fn sh_config(script: &str) -> LauncherConfig {
    LauncherConfig::builder()
        .command("sh")
        .args(["-c", script])
        .build()
        .unwrap()
}

fn relayed(captured: &CapturedOutput) -> Vec<String> {
    captured.lines().into_iter().skip(BANNER_LINES).collect()
}

fn cancel_after(delay: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        trigger.cancel();
    });
    token
}

#[tokio::test]
async fn test_relays_every_line_and_exits_zero() {
    let captured = CapturedOutput::new();
    let launcher = SpacesLauncher::new_with_output(
        sh_config("for i in 1 2 3 4 5; do echo line $i; done"),
        captured.sink(),
    );

    let outcome = launcher.run(CancellationToken::new()).await.unwrap();

    assert_eq!(outcome, Outcome::Exited(0));
    assert_eq!(
        relayed(&captured),
        vec!["line 1", "line 2", "line 3", "line 4", "line 5"]
    );
}

#[tokio::test]
async fn test_stderr_is_relayed_to_stdout() {
    let captured = CapturedOutput::new();
    let launcher = SpacesLauncher::new_with_output(
        sh_config("echo out; echo err >&2; echo again"),
        captured.sink(),
    );

    launcher.run(CancellationToken::new()).await.unwrap();

    assert_eq!(relayed(&captured), vec!["out", "err", "again"]);
}

#[tokio::test]
async fn test_nonzero_exit_is_propagated() {
    let captured = CapturedOutput::new();
    let launcher =
        SpacesLauncher::new_with_output(sh_config("echo before; exit 3"), captured.sink());

    let outcome = launcher.run(CancellationToken::new()).await.unwrap();

    assert_eq!(outcome, Outcome::Exited(3));
    assert_eq!(outcome.exit_code(), 3);
    assert_eq!(relayed(&captured), vec!["before"]);
}

#[tokio::test]
async fn test_signal_exit_maps_to_128_plus_signal() {
    let captured = CapturedOutput::new();
    let launcher =
        SpacesLauncher::new_with_output(sh_config("echo dying; kill -TERM $$"), captured.sink());

    let outcome = launcher.run(CancellationToken::new()).await.unwrap();

    assert_eq!(outcome, Outcome::Signaled(15));
    assert_eq!(outcome.exit_code(), 143);
    assert_eq!(relayed(&captured), vec!["dying"]);
}

#[tokio::test]
async fn test_port_reaches_the_child() {
    let config = LauncherConfig::builder()
        .command("sh")
        .args(["-c", "echo \"port=$PORT\""])
        .port("4321")
        .build()
        .unwrap();
    let captured = CapturedOutput::new();
    let launcher = SpacesLauncher::new_with_output(config, captured.sink());

    launcher.run(CancellationToken::new()).await.unwrap();

    let lines = captured.lines();
    assert_eq!(lines[1], "🌸 Listening on port 4321");
    assert_eq!(lines[BANNER_LINES..], ["port=4321"]);
}

#[tokio::test]
async fn test_missing_command_is_a_startup_failure() {
    let captured = CapturedOutput::new();
    let launcher = SpacesLauncher::for_command(
        "definitely-not-a-real-binary-xyz",
        Vec::<String>::new(),
        captured.sink(),
    )
    .unwrap();

    let err = launcher.run(CancellationToken::new()).await.unwrap_err();

    assert!(err.is_startup_failure());
    assert_eq!(err.exit_code(), 127);
    let lines = relayed(&captured);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("❌ Error starting Raadhya Tantra: "));
}

#[tokio::test]
async fn test_start_then_supervise() {
    let captured = CapturedOutput::new();
    let launcher = SpacesLauncher::new_with_output(sh_config("echo hi"), captured.sink());

    let running = launcher.start().await.unwrap();
    assert!(running.pid().is_some());

    let outcome = running.supervise(CancellationToken::new()).await.unwrap();
    assert_eq!(outcome, Outcome::Exited(0));
    // start() skips the banner
    assert_eq!(captured.lines(), vec!["hi"]);
}

#[tokio::test]
async fn test_interrupt_stops_child_gracefully() {
    let captured = CapturedOutput::new();
    let launcher =
        SpacesLauncher::new_with_output(sh_config("echo ready; sleep 30"), captured.sink());

    let started = Instant::now();
    let outcome = launcher
        .run(cancel_after(Duration::from_millis(300)))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Interrupted);
    assert_eq!(outcome.exit_code(), 0);
    // SIGTERM was honoured well before the default grace period ran out
    assert!(started.elapsed() < Duration::from_secs(4));

    let lines = captured.lines();
    assert!(lines.contains(&"ready".to_string()));
    let notices = lines
        .iter()
        .filter(|line| line.contains("Gracefully shutting down"))
        .count();
    assert_eq!(notices, 1);
}

#[tokio::test]
async fn test_interrupt_kills_child_that_ignores_sigterm() {
    let config = LauncherConfig::builder()
        .command("sh")
        .args(["-c", "trap '' TERM; echo ready; while true; do sleep 1; done"])
        .grace_period_ms(200u64)
        .build()
        .unwrap();
    let captured = CapturedOutput::new();
    let launcher = SpacesLauncher::new_with_output(config, captured.sink());

    let started = Instant::now();
    let outcome = launcher
        .run(cancel_after(Duration::from_millis(300)))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Interrupted);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(captured.contents().contains("Gracefully shutting down"));
}

/// Stdout that was closed by whoever reads it
struct ClosedStdout;

impl AsyncWrite for ClosedStdout {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn is_alive(pid: &str) -> bool {
    std::process::Command::new("kill")
        .args(["-0", pid])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn test_closed_stdout_does_not_orphan_the_child() {
    let dir = tempfile::tempdir().unwrap();
    let pidfile = dir.path().join("child.pid");
    let script = format!(
        "echo $$ > {}; echo hello; exec sleep 30",
        pidfile.display()
    );
    let launcher = SpacesLauncher::new_with_output(
        sh_config(&script),
        LauncherStdOut::new(Box::new(ClosedStdout)),
    );

    let running = launcher.start().await.unwrap();
    let err = running
        .supervise(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, LauncherError::Io(_)));
    let pid = std::fs::read_to_string(&pidfile).unwrap();
    assert!(!is_alive(pid.trim()));
}
