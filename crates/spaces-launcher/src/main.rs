use clap::Parser;
use spaces_launcher::{
    Cli, SpacesLauncher, init_tracing, resolve_port, shutdown_on_signal,
};
use std::ffi::OsString;
use std::time::Duration;

/// How long blocked output readers may hold up process exit
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(250);

fn main() {
    init_tracing();
    let cli = Cli::parse();

    // SAFETY: no runtime or other thread exists yet, so nothing else can be
    // touching the environment.
    let port = unsafe { resolve_port() };

    std::process::exit(launch(cli, port));
}

fn launch(cli: Cli, port: OsString) -> i32 {
    let config = match cli.into_config(port) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("spaces-launcher: {e}");
            return e.exit_code();
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("spaces-launcher: failed to start async runtime: {e}");
            return 1;
        }
    };

    let code = runtime.block_on(async move {
        let shutdown = shutdown_on_signal();
        match SpacesLauncher::new(config).run(shutdown).await {
            Ok(outcome) => {
                tracing::debug!(%outcome, "launcher finished");
                outcome.exit_code()
            }
            Err(e) => e.exit_code(),
        }
    });

    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    code
}
