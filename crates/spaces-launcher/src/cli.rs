//! Command line of the `spaces-launcher` binary.
use clap::Parser;
use spaces_launcher_core::{LauncherConfig, LauncherError};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "spaces-launcher", version)]
#[command(about = "Start the web application on the port the hosting platform assigns")]
pub struct Cli {
    /// JSON file with launcher settings; flags given here take precedence
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Name shown in the banner and in shutdown and error notices
    #[arg(long)]
    pub app_name: Option<String>,

    #[arg(long)]
    pub tagline: Option<String>,

    /// Milliseconds to wait after asking the application to stop before killing it
    #[arg(long)]
    pub grace_period_ms: Option<u64>,

    /// Directory to start the application in
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Command to run instead of `npm start`, given after `--`
    #[arg(last = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Merge defaults, the config file and the flags, in that order. `port` is the
    /// value resolved from the environment and always wins.
    pub fn into_config(self, port: OsString) -> Result<LauncherConfig, LauncherError> {
        let mut config = match &self.config {
            Some(path) => LauncherConfig::from_json_file(path)?,
            None => LauncherConfig::default(),
        };

        config.port = port;
        if let Some(app_name) = self.app_name {
            config.app_name = app_name;
        }
        if let Some(tagline) = self.tagline {
            config.tagline = tagline;
        }
        if let Some(grace_period_ms) = self.grace_period_ms {
            config.grace_period_ms = grace_period_ms;
        }
        if let Some(cwd) = self.cwd {
            config.working_directory = Some(cwd);
        }
        if let Some((command, args)) = self.command.split_first() {
            config.command = command.clone();
            config.args = args.to_vec();
        }

        config.validate()?;
        Ok(config)
    }
}
