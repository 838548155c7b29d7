use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::{ExitCode, Termination};

use clap::Parser;

mod local;

#[allow(clippy::large_enum_variant)]
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    Api(walletmetrics_api::Run),
    Track(local::Track),
    /// Read or change the metrics consent
    #[command(subcommand)]
    Consent(local::Consent),
    Replay(local::Replay),
    Deferred(local::Deferred),
}

#[derive(clap::Parser, Debug)]
#[command(
    author,
    version = env!("CARGO_PKG_VERSION"),
    about = "Consent gated analytics for the wallet",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub(crate) command: Command,
}

impl Cli {
    async fn run(self) -> ExitCode {
        match self.run_command().await {
            Ok(code) => code,
            Err(err) => {
                eprintln!("Error: {err}");
                for (n, err) in err.chain().skip(1).enumerate() {
                    if n == 0 {
                        eprintln!("Caused by:");
                    }
                    eprintln!("\t{err}");
                }

                ExitCode::FAILURE
            }
        }
    }

    async fn run_command(self) -> anyhow::Result<ExitCode> {
        match self.command {
            Command::Api(run) => run.run().await,
            Command::Track(run) => run.run().await,
            Command::Consent(run) => run.run().await,
            Command::Replay(run) => run.run().await,
            Command::Deferred(run) => run.run().await,
        }
    }
}

#[tokio::main]
async fn main() -> impl Termination {
    load_xdg_config();
    Cli::parse().run().await
}

/// Every file in the configuration directory sets the environment variable of the same name.
fn load_xdg_config() {
    let config_dir = if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        Some(Path::new(&xdg_config_home).join("walletmetrics"))
    } else if let Ok(home) = std::env::var("HOME") {
        Some(Path::new(&home).join(".config").join("walletmetrics"))
    } else {
        None
    };

    let Some(config_dir) = config_dir.filter(|dir| dir.is_dir()) else {
        return;
    };

    let Ok(dir) = config_dir.read_dir() else {
        eprintln!("Warning: unable to read configuration directory: {:?}", config_dir);
        return;
    };

    for entry in dir.flatten() {
        let Some(var_name) = entry.file_name().to_str().map(ToString::to_string) else {
            continue;
        };
        if let Ok(mut file) = File::open(entry.path()) {
            let mut var_value = String::new();
            if file.read_to_string(&mut var_value).is_ok() {
                std::env::set_var(var_name, var_value.trim());
            }
        }
    }
}
