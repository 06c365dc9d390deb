pub mod file_lock;
pub mod render;
pub mod session;
pub mod terminal;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use log::info;
use netpanel::{BackendKind, Coordinator, Settings};

use crate::terminal::TerminalInput;

#[derive(Parser, Debug)]
#[command(name = "netpanelctl")]
#[command(version, about = "Browse and join Wi-Fi networks from the terminal")]
struct Args {
    /// Backend to use: auto, networkmanager, nmcli or mock
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Seconds between periodic refreshes
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Seconds to wait for a password answer
    #[arg(long = "prompt-timeout", global = true)]
    prompt_timeout: Option<u64>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List visible networks, active first
    List,
    /// Show details of a network, the active one by default
    Details { ssid: Option<String> },
    /// Show the stored password of the active network
    Password,
    /// Join a network, asking for a password if needed
    Connect {
        ssid: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Leave a network
    Disconnect { ssid: String },
    /// Interactive session (default)
    Watch,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn settings_from(args: &Args) -> Settings {
    let mut settings = Settings::load();
    if let Some(backend) = args.backend {
        settings.backend = backend;
    }
    if let Some(secs) = args.interval {
        settings.refresh_interval_secs = secs;
    }
    if let Some(secs) = args.prompt_timeout {
        settings.prompt_timeout_secs = secs;
    }
    settings
}

async fn run_command(command: Command, settings: Settings) -> anyhow::Result<()> {
    let backend = netpanel::backend::open(settings.backend)
        .await
        .context("Failed to open a network backend")?;
    info!("Using {} backend", backend.name());

    let mut panel = Coordinator::new(backend, &settings)?;

    let result = match command {
        Command::List => session::list(&mut panel).await,
        Command::Details { ssid } => session::details(&mut panel, ssid).await,
        Command::Password => session::password(&mut panel).await,
        Command::Connect { ssid, password } => {
            let mut input = TerminalInput::spawn();
            session::connect(&mut panel, &ssid, password.as_deref(), &mut input).await
        }
        Command::Disconnect { ssid } => session::disconnect(&mut panel, &ssid).await,
        Command::Watch => session::watch(&mut panel, &mut TerminalInput::spawn()).await,
    };

    panel.shutdown();
    result
}

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let settings = settings_from(&args);
    let command = args.command.unwrap_or(Command::Watch);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    runtime.block_on(run_command(command, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_override_file_settings() {
        let args = Args::parse_from([
            "netpanelctl",
            "--backend",
            "mock",
            "--interval",
            "10",
            "connect",
            "Cafe",
            "--prompt-timeout",
            "60",
        ]);
        let settings = settings_from(&args);
        assert_eq!(settings.backend, BackendKind::Mock);
        assert_eq!(settings.refresh_interval_secs, 10);
        assert_eq!(settings.prompt_timeout_secs, 60);
        assert!(matches!(
            args.command,
            Some(Command::Connect { ref ssid, password: None }) if ssid == "Cafe"
        ));
    }
}
