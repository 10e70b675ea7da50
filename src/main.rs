use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wallbox_remote::action::{Action, ChargeMode, Switch};
use wallbox_remote::browser::Firefox;
use wallbox_remote::config::{ServerConfig, WallboxConfig};
use wallbox_remote::mqtt;
use wallbox_remote::server::{self, AppState};
use wallbox_remote::wallbox::{Outcome, Wallbox};

/// Control wallbox charging through the wallbox's own web page.
#[derive(clap::Parser, Debug)]
#[command(version, about, long_about=None)]
#[command(group(
    clap::ArgGroup::new("command")
        .required(true)
        .args(["action", "get_status", "get_mode", "set_mode", "serve"])
))]
struct Args {
    /// Action to perform: start/stop charging.
    #[arg(value_enum)]
    action: Option<Switch>,

    /// Get current wallbox status.
    #[arg(long)]
    get_status: bool,

    /// Get current charging mode.
    #[arg(long)]
    get_mode: bool,

    /// Set charging mode.
    #[arg(long, value_enum)]
    set_mode: Option<ChargeMode>,

    /// Run the webhook server for remote control.
    #[arg(long)]
    serve: bool,

    /// Run browser with GUI (headless is default).
    #[arg(long)]
    no_headless: bool,

    /// Enable verbose output for debugging.
    #[arg(short, long)]
    verbose: bool,

    /// Wallbox configuration file, created with defaults if missing.
    /// Defaults to wallbox.toml, or the server config's `wallbox_config`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Webhook server configuration file.
    #[arg(long, default_value = "webhook.toml")]
    server_config: PathBuf,

    /// Host to bind to (overrides the server config).
    #[arg(long)]
    host: Option<String>,

    /// Port to run the server on (overrides the server config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Debug logging for the server.
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn action(&self) -> Option<Action> {
        if self.get_status {
            Some(Action::GetStatus)
        } else if self.get_mode {
            Some(Action::GetMode)
        } else if let Some(mode) = self.set_mode {
            Some(Action::SetMode(mode))
        } else {
            self.action.map(Action::from)
        }
    }

    fn load_wallbox_config(&self, fallback: &str) -> Result<WallboxConfig, eyre::Report> {
        let path = self.config.clone().unwrap_or_else(|| PathBuf::from(fallback));
        let mut config = WallboxConfig::load_or_create(&path)?;
        if self.no_headless {
            config.webdriver.headless = false;
        }
        Ok(config)
    }
}

fn init_logging(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_wallbox(config: WallboxConfig) -> Wallbox {
    let firefox = Firefox::new(config.webdriver.clone());
    Wallbox::new(config, Arc::new(firefox))
}

async fn serve(args: &Args) -> Result<(), eyre::Report> {
    let mut server_config = ServerConfig::load(&args.server_config)?;
    if let Some(host) = &args.host {
        server_config.host = host.clone();
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if args.debug || args.verbose {
        server_config.log_level = String::from("debug");
    }

    let level = &server_config.log_level;
    init_logging(&format!(
        "warn,wallbox_remote={level},tower_http={level}"
    ));

    let wallbox = build_wallbox(args.load_wallbox_config(&server_config.wallbox_config)?);
    let mut state = AppState::new(Arc::new(wallbox), &server_config);

    if let Some(mqtt_config) = &server_config.mqtt {
        let (publisher, bridge) = mqtt::connect(mqtt_config);
        state = state.with_status_publisher(publisher);
        tokio::spawn(bridge.run(state.clone()));
        tracing::info!(
            "MQTT bridge: {}:{}",
            mqtt_config.broker,
            mqtt_config.port
        );
    }

    // Handle Ctrl-C.
    let (ctrl_c_tx, mut ctrl_c_rx) = tokio::sync::mpsc::channel::<()>(10);
    ctrlc::set_handler(move || {
        let _ = ctrl_c_tx.try_send(());
    })?;
    let shutdown = async move {
        ctrl_c_rx.recv().await;
        tracing::info!("Shutting down webhook server...");
    };

    server::serve(&server_config, state, shutdown).await
}

fn report(out: &mut impl Write, action: Action, outcome: &Outcome) -> io::Result<()> {
    match (action, outcome) {
        (Action::GetStatus, outcome) => writeln!(out, "{}", outcome.reading().status_or_unknown()),
        (Action::GetMode, outcome) => writeln!(out, "{}", outcome.reading().mode_or_unknown()),

        (Action::SetMode(_), Outcome::Skipped { reading, .. }) => {
            writeln!(out, "Mode: {} (no change needed)", reading.mode_or_unknown())
        }
        (Action::SetMode(_), Outcome::Applied { before, after }) => writeln!(
            out,
            "Mode updated: {} -> {}",
            before.mode_or_unknown(),
            after.mode_or_unknown()
        ),
        (Action::SetMode(mode), _) => writeln!(out, "Failed to set mode to {mode}"),

        (_, Outcome::Skipped { refusal, .. }) => {
            writeln!(out, "{refusal}")?;
            writeln!(out, "Action cancelled based on current status/mode")
        }
        (_, Outcome::Applied { before, after }) if before != after => {
            writeln!(
                out,
                "Status: {} -> {}",
                before.status_or_unknown(),
                after.status_or_unknown()
            )?;
            if before.mode != after.mode {
                writeln!(
                    out,
                    "Mode: {} -> {}",
                    before.mode_or_unknown(),
                    after.mode_or_unknown()
                )?;
            }
            Ok(())
        }
        (_, Outcome::Applied { .. }) => {
            tracing::debug!("No changes detected in status/mode");
            writeln!(out, "Action '{action}' completed")
        }
        (_, _) => writeln!(out, "Failed to execute action: {action}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), eyre::Report> {
    let args = Args::parse();

    if args.serve {
        return serve(&args).await;
    }

    init_logging(if args.verbose {
        "warn,wallbox_remote=debug"
    } else {
        "warn"
    });

    let Some(action) = args.action() else {
        return Err(eyre::eyre!("no action requested"));
    };

    let wallbox = build_wallbox(args.load_wallbox_config("wallbox.toml")?);
    let outcome = wallbox.run(action).await?;
    report(&mut io::stdout().lock(), action, &outcome)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallbox_remote::guard::Refusal;
    use wallbox_remote::scraper::Reading;

    fn reading(status: &str, mode: &str) -> Reading {
        Reading {
            status: Some(status.to_string()),
            mode: Some(mode.to_string()),
        }
    }

    fn printed(action: Action, outcome: &Outcome) -> String {
        let mut out = Vec::new();
        report(&mut out, action, outcome).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn reads_print_the_value_or_unknown() {
        let outcome = Outcome::Read(reading("Charging", "Eco"));
        assert_eq!(printed(Action::GetStatus, &outcome), "Charging\n");
        assert_eq!(printed(Action::GetMode, &outcome), "Eco\n");

        let outcome = Outcome::Read(Reading::default());
        assert_eq!(printed(Action::GetStatus, &outcome), "Unknown\n");
        assert_eq!(printed(Action::GetMode, &outcome), "Unknown\n");
    }

    #[test]
    fn set_mode_lines() {
        let solar = Action::SetMode(ChargeMode::Solar);

        let skipped = Outcome::Skipped {
            reading: reading("Charging", "Solar"),
            refusal: Refusal::ModeAlreadySet {
                mode: String::from("Solar"),
            },
        };
        assert_eq!(printed(solar, &skipped), "Mode: Solar (no change needed)\n");

        let applied = Outcome::Applied {
            before: reading("Charging", "Eco"),
            after: reading("Charging", "Solar"),
        };
        assert_eq!(printed(solar, &applied), "Mode updated: Eco -> Solar\n");

        let missing = Outcome::ButtonMissing {
            reading: reading("Charging", "Eco"),
            label: "SET SOLAR",
        };
        assert_eq!(printed(solar, &missing), "Failed to set mode to solar\n");
    }

    #[test]
    fn refused_action_explains_and_cancels() {
        let outcome = Outcome::Skipped {
            reading: reading("Finishing", "Eco"),
            refusal: Refusal::StillFinishing {
                status: String::from("Finishing"),
            },
        };
        let text = printed(Action::Stop, &outcome);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Finishing"));
        assert_eq!(lines[1], "Action cancelled based on current status/mode");
    }

    #[test]
    fn applied_action_prints_the_changes() {
        let outcome = Outcome::Applied {
            before: reading("Standby", "Eco"),
            after: reading("Charging", "Eco"),
        };
        assert_eq!(printed(Action::Start, &outcome), "Status: Standby -> Charging\n");

        let outcome = Outcome::Applied {
            before: reading("Charging", "Eco"),
            after: reading("Standby", "Full"),
        };
        assert_eq!(
            printed(Action::Stop, &outcome),
            "Status: Charging -> Standby\nMode: Eco -> Full\n"
        );
    }

    #[test]
    fn unchanged_page_reports_completion() {
        let outcome = Outcome::Applied {
            before: reading("Charging", "Eco"),
            after: reading("Charging", "Eco"),
        };
        assert_eq!(printed(Action::Start, &outcome), "Action 'start' completed\n");
    }

    #[test]
    fn missing_button_is_a_failure() {
        let outcome = Outcome::ButtonMissing {
            reading: reading("Standby", "Eco"),
            label: "STOP CHARGING",
        };
        assert_eq!(printed(Action::Stop, &outcome), "Failed to execute action: stop\n");
    }
}
