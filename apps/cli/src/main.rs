mod commands;
mod config;
mod main_lib;
mod session_store;

use clap::Parser;
use commands::Commands;
use config::Config;
use main_lib::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "cloudtrial")]
#[command(about = "Acquire a free cloud phone trial with a saved web session", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing();
    commands::dispatch(cli.cmd, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "cloudtrial",
            "run",
            "--max-passes",
            "3",
            "--pacing-ms",
            "500",
        ])
        .unwrap();
        assert_eq!(
            cli.cmd,
            Commands::Run {
                max_passes: Some(3),
                pacing_ms: Some(500)
            }
        );
    }

    #[test]
    fn parses_session_commands() {
        let cli = Cli::try_parse_from(["cloudtrial", "login", "-"]).unwrap();
        assert_eq!(
            cli.cmd,
            Commands::Login {
                source: "-".to_string()
            }
        );
        assert_eq!(
            Cli::try_parse_from(["cloudtrial", "check-host", "ugphone.com"])
                .unwrap()
                .cmd,
            Commands::CheckHost {
                host: "ugphone.com".to_string()
            }
        );
        assert!(Cli::try_parse_from(["cloudtrial"]).is_err());
    }
}
