use clap::{Parser, Subcommand};
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};

use flight_delay_predictor::{config::ArtifactArgs, run_once, server, Config, Response};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flight_delay_predictor", version, about = "Flight delay probability from a pretrained classifier")]
struct Cli {
    #[command(flatten)]
    artifacts: ArtifactArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read one flight as JSON on stdin, write one JSON object to stdout (default)
    Predict,
    /// Serve predictions over HTTP with artifacts kept in memory
    Serve {
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
}

fn main() -> anyhow::Result<()> {
    // Diagnostics go to stderr; stdout carries only the result object.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from(cli.artifacts);

    match cli.command.unwrap_or(Command::Predict) {
        Command::Predict => {
            let now = chrono::Local::now().naive_local();
            let response = panic::catch_unwind(AssertUnwindSafe(|| {
                run_once(&config, read_stdin, now)
            }))
            .unwrap_or_else(|payload| {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Response::Error {
                    error: format!("General error: {}", msg),
                }
            });
            println!("{}", response.to_json());
            Ok(())
        }
        Command::Serve { port } => {
            let state = server::AppState::load(config)?;
            tracing::info!("artifacts loaded; starting server");
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(server::serve(state, port))
        }
    }
}

fn read_stdin() -> std::io::Result<String> {
    let mut raw = String::new();
    std::io::stdin().read_to_string(&mut raw)?;
    Ok(raw)
}
