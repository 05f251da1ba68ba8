use std::process::ExitCode;

use dotenv::dotenv;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{App, Command, USAGE};
use shared_config::AppConfig;
use shared_models::AppError;

#[tokio::main]
async fn main() -> ExitCode {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return ExitCode::from(2);
        }
    };

    let config = AppConfig::from_env();
    if !config.is_configured() {
        eprintln!("Set COLOCATION_API_URL and COLOCATION_USER_ID (see .env)");
        return ExitCode::from(2);
    }
    info!("Using backend {} as {:?}", config.api_base_url, config.user_role);

    match run(config, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {:#}", e);
            match e.downcast_ref::<AppError>() {
                Some(app_error) => eprintln!("{}", app_error.user_message()),
                None => eprintln!("{:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig, command: Command) -> anyhow::Result<()> {
    let app = App::new(config)?;
    app.run(command).await
}
