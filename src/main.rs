use std::env;
use std::process::ExitCode;

use g1_teleprompter_bridge_lib::commands::{self, Command};
use g1_teleprompter_bridge_lib::config::AppConfig;
use g1_teleprompter_bridge_lib::logging;
use g1_teleprompter_bridge_lib::state::AppState;
use log::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        }
    };

    let config = match AppConfig::load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init_logging(config.logging.level_filter());

    if let Command::Render { text, output } = &command {
        return finish(commands::render_to_file(text, output).await);
    }

    info!("Starting AppState initialization.");
    let app_state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize AppState: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let failures = app_state.connect_configured().await;
    if command.needs_connection() && !app_state.glasses.is_connected() {
        if failures.is_empty() {
            warn!("No glasses address configured; set glasses.left_address / right_address");
        }
        app_state.shutdown().await;
        return finish(Err("No glasses connected".to_string()));
    }

    let result = commands::run(&command, &app_state).await;
    app_state.shutdown().await;
    finish(result)
}

fn finish(result: Result<String, String>) -> ExitCode {
    match result {
        Ok(message) => {
            println!("{}", message);
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
