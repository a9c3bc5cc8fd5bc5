//! perftest - HTTP(S) latency probe

use clap::{CommandFactory, Parser};
use http_perftest::{
    app::App,
    cli::Cli,
    config::{load_config, EnvManager},
    error::AppError,
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();
    let use_color = !cli.no_color;

    if cli.env_help {
        print!("{}", EnvManager::display_env_help());
        return;
    }

    let loaded = match load_config(cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", e.format_for_console(use_color));
            eprintln!();
            eprintln!("{}", Cli::command().render_usage());
            print_error_suggestions(&e);
            process::exit(e.exit_code());
        }
    };

    let use_color = loaded.config.enable_color;
    if let Err(e) = App::new(loaded.config, loaded.warnings).run().await {
        eprintln!("{}", e.format_for_console(use_color));
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Pass at least one target URL or set PERFTEST_URL");
            eprintln!("  - Target URLs must start with http:// or https://");
            eprintln!("  - Run with --env-help to list the environment variables");
        }
        AppError::Network(_) => {
            eprintln!();
            eprintln!("Network help:");
            eprintln!("  - Check that the listen port (-p) is not already in use");
        }
        _ => {}
    }
}
