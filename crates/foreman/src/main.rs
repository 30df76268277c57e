//! Foreman CLI
//!
//! Binary name: `foreman`

use std::process;

use foreman::cli::{
    error::{error_output, format_error, get_exit_code},
    handlers::run_cli,
    setup::init_tracing,
};

#[tokio::main]
async fn main() {
    if let Err(e) = init_tracing() {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Warning: {e}");
        }
    }

    if let Err(err) = run_cli().await {
        #[allow(clippy::print_stderr)]
        {
            eprintln!("Error: {}", format_error(&err));
        }
        if let Ok(body) = serde_json::to_string_pretty(&error_output(&err)) {
            println!("{body}");
        }

        #[allow(clippy::exit)]
        process::exit(get_exit_code(&err));
    }
}
