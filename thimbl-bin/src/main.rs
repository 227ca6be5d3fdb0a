#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]

mod commands;
mod setup;

use std::env;
use thimbl_lib::Error;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

fn main() -> Result<(), Error> {
    // Setup logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    let env_filter = EnvFilter::from_default_env();
    let max_level = match env_filter.max_level_hint() {
        Some(l) => l,
        None => LevelFilter::ERROR,
    };
    let show_debug = max_level >= LevelFilter::DEBUG;
    tracing_subscriber::fmt::fmt()
        .with_target(false)
        .with_file(show_debug)
        .with_line_number(show_debug)
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter)
        .init();

    // Setup async. Commands block on it from the main thread.
    let rt = tokio::runtime::Runtime::new()?;

    let mut args = env::args();
    let _ = args.next(); // program name
    if args.len() == 0 {
        println!("No command specified. Try help");
        return Ok(());
    }

    if let Err(e) = commands::handle_command(args, &rt) {
        println!("{}", e);
    }

    Ok(())
}
