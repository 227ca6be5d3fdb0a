//! A finger daemon that serves each user's published plan.
//!
//! Usage: thingerd [settings.json]
//!
//! Without an argument the daemon section of the thimbl profile settings is
//! used. Binding the standard port 79 usually needs elevated privileges.

use std::env;
use std::path::PathBuf;
#[cfg(unix)]
use thimbl_lib::AccountHomes;
use thimbl_lib::{Error, FingerDaemon, HomeDirs, HomeResolver, Profile, Settings};
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
        .with_env_filter(env_filter)
        .init();

    let settings = match env::args().nth(1) {
        Some(path) => Settings::load_from(&PathBuf::from(path))?,
        None => Settings::load(&Profile::new()?)?,
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(serve(settings))
}

async fn serve(settings: Settings) -> Result<(), Error> {
    match settings.daemon.homes_root.clone() {
        Some(root) => {
            tracing::info!("Looking for homes under {}", root.display());
            serve_with(&settings, HomeDirs::new(root)).await
        }
        #[cfg(unix)]
        None => serve_with(&settings, AccountHomes::new()).await,
        #[cfg(not(unix))]
        None => Err("Set daemon.homes_root; there is no user database here".into()),
    }
}

async fn serve_with<R: HomeResolver>(settings: &Settings, homes: R) -> Result<(), Error> {
    let daemon = FingerDaemon::bind(&settings.daemon, homes).await?;
    tracing::info!(
        "Serving {} files on {}",
        settings.daemon.plan_filename,
        daemon.local_addr()?
    );

    tokio::select! {
        r = daemon.run() => r,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}
