//! Flash WAV Player - Desktop Entry Point
//!
//! Mounts a host directory (`MUSIC_PATH`, default `./music`) as the flash
//! volume and plays every WAV file in it through the real-time paced
//! [`SimulatedI2s`] channel. Log filtering follows `RUST_LOG` (default `info`).

use std::process::ExitCode;

use firmware::config::music_path_from_env;
use firmware::{AppConfig, Application, SimulatedI2s};
use platform::config::{APP_NAME, APP_TYPE, APP_VERSION};
use platform::storage_local::LocalFileStorage;
use platform::NoopWatchdog;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("{APP_NAME} v{APP_VERSION} ({APP_TYPE})");

    let app = match AppConfig::from_env().and_then(Application::new) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let music = music_path_from_env();
    tracing::info!("Initializing storage from {}", music.display());
    let mut storage = match LocalFileStorage::mount(&music, app.config().mount) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!("Failed to initialize file manager: {e}");
            return ExitCode::FAILURE;
        }
    };

    match app
        .run(&mut storage, SimulatedI2s::new(), &mut NoopWatchdog)
        .await
    {
        Ok(_) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
