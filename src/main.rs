//! prometheus alertmanager receiver that forwards alerts to dingtalk robots
//!
//! Features:
//! - forwards different webhook url paths (profiles) to different robot webhooks
//! - configurable tera templates for title and markdown body
//! - mentions configured phone numbers in every message
use anyhow::{Context, Result};
use prometheus::Registry;
use settings::Settings;

use crate::{
    delivery::DeliveryClient, profiles::ProfileMap, template::AlertRenderer,
    webhook_receiver::State,
};

mod alert;
mod delivery;
mod error;
mod log;
mod metrics;
mod notification;
mod profiles;
mod settings;
mod telemetry_endpoint;
mod template;
mod webhook_receiver;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
    setup_panic_handler();

    let settings = Settings::load().context("failed to load config and command line arguments")?;

    log::setup_logging(&settings.log).context("could not setup logging")?;

    let profiles = ProfileMap::new(&settings.profiles).context("failed to load profiles")?;
    tracing::info!("loaded {} profiles", profiles.len());

    let renderer =
        AlertRenderer::new(&settings.templates).context("failed to construct alert renderer")?;
    let client = DeliveryClient::new(settings.request_timeout)?;

    let registry = Registry::new();
    let state = State::new(profiles, renderer, client, &registry)?;

    tokio::try_join!(
        webhook_receiver::run_webhook_receiver(settings.listen.clone(), state),
        telemetry_endpoint::run_telemetry_endpoint(settings.telemetry_endpoint.clone(), registry),
    )?;

    Ok(())
}
