// Actix server entry point

use log::info;
use ves_rates::config::SETTINGS;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = SETTINGS
        .read()
        .map_err(|_| anyhow::anyhow!("settings lock poisoned"))?
        .clone();

    info!("Starting VES exchange rates API ...");
    ves_rates::start_server(settings).await
}
