use std::sync::Arc;

use dotenv::dotenv;
use env_logger::Env;
use log::info;

use image_resolver::cache::Pairtree;
use image_resolver::config::{self, AppConfig};
use image_resolver::migrator::HttpMigrator;
use image_resolver::{api, AccessPolicy, IdentifierResolver};

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    // Load config
    let figment = config::figment();
    let config = AppConfig::from_figment(&figment)?;
    info!("Configuration loaded successfully");

    // Conversions land in the same pairtree the resolver reads from
    let migrator = HttpMigrator::new(&config, Pairtree::new(&config.jp2_data_dir))?;
    if let Some(transcoder) = &config.transcoder {
        info!("Non-JP2 sources will be transcoded with {}", transcoder.join(" "));
    } else {
        info!("No transcoder configured, only JP2 sources can be fetched");
    }

    let resolver = IdentifierResolver::from_config(&config, Arc::new(migrator))?;

    let access = AccessPolicy::new(config.allowed_hosts.clone());
    match &config.allowed_hosts {
        Some(hosts) => info!("Remote referents restricted to {} host(s)", hosts.len()),
        None => info!("Remote referents unrestricted"),
    }

    info!(
        "Starting image resolver on {}:{}",
        config.address, config.port
    );

    let _ = rocket::custom(figment)
        .manage(resolver)
        .manage(access)
        .mount("/", api::routes())
        .launch()
        .await?;

    Ok(())
}
