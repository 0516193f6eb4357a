use std::{io, sync::Arc};

use actix_web::{App, HttpServer, web};
use api_users::{LoyaltyPolicy, UserService};
use common::{clock::SystemClock, env_config::Config};
use db::store::PgUserStore;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // get env vars
    let config = Config::from_env().map_err(io::Error::other)?;

    // init logger
    if config.console_logging_enabled {
        logger::setup(&config.log_level, &config.log_file).map_err(io::Error::other)?;
    }

    // init db connection
    let pool = db::setup(&config.database_url, config.is_production())
        .await
        .map_err(|e| io::Error::other(e.to_string()))?;

    let service = UserService::new(
        Arc::new(PgUserStore::new(pool)),
        Arc::new(SystemClock),
        LoyaltyPolicy::from(&config.loyalty),
    );

    log::info!(
        "Listening on {}:{} ({} environment)",
        config.server_host,
        config.server_port,
        config.environment
    );
    let console_logging_enabled = config.console_logging_enabled;
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(service.clone()))
            .wrap(logger::middleware(console_logging_enabled))
            .service(api_users::mount_users())
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .workers(config.num_workers)
    .run()
    .await
}
