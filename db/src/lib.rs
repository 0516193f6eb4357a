use std::{str::FromStr, sync::Arc};

use common::error::{AppError, Res};
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};

pub mod memory;
pub mod store;
pub mod user;

pub mod models {
    pub mod user;
}

pub mod dtos {
    pub mod user;
}

fn connect_options(url: &str, require_ssl: bool) -> Res<PgConnectOptions> {
    let options = PgConnectOptions::from_str(url)?;
    Ok(if require_ssl {
        options.ssl_mode(PgSslMode::Require)
    } else {
        options
    })
}

/// Creates the target database through the `postgres` maintenance database
/// when it does not exist yet.
async fn ensure_database(database_url: &str, require_ssl: bool) -> Res<()> {
    let mut url = url::Url::parse(database_url)
        .map_err(|e| AppError::Internal(format!("Invalid DATABASE_URL: {}", e)))?;
    let db_name = url.path().trim_start_matches('/').to_string();
    if db_name.is_empty() {
        return Err(AppError::Internal(
            "DATABASE_URL does not name a database".to_string(),
        ));
    }
    url.set_path("/postgres");

    let admin_pool = PgPool::connect_with(connect_options(url.as_str(), require_ssl)?).await?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(&db_name)
            .fetch_one(&admin_pool)
            .await?;

    if !exists {
        log::info!("Creating database {}", db_name);
        let statement = format!("CREATE DATABASE \"{}\"", db_name.replace('"', "\"\""));
        sqlx::query(&statement).execute(&admin_pool).await?;
    }

    admin_pool.close().await;
    Ok(())
}

/// Connects to Postgres, creating the database if needed, and applies the
/// `users` migrations.
pub async fn setup(database_url: &str, require_ssl: bool) -> Res<Arc<PgPool>> {
    ensure_database(database_url, require_ssl).await?;

    let pool = PgPoolOptions::new()
        .connect_with(connect_options(database_url, require_ssl)?)
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;
    log::info!("Database migrations applied");

    Ok(Arc::new(pool))
}
