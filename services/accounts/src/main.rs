use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use accounts::{AccountService, AccountsConfig, AccountsError, Catalog, LogMailer, PgStore};
use common::database;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting accounts bootstrap");

    let config = AccountsConfig::from_env()?;
    let hashers = config.hashers()?;
    let content_types = config.content_type_labels()?;

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let store = Arc::new(PgStore::new(pool));
    store.migrate().await?;
    info!("Migrations applied");

    let catalog = Catalog::new(store.clone());
    for (app_label, model) in &content_types {
        let content_type = catalog.get_or_create_content_type(model, app_label, model).await?;
        let permissions = catalog.ensure_default_permissions(&content_type).await?;
        info!(
            "Registered {} with {} permissions",
            content_type.label(),
            permissions.len()
        );
    }

    let service = AccountService::new(
        store,
        hashers,
        Arc::new(LogMailer::new(config.default_from_email.clone())),
        config.default_from_email.clone(),
    );

    match config.superuser() {
        Some((username, email, password)) => {
            match service.create_superuser(username, password, email).await {
                Ok(user) => info!("Superuser {} created", user.id),
                Err(AccountsError::UniquenessViolation { .. }) => {
                    info!("Superuser {} already exists", username)
                }
                Err(e) => return Err(e.into()),
            }
        }
        None => info!("No superuser configured"),
    }

    info!("Accounts bootstrap complete");

    Ok(())
}
