use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use hourlymotion_gateway::{handlers, Args};
use hourlymotion_ledger::Ledger;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.load_config().context("Invalid configuration")?;

    init_tracing(&config.log_format);

    info!(
        service = %config.service_name,
        version = %config.service_version,
        db_path = %config.db_path.display(),
        "Opening ledger"
    );

    let ledger = Arc::new(
        Ledger::open(&config)
            .await
            .context("Failed to open ledger storage")?,
    );

    info!("Starting server on {}", config.listen_addr);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(ledger.clone()))
            .configure(handlers::configure_routes)
    })
    .bind(&config.listen_addr)
    .with_context(|| format!("Failed to bind {}", config.listen_addr))?
    .run()
    .await?;

    Ok(())
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init(),
    }
}
