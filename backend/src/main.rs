use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use disaster_service::config::ServiceConfig;
use disaster_service::routes::{configure_routes, not_found};
use disaster_service::state::ServiceContext;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = ServiceConfig::load().map_err(|e| {
        log::error!("Invalid service configuration: {}", e);
        std::io::Error::other(e)
    })?;

    let context = web::Data::new(ServiceContext::new(
        config.artifacts.clone(),
        config.predictions.zero_probabilities,
    ));

    match context.reload().await {
        Ok((artifact, catalog)) => {
            log::info!(
                "Model loaded: {} disaster types, {} continents, {} countries",
                artifact.label_set().len(),
                catalog.len(),
                catalog.total_countries()
            );
        }
        Err(e) => {
            log::error!("Failed to load model at startup: {}", e);
            log::warn!("Serving without a model; predictions return 503 until POST /api/reload succeeds");
        }
    }

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(context.clone())
            .configure(configure_routes)
            .default_service(web::to(not_found))
    });
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server.bind(&bind_address)?.run().await
}
