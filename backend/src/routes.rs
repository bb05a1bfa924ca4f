use actix_web::{HttpRequest, HttpResponse, error, web};
use log::{debug, error, info, warn};
use shared::{
    ContinentsResponse, CountriesResponse, ErrorResponse, HealthResponse, ModelStatus,
    PredictionRequest, PredictionResponse, ReloadResponse, ServiceInfo,
};

use crate::catalog::CatalogError;
use crate::predictor::{PredictError, Query};
use crate::state::{ReloadError, ServiceContext};

const SERVICE_NAME: &str = "Disaster Prediction Service";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(web::resource("/").route(web::get().to(root)))
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/continents").route(web::get().to(continents)))
        .service(web::resource("/api/countries/{continent}").route(web::get().to(countries)))
        .service(web::resource("/api/predict-disaster").route(web::post().to(predict_disaster)))
        .service(web::resource("/api/model-info").route(web::get().to(model_info)))
        .service(web::resource("/api/reload").route(web::post().to(reload)));
}

/// Fallback for unmatched routes.
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    debug!("No route for {} {}", req.method(), req.path());
    HttpResponse::NotFound().json(ErrorResponse::new("Not found", "Resource not found"))
}

fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let detail = err.to_string();
    warn!("Rejected request body: {}", detail);
    let response = HttpResponse::BadRequest().json(ErrorResponse::new("Invalid request", detail));
    error::InternalError::from_response(err, response).into()
}

fn model_unavailable() -> HttpResponse {
    HttpResponse::ServiceUnavailable().json(ErrorResponse::new(
        "Model not loaded",
        "Model not loaded. Please contact administrator.",
    ))
}

async fn root(ctx: web::Data<ServiceContext>) -> HttpResponse {
    HttpResponse::Ok().json(ServiceInfo {
        service: SERVICE_NAME.to_string(),
        status: "online".to_string(),
        model_loaded: ctx.is_model_loaded().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn health(ctx: web::Data<ServiceContext>) -> HttpResponse {
    let published = ctx.published().await;
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        model_status: ModelStatus::from(published.artifact.is_some()),
        countries_loaded: published.catalog.len(),
        total_countries: published.catalog.total_countries(),
    })
}

async fn continents(ctx: web::Data<ServiceContext>) -> HttpResponse {
    let catalog = ctx.catalog().await;
    HttpResponse::Ok().json(ContinentsResponse {
        continents: catalog.continents(),
    })
}

async fn countries(ctx: web::Data<ServiceContext>, path: web::Path<String>) -> HttpResponse {
    let requested = path.into_inner();
    let catalog = ctx.catalog().await;
    match catalog.countries(&requested) {
        Ok((continent, countries)) => HttpResponse::Ok().json(CountriesResponse {
            continent,
            countries: countries.to_vec(),
        }),
        Err(e @ CatalogError::UnknownContinent { .. }) => {
            info!("Unknown continent requested: {}", requested);
            HttpResponse::NotFound().json(ErrorResponse::new("Not found", e.to_string()))
        }
    }
}

async fn predict_disaster(
    ctx: web::Data<ServiceContext>,
    body: web::Json<PredictionRequest>,
) -> HttpResponse {
    let request = body.into_inner();
    let query = Query::new(&request.region, &request.country);
    let artifact = ctx.artifact().await;

    match ctx.responder().respond(artifact.as_deref(), &query) {
        Ok(result) => {
            debug!(
                "Predicted {} classes for {}, {}",
                result.ranked.len(),
                result.country,
                result.region
            );
            HttpResponse::Ok().json(PredictionResponse::from(result))
        }
        Err(PredictError::ModelUnavailable) => {
            warn!("Prediction requested while no model is loaded");
            model_unavailable()
        }
        Err(e @ PredictError::PredictionFailed(_)) => {
            error!("Prediction failed for {:?}: {}", query, e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Prediction error", e.to_string()))
        }
    }
}

async fn model_info(ctx: web::Data<ServiceContext>) -> HttpResponse {
    match ctx.artifact().await {
        Some(artifact) => HttpResponse::Ok().json(artifact.model_info()),
        None => model_unavailable(),
    }
}

async fn reload(ctx: web::Data<ServiceContext>) -> HttpResponse {
    info!("Reload requested");
    match ctx.reload().await {
        Ok((artifact, catalog)) => {
            HttpResponse::Ok().json(ReloadResponse {
                status: "reloaded".to_string(),
                model_info: artifact.model_info(),
                total_countries: catalog.total_countries(),
            })
        }
        Err(e) => {
            error!("Reload failed: {}", e);
            let still_serving = if ctx.is_model_loaded().await {
                "previous model is still being served"
            } else {
                "no model is loaded"
            };
            let detail = match &e {
                ReloadError::Artifact(inner) => format!("{inner}; {still_serving}"),
                ReloadError::Blocking(inner) => format!("{inner}; {still_serving}"),
            };
            HttpResponse::ServiceUnavailable().json(ErrorResponse::new("Reload failed", detail))
        }
    }
}
