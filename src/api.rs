// HTTP routes, server bootstrap

use crate::config::Settings;
use crate::error::{RatesError, Result};
use crate::history::{FileLedger, RateStore};
use crate::marketplace::binance_p2p::BinanceP2pClient;
use crate::marketplace::{SampleRequest, Sampler};
use crate::models::decimal_from_f64;
use crate::observe::LogSink;
use crate::official::OfficialRates;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub struct AppState {
    pub sampler: Arc<Sampler>,
    pub store: Arc<RateStore>,
    /// Defaults for `/p2p/usdt/average`, overridable per request.
    pub sampling: SampleRequest,
    pub best_offer_merchant_check: bool,
}

fn success<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "data": data,
    }))
}

fn failure(error: &RatesError) -> HttpResponse {
    let mut response = match error {
        RatesError::NotFound(_) | RatesError::Empty => HttpResponse::NotFound(),
        RatesError::DataIntegrity(_) => HttpResponse::BadRequest(),
        _ => HttpResponse::InternalServerError(),
    };
    response.json(serde_json::json!({
        "success": false,
        "error": error.to_string(),
    }))
}

fn respond<T: Serialize>(result: Result<T>) -> HttpResponse {
    match result {
        Ok(data) => success(data),
        Err(e) => failure(&e),
    }
}

pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "VES exchange rates API",
        "endpoints": {
            "/health": "Liveness check",
            "/p2p/usdt": "Best Binance P2P USDT/VES buy offer",
            "/p2p/usdt/average": "Trust-filtered average of Binance P2P USDT/VES buy offers",
            "/history": "All recorded official rates",
            "/history/dates": "Recorded dates, most recent first",
            "/history/latest": "Most recently recorded official rate",
            "/history/usd-change": "USD change between the two latest records",
            "/history/{date}": "Official rate for one date",
            "/rates/official": "POST scraped official rates into the history",
        },
    }))
}

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

pub async fn get_best_offer(data: web::Data<AppState>) -> impl Responder {
    let sampling = &data.sampling;
    respond(
        data.sampler
            .best_offer(
                &sampling.asset,
                &sampling.fiat,
                &sampling.pay_types,
                data.best_offer_merchant_check,
            )
            .await,
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct AverageParams {
    pub target: Option<usize>,
    pub min_trades: Option<u64>,
    pub min_completion: Option<f64>,
    /// Comma-separated payment method codes.
    pub pay_types: Option<String>,
}

impl AverageParams {
    fn apply(&self, defaults: &SampleRequest) -> Result<SampleRequest> {
        let mut request = defaults.clone();
        if let Some(target) = self.target {
            request.target_sample_size = target;
        }
        if let Some(min_trades) = self.min_trades {
            request.min_monthly_trades = min_trades;
        }
        if let Some(min_completion) = self.min_completion {
            request.min_completion_rate_pct = decimal_from_f64(min_completion)?;
        }
        if let Some(pay_types) = &self.pay_types {
            request.pay_types = pay_types
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        Ok(request)
    }
}

pub async fn get_average_price(
    data: web::Data<AppState>,
    params: web::Query<AverageParams>,
) -> impl Responder {
    let request = match params.apply(&data.sampling) {
        Ok(request) => request,
        Err(e) => return failure(&e),
    };
    respond(data.sampler.aggregate(&request).await)
}

pub async fn get_history(data: web::Data<AppState>) -> impl Responder {
    success(data.store.get_all())
}

pub async fn get_history_dates(data: web::Data<AppState>) -> impl Responder {
    success(data.store.list_dates_by_recency())
}

#[derive(Debug, Serialize)]
struct DatedRecord<'a> {
    date: &'a str,
    #[serde(flatten)]
    record: &'a crate::models::RateRecord,
}

pub async fn get_latest(data: web::Data<AppState>) -> impl Responder {
    match data.store.get_latest() {
        Ok((date, record)) => success(DatedRecord {
            date: &date,
            record: &record,
        }),
        Err(e) => failure(&e),
    }
}

pub async fn get_usd_change(data: web::Data<AppState>) -> impl Responder {
    respond(data.store.get_usd_change())
}

pub async fn get_by_date(data: web::Data<AppState>, date: web::Path<String>) -> impl Responder {
    let date = date.into_inner();
    match data.store.get_by_date(&date) {
        Ok(record) => success(DatedRecord {
            date: &date,
            record: &record,
        }),
        Err(e) => failure(&e),
    }
}

pub async fn post_official_rates(
    data: web::Data<AppState>,
    body: web::Json<OfficialRates>,
) -> impl Responder {
    let rates = body.into_inner().normalized();
    match rates.record_into(&data.store) {
        Ok(()) => success(rates),
        Err(e) => failure(&e),
    }
}

/// Registers every route; shared by the server and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/health", web::get().to(health))
        .route("/p2p/usdt", web::get().to(get_best_offer))
        .route("/p2p/usdt/average", web::get().to(get_average_price))
        .route("/history", web::get().to(get_history))
        .route("/history/dates", web::get().to(get_history_dates))
        .route("/history/latest", web::get().to(get_latest))
        .route("/history/usd-change", web::get().to(get_usd_change))
        .route("/history/{date}", web::get().to(get_by_date))
        .route("/rates/official", web::post().to(post_official_rates));
}

pub fn build_state(settings: &Settings) -> Result<AppState> {
    let sink = Arc::new(LogSink);
    let source = Arc::new(BinanceP2pClient::new(&settings.marketplace)?);
    let backend = Arc::new(FileLedger::new(settings.history.path.clone()));

    Ok(AppState {
        sampler: Arc::new(Sampler::new(source, sink.clone())),
        store: Arc::new(RateStore::new(backend, sink)),
        sampling: SampleRequest::try_from(&settings.sampling)?,
        best_offer_merchant_check: settings.sampling.best_offer_merchant_check,
    })
}

pub async fn start_server(settings: Settings) -> anyhow::Result<()> {
    let app_state = web::Data::new(build_state(&settings)?);
    let addr = settings.server_addr();

    info!(
        "Serving on {} with history at {}",
        addr,
        settings.history.path.display()
    );
    HttpServer::new(move || App::new().app_data(app_state.clone()).configure(configure))
        .bind(addr)?
        .run()
        .await?;
    Ok(())
}
