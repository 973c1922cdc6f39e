//! HTTP service on `may_minihttp`.
//!
//! Each connection runs on a `may` coroutine; handlers call the stores
//! directly and the pool parks the coroutine while it waits for a client.

mod handlers;
pub mod request;
pub mod response;
pub mod router;

use crate::config::AppConfig;
use crate::models::{
    BrandModelStore, BrandStore, CompanyStore, RackStore, StockStore, WarehouseStore,
};
use crate::pool::DbPool;
use may_minihttp::{HttpServer, HttpService, Request, Response};
use request::{read_body, ApiRequest};
use response::{reason, ApiResponse};
use std::io;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Everything a handler can reach.
pub struct AppState {
    pub pool: DbPool,
    pub companies: CompanyStore,
    pub warehouses: WarehouseStore,
    pub racks: RackStore,
    pub brands: BrandStore,
    pub brand_models: BrandModelStore,
    pub stocks: StockStore,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(pool: DbPool, config: &AppConfig) -> Self {
        Self {
            companies: CompanyStore::new(pool.clone()),
            warehouses: WarehouseStore::new(pool.clone()),
            racks: RackStore::new(pool.clone()),
            brands: BrandStore::new(pool.clone()),
            brand_models: BrandModelStore::new(pool.clone()),
            stocks: StockStore::new(pool.clone())
                .with_transaction_timeout(config.database.transaction_timeout()),
            pool,
            max_body_bytes: config.server.max_body_bytes,
        }
    }
}

/// Routes one decoded request and renders any failure as a JSON error.
pub fn handle(state: &AppState, req: &ApiRequest) -> ApiResponse {
    handlers::dispatch(state, req)
        .unwrap_or_else(|err| err.into_response(&req.method_name, &req.path))
}

#[derive(Clone)]
pub struct ApiService {
    state: Arc<AppState>,
}

impl ApiService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl HttpService for ApiService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let method = req.method().to_string();
        let target = req.path().to_string();

        let response = match read_body(req.body(), self.state.max_body_bytes)
            .and_then(|body| ApiRequest::new(&method, &target, body))
        {
            Ok(request) => handle(&self.state, &request),
            Err(err) => err.into_response(&method, &target),
        };
        log::debug!("{} {} -> {}", method, target, response.status);

        #[cfg(feature = "metrics")]
        METRICS.record_http_status(response.status);

        res.status_code(response.status as usize, reason(response.status));
        res.header(response.content_type);
        res.body_vec(response.body);
        Ok(())
    }
}

/// Serves the API on `listen` until the server stops.
pub fn serve(state: Arc<AppState>, listen: &str) -> io::Result<()> {
    let server = HttpServer(ApiService::new(state)).start(listen)?;
    log::info!("listening on {}", listen);
    server
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "http server thread panicked"))
}
