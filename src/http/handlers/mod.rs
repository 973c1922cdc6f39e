//! Request handlers.
//!
//! Every collection is served by the same five generic handlers over the
//! [`Resource`] trait; the stores implement it in [`resources`]. Creates and
//! updates answer with a fresh read so joined display names and the stored
//! version are what the client sees.

mod resources;

use super::request::{read_json, ApiRequest, Method, QueryParams};
use super::response::{ApiError, ApiResponse};
use super::router::{route, Collection, Route};
use super::AppState;
use crate::error::StoreResult;
use crate::filters::{Filters, Metadata, SortColumns};
use crate::models::rack::validate_racks;
use crate::models::{Rack, RackInput, RackStore};
use crate::validator::Validator;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// A store as seen from HTTP: its entity and input shapes, list filters and
/// wire names.
pub trait Resource {
    type Entity: Serialize;
    type Input: DeserializeOwned;
    type Query;
    type Id;

    /// Key of the single-entity envelope.
    const ENVELOPE: &'static str;
    /// Display name used in delete confirmations.
    const NAME: &'static str;
    const SORT: SortColumns;

    fn insert(&self, entity: &mut Self::Entity) -> StoreResult<()>;
    fn get(&self, id: &Self::Id) -> StoreResult<Self::Entity>;
    fn update(&self, entity: &mut Self::Entity) -> StoreResult<()>;
    fn delete(&self, id: &Self::Id) -> StoreResult<()>;
    fn list(
        &self,
        query: &Self::Query,
        filters: &Filters,
    ) -> StoreResult<(Vec<Self::Entity>, Metadata)>;

    /// `NotFound` for an id that cannot name a row.
    fn parse_id(raw: &str) -> Result<Self::Id, ApiError>;
    fn id_of(entity: &Self::Entity) -> Self::Id;
    fn read_query(params: &QueryParams) -> Self::Query;
    fn from_input(input: Self::Input) -> Self::Entity;
    fn apply(entity: &mut Self::Entity, input: Self::Input);
    fn validate(v: &mut Validator, entity: &Self::Entity);
}

pub fn dispatch(state: &AppState, req: &ApiRequest) -> Result<ApiResponse, ApiError> {
    match route(&req.path).ok_or(ApiError::NotFound)? {
        Route::Healthcheck => match req.method {
            Method::Get => healthcheck(state),
            _ => Err(ApiError::MethodNotAllowed(req.method_name.clone())),
        },
        Route::Metrics => match req.method {
            Method::Get => metrics(),
            _ => Err(ApiError::MethodNotAllowed(req.method_name.clone())),
        },
        Route::List(Collection::Rack) if req.method == Method::Post => {
            create_racks(&state.racks, req)
        }
        Route::List(c) => match c {
            Collection::Company => collection(&state.companies, req),
            Collection::Warehouse => collection(&state.warehouses, req),
            Collection::Rack => collection(&state.racks, req),
            Collection::Brand => collection(&state.brands, req),
            Collection::BrandModel => collection(&state.brand_models, req),
            Collection::Stock => collection(&state.stocks, req),
        },
        Route::Item(c, id) => match c {
            Collection::Company => item(&state.companies, req, &id),
            Collection::Warehouse => item(&state.warehouses, req, &id),
            Collection::Rack => item(&state.racks, req, &id),
            Collection::Brand => item(&state.brands, req, &id),
            Collection::BrandModel => item(&state.brand_models, req, &id),
            Collection::Stock => item(&state.stocks, req, &id),
        },
    }
}

fn collection<R: Resource>(store: &R, req: &ApiRequest) -> Result<ApiResponse, ApiError> {
    match req.method {
        Method::Get => list(store, req),
        Method::Post => create(store, req),
        _ => Err(ApiError::MethodNotAllowed(req.method_name.clone())),
    }
}

fn item<R: Resource>(store: &R, req: &ApiRequest, raw_id: &str) -> Result<ApiResponse, ApiError> {
    match req.method {
        Method::Get => show(store, &R::parse_id(raw_id)?),
        Method::Patch => update(store, req, &R::parse_id(raw_id)?),
        Method::Delete => delete(store, &R::parse_id(raw_id)?),
        _ => Err(ApiError::MethodNotAllowed(req.method_name.clone())),
    }
}

fn validated<R: Resource>(entity: &R::Entity) -> Result<(), ApiError> {
    let mut v = Validator::new();
    R::validate(&mut v, entity);
    if v.valid() {
        Ok(())
    } else {
        Err(ApiError::Validation(v.into_errors()))
    }
}

fn create<R: Resource>(store: &R, req: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let input: R::Input = read_json(&req.body)?;
    let mut entity = R::from_input(input);
    validated::<R>(&entity)?;

    store.insert(&mut entity)?;
    let created = store.get(&R::id_of(&entity))?;
    ApiResponse::envelope(201, R::ENVELOPE, &created)
}

fn show<R: Resource>(store: &R, id: &R::Id) -> Result<ApiResponse, ApiError> {
    let entity = store.get(id)?;
    ApiResponse::envelope(200, R::ENVELOPE, &entity)
}

/// Present fields overwrite the stored entity; the update is conditioned on
/// the version read here unless the body supplies one.
fn update<R: Resource>(store: &R, req: &ApiRequest, id: &R::Id) -> Result<ApiResponse, ApiError> {
    let mut entity = store.get(id)?;
    let input: R::Input = read_json(&req.body)?;
    R::apply(&mut entity, input);
    validated::<R>(&entity)?;

    store.update(&mut entity)?;
    let updated = store.get(id)?;
    ApiResponse::envelope(200, R::ENVELOPE, &updated)
}

fn delete<R: Resource>(store: &R, id: &R::Id) -> Result<ApiResponse, ApiError> {
    store.delete(id)?;
    Ok(ApiResponse::json(
        200,
        &json!({ "message": format!("{} successfully deleted", R::NAME) }),
    ))
}

fn list<R: Resource>(store: &R, req: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let mut v = Validator::new();
    let query = R::read_query(&req.query);
    let filters = req.query.read_filters(&mut v);
    if v.valid() {
        filters.validate(&mut v, &R::SORT);
    }
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    let (data, metadata) = store.list(&query, &filters)?;
    let body = serde_json::to_value(&data).map_err(|e| ApiError::Server(e.to_string()))?;
    Ok(ApiResponse::json(
        200,
        &json!({ "data": body, "metadata": metadata }),
    ))
}

/// `POST /v1/rak` with an array body inserts every rack in one statement.
fn create_racks(store: &RackStore, req: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let first = req.body.iter().find(|b| !b.is_ascii_whitespace());
    if first != Some(&b'[') {
        return create(store, req);
    }

    let inputs: Vec<RackInput> = read_json(&req.body)?;
    let mut racks: Vec<Rack> = inputs.into_iter().map(Rack::from_input).collect();
    let mut v = Validator::new();
    validate_racks(&mut v, &racks);
    if !v.valid() {
        return Err(ApiError::Validation(v.into_errors()));
    }

    store.insert_many(&mut racks)?;
    ApiResponse::envelope(201, <RackStore as Resource>::ENVELOPE, &racks)
}

fn healthcheck(state: &AppState) -> Result<ApiResponse, ApiError> {
    let conn = state
        .pool
        .acquire()
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;
    match conn.ping() {
        Ok(true) => Ok(ApiResponse::json(
            200,
            &json!({
                "status": "available",
                "system_info": { "version": env!("CARGO_PKG_VERSION") },
            }),
        )),
        Ok(false) => Err(ApiError::Unavailable("database ping failed".to_string())),
        Err(e) => Err(ApiError::Unavailable(e.to_string())),
    }
}

#[cfg(feature = "metrics")]
fn metrics() -> Result<ApiResponse, ApiError> {
    let body = METRICS
        .encode()
        .map_err(|e| ApiError::Server(e.to_string()))?;
    Ok(ApiResponse::text(200, body))
}

#[cfg(not(feature = "metrics"))]
fn metrics() -> Result<ApiResponse, ApiError> {
    Err(ApiError::NotFound)
}
