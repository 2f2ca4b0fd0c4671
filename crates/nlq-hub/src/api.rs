//! # API Handlers
//!
//! NLQ endpoints plus the small data router that feeds them records.

use crate::error::ApiError;
use crate::store::{Page, PageMeta};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use nlq_core::backend::{Dialect, DialectKind, DocumentQuery, DocumentStore, SqlJsonb, SqlQuery};
use nlq_core::{values, FilterFragment, Operator, Options, ParsedQuery, QueryOverrides, SortDir};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Page size for `GET /api/data` without `limit`.
const LIST_DEFAULT_LIMIT: u32 = 50;

// =============================================================================
// Health
// =============================================================================

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// =============================================================================
// NLQ
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct NlqRequest {
    #[serde(default)]
    pub query: String,
    pub collection: Option<String>,
    pub params: Option<QueryOverrides>,
}

#[derive(Debug, Serialize)]
pub struct NlqResponse {
    pub nlq: String,
    /// The filter in the configured dialect.
    pub filter: Value,
    pub items: Vec<Value>,
    pub meta: PageMeta,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub parsed: ParsedQuery,
    pub document: DocumentQuery,
    pub sql: SqlQuery,
}

fn target_of(state: &AppState, req: &NlqRequest) -> String {
    req.collection
        .as_deref()
        .or_else(|| req.params.as_ref().and_then(|p| p.target.as_deref()))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(&state.config.store.default_collection)
        .to_string()
}

fn parse_request(state: &AppState, req: &NlqRequest) -> Result<ParsedQuery, ApiError> {
    if !state.config.nlq.enabled {
        return Err(ApiError::Disabled);
    }
    Ok(state.parser.parse(&req.query, Utc::now(), req.params.as_ref()))
}

fn rendered_filter(state: &AppState, parsed: &ParsedQuery, target: &str) -> Value {
    let max_limit = state.config.nlq.max_limit;
    match state.config.nlq.dialect {
        DialectKind::Document => DocumentStore::new(max_limit).render(parsed, target).filter,
        DialectKind::Sql => {
            let query = SqlJsonb::new("data", max_limit).render(parsed, target);
            json!({ "where": query.where_clause, "params": query.params })
        }
    }
}

pub async fn nlq_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NlqRequest>,
) -> Result<Json<NlqResponse>, ApiError> {
    let parsed = parse_request(&state, &req)?;
    let target = target_of(&state, &req);
    let page = state.backend.execute(&parsed, &target).await?;

    tracing::info!(
        collection = %target,
        backend = state.backend.name(),
        filters = parsed.filter.len(),
        total = page.meta.total,
        "nlq executed"
    );

    Ok(Json(NlqResponse {
        filter: rendered_filter(&state, &parsed, &target),
        nlq: req.query,
        items: page.items,
        meta: page.meta,
    }))
}

pub async fn nlq_parse(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NlqRequest>,
) -> Result<Json<ParseResponse>, ApiError> {
    let parsed = parse_request(&state, &req)?;
    let target = target_of(&state, &req);
    let max_limit = state.config.nlq.max_limit;

    Ok(Json(ParseResponse {
        document: DocumentStore::new(max_limit).render(&parsed, &target),
        sql: SqlJsonb::new("data", max_limit).render(&parsed, &target),
        parsed,
    }))
}

// =============================================================================
// Data
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CollectionParam {
    pub collection: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ItemIn {
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// JSON object of `path: value` equality pairs.
    pub filter: Option<String>,
    /// Comma-separated paths.
    pub fields: Option<String>,
    pub sort_by: Option<String>,
    pub sort_dir: Option<SortDir>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub collection: Option<String>,
}

fn collection_or_default(state: &AppState, collection: Option<String>) -> String {
    collection
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| state.config.store.default_collection.clone())
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid id.".into()))
}

/// Turns list parameters into the same query shape the NLQ produces.
fn list_query(params: &ListParams, max_limit: u32) -> Result<ParsedQuery, ApiError> {
    let limit = params.limit.unwrap_or(LIST_DEFAULT_LIMIT);
    if limit == 0 || limit > max_limit {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            max_limit
        )));
    }

    let mut filter = BTreeMap::new();
    if let Some(raw) = params.filter.as_deref().filter(|f| !f.trim().is_empty()) {
        let parsed: Value = serde_json::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("Filter must be valid JSON: {}", e)))?;
        let Value::Object(pairs) = parsed else {
            return Err(ApiError::BadRequest("Filter must be a JSON object.".into()));
        };
        for (key, value) in pairs {
            let path = if key == "id" { "_id".to_string() } else { key };
            filter.insert(path.clone(), FilterFragment::scalar(path, Operator::Eq, value));
        }
    }

    let fields = params
        .fields
        .as_deref()
        .map(values::split_list)
        .filter(|f| !f.is_empty());

    Ok(ParsedQuery {
        original_text: String::new(),
        filter,
        options: Options {
            limit: Some(limit),
            offset: params.offset.unwrap_or(0),
            sort_by: params.sort_by.clone().filter(|s| !s.trim().is_empty()),
            sort_dir: params.sort_dir.unwrap_or(SortDir::Asc),
            fields,
        },
        unmatched: Vec::new(),
    })
}

pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page>, ApiError> {
    let parsed = list_query(&params, state.config.nlq.max_limit)?;
    let collection = collection_or_default(&state, params.collection);
    let page = state.backend.execute(&parsed, &collection).await?;
    Ok(Json(page))
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CollectionParam>,
    Json(body): Json<ItemIn>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let collection = collection_or_default(&state, params.collection);
    let item = state.backend.insert(&collection, body.data).await?;
    Ok((StatusCode::CREATED, Json(item.to_json())))
}

pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<CollectionParam>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let collection = collection_or_default(&state, params.collection);
    let item = state.backend.get(&collection, id).await?;
    Ok(Json(item.to_json()))
}

pub async fn replace_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<CollectionParam>,
    Json(body): Json<ItemIn>,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let collection = collection_or_default(&state, params.collection);
    let item = state.backend.replace(&collection, id, body.data).await?;
    Ok(Json(item.to_json()))
}

pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<CollectionParam>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let collection = collection_or_default(&state, params.collection);
    state.backend.delete(&collection, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
