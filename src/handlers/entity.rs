//! CRUD controllers shared by every registered entity. Each handler
//! validates its input first, then makes a single data-access call.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension,
};
use serde_json::{json, Map, Value};

use crate::config::AppConfig;
use crate::database::{NewRecord, PaginateOptions, Patch, Record, Repository};
use crate::entity::EntityDescriptor;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::validation::{validate_filter_request, SchemaMode, ValidationError};

/// Router state for one entity's routes
#[derive(Clone)]
pub struct EntityState {
    pub repository: Repository,
    pub config: Arc<AppConfig>,
}

impl EntityState {
    fn entity(&self) -> &EntityDescriptor {
        self.repository.entity()
    }
}

/// POST /create
pub async fn add(
    State(state): State<EntityState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody,
) -> ApiResult<Record> {
    let empty = Map::new();
    let payload = body_payload(&body, &empty)?;
    let record = NewRecord::build(state.entity(), payload, user.id).map_err(ApiError::invalid_values)?;
    let created = state.repository.create_one(record).await?;
    Ok(ApiResponse::success(created))
}

/// POST /addBulk
pub async fn bulk_insert(
    State(state): State<EntityState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    let items = match body.get("data").and_then(Value::as_array) {
        Some(items) if !items.is_empty() => items,
        _ => return Err(ApiError::missing_parameter("data")),
    };

    let records = items
        .iter()
        .map(|item| {
            let payload = payload_object(item)?;
            NewRecord::build(state.entity(), payload, user.id)
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(ApiError::invalid_values)?;

    let count = state.repository.create_many(records).await?;
    Ok(ApiResponse::success(json!({ "count": count })))
}

/// POST /list
pub async fn find_all(State(state): State<EntityState>, JsonBody(body): JsonBody) -> ApiResult<Value> {
    validate_filter_request(state.entity(), &body)?;
    let query = non_null(&body, "query");

    if body.get("isCountOnly").and_then(Value::as_bool).unwrap_or(false) {
        let total = state.repository.count(query).await?;
        if total == 0 {
            return Err(ApiError::NotFound);
        }
        return Ok(ApiResponse::success(json!({ "totalRecords": total })));
    }

    let options = PaginateOptions::from_request(&body, &state.config.filter);
    let page = state
        .repository
        .paginate(query, &options)
        .await?
        .ok_or(ApiError::NotFound)?;

    let data = serde_json::to_value(page).map_err(|e| ApiError::internal_error(e.to_string()))?;
    Ok(ApiResponse::success(data))
}

/// GET /:id
pub async fn get(State(state): State<EntityState>, Path(id): Path<String>) -> ApiResult<Record> {
    let id = parse_id(&id)?;
    let record = state.repository.find_by_pk(id).await?.ok_or(ApiError::NotFound)?;
    Ok(ApiResponse::success(record))
}

/// POST /count
pub async fn count(State(state): State<EntityState>, JsonBody(body): JsonBody) -> ApiResult<Value> {
    validate_filter_request(state.entity(), &body)?;
    let total = state.repository.count(non_null(&body, "where")).await?;
    if total == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(ApiResponse::success(json!({ "count": total })))
}

/// PUT /update/:id. Validated against the create schema.
pub async fn update(
    State(state): State<EntityState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Vec<Record>> {
    update_by_id(state, user, &id, body, SchemaMode::Create).await
}

/// PUT /partial-update/:id
pub async fn partial_update(
    State(state): State<EntityState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Vec<Record>> {
    update_by_id(state, user, &id, body, SchemaMode::Update).await
}

async fn update_by_id(
    state: EntityState,
    user: AuthUser,
    id: &str,
    body: Value,
    mode: SchemaMode,
) -> ApiResult<Vec<Record>> {
    let id = parse_id(id)?;
    let empty = Map::new();
    let payload = body_payload(&body, &empty)?;
    let patch = Patch::build(state.entity(), payload, user.id, mode).map_err(ApiError::invalid_values)?;

    let updated = state
        .repository
        .update(Some(json!({ "id": id })), patch)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(ApiResponse::success(updated))
}

/// PUT /updateBulk
pub async fn bulk_update(
    State(state): State<EntityState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    validate_filter_request(state.entity(), &body)?;

    let empty = Map::new();
    let payload = match body.get("data") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ApiError::invalid_values(ValidationError::new("\"data\" must be of type object")))
        }
    };
    let patch = Patch::build(state.entity(), payload, user.id, SchemaMode::Update).map_err(ApiError::invalid_values)?;

    let updated = state
        .repository
        .update(non_null(&body, "filter"), patch)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(ApiResponse::success(json!({ "count": updated.len() })))
}

/// PUT /softDelete/:id
pub async fn soft_delete(
    State(state): State<EntityState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Record>> {
    let id = parse_id(&id)?;
    let patch = Patch::soft_delete(state.entity(), user.id);
    let updated = state
        .repository
        .update(Some(json!({ "id": id })), patch)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(ApiResponse::success(updated))
}

/// PUT /softDeleteMany
pub async fn soft_delete_many(
    State(state): State<EntityState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    let ids = ids_param(&body)?;
    let patch = Patch::soft_delete(state.entity(), user.id);
    let updated = state
        .repository
        .update(Some(json!({ "id": { "$in": ids } })), patch)
        .await?
        .ok_or(ApiError::NotFound)?;
    Ok(ApiResponse::success(json!({ "count": updated.len() })))
}

/// DELETE /delete/:id. An unknown id is a success with a zero count.
pub async fn delete(State(state): State<EntityState>, Path(id): Path<String>) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let removed = state.repository.delete_by_pk(id).await?;
    Ok(ApiResponse::success(json!({ "count": removed })))
}

/// POST /deleteMany
pub async fn delete_many(State(state): State<EntityState>, JsonBody(body): JsonBody) -> ApiResult<Value> {
    let ids = ids_param(&body)?;
    let removed = state.repository.destroy(Some(json!({ "id": { "$in": ids } }))).await?;
    Ok(ApiResponse::success(json!({ "count": removed })))
}

fn payload_object(body: &Value) -> Result<&Map<String, Value>, ValidationError> {
    body.as_object()
        .ok_or_else(|| ValidationError::new("\"value\" must be of type object"))
}

/// A missing or `null` request body stands for `{}`
fn body_payload<'a>(body: &'a Value, empty: &'a Map<String, Value>) -> Result<&'a Map<String, Value>, ApiError> {
    match body {
        Value::Null => Ok(empty),
        other => payload_object(other).map_err(ApiError::invalid_values),
    }
}

fn non_null(body: &Value, key: &str) -> Option<Value> {
    body.get(key).filter(|v| !v.is_null()).cloned()
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid id: {}", raw)))
}

/// `ids` must be an array of integer ids
fn ids_param(body: &Value) -> Result<Vec<i64>, ApiError> {
    let ids = body
        .get("ids")
        .and_then(Value::as_array)
        .ok_or_else(|| ApiError::missing_parameter("ids"))?;
    ids.iter()
        .map(|id| {
            id.as_i64()
                .ok_or_else(|| ApiError::validation_error(format!("\"ids\" must contain only numbers, got {}", id)))
        })
        .collect()
}
