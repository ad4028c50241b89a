use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::caller::CallerContext;
use crate::error::EngineError;
use crate::logic::{FieldOverrideResolver, LifecycleGate, Reconciler};
use crate::model::{Descriptor, DescriptorUpdate, Id, LifecycleEvent, LifecycleResult, NewDescriptor};
use crate::store::{DescriptorStore, LifecycleStore, Store};
use crate::vault::CredentialVault;

/// Shared request state: the store plus the engine collaborators that are
/// configured once per process.
pub struct AppContext<S> {
    pub store: Arc<S>,
    pub vault: Arc<dyn CredentialVault>,
    pub resolver: FieldOverrideResolver,
}

impl<S> AppContext<S> {
    pub fn new(store: Arc<S>, vault: Arc<dyn CredentialVault>) -> Self {
        Self {
            store,
            vault,
            resolver: FieldOverrideResolver::default(),
        }
    }
}

pub type AppState<S> = Arc<AppContext<S>>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub error: String,
}

impl ErrorResponse {
    fn from_error(err: &EngineError) -> Self {
        Self {
            code: err.code().to_string(),
            error: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct LifecycleRequest {
    pub action: String,
    #[serde(default)]
    pub checklist: String,
}

#[derive(Debug, Serialize)]
pub struct DefinitionResponse {
    pub definition: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn reject(err: EngineError) -> HandlerError {
    let status = match &err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::ScopeDenied { .. } => StatusCode::FORBIDDEN,
        EngineError::ResourceInUse { .. } | EngineError::ConflictingUpdate { .. } => {
            StatusCode::CONFLICT
        }
        EngineError::NoResourcesFound
        | EngineError::InvalidEndpointCredentials { .. }
        | EngineError::InvalidLifecycleAction { .. }
        | EngineError::DefinitionParse(_)
        | EngineError::CategoryInvalid { .. } => StatusCode::BAD_REQUEST,
        EngineError::EndpointCrypto(_) | EngineError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("request failed: {err}");
    }
    (status, Json(ErrorResponse::from_error(&err)))
}

pub async fn create_api<S: Store>(
    State(ctx): State<AppState<S>>,
    caller: CallerContext,
    RequestJson(payload): RequestJson<NewDescriptor>,
) -> Result<(StatusCode, Json<Descriptor>), HandlerError> {
    let created = Reconciler::create(
        ctx.store.as_ref(),
        ctx.vault.as_ref(),
        &caller.organization,
        payload,
    )
    .await
    .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_api<S: Store>(
    State(ctx): State<AppState<S>>,
    caller: CallerContext,
    Path(id): Path<Id>,
) -> Result<Json<Descriptor>, HandlerError> {
    match ctx.store.get_descriptor(&id, &caller.organization).await {
        Ok(Some(descriptor)) => Ok(Json(descriptor)),
        Ok(None) => Err(reject(EngineError::NotFound(id))),
        Err(e) => Err(reject(e)),
    }
}

pub async fn update_api<S: Store>(
    State(ctx): State<AppState<S>>,
    caller: CallerContext,
    Path(id): Path<Id>,
    RequestJson(update): RequestJson<DescriptorUpdate>,
) -> Result<Json<Descriptor>, HandlerError> {
    let saved = Reconciler::reconcile(
        ctx.store.as_ref(),
        ctx.vault.as_ref(),
        &ctx.resolver,
        &id,
        &caller.organization,
        &update,
        &caller.scopes,
    )
    .await
    .map_err(reject)?;
    Ok(Json(saved))
}

/// Gateway-validated definition document replaces the stored one. The body is
/// the raw document; JSON for REST and async kinds, SDL for GraphQL.
pub async fn update_definition<S: Store>(
    State(ctx): State<AppState<S>>,
    caller: CallerContext,
    Path(id): Path<Id>,
    body: String,
) -> Result<Json<DefinitionResponse>, HandlerError> {
    let definition =
        Reconciler::regenerate_definition(ctx.store.as_ref(), &id, &caller.organization, &body)
            .await
            .map_err(reject)?;
    Ok(Json(DefinitionResponse { definition }))
}

pub async fn delete_api<S: Store>(
    State(ctx): State<AppState<S>>,
    caller: CallerContext,
    Path(id): Path<Id>,
) -> Result<StatusCode, HandlerError> {
    let removed = ctx
        .store
        .delete_descriptor(&id, &caller.organization)
        .await
        .map_err(reject)?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(reject(EngineError::NotFound(id)))
    }
}

pub async fn transition_lifecycle<S: Store>(
    State(ctx): State<AppState<S>>,
    caller: CallerContext,
    Path(id): Path<Id>,
    RequestJson(request): RequestJson<LifecycleRequest>,
) -> Result<Json<LifecycleResult>, HandlerError> {
    let result = LifecycleGate::transition(
        ctx.store.as_ref(),
        &id,
        &caller.organization,
        &request.action,
        &request.checklist,
        &caller.user,
    )
    .await
    .map_err(reject)?;
    Ok(Json(result))
}

pub async fn get_lifecycle_history<S: Store>(
    State(ctx): State<AppState<S>>,
    caller: CallerContext,
    Path(id): Path<Id>,
) -> Result<Json<ListResponse<LifecycleEvent>>, HandlerError> {
    let items = ctx
        .store
        .lifecycle_history(&id, &caller.organization)
        .await
        .map_err(reject)?;
    let total = items.len();
    Ok(Json(ListResponse { items, total }))
}
