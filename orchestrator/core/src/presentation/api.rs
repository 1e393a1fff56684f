// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! REST surface over the application services.
//!
//! The acting user is read from the `X-Appfleet-User` header on every
//! request under `/api` except `/api/health`. Service errors map onto HTTP
//! status codes in [`ApiError`]; every error body is `{"error": "..."}`.

use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::application::{
    ActionGuard, AliasService, ApplicationLifecycleService, CreateApplicationRequest,
    DeploymentService, ModuleService, MountVolumeRequest, PortService, ServiceError,
    StandardAliasService, StandardApplicationLifecycleService, StandardDeploymentService,
    StandardModuleService, StandardPortService, StandardVolumeService, VolumeService,
};
use crate::domain::application::{
    ApplicationId, Deployment, DeploymentType, OwnerId, PortNature, PortToOpen, ServerType,
};
use crate::domain::repository::{ApplicationRepository, VolumeRepository};
use crate::domain::runtime::ContainerRuntime;
use crate::domain::volume::VolumeMount;
use crate::infrastructure::event_bus::{DomainEvent, EventBus};
use crate::presentation::resources::{
    AliasResource, ApplicationResource, ModuleResource, VolumeResource,
};

pub const USER_HEADER: &str = "x-appfleet-user";

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<dyn ApplicationLifecycleService>,
    pub aliases: Arc<dyn AliasService>,
    pub ports: Arc<dyn PortService>,
    pub deployments: Arc<dyn DeploymentService>,
    pub modules: Arc<dyn ModuleService>,
    pub volumes: Arc<dyn VolumeService>,
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Wire the standard services around one shared action guard
    pub fn new(
        applications: Arc<dyn ApplicationRepository>,
        volumes: Arc<dyn VolumeRepository>,
        runtime: Arc<dyn ContainerRuntime>,
        event_bus: Arc<EventBus>,
        domain_suffix: &str,
    ) -> Self {
        let guard = Arc::new(ActionGuard::new(applications.clone()));
        Self {
            lifecycle: Arc::new(StandardApplicationLifecycleService::new(
                applications.clone(),
                volumes.clone(),
                runtime.clone(),
                guard.clone(),
                event_bus.clone(),
            )),
            aliases: Arc::new(StandardAliasService::new(applications.clone(), guard.clone())),
            ports: Arc::new(StandardPortService::new(
                applications.clone(),
                guard.clone(),
                domain_suffix,
            )),
            deployments: Arc::new(StandardDeploymentService::new(
                applications.clone(),
                guard.clone(),
            )),
            modules: Arc::new(StandardModuleService::new(
                applications.clone(),
                runtime.clone(),
                guard.clone(),
            )),
            volumes: Arc::new(StandardVolumeService::new(
                volumes,
                applications,
                runtime,
                guard,
                event_bus.clone(),
            )),
            event_bus,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/events", get(stream_events))
        .route("/applications", get(list_applications).post(create_application))
        .route(
            "/applications/{id}",
            get(get_application).delete(delete_application),
        )
        .route("/applications/{id}/start", post(start_application))
        .route("/applications/{id}/stop", post(stop_application))
        .route("/applications/{id}/restart", post(restart_application))
        .route("/applications/{id}/aliases", get(list_aliases).post(add_alias))
        .route(
            "/applications/{id}/aliases/{alias}",
            get(get_alias).delete(remove_alias),
        )
        .route("/applications/{id}/ports", get(list_ports).post(open_port))
        .route(
            "/applications/{id}/ports/{number}",
            get(get_port).delete(close_port),
        )
        .route(
            "/applications/{id}/deployments",
            get(list_deployments).post(create_deployment),
        )
        .route("/applications/{id}/modules", get(list_modules).post(add_module))
        .route(
            "/applications/{id}/modules/{name}",
            axum::routing::delete(remove_module),
        )
        .route("/volumes", get(list_volumes).post(create_volume))
        .route("/volumes/{name}", get(get_volume).delete(remove_volume))
        .route(
            "/volumes/{name}/mounts",
            post(mount_volume).delete(unmount_volume),
        );

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Errors and extractors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing x-appfleet-user header")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Service(ServiceError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::Service(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Service(ServiceError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Service(ServiceError::Service { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = ?self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Login of the user a request acts on behalf of
#[derive(Debug, Clone)]
pub struct ActingUser(pub OwnerId);

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let login = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|login| !login.is_empty())
            .ok_or(ApiError::Unauthorized)?;
        Ok(Self(OwnerId::new(login)))
    }
}

fn parse_id(raw: &str) -> ApiResult<ApplicationId> {
    ApplicationId::from_string(raw)
        .map_err(|_| ApiError::BadRequest(format!("Invalid application id '{}'", raw)))
}

fn parse_port(raw: &str) -> ApiResult<u16> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid port number '{}'", raw)))
}

fn parse_field<T>(raw: &str) -> ApiResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ApiError::BadRequest(e.to_string()))
}

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateApplicationBody {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub server_type: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenPortBody {
    pub number: u32,
    pub nature: String,
    #[serde(default)]
    pub quick_access: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateDeploymentBody {
    pub context_path: String,
    #[serde(rename = "type")]
    pub deployment_type: String,
}

#[derive(Debug, Deserialize)]
pub struct AddModuleBody {
    pub image: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateVolumeBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UnmountParams {
    pub application_id: String,
    pub container: String,
}

// ============================================================================
// Applications
// ============================================================================

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn create_application(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Json(body): Json<CreateApplicationBody>,
) -> ApiResult<(StatusCode, Json<ApplicationResource>)> {
    let request = CreateApplicationRequest {
        name: body.name,
        display_name: body.display_name,
        server_type: parse_field::<ServerType>(&body.server_type)?,
    };
    let application = state.lifecycle.create(&user, request).await?;
    Ok((StatusCode::CREATED, Json(ApplicationResource::from(&application))))
}

async fn list_applications(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
) -> ApiResult<Json<Vec<ApplicationResource>>> {
    let applications = state.lifecycle.list(&user).await?;
    Ok(Json(applications.iter().map(ApplicationResource::from).collect()))
}

async fn get_application(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApplicationResource>> {
    let application = state.lifecycle.detail(&user, parse_id(&id)?).await?;
    Ok(Json(ApplicationResource::from(&application)))
}

async fn delete_application(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.lifecycle.delete(&user, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn start_application(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.lifecycle.start(&user, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn stop_application(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.lifecycle.stop(&user, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn restart_application(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.lifecycle.restart(&user, parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Aliases
// ============================================================================

async fn list_aliases(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<AliasResource>>> {
    let aliases = state.aliases.list(&user, parse_id(&id)?).await?;
    Ok(Json(
        aliases.into_iter().map(|alias| AliasResource { alias }).collect(),
    ))
}

async fn add_alias(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
    Json(body): Json<AliasResource>,
) -> ApiResult<(StatusCode, Json<AliasResource>)> {
    let alias = state.aliases.add(&user, parse_id(&id)?, &body.alias).await?;
    Ok((StatusCode::CREATED, Json(AliasResource { alias })))
}

async fn get_alias(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((id, alias)): Path<(String, String)>,
) -> ApiResult<Json<AliasResource>> {
    let alias = state.aliases.get(&user, parse_id(&id)?, &alias).await?;
    Ok(Json(AliasResource { alias }))
}

async fn remove_alias(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((id, alias)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.aliases.remove(&user, parse_id(&id)?, &alias).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Ports
// ============================================================================

async fn list_ports(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<PortToOpen>>> {
    Ok(Json(state.ports.list(&user, parse_id(&id)?).await?))
}

async fn open_port(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
    Json(body): Json<OpenPortBody>,
) -> ApiResult<(StatusCode, Json<PortToOpen>)> {
    let nature = parse_field::<PortNature>(&body.nature)?;
    let port = state
        .ports
        .add(&user, parse_id(&id)?, nature, body.number, body.quick_access)
        .await?;
    Ok((StatusCode::CREATED, Json(port)))
}

async fn get_port(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((id, number)): Path<(String, String)>,
) -> ApiResult<Json<PortToOpen>> {
    let port = state
        .ports
        .get(&user, parse_id(&id)?, parse_port(&number)?)
        .await?;
    Ok(Json(port))
}

async fn close_port(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((id, number)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .ports
        .remove(&user, parse_id(&id)?, parse_port(&number)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Deployments
// ============================================================================

async fn list_deployments(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Deployment>>> {
    Ok(Json(
        state
            .deployments
            .find_by_application(&user, parse_id(&id)?)
            .await?,
    ))
}

async fn create_deployment(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
    Json(body): Json<CreateDeploymentBody>,
) -> ApiResult<(StatusCode, Json<Deployment>)> {
    let deployment_type = parse_field::<DeploymentType>(&body.deployment_type)?;
    let deployment = state
        .deployments
        .create(&user, parse_id(&id)?, deployment_type, &body.context_path)
        .await?;
    Ok((StatusCode::CREATED, Json(deployment)))
}

// ============================================================================
// Modules
// ============================================================================

async fn list_modules(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ModuleResource>>> {
    let modules = state.modules.list(&user, parse_id(&id)?).await?;
    Ok(Json(modules.iter().map(ModuleResource::from).collect()))
}

async fn add_module(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<String>,
    Json(body): Json<AddModuleBody>,
) -> ApiResult<(StatusCode, Json<ModuleResource>)> {
    let module = state.modules.add(&user, parse_id(&id)?, &body.image).await?;
    Ok((StatusCode::CREATED, Json(ModuleResource::from(&module))))
}

async fn remove_module(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path((id, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state.modules.remove(&user, parse_id(&id)?, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Volumes
// ============================================================================

async fn list_volumes(
    State(state): State<AppState>,
    ActingUser(_user): ActingUser,
) -> ApiResult<Json<Vec<VolumeResource>>> {
    let volumes = state.volumes.list().await?;
    Ok(Json(volumes.iter().map(VolumeResource::from).collect()))
}

async fn create_volume(
    State(state): State<AppState>,
    ActingUser(_user): ActingUser,
    Json(body): Json<CreateVolumeBody>,
) -> ApiResult<(StatusCode, Json<VolumeResource>)> {
    let volume = state.volumes.create(&body.name).await?;
    Ok((StatusCode::CREATED, Json(VolumeResource::from(&volume))))
}

async fn get_volume(
    State(state): State<AppState>,
    ActingUser(_user): ActingUser,
    Path(name): Path<String>,
) -> ApiResult<Json<VolumeResource>> {
    let volume = state.volumes.get(&name).await?;
    Ok(Json(VolumeResource::from(&volume)))
}

async fn remove_volume(
    State(state): State<AppState>,
    ActingUser(_user): ActingUser,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.volumes.remove(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn mount_volume(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(name): Path<String>,
    Json(request): Json<MountVolumeRequest>,
) -> ApiResult<(StatusCode, Json<VolumeMount>)> {
    let mount = state.volumes.mount(&user, &name, request).await?;
    Ok((StatusCode::CREATED, Json(mount)))
}

async fn unmount_volume(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(name): Path<String>,
    Query(params): Query<UnmountParams>,
) -> ApiResult<StatusCode> {
    let application_id = parse_id(&params.application_id)?;
    state
        .volumes
        .unmount(&user, &name, application_id, &params.container)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Event stream
// ============================================================================

fn visible_to(event: &DomainEvent, user: &OwnerId) -> bool {
    match event {
        DomainEvent::Application(event) => event.owner() == user,
        DomainEvent::Volume(_) => true,
    }
}

fn event_name(event: &DomainEvent) -> &'static str {
    match event {
        DomainEvent::Application(event) => event.kind(),
        DomainEvent::Volume(_) => "volume",
    }
}

/// Server-sent stream of the caller's application events and all volume events
async fn stream_events(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.event_bus.subscribe().into_inner()).filter_map(
        move |received| {
            // Lagged receivers skip what they missed
            let event = received.ok()?;
            if !visible_to(&event, &user) {
                return None;
            }
            Event::default()
                .event(event_name(&event))
                .json_data(&event)
                .ok()
                .map(Ok)
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}
