//! REST API for the packing service (component C11).
//!
//! Exposes the SP3D and BP3D solvers as JSON/SSE endpoints via Axum, with
//! CORS enabled and OpenAPI documentation served through `utoipa`.

use std::sync::atomic::AtomicBool;
use std::sync::OnceLock;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use rand::Rng;
use serde::Deserialize;
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, AssignmentConfig, SolverConfig};
use crate::error::{PackingError, ValidationError};
use crate::model::{Block, Container};
use crate::solver::{self, Bp3dResponse, Sp3dResponse};

#[derive(Clone)]
struct ApiState {
    solver_config: SolverConfig,
    assignment_config: AssignmentConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>binstow API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// A block as it arrives over the wire, before validation (spec §3 "Block").
#[derive(Deserialize, Clone, ToSchema)]
pub struct BlockSpec {
    pub name: String,
    #[schema(value_type = [f64; 3], example = json!([30.0, 40.0, 20.0]))]
    pub shape: (f64, f64, f64),
    pub weight: f64,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default = "default_stackable")]
    pub stackable: bool,
    #[serde(default)]
    pub right_side_up: bool,
}

fn default_stackable() -> bool {
    true
}

impl BlockSpec {
    fn into_block(self) -> Result<Block, ValidationError> {
        Block::new(
            self.name,
            self.shape,
            self.weight,
            self.color,
            self.stackable,
            self.right_side_up,
        )
    }
}

/// A container as it arrives over the wire (spec §3 "Container").
#[derive(Deserialize, Clone, ToSchema)]
pub struct ContainerSpec {
    pub name: String,
    #[schema(value_type = [f64; 3], example = json!([100.0, 100.0, 100.0]))]
    pub shape: (f64, f64, f64),
    pub weight_capacity: f64,
}

impl ContainerSpec {
    fn into_container(self) -> Result<Container, ValidationError> {
        Container::new(self.name, self.shape, self.weight_capacity)
    }
}

/// Per-request overrides for the annealer's configuration (spec §6's
/// optional `allow_rotate`/`max_iter`/`temperature`, plus a seed for
/// reproducible runs).
#[derive(Deserialize, Clone, Default, ToSchema)]
pub struct SolverConfigOverride {
    pub allow_rotate: Option<bool>,
    pub max_iter: Option<u64>,
    pub temperature: Option<f64>,
    pub seed: Option<u64>,
}

impl SolverConfigOverride {
    fn apply(&self, base: SolverConfig) -> SolverConfig {
        SolverConfig {
            allow_rotate: self.allow_rotate.unwrap_or(base.allow_rotate),
            max_iter: self.max_iter.unwrap_or(base.max_iter),
            temperature: self.temperature.unwrap_or(base.temperature),
            progress_interval: base.progress_interval,
        }
    }

    fn seed(&self) -> u64 {
        self.seed.unwrap_or_else(|| rand::thread_rng().gen())
    }
}

#[derive(Deserialize, ToSchema)]
pub struct Sp3dPackRequest {
    pub container: ContainerSpec,
    pub blocks: Vec<BlockSpec>,
    #[serde(default)]
    pub config: Option<SolverConfigOverride>,
}

#[derive(Deserialize, ToSchema)]
pub struct Bp3dPackRequest {
    pub containers: Vec<ContainerSpec>,
    pub blocks: Vec<BlockSpec>,
    #[serde(default)]
    pub config: Option<SolverConfigOverride>,
}

#[derive(serde::Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(status: StatusCode, error: impl Into<String>, details: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(StatusCode::UNPROCESSABLE_ENTITY, "invalid JSON body", err.to_string())
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(StatusCode::UNPROCESSABLE_ENTITY, "invalid request data", details)
}

fn packing_error_response(err: PackingError) -> Response {
    match err {
        PackingError::Validation(inner) => validation_error(inner.to_string()),
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, "packing failed", other.to_string()),
    }
}

fn validate_blocks(specs: Vec<BlockSpec>) -> Result<Vec<Block>, ValidationError> {
    specs.into_iter().map(BlockSpec::into_block).collect()
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_sp3d_pack, handle_bp3d_pack),
    components(schemas(
        Sp3dPackRequest,
        Bp3dPackRequest,
        BlockSpec,
        ContainerSpec,
        SolverConfigOverride,
        Sp3dResponse,
        Bp3dResponse,
        ErrorResponse
    )),
    tags((name = "packing", description = "Endpoints for 3D strip and bin packing"))
)]
struct ApiDoc;

/// Starts the API server, blocking until it terminates.
pub async fn start_api_server(
    api_config: ApiConfig,
    solver_config: SolverConfig,
    assignment_config: AssignmentConfig,
) {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let state = ApiState {
        solver_config,
        assignment_config,
    };

    let app = Router::new()
        .route("/sp3d/pack", post(handle_sp3d_pack))
        .route("/sp3d/pack/stream", post(handle_sp3d_pack_stream))
        .route("/bp3d/pack", post(handle_bp3d_pack))
        .route("/bp3d/pack/stream", post(handle_bp3d_pack_stream))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state);

    let addr = api_config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            panic!("could not bind API server to {addr}: {err}");
        }
    };

    tracing::info!(
        host = api_config.display_host(),
        port = api_config.port(),
        "packing service starting"
    );

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(error = %err, "API server terminated with an error");
    }
}

/// Handler for `POST /sp3d/pack`.
#[utoipa::path(
    post,
    path = "/sp3d/pack",
    request_body = Sp3dPackRequest,
    responses(
        (status = 200, description = "Packed the blocks into the container", body = Sp3dResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_sp3d_pack(
    State(state): State<ApiState>,
    payload: Result<Json<Sp3dPackRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    let container = match payload.container.into_container() {
        Ok(container) => container,
        Err(err) => return validation_error(err.to_string()),
    };
    let blocks = match validate_blocks(payload.blocks) {
        Ok(blocks) => blocks,
        Err(err) => return validation_error(err.to_string()),
    };

    let overrides = payload.config.unwrap_or_default();
    let solver_config = overrides.apply(state.solver_config);
    let seed = overrides.seed();
    let cancel = AtomicBool::new(false);

    let response = solver::solve_sp3d(&container, blocks, &solver_config, seed, &cancel, |_, _| {});
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for `POST /sp3d/pack/stream` (SSE): streams `(iteration,
/// opt_score)` progress events, then a final full response.
async fn handle_sp3d_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<Sp3dPackRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    let container = match payload.container.into_container() {
        Ok(container) => container,
        Err(err) => return validation_error(err.to_string()),
    };
    let blocks = match validate_blocks(payload.blocks) {
        Ok(blocks) => blocks,
        Err(err) => return validation_error(err.to_string()),
    };

    let overrides = payload.config.unwrap_or_default();
    let solver_config = overrides.apply(state.solver_config);
    let seed = overrides.seed();

    let (tx, rx) = mpsc::channel::<String>(32);
    tokio::task::spawn_blocking(move || {
        let cancel = AtomicBool::new(false);
        let progress_tx = tx.clone();
        let response = solver::solve_sp3d(&container, blocks, &solver_config, seed, &cancel, |iter, score| {
            if let Ok(json) = serde_json::to_string(&json!({"iteration": iter, "opt_score": score})) {
                let _ = progress_tx.blocking_send(json);
            }
        });
        if let Ok(json) = serde_json::to_string(&response) {
            let _ = tx.blocking_send(json);
        }
    });

    sse_response(rx)
}

/// Handler for `POST /bp3d/pack`.
#[utoipa::path(
    post,
    path = "/bp3d/pack",
    request_body = Bp3dPackRequest,
    responses(
        (status = 200, description = "Assigned and packed the blocks into containers", body = Bp3dResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "packing"
)]
async fn handle_bp3d_pack(
    State(state): State<ApiState>,
    payload: Result<Json<Bp3dPackRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    if payload.containers.is_empty() {
        return validation_error("at least one container must be specified");
    }

    let containers: Vec<Container> = match payload
        .containers
        .into_iter()
        .map(ContainerSpec::into_container)
        .collect::<Result<_, _>>()
    {
        Ok(containers) => containers,
        Err(err) => return validation_error(err.to_string()),
    };
    let blocks = match validate_blocks(payload.blocks) {
        Ok(blocks) => blocks,
        Err(err) => return validation_error(err.to_string()),
    };

    let overrides = payload.config.unwrap_or_default();
    let solver_config = overrides.apply(state.solver_config);
    let seed = overrides.seed();
    let cancel = AtomicBool::new(false);

    match solver::solve_bp3d(
        &containers,
        blocks,
        &solver_config,
        &state.assignment_config,
        seed,
        &cancel,
        |_, _| {},
    ) {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => packing_error_response(err),
    }
}

/// Handler for `POST /bp3d/pack/stream` (SSE).
async fn handle_bp3d_pack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<Bp3dPackRequest>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    if payload.containers.is_empty() {
        return validation_error("at least one container must be specified");
    }

    let containers: Vec<Container> = match payload
        .containers
        .into_iter()
        .map(ContainerSpec::into_container)
        .collect::<Result<_, _>>()
    {
        Ok(containers) => containers,
        Err(err) => return validation_error(err.to_string()),
    };
    let blocks = match validate_blocks(payload.blocks) {
        Ok(blocks) => blocks,
        Err(err) => return validation_error(err.to_string()),
    };

    let overrides = payload.config.unwrap_or_default();
    let solver_config = overrides.apply(state.solver_config);
    let seed = overrides.seed();
    let assignment_config = state.assignment_config.clone();

    let (tx, rx) = mpsc::channel::<String>(32);
    tokio::task::spawn_blocking(move || {
        let cancel = AtomicBool::new(false);
        let progress_tx = tx.clone();
        let result = solver::solve_bp3d(
            &containers,
            blocks,
            &solver_config,
            &assignment_config,
            seed,
            &cancel,
            |iter, score| {
                if let Ok(json) = serde_json::to_string(&json!({"iteration": iter, "opt_score": score})) {
                    let _ = progress_tx.blocking_send(json);
                }
            },
        );
        match result {
            Ok(response) => {
                if let Ok(json) = serde_json::to_string(&response) {
                    let _ = tx.blocking_send(json);
                }
            }
            Err(err) => {
                if let Ok(json) = serde_json::to_string(&json!({"error": err.to_string()})) {
                    let _ = tx.blocking_send(json);
                }
            }
        }
    });

    sse_response(rx)
}

fn sse_response(rx: mpsc::Receiver<String>) -> Response {
    let stream = ReceiverStream::new(rx).map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(std::time::Duration::from_secs(10)).text("keep-alive"))
        .into_response()
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/sp3d/pack"));
        assert!(paths.contains_key("/bp3d/pack"));
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc.components.as_ref().expect("OpenAPI doc has no components");
        for name in ["Sp3dPackRequest", "Bp3dPackRequest", "ErrorResponse"] {
            assert!(components.schemas.contains_key(name), "missing schema {name}");
        }
    }

    #[test]
    fn block_spec_defaults_to_stackable_and_not_right_side_up() {
        let json = r#"{"name": "b", "shape": [1.0, 2.0, 3.0], "weight": 5.0}"#;
        let spec: BlockSpec = serde_json::from_str(json).unwrap();
        assert!(spec.stackable);
        assert!(!spec.right_side_up);
    }

    #[test]
    fn solver_config_override_falls_back_to_base() {
        let base = SolverConfig::default();
        let overrides = SolverConfigOverride {
            allow_rotate: Some(false),
            max_iter: None,
            temperature: None,
            seed: None,
        };
        let merged = overrides.apply(base);
        assert!(!merged.allow_rotate);
        assert_eq!(merged.max_iter, base.max_iter);
    }

    #[test]
    fn invalid_block_shape_is_rejected() {
        let specs = vec![BlockSpec {
            name: "bad".to_string(),
            shape: (-1.0, 1.0, 1.0),
            weight: 1.0,
            color: None,
            stackable: true,
            right_side_up: false,
        }];
        assert!(validate_blocks(specs).is_err());
    }
}
