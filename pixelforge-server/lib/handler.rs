//! Request handlers for the pixelforge server.
//!
//! This module implements:
//! - The JSON-RPC dispatch for project and version operations
//! - Hosted invocation of deployed projects
//! - Response formatting and branding overlay
//!
//! Hosted invocation re-executes the live version's code through the sandbox
//! engine on every inbound request, using the internal service credential
//! from server configuration; a creator-supplied secret is never forwarded
//! into sandboxed code.

use std::collections::BTreeMap;

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

use pixelforge_core::{
    management::{credits, db, project, royalty, version},
    models::{Project, ProjectStatus},
    sandbox::SandboxRequest,
    validator,
    PixelforgeError,
};
use pixelforge_utils::normalize_request_path;

use crate::{
    error::ServerError,
    middleware::AuthenticatedUser,
    payload::{
        AcceptResponse, BalanceResponse, BrandingRequest, DepositRequest, DeployRequest,
        DeployResponse, ForkRequest, ForkResponse, GenerateRequest, GenerateResponse,
        JsonRpcResponse, ListVersionsRequest, ListVersionsResponse, RefineRequest, RefineResponse,
        RegularMessageResponse, RoyaltyRecordRequest, TestResponse, ValidateRequest,
        ValidateResponse, VersionRequest,
    },
    state::AppState,
    ServerResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Header carrying the internal service credential into sandboxed code
const SERVICE_CREDENTIAL_HEADER: &str = "x-pixelforge-internal";

//--------------------------------------------------------------------------------------------------
// Functions: REST API Handlers
//--------------------------------------------------------------------------------------------------

/// Handler for health check
pub async fn health() -> ServerResult<impl IntoResponse> {
    Ok((
        StatusCode::OK,
        Json(RegularMessageResponse {
            message: "Service is healthy".to_string(),
        }),
    ))
}

//--------------------------------------------------------------------------------------------------
// Functions: JSON-RPC Handlers
//--------------------------------------------------------------------------------------------------

/// Main JSON-RPC handler that dispatches to the appropriate method
pub async fn json_rpc_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> ServerResult<impl IntoResponse> {
    if payload.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(ServerError::ValidationError(
            "Invalid or missing jsonrpc version field".to_string(),
        ));
    }

    let id = payload.get("id").and_then(Value::as_u64);
    let method = payload
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| ServerError::ValidationError("Missing method field".to_string()))?;

    let result = match method {
        "project.generate" => {
            let params: GenerateRequest = parse_params(&payload, method)?;
            let (project_row, version_row) = project::generate(
                state.get_pool(),
                state.get_codegen().as_ref(),
                state.get_policy(),
                &user,
                &params.description,
            )
            .await?;
            to_value(GenerateResponse {
                project: project_row,
                version: version_row,
            })?
        }
        "project.refine" => {
            let params: RefineRequest = parse_params(&payload, method)?;
            let version_row = version::refine(
                state.get_pool(),
                state.get_codegen().as_ref(),
                state.get_policy(),
                &user,
                &params.project,
                &params.prompt,
            )
            .await?;
            to_value(RefineResponse {
                version: version_row,
            })?
        }
        "project.fork" => {
            let params: ForkRequest = parse_params(&payload, method)?;
            let (project_row, version_row) =
                project::fork(state.get_pool(), &user, &params.project).await?;
            to_value(ForkResponse {
                project: project_row,
                version: version_row,
            })?
        }
        "project.deploy" => {
            let params: DeployRequest = parse_params(&payload, method)?;
            let (project_row, server) =
                project::deploy(state.get_pool(), &user, &params.project).await?;
            to_value(DeployResponse {
                project: project_row,
                server,
            })?
        }
        "project.updateBranding" => {
            let params: BrandingRequest = parse_params(&payload, method)?;
            let project_row = project::update_branding(
                state.get_pool(),
                &user,
                &params.project,
                params.icon_url,
                params.banner_url,
            )
            .await?;
            to_value(project_row)?
        }
        "version.test" => {
            let params: VersionRequest = parse_params(&payload, method)?;
            let (version_row, report) = version::run_tests(
                state.get_pool(),
                state.get_smoke().as_ref(),
                &user,
                &params.version,
            )
            .await?;
            to_value(TestResponse {
                version: version_row,
                report,
            })?
        }
        "version.accept" => {
            let params: VersionRequest = parse_params(&payload, method)?;
            let (version_row, project_row) =
                version::accept(state.get_pool(), &user, &params.version).await?;
            let balance = credits::get_balance(state.get_pool(), &user).await?;
            to_value(AcceptResponse {
                version: version_row,
                project: project_row,
                balance,
            })?
        }
        "version.reject" => {
            let params: VersionRequest = parse_params(&payload, method)?;
            let version_row = version::reject(state.get_pool(), &user, &params.version).await?;
            to_value(version_row)?
        }
        "version.list" => {
            let params: ListVersionsRequest = parse_params(&payload, method)?;
            let versions = version::list(state.get_pool(), &user, &params.project).await?;
            to_value(ListVersionsResponse { versions })?
        }
        "code.validate" => {
            let params: ValidateRequest = parse_params(&payload, method)?;
            to_value(ValidateResponse {
                validation: validator::validate(&params.code),
            })?
        }
        "credits.balance" => {
            let balance = credits::get_balance(state.get_pool(), &user).await?;
            to_value(BalanceResponse {
                user,
                balance,
            })?
        }
        "credits.deposit" => {
            verify_service_credential(&state, &headers)?;
            let params: DepositRequest = parse_params(&payload, method)?;
            if params.amount < 0 {
                return Err(ServerError::ValidationError(
                    "deposit amount must be non-negative".to_string(),
                ));
            }
            credits::credit(state.get_pool(), &params.user, params.amount).await?;
            let balance = credits::get_balance(state.get_pool(), &params.user).await?;
            to_value(BalanceResponse {
                user: params.user,
                balance,
            })?
        }
        "royalty.record" => {
            verify_service_credential(&state, &headers)?;
            let params: RoyaltyRecordRequest = parse_params(&payload, method)?;
            let royalty_row = royalty::record_royalty(
                state.get_pool(),
                state.get_policy(),
                &params.project,
                &params.image,
                params.credits_charged,
            )
            .await?;
            to_value(royalty_row)?
        }
        unknown_method => {
            return Err(ServerError::ValidationError(format!(
                "Unknown method: {}",
                unknown_method
            )));
        }
    };

    Ok((
        StatusCode::OK,
        Json(JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result,
            id,
        }),
    ))
}

//--------------------------------------------------------------------------------------------------
// Functions: Hosted Invocation Handlers
//--------------------------------------------------------------------------------------------------

/// Handler for a deployed project's root endpoint
pub async fn hosted_root(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    hosted_invoke(state, project_id, String::new(), method, headers, body).await
}

/// Handler for a deployed project's sub-path endpoints
pub async fn hosted_path(
    State(state): State<AppState>,
    Path((project_id, path)): Path<(String, String)>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    hosted_invoke(state, project_id, path, method, headers, body).await
}

/// Loads a deployed project's live version, re-executes it in the sandbox,
/// and forwards the resulting status/headers/body verbatim. GET responses
/// get the project's branding overlaid onto the parsed JSON capabilities.
async fn hosted_invoke(
    state: AppState,
    project_id: String,
    path: String,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    let project_row = db::get_project(state.get_pool(), &project_id).await?;

    if project_row.status != ProjectStatus::Deployed.as_str() {
        return Err(PixelforgeError::InvalidState {
            entity: format!("project {}", project_id),
            current: project_row.status.clone(),
            attempted: "invoke before deployment".to_string(),
        }
        .into());
    }

    let live_version_id = project_row.live_version_id.as_deref().ok_or_else(|| {
        PixelforgeError::InvalidState {
            entity: format!("project {}", project_id),
            current: project_row.status.clone(),
            attempted: "invoke without a deployed live version".to_string(),
        }
    })?;

    let live = db::get_version(state.get_pool(), live_version_id).await?;

    // The live code was validated before acceptance; re-scan anyway so a
    // tampered row can never reach the sandbox.
    let validation = validator::validate(&live.generated_code);
    if !validation.valid {
        return Err(PixelforgeError::Validation(validation.errors).into());
    }

    let request_path = normalize_request_path(&path)
        .map_err(|e| ServerError::ValidationError(e.to_string()))?;

    let mut request_headers = BTreeMap::new();
    if let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        request_headers.insert("content-type".to_string(), content_type.to_string());
    }
    if let Some(credential) = state.get_config().get_service_credential() {
        request_headers.insert(SERVICE_CREDENTIAL_HEADER.to_string(), credential.clone());
    }

    let request = SandboxRequest::new(
        method.as_str(),
        request_path,
        request_headers,
        if body.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&body).into_owned())
        },
    );

    let outcome = state
        .get_engine()
        .execute(&live.generated_code, &request)
        .await?;

    let body = if method == Method::GET {
        overlay_branding(&project_row, &outcome.body).unwrap_or(outcome.body)
    } else {
        outcome.body
    };

    let mut response_headers = HeaderMap::new();
    for (name, value) in &outcome.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            response_headers.insert(name, value);
        }
    }

    let status = StatusCode::from_u16(outcome.status_code).unwrap_or(StatusCode::OK);
    let mut response = Response::builder()
        .status(status)
        .body(Body::from(body))
        .map_err(|e| ServerError::InternalError(format!("failed to build response: {}", e)))?;
    *response.headers_mut() = response_headers;

    Ok(response)
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

/// Overlays a project's branding fields onto a JSON capabilities body.
///
/// Returns `None` when the body is not a JSON object; the original bytes are
/// forwarded untouched in that case.
fn overlay_branding(project_row: &Project, body: &[u8]) -> Option<Vec<u8>> {
    let mut value: Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object_mut()?;

    object.insert("name".to_string(), Value::String(project_row.name.clone()));
    object.insert(
        "description".to_string(),
        Value::String(project_row.description.clone()),
    );
    if let Some(icon) = &project_row.icon_url {
        object.insert("icon".to_string(), Value::String(icon.clone()));
    }
    if let Some(banner) = &project_row.banner_url {
        object.insert("banner".to_string(), Value::String(banner.clone()));
    }

    serde_json::to_vec(&value).ok()
}

/// Requires the internal service credential on billing-path methods.
fn verify_service_credential(state: &AppState, headers: &HeaderMap) -> ServerResult<()> {
    match state.get_config().get_service_credential() {
        Some(expected) => {
            let presented = headers
                .get(SERVICE_CREDENTIAL_HEADER)
                .and_then(|v| v.to_str().ok());
            if presented != Some(expected.as_str()) {
                return Err(ServerError::AuthError(
                    "royalty recording requires the internal service credential".to_string(),
                ));
            }
            Ok(())
        }
        None if *state.get_config().get_dev_mode() => Ok(()),
        None => Err(ServerError::AuthError(
            "no internal service credential configured".to_string(),
        )),
    }
}

fn parse_params<T: DeserializeOwned>(payload: &Value, method: &str) -> ServerResult<T> {
    let params = payload
        .get("params")
        .ok_or_else(|| ServerError::ValidationError("Missing params field".to_string()))?;

    serde_json::from_value(params.clone()).map_err(|e| {
        ServerError::ValidationError(format!("Invalid params for {}: {}", method, e))
    })
}

fn to_value<T: serde::Serialize>(value: T) -> ServerResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| ServerError::InternalError(format!("JSON serialization error: {}", e)))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
