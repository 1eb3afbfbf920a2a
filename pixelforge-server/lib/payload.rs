//! Request and response payload definitions for the pixelforge server.
//!
//! This module defines the data structures for:
//! - JSON-RPC request params for project and version operations
//! - Response payloads for operation results
//!
//! The module implements:
//! - Request/response serialization and deserialization
//! - Success message formatting for lifecycle operations

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pixelforge_core::{
    models::{Project, ServerRecord, Version},
    smoke::SmokeReport,
    validator::Validation,
};

//--------------------------------------------------------------------------------------------------
// Types: JSON-RPC Payloads
//--------------------------------------------------------------------------------------------------

/// JSON-RPC response
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    pub jsonrpc: String,

    /// Result of the operation
    pub result: Value,

    /// Request ID
    pub id: Option<u64>,
}

//--------------------------------------------------------------------------------------------------
// Types: Method Params
//--------------------------------------------------------------------------------------------------

/// Params for `project.generate`
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Free-text description of the desired server
    pub description: String,
}

/// Params for `project.refine`
#[derive(Debug, Deserialize)]
pub struct RefineRequest {
    /// Project to refine
    pub project: String,

    /// Free-text refinement prompt
    pub prompt: String,
}

/// Params for `project.fork`
#[derive(Debug, Deserialize)]
pub struct ForkRequest {
    /// Project to fork
    pub project: String,
}

/// Params for `project.deploy`
#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    /// Project to deploy
    pub project: String,
}

/// Params for `project.updateBranding`
#[derive(Debug, Deserialize)]
pub struct BrandingRequest {
    /// Project to update
    pub project: String,

    /// New icon URL
    #[serde(rename = "iconUrl")]
    pub icon_url: Option<String>,

    /// New banner URL
    #[serde(rename = "bannerUrl")]
    pub banner_url: Option<String>,
}

/// Params for `version.test`, `version.accept`, and `version.reject`
#[derive(Debug, Deserialize)]
pub struct VersionRequest {
    /// Target version
    pub version: String,
}

/// Params for `version.list`
#[derive(Debug, Deserialize)]
pub struct ListVersionsRequest {
    /// Project whose versions to list
    pub project: String,
}

/// Params for `code.validate`
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    /// Source text to validate
    pub code: String,
}

/// Params for `credits.deposit`, invoked by the billing path after a
/// confirmed top-up purchase
#[derive(Debug, Deserialize)]
pub struct DepositRequest {
    /// User whose balance to credit
    pub user: String,

    /// Credits to add
    pub amount: i64,
}

/// Params for `royalty.record`, invoked by the billing path after a
/// confirmed end-user charge
#[derive(Debug, Deserialize)]
pub struct RoyaltyRecordRequest {
    /// Project whose code produced the image
    pub project: String,

    /// The created image that triggered the charge
    pub image: String,

    /// Credits charged to the end user
    #[serde(rename = "creditsCharged")]
    pub credits_charged: i64,
}

//--------------------------------------------------------------------------------------------------
// Types: Responses
//--------------------------------------------------------------------------------------------------

/// Response type for regular message responses
#[derive(Debug, Serialize)]
pub struct RegularMessageResponse {
    /// Message indicating the status of the operation
    pub message: String,
}

/// Response for `project.generate`
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// The created project
    pub project: Project,

    /// Its pending version 1
    pub version: Version,
}

/// Response for `project.refine`
#[derive(Debug, Serialize)]
pub struct RefineResponse {
    /// The new pending version
    pub version: Version,
}

/// Response for `project.fork`
#[derive(Debug, Serialize)]
pub struct ForkResponse {
    /// The forked project
    pub project: Project,

    /// The copied live version, when the source had one
    pub version: Option<Version>,
}

/// Response for `project.deploy`
#[derive(Debug, Serialize)]
pub struct DeployResponse {
    /// The deployed project
    pub project: Project,

    /// Its hosted server record
    pub server: ServerRecord,
}

/// Response for `version.test`
#[derive(Debug, Serialize)]
pub struct TestResponse {
    /// The version after the run
    pub version: Version,

    /// The four named check results
    pub report: SmokeReport,
}

/// Response for `version.accept`
#[derive(Debug, Serialize)]
pub struct AcceptResponse {
    /// The accepted version
    pub version: Version,

    /// The project with its live pointer updated
    pub project: Project,

    /// The acting user's balance after the charge
    pub balance: i64,
}

/// Response for `version.list`
#[derive(Debug, Serialize)]
pub struct ListVersionsResponse {
    /// The project's versions, newest first
    pub versions: Vec<Version>,
}

/// Response for `code.validate`
#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    /// The static validation outcome
    pub validation: Validation,
}

/// Response for `credits.balance` and `credits.deposit`
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// The user the balance belongs to
    pub user: String,

    /// Current credits
    pub balance: i64,
}
