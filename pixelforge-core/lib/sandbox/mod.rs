//! Sandbox execution engine for untrusted, machine-generated code.
//!
//! This module provides process-based isolation: each call spawns exactly one
//! OS subprocess that loads the candidate code, replays one HTTP-like request
//! against it, and reports the outcome through a delimited stdout marker
//! line. The caller blocks until that process exits, times out, or fails to
//! spawn. Every call gets its own disposable scratch directory, so calls are
//! fully reentrant and may run with true parallelism, bounded only by OS
//! process limits. The engine performs no admission control or concurrency
//! ticketing; that is a scaling gap, not a correctness one.
//!
//! Two interchangeable backends implement the [`SandboxBackend`] capability
//! trait and are selected by configuration at engine construction, never by
//! call-site logic:
//!
//! - **Unconfined**: a plain subprocess per call, for development
//! - **Jailed**: the same subprocess under an OS-level isolation wrapper
//!   (dedicated user, read-only mounts, no shared network namespace, seccomp)
//!
//! ## Marker protocol
//!
//! The final relevant stdout line of a run is the literal token
//! `__SANDBOX_RESULT__` immediately followed, with no separator, by one JSON
//! object `{"statusCode":<int>,"headers":{...},"body":"<base64>"}`. The body
//! is always base64-encoded before printing; that is the invariant that keeps
//! the marker token and raw newlines out of the result line.

mod exec;
mod jailed;
mod runner;
mod scratch;
mod unconfined;

use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::{Deserialize, Serialize};

use pixelforge_utils::SANDBOX_RESULT_MARKER;

use crate::{
    config::{SandboxBackendKind, SandboxSettings},
    PixelforgeError, PixelforgeResult,
};

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use jailed::JailedBackend;
pub use unconfined::UnconfinedBackend;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// One HTTP-like request replayed against sandboxed code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxRequest {
    /// Request method (`GET`, `POST`, ...)
    pub method: String,

    /// Request path, rooted at `/`
    pub path: String,

    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, if any
    pub body: Option<String>,
}

/// Structured outcome of one sandboxed execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOutcome {
    /// True when the reported status is below 400
    pub success: bool,

    /// HTTP-like status code the code reported
    pub status_code: u16,

    /// Response headers the code set
    pub headers: BTreeMap<String, String>,

    /// Decoded response body
    pub body: Vec<u8>,
}

/// Wire form of the marker line's JSON payload
#[derive(Debug, Deserialize)]
struct MarkerResult {
    #[serde(rename = "statusCode")]
    status_code: u16,

    #[serde(default)]
    headers: BTreeMap<String, String>,

    body: String,
}

/// Capability interface implemented by both sandbox backends
#[async_trait]
pub trait SandboxBackend: Send + Sync {
    /// Which backend this is
    fn kind(&self) -> SandboxBackendKind;

    /// Executes `code` against `request` in a fresh isolated subprocess.
    async fn execute(
        &self,
        code: &str,
        request: &SandboxRequest,
    ) -> PixelforgeResult<SandboxOutcome>;
}

/// The sandbox execution engine, holding the configured backend
pub struct SandboxEngine {
    backend: Box<dyn SandboxBackend>,
}

impl std::fmt::Debug for SandboxEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxEngine").finish_non_exhaustive()
    }
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandboxRequest {
    /// Creates a GET request for the given path with no headers or body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Creates a request with the given method, path, headers, and body.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        headers: BTreeMap<String, String>,
        body: Option<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers,
            body,
        }
    }
}

impl SandboxEngine {
    /// Builds the engine for the backend named by `settings`.
    ///
    /// For the jailed backend, the isolation tool must be present; its
    /// absence is a configuration error, never a silent fallback to the
    /// unconfined backend.
    pub fn new(settings: SandboxSettings) -> PixelforgeResult<Self> {
        let backend: Box<dyn SandboxBackend> = match settings.get_backend() {
            SandboxBackendKind::Unconfined => Box::new(UnconfinedBackend::new(settings)),
            SandboxBackendKind::Jailed => Box::new(JailedBackend::new(settings)?),
        };

        Ok(Self { backend })
    }

    /// Wraps an already-built backend. Used by tests to substitute fakes.
    pub fn with_backend(backend: Box<dyn SandboxBackend>) -> Self {
        Self { backend }
    }

    /// Which backend this engine was configured with.
    pub fn backend_kind(&self) -> SandboxBackendKind {
        self.backend.kind()
    }

    /// Executes `code` against `request` through the configured backend.
    pub async fn execute(
        &self,
        code: &str,
        request: &SandboxRequest,
    ) -> PixelforgeResult<SandboxOutcome> {
        self.backend.execute(code, request).await
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Locates the marker line in captured stdout and decodes its payload.
///
/// Returns `None` when no line carries the marker; the caller decides whether
/// that is an execution failure or a result-parse failure based on the exit
/// status. The last marker-bearing line wins, so earlier stray prints by the
/// candidate code cannot spoof a result printed later by the runner.
pub(crate) fn parse_marker_output(stdout: &str) -> Option<PixelforgeResult<SandboxOutcome>> {
    let line = stdout
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with(SANDBOX_RESULT_MARKER))?;

    let payload = &line.trim_start()[SANDBOX_RESULT_MARKER.len()..];

    let result: MarkerResult = match serde_json::from_str(payload) {
        Ok(result) => result,
        Err(e) => {
            return Some(Err(PixelforgeError::ResultParse(format!(
                "marker payload is not valid JSON: {}",
                e
            ))));
        }
    };

    let body = match BASE64_STANDARD.decode(&result.body) {
        Ok(body) => body,
        Err(e) => {
            return Some(Err(PixelforgeError::ResultParse(format!(
                "marker body is not valid base64: {}",
                e
            ))));
        }
    };

    Some(Ok(SandboxOutcome {
        success: result.status_code < 400,
        status_code: result.status_code,
        headers: result.headers,
        body,
    }))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_line(status: u16, body: &[u8]) -> String {
        format!(
            "{}{{\"statusCode\":{},\"headers\":{{\"content-type\":\"application/json\"}},\"body\":\"{}\"}}",
            SANDBOX_RESULT_MARKER,
            status,
            BASE64_STANDARD.encode(body)
        )
    }

    #[test]
    fn test_parse_marker_round_trips_json_body() {
        let original = serde_json::json!({"name": "avatar-server", "formats": ["png"]});
        let stdout = format!(
            "starting\n{}\n",
            marker_line(200, original.to_string().as_bytes())
        );

        let outcome = parse_marker_output(&stdout).unwrap().unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.status_code, 200);

        let parsed: serde_json::Value = serde_json::from_slice(&outcome.body).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_parse_marker_absent() {
        assert!(parse_marker_output("hello\nworld\n").is_none());
        assert!(parse_marker_output("").is_none());
    }

    #[test]
    fn test_parse_marker_last_line_wins() {
        let stdout = format!(
            "{}\n{}\n",
            marker_line(500, b"spoofed"),
            marker_line(200, b"real")
        );
        let outcome = parse_marker_output(&stdout).unwrap().unwrap();
        assert_eq!(outcome.status_code, 200);
        assert_eq!(outcome.body, b"real");
    }

    #[test]
    fn test_parse_marker_error_status_is_not_success() {
        let stdout = marker_line(500, b"boom");
        let outcome = parse_marker_output(&stdout).unwrap().unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status_code, 500);
    }

    #[test]
    fn test_parse_marker_bad_payload_is_result_parse_error() {
        let stdout = format!("{}not json", SANDBOX_RESULT_MARKER);
        let error = parse_marker_output(&stdout).unwrap().unwrap_err();
        assert!(matches!(error, PixelforgeError::ResultParse(_)));

        let stdout = format!(
            "{}{{\"statusCode\":200,\"headers\":{{}},\"body\":\"@@not-base64@@\"}}",
            SANDBOX_RESULT_MARKER
        );
        let error = parse_marker_output(&stdout).unwrap().unwrap_err();
        assert!(matches!(error, PixelforgeError::ResultParse(_)));
    }
}
