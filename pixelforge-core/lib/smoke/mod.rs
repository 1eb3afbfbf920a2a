//! Smoke testing of candidate server code before acceptance.
//!
//! The runner composes the static validator and the sandbox engine into an
//! ordered battery of four named checks, short-circuiting after the first
//! fatal failure. A syntax failure aborts everything after it; the remaining
//! checks are reported as not-run rather than silently omitted, so a test
//! result always carries all four names.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    config::SandboxBackendKind,
    sandbox::{SandboxEngine, SandboxRequest},
    validator,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Outcome of a single named check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Whether the check passed
    pub passed: bool,

    /// Human-readable explanation
    pub message: String,
}

/// Result of the full four-check battery, keyed by check name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmokeReport {
    /// Static validation of the source text
    pub syntax: CheckOutcome,

    /// Text-level check for a recognizable handler export
    pub structure: CheckOutcome,

    /// GET probe through the sandbox engine (jailed backend only)
    #[serde(rename = "getEndpoint")]
    pub get_endpoint: CheckOutcome,

    /// Text heuristic for POST-method handling
    #[serde(rename = "postEndpoint")]
    pub post_endpoint: CheckOutcome,
}

/// Runs the fixed check battery against candidate code
pub struct SmokeTestRunner {
    engine: Arc<SandboxEngine>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl CheckOutcome {
    fn passed(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }

    fn not_run() -> Self {
        Self::failed("not run (aborted after syntax failure)")
    }
}

impl SmokeReport {
    /// True when every check in the battery passed.
    pub fn passed(&self) -> bool {
        self.syntax.passed
            && self.structure.passed
            && self.get_endpoint.passed
            && self.post_endpoint.passed
    }
}

impl SmokeTestRunner {
    /// Creates a runner backed by the given engine.
    pub fn new(engine: Arc<SandboxEngine>) -> Self {
        Self { engine }
    }

    /// Runs the four checks in order: syntax, structure, getEndpoint,
    /// postEndpoint.
    pub async fn run(&self, code: &str) -> SmokeReport {
        let syntax = self.check_syntax(code);
        if !syntax.passed {
            return SmokeReport {
                syntax,
                structure: CheckOutcome::not_run(),
                get_endpoint: CheckOutcome::not_run(),
                post_endpoint: CheckOutcome::not_run(),
            };
        }

        let structure = self.check_structure(code);
        let get_endpoint = self.check_get_endpoint(code).await;
        let post_endpoint = self.check_post_endpoint(code);

        SmokeReport {
            syntax,
            structure,
            get_endpoint,
            post_endpoint,
        }
    }

    fn check_syntax(&self, code: &str) -> CheckOutcome {
        let validation = validator::validate(code);
        if validation.valid {
            if validation.warnings.is_empty() {
                CheckOutcome::passed("code passed static validation")
            } else {
                CheckOutcome::passed(format!(
                    "code passed static validation with warnings: {}",
                    validation.warnings.join("; ")
                ))
            }
        } else {
            CheckOutcome::failed(validation.errors.join("; "))
        }
    }

    fn check_structure(&self, code: &str) -> CheckOutcome {
        if code.contains("module.exports") || code.contains("exports.") {
            CheckOutcome::passed("handler export found")
        } else {
            CheckOutcome::failed("no recognizable handler export (module.exports)")
        }
    }

    async fn check_get_endpoint(&self, code: &str) -> CheckOutcome {
        // Only the jailed backend actually executes candidate code here; in
        // development the check passes on structure alone.
        if self.engine.backend_kind() != SandboxBackendKind::Jailed {
            return CheckOutcome::passed("assumed valid, structure-only (unconfined backend)");
        }

        match self.engine.execute(code, &SandboxRequest::get("/")).await {
            Ok(outcome) if outcome.success => {
                CheckOutcome::passed(format!("GET / returned status {}", outcome.status_code))
            }
            Ok(outcome) => {
                CheckOutcome::failed(format!("GET / returned status {}", outcome.status_code))
            }
            Err(e) => CheckOutcome::failed(format!("GET / execution failed: {}", e)),
        }
    }

    fn check_post_endpoint(&self, code: &str) -> CheckOutcome {
        if code.contains("POST") {
            CheckOutcome::passed("POST handling marker found")
        } else {
            CheckOutcome::failed("no POST handling marker found")
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SandboxBackendKind, SandboxSettings};

    const GOOD_HANDLER: &str = r#"
        module.exports = async function handler(req, res) {
            if (req.method === 'GET') {
                res.setHeader('Content-Type', 'application/json');
                res.end(JSON.stringify({ name: 'avatar-server' }));
            } else if (req.method === 'POST') {
                res.end('image-bytes');
            }
        };
    "#;

    fn unconfined_runner() -> SmokeTestRunner {
        let settings = SandboxSettings::builder()
            .backend(SandboxBackendKind::Unconfined)
            .scratch_root(std::env::temp_dir())
            .build();
        SmokeTestRunner::new(Arc::new(SandboxEngine::new(settings).unwrap()))
    }

    #[tokio::test]
    async fn test_good_handler_passes_all_checks() {
        let report = unconfined_runner().run(GOOD_HANDLER).await;
        assert!(report.syntax.passed, "{}", report.syntax.message);
        assert!(report.structure.passed);
        assert!(report.get_endpoint.passed);
        assert!(report.post_endpoint.passed);
        assert!(report.passed());
    }

    #[tokio::test]
    async fn test_get_check_does_not_execute_on_unconfined_backend() {
        let report = unconfined_runner().run(GOOD_HANDLER).await;
        assert!(report.get_endpoint.message.contains("structure-only"));
    }

    #[tokio::test]
    async fn test_syntax_failure_short_circuits_remaining_checks() {
        let report = unconfined_runner()
            .run("module.exports = function(req, res) { eval(x); }")
            .await;

        assert!(!report.syntax.passed);
        assert!(report.structure.message.contains("not run"));
        assert!(report.get_endpoint.message.contains("not run"));
        assert!(report.post_endpoint.message.contains("not run"));
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn test_missing_export_fails_structure_check() {
        let report = unconfined_runner()
            .run("function handler(req, res) { res.end('POST GET'); }")
            .await;

        assert!(report.syntax.passed);
        assert!(!report.structure.passed);
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn test_missing_post_marker_fails_post_check() {
        let report = unconfined_runner()
            .run("module.exports = (req, res) => res.end('GET only');")
            .await;

        assert!(!report.post_endpoint.passed);
    }

    #[test]
    fn test_report_serializes_with_check_names() {
        let report = SmokeReport {
            syntax: CheckOutcome::passed("ok"),
            structure: CheckOutcome::passed("ok"),
            get_endpoint: CheckOutcome::passed("ok"),
            post_endpoint: CheckOutcome::failed("missing"),
        };

        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("syntax").is_some());
        assert!(value.get("getEndpoint").is_some());
        assert!(value.get("postEndpoint").is_some());
        assert_eq!(value["postEndpoint"]["passed"], false);
    }
}
