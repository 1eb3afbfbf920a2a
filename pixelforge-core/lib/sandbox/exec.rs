//! Subprocess supervision shared by both sandbox backends.

use std::{process::Stdio, time::Duration};

use tokio::{process::Command, time};

use crate::{
    sandbox::{parse_marker_output, SandboxOutcome},
    PixelforgeError, PixelforgeResult,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Runs a staged sandbox command to completion and extracts its outcome.
///
/// Enforces the hard wall-clock timeout (kill-on-timeout; there is no
/// cooperative cancellation signal into the running code), captures
/// stdout/stderr, and applies the marker rules: a parsed marker wins; no
/// marker on a non-zero exit is an execution failure carrying stderr; no
/// marker on a zero exit is a distinct result-parse failure.
pub(crate) async fn run_to_outcome(
    mut command: Command,
    timeout: Duration,
) -> PixelforgeResult<SandboxOutcome> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| PixelforgeError::Execution {
        message: format!("failed to spawn sandbox subprocess: {}", e),
        stderr: String::new(),
    })?;

    // Dropping the in-flight wait on timeout kills the child (kill_on_drop).
    let output = match time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(PixelforgeError::Execution {
                message: format!("failed to collect sandbox subprocess output: {}", e),
                stderr: String::new(),
            });
        }
        Err(_) => {
            return Err(PixelforgeError::Execution {
                message: format!("sandbox execution timed out after {:?}", timeout),
                stderr: String::new(),
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    match parse_marker_output(&stdout) {
        Some(result) => result,
        None if output.status.success() => Err(PixelforgeError::ResultParse(
            "subprocess exited cleanly without a result marker".to_string(),
        )),
        None => Err(PixelforgeError::Execution {
            message: format!("sandbox subprocess exited with {}", output.status),
            stderr: stderr.into_owned(),
        }),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{prelude::BASE64_STANDARD, Engine};
    use pixelforge_utils::SANDBOX_RESULT_MARKER;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn test_outcome_round_trips_json_body() {
        let body = serde_json::json!({"width": 64, "height": 64});
        let line = format!(
            "{}{{\"statusCode\":200,\"headers\":{{\"content-type\":\"application/json\"}},\"body\":\"{}\"}}",
            SANDBOX_RESULT_MARKER,
            BASE64_STANDARD.encode(body.to_string())
        );

        let outcome = run_to_outcome(shell(&format!("echo '{}'", line)), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.status_code, 200);
        let parsed: serde_json::Value = serde_json::from_slice(&outcome.body).unwrap();
        assert_eq!(parsed, body);
    }

    #[tokio::test]
    async fn test_timeout_is_execution_failure() {
        let error = run_to_outcome(shell("sleep 5"), Duration::from_millis(100))
            .await
            .unwrap_err();

        match error {
            PixelforgeError::Execution { message, .. } => {
                assert!(message.contains("timed out"));
            }
            other => panic!("expected execution error, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_marker_carries_stderr() {
        let error = run_to_outcome(shell("echo boom >&2; exit 3"), Duration::from_secs(5))
            .await
            .unwrap_err();

        match error {
            PixelforgeError::Execution { stderr, .. } => {
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected execution error, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_clean_exit_without_marker_is_result_parse_error() {
        let error = run_to_outcome(shell("echo all done"), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(error, PixelforgeError::ResultParse(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_execution_error() {
        let error = run_to_outcome(
            Command::new("/definitely/not/a/real/binary"),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        match error {
            PixelforgeError::Execution { message, .. } => {
                assert!(message.contains("spawn"));
            }
            other => panic!("expected execution error, got {}", other),
        }
    }
}
