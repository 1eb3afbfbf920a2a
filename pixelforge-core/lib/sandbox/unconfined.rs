//! Development sandbox backend: a plain subprocess per call.
//!
//! This backend provides process isolation and the marker protocol but no
//! OS-level confinement. It exists so the pipeline can run on a developer
//! machine without the isolation tool installed; production deployments use
//! the jailed backend.

use async_trait::async_trait;
use tokio::process::Command;

use crate::{
    config::{SandboxBackendKind, SandboxSettings},
    sandbox::{
        exec::run_to_outcome,
        runner::{self, RUNNER_FILENAME},
        scratch::ScratchDir,
        SandboxBackend, SandboxOutcome, SandboxRequest,
    },
    PixelforgeResult,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Sandbox backend that spawns the runner directly
pub struct UnconfinedBackend {
    settings: SandboxSettings,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl UnconfinedBackend {
    /// Creates the backend with the given settings.
    pub fn new(settings: SandboxSettings) -> Self {
        Self { settings }
    }

    async fn run(
        &self,
        scratch: &ScratchDir,
        code: &str,
        request: &SandboxRequest,
    ) -> PixelforgeResult<SandboxOutcome> {
        runner::stage_call(scratch.path(), code, request).await?;

        let mut command = Command::new(self.settings.get_node_exe());
        command.arg(RUNNER_FILENAME).current_dir(scratch.path());

        run_to_outcome(command, *self.settings.get_timeout()).await
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl SandboxBackend for UnconfinedBackend {
    fn kind(&self) -> SandboxBackendKind {
        SandboxBackendKind::Unconfined
    }

    async fn execute(
        &self,
        code: &str,
        request: &SandboxRequest,
    ) -> PixelforgeResult<SandboxOutcome> {
        let scratch = ScratchDir::create(self.settings.get_scratch_root()).await?;

        // The scratch directory is removed on every exit path: staging
        // failure, spawn failure, timeout, non-zero exit, and success.
        let result = self.run(&scratch, code, request).await;
        scratch.cleanup().await;

        result
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelforgeError;
    use std::time::Duration;

    fn settings_with_exe(root: &std::path::Path, exe: &str, timeout: Duration) -> SandboxSettings {
        SandboxSettings::builder()
            .backend(SandboxBackendKind::Unconfined)
            .scratch_root(root.to_path_buf())
            .node_exe(exe.to_string())
            .timeout(timeout)
            .build()
    }

    fn scratch_is_empty(root: &std::path::Path) -> bool {
        std::fs::read_dir(root).unwrap().count() == 0
    }

    #[tokio::test]
    async fn test_spawn_failure_cleans_scratch() {
        let root = tempfile::tempdir().unwrap();
        let backend = settings_with_exe(
            root.path(),
            "/definitely/not/a/real/binary",
            Duration::from_secs(5),
        );
        let backend = UnconfinedBackend::new(backend);

        let error = backend
            .execute("module.exports = () => {};", &SandboxRequest::get("/"))
            .await
            .unwrap_err();

        assert!(matches!(error, PixelforgeError::Execution { .. }));
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_failed_run_cleans_scratch() {
        let root = tempfile::tempdir().unwrap();
        // `sh runner.js` exits non-zero without printing a marker.
        let backend =
            UnconfinedBackend::new(settings_with_exe(root.path(), "sh", Duration::from_secs(5)));

        let error = backend
            .execute("module.exports = () => {};", &SandboxRequest::get("/"))
            .await
            .unwrap_err();

        assert!(matches!(error, PixelforgeError::Execution { .. }));
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn test_timeout_cleans_scratch() {
        let root = tempfile::tempdir().unwrap();
        // `yes runner.js` writes forever and never exits on its own, so the
        // wall-clock timeout is the only thing that ends the run.
        let backend = UnconfinedBackend::new(settings_with_exe(
            root.path(),
            "yes",
            Duration::from_millis(200),
        ));

        let error = backend
            .execute("module.exports = () => {};", &SandboxRequest::get("/"))
            .await
            .unwrap_err();

        match error {
            PixelforgeError::Execution { message, .. } => assert!(message.contains("timed out")),
            other => panic!("expected execution error, got {}", other),
        }
        assert!(scratch_is_empty(root.path()));
    }
}
