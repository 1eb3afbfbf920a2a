//! Production sandbox backend: the runner under an OS-level isolation jail.
//!
//! The jail tool (nsjail by default) runs the subprocess as a dedicated
//! unprivileged user inside fresh namespaces: the filesystem is limited to
//! read-only bind mounts plus the writable scratch mount, the network
//! namespace is not shared with the host, and a seccomp policy plus a
//! wall-clock limit bound what the process can do. The tool must be present
//! when the engine is constructed; its absence is a configuration error,
//! never a silent fallback to the unconfined backend.

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
    PixelforgeError, PixelforgeResult,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Mount point of the scratch directory inside the jail
const JAIL_WORKDIR: &str = "/sandbox";

/// Host paths bind-mounted read-only so the runner executable can load
const READ_ONLY_MOUNTS: &[&str] = &["/usr", "/lib", "/lib64", "/bin", "/etc/resolv.conf"];

/// Kafel seccomp policy applied to the jailed subprocess
const SECCOMP_POLICY: &str =
    "POLICY pixelforge { ERRNO(1) { ptrace, process_vm_readv, process_vm_writev, mount } } \
     USE pixelforge DEFAULT ALLOW";

/// Grace added to the jail's own time limit so the host-side timeout fires
/// first and the error is attributed consistently
const JAIL_TIME_GRACE_SECS: u64 = 5;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Sandbox backend that wraps the runner in an isolation jail
#[derive(Debug)]
pub struct JailedBackend {
    settings: SandboxSettings,
    jail_path: std::path::PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl JailedBackend {
    /// Creates the backend, requiring the isolation tool to be present.
    pub fn new(settings: SandboxSettings) -> PixelforgeResult<Self> {
        let jail_path = which::which(settings.get_jail_exe()).map_err(|_| {
            PixelforgeError::Configuration(format!(
                "isolation tool '{}' not found; the jailed sandbox backend requires it",
                settings.get_jail_exe()
            ))
        })?;

        Ok(Self {
            settings,
            jail_path,
        })
    }

    fn build_command(&self, scratch: &ScratchDir) -> Command {
        let mut command = Command::new(&self.jail_path);

        command
            .arg("--mode")
            .arg("o")
            .arg("--quiet")
            .arg("--user")
            .arg(self.settings.get_jail_uid().to_string())
            .arg("--group")
            .arg(self.settings.get_jail_gid().to_string())
            .arg("--time_limit")
            .arg((self.settings.get_timeout().as_secs() + JAIL_TIME_GRACE_SECS).to_string())
            .arg("--disable_proc")
            .arg("--seccomp_string")
            .arg(SECCOMP_POLICY);

        for mount in READ_ONLY_MOUNTS {
            command.arg("--bindmount_ro").arg(mount);
        }

        command
            .arg("--bindmount")
            .arg(format!("{}:{}", scratch.path().display(), JAIL_WORKDIR))
            .arg("--cwd")
            .arg(JAIL_WORKDIR)
            .arg("--")
            .arg(self.settings.get_node_exe())
            .arg(RUNNER_FILENAME);

        command
    }

    async fn run(
        &self,
        scratch: &ScratchDir,
        code: &str,
        request: &SandboxRequest,
    ) -> PixelforgeResult<SandboxOutcome> {
        runner::stage_call(scratch.path(), code, request).await?;

        let command = self.build_command(scratch);

        run_to_outcome(command, *self.settings.get_timeout()).await
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl SandboxBackend for JailedBackend {
    fn kind(&self) -> SandboxBackendKind {
        SandboxBackendKind::Jailed
    }

    async fn execute(
        &self,
        code: &str,
        request: &SandboxRequest,
    ) -> PixelforgeResult<SandboxOutcome> {
        let scratch = ScratchDir::create(self.settings.get_scratch_root()).await?;

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
    use crate::sandbox::SandboxEngine;

    fn jailed_settings(jail_exe: &str) -> SandboxSettings {
        SandboxSettings::builder()
            .backend(SandboxBackendKind::Jailed)
            .scratch_root(std::env::temp_dir())
            .jail_exe(jail_exe.to_string())
            .build()
    }

    #[test]
    fn test_missing_isolation_tool_is_configuration_error() {
        let error = JailedBackend::new(jailed_settings("definitely-not-a-real-jail-tool"))
            .unwrap_err();
        assert!(error.is_configuration());
    }

    #[test]
    fn test_engine_construction_propagates_missing_tool() {
        let error = SandboxEngine::new(jailed_settings("definitely-not-a-real-jail-tool"))
            .unwrap_err();
        assert!(error.is_configuration());
    }

    #[tokio::test]
    async fn test_jail_command_confines_the_runner() {
        // `sh` is always present, letting us inspect the built command line.
        let backend = JailedBackend::new(jailed_settings("sh")).unwrap();

        let scratch = ScratchDir::create(&std::env::temp_dir()).await.unwrap();
        let command = backend.build_command(&scratch);

        let args: Vec<String> = command
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.contains(&"--seccomp_string".to_string()));
        assert!(args.contains(&"--bindmount_ro".to_string()));
        assert!(args.contains(&"--cwd".to_string()));
        assert!(args.iter().any(|a| a.ends_with(":/sandbox")));
        assert_eq!(args.last().unwrap().as_str(), RUNNER_FILENAME);

        scratch.cleanup().await;
    }
}
