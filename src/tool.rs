//! External manifest apply/delete tool
//!
//! The deployers never shell out directly; they go through [`ManifestTool`],
//! which [`Kubectl`] implements by running `kubectl apply|delete -k`.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::config::DeployConfig;

/// Error type for tool invocations
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0} not found in PATH")]
    NotFound(String),

    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: stdout={stdout:?} stderr={stderr:?}")]
    Failed {
        command: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("{command} timed out after {timeout:?}")]
    TimedOut { command: String, timeout: Duration },
}

/// Captured output of a successful run
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Applies or deletes the resources of a kustomize directory on a cluster
#[async_trait]
pub trait ManifestTool: Send + Sync {
    /// Apply `dir` into `namespace` on the cluster behind `context`
    async fn apply(&self, dir: &Path, namespace: &str, context: &str)
        -> Result<ToolOutput, ToolError>;

    /// Delete the resources of `dir`; missing resources are not an error
    async fn delete(&self, dir: &Path, namespace: &str, context: &str)
        -> Result<ToolOutput, ToolError>;

    /// Tool name for display
    fn name(&self) -> &'static str;
}

/// `kubectl` with a wall-clock bound on every invocation
#[derive(Debug, Clone)]
pub struct Kubectl {
    binary: String,
    timeout: Duration,
}

impl Kubectl {
    pub fn new() -> Self {
        Self {
            binary: "kubectl".to_string(),
            timeout: Duration::from_secs(300),
        }
    }

    /// Binary and timeout from `config`
    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            binary: config.kubectl.clone(),
            timeout: config.tool_timeout,
        }
    }

    /// Use a different binary (path or name on `PATH`)
    #[must_use]
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments for `verb` on a kustomize directory
    pub(crate) fn args(&self, verb: &str, dir: &Path, namespace: &str, context: &str) -> Vec<String> {
        let mut args = vec![
            verb.to_string(),
            "-k".to_string(),
            dir.display().to_string(),
            "-n".to_string(),
            namespace.to_string(),
            "--context".to_string(),
            context.to_string(),
            format!("--timeout={}s", self.timeout_secs()),
        ];

        if verb == "delete" {
            args.push("--ignore-not-found=true".to_string());
        }

        args
    }

    /// Whole seconds for kubectl, rounded up so it never reads as "no bound"
    fn timeout_secs(&self) -> u64 {
        let secs = self.timeout.as_secs();
        if self.timeout.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<ToolOutput, ToolError> {
        let command = format!("{} {}", self.binary, args.join(" "));
        debug!(command = %command, "Running manifest tool");

        let child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ToolError::NotFound(self.binary.clone())
                } else {
                    ToolError::Spawn {
                        command: command.clone(),
                        source: e,
                    }
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ToolError::Spawn {
                command: command.clone(),
                source,
            })?,
            Err(_) => {
                warn!(command = %command, timeout = ?self.timeout, "Manifest tool timed out");
                return Err(ToolError::TimedOut {
                    command,
                    timeout: self.timeout,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            return Err(ToolError::Failed {
                command,
                status: output.status.to_string(),
                stdout,
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

impl Default for Kubectl {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ManifestTool for Kubectl {
    #[instrument(skip(self), fields(dir = %dir.display(), tool = "kubectl"))]
    async fn apply(
        &self,
        dir: &Path,
        namespace: &str,
        context: &str,
    ) -> Result<ToolOutput, ToolError> {
        let output = self.run(self.args("apply", dir, namespace, context)).await?;
        info!("Applied kustomization");
        Ok(output)
    }

    #[instrument(skip(self), fields(dir = %dir.display(), tool = "kubectl"))]
    async fn delete(
        &self,
        dir: &Path,
        namespace: &str,
        context: &str,
    ) -> Result<ToolOutput, ToolError> {
        let output = self.run(self.args("delete", dir, namespace, context)).await?;
        info!("Deleted kustomization");
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "kubectl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_delete_args_ignore_not_found() {
        let kubectl = Kubectl::new();
        let args = kubectl.args("delete", Path::new("/tmp/stage"), "busybox", "dr1");

        assert_eq!(
            args,
            vec![
                "delete",
                "-k",
                "/tmp/stage",
                "-n",
                "busybox",
                "--context",
                "dr1",
                "--timeout=300s",
                "--ignore-not-found=true",
            ]
        );
    }

    #[test]
    fn test_apply_args_do_not_ignore_not_found() {
        let kubectl = Kubectl::new().timeout(Duration::from_secs(60));
        let args = kubectl.args("apply", Path::new("/tmp/stage"), "busybox", "dr1");

        assert_eq!(args[0], "apply");
        assert!(args.contains(&"--timeout=60s".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--ignore-not-found")));
    }

    #[test]
    fn test_sub_second_timeout_rounds_up() {
        let kubectl = Kubectl::new().timeout(Duration::from_millis(500));
        let args = kubectl.args("delete", Path::new("/tmp/stage"), "busybox", "dr1");
        assert!(args.contains(&"--timeout=1s".to_string()), "got: {args:?}");

        let kubectl = Kubectl::new().timeout(Duration::from_millis(2500));
        let args = kubectl.args("apply", Path::new("/tmp/stage"), "busybox", "dr1");
        assert!(args.contains(&"--timeout=3s".to_string()), "got: {args:?}");
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let kubectl = Kubectl::new().binary("fleetstage-no-such-kubectl");
        let err = kubectl
            .apply(Path::new("/tmp"), "ns", "ctx")
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::NotFound(_)), "got: {err}");
    }

    #[cfg(unix)]
    fn fake_kubectl(dir: &TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("kubectl");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_success_captures_stdout() {
        let bin = TempDir::new().unwrap();
        let kubectl = Kubectl::new().binary(fake_kubectl(&bin, "echo \"$@\"").display().to_string());

        let out = kubectl
            .apply(Path::new("/stage"), "busybox", "dr1")
            .await
            .unwrap();

        assert!(out.stdout.contains("apply -k /stage -n busybox --context dr1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_carries_both_streams() {
        let bin = TempDir::new().unwrap();
        let script = "echo partial; echo 'error: no objects passed' >&2; exit 1";
        let kubectl = Kubectl::new().binary(fake_kubectl(&bin, script).display().to_string());

        let err = kubectl
            .delete(Path::new("/stage"), "busybox", "dr1")
            .await
            .unwrap_err();

        match err {
            ToolError::Failed { stdout, stderr, .. } => {
                assert!(stdout.contains("partial"));
                assert!(stderr.contains("no objects passed"));
            }
            other => panic!("expected Failed, got {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_is_a_failure() {
        let bin = TempDir::new().unwrap();
        let kubectl = Kubectl::new()
            .binary(fake_kubectl(&bin, "sleep 5").display().to_string())
            .timeout(Duration::from_millis(200));

        let err = kubectl
            .apply(Path::new("/stage"), "busybox", "dr1")
            .await
            .unwrap_err();

        assert!(matches!(err, ToolError::TimedOut { .. }), "got: {err}");
    }
}
