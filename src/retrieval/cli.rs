//! Retrieval through the external git binary

use super::traits::Retriever;
use crate::config::FetchConfig;
use crate::error::{Error, FetchError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Retriever that shells out to `git clone`
///
/// The child runs with `GIT_TERMINAL_PROMPT=0` and a null stdin so a missing
/// or rejected credential fails immediately instead of waiting for input.
/// The child is killed when the retrieval future is dropped.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary_path: PathBuf,
}

impl GitCli {
    /// Create a retriever with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find git in PATH
    pub fn from_path() -> Option<Self> {
        which::which("git").ok().map(Self::new)
    }

    /// Resolve the binary from config, falling back to PATH discovery
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        match &config.git_path {
            Some(path) => Ok(Self::new(path.clone())),
            None => Self::from_path().ok_or_else(|| {
                Error::NotSupported(
                    "git executable not found in PATH. Install git or set fetch.git_path."
                        .into(),
                )
            }),
        }
    }

    /// Path of the binary this retriever runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Run `git --version` to confirm the binary is usable
    pub async fn version(&self) -> Result<String> {
        let output = Command::new(&self.binary_path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                Error::NotSupported(format!(
                    "failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(Error::NotSupported(format!(
                "{} --version exited with {}",
                self.binary_path.display(),
                output.status
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Retriever for GitCli {
    async fn retrieve(
        &self,
        url: &str,
        dest: &Path,
        depth: u32,
    ) -> std::result::Result<(), FetchError> {
        debug!(dest = %dest.display(), depth, "running git clone");

        let output = Command::new(&self.binary_path)
            .arg("clone")
            .arg("--quiet")
            .arg("--depth")
            .arg(depth.to_string())
            .arg(url)
            .arg(dest)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| FetchError::Spawn {
                program: self.binary_path.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(FetchError::ExitStatus {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn name(&self) -> &'static str {
        "git-cli"
    }
}
