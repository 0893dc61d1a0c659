//! Fetch task: materialize one repository into its workspace slot
//!
//! A task is isolated from every other task. Whatever happens inside it ends
//! up as a [`FetchOutcome`]; nothing propagates to the caller as an error.
//!
//! Steps for one descriptor:
//! 1. Skip if the slot already exists (no retrieval is attempted)
//! 2. Inject the credential into the clone URL when it targets the forge
//! 3. Run the retrieval under a hard timeout, racing run cancellation
//! 4. On success strip `.git`; on any failure remove the partial slot

use crate::config::FetchConfig;
use crate::error::FetchError;
use crate::retrieval::Retriever;
use crate::types::{Credential, FetchOutcome, FetchStatus, RepositoryDescriptor, SkipReason};
use crate::workspace::{Workspace, remove_dir_best_effort};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};


/// Name of the version-control metadata directory removed after cloning
const METADATA_DIR: &str = ".git";

/// Rewrite a clone URL so the credential is presented inline
///
/// The token becomes the userinfo of the URL authority, once. URLs that do
/// not start with `auth_prefix`, that cannot be parsed, or that are used
/// without a credential are returned unchanged.
///
/// # Examples
///
/// ```
/// use repo_collector::fetch::authenticated_url;
/// use repo_collector::types::Credential;
///
/// let token = Credential::new("ghp_abc");
/// assert_eq!(
///     authenticated_url("https://github.com/o/r.git", token.as_ref(), "https://github.com/"),
///     "https://ghp_abc@github.com/o/r.git"
/// );
/// assert_eq!(
///     authenticated_url("https://gitlab.com/o/r.git", token.as_ref(), "https://github.com/"),
///     "https://gitlab.com/o/r.git"
/// );
/// ```
pub fn authenticated_url(
    clone_url: &str,
    credential: Option<&Credential>,
    auth_prefix: &str,
) -> String {
    let Some(credential) = credential else {
        return clone_url.to_string();
    };
    if !clone_url.starts_with(auth_prefix) {
        return clone_url.to_string();
    }

    match url::Url::parse(clone_url) {
        Ok(mut parsed) => {
            if parsed.set_username(credential.expose()).is_err() {
                return clone_url.to_string();
            }
            parsed.to_string()
        }
        Err(e) => {
            debug!(error = %e, "clone URL is not parseable, using it unmodified");
            clone_url.to_string()
        }
    }
}

/// Runs fetch tasks with a shared retriever, config and credential
#[derive(Clone)]
pub struct FetchTask {
    retriever: Arc<dyn Retriever>,
    config: Arc<FetchConfig>,
    credential: Option<Credential>,
}

impl FetchTask {
    /// Create a task runner
    pub fn new(
        retriever: Arc<dyn Retriever>,
        config: FetchConfig,
        credential: Option<Credential>,
    ) -> Self {
        Self {
            retriever,
            config: Arc::new(config),
            credential,
        }
    }

    /// Fetch one descriptor into its slot under `workspace`
    pub async fn fetch(
        &self,
        descriptor: &RepositoryDescriptor,
        workspace: &Workspace,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        self.fetch_into(descriptor, workspace.slot_path(descriptor), cancel)
            .await
    }

    /// Fetch one descriptor into an explicit target directory
    pub async fn fetch_into(
        &self,
        descriptor: &RepositoryDescriptor,
        target: PathBuf,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let status = self.run(descriptor, &target, cancel).await;
        FetchOutcome {
            descriptor: descriptor.clone(),
            status,
            target,
        }
    }

    async fn run(
        &self,
        descriptor: &RepositoryDescriptor,
        target: &Path,
        cancel: &CancellationToken,
    ) -> FetchStatus {
        if target.exists() {
            debug!(repo = %descriptor.full_name, "target already exists, skipping");
            return FetchStatus::Skipped(SkipReason::AlreadyExists);
        }

        match self.retrieve(descriptor, target, cancel).await {
            Ok(()) => {
                if self.config.strip_metadata {
                    strip_metadata(target).await;
                }
                debug!(repo = %descriptor.full_name, "fetch complete");
                FetchStatus::Success
            }
            Err(e) => {
                remove_dir_best_effort(target).await;
                let reason = self.redact(&e.to_string());
                warn!(repo = %descriptor.full_name, error = %reason, "fetch failed");
                FetchStatus::Failed(reason)
            }
        }
    }

    async fn retrieve(
        &self,
        descriptor: &RepositoryDescriptor,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        let url = authenticated_url(
            &descriptor.clone_url,
            self.credential.as_ref(),
            &self.config.auth_url_prefix,
        );
        let timeout = self.config.clone_timeout;
        let transfer = self.retriever.retrieve(&url, target, self.config.depth);

        // Dropping the transfer future kills the child process.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = tokio::time::timeout(timeout, transfer) => match result {
                Ok(inner) => inner,
                Err(_) => Err(FetchError::Timeout { timeout }),
            },
        }
    }

    /// Remove the credential from text that may echo the clone URL
    fn redact(&self, text: &str) -> String {
        let Some(credential) = &self.credential else {
            return text.to_string();
        };
        let mut redacted = text.replace(credential.expose(), "***");
        // git echoes the URL, where the token appears percent-encoded
        if let Some(encoded) = encoded_userinfo(credential.expose()) {
            redacted = redacted.replace(&encoded, "***");
        }
        redacted
    }
}

/// `secret` as it appears in the userinfo of a URL, when that differs from the raw text
fn encoded_userinfo(secret: &str) -> Option<String> {
    let mut parsed = url::Url::parse("https://host/").ok()?;
    parsed.set_username(secret).ok()?;
    let encoded = parsed.username();
    (encoded != secret && !encoded.is_empty()).then(|| encoded.to_string())
}

/// Delete version-control metadata; failures are ignored
async fn strip_metadata(target: &Path) {
    let metadata = target.join(METADATA_DIR);
    if metadata.exists() && tokio::fs::remove_dir_all(&metadata).await.is_err() {
        debug!(path = %metadata.display(), "could not remove metadata directory");
    }
}
