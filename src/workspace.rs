//! Workspace directory management
//!
//! The workspace is a scratch directory shared by every fetch worker. Each
//! repository owns one subdirectory ("slot") named by [`sanitize`]d
//! `<name>_<owner>`, so workers never touch the same path.

use crate::error::{Error, Result};
use crate::types::RepositoryDescriptor;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Replace every character outside `[alphanumeric, '_', '-']` with `_`
///
/// Used for any free text that becomes a path component.
///
/// # Examples
///
/// ```
/// use repo_collector::workspace::sanitize;
///
/// assert_eq!(sanitize("trading bot/python"), "trading_bot_python");
/// assert_eq!(sanitize("a-b_c"), "a-b_c");
/// ```
#[must_use]
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Whether `name` is exactly one normal path component
///
/// Rejects empty names, `.`, `..`, absolute paths and anything with a
/// separator, so `parent.join(name)` always lands directly inside `parent`.
pub(crate) fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Remove a directory tree, logging instead of failing
pub(crate) async fn remove_dir_best_effort(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = tokio::fs::remove_dir_all(path).await {
        warn!(path = %path.display(), error = %e, "failed to remove directory");
    }
}

/// Slot assigned to a descriptor before scheduling
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    /// The descriptor owns this path exclusively
    Owned(PathBuf),
    /// An earlier descriptor already maps to the same sanitized name
    Collision {
        /// The contested path
        path: PathBuf,
        /// Sanitized slot name
        slot: String,
        /// Full name of the descriptor that owns the slot
        claimed_by: String,
    },
}

impl Slot {
    /// Path of the slot, owned or contested
    pub fn path(&self) -> &Path {
        match self {
            Slot::Owned(path) => path,
            Slot::Collision { path, .. } => path,
        }
    }
}

/// The shared scratch directory
#[derive(Clone, Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Wrap an existing directory without touching it
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create `parent/name` fresh, removing any leftovers from a previous run
    ///
    /// `name` must be a single plain component; anything that would resolve
    /// to `parent` itself, one of its ancestors, or an unrelated absolute
    /// path is refused before anything is deleted.
    pub async fn prepare(parent: &Path, name: &str) -> Result<Self> {
        if !is_plain_name(name) {
            return Err(Error::config(
                "workspace.workspace_name",
                format!("refusing to use {name:?} as a workspace directory name"),
            ));
        }
        let root = parent.join(name);
        if root.exists() {
            debug!(path = %root.display(), "removing stale workspace");
            tokio::fs::remove_dir_all(&root).await?;
        }
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the slot a descriptor maps to
    pub fn slot_path(&self, descriptor: &RepositoryDescriptor) -> PathBuf {
        self.root.join(descriptor.slot_name())
    }

    /// Assign slots in descriptor order
    ///
    /// The first descriptor mapping to a sanitized name owns it; later ones
    /// are reported as [`Slot::Collision`] rather than sharing the directory.
    pub fn assign_slots(&self, descriptors: &[RepositoryDescriptor]) -> Vec<Slot> {
        let mut owners: HashMap<String, &str> = HashMap::with_capacity(descriptors.len());

        descriptors
            .iter()
            .map(|descriptor| {
                let slot = descriptor.slot_name();
                let path = self.root.join(&slot);
                match owners.get(&slot) {
                    Some(owner) => {
                        warn!(
                            repo = %descriptor.full_name,
                            claimed_by = %owner,
                            slot = %slot,
                            "sanitized slot name collides with another repository"
                        );
                        Slot::Collision {
                            path,
                            claimed_by: (*owner).to_string(),
                            slot,
                        }
                    }
                    None => {
                        owners.insert(slot, &descriptor.full_name);
                        Slot::Owned(path)
                    }
                }
            })
            .collect()
    }

    /// Remove the workspace and everything in it
    pub async fn teardown(self) {
        remove_dir_best_effort(&self.root).await;
    }
}
