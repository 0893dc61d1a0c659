//! Repository retrieval backends
//!
//! A [`Retriever`] materializes one clone URL into one destination directory.
//! Fetch tasks own the policy around it (timeouts, rollback, metadata
//! cleanup); retrievers only run the transfer.
//!
//! - [`GitCli`]: runs the external `git` binary
//!
//! ## Usage
//!
//! ```no_run
//! use repo_collector::retrieval::{GitCli, Retriever};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let git = GitCli::from_path().expect("git not found in PATH");
//!     git.retrieve("https://github.com/rust-lang/log.git", Path::new("log"), 1)
//!         .await?;
//!     Ok(())
//! }
//! ```

mod cli;
mod traits;

pub use cli::GitCli;
pub use traits::Retriever;
