//! # repovault
//!
//! A source-control caching and coordination layer for package-management
//! systems: turns a repository URL into a locally available clone and, on
//! demand, an isolated working copy, while fetching each remote at most
//! once, sharing fetched clones across concurrent lookups, persisting the
//! URL-to-clone mapping across process restarts, recovering from on-disk
//! corruption, and supporting cooperative cancellation.
//!
//! The concrete VCS driver is out of scope here: only the
//! [`RepositoryProvider`](provider::RepositoryProvider) contract is
//! specified, with an in-memory reference implementation
//! ([`memory::MemoryProvider`]) used for testing and the demo CLI.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use repovault::manager::{ObservabilityScope, RepositoryManager, UpdateStrategy};
//! use repovault::memory::MemoryProvider;
//! use repovault::specifier::RepositorySpecifier;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = Arc::new(MemoryProvider::new().with_repo("dummy", vec!["1.0.0".into()]));
//!     let manager = RepositoryManager::new("./state", provider, None, false, None, None).await?;
//!
//!     let handle = manager
//!         .lookup("my-package", RepositorySpecifier::new("dummy"), UpdateStrategy::Never, &ObservabilityScope::new("example"))
//!         .await?;
//!     println!("status: {:?}", handle.status());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod cancellator;
pub mod catalog;
pub mod checkout;
pub mod cli;
pub mod config;
pub mod delegate;
pub mod error;
pub mod handle;
pub mod manager;
pub mod memory;
pub mod provider;
pub mod scheduler;
pub mod specifier;

pub use error::{Result, RepoVaultError};
pub use handle::Handle;
pub use manager::{ObservabilityScope, RepositoryManager, UpdateStrategy};
pub use specifier::RepositorySpecifier;
