//! # manage-externals - keep a source tree in line with its externals
//!
//! `checkout_externals` reads a declarative description of the external
//! repositories a source tree depends on and makes the tree match it:
//! missing externals are cloned, clean ones are switched to the declared
//! tag, branch or hash, and anything with local changes is left alone and
//! reported.
//!
//! ## Quick Start
//!
//! 1. Describe the externals in `Externals.cfg` at the root of the tree:
//!
//! ```text
//! [externals_description]
//! schema_version = 1.1.0
//!
//! [lib]
//! protocol = git
//! repo_url = https://github.com/example/lib.git
//! tag = v1.0
//! local_path = components/lib
//! required = True
//! externals = Externals_LIB.cfg
//! ```
//!
//! 2. Check out everything, including externals declared by externals:
//!
//! ```bash
//! checkout_externals
//! ```
//!
//! 3. See where the tree stands without changing it:
//!
//! ```bash
//! checkout_externals status -v
//! ```
//!
//! ## Architecture
//!
//! - [`domain`]: entities, value objects and the state classification rules
//! - [`application`]: description parsing, per-entity reconciliation, the source tree walk
//! - [`infrastructure`]: git/svn adapters, subprocess execution, description files on disk
//! - [`presentation`]: CLI and status report rendering
//! - [`common`]: error types, result alias and logging setup
//!
//! ## Domain Model
//!
//! - [`domain::entities::ExternalsDescription`]: one parsed description file
//! - [`domain::entities::ExternalEntity`]: one external inside a reconciliation run
//! - [`domain::entities::RepositoryState`]: what an adapter observed on disk
//! - [`domain::entities::ExternalStatus`]: `empty`, `unmanaged`, `in-sync`, `modified`, `dirty` or `error`
//!
//! ## Using the Library
//!
//! ```rust,no_run
//! use manage_externals::application::use_cases::reconcile_externals::{
//!     ReconcileConfig, ReconcileExternalsUseCase, ReconcileMode,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ReconcileConfig::new("/path/to/tree").with_mode(ReconcileMode::Status);
//! let report = ReconcileExternalsUseCase::new(config).execute().await?;
//!
//! for entity in report.reported() {
//!     println!("{} {}", entity.status, entity.local_path);
//! }
//! std::process::exit(report.exit_code());
//! # }
//! ```

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// Re-export commonly used types for convenience
pub use crate::common::error::{ConfigError, ExternalsError};
pub use crate::common::result::ExternalsResult as Result;
