/// Infrastructure layer modules
///
/// This layer provides concrete implementations for external system interactions:
/// - SCM adapters (Git, SVN)
/// - Description files on disk
/// - Process execution with timeouts
pub mod filesystem;
pub mod process;
pub mod scm;

// Re-export commonly used types
pub use filesystem::DescriptionStore;
pub use process::CommandExecutor;
pub use scm::{ScmError, ScmFactory, ScmOperations, ScmProvider};
