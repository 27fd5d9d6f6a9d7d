pub mod local_path;
pub mod protocol;
pub mod repo_ref;
pub mod schema_version;

pub use local_path::LocalPath;
pub use protocol::Protocol;
pub use repo_ref::{CheckoutTarget, RefDescriptor, RepoRef};
pub use schema_version::SchemaVersion;
