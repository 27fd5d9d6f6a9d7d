/// Version control adapters.
///
/// Git and Subversion are driven through their command line tools; every
/// call is a subprocess with an explicit working directory and timeout.
pub mod git_scm;
pub mod scm_factory;
pub mod scm_interface;
pub mod svn_scm;

pub use scm_factory::{Scm, ScmFactory, ScmOptions, ScmProvider};
pub use scm_interface::{ScmError, ScmErrorKind, ScmOperations};
