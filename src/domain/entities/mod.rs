pub mod external;
pub mod externals_description;
pub mod repository_state;

pub use external::{ActionTaken, ExternalEntity, ExternalStatus, PlannedAction};
pub use externals_description::{ExternalDescriptionEntry, ExternalsDescription};
pub use repository_state::{HeadState, RepositoryState};
