pub mod description_store;

pub use description_store::{DescriptionStore, DEFAULT_DESCRIPTION_FILE};
