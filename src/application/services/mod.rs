pub mod description_service;
pub mod entity_reconciler;
pub mod source_tree;

pub use description_service::{DescriptionFormat, DescriptionService, ParseOptions};
pub use entity_reconciler::{EntityReconciler, ReconcileMode};
pub use source_tree::{SourceTree, SourceTreeBuilder, TreeProblem};
