pub mod reconcile_externals;

pub use reconcile_externals::{
    EntityReport, ErrorDetail, ReconcileConfig, ReconcileExternalsError,
    ReconcileExternalsUseCase, ReconcileReport,
};
