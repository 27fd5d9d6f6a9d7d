use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::error::ExternalsError;
use crate::common::result::{ExternalsResult, IoResultExt, OptionExt};
use crate::domain::entities::external::{ActionTaken, ExternalEntity, ExternalStatus, PlannedAction};
use crate::domain::entities::repository_state::RepositoryState;
use crate::domain::value_objects::CheckoutTarget;
use crate::infrastructure::scm::{ScmError, ScmErrorKind, ScmOperations, ScmProvider};

/// 実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileMode {
    /// 期待状態へ合わせる
    Sync,
    /// 観測のみ（作業ツリーを変更しない）
    Status,
}

/// 1つの外部リポジトリを観測し、必要なら期待状態へ移す
///
/// 汚れた作業ツリーやVCS管理外のディレクトリには決して書き込まない。
#[derive(Clone)]
pub struct EntityReconciler {
    provider: Arc<dyn ScmProvider>,
    mode: ReconcileMode,
}

impl EntityReconciler {
    /// 新しいReconcilerを作成
    pub fn new(provider: Arc<dyn ScmProvider>, mode: ReconcileMode) -> Self {
        Self { provider, mode }
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    /// エンティティを観測し、同期モードでは行動する
    pub async fn reconcile(&self, mut entity: ExternalEntity) -> ExternalEntity {
        let protocol = entity.entry.protocol;

        // 1. 観測
        if !protocol.has_repository() {
            match observe_directory(&entity.path).await {
                Ok(exists) => {
                    entity.observe(RepositoryState::plain_directory(exists));
                    include_if_installed(&mut entity);
                }
                Err(error) => {
                    entity.observe(RepositoryState::failed(true, false, error.to_string()));
                    entity.fail(ActionTaken::Failed, error);
                    return entity;
                }
            }
            debug!(path = %entity.display_path, status = %entity.status, "observed directory");
            return self.act_without_repository(entity);
        }

        let (scm, target) = match self.adapter_for(&entity) {
            Ok(found) => found,
            Err(error) => {
                entity.observe(RepositoryState::failed(entity.path.exists(), false, error.to_string()));
                entity.fail(ActionTaken::Failed, error);
                return entity;
            }
        };

        entity.observe(scm.probe(&entity.path, &target).await);
        include_if_installed(&mut entity);
        debug!(path = %entity.display_path, status = %entity.status, "probed");

        if let Some(reason) = entity.state.probe_error.clone() {
            let error = ExternalsError::probe_failed(entity.display_path.clone(), reason);
            entity.fail(ActionTaken::None, error);
            return entity;
        }

        if self.mode == ReconcileMode::Status {
            return entity;
        }
        if !entity.included {
            entity.action = ActionTaken::SkippedOptional;
            return entity;
        }

        // 2. 判断と行動
        match entity.status.planned_action(protocol) {
            PlannedAction::Nothing => entity,
            PlannedAction::Refuse => refuse(entity),
            PlannedAction::Clone => self.apply(entity, scm, target, ActionTaken::Cloned).await,
            PlannedAction::Switch => self.apply(entity, scm, target, ActionTaken::Switched).await,
        }
    }

    fn adapter_for(
        &self,
        entity: &ExternalEntity,
    ) -> ExternalsResult<(Arc<dyn ScmOperations>, CheckoutTarget)> {
        let protocol = entity.entry.protocol;
        let target = entity.entry.checkout_target().ok_or_internal_error(format!(
            "entry '{}' has no repository to check out",
            entity.entry.name
        ))?;
        let scm = self
            .provider
            .scm_for(protocol)
            .ok_or_internal_error(format!("no adapter available for protocol {protocol}"))?;
        Ok((scm, target))
    }

    fn act_without_repository(&self, mut entity: ExternalEntity) -> ExternalEntity {
        if self.mode == ReconcileMode::Status {
            return entity;
        }
        if !entity.included {
            entity.action = ActionTaken::SkippedOptional;
            return entity;
        }
        if entity.status == ExternalStatus::Empty {
            let error = ExternalsError::precondition(
                entity.display_path.clone(),
                "externals_only directory does not exist and cannot be created",
                None,
            );
            entity.fail(ActionTaken::Refused, error);
        }
        entity
    }

    async fn apply(
        &self,
        mut entity: ExternalEntity,
        scm: Arc<dyn ScmOperations>,
        target: CheckoutTarget,
        action: ActionTaken,
    ) -> ExternalEntity {
        info!(path = %entity.display_path, target = %target.reference, %action, "updating external");

        if let Err(e) = scm.checkout(&entity.path, &target).await {
            warn!(path = %entity.display_path, error = %e, "update failed");
            if matches!(e, ScmError::NotClean { .. }) {
                entity.status = ExternalStatus::Dirty;
            }
            let taken = match e.kind() {
                ScmErrorKind::Precondition => ActionTaken::Refused,
                ScmErrorKind::Tool => ActionTaken::Failed,
            };
            let error = ExternalsError::from_scm(entity.display_path.clone(), e);
            entity.fail(taken, error);
            return entity;
        }

        // 行動後に再観測する
        entity.observe(scm.probe(&entity.path, &target).await);
        entity.action = action;
        if entity.status != ExternalStatus::InSync {
            let message = format!("still {} after {action}", entity.status);
            let error = ExternalsError::probe_failed(entity.display_path.clone(), message);
            entity.fail(action, error);
        }
        entity
    }
}

/// externals_onlyのディレクトリが存在するか
async fn observe_directory(path: &Path) -> ExternalsResult<bool> {
    match tokio::fs::metadata(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        other => other.map(|meta| meta.is_dir()).with_path("inspect", path),
    }
}

/// 既に存在するoptionalエンティティは必須と同様に扱う
fn include_if_installed(entity: &mut ExternalEntity) {
    if !entity.included && entity.status != ExternalStatus::Empty {
        debug!(path = %entity.display_path, "optional external is installed, including it");
        entity.included = true;
    }
}

fn refuse(mut entity: ExternalEntity) -> ExternalEntity {
    let message = match entity.status {
        ExternalStatus::Dirty => "working copy has local modifications or untracked files",
        ExternalStatus::Unmanaged => "path exists but is not a working copy of the expected repository",
        _ => "external cannot be updated automatically",
    };
    let status_output = entity.state.status_output.clone();
    warn!(path = %entity.display_path, status = %entity.status, "refusing to update");
    let error = ExternalsError::precondition(entity.display_path.clone(), message, status_output);
    entity.fail(ActionTaken::Refused, error);
    entity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ErrorCategory;
    use crate::domain::entities::externals_description::ExternalDescriptionEntry;
    use crate::domain::value_objects::{LocalPath, Protocol, RefDescriptor, RepoRef};
    use crate::infrastructure::scm::scm_interface::MockScmOperations;
    use std::path::PathBuf;

    struct SingleProvider(Arc<dyn ScmOperations>);

    impl ScmProvider for SingleProvider {
        fn scm_for(&self, protocol: Protocol) -> Option<Arc<dyn ScmOperations>> {
            protocol.has_repository().then(|| self.0.clone())
        }
    }

    fn entity_at(path: &Path) -> ExternalEntity {
        let entry = ExternalDescriptionEntry::git(
            "lib",
            LocalPath::parse("lib").unwrap(),
            "/srv/lib.git",
            RepoRef::Tag("v1".into()),
        );
        ExternalEntity::new(entry, path.to_path_buf(), "./lib", 0, PathBuf::from("Externals.cfg"))
    }

    fn reconciler(mock: MockScmOperations, mode: ReconcileMode) -> EntityReconciler {
        EntityReconciler::new(Arc::new(SingleProvider(Arc::new(mock))), mode)
    }

    fn in_sync() -> RepositoryState {
        RepositoryState::managed(true, RefDescriptor::at_revision("abc"), true)
    }

    #[tokio::test]
    async fn test_dirty_working_copy_is_never_touched() {
        let mut mock = MockScmOperations::new();
        mock.expect_probe().returning(|_, _| {
            RepositoryState::managed(false, RefDescriptor::at_revision("abc"), false)
                .with_status_output(" M README\n")
        });
        mock.expect_checkout().never();
        mock.expect_switch_to().never();
        mock.expect_clone_repository().never();

        let entity = reconciler(mock, ReconcileMode::Sync)
            .reconcile(entity_at(Path::new("/tree/lib")))
            .await;
        assert_eq!(entity.status, ExternalStatus::Dirty);
        assert_eq!(entity.action, ActionTaken::Refused);
        let error = entity.error.unwrap();
        assert_eq!(error.category(), ErrorCategory::Precondition);
        assert_eq!(error.status_output(), Some(" M README\n"));
    }

    #[tokio::test]
    async fn test_status_mode_has_no_side_effects() {
        let mut mock = MockScmOperations::new();
        mock.expect_probe()
            .times(1)
            .returning(|_, _| RepositoryState::absent());
        mock.expect_checkout().never();

        let entity = reconciler(mock, ReconcileMode::Status)
            .reconcile(entity_at(Path::new("/tree/lib")))
            .await;
        assert_eq!(entity.status, ExternalStatus::Empty);
        assert_eq!(entity.action, ActionTaken::None);
        assert!(entity.error.is_none());
    }

    #[tokio::test]
    async fn test_empty_path_is_cloned_and_reprobed() {
        let mut mock = MockScmOperations::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_probe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| RepositoryState::absent());
        mock.expect_checkout()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_probe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| in_sync());

        let entity = reconciler(mock, ReconcileMode::Sync)
            .reconcile(entity_at(Path::new("/tree/lib")))
            .await;
        assert_eq!(entity.action, ActionTaken::Cloned);
        assert_eq!(entity.status, ExternalStatus::InSync);
        assert!(entity.error.is_none());
    }

    #[tokio::test]
    async fn test_modified_working_copy_is_switched() {
        let mut mock = MockScmOperations::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_probe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| RepositoryState::managed(true, RefDescriptor::at_revision("old"), false));
        mock.expect_checkout()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_probe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| in_sync());

        let entity = reconciler(mock, ReconcileMode::Sync)
            .reconcile(entity_at(Path::new("/tree/lib")))
            .await;
        assert_eq!(entity.action, ActionTaken::Switched);
        assert_eq!(entity.status, ExternalStatus::InSync);
    }

    #[tokio::test]
    async fn test_switch_failure_is_adapter_error() {
        let mut mock = MockScmOperations::new();
        mock.expect_probe()
            .returning(|_, _| RepositoryState::managed(true, RefDescriptor::at_revision("old"), false));
        mock.expect_checkout()
            .times(1)
            .returning(|_, _| Err(ScmError::command_failed("git fetch", 128, "network down")));

        let entity = reconciler(mock, ReconcileMode::Sync)
            .reconcile(entity_at(Path::new("/tree/lib")))
            .await;
        assert_eq!(entity.status, ExternalStatus::Error);
        assert_eq!(entity.action, ActionTaken::Failed);
        assert_eq!(entity.error.unwrap().category(), ErrorCategory::Adapter);
    }

    #[tokio::test]
    async fn test_dirtied_between_probe_and_switch_is_refused() {
        let mut mock = MockScmOperations::new();
        mock.expect_probe()
            .returning(|_, _| RepositoryState::managed(true, RefDescriptor::at_revision("old"), false));
        mock.expect_checkout().times(1).returning(|path, _| {
            Err(ScmError::NotClean {
                path: path.to_path_buf(),
                status_output: "?? scratch.txt".to_string(),
            })
        });

        let entity = reconciler(mock, ReconcileMode::Sync)
            .reconcile(entity_at(Path::new("/tree/lib")))
            .await;
        assert_eq!(entity.status, ExternalStatus::Dirty);
        assert_eq!(entity.action, ActionTaken::Refused);
        assert_eq!(entity.error.unwrap().status_output(), Some("?? scratch.txt"));
    }

    #[tokio::test]
    async fn test_probe_failure_is_reported_in_status_mode() {
        let mut mock = MockScmOperations::new();
        mock.expect_probe()
            .returning(|_, _| RepositoryState::failed(true, true, "git: not found"));

        let entity = reconciler(mock, ReconcileMode::Status)
            .reconcile(entity_at(Path::new("/tree/lib")))
            .await;
        assert_eq!(entity.status, ExternalStatus::Error);
        assert!(entity.error.unwrap().to_string().contains("git: not found"));
    }

    #[tokio::test]
    async fn test_optional_entity_is_probed_but_skipped() {
        let mut mock = MockScmOperations::new();
        mock.expect_probe()
            .times(1)
            .returning(|_, _| RepositoryState::absent());
        mock.expect_checkout().never();

        let entity = reconciler(mock, ReconcileMode::Sync)
            .reconcile(entity_at(Path::new("/tree/lib")).with_included(false))
            .await;
        assert_eq!(entity.status, ExternalStatus::Empty);
        assert_eq!(entity.action, ActionTaken::SkippedOptional);
    }

    #[tokio::test]
    async fn test_installed_optional_entity_is_updated() {
        let mut seq = mockall::Sequence::new();
        let mut mock = MockScmOperations::new();
        mock.expect_probe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| RepositoryState::managed(true, RefDescriptor::at_revision("abc"), false));
        mock.expect_checkout()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_probe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| in_sync());

        let entity = reconciler(mock, ReconcileMode::Sync)
            .reconcile(entity_at(Path::new("/tree/lib")).with_included(false))
            .await;
        assert!(entity.included);
        assert_eq!(entity.action, ActionTaken::Switched);
        assert_eq!(entity.status, ExternalStatus::InSync);
    }

    #[tokio::test]
    async fn test_missing_externals_only_directory_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = ExternalDescriptionEntry::externals_only(
            "group",
            LocalPath::parse("group").unwrap(),
            "Externals.cfg",
        );
        let entity = ExternalEntity::new(
            entry,
            tmp.path().join("group"),
            "./group",
            0,
            PathBuf::from("Externals.cfg"),
        );

        let entity = reconciler(MockScmOperations::new(), ReconcileMode::Sync)
            .reconcile(entity)
            .await;
        assert_eq!(entity.status, ExternalStatus::Error);
        assert_eq!(entity.action, ActionTaken::Refused);
        assert!(!tmp.path().join("group").exists());
    }
}
