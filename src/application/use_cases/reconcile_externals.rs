use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::services::description_service::ParseOptions;
use crate::application::services::entity_reconciler::EntityReconciler;
pub use crate::application::services::entity_reconciler::ReconcileMode;
use crate::application::services::source_tree::{SourceTree, SourceTreeBuilder, TreeProblem};
use crate::common::error::{ConfigError, ErrorCategory};
use crate::domain::entities::external::{ActionTaken, ExternalEntity, ExternalStatus};
use crate::domain::entities::externals_description::{
    ExternalDescriptionEntry, ExternalsDescription,
};
use crate::domain::value_objects::Protocol;
use crate::infrastructure::filesystem::description_store::{DescriptionStore, DEFAULT_DESCRIPTION_FILE};
use crate::infrastructure::process::DEFAULT_TIMEOUT;
use crate::infrastructure::scm::{ScmFactory, ScmOptions, ScmProvider};

/// ReconcileExternals関連のエラー
///
/// エンティティ単位の失敗はレポートに含まれ、ここには現れない。
#[derive(Debug, Error)]
pub enum ReconcileExternalsError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 外部リポジトリ同期の設定
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// ルート記述ファイルを探すディレクトリ
    pub root_dir: PathBuf,

    /// ルート記述ファイル（root_dirからの相対、または絶対パス）
    pub description_file: PathBuf,

    /// 実行モード
    pub mode: ReconcileMode,

    /// optionalエントリも処理するか
    pub include_optional: bool,

    /// 同じ深さで並列に処理する数
    pub jobs: usize,

    /// VCSコマンド1回あたりのタイムアウト（Noneの場合は無制限）
    pub timeout: Option<Duration>,

    /// 同一ファイル内のlocal_path重複を設定エラーにするか
    pub strict: bool,

    /// svn switchに--ignore-ancestryを付けるか
    pub svn_ignore_ancestry: bool,

    /// 1つでも汚れていれば何も変更しないか
    pub all_or_nothing: bool,

    /// 処理するトップレベルエントリ名（空の場合はすべて）
    pub components: Vec<String>,

    /// 処理しないトップレベルエントリ名
    pub exclude: Vec<String>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            description_file: PathBuf::from(DEFAULT_DESCRIPTION_FILE),
            mode: ReconcileMode::Sync,
            include_optional: false,
            jobs: 1,
            timeout: Some(DEFAULT_TIMEOUT),
            strict: false,
            svn_ignore_ancestry: false,
            all_or_nothing: false,
            components: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl ReconcileConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_description_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.description_file = file.into();
        self
    }

    pub fn with_mode(mut self, mode: ReconcileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_include_optional(mut self, include_optional: bool) -> Self {
        self.include_optional = include_optional;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_svn_ignore_ancestry(mut self, ignore: bool) -> Self {
        self.svn_ignore_ancestry = ignore;
        self
    }

    pub fn with_all_or_nothing(mut self, all_or_nothing: bool) -> Self {
        self.all_or_nothing = all_or_nothing;
        self
    }

    /// 指定したトップレベルエントリだけを処理する
    pub fn with_components(mut self, components: Vec<String>) -> Self {
        self.components = components;
        self
    }

    pub fn with_exclude(mut self, exclude: Vec<String>) -> Self {
        self.exclude = exclude;
        self
    }

    /// optionalエントリを処理するか（名前で指定した場合も含む）
    pub fn includes_optional(&self) -> bool {
        self.include_optional || !self.components.is_empty()
    }

    /// ルート記述ファイルのパス
    pub fn description_path(&self) -> PathBuf {
        self.root_dir.join(&self.description_file)
    }
}

/// エラーの詳細
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_output: Option<String>,
}

/// 単一エンティティの結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityReport {
    /// エントリ名
    pub name: String,

    /// ルートからの表示用パス
    pub local_path: String,

    pub protocol: Protocol,

    /// 最終状態
    pub status: ExternalStatus,

    /// 行った行動
    pub action: ActionTaken,

    pub required: bool,

    /// optionalのため処理しなかったか
    pub optional_skipped: bool,

    /// 記述ファイルのディレクトリ自身を指すエントリか
    #[serde(skip)]
    pub standalone: bool,

    /// ルート記述を0とした深さ
    pub depth: usize,

    /// 期待する参照
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_ref: Option<String>,

    /// 観測した参照
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_ref: Option<String>,

    /// 汚れている・管理外の場合のVCS出力
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_output: Option<String>,

    /// 参照が期待値と異なるか（dirty時の表示用）
    #[serde(skip)]
    pub ref_differs: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl EntityReport {
    fn from_entity(entity: &ExternalEntity) -> Self {
        let error = entity.error.as_ref().map(|e| ErrorDetail {
            category: e.category(),
            message: e.to_string(),
            status_output: e.status_output().map(str::to_string),
        });
        let status_output = entity
            .state
            .status_output
            .clone()
            .or_else(|| error.as_ref().and_then(|e| e.status_output.clone()));
        Self {
            name: entity.entry.name.clone(),
            local_path: entity.display_path.clone(),
            protocol: entity.entry.protocol,
            status: entity.status,
            action: entity.action,
            required: entity.is_required(),
            optional_skipped: entity.action == ActionTaken::SkippedOptional,
            standalone: entity.is_standalone(),
            depth: entity.depth,
            expected_ref: entity.entry.reference.as_ref().map(|r| r.to_string()),
            current_ref: entity.state.current_ref.as_ref().map(|r| r.to_string()),
            status_output,
            ref_differs: entity.state.under_version_control
                && !entity.state.current_ref_matches_expected,
            error,
        }
    }

    /// 実行全体の成否に影響するか
    pub fn counts_against_success(&self) -> bool {
        self.required && !self.standalone && self.status != ExternalStatus::InSync
    }
}

/// 実行全体の結果
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub mode: ReconcileMode,

    /// all-or-nothingにより変更を行わずに中断したか
    pub aborted: bool,

    /// ルート記述ファイルのディレクトリ
    pub root_dir: PathBuf,

    /// 走査順のエンティティ結果
    pub entities: Vec<EntityReport>,

    /// 衝突・循環・ネスト記述の問題
    pub problems: Vec<TreeProblem>,
}

impl ReconcileReport {
    fn from_tree(mode: ReconcileMode, tree: &SourceTree) -> Self {
        Self {
            mode,
            aborted: false,
            root_dir: tree.root_dir.clone(),
            entities: tree.entities.iter().map(EntityReport::from_entity).collect(),
            problems: tree.problems.clone(),
        }
    }

    /// 表示対象のエンティティ（standaloneを除く）
    pub fn reported(&self) -> impl Iterator<Item = &EntityReport> {
        self.entities.iter().filter(|e| !e.standalone)
    }

    /// 必須エンティティがすべてInSyncで、必須エントリに問題がないか
    pub fn is_success(&self) -> bool {
        !self.aborted
            && !self.entities.iter().any(EntityReport::counts_against_success)
            && !self.problems.iter().any(|p| p.required)
    }

    pub fn exit_code(&self) -> i32 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    /// 作業ツリーを変更したエンティティ数
    pub fn mutation_count(&self) -> usize {
        self.entities.iter().filter(|e| e.action.is_mutation()).count()
    }

    /// 手動対応が必要なエンティティ
    pub fn needs_attention(&self) -> impl Iterator<Item = &EntityReport> {
        self.reported()
            .filter(|e| matches!(e.status, ExternalStatus::Dirty | ExternalStatus::Unmanaged))
    }

    pub fn find(&self, local_path: &str) -> Option<&EntityReport> {
        self.reported().find(|e| e.local_path == local_path)
    }
}

/// 外部リポジトリ同期のユースケース
pub struct ReconcileExternalsUseCase {
    config: ReconcileConfig,
    provider: Arc<dyn ScmProvider>,
}

impl ReconcileExternalsUseCase {
    /// 実際のVCSアダプタを使うユースケースを作成
    pub fn new(config: ReconcileConfig) -> Self {
        let options = ScmOptions::default()
            .with_timeout(config.timeout)
            .with_svn_ignore_ancestry(config.svn_ignore_ancestry);
        Self {
            config,
            provider: Arc::new(ScmFactory::new(options)),
        }
    }

    /// アダプタの供給元を差し替える
    pub fn with_provider(mut self, provider: Arc<dyn ScmProvider>) -> Self {
        self.provider = provider;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// 同期（または状態確認）を実行
    ///
    /// ルート記述の設定エラーのみがErrになる。エンティティ単位の失敗は
    /// レポートに記録され、兄弟エンティティの処理は続行される。
    pub async fn execute(&self) -> Result<ReconcileReport, ReconcileExternalsError> {
        // 1. ルート記述を読む（VCS操作の前に失敗させる）
        let store = DescriptionStore::new(
            ParseOptions::default().with_reject_duplicate_paths(self.config.strict),
        );
        let root = store.read(&self.config.description_path()).await?;
        let root = select_components(root, &self.config.components, &self.config.exclude)?;
        info!(
            file = %root.source.display(),
            entries = root.len(),
            mode = ?self.config.mode,
            "reconciling externals"
        );

        // 2. all-or-nothing: 変更前に全体を観測する
        if self.config.mode == ReconcileMode::Sync && self.config.all_or_nothing {
            let preview = self.build_tree(&store, root.clone(), ReconcileMode::Status).await;
            let blocked = preview.reported().any(|e| {
                e.included && matches!(e.status, ExternalStatus::Dirty | ExternalStatus::Unmanaged)
            });
            if blocked {
                warn!("dirty or unmanaged externals present; nothing was changed");
                let mut report = ReconcileReport::from_tree(ReconcileMode::Status, &preview);
                report.aborted = true;
                return Ok(report);
            }
        }

        // 3. ツリーを構築しながら同期する
        let tree = self.build_tree(&store, root, self.config.mode).await;
        let report = ReconcileReport::from_tree(self.config.mode, &tree);
        info!(
            entities = report.entities.len(),
            mutations = report.mutation_count(),
            problems = report.problems.len(),
            success = report.is_success(),
            "reconciliation finished"
        );
        Ok(report)
    }

    async fn build_tree(
        &self,
        store: &DescriptionStore,
        root: ExternalsDescription,
        mode: ReconcileMode,
    ) -> SourceTree {
        let reconciler = EntityReconciler::new(self.provider.clone(), mode);
        SourceTreeBuilder::new(store.clone(), reconciler)
            .with_include_optional(self.config.includes_optional())
            .with_jobs(self.config.jobs)
            .build(root)
            .await
    }
}

/// 名前で指定されたトップレベルエントリだけを残す
///
/// 名前の比較は大文字小文字を区別しない。存在しない名前は設定エラー。
fn select_components(
    mut root: ExternalsDescription,
    components: &[String],
    exclude: &[String],
) -> Result<ExternalsDescription, ConfigError> {
    let named = |entry: &ExternalDescriptionEntry, names: &[String]| {
        names.iter().any(|n| n.eq_ignore_ascii_case(&entry.name))
    };
    if let Some(unknown) = components
        .iter()
        .chain(exclude)
        .find(|n| !root.entries.iter().any(|e| e.name.eq_ignore_ascii_case(n)))
    {
        return Err(ConfigError::new(
            &root.source,
            format!("no external named '{unknown}'"),
        ));
    }
    root.entries.retain(|entry| {
        (components.is_empty() || named(entry, components)) && !named(entry, exclude)
    });
    if !components.is_empty() || !exclude.is_empty() {
        debug!(
            selected = ?root.entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
            "restricted to named externals"
        );
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::repository_state::RepositoryState;
    use crate::domain::value_objects::RefDescriptor;
    use crate::infrastructure::scm::scm_interface::MockScmOperations;
    use crate::infrastructure::scm::ScmOperations;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct SingleProvider(Arc<dyn ScmOperations>);

    impl ScmProvider for SingleProvider {
        fn scm_for(&self, protocol: Protocol) -> Option<Arc<dyn ScmOperations>> {
            protocol.has_repository().then(|| self.0.clone())
        }
    }

    const DESCRIPTION: &str = "[externals_description]\nschema_version = 1.1.0\n\n\
        [lib]\nprotocol = git\nrepo_url = /srv/lib.git\ntag = v1\nlocal_path = lib\nrequired = True\n\n\
        [docs]\nprotocol = git\nrepo_url = /srv/docs.git\nbranch = main\nlocal_path = docs\nrequired = False\n";

    fn workspace(content: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(DEFAULT_DESCRIPTION_FILE), content).unwrap();
        tmp
    }

    fn use_case(tmp: &TempDir, mock: MockScmOperations, mode: ReconcileMode) -> ReconcileExternalsUseCase {
        ReconcileExternalsUseCase::new(ReconcileConfig::new(tmp.path()).with_mode(mode))
            .with_provider(Arc::new(SingleProvider(Arc::new(mock))))
    }

    #[test]
    fn test_config_builders() {
        let config = ReconcileConfig::new("/tree")
            .with_description_file("Other.cfg")
            .with_jobs(0)
            .with_strict(true);
        assert_eq!(config.description_path(), PathBuf::from("/tree/Other.cfg"));
        assert_eq!(config.jobs, 1);
        assert!(config.strict);
        assert_eq!(config.mode, ReconcileMode::Sync);
    }

    #[tokio::test]
    async fn test_missing_description_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let mut mock = MockScmOperations::new();
        mock.expect_probe().never();
        let err = use_case(&tmp, mock, ReconcileMode::Sync)
            .execute()
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileExternalsError::Config(_)));
    }

    #[tokio::test]
    async fn test_status_reports_without_mutation() {
        let tmp = workspace(DESCRIPTION);
        let mut mock = MockScmOperations::new();
        mock.expect_probe().returning(|_, _| RepositoryState::absent());
        mock.expect_checkout().never();

        let report = use_case(&tmp, mock, ReconcileMode::Status).execute().await.unwrap();
        let statuses: Vec<_> = report.reported().map(|e| (e.local_path.as_str(), e.status)).collect();
        assert_eq!(
            statuses,
            vec![("./lib", ExternalStatus::Empty), ("./docs", ExternalStatus::Empty)]
        );
        assert_eq!(report.mutation_count(), 0);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_sync_skips_optional_and_succeeds() {
        let tmp = workspace(DESCRIPTION);
        let lib = tmp.path().join("lib");
        let mut mock = MockScmOperations::new();
        mock.expect_probe().returning(|path, _| {
            if path.exists() {
                RepositoryState::managed(true, RefDescriptor::at_revision("abc"), true)
            } else {
                RepositoryState::absent()
            }
        });
        mock.expect_checkout().times(1).returning(|path, _| {
            std::fs::create_dir_all(path).unwrap();
            Ok(())
        });

        let report = use_case(&tmp, mock, ReconcileMode::Sync).execute().await.unwrap();
        assert!(lib.exists());
        let lib_report = report.find("./lib").unwrap();
        assert_eq!(lib_report.action, ActionTaken::Cloned);
        assert_eq!(lib_report.status, ExternalStatus::InSync);
        let docs = report.find("./docs").unwrap();
        assert!(docs.optional_skipped);
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_all_or_nothing_aborts_before_any_mutation() {
        let tmp = workspace(DESCRIPTION);
        std::fs::create_dir_all(tmp.path().join("docs")).unwrap();
        let mut mock = MockScmOperations::new();
        mock.expect_probe().returning(|path, _| {
            if path.ends_with("docs") {
                RepositoryState::managed(false, RefDescriptor::at_revision("abc"), true)
                    .with_status_output("?? notes.txt")
            } else {
                RepositoryState::absent()
            }
        });
        mock.expect_checkout().never();

        let config = ReconcileConfig::new(tmp.path())
            .with_include_optional(true)
            .with_all_or_nothing(true);
        let report = ReconcileExternalsUseCase::new(config)
            .with_provider(Arc::new(SingleProvider(Arc::new(mock))))
            .execute()
            .await
            .unwrap();
        assert!(report.aborted);
        assert_eq!(report.needs_attention().count(), 1);
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_named_component_is_processed_even_when_optional() {
        let tmp = workspace(DESCRIPTION);
        let mut mock = MockScmOperations::new();
        mock.expect_probe().returning(|path, _| {
            if path.exists() {
                RepositoryState::managed(true, RefDescriptor::at_revision("abc"), true)
            } else {
                RepositoryState::absent()
            }
        });
        mock.expect_checkout().times(1).returning(|path, target| {
            assert!(path.ends_with("docs"));
            assert_eq!(target.url, "/srv/docs.git");
            std::fs::create_dir_all(path).unwrap();
            Ok(())
        });

        let config = ReconcileConfig::new(tmp.path()).with_components(vec!["DOCS".to_string()]);
        let report = ReconcileExternalsUseCase::new(config)
            .with_provider(Arc::new(SingleProvider(Arc::new(mock))))
            .execute()
            .await
            .unwrap();
        let paths: Vec<_> = report.reported().map(|e| e.local_path.as_str()).collect();
        assert_eq!(paths, vec!["./docs"]);
        assert_eq!(report.find("./docs").unwrap().action, ActionTaken::Cloned);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_excluded_and_unknown_components() {
        let tmp = workspace(DESCRIPTION);
        let mut mock = MockScmOperations::new();
        mock.expect_probe().returning(|_, _| RepositoryState::absent());
        mock.expect_checkout().never();

        let config = ReconcileConfig::new(tmp.path())
            .with_mode(ReconcileMode::Status)
            .with_exclude(vec!["lib".to_string()]);
        let report = ReconcileExternalsUseCase::new(config)
            .with_provider(Arc::new(SingleProvider(Arc::new(mock))))
            .execute()
            .await
            .unwrap();
        assert!(report.find("./lib").is_none());
        assert!(report.find("./docs").is_some());

        let mut mock = MockScmOperations::new();
        mock.expect_probe().never();
        let config = ReconcileConfig::new(tmp.path()).with_components(vec!["cime".to_string()]);
        let err = ReconcileExternalsUseCase::new(config)
            .with_provider(Arc::new(SingleProvider(Arc::new(mock))))
            .execute()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no external named 'cime'"));
    }
}
