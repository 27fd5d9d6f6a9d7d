use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use super::entity_reconciler::{EntityReconciler, ReconcileMode};
use crate::common::error::{ConfigError, ErrorCategory};
use crate::domain::entities::external::{ExternalEntity, ExternalStatus};
use crate::domain::entities::externals_description::{
    ExternalDescriptionEntry, ExternalsDescription,
};
use crate::domain::value_objects::local_path::display_relative;
use crate::infrastructure::filesystem::DescriptionStore;

/// エンティティに紐づかない、ツリー構築時の問題
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeProblem {
    /// 問題の分類
    pub category: ErrorCategory,

    /// 問題のあったエントリ名
    pub name: String,

    /// ルートからの表示用パス
    pub local_path: String,

    /// エントリを宣言した記述ファイル
    pub description_file: PathBuf,

    /// 必須エントリに関する問題か
    pub required: bool,

    /// 人間向けメッセージ
    pub message: String,
}

/// 解決済みのソースツリー
///
/// エンティティは幅優先（深さ順、同じ深さでは宣言順）に並ぶ。
#[derive(Debug)]
pub struct SourceTree {
    /// ルート記述ファイルのディレクトリ
    pub root_dir: PathBuf,

    /// 観測・同期済みのエンティティ
    pub entities: Vec<ExternalEntity>,

    /// 衝突・循環・ネスト記述の問題
    pub problems: Vec<TreeProblem>,
}

impl SourceTree {
    /// 表示対象のエンティティ（standaloneを除く）
    pub fn reported(&self) -> impl Iterator<Item = &ExternalEntity> {
        self.entities.iter().filter(|e| !e.is_standalone())
    }

    /// 表示用パスでエンティティを検索
    pub fn find(&self, display_path: &str) -> Option<&ExternalEntity> {
        self.entities
            .iter()
            .find(|e| !e.is_standalone() && e.display_path == display_path)
    }
}

/// ルート記述から幅優先でソースツリーを構築する
///
/// 各深さのエンティティは観測（同期モードでは更新）され、InSyncになった
/// エンティティのネスト記述だけが次の深さとして読み込まれる。
pub struct SourceTreeBuilder {
    store: DescriptionStore,
    reconciler: EntityReconciler,
    include_optional: bool,
    jobs: usize,
}

impl SourceTreeBuilder {
    /// 新しいビルダーを作成
    pub fn new(store: DescriptionStore, reconciler: EntityReconciler) -> Self {
        Self {
            store,
            reconciler,
            include_optional: false,
            jobs: 1,
        }
    }

    /// optionalエントリも処理対象にするか
    pub fn with_include_optional(mut self, include_optional: bool) -> Self {
        self.include_optional = include_optional;
        self
    }

    /// 同じ深さで同時に処理するエンティティ数
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// ツリーを構築する
    pub async fn build(&self, root: ExternalsDescription) -> SourceTree {
        let root_dir = root.base_dir().to_path_buf();
        let mut entities = Vec::new();
        let mut problems = Vec::new();
        let mut claims: HashMap<PathBuf, String> = HashMap::new();
        let mut visited: HashSet<PathBuf> = HashSet::from([root.source.clone()]);
        let mut level = vec![(root, 0usize)];

        while !level.is_empty() {
            // 1. この深さのエンティティを宣言順に集め、パスを確保する
            let mut batch = Vec::new();
            for (description, depth) in level {
                let base = description.base_dir().to_path_buf();
                let source = description.source.clone();
                for entry in description.entries {
                    if depth > 0 && entry.toplevel_only {
                        debug!(name = %entry.name, file = %source.display(), "top-level-only entry in a nested description, skipping");
                        continue;
                    }
                    let path = entry.local_path.resolve(&base);
                    let display_path = display_relative(&path, &root_dir);
                    if !path.starts_with(&root_dir) {
                        warn!(path = %display_path, "path outside the source tree");
                        problems.push(problem(
                            ErrorCategory::Collision,
                            &entry,
                            &display_path,
                            &source,
                            format!("{display_path} is outside the top-level directory"),
                        ));
                        continue;
                    }
                    if !entry.is_standalone() {
                        if let Some(owner) = claims.get(&path) {
                            warn!(path = %display_path, owner = %owner, "path already claimed");
                            problems.push(problem(
                                ErrorCategory::Collision,
                                &entry,
                                &display_path,
                                &source,
                                format!("{display_path} is already claimed by {owner}"),
                            ));
                            continue;
                        }
                        claims.insert(path.clone(), format!("{} ({})", entry.name, source.display()));
                    }
                    let included = entry.required || self.include_optional;
                    batch.push(
                        ExternalEntity::new(entry, path, display_path, depth, source.clone())
                            .with_included(included),
                    );
                }
            }

            // 2. 観測と同期
            let resolved = self.resolve_batch(batch).await;

            // 3. InSyncになったエンティティのネスト記述を次の深さとして読む
            let mut next = Vec::new();
            for entity in &resolved {
                if !self.should_descend(entity) {
                    continue;
                }
                let Some(nested) = entity.nested_description_path() else {
                    continue;
                };
                if entity.entry.nested_if_present && !self.store.is_file(&nested).await {
                    continue;
                }
                match self.load_nested(&nested, &mut visited).await {
                    Ok(Some(description)) => next.push((description, entity.depth + 1)),
                    Ok(None) => {
                        warn!(path = %entity.display_path, file = %nested.display(), "description cycle");
                        problems.push(problem(
                            ErrorCategory::Config,
                            &entity.entry,
                            &entity.display_path,
                            &entity.description_file,
                            format!("{} was already read; descriptions form a cycle", nested.display()),
                        ));
                    }
                    Err(e) => {
                        warn!(path = %entity.display_path, error = %e, "nested description unusable");
                        problems.push(problem(
                            ErrorCategory::Config,
                            &entity.entry,
                            &entity.display_path,
                            &entity.description_file,
                            e.to_string(),
                        ));
                    }
                }
            }

            entities.extend(resolved);
            level = next;
        }

        SourceTree {
            root_dir,
            entities,
            problems,
        }
    }

    fn should_descend(&self, entity: &ExternalEntity) -> bool {
        entity.status == ExternalStatus::InSync
            && (entity.included || self.reconciler.mode() == ReconcileMode::Status)
    }

    /// `None` when the file was already read on this run.
    async fn load_nested(
        &self,
        path: &Path,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<Option<ExternalsDescription>, ConfigError> {
        let source = self.store.locate(path).await?;
        if !visited.insert(source.clone()) {
            return Ok(None);
        }
        debug!(file = %source.display(), "reading nested description");
        self.store.read(&source).await.map(Some)
    }

    async fn resolve_batch(&self, batch: Vec<ExternalEntity>) -> Vec<ExternalEntity> {
        if has_nested_paths(&batch) {
            return self.resolve_parents_first(batch).await;
        }
        if self.jobs <= 1 || batch.len() <= 1 {
            let mut out = Vec::with_capacity(batch.len());
            for entity in batch {
                out.push(self.reconciler.reconcile(entity).await);
            }
            return out;
        }
        // buffered keeps declaration order in the output
        stream::iter(batch.into_iter().map(|entity| self.reconciler.reconcile(entity)))
            .buffered(self.jobs)
            .collect()
            .await
    }
}

impl SourceTreeBuilder {
    /// 祖先を子孫より先に処理し、結果は宣言順で返す
    async fn resolve_parents_first(&self, batch: Vec<ExternalEntity>) -> Vec<ExternalEntity> {
        let mut order: Vec<usize> = (0..batch.len()).collect();
        order.sort_by_key(|&i| batch[i].path.components().count());

        let mut slots: Vec<Option<ExternalEntity>> = batch.into_iter().map(Some).collect();
        let mut resolved: Vec<Option<ExternalEntity>> = (0..slots.len()).map(|_| None).collect();
        for i in order {
            if let Some(entity) = slots[i].take() {
                resolved[i] = Some(self.reconciler.reconcile(entity).await);
            }
        }
        resolved.into_iter().flatten().collect()
    }
}

/// 同じ深さに祖先・子孫関係のパスがあるか
fn has_nested_paths(batch: &[ExternalEntity]) -> bool {
    let paths: Vec<&Path> = batch
        .iter()
        .filter(|e| !e.is_standalone())
        .map(|e| e.path.as_path())
        .collect();
    paths.iter().enumerate().any(|(i, a)| {
        paths
            .iter()
            .enumerate()
            .any(|(j, b)| i != j && b.starts_with(a))
    })
}

fn problem(
    category: ErrorCategory,
    entry: &ExternalDescriptionEntry,
    display_path: &str,
    description_file: &Path,
    message: String,
) -> TreeProblem {
    TreeProblem {
        category,
        name: entry.name.clone(),
        local_path: display_path.to_string(),
        description_file: description_file.to_path_buf(),
        required: entry.required,
        message,
    }
}
