use super::externals_description::ExternalDescriptionEntry;
use super::repository_state::RepositoryState;
use crate::common::error::ExternalsError;
use crate::domain::value_objects::protocol::Protocol;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// 外部リポジトリの解決状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExternalStatus {
    /// パスが存在しない
    Empty,
    /// パスは存在するがVCS管理外
    Unmanaged,
    /// 期待する参照にあり、かつクリーン
    InSync,
    /// クリーンだが参照が異なる
    Modified,
    /// ローカル変更・未追跡ファイルがある
    Dirty,
    /// 観測または操作に失敗した
    Error,
}

impl ExternalStatus {
    /// 観測結果から状態を分類する
    ///
    /// 汚れている作業ツリーは参照の一致に関わらず `Dirty`。
    pub fn classify(protocol: Protocol, state: &RepositoryState) -> Self {
        if state.probe_error.is_some() {
            return ExternalStatus::Error;
        }
        if !state.exists {
            return ExternalStatus::Empty;
        }
        if !protocol.has_repository() {
            return ExternalStatus::InSync;
        }
        if !state.under_version_control {
            return ExternalStatus::Unmanaged;
        }
        if !state.clean {
            return ExternalStatus::Dirty;
        }
        if state.current_ref_matches_expected {
            ExternalStatus::InSync
        } else {
            ExternalStatus::Modified
        }
    }

    /// 同期モードで取るべき行動
    pub fn planned_action(&self, protocol: Protocol) -> PlannedAction {
        match self {
            ExternalStatus::Empty if protocol.has_repository() => PlannedAction::Clone,
            ExternalStatus::Empty => PlannedAction::Refuse,
            ExternalStatus::Modified => PlannedAction::Switch,
            ExternalStatus::Dirty | ExternalStatus::Unmanaged => PlannedAction::Refuse,
            ExternalStatus::InSync | ExternalStatus::Error => PlannedAction::Nothing,
        }
    }
}

impl fmt::Display for ExternalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExternalStatus::Empty => "empty",
            ExternalStatus::Unmanaged => "unmanaged",
            ExternalStatus::InSync => "in-sync",
            ExternalStatus::Modified => "modified",
            ExternalStatus::Dirty => "dirty",
            ExternalStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// 状態から導かれる行動
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Nothing,
    Clone,
    Switch,
    /// 手動対応が必要なため触らない
    Refuse,
}

/// 実際に行った行動
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ActionTaken {
    #[default]
    None,
    Cloned,
    Switched,
    /// 前提条件を満たさないため拒否した
    Refused,
    /// 操作が失敗した
    Failed,
    /// optionalのため対象外
    SkippedOptional,
}

impl ActionTaken {
    /// 作業ツリーを変更したか
    pub fn is_mutation(&self) -> bool {
        matches!(self, ActionTaken::Cloned | ActionTaken::Switched)
    }
}

impl fmt::Display for ActionTaken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionTaken::None => "none",
            ActionTaken::Cloned => "cloned",
            ActionTaken::Switched => "switched",
            ActionTaken::Refused => "refused",
            ActionTaken::Failed => "failed",
            ActionTaken::SkippedOptional => "skipped-optional",
        };
        f.write_str(name)
    }
}

/// ソースツリー内の1つの外部リポジトリ
#[derive(Debug)]
pub struct ExternalEntity {
    /// 元になった記述エントリ
    pub entry: ExternalDescriptionEntry,

    /// 解決済みの絶対パス
    pub path: PathBuf,

    /// ルートからの表示用パス（`./lib/sub` 形式）
    pub display_path: String,

    /// ルート記述を0とした深さ
    pub depth: usize,

    /// このエントリを宣言した記述ファイル
    pub description_file: PathBuf,

    /// 今回の実行で処理対象か（optional除外時はfalse）
    pub included: bool,

    /// 最新の観測結果
    pub state: RepositoryState,

    /// 現在の状態
    pub status: ExternalStatus,

    /// 行った行動
    pub action: ActionTaken,

    /// エンティティ単位のエラー
    pub error: Option<ExternalsError>,
}

impl ExternalEntity {
    /// 未観測のエンティティを作成
    pub fn new(
        entry: ExternalDescriptionEntry,
        path: PathBuf,
        display_path: impl Into<String>,
        depth: usize,
        description_file: PathBuf,
    ) -> Self {
        Self {
            entry,
            path,
            display_path: display_path.into(),
            depth,
            description_file,
            included: true,
            state: RepositoryState::absent(),
            status: ExternalStatus::Empty,
            action: ActionTaken::None,
            error: None,
        }
    }

    /// 処理対象かを設定
    pub fn with_included(mut self, included: bool) -> Self {
        self.included = included;
        self
    }

    /// 観測結果を記録し、状態を再分類する
    pub fn observe(&mut self, state: RepositoryState) {
        self.status = ExternalStatus::classify(self.entry.protocol, &state);
        self.state = state;
    }

    /// エラーを記録する
    pub fn fail(&mut self, action: ActionTaken, error: ExternalsError) {
        if !matches!(self.status, ExternalStatus::Dirty | ExternalStatus::Unmanaged) {
            self.status = ExternalStatus::Error;
        }
        self.action = action;
        self.error = Some(error);
    }

    /// ネストされた記述ファイルの絶対パス
    pub fn nested_description_path(&self) -> Option<PathBuf> {
        self.entry
            .nested_description
            .as_ref()
            .map(|nested| self.path.join(nested))
    }

    pub fn is_required(&self) -> bool {
        self.entry.required
    }

    pub fn is_standalone(&self) -> bool {
        self.entry.is_standalone()
    }
}
