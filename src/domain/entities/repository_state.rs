use crate::domain::value_objects::repo_ref::RefDescriptor;
use serde::Serialize;

/// HEADの状態
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "state", content = "branch", rename_all = "lowercase")]
pub enum HeadState {
    /// ローカルブランチ上
    Branch(String),
    /// detached HEAD
    Detached,
    /// 判定不能（存在しない等）
    #[default]
    Unknown,
}

/// アダプタが観測した作業ツリーの状態
///
/// 観測結果であり、観測時点以降は保証されない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RepositoryState {
    /// パスが存在するか
    pub exists: bool,

    /// 期待するVCSの管理下にあるか
    pub under_version_control: bool,

    /// ローカル変更・未追跡ファイルがないか
    pub clean: bool,

    /// 現在の参照
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_ref: Option<RefDescriptor>,

    /// 現在の参照が期待値と一致するか
    pub current_ref_matches_expected: bool,

    /// HEADの状態
    pub head: HeadState,

    /// 汚れている場合のVCSの生出力
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_output: Option<String>,

    /// 観測に失敗した場合の理由
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_error: Option<String>,
}

impl RepositoryState {
    /// パスが存在しない
    pub fn absent() -> Self {
        Self::default()
    }

    /// パスは存在するがVCS管理外
    pub fn unmanaged(status_output: impl Into<String>) -> Self {
        Self {
            exists: true,
            status_output: Some(status_output.into()),
            ..Default::default()
        }
    }

    /// VCS管理下の作業ツリー
    pub fn managed(clean: bool, current_ref: RefDescriptor, matches: bool) -> Self {
        let head = match &current_ref.branch {
            Some(branch) => HeadState::Branch(branch.clone()),
            None => HeadState::Detached,
        };
        Self {
            exists: true,
            under_version_control: true,
            clean,
            current_ref: Some(current_ref),
            current_ref_matches_expected: matches,
            head,
            status_output: None,
            probe_error: None,
        }
    }

    /// 観測に失敗した
    pub fn failed(exists: bool, under_version_control: bool, reason: impl Into<String>) -> Self {
        Self {
            exists,
            under_version_control,
            probe_error: Some(reason.into()),
            ..Default::default()
        }
    }

    /// VCSの生出力を設定
    pub fn with_status_output(mut self, output: impl Into<String>) -> Self {
        self.status_output = Some(output.into());
        self
    }

    /// リポジトリを持たない通常ディレクトリ（externals_only用）
    pub fn plain_directory(exists: bool) -> Self {
        Self {
            exists,
            clean: exists,
            current_ref_matches_expected: exists,
            ..Default::default()
        }
    }
}
