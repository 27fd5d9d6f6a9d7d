use crate::domain::value_objects::{
    local_path::LocalPath,
    protocol::Protocol,
    repo_ref::{CheckoutTarget, RepoRef},
    schema_version::SchemaVersion,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// 外部リポジトリ記述ファイルの1エントリ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalDescriptionEntry {
    /// エントリ名（ファイル内で一意）
    pub name: String,

    /// 記述ファイルのディレクトリからの相対パス
    pub local_path: LocalPath,

    /// 取得方法
    pub protocol: Protocol,

    /// リポジトリURL（externals_onlyの場合はNone）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,

    /// 固定する参照（tag / branch / hash のいずれか1つ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<RepoRef>,

    /// 必須かどうか（falseの場合はoptional）
    pub required: bool,

    /// ネストされた記述ファイル（local_pathからの相対パス）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_description: Option<String>,

    /// ルート記述でのみ有効なエントリか（ネストされた記述では無視される）
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub toplevel_only: bool,

    /// ネスト記述が存在する場合だけ読み込むか
    #[serde(skip)]
    pub nested_if_present: bool,

    /// 宣言された行番号（分かる場合）
    #[serde(skip)]
    pub line: Option<usize>,
}

impl ExternalDescriptionEntry {
    /// 新しいgitエントリを作成
    pub fn git(name: impl Into<String>, local_path: LocalPath, url: impl Into<String>, reference: RepoRef) -> Self {
        Self {
            name: name.into(),
            local_path,
            protocol: Protocol::Git,
            repo_url: Some(url.into()),
            reference: Some(reference),
            required: true,
            nested_description: None,
            toplevel_only: false,
            nested_if_present: false,
            line: None,
        }
    }

    /// 新しいexternals_onlyエントリを作成
    pub fn externals_only(name: impl Into<String>, local_path: LocalPath, nested: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            local_path,
            protocol: Protocol::ExternalsOnly,
            repo_url: None,
            reference: None,
            required: true,
            nested_description: Some(nested.into()),
            toplevel_only: false,
            nested_if_present: false,
            line: None,
        }
    }

    /// optionalに設定
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// ネストされた記述ファイルを設定
    pub fn with_nested_description(mut self, nested: impl Into<String>) -> Self {
        self.nested_description = Some(nested.into());
        self
    }

    /// チェックアウト対象を取得（リポジトリを持たないエントリはNone）
    pub fn checkout_target(&self) -> Option<CheckoutTarget> {
        match (&self.repo_url, &self.reference) {
            (Some(url), Some(reference)) if self.protocol.has_repository() => {
                Some(CheckoutTarget::new(url.clone(), reference.clone()))
            }
            _ => None,
        }
    }

    /// 記述ファイルのディレクトリ自身を指すエントリか
    pub fn is_standalone(&self) -> bool {
        self.local_path.is_standalone()
    }
}

/// 解析済みの外部リポジトリ記述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalsDescription {
    /// 読み込んだファイル
    pub source: PathBuf,

    /// メモリ上のスキーマバージョン（常に現行版）
    pub schema_version: SchemaVersion,

    /// 読み込み時にアップグレードした場合の元のバージョン
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgraded_from: Option<SchemaVersion>,

    /// 宣言順のエントリ
    pub entries: Vec<ExternalDescriptionEntry>,
}

impl ExternalsDescription {
    /// 新しい記述を作成
    pub fn new(source: impl Into<PathBuf>, entries: Vec<ExternalDescriptionEntry>) -> Self {
        Self {
            source: source.into(),
            schema_version: SchemaVersion::CURRENT,
            upgraded_from: None,
            entries,
        }
    }

    /// エントリのlocal_pathを解決する基準ディレクトリ
    pub fn base_dir(&self) -> &Path {
        self.source.parent().unwrap_or_else(|| Path::new("."))
    }

    /// 名前でエントリを検索
    pub fn find_entry(&self, name: &str) -> Option<&ExternalDescriptionEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
