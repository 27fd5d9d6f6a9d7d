use crate::common::error::ConfigError;
use crate::domain::entities::externals_description::{
    ExternalDescriptionEntry, ExternalsDescription,
};
use crate::domain::value_objects::{
    local_path::{normalize, LocalPath},
    protocol::Protocol,
    repo_ref::RepoRef,
    schema_version::SchemaVersion,
};
use ini::{Ini, ParseOption};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// 記述ファイルのセクション名（スキーマ情報用）
pub const DESCRIPTION_SECTION: &str = "externals_description";

/// git-fleximodの記述ファイル名
pub const GITMODULES_FILE: &str = ".gitmodules";

/// エントリで使用可能なキー
const ENTRY_KEYS: [&str; 8] = [
    "local_path",
    "protocol",
    "repo_url",
    "tag",
    "branch",
    "hash",
    "required",
    "externals",
];

/// 記述ファイルの形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionFormat {
    /// INI形式（Externals.cfg）
    Cfg,
    /// YAML形式
    Yaml,
    /// git-fleximod形式の `.gitmodules`
    Gitmodules,
}

impl DescriptionFormat {
    /// ファイル名と拡張子から形式を判定（不明な場合はCfg）
    pub fn from_path(path: &Path) -> Self {
        if path.file_name().and_then(|n| n.to_str()) == Some(GITMODULES_FILE) {
            return DescriptionFormat::Gitmodules;
        }
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => DescriptionFormat::Yaml,
            _ => DescriptionFormat::Cfg,
        }
    }
}

/// 解析オプション
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// 同一ファイル内のlocal_path重複をエラーにするか
    pub reject_duplicate_paths: bool,

    /// ローカルURLの `~` と環境変数を展開するか
    pub expand_local_urls: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            reject_duplicate_paths: false,
            expand_local_urls: true,
        }
    }
}

impl ParseOptions {
    /// 重複パスの扱いを設定
    pub fn with_reject_duplicate_paths(mut self, reject: bool) -> Self {
        self.reject_duplicate_paths = reject;
        self
    }

    /// URL展開を設定
    pub fn with_expand_local_urls(mut self, expand: bool) -> Self {
        self.expand_local_urls = expand;
        self
    }
}

#[derive(Debug)]
struct RawField {
    key: String,
    value: String,
    line: Option<usize>,
}

#[derive(Debug)]
struct RawEntry {
    name: String,
    line: Option<usize>,
    fields: Vec<RawField>,
    toplevel_only: bool,
    nested_if_present: bool,
}

impl RawEntry {
    fn get(&self, key: &str) -> Option<&RawField> {
        self.fields
            .iter()
            .find(|f| f.key == key && !f.value.trim().is_empty())
    }
}

#[derive(Debug, Default)]
struct RawDescription {
    schema_version: Option<(String, Option<usize>)>,
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlDescription {
    schema_version: Option<String>,
    #[serde(default)]
    externals: Vec<YamlEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct YamlEntry {
    name: String,
    local_path: Option<String>,
    protocol: Option<String>,
    repo_url: Option<String>,
    tag: Option<String>,
    branch: Option<String>,
    hash: Option<String>,
    required: Option<serde_yaml::Value>,
    externals: Option<String>,
}

/// 外部リポジトリ記述の解析・検証サービス
///
/// ファイルシステムには触れない。読み込みは
/// [`DescriptionStore`](crate::infrastructure::filesystem::description_store::DescriptionStore) が行う。
#[derive(Debug, Clone, Default)]
pub struct DescriptionService {
    options: ParseOptions,
}

impl DescriptionService {
    /// 新しいDescriptionServiceを作成
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    /// 文字列から記述を解析する
    ///
    /// `source` はエラー報告とlocal_path解決の基準に使う。
    pub fn parse_str(
        &self,
        content: &str,
        source: &Path,
        format: DescriptionFormat,
    ) -> Result<ExternalsDescription, ConfigError> {
        let raw = match format {
            DescriptionFormat::Cfg => parse_cfg(content, source)?,
            DescriptionFormat::Yaml => parse_yaml(content, source)?,
            DescriptionFormat::Gitmodules => parse_gitmodules(content, source)?,
        };
        self.build(raw, source)
    }

    fn build(&self, raw: RawDescription, source: &Path) -> Result<ExternalsDescription, ConfigError> {
        // 1. スキーマバージョンの検証
        let (version_text, version_line) = raw.schema_version.ok_or_else(|| {
            ConfigError::new(
                source,
                format!("missing [{DESCRIPTION_SECTION}] section with a schema_version"),
            )
        })?;
        let version: SchemaVersion = version_text
            .parse()
            .map_err(|e| ConfigError::new(source, format!("{e}")).with_line(version_line))?;
        version
            .check_supported()
            .map_err(|e| ConfigError::new(source, format!("{e}")).with_line(version_line))?;

        // 2. エントリの検証
        let base_dir = source.parent().unwrap_or_else(|| Path::new("."));
        let mut names: HashMap<String, Option<usize>> = HashMap::new();
        let mut paths: HashMap<PathBuf, String> = HashMap::new();
        let mut entries = Vec::with_capacity(raw.entries.len());

        for raw_entry in &raw.entries {
            if let Some(first) = names.insert(raw_entry.name.clone(), raw_entry.line) {
                let mut message = format!("duplicate external name '{}'", raw_entry.name);
                if let Some(first) = first {
                    message.push_str(&format!(" (first declared on line {first})"));
                }
                return Err(ConfigError::new(source, message).with_line(raw_entry.line));
            }

            let entry = self.validate_entry(raw_entry, &version, source, base_dir)?;

            // 3. 同一ファイル内のlocal_path重複
            if !entry.is_standalone() {
                let key = entry.local_path.normalized().to_path_buf();
                if let Some(owner) = paths.get(&key) {
                    if self.options.reject_duplicate_paths {
                        return Err(ConfigError::new(
                            source,
                            format!(
                                "local_path '{}' of '{}' is already used by '{}'",
                                entry.local_path, entry.name, owner
                            ),
                        )
                        .with_line(entry.line));
                    }
                    tracing::warn!(
                        file = %source.display(),
                        name = %entry.name,
                        owner = %owner,
                        "duplicate local_path, the first declaration wins"
                    );
                } else {
                    paths.insert(key, entry.name.clone());
                }
            }
            entries.push(entry);
        }

        // 4. 旧スキーマをメモリ上でアップグレード
        let mut description = ExternalsDescription::new(source, entries);
        if version.needs_upgrade() {
            tracing::info!(
                file = %source.display(),
                from = %version,
                to = %SchemaVersion::CURRENT,
                "upgrading description schema in memory"
            );
            description.upgraded_from = Some(version);
        }
        Ok(description)
    }

    fn validate_entry(
        &self,
        raw: &RawEntry,
        version: &SchemaVersion,
        source: &Path,
        base_dir: &Path,
    ) -> Result<ExternalDescriptionEntry, ConfigError> {
        let error_at = |line: Option<usize>, message: String| {
            ConfigError::new(source, message).with_line(line)
        };

        for field in &raw.fields {
            if !ENTRY_KEYS.contains(&field.key.as_str()) {
                return Err(error_at(
                    field.line,
                    format!("unknown item '{}' in external '{}'", field.key, raw.name),
                ));
            }
        }
        if let Some(hash) = raw.get("hash") {
            if !version.supports_hash() {
                return Err(error_at(
                    hash.line,
                    format!("item 'hash' requires schema_version {} or newer", SchemaVersion::CURRENT),
                ));
            }
        }

        let require = |key: &str| {
            raw.get(key).ok_or_else(|| {
                error_at(
                    raw.line,
                    format!("external '{}' is missing required item '{}'", raw.name, key),
                )
            })
        };

        let required_field = require("required")?;
        let required = parse_bool(&required_field.value).ok_or_else(|| {
            error_at(
                required_field.line,
                format!(
                    "'required' must be true or false, found '{}'",
                    required_field.value.trim()
                ),
            )
        })?;

        let path_field = require("local_path")?;
        let local_path = LocalPath::parse(&path_field.value)
            .map_err(|e| error_at(path_field.line, e.to_string()))?;

        let protocol_field = require("protocol")?;
        let protocol: Protocol = protocol_field
            .value
            .parse()
            .map_err(|e: crate::domain::value_objects::protocol::ProtocolError| {
                error_at(protocol_field.line, e.to_string())
            })?;

        let nested_description = match raw.get("externals") {
            Some(field) if !field.value.trim().eq_ignore_ascii_case("none") => {
                let nested = LocalPath::parse(&field.value)
                    .map_err(|e| error_at(field.line, format!("externals: {e}")))?;
                if nested.is_standalone() {
                    return Err(error_at(
                        field.line,
                        "externals must name a description file".to_string(),
                    ));
                }
                Some(nested.as_str().to_string())
            }
            _ => None,
        };

        let mut entry = ExternalDescriptionEntry {
            name: raw.name.clone(),
            local_path,
            protocol,
            repo_url: None,
            reference: None,
            required,
            nested_description,
            toplevel_only: raw.toplevel_only,
            nested_if_present: raw.nested_if_present,
            line: raw.line,
        };

        if !protocol.has_repository() {
            let ignored: Vec<&str> = ["repo_url", "tag", "branch", "hash"]
                .into_iter()
                .filter(|key| raw.get(key).is_some())
                .collect();
            if !ignored.is_empty() {
                tracing::warn!(
                    name = %raw.name,
                    items = ?ignored,
                    "externals_only entry carries repository items, ignoring them"
                );
            }
            return Ok(entry);
        }

        if entry.local_path.is_standalone() {
            return Err(error_at(
                path_field.line,
                format!("local_path '.' is only valid for {} entries", Protocol::ExternalsOnly),
            ));
        }

        let url_field = require("repo_url")?;
        let url = url_field.value.trim();
        entry.repo_url = Some(if self.options.expand_local_urls {
            expand_local_url(url, base_dir)
        } else {
            url.to_string()
        });

        let refs: Vec<RepoRef> = [
            raw.get("tag").map(|f| RepoRef::Tag(f.value.trim().to_string())),
            raw.get("branch").map(|f| RepoRef::Branch(f.value.trim().to_string())),
            raw.get("hash").map(|f| RepoRef::Hash(f.value.trim().to_string())),
        ]
        .into_iter()
        .flatten()
        .collect();
        let reference = match refs.as_slice() {
            [single] => single.clone(),
            [] => {
                return Err(error_at(
                    raw.line,
                    format!("external '{}' must set one of tag, branch or hash", raw.name),
                ))
            }
            _ => {
                return Err(error_at(
                    raw.line,
                    format!(
                        "external '{}' must set only one of tag, branch or hash",
                        raw.name
                    ),
                ))
            }
        };
        if matches!(reference, RepoRef::Hash(_)) && !protocol.supports_hash() {
            return Err(error_at(
                raw.get("hash").and_then(|f| f.line),
                format!("{protocol} externals cannot be pinned to a hash"),
            ));
        }
        entry.reference = Some(reference);
        Ok(entry)
    }
}

/// `true`/`t`/`false`/`f`（大文字小文字を区別しない）
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" => Some(true),
        "false" | "f" => Some(false),
        _ => None,
    }
}

/// INIのセクション（行番号付き）
#[derive(Debug)]
struct IniSection {
    name: String,
    line: Option<usize>,
    fields: Vec<RawField>,
}

/// INI構文を解析してセクションを宣言順に返す
///
/// 構文は `rust-ini` に任せ、行番号は [`LineIndex`] から引く。
/// `fold_case` の場合セクション名を小文字にそろえる。
fn parse_ini_sections(
    content: &str,
    source: &Path,
    fold_case: bool,
) -> Result<Vec<IniSection>, ConfigError> {
    let index = LineIndex::scan(content, fold_case);
    if let Some(line) = index.stray_line {
        return Err(ConfigError::at_line(
            source,
            line,
            "malformed description: expected [section] or 'key = value'",
        ));
    }
    if let Some((name, line, first)) = index.duplicate_section() {
        return Err(ConfigError::at_line(
            source,
            line,
            format!("duplicate section [{name}] (first declared on line {first})"),
        ));
    }

    let options = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let ini = Ini::load_from_str_opt(content, options).map_err(|e| {
        ConfigError::new(source, format!("malformed description: {}", e.msg))
            .with_line(Some(e.line + 1))
    })?;

    let mut sections = Vec::new();
    for (section, properties) in ini.iter() {
        let Some(section) = section else {
            if properties.iter().next().is_some() {
                return Err(ConfigError::new(source, "item appears before any [section] header")
                    .with_line(index.orphan_line));
            }
            continue;
        };
        let name = index.fold(section.trim());
        let header = index.section(&name);

        let mut fields: Vec<RawField> = Vec::new();
        for (key, value) in properties.iter() {
            let key = key.trim().to_lowercase();
            let lines = header.map(|h| h.lines_of(&key)).unwrap_or_default();
            if fields.iter().any(|f| f.key == key) {
                return Err(ConfigError::new(
                    source,
                    format!("item '{key}' given twice in [{name}]"),
                )
                .with_line(lines.get(1).copied()));
            }
            fields.push(RawField {
                key,
                value: value.trim().to_string(),
                line: lines.first().copied(),
            });
        }
        sections.push(IniSection {
            line: header.map(|h| h.line),
            name,
            fields,
        });
    }
    Ok(sections)
}

/// Externals.cfg形式を解析する
fn parse_cfg(content: &str, source: &Path) -> Result<RawDescription, ConfigError> {
    let mut raw = RawDescription::default();
    for section in parse_ini_sections(content, source, true)? {
        if section.name == DESCRIPTION_SECTION {
            if let Some(field) = section.fields.iter().find(|f| f.key != "schema_version") {
                return Err(ConfigError::new(
                    source,
                    format!("unknown item '{}' in [{DESCRIPTION_SECTION}]", field.key),
                )
                .with_line(field.line));
            }
            raw.schema_version = section.fields.into_iter().next().map(|f| (f.value, f.line));
        } else {
            raw.entries.push(RawEntry {
                name: section.name,
                line: section.line,
                fields: section.fields,
                toplevel_only: false,
                nested_if_present: false,
            });
        }
    }
    Ok(raw)
}

/// `fxrequired` の値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FxRequired {
    ToplevelRequired,
    ToplevelOptional,
    AlwaysRequired,
    AlwaysOptional,
}

impl FxRequired {
    const ALL: [FxRequired; 4] = [
        FxRequired::ToplevelRequired,
        FxRequired::ToplevelOptional,
        FxRequired::AlwaysRequired,
        FxRequired::AlwaysOptional,
    ];

    fn as_str(self) -> &'static str {
        match self {
            FxRequired::ToplevelRequired => "ToplevelRequired",
            FxRequired::ToplevelOptional => "ToplevelOptional",
            FxRequired::AlwaysRequired => "AlwaysRequired",
            FxRequired::AlwaysOptional => "AlwaysOptional",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.as_str().eq_ignore_ascii_case(value.trim()))
    }

    fn is_required(self) -> bool {
        matches!(self, FxRequired::ToplevelRequired | FxRequired::AlwaysRequired)
    }

    fn is_toplevel_only(self) -> bool {
        matches!(self, FxRequired::ToplevelRequired | FxRequired::ToplevelOptional)
    }
}

/// git本体が解釈し、ここでは使わない `.gitmodules` の項目
const GIT_SUBMODULE_KEYS: [&str; 5] = ["update", "shallow", "ignore", "fetchrecursesubmodules", "fxdonotuseurl"];

/// `.gitmodules` 形式を解析する
///
/// `[submodule "name"]` ごとに `path`、`url`、`fxtag`、`fxrequired` を読む。
/// スキーマバージョンは持たないため現行版として扱い、各サブモジュールの
/// `.gitmodules` があればネスト記述として読み込む。
fn parse_gitmodules(content: &str, source: &Path) -> Result<RawDescription, ConfigError> {
    let mut raw = RawDescription {
        schema_version: Some((SchemaVersion::CURRENT.to_string(), None)),
        entries: Vec::new(),
    };
    for section in parse_ini_sections(content, source, false)? {
        let name = submodule_name(&section.name).ok_or_else(|| {
            ConfigError::new(
                source,
                format!("expected [submodule \"name\"], found [{}]", section.name),
            )
            .with_line(section.line)
        })?;

        let mut fields = vec![RawField {
            key: "protocol".to_string(),
            value: Protocol::Git.to_string(),
            line: section.line,
        }];
        let mut fx_required = None;
        let mut branch = None;
        for field in section.fields {
            let key = match field.key.as_str() {
                "path" => "local_path",
                "url" => "repo_url",
                "branch" => {
                    branch = Some(field);
                    continue;
                }
                "fxtag" if is_commit_hash(&field.value) => "hash",
                "fxtag" => "tag",
                "fxrequired" => {
                    let value = FxRequired::parse(&field.value).ok_or_else(|| {
                        let allowed: Vec<&str> = FxRequired::ALL.iter().map(|v| v.as_str()).collect();
                        ConfigError::new(
                            source,
                            format!(
                                "fxrequired of '{name}' must be one of {}, found '{}'",
                                allowed.join(", "),
                                field.value
                            ),
                        )
                        .with_line(field.line)
                    })?;
                    fx_required = Some(value);
                    continue;
                }
                "fxsparse" => {
                    return Err(ConfigError::new(
                        source,
                        format!("submodule '{name}': sparse checkouts (fxsparse) are not supported"),
                    )
                    .with_line(field.line))
                }
                key if GIT_SUBMODULE_KEYS.contains(&key) => continue,
                other => {
                    return Err(ConfigError::new(
                        source,
                        format!("unknown item '{other}' in submodule '{name}'"),
                    )
                    .with_line(field.line))
                }
            };
            fields.push(RawField {
                key: key.to_string(),
                ..field
            });
        }
        // fxtagがあればbranchは無視する
        if let Some(branch) = branch.filter(|_| !fields.iter().any(|f| f.key == "tag" || f.key == "hash")) {
            fields.push(branch);
        }
        let fx_required = fx_required.ok_or_else(|| {
            ConfigError::new(source, format!("submodule '{name}' is missing 'fxrequired'"))
                .with_line(section.line)
        })?;
        fields.push(RawField {
            key: "required".to_string(),
            value: fx_required.is_required().to_string(),
            line: None,
        });
        fields.push(RawField {
            key: "externals".to_string(),
            value: GITMODULES_FILE.to_string(),
            line: None,
        });

        raw.entries.push(RawEntry {
            name: name.to_string(),
            line: section.line,
            fields,
            toplevel_only: fx_required.is_toplevel_only(),
            nested_if_present: true,
        });
    }
    Ok(raw)
}

/// `submodule "name"` から名前を取り出す
fn submodule_name(section: &str) -> Option<&str> {
    let rest = section.strip_prefix("submodule")?.trim();
    let name = rest.strip_prefix('"')?.strip_suffix('"')?;
    (!name.is_empty()).then_some(name)
}

/// 7〜40桁の16進数ならコミットハッシュとみなす
fn is_commit_hash(value: &str) -> bool {
    let value = value.trim();
    (7..=40).contains(&value.len()) && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// セクション見出しと項目の行番号（診断用）
#[derive(Debug, Default)]
struct LineIndex {
    fold_case: bool,
    sections: Vec<SectionLines>,
    orphan_line: Option<usize>,
    stray_line: Option<usize>,
}

#[derive(Debug)]
struct SectionLines {
    name: String,
    line: usize,
    items: Vec<(String, usize)>,
}

impl SectionLines {
    fn lines_of(&self, key: &str) -> Vec<usize> {
        self.items
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, line)| *line)
            .collect()
    }
}

impl LineIndex {
    fn scan(content: &str, fold_case: bool) -> Self {
        let mut index = LineIndex {
            fold_case,
            ..LineIndex::default()
        };
        for (i, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(header) = trimmed.strip_prefix('[') {
                let name = header.split(']').next().unwrap_or_default();
                let name = index.fold(name.trim());
                index.sections.push(SectionLines {
                    name,
                    line: i + 1,
                    items: Vec::new(),
                });
                continue;
            }
            let Some(at) = trimmed.find(|c| c == '=' || c == ':') else {
                index.stray_line.get_or_insert(i + 1);
                continue;
            };
            let key = trimmed[..at].trim().to_lowercase();
            match index.sections.last_mut() {
                Some(section) => section.items.push((key, i + 1)),
                None => {
                    index.orphan_line.get_or_insert(i + 1);
                }
            }
        }
        index
    }

    fn fold(&self, name: &str) -> String {
        if self.fold_case {
            name.to_lowercase()
        } else {
            name.to_string()
        }
    }

    fn section(&self, name: &str) -> Option<&SectionLines> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// 2回目に現れたセクション: (名前, 行, 最初の行)
    fn duplicate_section(&self) -> Option<(&str, usize, usize)> {
        self.sections.iter().enumerate().find_map(|(i, later)| {
            self.sections[..i]
                .iter()
                .find(|first| first.name == later.name)
                .map(|first| (later.name.as_str(), later.line, first.line))
        })
    }
}

fn parse_yaml(content: &str, source: &Path) -> Result<RawDescription, ConfigError> {
    let parsed: YamlDescription = serde_yaml::from_str(content).map_err(|e| {
        ConfigError::new(source, format!("invalid YAML: {e}"))
            .with_line(e.location().map(|l| l.line()))
    })?;

    let mut raw = RawDescription {
        schema_version: parsed.schema_version.map(|v| (v, None)),
        entries: Vec::with_capacity(parsed.externals.len()),
    };
    for entry in parsed.externals {
        let mut fields = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                fields.push(RawField {
                    key: key.to_string(),
                    value,
                    line: None,
                });
            }
        };
        let required = match entry.required {
            Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
            Some(serde_yaml::Value::String(s)) => Some(s),
            Some(other) => {
                return Err(ConfigError::new(
                    source,
                    format!(
                        "'required' of external '{}' must be a boolean, found {other:?}",
                        entry.name
                    ),
                ))
            }
            None => None,
        };
        push("local_path", entry.local_path);
        push("protocol", entry.protocol);
        push("repo_url", entry.repo_url);
        push("tag", entry.tag);
        push("branch", entry.branch);
        push("hash", entry.hash);
        push("required", required);
        push("externals", entry.externals);
        raw.entries.push(RawEntry {
            name: entry.name,
            line: None,
            fields,
            toplevel_only: false,
            nested_if_present: false,
        });
    }
    Ok(raw)
}

fn env_var_regex() -> Option<&'static Regex> {
    static ENV_VAR: OnceLock<Option<Regex>> = OnceLock::new();
    ENV_VAR
        .get_or_init(|| Regex::new(r"\$\{(\w+)\}|\$(\w+)").ok())
        .as_ref()
}

fn scp_like_regex() -> Option<&'static Regex> {
    static SCP: OnceLock<Option<Regex>> = OnceLock::new();
    SCP.get_or_init(|| Regex::new(r"^[\w.\-]+@[\w.\-]+:").ok())
        .as_ref()
}

/// Whether `url` names a remote repository rather than a local path.
pub fn is_remote_url(url: &str) -> bool {
    if url.contains("://") && url::Url::parse(url).is_ok() {
        return true;
    }
    scp_like_regex().map(|re| re.is_match(url)).unwrap_or(false)
}

/// Expand `~` and `$VAR`/`${VAR}` in local repository paths.
///
/// Relative results are anchored at `base_dir`. Unset variables are left
/// untouched; `.` and remote URLs pass through unchanged.
pub fn expand_local_url(url: &str, base_dir: &Path) -> String {
    if url == "." || is_remote_url(url) {
        return url.to_string();
    }
    let expanded = match env_var_regex() {
        Some(re) => re
            .replace_all(url, |caps: &regex::Captures<'_>| {
                let name = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str()).unwrap_or("");
                std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
            })
            .into_owned(),
        None => url.to_string(),
    };
    let expanded = match (expanded.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            home.join(rest.trim_start_matches('/')).display().to_string()
        }
        _ => expanded,
    };
    let path = Path::new(&expanded);
    if path.is_relative() {
        normalize(&base_dir.join(path)).display().to_string()
    } else {
        expanded
    }
}
