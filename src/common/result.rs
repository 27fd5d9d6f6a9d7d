use std::path::Path;

use crate::common::error::ExternalsError;

/// プロジェクト全体で使用するResult型のエイリアス
///
/// # Examples
///
/// ```
/// use manage_externals::common::result::ExternalsResult;
/// use manage_externals::common::error::ExternalsError;
///
/// fn example_with_error() -> ExternalsResult<()> {
///     Err(ExternalsError::internal_error("Something went wrong"))
/// }
/// assert!(example_with_error().is_err());
/// ```
pub type ExternalsResult<T> = Result<T, ExternalsError>;

/// I/Oエラーにパス情報を付与するヘルパー
pub trait IoResultExt<T> {
    /// `std::io::Result` をパス付きの `ExternalsResult` に変換する
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use manage_externals::common::result::IoResultExt;
    ///
    /// let result = std::fs::read_to_string("/definitely/not/here")
    ///     .with_path("read description", Path::new("/definitely/not/here"));
    /// assert!(result.is_err());
    /// ```
    fn with_path(self, action: &str, path: &Path) -> ExternalsResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, action: &str, path: &Path) -> ExternalsResult<T> {
        self.map_err(|e| {
            ExternalsError::filesystem_error_with_source(
                format!("failed to {} {}: {}", action, path.display(), e),
                Some(path.to_path_buf()),
                e,
            )
        })
    }
}

/// Optionのエラー変換ヘルパー
pub trait OptionExt<T> {
    /// Noneの場合は内部エラーに変換する
    fn ok_or_internal_error(self, message: impl Into<String>) -> ExternalsResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_internal_error(self, message: impl Into<String>) -> ExternalsResult<T> {
        self.ok_or_else(|| ExternalsError::internal_error(message))
    }
}
