use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::security::SecureString;

/// Connection settings for one dashboard repository.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    base_url: String,
    username: String,
    password: SecureString,
    repo_id: String,
    include_tree_map: bool,
}

impl UploadConfig {
    /// Create a new UploadConfig. `base_url` is the REST root, e.g.
    /// `https://cbri.example.org/api`.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        repo_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: SecureString::new(password.into()),
            repo_id: repo_id.into(),
            include_tree_map: false,
        }
    }

    /// Ask the dashboard to build the tree-map view for uploaded measurements.
    pub fn with_include_tree_map(mut self, include: bool) -> Self {
        self.include_tree_map = include;
        self
    }

    /// Check every field, reporting the first one that fails.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.repo_id.trim().is_empty() {
            return Err(invalid("repo_id", "Missing repo id"));
        }
        self.parsed_base_url()?;
        if self.username.is_empty() {
            return Err(invalid("username", "Missing username"));
        }
        if self.password.is_empty() {
            return Err(invalid("password", "Missing password"));
        }
        Ok(())
    }

    /// The base URL parsed and checked to end in `/api`.
    pub fn parsed_base_url(&self) -> ConfigResult<Url> {
        let trimmed = self.base_url.trim();
        if trimmed.is_empty() {
            return Err(invalid("base_url", "Missing CBRI REST API url"));
        }
        if !trimmed.trim_end_matches('/').ends_with("/api") || trimmed.ends_with("//") {
            return Err(invalid(
                "base_url",
                "Incorrectly formatted url must end in '/api'",
            ));
        }
        let url = Url::parse(trimmed).map_err(|e| invalid("base_url", e.to_string()))?;
        if url.cannot_be_a_base() {
            return Err(invalid("base_url", "url cannot carry a path"));
        }
        Ok(url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Get the password.
    ///
    /// # Security
    /// Use `expose()` only to build the login body. Avoid storing or logging it.
    pub fn password(&self) -> &SecureString {
        &self.password
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn include_tree_map(&self) -> bool {
        self.include_tree_map
    }
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

/// Locations of the external analysis tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// The Understand command-line driver (`und`).
    pub und_path: PathBuf,
    /// The Understand Perl interpreter (`uperl`).
    pub uperl_path: PathBuf,
    /// The core-metrics Perl script run by `uperl`.
    pub plugin_path: PathBuf,
}

impl ToolPaths {
    pub fn new(
        und_path: impl AsRef<Path>,
        uperl_path: impl AsRef<Path>,
        plugin_path: impl AsRef<Path>,
    ) -> Self {
        Self {
            und_path: und_path.as_ref().to_path_buf(),
            uperl_path: uperl_path.as_ref().to_path_buf(),
            plugin_path: plugin_path.as_ref().to_path_buf(),
        }
    }
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self::new("und", "uperl", "cbri.pl")
    }
}

/// Source languages the analysis tool can measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Ada,
    C,
    CSharp,
    CPlusPlus,
    Fortran,
    Java,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Ada,
        Language::C,
        Language::CSharp,
        Language::CPlusPlus,
        Language::Fortran,
        Language::Java,
    ];

    /// The name the analysis tool expects after `-languages`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Ada => "Ada",
            Language::C => "C",
            Language::CSharp => "C#",
            Language::CPlusPlus => "C++",
            Language::Fortran => "FORTRAN",
            Language::Java => "Java",
        }
    }

    /// Comma separated list of every supported language.
    pub fn supported() -> String {
        Self::ALL
            .iter()
            .map(Language::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        if wanted.is_empty() {
            return Err(invalid("lang", "Missing lang"));
        }
        Self::ALL
            .into_iter()
            .find(|lang| lang.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnsupportedLanguage {
                supported: Self::supported(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> UploadConfig {
        UploadConfig::new(base_url, "builder", "s3cret", "42")
    }

    #[test]
    fn test_upload_config_defaults() {
        let config = config("https://cbri.example.org/api");

        assert_eq!(config.base_url(), "https://cbri.example.org/api");
        assert_eq!(config.username(), "builder");
        assert_eq!(config.password().expose(), "s3cret");
        assert_eq!(config.repo_id(), "42");
        assert!(!config.include_tree_map());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_password_not_leaked_in_debug() {
        let debug_output = format!("{:?}", config("https://cbri.example.org/api"));

        assert!(!debug_output.contains("s3cret"));
        assert!(debug_output.contains("SecureString(***)"));
    }

    #[test]
    fn test_base_url_must_end_in_api() {
        assert!(config("https://cbri.example.org/api/").validate().is_ok());

        let err = config("https://cbri.example.org/v1").validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                field: "base_url",
                message: "Incorrectly formatted url must end in '/api'".to_string(),
            }
        );

        assert!(config("").validate().is_err());
        assert!(config("not a url/api").validate().is_err());
        assert!(config("https://cbri.example.org/api//").validate().is_err());
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        let err = UploadConfig::new("https://x/api", "", "", "")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "repo_id", .. }));

        let err = UploadConfig::new("https://x/api", "", "pw", "7")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "username", .. }));

        let err = UploadConfig::new("https://x/api", "me", "", "7")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "password", .. }));
    }

    #[test]
    fn test_language_parsing() {
        assert_eq!("Java".parse::<Language>().unwrap(), Language::Java);
        assert_eq!("c++".parse::<Language>().unwrap(), Language::CPlusPlus);
        assert_eq!("C#".parse::<Language>().unwrap(), Language::CSharp);
        assert_eq!(" fortran ".parse::<Language>().unwrap(), Language::Fortran);

        let err = "Rust".parse::<Language>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Language must be one of: Ada, C, C#, C++, FORTRAN, Java"
        );
        assert!("".parse::<Language>().is_err());
    }

    #[test]
    fn test_tool_paths() {
        let tools = ToolPaths::new("/opt/scitools/bin/und", "/opt/scitools/bin/uperl", "core.pl");
        assert_eq!(tools.und_path, PathBuf::from("/opt/scitools/bin/und"));
        assert_eq!(ToolPaths::default().und_path, PathBuf::from("und"));
    }
}
