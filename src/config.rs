//! Loading `~/.config/dev-report/config.toml` into an immutable [`Config`].
//!
//! ```toml
//! include = ["~/work/*"]
//! exclude = ["~/work/archive/**"]
//! author_emails = ["me@example.com", "me@company.com"]
//! pr_timeout = "45s"
//! ```

use crate::error::ConfigError;
use globset::{Glob, GlobBuilder, GlobMatcher};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PR_TIMEOUT: Duration = Duration::from_secs(30);

/// The file as written by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub author_emails: Vec<String>,
    pub pr_timeout: Option<String>,
}

impl ConfigFile {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("dev-report").join("config.toml"))
    }

    /// A missing file yields the defaults; anything unreadable or malformed is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }
}

/// A compiled include/exclude pattern, kept alongside its source text.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    matcher: GlobMatcher,
}

impl PathPattern {
    pub fn new(raw: &str, home: Option<&Path>) -> Result<Self, ConfigError> {
        let expanded = expand_home(raw, home);
        let glob: Glob = GlobBuilder::new(&expanded)
            .literal_separator(true)
            .build()
            .map_err(|source| ConfigError::Pattern {
                pattern: raw.to_string(),
                source,
            })?;
        Ok(Self {
            raw: raw.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_match(&self, path: &Path) -> bool {
        self.matcher.is_match(path)
    }
}

/// Run configuration, fixed once the pipeline starts.
#[derive(Debug, Clone)]
pub struct Config {
    pub include_patterns: Vec<PathPattern>,
    pub exclude_patterns: Vec<PathPattern>,
    pub author_emails: BTreeSet<String>,
    pub pr_timeout: Duration,
}

impl Config {
    /// Compiles the file's patterns and folds the operator's identity email into the author set.
    pub fn from_file(file: ConfigFile, identity_email: Option<&str>) -> Result<Self, ConfigError> {
        let home = dirs::home_dir();
        Self::build(file, identity_email, home.as_deref())
    }

    pub fn build(
        file: ConfigFile,
        identity_email: Option<&str>,
        home: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        // Discovered repositories are canonical paths, so `~` must be too.
        let home = home.map(|h| h.canonicalize().unwrap_or_else(|_| h.to_path_buf()));
        let home = home.as_deref();
        let include_patterns = file
            .include
            .iter()
            .map(|p| PathPattern::new(p, home))
            .collect::<Result<Vec<_>, _>>()?;
        let exclude_patterns = file
            .exclude
            .iter()
            .map(|p| PathPattern::new(p, home))
            .collect::<Result<Vec<_>, _>>()?;

        let author_emails: BTreeSet<String> = file
            .author_emails
            .iter()
            .map(String::as_str)
            .chain(identity_email)
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .collect();
        if author_emails.is_empty() {
            return Err(ConfigError::NoIdentity);
        }

        let pr_timeout = match file.pr_timeout {
            Some(value) => humantime::parse_duration(&value)
                .map_err(|source| ConfigError::Duration { value, source })?,
            None => DEFAULT_PR_TIMEOUT,
        };

        Ok(Self {
            include_patterns,
            exclude_patterns,
            author_emails,
            pr_timeout,
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Expands a leading `~` to `home`. Other occurrences are left alone.
pub fn expand_home(pattern: &str, home: Option<&Path>) -> String {
    let Some(home) = home else {
        return pattern.to_string();
    };
    if pattern == "~" {
        return home.to_string_lossy().into_owned();
    }
    match pattern.strip_prefix("~/") {
        Some(rest) => home.join(rest).to_string_lossy().into_owned(),
        None => pattern.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn home() -> PathBuf {
        PathBuf::from("/home/dev")
    }

    #[test]
    fn parses_all_fields() {
        let file = ConfigFile::parse(
            r#"
include = ["~/work/*"]
exclude = ["**/vendor/**"]
author_emails = ["Me@Example.com"]
pr_timeout = "10s"
"#,
            Path::new("config.toml"),
        )
        .unwrap();
        assert_eq!(
            file,
            ConfigFile {
                include: vec!["~/work/*".into()],
                exclude: vec!["**/vendor/**".into()],
                author_emails: vec!["Me@Example.com".into()],
                pr_timeout: Some("10s".into()),
            }
        );
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(file, ConfigFile::default());
    }

    #[test]
    fn malformed_file_is_error() {
        let err = ConfigFile::parse("include = [", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_field_is_error() {
        let err = ConfigFile::parse("includes = []", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn identity_email_always_included() {
        let file = ConfigFile {
            author_emails: vec!["Work@Corp.com".into()],
            ..Default::default()
        };
        let config = Config::build(file, Some("me@home.org"), Some(&home())).unwrap();
        let emails: Vec<_> = config.author_emails.iter().cloned().collect();
        assert_eq!(emails, vec!["me@home.org".to_string(), "work@corp.com".to_string()]);
    }

    #[test]
    fn no_email_anywhere_is_error() {
        let err = Config::build(ConfigFile::default(), None, Some(&home())).unwrap_err();
        assert!(matches!(err, ConfigError::NoIdentity));
    }

    #[test]
    fn tilde_expands_in_patterns() {
        let file = ConfigFile {
            include: vec!["~/work/*".into()],
            ..Default::default()
        };
        let config = Config::build(file, Some("me@home.org"), Some(&home())).unwrap();
        let pattern = &config.include_patterns[0];
        assert!(pattern.is_match(Path::new("/home/dev/work/a")));
        assert!(!pattern.is_match(Path::new("/home/dev/personal/b")));
        assert!(!pattern.is_match(Path::new("/home/dev/work/a/nested")));
    }

    #[test]
    fn invalid_glob_is_error() {
        let file = ConfigFile {
            exclude: vec!["[".into()],
            ..Default::default()
        };
        let err = Config::build(file, Some("me@home.org"), Some(&home())).unwrap_err();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn pr_timeout_defaults_and_parses() {
        let config = Config::build(ConfigFile::default(), Some("a@b.c"), None).unwrap();
        assert_eq!(config.pr_timeout, DEFAULT_PR_TIMEOUT);

        let file = ConfigFile {
            pr_timeout: Some("2m".into()),
            ..Default::default()
        };
        let config = Config::build(file, Some("a@b.c"), None).unwrap();
        assert_eq!(config.pr_timeout, Duration::from_secs(120));
    }
}
