use std::path::PathBuf;

use anyhow::Context;

use crate::features::CommentPolicy;

pub const DEFAULT_MODEL_PATH: &str = "ml/model.json";
pub const DEFAULT_OUTPUT_DIR: &str = "ml/output";

/// Runtime settings resolved from the environment. CLI flags take precedence
/// over these.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub model_path: PathBuf,
    pub output_dir: PathBuf,
    pub comment_policy: CommentPolicy,
}

impl Settings {
    /// Loads `.env` and `ml/.env` if present, then reads the process
    /// environment.
    pub fn load() -> anyhow::Result<Self> {
        for file in [".env", "ml/.env"] {
            if let Err(err) = dotenvy::from_filename(file) {
                if !err.not_found() {
                    return Err(err).with_context(|| format!("failed to read {file}"));
                }
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let comment_policy = match lookup("COMMENT_POLICY") {
            Some(raw) => raw
                .parse::<CommentPolicy>()
                .map_err(anyhow::Error::msg)
                .context("COMMENT_POLICY is invalid")?,
            None => CommentPolicy::default(),
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            output_dir: lookup("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            comment_policy,
        })
    }

    pub fn require_database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_environment() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(settings.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(settings.comment_policy, CommentPolicy::ExcludeDeleted);
        assert!(settings.require_database_url().is_err());
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = settings(&[
            ("DATABASE_URL", "postgres://localhost/students"),
            ("MODEL_PATH", "/tmp/model.json"),
            ("COMMENT_POLICY", "include-all"),
        ])
        .unwrap();
        assert_eq!(settings.model_path, PathBuf::from("/tmp/model.json"));
        assert_eq!(settings.comment_policy, CommentPolicy::IncludeAll);
        assert_eq!(
            settings.require_database_url().unwrap(),
            "postgres://localhost/students"
        );
    }

    #[test]
    fn rejects_unknown_comment_policy() {
        let err = settings(&[("COMMENT_POLICY", "some")]).unwrap_err();
        assert!(format!("{err:#}").contains("COMMENT_POLICY"));
    }

    #[test]
    fn blank_database_url_is_unset() {
        let settings = settings(&[("DATABASE_URL", "  ")]).unwrap();
        assert!(settings.database_url.is_none());
    }
}
