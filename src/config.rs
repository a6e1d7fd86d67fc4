use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Tuning knobs for the sync engine. The defaults are tuned to the specific
/// Jira deployment this tool grew up against, not universal constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncTuning {
    /// Number of contiguous candidate ids requested per worklog batch call.
    pub worklog_batch_size: u64,
    /// Id threshold below which an empty worklog batch means "not yet reached
    /// real data" rather than "end of collection".
    pub worklog_low_water_mark: u64,
    /// Consecutive not-found issues tolerated before the scan concludes it
    /// has reached the unallocated frontier.
    pub issue_max_miss_run: u64,
    /// Backward safety margin applied to the changed-since query, to tolerate
    /// clock/indexing skew at the service.
    pub delta_margin_secs: i64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            worklog_batch_size: 999,
            worklog_low_water_mark: 20_000,
            issue_max_miss_run: 2_000,
            delta_margin_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    company: String,
    jira_url: Option<String>,
    jira_user: Option<String>,
    jira_token: Option<String>,
    data_dir: Option<PathBuf>,
    #[serde(default)]
    sync: SyncTuning,
    #[serde(flatten)]
    rest: toml::Table,
}

/// Process configuration, constructed once at startup and passed into the
/// orchestrator. No component reads ambient environment state after this.
#[derive(Debug, Clone)]
pub struct Config {
    pub company: String,
    pub jira_url: Option<String>,
    pub jira_user: Option<String>,
    pub jira_token: Option<String>,
    pub data_dir: PathBuf,
    pub sync: SyncTuning,
    /// Remaining config tables, keyed by rule key ("issues-001", ...).
    rule_tables: toml::Table,
}

impl Config {
    /// Load configuration from the given TOML file, or the default path
    /// (`~/.config/jiramirror/config.toml`) when none is given. Credentials
    /// missing from the file are resolved from `<COMPANY>_JIRA_USER` and
    /// `<COMPANY>_JIRA_TOKEN` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path()?,
        };
        if !path.exists() {
            return Err(Error::Config(format!(
                "configuration file '{}' not found",
                path.display()
            )));
        }
        log::debug!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(&path).map_err(|e| Error::storage(&path, e))?;
        Self::parse(&text)
    }

    /// Parse configuration from TOML text and overlay credentials from the
    /// environment.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        if raw.company.is_empty() {
            return Err(Error::Config("field 'company' must not be empty".into()));
        }

        let data_dir = match raw.data_dir {
            Some(d) => d,
            None => dirs::home_dir()
                .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
                .join(".jiramirror"),
        };

        let env_prefix = raw.company.to_uppercase();
        let jira_user = raw
            .jira_user
            .or_else(|| std::env::var(format!("{env_prefix}_JIRA_USER")).ok());
        let jira_token = raw
            .jira_token
            .or_else(|| std::env::var(format!("{env_prefix}_JIRA_TOKEN")).ok());

        Ok(Self {
            company: raw.company,
            jira_url: raw.jira_url,
            jira_user,
            jira_token,
            data_dir,
            sync: raw.sync,
            rule_tables: raw.rest,
        })
    }

    /// Look up a rule's configuration table by key prefix.
    pub fn rule_table(&self, prefix: &str) -> Option<&toml::Table> {
        self.rule_tables.iter().find_map(|(key, value)| {
            if key.starts_with(prefix) {
                value.as_table()
            } else {
                None
            }
        })
    }

    /// Credentials for the live Jira client, or an error naming what is
    /// missing. Engine tests never call this; they swap the client entirely.
    pub fn jira_credentials(&self) -> Result<(&str, &str, &str)> {
        let url = self
            .jira_url
            .as_deref()
            .ok_or_else(|| Error::Config("jira_url is not set".into()))?;
        let user = self
            .jira_user
            .as_deref()
            .ok_or_else(|| Error::Config("jira_user is not set".into()))?;
        let token = self
            .jira_token
            .as_deref()
            .ok_or_else(|| Error::Config("jira_token is not set".into()))?;
        Ok((url, user, token))
    }
}

fn default_config_path() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| Error::Config("cannot determine config directory".into()))?
        .join("jiramirror")
        .join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cfg = Config::parse("company = \"acme\"").unwrap();
        assert_eq!(cfg.company, "acme");
        assert_eq!(cfg.sync.worklog_batch_size, 999);
        assert_eq!(cfg.sync.worklog_low_water_mark, 20_000);
        assert_eq!(cfg.sync.issue_max_miss_run, 2_000);
        assert_eq!(cfg.sync.delta_margin_secs, 60);
    }

    #[test]
    fn test_parse_missing_company() {
        assert!(Config::parse("jira_url = \"https://x\"").is_err());
        assert!(Config::parse("company = \"\"").is_err());
    }

    #[test]
    fn test_parse_tuning_overrides() {
        let cfg = Config::parse(
            "company = \"acme\"\n\
             [sync]\n\
             worklog_batch_size = 10\n\
             issue_max_miss_run = 5\n",
        )
        .unwrap();
        assert_eq!(cfg.sync.worklog_batch_size, 10);
        assert_eq!(cfg.sync.issue_max_miss_run, 5);
        // Unspecified knobs keep their defaults
        assert_eq!(cfg.sync.worklog_low_water_mark, 20_000);
    }

    #[test]
    fn test_rule_table_prefix_lookup() {
        let cfg = Config::parse(
            "company = \"acme\"\n\
             [issues-001-versions]\n\
             updated_history_depth = \"-30d\"\n",
        )
        .unwrap();
        let table = cfg.rule_table("issues-001").unwrap();
        assert_eq!(
            table.get("updated_history_depth").and_then(|v| v.as_str()),
            Some("-30d")
        );
        assert!(cfg.rule_table("issues-007").is_none());
    }

    #[test]
    fn test_credentials_from_file() {
        let cfg = Config::parse(
            "company = \"acme\"\n\
             jira_url = \"https://jira.example.com\"\n\
             jira_user = \"bot\"\n\
             jira_token = \"secret\"\n",
        )
        .unwrap();
        let (url, user, token) = cfg.jira_credentials().unwrap();
        assert_eq!(url, "https://jira.example.com");
        assert_eq!(user, "bot");
        assert_eq!(token, "secret");
    }
}
