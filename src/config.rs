use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_DATA_FILE: &str = "grades.json";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Where grades are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Postgres { url: String, max_connections: u32 },
    LocalFile(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database_url: Option<String>,
    pub data_file: PathBuf,
    pub max_connections: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: None,
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl Settings {
    /// Reads `DATABASE_URL`, `GRADES_DATA_FILE` and `DB_MAX_CONNECTIONS`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        settings.database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if let Some(path) = lookup("GRADES_DATA_FILE") {
            settings.data_file = PathBuf::from(path);
        }
        if let Some(raw) = lookup("DB_MAX_CONNECTIONS") {
            settings.max_connections = raw
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS must be a positive integer, got '{raw}'"))?;
        }
        Ok(settings)
    }

    /// A configured database wins over the local data file.
    pub fn backend(&self) -> Backend {
        match &self.database_url {
            Some(url) => Backend::Postgres {
                url: url.clone(),
                max_connections: self.max_connections,
            },
            None => Backend::LocalFile(self.data_file.clone()),
        }
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
    fn defaults_to_local_file() {
        let settings = settings(&[]).unwrap();
        assert_eq!(
            settings.backend(),
            Backend::LocalFile(PathBuf::from("grades.json"))
        );
    }

    #[test]
    fn database_url_selects_postgres() {
        let settings = settings(&[
            ("DATABASE_URL", "postgres://localhost/voti"),
            ("DB_MAX_CONNECTIONS", "8"),
        ])
        .unwrap();
        assert_eq!(
            settings.backend(),
            Backend::Postgres {
                url: "postgres://localhost/voti".to_string(),
                max_connections: 8
            }
        );
    }

    #[test]
    fn blank_database_url_is_ignored() {
        let settings = settings(&[("DATABASE_URL", " "), ("GRADES_DATA_FILE", "data/voti.json")])
            .unwrap();
        assert_eq!(
            settings.backend(),
            Backend::LocalFile(PathBuf::from("data/voti.json"))
        );
    }

    #[test]
    fn bad_pool_size_is_an_error() {
        assert!(settings(&[("DB_MAX_CONNECTIONS", "many")]).is_err());
    }
}
