//! Connection settings and the thin write interface the pipelines use.

use log::info;
use postgres::types::ToSql;
use postgres::{Client, Config, NoTls, Transaction};

use crate::error::{ImportError, Result};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;

/// Where to connect, resolved from `DATABASE_URL` or the `DB_*` variables.
#[derive(Clone)]
pub enum DbConfig {
    Url(String),
    Params {
        dbname: String,
        user: String,
        password: Option<String>,
        host: String,
        port: u16,
    },
}

impl DbConfig {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        check_dotenv(dotenvy::dotenv())?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("DATABASE_URL") {
            return Ok(DbConfig::Url(url));
        }

        let dbname = get("DB_NAME").ok_or_else(|| {
            ImportError::Config("DB_NAME or DATABASE_URL must be set".to_string())
        })?;
        let user = get("DB_USER")
            .ok_or_else(|| ImportError::Config("DB_USER must be set".to_string()))?;
        let port = match get("DB_PORT") {
            Some(port) => port.trim().parse::<u16>().map_err(|_| {
                ImportError::Config(format!("DB_PORT '{port}' is not a valid port"))
            })?,
            None => DEFAULT_PORT,
        };

        Ok(DbConfig::Params {
            dbname,
            user,
            password: get("DB_PASSWORD"),
            host: get("DB_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
        })
    }

    /// Connection target without credentials, for logs.
    pub fn describe(&self) -> String {
        match self {
            DbConfig::Url(_) => "DATABASE_URL".to_string(),
            DbConfig::Params {
                dbname,
                user,
                host,
                port,
                ..
            } => format!("{user}@{host}:{port}/{dbname}"),
        }
    }

    fn to_config(&self) -> Result<Config> {
        match self {
            DbConfig::Url(url) => url
                .parse::<Config>()
                .map_err(|e| ImportError::Config(format!("DATABASE_URL: {e}"))),
            DbConfig::Params {
                dbname,
                user,
                password,
                host,
                port,
            } => {
                let mut config = Config::new();
                config.dbname(dbname).user(user).host(host).port(*port);
                if let Some(password) = password {
                    config.password(password);
                }
                Ok(config)
            }
        }
    }

    /// Opens the run's single connection. It closes when the `Client` drops.
    pub fn connect(&self) -> Result<Client> {
        info!("Connecting to {}", self.describe());
        self.to_config()?
            .connect(NoTls)
            .map_err(ImportError::Connection)
    }
}

/// A missing `.env` is fine; one that exists but does not parse is not.
fn check_dotenv<T>(loaded: std::result::Result<T, dotenvy::Error>) -> Result<()> {
    match loaded {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ImportError::Config(format!(".env: {e}"))),
    }
}

/// Statement execution as the pipelines need it.
pub trait Sink {
    /// Runs a write and returns the number of affected rows.
    fn execute(&mut self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64>;

    /// Runs a statement returning exactly one row with an integer `id`.
    fn query_id(&mut self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<i32>;
}

impl Sink for Client {
    fn execute(&mut self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        Client::execute(self, statement, params).map_err(ImportError::from_query)
    }

    fn query_id(&mut self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<i32> {
        let row = self
            .query_one(statement, params)
            .map_err(ImportError::from_query)?;
        row.try_get(0).map_err(ImportError::from_query)
    }
}

impl Sink for Transaction<'_> {
    fn execute(&mut self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        Transaction::execute(self, statement, params).map_err(ImportError::from_query)
    }

    fn query_id(&mut self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<i32> {
        let row = self
            .query_one(statement, params)
            .map_err(ImportError::from_query)?;
        row.try_get(0).map_err(ImportError::from_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn url_takes_precedence() {
        let config = DbConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://u:p@db/gis"),
            ("DB_NAME", "ignored"),
        ]))
        .unwrap();
        assert!(matches!(config, DbConfig::Url(ref url) if url == "postgres://u:p@db/gis"));
        assert_eq!(config.describe(), "DATABASE_URL");
        assert!(config.to_config().is_ok());
    }

    #[test]
    fn params_with_defaults() {
        let config = DbConfig::from_lookup(lookup(&[
            ("DB_NAME", "postgis_demo"),
            ("DB_USER", "postgres"),
            ("DB_PASSWORD", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.describe(), "postgres@localhost:5432/postgis_demo");
        assert!(!config.describe().contains("secret"));
    }

    #[test]
    fn missing_name_is_config_error() {
        let err = DbConfig::from_lookup(lookup(&[("DB_USER", "postgres")])).err().unwrap();
        assert!(matches!(err, ImportError::Config(_)));
    }

    #[test]
    fn bad_port_is_rejected() {
        let result = DbConfig::from_lookup(lookup(&[
            ("DB_NAME", "gis"),
            ("DB_USER", "postgres"),
            ("DB_PORT", "54x2"),
        ]));
        assert!(matches!(result, Err(ImportError::Config(_))));
    }

    #[test]
    fn absent_env_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = dotenvy::from_path(dir.path().join(".env"));
        assert!(check_dotenv(loaded).is_ok());
    }

    #[test]
    fn unparsable_env_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "GEOJSON_IMPORTER_BROKEN=\"unterminated\n").unwrap();
        let err = check_dotenv(dotenvy::from_path(&path)).err().unwrap();
        assert!(matches!(err, ImportError::Config(ref msg) if msg.starts_with(".env:")));
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = DbConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "  "),
            ("DB_NAME", "gis"),
            ("DB_USER", "postgres"),
            ("DB_HOST", ""),
        ]))
        .unwrap();
        assert_eq!(config.describe(), "postgres@localhost:5432/gis");
    }
}
