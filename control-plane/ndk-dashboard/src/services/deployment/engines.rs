use k8s_openapi::api::core::v1::{EnvVar, EnvVarSource, SecretKeySelector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::DashboardError;

/// Supported stateful engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    Mysql,
    Postgresql,
    Mongodb,
    Redis,
    Elasticsearch,
    Cassandra,
}

impl AppType {
    pub const ALL: [AppType; 6] = [
        AppType::Mysql,
        AppType::Postgresql,
        AppType::Mongodb,
        AppType::Redis,
        AppType::Elasticsearch,
        AppType::Cassandra,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppType::Mysql => "mysql",
            AppType::Postgresql => "postgresql",
            AppType::Mongodb => "mongodb",
            AppType::Redis => "redis",
            AppType::Elasticsearch => "elasticsearch",
            AppType::Cassandra => "cassandra",
        }
    }

    pub fn mount_path(self) -> &'static str {
        match self {
            AppType::Mysql => "/var/lib/mysql",
            AppType::Postgresql => "/var/lib/postgresql/data",
            AppType::Mongodb => "/data/db",
            AppType::Redis => "/data",
            AppType::Elasticsearch => "/usr/share/elasticsearch/data",
            AppType::Cassandra => "/var/lib/cassandra",
        }
    }

    pub fn is_relational(self) -> bool {
        matches!(self, AppType::Mysql | AppType::Postgresql)
    }

    /// Container environment wired to the credentials Secret.
    pub fn env_vars(self, secret_name: &str, database: Option<&str>) -> Vec<EnvVar> {
        let password = |name: &str| secret_env(name, secret_name, "password");
        let database = database.filter(|d| !d.is_empty());
        match self {
            AppType::Mysql => {
                let mut env = vec![password("MYSQL_ROOT_PASSWORD")];
                if let Some(db) = database {
                    env.push(plain_env("MYSQL_DATABASE", db));
                }
                env
            }
            AppType::Postgresql => {
                let mut env = vec![password("POSTGRES_PASSWORD")];
                if let Some(db) = database {
                    env.push(plain_env("POSTGRES_DB", db));
                }
                env
            }
            AppType::Mongodb => vec![
                plain_env("MONGO_INITDB_ROOT_USERNAME", "admin"),
                password("MONGO_INITDB_ROOT_PASSWORD"),
            ],
            AppType::Redis => vec![password("REDIS_PASSWORD")],
            AppType::Elasticsearch => vec![
                password("ELASTIC_PASSWORD"),
                plain_env("discovery.type", "single-node"),
                plain_env("xpack.security.enabled", "true"),
            ],
            AppType::Cassandra => vec![password("CASSANDRA_PASSWORD")],
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppType {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AppType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                DashboardError::validation(format!("Unsupported application type: {}", s))
            })
    }
}

fn plain_env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    }
}

fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(env: &[EnvVar]) -> Vec<&str> {
        env.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Redis".parse::<AppType>().unwrap(), AppType::Redis);
        assert!("oracle".parse::<AppType>().is_err());
    }

    #[test]
    fn database_name_is_optional() {
        assert_eq!(
            names(&AppType::Mysql.env_vars("s", Some("shop"))),
            ["MYSQL_ROOT_PASSWORD", "MYSQL_DATABASE"]
        );
        assert_eq!(names(&AppType::Postgresql.env_vars("s", None)), ["POSTGRES_PASSWORD"]);
        assert_eq!(names(&AppType::Postgresql.env_vars("s", Some(""))), ["POSTGRES_PASSWORD"]);
    }

    #[test]
    fn password_comes_from_secret() {
        let env = AppType::Redis.env_vars("cache1-credentials", None);
        let sel = env[0]
            .value_from
            .as_ref()
            .and_then(|v| v.secret_key_ref.as_ref())
            .unwrap();
        assert_eq!(sel.name, "cache1-credentials");
        assert_eq!(sel.key, "password");
    }

    #[test]
    fn elasticsearch_single_node() {
        assert_eq!(
            names(&AppType::Elasticsearch.env_vars("s", None)),
            ["ELASTIC_PASSWORD", "discovery.type", "xpack.security.enabled"]
        );
    }
}
