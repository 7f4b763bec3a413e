//! Environment-driven configuration.
//!
//! Every setting comes from an environment variable with a default where one
//! makes sense. Missing required variables are collected and reported
//! together; the binary refuses to start on any [`ConfigError`].

use std::fmt;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::extraction::extractor::{DEFAULT_REGION, DEFAULT_RULE_DESCRIPTION};

pub const DEFAULT_AUTH_TYPE: &str = "basic";
pub const DEFAULT_API_KEY_HEADER: &str = "x-sn-apikey";
pub const DEFAULT_AWS_CLI: &str = "aws";
pub const DEFAULT_DATABASE: &str = "dev";
pub const DEFAULT_DB_USER: &str = "awsuser";
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_WORK_GROUP: &str = "WG101";
pub const DEFAULT_HISTORY_FILE: &str = "processing_history.jsonl";
pub const DEFAULT_BACKUP_DIR: &str = "backups";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Ticket-source authentication.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    Basic {
        username: String,
        password: String,
    },
    OAuth {
        client_id: String,
        client_secret: String,
        token_url: String,
    },
    ApiKey {
        api_key: String,
        header_name: String,
    },
}

impl AuthConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            AuthConfig::Basic { .. } => "basic",
            AuthConfig::OAuth { .. } => "oauth",
            AuthConfig::ApiKey { .. } => "api_key",
        }
    }
}

/// Secrets never appear in debug output.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            AuthConfig::OAuth {
                client_id,
                token_url,
                ..
            } => f
                .debug_struct("OAuth")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("token_url", token_url)
                .finish(),
            AuthConfig::ApiKey { header_name, .. } => f
                .debug_struct("ApiKey")
                .field("api_key", &"[REDACTED]")
                .field("header_name", header_name)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNowConfig {
    /// Base URL without a trailing slash.
    pub instance_url: String,
    pub auth: AuthConfig,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsConfig {
    pub cli: String,
    pub profile: Option<String>,
    pub region: String,
    pub database: String,
    pub db_user: String,
    pub statement_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingConfig {
    pub poll_interval_secs: u64,
    /// `None` disables work-group filtering.
    pub work_group: Option<String>,
    pub history_file: PathBuf,
    pub backup_dir: PathBuf,
    pub rule_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub servicenow: ServiceNowConfig,
    pub aws: AwsConfig,
    pub processing: ProcessingConfig,
}

/// Variable reader over any lookup function. Blank values count as unset.
struct Env<F> {
    lookup: F,
    missing: Vec<String>,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn new(lookup: F) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn required(&mut self, key: &str) -> String {
        match self.optional(key) {
            Some(value) => value,
            None => {
                self.missing.push(key.to_string());
                String::new()
            }
        }
    }

    fn seconds(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) | Err(_) => Err(ConfigError::Invalid {
                    key: key.to_string(),
                    value: raw,
                    reason: "expected a positive number of seconds".to_string(),
                }),
                Ok(secs) => Ok(secs),
            },
        }
    }

    fn finish(self) -> Result<(), ConfigError> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(self.missing))
        }
    }
}

fn servicenow_from<F: Fn(&str) -> Option<String>>(
    env: &mut Env<F>,
) -> Result<ServiceNowConfig, ConfigError> {
    let instance_url = env
        .required("SERVICENOW_INSTANCE_URL")
        .trim_end_matches('/')
        .to_string();
    if !instance_url.is_empty()
        && !(instance_url.starts_with("https://") || instance_url.starts_with("http://"))
    {
        return Err(ConfigError::Invalid {
            key: "SERVICENOW_INSTANCE_URL".to_string(),
            value: instance_url,
            reason: "expected an http(s) URL".to_string(),
        });
    }

    let auth_type = env.or("SERVICENOW_AUTH_TYPE", DEFAULT_AUTH_TYPE).to_lowercase();
    let auth = match auth_type.as_str() {
        "basic" => AuthConfig::Basic {
            username: env.required("SERVICENOW_USERNAME"),
            password: env.required("SERVICENOW_PASSWORD"),
        },
        "oauth" => AuthConfig::OAuth {
            client_id: env.required("SERVICENOW_CLIENT_ID"),
            client_secret: env.required("SERVICENOW_CLIENT_SECRET"),
            token_url: env
                .optional("SERVICENOW_TOKEN_URL")
                .unwrap_or_else(|| format!("{}/oauth_token.do", instance_url)),
        },
        "api_key" => AuthConfig::ApiKey {
            api_key: env.required("SERVICENOW_API_KEY"),
            header_name: env.or("SERVICENOW_API_KEY_HEADER", DEFAULT_API_KEY_HEADER),
        },
        _ => {
            return Err(ConfigError::Invalid {
                key: "SERVICENOW_AUTH_TYPE".to_string(),
                value: auth_type,
                reason: "expected basic, oauth or api_key".to_string(),
            })
        }
    };

    Ok(ServiceNowConfig {
        instance_url,
        auth,
        timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
    })
}

fn aws_from<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<AwsConfig, ConfigError> {
    Ok(AwsConfig {
        cli: env.or("AWS_CLI", DEFAULT_AWS_CLI),
        profile: env.optional("AWS_PROFILE"),
        region: env.or("AWS_REGION", DEFAULT_REGION),
        database: env.or("REDSHIFT_DATABASE", DEFAULT_DATABASE),
        db_user: env.or("REDSHIFT_DB_USER", DEFAULT_DB_USER),
        statement_timeout_secs: env.seconds("STATEMENT_TIMEOUT", DEFAULT_STATEMENT_TIMEOUT_SECS)?,
    })
}

impl ProcessingConfig {
    /// Settings that need no credentials (history, classification).
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let env = Env::new(lookup);
        let work_group = match (env.lookup)("ASSIGNMENT_GROUP_FILTER") {
            None => Some(DEFAULT_WORK_GROUP.to_string()),
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().to_string()),
        };
        Ok(Self {
            poll_interval_secs: env.seconds("POLL_INTERVAL", DEFAULT_POLL_INTERVAL_SECS)?,
            work_group,
            history_file: PathBuf::from(env.or("REMEDIATION_HISTORY_FILE", DEFAULT_HISTORY_FILE)),
            backup_dir: PathBuf::from(env.or("REMEDIATION_BACKUP_DIR", DEFAULT_BACKUP_DIR)),
            rule_description: env.or("REMEDIATION_RULE_DESCRIPTION", DEFAULT_RULE_DESCRIPTION),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl Config {
    /// Build from an arbitrary lookup (tests pass a map).
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self, ConfigError> {
        let mut env = Env::new(&lookup);
        let servicenow = servicenow_from(&mut env)?;
        let aws = aws_from(&env)?;
        env.finish()?;
        let processing = ProcessingConfig::from_lookup(&lookup)?;
        Ok(Self {
            servicenow,
            aws,
            processing,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}
