use std::fmt;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;
use crate::policy::RegistryPolicy;

/// Environment variables read into [`WebhookConfig`], matched case-insensitively
/// against the field names.
pub const ENV_KEYS: [&str; 7] = [
    "LISTEN_ON",
    "METRICS_ON",
    "TLS_CERT",
    "TLS_KEY",
    "REGISTRIES",
    "DEBUG",
    "BUILD_ID",
];

fn default_listen_on() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_metrics_on() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_tls_cert() -> PathBuf {
    PathBuf::from("/etc/webhook/certs/cert.pem")
}

fn default_tls_key() -> PathBuf {
    PathBuf::from("/etc/webhook/certs/key.pem")
}

fn default_registries() -> Vec<String> {
    vec!["docker-registry.tools.wmflabs.org".to_string()]
}

fn default_debug() -> bool {
    true
}

fn default_build_id() -> String {
    "nobuildid".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_listen_on")]
    pub listen_on: String,
    #[serde(default = "default_metrics_on")]
    pub metrics_on: String,
    #[serde(default = "default_tls_cert")]
    pub tls_cert: PathBuf,
    #[serde(default = "default_tls_key")]
    pub tls_key: PathBuf,
    #[serde(default = "default_registries", deserialize_with = "registry_list")]
    pub registries: Vec<String>,
    #[serde(default = "default_debug")]
    pub debug: bool,
    #[serde(default = "default_build_id")]
    pub build_id: String,
}

impl WebhookConfig {
    /// Optional YAML file first, then the recognized environment variables.
    pub fn figment(config_file: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(path) = config_file {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::raw().only(&ENV_KEYS))
    }

    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment(config_file))
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(Box::new)?;
        if config.registries.is_empty() {
            return Err(ConfigError::NoRegistries);
        }
        Ok(config)
    }

    pub fn registry_policy(&self) -> Result<RegistryPolicy, ConfigError> {
        RegistryPolicy::new(self.registries.iter().cloned())
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

/// Accepts either a comma separated string or a list; empty entries are dropped.
fn registry_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct RegistryListVisitor;

    impl<'de> Visitor<'de> for RegistryListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a comma separated string or a list of registries")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(value
                .split(',')
                .filter(|registry| !registry.is_empty())
                .map(str::to_string)
                .collect())
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut registries = Vec::new();
            while let Some(registry) = seq.next_element::<String>()? {
                if !registry.is_empty() {
                    registries.push(registry);
                }
            }
            Ok(registries)
        }
    }

    deserializer.deserialize_any(RegistryListVisitor)
}
