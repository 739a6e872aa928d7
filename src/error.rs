use thiserror::Error;

use crate::policy::NonCompliantImage;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "got no registries, at least one is required, make sure to set the REGISTRIES env var \
         to a comma separated list of registries (ex. 'docker-registry.tools.wmflabs.org', or \
         'registry1,registry2')"
    )]
    NoRegistries,
    #[error("failed to read configuration: {0}")]
    Source(#[from] Box<figment::Error>),
}

/// Every way a single admission request can end up denied.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("{0}")]
    Decode(#[from] serde_json::Error),
    #[error("admission request carries no object")]
    MissingObject,
    #[error("Unsupported Kind={0}")]
    UnsupportedKind(String),
    #[error("{} image(s) not from a trusted registry", .0.len())]
    PolicyViolation(Vec<NonCompliantImage>),
}

impl AdmissionError {
    /// Short label used for the `outcome` metric dimension.
    pub fn outcome(&self) -> &'static str {
        match self {
            AdmissionError::Decode(_) | AdmissionError::MissingObject => "decode_error",
            AdmissionError::UnsupportedKind(_) => "unsupported_kind",
            AdmissionError::PolicyViolation(_) => "policy_violation",
        }
    }
}
