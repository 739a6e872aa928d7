//! Validating admission webhook that only admits Pods and Deployments whose
//! container images come from a trusted registry.

pub mod admission;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod policy;
pub mod tls;
pub mod verdict;
pub mod workload;

pub use config::WebhookConfig;
pub use engine::AdmissionEngine;
pub use error::{AdmissionError, ConfigError};
pub use policy::{EXEMPT_NAMESPACE, NonCompliantImage, RegistryPolicy};
pub use verdict::Verdict;
