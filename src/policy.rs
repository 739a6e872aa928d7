use std::fmt;

use k8s_openapi::api::core::v1::Container;
use tracing::{debug, error};

use crate::error::ConfigError;

/// Namespace whose workloads bypass the registry check entirely.
pub const EXEMPT_NAMESPACE: &str = "kube-system";

/// The object a set of containers belongs to, used to label violations.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub kind: &'a str,
    pub namespace: &'a str,
    pub name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonCompliantImage {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub container: String,
    pub image: String,
}

impl fmt::Display for NonCompliantImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} container '{}' uses image '{}'",
            self.kind, self.namespace, self.name, self.container, self.image
        )
    }
}

#[derive(Debug, Default)]
pub struct Classification {
    pub violations: Vec<NonCompliantImage>,
}

impl Classification {
    pub fn allowed(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Trusted registry prefixes, fixed at startup and shared read-only.
///
/// An image is trusted when it starts with one of the prefixes immediately
/// followed by `/`. The separator is always appended here, so a configured
/// `reg` never matches `reg-evil.example.com/...` and a configured `reg/`
/// only matches `reg//...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPolicy {
    registries: Vec<String>,
}

impl RegistryPolicy {
    pub fn new<I, S>(registries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let registries: Vec<String> = registries.into_iter().map(Into::into).collect();
        if registries.is_empty() {
            return Err(ConfigError::NoRegistries);
        }
        Ok(Self { registries })
    }

    pub fn registries(&self) -> &[String] {
        &self.registries
    }

    pub fn exempt_namespace(&self) -> &'static str {
        EXEMPT_NAMESPACE
    }

    pub fn is_exempt(&self, namespace: &str) -> bool {
        namespace == EXEMPT_NAMESPACE
    }

    /// First configured prefix (in configured order) that `image` lives under.
    pub fn trusted_registry(&self, image: &str) -> Option<&str> {
        self.registries
            .iter()
            .find(|registry| {
                image
                    .strip_prefix(registry.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(String::as_str)
    }

    pub fn is_compliant(&self, namespace: &str, image: &str) -> bool {
        self.is_exempt(namespace) || self.trusted_registry(image).is_some()
    }

    /// Checks every container and collects one record per untrusted image.
    pub fn classify(&self, containers: &[Container], subject: &Subject<'_>) -> Classification {
        let mut violations = Vec::new();

        for container in containers {
            let image = container.image.as_deref().unwrap_or_default();

            if self.is_exempt(subject.namespace) {
                debug!(
                    image,
                    namespace = subject.namespace,
                    "exempt namespace, skipping registry check"
                );
                continue;
            }

            match self.trusted_registry(image) {
                Some(registry) => debug!(image, registry, "found registry image"),
                None => {
                    error!(
                        image,
                        namespace = subject.namespace,
                        object = %format_args!("{}/{}", subject.kind, subject.name),
                        "attempt to use docker image not in approved registry"
                    );
                    violations.push(NonCompliantImage {
                        kind: subject.kind.to_string(),
                        namespace: subject.namespace.to_string(),
                        name: subject.name.to_string(),
                        container: container.name.clone(),
                        image: image.to_string(),
                    });
                }
            }
        }

        Classification { violations }
    }
}
