use crate::error::AdmissionError;
use crate::policy::{NonCompliantImage, RegistryPolicy};

pub const ALLOWED_MESSAGE: &str = "Welcome to the fantasy zone!";

/// Final allow/deny decision for one admission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub uid: String,
    pub allowed: bool,
    pub message: String,
    pub outcome: &'static str,
    pub violations: Vec<NonCompliantImage>,
}

impl Verdict {
    pub fn allow(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            allowed: true,
            message: ALLOWED_MESSAGE.to_string(),
            outcome: "allowed",
            violations: Vec::new(),
        }
    }

    pub fn deny(uid: impl Into<String>, error: AdmissionError, policy: &RegistryPolicy) -> Self {
        let outcome = error.outcome();
        let message = deny_message(&error, policy);
        let violations = match error {
            AdmissionError::PolicyViolation(violations) => violations,
            _ => Vec::new(),
        };

        Self {
            uid: uid.into(),
            allowed: false,
            message,
            outcome,
            violations,
        }
    }

    pub fn from_result(
        uid: impl Into<String>,
        result: Result<(), AdmissionError>,
        policy: &RegistryPolicy,
    ) -> Self {
        match result {
            Ok(()) => Self::allow(uid),
            Err(e) => Self::deny(uid, e, policy),
        }
    }
}

fn deny_message(error: &AdmissionError, policy: &RegistryPolicy) -> String {
    match error {
        AdmissionError::PolicyViolation(violations) => {
            let offending: Vec<String> = violations.iter().map(ToString::to_string).collect();
            format!(
                "Only images from trusted registries are allowed: {}; trusted registries: [{}]",
                offending.join("; "),
                policy.registries().join(", ")
            )
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RegistryPolicy {
        RegistryPolicy::new(["dummyregistry1", "docker-registry.tools.wmflabs.org"]).unwrap()
    }

    fn violation(container: &str, image: &str) -> NonCompliantImage {
        NonCompliantImage {
            kind: "Deployment".to_string(),
            namespace: "tool-openstack-browser".to_string(),
            name: "openstack-browser".to_string(),
            container: container.to_string(),
            image: image.to_string(),
        }
    }

    #[test]
    fn test_allow_message() {
        let verdict = Verdict::from_result("uid-1", Ok(()), &policy());
        assert!(verdict.allowed);
        assert_eq!(verdict.uid, "uid-1");
        assert_eq!(verdict.message, ALLOWED_MESSAGE);
        assert_eq!(verdict.outcome, "allowed");
    }

    #[test]
    fn test_policy_violation_lists_images_and_registries() {
        let error = AdmissionError::PolicyViolation(vec![
            violation("webservice", "hub.docker.io/example:foobar"),
            violation("sidecar", "busybox"),
        ]);
        let verdict = Verdict::deny("uid-2", error, &policy());

        assert!(!verdict.allowed);
        assert_eq!(verdict.uid, "uid-2");
        assert_eq!(verdict.outcome, "policy_violation");
        assert_eq!(verdict.violations.len(), 2);
        assert_eq!(
            verdict.message,
            "Only images from trusted registries are allowed: \
             Deployment tool-openstack-browser/openstack-browser container 'webservice' uses \
             image 'hub.docker.io/example:foobar'; \
             Deployment tool-openstack-browser/openstack-browser container 'sidecar' uses \
             image 'busybox'; \
             trusted registries: [dummyregistry1, docker-registry.tools.wmflabs.org]"
        );
    }

    #[test]
    fn test_unsupported_kind_message_names_kind() {
        let error = AdmissionError::UnsupportedKind("CronJob".to_string());
        let verdict = Verdict::deny("uid-3", error, &policy());

        assert!(!verdict.allowed);
        assert_eq!(verdict.message, "Unsupported Kind=CronJob");
        assert_eq!(verdict.outcome, "unsupported_kind");
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn test_decode_error_message_is_parse_error() {
        let parse_error = serde_json::from_str::<Vec<String>>("{").unwrap_err();
        let expected = parse_error.to_string();
        let verdict = Verdict::deny("uid-4", AdmissionError::Decode(parse_error), &policy());

        assert_eq!(verdict.message, expected);
        assert_eq!(verdict.outcome, "decode_error");
    }
}
