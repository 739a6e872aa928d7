// Test code is allowed to panic on failure
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

//! Property-based tests for the registry admission decision.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Container;
use proptest::prelude::*;
use serde_json::json;

use registry_admission::admission::AdmissionRequest;
use registry_admission::policy::Subject;
use registry_admission::{AdmissionEngine, EXEMPT_NAMESPACE, RegistryPolicy};

/// Registry prefixes, deliberately short so generated images collide with them.
fn registry() -> impl Strategy<Value = String> {
    "[a-c.-]{1,4}(/[a-c]{1,2})?"
}

fn registries() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(registry(), 1..5)
}

fn namespace() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(EXEMPT_NAMESPACE.to_string()),
        Just("default".to_string()),
        "[a-z-]{1,10}",
    ]
}

/// Images that sometimes sit under a generated registry and sometimes do not.
fn image() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-c./:-]{0,12}",
        (registry(), "[/-]?", "[a-z:]{0,6}").prop_map(|(r, sep, rest)| format!("{r}{sep}{rest}")),
    ]
}

fn containers(images: &[String]) -> Vec<Container> {
    images
        .iter()
        .enumerate()
        .map(|(i, image)| Container {
            name: format!("c{i}"),
            image: Some(image.clone()),
            ..Default::default()
        })
        .collect()
}

fn pod_request(uid: &str, kind: &str, namespace: &str, images: &[String]) -> AdmissionRequest {
    let containers: Vec<_> = images
        .iter()
        .enumerate()
        .map(|(i, image)| json!({"name": format!("c{i}"), "image": image}))
        .collect();
    let body = json!({
        "uid": uid,
        "kind": {"group": "", "version": "v1", "kind": kind},
        "namespace": namespace,
        "name": "generated",
        "operation": "CREATE",
        "object": {"metadata": {"name": "generated"}, "spec": {"containers": containers}},
    });
    serde_json::from_str(&body.to_string()).unwrap()
}

proptest! {
    #[test]
    fn compliance_matches_prefix_plus_slash(
        registries in registries(),
        namespace in namespace(),
        image in image(),
    ) {
        let policy = RegistryPolicy::new(registries.clone()).unwrap();
        let expected = namespace == EXEMPT_NAMESPACE
            || registries.iter().any(|r| image.starts_with(&format!("{r}/")));

        prop_assert_eq!(policy.is_compliant(&namespace, &image), expected);

        let subject = Subject { kind: "Pod", namespace: &namespace, name: "generated" };
        let classification = policy.classify(&containers(&[image]), &subject);
        prop_assert_eq!(classification.allowed(), expected);
    }

    #[test]
    fn registry_order_never_changes_the_outcome(
        (registries, shuffled) in registries()
            .prop_flat_map(|r| (Just(r.clone()), Just(r).prop_shuffle())),
        namespace in namespace(),
        images in prop::collection::vec(image(), 0..4),
    ) {
        let original = RegistryPolicy::new(registries).unwrap();
        let permuted = RegistryPolicy::new(shuffled).unwrap();
        let containers = containers(&images);
        let subject = Subject { kind: "Pod", namespace: &namespace, name: "generated" };

        let a = original.classify(&containers, &subject);
        let b = permuted.classify(&containers, &subject);
        prop_assert_eq!(a.allowed(), b.allowed());
        prop_assert_eq!(a.violations, b.violations);
    }

    #[test]
    fn every_violation_is_reported(
        registries in registries(),
        images in prop::collection::vec(image(), 0..6),
    ) {
        let policy = RegistryPolicy::new(registries).unwrap();
        let subject = Subject { kind: "Pod", namespace: "default", name: "generated" };

        let classification = policy.classify(&containers(&images), &subject);
        let untrusted = images
            .iter()
            .filter(|image| policy.trusted_registry(image).is_none())
            .count();
        prop_assert_eq!(classification.violations.len(), untrusted);
    }

    #[test]
    fn verdict_uid_matches_request_uid(
        uid in "[a-f0-9-]{1,36}",
        kind in prop_oneof![Just("Pod"), Just("Deployment"), Just("CronJob"), Just("Job")],
        namespace in namespace(),
        images in prop::collection::vec(image(), 0..3),
    ) {
        let engine = AdmissionEngine::new(Arc::new(
            RegistryPolicy::new(["docker-registry.tools.wmflabs.org"]).unwrap(),
        ));

        let verdict = engine.review(&pod_request(&uid, kind, &namespace, &images));
        prop_assert_eq!(verdict.uid, uid);
    }

    #[test]
    fn pod_without_containers_is_always_allowed(
        registries in registries(),
        namespace in namespace(),
    ) {
        let engine = AdmissionEngine::new(Arc::new(RegistryPolicy::new(registries).unwrap()));

        let verdict = engine.review(&pod_request("uid", "Pod", &namespace, &[]));
        prop_assert!(verdict.allowed);
    }
}
