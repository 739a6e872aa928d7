use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

use crate::policy::RegistryPolicy;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub operation: String,
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResponseLabels {
    pub allowed: &'static str,
    pub outcome: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct KindLabels {
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct BuildLabels {
    pub build_id: String,
}

pub struct AdmissionMetrics {
    pub admission_requests_total: Family<RequestLabels, Counter>,
    pub admission_responses_total: Family<ResponseLabels, Counter>,
    pub non_compliant_images_total: Family<KindLabels, Counter>,
    pub admission_request_duration_seconds: Histogram,
}

const DURATION_BUCKETS: [f64; 12] = [
    0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0,
];

impl AdmissionMetrics {
    pub fn new(registry: &mut Registry, policy: &RegistryPolicy, build_id: &str) -> Self {
        let admission_requests_total = Family::<RequestLabels, Counter>::default();
        registry.register(
            "registry_admission_requests",
            "Total number of admission requests received",
            admission_requests_total.clone(),
        );

        let admission_responses_total = Family::<ResponseLabels, Counter>::default();
        registry.register(
            "registry_admission_responses",
            "Total number of admission responses sent, by verdict",
            admission_responses_total.clone(),
        );

        let non_compliant_images_total = Family::<KindLabels, Counter>::default();
        registry.register(
            "registry_admission_non_compliant_images",
            "Total number of container images rejected for coming from an untrusted registry",
            non_compliant_images_total.clone(),
        );

        let admission_request_duration_seconds = Histogram::new(DURATION_BUCKETS.iter().copied());
        registry.register(
            "registry_admission_request_duration_seconds",
            "Duration of admission request processing in seconds",
            admission_request_duration_seconds.clone(),
        );

        let trusted_registries = Gauge::<i64>::default();
        registry.register(
            "registry_admission_trusted_registries",
            "Number of configured trusted registry prefixes",
            trusted_registries.clone(),
        );
        trusted_registries.set(policy.registries().len() as i64);

        let build_info = Family::<BuildLabels, Gauge>::default();
        registry.register(
            "registry_admission_build_info",
            "Build identifier of the running webhook",
            build_info.clone(),
        );
        build_info
            .get_or_create(&BuildLabels {
                build_id: build_id.to_string(),
            })
            .set(1);

        Self {
            admission_requests_total,
            admission_responses_total,
            non_compliant_images_total,
            admission_request_duration_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use prometheus_client::encoding::text::encode;

    use super::*;

    #[test]
    fn test_static_gauges_exported() {
        let mut registry = Registry::default();
        let policy = RegistryPolicy::new(["a.example.org", "b.example.org"]).unwrap();
        let metrics = AdmissionMetrics::new(&mut registry, &policy, "build-7");
        metrics
            .non_compliant_images_total
            .get_or_create(&KindLabels {
                kind: "Pod".to_string(),
            })
            .inc_by(2);

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("registry_admission_trusted_registries 2"));
        assert!(buffer.contains(r#"registry_admission_build_info{build_id="build-7"} 1"#));
        assert!(buffer.contains(r#"registry_admission_non_compliant_images_total{kind="Pod"} 2"#));
    }
}
