use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::value::RawValue;

use crate::error::AdmissionError;

/// Resources that carry a pod specification somewhere in their shape.
pub trait PodSpecSource {
    fn pod_spec(&self) -> Option<&PodSpec>;
    fn object_meta(&self) -> &ObjectMeta;
}

impl PodSpecSource for Pod {
    fn pod_spec(&self) -> Option<&PodSpec> {
        self.spec.as_ref()
    }

    fn object_meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

impl PodSpecSource for Deployment {
    fn pod_spec(&self) -> Option<&PodSpec> {
        self.spec.as_ref()?.template.spec.as_ref()
    }

    fn object_meta(&self) -> &ObjectMeta {
        &self.metadata
    }
}

/// The resource kinds this webhook knows how to inspect.
#[derive(Debug, Clone)]
pub enum Workload {
    Pod(Box<Pod>),
    Deployment(Box<Deployment>),
}

impl Workload {
    /// Decodes `object` according to the request's declared kind.
    ///
    /// Unsupported kinds are rejected before the object is looked at.
    pub fn decode(kind: &str, object: Option<&RawValue>) -> Result<Self, AdmissionError> {
        let raw = || {
            object
                .map(RawValue::get)
                .ok_or(AdmissionError::MissingObject)
        };

        match kind {
            "Pod" => Ok(Workload::Pod(serde_json::from_str(raw()?)?)),
            "Deployment" => Ok(Workload::Deployment(serde_json::from_str(raw()?)?)),
            other => Err(AdmissionError::UnsupportedKind(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Workload::Pod(_) => "Pod",
            Workload::Deployment(_) => "Deployment",
        }
    }

    fn source(&self) -> &dyn PodSpecSource {
        let source: &dyn PodSpecSource = match self {
            Workload::Pod(pod) => &**pod,
            Workload::Deployment(deployment) => &**deployment,
        };
        source
    }

    /// Containers of the pod spec; empty when the spec is absent.
    pub fn containers(&self) -> &[Container] {
        self.source()
            .pod_spec()
            .map(|spec| spec.containers.as_slice())
            .unwrap_or_default()
    }

    /// Name from the object metadata, falling back to `generateName`.
    pub fn object_name(&self) -> Option<&str> {
        let meta = self.source().object_meta();
        meta.name.as_deref().or(meta.generate_name.as_deref())
    }
}
