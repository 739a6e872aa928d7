use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::admission::AdmissionRequest;
use crate::error::AdmissionError;
use crate::policy::{RegistryPolicy, Subject};
use crate::verdict::Verdict;
use crate::workload::Workload;

/// Turns admission requests into verdicts against a shared registry policy.
#[derive(Debug, Clone)]
pub struct AdmissionEngine {
    policy: Arc<RegistryPolicy>,
}

impl AdmissionEngine {
    pub fn new(policy: Arc<RegistryPolicy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    /// Decodes the request object, extracts its containers and checks them.
    pub fn evaluate(&self, request: &AdmissionRequest) -> Result<(), AdmissionError> {
        let workload = Workload::decode(&request.kind.kind, request.object.as_deref())?;

        let name = if request.name.is_empty() {
            workload.object_name().unwrap_or("<unknown>")
        } else {
            request.name.as_str()
        };
        let subject = Subject {
            kind: workload.kind(),
            namespace: &request.namespace,
            name,
        };

        let classification = self.policy.classify(workload.containers(), &subject);
        if classification.allowed() {
            Ok(())
        } else {
            Err(AdmissionError::PolicyViolation(classification.violations))
        }
    }

    /// Never fails: every outcome, including undecodable objects, is a verdict
    /// carrying the request's uid.
    pub fn review(&self, request: &AdmissionRequest) -> Verdict {
        debug!(
            uid = %request.uid,
            kind = %request.kind.kind,
            namespace = %request.namespace,
            name = %request.name,
            operation = ?request.operation,
            "admission review"
        );

        let result = self.evaluate(request);
        match &result {
            Err(AdmissionError::Decode(e)) => {
                error!(uid = %request.uid, "could not unmarshal raw object: {e}");
            }
            Err(AdmissionError::MissingObject) => {
                error!(uid = %request.uid, "admission request has no object");
            }
            Err(AdmissionError::UnsupportedKind(kind)) => {
                warn!(uid = %request.uid, %kind, "encountered unsupported kind");
            }
            Err(AdmissionError::PolicyViolation(_)) | Ok(()) => {}
        }

        Verdict::from_result(request.uid.clone(), result, &self.policy)
    }
}
