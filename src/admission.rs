//! `admission.k8s.io/v1` AdmissionReview envelope.
//!
//! Only the fields the webhook reads or writes are modelled. The embedded
//! object is kept as raw JSON so decoding can happen per kind, after the
//! request uid is known.

use kube::core::admission::Operation;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::verdict::Verdict;

pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

fn default_api_version() -> String {
    ADMISSION_API_VERSION.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    pub kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    pub request: Option<AdmissionRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub kind: GroupVersionKind,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    pub operation: Operation,
    #[serde(default)]
    pub object: Option<Box<RawValue>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: AdmissionResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResponse {
    pub uid: String,
    pub allowed: bool,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub message: String,
}

impl AdmissionResponse {
    /// Rejection for a review that could not be read at all, so there is no
    /// uid to correlate with.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            uid: String::new(),
            allowed: false,
            status: Status {
                message: message.into(),
            },
        }
    }

    pub fn into_review(self, api_version: &str) -> ReviewResponse {
        ReviewResponse {
            api_version: api_version.to_string(),
            kind: ADMISSION_REVIEW_KIND.to_string(),
            response: self,
        }
    }
}

impl From<Verdict> for AdmissionResponse {
    fn from(verdict: Verdict) -> Self {
        Self {
            uid: verdict.uid,
            allowed: verdict.allowed,
            status: Status {
                message: verdict.message,
            },
        }
    }
}
