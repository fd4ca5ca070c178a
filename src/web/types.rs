//! Request and response types for the HTTP API.

use serde::{Deserialize, Serialize};

/// Envelope shared by every response that has a body.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    /// Serialized as `null` when absent, never omitted.
    pub data: Option<T>,
}

/// `?join=` on the staff-user trial list.
#[derive(Debug, Default, Deserialize)]
pub struct TrialsByUserQuery {
    pub join: Option<String>,
}

/// `?trialId=` on the assignment list.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentListQuery {
    pub trial_id: Option<String>,
}

// --- Health ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub backend: &'static str,
    pub uptime_secs: u64,
}
