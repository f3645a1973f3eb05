use serde::Serialize;
use utoipa::ToSchema;

use crate::{dto::format_system_time, state::registry::RegistryStats};

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// RFC 3339 timestamp of the server start.
    pub started_at: String,
    /// Sessions counted against the registry limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_sessions: Option<usize>,
    /// Sessions still accepting players.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_sessions: Option<usize>,
    /// Sessions currently playing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_progress_sessions: Option<usize>,
    /// Session broadcast channels currently open.
    pub open_channels: usize,
}

impl HealthResponse {
    /// Create a health response indicating the registry answered.
    pub fn ok(
        started_at: std::time::SystemTime,
        stats: RegistryStats,
        open_channels: usize,
    ) -> Self {
        Self {
            status: "ok".to_string(),
            started_at: format_system_time(started_at),
            active_sessions: Some(stats.active),
            waiting_sessions: Some(stats.waiting),
            in_progress_sessions: Some(stats.in_progress),
            open_channels,
        }
    }

    /// Create a health response indicating the registry is not answering.
    pub fn degraded(started_at: std::time::SystemTime, open_channels: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            started_at: format_system_time(started_at),
            active_sessions: None,
            waiting_sessions: None,
            in_progress_sessions: None,
            open_channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::UNIX_EPOCH;

    use super::*;

    #[test]
    fn degraded_response_omits_registry_counters() {
        let body = serde_json::to_value(HealthResponse::degraded(UNIX_EPOCH, 3)).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "status": "degraded",
                "startedAt": "1970-01-01T00:00:00Z",
                "openChannels": 3
            })
        );
    }

    #[test]
    fn ok_response_reports_registry_counters() {
        let stats = RegistryStats {
            active: 2,
            waiting: 1,
            in_progress: 1,
        };
        let body = serde_json::to_value(HealthResponse::ok(UNIX_EPOCH, stats, 2)).unwrap();

        assert_eq!(body["status"], "ok");
        assert_eq!(body["activeSessions"], 2);
        assert_eq!(body["waitingSessions"], 1);
        assert_eq!(body["inProgressSessions"], 1);
        assert_eq!(body["openChannels"], 2);
    }
}
