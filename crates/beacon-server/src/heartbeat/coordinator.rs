use super::liveness::LivenessRecorder;
use super::types::{HeartbeatRequest, HeartbeatResponse, UpdateType};
use crate::policy::{PolicyResolver, policy_hash};
use beacon_storage::StorageResult;
use std::sync::Arc;

/// Answers client heartbeats. Never fails: every problem becomes a response.
pub struct HeartbeatCoordinator {
    resolver: Arc<PolicyResolver>,
    liveness: Arc<LivenessRecorder>,
}

impl HeartbeatCoordinator {
    pub fn new(resolver: Arc<PolicyResolver>, liveness: Arc<LivenessRecorder>) -> Self {
        Self { resolver, liveness }
    }

    pub async fn handle(&self, request: &HeartbeatRequest) -> HeartbeatResponse {
        let client_id = request.client_id.trim();
        if client_id.is_empty() {
            return HeartbeatResponse::invalid_client();
        }
        tracing::debug!(
            client_id = %client_id,
            client_version = request.client_version.as_deref().unwrap_or(""),
            "heartbeat"
        );

        // detached; the response never waits for it
        self.liveness.record(client_id);

        match self
            .evaluate(client_id, request.current_policies_hash.as_deref())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    client_id = %client_id,
                    category = %e.category(),
                    error = %e,
                    "heartbeat policy check failed"
                );
                HeartbeatResponse::error(format!("policy check failed: {e}"))
            }
        }
    }

    async fn evaluate(
        &self,
        client_id: &str,
        known_hash: Option<&str>,
    ) -> StorageResult<HeartbeatResponse> {
        let Some(policy) = self.resolver.get_effective_policy(client_id).await? else {
            return Ok(HeartbeatResponse::no_policy());
        };
        let current = policy_hash(&policy);

        let response = match known_hash.map(str::trim).filter(|h| !h.is_empty()) {
            Some(known) if known == current => HeartbeatResponse::up_to_date(current),
            Some(_) => HeartbeatResponse::update(UpdateType::PolicyUpdated, current, &policy),
            None => HeartbeatResponse::update(UpdateType::NewPolicy, current, &policy),
        };
        if response.needs_policy_update {
            tracing::debug!(client_id = %client_id, policy_id = %policy.id, "client policy stale");
        }
        Ok(response)
    }
}
