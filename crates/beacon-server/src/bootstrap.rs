//! Startup data: the default policy.

use crate::config::DefaultPolicyConfig;
use crate::error::{AdminError, AdminResult};
use crate::policy::{PolicyAdminService, PolicyDraft};
use beacon_core::Policy;
use tracing::info;

/// Creates the default policy from configuration unless one already exists.
///
/// Returns the created policy, or `None` when nothing was configured or a
/// default was already present. Safe to call on every startup.
pub async fn ensure_default_policy(
    admin: &PolicyAdminService,
    config: Option<&DefaultPolicyConfig>,
) -> AdminResult<Option<Policy>> {
    let Some(config) = config else {
        return Ok(None);
    };

    let draft = PolicyDraft {
        description: config.description.clone(),
        ..PolicyDraft::named(config.name.clone())
    };
    match admin.create_default_policy(draft).await {
        Ok(policy) => {
            info!(policy_id = %policy.id, name = %policy.name, "bootstrapped default policy");
            Ok(Some(policy))
        }
        Err(AdminError::DefaultPolicyExists) => {
            info!("default policy already present, skipping bootstrap");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
