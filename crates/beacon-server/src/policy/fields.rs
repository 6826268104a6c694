//! Flat field-map encoding of a [`Policy`] for the cache.

use crate::cache::FieldMap;
use beacon_core::{Policy, PolicyId, format_timestamp, parse_timestamp};

const ID: &str = "id";
const NAME: &str = "name";
const DESCRIPTION: &str = "description";
const STATUS: &str = "status";
const VERSION: &str = "version";
const PRIORITY: &str = "priority";
const IS_DEFAULT: &str = "isDefault";
const CREATED_AT: &str = "createdAt";
const UPDATED_AT: &str = "updatedAt";

/// Encodes `policy`; `None` when a timestamp cannot be rendered.
pub fn policy_to_fields(policy: &Policy) -> Option<FieldMap> {
    let mut fields = FieldMap::with_capacity(9);
    fields.insert(ID.into(), policy.id.to_string());
    fields.insert(NAME.into(), policy.name.clone());
    if let Some(description) = &policy.description {
        fields.insert(DESCRIPTION.into(), description.clone());
    }
    fields.insert(STATUS.into(), policy.status.as_str().into());
    if let Some(version) = &policy.version {
        fields.insert(VERSION.into(), version.clone());
    }
    fields.insert(PRIORITY.into(), policy.priority.to_string());
    fields.insert(IS_DEFAULT.into(), policy.is_default.to_string());
    fields.insert(CREATED_AT.into(), format_timestamp(policy.created_at).ok()?);
    fields.insert(UPDATED_AT.into(), format_timestamp(policy.updated_at).ok()?);
    Some(fields)
}

/// Decodes a cached map; `None` when a required field is missing or malformed.
pub fn policy_from_fields(fields: &FieldMap) -> Option<Policy> {
    let id: PolicyId = fields.get(ID)?.parse().ok()?;
    Some(Policy {
        id,
        name: fields.get(NAME)?.clone(),
        description: fields.get(DESCRIPTION).cloned(),
        status: fields.get(STATUS)?.parse().ok()?,
        version: fields.get(VERSION).cloned(),
        is_default: fields.get(IS_DEFAULT)?.parse().ok()?,
        priority: fields.get(PRIORITY)?.parse().ok()?,
        created_at: parse_timestamp(fields.get(CREATED_AT)?).ok()?,
        updated_at: parse_timestamp(fields.get(UPDATED_AT)?).ok()?,
    })
}
