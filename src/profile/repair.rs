//! Versioned repair of legacy document shapes
//!
//! A stored document that no longer deserializes as the current
//! `Profile` shape is not an error: it predates a schema change or was
//! hand-edited. Reads backfill the missing fields with computed defaults
//! instead of failing. Each legacy shape is a named version with its own
//! migration step, so new schema changes add a version here rather than
//! an inline catch-and-default somewhere in the read path.

use crate::profile::types::{MilestoneStamp, PaymentGateway, Profile, SubscriptionTier};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Detected shape of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// Current schema, deserializes directly
    Current,
    /// Pre-gateway-confidence schema: no confidence map, no avatar seed,
    /// no tier field
    V1,
    /// Bare legacy map: only identity and a handful of preference fields
    V0,
}

/// Classify a raw stored document by shape.
pub fn detect_shape(raw: &Value) -> DocumentShape {
    let Some(obj) = raw.as_object() else {
        return DocumentShape::V0;
    };
    if obj.contains_key("gatewayConfidence") && obj.contains_key("tier") {
        DocumentShape::Current
    } else if obj.contains_key("gateways") {
        DocumentShape::V1
    } else {
        DocumentShape::V0
    }
}

/// Repair a raw stored document into the current Profile shape,
/// backfilling missing fields with computed defaults. `user_id` comes
/// from the row key, never from the (possibly corrupt) document body.
pub fn repair(raw: &Value, user_id: &str) -> Profile {
    match detect_shape(raw) {
        DocumentShape::Current | DocumentShape::V1 => repair_v1(raw, user_id),
        DocumentShape::V0 => repair_v0(raw, user_id),
    }
}

/// V1 and current documents carry the gateway list; fill in whatever
/// newer fields are absent.
fn repair_v1(raw: &Value, user_id: &str) -> Profile {
    let gateways = raw
        .get("gateways")
        .and_then(|v| serde_json::from_value::<Vec<PaymentGateway>>(v.clone()).ok())
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| vec![PaymentGateway::Venmo]);
    let preferred = raw
        .get("preferredGateway")
        .and_then(|v| serde_json::from_value::<PaymentGateway>(v.clone()).ok())
        .unwrap_or(gateways[0]);

    Profile {
        user_id: user_id.to_string(),
        display_name: Some(
            raw.get("displayName")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| display_name_from_handle(user_id)),
        ),
        safe_mode: raw.get("safeMode").and_then(Value::as_bool).unwrap_or(false),
        preferred_gateway: preferred,
        gateways,
        location: string_field(raw, "location"),
        timezone: raw
            .get("timezone")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("UTC")
            .to_string(),
        tier: raw
            .get("tier")
            .and_then(|v| serde_json::from_value::<SubscriptionTier>(v.clone()).ok())
            .unwrap_or_default(),
        avatar_seed: raw
            .get("avatarSeed")
            .and_then(|v| serde_json::from_value::<Uuid>(v.clone()).ok())
            .or_else(|| Some(Uuid::new_v4())),
        gateway_confidence: raw
            .get("gatewayConfidence")
            .and_then(|v| {
                serde_json::from_value::<BTreeMap<PaymentGateway, f64>>(v.clone()).ok()
            })
            .unwrap_or_default(),
        created_at: raw
            .get("createdAt")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(now_iso),
        progress: raw
            .get("progress")
            .and_then(|v| {
                serde_json::from_value::<BTreeMap<String, MilestoneStamp>>(v.clone()).ok()
            })
            .unwrap_or_default(),
    }
}

/// V0 documents predate the gateway model entirely.
fn repair_v0(raw: &Value, user_id: &str) -> Profile {
    Profile {
        user_id: user_id.to_string(),
        display_name: Some(display_name_from_handle(user_id)),
        safe_mode: raw.get("safeMode").and_then(Value::as_bool).unwrap_or(false),
        gateways: vec![PaymentGateway::Venmo],
        preferred_gateway: PaymentGateway::Venmo,
        location: string_field(raw, "location"),
        timezone: "UTC".to_string(),
        tier: SubscriptionTier::Free,
        avatar_seed: Some(Uuid::new_v4()),
        gateway_confidence: BTreeMap::new(),
        created_at: now_iso(),
        progress: BTreeMap::new(),
    }
}

fn string_field(raw: &Value, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// "@alice" -> "alice"
fn display_name_from_handle(user_id: &str) -> String {
    user_id.trim_start_matches('@').to_string()
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}
