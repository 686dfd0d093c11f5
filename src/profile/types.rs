//! Profile document types
//!
//! Defines the persisted preference document, the closed gateway and
//! subscription enumerations, the append-only ledger entry, and the
//! integrity-lock sidecar. All types use camelCase JSON serialization
//! so serialized documents match the wire format of earlier deployments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Payment gateway identifier (closed enumeration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentGateway {
    Venmo,
    Paypal,
    Cashapp,
}

impl PaymentGateway {
    /// All gateways in canonical column order
    pub const ALL: [PaymentGateway; 3] =
        [PaymentGateway::Venmo, PaymentGateway::Paypal, PaymentGateway::Cashapp];

    /// Ordinal position in the canonical column order
    pub fn ordinal(&self) -> usize {
        match self {
            Self::Venmo => 0,
            Self::Paypal => 1,
            Self::Cashapp => 2,
        }
    }
}

impl std::fmt::Display for PaymentGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Venmo => write!(f, "venmo"),
            Self::Paypal => write!(f, "paypal"),
            Self::Cashapp => write!(f, "cashapp"),
        }
    }
}

impl std::str::FromStr for PaymentGateway {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "venmo" => Ok(Self::Venmo),
            "paypal" => Ok(Self::Paypal),
            "cashapp" => Ok(Self::Cashapp),
            other => Err(format!("unknown payment gateway: {}", other)),
        }
    }
}

/// Subscription tier (closed enumeration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Plus,
    Pro,
}

impl std::fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Plus => write!(f, "plus"),
            Self::Pro => write!(f, "pro"),
        }
    }
}

/// Latest per-milestone score, cached on the Profile.
///
/// The ledger is the source of truth; this stamp is a derived,
/// overwritable summary. Older deployments stored the timestamp as a
/// decimal string, so deserialization accepts both forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneStamp {
    pub score: f64,
    #[serde(deserialize_with = "de_millis")]
    pub timestamp: i64,
}

/// The authoritative preference document for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Immutable handle, e.g. `@alice`
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub safe_mode: bool,
    /// Enabled gateways (non-empty)
    pub gateways: Vec<PaymentGateway>,
    pub preferred_gateway: PaymentGateway,
    pub location: String,
    /// IANA timezone string
    pub timezone: String,
    #[serde(default)]
    pub tier: SubscriptionTier,
    #[serde(default)]
    pub avatar_seed: Option<Uuid>,
    /// Per-gateway confidence scores in [0, 1]
    #[serde(default)]
    pub gateway_confidence: BTreeMap<PaymentGateway, f64>,
    /// ISO-8601 creation timestamp
    pub created_at: String,
    /// Derived cache of the latest per-milestone score
    #[serde(default)]
    pub progress: BTreeMap<String, MilestoneStamp>,
}

/// Partial update applied over an existing Profile (shallow merge,
/// provided fields win; `user_id` is never overridden)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub safe_mode: Option<bool>,
    #[serde(default)]
    pub gateways: Option<Vec<PaymentGateway>>,
    #[serde(default)]
    pub preferred_gateway: Option<PaymentGateway>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub tier: Option<SubscriptionTier>,
    #[serde(default)]
    pub avatar_seed: Option<Uuid>,
    #[serde(default)]
    pub gateway_confidence: Option<BTreeMap<PaymentGateway, f64>>,
    #[serde(default)]
    pub progress: Option<BTreeMap<String, MilestoneStamp>>,
}

impl Profile {
    /// Apply a patch, returning the merged document
    pub fn merged(&self, patch: ProfilePatch) -> Profile {
        let mut next = self.clone();
        if let Some(display_name) = patch.display_name {
            next.display_name = Some(display_name);
        }
        if let Some(safe_mode) = patch.safe_mode {
            next.safe_mode = safe_mode;
        }
        if let Some(gateways) = patch.gateways {
            next.gateways = gateways;
        }
        if let Some(preferred) = patch.preferred_gateway {
            next.preferred_gateway = preferred;
        }
        if let Some(location) = patch.location {
            next.location = location;
        }
        if let Some(timezone) = patch.timezone {
            next.timezone = timezone;
        }
        if let Some(tier) = patch.tier {
            next.tier = tier;
        }
        if let Some(seed) = patch.avatar_seed {
            next.avatar_seed = Some(seed);
        }
        if let Some(confidence) = patch.gateway_confidence {
            next.gateway_confidence = confidence;
        }
        if let Some(progress) = patch.progress {
            next.progress = progress;
        }
        next
    }
}

/// One immutable fact in the append-only progress ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub user_id: String,
    pub milestone: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub score: f64,
    /// Content digest of the entry payload
    pub hash: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

/// Integrity-lock sidecar stored alongside the serialized Profile:
/// the content digest computed at the moment of the last successful
/// write, plus when it was computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityLock {
    pub digest: String,
    #[serde(deserialize_with = "de_millis")]
    pub write_timestamp: i64,
}

/// Accept epoch-millis timestamps as either a wide integer or a decimal
/// string (the stored form and the in-memory form have differed across
/// deployments).
fn de_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Int(i64),
        Text(String),
    }

    match Millis::deserialize(deserializer)? {
        Millis::Int(ms) => Ok(ms),
        Millis::Text(s) => s
            .parse::<i64>()
            .map_err(|_| D::Error::custom(format!("invalid millisecond timestamp: {}", s))),
    }
}
