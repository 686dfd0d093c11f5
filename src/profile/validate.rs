//! Pluggable profile validation
//!
//! The engine delegates field-level constraint enforcement to a
//! `ProfileValidator` so deployments can swap in a stricter (or looser)
//! policy without touching the orchestration layer. `StandardValidator`
//! implements the default policy.
//!
//! Membership of `preferredGateway` in the enabled `gateways` set is
//! deliberately NOT enforced: existing documents carry stale preferences
//! and rejecting them would break reads. The engine emits a lint-level
//! warning instead.

use crate::error::{Error, Result};
use crate::profile::types::Profile;

/// Pluggable validation policy for profile documents.
pub trait ProfileValidator: Send + Sync {
    /// Validate a document, returning `Error::Validation` on the first
    /// violated constraint.
    fn validate(&self, profile: &Profile) -> Result<()>;

    /// Human-readable name, logged when the engine is constructed.
    fn name(&self) -> &str;
}

/// Default validation policy.
pub struct StandardValidator;

impl StandardValidator {
    /// Check the `@handle` identifier format: `@` followed by 1-30
    /// lowercase alphanumerics or underscores.
    pub fn is_valid_handle(handle: &str) -> bool {
        let Some(body) = handle.strip_prefix('@') else {
            return false;
        };
        !body.is_empty()
            && body.len() <= 30
            && body
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }
}

impl ProfileValidator for StandardValidator {
    fn validate(&self, profile: &Profile) -> Result<()> {
        if !Self::is_valid_handle(&profile.user_id) {
            return Err(Error::Validation(format!(
                "invalid user handle '{}': expected @[a-z0-9_]{{1,30}}",
                profile.user_id
            )));
        }
        if profile.gateways.is_empty() {
            return Err(Error::Validation(
                "at least one payment gateway must be enabled".to_string(),
            ));
        }
        if profile.timezone.is_empty() {
            return Err(Error::Validation("timezone must not be empty".to_string()));
        }
        for (gateway, score) in &profile.gateway_confidence {
            if !(0.0..=1.0).contains(score) {
                return Err(Error::Validation(format!(
                    "confidence for {} out of range: {}",
                    gateway, score
                )));
            }
        }
        for (milestone, stamp) in &profile.progress {
            if !(0.0..=1.0).contains(&stamp.score) {
                return Err(Error::Validation(format!(
                    "progress score for '{}' out of range: {}",
                    milestone, stamp.score
                )));
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "standard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::types::{MilestoneStamp, PaymentGateway};
    use std::collections::BTreeMap;

    fn valid_profile() -> Profile {
        Profile {
            user_id: "@alice".to_string(),
            display_name: None,
            safe_mode: false,
            gateways: vec![PaymentGateway::Venmo],
            preferred_gateway: PaymentGateway::Venmo,
            location: String::new(),
            timezone: "America/New_York".to_string(),
            tier: Default::default(),
            avatar_seed: None,
            gateway_confidence: BTreeMap::new(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            progress: BTreeMap::new(),
        }
    }

    #[test]
    fn test_valid_profile_passes() {
        assert!(StandardValidator.validate(&valid_profile()).is_ok());
    }

    #[test]
    fn test_handle_format() {
        assert!(StandardValidator::is_valid_handle("@alice"));
        assert!(StandardValidator::is_valid_handle("@a_1"));
        assert!(!StandardValidator::is_valid_handle("alice"));
        assert!(!StandardValidator::is_valid_handle("@"));
        assert!(!StandardValidator::is_valid_handle("@Alice"));
        assert!(!StandardValidator::is_valid_handle(&format!("@{}", "a".repeat(31))));
    }

    #[test]
    fn test_empty_gateways_rejected() {
        let mut profile = valid_profile();
        profile.gateways.clear();
        assert!(matches!(
            StandardValidator.validate(&profile),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_confidence_out_of_range_rejected() {
        let mut profile = valid_profile();
        profile.gateway_confidence.insert(PaymentGateway::Paypal, 1.5);
        assert!(StandardValidator.validate(&profile).is_err());
    }

    #[test]
    fn test_progress_score_out_of_range_rejected() {
        let mut profile = valid_profile();
        profile.progress.insert(
            "first_login".to_string(),
            MilestoneStamp { score: -0.1, timestamp: 0 },
        );
        assert!(StandardValidator.validate(&profile).is_err());
    }

    #[test]
    fn test_stale_preferred_gateway_allowed() {
        // Permissive on purpose: a preferred gateway outside the enabled
        // set is warned about, never rejected.
        let mut profile = valid_profile();
        profile.preferred_gateway = PaymentGateway::Cashapp;
        assert!(StandardValidator.validate(&profile).is_ok());
    }
}
