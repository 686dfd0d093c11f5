//! Personalization vector projection
//!
//! Derives a fixed-length numeric feature vector from a profile and its
//! recent ledger history. Purely derived: nothing here is persisted, and
//! the vector is recomputed on demand.
//!
//! Column layout:
//!
//! | index   | feature                                        |
//! |---------|------------------------------------------------|
//! | 0       | safe-mode indicator (0 or 1)                   |
//! | 1       | enabled gateway count / 3                      |
//! | 2       | preferred gateway ordinal, encoded (idx+1)/3   |
//! | 3..6    | confidence for venmo, paypal, cashapp          |
//! | 6..16   | ten most recent ledger scores, newest first    |
//! | 16      | account-age days / 365, capped at 1.0          |
//! | 17..384 | zero padding                                   |

use crate::engine::ProfileEngine;
use crate::error::{Error, Result};
use crate::profile::types::PaymentGateway;
use chrono::{DateTime, Utc};

/// Fixed output width.
pub const VECTOR_LEN: usize = 384;
/// Ledger scores folded into the vector.
const RECENT_SCORES: usize = 10;

/// Read-only consumer of the profile engine and progress ledger.
pub struct PersonalizationProjector {
    engine: ProfileEngine,
}

impl PersonalizationProjector {
    pub fn new(engine: ProfileEngine) -> Self {
        Self { engine }
    }

    /// Build the 384-element feature vector for a user. Fails with
    /// `NotFound` when the profile does not exist.
    pub async fn build_vector(&self, user_id: &str) -> Result<Vec<f32>> {
        let profile = self
            .engine
            .get(user_id, false)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile '{}' does not exist", user_id)))?;
        let recent = self
            .engine
            .recent_progress(user_id, RECENT_SCORES as u32)
            .await?;

        let gateway_total = PaymentGateway::ALL.len() as f32;
        let mut vector = vec![0.0f32; VECTOR_LEN];
        vector[0] = if profile.safe_mode { 1.0 } else { 0.0 };
        vector[1] = profile.gateways.len() as f32 / gateway_total;
        vector[2] = (profile.preferred_gateway.ordinal() as f32 + 1.0) / gateway_total;
        for (i, gateway) in PaymentGateway::ALL.iter().enumerate() {
            vector[3 + i] = profile
                .gateway_confidence
                .get(gateway)
                .copied()
                .unwrap_or(0.0) as f32;
        }
        for (i, entry) in recent.iter().take(RECENT_SCORES).enumerate() {
            vector[6 + i] = entry.score as f32;
        }
        vector[16] = account_age_ratio(&profile.created_at);

        Ok(vector)
    }
}

/// Days since creation divided by 365, capped at 1.0. An unparseable
/// creation timestamp contributes 0.
fn account_age_ratio(created_at: &str) -> f32 {
    let Ok(created) = DateTime::parse_from_rfc3339(created_at) else {
        tracing::debug!(created_at, "unparseable creation timestamp");
        return 0.0;
    };
    let days = (Utc::now() - created.with_timezone(&Utc)).num_days();
    (days.max(0) as f32 / 365.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{memory_engine, profile};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_vector_shape_and_padding() {
        let engine = memory_engine();
        engine.create(&profile("@alice")).await.unwrap();

        let projector = PersonalizationProjector::new(engine);
        let vector = projector.build_vector("@alice").await.unwrap();

        assert_eq!(vector.len(), VECTOR_LEN);
        assert!(vector[17..].iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_vector_profile_columns() {
        let engine = memory_engine();
        let mut p = profile("@alice");
        p.safe_mode = true;
        p.gateways = vec![PaymentGateway::Venmo, PaymentGateway::Paypal];
        p.preferred_gateway = PaymentGateway::Paypal;
        p.gateway_confidence.insert(PaymentGateway::Venmo, 0.9);
        p.gateway_confidence.insert(PaymentGateway::Cashapp, 0.1);
        engine.create(&p).await.unwrap();

        let projector = PersonalizationProjector::new(engine);
        let vector = projector.build_vector("@alice").await.unwrap();

        assert_eq!(vector[0], 1.0);
        assert!((vector[1] - 2.0 / 3.0).abs() < 1e-6);
        assert!((vector[2] - 2.0 / 3.0).abs() < 1e-6); // paypal = ordinal 1
        assert!((vector[3] - 0.9).abs() < 1e-6); // venmo confidence
        assert_eq!(vector[4], 0.0); // paypal: no score recorded
        assert!((vector[5] - 0.1).abs() < 1e-6); // cashapp confidence
    }

    #[tokio::test]
    async fn test_vector_recent_scores_newest_first() {
        let engine = memory_engine();
        engine.create(&profile("@alice")).await.unwrap();
        for i in 0..3i64 {
            engine
                .append_progress(
                    "@alice",
                    &format!("m{}", i),
                    BTreeMap::new(),
                    0.1 * (i as f64 + 1.0),
                    Some(1_000 + i),
                    None,
                )
                .await
                .unwrap();
        }

        let projector = PersonalizationProjector::new(engine);
        let vector = projector.build_vector("@alice").await.unwrap();

        // Newest (0.3) first, then 0.2, 0.1, zero-padded to ten.
        assert!((vector[6] - 0.3).abs() < 1e-6);
        assert!((vector[7] - 0.2).abs() < 1e-6);
        assert!((vector[8] - 0.1).abs() < 1e-6);
        assert!(vector[9..16].iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_vector_account_age_capped() {
        let engine = memory_engine();
        let mut p = profile("@alice");
        p.created_at = "2000-01-01T00:00:00Z".to_string();
        engine.create(&p).await.unwrap();

        let projector = PersonalizationProjector::new(engine);
        let vector = projector.build_vector("@alice").await.unwrap();
        assert_eq!(vector[16], 1.0);
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_found() {
        let projector = PersonalizationProjector::new(memory_engine());
        assert!(matches!(
            projector.build_vector("@nobody").await,
            Err(Error::NotFound(_))
        ));
    }
}
