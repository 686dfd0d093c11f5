//! Profile document model, validation, and legacy-shape repair

pub mod repair;
pub mod types;
pub mod validate;

pub use types::{
    IntegrityLock, MilestoneStamp, PaymentGateway, Profile, ProfilePatch, ProgressEntry,
    SubscriptionTier,
};
pub use validate::{ProfileValidator, StandardValidator};
