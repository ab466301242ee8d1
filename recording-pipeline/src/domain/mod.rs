//! Core domain entities and value objects.
//!
//! These types are persistence-agnostic; the `database` module maps them
//! to and from SQLite rows.

pub mod automation_job;
pub mod credential;
pub mod input_source;
pub mod output_preset;
pub mod output_target;
pub mod processing_stage;
pub mod quota;
pub mod recording;
pub mod source_metadata;
pub mod stage_timing;
pub mod subscription;
pub mod template;
pub mod user;

pub use automation_job::AutomationJob;
pub use credential::CredentialEnvelope;
pub use input_source::InputSource;
pub use output_preset::OutputPreset;
pub use output_target::{OutputTarget, TargetStatus};
pub use processing_stage::{ProcessingStage, StageStatus, StageType};
pub use quota::QuotaUsage;
pub use recording::{DeleteState, Recording, RecordingStatus};
pub use source_metadata::SourceMetadata;
pub use stage_timing::StageTiming;
pub use subscription::{SubscriptionPlan, UserSubscription};
pub use template::{MatchReason, MatchingRules, RecordingTemplate};
pub use user::User;
