//! SQLite row shapes and their conversions to/from domain entities.

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

pub use automation_job::AutomationJobRow;
pub use credential::CredentialRow;
pub use input_source::InputSourceRow;
pub use output_preset::OutputPresetRow;
pub use output_target::OutputTargetRow;
pub use processing_stage::ProcessingStageRow;
pub use quota::QuotaUsageRow;
pub use recording::RecordingRow;
pub use source_metadata::SourceMetadataRow;
pub use stage_timing::StageTimingRow;
pub use subscription::{SubscriptionPlanRow, UserSubscriptionRow};
pub use template::RecordingTemplateRow;
pub use user::UserRow;
