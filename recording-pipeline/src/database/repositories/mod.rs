//! Repository traits and their SQLite implementations. Each entity gets a
//! trait (for test doubles / mocking) and a `Sqlite*` struct that is the
//! only code permitted to mutate that entity's rows.

pub mod automation_job;
pub mod credential;
pub mod errors;
pub mod input_source;
pub mod output_preset;
pub mod quota;
pub mod recording;
pub mod refresh_token;
pub mod stage_timing;
pub mod subscription;
pub mod template;
pub mod user;

pub use automation_job::{AutomationJobRepository, SqliteAutomationJobRepository};
pub use credential::{CredentialRepository, SqliteCredentialRepository};
pub use input_source::{InputSourceRepository, SqliteInputSourceRepository};
pub use output_preset::{OutputPresetRepository, SqliteOutputPresetRepository};
pub use quota::{QuotaRepository, SqliteQuotaRepository};
pub use recording::{Pagination, RecordingFilters, RecordingRepository, SqliteRecordingRepository};
pub use refresh_token::{RefreshTokenRepository, SqliteRefreshTokenRepository};
pub use stage_timing::{SqliteStageTimingRepository, StageTimingRepository};
pub use subscription::{SqliteSubscriptionRepository, SubscriptionRepository};
pub use template::{SqliteTemplateRepository, TemplateRepository};
pub use user::{SqliteUserRepository, UserRepository};
