use sqlx::FromRow;

use crate::database::converters::*;
use crate::database::repositories::errors::{RepositoryError, RepositoryResult};
use crate::domain::{InputSource, InputSourceKind};

#[derive(Debug, Clone, FromRow)]
pub struct InputSourceRow {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub credential_id: Option<i64>,
    pub config: String,
    pub is_active: bool,
    pub last_sync_at: Option<String>,
}

impl InputSourceRow {
    pub fn into_domain(self) -> RepositoryResult<InputSource> {
        Ok(InputSource {
            id: self.id,
            user_id: self.user_id,
            kind: match self.kind.as_str() {
                "meeting_provider" => InputSourceKind::MeetingProvider,
                "url_list" => InputSourceKind::UrlList,
                "cloud_folder" => InputSourceKind::CloudFolder,
                "local" => InputSourceKind::Local,
                other => {
                    return Err(RepositoryError::Validation(format!(
                        "unknown input source kind: {other}"
                    )))
                }
            },
            credential_id: self.credential_id,
            config: string_to_value(&self.config)?,
            is_active: self.is_active,
            last_sync_at: optional_string_to_datetime(&self.last_sync_at)?,
        })
    }

    pub fn from_domain(s: &InputSource) -> RepositoryResult<Self> {
        Ok(Self {
            id: s.id,
            user_id: s.user_id,
            kind: match s.kind {
                InputSourceKind::MeetingProvider => "meeting_provider",
                InputSourceKind::UrlList => "url_list",
                InputSourceKind::CloudFolder => "cloud_folder",
                InputSourceKind::Local => "local",
            }
            .to_string(),
            credential_id: s.credential_id,
            config: value_to_string(&s.config)?,
            is_active: s.is_active,
            last_sync_at: optional_datetime_to_string(&s.last_sync_at),
        })
    }
}
