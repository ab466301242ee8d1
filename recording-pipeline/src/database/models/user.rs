use sqlx::FromRow;

use crate::database::converters::*;
use crate::database::repositories::errors::RepositoryResult;
use crate::domain::{User, UserRole};

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub slug: i64,
    pub role: String,
    pub timezone: String,
    pub is_active: bool,
    pub config: String,
}

impl UserRow {
    pub fn into_domain(self) -> RepositoryResult<User> {
        Ok(User {
            id: self.id,
            slug: self.slug as u32,
            role: match self.role.as_str() {
                "admin" => UserRole::Admin,
                "member" => UserRole::Member,
                other => {
                    return Err(crate::database::repositories::errors::RepositoryError::Validation(
                        format!("unknown user role: {other}"),
                    ))
                }
            },
            timezone: self.timezone,
            is_active: self.is_active,
            config: string_to_value(&self.config)?,
        })
    }

    pub fn from_domain(u: &User) -> RepositoryResult<Self> {
        Ok(Self {
            id: u.id,
            slug: u.slug as i64,
            role: match u.role {
                UserRole::Admin => "admin".to_string(),
                UserRole::Member => "member".to_string(),
            },
            timezone: u.timezone.clone(),
            is_active: u.is_active,
            config: value_to_string(&u.config)?,
        })
    }
}
