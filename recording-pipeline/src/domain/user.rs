//! `User` — tenant root (§3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Stable ordinal used in filesystem paths (`user_{slug:06d}`), distinct
    /// from `id` so that path layout survives id renumbering/migration.
    pub slug: u32,
    pub role: UserRole,
    pub timezone: String,
    pub is_active: bool,
    /// System defaults merged with user overrides (lowest layer in §4.3).
    pub config: serde_json::Value,
}
