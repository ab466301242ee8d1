//! `CredentialEnvelope` — opaque encrypted blob, identified by
//! (user, platform, account) (§3). Encryption itself is an external
//! collaborator (§1); the core only stores and references the envelope.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEnvelope {
    pub id: i64,
    pub user_id: i64,
    pub platform: String,
    pub account_name: String,
    /// Opaque ciphertext; the core never inspects this.
    pub encrypted_blob: Vec<u8>,
}
