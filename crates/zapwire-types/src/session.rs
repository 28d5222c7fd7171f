use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Identifier of a logical account (one connection to the messaging endpoint).
///
/// Wraps the numeric primary key of the persisted account row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl AccountId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Connection status of a session, as recorded and broadcast.
///
/// Transitions are driven by the lifecycle manager and the monitor; see the
/// state machine in `zapwire-core::session::lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// A lifecycle attempt is starting (or restarting) for this account.
    Opening,
    /// A QR code is pending scan by the account owner.
    Qrcode,
    /// Credentials accepted; waiting for the client to finish loading.
    Authenticated,
    /// Fully usable.
    Connected,
    /// No live client for this account.
    Disconnected,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Opening => write!(f, "opening"),
            SessionStatus::Qrcode => write!(f, "qrcode"),
            SessionStatus::Authenticated => write!(f, "authenticated"),
            SessionStatus::Connected => write!(f, "connected"),
            SessionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opening" => Ok(SessionStatus::Opening),
            "qrcode" => Ok(SessionStatus::Qrcode),
            "authenticated" => Ok(SessionStatus::Authenticated),
            "connected" => Ok(SessionStatus::Connected),
            "disconnected" => Ok(SessionStatus::Disconnected),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

/// Persisted state of one account's session.
///
/// Owned by the persistence collaborator; the lifecycle manager keeps a
/// working copy and applies [`SessionPatch`]es to it before each store call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: AccountId,
    /// Freeform display name for the connection.
    pub name: String,
    pub status: SessionStatus,
    /// Transient QR payload; empty once the session is promoted.
    pub qrcode: String,
    /// Serialized credential blob; cleared when authentication keeps failing
    /// or after a disconnect that requires a fresh pairing.
    pub credential: String,
    /// Consecutive authentication failures for this account.
    pub retries: u32,
    /// Last reported battery level of the paired device, if any.
    pub battery: Option<u8>,
    /// Whether the paired device was plugged in at the last battery report.
    pub plugged: Option<bool>,
    /// Marks the default connection when several accounts are configured.
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a fresh record for an account that has never connected.
    pub fn new(id: AccountId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            status: SessionStatus::Opening,
            qrcode: String::new(),
            credential: String::new(),
            retries: 0,
            battery: None,
            plugged: None,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update to this record, bumping `updated_at`.
    pub fn apply(&mut self, patch: &SessionPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(qrcode) = &patch.qrcode {
            self.qrcode = qrcode.clone();
        }
        if let Some(credential) = &patch.credential {
            self.credential = credential.clone();
        }
        if let Some(retries) = patch.retries {
            self.retries = retries;
        }
        if let Some(battery) = patch.battery {
            self.battery = Some(battery);
        }
        if let Some(plugged) = patch.plugged {
            self.plugged = Some(plugged);
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update for a [`SessionRecord`].
///
/// Safe to build with any subset of fields; `None` fields are left untouched
/// by both [`SessionRecord::apply`] and the persistence collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub qrcode: Option<String>,
    pub credential: Option<String>,
    pub retries: Option<u32>,
    pub battery: Option<u8>,
    pub plugged: Option<bool>,
}
