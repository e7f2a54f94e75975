use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_ACCEPTED: &str = "accepted";
pub const STATUS_CANCELLED: &str = "cancelled";

/// Linha de `invitations`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Convite {
    pub id: String,
    pub token: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: String,
    pub gabinete_id: String,
    #[serde(default)]
    pub invited_by: Option<String>,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Corpo de `POST /convites`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NovoConvite {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub role: String,
    pub gabinete_id: String,
}

/// Corpo de `POST /convites/link`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GerarLinkRequest {
    pub email: String,
    pub role: String,
    /// Token gravado no convite
    #[serde(alias = "invitation_id")]
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConviteCriado {
    pub invitation: Convite,
    pub action_link: String,
}
