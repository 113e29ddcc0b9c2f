use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub is_admin: bool,
    pub is_premium: bool,
    pub revenuecat_customer_id: Option<String>,
    pub created_at: String,
}

impl User {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
            email: row.get("email")?,
            password_hash: row.get("password_hash")?,
            is_admin: row.get("is_admin")?,
            is_premium: row.get("is_premium")?,
            revenuecat_customer_id: row.get("revenuecat_customer_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BabyProfile {
    pub id: i64,
    #[serde(rename = "documentId")]
    pub document_id: String,
    #[serde(skip)]
    pub user_id: String,
    pub name: String,
    pub birthdate: String,
    pub avatar_url: Option<String>,
    pub is_premature: bool,
    pub premature_weeks: Option<i64>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl BabyProfile {
    pub const COLUMNS: &'static str = "id, document_id, user_id, name, birthdate, avatar_url, \
         is_premature, premature_weeks, created_at, updated_at";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            birthdate: row.get("birthdate")?,
            avatar_url: row.get("avatar_url")?,
            is_premature: row.get("is_premature")?,
            premature_weeks: row.get("premature_weeks")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Server-side activity row as returned to sync clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    #[serde(rename = "documentId")]
    pub document_id: String,
    pub local_id: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub timestamp: String,
    pub data: serde_json::Value,
    pub synced_at: Option<String>,
    pub deleted_at: Option<String>,
    pub client_updated_at: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    #[serde(skip)]
    pub user_id: String,
    #[serde(skip)]
    pub baby_profile_id: i64,
}

impl ActivityRecord {
    pub const COLUMNS: &'static str = "id, document_id, local_id, activity_type, timestamp, data, \
         synced_at, deleted_at, client_updated_at, created_at, updated_at, user_id, baby_profile_id";

    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let data: Option<String> = row.get("data")?;
        let data = match data {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    5,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
            None => serde_json::Value::Null,
        };

        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            local_id: row.get("local_id")?,
            activity_type: row.get("activity_type")?,
            timestamp: row.get("timestamp")?,
            data,
            synced_at: row.get("synced_at")?,
            deleted_at: row.get("deleted_at")?,
            client_updated_at: row.get("client_updated_at")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            user_id: row.get("user_id")?,
            baby_profile_id: row.get("baby_profile_id")?,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    pub id: i64,
    pub code: String,
    pub voucher_type: String,
    pub duration_months: i64,
    pub is_used: bool,
    pub expiry_date: String,
    pub assigned_to: Option<String>,
    /// RevenueCat customer id of the assigned user, joined in on load.
    pub assigned_customer_id: Option<String>,
    pub redeemed_at: Option<String>,
    pub max_uses: i64,
    pub current_uses: i64,
}

impl Voucher {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            code: row.get("code")?,
            voucher_type: row.get("voucher_type")?,
            duration_months: row.get("duration_months")?,
            is_used: row.get("is_used")?,
            expiry_date: row.get("expiry_date")?,
            assigned_to: row.get("assigned_to")?,
            assigned_customer_id: row.get("assigned_customer_id")?,
            redeemed_at: row.get("redeemed_at")?,
            max_uses: row.get("max_uses")?,
            current_uses: row.get("current_uses")?,
        })
    }
}
