// Domain types - pure validation, no side effects
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::db::normalize_timestamp;
use crate::error::FieldError;

/// Largest batch a single push may carry.
pub const MAX_PUSH_BATCH: usize = 500;
/// Largest page a single pull may return.
pub const MAX_PULL_LIMIT: i64 = 500;
pub const MAX_BULK_DELETE: usize = 100;
pub const DEFAULT_LIST_PAGE_SIZE: i64 = 25;
pub const MAX_LIST_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Feeding,
    Sleep,
    Pee,
    Poop,
    Weight,
    Solid,
}

impl ActivityType {
    pub const ALL: [ActivityType; 6] = [
        ActivityType::Feeding,
        ActivityType::Sleep,
        ActivityType::Pee,
        ActivityType::Poop,
        ActivityType::Weight,
        ActivityType::Solid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Feeding => "feeding",
            ActivityType::Sleep => "sleep",
            ActivityType::Pee => "pee",
            ActivityType::Poop => "poop",
            ActivityType::Weight => "weight",
            ActivityType::Solid => "solid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }

    /// Check the type-specific payload. Returns the first problem found.
    pub fn validate_payload(&self, data: &Value) -> Result<(), String> {
        let data = data
            .as_object()
            .ok_or_else(|| "data must be an object".to_string())?;

        match self {
            ActivityType::Feeding => {
                let amount = data.get("amountMl").and_then(Value::as_f64);
                if !amount.is_some_and(|ml| ml >= 0.0) {
                    return Err("amountMl must be a non-negative number".into());
                }
                require_one_of(
                    data,
                    "feedingType",
                    &["breast", "bottle", "formula"],
                    "feedingType must be breast, bottle, or formula",
                )
            }
            ActivityType::Sleep => {
                require_one_of(
                    data,
                    "sleepType",
                    &["night", "nap"],
                    "sleepType must be night or nap",
                )?;
                optional_one_of(
                    data,
                    "quality",
                    &["poor", "fair", "good", "excellent"],
                    "quality must be poor, fair, good, or excellent",
                )
            }
            ActivityType::Pee => require_one_of(
                data,
                "wetLevel",
                &["light", "normal", "heavy"],
                "wetLevel must be light, normal, or heavy",
            ),
            ActivityType::Poop => {
                require_one_of(
                    data,
                    "color",
                    &["yellow", "green", "brown", "black", "red", "white"],
                    "color must be yellow, green, brown, black, red, or white",
                )?;
                require_one_of(
                    data,
                    "consistency",
                    &["watery", "soft", "normal", "hard"],
                    "consistency must be watery, soft, normal, or hard",
                )?;
                require_one_of(
                    data,
                    "amount",
                    &["small", "normal", "large"],
                    "amount must be small, normal, or large",
                )
            }
            ActivityType::Weight => {
                let weight = data.get("weightKg").and_then(Value::as_f64);
                if !weight.is_some_and(|kg| kg > 0.0) {
                    return Err("weightKg must be a positive number".into());
                }
                Ok(())
            }
            ActivityType::Solid => {
                require_one_of(
                    data,
                    "mealType",
                    &["breakfast", "lunch", "dinner", "snack"],
                    "mealType must be breakfast, lunch, dinner, or snack",
                )?;
                if !data.get("foodItems").is_some_and(Value::is_array) {
                    return Err("foodItems must be an array".into());
                }
                optional_one_of(
                    data,
                    "amount",
                    &["small", "medium", "large"],
                    "amount must be small, medium, or large",
                )
            }
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn require_one_of(
    data: &Map<String, Value>,
    field: &str,
    allowed: &[&str],
    message: &str,
) -> Result<(), String> {
    match data.get(field).and_then(Value::as_str) {
        Some(v) if allowed.contains(&v) => Ok(()),
        _ => Err(message.to_string()),
    }
}

fn optional_one_of(
    data: &Map<String, Value>,
    field: &str,
    allowed: &[&str],
    message: &str,
) -> Result<(), String> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(()),
        Some(_) => require_one_of(data, field, allowed, message),
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// One activity entry exactly as a client pushes it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientActivity {
    pub local_id: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: Option<String>,
    pub timestamp: Option<String>,
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub deleted_at: Option<Option<String>>,
    pub client_updated_at: Option<String>,
}

/// A validated entry, ready to be applied to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityChange {
    pub local_id: String,
    pub activity_type: ActivityType,
    pub timestamp: String,
    /// `None` keeps whatever payload the server already has.
    pub data: Option<Value>,
    /// `None` leaves the soft-delete marker alone, `Some(None)` clears it.
    pub deleted_at: Option<Option<String>>,
    pub client_updated_at: Option<String>,
}

impl ActivityChange {
    pub fn is_soft_delete(&self) -> bool {
        matches!(self.deleted_at, Some(Some(_)))
    }
}

impl ClientActivity {
    fn into_change(self, index: usize) -> Result<ActivityChange, FieldError> {
        let local_id = match self.local_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(field_error(index, "missing", "local_id is required")),
        };
        let fail = |error: &str| field_error(index, &local_id, error);

        let activity_type = self
            .activity_type
            .as_deref()
            .and_then(ActivityType::parse)
            .ok_or_else(|| fail("Invalid activity type"))?;

        let timestamp = match self.timestamp.as_deref() {
            None | Some("") => return Err(fail("timestamp is required")),
            Some(raw) => normalize_timestamp(raw)
                .ok_or_else(|| fail("timestamp must be an ISO 8601 timestamp"))?,
        };

        let deleted_at = match self.deleted_at {
            None => None,
            Some(None) => Some(None),
            Some(Some(raw)) if raw.trim().is_empty() => Some(None),
            Some(Some(raw)) => Some(Some(
                normalize_timestamp(&raw)
                    .ok_or_else(|| fail("deleted_at must be an ISO 8601 timestamp"))?,
            )),
        };

        let client_updated_at = match self.client_updated_at.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                normalize_timestamp(raw)
                    .ok_or_else(|| fail("client_updated_at must be an ISO 8601 timestamp"))?,
            ),
        };

        let data = self.data.filter(|d| !d.is_null());
        let deleting = matches!(deleted_at, Some(Some(_)));
        if !deleting {
            let payload = data.as_ref().unwrap_or(&Value::Null);
            activity_type
                .validate_payload(payload)
                .map_err(|e| fail(e.as_str()))?;
        }

        Ok(ActivityChange {
            local_id,
            activity_type,
            timestamp,
            data,
            deleted_at,
            client_updated_at,
        })
    }
}

fn field_error(index: usize, local_id: &str, error: &str) -> FieldError {
    FieldError {
        index,
        local_id: local_id.to_string(),
        error: error.to_string(),
    }
}

/// Validate a whole push batch up front. Either every entry is valid, or the
/// caller gets one error per offending index.
pub fn validate_batch(entries: &[Value]) -> Result<Vec<ActivityChange>, Vec<FieldError>> {
    let mut changes = Vec::with_capacity(entries.len());
    let mut errors = Vec::new();

    for (index, entry) in entries.iter().enumerate() {
        let parsed = serde_json::from_value::<ClientActivity>(entry.clone()).map_err(|e| {
            let local_id = entry
                .get("local_id")
                .and_then(Value::as_str)
                .unwrap_or("missing");
            field_error(index, local_id, &format!("Malformed activity entry: {}", e))
        });

        match parsed.and_then(|raw| raw.into_change(index)) {
            Ok(change) => changes.push(change),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(changes)
    } else {
        Err(errors)
    }
}

/// A page window for sync pulls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullWindow {
    pub limit: i64,
    pub offset: i64,
}

impl PullWindow {
    /// Lenient parsing: a missing, zero or garbled limit means "full page",
    /// negative values are clamped.
    pub fn parse(limit: Option<&str>, offset: Option<&str>) -> Self {
        let limit = match limit.and_then(|l| l.trim().parse::<i64>().ok()) {
            None | Some(0) => MAX_PULL_LIMIT,
            Some(l) => l.clamp(1, MAX_PULL_LIMIT),
        };
        let offset = offset
            .and_then(|o| o.trim().parse::<i64>().ok())
            .unwrap_or(0)
            .max(0);
        Self { limit, offset }
    }
}

/// Filters for the plain (non-sync) activity listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    pub activity_type: Option<ActivityType>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub include_deleted: bool,
    pub page: i64,
    pub page_size: i64,
}

impl ListFilter {
    pub fn parse(
        activity_type: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
        include_deleted: Option<&str>,
        page: Option<&str>,
        page_size: Option<&str>,
    ) -> Self {
        let page = match page.and_then(|p| p.trim().parse::<i64>().ok()) {
            None | Some(0) => 1,
            Some(p) => p.max(1),
        };
        let page_size = match page_size.and_then(|p| p.trim().parse::<i64>().ok()) {
            None | Some(0) => DEFAULT_LIST_PAGE_SIZE,
            Some(p) => p.clamp(1, MAX_LIST_PAGE_SIZE),
        };

        Self {
            // Unknown types are ignored rather than rejected
            activity_type: activity_type.and_then(ActivityType::parse),
            from: from.and_then(normalize_timestamp),
            to: to.and_then(normalize_timestamp),
            include_deleted: include_deleted == Some("true"),
            page,
            page_size,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub created: u64,
    pub updated: u64,
    #[serde(rename = "softDeleted")]
    pub soft_deleted: u64,
    /// Server time stamped on every row of the batch.
    #[serde(rename = "syncedAt")]
    pub synced_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkDeleteOutcome {
    pub deleted: u64,
    pub not_found: Vec<String>,
}
