use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer};

use crate::db::models::BabyProfile;

pub const MAX_PREMATURE_WEEKS: i64 = 20;

const REQUIRED: &str = "Name and birthdate are required";
const BAD_BIRTHDATE: &str = "Invalid birthdate format. Use YYYY-MM-DD";
const BAD_WEEKS: &str = "premature_weeks must be between 1 and 20 when is_premature is true";

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Body of a create or update request. Every field is optional so the same
/// shape serves partial updates; nullable fields keep `null` apart from
/// "not supplied".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    pub name: Option<String>,
    pub birthdate: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub avatar_url: Option<Option<String>>,
    pub is_premature: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub premature_weeks: Option<Option<i64>>,
}

/// A complete, validated set of profile fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub name: String,
    /// Always `YYYY-MM-DD`.
    pub birthdate: String,
    pub avatar_url: Option<String>,
    pub is_premature: bool,
    pub premature_weeks: Option<i64>,
}

/// Accepts a calendar date or a full RFC 3339 instant, keeping only the date.
pub fn parse_birthdate(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive().format("%Y-%m-%d").to_string())
}

impl ProfileFields {
    fn validated(self) -> Result<Self, String> {
        let name = self.name.trim().to_string();
        if name.is_empty() || self.birthdate.trim().is_empty() {
            return Err(REQUIRED.into());
        }
        let birthdate = parse_birthdate(&self.birthdate).ok_or_else(|| BAD_BIRTHDATE.to_string())?;

        let premature_weeks = if self.is_premature {
            match self.premature_weeks {
                Some(w) if (1..=MAX_PREMATURE_WEEKS).contains(&w) => Some(w),
                _ => return Err(BAD_WEEKS.into()),
            }
        } else {
            None
        };

        Ok(Self {
            name,
            birthdate,
            avatar_url: self.avatar_url.filter(|u| !u.trim().is_empty()),
            is_premature: self.is_premature,
            premature_weeks,
        })
    }

    pub fn from_create(input: ProfileInput) -> Result<Self, String> {
        let (Some(name), Some(birthdate)) = (input.name, input.birthdate) else {
            return Err(REQUIRED.into());
        };
        Self {
            name,
            birthdate,
            avatar_url: input.avatar_url.flatten(),
            is_premature: input.is_premature.unwrap_or(false),
            premature_weeks: input.premature_weeks.flatten(),
        }
        .validated()
    }

    /// Overlay the supplied fields on an existing profile, then validate the
    /// result as a whole.
    pub fn merge(existing: &BabyProfile, patch: ProfileInput) -> Result<Self, String> {
        Self {
            name: patch.name.unwrap_or_else(|| existing.name.clone()),
            birthdate: patch
                .birthdate
                .unwrap_or_else(|| existing.birthdate.clone()),
            avatar_url: match patch.avatar_url {
                Some(url) => url,
                None => existing.avatar_url.clone(),
            },
            is_premature: patch.is_premature.unwrap_or(existing.is_premature),
            premature_weeks: match patch.premature_weeks {
                Some(weeks) => weeks,
                None => existing.premature_weeks,
            },
        }
        .validated()
    }
}
