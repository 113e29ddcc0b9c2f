// Domain types - pure validation, no side effects
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Deserialize;

use crate::db::models::Voucher;

pub const MAX_GENERATE_COUNT: i64 = 100;
pub const MAX_EXPIRY_DAYS: i64 = 3650;
pub const VOUCHER_TYPES: [&str; 2] = ["free_trial", "discount"];

const BASE36: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Why a voucher cannot be redeemed right now.
pub fn validate_voucher(
    voucher: &Voucher,
    app_user_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), &'static str> {
    let expired = DateTime::parse_from_rfc3339(&voucher.expiry_date)
        .map(|expiry| expiry < now)
        .unwrap_or(true);
    if expired {
        return Err("Voucher has expired");
    }
    if voucher.is_used {
        return Err("Voucher has already been used");
    }
    if voucher.current_uses >= voucher.max_uses {
        return Err("Voucher has reached maximum uses");
    }
    if let (Some(_), Some(app_user_id)) = (&voucher.assigned_to, app_user_id) {
        if voucher.assigned_customer_id.as_deref() != Some(app_user_id) {
            return Err("This voucher is assigned to a different user");
        }
    }
    Ok(())
}

/// RevenueCat promotional duration for a voucher length in months.
pub fn promotional_duration(months: i64) -> &'static str {
    match months {
        2 => "two_month",
        3 => "three_month",
        6 => "six_month",
        12 => "yearly",
        _ => "monthly",
    }
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

/// `PREFIX-<base36 millis>-<6 random base36>`, upper case.
pub fn generate_code(prefix: &str, now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u64;
    let mut rng = rand::thread_rng();
    let random: String = (0..6)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("{}-{}-{}", prefix, to_base36(millis), random)
}

fn default_count() -> i64 {
    1
}
fn default_type() -> String {
    "free_trial".into()
}
fn default_duration() -> i64 {
    1
}
fn default_expiry_days() -> i64 {
    30
}
fn default_prefix() -> String {
    "BV".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    #[serde(default = "default_count")]
    pub count: i64,
    #[serde(rename = "type", default = "default_type")]
    pub voucher_type: String,
    #[serde(default = "default_duration")]
    pub duration_months: i64,
    #[serde(default = "default_expiry_days")]
    pub expiry_days: i64,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl GenerateRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(1..=MAX_GENERATE_COUNT).contains(&self.count) {
            return Err("Count must be between 1 and 100");
        }
        if !VOUCHER_TYPES.contains(&self.voucher_type.as_str()) {
            return Err("type must be free_trial or discount");
        }
        if self.duration_months < 1 {
            return Err("duration_months must be at least 1");
        }
        if !(0..=MAX_EXPIRY_DAYS).contains(&self.expiry_days) {
            return Err("expiry_days must be between 0 and 3650");
        }
        if self.prefix.trim().is_empty() {
            return Err("prefix must not be empty");
        }
        Ok(())
    }
}
