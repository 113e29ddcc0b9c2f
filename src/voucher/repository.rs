use rusqlite::{params, OptionalExtension};

use crate::db::models::Voucher;
use crate::error::AppResult;
use crate::state::DbPool;

/// Look up a voucher by code, joining in the assigned user's RevenueCat id.
pub fn find_by_code(pool: &DbPool, code: &str) -> AppResult<Option<Voucher>> {
    let conn = pool.get()?;
    Ok(conn
        .query_row(
            "SELECT v.*, u.revenuecat_customer_id AS assigned_customer_id
             FROM vouchers v
             LEFT JOIN users u ON u.id = v.assigned_to
             WHERE v.code = ?1",
            params![code],
            Voucher::from_row,
        )
        .optional()?)
}

/// Record a redemption. The update only applies while the voucher is still
/// unused, so two racing redemptions cannot both succeed. Returns whether
/// this call won.
pub fn mark_redeemed(pool: &DbPool, voucher_id: i64, redeemed_at: &str) -> AppResult<bool> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE vouchers
         SET is_used = 1, redeemed_at = ?2, current_uses = current_uses + 1
         WHERE id = ?1 AND is_used = 0 AND current_uses < max_uses",
        params![voucher_id, redeemed_at],
    )?;
    Ok(rows == 1)
}

/// Flag a user as premium, linking the RevenueCat customer when the user has
/// none yet.
pub fn set_premium_for_user(pool: &DbPool, user_id: &str, customer_id: &str) -> AppResult<bool> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "UPDATE users
         SET is_premium = 1,
             revenuecat_customer_id = COALESCE(revenuecat_customer_id, ?2)
         WHERE id = ?1",
        params![user_id, customer_id],
    )?;
    Ok(rows == 1)
}

/// Insert freshly generated codes in one transaction.
pub fn insert_batch(
    pool: &DbPool,
    codes: &[String],
    voucher_type: &str,
    duration_months: i64,
    expiry_date: &str,
) -> AppResult<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO vouchers (code, voucher_type, duration_months, expiry_date, max_uses, current_uses)
             VALUES (?1, ?2, ?3, ?4, 1, 0)",
        )?;
        for code in codes {
            insert.execute(params![code, voucher_type, duration_months, expiry_date])?;
        }
    }
    tx.commit()?;
    Ok(())
}
