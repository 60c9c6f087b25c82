//! Balance bookkeeping over an open unit of work.
//!
//! Deductions are pre-checked against `total - used` and fail with
//! `InsufficientBalance`; restores clamp at zero and never fail;
//! administrative total overrides may create a deficit on purpose.

use chrono::Utc;

use crate::error::{EngineError, EngineResult};
use crate::model::ledger::{AnnualLeaveBalance, CompLeaveEntry};
use crate::store::UnitOfWork;

/// Annual days still available, counting an absent row as a fresh balance
/// of `default_total` days.
pub async fn remaining_annual(
    uow: &mut dyn UnitOfWork,
    user_id: u64,
    year: i32,
    default_total: f64,
) -> EngineResult<f64> {
    Ok(match uow.find_annual_balance(user_id, year).await? {
        Some(balance) => balance.remaining(),
        None => default_total,
    })
}

/// Comp hours still available across the user's grant entries for the year.
pub async fn remaining_comp(uow: &mut dyn UnitOfWork, user_id: u64, year: i32) -> EngineResult<f64> {
    let entries = uow.comp_entries(user_id, year).await?;
    Ok(entries.iter().map(CompLeaveEntry::remaining).sum())
}

/// Deducts annual days, creating the balance row with the default total if
/// the user has none for the year yet.
pub async fn deduct_annual(
    uow: &mut dyn UnitOfWork,
    user_id: u64,
    year: i32,
    days: f64,
    default_total: f64,
) -> EngineResult<AnnualLeaveBalance> {
    let mut balance = match uow.find_annual_balance(user_id, year).await? {
        Some(balance) => balance,
        None => AnnualLeaveBalance {
            user_id,
            year,
            total_days: default_total,
            used_days: 0.0,
            updated_at: Utc::now(),
        },
    };

    if balance.remaining() < days {
        return Err(EngineError::InsufficientBalance(format!(
            "{} annual days remaining, {} requested",
            balance.remaining(),
            days
        )));
    }

    balance.used_days += days;
    balance.updated_at = Utc::now();
    uow.upsert_annual_balance(&balance).await?;
    Ok(balance)
}

/// Gives annual days back, clamping used days at zero. A missing balance
/// row means there is nothing to restore.
pub async fn restore_annual(
    uow: &mut dyn UnitOfWork,
    user_id: u64,
    year: i32,
    days: f64,
) -> EngineResult<()> {
    if let Some(mut balance) = uow.find_annual_balance(user_id, year).await? {
        balance.used_days = (balance.used_days - days).max(0.0);
        balance.updated_at = Utc::now();
        uow.upsert_annual_balance(&balance).await?;
    }
    Ok(())
}

/// Consumes comp hours FIFO across the year's grant entries.
pub async fn deduct_comp(
    uow: &mut dyn UnitOfWork,
    user_id: u64,
    year: i32,
    hours: f64,
) -> EngineResult<()> {
    let entries = uow.comp_entries(user_id, year).await?;
    let available: f64 = entries.iter().map(CompLeaveEntry::remaining).sum();
    if available < hours {
        return Err(EngineError::InsufficientBalance(format!(
            "{} comp hours remaining, {} requested",
            available, hours
        )));
    }

    let mut left = hours;
    for mut entry in entries {
        if left <= 0.0 {
            break;
        }
        let take = entry.remaining().min(left);
        if take <= 0.0 {
            continue;
        }
        entry.used_hours += take;
        entry.updated_at = Utc::now();
        left -= take;
        uow.update_comp_entry(&entry).await?;
    }
    Ok(())
}

/// Gives comp hours back, newest grants first, clamping each entry at zero
/// used hours. Never fails.
pub async fn restore_comp(
    uow: &mut dyn UnitOfWork,
    user_id: u64,
    year: i32,
    hours: f64,
) -> EngineResult<()> {
    let mut entries = uow.comp_entries(user_id, year).await?;
    entries.reverse();

    let mut left = hours;
    for mut entry in entries {
        if left <= 0.0 {
            break;
        }
        let give = entry.used_hours.min(left);
        if give <= 0.0 {
            continue;
        }
        entry.used_hours -= give;
        entry.updated_at = Utc::now();
        left -= give;
        uow.update_comp_entry(&entry).await?;
    }
    Ok(())
}

/// Records a comp-leave grant, linked to the source document when the hours
/// come from approved overtime.
pub async fn grant_comp(
    uow: &mut dyn UnitOfWork,
    user_id: u64,
    year: i32,
    hours: f64,
    document_id: Option<u64>,
    description: String,
) -> EngineResult<CompLeaveEntry> {
    let mut entry = CompLeaveEntry {
        id: 0,
        user_id,
        year,
        document_id,
        total_hours: hours,
        used_hours: 0.0,
        description,
        updated_at: Utc::now(),
    };
    entry.id = uow.insert_comp_entry(&entry).await?;
    Ok(entry)
}

/// Administrative override of the annual total. Deliberately unchecked
/// against used days: a deficit is surfaced to the caller, not rejected.
pub async fn set_annual_total(
    uow: &mut dyn UnitOfWork,
    user_id: u64,
    year: i32,
    total_days: f64,
) -> EngineResult<AnnualLeaveBalance> {
    let mut balance = match uow.find_annual_balance(user_id, year).await? {
        Some(balance) => balance,
        None => AnnualLeaveBalance {
            user_id,
            year,
            total_days: 0.0,
            used_days: 0.0,
            updated_at: Utc::now(),
        },
    };
    balance.total_days = total_days;
    balance.updated_at = Utc::now();
    uow.upsert_annual_balance(&balance).await?;
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use crate::store::memory::MemoryStore;

    #[actix_web::test]
    async fn deduct_annual_pre_checks_the_balance() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();

        let balance = deduct_annual(uow.as_mut(), 10, 2025, 3.0, 15.0).await.unwrap();
        assert_eq!(balance.total_days, 15.0);
        assert_eq!(balance.used_days, 3.0);

        let err = deduct_annual(uow.as_mut(), 10, 2025, 13.0, 15.0)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance(_)));

        // the failed deduction wrote nothing
        let balance = uow.find_annual_balance(10, 2025).await.unwrap().unwrap();
        assert_eq!(balance.used_days, 3.0);
    }

    #[actix_web::test]
    async fn restore_annual_clamps_at_zero() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();

        deduct_annual(uow.as_mut(), 10, 2025, 2.0, 15.0).await.unwrap();
        restore_annual(uow.as_mut(), 10, 2025, 5.0).await.unwrap();

        let balance = uow.find_annual_balance(10, 2025).await.unwrap().unwrap();
        assert_eq!(balance.used_days, 0.0);
    }

    #[actix_web::test]
    async fn comp_consumption_is_fifo_over_grants() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();

        grant_comp(uow.as_mut(), 10, 2025, 8.0, Some(1), "overtime 1".into())
            .await
            .unwrap();
        grant_comp(uow.as_mut(), 10, 2025, 8.0, Some(2), "overtime 2".into())
            .await
            .unwrap();

        deduct_comp(uow.as_mut(), 10, 2025, 12.0).await.unwrap();

        let entries = uow.comp_entries(10, 2025).await.unwrap();
        assert_eq!(entries[0].used_hours, 8.0);
        assert_eq!(entries[1].used_hours, 4.0);

        let err = deduct_comp(uow.as_mut(), 10, 2025, 8.0).await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientBalance(_)));
    }

    #[actix_web::test]
    async fn comp_restore_returns_newest_first() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();

        grant_comp(uow.as_mut(), 10, 2025, 8.0, Some(1), "overtime 1".into())
            .await
            .unwrap();
        grant_comp(uow.as_mut(), 10, 2025, 8.0, Some(2), "overtime 2".into())
            .await
            .unwrap();
        deduct_comp(uow.as_mut(), 10, 2025, 12.0).await.unwrap();

        restore_comp(uow.as_mut(), 10, 2025, 6.0).await.unwrap();

        let entries = uow.comp_entries(10, 2025).await.unwrap();
        assert_eq!(entries[1].used_hours, 0.0);
        assert_eq!(entries[0].used_hours, 6.0);
    }

    #[actix_web::test]
    async fn set_total_allows_a_deficit() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();

        deduct_annual(uow.as_mut(), 10, 2025, 10.0, 15.0).await.unwrap();
        let balance = set_annual_total(uow.as_mut(), 10, 2025, 5.0).await.unwrap();

        assert_eq!(balance.total_days, 5.0);
        assert_eq!(balance.used_days, 10.0);
        assert!(balance.remaining() < 0.0);
    }
}
