//! Cost ledger with reservation-based spend ceilings
//!
//! Every paid call reserves its estimated cost before being issued and
//! commits the actual cost afterwards (or releases the reservation on
//! failure). Reservations make the ceiling check atomic: two concurrent
//! calls can never both pass against the same remaining budget and then
//! both spend it.

use crate::error::{CostPeriod, Error, Result};
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Configured spend ceilings in USD
#[derive(Debug, Clone, Copy)]
pub struct CostCeilings {
    /// Maximum cost for a single request
    pub per_request: f64,
    /// Maximum committed spend per UTC day
    pub daily: f64,
    /// Maximum committed spend per ISO week
    pub weekly: f64,
    /// Maximum committed spend per calendar month
    pub monthly: f64,
}

impl Default for CostCeilings {
    fn default() -> Self {
        Self {
            per_request: 5.0,
            daily: 50.0,
            weekly: 300.0,
            monthly: 1000.0,
        }
    }
}

/// Reservation handle returned by [`CostLedger::reserve`].
///
/// Must be settled with exactly one of `commit` or `release`.
#[derive(Debug, Clone, Copy)]
pub struct Ticket {
    id: Uuid,
    /// Reserved amount in USD
    pub amount: f64,
}

#[derive(Debug)]
struct LedgerState {
    day_start: NaiveDate,
    week_start: NaiveDate,
    month_start: NaiveDate,
    daily: f64,
    weekly: f64,
    monthly: f64,
    /// Outstanding reservations, survive period rollover untouched
    reservations: HashMap<Uuid, f64>,
}

impl LedgerState {
    fn new(today: NaiveDate) -> Self {
        Self {
            day_start: today,
            week_start: iso_week_start(today),
            month_start: month_start(today),
            daily: 0.0,
            weekly: 0.0,
            monthly: 0.0,
            reservations: HashMap::new(),
        }
    }

    fn reserved_total(&self) -> f64 {
        self.reservations.values().sum()
    }

    /// Reset only the accumulators whose period has lapsed.
    fn roll_over(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day_start {
            self.day_start = today;
            self.daily = 0.0;
        }
        let week = iso_week_start(today);
        if week != self.week_start {
            self.week_start = week;
            self.weekly = 0.0;
        }
        let month = month_start(today);
        if month != self.month_start {
            self.month_start = month;
            self.monthly = 0.0;
        }
    }
}

/// Monday of the ISO week containing `date`.
fn iso_week_start(date: NaiveDate) -> NaiveDate {
    let days_from_monday = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(days_from_monday))
        .unwrap_or(date)
}

/// First day of the calendar month containing `date`.
fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Running spend ledger checked before and updated after every paid call.
#[derive(Debug)]
pub struct CostLedger {
    ceilings: CostCeilings,
    state: Mutex<LedgerState>,
}

impl CostLedger {
    /// Create a ledger with the given ceilings.
    #[must_use]
    pub fn new(ceilings: CostCeilings) -> Self {
        Self {
            ceilings,
            state: Mutex::new(LedgerState::new(Utc::now().date_naive())),
        }
    }

    /// Reserve `estimated_cost` against every ceiling.
    ///
    /// Check order: per-request, then daily, weekly, monthly, each against
    /// committed + already-reserved spend. The error names the ceiling that
    /// rejected the reservation so callers can short-circuit on the
    /// per-request case (no other candidate can ever satisfy it either).
    pub async fn reserve(&self, estimated_cost: f64) -> Result<Ticket> {
        self.reserve_at(estimated_cost, Utc::now()).await
    }

    /// Clock-injected variant of [`reserve`](Self::reserve).
    pub async fn reserve_at(&self, estimated_cost: f64, now: DateTime<Utc>) -> Result<Ticket> {
        let mut state = self.state.lock().await;
        state.roll_over(now);

        if estimated_cost > self.ceilings.per_request {
            return Err(Error::CostLimitExceeded {
                period: CostPeriod::PerRequest,
                ceiling: self.ceilings.per_request,
            });
        }

        let reserved = state.reserved_total();
        for (period, committed, ceiling) in [
            (CostPeriod::Daily, state.daily, self.ceilings.daily),
            (CostPeriod::Weekly, state.weekly, self.ceilings.weekly),
            (CostPeriod::Monthly, state.monthly, self.ceilings.monthly),
        ] {
            if committed + reserved + estimated_cost > ceiling {
                return Err(Error::CostLimitExceeded { period, ceiling });
            }
        }

        let ticket = Ticket {
            id: Uuid::new_v4(),
            amount: estimated_cost,
        };
        state.reservations.insert(ticket.id, estimated_cost);
        Ok(ticket)
    }

    /// Settle a reservation with the actual cost of the completed call.
    pub async fn commit(&self, ticket: Ticket, actual_cost: f64) {
        self.commit_at(ticket, actual_cost, Utc::now()).await;
    }

    /// Clock-injected variant of [`commit`](Self::commit).
    pub async fn commit_at(&self, ticket: Ticket, actual_cost: f64, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        state.roll_over(now);
        if state.reservations.remove(&ticket.id).is_none() {
            debug!(ticket = %ticket.id, "Committing ticket with no live reservation");
        }
        state.daily += actual_cost;
        state.weekly += actual_cost;
        state.monthly += actual_cost;
    }

    /// Roll back a reservation after a failed call. No cost is accumulated.
    pub async fn release(&self, ticket: Ticket) {
        let mut state = self.state.lock().await;
        state.reservations.remove(&ticket.id);
    }

    /// Committed spend in the current day/week/month.
    pub async fn committed(&self) -> (f64, f64, f64) {
        let state = self.state.lock().await;
        (state.daily, state.weekly, state.monthly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ledger(per_request: f64, daily: f64) -> CostLedger {
        CostLedger::new(CostCeilings {
            per_request,
            daily,
            weekly: daily * 10.0,
            monthly: daily * 40.0,
        })
    }

    #[tokio::test]
    async fn test_reserve_commit_accumulates() {
        let ledger = ledger(5.0, 50.0);
        let ticket = ledger.reserve(1.0).await.unwrap();
        ledger.commit(ticket, 0.8).await;

        let (daily, weekly, monthly) = ledger.committed().await;
        assert!((daily - 0.8).abs() < 1e-9);
        assert!((weekly - 0.8).abs() < 1e-9);
        assert!((monthly - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_per_request_ceiling() {
        let ledger = ledger(2.0, 50.0);
        let err = ledger.reserve(3.0).await.unwrap_err();
        match err {
            Error::CostLimitExceeded { period, .. } => {
                assert_eq!(period, CostPeriod::PerRequest);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_daily_ceiling_counts_reservations() {
        let ledger = ledger(5.0, 6.0);
        let _t1 = ledger.reserve(4.0).await.unwrap();
        // 4.0 reserved but not committed; 3.0 more would exceed the daily 6.0
        let err = ledger.reserve(3.0).await.unwrap_err();
        match err {
            Error::CostLimitExceeded { period, .. } => assert_eq!(period, CostPeriod::Daily),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_release_returns_budget() {
        let ledger = ledger(5.0, 6.0);
        let t1 = ledger.reserve(4.0).await.unwrap();
        ledger.release(t1).await;
        // Released reservation frees its headroom and commits nothing
        assert!(ledger.reserve(5.0).await.is_ok());
        let (daily, _, _) = ledger.committed().await;
        assert!(daily.abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_daily_rollover_resets_only_daily() {
        let ledger = ledger(5.0, 5.0);
        let day1 = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2025, 6, 11, 0, 1, 0).unwrap();

        let ticket = ledger.reserve_at(4.0, day1).await.unwrap();
        ledger.commit_at(ticket, 4.0, day1).await;

        // Same day: 2.0 more would exceed the daily 5.0
        assert!(ledger.reserve_at(2.0, day1).await.is_err());

        // Next UTC day: daily accumulator reset, weekly still carries 4.0
        let ticket = ledger.reserve_at(2.0, day2).await.unwrap();
        ledger.commit_at(ticket, 2.0, day2).await;
        let (daily, weekly, _) = ledger.committed().await;
        assert!((daily - 2.0).abs() < 1e-9);
        assert!((weekly - 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_weekly_rollover_at_iso_week_start() {
        let ledger = CostLedger::new(CostCeilings {
            per_request: 10.0,
            daily: 10.0,
            weekly: 10.0,
            monthly: 100.0,
        });
        // 2025-06-15 is a Sunday, 2025-06-16 a Monday
        let sunday = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let monday = Utc.with_ymd_and_hms(2025, 6, 16, 12, 0, 0).unwrap();

        let ticket = ledger.reserve_at(8.0, sunday).await.unwrap();
        ledger.commit_at(ticket, 8.0, sunday).await;
        assert!(ledger.reserve_at(4.0, sunday).await.is_err());

        let ticket = ledger.reserve_at(4.0, monday).await.unwrap();
        ledger.commit_at(ticket, 4.0, monday).await;
        let (_, weekly, monthly) = ledger.committed().await;
        assert!((weekly - 4.0).abs() < 1e-9);
        assert!((monthly - 12.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rollover_preserves_pending_reservations() {
        let ledger = ledger(5.0, 5.0);
        let day1 = Utc.with_ymd_and_hms(2025, 6, 10, 23, 59, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2025, 6, 11, 0, 1, 0).unwrap();

        let pending = ledger.reserve_at(4.0, day1).await.unwrap();
        // After midnight the daily accumulator resets, but the in-flight
        // reservation still counts against the new day's headroom
        assert!(ledger.reserve_at(2.0, day2).await.is_err());
        ledger.commit_at(pending, 4.0, day2).await;
    }

    #[tokio::test]
    async fn test_never_over_commits_under_concurrency() {
        let ledger = std::sync::Arc::new(ledger(5.0, 10.0));

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                match ledger.reserve(1.0).await {
                    Ok(ticket) => {
                        ledger.commit(ticket, 1.0).await;
                        true
                    }
                    Err(_) => false,
                }
            }));
        }

        let mut committed = 0usize;
        for handle in handles {
            if handle.await.unwrap() {
                committed += 1;
            }
        }
        // Daily ceiling of 10.0 with $1 requests: at most 10 commits for
        // any interleaving
        assert!(committed <= 10);
        let (daily, _, _) = ledger.committed().await;
        assert!(daily <= 10.0 + 1e-9);
    }

    #[test]
    fn test_iso_week_start() {
        // 2025-06-11 is a Wednesday
        let wednesday = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
        assert_eq!(iso_week_start(wednesday), monday);
        assert_eq!(iso_week_start(monday), monday);
    }
}
