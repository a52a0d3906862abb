//! Recurring auto-order generation.
//!
//! A single timer-driven task scans active customers, decides who has
//! re-entered the 30-day eligibility window, and materializes their
//! delivery orders over a rolling horizon. One customer's failure never
//! aborts the pass; the run logs it and moves on.
//!
//! The scheduler does not deduplicate against orders it generated on an
//! earlier pass. Re-materialization is bounded by the eligibility window,
//! which only reopens 30 days after a customer was last processed.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use rand::Rng;
use tracing::{error, info};
use uuid::Uuid;

use kurier_model::{
    Customer, NewOrder, PaymentMethod, PaymentStatus,
};

use crate::clock::Clock;
use crate::database::ports::customers::CustomerStore;
use crate::database::ports::orders::OrderStore;
use crate::error::Result;

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between passes
    pub interval: std::time::Duration,
    /// Delay before the first pass after process start
    pub startup_delay: std::time::Duration,
    /// How far ahead orders are materialized, in days
    pub horizon_days: u32,
    /// Days that must elapse before a customer is reconsidered
    pub eligibility_days: i64,
    /// Administrative owner assigned to generated orders
    pub default_assignee: Uuid,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(3600),
            startup_delay: std::time::Duration::from_secs(10),
            horizon_days: 30,
            eligibility_days: 30,
            default_assignee: Uuid::nil(),
        }
    }
}

/// Outcome of one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub customers_considered: u32,
    pub customers_scheduled: u32,
    pub orders_created: u32,
}

/// Periodic auto-order generator.
pub struct OrderScheduler {
    customers: Arc<dyn CustomerStore>,
    orders: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl fmt::Debug for OrderScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderScheduler")
            .field("config", &self.config)
            .finish()
    }
}

impl OrderScheduler {
    pub fn new(
        customers: Arc<dyn CustomerStore>,
        orders: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            customers,
            orders,
            clock,
            config,
        }
    }

    /// Spawn the periodic task: one pass shortly after startup, then one
    /// per interval. Runs until aborted; a failed pass is logged and the
    /// timer keeps going.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(self.config.startup_delay).await;
            let mut ticker = tokio::time::interval(self.config.interval);
            loop {
                // The first tick completes immediately, giving the
                // startup pass.
                ticker.tick().await;
                match self.run_once().await {
                    Ok(summary) => info!(
                        "scheduler pass complete: {}/{} customers scheduled, {} orders created",
                        summary.customers_scheduled,
                        summary.customers_considered,
                        summary.orders_created
                    ),
                    Err(err) => error!("scheduler pass failed: {}", err),
                }
            }
        })
    }

    /// Execute one scheduling pass over all active customers.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let run_at = self.clock.now();
        let customers = self.customers.list_active().await?;

        let mut summary = RunSummary {
            customers_considered: customers.len() as u32,
            ..RunSummary::default()
        };

        for customer in customers {
            if !self.is_eligible(&customer, run_at) {
                continue;
            }

            match self.generate_for_customer(&customer, run_at).await {
                Ok(created) => {
                    summary.customers_scheduled += 1;
                    summary.orders_created += created;
                    info!(
                        "generated {} auto-orders for customer {}",
                        created, customer.id
                    );
                }
                // A single customer's failure is isolated; the pass
                // continues with the rest.
                Err(err) => error!(
                    "auto-order generation failed for customer {}: {}",
                    customer.id, err
                ),
            }

            if let Err(err) = self
                .customers
                .touch_last_check(customer.id, run_at)
                .await
            {
                error!(
                    "failed to update last check for customer {}: {}",
                    customer.id, err
                );
            }
        }

        Ok(summary)
    }

    /// Whether the customer has re-entered the eligibility window.
    ///
    /// The reference stamp is the more recent of creation and last check;
    /// either alone arms the window when the other is absent. Touching the
    /// last-check stamp after a pass is what pushes the customer out for
    /// another 30 days.
    fn is_eligible(&self, customer: &Customer, now: DateTime<Utc>) -> bool {
        let threshold = Duration::days(self.config.eligibility_days);
        let reference = match customer.last_checked_at {
            Some(checked) => checked.max(customer.created_at),
            None => customer.created_at,
        };
        now - reference >= threshold
    }

    /// Materialize orders for every flagged date in the horizon.
    async fn generate_for_customer(
        &self,
        customer: &Customer,
        run_at: DateTime<Utc>,
    ) -> Result<u32> {
        let Some(pattern) = customer.pattern else {
            return Ok(0);
        };
        let flags = pattern.resolve();
        if flags.count() == 0 {
            return Ok(0);
        }

        let today = run_at.date_naive();
        let mut created = 0;

        for offset in 0..self.config.horizon_days {
            let date = today + Duration::days(i64::from(offset));
            if !flags.is_set(date.weekday()) {
                continue;
            }

            self.orders
                .create(NewOrder {
                    customer_id: customer.id,
                    assignee_id: self.config.default_assignee,
                    delivery_date: Some(date),
                    delivery_time: random_delivery_time(),
                    quantity: 1,
                    calorie_tier: customer.calorie_tier,
                    payment_status: PaymentStatus::Unpaid,
                    payment_method: PaymentMethod::Cash,
                    prepaid: false,
                })
                .await?;
            created += 1;
        }

        Ok(created)
    }
}

/// Pick a delivery time inside the 11:00-14:00 band.
fn random_delivery_time() -> NaiveTime {
    let minute = rand::rng().random_range(11 * 60..14 * 60);
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0)
        .unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::memory::{InMemoryCustomerStore, InMemoryOrderStore};
    use chrono::TimeZone;
    use kurier_model::{CalorieTier, CustomerId, DeliveryPattern};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap()
    }

    fn customer(
        created_days_ago: i64,
        checked_days_ago: Option<i64>,
    ) -> Customer {
        Customer {
            id: CustomerId::new(),
            name: "Mara".to_string(),
            address: "12 Canal St".to_string(),
            calorie_tier: CalorieTier::Standard,
            pattern: Some(DeliveryPattern::Daily),
            is_active: true,
            created_at: now() - Duration::days(created_days_ago),
            last_checked_at: checked_days_ago
                .map(|days| now() - Duration::days(days)),
        }
    }

    fn scheduler() -> OrderScheduler {
        let clock = Arc::new(ManualClock::new(now()));
        OrderScheduler::new(
            Arc::new(InMemoryCustomerStore::new()),
            Arc::new(InMemoryOrderStore::new(clock.clone())),
            clock,
            SchedulerConfig::default(),
        )
    }

    #[test]
    fn test_old_unchecked_customer_is_eligible() {
        let scheduler = scheduler();
        assert!(scheduler.is_eligible(&customer(31, None), now()));
    }

    #[test]
    fn test_new_customer_is_not_eligible() {
        let scheduler = scheduler();
        assert!(!scheduler.is_eligible(&customer(10, None), now()));
    }

    #[test]
    fn test_recent_check_rearms_the_window() {
        let scheduler = scheduler();
        assert!(!scheduler.is_eligible(&customer(45, Some(1)), now()));
    }

    #[test]
    fn test_stale_check_reopens_the_window() {
        let scheduler = scheduler();
        assert!(scheduler.is_eligible(&customer(45, Some(31)), now()));
    }

    #[test]
    fn test_delivery_times_stay_in_band() {
        for _ in 0..200 {
            let time = random_delivery_time();
            assert!(
                time >= NaiveTime::from_hms_opt(11, 0, 0).unwrap()
                    && time < NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                "{time} outside the 11:00-14:00 band"
            );
        }
    }
}
