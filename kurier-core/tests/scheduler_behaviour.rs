//! Behaviour tests for the recurring-order scheduler, run against the
//! in-memory stores with a pinned clock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use uuid::Uuid;

use kurier_core::clock::ManualClock;
use kurier_core::database::memory::{
    InMemoryCustomerStore, InMemoryOrderStore,
};
use kurier_core::database::ports::customers::CustomerStore;
use kurier_core::database::ports::orders::{
    OrderFilter, OrderStore, TransitionUpdate,
};
use kurier_core::error::{DeliveryError, Result};
use kurier_core::scheduler::{OrderScheduler, SchedulerConfig};
use kurier_model::{
    CalorieTier, Customer, CustomerId, DeliveryPattern, NewOrder, Order,
    OrderId, OrderStatus, PaymentMethod, PaymentStatus,
};

fn run_time() -> DateTime<Utc> {
    // A Monday, so weekday expectations are stable.
    Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap()
}

fn customer(pattern: Option<DeliveryPattern>, created_days_ago: i64) -> Customer {
    Customer {
        id: CustomerId::new(),
        name: "Vera".to_string(),
        address: "4 Harbour Rd".to_string(),
        calorie_tier: CalorieTier::High,
        pattern,
        is_active: true,
        created_at: run_time() - Duration::days(created_days_ago),
        last_checked_at: None,
    }
}

struct Fixture {
    scheduler: OrderScheduler,
    customers: Arc<InMemoryCustomerStore>,
    orders: Arc<InMemoryOrderStore>,
    clock: Arc<ManualClock>,
}

fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(run_time()));
    let customers = Arc::new(InMemoryCustomerStore::new());
    let orders = Arc::new(InMemoryOrderStore::new(clock.clone()));
    let scheduler = OrderScheduler::new(
        customers.clone(),
        orders.clone(),
        clock.clone(),
        SchedulerConfig::default(),
    );
    Fixture {
        scheduler,
        customers,
        orders,
        clock,
    }
}

#[tokio::test]
async fn test_daily_customer_gets_one_order_per_day_for_the_horizon() {
    let fx = fixture();
    let subject = customer(Some(DeliveryPattern::Daily), 31);
    fx.customers.create(subject.clone()).await.unwrap();

    let summary = fx.scheduler.run_once().await.unwrap();
    assert_eq!(summary.customers_scheduled, 1);
    assert_eq!(summary.orders_created, 30);

    let orders = fx.orders.list(&OrderFilter::default()).await.unwrap();
    assert_eq!(orders.len(), 30);

    let today = run_time().date_naive();
    for (index, order) in orders.iter().enumerate() {
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert_eq!(order.payment_method, PaymentMethod::Cash);
        assert!(!order.prepaid);
        assert_eq!(order.calorie_tier, CalorieTier::High);
        assert_eq!(order.customer_id, subject.id);
        assert_eq!(
            order.delivery_date,
            Some(today + Duration::days(index as i64))
        );
    }
}

#[tokio::test]
async fn test_order_numbers_continue_from_the_prior_maximum() {
    let fx = fixture();

    // Three manual orders take numbers 1-3 before the scheduler runs.
    for _ in 0..3 {
        fx.orders
            .create(NewOrder {
                customer_id: CustomerId::new(),
                assignee_id: Uuid::new_v4(),
                delivery_date: None,
                delivery_time: chrono::NaiveTime::from_hms_opt(12, 0, 0)
                    .unwrap(),
                quantity: 1,
                calorie_tier: CalorieTier::Standard,
                payment_status: PaymentStatus::Unpaid,
                payment_method: PaymentMethod::Card,
                prepaid: true,
            })
            .await
            .unwrap();
    }

    fx.customers
        .create(customer(Some(DeliveryPattern::Daily), 31))
        .await
        .unwrap();
    fx.scheduler.run_once().await.unwrap();

    let numbers: Vec<i64> = fx
        .orders
        .list(&OrderFilter::default())
        .await
        .unwrap()
        .iter()
        .map(|order| order.number)
        .collect();

    let expected: Vec<i64> = (1..=33).collect();
    assert_eq!(numbers, expected, "numbers must be consecutive");
}

#[tokio::test]
async fn test_alternating_pattern_only_covers_its_weekdays() {
    let fx = fixture();
    let subject = customer(Some(DeliveryPattern::EveryOtherDayEven), 31);
    fx.customers.create(subject).await.unwrap();

    let summary = fx.scheduler.run_once().await.unwrap();

    // Count the qualifying dates in the horizon by hand.
    let flags = DeliveryPattern::EveryOtherDayEven.resolve();
    let today = run_time().date_naive();
    let expected = (0..30)
        .filter(|offset| {
            flags.is_set((today + Duration::days(*offset)).weekday())
        })
        .count() as u32;

    assert!(expected < 30);
    assert_eq!(summary.orders_created, expected);
}

#[tokio::test]
async fn test_unset_pattern_generates_nothing() {
    let fx = fixture();
    fx.customers.create(customer(None, 31)).await.unwrap();

    let summary = fx.scheduler.run_once().await.unwrap();
    assert_eq!(summary.customers_scheduled, 1);
    assert_eq!(summary.orders_created, 0);
}

#[tokio::test]
async fn test_ineligible_customers_are_skipped() {
    let fx = fixture();
    fx.customers
        .create(customer(Some(DeliveryPattern::Daily), 5))
        .await
        .unwrap();

    let summary = fx.scheduler.run_once().await.unwrap();
    assert_eq!(summary.customers_considered, 1);
    assert_eq!(summary.customers_scheduled, 0);
    assert_eq!(fx.orders.count(&OrderFilter::default()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_pass_rearms_the_eligibility_window() {
    let fx = fixture();
    let subject = customer(Some(DeliveryPattern::Daily), 31);
    fx.customers.create(subject.clone()).await.unwrap();

    fx.scheduler.run_once().await.unwrap();
    let after_first =
        fx.orders.count(&OrderFilter::default()).await.unwrap();
    assert_eq!(after_first, 30);

    let refreshed = fx.customers.find(subject.id).await.unwrap().unwrap();
    assert_eq!(refreshed.last_checked_at, Some(run_time()));

    // An hour later the customer is re-armed and nothing new appears.
    fx.clock.advance(Duration::hours(1));
    let summary = fx.scheduler.run_once().await.unwrap();
    assert_eq!(summary.customers_scheduled, 0);
    assert_eq!(
        fx.orders.count(&OrderFilter::default()).await.unwrap(),
        after_first
    );

    // Thirty-one days later the window has reopened.
    fx.clock.advance(Duration::days(31));
    let summary = fx.scheduler.run_once().await.unwrap();
    assert_eq!(summary.customers_scheduled, 1);
}

/// Order store that rejects creation for one customer, for isolation tests.
struct FailingOrderStore {
    inner: Arc<InMemoryOrderStore>,
    fail_for: CustomerId,
}

#[async_trait]
impl OrderStore for FailingOrderStore {
    async fn find_max_order_number(&self) -> Result<i64> {
        self.inner.find_max_order_number().await
    }

    async fn create(&self, order: NewOrder) -> Result<Order> {
        if order.customer_id == self.fail_for {
            return Err(DeliveryError::Database(
                "constraint violation".to_string(),
            ));
        }
        self.inner.create(order).await
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        self.inner.find(id).await
    }

    async fn transition(
        &self,
        id: OrderId,
        expected: OrderStatus,
        update: TransitionUpdate,
    ) -> Result<Option<Order>> {
        self.inner.transition(id, expected, update).await
    }

    async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        self.inner.list(filter).await
    }

    async fn count(&self, filter: &OrderFilter) -> Result<u64> {
        self.inner.count(filter).await
    }
}

#[tokio::test]
async fn test_one_failing_customer_does_not_abort_the_pass() {
    let clock = Arc::new(ManualClock::new(run_time()));
    let customers = Arc::new(InMemoryCustomerStore::new());
    let orders = Arc::new(InMemoryOrderStore::new(clock.clone()));

    let broken = customer(Some(DeliveryPattern::Daily), 31);
    let healthy = customer(Some(DeliveryPattern::Daily), 31);
    customers.create(broken.clone()).await.unwrap();
    customers.create(healthy.clone()).await.unwrap();

    let scheduler = OrderScheduler::new(
        customers.clone(),
        Arc::new(FailingOrderStore {
            inner: orders.clone(),
            fail_for: broken.id,
        }),
        clock,
        SchedulerConfig::default(),
    );

    let summary = scheduler.run_once().await.unwrap();
    assert_eq!(summary.customers_considered, 2);
    assert_eq!(summary.customers_scheduled, 1);

    let generated = orders
        .list(&OrderFilter {
            customer_id: Some(healthy.id),
            ..OrderFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(generated.len(), 30);

    // Both customers were processed, so both windows re-armed.
    for id in [broken.id, healthy.id] {
        let refreshed = customers.find(id).await.unwrap().unwrap();
        assert!(refreshed.last_checked_at.is_some());
    }
}
