//! End-to-end pipeline tests: submit -> queue -> worker -> store/cache ->
//! fan-out, exercised over the in-memory backends so the whole flow runs
//! without external services.

use orderflow_core::queue::JobStore;
use orderflow_core::test_helpers::{MemoryJobStore, MemoryOrderRepository, StubExecutionClient};
use orderflow_core::{
    ExecutionFailure, NotificationHub, Order, OrderCache, OrderKind, OrderParams, OrderQueue,
    OrderStatus, OrderWorkerPool, QueueManager, QueueService, RetentionPolicy, RetryPolicy,
    StatusSource, WorkerContext,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    manager: QueueManager,
    service: QueueService,
    queue: Arc<OrderQueue>,
    cache: OrderCache,
    hub: NotificationHub,
    execution: Arc<StubExecutionClient>,
}

fn harness(execution: StubExecutionClient, max_attempts: i32) -> Harness {
    let execution = Arc::new(execution);
    let job_store: Arc<dyn JobStore> = Arc::new(MemoryJobStore::new());
    let queue = Arc::new(OrderQueue::new(job_store, RetentionPolicy::default()));
    let store = Arc::new(MemoryOrderRepository::new());
    let cache = OrderCache::new(Duration::from_secs(60), 50);
    let hub = NotificationHub::new();

    let ctx = WorkerContext {
        queue: queue.clone(),
        store: store.clone(),
        cache: cache.clone(),
        hub: hub.clone(),
        execution: execution.clone(),
        // Millisecond-scale backoff keeps retry tests fast
        retry: RetryPolicy::new(max_attempts, 1, 5),
    };
    let workers = OrderWorkerPool::new(ctx, 2, Duration::from_millis(5));

    Harness {
        manager: QueueManager::new(queue.clone(), workers),
        service: QueueService::new(queue.clone(), cache.clone(), store),
        queue,
        cache,
        hub,
        execution,
    }
}

fn market_params() -> OrderParams {
    OrderParams {
        token_in: "SOL".to_string(),
        token_out: "USDC".to_string(),
        amount_in: dec!(10),
        slippage: dec!(0.01),
        kind: OrderKind::Market,
        priority: 1,
    }
}

async fn wait_for_terminal(service: &QueueService, order_id: &str) -> Order {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let report = service.get_order_status(order_id).await.unwrap();
            if report.order.status.is_terminal() {
                return report.order;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("order did not reach a terminal status within the bounded wait")
}

#[tokio::test]
async fn order_reaches_confirmed_with_execution_results() {
    let mut h = harness(StubExecutionClient::succeeding(), 3);
    h.manager.initialize().unwrap();
    assert!(h.manager.is_ready());

    let receipt = h.service.submit_order(market_params()).await.unwrap();
    assert_eq!(receipt.status, OrderStatus::Pending);
    let mut subscription = h.hub.subscribe(&receipt.order_id);

    let order = wait_for_terminal(&h.service, &receipt.order_id).await;
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert!(order.executed_price.is_some());
    assert!(order.amount_out.is_some());
    assert!(order.venue.is_some());
    assert!(order.tx_ref.as_deref().is_some_and(|tx| !tx.is_empty()));
    assert!(order.error_message.is_none());

    // The subscriber saw the terminal event; emission order matches the
    // worker's transition order.
    let mut statuses = Vec::new();
    while let Ok(event) = subscription.receiver.try_recv() {
        statuses.push(event.status);
    }
    assert_eq!(statuses.last(), Some(&OrderStatus::Confirmed));
    for pair in statuses.windows(2) {
        assert!(
            orderflow_core::OrderStateMachine::can_transition(pair[0], pair[1]),
            "events out of order: {statuses:?}"
        );
    }

    // Update history retained the full walk, starting from acceptance
    let updates = h.service.get_order_updates(&receipt.order_id);
    assert_eq!(updates.first().unwrap().status, OrderStatus::Pending);
    assert_eq!(updates.last().unwrap().status, OrderStatus::Confirmed);

    assert_eq!(h.execution.calls(), 1);
    h.manager.shutdown().await;
    assert!(!h.manager.is_ready());
}

#[tokio::test]
async fn order_fails_terminally_after_retry_budget() {
    let mut h = harness(
        StubExecutionClient::failing("no route with acceptable slippage"),
        3,
    );
    h.manager.initialize().unwrap();

    let receipt = h.service.submit_order(market_params()).await.unwrap();
    let order = wait_for_terminal(&h.service, &receipt.order_id).await;

    assert_eq!(order.status, OrderStatus::Failed);
    assert_eq!(order.retry_count, 3);
    assert_eq!(
        order.error_message.as_deref(),
        Some("no route with acceptable slippage")
    );
    assert!(order.amount_out.is_none());
    assert!(order.tx_ref.is_none());

    // One execution call per attempt
    assert_eq!(h.execution.calls(), 3);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn transient_failures_recover_within_the_budget() {
    let execution = StubExecutionClient::with_script(
        vec![
            Err(ExecutionFailure::new("venue timeout")),
            Err(ExecutionFailure::new("venue timeout")),
        ],
        Ok(orderflow_core::test_helpers::default_outcome()),
    );
    let mut h = harness(execution, 5);
    h.manager.initialize().unwrap();

    let receipt = h.service.submit_order(market_params()).await.unwrap();
    let order = wait_for_terminal(&h.service, &receipt.order_id).await;

    assert_eq!(order.status, OrderStatus::Confirmed);
    // Two failed attempts were recorded before the third succeeded
    assert_eq!(order.retry_count, 2);
    assert_eq!(h.execution.calls(), 3);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn duplicate_submission_does_not_duplicate_work() {
    let mut h = harness(StubExecutionClient::succeeding(), 3);

    // Paused dispatch makes the double-submit deterministic
    h.queue.pause();
    let first = h
        .service
        .submit_order_with_id("order-dup".to_string(), market_params())
        .await
        .unwrap();
    let second = h
        .service
        .submit_order_with_id("order-dup".to_string(), market_params())
        .await
        .unwrap();
    assert_eq!(first.job_id, second.job_id);

    let stats = h.service.get_stats().await.unwrap();
    assert_eq!(stats.waiting, 1);
    assert_eq!(stats.total, 1);

    h.queue.resume();
    h.manager.initialize().unwrap();
    let order = wait_for_terminal(&h.service, "order-dup").await;
    assert_eq!(order.status, OrderStatus::Confirmed);
    assert_eq!(h.execution.calls(), 1);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn terminal_order_survives_cache_eviction() {
    let mut h = harness(StubExecutionClient::succeeding(), 3);
    h.manager.initialize().unwrap();

    let receipt = h.service.submit_order(market_params()).await.unwrap();
    wait_for_terminal(&h.service, &receipt.order_id).await;

    h.cache.remove(&receipt.order_id);

    let report = h.service.get_order_status(&receipt.order_id).await.unwrap();
    assert_eq!(report.source, StatusSource::Store);
    assert_eq!(report.order.status, OrderStatus::Confirmed);

    h.manager.shutdown().await;
}

#[tokio::test]
async fn manager_lifecycle_is_idempotent() {
    let mut h = harness(StubExecutionClient::succeeding(), 3);

    // Shutdown before initialize is a safe no-op
    h.manager.shutdown().await;
    assert!(!h.manager.is_ready());

    h.manager.initialize().unwrap();
    // Second initialize is a logged no-op
    h.manager.initialize().unwrap();
    assert!(h.manager.is_ready());

    h.manager.shutdown().await;
    h.manager.shutdown().await;
    assert!(!h.manager.is_ready());
    assert!(h.queue.is_closed());
}

#[tokio::test]
async fn stats_match_processing_after_quiescence() {
    let mut h = harness(StubExecutionClient::succeeding(), 3);
    h.manager.initialize().unwrap();

    let mut order_ids = Vec::new();
    for _ in 0..5 {
        let receipt = h.service.submit_order(market_params()).await.unwrap();
        order_ids.push(receipt.order_id);
    }
    for order_id in &order_ids {
        wait_for_terminal(&h.service, order_id).await;
    }

    let stats = h.service.get_stats().await.unwrap();
    assert_eq!(stats.completed, 5);
    assert_eq!(stats.waiting + stats.active + stats.delayed + stats.failed, 0);
    assert_eq!(stats.total, 5);

    h.manager.shutdown().await;
}
