//! Per-side order queue
//!
//! Holds at most one active order per unit, validates and runs them in
//! priority order, and keeps a bounded history of finished orders.
//!
//! All methods take `&self`; share the queue as `Arc<OrderQueue>`. Orders
//! leave the active map while they run (the queue keeps only their stop
//! handle), so cancel and interrupt stay available during a run.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use ahash::AHashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::core::config::{ExecutionMode, QueueConfig};
use crate::core::types::{OrderId, Side, UnitId};
use crate::orders::order::{ExecutionResult, Order, OrderControl, OrderSnapshot, OrderStatus, StopReason};

/// Queue-level faults
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is already executing")]
    Busy,

    #[error("no valid orders to execute")]
    NoValidOrders,

    #[error("order for a {found:?} unit submitted to the {expected:?} queue")]
    WrongSide { expected: Side, found: Side },

    #[error("order {0} is already finished")]
    AlreadyTerminal(OrderId),

    #[error("unknown order {0}")]
    UnknownOrder(OrderId),

    #[error("unit {0} not found")]
    UnitNotFound(UnitId),
}

/// Monotonic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub created: u64,
    pub executed: u64,
    pub cancelled: u64,
    pub failed: u64,
}

/// How a history entry finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Executed,
    Failed,
    Cancelled,
}

/// A finished order
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub order: OrderSnapshot,
    pub disposition: Disposition,
    pub finished_at: SystemTime,
}

/// Outcome of one `execute_all` call
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub executed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub results: Vec<ExecutionResult>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.executed + self.failed + self.cancelled
    }
}

/// Orders validated in one `validate_all` pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: usize,
    pub invalid: usize,
}

enum Slot {
    Ready { order: Box<Order>, seq: u64 },
    InFlight {
        unit: UnitId,
        control: OrderControl,
        launched: Box<OrderSnapshot>,
    },
}

#[derive(Default)]
struct QueueState {
    active: AHashMap<OrderId, Slot>,
    by_unit: AHashMap<UnitId, OrderId>,
    history: VecDeque<HistoryEntry>,
    stats: QueueStats,
    next_seq: u64,
}

/// Ends a run however it ends
///
/// A run dropped mid-flight leaves in-flight slots behind; they are settled
/// as cancelled here. The dropped order tasks strip their own modifiers.
struct RunGuard<'a>(&'a OrderQueue);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.abandon_in_flight();
        self.0.running.store(false, Ordering::Release);
    }
}

/// One side's orders
pub struct OrderQueue {
    side: Side,
    config: QueueConfig,
    state: Mutex<QueueState>,
    running: AtomicBool,
    paused: AtomicBool,
}

impl OrderQueue {
    pub fn new(side: Side, config: QueueConfig) -> Self {
        Self {
            side,
            config,
            state: Mutex::new(QueueState::default()),
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Register an order, cancelling whatever the unit was doing before
    pub fn submit(&self, order: Order) -> Result<OrderId, QueueError> {
        let id = order.id();
        let unit = order.unit();
        if order.is_terminal() {
            return Err(QueueError::AlreadyTerminal(id));
        }
        let snapshot = order
            .context()
            .units
            .snapshot(unit)
            .ok_or(QueueError::UnitNotFound(unit))?;
        if snapshot.side != self.side {
            return Err(QueueError::WrongSide {
                expected: self.side,
                found: snapshot.side,
            });
        }

        let mut state = self.lock();
        if let Some(previous) = state.by_unit.get(&unit).copied() {
            tracing::debug!(%unit, %previous, "replacing unit's active order");
            Self::cancel_locked(&mut state, previous, self.config.history_cap);
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.active.insert(
            id,
            Slot::Ready {
                order: Box::new(order),
                seq,
            },
        );
        state.by_unit.insert(unit, id);
        state.stats.created += 1;

        tracing::info!(order = %id, %unit, side = ?self.side, "order submitted");
        Ok(id)
    }

    /// Validate every order that is not running or finished
    ///
    /// A panic inside one order's validation marks that order invalid and
    /// does not affect the others.
    pub fn validate_all(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut state = self.lock();
        for slot in state.active.values_mut() {
            let Slot::Ready { order, .. } = slot else {
                continue;
            };
            if !order.status().can_validate() {
                continue;
            }
            let valid = match panic::catch_unwind(AssertUnwindSafe(|| order.validate())) {
                Ok(valid) => valid,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::warn!(order = %order.id(), %message, "validation panicked");
                    order.mark_invalid(format!("validation failed: {}", message));
                    false
                }
            };
            if valid {
                report.valid += 1;
            } else {
                report.invalid += 1;
            }
        }
        report
    }

    /// Run every valid order, highest priority first
    ///
    /// Fails with `Busy` (changing nothing) if a run is already in progress,
    /// and with `NoValidOrders` if there is nothing to run.
    pub async fn execute_all(&self) -> Result<RunSummary, QueueError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(QueueError::Busy);
        }
        let _guard = RunGuard(self);

        if self.config.validate_before_execute {
            self.validate_all();
        }

        let batch = self.take_runnable();
        if batch.is_empty() {
            return Err(QueueError::NoValidOrders);
        }
        tracing::info!(side = ?self.side, count = batch.len(), mode = ?self.config.mode, "executing orders");

        let mut summary = RunSummary::default();
        match self.config.mode {
            ExecutionMode::Sequential => {
                for order in batch {
                    self.wait_while_paused().await;
                    self.run_chunk(vec![order], &mut summary).await;
                }
            }
            ExecutionMode::BoundedParallel { max_concurrency } => {
                let mut remaining = batch.into_iter();
                loop {
                    let chunk: Vec<_> = remaining.by_ref().take(max_concurrency.max(1)).collect();
                    if chunk.is_empty() {
                        break;
                    }
                    self.run_chunk(chunk, &mut summary).await;
                }
            }
        }

        tracing::info!(
            side = ?self.side,
            executed = summary.executed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "execution finished"
        );
        Ok(summary)
    }

    /// Hold sequential execution between orders
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
        tracing::info!(side = ?self.side, "queue paused");
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        tracing::info!(side = ?self.side, "queue resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Cancel one order; a running order is signalled and settles when it stops
    pub fn cancel(&self, id: OrderId) -> Result<(), QueueError> {
        let mut state = self.lock();
        if Self::cancel_locked(&mut state, id, self.config.history_cap) {
            Ok(())
        } else {
            Err(QueueError::UnknownOrder(id))
        }
    }

    /// Cancel everything; returns how many orders were told to stop
    pub fn cancel_all(&self) -> usize {
        let mut state = self.lock();
        let ids: Vec<OrderId> = state.active.keys().copied().collect();
        let count = ids
            .into_iter()
            .filter(|id| Self::cancel_locked(&mut state, *id, self.config.history_cap))
            .count();
        tracing::info!(side = ?self.side, count, "cancelled all orders");
        count
    }

    /// Interrupt a unit's current order; before it runs this is a cancel
    pub fn interrupt_unit(&self, unit: UnitId, reason: impl Into<String>) -> bool {
        let mut state = self.lock();
        let Some(id) = state.by_unit.get(&unit).copied() else {
            return false;
        };
        let in_flight = match state.active.get(&id) {
            Some(Slot::InFlight { control, .. }) => Some(control.clone()),
            Some(Slot::Ready { .. }) => None,
            None => return false,
        };
        match in_flight {
            Some(control) => control.stop(StopReason::Interrupted(reason.into())),
            None => Self::cancel_locked(&mut state, id, self.config.history_cap),
        }
    }

    pub fn active_order_for(&self, unit: UnitId) -> Option<OrderId> {
        self.lock().by_unit.get(&unit).copied()
    }

    /// Status of an active order; finished orders are looked up in history
    pub fn order_status(&self, id: OrderId) -> Option<OrderStatus> {
        let state = self.lock();
        match state.active.get(&id) {
            Some(Slot::Ready { order, .. }) => Some(order.status()),
            Some(Slot::InFlight { .. }) => Some(OrderStatus::Executing),
            None => state
                .history
                .iter()
                .rev()
                .find(|entry| entry.order.id == id)
                .map(|entry| entry.order.status),
        }
    }

    /// Orders still bound to their unit
    ///
    /// A running order that was cancelled or replaced keeps its slot until
    /// it stops, but no longer counts here.
    pub fn active_len(&self) -> usize {
        let state = self.lock();
        state
            .active
            .iter()
            .filter(|(id, slot)| match slot {
                Slot::Ready { .. } => true,
                Slot::InFlight { unit, .. } => state.by_unit.get(unit) == Some(*id),
            })
            .count()
    }

    /// Snapshots of the orders waiting to run
    pub fn pending(&self) -> Vec<OrderSnapshot> {
        self.lock()
            .active
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready { order, .. } => Some(order.serialize()),
                Slot::InFlight { .. } => None,
            })
            .collect()
    }

    /// Finished orders, oldest first
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.lock().history.iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats
    }

    pub fn export_history_json(&self) -> serde_json::Result<String> {
        let state = self.lock();
        serde_json::to_string_pretty(&state.history)
    }

    // ------------------------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move valid orders out of the active map, leaving their stop handles
    fn take_runnable(&self) -> Vec<Box<Order>> {
        let mut state = self.lock();
        let mut ready: Vec<(i32, u64, OrderId)> = state
            .active
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Ready { order, seq } if order.status() == OrderStatus::Valid => {
                    Some((order.priority(), *seq, *id))
                }
                _ => None,
            })
            .collect();
        ready.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let mut batch = Vec::with_capacity(ready.len());
        for (_, _, id) in ready {
            if let Some(Slot::Ready { order, .. }) = state.active.remove(&id) {
                state.active.insert(
                    id,
                    Slot::InFlight {
                        unit: order.unit(),
                        control: order.control(),
                        launched: Box::new(order.serialize()),
                    },
                );
                batch.push(order);
            }
        }
        batch
    }

    async fn wait_while_paused(&self) {
        while self.is_paused() {
            tokio::time::sleep(self.config.pause_poll()).await;
        }
    }

    /// Run a set of orders concurrently and settle each as it finishes
    async fn run_chunk(&self, chunk: Vec<Box<Order>>, summary: &mut RunSummary) {
        let mut launched: AHashMap<OrderId, OrderSnapshot> = AHashMap::new();
        let mut tasks = JoinSet::new();
        for mut order in chunk {
            launched.insert(order.id(), order.serialize());
            tasks.spawn(async move {
                order.execute().await;
                order
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(order) => {
                    launched.remove(&order.id());
                    self.settle(order.serialize(), summary);
                }
                Err(e) => tracing::error!(error = %e, "order task aborted"),
            }
        }

        // Whatever did not come back panicked inside its task
        for (_, mut snapshot) in launched {
            let result = ExecutionResult::failed(snapshot.id, snapshot.unit, "order task panicked");
            snapshot.status = OrderStatus::Completed;
            snapshot.result = Some(result);
            self.settle(snapshot, summary);
        }
    }

    fn settle(&self, snapshot: OrderSnapshot, summary: &mut RunSummary) {
        let disposition = match (&snapshot.status, &snapshot.result) {
            (OrderStatus::Cancelled, _) => Disposition::Cancelled,
            (_, Some(result)) if result.success => Disposition::Executed,
            _ => Disposition::Failed,
        };
        match disposition {
            Disposition::Executed => summary.executed += 1,
            Disposition::Failed => summary.failed += 1,
            Disposition::Cancelled => summary.cancelled += 1,
        }
        if let Some(result) = &snapshot.result {
            summary.results.push(result.clone());
        }

        let mut state = self.lock();
        state.active.remove(&snapshot.id);
        if state.by_unit.get(&snapshot.unit) == Some(&snapshot.id) {
            state.by_unit.remove(&snapshot.unit);
        }
        match disposition {
            Disposition::Executed => state.stats.executed += 1,
            Disposition::Failed => state.stats.failed += 1,
            Disposition::Cancelled => state.stats.cancelled += 1,
        }
        Self::record(&mut state, snapshot, disposition, self.config.history_cap);
    }

    fn cancel_locked(state: &mut QueueState, id: OrderId, history_cap: usize) -> bool {
        let in_flight = match state.active.get(&id) {
            Some(Slot::InFlight { unit, control, .. }) => Some((*unit, control.clone())),
            Some(Slot::Ready { .. }) => None,
            None => return false,
        };

        if let Some((unit, control)) = in_flight {
            control.stop(StopReason::Cancelled);
            if state.by_unit.get(&unit) == Some(&id) {
                state.by_unit.remove(&unit);
            }
            return true;
        }

        let Some(Slot::Ready { mut order, .. }) = state.active.remove(&id) else {
            return false;
        };
        order.cancel();
        if state.by_unit.get(&order.unit()) == Some(&id) {
            state.by_unit.remove(&order.unit());
        }
        state.stats.cancelled += 1;
        Self::record(state, order.serialize(), Disposition::Cancelled, history_cap);
        true
    }

    /// Settle every in-flight slot as cancelled
    fn abandon_in_flight(&self) {
        let mut state = self.lock();
        let ids: Vec<OrderId> = state
            .active
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::InFlight { .. }))
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            let Some(Slot::InFlight { unit, launched, .. }) = state.active.remove(&id) else {
                continue;
            };
            tracing::warn!(order = %id, %unit, "run dropped while order was in flight");
            let mut snapshot = *launched;
            snapshot.status = OrderStatus::Cancelled;
            snapshot.result = Some(ExecutionResult::failed(id, unit, "execution abandoned"));
            if state.by_unit.get(&unit) == Some(&id) {
                state.by_unit.remove(&unit);
            }
            state.stats.cancelled += 1;
            Self::record(&mut state, snapshot, Disposition::Cancelled, self.config.history_cap);
        }
    }

    fn record(state: &mut QueueState, order: OrderSnapshot, disposition: Disposition, cap: usize) {
        state.history.push_back(HistoryEntry {
            order,
            disposition,
            finished_at: SystemTime::now(),
        });
        while state.history.len() > cap {
            state.history.pop_front();
        }
    }
}

impl std::fmt::Debug for OrderQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderQueue")
            .field("side", &self.side)
            .field("running", &self.is_running())
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::core::types::WorldPos;
    use crate::hexgrid::HexGrid;
    use crate::orders::context::OrderContext;
    use crate::orders::wait::{WaitDuration, WaitModality};
    use crate::units::{TacticalUnit, UnitRoster, UnitType};

    fn setup() -> (OrderContext, Arc<UnitRoster>, UnitId) {
        let roster = Arc::new(UnitRoster::new());
        let id = roster.insert(TacticalUnit::new("HQ", Side::Blue, UnitType::Headquarters, WorldPos::ORIGIN));
        let ctx = OrderContext::with_grid(HexGrid::new(100.0, WorldPos::ORIGIN), roster.clone());
        (ctx, roster, id)
    }

    fn alert(ctx: &OrderContext, unit: UnitId, turns: u32) -> Order {
        Order::wait(ctx.clone(), unit, WaitModality::Alert, WaitDuration::Turns(turns))
    }

    #[test]
    fn test_submit_replaces_previous_order() {
        let (ctx, _, unit) = setup();
        let queue = OrderQueue::new(Side::Blue, QueueConfig::default());

        let first = queue.submit(alert(&ctx, unit, 1)).unwrap();
        let second = queue.submit(alert(&ctx, unit, 2)).unwrap();

        assert_eq!(queue.active_len(), 1);
        assert_eq!(queue.active_order_for(unit), Some(second));
        assert_eq!(queue.order_status(first), Some(OrderStatus::Cancelled));
        assert_eq!(queue.stats().cancelled, 1);
        assert_eq!(queue.stats().created, 2);
    }

    #[test]
    fn test_submit_rejects_other_side() {
        let (ctx, roster, _) = setup();
        let red = roster.insert(TacticalUnit::new("T-72", Side::Red, UnitType::Armor, WorldPos::ORIGIN));
        let queue = OrderQueue::new(Side::Blue, QueueConfig::default());
        let err = queue.submit(alert(&ctx, red, 1)).unwrap_err();
        assert_eq!(
            err,
            QueueError::WrongSide {
                expected: Side::Blue,
                found: Side::Red
            }
        );
    }

    #[test]
    fn test_submit_rejects_terminal_order() {
        let (ctx, _, unit) = setup();
        let queue = OrderQueue::new(Side::Blue, QueueConfig::default());
        let mut order = alert(&ctx, unit, 1);
        order.cancel();
        assert!(matches!(queue.submit(order), Err(QueueError::AlreadyTerminal(_))));
    }

    #[tokio::test]
    async fn test_nothing_valid_is_an_error() {
        let (ctx, roster, unit) = setup();
        roster.with_unit(unit, |u| u.health = 0.0).unwrap();
        let queue = OrderQueue::new(Side::Blue, QueueConfig::default());
        queue.submit(alert(&ctx, unit, 1)).unwrap();

        assert_eq!(queue.execute_all().await.unwrap_err(), QueueError::NoValidOrders);
        assert!(!queue.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_moves_orders_to_history() {
        let (ctx, _, unit) = setup();
        let queue = OrderQueue::new(Side::Blue, QueueConfig::default());
        let id = queue.submit(alert(&ctx, unit, 2)).unwrap();

        let summary = queue.execute_all().await.unwrap();
        assert_eq!(summary.executed, 1);
        assert_eq!(queue.active_len(), 0);
        assert_eq!(queue.active_order_for(unit), None);
        assert_eq!(queue.order_status(id), Some(OrderStatus::Completed));
        assert_eq!(queue.history()[0].disposition, Disposition::Executed);
        assert_eq!(queue.stats().executed, 1);
    }

    #[test]
    fn test_validation_panic_marks_invalid() {
        use crate::core::Result;
        use crate::units::{DamageReport, ModifierOrigin, Recovery, Stat, UnitProvider};
        use std::sync::atomic::AtomicBool;

        /// Delegates to a roster until armed, then panics on lookup
        struct Flaky {
            inner: UnitRoster,
            armed: AtomicBool,
        }

        impl UnitProvider for Flaky {
            fn snapshot(&self, id: UnitId) -> Option<TacticalUnit> {
                if self.armed.load(Ordering::SeqCst) {
                    panic!("provider exploded");
                }
                self.inner.snapshot(id)
            }
            fn consume_ammunition(&self, id: UnitId, amount: f64) -> Result<f64> {
                self.inner.consume_ammunition(id, amount)
            }
            fn apply_damage(&self, id: UnitId, damage: f64) -> Result<DamageReport> {
                self.inner.apply_damage(id, damage)
            }
            fn set_under_fire(&self, id: UnitId, under_fire: bool) -> Result<()> {
                self.inner.set_under_fire(id, under_fire)
            }
            fn apply_modifiers(&self, id: UnitId, origin: &ModifierOrigin, deltas: &[(Stat, f64)]) -> Result<()> {
                self.inner.apply_modifiers(id, origin, deltas)
            }
            fn remove_modifiers(&self, id: UnitId, origin: &ModifierOrigin) -> Result<usize> {
                self.inner.remove_modifiers(id, origin)
            }
            fn recover(&self, id: UnitId, recovery: &Recovery) -> Result<Recovery> {
                self.inner.recover(id, recovery)
            }
        }

        let flaky = Arc::new(Flaky {
            inner: UnitRoster::new(),
            armed: AtomicBool::new(false),
        });
        let unit = flaky
            .inner
            .insert(TacticalUnit::new("Sappers", Side::Blue, UnitType::Engineer, WorldPos::ORIGIN));
        let ctx = OrderContext::with_grid(HexGrid::new(100.0, WorldPos::ORIGIN), flaky.clone());
        let queue = OrderQueue::new(Side::Blue, QueueConfig::default());
        let id = queue.submit(alert(&ctx, unit, 1)).unwrap();

        flaky.armed.store(true, Ordering::SeqCst);
        let report = queue.validate_all();

        assert_eq!(report, ValidationReport { valid: 0, invalid: 1 });
        assert_eq!(queue.order_status(id), Some(OrderStatus::Invalid));
        let pending = queue.pending();
        assert!(pending[0].messages[0].contains("provider exploded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_unit_stops_running_wait() {
        let (ctx, _, unit) = setup();
        let queue = Arc::new(OrderQueue::new(Side::Blue, QueueConfig::default()));
        queue.submit(alert(&ctx, unit, 100)).unwrap();

        let runner = queue.clone();
        let run = tokio::spawn(async move { runner.execute_all().await });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(queue.interrupt_unit(unit, "contact front"));

        let summary = run.await.unwrap().unwrap();
        assert_eq!(summary.executed, 1);
        let entry = &queue.history()[0];
        assert_eq!(entry.order.status, OrderStatus::Completed);
        assert!(entry.order.summary.contains("contact front"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_run_settles_in_flight_orders() {
        use crate::units::UnitProvider;

        let (ctx, roster, unit) = setup();
        let queue = Arc::new(OrderQueue::new(Side::Blue, QueueConfig::default()));
        let id = queue
            .submit(Order::wait(ctx.clone(), unit, WaitModality::Rest, WaitDuration::Turns(100)))
            .unwrap();

        let runner = queue.clone();
        let run = tokio::spawn(async move { runner.execute_all().await });
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(roster.snapshot(unit).unwrap().modifiers.len(), 5);

        run.abort();
        assert!(run.await.unwrap_err().is_cancelled());
        // Let the aborted order task be dropped
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(roster.snapshot(unit).unwrap().modifiers.is_empty());
        assert!(!queue.is_running());
        assert_eq!(queue.active_len(), 0);
        assert_eq!(queue.active_order_for(unit), None);
        assert_eq!(queue.order_status(id), Some(OrderStatus::Cancelled));
        assert_eq!(queue.history()[0].disposition, Disposition::Cancelled);
        assert_eq!(queue.stats().cancelled, 1);

        // The queue is usable again
        queue.submit(alert(&ctx, unit, 1)).unwrap();
        assert_eq!(queue.execute_all().await.unwrap().executed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_a_running_order_counts_once() {
        let (ctx, _, unit) = setup();
        let queue = Arc::new(OrderQueue::new(Side::Blue, QueueConfig::default()));
        let first = queue.submit(alert(&ctx, unit, 100)).unwrap();

        let runner = queue.clone();
        let run = tokio::spawn(async move { runner.execute_all().await });
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let second = queue.submit(alert(&ctx, unit, 1)).unwrap();
        assert_eq!(queue.active_len(), 1);
        assert_eq!(queue.active_order_for(unit), Some(second));
        assert_eq!(queue.pending().len(), 1);
        assert_eq!(queue.pending()[0].id, second);

        let summary = run.await.unwrap().unwrap();
        assert_eq!(summary.cancelled, 1);
        assert_eq!(queue.order_status(first), Some(OrderStatus::Cancelled));
        assert_eq!(queue.active_order_for(unit), Some(second));
        assert_eq!(queue.active_len(), 1);
    }

    #[test]
    fn test_history_json_export() {
        let (ctx, _, unit) = setup();
        let queue = OrderQueue::new(Side::Blue, QueueConfig::default());
        queue.submit(alert(&ctx, unit, 1)).unwrap();
        assert_eq!(queue.cancel_all(), 1);

        let json: serde_json::Value = serde_json::from_str(&queue.export_history_json().unwrap()).unwrap();
        assert_eq!(json[0]["disposition"], "cancelled");
        assert_eq!(json[0]["order"]["status"], "cancelled");
    }

    #[test]
    fn test_cancel_unknown_order() {
        let queue = OrderQueue::new(Side::Blue, QueueConfig::default());
        let id = OrderId::new();
        assert_eq!(queue.cancel(id), Err(QueueError::UnknownOrder(id)));
    }
}
