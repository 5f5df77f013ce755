//! Per-planet construction queue.
//!
//! A queue holds at most one *active* order (the one consuming build time)
//! and an ordered list of waiting orders. Waiting orders form a contiguous
//! chain: the first starts when the active order completes and every
//! following order starts when its predecessor completes.
//!
//! # Re-linearization
//!
//! Any operation that changes the active slot or the waiting order
//! (promotion on completion, cancellation) reassigns `start`, `completion`
//! and `position` of every waiting order from the new anchor. After every
//! public call the chain satisfies:
//!
//! - `queued[0].start == active.completion`
//! - `queued[k].start == queued[k-1].completion`
//! - `completion == start + duration` and completions strictly increase
//!   (durations are at least one second)

use crate::catalog::{BuildingType, Catalog};
use crate::id::{BuildingId, OrderId};
use crate::resources::Resources;
use crate::time::{Timestamp, after_secs, secs_to_millis};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// What an order produces when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTarget {
    /// A new building at a reserved slot.
    NewBuilding { slot: u32 },
    /// An upgrade of an existing building.
    Upgrade { building: BuildingId },
}

/// A construction or upgrade order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedOrder {
    pub id: OrderId,
    pub kind: BuildingType,
    pub target_level: u32,
    pub target: OrderTarget,
    /// Resources paid when the order was accepted (refunded on cancel).
    pub cost: Resources,
    pub duration_secs: u64,
    pub start: Timestamp,
    pub completion: Timestamp,
    /// 0 for the active order; index in the waiting list otherwise.
    pub position: usize,
}

/// Parameters of [`ConstructionQueue::enqueue`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub kind: BuildingType,
    pub target_level: u32,
    pub cost: Resources,
    /// Shortens the build time (10% per level).
    pub speed_bonus_level: u32,
    pub target: OrderTarget,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Expected, caller-facing queue failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("construction queue is full ({capacity} orders)")]
    QueueFull { capacity: usize },

    #[error("order {0:?} not found")]
    OrderNotFound(OrderId),

    #[error("order {0:?} is already under construction and cannot be cancelled")]
    OrderActive(OrderId),

    #[error("order {order:?} cannot be cancelled while {blocking:?} upgrades the same building further")]
    LaterUpgradeQueued { order: OrderId, blocking: OrderId },

    #[error("{kind} level {level} is out of range 1..={max}")]
    InvalidLevel {
        kind: BuildingType,
        level: u32,
        max: u32,
    },
}

/// Corruption detected in a queue's chain. Not caller-facing: the tick
/// driver logs it and skips the planet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueFault {
    #[error("order {order:?} starts at {actual}, expected {expected}")]
    BrokenChain {
        order: OrderId,
        expected: Timestamp,
        actual: Timestamp,
    },

    #[error("order {order:?} has position {actual}, expected {expected}")]
    BadPosition {
        order: OrderId,
        expected: usize,
        actual: usize,
    },

    #[error("order {order:?} completion does not match start + duration")]
    BadCompletion { order: OrderId },

    #[error("waiting orders exist but nothing is active")]
    OrphanedQueue,
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Read-only summary of a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub capacity: usize,
    pub active: Option<QueuedOrder>,
    pub queued: usize,
    /// Seconds from `now` until the last order completes.
    pub remaining_secs: u64,
    pub finishes_at: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// ConstructionQueue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructionQueue {
    capacity: usize,
    active: Option<QueuedOrder>,
    queued: VecDeque<QueuedOrder>,
    next_order_id: u64,
}

impl ConstructionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Set the capacity. Calling again with the same value changes nothing.
    /// Lowering the capacity never drops accepted orders; it only blocks new
    /// ones until the queue drains.
    pub fn initialize(&mut self, max_queue_size: usize) {
        self.capacity = max_queue_size;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn active(&self) -> Option<&QueuedOrder> {
        self.active.as_ref()
    }

    /// Waiting orders, head first.
    pub fn queued(&self) -> impl Iterator<Item = &QueuedOrder> {
        self.queued.iter()
    }

    /// Active order followed by waiting orders.
    pub fn orders(&self) -> impl Iterator<Item = &QueuedOrder> {
        self.active.iter().chain(self.queued.iter())
    }

    /// Number of accepted orders (active plus waiting).
    pub fn len(&self) -> usize {
        self.queued.len() + usize::from(self.active.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_none() && self.queued.is_empty()
    }

    /// Highest level already ordered for `building`, if any.
    pub fn pending_level(&self, building: BuildingId) -> Option<u32> {
        self.orders()
            .filter(|o| o.target == OrderTarget::Upgrade { building })
            .map(|o| o.target_level)
            .max()
    }

    /// Slots reserved by pending new-building orders.
    pub fn reserved_slots(&self) -> impl Iterator<Item = u32> + '_ {
        self.orders().filter_map(|o| match o.target {
            OrderTarget::NewBuilding { slot } => Some(slot),
            OrderTarget::Upgrade { .. } => None,
        })
    }

    /// Highest target level ordered for a building type as a new building.
    pub fn pending_new_of(&self, kind: BuildingType) -> bool {
        self.orders()
            .any(|o| o.kind == kind && matches!(o.target, OrderTarget::NewBuilding { .. }))
    }

    /// Accept a new order. Fails with [`QueueError::QueueFull`] when the
    /// accepted orders already fill the capacity.
    pub fn enqueue(
        &mut self,
        catalog: &Catalog,
        request: OrderRequest,
        now: Timestamp,
    ) -> Result<QueuedOrder, QueueError> {
        if self.len() >= self.capacity {
            return Err(QueueError::QueueFull {
                capacity: self.capacity,
            });
        }

        let spec = catalog.spec(request.kind);
        if request.target_level == 0 || request.target_level > spec.max_level {
            return Err(QueueError::InvalidLevel {
                kind: request.kind,
                level: request.target_level,
                max: spec.max_level,
            });
        }

        let duration_secs = spec.build_secs(request.target_level, request.speed_bonus_level);
        let start = self
            .queued
            .back()
            .or(self.active.as_ref())
            .map(|o| o.completion)
            .unwrap_or(now);

        let id = OrderId(self.next_order_id);
        self.next_order_id += 1;

        let mut order = QueuedOrder {
            id,
            kind: request.kind,
            target_level: request.target_level,
            target: request.target,
            cost: request.cost,
            duration_secs,
            start,
            completion: after_secs(start, duration_secs),
            position: 0,
        };

        if self.is_empty() {
            self.active = Some(order.clone());
        } else {
            order.position = self.queued.len();
            self.queued.push_back(order.clone());
        }
        Ok(order)
    }

    /// Remove a waiting order and close the gap it leaves.
    pub fn cancel(&mut self, order_id: OrderId) -> Result<QueuedOrder, QueueError> {
        if self.active.as_ref().is_some_and(|a| a.id == order_id) {
            return Err(QueueError::OrderActive(order_id));
        }
        let index = self
            .queued
            .iter()
            .position(|o| o.id == order_id)
            .ok_or(QueueError::OrderNotFound(order_id))?;
        if let OrderTarget::Upgrade { building } = self.queued[index].target
            && let Some(later) = self
                .queued
                .iter()
                .skip(index + 1)
                .find(|o| o.target == OrderTarget::Upgrade { building })
        {
            return Err(QueueError::LaterUpgradeQueued {
                order: order_id,
                blocking: later.id,
            });
        }

        // Without an active order the head keeps its own start as anchor.
        let anchor = match &self.active {
            Some(active) => active.completion,
            None => self.queued[0].start,
        };
        let removed = self
            .queued
            .remove(index)
            .ok_or(QueueError::OrderNotFound(order_id))?;
        self.relinearize(anchor);
        Ok(removed)
    }

    /// Complete every order due at `now`. The next waiting order is promoted
    /// with `start = now` and the rest of the chain is rebuilt behind it.
    /// Calling again with the same `now` completes nothing new.
    pub fn tick(&mut self, now: Timestamp) -> Vec<QueuedOrder> {
        let mut completed = Vec::new();
        loop {
            match &self.active {
                Some(active) if active.completion <= now => {
                    if let Some(done) = self.active.take() {
                        completed.push(done);
                    }
                    self.promote_head(now);
                }
                Some(_) => break,
                None => {
                    if self.queued.is_empty() {
                        break;
                    }
                    self.promote_head(now);
                }
            }
        }
        completed
    }

    fn promote_head(&mut self, now: Timestamp) {
        let Some(mut next) = self.queued.pop_front() else {
            return;
        };
        next.start = now;
        next.completion = after_secs(now, next.duration_secs);
        next.position = 0;
        let anchor = next.completion;
        self.active = Some(next);
        self.relinearize(anchor);
    }

    /// Reassign start, completion and position of every waiting order so the
    /// chain begins at `anchor` and has no gaps.
    fn relinearize(&mut self, anchor: Timestamp) {
        let mut cursor = anchor;
        for (position, order) in self.queued.iter_mut().enumerate() {
            order.position = position;
            order.start = cursor;
            order.completion = after_secs(cursor, order.duration_secs);
            cursor = order.completion;
        }
    }

    pub fn stats(&self, now: Timestamp) -> QueueStats {
        let finishes_at = self.orders().map(|o| o.completion).max();
        let remaining_secs = finishes_at
            .map(|t| t.saturating_sub(now).div_ceil(secs_to_millis(1)))
            .unwrap_or(0);
        QueueStats {
            capacity: self.capacity,
            active: self.active.clone(),
            queued: self.queued.len(),
            remaining_secs,
            finishes_at,
        }
    }

    /// Verify the chain invariants described in the module docs.
    pub fn check_invariants(&self) -> Result<(), QueueFault> {
        let mut cursor = match &self.active {
            Some(active) => {
                if active.completion != after_secs(active.start, active.duration_secs) {
                    return Err(QueueFault::BadCompletion { order: active.id });
                }
                Some(active.completion)
            }
            None if self.queued.is_empty() => return Ok(()),
            None => return Err(QueueFault::OrphanedQueue),
        };
        for (expected, order) in self.queued.iter().enumerate() {
            if order.position != expected {
                return Err(QueueFault::BadPosition {
                    order: order.id,
                    expected,
                    actual: order.position,
                });
            }
            if let Some(prev) = cursor
                && order.start != prev
            {
                return Err(QueueFault::BrokenChain {
                    order: order.id,
                    expected: prev,
                    actual: order.start,
                });
            }
            if order.duration_secs == 0
                || order.completion != after_secs(order.start, order.duration_secs)
            {
                return Err(QueueFault::BadCompletion { order: order.id });
            }
            cursor = Some(order.completion);
        }
        Ok(())
    }

    /// Test hook: move the active order's completion into the past or future
    /// without touching the rest of the chain.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn force_active_completion(&mut self, completion: Timestamp) {
        if let Some(active) = &mut self.active {
            active.completion = completion;
            active.start = completion.saturating_sub(secs_to_millis(active.duration_secs));
        }
        self.relinearize(completion);
    }

    /// Test hook: break the chain to exercise fault isolation.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn corrupt_for_test(&mut self) {
        if let Some(order) = self.queued.front_mut() {
            order.start = order.start.wrapping_add(1);
        } else if let Some(active) = &mut self.active {
            active.completion = active.completion.wrapping_add(1);
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
