use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::audit::{AuditEntry, AuditLogger};
use crate::metrics::Metrics;
use crate::notifications::{NotificationDispatcher, NotificationStore};
use crate::store::{NewOrder, OrderStore, Revision, StoreError};

use super::aggregate::{next_display_id, timestamp_now, Order};
use super::commands::{AdminOverride, CreateOrderInput, OrderDetailsUpdate, StatusChange};
use super::errors::OrderError;
use super::state_machine;
use super::value_objects::{CustomerSnapshot, OrderItem, OrderStatus};

// ============================================================================
// Order Service
// ============================================================================
//
// Orchestrates: Input → StateMachine → OrderStore → Notification / Audit
//
// Every write is conditional on the revision (status and updated_at) that
// was read, so two terminals racing on the same order cannot both commit.
// Ticket numbers are assigned by the store inside its serialized create.
//
// ============================================================================

pub struct OrderService {
    store: Arc<dyn OrderStore>,
    notifier: Arc<dyn NotificationDispatcher>,
    notification_store: Arc<dyn NotificationStore>,
    audit: Arc<dyn AuditLogger>,
    metrics: Option<Arc<Metrics>>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        notifier: Arc<dyn NotificationDispatcher>,
        notification_store: Arc<dyn NotificationStore>,
        audit: Arc<dyn AuditLogger>,
    ) -> Self {
        Self {
            store,
            notifier,
            notification_store,
            audit,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Full collection as the store currently holds it.
    pub async fn list_orders(&self) -> Vec<Order> {
        self.store.get_all().await
    }

    pub async fn find_order(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.store
            .find_by_id(order_id)
            .await
            .ok_or(OrderError::NotFound(order_id))
    }

    /// Statuses the order may move to next.
    pub async fn next_statuses(&self, order_id: Uuid) -> Result<Vec<OrderStatus>, OrderError> {
        let order = self.find_order(order_id).await?;
        Ok(state_machine::next_statuses(order.status))
    }

    pub async fn create_order(&self, input: CreateOrderInput) -> Result<Order, OrderError> {
        let result = self.build_and_create(input).await;
        self.observe("create_order", &result);

        if let Ok(order) = &result {
            if let Some(metrics) = &self.metrics {
                metrics.orders_created.inc();
            }
            tracing::info!(
                order_id = %order.id,
                display_id = order.display_id,
                order_type = %order.customer_snapshot.order_type.as_str(),
                is_paid = order.is_paid,
                "Order created"
            );
        }
        result
    }

    async fn build_and_create(&self, input: CreateOrderInput) -> Result<Order, OrderError> {
        validate_items(&input.items)?;
        if input.total_price.is_sign_negative() {
            return Err(OrderError::Validation("total price cannot be negative".to_string()));
        }

        let name = non_blank(input.customer_name);
        let customer_snapshot = CustomerSnapshot {
            is_walk_in: name.is_none(),
            name,
            phone: non_blank(input.customer_phone),
            order_type: input.order_type,
            address: non_blank(input.address),
        };
        let special_instructions = non_blank(input.special_instructions);

        let build: NewOrder = Box::new(move |last_display_id| {
            let now = timestamp_now();
            Order {
                id: Uuid::now_v7(),
                display_id: next_display_id(last_display_id),
                status: OrderStatus::New,
                customer_snapshot,
                items: input.items,
                total_price: input.total_price,
                payment_method: input.payment_method,
                is_paid: input.payment_method.is_settled_up_front(),
                assigned_to: None,
                is_priority: input.is_priority,
                special_instructions,
                created_at: now,
                updated_at: now,
                oven_entered_at: None,
                actual_ready_at: None,
                completed_at: None,
            }
        });

        Ok(self.timed("create", self.store.create_next(build)).await?)
    }

    pub async fn update_status(&self, change: StatusChange) -> Result<Order, OrderError> {
        let result = self.transition(change).await;
        self.observe("update_status", &result);
        result
    }

    async fn transition(&self, change: StatusChange) -> Result<Order, OrderError> {
        let mut order = self.find_order(change.order_id).await?;
        let read = Revision::of(&order);
        let previous = read.status;

        if let Some(expected) = change.expected_status {
            if expected != previous {
                return Err(OrderError::Conflict {
                    order_id: order.id,
                    expected,
                    actual: previous,
                });
            }
        }

        order.apply_transition(change.new_status, change.assigned_to)?;
        let saved = self
            .timed("update_status", self.store.compare_and_update(order, read))
            .await?;

        tracing::info!(
            order_id = %saved.id,
            display_id = saved.display_id,
            from = %previous,
            to = %saved.status,
            assigned_to = ?saved.assigned_to,
            "Order status changed"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(previous, saved.status);
        }

        if saved.status == OrderStatus::Ready {
            self.notify_ready(&saved).await;
        }

        Ok(saved)
    }

    /// Runs once per entry into READY. Never fails the caller.
    async fn notify_ready(&self, order: &Order) {
        let outcome = match self.notifier.notify(order, &order.customer_snapshot).await {
            Ok(Some(notification)) => {
                let notification_id = notification.id;
                if let Err(e) = self.notification_store.save(notification).await {
                    tracing::warn!(
                        order_id = %order.id,
                        notification_id = %notification_id,
                        error = %e,
                        "Failed to store sent notification"
                    );
                }
                "sent"
            }
            Ok(None) => {
                tracing::debug!(order_id = %order.id, "No notification for ready order");
                "skipped"
            }
            Err(e) => {
                tracing::warn!(
                    order_id = %order.id,
                    display_id = order.display_id,
                    error = %e,
                    "Ready notification failed, status change kept"
                );
                "failed"
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_notification(outcome);
        }
    }

    /// Shallow merge of customer fields; items and price replaced wholesale.
    pub async fn update_order_details(
        &self,
        order_id: Uuid,
        update: OrderDetailsUpdate,
    ) -> Result<Order, OrderError> {
        let result = self.merge_details(order_id, update).await;
        self.observe("update_order_details", &result);
        if let Ok(order) = &result {
            tracing::debug!(order_id = %order.id, "Order details updated");
        }
        result
    }

    async fn merge_details(
        &self,
        order_id: Uuid,
        update: OrderDetailsUpdate,
    ) -> Result<Order, OrderError> {
        if let Some(items) = &update.items {
            validate_items(items)?;
        }
        let mut order = self.find_order(order_id).await?;
        let read = Revision::of(&order);
        order.apply_details(update);

        Ok(self
            .timed("update_details", self.store.compare_and_update(order, read))
            .await?)
    }

    pub async fn mark_as_paid(&self, order_id: Uuid) -> Result<Order, OrderError> {
        let result = self.settle(order_id).await;
        self.observe("mark_as_paid", &result);
        if let Ok(order) = &result {
            tracing::info!(
                order_id = %order.id,
                payment_method = %order.payment_method.as_str(),
                "Order marked as paid"
            );
        }
        result
    }

    async fn settle(&self, order_id: Uuid) -> Result<Order, OrderError> {
        let mut order = self.find_order(order_id).await?;
        let read = Revision::of(&order);
        order.mark_paid();

        Ok(self
            .timed("mark_paid", self.store.compare_and_update(order, read))
            .await?)
    }

    /// Status change on behalf of an admin, recorded in the audit log.
    ///
    /// Goes through the same transition rules as any other change.
    pub async fn admin_override_status(&self, request: AdminOverride) -> Result<Order, OrderError> {
        let change = StatusChange {
            order_id: request.order_id,
            new_status: request.new_status,
            assigned_to: request.assigned_to,
            expected_status: None,
        };

        let result = self.transition(change).await;
        self.observe("admin_override_status", &result);
        let order = result?;

        let entry = AuditEntry::status_override(
            request.admin_id,
            order.id,
            &request.reason,
            &request.comment,
        );
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(order_id = %order.id, error = %e, "Failed to record admin override");
        }

        Ok(order)
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        write: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let started = Instant::now();
        let result = write.await;
        if let Some(metrics) = &self.metrics {
            metrics.record_store_write(
                self.store.backend_name(),
                operation,
                started.elapsed().as_secs_f64(),
            );
        }
        result
    }

    fn observe<T>(&self, operation: &'static str, result: &Result<T, OrderError>) {
        let Err(e) = result else { return };

        match e {
            OrderError::Persistence(_) => {
                tracing::error!(operation, error = %e, "Order operation failed")
            }
            _ => tracing::debug!(operation, reason = e.kind(), error = %e, "Order operation rejected"),
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_rejection(operation, e.kind());
        }
    }
}

fn validate_items(items: &[OrderItem]) -> Result<(), OrderError> {
    if items.is_empty() {
        return Err(OrderError::Validation("order must contain at least one item".to_string()));
    }
    if let Some(item) = items.iter().find(|item| item.quantity == 0) {
        return Err(OrderError::Validation(format!(
            "item '{}' has zero quantity",
            item.name
        )));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Unit Tests
// ============================================================================
