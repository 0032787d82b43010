use actix::prelude::*;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::order::{Order, OrderStatus};
use crate::metrics::Metrics;
use crate::reconcile;
use crate::store::OrderStore;

// ============================================================================
// Terminal Actor - One station screen with its own polling loop
// ============================================================================
//
// Responsibilities:
// - Poll the shared store on a fixed interval
// - Merge each authoritative read with the local cache (last write wins)
// - Take optimistic local writes immediately (RecordLocal)
// - Serve the station's filtered view
//
// Mutations never go through this actor; callers use OrderService and hand
// the returned order back with RecordLocal.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalKind {
    Register,
    Kitchen,
    Oven,
    Monitor,
}

impl TerminalKind {
    pub const ALL: [TerminalKind; 4] = [
        TerminalKind::Register,
        TerminalKind::Kitchen,
        TerminalKind::Oven,
        TerminalKind::Monitor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalKind::Register => "REGISTER",
            TerminalKind::Kitchen => "KITCHEN",
            TerminalKind::Oven => "OVEN",
            TerminalKind::Monitor => "MONITOR",
        }
    }

    /// Whether orders in `status` appear on this station's screen.
    pub fn shows(&self, status: OrderStatus) -> bool {
        match self {
            TerminalKind::Register => true,
            TerminalKind::Kitchen => matches!(status, OrderStatus::New | OrderStatus::Prep),
            TerminalKind::Oven => status == OrderStatus::Oven,
            TerminalKind::Monitor => matches!(
                status,
                OrderStatus::Prep | OrderStatus::Oven | OrderStatus::Ready
            ),
        }
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Orders visible at this station, priority first, then oldest first.
#[derive(Message)]
#[rtype(result = "Vec<Order>")]
pub struct GetView;

/// An order this terminal just wrote; merged into the cache right away.
#[derive(Message)]
#[rtype(result = "()")]
pub struct RecordLocal(pub Order);

/// Poll the store now instead of waiting for the next tick. Returns the
/// number of orders held after the merge.
#[derive(Message)]
#[rtype(result = "usize")]
pub struct RefreshNow;

#[derive(Message)]
#[rtype(result = "()")]
pub struct StopTerminal;

// ============================================================================
// Terminal Actor
// ============================================================================

pub struct TerminalActor {
    kind: TerminalKind,
    store: Arc<dyn OrderStore>,
    poll_interval: Duration,
    cache: Vec<Order>,
    poll_in_flight: bool,
    metrics: Option<Arc<Metrics>>,
}

impl TerminalActor {
    pub fn new(kind: TerminalKind, store: Arc<dyn OrderStore>, poll_interval: Duration) -> Self {
        Self {
            kind,
            store,
            poll_interval,
            cache: Vec::new(),
            poll_in_flight: false,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn apply_authoritative(&mut self, authoritative: Vec<Order>) {
        let (merged, report) = reconcile::merge_with_report(&authoritative, &self.cache);
        self.cache = merged;

        if report.local_wins > 0 {
            tracing::debug!(
                terminal = %self.kind,
                local_wins = report.local_wins,
                local_only = report.local_only,
                "Local writes newer than store read"
            );
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_terminal_poll(self.kind.as_str(), self.cache.len(), report.local_wins);
        }
    }

    /// Scheduled tick. A tick that lands while a read is still running is
    /// skipped.
    fn poll(&mut self, ctx: &mut Context<Self>) {
        if self.poll_in_flight {
            tracing::trace!(terminal = %self.kind, "Previous poll still running, skipping tick");
            return;
        }
        self.poll_in_flight = true;

        let store = self.store.clone();
        ctx.spawn(
            async move { store.get_all().await }
                .into_actor(self)
                .map(|orders, act, _ctx| {
                    act.poll_in_flight = false;
                    act.apply_authoritative(orders);
                }),
        );
    }

    fn view(&self) -> Vec<Order> {
        let mut visible: Vec<Order> = self
            .cache
            .iter()
            .filter(|order| self.kind.shows(order.status))
            .cloned()
            .collect();
        visible.sort_by_key(|order| (!order.is_priority, order.created_at, order.display_id));
        visible
    }
}

impl Actor for TerminalActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            terminal = %self.kind,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "TerminalActor started"
        );

        self.poll(ctx);
        ctx.run_interval(self.poll_interval, |act, ctx| act.poll(ctx));
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        tracing::info!(terminal = %self.kind, "TerminalActor stopped");
    }
}

impl Handler<GetView> for TerminalActor {
    type Result = MessageResult<GetView>;

    fn handle(&mut self, _msg: GetView, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.view())
    }
}

impl Handler<RecordLocal> for TerminalActor {
    type Result = ();

    fn handle(&mut self, msg: RecordLocal, _: &mut Self::Context) {
        let RecordLocal(order) = msg;
        tracing::debug!(
            terminal = %self.kind,
            order_id = %order.id,
            status = %order.status,
            "Recording local write"
        );
        self.cache = reconcile::merge(std::slice::from_ref(&order), &self.cache);
    }
}

impl Handler<RefreshNow> for TerminalActor {
    type Result = ResponseActFuture<Self, usize>;

    fn handle(&mut self, _msg: RefreshNow, _: &mut Self::Context) -> Self::Result {
        let store = self.store.clone();
        Box::pin(
            async move { store.get_all().await }
                .into_actor(self)
                .map(|orders, act, _ctx| {
                    act.apply_authoritative(orders);
                    act.cache.len()
                }),
        )
    }
}

impl Handler<StopTerminal> for TerminalActor {
    type Result = ();

    fn handle(&mut self, _: StopTerminal, ctx: &mut Self::Context) {
        tracing::info!(terminal = %self.kind, "TerminalActor received stop signal");
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::tests::sample_order;
    use crate::store::InMemoryOrderStore;
    use chrono::Duration as ChronoDuration;

    const IDLE: Duration = Duration::from_secs(3600);

    fn order_at(status: OrderStatus, minutes_ago: i64, is_priority: bool) -> Order {
        let mut order = sample_order(status);
        order.created_at = order.created_at - ChronoDuration::minutes(minutes_ago);
        order.is_priority = is_priority;
        order
    }

    #[test]
    fn test_station_visibility() {
        assert!(OrderStatus::ALL.iter().all(|s| TerminalKind::Register.shows(*s)));
        assert!(TerminalKind::Kitchen.shows(OrderStatus::New));
        assert!(!TerminalKind::Kitchen.shows(OrderStatus::Oven));
        assert!(TerminalKind::Oven.shows(OrderStatus::Oven));
        assert!(!TerminalKind::Oven.shows(OrderStatus::Ready));
        assert!(TerminalKind::Monitor.shows(OrderStatus::Ready));
        assert!(!TerminalKind::Monitor.shows(OrderStatus::Completed));
    }

    #[actix::test]
    async fn test_kitchen_view_filters_and_puts_priority_first() {
        let oldest = order_at(OrderStatus::New, 30, false);
        let rush = order_at(OrderStatus::Prep, 5, true);
        let newer = order_at(OrderStatus::Prep, 10, false);
        let baking = order_at(OrderStatus::Oven, 40, true);
        let store = Arc::new(InMemoryOrderStore::with_orders(vec![
            newer.clone(),
            baking,
            oldest.clone(),
            rush.clone(),
        ]));

        let terminal = TerminalActor::new(TerminalKind::Kitchen, store, IDLE).start();
        assert_eq!(terminal.send(RefreshNow).await.unwrap(), 4);

        let view = terminal.send(GetView).await.unwrap();
        let ids: Vec<_> = view.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![rush.id, oldest.id, newer.id]);
    }

    #[actix::test]
    async fn test_local_write_survives_stale_poll() {
        let stored = sample_order(OrderStatus::Prep);
        let store = Arc::new(InMemoryOrderStore::with_orders(vec![stored.clone()]));
        let terminal = TerminalActor::new(TerminalKind::Oven, store.clone(), IDLE).start();

        let mut local = stored.clone();
        local.apply_transition(OrderStatus::Oven, None).unwrap();
        terminal.send(RecordLocal(local.clone())).await.unwrap();
        terminal.send(RefreshNow).await.unwrap();

        let view = terminal.send(GetView).await.unwrap();
        assert_eq!(view, vec![local.clone()]);

        // Store catches up with a newer write from another terminal
        let mut ready = local.clone();
        ready.apply_transition(OrderStatus::Ready, None).unwrap();
        store.update(ready).await.unwrap();
        terminal.send(RefreshNow).await.unwrap();

        assert!(terminal.send(GetView).await.unwrap().is_empty());
    }

    #[actix::test]
    async fn test_poll_records_metrics() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let store = Arc::new(InMemoryOrderStore::with_orders(vec![
            sample_order(OrderStatus::Ready),
            sample_order(OrderStatus::Completed),
        ]));
        let terminal = TerminalActor::new(TerminalKind::Monitor, store, IDLE)
            .with_metrics(metrics.clone())
            .start();

        terminal.send(RefreshNow).await.unwrap();

        assert!(metrics.terminal_polls.with_label_values(&["MONITOR"]).get() >= 1);
        assert_eq!(metrics.terminal_cache_size.with_label_values(&["MONITOR"]).get(), 2);
        assert_eq!(terminal.send(GetView).await.unwrap().len(), 1);
    }

    #[actix::test]
    async fn test_interval_picks_up_new_orders() {
        let store = Arc::new(InMemoryOrderStore::new());
        let terminal =
            TerminalActor::new(TerminalKind::Register, store.clone(), Duration::from_millis(20))
                .start();

        store.create(sample_order(OrderStatus::New)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(terminal.send(GetView).await.unwrap().len(), 1);
    }

    #[actix::test]
    async fn test_stop_terminal() {
        let store = Arc::new(InMemoryOrderStore::new());
        let terminal = TerminalActor::new(TerminalKind::Register, store, IDLE).start();

        terminal.send(StopTerminal).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(!terminal.connected());
    }
}
