use actix::prelude::*;
use anyhow::Context as _;
use futures_util::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kitchen_orders::actors::{GetView, RecordLocal, RefreshNow, StopTerminal, TerminalActor, TerminalKind};
use kitchen_orders::audit::TracingAuditLogger;
use kitchen_orders::config::{AppConfig, StoreBackend};
use kitchen_orders::domain::order::{
    AdminOverride, CreateOrderInput, Order, OrderItem, OrderService, OrderStatus, OrderType,
    PaymentMethod, StatusChange,
};
use kitchen_orders::messaging::{GuardedPublisher, RedpandaClient};
use kitchen_orders::metrics::{self, Metrics};
use kitchen_orders::notifications::{
    InMemoryNotificationStore, LogNotifier, NotificationDispatcher, RedpandaNotifier,
};
use kitchen_orders::store::{InMemoryOrderStore, JsonFileOrderStore, OrderStore, PostgresOrderStore};
use kitchen_orders::utils::CircuitBreakerConfig;

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Silent if there is no .env; deployments set variables directly
    dotenvy::dotenv().ok();

    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=kitchen_orders=trace cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kitchen_orders=debug"))
        )
        .init();

    tracing::info!("🍕 Starting kitchen order lifecycle demo");

    let config = AppConfig::from_env()?;
    tracing::info!(
        backend = ?config.store_backend,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Configuration loaded"
    );

    // === 1. Order store ===
    let store: Arc<dyn OrderStore> = match config.store_backend {
        StoreBackend::File => {
            tracing::info!(path = %config.data_path.display(), "Using JSON file store");
            Arc::new(JsonFileOrderStore::new(config.data_path.clone()))
        }
        StoreBackend::Memory => {
            tracing::info!("Using in-memory store");
            Arc::new(InMemoryOrderStore::new())
        }
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set for the postgres backend")?;
            tracing::info!("Connecting to PostgreSQL...");
            let postgres = PostgresOrderStore::connect(url).await?;
            postgres.migrate().await?;
            Arc::new(postgres)
        }
    };

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    actix::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_registry, metrics_port).await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 3. Notifications (Redpanda if configured, log otherwise) ===
    let notifier: Arc<dyn NotificationDispatcher> = match config.redpanda_brokers.as_deref() {
        Some(brokers) => {
            let redpanda = GuardedPublisher::new(
                "redpanda",
                RedpandaClient::new(brokers)?,
                CircuitBreakerConfig::default(),
            )
            .with_metrics(metrics.clone());
            tracing::info!(topic = %config.notification_topic, "SMS requests go to Redpanda");
            Arc::new(RedpandaNotifier::new(Arc::new(redpanda), config.notification_topic.clone()))
        }
        None => {
            tracing::info!("No brokers configured, ready notifications are logged only");
            Arc::new(LogNotifier)
        }
    };

    // === 4. Order service (explicit wiring, no globals) ===
    let service = OrderService::new(
        store.clone(),
        notifier,
        Arc::new(InMemoryNotificationStore::new()),
        Arc::new(TracingAuditLogger),
    )
    .with_metrics(metrics.clone());

    // === 5. Station terminals ===
    let terminals: Vec<(TerminalKind, Addr<TerminalActor>)> = TerminalKind::ALL
        .iter()
        .map(|kind| {
            let actor = TerminalActor::new(*kind, store.clone(), config.poll_interval)
                .with_metrics(metrics.clone())
                .start();
            (*kind, actor)
        })
        .collect();

    // === 6. Demonstrate the order lifecycle ===
    tracing::info!("📝 Demonstrating order lifecycle");

    let dana = service
        .create_order(CreateOrderInput {
            customer_name: Some("Dana".to_string()),
            customer_phone: Some("555-0101".to_string()),
            order_type: OrderType::Pickup,
            address: None,
            items: vec![pizza("Pepperoni", "L", Decimal::new(1450, 2), &["pepperoni", "basil"])],
            total_price: Decimal::new(1450, 2),
            payment_method: PaymentMethod::Card,
            is_priority: false,
            special_instructions: Some("Extra crispy".to_string()),
        })
        .await?;
    broadcast(&terminals, &dana);

    let walk_in = service
        .create_order(CreateOrderInput {
            customer_name: None,
            customer_phone: None,
            order_type: OrderType::DineIn,
            address: None,
            items: vec![pizza("Margherita", "M", Decimal::new(1100, 2), &[])],
            total_price: Decimal::new(1100, 2),
            payment_method: PaymentMethod::PayAtRegister,
            is_priority: true,
            special_instructions: None,
        })
        .await?;
    broadcast(&terminals, &walk_in);
    tracing::info!("✅ Orders #{} and #{} taken", dana.display_id, walk_in.display_id);

    let steps = [
        StatusChange::new(dana.id, OrderStatus::Prep)
            .assigned_to("Luis")
            .expecting(OrderStatus::New),
        StatusChange::new(walk_in.id, OrderStatus::Prep).expecting(OrderStatus::New),
        StatusChange::new(dana.id, OrderStatus::Oven).expecting(OrderStatus::Prep),
        StatusChange::new(dana.id, OrderStatus::Ready).expecting(OrderStatus::Oven),
    ];
    for step in steps {
        let order = service.update_status(step).await?;
        broadcast(&terminals, &order);
    }

    // A stale terminal trying to move the order backwards is refused
    if let Err(e) = service
        .update_status(StatusChange::new(dana.id, OrderStatus::Prep))
        .await
    {
        tracing::info!("🚫 Rejected as expected: {}", e);
    }

    let paid = service.mark_as_paid(walk_in.id).await?;
    broadcast(&terminals, &paid);

    let refreshed = join_all(terminals.iter().map(|(_, addr)| addr.send(RefreshNow))).await;
    for ((kind, _), held) in terminals.iter().zip(refreshed) {
        let held = held?;
        tracing::debug!(terminal = %kind, orders = held, "Terminal refreshed");
    }

    if let Some((_, monitor)) = terminals.iter().find(|(kind, _)| *kind == TerminalKind::Monitor) {
        for order in monitor.send(GetView).await? {
            tracing::info!(
                "📺 #{:<2} {:<9} {:<8} {}",
                order.display_id,
                order.status.as_str(),
                order.customer_snapshot.display_name(),
                if order.is_priority { "PRIORITY" } else { "" }
            );
        }
    }

    let completed = service
        .update_status(StatusChange::new(dana.id, OrderStatus::Completed))
        .await?;
    broadcast(&terminals, &completed);

    let cancelled = service
        .admin_override_status(AdminOverride {
            admin_id: "manager".to_string(),
            order_id: walk_in.id,
            new_status: OrderStatus::Cancelled,
            reason: "Customer left".to_string(),
            comment: "Refunded at register".to_string(),
            assigned_to: None,
        })
        .await?;
    broadcast(&terminals, &cancelled);

    tracing::info!(
        orders = service.list_orders().await.len(),
        "🎉 Demo complete, stopping terminals"
    );

    for (_, terminal) in &terminals {
        terminal.do_send(StopTerminal);
    }
    // Let the terminals log their shutdown
    tokio::time::sleep(Duration::from_millis(100)).await;

    Ok(())
}

fn pizza(name: &str, size: &str, price: Decimal, toppings: &[&str]) -> OrderItem {
    OrderItem {
        name: name.to_string(),
        size: size.to_string(),
        crust: Some("classic".to_string()),
        price,
        quantity: 1,
        notes: None,
        toppings: toppings.iter().map(|t| t.to_string()).collect(),
    }
}

/// Hand a freshly written order to every terminal's local cache.
fn broadcast(terminals: &[(TerminalKind, Addr<TerminalActor>)], order: &Order) {
    for (_, terminal) in terminals {
        terminal.do_send(RecordLocal(order.clone()));
    }
}
