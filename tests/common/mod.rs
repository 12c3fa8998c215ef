use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use storefront_api::{
    config::AppConfig,
    db,
    entities::{ProductModel, ProductVariantModel},
    events::{self, EventSender},
    handlers::AppServices,
    services::{CreateProductInput, CreateVariantInput},
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Helper harness for spinning up an application state backed by a
/// tempfile-scoped SQLite database.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    _event_task: tokio::task::JoinHandle<()>,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        Self::new_with(|_| {}).await
    }

    /// Like [`TestApp::new`] but lets the caller tweak the config before the
    /// services are built, e.g. to flip `clear_cart_after_checkout`.
    pub async fn new_with(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("storefront_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        customize(&mut cfg);

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), event_sender.clone(), cfg.clone());

        let state = Arc::new(AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        });

        let router = Router::new()
            .nest("/api/v1", storefront_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
            _db_dir: db_dir,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a request and parse the response body as JSON.
    pub async fn request_json(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.request(method, uri, body).await;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body bytes");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json response")
        };
        (status, json)
    }

    /// Seed an active product with tracked stock.
    #[allow(dead_code)]
    pub async fn seed_product(&self, name: &str, price: Decimal, quantity: i32) -> ProductModel {
        self.state
            .services
            .catalog
            .create_product(CreateProductInput {
                name: name.to_string(),
                description: None,
                sku: None,
                price,
                compare_price: None,
                cost_price: None,
                currency: None,
                quantity: Some(quantity),
                track_quantity: Some(true),
                low_stock_threshold: None,
                is_active: Some(true),
                featured: Some(false),
            })
            .await
            .expect("seed product for tests")
    }

    /// Seed a product whose stock is not tracked.
    #[allow(dead_code)]
    pub async fn seed_untracked_product(&self, name: &str, price: Decimal) -> ProductModel {
        self.state
            .services
            .catalog
            .create_product(CreateProductInput {
                name: name.to_string(),
                description: None,
                sku: None,
                price,
                compare_price: None,
                cost_price: None,
                currency: None,
                quantity: Some(0),
                track_quantity: Some(false),
                low_stock_threshold: None,
                is_active: Some(true),
                featured: Some(false),
            })
            .await
            .expect("seed untracked product for tests")
    }

    /// Seed a variant under the given product.
    #[allow(dead_code)]
    pub async fn seed_variant(
        &self,
        product_id: uuid::Uuid,
        name: &str,
        price: Option<Decimal>,
        quantity: i32,
    ) -> ProductVariantModel {
        self.state
            .services
            .catalog
            .create_variant(
                product_id,
                CreateVariantInput {
                    name: name.to_string(),
                    sku: None,
                    price,
                    quantity: Some(quantity),
                    position: None,
                },
            )
            .await
            .expect("seed product variant for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Parse a JSON money field into a `Decimal`.
///
/// Monetary values serialize as strings; comparing parsed decimals keeps the
/// assertions independent of trailing-zero formatting.
#[allow(dead_code)]
pub fn decimal(value: &Value) -> Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {value}"))
        .parse()
        .expect("parse decimal value")
}
