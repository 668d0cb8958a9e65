//! Test harness for scoring integration tests.
//!
//! Provides a fake storefront served on a loopback port, a matching media
//! catalog and a ready-to-run scorer node.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use url::Url;

use contest_scorer::bench::content_hash;
use contest_scorer::config::ScorerConfig;
use contest_scorer::directory::{MediaCatalog, Participant, UserDirectory};
use contest_scorer::node::ScorerNode;
use contest_scorer::rating::kinds::{COMPUTE_INSTANCE, MANAGED_SQL};
use contest_scorer::rating::{InventoryProvider, ResourceRecord, StaticInventory};
use contest_scorer::store::{MemoryStore, ResultStore};

pub const WEB_ROLE: &str = "service_role_webapp";
pub const DB_ROLE: &str = "service_role_db";

/// View whose media reference points at tampered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Listing,
    Confirmation,
    Detail,
    History,
}

#[derive(Debug, Clone)]
pub struct StorefrontOptions {
    pub items: u32,
    pub corrupt: Option<View>,
    /// Every route, assets included, answers 500
    pub fail_all: bool,
    pub fail_reset: bool,
}

impl Default for StorefrontOptions {
    fn default() -> Self {
        Self {
            items: 2,
            corrupt: None,
            fail_all: false,
            fail_reset: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct StorefrontStats {
    pub requests: AtomicUsize,
    pub resets: AtomicUsize,
    pub listing_hits: AtomicUsize,
}

struct Shop {
    options: StorefrontOptions,
    orders: Mutex<Vec<(u32, u32)>>,
    stats: Arc<StorefrontStats>,
}

type SharedShop = Arc<Shop>;

/// Handle to a running fake storefront.
pub struct FakeStorefront {
    pub url: Url,
    pub addr: SocketAddr,
    pub stats: Arc<StorefrontStats>,
    pub items: u32,
}

impl FakeStorefront {
    pub async fn spawn(options: StorefrontOptions) -> Self {
        let stats = Arc::new(StorefrontStats::default());
        let items = options.items;
        let shop = Arc::new(Shop {
            options,
            orders: Mutex::new(Vec::new()),
            stats: Arc::clone(&stats),
        });

        let app = Router::new()
            .route("/products", get(listing))
            .route("/checkout", post(checkout))
            .route("/product/:id", get(detail))
            .route("/checkouts", get(history))
            .route("/admin/init", post(reset))
            .route("/assets/:name", get(asset))
            .route("/tampered/:name", get(tampered))
            .layer(middleware::from_fn_with_state(Arc::clone(&shop), gate))
            .with_state(shop);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: Url::parse(&format!("http://{addr}")).unwrap(),
            addr,
            stats,
            items,
        }
    }

    pub async fn healthy() -> Self {
        Self::spawn(StorefrontOptions::default()).await
    }

    /// Catalog holding the true hashes of every item image.
    pub fn catalog(&self) -> MediaCatalog {
        catalog(self.items)
    }

    pub fn requests(&self) -> usize {
        self.stats.requests.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.stats.resets.load(Ordering::SeqCst)
    }
}

pub fn image_bytes(item: u32) -> Vec<u8> {
    format!("image-bytes-of-item-{item}").into_bytes()
}

pub fn catalog(items: u32) -> MediaCatalog {
    MediaCatalog::new((1..=items).map(|i| (format!("item{i}.jpg"), content_hash(&image_bytes(i)))))
}

async fn gate(State(shop): State<SharedShop>, request: Request, next: Next) -> Response {
    shop.stats.requests.fetch_add(1, Ordering::SeqCst);
    if shop.options.fail_all {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    next.run(request).await
}

fn image_src(shop: &Shop, view: View, item: u32) -> String {
    if shop.options.corrupt == Some(view) {
        format!("/tampered/item{item}.jpg")
    } else {
        format!("/assets/item{item}.jpg")
    }
}

async fn listing(State(shop): State<SharedShop>) -> Html<String> {
    shop.stats.listing_hits.fetch_add(1, Ordering::SeqCst);
    let cards: String = (1..=shop.options.items)
        .map(|i| {
            format!(
                r#"<div class="card"><img class="card-img-top products-img" src="{}"><p>Item {i}</p></div>"#,
                image_src(&shop, View::Listing, i)
            )
        })
        .collect();
    Html(format!(
        r#"<html><body><div class="content-container">{cards}</div></body></html>"#
    ))
}

#[derive(Deserialize)]
struct CheckoutForm {
    item_id: u32,
    quantity: u32,
}

async fn checkout(State(shop): State<SharedShop>, Form(form): Form<CheckoutForm>) -> Response {
    if form.item_id == 0 || form.item_id > shop.options.items || form.quantity == 0 {
        return StatusCode::BAD_REQUEST.into_response();
    }
    shop.orders
        .lock()
        .unwrap()
        .push((form.item_id, form.quantity));

    let body = format!(
        r#"<html><body><div class="content-container">
            <p class="card-text">{} x Item {}</p>
            <img class="checkout-img" src="{}">
        </div></body></html>"#,
        form.quantity,
        form.item_id,
        image_src(&shop, View::Confirmation, form.item_id)
    );
    (StatusCode::ACCEPTED, Html(body)).into_response()
}

async fn detail(State(shop): State<SharedShop>, Path(id): Path<u32>) -> Response {
    if id == 0 || id > shop.options.items {
        return StatusCode::NOT_FOUND.into_response();
    }
    Html(format!(
        r#"<html><body><div class="content-container">
            <h1>Item {id}</h1><img class="product-img" src="{}">
        </div></body></html>"#,
        image_src(&shop, View::Detail, id)
    ))
    .into_response()
}

async fn history(State(shop): State<SharedShop>) -> Html<String> {
    let rows: String = shop
        .orders
        .lock()
        .unwrap()
        .iter()
        .map(|&(id, qty)| {
            format!(
                r#"<tr><td class="product_id">{id}</td><td class="product_quantity">{qty}</td>
                   <td class="product_image"><img src="{}"></td></tr>"#,
                image_src(&shop, View::History, id)
            )
        })
        .collect();
    Html(format!(
        r#"<html><body><div class="content-container"><table>{rows}</table></div></body></html>"#
    ))
}

async fn reset(State(shop): State<SharedShop>) -> StatusCode {
    shop.stats.resets.fetch_add(1, Ordering::SeqCst);
    if shop.options.fail_reset {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    shop.orders.lock().unwrap().clear();
    StatusCode::OK
}

async fn asset(Path(name): Path<String>) -> Response {
    match item_of(&name) {
        Some(item) => image_bytes(item).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn tampered(Path(name): Path<String>) -> Response {
    match item_of(&name) {
        Some(_) => b"tampered".to_vec().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn item_of(name: &str) -> Option<u32> {
    name.strip_prefix("item")?.strip_suffix(".jpg")?.parse().ok()
}

// =============================================================================
// Inventory and node helpers
// =============================================================================

pub fn vm(role: &str, zone: &str) -> ResourceRecord {
    ResourceRecord::new(COMPUTE_INSTANCE, zone)
        .with_label(role, "true")
        .with_status("RUNNING")
}

pub fn regional_sql(role: &str) -> ResourceRecord {
    ResourceRecord::new(MANAGED_SQL, "us-central1-a")
        .with_label(role, "true")
        .with_status("RUNNABLE")
        .with_attribute("availabilityType", "REGIONAL")
}

/// Frontend in two zones of one region, database regional: REGIONAL overall.
pub fn regional_project() -> Vec<ResourceRecord> {
    vec![
        vm(WEB_ROLE, "us-central1-a"),
        vm(WEB_ROLE, "us-central1-b"),
        regional_sql(DB_ROLE),
    ]
}

pub fn inventory(project_id: &str, records: Vec<ResourceRecord>) -> Arc<dyn InventoryProvider> {
    Arc::new(StaticInventory::new().with_project(project_id, records))
}

pub fn directory() -> Arc<UserDirectory> {
    Arc::new(UserDirectory::new(vec![
        Participant::new("key-alice", "alice"),
        Participant::new("key-bob", "bob"),
        Participant::new("key-carol", "carol"),
    ]))
}

/// Scorer config with loopback targets allowed and a short benchmark budget.
pub fn test_config(bench_deadline: Duration) -> ScorerConfig {
    let mut config = ScorerConfig::new("127.0.0.1:0".parse().unwrap())
        .with_bench_deadline(bench_deadline)
        .with_allow_local_targets(true)
        .with_worker_ceiling(2);
    config.bench.request_timeout = Duration::from_secs(2);
    config.rating.required_roles = BTreeMap::from([
        (WEB_ROLE.to_string(), "true".to_string()),
        (DB_ROLE.to_string(), "true".to_string()),
    ]);
    config
}

/// Node wired to `store`, the given inventory and the storefront's catalog.
pub fn test_node(
    config: ScorerConfig,
    shop: &FakeStorefront,
    inventory: Arc<dyn InventoryProvider>,
    store: Arc<dyn ResultStore>,
) -> ScorerNode {
    ScorerNode::from_parts(config, directory(), Arc::new(shop.catalog()), inventory, store).unwrap()
}

pub fn memory_store() -> Arc<dyn ResultStore> {
    Arc::new(MemoryStore::new())
}
