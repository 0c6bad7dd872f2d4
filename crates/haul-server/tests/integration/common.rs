use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};

use haul_client::SourceProfile;
use haul_core::config::AcquisitionConfig;
use haul_server::routes;
use haul_server::state::AppState;

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

pub const SEARCH_API_BODY: &str = r#"{
    "items": [
        {
            "id": 123456,
            "name": "Chanel Classic Flap Bag",
            "description": "Medium flap in excellent condition. Price £4,250. Sold by parisboutique",
            "link": "/women-bags/handbags/chanel/classic-flap-123456.shtml"
        },
        {
            "id": 789012,
            "name": "Louis Vuitton Neverfull MM",
            "description": "Tote in good condition, £1,180",
            "link": "/women-bags/tote/louis-vuitton/neverfull-789012.shtml"
        },
        {
            "id": 345678,
            "name": "Hermès Birkin 30",
            "description": "Togo leather, like new. £8,900",
            "link": "/women-bags/handbags/hermes/birkin-30-345678.shtml"
        }
    ],
    "paginationStats": {"totalCount": 1003}
}"#;

pub const CATALOG_ITEMS: usize = 60;

fn catalog_page() -> String {
    let cards: String = (0..CATALOG_ITEMS)
        .map(|i| {
            format!(
                r#"<div data-testid="grid-item">
                     <a data-testid="item-{i}--overlay-link" href="/items/{i}-tee"></a>
                     <p data-testid="item-{i}--description-title">Tee {i}</p>
                     <p data-testid="item-{i}--price-text">£{price}.00</p>
                   </div>"#,
                price = 5 + i
            )
        })
        .collect();
    format!(
        r#"<html><body><span data-testid="catalog-total">{CATALOG_ITEMS} results</span>{cards}</body></html>"#
    )
}

/// Local stand-in for the marketplaces, counting every upstream hit.
#[derive(Clone, Default)]
pub struct MockUpstream {
    pub base: String,
    pub calls: Arc<AtomicUsize>,
}

impl MockUpstream {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn search_api(State(calls): State<Arc<AtomicUsize>>) -> &'static str {
    calls.fetch_add(1, Ordering::SeqCst);
    SEARCH_API_BODY
}

async fn catalog(State(calls): State<Arc<AtomicUsize>>) -> Html<String> {
    calls.fetch_add(1, Ordering::SeqCst);
    Html(catalog_page())
}

async fn broken(State(calls): State<Arc<AtomicUsize>>) -> StatusCode {
    calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn slow(State(calls): State<Arc<AtomicUsize>>) -> &'static str {
    calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;
    SEARCH_API_BODY
}

pub async fn spawn_upstream() -> MockUpstream {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/search", post(search_api))
        .route("/catalog", get(catalog))
        .route("/broken", get(broken).post(broken))
        .route("/slow", post(slow))
        .with_state(calls.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockUpstream {
        base: format!("http://{addr}"),
        calls,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub upstream: MockUpstream,
}

/// Which mock routes the two sources are pointed at.
pub enum Upstream {
    Healthy,
    Broken,
    Slow,
}

pub async fn build_app(upstream_kind: Upstream, admin_token: Option<&str>) -> TestApp {
    let upstream = spawn_upstream().await;
    let (search_path, catalog_path) = match upstream_kind {
        Upstream::Healthy => ("search", "catalog"),
        Upstream::Broken => ("broken", "broken"),
        Upstream::Slow => ("slow", "slow"),
    };
    let profiles = [
        SourceProfile::vestiaire().with_endpoint(format!("{}/{search_path}", upstream.base)),
        SourceProfile::vinted().with_endpoint(format!("{}/{catalog_path}", upstream.base)),
    ];

    let state = AppState::from_profiles(&profiles, &AcquisitionConfig::default())
        .unwrap()
        .with_admin_token(admin_token.map(String::from));
    let state = match upstream_kind {
        Upstream::Slow => state.with_request_timeout(Some(Duration::from_millis(200))),
        _ => state,
    };
    let state = Arc::new(state);

    TestApp {
        router: routes::router(state.clone()),
        state,
        upstream,
    }
}

pub async fn setup_test_app() -> TestApp {
    build_app(Upstream::Healthy, Some(TEST_ADMIN_TOKEN)).await
}

pub async fn setup_test_app_no_auth() -> TestApp {
    build_app(Upstream::Healthy, None).await
}

pub async fn setup_broken_app() -> TestApp {
    build_app(Upstream::Broken, Some(TEST_ADMIN_TOKEN)).await
}

pub async fn setup_slow_app() -> TestApp {
    build_app(Upstream::Slow, None).await
}
