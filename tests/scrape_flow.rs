//! End-to-end scrape runs against a local fixture site: traversal,
//! deduplication, pagination termination, and catalog persistence.

use axum::response::Html;
use axum::routing::{get, MethodRouter};
use axum::Router;
use catalog_scraper::catalog::{Catalog, ProductFilter};
use catalog_scraper::config::ScraperConfig;
use catalog_scraper::jobs;
use catalog_scraper::spiders::{SpiderKind, SpiderOverrides};
use std::sync::Arc;

fn html_route(body: String) -> MethodRouter {
    get(move || {
        let body = body.clone();
        async move { Html(body) }
    })
}

/// Binds an ephemeral port, serves `build(origin)` on it, and returns the
/// origin. Pages need to know their own origin so detail links can be
/// absolute (relative links would be absolutized against the spider's
/// production origin).
async fn serve_fixture<F>(build: F) -> String
where
    F: FnOnce(&str) -> Router,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    let app = build(&origin);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    origin
}

async fn temp_catalog() -> (Catalog, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}/catalog.db", dir.path().display());
    let catalog = Catalog::connect(&url).await.unwrap();
    (catalog, dir)
}

fn test_config() -> Arc<ScraperConfig> {
    Arc::new(ScraperConfig {
        use_proxy: false,
        ..ScraperConfig::default()
    })
}

const WIDGET_DETAIL: &str = r#"<html><body>
    <span id="productTitle">Widget</span>
    <span class="a-offscreen">$19.99</span>
    <img id="landingImage" src="https://img.example.com/widget.jpg">
</body></html>"#;

const GADGET_DETAIL: &str = r#"<html><body>
    <span id="productTitle">Gadget</span>
    <span id="priceblock_ourprice">$5.00</span>
</body></html>"#;

#[tokio::test]
async fn full_scrape_run_populates_the_catalog() {
    // One listing page linking to the same detail page twice, with a
    // disabled next affordance: the duplicate link and the pagination
    // must never hit the network.
    let origin = serve_fixture(|origin| {
        let listing = format!(
            r#"<html><body>
            <div class="s-result-item">
                <h2><a href="{origin}/product/1">link</a></h2>
                <a class="a-link-normal"><h2><span>Widget</span></h2></a>
            </div>
            <div class="s-result-item">
                <h2><a href="{origin}/product/1">link</a></h2>
                <a class="a-link-normal"><h2><span>Widget</span></h2></a>
            </div>
            <a class="s-pagination-next s-pagination-disabled" href="{origin}/page/2">Next</a>
        </body></html>"#
        );

        Router::new()
            .route("/listing", html_route(listing))
            .route("/product/1", html_route(WIDGET_DETAIL.to_string()))
    })
    .await;

    let (catalog, _dir) = temp_catalog().await;
    let overrides = SpiderOverrides {
        start_urls: Some(vec![format!("{}/listing", origin)]),
    };

    let stats = jobs::run_spider(test_config(), catalog.clone(), SpiderKind::Amazon, overrides)
        .await
        .unwrap();

    assert_eq!(stats.requests_dispatched, 2); // listing + one detail
    assert_eq!(stats.requests_dropped, 1); // the duplicate detail link
    assert_eq!(stats.pages_parsed, 2);
    assert_eq!(stats.items_scraped, 1);

    assert_eq!(catalog.count_products().await.unwrap(), 1);
    let page = catalog.list_products(&ProductFilter::default()).await.unwrap();
    let product = &page.products[0];
    assert_eq!(product.title, "Widget");
    assert_eq!(product.price, 19.99);
    assert_eq!(
        product.image_url.as_deref(),
        Some("https://img.example.com/widget.jpg")
    );
}

#[tokio::test]
async fn pagination_is_followed_and_reruns_update_in_place() {
    let origin = serve_fixture(|origin| {
        let first = format!(
            r#"<html><body>
            <div class="s-result-item">
                <h2><a href="{origin}/product/1">link</a></h2>
                <a class="a-link-normal"><h2><span>Widget</span></h2></a>
            </div>
            <a class="s-pagination-next" href="{origin}/listing/2">Next</a>
        </body></html>"#
        );
        let second = format!(
            r#"<html><body>
            <div class="s-result-item">
                <h2><a href="{origin}/product/2">link</a></h2>
                <a class="a-link-normal"><h2><span>Gadget</span></h2></a>
            </div>
            <a class="s-pagination-next s-pagination-disabled" href="{origin}/listing/3">Next</a>
        </body></html>"#
        );

        Router::new()
            .route("/listing", html_route(first))
            .route("/listing/2", html_route(second))
            .route("/product/1", html_route(WIDGET_DETAIL.to_string()))
            .route("/product/2", html_route(GADGET_DETAIL.to_string()))
    })
    .await;

    let (catalog, _dir) = temp_catalog().await;
    let config = test_config();
    let overrides = SpiderOverrides {
        start_urls: Some(vec![format!("{}/listing", origin)]),
    };

    let stats = jobs::run_spider(
        Arc::clone(&config),
        catalog.clone(),
        SpiderKind::Amazon,
        overrides.clone(),
    )
    .await
    .unwrap();

    // two listing pages and two detail pages
    assert_eq!(stats.requests_dispatched, 4);
    assert_eq!(stats.items_scraped, 2);
    assert_eq!(catalog.count_products().await.unwrap(), 2);

    // A second run starts with a fresh dedup set, fetches everything
    // again, and upserts rather than duplicating.
    let stats = jobs::run_spider(config, catalog.clone(), SpiderKind::Amazon, overrides)
        .await
        .unwrap();

    assert_eq!(stats.requests_dispatched, 4);
    assert_eq!(catalog.count_products().await.unwrap(), 2);
}

#[tokio::test]
async fn a_failed_fetch_abandons_only_that_branch() {
    // The listing references one dead detail URL and one live one.
    let origin = serve_fixture(|origin| {
        let listing = format!(
            r#"<html><body>
            <div class="s-result-item">
                <h2><a href="http://127.0.0.1:9/product/dead">link</a></h2>
                <a class="a-link-normal"><h2><span>Dead</span></h2></a>
            </div>
            <div class="s-result-item">
                <h2><a href="{origin}/product/1">link</a></h2>
                <a class="a-link-normal"><h2><span>Widget</span></h2></a>
            </div>
        </body></html>"#
        );

        Router::new()
            .route("/listing", html_route(listing))
            .route("/product/1", html_route(WIDGET_DETAIL.to_string()))
    })
    .await;

    let (catalog, _dir) = temp_catalog().await;
    let overrides = SpiderOverrides {
        start_urls: Some(vec![format!("{}/listing", origin)]),
    };

    let stats = jobs::run_spider(test_config(), catalog.clone(), SpiderKind::Amazon, overrides)
        .await
        .unwrap();

    assert_eq!(stats.requests_failed, 1);
    assert_eq!(stats.items_scraped, 1);
    assert_eq!(catalog.count_products().await.unwrap(), 1);
}
