//! Concrete spiders and the registry that maps spider types to them.

use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::extract::{absolutize, clean_text};
use crate::middleware::{
    DedupMiddleware, ProxyMiddleware, RequestMiddleware, UserAgentMiddleware,
};
use crate::request::{Callback, FetchRequest};
use crate::spider::{PageResponse, ParseOutput, RawItem, Spider};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// First matching element's text, whitespace-normalized; empty when the
// selector matches nothing.
fn first_text(scope: ElementRef<'_>, css: &str) -> String {
    if let Ok(selector) = Selector::parse(css) {
        if let Some(element) = scope.select(&selector).next() {
            return clean_text(&element.text().collect::<String>());
        }
    }
    String::new()
}

fn first_attr(scope: ElementRef<'_>, css: &str, attr: &str) -> String {
    if let Ok(selector) = Selector::parse(css) {
        if let Some(element) = scope.select(&selector).next() {
            return element.value().attr(attr).unwrap_or_default().to_string();
        }
    }
    String::new()
}

fn exists(scope: ElementRef<'_>, css: &str) -> bool {
    match Selector::parse(css) {
        Ok(selector) => scope.select(&selector).next().is_some(),
        Err(_) => false,
    }
}

const AMAZON_ORIGIN: &str = "https://www.amazon.com";
const AMAZON_START_URL: &str = "https://www.amazon.com/s?k=laptops";

/// Search-results spider: walks listing pages, follows every product link
/// to its detail page, and follows pagination until the next affordance is
/// missing or disabled.
pub struct AmazonSpider {
    start_urls: Vec<String>,
}

impl AmazonSpider {
    pub fn new(overrides: &SpiderOverrides) -> Self {
        let start_urls = overrides
            .start_urls
            .clone()
            .unwrap_or_else(|| vec![AMAZON_START_URL.to_string()]);

        Self { start_urls }
    }

    fn parse_listing(&self, root: ElementRef<'_>) -> ParseOutput {
        let mut output = ParseOutput::new();

        if let Ok(result_selector) = Selector::parse(".s-result-item") {
            for node in root.select(&result_selector) {
                let title = first_text(node, "a.a-link-normal h2 span");
                let product_url = first_attr(node, "h2 a", "href");

                if !product_url.is_empty() && !title.is_empty() {
                    let product_url = absolutize(&product_url, AMAZON_ORIGIN);
                    output.add_request(FetchRequest::new(product_url, Callback::ProductDetail));
                }
            }
        }

        let pagination_exists = exists(root, ".s-pagination-next");
        let is_disabled = exists(root, ".s-pagination-next.s-pagination-disabled");

        if pagination_exists && !is_disabled {
            let next_page_url = first_attr(root, ".s-pagination-next", "href");

            if !next_page_url.is_empty() {
                let next_page_url = absolutize(&next_page_url, AMAZON_ORIGIN);
                output.add_request(FetchRequest::new(next_page_url, Callback::Listing));
            }
        }

        output
    }

    fn parse_product(&self, root: ElementRef<'_>) -> ParseOutput {
        let mut output = ParseOutput::new();

        let title = first_text(root, "#productTitle");

        // Price can live in more than one spot; first match wins, and a
        // page with neither yields an empty string.
        let price = if exists(root, "#priceblock_ourprice") {
            first_text(root, "#priceblock_ourprice")
        } else if exists(root, ".a-offscreen") {
            first_text(root, ".a-offscreen")
        } else {
            String::new()
        };

        let image_url = first_attr(root, "#landingImage", "src");

        if !title.is_empty() {
            output.add_item(RawItem {
                title,
                price,
                image_url,
                product_id: None,
            });
        }

        output
    }
}

impl Spider for AmazonSpider {
    fn name(&self) -> &'static str {
        "amazon"
    }

    fn start_urls(&self) -> Vec<String> {
        self.start_urls.clone()
    }

    fn middleware(&self, config: &ScraperConfig) -> Vec<Box<dyn RequestMiddleware>> {
        vec![
            Box::new(DedupMiddleware::new()),
            Box::new(UserAgentMiddleware::new(config.user_agent.clone())),
            Box::new(ProxyMiddleware::new(config)),
        ]
    }

    fn parse(&self, response: &PageResponse) -> ParseOutput {
        let document = Html::parse_document(&response.body);
        let root = document.root_element();

        match response.callback {
            Callback::Listing => self.parse_listing(root),
            Callback::ProductDetail => self.parse_product(root),
        }
    }
}

/// Detail-page spider: extracts exactly one item from its start URL, with
/// no follow-up requests.
pub struct ProductPageSpider {
    start_urls: Vec<String>,
}

impl ProductPageSpider {
    pub fn new(config: &ScraperConfig, overrides: &SpiderOverrides) -> Self {
        let start_urls = overrides.start_urls.clone().unwrap_or_else(|| {
            vec![format!("{}/product", config.app_url.trim_end_matches('/'))]
        });

        Self { start_urls }
    }
}

impl Spider for ProductPageSpider {
    fn name(&self) -> &'static str {
        "product_page"
    }

    fn start_urls(&self) -> Vec<String> {
        self.start_urls.clone()
    }

    fn parse(&self, response: &PageResponse) -> ParseOutput {
        let document = Html::parse_document(&response.body);
        let root = document.root_element();
        let mut output = ParseOutput::new();

        let title = first_text(root, "#product-name");
        let image_url = first_attr(root, "#product-image img.product-image", "src");
        let price = first_text(root, "#product-price");

        if !title.is_empty() {
            output.add_item(RawItem {
                title,
                price,
                image_url,
                product_id: None,
            });
        }

        output
    }
}

/// Closed enumeration of spiders known to the dispatcher. Every variant
/// maps to an implemented spider; identifiers outside the enum fail at
/// `FromStr` with a client-visible configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpiderKind {
    Amazon,
    ProductPage,
}

impl SpiderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpiderKind::Amazon => "amazon",
            SpiderKind::ProductPage => "product_page",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SpiderKind::Amazon => "Amazon Product Spider",
            SpiderKind::ProductPage => "Product Page Spider",
        }
    }

    /// Spiders that can be dispatched, as shown by the API listing.
    pub fn available() -> Vec<SpiderKind> {
        vec![SpiderKind::Amazon, SpiderKind::ProductPage]
    }

    /// Builds the spider for one run, applying any overrides.
    pub fn build(&self, config: &ScraperConfig, overrides: &SpiderOverrides) -> Arc<dyn Spider> {
        match self {
            SpiderKind::Amazon => Arc::new(AmazonSpider::new(overrides)),
            SpiderKind::ProductPage => Arc::new(ProductPageSpider::new(config, overrides)),
        }
    }
}

impl fmt::Display for SpiderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpiderKind {
    type Err = ScrapeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "amazon" => Ok(SpiderKind::Amazon),
            "product_page" => Ok(SpiderKind::ProductPage),
            _ => Err(ScrapeError::UnknownSpider(value.to_string())),
        }
    }
}

/// Runtime overrides accepted by the dispatcher. Unknown keys in a JSON
/// body are ignored rather than rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpiderOverrides {
    #[serde(default)]
    pub start_urls: Option<Vec<String>>,
}
