//! Item pipeline: validates, normalizes, and persists extracted records.

use crate::catalog::Catalog;
use crate::error::ScrapeError;
use crate::extract::clean_price;
use crate::spider::RawItem;

/// Processes raw items into catalog records. `process_item` always returns
/// the item and signals disposition through logs, so one bad item can
/// never break the run loop.
pub struct ProductProcessor {
    catalog: Catalog,
}

impl ProductProcessor {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub async fn process_item(&self, item: RawItem) -> RawItem {
        match self.try_process(&item).await {
            Ok(Some(product_id)) => RawItem {
                product_id: Some(product_id),
                ..item
            },
            Ok(None) => item,
            Err(e) => {
                log::error!("Error processing product: {} (item: {:?})", e, item);
                metrics::counter!("scraper_items_errored").increment(1);
                item
            }
        }
    }

    async fn try_process(&self, item: &RawItem) -> Result<Option<i64>, ScrapeError> {
        let title = item.title.trim();

        if title.is_empty() || item.price.trim().is_empty() {
            log::warn!(
                "Skipping product with missing required fields: title='{}' price='{}'",
                title,
                item.price
            );
            metrics::counter!("scraper_items_skipped").increment(1);
            return Ok(None);
        }

        let price = clean_price(&item.price);
        let image_url = (!item.image_url.is_empty()).then_some(item.image_url.as_str());

        let (product, created) = self.catalog.upsert_product(title, price, image_url).await?;

        if created {
            log::info!("Created new product: id={} title='{}'", product.id, product.title);
        } else {
            log::info!("Updated existing product: id={} title='{}'", product.id, product.title);
        }
        metrics::counter!("scraper_items_persisted").increment(1);

        Ok(Some(product.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductFilter;

    async fn test_processor() -> (ProductProcessor, Catalog, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}/catalog.db", dir.path().display());
        let catalog = Catalog::connect(&url).await.expect("connect");
        (ProductProcessor::new(catalog.clone()), catalog, dir)
    }

    #[tokio::test]
    async fn items_missing_required_fields_are_skipped() {
        let (processor, catalog, _dir) = test_processor().await;

        let no_title = processor
            .process_item(RawItem {
                title: "   ".to_string(),
                price: "$5.00".to_string(),
                ..RawItem::default()
            })
            .await;
        assert_eq!(no_title.product_id, None);

        let no_price = processor
            .process_item(RawItem {
                title: "Widget".to_string(),
                price: String::new(),
                ..RawItem::default()
            })
            .await;
        assert_eq!(no_price.product_id, None);

        assert_eq!(catalog.count_products().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn processing_persists_and_attaches_the_product_id() {
        let (processor, catalog, _dir) = test_processor().await;

        let item = processor
            .process_item(RawItem {
                title: "  Widget  ".to_string(),
                price: "$19.99".to_string(),
                image_url: "https://img.example.com/w.jpg".to_string(),
                product_id: None,
            })
            .await;
        let id = item.product_id.expect("persisted item gets a product id");

        let page = catalog.list_products(&ProductFilter::default()).await.unwrap();
        assert_eq!(page.products[0].title, "Widget");
        assert_eq!(page.products[0].price, 19.99);
        assert_eq!(
            page.products[0].image_url.as_deref(),
            Some("https://img.example.com/w.jpg")
        );

        // Reprocessing the same title updates in place rather than
        // inserting a second row; an empty image clears the stored one.
        let again = processor
            .process_item(RawItem {
                title: "Widget".to_string(),
                price: "$24.99".to_string(),
                image_url: String::new(),
                product_id: None,
            })
            .await;
        assert_eq!(again.product_id, Some(id));

        assert_eq!(catalog.count_products().await.unwrap(), 1);
        let page = catalog.list_products(&ProductFilter::default()).await.unwrap();
        assert_eq!(page.products[0].price, 24.99);
        assert_eq!(page.products[0].image_url, None);
    }
}
