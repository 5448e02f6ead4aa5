//! SQLite-backed product catalog.
//!
//! `title` is the natural key: the scraper upserts on it, so at most one
//! row exists per distinct title. Records are never deleted here.

use crate::error::ScrapeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRecord {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Title,
    Price,
    CreatedAt,
}

impl SortBy {
    fn column(self) -> &'static str {
        match self {
            SortBy::Title => "title",
            SortBy::Price => "price",
            SortBy::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    fn keyword(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Query parameters accepted by the products listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default)]
    pub sort_by: Option<SortBy>,
    #[serde(default)]
    pub sort_dir: Option<SortDir>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub count: i64,
    pub per_page: u32,
    pub current_page: u32,
    pub total_pages: u32,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductRecord>,
    pub meta: PageMeta,
}

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL UNIQUE,
    price REAL NOT NULL,
    image_url TEXT,
    created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    /// Opens the database at `url` (creating the file if missing) and
    /// ensures the products table exists.
    pub async fn connect(url: &str) -> Result<Self, ScrapeError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::query(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// Insert-or-update keyed on `title`, in one transaction so concurrent
    /// extraction of the same product cannot create two rows. Returns the
    /// stored record and whether it was created.
    pub async fn upsert_product(
        &self,
        title: &str,
        price: f64,
        image_url: Option<&str>,
    ) -> Result<(ProductRecord, bool), ScrapeError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE title = ?")
            .bind(title)
            .fetch_optional(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO products (title, price, image_url) VALUES (?, ?, ?) \
             ON CONFLICT(title) DO UPDATE SET price = excluded.price, \
             image_url = excluded.image_url, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(title)
        .bind(price)
        .bind(image_url)
        .execute(&mut *tx)
        .await?;

        let record = sqlx::query_as::<_, ProductRecord>(
            "SELECT id, title, price, image_url, created_at, updated_at \
             FROM products WHERE title = ?",
        )
        .bind(title)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((record, existing.is_none()))
    }

    /// Filtered, sorted, paginated listing backing the products API.
    pub async fn list_products(&self, filter: &ProductFilter) -> Result<ProductPage, ScrapeError> {
        let per_page = filter.per_page.unwrap_or(15).clamp(1, 100);
        let page = filter.page.unwrap_or(1).max(1);
        let sort_by = filter.sort_by.unwrap_or(SortBy::CreatedAt);
        let sort_dir = filter.sort_dir.unwrap_or(SortDir::Desc);

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM products");
        push_filters(&mut count_query, filter);
        let total: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::new(
            "SELECT id, title, price, image_url, created_at, updated_at FROM products",
        );
        push_filters(&mut query, filter);
        query.push(format!(" ORDER BY {} {}", sort_by.column(), sort_dir.keyword()));
        query.push(" LIMIT ");
        query.push_bind(i64::from(per_page));
        query.push(" OFFSET ");
        query.push_bind(i64::from((page - 1) * per_page));

        let products: Vec<ProductRecord> =
            query.build_query_as().fetch_all(&self.pool).await?;

        let total_pages = ((total + i64::from(per_page) - 1) / i64::from(per_page)).max(1) as u32;

        Ok(ProductPage {
            meta: PageMeta {
                total,
                count: products.len() as i64,
                per_page,
                current_page: page,
                total_pages,
            },
            products,
        })
    }

    pub async fn count_products(&self) -> Result<i64, ScrapeError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ProductFilter) {
    let mut prefix = " WHERE ";

    if let Some(search) = filter.search.as_deref().filter(|s| !s.is_empty()) {
        query.push(prefix).push("title LIKE ").push_bind(format!("%{}%", search));
        prefix = " AND ";
    }
    if let Some(min_price) = filter.min_price {
        query.push(prefix).push("price >= ").push_bind(min_price);
        prefix = " AND ";
    }
    if let Some(max_price) = filter.max_price {
        query.push(prefix).push("price <= ").push_bind(max_price);
    }
}
