use futures::future::join_all;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use rasman_shared::constants::{DIRECTORY_TIMEOUT, UNCATEGORIZED_ID};
use rasman_shared::{Category, Keyword};

use crate::client::{collapse, ApiClient};
use crate::decode;

impl ApiClient {
    pub async fn fetch_categories(&self) -> Option<Vec<Category>> {
        const ENDPOINT: &str = "GET /directory/category";
        let value = self
            .read(ENDPOINT, &["directory", "category"], DIRECTORY_TIMEOUT)
            .await?;
        Some(decode::list(ENDPOINT, value))
    }

    pub async fn create_category(&self, name: &str) -> bool {
        let body = json!({ "name": name });
        self.write(
            "POST /directory/category",
            Method::POST,
            &["directory", "category"],
            Some(&body),
            DIRECTORY_TIMEOUT,
        )
        .await
    }

    /// The reserved "Uncategorized" category can never be deleted; asking
    /// to is refused without a request.
    pub async fn delete_category(&self, category_id: i64) -> bool {
        if category_id == UNCATEGORIZED_ID {
            warn!("Refusing to delete the Uncategorized category");
            return false;
        }
        let id = category_id.to_string();
        self.write::<()>(
            "DELETE /directory/category/{id}",
            Method::DELETE,
            &["directory", "category", &id],
            None,
            DIRECTORY_TIMEOUT,
        )
        .await
    }

    /// Keywords of one category.  The per-category listing does not say
    /// which category its keywords belong to, so every result is stamped
    /// with `category_id`.
    pub async fn fetch_keywords(&self, category_id: i64) -> Option<Vec<Keyword>> {
        let value = self
            .read(
                "GET /directory/category/{id}/keyword",
                &keyword_path(&category_id.to_string()),
                DIRECTORY_TIMEOUT,
            )
            .await?;
        Some(tag_keywords(value, category_id))
    }

    /// Every keyword on the server.
    ///
    /// Tries the aggregate listing first.  When that yields nothing, walks
    /// the categories concurrently; a category that fails to load is
    /// skipped.  `None` only when neither the aggregate listing nor the
    /// category list could be fetched.
    pub async fn fetch_all_keywords(&self) -> Option<Vec<Keyword>> {
        const ENDPOINT: &str = "GET /directory/category/0/keyword";
        let probe = self
            .get_json(&keyword_path("0"), DIRECTORY_TIMEOUT)
            .await;

        match probe {
            Ok(value) => {
                let keywords: Vec<Keyword> = decode::list(ENDPOINT, value);
                if !keywords.is_empty() {
                    return Some(keywords);
                }
                debug!("Aggregate keyword listing empty, walking categories");
            }
            Err(e) => warn!(
                endpoint = ENDPOINT,
                error = %e,
                "Aggregate keyword listing unavailable, walking categories"
            ),
        }

        let categories = self.fetch_categories().await?;
        let listings = join_all(categories.iter().map(|category| async move {
            let id = category.id.to_string();
            let result = self.get_json(&keyword_path(&id), DIRECTORY_TIMEOUT).await;
            let endpoint = format!("GET /directory/category/{id}/keyword");
            (category.id, collapse(&endpoint, result))
        }))
        .await;

        Some(
            listings
                .into_iter()
                .filter_map(|(category_id, value)| {
                    value.map(|value| tag_keywords(value, category_id))
                })
                .flatten()
                .collect(),
        )
    }

    pub async fn create_keyword(&self, name: &str, category_id: i64) -> bool {
        let body = json!({ "name": name, "category_id": category_id });
        self.write(
            "POST /directory/keyword",
            Method::POST,
            &["directory", "keyword"],
            Some(&body),
            DIRECTORY_TIMEOUT,
        )
        .await
    }

    pub async fn delete_keyword(&self, keyword_id: i64) -> bool {
        let id = keyword_id.to_string();
        self.write::<()>(
            "DELETE /directory/keyword/{id}",
            Method::DELETE,
            &["directory", "keyword", &id],
            None,
            DIRECTORY_TIMEOUT,
        )
        .await
    }
}

fn keyword_path(category_id: &str) -> [&str; 4] {
    ["directory", "category", category_id, "keyword"]
}

fn tag_keywords(value: Value, category_id: i64) -> Vec<Keyword> {
    decode::list::<Keyword>("GET /directory/category/{id}/keyword", value)
        .into_iter()
        .map(|keyword| Keyword {
            category_id,
            ..keyword
        })
        .collect()
}
