use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::client::WikiApi;
use crate::error::Result;
use crate::result::{CategoryMember, PageRef, WikiPage};

/// Wraps a `WikiApi` and retries rate-limit and transient transport failures
/// with exponential backoff. Resolution errors are returned immediately.
pub struct Retrying<A> {
    inner: A,
    max_retries: usize,
    retry_delay: Duration,
}

impl<A: WikiApi> Retrying<A> {
    pub fn new(inner: A, max_retries: usize, retry_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            retry_delay,
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(e) if attempt < self.max_retries && e.is_retryable() => {
                    let delay = self.backoff(attempt);
                    warn!(
                        "{} failed ({}), retry {}/{} in {:?}",
                        what,
                        e,
                        attempt + 1,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let base = self
            .retry_delay
            .saturating_mul(2u32.saturating_pow(exponent));
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::from(d.subsec_millis() % 100))
            .unwrap_or(0);
        base.saturating_add(Duration::from_millis(jitter))
    }
}

#[async_trait]
impl<A: WikiApi> WikiApi for Retrying<A> {
    async fn list_subcategories(&self, category: &PageRef) -> Result<Vec<CategoryMember>> {
        self.run("list subcategories", move || self.inner.list_subcategories(category))
            .await
    }

    async fn list_member_pages(&self, category: &PageRef) -> Result<Vec<CategoryMember>> {
        self.run("list member pages", move || self.inner.list_member_pages(category))
            .await
    }

    async fn resolve_url_by_id(&self, page_id: u64) -> Result<String> {
        self.run("resolve url", move || self.inner.resolve_url_by_id(page_id))
            .await
    }

    async fn resolve_urls_by_ids(&self, page_ids: &[u64]) -> Result<HashMap<u64, String>> {
        self.run("resolve urls", move || self.inner.resolve_urls_by_ids(page_ids))
            .await
    }

    async fn resolve_category_id_by_name(&self, title: &str) -> Result<u64> {
        self.run("resolve category id", move || {
            self.inner.resolve_category_id_by_name(title)
        })
        .await
    }

    async fn fetch_rendered_content(&self, page_id: u64, window_chars: usize) -> Result<String> {
        self.run("fetch rendered content", move || {
            self.inner.fetch_rendered_content(page_id, window_chars)
        })
        .await
    }

    async fn fetch_page(&self, page: &PageRef) -> Result<WikiPage> {
        self.run("fetch page", move || self.inner.fetch_page(page)).await
    }

    async fn lookup_page(&self, page: &PageRef) -> Result<WikiPage> {
        self.run("look up page", move || self.inner.lookup_page(page)).await
    }

    async fn resolve_url_by_title(&self, title: &str) -> Result<String> {
        self.run("resolve url by title", move || {
            self.inner.resolve_url_by_title(title)
        })
        .await
    }

    fn request_count(&self) -> usize {
        self.inner.request_count()
    }
}
