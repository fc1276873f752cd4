use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::config::WikiConfig;
use crate::error::{Result, ScanError};
use crate::graph::{category_title, strip_category_prefix};
use crate::result::{CategoryMember, PageRef, WikiPage};

/// Max ids per `pageids=` request accepted by MediaWiki for anonymous clients.
const PAGE_ID_BATCH: usize = 50;

/// Read operations the crawler and analyzer need from a wiki.
#[async_trait]
pub trait WikiApi: Send + Sync {
    /// Immediate subcategories of a category, following continuation.
    async fn list_subcategories(&self, category: &PageRef) -> Result<Vec<CategoryMember>>;

    /// Non-category members of a category, following continuation.
    async fn list_member_pages(&self, category: &PageRef) -> Result<Vec<CategoryMember>>;

    async fn resolve_url_by_id(&self, page_id: u64) -> Result<String>;

    /// Ids that do not exist are left out of the returned map.
    async fn resolve_urls_by_ids(&self, page_ids: &[u64]) -> Result<HashMap<u64, String>> {
        let mut urls = HashMap::with_capacity(page_ids.len());
        for &page_id in page_ids {
            match self.resolve_url_by_id(page_id).await {
                Ok(url) => {
                    urls.insert(page_id, url);
                }
                Err(ScanError::PageNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(urls)
    }

    /// Id of the first page the title query returns.
    async fn resolve_category_id_by_name(&self, title: &str) -> Result<u64>;

    /// First `window_chars` characters of the rendered HTML of a page.
    async fn fetch_rendered_content(&self, page_id: u64, window_chars: usize) -> Result<String>;

    async fn fetch_page(&self, page: &PageRef) -> Result<WikiPage>;

    /// `fetch_page` without the text extracts: `content` and `summary` are
    /// left empty. Used where only categories and links matter.
    async fn lookup_page(&self, page: &PageRef) -> Result<WikiPage> {
        self.fetch_page(page).await
    }

    /// Canonical URL of a title as the API reports it.
    async fn resolve_url_by_title(&self, title: &str) -> Result<String> {
        let page_id = self.resolve_category_id_by_name(title).await?;
        self.resolve_url_by_id(page_id).await
    }

    fn request_count(&self) -> usize {
        0
    }
}

/// `WikiApi` over a MediaWiki `api.php` endpoint.
pub struct WikiClient {
    client: Client,
    config: WikiConfig,
    request_count: AtomicUsize,
}

impl WikiClient {
    pub fn new(config: WikiConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .connect_timeout(Duration::from_millis(config.timeout_ms / 2))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            config,
            request_count: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &WikiConfig {
        &self.config
    }

    async fn request_json_get(&self, params: &[(&str, String)]) -> Result<Value> {
        let mut pairs = Vec::with_capacity(params.len() + 2);
        pairs.push(("format".to_string(), "json".to_string()));
        pairs.push(("formatversion".to_string(), "2".to_string()));
        for (key, value) in params {
            if !value.is_empty() {
                pairs.push(((*key).to_string(), value.clone()));
            }
        }

        self.request_count.fetch_add(1, Ordering::Relaxed);
        debug!("GET {} {:?}", self.config.api_url, pairs);

        let response = self
            .client
            .get(&self.config.api_url)
            .query(&pairs)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::HttpStatus {
                status: status.as_u16(),
                url: self.config.api_url.clone(),
            });
        }

        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body)
            .map_err(|e| ScanError::ParseError(format!("MediaWiki response is not JSON: {}", e)))?;

        if let Some(error) = payload.get("error") {
            let code = error
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error");
            let info = error
                .get("info")
                .and_then(Value::as_str)
                .unwrap_or("unknown info");
            return Err(ScanError::ApiError {
                code: code.to_string(),
                info: info.to_string(),
            });
        }

        Ok(payload)
    }

    /// Runs a query until the API stops returning a `continue` block.
    async fn query_all(&self, params: Vec<(&str, String)>) -> Result<Vec<QueryPayload>> {
        let mut batches = Vec::new();
        let mut continuation: BTreeMap<String, Value> = BTreeMap::new();

        loop {
            let mut request: Vec<(&str, String)> = params.clone();
            for (key, value) in &continuation {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                request.push((key.as_str(), value));
            }

            let response = self.request_json_get(&request).await?;
            let parsed: QueryResponse = decode(response, "query")?;
            batches.push(parsed.query);

            match parsed.continuation {
                Some(next) if !next.is_empty() => continuation = next,
                _ => break,
            }
        }

        Ok(batches)
    }

    async fn list_members(&self, category: &PageRef, cmtype: &str) -> Result<Vec<CategoryMember>> {
        let mut params = vec![
            ("action", "query".to_string()),
            ("list", "categorymembers".to_string()),
            ("cmtype", cmtype.to_string()),
            ("cmprop", "ids|title".to_string()),
            ("cmlimit", self.config.member_page_size.to_string()),
        ];
        match category {
            PageRef::Title(title) => params.push(("cmtitle", category_title(title))),
            PageRef::Id(id) => params.push(("cmpageid", id.to_string())),
        }

        let members = self
            .query_all(params)
            .await?
            .into_iter()
            .flat_map(|batch| batch.categorymembers)
            .map(|item| CategoryMember::new(item.title, item.pageid))
            .collect::<Vec<_>>();

        debug!("{} {} members in {}", members.len(), cmtype, category);
        Ok(members)
    }

    /// Looks up a single page, mapping missing and disambiguation pages to errors.
    async fn page_info(&self, page: &PageRef) -> Result<PageQueryItem> {
        let mut params = vec![
            ("action", "query".to_string()),
            ("prop", "info|pageprops".to_string()),
            ("inprop", "url".to_string()),
            ("ppprop", "disambiguation".to_string()),
            ("redirects", "1".to_string()),
        ];
        push_page_ref(&mut params, page);

        let response = self.request_json_get(&params).await?;
        let parsed: QueryResponse = decode(response, "page info")?;
        let item = parsed
            .query
            .pages
            .into_iter()
            .next()
            .ok_or_else(|| ScanError::PageNotFound(page.to_string()))?;

        if item.missing || item.invalid || item.pageid.is_none() {
            return Err(ScanError::PageNotFound(page.to_string()));
        }
        if item
            .pageprops
            .as_ref()
            .is_some_and(|props| props.contains_key("disambiguation"))
        {
            return Err(ScanError::DisambiguationAmbiguous(item.title));
        }
        Ok(item)
    }

    async fn page_extract(&self, page_id: u64, intro_only: bool) -> Result<String> {
        let mut params = vec![
            ("action", "query".to_string()),
            ("prop", "extracts".to_string()),
            ("explaintext", "1".to_string()),
            ("pageids", page_id.to_string()),
        ];
        if intro_only {
            params.push(("exintro", "1".to_string()));
        }
        let response = self.request_json_get(&params).await?;
        let parsed: QueryResponse = decode(response, "extract")?;
        Ok(parsed
            .query
            .pages
            .into_iter()
            .next()
            .and_then(|item| item.extract)
            .unwrap_or_default())
    }

    async fn page_categories(&self, page_id: u64) -> Result<Vec<String>> {
        let params = vec![
            ("action", "query".to_string()),
            ("prop", "categories".to_string()),
            ("clshow", "!hidden".to_string()),
            ("cllimit", "max".to_string()),
            ("pageids", page_id.to_string()),
        ];
        Ok(self
            .query_all(params)
            .await?
            .into_iter()
            .flat_map(|batch| batch.pages)
            .flat_map(|item| item.categories)
            .map(|item| strip_category_prefix(&item.title).to_string())
            .collect())
    }

    async fn page_links(&self, page_id: u64) -> Result<Vec<String>> {
        let params = vec![
            ("action", "query".to_string()),
            ("prop", "links".to_string()),
            ("plnamespace", "0".to_string()),
            ("pllimit", "max".to_string()),
            ("pageids", page_id.to_string()),
        ];
        Ok(self
            .query_all(params)
            .await?
            .into_iter()
            .flat_map(|batch| batch.pages)
            .flat_map(|item| item.links)
            .map(|item| item.title)
            .collect())
    }
}

#[async_trait]
impl WikiApi for WikiClient {
    async fn list_subcategories(&self, category: &PageRef) -> Result<Vec<CategoryMember>> {
        self.list_members(category, "subcat").await
    }

    async fn list_member_pages(&self, category: &PageRef) -> Result<Vec<CategoryMember>> {
        self.list_members(category, "page").await
    }

    async fn resolve_url_by_id(&self, page_id: u64) -> Result<String> {
        self.resolve_urls_by_ids(&[page_id])
            .await?
            .remove(&page_id)
            .ok_or_else(|| ScanError::PageNotFound(format!("page id {}", page_id)))
    }

    async fn resolve_urls_by_ids(&self, page_ids: &[u64]) -> Result<HashMap<u64, String>> {
        let mut urls = HashMap::with_capacity(page_ids.len());
        for chunk in page_ids.chunks(PAGE_ID_BATCH) {
            let ids = chunk
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join("|");
            let params = vec![
                ("action", "query".to_string()),
                ("prop", "info".to_string()),
                ("inprop", "url".to_string()),
                ("pageids", ids),
            ];
            let response = self.request_json_get(&params).await?;
            let parsed: QueryResponse = decode(response, "page urls")?;
            for item in parsed.query.pages {
                if let (Some(id), Some(url)) = (item.pageid, item.fullurl) {
                    urls.insert(id, url);
                }
            }
        }
        Ok(urls)
    }

    async fn resolve_category_id_by_name(&self, title: &str) -> Result<u64> {
        let params = vec![
            ("action", "query".to_string()),
            ("titles", category_title(title)),
        ];
        let response = self.request_json_get(&params).await?;
        let parsed: QueryResponse = decode(response, "title lookup")?;
        parsed
            .query
            .pages
            .into_iter()
            .next()
            .filter(|item| !item.missing && !item.invalid)
            .and_then(|item| item.pageid)
            .ok_or_else(|| ScanError::PageNotFound(title.to_string()))
    }

    async fn fetch_rendered_content(&self, page_id: u64, window_chars: usize) -> Result<String> {
        let params = vec![
            ("action", "parse".to_string()),
            ("prop", "text".to_string()),
            ("pageid", page_id.to_string()),
        ];
        let response = self.request_json_get(&params).await?;
        let parsed: ParseResponse = decode(response, "parse")?;
        Ok(parsed.parse.text.chars().take(window_chars).collect())
    }

    async fn fetch_page(&self, page: &PageRef) -> Result<WikiPage> {
        let mut found = self.lookup_page(page).await?;
        if let Some(page_id) = found.page_id {
            found.content = self.page_extract(page_id, false).await?;
            found.summary = self.page_extract(page_id, true).await?;
        }
        Ok(found)
    }

    async fn lookup_page(&self, page: &PageRef) -> Result<WikiPage> {
        let info = self.page_info(page).await?;
        let page_id = info
            .pageid
            .ok_or_else(|| ScanError::PageNotFound(page.to_string()))?;

        let categories = self.page_categories(page_id).await?;
        let links = self.page_links(page_id).await?;

        Ok(WikiPage {
            url: info
                .fullurl
                .unwrap_or_else(|| self.config.article_url(&info.title)),
            title: info.title,
            page_id: Some(page_id),
            content: String::new(),
            summary: String::new(),
            categories,
            links,
        })
    }

    async fn resolve_url_by_title(&self, title: &str) -> Result<String> {
        let params = vec![
            ("action", "query".to_string()),
            ("prop", "info".to_string()),
            ("inprop", "url".to_string()),
            ("titles", title.to_string()),
        ];
        let response = self.request_json_get(&params).await?;
        let parsed: QueryResponse = decode(response, "title url")?;
        parsed
            .query
            .pages
            .into_iter()
            .next()
            .filter(|item| !item.missing && !item.invalid)
            .and_then(|item| item.fullurl)
            .ok_or_else(|| ScanError::PageNotFound(title.to_string()))
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }
}

fn push_page_ref<'a>(params: &mut Vec<(&'a str, String)>, page: &PageRef) {
    match page {
        PageRef::Title(title) => params.push(("titles", title.clone())),
        PageRef::Id(id) => params.push(("pageids", id.to_string())),
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ScanError::ParseError(format!("unexpected {} response: {}", what, e)))
}

#[derive(Debug, Deserialize, Default)]
struct QueryResponse {
    #[serde(default)]
    query: QueryPayload,
    #[serde(default, rename = "continue")]
    continuation: Option<BTreeMap<String, Value>>,
}

#[derive(Debug, Deserialize, Default)]
struct QueryPayload {
    #[serde(default)]
    categorymembers: Vec<MemberQueryItem>,
    #[serde(default)]
    pages: Vec<PageQueryItem>,
}

#[derive(Debug, Deserialize)]
struct MemberQueryItem {
    pageid: u64,
    title: String,
}

#[derive(Debug, Deserialize, Default)]
struct PageQueryItem {
    pageid: Option<u64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
    fullurl: Option<String>,
    pageprops: Option<BTreeMap<String, Value>>,
    extract: Option<String>,
    #[serde(default)]
    categories: Vec<TitleQueryItem>,
    #[serde(default)]
    links: Vec<TitleQueryItem>,
}

#[derive(Debug, Deserialize)]
struct TitleQueryItem {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ParseResponse {
    parse: ParsePayload,
}

#[derive(Debug, Deserialize)]
struct ParsePayload {
    text: String,
}
