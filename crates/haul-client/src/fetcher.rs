use std::time::Duration;

use haul_core::error::AppError;
use haul_core::models::{ListingStatus, RawResponse, SearchRequest};
use haul_core::traits::Fetcher;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, ORIGIN, REFERER,
};
use reqwest::{Client, Response};
use serde::Serialize;
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// How a marketplace expects its search to be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStyle {
    /// POST a JSON search document to a product search API.
    SearchApi,
    /// GET an HTML catalog page with the search in the query string.
    ///
    /// The catalog is always requested from its first page up to the end of
    /// the requested page, so the extractor sees a contiguous set starting
    /// at offset 0.
    CatalogPage,
}

/// HTTP fetcher using reqwest.
///
/// Sends browser-like headers and relies on reqwest for transparent gzip
/// and brotli decompression.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    endpoint: Url,
    style: RequestStyle,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(endpoint: &str, style: RequestStyle) -> Result<Self, AppError> {
        Self::with_timeout(endpoint, style, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: &str,
        style: RequestStyle,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        Self::build(endpoint, style, timeout, None)
    }

    /// Present requests as coming from `site` (sets `Origin` and `Referer`).
    pub fn with_site(self, site: &str) -> Result<Self, AppError> {
        Self::build(
            self.endpoint.as_str(),
            self.style,
            self.timeout,
            Some(site),
        )
    }

    fn build(
        endpoint: &str,
        style: RequestStyle,
        timeout: Duration,
        site: Option<&str>,
    ) -> Result<Self, AppError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            AppError::ConfigError(format!("Invalid endpoint URL '{endpoint}': {e}"))
        })?;
        match endpoint.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(AppError::ConfigError(format!(
                    "URL scheme '{scheme}' is not allowed (only http/https)"
                )));
            }
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(match style {
                RequestStyle::SearchApi => "application/json, text/plain, */*",
                RequestStyle::CatalogPage => {
                    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                }
            }),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB,en;q=0.9"));
        if let Some(site) = site {
            let origin = site.trim_end_matches('/');
            let origin_value = HeaderValue::from_str(origin)
                .map_err(|e| AppError::ConfigError(format!("Invalid site '{site}': {e}")))?;
            let referer_value = HeaderValue::from_str(&format!("{origin}/"))
                .map_err(|e| AppError::ConfigError(format!("Invalid site '{site}': {e}")))?;
            headers.insert(ORIGIN, origin_value);
            headers.insert(REFERER, referer_value);
        }

        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(headers)
            .gzip(true)
            .brotli(true)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            style,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn style(&self) -> RequestStyle {
        self.style
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whole seconds for error reporting, rounded up so sub-second
    /// timeouts never read as zero.
    fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs_f64().ceil() as u64
    }

    fn map_send_error(&self, e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Timeout(self.timeout_secs())
        } else if e.is_connect() {
            AppError::NetworkError(format!("Connection failed: {e}"))
        } else {
            AppError::HttpError(e.to_string())
        }
    }

    async fn into_raw(&self, response: Response) -> Result<RawResponse, AppError> {
        let status = response.status();
        let url = response.url().to_string();
        if !status.is_success() {
            return Err(AppError::HttpStatus {
                status: status.as_u16(),
                url,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(self.timeout_secs())
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            }
        })?;

        let raw = RawResponse::new(url, body);
        Ok(match content_type {
            Some(ct) => raw.with_content_type(ct),
            None => raw,
        })
    }
}

// ---- Search API request body ----

#[derive(Debug, Serialize, PartialEq)]
struct SearchApiBody<'a> {
    q: &'a str,
    page: usize,
    limit: usize,
    sort: &'static str,
    locale: Locale,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    sold: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct Locale {
    country: String,
    language: &'static str,
    currency: &'static str,
}

/// Map a request region onto the locale block the search API expects.
fn locale_for(region: &str) -> Locale {
    let (country, language, currency) = match region {
        "uk" | "gb" => ("GB", "en", "GBP"),
        "us" => ("US", "en", "USD"),
        "fr" => ("FR", "fr", "EUR"),
        "de" => ("DE", "de", "EUR"),
        "it" => ("IT", "it", "EUR"),
        "es" => ("ES", "es", "EUR"),
        other => {
            return Locale {
                country: other.to_ascii_uppercase(),
                language: "en",
                currency: "EUR",
            };
        }
    };
    Locale {
        country: country.to_string(),
        language,
        currency,
    }
}

fn search_api_body(request: &SearchRequest) -> SearchApiBody<'_> {
    SearchApiBody {
        q: request.query(),
        page: request.page(),
        limit: request.page_size(),
        sort: "relevance",
        locale: locale_for(request.region()),
        sold: request.status() == ListingStatus::Sold,
    }
}

/// Build the catalog URL for a request: first page, sized to reach the end
/// of the requested page.
fn catalog_url(endpoint: &Url, request: &SearchRequest) -> Url {
    let mut url = endpoint.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("search_text", request.query())
            .append_pair("page", "1")
            .append_pair(
                "per_page",
                &(request.offset() + request.page_size()).to_string(),
            );
        if let Some(min) = request.min_price() {
            pairs.append_pair("price_from", &min.to_string());
        }
        if let Some(max) = request.max_price() {
            pairs.append_pair("price_to", &max.to_string());
        }
        if request.status() == ListingStatus::Sold {
            pairs.append_pair("status", "sold");
        }
    }
    url
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &SearchRequest) -> Result<RawResponse, AppError> {
        let builder = match self.style {
            RequestStyle::SearchApi => self
                .client
                .post(self.endpoint.clone())
                .json(&search_api_body(request)),
            RequestStyle::CatalogPage => self.client.get(catalog_url(&self.endpoint, request)),
        };

        tracing::debug!(url = %self.endpoint, style = ?self.style, "Fetching listings");
        let response = builder.send().await.map_err(|e| self.map_send_error(e))?;
        self.into_raw(response).await
    }
}
