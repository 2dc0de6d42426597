//! Single-key page retrieval.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use reqwest::Client;
use tracing::debug;
use url::Url;

use versefetch_shared::{Key, Result, VerseFetchError};

/// Why one attempt for one key failed. Every variant is retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("no matching content in page")]
    NoMatch,
}

/// Retrieves the raw page body for one key.
///
/// Implementations must be cheap to share across tasks; the pool holds a
/// single instance behind an `Arc`.
pub trait Fetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        key: Key,
        timeout: Duration,
    ) -> impl Future<Output = std::result::Result<String, FetchError>> + Send;
}

// ---------------------------------------------------------------------------
// URL template
// ---------------------------------------------------------------------------

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(partition|item)(?::0(\d{1,2}))?\}").expect("valid regex")
});

/// Substitute `{partition}` / `{item}` placeholders (optionally zero-padded).
pub(crate) fn render_key(template: &str, key: Key) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures<'_>| {
            let value = if &caps[1] == "partition" {
                key.partition
            } else {
                key.item
            };
            let width = caps
                .get(2)
                .and_then(|w| w.as_str().parse::<usize>().ok())
                .unwrap_or(0);
            format!("{value:0width$}")
        })
        .into_owned()
}

/// A URL with `{partition}` / `{item}` placeholders.
///
/// A zero-padded width may be given as `{partition:03}`.
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    template: String,
}

impl UrlTemplate {
    /// Parse and validate a template by rendering a sample key.
    pub fn parse(template: &str) -> Result<Self> {
        let parsed = Self {
            template: template.to_string(),
        };
        let sample = parsed.render(Key::new(1, 1));

        if sample.contains('{') || sample.contains('}') {
            return Err(VerseFetchError::config(format!(
                "url template `{template}` has an unknown placeholder \
                 (expected {{partition}} or {{item}}, optionally zero-padded like {{item:03}})"
            )));
        }

        let url = Url::parse(&sample).map_err(|e| {
            VerseFetchError::config(format!("url template `{template}` is not a valid URL: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VerseFetchError::config(format!(
                "url template `{template}` must use http or https"
            )));
        }

        Ok(parsed)
    }

    pub fn render(&self, key: Key) -> String {
        render_key(&self.template, key)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// [`Fetcher`] that issues one `GET` per key against a URL template.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    template: UrlTemplate,
}

impl HttpFetcher {
    pub fn new(template: &str, user_agent: &str) -> Result<Self> {
        let template = UrlTemplate::parse(template)?;
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| VerseFetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, template })
    }

    pub fn url_for(&self, key: Key) -> String {
        self.template.render(key)
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, key: Key, timeout: Duration) -> std::result::Result<String, FetchError> {
        let url = self.url_for(key);
        debug!(%key, %url, "GET");

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        };

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.text().await.map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn template_renders_plain_and_padded() {
        let t = UrlTemplate::parse("https://example.com/{partition}/{item}/{item}").expect("parse");
        assert_eq!(t.render(Key::new(2, 255)), "https://example.com/2/255/255");

        let padded =
            UrlTemplate::parse("https://cdn.example.com/{partition:03}{item:03}.mp3").expect("parse");
        assert_eq!(padded.render(Key::new(2, 7)), "https://cdn.example.com/002007.mp3");
    }

    #[test]
    fn template_rejects_unknown_placeholder_and_bad_scheme() {
        let err = UrlTemplate::parse("https://example.com/{surah}/{item}").unwrap_err();
        assert!(matches!(err, VerseFetchError::Config { .. }));

        assert!(UrlTemplate::parse("not a url/{partition}").is_err());
        assert!(UrlTemplate::parse("ftp://example.com/{partition}").is_err());
    }

    #[tokio::test]
    async fn fetch_returns_body_and_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/3/4"))
            .and(header("user-agent", "versefetch-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(
            &format!("{}/{{partition}}/{{item}}", server.uri()),
            "versefetch-test",
        )
        .expect("fetcher");
        let body = fetcher
            .fetch(Key::new(3, 4), Duration::from_secs(5))
            .await
            .expect("fetch");
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher =
            HttpFetcher::new(&format!("{}/{{partition}}/{{item}}", server.uri()), "t").expect("fetcher");
        let err = fetcher
            .fetch(Key::new(1, 1), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Status(503));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let fetcher =
            HttpFetcher::new(&format!("{}/{{partition}}/{{item}}", server.uri()), "t").expect("fetcher");
        let err = fetcher
            .fetch(Key::new(1, 1), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Timeout(Duration::from_millis(50)));
    }
}
