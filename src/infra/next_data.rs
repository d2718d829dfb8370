use crate::app::ports::{HttpClientPort, PayloadExtractor};
use crate::constants;
use crate::error::FetchError;
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

const NEXT_DATA_SELECTOR: &str = r#"script#__NEXT_DATA__"#;

/// Pulls the `__NEXT_DATA__` JSON blob out of a Next.js page.
///
/// Requests carry a browser user agent and a `Referer` pointing at the
/// listing page; the source blocks requests without them.
pub struct NextDataExtractor {
    http: Arc<dyn HttpClientPort>,
    user_agent: String,
    referer: String,
}

impl NextDataExtractor {
    pub fn new(http: Arc<dyn HttpClientPort>, user_agent: &str, referer: &str) -> Self {
        Self {
            http,
            user_agent: user_agent.to_string(),
            referer: referer.to_string(),
        }
    }
}

#[async_trait]
impl PayloadExtractor for NextDataExtractor {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        let headers = [
            ("User-Agent", self.user_agent.as_str()),
            ("Accept", constants::ACCEPT_HTML),
            ("Referer", self.referer.as_str()),
        ];
        let response = self
            .http
            .get(url, &headers)
            .await
            .map_err(|message| FetchError::Transport {
                url: url.to_string(),
                message,
            })?;

        if !response.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        debug!("Fetched {} bytes from {}", response.body.len(), url);
        extract_next_data(url, &response.body)
    }
}

/// Locate and parse the embedded payload in an HTML document.
pub fn extract_next_data(url: &str, html: &str) -> Result<Value, FetchError> {
    let extraction = |reason: String| FetchError::Extraction {
        url: url.to_string(),
        reason,
    };

    let selector = Selector::parse(NEXT_DATA_SELECTOR)
        .map_err(|e| extraction(format!("invalid selector: {e:?}")))?;
    let document = Html::parse_document(html);
    let script = document
        .select(&selector)
        .next()
        .ok_or_else(|| extraction("__NEXT_DATA__ script tag not found".to_string()))?;

    let json_text = script.text().collect::<String>();
    serde_json::from_str(&json_text).map_err(|e| extraction(format!("invalid JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use std::sync::Mutex;

    const PAGE: &str = r#"<html><head></head><body><div id="__next"></div>
        <script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"showListData":[{"ProCode":"A1"}]}}}</script>
        </body></html>"#;

    struct StubHttp {
        status: u16,
        body: String,
        seen_headers: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl HttpClientPort for StubHttp {
        async fn get(&self, _url: &str, headers: &[(&str, &str)]) -> Result<HttpGetResult, String> {
            *self.seen_headers.lock().unwrap() = headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            Ok(HttpGetResult {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    fn extractor(status: u16, body: &str) -> (NextDataExtractor, Arc<StubHttp>) {
        let http = Arc::new(StubHttp {
            status,
            body: body.to_string(),
            seen_headers: Mutex::new(Vec::new()),
        });
        let ex = NextDataExtractor::new(http.clone(), "TestBrowser/1.0", "https://listing.example/en");
        (ex, http)
    }

    #[test]
    fn extracts_embedded_json() {
        let value = extract_next_data("u", PAGE).unwrap();
        assert_eq!(value["props"]["pageProps"]["showListData"][0]["ProCode"], "A1");
    }

    #[test]
    fn missing_marker_is_extraction_error() {
        let err = extract_next_data("u", "<html><body>Programme removed</body></html>").unwrap_err();
        assert!(matches!(err, FetchError::Extraction { .. }));
    }

    #[test]
    fn broken_json_is_extraction_error() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">{"props":</script>"#;
        assert!(matches!(extract_next_data("u", html), Err(FetchError::Extraction { .. })));
    }

    #[tokio::test]
    async fn sends_browser_headers_and_referer() {
        let (ex, http) = extractor(200, PAGE);
        ex.fetch("https://listing.example/en/programme/A1").await.unwrap();
        let headers = http.seen_headers.lock().unwrap().clone();
        assert!(headers.contains(&("User-Agent".into(), "TestBrowser/1.0".into())));
        assert!(headers.contains(&("Referer".into(), "https://listing.example/en".into())));
    }

    #[tokio::test]
    async fn non_success_status_is_fetch_error() {
        let (ex, _) = extractor(503, PAGE);
        let err = ex.fetch("https://listing.example/en").await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Status {
                url: "https://listing.example/en".into(),
                status: 503
            }
        );
    }
}
