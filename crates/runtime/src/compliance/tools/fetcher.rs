//! Browser-mimicking HTTP client: retries, rotating User-Agent, bounded
//! redirects and timeouts. Every fetch is preceded by a URL Guard check.

use crate::compliance::errors::FetchError;
use crate::compliance::tools::url_guard;
use rand::seq::SliceRandom;
use std::time::Duration;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const PDF_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_REDIRECTS: usize = 10;

fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Options for a single fetch call.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: 3,
            retry_delay: Duration::from_secs(5),
        }
    }
}

impl FetchOptions {
    pub fn for_pdf() -> Self {
        Self {
            timeout: PDF_TIMEOUT,
            ..Default::default()
        }
    }
}

/// Result of a successful fetch.
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub status: u16,
    pub content_type: Option<String>,
}

/// Browser-mimicking HTTP client. One instance is shared across the
/// process; `reqwest::Client` is cheap to clone internally.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .expect("reqwest client builds with static config");
        Self { client }
    }

    /// Fetch raw bytes, retrying transient failures up to `max_retries`
    /// times with a fixed delay between attempts.
    pub async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<FetchedBody, FetchError> {
        url_guard::validate(url).map_err(|reason| FetchError::UrlGuardRejected(reason.to_string()))?;

        let mut last_err = None;
        for attempt in 0..=opts.max_retries {
            match self.try_once(url, opts.timeout).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    last_err = Some(e);
                    if attempt < opts.max_retries {
                        tokio::time::sleep(opts.retry_delay).await;
                    }
                }
            }
        }
        Err(last_err.expect("loop runs at least once"))
    }

    /// Fetch and decode as UTF-8 text (lossy on invalid sequences).
    pub async fn fetch_text(&self, url: &str, opts: &FetchOptions) -> Result<String, FetchError> {
        let body = self.fetch(url, opts).await?;
        Ok(String::from_utf8_lossy(&body.bytes).into_owned())
    }

    async fn try_once(&self, url: &str, timeout: Duration) -> Result<FetchedBody, FetchError> {
        let request = self
            .client
            .get(url)
            .timeout(timeout)
            .header("User-Agent", random_user_agent())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/pdf,*/*;q=0.8",
            )
            .header("Accept-Language", "zh-TW,zh;q=0.9,en;q=0.8")
            .header("Accept-Encoding", "gzip, deflate, br");

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status.as_u16()));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(classify_reqwest_error)?
            .to_vec();

        Ok(FetchedBody {
            bytes,
            status: status.as_u16(),
            content_type,
        })
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(DEFAULT_TIMEOUT)
    } else if e.is_redirect() {
        FetchError::TooManyRedirects
    } else {
        FetchError::ConnectionFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_30s() {
        assert_eq!(FetchOptions::default().timeout, Duration::from_secs(30));
    }

    #[test]
    fn pdf_timeout_is_60s() {
        assert_eq!(FetchOptions::for_pdf().timeout, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn fetch_rejects_private_url_before_any_request() {
        let fetcher = Fetcher::new();
        let err = fetcher
            .fetch("http://192.168.1.1/law.pdf", &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UrlGuardRejected(_)));
    }

    #[test]
    fn random_user_agent_picks_from_pool() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }
}
