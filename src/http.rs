// Blocking HTTP plumbing shared by the embedding and generation clients.
// Callers run these on tokio's blocking pool.

use std::io::BufReader;
use std::time::Duration;

use tracing::{debug, error, warn};
use url::Url;

use crate::config::HttpConfig;
use crate::{FolioError, Result};

const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

pub type StreamReader = BufReader<ureq::BodyReader<'static>>;

#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    streaming_agent: ureq::Agent,
    retry_attempts: u32,
    backoff_unit: Duration,
}

impl HttpClient {
    #[inline]
    pub fn new(config: &HttpConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();

        // Streams may run for longer than the request timeout, so the body has its own ceiling
        let streaming_agent = ureq::Agent::config_builder()
            .timeout_connect(Some(timeout))
            .timeout_recv_response(Some(timeout))
            .timeout_recv_body(Some(Duration::from_secs(config.stream_timeout_secs)))
            .build()
            .into();

        Self {
            agent,
            streaming_agent,
            retry_attempts: config.retry_attempts.max(1),
            backoff_unit: Duration::from_secs(1),
        }
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Scale the pause between retries; tests shrink it to keep runs fast
    #[inline]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    #[inline]
    pub fn get_text(&self, url: &Url, bearer: Option<&str>) -> Result<String> {
        debug!("GET {}", url);

        self.with_retry(url, || {
            let mut request = self.agent.get(url.as_str());
            if let Some(token) = bearer {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    #[inline]
    pub fn post_json(&self, url: &Url, bearer: Option<&str>, body: &str) -> Result<String> {
        debug!("POST {} ({} bytes)", url, body.len());

        self.with_retry(url, || {
            let mut request = self
                .agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            if let Some(token) = bearer {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// Send a JSON request and hand back the body as a line reader once headers arrive
    #[inline]
    pub fn post_json_streaming(
        &self,
        url: &Url,
        bearer: Option<&str>,
        body: &str,
    ) -> Result<StreamReader> {
        debug!("POST (streaming) {} ({} bytes)", url, body.len());

        self.with_retry(url, || {
            let mut request = self
                .streaming_agent
                .post(url.as_str())
                .header("Content-Type", "application/json");
            if let Some(token) = bearer {
                request = request.header("Authorization", format!("Bearer {}", token));
            }
            request
                .send(body)
                .map(|resp| BufReader::new(resp.into_body().into_reader()))
        })
    }

    fn with_retry<T, F>(&self, url: &Url, mut request_fn: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!("HTTP request attempt {}/{}", attempt, self.retry_attempts);

            match request_fn() {
                Ok(value) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(value);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 || *status == 429 {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry_attempts
                                );
                                true
                            } else {
                                warn!("Client error (status {}), not retrying", status);
                                return Err(FolioError::Provider(format!(
                                    "{} returned HTTP {}",
                                    url, status
                                )));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        warn!("Non-retryable error: {}", error);
                        return Err(FolioError::Provider(format!(
                            "Request to {} failed: {}",
                            url, error
                        )));
                    }

                    last_error = Some(FolioError::Provider(format!(
                        "Request to {} failed: {}",
                        url, error
                    )));

                    if attempt < self.retry_attempts {
                        let delay = self.backoff_unit * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1) as u32;
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", url);

        Err(last_error.unwrap_or_else(|| {
            FolioError::Provider(format!("Request to {} failed after retries", url))
        }))
    }
}
