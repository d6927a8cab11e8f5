use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

use crate::chat_logger::ChatLogger;
use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::service::ChatService;
use crate::types::{ChatRequest, ChatResponse};

/// Endpoint used when neither an argument nor the environment names one.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000/api/chat";

/// Environment variable consulted for the endpoint.
pub const ENDPOINT_ENV: &str = "FOLIO_CHAT_ENDPOINT";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the portfolio chat endpoint.
#[derive(Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
    logger: Option<Arc<dyn ChatLogger>>,
}

impl ChatClient {
    /// Create a new chat client.
    ///
    /// The endpoint can be provided directly or read from the
    /// `FOLIO_CHAT_ENDPOINT` environment variable; it defaults to
    /// [`DEFAULT_ENDPOINT`].
    pub fn new(endpoint: Option<String>) -> Result<Self> {
        Self::with_options(endpoint, None)
    }

    /// Create a new client with a custom endpoint and timeout.
    pub fn with_options(endpoint: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
        };
        let endpoint = parse_endpoint(&endpoint)?;

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            endpoint,
            timeout,
            logger: None,
        })
    }

    /// Attaches a logger that sees every request and its outcome.
    pub fn with_logger(mut self, logger: Arc<dyn ChatLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The endpoint requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create and return default headers for chat requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Process endpoint error responses and convert to our Error type.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        // The endpoint reports failures as {"error": "..."}.
        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error)
            .unwrap_or(error_body);

        match status_code {
            408 | 504 => Error::timeout(message, None),
            _ => Error::api(status_code, message),
        }
    }

    async fn post(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.default_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {}", e),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(
                    format!("Timed out reading response: {}", e),
                    Some(self.timeout.as_secs_f64()),
                )
            } else {
                Error::http_client(format!("Failed to read response: {}", e), Some(Box::new(e)))
            }
        })?;
        serde_json::from_str::<ChatResponse>(&body).map_err(|e| {
            Error::serialization(
                format!("Failed to parse response: {}", e),
                Some(Box::new(e)),
            )
        })
    }
}

#[async_trait::async_trait]
impl ChatService for ChatClient {
    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse> {
        CLIENT_REQUESTS.click();
        if let Some(logger) = &self.logger {
            logger.log_request(request);
        }
        let started = Instant::now();
        let result = self.post(request).await;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());
        match &result {
            Ok(response) => {
                if let Some(logger) = &self.logger {
                    logger.log_response(response);
                }
            }
            Err(err) => {
                CLIENT_REQUEST_ERRORS.click();
                if let Some(logger) = &self.logger {
                    logger.log_failure(err);
                }
            }
        }
        result
    }
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("timeout", &self.timeout)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::validation(
            format!("endpoint must be http or https, not {scheme}"),
            Some("endpoint".to_string()),
        )),
    }
}
