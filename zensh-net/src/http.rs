// zensh-net/src/http.rs
use std::time::Duration;

use reqwest::blocking::{Client, ClientBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use tracing::{debug, error};
use zensh_common::error::{Result, ZenshError};

const DOWNLOAD_TIMEOUT_SECS: u64 = 300;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "zensh plugin manager (Rust; +https://github.com/philopon/zensh)";
pub const GITHUB_JSON: &str = "application/vnd.github+json";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Blocking client with the zensh user agent and, when given, a bearer token.
pub fn build_http_client(token: Option<&str>) -> Result<Client> {
    http_client_builder(token)?
        .build()
        .map_err(|e| ZenshError::Generic(format!("Failed to build HTTP client: {e}")))
}

pub fn http_client_builder(token: Option<&str>) -> Result<ClientBuilder> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_JSON));
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ZenshError::Config(format!("Invalid GitHub token: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10)))
}

/// Sends a GET with the given `Accept`; non-2xx answers become `HttpStatus`.
pub fn get_checked(client: &Client, url: &str, accept: &str) -> Result<Response> {
    debug!("GET {} (accept {})", url, accept);
    let response = client
        .get(url)
        .header(ACCEPT, accept)
        .send()
        .map_err(|e| {
            debug!("HTTP request failed for {url}: {e}");
            ZenshError::from(e)
        })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if status.is_success() {
        return Ok(response);
    }
    error!("HTTP error {} for URL {}", status, url);
    Err(ZenshError::HttpStatus {
        status: status.as_u16(),
        url: url.to_string(),
    })
}
