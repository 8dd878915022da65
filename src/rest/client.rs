use crate::auth::{generate_signature, get_iso_timestamp, hash_secret};
use crate::error::{Result, ZbError};
use crate::types::{ApiResponse, FuturesAccountType, SUCCESS_CODE};
use log::{debug, trace};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as HttpClient, Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

pub const DEFAULT_API_HOST: &str = "https://fapi.zb.com";
pub const DEFAULT_RATE_LIMIT_MS: u64 = 2_000;
const DEFAULT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_LANGUAGE: &str = "cn";
const QC_PREFIX: &str = "/qc";

/// Whether an endpoint needs the signed `ZB-*` headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    Public,
    Private,
}

/// A client for the ZB futures REST API.
///
/// Public endpoints work without credentials. Private endpoints sign every
/// request with the SHA-1 digest of the secret key.
///
/// # Examples
///
/// ```no_run
/// use zb_connector_rs::rest::Client;
/// use zb_connector_rs::types::Interval;
///
/// #[tokio::main]
/// async fn main() {
///     let client = Client::public(None, None).expect("Failed to create client");
///
///     let bars = client
///         .get_kline("btc_usdt", Interval::Min15, 10)
///         .await
///         .expect("Failed to get klines");
///     println!("{} bars", bars.len());
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    http_client: HttpClient,
    base_url: Url,
    api_key: Option<String>,
    /// SHA-1 digest of the API secret; the raw secret is never kept.
    secret_key: Option<String>,
    language: String,
    rate_limit: Option<Duration>,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl Client {
    /// Creates a new REST client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Your ZB API key, required for private endpoints
    /// * `secret_key` - Your raw ZB API secret, required for private endpoints
    /// * `api_host` - Optional API host, defaults to [`DEFAULT_API_HOST`]
    /// * `timeout_sec` - Optional timeout in seconds for HTTP requests
    pub fn new(
        api_key: Option<String>,
        secret_key: Option<String>,
        api_host: Option<&str>,
        timeout_sec: Option<u64>,
    ) -> Result<Self> {
        let base_url = Url::parse(api_host.unwrap_or(DEFAULT_API_HOST))?;
        let timeout = Duration::from_secs(timeout_sec.unwrap_or(DEFAULT_TIMEOUT_SECONDS));
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url,
            api_key: api_key.filter(|key| !key.is_empty()),
            secret_key: secret_key
                .filter(|secret| !secret.is_empty())
                .map(|secret| hash_secret(&secret)),
            language: DEFAULT_LANGUAGE.to_string(),
            rate_limit: None,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    /// A client for public endpoints only.
    pub fn public(api_host: Option<&str>, timeout_sec: Option<u64>) -> Result<Self> {
        Self::new(None, None, api_host, timeout_sec)
    }

    /// Response language sent in `ZB-LAN`: `cn`, `en` or `kr`.
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Spaces consecutive requests at least `rate_limit_ms` apart.
    pub fn with_rate_limit(mut self, rate_limit_ms: u64) -> Self {
        self.rate_limit = Some(Duration::from_millis(rate_limit_ms));
        self
    }

    /// Builds the request, sends it and unwraps the `data` of the response envelope.
    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        access: Access,
        mut params: Map<String, Value>,
    ) -> Result<T> {
        params.retain(|_, value| !value.is_null());
        self.throttle().await;

        let request = self.build_request(method.clone(), path, access, &params)?;
        let url = request.url().to_string();
        debug!("{} {} {:?}", method, url, params);

        let response = self.http_client.execute(request).await?;
        Self::handle_response(response, &method, &url).await
    }

    fn build_request(
        &self,
        method: Method,
        path: &str,
        access: Access,
        params: &Map<String, Value>,
    ) -> Result<Request> {
        let path = resolve_path(path, params);

        let mut headers = HeaderMap::new();
        if access == Access::Private {
            headers = self.signed_headers(&method, &path, params)?;
        }

        let full_url = self.base_url.join(&fill_path_params(&path, params))?;
        let mut request_builder = self.http_client.request(method.clone(), full_url);

        if method == Method::GET {
            let query: Vec<(String, String)> = params
                .iter()
                .map(|(key, value)| (key.clone(), query_value(value)))
                .collect();
            request_builder = request_builder.query(&query);
        } else {
            headers.insert(
                reqwest::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json; charset=UTF-8"),
            );
            request_builder = request_builder.body(serde_json::to_string(params)?);
        }

        Ok(request_builder.headers(headers).build()?)
    }

    fn signed_headers(
        &self,
        method: &Method,
        path: &str,
        params: &Map<String, Value>,
    ) -> Result<HeaderMap> {
        let (api_key, secret_key) = match (&self.api_key, &self.secret_key) {
            (Some(api_key), Some(secret_key)) => (api_key, secret_key),
            _ => {
                return Err(ZbError::AuthenticationError(
                    "Api key and secret key must not be empty.".to_string(),
                ))
            }
        };

        let timestamp = get_iso_timestamp();
        let signature =
            generate_signature(&timestamp, method.as_str(), path, Some(params), secret_key)?;
        trace!("Signed {} {} at {}", method, path, timestamp);

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("zb-apikey"),
            HeaderValue::from_str(api_key)?,
        );
        headers.insert(
            HeaderName::from_static("zb-timestamp"),
            HeaderValue::from_str(&timestamp)?,
        );
        headers.insert(
            HeaderName::from_static("zb-lan"),
            HeaderValue::from_str(&self.language)?,
        );
        headers.insert(
            HeaderName::from_static("zb-sign"),
            HeaderValue::from_str(&signature)?,
        );
        Ok(headers)
    }

    async fn throttle(&self) {
        let rate_limit = match self.rate_limit {
            Some(rate_limit) => rate_limit,
            None => return,
        };
        let mut last_request = self.last_request.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < rate_limit {
                tokio::time::sleep(rate_limit - elapsed).await;
            }
        }
        *last_request = Some(Instant::now());
    }

    /// Maps HTTP failures and non-success envelope codes to errors, returns `data` otherwise.
    async fn handle_response<T: DeserializeOwned>(
        response: Response,
        method: &Method,
        url: &str,
    ) -> Result<T> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ZbError::NotSupported(format!(
                "method: {}, url: {} is not supported",
                method, url
            )));
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ZbError::HttpError { status, body });
        }

        let envelope: ApiResponse<Value> = serde_json::from_str(&body).map_err(|e| {
            ZbError::DecodeError(format!("Bad response from {} {}: {} ({})", method, url, e, body))
        })?;

        if envelope.code != SUCCESS_CODE {
            let desc = envelope.desc.unwrap_or_default();
            let message = format!(
                "method: {}, url: {}, error code: {}, message: {}",
                method, url, envelope.code, desc
            );
            return Err(match envelope.code {
                10014 | 10015 => ZbError::InvalidSign(message),
                10033 => ZbError::NotSupported(message),
                code => ZbError::ApiError {
                    code,
                    message: desc,
                },
            });
        }

        Ok(serde_json::from_value(envelope.data.unwrap_or(Value::Null))?)
    }
}

/// Coin-margined QC contracts live under `/qc`.
pub(crate) fn resolve_path(path: &str, params: &Map<String, Value>) -> String {
    let qc_account = params.get("futuresAccountType").and_then(Value::as_i64)
        == Some(FuturesAccountType::BaseQc.value());
    let qc_symbol = params
        .get("symbol")
        .and_then(Value::as_str)
        .map_or(false, |symbol| symbol.to_uppercase().ends_with("QC"));

    if qc_account || qc_symbol {
        format!("{}{}", QC_PREFIX, path)
    } else {
        path.to_string()
    }
}

/// Replaces `{name}` placeholders with the matching parameter values.
pub(crate) fn fill_path_params(path: &str, params: &Map<String, Value>) -> String {
    if !path.contains('{') {
        return path.to_string();
    }
    params.iter().fold(path.to_string(), |path, (key, value)| {
        path.replace(&format!("{{{}}}", key), &query_value(value))
    })
}

fn query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Paged endpoints wrap their rows in `{"list": [...]}`.
pub(crate) fn take_list(data: Value) -> Result<Vec<Value>> {
    match data {
        Value::Null => Ok(Vec::new()),
        Value::Object(mut map) => match map.remove("list") {
            Some(Value::Array(rows)) => Ok(rows),
            Some(Value::Null) => Ok(Vec::new()),
            _ => Err(ZbError::DecodeError(format!(
                "expected a 'list' array in {}",
                Value::Object(map)
            ))),
        },
        other => Err(ZbError::DecodeError(format!(
            "expected a paged object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn test_qc_prefix_by_account_type() {
        let p = params(json!({"futuresAccountType": 2}));
        assert_eq!(resolve_path("/Server/api/v2/Fund/balance", &p), "/qc/Server/api/v2/Fund/balance");
        let p = params(json!({"futuresAccountType": 1}));
        assert_eq!(resolve_path("/Server/api/v2/Fund/balance", &p), "/Server/api/v2/Fund/balance");
    }

    #[test]
    fn test_qc_prefix_by_symbol() {
        let p = params(json!({"symbol": "btc_qc"}));
        assert_eq!(resolve_path("/Server/api/v2/trade/order", &p), "/qc/Server/api/v2/trade/order");
        let p = params(json!({"symbol": "BTC_USDT"}));
        assert_eq!(resolve_path("/Server/api/v2/trade/order", &p), "/Server/api/v2/trade/order");
    }

    #[test]
    fn test_path_params_are_filled() {
        let p = params(json!({"symbol": "BTC_USDT", "id": 7}));
        assert_eq!(fill_path_params("/orders/{symbol}/{id}", &p), "/orders/BTC_USDT/7");
        assert_eq!(fill_path_params("/plain", &p), "/plain");
    }

    #[test]
    fn test_take_list() {
        assert_eq!(take_list(json!({"list": [1, 2]})).unwrap().len(), 2);
        assert!(take_list(Value::Null).unwrap().is_empty());
        assert!(take_list(json!({"rows": []})).is_err());
    }

    #[test]
    fn test_secret_is_hashed_and_empty_credentials_dropped() {
        let client = Client::new(
            Some("key".to_string()),
            Some("d67355ca-3e20-41fc-8e14-bfdf506f72fc".to_string()),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            client.secret_key.as_deref(),
            Some("a18226a675ba11d6e3f409cf775d12d12d9f4a6e")
        );

        let client = Client::new(Some(String::new()), None, None, None).unwrap();
        assert!(client.api_key.is_none());
        let err = client
            .signed_headers(&Method::GET, "/x", &Map::new())
            .unwrap_err();
        assert!(matches!(err, ZbError::AuthenticationError(_)));
    }

    #[test]
    fn test_signed_headers_present() {
        let client = Client::new(Some("key".to_string()), Some("secret".to_string()), None, None)
            .unwrap()
            .with_language("en");
        let headers = client
            .signed_headers(&Method::GET, "/Server/api/v2/Fund/balance", &Map::new())
            .unwrap();
        assert_eq!(headers["zb-apikey"], "key");
        assert_eq!(headers["zb-lan"], "en");
        assert!(headers.contains_key("zb-timestamp"));
        assert!(headers.contains_key("zb-sign"));
    }
}
