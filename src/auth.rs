use crate::error::{Result, ZbError};
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Gets the current UTC timestamp in milliseconds since the Unix epoch.
pub fn get_timestamp_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Gets the current UTC time formatted the way the exchange expects it in
/// `ZB-TIMESTAMP`, e.g. `2021-07-01T12:00:00.123Z`.
pub fn get_iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Hashes a raw API secret with SHA-1 (lowercase hex).
///
/// The exchange never signs with the secret itself: every signature is keyed by
/// this digest. Both the REST client and the account stream client store only
/// the hashed form.
pub fn hash_secret(secret_key: &str) -> String {
    hex::encode(Sha1::digest(secret_key.as_bytes()))
}

fn param_value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Builds the canonical parameter string: keys sorted ascending, null and empty
/// values dropped, entries joined as `key=value` with `&`.
pub fn build_sort_param(params: Option<&Map<String, Value>>) -> String {
    let params = match params {
        Some(p) if !p.is_empty() => p,
        _ => return String::new(),
    };

    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();

    keys.into_iter()
        .filter_map(|key| {
            param_value_to_string(&params[key.as_str()]).map(|value| format!("{}={}", key, value))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Generates the request signature.
///
/// # Arguments
///
/// * `timestamp`: ISO-8601 timestamp, identical to the one sent in `ZB-TIMESTAMP`.
/// * `method`: HTTP method (`GET`/`POST`), or `GET` for the stream login.
/// * `path`: Request path, or the literal `login` for the stream login.
/// * `params`: Optional request parameters, canonicalized by [`build_sort_param`].
/// * `secret_key`: The SHA-1 hashed secret (see [`hash_secret`]).
///
/// # Returns
///
/// A Base64 encoded HMAC-SHA256 digest.
pub fn generate_signature(
    timestamp: &str,
    method: &str,
    path: &str,
    params: Option<&Map<String, Value>>,
    secret_key: &str,
) -> Result<String> {
    let content = format!(
        "{}{}{}{}",
        timestamp,
        method,
        path,
        build_sort_param(params)
    );

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).map_err(|e| {
        ZbError::AuthenticationError(format!("Failed to initialise HMAC signer: {}", e))
    })?;
    mac.update(content.as_bytes());
    let digest = mac.finalize().into_bytes();

    Ok(base64::engine::general_purpose::STANDARD.encode(digest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RAW_SECRET: &str = "d67355ca-3e20-41fc-8e14-bfdf506f72fc";
    const TIMESTAMP: &str = "2021-07-01T12:00:00.123Z";

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().expect("object literal")
    }

    #[test]
    fn test_hash_secret_is_sha1_hex() {
        assert_eq!(
            hash_secret(RAW_SECRET),
            "a18226a675ba11d6e3f409cf775d12d12d9f4a6e"
        );
    }

    #[test]
    fn test_login_signature_matches_reference() {
        let secret = hash_secret(RAW_SECRET);
        let sign = generate_signature(TIMESTAMP, "GET", "login", None, &secret).unwrap();
        assert_eq!(sign, "c+JHiufqK9DDFYSyGZ58ub/zZvzRXI38LTwoDeG1Id4=");
    }

    #[test]
    fn test_rest_signature_matches_reference() {
        let secret = hash_secret(RAW_SECRET);
        let p = params(json!({"futuresAccountType": 1, "currencyName": "usdt"}));
        let sign = generate_signature(
            TIMESTAMP,
            "GET",
            "/Server/api/v2/Fund/balance",
            Some(&p),
            &secret,
        )
        .unwrap();
        assert_eq!(sign, "2izs53u531v3VmU3Cpwtms+aD+m2zjwycdIEVyBK3Vo=");
    }

    #[test]
    fn test_signature_is_deterministic() {
        let p = params(json!({"symbol": "BTC_USDT"}));
        let first = generate_signature(TIMESTAMP, "GET", "/x", Some(&p), "k").unwrap();
        let second = generate_signature(TIMESTAMP, "GET", "/x", Some(&p), "k").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_any_input_change_changes_signature() {
        let p = params(json!({"a": "1"}));
        let base = generate_signature(TIMESTAMP, "GET", "/x", Some(&p), "k").unwrap();

        let other_ts =
            generate_signature("2021-07-01T12:00:00.124Z", "GET", "/x", Some(&p), "k").unwrap();
        let other_method = generate_signature(TIMESTAMP, "POST", "/x", Some(&p), "k").unwrap();
        let other_path = generate_signature(TIMESTAMP, "GET", "/y", Some(&p), "k").unwrap();
        let other_params = generate_signature(
            TIMESTAMP,
            "GET",
            "/x",
            Some(&params(json!({"a": "2"}))),
            "k",
        )
        .unwrap();
        let other_key = generate_signature(TIMESTAMP, "GET", "/x", Some(&p), "k2").unwrap();

        for other in [other_ts, other_method, other_path, other_params, other_key] {
            assert_ne!(base, other);
        }
    }

    #[test]
    fn test_param_order_does_not_matter() {
        let mut forward = Map::new();
        forward.insert("a".to_string(), json!("1"));
        forward.insert("b".to_string(), json!("2"));
        let mut backward = Map::new();
        backward.insert("b".to_string(), json!("2"));
        backward.insert("a".to_string(), json!("1"));

        assert_eq!(
            generate_signature(TIMESTAMP, "GET", "/x", Some(&forward), "k").unwrap(),
            generate_signature(TIMESTAMP, "GET", "/x", Some(&backward), "k").unwrap()
        );
    }

    #[test]
    fn test_null_and_empty_params_are_filtered() {
        let noisy = params(json!({"a": "1", "b": null, "c": ""}));
        let clean = params(json!({"a": "1"}));
        assert_eq!(build_sort_param(Some(&noisy)), "a=1");
        assert_eq!(
            generate_signature(TIMESTAMP, "GET", "/x", Some(&noisy), "k").unwrap(),
            generate_signature(TIMESTAMP, "GET", "/x", Some(&clean), "k").unwrap()
        );
    }

    #[test]
    fn test_empty_params_equal_no_params() {
        let empty = Map::new();
        assert_eq!(build_sort_param(Some(&empty)), "");
        assert_eq!(build_sort_param(None), "");
    }

    #[test]
    fn test_numbers_are_rendered_plainly() {
        let p = params(json!({"size": 5, "price": 31000.5, "symbol": "BTC_USDT"}));
        assert_eq!(
            build_sort_param(Some(&p)),
            "price=31000.5&size=5&symbol=BTC_USDT"
        );
    }

    #[test]
    fn test_iso_timestamp_format() {
        let ts = get_iso_timestamp();
        // 2021-07-01T12:00:00.123Z
        assert_eq!(ts.len(), 24);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[19..20], ".");
        assert!(get_timestamp_ms() > 1600000000000);
    }
}
