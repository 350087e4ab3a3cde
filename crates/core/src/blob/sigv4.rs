//! AWS Signature Version 4 request signing for the blob store client.
//!
//! Implements the subset needed here: GET requests with an empty payload,
//! signed headers `host`, `x-amz-content-sha256`, and `x-amz-date`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Static credentials for SigV4 signing.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_key: String,
}

/// Headers to attach to a signed GET request, in (name, value) pairs.
///
/// `uri_path` is the raw (unencoded) absolute path; `query` the raw
/// key/value pairs. The caller must serialize the request URL with
/// [`uri_encode`] using the same inputs, or the signature will not match.
pub fn sign_get(
    host: &str,
    uri_path: &str,
    query: &[(String, String)],
    region: &str,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> Vec<(String, String)> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let payload_hash = hex::encode(Sha256::digest(b""));

    let canonical_uri = uri_encode(uri_path, false);
    let canonical_query = canonical_query_string(query);
    let canonical_headers = format!(
        "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
        host, payload_hash, amz_date
    );
    let signed_headers = "host;x-amz-content-sha256;x-amz-date";

    let canonical_request = format!(
        "GET\n{}\n{}\n{}\n{}\n{}",
        canonical_uri, canonical_query, canonical_headers, signed_headers, payload_hash
    );

    let scope = format!("{}/{}/{}/aws4_request", date, region, SERVICE);
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        amz_date,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signature = hex::encode(hmac(
        &signing_key(&credentials.secret_key, &date, region),
        string_to_sign.as_bytes(),
    ));

    let authorization = format!(
        "{} Credential={}/{}, SignedHeaders={}, Signature={}",
        ALGORITHM, credentials.access_key_id, scope, signed_headers, signature
    );

    vec![
        ("x-amz-date".to_string(), amz_date),
        ("x-amz-content-sha256".to_string(), payload_hash),
        ("authorization".to_string(), authorization),
    ]
}

/// Serialize query pairs in canonical (sorted, fully encoded) form.
pub fn canonical_query_string(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode per the SigV4 rules: unreserved characters pass through,
/// everything else becomes uppercase `%XX`. `/` survives in URI paths.
pub fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn signing_key(secret: &str, date: &str, region: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, SERVICE.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn creds() -> Credentials {
        Credentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into(),
        }
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("abc-123_~.", true), "abc-123_~.");
        assert_eq!(uri_encode("c1/src/main.rs", false), "c1/src/main.rs");
        assert_eq!(uri_encode("c1/", true), "c1%2F");
        assert_eq!(uri_encode("a b", true), "a%20b");
        assert_eq!(uri_encode("€", true), "%E2%82%AC");
    }

    #[test]
    fn test_canonical_query_is_sorted_and_encoded() {
        let q = vec![
            ("prefix".to_string(), "c1/".to_string()),
            ("list-type".to_string(), "2".to_string()),
        ];
        assert_eq!(canonical_query_string(&q), "list-type=2&prefix=c1%2F");
    }

    #[test]
    fn test_signed_headers_shape() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let headers = sign_get(
            "localhost:9000",
            "/graphvcs/c1/f.txt",
            &[],
            "us-east-1",
            &creds(),
            now,
        );
        let map: std::collections::HashMap<_, _> = headers.iter().cloned().collect();
        assert_eq!(map["x-amz-date"], "20240301T120000Z");
        // SHA-256 of the empty payload.
        assert_eq!(
            map["x-amz-content-sha256"],
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        let auth = &map["authorization"];
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240301/us-east-1/s3/aws4_request"));
        assert!(auth.contains("SignedHeaders=host;x-amz-content-sha256;x-amz-date"));
        assert!(auth.contains("Signature="));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let q = vec![("list-type".to_string(), "2".to_string())];
        let a = sign_get("h", "/b", &q, "us-east-1", &creds(), now);
        let b = sign_get("h", "/b", &q, "us-east-1", &creds(), now);
        assert_eq!(a, b);
    }
}
