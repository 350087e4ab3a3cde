//! S3-compatible blob store client.
//!
//! Fetches a commit's files by listing the bucket under the `commitId/`
//! prefix and then fetching every listed key. Retrieval is all-or-nothing
//! per commit: one failed fetch aborts the call so a half-populated
//! snapshot is never returned.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument, warn};

use super::sigv4::{self, canonical_query_string, uri_encode, Credentials};
use super::BlobStore;
use crate::errors::BlobError;
use crate::models::BlobSet;

/// Asynchronous client for an S3-compatible object store.
#[derive(Clone)]
pub struct S3BlobClient {
    http: reqwest::Client,
    endpoint: String,
    host: String,
    bucket: String,
    region: String,
    credentials: Option<Credentials>,
}

impl S3BlobClient {
    /// Create a client for `endpoint` (e.g. `http://localhost:9000`). Pass
    /// `None` for `credentials` to send unsigned (anonymous) requests.
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Result<Self, BlobError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let url = reqwest::Url::parse(&endpoint)
            .map_err(|e| BlobError::Unavailable(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{}:{}", h, p),
            (Some(h), None) => h.to_string(),
            (None, _) => {
                return Err(BlobError::Unavailable(format!(
                    "endpoint '{}' has no host",
                    endpoint
                )))
            }
        };
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint,
            host,
            bucket: bucket.into(),
            region: region.into(),
            credentials,
        })
    }

    /// Issue a signed (or anonymous) GET. `raw_path` and `query` are
    /// unencoded; the URL is serialized with the same encoding the
    /// signature covers.
    async fn get(
        &self,
        raw_path: &str,
        query: &[(String, String)],
    ) -> Result<reqwest::Response, BlobError> {
        let mut url = format!("{}{}", self.endpoint, uri_encode(raw_path, false));
        let query_string = canonical_query_string(query);
        if !query_string.is_empty() {
            url.push('?');
            url.push_str(&query_string);
        }

        let mut request = self.http.get(&url);
        if let Some(ref credentials) = self.credentials {
            let headers = sigv4::sign_get(
                &self.host,
                raw_path,
                query,
                &self.region,
                credentials,
                Utc::now(),
            );
            for (name, value) in headers {
                request = request.header(name, value);
            }
        }
        Ok(request.send().await?)
    }
}

#[async_trait]
impl BlobStore for S3BlobClient {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list_and_fetch(&self, commit_id: &str) -> Result<BlobSet, BlobError> {
        let prefix = format!("{}/", commit_id);
        let bucket_path = format!("/{}", self.bucket);

        // Paginated listing of every key under the commit's namespace.
        let mut keys: Vec<String> = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut query = vec![
                ("list-type".to_string(), "2".to_string()),
                ("prefix".to_string(), prefix.clone()),
            ];
            if let Some(ref token) = continuation {
                query.push(("continuation-token".to_string(), token.clone()));
            }

            let response = self.get(&bucket_path, &query).await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                warn!(status = status.as_u16(), "blob listing failed");
                return Err(BlobError::Unavailable(format!(
                    "listing '{}' returned HTTP {}: {}",
                    prefix,
                    status.as_u16(),
                    body
                )));
            }
            let xml = response.text().await?;
            let page = parse_list_response(&xml).map_err(|detail| BlobError::MalformedListing {
                prefix: prefix.clone(),
                detail,
            })?;
            keys.extend(page.keys);
            match page.next_continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }

        // Fetch every key; directory markers are not files.
        let mut files = BlobSet::new();
        for key in keys {
            if key.ends_with('/') {
                continue;
            }
            let response = self.get(&format!("/{}/{}", self.bucket, key), &[]).await?;
            let status = response.status();
            if !status.is_success() {
                return Err(BlobError::Unavailable(format!(
                    "fetching '{}' returned HTTP {}",
                    key,
                    status.as_u16()
                )));
            }
            let content = response.bytes().await?;
            let relative = key.strip_prefix(&prefix).unwrap_or(&key).to_string();
            files.insert(relative, content.to_vec());
        }

        debug!(commit_id, files = files.len(), "fetched blob set");
        Ok(files)
    }
}

// ---------------------------------------------------------------------------
// Listing XML
// ---------------------------------------------------------------------------

struct ListPage {
    keys: Vec<String>,
    next_continuation: Option<String>,
}

/// Parse a ListObjectsV2 response body.
fn parse_list_response(xml: &str) -> Result<ListPage, String> {
    let mut keys = Vec::new();
    for part in xml.split("<Contents>").skip(1) {
        let fragment = match part.find("</Contents>") {
            Some(pos) => &part[..pos],
            None => return Err("unterminated <Contents> element".into()),
        };
        let key = extract_tag_content(fragment, "Key")
            .ok_or_else(|| "missing <Key> in <Contents>".to_string())?;
        keys.push(xml_unescape(&key));
    }

    let truncated = extract_tag_content(xml, "IsTruncated")
        .map(|v| v == "true")
        .unwrap_or(false);
    let next_continuation = if truncated {
        let token = extract_tag_content(xml, "NextContinuationToken")
            .ok_or_else(|| "truncated listing without a continuation token".to_string())?;
        Some(xml_unescape(&token))
    } else {
        None
    };

    Ok(ListPage {
        keys,
        next_continuation,
    })
}

fn extract_tag_content(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;
    Some(xml[start..end].to_string())
}

fn xml_unescape(input: &str) -> String {
    input
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
