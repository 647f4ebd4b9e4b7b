//! S3 object store adapter.
//!
//! Talks to AWS S3 or any S3-compatible service (MinIO, LocalStack) through
//! the REST API with SigV4 signing from [`crate::aws_sign`]. Handles
//! `ListObjectsV2` pagination and path-style addressing for compatibles.
//! XML responses are parsed by hand — the ListObjectsV2 shape is flat enough
//! that a dedicated XML dependency buys nothing.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::OnceLock;
use tracing::debug;

use crate::aws_sign::{hex_sha256, uri_encode, uri_encode_key, AwsCredentials, S3Signer};
use crate::config::ObjectStoreConfig;
use crate::traits::ObjectStore;

/// Metadata for a single object, parsed from a `ListObjectsV2` response.
#[derive(Debug, Clone)]
pub struct S3ObjectInfo {
    pub key: String,
    /// Last modification timestamp (epoch seconds).
    pub last_modified: i64,
    /// Entity tag, stripped of surrounding quotes.
    pub etag: String,
    pub size: i64,
}

/// One S3 bucket reachable with one credential/region pair.
#[derive(Clone)]
pub struct S3Bucket {
    client: reqwest::Client,
    signer: S3Signer,
    scheme: String,
    host: String,
    bucket: String,
    path_style: bool,
}

impl S3Bucket {
    /// `endpoint` overrides the standard AWS host for S3 compatibles; when
    /// absent the virtual-hosted `<bucket>.s3.<region>.amazonaws.com` form
    /// is used.
    pub fn new(
        endpoint: Option<&str>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        credentials: AwsCredentials,
        path_style: bool,
    ) -> Self {
        let bucket = bucket.into();
        let region = region.into();
        let (scheme, host) = match endpoint {
            Some(ep) => {
                let (scheme, rest) = match ep.split_once("://") {
                    Some((s, r)) => (s.to_string(), r),
                    None => ("https".to_string(), ep),
                };
                (scheme, rest.trim_end_matches('/').to_string())
            }
            None => (
                "https".to_string(),
                format!("{}.s3.{}.amazonaws.com", bucket, region),
            ),
        };
        Self {
            client: reqwest::Client::new(),
            signer: S3Signer::new(credentials, region),
            scheme,
            host,
            bucket,
            path_style,
        }
    }

    pub fn from_config(config: &ObjectStoreConfig, credentials: AwsCredentials) -> Self {
        Self::new(
            config.endpoint_url.as_deref(),
            &config.bucket,
            &config.region,
            credentials,
            config.enable_path_style,
        )
    }

    fn canonical_uri(&self, key: Option<&str>) -> String {
        let object_part = key.map(uri_encode_key);
        match (self.path_style, object_part) {
            (true, Some(k)) => format!("/{}/{}", self.bucket, k),
            (true, None) => format!("/{}", self.bucket),
            (false, Some(k)) => format!("/{}", k),
            (false, None) => "/".to_string(),
        }
    }

    async fn signed_request(
        &self,
        method: reqwest::Method,
        key: Option<&str>,
        query: &[(String, String)],
        body: Vec<u8>,
    ) -> Result<reqwest::Response> {
        let canonical_uri = self.canonical_uri(key);
        let payload_hash = hex_sha256(&body);
        let headers = self.signer.sign(
            method.as_str(),
            &self.host,
            &canonical_uri,
            query,
            &payload_hash,
            Utc::now(),
        );

        // The query string on the wire must match what was signed
        let mut sorted = query.to_vec();
        sorted.sort();
        let querystring: String = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let mut url = format!("{}://{}{}", self.scheme, self.host, canonical_uri);
        if !querystring.is_empty() {
            url = format!("{}?{}", url, querystring);
        }

        let mut req = self.client.request(method, &url);
        for (name, value) in &headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if !body.is_empty() {
            req = req.body(body);
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("request to s3://{} failed", self.bucket))?;
        Ok(resp)
    }

    /// List all objects under `prefix`, following `NextContinuationToken`
    /// pagination until the listing is complete.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<S3ObjectInfo>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut query = vec![
                ("list-type".to_string(), "2".to_string()),
                ("max-keys".to_string(), "1000".to_string()),
            ];
            if !prefix.is_empty() {
                query.push(("prefix".to_string(), prefix.to_string()));
            }
            if let Some(ref token) = continuation_token {
                query.push(("continuation-token".to_string(), token.clone()));
            }

            let resp = self
                .signed_request(reqwest::Method::GET, None, &query, Vec::new())
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                bail!(
                    "S3 ListObjectsV2 failed (HTTP {}) for s3://{}/{}: {}",
                    status,
                    self.bucket,
                    prefix,
                    body.chars().take(500).collect::<String>()
                );
            }

            let xml = resp.text().await?;
            let (batch, is_truncated, next_token) = parse_list_objects_response(&xml)?;
            objects.extend(batch);

            if is_truncated {
                continuation_token = next_token;
            } else {
                break;
            }
        }

        debug!(bucket = %self.bucket, prefix, count = objects.len(), "listed objects");
        Ok(objects)
    }

    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .signed_request(reqwest::Method::GET, Some(key), &[], Vec::new())
            .await?;
        if !resp.status().is_success() {
            bail!(
                "S3 GetObject failed (HTTP {}) for key '{}'",
                resp.status(),
                key
            );
        }
        Ok(resp.bytes().await?.to_vec())
    }

    pub async fn put_object_bytes(&self, key: &str, content: &[u8]) -> Result<()> {
        let resp = self
            .signed_request(reqwest::Method::PUT, Some(key), &[], content.to_vec())
            .await?;
        if !resp.status().is_success() {
            bail!(
                "S3 PutObject failed (HTTP {}) for key '{}'",
                resp.status(),
                key
            );
        }
        Ok(())
    }

    pub async fn delete_object(&self, key: &str) -> Result<()> {
        let resp = self
            .signed_request(reqwest::Method::DELETE, Some(key), &[], Vec::new())
            .await?;
        // DeleteObject returns 204 for present and absent keys alike
        if !resp.status().is_success() {
            bail!(
                "S3 DeleteObject failed (HTTP {}) for key '{}'",
                resp.status(),
                key
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for S3Bucket {
    async fn put_object(&self, key: &str, content: &[u8]) -> Result<()> {
        self.put_object_bytes(key, content).await
    }

    async fn delete_objects_by_prefix(&self, prefix: &str) -> Result<()> {
        let objects = self.list_objects(prefix).await?;
        for obj in &objects {
            self.delete_object(&obj.key).await?;
        }
        debug!(bucket = %self.bucket, prefix, deleted = objects.len(), "deleted objects by prefix");
        Ok(())
    }
}

/// [`S3Bucket`] that resolves its `AWS_*` credentials from the environment
/// on first use. Operations that never touch the object store (initialize,
/// delete, status) can be wired up without credentials present.
pub struct LazyS3Bucket {
    config: ObjectStoreConfig,
    inner: OnceLock<S3Bucket>,
}

impl LazyS3Bucket {
    pub fn new(config: ObjectStoreConfig) -> Self {
        Self {
            config,
            inner: OnceLock::new(),
        }
    }

    fn bucket(&self) -> Result<&S3Bucket> {
        if let Some(bucket) = self.inner.get() {
            return Ok(bucket);
        }
        let credentials = AwsCredentials::from_env()?;
        let bucket = S3Bucket::from_config(&self.config, credentials);
        Ok(self.inner.get_or_init(|| bucket))
    }
}

#[async_trait]
impl ObjectStore for LazyS3Bucket {
    async fn put_object(&self, key: &str, content: &[u8]) -> Result<()> {
        self.bucket()?.put_object_bytes(key, content).await
    }

    async fn delete_objects_by_prefix(&self, prefix: &str) -> Result<()> {
        self.bucket()?.delete_objects_by_prefix(prefix).await
    }
}

/// Parse a `ListObjectsV2` XML response into object infos plus pagination
/// state.
pub(crate) fn parse_list_objects_response(
    xml: &str,
) -> Result<(Vec<S3ObjectInfo>, bool, Option<String>)> {
    let mut objects = Vec::new();
    let is_truncated = extract_xml_value(xml, "IsTruncated")
        .map(|v| v == "true")
        .unwrap_or(false);
    let next_token = extract_xml_value(xml, "NextContinuationToken");

    let mut remaining = xml;
    while let Some(start) = remaining.find("<Contents>") {
        let block_start = start + "<Contents>".len();
        let Some(end) = remaining[block_start..].find("</Contents>") else {
            break;
        };
        let block = &remaining[block_start..block_start + end];
        remaining = &remaining[block_start + end + "</Contents>".len()..];

        let key = extract_xml_value(block, "Key").unwrap_or_default();
        // Skip directory placeholder keys
        if key.is_empty() || key.ends_with('/') {
            continue;
        }

        let last_modified = extract_xml_value(block, "LastModified")
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.timestamp())
            .unwrap_or(0);
        let etag = extract_xml_value(block, "ETag")
            .unwrap_or_default()
            .trim_matches('"')
            .to_string();
        let size = extract_xml_value(block, "Size")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);

        objects.push(S3ObjectInfo {
            key,
            last_modified,
            etag,
            size,
        });
    }

    Ok((objects, is_truncated, next_token))
}

/// Extract the text content of a simple, non-nested XML tag.
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)?;
    Some(xml[start..start + end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>tok-123</NextContinuationToken>
  <Contents>
    <Key>kb/a.md</Key>
    <LastModified>2025-06-01T10:00:00.000Z</LastModified>
    <ETag>"abc123"</ETag>
    <Size>42</Size>
  </Contents>
  <Contents>
    <Key>kb/dir/</Key>
    <LastModified>2025-06-01T10:00:00.000Z</LastModified>
    <ETag>"d41d8"</ETag>
    <Size>0</Size>
  </Contents>
  <Contents>
    <Key>kb/b.txt</Key>
    <LastModified>2025-06-02T11:30:00.000Z</LastModified>
    <ETag>"def456"</ETag>
    <Size>7</Size>
  </Contents>
</ListBucketResult>"#;

    #[test]
    fn parses_listing_with_pagination_and_skips_directories() {
        let (objects, truncated, token) = parse_list_objects_response(LISTING).unwrap();
        assert!(truncated);
        assert_eq!(token.as_deref(), Some("tok-123"));
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].key, "kb/a.md");
        assert_eq!(objects[0].size, 42);
        assert_eq!(objects[0].etag, "abc123");
        assert_eq!(objects[1].key, "kb/b.txt");
        assert!(objects[1].last_modified > objects[0].last_modified);
    }

    #[test]
    fn parses_final_page() {
        let xml = "<ListBucketResult><IsTruncated>false</IsTruncated></ListBucketResult>";
        let (objects, truncated, token) = parse_list_objects_response(xml).unwrap();
        assert!(objects.is_empty());
        assert!(!truncated);
        assert!(token.is_none());
    }

    #[test]
    fn canonical_uri_respects_path_style() {
        let creds = AwsCredentials::new("AKID", "SECRET");
        let virtual_hosted = S3Bucket::new(None, "docs", "us-east-1", creds.clone(), false);
        assert_eq!(virtual_hosted.canonical_uri(Some("a b.md")), "/a%20b.md");
        assert_eq!(virtual_hosted.canonical_uri(None), "/");
        assert_eq!(virtual_hosted.host, "docs.s3.us-east-1.amazonaws.com");

        let path_style = S3Bucket::new(Some("http://localhost:9000"), "docs", "us-east-1", creds, true);
        assert_eq!(path_style.canonical_uri(Some("a.md")), "/docs/a.md");
        assert_eq!(path_style.canonical_uri(None), "/docs");
        assert_eq!(path_style.scheme, "http");
        assert_eq!(path_style.host, "localhost:9000");
    }
}
