use std::time::Duration;

use corpus_core::{ContentKind, ContentReference, FetchedContent};
use futures_util::StreamExt;
use serde::Deserialize;
use url::Url;

use crate::session::{SendError, SessionResponse, TransportSession};
use crate::{FailureKind, FetchError};

pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// Resolves content references to payloads.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(
        &self,
        reference: &ContentReference,
        timeout: Duration,
    ) -> Result<FetchedContent, FetchError>;
}

#[derive(Debug, Clone)]
pub struct BlobStoreSettings {
    pub endpoint: String,
    pub bucket: String,
    pub token: Option<String>,
    pub max_bytes: u64,
}

impl BlobStoreSettings {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            bucket: bucket.into(),
            token: None,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Fetcher for a cloud-storage JSON API bucket.
///
/// Objects are addressed by `(bucket, reference.name)`. The object metadata
/// (for the declared content type) and the media download are two separate
/// requests, issued together and joined.
#[derive(Debug, Clone)]
pub struct BlobStoreFetcher {
    session: TransportSession,
    settings: BlobStoreSettings,
}

#[derive(Deserialize)]
struct ObjectMetadata {
    #[serde(rename = "contentType")]
    content_type: Option<String>,
}

impl BlobStoreFetcher {
    pub fn new(session: TransportSession, settings: BlobStoreSettings) -> Self {
        Self { session, settings }
    }

    fn object_url(&self, object_name: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.settings.endpoint)
            .map_err(|err| FetchError::new(FailureKind::Transport, err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| {
                FetchError::new(
                    FailureKind::Transport,
                    format!("storage endpoint {} cannot carry a path", self.settings.endpoint),
                )
            })?
            .pop_if_empty()
            .extend(["storage", "v1", "b", self.settings.bucket.as_str(), "o", object_name]);
        Ok(url)
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let request = self.session.client().get(url);
        match &self.settings.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn content_type(&self, url: Url) -> Result<String, FetchError> {
        let reply = self.send(self.get(url)).await?;
        let body = reply
            .response
            .bytes()
            .await
            .map_err(|err| map_send_error(SendError::Http(err)))?;
        let metadata: ObjectMetadata = serde_json::from_slice(&body)
            .map_err(|err| FetchError::new(FailureKind::Transport, err.to_string()))?;
        Ok(metadata.content_type.unwrap_or_default())
    }

    async fn download(&self, mut url: Url) -> Result<Vec<u8>, FetchError> {
        url.query_pairs_mut().append_pair("alt", "media");
        let reply = self.send(self.get(url)).await?;
        let max_bytes = self.settings.max_bytes;

        if let Some(content_len) = reply.response.content_length() {
            if content_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(content_len),
                    },
                    "payload too large",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = reply.response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|err| map_send_error(SendError::Http(err)))?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: Some(next_len),
                    },
                    "payload too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<SessionResponse, FetchError> {
        let reply = self.session.send(request).await.map_err(map_send_error)?;
        let status = reply.response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(reply)
    }
}

#[async_trait::async_trait]
impl ContentSource for BlobStoreFetcher {
    async fn fetch(
        &self,
        reference: &ContentReference,
        timeout: Duration,
    ) -> Result<FetchedContent, FetchError> {
        let url = self.object_url(&reference.name)?;
        // One deadline for the whole fetch, including the wait for connection permits.
        let joined = futures_util::future::try_join(self.content_type(url.clone()), self.download(url));
        let (content_type, bytes) = tokio::time::timeout(timeout, joined)
            .await
            .map_err(|_| {
                FetchError::new(
                    FailureKind::Timeout,
                    format!("{} not fetched within {:?}", reference.name, timeout),
                )
            })??;
        decode_payload(&content_type, bytes)
    }
}

/// Turns a downloaded payload into content according to its declared type.
pub fn decode_payload(content_type: &str, bytes: Vec<u8>) -> Result<FetchedContent, FetchError> {
    match ContentKind::classify(content_type) {
        Some(ContentKind::Text) => String::from_utf8(bytes)
            .map(FetchedContent::Text)
            .map_err(|err| FetchError::new(FailureKind::InvalidUtf8, err.to_string())),
        Some(ContentKind::Binary) => Ok(FetchedContent::Binary(bytes)),
        None => Err(FetchError::new(
            FailureKind::UnsupportedContentKind {
                content_kind: content_type.to_string(),
            },
            format!("do not know how to handle content type {content_type:?}"),
        )),
    }
}

fn map_send_error(err: SendError) -> FetchError {
    match err {
        SendError::Closed => FetchError::new(FailureKind::Transport, "transport session closed"),
        SendError::Http(err) if err.is_timeout() => {
            FetchError::new(FailureKind::Timeout, err.to_string())
        }
        SendError::Http(err) => FetchError::new(FailureKind::Transport, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload_is_decoded() {
        let content = decode_payload("text/html; charset=utf-8", b"<p>hej</p>".to_vec()).unwrap();
        assert_eq!(content, FetchedContent::Text("<p>hej</p>".into()));
    }

    #[test]
    fn binary_payload_is_left_alone() {
        let content = decode_payload("application/pdf", vec![0xff, 0x00]).unwrap();
        assert_eq!(content, FetchedContent::Binary(vec![0xff, 0x00]));
    }

    #[test]
    fn invalid_utf8_text_fails() {
        let err = decode_payload("text/plain", vec![0xff, 0xfe]).unwrap_err();
        assert_eq!(err.kind, FailureKind::InvalidUtf8);
    }

    #[test]
    fn unknown_kind_is_unsupported() {
        let err = decode_payload("image/png", vec![1]).unwrap_err();
        assert_eq!(
            err.kind,
            FailureKind::UnsupportedContentKind {
                content_kind: "image/png".into()
            }
        );
    }

    #[test]
    fn object_url_encodes_name_as_single_segment() {
        let session = TransportSession::new(1).unwrap();
        let mut settings = BlobStoreSettings::new("private");
        settings.endpoint = "http://localhost:9000/".into();
        let fetcher = BlobStoreFetcher::new(session, settings);
        let url = fetcher.object_url("verdicts/a b.html").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/storage/v1/b/private/o/verdicts%2Fa%20b.html"
        );
    }
}
