#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use corpus_core::{ContentReference, FetchedContent, Record, RunSettings};
use corpus_engine::{
    decode_payload, ContentSource, FetchError, MetadataSource, Orchestrator, ProtocolError,
    ProtocolFailure, RunRequest,
};
use serde_json::json;

pub fn init_logging() {
    corpus_logging::initialize_for_tests();
}

pub fn record(uid: &str) -> Record {
    let value = json!({
        "uid": uid,
        "url": uri(uid),
        "resumeTitle": format!("Title {uid}"),
        "documentType": "verdict",
        "contentFilesOriginal": [{ "id": format!("file-{uid}"), "name": format!("{uid}.html") }],
        "uniqueIdentifiers": []
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    }
}

pub fn uri(uid: &str) -> String {
    format!("https://example.com/verdicts/{uid}")
}

/// In-memory metadata store.
#[derive(Default)]
pub struct FakeStore {
    pub records: Vec<Record>,
    pub reported_count: Option<usize>,
    pub fail_at_offset: Option<usize>,
    pub pages: Mutex<Vec<(usize, usize)>>,
}

impl FakeStore {
    pub fn with_uids(uids: &[&str]) -> Self {
        Self {
            records: uids.iter().map(|uid| record(uid)).collect(),
            ..Self::default()
        }
    }

    pub fn pages(&self) -> Vec<(usize, usize)> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl MetadataSource for FakeStore {
    async fn count(&self, _document_type: &str, _filter: &str) -> Result<usize, ProtocolError> {
        Ok(self.reported_count.unwrap_or(self.records.len()))
    }

    async fn fetch_page(
        &self,
        _document_type: &str,
        _filter: &str,
        _fields: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Record>, ProtocolError> {
        self.pages.lock().unwrap().push((offset, limit));
        if self.fail_at_offset == Some(offset) {
            return Err(ProtocolError::new(ProtocolFailure::HttpStatus(502), "bad gateway"));
        }
        let start = offset.min(self.records.len());
        let end = (offset + limit).min(self.records.len());
        Ok(self.records[start..end].to_vec())
    }
}

struct Blob {
    content_type: String,
    body: Vec<u8>,
    delay: Duration,
}

/// In-memory blob store that tracks how many fetches are unresolved at once.
#[derive(Default)]
pub struct FakeBlobs {
    blobs: HashMap<String, Blob>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl FakeBlobs {
    pub fn insert(&mut self, uid: &str, content_type: &str, body: &str, delay_ms: u64) {
        self.blobs.insert(
            format!("{uid}.html"),
            Blob {
                content_type: content_type.to_string(),
                body: body.as_bytes().to_vec(),
                delay: Duration::from_millis(delay_ms),
            },
        );
    }

    pub fn html(uids: &[&str]) -> Self {
        let mut blobs = Self::default();
        for uid in uids {
            blobs.insert(uid, "text/html", &format!("<p>Body of {uid}</p>"), 0);
        }
        blobs
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ContentSource for FakeBlobs {
    async fn fetch(
        &self,
        reference: &ContentReference,
        _timeout: Duration,
    ) -> Result<FetchedContent, FetchError> {
        self.requested.lock().unwrap().push(reference.name.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let blob = self.blobs.get(&reference.name);
        if let Some(blob) = blob {
            tokio::time::sleep(blob.delay).await;
        } else {
            tokio::task::yield_now().await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match blob {
            Some(blob) => decode_payload(&blob.content_type, blob.body.clone()),
            None => Err(FetchError::new(
                corpus_engine::FailureKind::HttpStatus(404),
                "no such object",
            )),
        }
    }
}

pub fn settings(batch_size: usize, max_concurrent_fetches: usize) -> RunSettings {
    RunSettings {
        batch_size,
        max_concurrent_fetches,
        ..RunSettings::default()
    }
}

pub fn request(limit: Option<usize>) -> RunRequest {
    RunRequest {
        document_type: "verdict".to_string(),
        filter: "url_contains: \"skat\"".to_string(),
        fields: corpus_core::DEFAULT_FIELDS.to_string(),
        limit,
    }
}

pub fn orchestrator(
    store: Arc<FakeStore>,
    blobs: Arc<FakeBlobs>,
    settings: RunSettings,
) -> Orchestrator {
    Orchestrator::new(store, blobs, settings)
}
