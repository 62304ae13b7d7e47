use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One record as returned by the metadata store: requested field name to value.
pub type Record = Map<String, Value>;

/// Field selection used when the caller does not supply one.
pub const DEFAULT_FIELDS: &str = "contentFilesOriginal { id, url, name }
documentType
permalink
resume
resumeTitle
uid
url
uniqueIdentifiers { uidType, value }";

/// Pointer to one blob in the content store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentReference {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// External identifier pair such as a case number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueIdentifier {
    #[serde(rename = "uidType")]
    pub kind: String,
    pub value: String,
}

/// Metadata for one remote document, read-only once parsed.
///
/// Fields the pipeline does not interpret (resume, permalink, ...) are kept in
/// `extra` so they travel with the assembled document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "uid")]
    pub id: String,
    #[serde(rename = "url")]
    pub uri: String,
    #[serde(rename = "resumeTitle", alias = "title", default)]
    pub title: Option<String>,
    #[serde(rename = "documentType", default)]
    pub document_type: String,
    #[serde(rename = "contentFilesOriginal", default)]
    pub content_files: Vec<ContentReference>,
    #[serde(rename = "uniqueIdentifiers", default)]
    pub unique_identifiers: Vec<UniqueIdentifier>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DocumentMetadata {
    pub fn from_record(record: Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record))
    }

    /// Only the first attached file is ever resolved.
    pub fn primary_content(&self) -> Option<&ContentReference> {
        self.content_files.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Binary,
}

impl ContentKind {
    /// Classifies a declared content type, `None` when it is not recognized.
    ///
    /// Text kinds are only accepted without a charset or with UTF-8, since that
    /// is the only decoding applied to them.
    pub fn classify(content_type: &str) -> Option<Self> {
        let mut parts = content_type.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let params: Vec<String> = parts
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        match essence.as_str() {
            "text/html" | "text/plain" => {
                let utf8_only = params
                    .iter()
                    .all(|p| matches!(p.as_str(), "charset=utf-8" | "charset=\"utf-8\""));
                utf8_only.then_some(ContentKind::Text)
            }
            "application/pdf" | "application/octet-stream" => Some(ContentKind::Binary),
            _ => None,
        }
    }
}

/// Resolved payload of a content reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FetchedContent {
    pub fn len(&self) -> usize {
        match self {
            FetchedContent::Text(text) => text.len(),
            FetchedContent::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Metadata merged with its fetched content.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledDocument {
    pub metadata: DocumentMetadata,
    pub content: FetchedContent,
}
