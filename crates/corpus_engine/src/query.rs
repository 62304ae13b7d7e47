use std::time::Duration;

use chrono::{DateTime, Utc};
use corpus_core::Record;
use corpus_logging::corpus_debug;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::credentials::CredentialProvider;
use crate::session::{SendError, TransportSession};
use crate::{CredentialError, ProtocolError, ProtocolFailure};

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(120);

/// Read side of the metadata store.
#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// Number of records of `document_type` matching `filter`.
    async fn count(&self, document_type: &str, filter: &str) -> Result<usize, ProtocolError>;

    /// At most `limit` records starting at `offset`, in store order. An empty
    /// page is a normal answer.
    async fn fetch_page(
        &self,
        document_type: &str,
        filter: &str,
        fields: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Record>, ProtocolError>;
}

/// Client for the store's GraphQL endpoint.
///
/// Queries follow the store's generated schema: a collection root named by
/// pluralizing the document type (`verdict` -> `verdicts`), `where` / `skip`
/// / `first` arguments, and a `<root>Connection` root for aggregates.
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    session: TransportSession,
    endpoint: String,
    token: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlErrorEntry>,
}

#[derive(Deserialize)]
struct GraphQlErrorEntry {
    message: String,
}

impl GraphQlClient {
    pub fn new(session: TransportSession, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            session,
            endpoint: endpoint.into(),
            token: token.into(),
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Resolves the bearer token once; it is reused for every query.
    pub fn with_credentials(
        session: TransportSession,
        endpoint: impl Into<String>,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self, CredentialError> {
        let token = credentials.bearer_token()?;
        Ok(Self::new(session, endpoint, token))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `updatedAt` of the most recently updated record matching `filter`.
    pub async fn latest_update(
        &self,
        document_type: &str,
        filter: &str,
    ) -> Result<DateTime<Utc>, ProtocolError> {
        let root = collection_root(document_type);
        let mut args = where_argument(filter).into_iter().collect::<Vec<_>>();
        args.push("orderBy: updatedAt_DESC".to_string());
        args.push("first: 1".to_string());
        let query = format!("query {{ {root}({}) {{ updatedAt }} }}", args.join(", "));

        let data = self.execute(query).await?;
        let raw = data
            .get(&root)
            .and_then(Value::as_array)
            .and_then(|records| records.first())
            .and_then(|record| record.get("updatedAt"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ProtocolError::new(
                    ProtocolFailure::Malformed,
                    format!("no {document_type} records with updatedAt"),
                )
            })?;
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|err| {
                ProtocolError::new(
                    ProtocolFailure::Malformed,
                    format!("updatedAt {raw:?}: {err}"),
                )
            })
    }

    async fn execute(&self, query: String) -> Result<Value, ProtocolError> {
        corpus_debug!("graphql query: {}", query);
        let request = self
            .session
            .client()
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .timeout(self.timeout)
            .json(&json!({ "query": query }));

        let reply = self.session.send(request).await.map_err(map_send_error)?;
        let status = reply.response.status();
        if !status.is_success() {
            return Err(ProtocolError::new(
                ProtocolFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        let body = reply
            .response
            .bytes()
            .await
            .map_err(|err| map_send_error(SendError::Http(err)))?;

        let parsed: GraphQlResponse = serde_json::from_slice(&body)
            .map_err(|err| ProtocolError::new(ProtocolFailure::Malformed, err.to_string()))?;
        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(ProtocolError::new(
                ProtocolFailure::Remote,
                messages.join("; "),
            ));
        }
        parsed
            .data
            .ok_or_else(|| ProtocolError::new(ProtocolFailure::Malformed, "response has no data"))
    }
}

#[async_trait::async_trait]
impl MetadataSource for GraphQlClient {
    async fn count(&self, document_type: &str, filter: &str) -> Result<usize, ProtocolError> {
        let root = format!("{}Connection", collection_root(document_type));
        let args = where_argument(filter)
            .map(|w| format!("({w})"))
            .unwrap_or_default();
        let query = format!("query {{ {root}{args} {{ aggregate {{ count }} }} }}");

        let data = self.execute(query).await?;
        let count = data
            .get(&root)
            .and_then(|c| c.get("aggregate"))
            .and_then(|a| a.get("count"))
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                ProtocolError::new(
                    ProtocolFailure::Malformed,
                    format!("missing {root}.aggregate.count"),
                )
            })?;
        usize::try_from(count)
            .map_err(|err| ProtocolError::new(ProtocolFailure::Malformed, err.to_string()))
    }

    async fn fetch_page(
        &self,
        document_type: &str,
        filter: &str,
        fields: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Record>, ProtocolError> {
        let root = collection_root(document_type);
        let query = page_query(&root, filter, fields, offset, limit);

        let mut data = self.execute(query).await?;
        let records = match data.get_mut(&root).map(Value::take) {
            Some(Value::Array(records)) => records,
            Some(Value::Null) | None => {
                return Err(ProtocolError::new(
                    ProtocolFailure::Malformed,
                    format!("response has no {root} list"),
                ))
            }
            Some(other) => {
                return Err(ProtocolError::new(
                    ProtocolFailure::Malformed,
                    format!("{root} is not a list: {other}"),
                ))
            }
        };

        records
            .into_iter()
            .map(|record| match record {
                Value::Object(map) => Ok(map),
                other => Err(ProtocolError::new(
                    ProtocolFailure::Malformed,
                    format!("{root} entry is not an object: {other}"),
                )),
            })
            .collect()
    }
}

fn collection_root(document_type: &str) -> String {
    format!("{document_type}s")
}

fn where_argument(filter: &str) -> Option<String> {
    let filter = filter.trim();
    (!filter.is_empty()).then(|| format!("where: {{ {filter} }}"))
}

fn page_query(root: &str, filter: &str, fields: &str, offset: usize, limit: usize) -> String {
    let mut args: Vec<String> = where_argument(filter).into_iter().collect();
    args.push(format!("skip: {offset}"));
    args.push(format!("first: {limit}"));
    let fields = fields.split_whitespace().collect::<Vec<_>>().join(" ");
    format!("query {{ {root}({}) {{ {fields} }} }}", args.join(", "))
}

fn map_send_error(err: SendError) -> ProtocolError {
    match err {
        SendError::Closed => {
            ProtocolError::new(ProtocolFailure::Transport, "transport session closed")
        }
        SendError::Http(err) if err.is_timeout() => {
            ProtocolError::new(ProtocolFailure::Timeout, err.to_string())
        }
        SendError::Http(err) => ProtocolError::new(ProtocolFailure::Transport, err.to_string()),
    }
}
