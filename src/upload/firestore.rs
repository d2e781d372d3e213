use super::document::{Document, Field};
use super::RemoteSink;
use crate::error::TransportError;
use chrono::{Local, TimeZone};
use serde_json::{json, Map, Value};
use std::time::Duration;

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";

/// Cloud Firestore over its REST API
///
/// Every upsert creates a new document with a server-assigned id in the
/// target collection. Requests carry the configured OAuth bearer token.
pub struct FirestoreSink {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl FirestoreSink {
    pub fn new(project: &str, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("rollover-tracker/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        FirestoreSink {
            client,
            base_url: format!("{}/projects/{}/databases/(default)/documents", FIRESTORE_BASE, project),
            token,
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, collection)
    }
}

impl RemoteSink for FirestoreSink {
    async fn upsert(&self, collection: &str, document: &Document) -> Result<(), TransportError> {
        let mut request = self
            .client
            .post(self.collection_url(collection))
            .json(&encode_document(document));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Send(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::debug!("Firestore rejected write to {}: {}", collection, body);
            return Err(TransportError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// `{"fields": {...}}` body for a document write
pub fn encode_document(document: &Document) -> Value {
    json!({ "fields": encode_fields(document) })
}

fn encode_fields<'a>(fields: impl IntoIterator<Item = (&'a String, &'a Field)>) -> Value {
    let map: Map<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect();
    Value::Object(map)
}

/// Firestore typed value for one field
pub fn encode_value(field: &Field) -> Value {
    match field {
        Field::Bool(b) => json!({ "booleanValue": b }),
        // Firestore expects int64 as a decimal string
        Field::Int(i) => json!({ "integerValue": i.to_string() }),
        Field::Float(f) => json!({ "doubleValue": f }),
        Field::Str(s) => json!({ "stringValue": s }),
        Field::Timestamp(ts) => {
            // Ride logs record local wall-clock time
            let utc = Local
                .from_local_datetime(ts)
                .earliest()
                .map(|t| t.naive_utc())
                .unwrap_or(*ts);
            json!({ "timestampValue": utc.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string() })
        }
        Field::GeoPoint { latitude, longitude } => {
            json!({ "geoPointValue": { "latitude": latitude, "longitude": longitude } })
        }
        Field::Array(values) => {
            let values: Vec<Value> = values.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Field::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}
