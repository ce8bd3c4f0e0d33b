//! AnkiConnect client.
//!
//! Every call is a JSON POST of `{action, version, params}` and every reply
//! must be exactly `{result, error}`. Transport failures are retried through
//! the client's [`RetryPolicy`]; anything Anki itself rejects is not.

mod error;
mod model;

pub use error::AnkiError;
pub use model::{
    AddOptions, CardTemplate, ContentFields, NewNote, NoteFields, NoteModel, NoteUpdate,
    MODEL_NAME,
};

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::retry::RetryPolicy;

/// AnkiConnect API version spoken by this client.
pub const API_VERSION: u32 = 6;

pub const DEFAULT_URL: &str = "http://localhost:8765";

const AVAILABILITY_HINT: &str = "Make sure Anki is running and AnkiConnect plugin is installed.";

#[derive(Debug, Serialize)]
struct Request<'a> {
    action: &'a str,
    version: u32,
    #[serde(skip_serializing_if = "Value::is_null")]
    params: Value,
}

#[derive(Debug, Clone)]
pub struct AnkiClient {
    http: Client,
    url: String,
    retry: RetryPolicy,
}

impl AnkiClient {
    /// Client with a per-request `timeout`.
    pub fn new(url: &str, timeout: Duration, retry: RetryPolicy) -> Result<Self, AnkiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Send one action and return its `result`.
    pub async fn invoke(&self, action: &str, params: Value) -> Result<Value, AnkiError> {
        let request = &Request {
            action,
            version: API_VERSION,
            params,
        };
        tracing::debug!(action, "AnkiConnect request");
        self.retry.run(action, move || self.send(request)).await
    }

    async fn send(&self, request: &Request<'_>) -> Result<Value, AnkiError> {
        let response = self.http.post(&self.url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnkiError::Connectivity(format!("HTTP {}", status.as_u16())));
        }

        let bytes = response.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes).map_err(|e| {
            AnkiError::ProtocolViolation(format!("response is not valid JSON: {}", e))
        })?;

        unwrap_response(body)
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, params: Value) -> Result<T, AnkiError> {
        let result = self.invoke(action, params).await?;
        serde_json::from_value(result).map_err(|e| {
            AnkiError::ProtocolViolation(format!("unexpected result for {}: {}", action, e))
        })
    }

    pub async fn version(&self) -> Result<u32, AnkiError> {
        self.call("version", Value::Null).await
    }

    pub async fn model_names(&self) -> Result<Vec<String>, AnkiError> {
        self.call("modelNames", Value::Null).await
    }

    pub async fn create_model(&self, model: &NoteModel) -> Result<(), AnkiError> {
        let params = to_params(model)?;
        self.invoke("createModel", params).await?;
        Ok(())
    }

    pub async fn deck_names(&self) -> Result<Vec<String>, AnkiError> {
        self.call("deckNames", Value::Null).await
    }

    /// Create `deck` (and any missing parents). Returns the deck id.
    pub async fn create_deck(&self, deck: &str) -> Result<i64, AnkiError> {
        self.call("createDeck", json!({ "deck": deck })).await
    }

    pub async fn find_notes(&self, query: &str) -> Result<Vec<i64>, AnkiError> {
        self.call("findNotes", json!({ "query": query })).await
    }

    /// Notes whose `id` field is exactly `card_id`.
    pub async fn find_notes_by_id(&self, card_id: &str) -> Result<Vec<i64>, AnkiError> {
        self.find_notes(&id_search(card_id)).await
    }

    /// Returns the new note id.
    pub async fn add_note(&self, note: &NewNote) -> Result<i64, AnkiError> {
        let note = to_params(note)?;
        self.call("addNote", json!({ "note": note })).await
    }

    pub async fn update_note(&self, note: &NoteUpdate) -> Result<(), AnkiError> {
        let note = to_params(note)?;
        self.invoke("updateNote", json!({ "note": note })).await?;
        Ok(())
    }

    /// Check Anki is reachable and create the card note type if it is missing.
    pub async fn ensure_model(&self) -> Result<(), AnkiError> {
        let version = self.version().await.map_err(|e| match e {
            AnkiError::Connectivity(msg) => {
                AnkiError::Connectivity(format!("{}. {}", msg, AVAILABILITY_HINT))
            }
            other => other,
        })?;
        tracing::debug!(version, "AnkiConnect reachable");

        let models = self.model_names().await?;
        if !models.iter().any(|name| name == MODEL_NAME) {
            tracing::info!(model = MODEL_NAME, "Creating note type");
            self.create_model(&NoteModel::obsidian_card()).await?;
        }
        Ok(())
    }
}

fn to_params<T: Serialize>(value: &T) -> Result<Value, AnkiError> {
    serde_json::to_value(value)
        .map_err(|e| AnkiError::ProtocolViolation(format!("cannot encode request: {}", e)))
}

/// Search matching the `id` field literally.
///
/// The term is quoted so spaces stay inside it. Backslash, `"`, `*` and `_`
/// are escaped so they are not read as search syntax or wildcards.
pub(crate) fn id_search(card_id: &str) -> String {
    let mut escaped = String::with_capacity(card_id.len());
    for c in card_id.chars() {
        if matches!(c, '\\' | '"' | '*' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    format!("\"id:{}\"", escaped)
}

/// Check the reply has exactly `result` and `error`, and a null `error`.
pub(crate) fn unwrap_response(body: Value) -> Result<Value, AnkiError> {
    let Value::Object(mut fields) = body else {
        return Err(AnkiError::ProtocolViolation(
            "response is not a JSON object".to_string(),
        ));
    };

    if fields.len() != 2 {
        return Err(AnkiError::ProtocolViolation(format!(
            "response has an unexpected number of fields: {}",
            fields.len()
        )));
    }

    let error = fields.remove("error").ok_or_else(|| {
        AnkiError::ProtocolViolation("response is missing required error field".to_string())
    })?;
    let result = fields.remove("result").ok_or_else(|| {
        AnkiError::ProtocolViolation("response is missing required result field".to_string())
    })?;

    match error {
        Value::Null => Ok(result),
        Value::String(message) => Err(AnkiError::ProtocolViolation(message)),
        other => Err(AnkiError::ProtocolViolation(other.to_string())),
    }
}
