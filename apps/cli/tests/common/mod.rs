//! Common test utilities for integration tests.
//!
//! This module provides an in-process AnkiConnect stand-in built on axum:
//! - MockAnki keeps decks, note types and notes in memory
//! - Failure injection (HTTP 503, malformed replies, slow replies)
//! - Call counting and in-flight tracking per action

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use ankify::anki::AnkiClient;
use ankify::retry::RetryPolicy;
use ankify::sync::{SyncConfig, SyncEngine};
use ankify_core::{Card, DeckPath};

/// Note stored by the mock.
#[derive(Debug, Clone)]
pub struct MockNote {
    pub id: i64,
    pub deck: String,
    pub fields: HashMap<String, String>,
    pub tags: Vec<String>,
}

/// Mutable mock state. Tests may seed or inspect it directly.
#[derive(Debug, Default)]
pub struct MockState {
    pub decks: BTreeSet<String>,
    pub models: Vec<String>,
    pub notes: Vec<MockNote>,
    pub calls: Vec<String>,
    /// Answer this many requests with HTTP 503.
    pub fail_next: usize,
    /// Answer with an extra top-level field.
    pub malformed: bool,
    pub delay: Duration,
    next_id: i64,
}

impl MockState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        1_000 + self.next_id
    }

    /// Seed a note as if it had been created earlier.
    pub fn seed_note(&mut self, card_id: &str, deck: &str) -> i64 {
        let id = self.next_id();
        let fields = HashMap::from([
            ("id".to_string(), card_id.to_string()),
            ("question".to_string(), "old question".to_string()),
            ("answer".to_string(), "old answer".to_string()),
            ("comments".to_string(), String::new()),
            ("obsidian_url".to_string(), String::new()),
        ]);
        self.notes.push(MockNote {
            id,
            deck: deck.to_string(),
            fields,
            tags: Vec::new(),
        });
        id
    }

    fn apply(&mut self, action: &str, params: &Value) -> Result<Value, String> {
        match action {
            "version" => Ok(json!(6)),
            "modelNames" => Ok(json!(self.models)),
            "createModel" => {
                let name = params["modelName"].as_str().unwrap_or_default().to_string();
                if self.models.contains(&name) {
                    return Err(format!("Model name already exists: {}", name));
                }
                self.models.push(name);
                Ok(json!({}))
            }
            "deckNames" => Ok(json!(self.decks)),
            "createDeck" => {
                let deck = params["deck"].as_str().unwrap_or_default().to_string();
                self.decks.insert(deck);
                Ok(json!(self.next_id()))
            }
            "findNotes" => {
                let query = params["query"].as_str().unwrap_or_default();
                let Some(pattern) = id_pattern(query) else {
                    return Err(format!("unsupported query: {}", query));
                };
                let ids: Vec<i64> = self
                    .notes
                    .iter()
                    .filter(|n| n.fields.get("id").is_some_and(|v| pattern.matches(v)))
                    .map(|n| n.id)
                    .collect();
                Ok(json!(ids))
            }
            "addNote" => {
                let note = &params["note"];
                let deck = note["deckName"].as_str().unwrap_or_default().to_string();
                if !self.decks.contains(&deck) {
                    return Err("deck was not found".to_string());
                }
                let id = self.next_id();
                self.notes.push(MockNote {
                    id,
                    deck,
                    fields: string_map(&note["fields"]),
                    tags: string_list(&note["tags"]),
                });
                Ok(json!(id))
            }
            "updateNote" => {
                let update = &params["note"];
                let id = update["id"].as_i64().unwrap_or_default();
                let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
                    return Err("Note was not found".to_string());
                };
                note.fields.extend(string_map(&update["fields"]));
                note.tags = string_list(&update["tags"]);
                Ok(Value::Null)
            }
            other => Err(format!("unsupported action: {}", other)),
        }
    }
}

/// One piece of an Anki field search value.
#[derive(Debug, Clone, Copy)]
enum Token {
    Literal(char),
    /// `_`
    AnyOne,
    /// `*`
    AnyRun,
}

struct IdPattern(Vec<Token>);

impl IdPattern {
    fn matches(&self, value: &str) -> bool {
        let chars: Vec<char> = value.chars().collect();
        match_from(&self.0, &chars)
    }
}

fn match_from(tokens: &[Token], chars: &[char]) -> bool {
    match tokens.split_first() {
        None => chars.is_empty(),
        Some((Token::AnyRun, rest)) => (0..=chars.len()).any(|i| match_from(rest, &chars[i..])),
        Some((Token::AnyOne, rest)) => !chars.is_empty() && match_from(rest, &chars[1..]),
        Some((Token::Literal(c), rest)) => chars.first() == Some(c) && match_from(rest, &chars[1..]),
    }
}

/// Parse an `id:` search the way Anki does: an unquoted term ends at the
/// first space, `_` and `*` are wildcards unless escaped with a backslash.
fn id_pattern(query: &str) -> Option<IdPattern> {
    let term = match query.strip_prefix('"') {
        Some(quoted) => quoted.strip_suffix('"')?,
        None => query.split(' ').next()?,
    };
    let value = term.strip_prefix("id:")?;

    let mut tokens = Vec::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => Token::Literal(chars.next()?),
            '_' => Token::AnyOne,
            '*' => Token::AnyRun,
            other => Token::Literal(other),
        });
    }
    Some(IdPattern(tokens))
}

fn string_map(value: &Value) -> HashMap<String, String> {
    value
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

struct Shared {
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

async fn handle(State(shared): State<Arc<Shared>>, Json(request): Json<Value>) -> Response {
    let current = shared.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    shared.max_in_flight.fetch_max(current, Ordering::SeqCst);

    let delay = shared.state.lock().unwrap().delay;
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let response = respond(&mut shared.state.lock().unwrap(), &request);
    shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

fn respond(state: &mut MockState, request: &Value) -> Response {
    let action = request["action"].as_str().unwrap_or_default().to_string();
    state.calls.push(action.clone());

    if state.fail_next > 0 {
        state.fail_next -= 1;
        return (StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
    }
    if state.malformed {
        return Json(json!({"result": null, "error": null, "extra": true})).into_response();
    }

    let body = match state.apply(&action, &request["params"]) {
        Ok(result) => json!({"result": result, "error": null}),
        Err(error) => json!({"result": null, "error": error}),
    };
    Json(body).into_response()
}

/// Running mock AnkiConnect server.
pub struct MockAnki {
    shared: Arc<Shared>,
    pub url: String,
}

impl MockAnki {
    /// Start a mock on a random local port.
    pub async fn start() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(MockState::default()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/", post(handle))
            .with_state(Arc::clone(&shared));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock listener");
        let addr = listener.local_addr().expect("mock address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self {
            shared,
            url: format!("http://{}", addr),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.shared.state.lock().unwrap()
    }

    /// Number of requests received for `action`.
    pub fn calls(&self, action: &str) -> usize {
        self.state().calls.iter().filter(|a| *a == action).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn notes(&self) -> Vec<MockNote> {
        self.state().notes.clone()
    }

    pub fn note_for(&self, card_id: &str) -> Option<MockNote> {
        self.notes()
            .into_iter()
            .find(|n| n.fields.get("id").map(String::as_str) == Some(card_id))
    }

    pub fn client(&self) -> AnkiClient {
        AnkiClient::new(&self.url, Duration::from_secs(5), fast_retry(3)).expect("client")
    }

    pub fn engine(&self, concurrency: usize) -> SyncEngine {
        SyncEngine::new(self.client(), SyncConfig { concurrency })
    }
}

/// Retry policy with millisecond delays.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        multiplier: 2.0,
        jitter: false,
    }
}

/// Build a card in `deck` (segments joined under the first).
pub fn card(id: &str, deck: &[&str], question: &str) -> Card {
    let mut path = DeckPath::root(deck[0]).unwrap();
    for segment in &deck[1..] {
        path = path.child(segment).unwrap();
    }
    Card {
        id: id.to_string(),
        deck_path: path,
        question: question.to_string(),
        answer: format!("answer to {}", question),
        source_ref: Some("obsidian://open?path=notes.md".to_string()),
        tags: Vec::new(),
    }
}

/// Markdown text for `count` cards under `# Topic`.
pub fn notes_md(count: usize) -> String {
    let mut text = String::from("# Topic\n\n");
    for i in 1..=count {
        text.push_str(&format!(
            "### Card {i}\n#### Question\n```\nQuestion {i}?\n```\n#### Answer\n```\nAnswer {i}\n```\n\n"
        ));
    }
    text
}
