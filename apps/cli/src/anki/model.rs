//! Note type and note payloads sent to AnkiConnect.

use ankify_core::{markdown_to_html, Card};
use serde::Serialize;

/// Name of the note type every card is stored as.
pub const MODEL_NAME: &str = "ObsidianCard";

const FIELDS: [&str; 5] = ["id", "question", "answer", "comments", "obsidian_url"];

const FRONT_TEMPLATE: &str = "<div class='ankify-question'>{{question}}</div>";

const BACK_TEMPLATE: &str = "{{FrontSide}}\n\n<hr id=answer>\n\n\
<div class='ankify-answer'>{{answer}}</div>\n\n<hr>\n\n\
<div class='ankify-comments'>{{comments}}</div>\n\n<hr>\n\n\
<div class='ankify-obsidian-link'><a href='{{obsidian_url}}'>Open in Obsidian</a></div>\n\n\
<div class='ankify-card-id' style='display:none;'>{{id}}</div>";

const CARD_CSS: &str = r#".card {
    font-family: 'Arial', sans-serif;
    font-size: 16px;
    text-align: left;
    color: #333;
    background-color: #f9f9f9;
    padding: 20px;
    max-width: 800px;
    margin: 0 auto;
    box-shadow: 0 2px 5px rgba(0, 0, 0, 0.1);
    border-radius: 8px;
}

.ankify-question {
    font-size: 1.2em;
    font-weight: bold;
    color: #2c3e50;
    margin-bottom: 15px;
}

.ankify-answer {
    color: #27ae60;
    margin-bottom: 15px;
}

.ankify-comments {
    font-size: 0.9em;
    color: #7f8c8d;
    font-style: italic;
    margin-bottom: 15px;
}

.ankify-obsidian-link a {
    color: #6b7cff;
    text-decoration: none;
    font-weight: bold;
}

.ankify-obsidian-link a:hover {
    text-decoration: underline;
}

pre {
    background: #272822;
    color: #f8f8f2;
    padding: 10px;
    border-radius: 4px;
    overflow-x: auto;
}

hr {
    border: 0;
    height: 1px;
    background-color: #ddd;
    margin: 15px 0;
}
"#;

/// `createModel` parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteModel {
    pub model_name: &'static str,
    pub in_order_fields: Vec<&'static str>,
    pub css: &'static str,
    pub is_cloze: bool,
    pub card_templates: Vec<CardTemplate>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CardTemplate {
    pub name: &'static str,
    pub front: &'static str,
    pub back: &'static str,
}

impl NoteModel {
    pub fn obsidian_card() -> Self {
        Self {
            model_name: MODEL_NAME,
            in_order_fields: FIELDS.to_vec(),
            css: CARD_CSS,
            is_cloze: false,
            card_templates: vec![CardTemplate {
                name: "Card",
                front: FRONT_TEMPLATE,
                back: BACK_TEMPLATE,
            }],
        }
    }
}

/// All fields, written once when the note is created.
#[derive(Debug, Clone, Serialize)]
pub struct NoteFields {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub comments: String,
    pub obsidian_url: String,
}

/// Fields owned by the markdown file. `comments` belongs to the user and
/// `id`/`obsidian_url` never change, so updates carry only these two.
#[derive(Debug, Clone, Serialize)]
pub struct ContentFields {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOptions {
    pub allow_duplicate: bool,
    pub duplicate_scope: &'static str,
}

/// `addNote` note payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNote {
    pub deck_name: String,
    pub model_name: &'static str,
    pub fields: NoteFields,
    pub options: AddOptions,
    pub tags: Vec<String>,
}

impl NewNote {
    pub fn from_card(card: &Card) -> Self {
        Self {
            deck_name: card.deck_path.materialize(),
            model_name: MODEL_NAME,
            fields: NoteFields {
                id: card.id.clone(),
                question: markdown_to_html(&card.question),
                answer: markdown_to_html(&card.answer),
                comments: String::new(),
                obsidian_url: card.source_ref.clone().unwrap_or_default(),
            },
            options: AddOptions {
                allow_duplicate: false,
                duplicate_scope: "deck",
            },
            tags: card.tags.clone(),
        }
    }
}

/// `updateNote` note payload.
#[derive(Debug, Clone, Serialize)]
pub struct NoteUpdate {
    pub id: i64,
    pub fields: ContentFields,
    pub tags: Vec<String>,
}

impl NoteUpdate {
    pub fn from_card(note_id: i64, card: &Card) -> Self {
        Self {
            id: note_id,
            fields: ContentFields {
                question: markdown_to_html(&card.question),
                answer: markdown_to_html(&card.answer),
            },
            tags: card.tags.clone(),
        }
    }
}
