//! Study-set export formats
//!
//! Anki "front<TAB>back" text import, pretty-printed JSON, and reading a
//! JSON export back as a fresh study set.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::sanitize::sanitize_items;
use crate::types::{ItemKind, StudyItem, StudySet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("failed to parse JSON, the file may be corrupt: {0}")]
    Syntax(String),
    #[error("invalid JSON format: missing required '{0}' field")]
    MissingField(&'static str),
}

fn anki_back(item: &StudyItem) -> String {
    let mut back = match &item.kind {
        ItemKind::Flashcard { answer } | ItemKind::FreeResponse { answer } | ItemKind::CaseStudy { answer } => {
            answer.clone()
        }
        ItemKind::Mcq {
            options,
            correct_answer_index,
        } => {
            let mut html = String::from("<ul>");
            for (index, option) in options.iter().enumerate() {
                let letter = option_letter(index);
                if index == *correct_answer_index {
                    html.push_str(&format!("<li><b>{letter}. {option} (Correct)</b></li>"));
                } else {
                    html.push_str(&format!("<li>{letter}. {option}</li>"));
                }
            }
            html.push_str("</ul>");
            html
        }
        ItemKind::TrueFalse { correct_answer } => {
            let label = if *correct_answer { "Vrai" } else { "Faux" };
            label.to_string()
        }
    };

    if let Some(explanation) = item.explanation.as_deref().filter(|e| !e.is_empty()) {
        back.push_str("<br><hr><br><b>Explanation:</b> ");
        back.push_str(explanation);
    }
    back
}

/// A, B, ... Z, then continues past Z in code-point order.
fn option_letter(index: usize) -> char {
    u32::try_from(index)
        .ok()
        .and_then(|i| char::from_u32('A' as u32 + i))
        .unwrap_or('?')
}

/// One Anki card per line, fields separated by a tab.
pub fn format_anki_txt(items: &[StudyItem]) -> String {
    items
        .iter()
        .map(|item| format!("{}\t{}", item.question.replace('\n', "<br>"), anki_back(item)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_json(set: &StudySet) -> serde_json::Result<String> {
    serde_json::to_string_pretty(set)
}

/// Reads an exported set as a new one: fresh set and item ids, an
/// "(Imported)" title, and unscheduled items. Malformed items are skipped.
pub fn parse_json(raw: &str, now: DateTime<Utc>) -> Result<StudySet, ImportError> {
    let data: Value = serde_json::from_str(raw).map_err(|err| ImportError::Syntax(err.to_string()))?;

    let present = |key: &str| data.get(key).filter(|v| !v.is_null() && v.as_str() != Some(""));
    present("id").ok_or(ImportError::MissingField("id"))?;
    let title = present("title")
        .and_then(Value::as_str)
        .ok_or(ImportError::MissingField("title"))?;
    let entries = data
        .get("items")
        .filter(|v| v.is_array())
        .ok_or(ImportError::MissingField("items"))?;

    let millis = now.timestamp_millis();
    let items = sanitize_items(entries)
        .into_iter()
        .enumerate()
        .map(|(index, mut item)| {
            item.id = format!("{}-imported-{millis}-{index}", item.kind.type_name());
            item.reset_schedule();
            item
        })
        .collect();

    Ok(StudySet {
        id: format!("set-imported-{millis}"),
        title: format!("{title} (Imported)"),
        items,
        created_at: now,
        source_text: data.get("sourceText").and_then(Value::as_str).map(str::to_string),
    })
}
