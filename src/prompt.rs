//! Chat prompt templates with `{name}` placeholders.
//!
//! `{{` and `}}` render as literal braces, so templates can describe JSON
//! output formats.

use crate::model::{ChatMessage, Role};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing value for template variable `{0}`")]
    MissingVariable(String),
    #[error("unclosed `{{` at byte {offset}")]
    Unclosed { offset: usize },
}

const ANSWER_SYSTEM: &str = "You are a helpful assistant. \
Reply with a single JSON object of the form {{\"answer\": \"<your answer>\"}} \
and nothing else.";

#[derive(Clone, Debug)]
pub struct PromptTemplate {
    messages: Vec<(Role, String)>,
}

enum Piece<'a> {
    Text(&'a str),
    Var(&'a str),
}

impl PromptTemplate {
    pub fn new(messages: Vec<(Role, String)>) -> Self {
        Self { messages }
    }

    /// System instruction asking for `{"answer": ...}` plus the user's `{question}`.
    pub fn answer_json() -> Self {
        Self::new(vec![
            (Role::System, ANSWER_SYSTEM.to_string()),
            (Role::User, "{question}".to_string()),
        ])
    }

    /// Placeholder names in first-seen order.
    pub fn input_variables(&self) -> Result<Vec<String>, TemplateError> {
        let mut names: Vec<String> = Vec::new();
        for (_, text) in &self.messages {
            for piece in pieces(text)? {
                if let Piece::Var(name) = piece {
                    if !names.iter().any(|n| n == name) {
                        names.push(name.to_string());
                    }
                }
            }
        }
        Ok(names)
    }

    pub fn format(&self, vars: &HashMap<&str, &str>) -> Result<Vec<ChatMessage>, TemplateError> {
        self.messages
            .iter()
            .map(|(role, text)| {
                let mut out = String::with_capacity(text.len());
                for piece in pieces(text)? {
                    match piece {
                        Piece::Text(t) => out.push_str(t),
                        Piece::Var(name) => {
                            let value = vars
                                .get(name)
                                .ok_or_else(|| TemplateError::MissingVariable(name.to_string()))?;
                            out.push_str(value);
                        }
                    }
                }
                Ok(ChatMessage::new(*role, out))
            })
            .collect()
    }
}

fn pieces(text: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let mut out = Vec::new();
    let mut lit_start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, ch)) = chars.next() {
        match ch {
            '{' | '}' if chars.peek().map(|&(_, c)| c) == Some(ch) => {
                // doubled brace: keep one, skip the other
                out.push(Piece::Text(&text[lit_start..=i]));
                chars.next();
                lit_start = i + 2;
            }
            '{' => {
                out.push(Piece::Text(&text[lit_start..i]));
                let close = text[i..].find('}').ok_or(TemplateError::Unclosed { offset: i })?;
                out.push(Piece::Var(text[i + 1..i + close].trim()));
                while chars.peek().is_some_and(|&(j, _)| j <= i + close) {
                    chars.next();
                }
                lit_start = i + close + 1;
            }
            _ => {}
        }
    }
    out.push(Piece::Text(&text[lit_start..]));
    Ok(out)
}
