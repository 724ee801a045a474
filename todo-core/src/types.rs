//! Core data type definitions

use serde::{Deserialize, Serialize};

/// A single TODO item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub text: String,
    pub completed: bool,
}

impl Todo {
    pub fn new(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
        }
    }

    /// One-line rendering used by the listing tool
    pub fn render_line(&self) -> String {
        format!(
            "{}. {} [{}]",
            self.id,
            self.text,
            if self.completed { "x" } else { " " }
        )
    }
}
