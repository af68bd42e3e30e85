//! Task kinds and their prompt templates.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use notewise_ai::Message;

use crate::error::{MemoryError, Result};

/// Business parameters of a request, keyed by field name.
pub type TaskParams = HashMap<String, String>;

const OPTIMIZE_SYSTEM: &str = include_str!("templates/optimize.md");
const ADVISE_SYSTEM: &str = include_str!("templates/advise.md");
const EDIT_SYSTEM: &str = include_str!("templates/edit.md");

const OPTIMIZE_HUMAN: &str = "Improve the layout and structure of the following Markdown document:

Document:
{content}

Return only the complete optimized document, without any extra explanation.";

const ADVISE_HUMAN: &str = "Document:
{content}

Question: {question}

Using the document and the question above, give a professional analysis and suggestions.";

const EDIT_HUMAN: &str = "Editing instructions:
{requirement}

Original document:
{content}

Edit the document according to the instructions and return only the complete edited Markdown.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Optimize,
    Advise,
    Edit,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [TaskKind::Optimize, TaskKind::Advise, TaskKind::Edit];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Optimize => "optimize",
            TaskKind::Advise => "advise",
            TaskKind::Edit => "edit",
        }
    }

    /// Whether requests of this kind carry a conversation across calls.
    pub fn has_memory(&self) -> bool {
        self.history_key().is_some()
    }

    /// Parameter holding the user turn that gets recorded in history.
    pub fn history_key(&self) -> Option<&'static str> {
        match self {
            TaskKind::Optimize => None,
            TaskKind::Advise => Some("question"),
            TaskKind::Edit => Some("requirement"),
        }
    }

    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            TaskKind::Optimize => &["content"],
            TaskKind::Advise => &["content", "question"],
            TaskKind::Edit => &["content", "requirement"],
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            TaskKind::Optimize => OPTIMIZE_SYSTEM.trim(),
            TaskKind::Advise => ADVISE_SYSTEM.trim(),
            TaskKind::Edit => EDIT_SYSTEM.trim(),
        }
    }

    fn human_template(&self) -> &'static str {
        match self {
            TaskKind::Optimize => OPTIMIZE_HUMAN,
            TaskKind::Advise => ADVISE_HUMAN,
            TaskKind::Edit => EDIT_HUMAN,
        }
    }

    /// Fail on the first required parameter that is absent.
    pub fn validate(&self, params: &TaskParams) -> Result<()> {
        match self
            .required_params()
            .iter()
            .find(|name| !params.contains_key(**name))
        {
            Some(name) => Err(MemoryError::MissingParameter((*name).to_string())),
            None => Ok(()),
        }
    }

    pub fn render_human(&self, params: &TaskParams) -> Result<String> {
        self.validate(params)?;
        render_template(self.human_template(), params)
    }

    pub fn system_message(&self) -> Message {
        Message::system(self.system_prompt())
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = MemoryError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "optimize" => Ok(TaskKind::Optimize),
            "advise" => Ok(TaskKind::Advise),
            "edit" => Ok(TaskKind::Edit),
            _ => Err(MemoryError::UnsupportedTask(value.to_string())),
        }
    }
}

/// Substitute `{name}` placeholders in one pass.
///
/// Substituted values are not scanned again, so a document containing
/// `{question}` is left as written.
fn render_template(template: &str, params: &TaskParams) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        output.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) if is_placeholder(&after[..end]) => {
                let name = &after[..end];
                let value = params
                    .get(name)
                    .ok_or_else(|| MemoryError::MissingParameter(name.to_string()))?;
                output.push_str(value);
                rest = &after[end + 1..];
            }
            _ => {
                output.push('{');
                rest = after;
            }
        }
    }
    output.push_str(rest);
    Ok(output)
}

fn is_placeholder(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
