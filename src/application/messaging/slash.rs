//! Slash-command schema

use serde::Serialize;

use super::command::CommandMeta;
use crate::domain::entities::OptionKind;

/// Platform limit for descriptions
const DESCRIPTION_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlashOption {
    pub name: String,
    pub description: String,
    pub kind: OptionKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SlashOption>,
}

impl SlashOption {
    pub fn new(name: impl Into<String>, description: impl Into<String>, kind: OptionKind) -> Self {
        Self {
            name: name.into(),
            description: clip(description.into()),
            kind,
            required: false,
            options: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_option(mut self, option: SlashOption) -> Self {
        self.options.push(option);
        self
    }
}

/// Schema registered with the platform for one command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlashCommand {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SlashOption>,
}

impl SlashCommand {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: clip(description.into()),
            options: Vec::new(),
        }
    }

    /// Canonical alias and short description, no options
    pub fn from_meta(meta: &CommandMeta) -> Self {
        let description = if meta.short_description.is_empty() {
            "No description".to_string()
        } else {
            meta.short_description.clone()
        };
        Self::new(meta.name().to_lowercase(), description)
    }

    pub fn with_option(mut self, option: SlashOption) -> Self {
        self.options.push(option);
        self
    }
}

fn clip(text: String) -> String {
    if text.chars().count() <= DESCRIPTION_LIMIT {
        return text;
    }
    text.chars().take(DESCRIPTION_LIMIT).collect()
}
