//! Prompt templates for canvas queries
//!
//! The canvas sends a fixed instruction alongside the drawing. A handful of
//! templates are built in; the config picks one by id or supplies its own text.

use crate::config::CanvasConfig;
use serde::{Deserialize, Serialize};

/// Id of the template used when the config names none or an unknown one
pub const DEFAULT_PROMPT_ID: &str = "compare-drawings";

/// A prompt sent with a canvas snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    /// Unique identifier for the prompt
    pub id: String,
    /// Human-readable name
    pub name: String,
    pub text: String,
}

/// Get the built-in prompt templates
pub fn get_builtin_prompts() -> Vec<PromptTemplate> {
    vec![
        PromptTemplate {
            id: DEFAULT_PROMPT_ID.to_string(),
            name: "Compare Drawings".to_string(),
            text: "The image contains two drawings separated by one long dividing line. Judge which drawing is better from an artistic point of view. Answer \"left\" if the left drawing wins, otherwise \"right\", then explain why it is better.".to_string(),
        },
        PromptTemplate {
            id: "solve-math".to_string(),
            name: "Solve Math".to_string(),
            text: "The image contains a handwritten math problem. Solve it and give the answer with a short explanation of the steps.".to_string(),
        },
    ]
}

/// Get a built-in prompt by id
pub fn get_prompt_by_id(id: &str) -> Option<PromptTemplate> {
    get_builtin_prompts().into_iter().find(|p| p.id == id)
}

/// Prompt text to send for the given canvas settings
///
/// Custom text wins over `prompt_id`; an unknown id falls back to the default
/// template with a warning.
pub fn resolve_prompt(config: &CanvasConfig) -> String {
    if let Some(custom) = config.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        return custom.to_string();
    }

    match get_prompt_by_id(&config.prompt_id) {
        Some(prompt) => prompt.text,
        None => {
            tracing::warn!(
                "Unknown prompt id '{}', using '{}'",
                config.prompt_id,
                DEFAULT_PROMPT_ID
            );
            get_prompt_by_id(DEFAULT_PROMPT_ID)
                .map(|p| p.text)
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_are_unique() {
        let prompts = get_builtin_prompts();
        let mut ids: Vec<&str> = prompts.iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), prompts.len());
    }

    #[test]
    fn test_default_prompt_exists() {
        let prompt = get_prompt_by_id(DEFAULT_PROMPT_ID).unwrap();
        assert!(prompt.text.contains("left"));
    }

    #[test]
    fn test_resolve_default() {
        let config = CanvasConfig::default();
        assert_eq!(
            resolve_prompt(&config),
            get_prompt_by_id(DEFAULT_PROMPT_ID).unwrap().text
        );
    }

    #[test]
    fn test_resolve_by_id() {
        let config = CanvasConfig {
            prompt_id: "solve-math".to_string(),
            ..Default::default()
        };
        assert!(resolve_prompt(&config).contains("math problem"));
    }

    #[test]
    fn test_custom_prompt_overrides_id() {
        let config = CanvasConfig {
            prompt_id: "solve-math".to_string(),
            prompt: Some("Describe the drawing".to_string()),
            ..Default::default()
        };
        assert_eq!(resolve_prompt(&config), "Describe the drawing");
    }

    #[test]
    fn test_blank_custom_prompt_is_ignored() {
        let config = CanvasConfig {
            prompt: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            resolve_prompt(&config),
            get_prompt_by_id(DEFAULT_PROMPT_ID).unwrap().text
        );
    }

    #[test]
    fn test_unknown_id_falls_back() {
        let config = CanvasConfig {
            prompt_id: "no-such-prompt".to_string(),
            ..Default::default()
        };
        assert_eq!(
            resolve_prompt(&config),
            get_prompt_by_id(DEFAULT_PROMPT_ID).unwrap().text
        );
    }
}
