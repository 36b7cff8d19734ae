//! Compiled prompt set.
//!
//! All templates are registered once, in strict mode, and probed with
//! sentinel values so that a template which fails to render or drops a
//! required variable is rejected when the set is built. Rendering at request
//! time only substitutes caller data; it never re-parses a template.

use crate::builtin::{builtin_prompt, BUILTIN_IDS};
use crate::loader::load_prompt;
use crate::types::PromptDefinition;
use handlebars::Handlebars;
use scout_core::{AppError, AppResult};
use std::collections::HashMap;
use std::path::Path;

/// Registered, validated templates shared by every request.
#[derive(Debug)]
pub struct PromptSet {
    registry: Handlebars<'static>,
}

impl PromptSet {
    /// Compile the built-in prompts.
    pub fn builtin() -> AppResult<Self> {
        let definitions = BUILTIN_IDS
            .iter()
            .map(|id| builtin_prompt(id))
            .collect::<AppResult<Vec<_>>>()?;
        Self::from_definitions(definitions)
    }

    /// Compile the prompts for a workspace, honoring `.scout/prompts/` overrides.
    pub fn load(workspace_path: &Path) -> AppResult<Self> {
        let definitions = BUILTIN_IDS
            .iter()
            .map(|id| load_prompt(workspace_path, id))
            .collect::<AppResult<Vec<_>>>()?;
        Self::from_definitions(definitions)
    }

    fn from_definitions(definitions: Vec<PromptDefinition>) -> AppResult<Self> {
        let mut registry = Handlebars::new();

        // Plain text output; strict mode turns a missing variable into an error
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(true);

        for def in &definitions {
            registry
                .register_template_string(&def.id, &def.template)
                .map_err(|e| {
                    AppError::Prompt(format!("Failed to register template '{}': {}", def.id, e))
                })?;
        }

        let set = Self { registry };
        for def in &definitions {
            set.probe(def)?;
        }

        tracing::debug!("Compiled {} prompt templates", definitions.len());
        Ok(set)
    }

    /// Render with sentinel values and check every required variable lands in the output.
    fn probe(&self, def: &PromptDefinition) -> AppResult<()> {
        let required = builtin_prompt(&def.id)
            .map(|builtin| builtin.variables)
            .unwrap_or_else(|_| def.variables.clone());

        let variables: HashMap<String, String> = required
            .iter()
            .map(|name| (name.clone(), format!("\u{1}{}\u{1}", name)))
            .collect();

        let rendered = self.render(&def.id, &variables)?;

        for (name, sentinel) in &variables {
            if !rendered.contains(sentinel.as_str()) {
                return Err(AppError::Prompt(format!(
                    "Template '{}' does not embed required variable '{}'",
                    def.id, name
                )));
            }
        }

        Ok(())
    }

    /// Render a registered template.
    pub fn render(&self, id: &str, variables: &HashMap<String, String>) -> AppResult<String> {
        self.registry
            .render(id, variables)
            .map_err(|e| AppError::Prompt(format!("Failed to render template '{}': {}", id, e)))
    }

    /// Convenience for callers building variables from string pairs.
    pub fn render_with(&self, id: &str, pairs: &[(&str, &str)]) -> AppResult<String> {
        let variables: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.render(id, &variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::{CHAT_SYSTEM, GATE_SOURCE};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_set_compiles() {
        assert!(PromptSet::builtin().is_ok());
    }

    #[test]
    fn test_gate_prompt_embeds_source_and_query_verbatim() {
        let prompts = PromptSet::builtin().unwrap();
        let query = r#"What's {"include": "yes"} doing in {{my}} question?"#;
        let rendered = prompts
            .render_with(
                GATE_SOURCE,
                &[("source", "tasks"), ("description", "Project tasks"), ("query", query)],
            )
            .unwrap();

        assert!(rendered.contains("'tasks'"));
        assert!(rendered.contains(query));
    }

    #[test]
    fn test_strict_mode_rejects_missing_variable() {
        let prompts = PromptSet::builtin().unwrap();
        let result = prompts.render_with(GATE_SOURCE, &[("source", "tasks")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_system_prompt_renders_without_variables() {
        let prompts = PromptSet::builtin().unwrap();
        let rendered = prompts.render(CHAT_SYSTEM, &HashMap::new()).unwrap();
        assert!(rendered.contains("project assistant"));
    }

    #[test]
    fn test_override_dropping_required_variable_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let prompts_dir = temp_dir.path().join(".scout/prompts");
        fs::create_dir_all(&prompts_dir).unwrap();
        fs::write(
            prompts_dir.join("gate.source.yml"),
            r#"
id: gate.source
title: Broken gate
apiVersion: "1.0"
variables: [source, description, query]
template: "Is {{source}} useful? {{description}}"
"#,
        )
        .unwrap();

        let err = PromptSet::load(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains("required variable 'query'"));
    }
}
