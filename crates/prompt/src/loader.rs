//! Prompt loader for built-in and workspace YAML prompt definitions.
//!
//! Built-in prompts ship inside the binary. A workspace may override any of
//! them (or add new ones) with `.codechat/prompts/<id>.yml`.

use crate::types::PromptDefinition;
use codechat_core::{AppError, AppResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Prompt used by the completion generator.
pub const ANSWER_PROMPT_ID: &str = "rag.answer.default";

/// Prompt used to rate context relevance.
pub const CONTEXT_RELEVANCE_PROMPT_ID: &str = "feedback.context_relevance";

/// Prompt used to rate answer relevance.
pub const ANSWER_RELEVANCE_PROMPT_ID: &str = "feedback.answer_relevance";

/// Prompt used to judge groundedness with reasons.
pub const GROUNDEDNESS_PROMPT_ID: &str = "feedback.groundedness";

const BUILTIN_PROMPTS: [(&str, &str); 4] = [
    (
        ANSWER_PROMPT_ID,
        include_str!("../prompts/rag.answer.default.yml"),
    ),
    (
        CONTEXT_RELEVANCE_PROMPT_ID,
        include_str!("../prompts/feedback.context_relevance.yml"),
    ),
    (
        ANSWER_RELEVANCE_PROMPT_ID,
        include_str!("../prompts/feedback.answer_relevance.yml"),
    ),
    (
        GROUNDEDNESS_PROMPT_ID,
        include_str!("../prompts/feedback.groundedness.yml"),
    ),
];

/// Where a prompt definition comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSource {
    Builtin,
    Workspace,
}

/// Directory holding workspace prompt overrides.
pub fn prompts_dir(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".codechat/prompts")
}

/// Load a prompt definition by ID.
///
/// The workspace file `.codechat/prompts/<id>.yml` wins over a built-in
/// prompt of the same ID.
///
/// # Example
/// ```no_run
/// use codechat_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "rag.answer.default")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = prompts_dir(workspace_path).join(format!("{}.yml", prompt_id));

    if prompt_file.exists() {
        tracing::debug!("Loading prompt from: {:?}", prompt_file);

        let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
            AppError::Prompt(format!(
                "Failed to read prompt file {:?}: {}",
                prompt_file, e
            ))
        })?;

        let definition = parse_prompt(&contents, &prompt_file.display().to_string())?;
        tracing::info!("Loaded workspace prompt: {} ({})", definition.id, definition.title);
        return Ok(definition);
    }

    load_builtin(prompt_id)
}

/// Load a built-in prompt definition by ID.
pub fn load_builtin(prompt_id: &str) -> AppResult<PromptDefinition> {
    let (_, contents) = BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Prompt not found: {}", prompt_id)))?;

    parse_prompt(contents, prompt_id)
}

/// List all available prompt IDs with their source, sorted by ID.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<(String, PromptSource)>> {
    let mut prompts: BTreeMap<String, PromptSource> = BUILTIN_PROMPTS
        .iter()
        .map(|(id, _)| (id.to_string(), PromptSource::Builtin))
        .collect();

    let dir = prompts_dir(workspace_path);
    if dir.exists() {
        for entry in walkdir::WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompts.insert(stem.to_string(), PromptSource::Workspace);
                }
            }
        }
    }

    Ok(prompts.into_iter().collect())
}

fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;

    validate_prompt(&definition)?;

    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // Validate API version format (simple check)
    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
