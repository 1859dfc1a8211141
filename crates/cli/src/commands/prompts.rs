//! Prompts command handler.

use clap::Args;
use codechat_core::{config::AppConfig, AppResult};
use codechat_prompt::{list_prompts, PromptSource};

/// List available prompt definitions
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl PromptsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing prompts command");

        let prompts = list_prompts(&config.workspace)?;

        if self.json {
            let output: Vec<serde_json::Value> = prompts
                .iter()
                .map(|(id, source)| serde_json::json!({ "id": id, "source": source_label(*source) }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            for (id, source) in &prompts {
                println!("{:<32} {}", id, source_label(*source));
            }
        }

        Ok(())
    }
}

fn source_label(source: PromptSource) -> &'static str {
    match source {
        PromptSource::Builtin => "builtin",
        PromptSource::Workspace => "workspace",
    }
}
