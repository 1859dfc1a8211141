//! Ask command handler.
//!
//! Answers one question from the indexed code, optionally recording and
//! scoring the answer.

use crate::pipeline::ChatPipeline;
use clap::Args;
use codechat_core::{config::AppConfig, AppResult};
use codechat_eval::LeaderboardRow;
use std::io::Write;

/// Ask a question about the indexed code
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Record the query and print feedback scores
    #[arg(short, long)]
    pub evaluate: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig, pipeline: &ChatPipeline) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let answer = pipeline.run(&self.question, self.evaluate).await?;

        let leaderboard = if self.evaluate {
            pipeline.session().wait_for_feedback().await?;
            Some(pipeline.session().leaderboard())
        } else {
            None
        };

        let mut stdout = std::io::stdout().lock();
        if self.json {
            let output = serde_json::json!({
                "answer": answer,
                "model": config.model,
                "provider": config.provider,
                "records": leaderboard.as_ref().map(|_| pipeline.session().records()),
                "leaderboard": leaderboard,
            });
            writeln!(stdout, "{}", serde_json::to_string_pretty(&output)?)?;
        } else {
            writeln!(stdout, "{}", answer)?;
            if let Some(rows) = &leaderboard {
                writeln!(stdout)?;
                write_leaderboard(&mut stdout, rows)?;
            }
        }

        Ok(())
    }
}

/// Render leaderboard rows as an aligned text table.
pub fn write_leaderboard<W: Write>(out: &mut W, rows: &[LeaderboardRow]) -> AppResult<()> {
    let mut metrics: Vec<&str> = rows
        .iter()
        .flat_map(|row| row.metrics.keys().map(String::as_str))
        .collect();
    metrics.sort_unstable();
    metrics.dedup();

    write!(out, "{:<12} {:>7}", "app", "records")?;
    for metric in &metrics {
        write!(out, " {:>18}", metric)?;
    }
    writeln!(out, " {:>12}", "latency (ms)")?;

    for row in rows {
        write!(out, "{:<12} {:>7}", row.app_id, row.records)?;
        for metric in &metrics {
            match row.metrics.get(*metric) {
                Some(score) => write!(out, " {:>18.2}", score)?,
                None => write!(out, " {:>18}", "-")?,
            }
        }
        writeln!(out, " {:>12.0}", row.mean_latency_ms)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_write_leaderboard() {
        let mut metrics = BTreeMap::new();
        metrics.insert("Answer Relevance".to_string(), 1.0);
        metrics.insert("Groundedness".to_string(), 0.5);
        let rows = vec![LeaderboardRow {
            app_id: "RAG v1".to_string(),
            records: 2,
            metrics,
            mean_latency_ms: 1234.0,
        }];

        let mut out = Vec::new();
        write_leaderboard(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Answer Relevance"));
        assert!(lines[0].find("Answer Relevance") < lines[0].find("Groundedness"));
        assert!(lines[1].starts_with("RAG v1"));
        assert!(lines[1].contains("1.00"));
        assert!(lines[1].contains("0.50"));
        assert!(lines[1].contains("1234"));
    }
}
