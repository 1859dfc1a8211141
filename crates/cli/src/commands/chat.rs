//! Chat command handler.
//!
//! Reads questions line by line and answers each with a timestamp. A failed
//! question is reported and the loop continues.

use crate::commands::ask::write_leaderboard;
use crate::pipeline::ChatPipeline;
use clap::Args;
use codechat_core::AppResult;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

const QUIT: &str = "/quit";

/// Interactive question loop over stdin
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Record every query and print feedback scores on exit
    #[arg(short, long)]
    pub evaluate: bool,
}

impl ChatCommand {
    /// Execute the chat command.
    pub async fn execute(&self, pipeline: &ChatPipeline) -> AppResult<()> {
        tracing::info!("Executing chat command");

        eprintln!("Ask about the indexed code. Type {} or press Ctrl-D to leave.", QUIT);
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = std::io::stdout();

        chat_loop(pipeline, self.evaluate, stdin, &mut stdout).await?;

        if self.evaluate {
            pipeline.session().wait_for_feedback().await?;
            writeln!(stdout)?;
            write_leaderboard(&mut stdout, &pipeline.session().leaderboard())?;
        }

        Ok(())
    }
}

/// Answer every line of `input` until EOF or `/quit`.
pub async fn chat_loop<R, W>(
    pipeline: &ChatPipeline,
    evaluate: bool,
    input: R,
    out: &mut W,
) -> AppResult<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut answered = 0;

    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == QUIT {
            break;
        }

        writeln!(out, "[{}] You: {}", timestamp(), question)?;
        match pipeline.run(question, evaluate).await {
            Ok(answer) => {
                writeln!(out, "[{}] codechat: {}", timestamp(), answer)?;
                answered += 1;
            }
            Err(err) => {
                tracing::error!(error = %err, "Question failed");
                writeln!(out, "[{}] codechat: An error occurred: {}", timestamp(), err)?;
            }
        }
        out.flush()?;
    }

    Ok(answered)
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
