use std::io::Write;

use anyhow::{Context, Result, bail};
use futures::StreamExt;
use notewise_memory::{NotewiseConfig, NotewiseRuntime, StreamEvent, TaskParams};

use crate::cli::RunArgs;
use crate::output::OutputFormat;
use crate::output::json::print_event;

pub async fn run(config: &NotewiseConfig, args: RunArgs, format: OutputFormat) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read document {}", args.file.display()))?;
    let params = build_params(&args, content);

    let runtime = NotewiseRuntime::from_config(config)?;
    let mut events = runtime.pipeline().stream(&args.task, params);
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        if format.is_json() {
            print_event(&event);
        }
        match event {
            StreamEvent::Chunk { content } => {
                if !format.is_json() {
                    write!(stdout, "{content}")?;
                    stdout.flush()?;
                }
            }
            StreamEvent::Complete => {
                if !format.is_json() {
                    writeln!(stdout)?;
                }
            }
            StreamEvent::Error { message } => bail!(message),
        }
    }
    Ok(())
}

fn build_params(args: &RunArgs, content: String) -> TaskParams {
    let mut params = TaskParams::new();
    params.insert("content".to_string(), content);
    params.insert("filename".to_string(), args.file.to_string_lossy().into_owned());

    if let Some(question) = &args.question {
        params.insert("question".to_string(), question.clone());
    }
    if let Some(requirement) = &args.requirement {
        params.insert("requirement".to_string(), requirement.clone());
    }
    params
}
