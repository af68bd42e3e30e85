use anyhow::Result;
use notewise_memory::{SessionResolver, TaskParams};
use serde_json::json;

use crate::output::{OutputFormat, json::print_json};

pub fn run(task: &str, filename: &str, format: OutputFormat) -> Result<()> {
    let params = TaskParams::from([("filename".to_string(), filename.to_string())]);
    let session_id = SessionResolver::new().resolve(task, &params)?;

    if format.is_json() {
        return print_json(&json!({ "task": task, "session_id": session_id }));
    }
    println!("{session_id}");
    Ok(())
}
