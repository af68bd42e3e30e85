use anyhow::Result;
use notewise_memory::StreamEvent;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let output = serde_json::to_string_pretty(value)?;
    println!("{output}");
    Ok(())
}

/// Stream events go out one compact object per line.
pub fn print_event(event: &StreamEvent) {
    println!("{}", event.to_json_line());
}
