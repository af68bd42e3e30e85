use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = err.to_string().to_lowercase();

    if msg.contains("api key not found") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Set your API key with:");
        eprintln!("  {} export DASHSCOPE_API_KEY=<value>", "$".dimmed());
    }

    if msg.contains("notes_root is not configured") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Pass the notes directory explicitly:");
        eprintln!("  {} notewise cleanup --notes-root <dir>", "$".dimmed());
    }

    if msg.contains("connection refused") || msg.contains("network") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check your internet connection and try again.");
    }

    std::process::exit(1);
}
