use crate::core::llm::Role;
use crate::storage::Message;
use colored::*;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.len()).bright_cyan());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_prompt(text: &str) {
    print!("{}", text.yellow().bold());
}

pub fn print_reply(text: &str) {
    println!("{} {}", "Assistant:".green().bold(), text);
}

/// One transcript line: `[created_at] role: content`
pub fn print_event(event: &Message) {
    let role = match event.role {
        Role::User => event.role.to_string().yellow(),
        Role::Assistant => event.role.to_string().green(),
        Role::System => event.role.to_string().magenta(),
    };
    println!(
        "{} {}: {}",
        format!("[{}]", event.created_at).dimmed(),
        role.bold(),
        event.content
    );
}
