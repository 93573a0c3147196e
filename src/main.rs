use anyhow::{Context, Result};
use chatlog::cli::{Cli, Commands};
use chatlog::{
    open_store, utils, ChatMessage, CompletionRequest, HistoryAdapter, HistoryStore,
    MemoryRegistry, OpenAIClient, Settings,
};
use clap::Parser;
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new().context("Failed to load settings")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    let cli = Cli::parse();

    let registry = Arc::new(MemoryRegistry::new());
    let store = open_store(&settings.store, &registry)
        .await
        .context("Failed to open history store")?;

    match cli.command {
        Commands::Chat { prompt, system } => {
            let adapter = build_adapter(&settings, store, &cli.session_id, &cli.user_id)?;
            handle_chat(&adapter, &settings, prompt, system).await
        }
        Commands::Interactive { system } => {
            let adapter = build_adapter(&settings, store, &cli.session_id, &cli.user_id)?;
            handle_interactive(&adapter, &settings, system).await
        }
        Commands::History { json } => handle_history(store.as_ref(), &cli.session_id, json).await,
    }
}

fn build_adapter(
    settings: &Settings,
    store: Arc<dyn HistoryStore>,
    session_id: &str,
    user_id: &str,
) -> Result<HistoryAdapter> {
    let api_key = Settings::api_key()?;
    let client = OpenAIClient::new(api_key, settings.llm.base_url.clone());
    Ok(HistoryAdapter::new(Arc::new(client), store, session_id, user_id))
}

fn build_request(settings: &Settings, prompt: &str, system: Option<&str>) -> CompletionRequest {
    let mut messages = Vec::new();
    if let Some(sys) = system {
        messages.push(ChatMessage::system(sys));
    }
    messages.push(ChatMessage::user(prompt));

    let mut request = CompletionRequest::new(settings.llm.model.clone(), messages);
    request.max_tokens = settings.llm.max_tokens;
    request.temperature = settings.llm.temperature;
    request
}

async fn handle_chat(
    adapter: &HistoryAdapter,
    settings: &Settings,
    prompt: String,
    system: Option<String>,
) -> Result<()> {
    utils::display::print_info("Sending request...");

    let request = build_request(settings, &prompt, system.as_deref());
    let response = adapter.create(request, None).await?;

    println!();
    utils::display::print_reply(response.reply());
    utils::display::print_info(&format!(
        "\nSession '{}' now holds {} events",
        response.session_id,
        response.history.len()
    ));
    Ok(())
}

async fn handle_interactive(
    adapter: &HistoryAdapter,
    settings: &Settings,
    system: Option<String>,
) -> Result<()> {
    utils::display::print_header(&format!("Interactive Mode (session '{}')", adapter.session_id()));
    utils::display::print_info("Type your messages (type 'exit' or Ctrl+C to quit)\n");

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        utils::display::print_prompt("You: ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        let request = build_request(settings, input, system.as_deref());
        match adapter.create(request, None).await {
            Ok(response) => utils::display::print_reply(response.reply()),
            Err(e) => utils::display::print_error(&format!("Error: {}", e)),
        }
        println!();
    }

    Ok(())
}

async fn handle_history(store: &dyn HistoryStore, session_id: &str, json: bool) -> Result<()> {
    let history = store
        .get_session_history(session_id)
        .await
        .context("Failed to read session history")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    utils::display::print_header(&format!("Session '{}' ({} events)", session_id, history.len()));
    for event in &history {
        utils::display::print_event(event);
    }
    Ok(())
}
