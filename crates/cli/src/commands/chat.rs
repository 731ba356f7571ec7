//! `docmind chat`: interactive or single-message chat.

use std::io::Write;

use docmind_agent::{ChatError, Services};
use docmind_core::message::ConversationTurn;
use docmind_core::request::ChatRequest;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct ChatOptions {
    pub session: String,
    pub user: String,
    pub model: Option<String>,
    pub web: bool,
}

pub async fn run(message: Option<String>, options: ChatOptions) -> Result<(), Box<dyn std::error::Error>> {
    let (config, services) = super::load_services().await?;
    let model = options.model.clone().unwrap_or_else(|| config.default_model.clone());

    if let Some(msg) = message {
        eprint!("  Thinking...");
        let result = ask(&services, &options, &model, &msg).await;
        eprint!("\r              \r");
        println!("{}", result?);
        return Ok(());
    }

    println!();
    println!("  DocMind, interactive mode");
    println!();
    println!("  Assistant: {}", config.assistant_name);
    println!("  Model:     {model}");
    println!("  User:      {}", options.user);
    println!("  Session:   {}", options.session);
    println!("  Web:       {}", if options.web { "requested" } else { "off" });
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' to quit. Ctrl+C cancels a running answer.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let result = ask(&services, &options, &model, query).await;
        eprint!("\r     \r");

        match result {
            Ok(answer) => {
                println!();
                for line in answer.lines() {
                    println!("  {} > {line}", config.assistant_name);
                }
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// One turn: answer the query, then record both sides in the session history.
async fn ask(
    services: &Services,
    options: &ChatOptions,
    model: &str,
    query: &str,
) -> Result<String, ChatError> {
    let request = ChatRequest {
        query: query.to_string(),
        session_id: options.session.clone(),
        user_id: options.user.clone(),
        model_name: model.to_string(),
        use_web: options.web,
    };

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let result = services.chat.handle(&request, &cancel).await;
    watcher.abort();

    let answer = result?.response;
    record_turn(services, &options.session, query, &answer).await;
    Ok(answer)
}

async fn record_turn(services: &Services, session: &str, query: &str, answer: &str) {
    let history = services.chat.history();
    for turn in [ConversationTurn::user(query), ConversationTurn::assistant(answer)] {
        if let Err(e) = history.append(session, turn).await {
            warn!(session_id = session, error = %e, "Failed to save chat history");
            return;
        }
    }
}
