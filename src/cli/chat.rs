// src/cli/chat.rs - Interactive chat REPL

use std::io::Write;
use std::sync::Arc;

use crate::chat::keys::{self, Key};
use crate::chat::{ChatBackend, ChatMessage, ChatRole, ChatSession, DirectBackend, HttpChatBackend};
use crate::infra::config::{ChatMode, Config};
use crate::infra::paths;
use crate::preferences::{FileKeyValueStore, PreferenceStore};
use crate::provider::openai_compat::OpenAICompatProvider;
use crate::provider::retry::RetryProvider;
use crate::provider::ModelProvider;

/// Run the interactive chat REPL.
pub async fn run_chat(config: &Config, backend_url: Option<String>, direct: bool) -> anyhow::Result<()> {
    let direct = direct || config.chat.mode == ChatMode::Direct;
    let streaming = direct && config.chat.stream;
    let backend = build_backend(config, backend_url, direct, streaming)?;

    let mut session = ChatSession::new(config.chat.request_timeout());
    session.load_history(backend.as_ref()).await;

    eprintln!(
        "caigentan v{} | Enter sends, end a line with \\ for a newline | /clear, /history, /quit\n",
        env!("CARGO_PKG_VERSION"),
    );
    print_transcript(session.messages());
    print_error(&session);

    while let Some(line) = read_line() {
        let (text, modifiers) = keys::classify_line(&line);

        if session.input().is_empty() && !modifiers.shift {
            match text.trim() {
                "/quit" | "/exit" | "quit" | "exit" => break,
                "/history" => {
                    print_transcript(session.messages());
                    continue;
                }
                "/clear" => {
                    clear(&mut session, backend.as_ref()).await;
                    continue;
                }
                _ => {}
            }
        }

        let mut buffer = session.input().to_string();
        buffer.push_str(text);

        let outcome = keys::on_key_down(Key::Enter, modifiers);
        if !outcome.prevent_default {
            buffer.push('\n');
        }
        session.set_input(buffer);
        if !outcome.submit {
            continue;
        }

        let before = session.messages().len();
        if !session.can_submit() {
            session.set_input("");
            continue;
        }
        session.submit(backend.as_ref()).await;

        if streaming {
            println!();
        } else if let Some(reply) = session.messages()[before..]
            .iter()
            .find(|m| m.role == ChatRole::Assistant)
        {
            println!("{}\n", reply.content);
        }
        print_error(&session);
    }

    Ok(())
}

fn build_backend(
    config: &Config,
    backend_url: Option<String>,
    direct: bool,
    streaming: bool,
) -> anyhow::Result<Box<dyn ChatBackend>> {
    if !direct {
        let url = backend_url.unwrap_or_else(|| config.chat.backend_url.clone());
        tracing::debug!(%url, "using chat backend");
        return Ok(Box::new(HttpChatBackend::new(url)));
    }

    let inner: Arc<dyn ModelProvider> = Arc::new(OpenAICompatProvider::from_config(&config.provider)?);
    let provider: Arc<dyn ModelProvider> = Arc::new(RetryProvider::with_max_retries(
        inner,
        config.provider.max_retries,
    ));

    let mut backend = DirectBackend::new(provider, config.provider.model.clone())
        .with_temperature(config.provider.temperature);

    // Staged preferences personalise the prompt when present.
    let staged = PreferenceStore::new(FileKeyValueStore::new(paths::local_storage_path()))
        .load_staged()
        .unwrap_or_else(|e| {
            tracing::warn!("Ignoring staged preferences: {e}");
            None
        });
    if let Some(record) = staged {
        backend = backend.with_preferences(&record);
    }

    if streaming {
        backend = backend.with_streaming(Arc::new(|delta: &str| {
            print!("{delta}");
            std::io::stdout().flush().ok();
        }));
    }
    Ok(Box::new(backend))
}

async fn clear(session: &mut ChatSession, backend: &dyn ChatBackend) {
    if !session.can_clear() {
        eprintln!("Nothing to clear.");
        return;
    }
    let attempted = session
        .clear_history(backend, |prompt| {
            inquire::Confirm::new(prompt)
                .with_default(false)
                .prompt()
                .unwrap_or(false)
        })
        .await;
    if attempted {
        if let Some(notice) = session.notice() {
            eprintln!("{notice}");
        }
        print_error(session);
    }
}

fn print_transcript(messages: &[ChatMessage]) {
    for message in messages {
        match message.role {
            ChatRole::User => println!("> {}", message.content),
            ChatRole::Assistant => println!("{}\n", message.content),
        }
    }
}

fn print_error(session: &ChatSession) {
    if let Some(error) = session.error_message() {
        eprintln!("[!] {error}");
    }
}

fn read_line() -> Option<String> {
    use std::io::{self, BufRead};

    print!("> ");
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line),
        Err(_) => None,
    }
}
