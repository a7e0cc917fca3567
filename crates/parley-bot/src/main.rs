mod chat;
mod memory;
mod progress;
mod relay;
mod suggest;
mod telegram;

use std::sync::Arc;

use macro_rules_attribute::apply;
use smol_macros::main;

use parley_llm::openai::OpenAi;

use crate::memory::{Memory, Tokens};
use crate::relay::{Pacing, Relay};
use crate::telegram::{ApiClient, Update};

#[apply(main!)]
async fn main(executor: Arc<async_executor::Executor<'static>>) {
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,isahc=error")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Ok(bot_token) = std::env::var("TELEGRAM_BOT_TOKEN") else {
        eprintln!("❌ TELEGRAM_BOT_TOKEN is missing!");
        std::process::exit(1);
    };
    let Ok(api_key) = std::env::var("OPENAI_API_KEY") else {
        eprintln!("❌ OPENAI_API_KEY is missing!");
        std::process::exit(1);
    };

    let api = Arc::new(ApiClient::new(&bot_token));
    let llm = match OpenAi::new(&api_key) {
        Ok(llm) => llm,
        Err(e) => {
            eprintln!("❌ could not create LLM client: {e:?}");
            std::process::exit(1);
        }
    };

    match api.get_me().await {
        Ok(me) => {
            let name = me.username.unwrap_or(me.first_name);
            tracing::info!(bot = %name, "started");
        }
        Err(e) => {
            eprintln!("❌ Telegram getMe failed: {e}");
            std::process::exit(1);
        }
    }

    let relay = Arc::new(Relay::new(
        llm,
        Arc::new(Memory::new()),
        Arc::new(Tokens::new()),
        Pacing::live(),
    ));

    let mut offset = 0i64;
    loop {
        match api.get_updates(offset, telegram::POLL_TIMEOUT).await {
            Ok(updates) => {
                for update in updates {
                    if update.update_id >= offset {
                        offset = update.update_id + 1;
                    }
                    dispatch(&executor, &api, &relay, update);
                }
            }
            Err(e) => {
                tracing::warn!("Telegram getUpdates error: {e}");
                async_io::Timer::after(telegram::ERROR_BACKOFF).await;
            }
        }
    }
}

/// Spawn one cooperative task per inbound event; turns for different users
/// run concurrently.
fn dispatch(
    executor: &Arc<async_executor::Executor<'static>>,
    api: &Arc<ApiClient>,
    relay: &Arc<Relay<OpenAi>>,
    update: Update,
) {
    if let Some(message) = update.message {
        let (Some(text), Some(from)) = (message.text, message.from) else {
            return;
        };
        let chat_id = message.chat.id;
        let user_id = from.id;
        let api = Arc::clone(api);
        let relay = Arc::clone(relay);
        executor
            .spawn(async move {
                let chat = chat::telegram(api, chat_id);
                if let Some(rest) = text.strip_prefix('/') {
                    // Commands may carry a bot-name suffix: `/status@my_bot`.
                    let name = rest
                        .split(|c: char| c.is_whitespace() || c == '@')
                        .next()
                        .unwrap_or_default();
                    relay.on_command(&chat, user_id, name).await;
                } else {
                    relay.run_turn(&chat, user_id, text.trim()).await;
                }
            })
            .detach();
    } else if let Some(query) = update.callback_query {
        let (Some(token), Some(message)) = (query.data, query.message) else {
            return;
        };
        let chat_id = message.chat.id;
        let user_id = query.from.id;
        let query_id = query.id;
        let api = Arc::clone(api);
        let relay = Arc::clone(relay);
        executor
            .spawn(async move {
                let _ = api.answer_callback_query(&query_id).await;
                let chat = chat::telegram(api, chat_id);
                relay.on_callback(&chat, user_id, &token).await;
            })
            .detach();
    }
}
