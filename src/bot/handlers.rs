use crate::bot::sessions::{Session, SessionStore};
use crate::bot::state::State;
use crate::cache::RateCache;
use crate::rates::RateSource;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::debug;

/// Dialogue handle for the name-capture flow
pub type NameDialogue = Dialogue<State, InMemStorage<State>>;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Поддерживаемые команды:")]
pub enum Command {
    #[command(description = "Начать работу.")]
    Start,
    #[command(description = "Показать курс доллара.")]
    Usd,
    #[command(description = "Проверка работоспособности.")]
    Healthcheck,
}

const NAME_PROMPT: &str = "Добрый день. Как вас зовут?";
const NAME_REQUIRED: &str = "Пожалуйста, укажите свое имя. Для этого введите /start.";

/// How the rate for a reply was obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateOutcome {
    /// Served from the cache
    Cached(f64),
    /// Fetched from the provider and written back to the cache
    Fresh(f64),
    /// Neither cache nor provider had a value
    Unavailable,
}

/// Telegram user id, or 0 when the update carries no sender
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

pub async fn start(bot: Bot, msg: Message, dialogue: NameDialogue) -> Result<()> {
    debug!("/start from chat {}", msg.chat.id);

    bot.send_message(msg.chat.id, NAME_PROMPT).await?;
    dialogue
        .update(State::AwaitingName)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

pub async fn receive_name(
    bot: Bot,
    msg: Message,
    dialogue: NameDialogue,
    sessions: Arc<dyn SessionStore>,
    cache: Arc<RateCache>,
    rates: Arc<dyn RateSource>,
) -> Result<()> {
    let Some(name) = msg.text().map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(());
    };
    let name = name.to_string();
    debug!("Captured name for chat {}", msg.chat.id);

    sessions
        .set(get_user_id_safe(&msg), Session { name: name.clone() })
        .await;
    dialogue.exit().await.map_err(|e| anyhow!(e.to_string()))?;

    send_rate(&bot, &msg, &name, &cache, rates.as_ref()).await
}

pub async fn usd(
    bot: Bot,
    msg: Message,
    sessions: Arc<dyn SessionStore>,
    cache: Arc<RateCache>,
    rates: Arc<dyn RateSource>,
) -> Result<()> {
    debug!("/usd from chat {}", msg.chat.id);

    match sessions.get(get_user_id_safe(&msg)).await {
        Some(session) => send_rate(&bot, &msg, &session.name, &cache, rates.as_ref()).await,
        None => {
            bot.send_message(msg.chat.id, NAME_REQUIRED).await?;
            Ok(())
        }
    }
}

pub async fn healthcheck(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, "OK").await?;
    Ok(())
}

async fn send_rate(
    bot: &Bot,
    msg: &Message,
    name: &str,
    cache: &RateCache,
    rates: &dyn RateSource,
) -> Result<()> {
    let outcome = resolve_rate(cache, rates).await;
    bot.send_message(msg.chat.id, rate_reply(name, &outcome))
        .await?;
    Ok(())
}

/// Cache lookup with fallback to a live fetch.
///
/// A freshly fetched rate is written back to the cache; a failed fetch
/// leaves the cache untouched.
pub async fn resolve_rate(cache: &RateCache, rates: &dyn RateSource) -> RateOutcome {
    if let Some(rate) = cache.get().await {
        return RateOutcome::Cached(rate);
    }

    match rates.fetch_usd_rate().await {
        Some(rate) => {
            cache.set(rate).await;
            RateOutcome::Fresh(rate)
        }
        None => RateOutcome::Unavailable,
    }
}

/// Reply text for the rate-display flow, addressing the user by name
#[must_use]
pub fn rate_reply(name: &str, outcome: &RateOutcome) -> String {
    match outcome {
        RateOutcome::Fresh(rate) => {
            format!("Рад знакомству, {name}!\nКурс доллара сегодня {rate:.2} р.")
        }
        RateOutcome::Cached(rate) => format!(
            "Рад знакомству, {name}!\nКурс доллара сегодня {rate:.2} р. (Использовано значение из кеша)"
        ),
        RateOutcome::Unavailable => format!(
            "Рад знакомству, {name}!\nК сожалению, не удалось получить актуальный курс доллара."
        ),
    }
}
