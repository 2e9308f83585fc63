use dotenvy::dotenv;
use kurs_bot::bot::handlers::{self, Command, NameDialogue};
use kurs_bot::bot::sessions::{InMemorySessions, SessionStore};
use kurs_bot::bot::state::State;
use kurs_bot::cache::RateCache;
use kurs_bot::config::Settings;
use kurs_bot::rates::{CbrRates, RateSource};
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Redacts bot tokens from log output
struct TokenRedactor {
    patterns: Vec<(Regex, &'static str)>,
}

impl TokenRedactor {
    /// Initialize all redaction patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: vec![
                (
                    Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/[^'\s]*)")?,
                    "$1[BOT_TOKEN]$3",
                ),
                (
                    Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
                    "$1[BOT_TOKEN]",
                ),
                (
                    Regex::new(r"[0-9]{8,10}:[A-Za-z0-9_-]{35}")?,
                    "[BOT_TOKEN]",
                ),
            ],
        })
    }

    fn redact(&self, input: &str) -> String {
        self.patterns
            .iter()
            .fold(input.to_string(), |acc, (pattern, replacement)| {
                pattern.replace_all(&acc, *replacement).to_string()
            })
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    redactor: Arc<TokenRedactor>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.redactor.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    redactor: Arc<TokenRedactor>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            redactor: self.redactor.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let redactor = Arc::new(TokenRedactor::new().map_err(|e| {
        eprintln!("Failed to compile redaction patterns: {e}");
        e
    })?);

    init_logging(redactor);

    info!("Starting USD rate bot...");

    let settings = init_settings();

    // Probe the cache once; on failure the bot runs in always-fetch mode
    let cache = Arc::new(RateCache::connect(&settings.redis_url).await);

    let rates: Arc<dyn RateSource> = Arc::new(CbrRates::new());
    let sessions: Arc<dyn SessionStore> = Arc::new(InMemorySessions::new());

    let bot = Bot::new(settings.bot_api_token.clone());
    check_credentials(&bot).await;

    info!("Bot is running...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![
            sessions,
            cache,
            rates,
            InMemStorage::<State>::new()
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(redactor: Arc<TokenRedactor>) {
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        redactor,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Verifies the bot token against the Telegram API before polling starts
async fn check_credentials(bot: &Bot) {
    match bot.get_me().await {
        Ok(me) => info!("Authorized as @{}", me.username()),
        Err(e) => {
            error!("Bot token validation failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<State>, State>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::case![State::AwaitingName].branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.text().is_some())
                    .endpoint(handle_awaiting_name),
            ),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: NameDialogue,
    sessions: Arc<dyn SessionStore>,
    cache: Arc<RateCache>,
    rates: Arc<dyn RateSource>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg, dialogue).await,
        Command::Usd => handlers::usd(bot, msg, sessions, cache, rates).await,
        Command::Healthcheck => handlers::healthcheck(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_awaiting_name(
    bot: Bot,
    msg: Message,
    dialogue: NameDialogue,
    sessions: Arc<dyn SessionStore>,
    cache: Arc<RateCache>,
    rates: Arc<dyn RateSource>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handlers::receive_name(bot, msg, dialogue, sessions, cache, rates).await {
        error!("Name handler error: {}", e);
    }
    respond(())
}
