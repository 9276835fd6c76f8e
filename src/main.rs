use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;

use postboard::cli::{write_feed, Command, Flags};
use postboard::controllers::post_controller::create_post_via_editor;
use postboard::controllers::{fetch_feed, start_app, submit_post, App};
use postboard::models::cache::{get_cache_dir, restore_session, SessionCache, SessionRecord};
use postboard::models::{Auth, Config, DocumentStore, RulesStore};

fn init_logging() -> Result<()> {
    let log_path = get_cache_dir()?.join("postboard.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file at {:?}", log_path))?;

    // Log to a file so the terminal UI is left alone
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let flags = Flags::from_args();
    init_logging()?;

    let config_path = flags.config_path()?;
    let config = Config::load_from(&config_path)?;
    let session_cache = SessionCache::default_location()?;
    let credentials = config.credentials();

    match flags.command() {
        Command::Login => {
            let (profile, key) = credentials
                .with_context(|| format!("No key in {:?}", config_path))?;
            let session = Auth::signed_out().sign_in(&profile, &key)?;
            session_cache.save(&SessionRecord::from_session(Some(&session)))?;
            println!("Signed in as {} <{}>", session.display_name, session.email);
        }
        Command::Logout => {
            session_cache.save(&SessionRecord::default())?;
            println!("Signed out");
        }
        Command::List => {
            let store = flags.open_store(&config)?;
            let posts = fetch_feed(store.as_ref(), config.feed_limit).await?;
            write_feed(&mut io::stdout().lock(), &posts)?;
        }
        Command::Post { text } => {
            let auth = restore_session(&session_cache, credentials.as_ref())?;
            let Some(session) = auth.current() else {
                bail!("Not signed in; run `postboard login` first");
            };
            let body = match text {
                Some(text) => text,
                None => create_post_via_editor()?,
            };
            let store = RulesStore::new(flags.open_store(&config)?, auth.subscribe());
            let id = submit_post(&store, Some(&session), body, Local::now()).await?;
            println!("Posted {}", id);
        }
        Command::Feed => {
            let auth = restore_session(&session_cache, credentials.as_ref())?;
            let store: Arc<dyn DocumentStore> =
                Arc::new(RulesStore::new(flags.open_store(&config)?, auth.subscribe()));
            let app = App::new(store, auth, &config).with_session_cache(session_cache);
            start_app(app).await?;
        }
    }

    Ok(())
}
