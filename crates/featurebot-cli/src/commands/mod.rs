pub mod config;
pub mod create;
pub mod matching;
pub mod run;
pub mod status;
pub mod tick;
pub mod unpin;

use std::sync::Arc;

use featurebot_core::{AllowList, Bot, Config, Database, LemmyClient};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Open the configured database, creating it on first use.
pub fn open_store(config: &Config) -> Result<Arc<Database>, Box<dyn std::error::Error>> {
    let path = config.database_path()?;
    Ok(Arc::new(Database::open(&path)?))
}

/// Log in with `PASSWORD` from the environment and assemble the bot.
pub async fn connect(config: Config) -> Result<Arc<Bot<LemmyClient>>, Box<dyn std::error::Error>> {
    let credentials = config.credentials(|name| std::env::var(name).ok())?;
    let client = LemmyClient::new(
        &credentials.instance,
        AllowList::from_communities(&config.communities),
    )?;
    client
        .login(&credentials.username, &credentials.password)
        .await?;

    let store = open_store(&config)?;
    Ok(Arc::new(Bot::new(config, store, Arc::new(client))?))
}
