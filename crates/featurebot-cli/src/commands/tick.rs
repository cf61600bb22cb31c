use chrono::{DateTime, Utc};
use featurebot_core::Config;

use super::{connect, CommandResult};

pub async fn run(at: Option<String>) -> CommandResult {
    let now = match at {
        Some(at) => DateTime::parse_from_rfc3339(&at)?.with_timezone(&Utc),
        None => Utc::now(),
    };

    let bot = connect(Config::load()?).await?;
    let outcome = bot.housekeeper().tick(now).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
