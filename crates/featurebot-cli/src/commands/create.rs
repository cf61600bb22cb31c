use chrono::Utc;
use featurebot_core::Config;

use super::{connect, CommandResult};

pub async fn run(name: &str) -> CommandResult {
    let config = Config::load()?;
    let definition = config
        .posts
        .iter()
        .find(|post| post.name == name)
        .cloned()
        .ok_or_else(|| format!("no post definition named '{name}'"))?;

    let bot = connect(config).await?;
    let report = bot.create_posts(&definition, Utc::now()).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.failed.is_empty() {
        return Err(format!("creation failed in: {}", report.failed.join(", ")).into());
    }
    Ok(())
}
