use featurebot_core::{Config, PostId};

use super::{connect, CommandResult};

pub async fn run(post_id: i64) -> CommandResult {
    let bot = connect(Config::load()?).await?;
    bot.coordinator().unpin(PostId(post_id)).await?;
    println!("unpinned post {post_id}");
    Ok(())
}
