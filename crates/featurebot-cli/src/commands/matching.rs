use featurebot_core::{match_definition, Config};

use super::CommandResult;

pub fn run(name: &str) -> CommandResult {
    let config = Config::load()?;

    match match_definition(&config.posts, name) {
        Some(definition) if definition.pinnable => {
            println!(
                "'{}' (pin_check '{}'): pinned for {} day(s)",
                definition.name, definition.pin_check, definition.pin_days
            );
        }
        Some(definition) => {
            println!(
                "'{}' (pin_check '{}'): not pinnable",
                definition.name, definition.pin_check
            );
        }
        None => println!("no match"),
    }
    Ok(())
}
