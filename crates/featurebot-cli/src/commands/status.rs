use featurebot_core::{Config, CountdownStore, Database, DayMarker, FeatureRecord};
use serde::Serialize;

use super::CommandResult;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Serialize)]
struct Status {
    day_marker: u8,
    records: Vec<FeatureRecord>,
}

pub fn run(json: bool) -> CommandResult {
    let config = Config::load()?;
    let db = Database::open(&config.database_path()?)?;

    let status = Status {
        day_marker: DayMarker::get(&db)?,
        records: db.list_all()?,
    };
    let location = db.path().map(|p| p.display().to_string());
    db.close()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let weekday = WEEKDAYS
        .get(status.day_marker as usize)
        .copied()
        .unwrap_or("?");
    if let Some(location) = location {
        println!("database: {location}");
    }
    println!("last processed day: {} ({weekday})", status.day_marker);
    if status.records.is_empty() {
        println!("no featured posts");
    }
    for record in &status.records {
        println!(
            "post {:>8}  {:<9}  {} day(s) left",
            record.post_id.0,
            record.feature_type.as_str(),
            record.days_left
        );
    }
    Ok(())
}
