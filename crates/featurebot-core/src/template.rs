//! Placeholder substitution for post titles and bodies.
//!
//! - `%{WEEKLYDATE}` becomes e.g. `Oct week 3, 2026`
//! - `%{COMSHORT}` becomes the community's short name
//!
//! Each placeholder is substituted at its first occurrence only.

use chrono::{Datelike, NaiveDate};

use crate::definitions::{CommunityTarget, PostDefinition};

const WEEKLY_DATE: &str = "%{WEEKLYDATE}";
const COMMUNITY_SHORT: &str = "%{COMSHORT}";

/// A post ready to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPost {
    pub name: String,
    pub body: String,
}

/// Week of the month, with weeks starting on Sunday. The 1st is always week 1.
pub fn week_of_month(date: NaiveDate) -> u32 {
    let first_weekday = date
        .with_day(1)
        .map(|first| first.weekday().num_days_from_sunday())
        .unwrap_or(0);
    (date.day() + first_weekday).div_ceil(7)
}

/// `%{WEEKLYDATE}` expansion for `date`.
pub fn weekly_date(date: NaiveDate) -> String {
    format!(
        "{} week {}, {}",
        date.format("%b"),
        week_of_month(date),
        date.year()
    )
}

pub fn render(template: &str, community: &CommunityTarget, date: NaiveDate) -> String {
    template
        .replacen(WEEKLY_DATE, &weekly_date(date), 1)
        .replacen(COMMUNITY_SHORT, &community.short, 1)
}

pub fn render_post(
    definition: &PostDefinition,
    community: &CommunityTarget,
    date: NaiveDate,
) -> RenderedPost {
    RenderedPost {
        name: render(&definition.name, community, date),
        body: render(&definition.body, community, date),
    }
}
