//! Time placeholders in remote paths
//!
//! `%` followed by a strftime conversion character (`%Y`, `%m`, `%d`,
//! `%H`, `%M`, `%S`, ...) is replaced from one fixed timestamp, so every
//! placeholder in a run agrees. `%%` is a literal percent sign.

use std::fmt::Display;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};

use crate::sync::SyncError;

/// Expand time placeholders in `template` using `now`
pub fn expand_time_placeholders<Tz>(template: &str, now: &DateTime<Tz>) -> Result<String, SyncError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if !template.contains('%') {
        return Ok(template.to_string());
    }

    let items: Vec<Item<'_>> = StrftimeItems::new(template).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(SyncError::Config(format!(
            "invalid time placeholder in path '{}'",
            template
        )));
    }

    Ok(now.format_with_items(items.iter()).to_string())
}
