use shared::{
    domain::{CalendarList, Entry},
    error::ApiError,
};
use storage::Storage;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

pub async fn list_calendars(ctx: &ApiContext) -> Result<CalendarList, ApiError> {
    ctx.storage.load_calendars().await.map_err(internal)
}

/// Persists `proposed` as the whole list and returns the list as stored.
///
/// The store has the final word: names are trimmed, and a list holding an
/// unnamed entry or an `ics-url` entry without a url is rejected without
/// touching what is already stored.
pub async fn replace_calendars(
    ctx: &ApiContext,
    proposed: CalendarList,
) -> Result<CalendarList, ApiError> {
    let normalized = normalize_calendars(proposed).map_err(|err| {
        warn!(reason = %err.message, "rejected calendar list");
        err
    })?;
    let stored = ctx
        .storage
        .replace_calendars(&normalized)
        .await
        .map_err(internal)?;
    info!(calendars = stored.len(), "calendar list replaced");
    Ok(stored)
}

pub async fn health(ctx: &ApiContext) -> Result<(), ApiError> {
    ctx.storage.health_check().await.map_err(internal)
}

pub fn normalize_calendars(proposed: CalendarList) -> Result<CalendarList, ApiError> {
    proposed
        .into_iter()
        .enumerate()
        .map(|(position, entry)| normalize_entry(position, entry))
        .collect()
}

fn normalize_entry(position: usize, mut entry: Entry) -> Result<Entry, ApiError> {
    entry.name = entry.name.trim().to_string();
    if entry.name.is_empty() {
        return Err(ApiError::validation(format!(
            "calendar at position {position} has an empty name"
        )));
    }

    entry.url = entry
        .url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    if entry.kind.requires_url() && entry.url.is_none() {
        return Err(ApiError::validation(format!(
            "calendar '{}' of type {} needs a url",
            entry.name, entry.kind
        )));
    }

    Ok(entry)
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::internal(err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
