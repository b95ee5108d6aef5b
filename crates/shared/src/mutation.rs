//! Pure list operations. Each one takes the current list and returns a new
//! one; the input is never modified and no I/O happens here.
//!
//! Indices come from the row a gesture was made on, so they may be stale
//! relative to the authoritative list. A stale but in-range index is applied
//! as given.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{CalendarList, Entry};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("index {index} is out of range for a list of {len} calendars")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A row-scoped user gesture, routed from the view into [`apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ListIntent {
    MoveUp { index: usize },
    MoveDown { index: usize },
    Rename { index: usize, name: String },
    Remove { index: usize },
    Add { entry: Entry },
}

impl ListIntent {
    pub fn name(&self) -> &'static str {
        match self {
            ListIntent::MoveUp { .. } => "move_up",
            ListIntent::MoveDown { .. } => "move_down",
            ListIntent::Rename { .. } => "rename",
            ListIntent::Remove { .. } => "remove",
            ListIntent::Add { .. } => "add",
        }
    }
}

pub fn apply(list: &CalendarList, intent: &ListIntent) -> Result<CalendarList, MutationError> {
    match intent {
        ListIntent::MoveUp { index } => move_up(list, *index),
        ListIntent::MoveDown { index } => move_down(list, *index),
        ListIntent::Rename { index, name } => rename(list, *index, name),
        ListIntent::Remove { index } => remove(list, *index),
        ListIntent::Add { entry } => Ok(add(list, entry.clone())),
    }
}

/// Swaps `index` with the row below it. The last row stays where it is.
pub fn move_down(list: &CalendarList, index: usize) -> Result<CalendarList, MutationError> {
    check_index(list, index)?;
    if index + 1 == list.len() {
        return Ok(list.clone());
    }
    Ok(swapped(list, index, index + 1))
}

/// Swaps `index` with the row above it. The first row stays where it is.
pub fn move_up(list: &CalendarList, index: usize) -> Result<CalendarList, MutationError> {
    check_index(list, index)?;
    if index == 0 {
        return Ok(list.clone());
    }
    Ok(swapped(list, index - 1, index))
}

pub fn rename(
    list: &CalendarList,
    index: usize,
    new_name: &str,
) -> Result<CalendarList, MutationError> {
    check_index(list, index)?;
    Ok(list
        .rows()
        .map(|(position, entry)| {
            if position == index {
                Entry {
                    name: new_name.to_string(),
                    ..entry.clone()
                }
            } else {
                entry.clone()
            }
        })
        .collect())
}

pub fn remove(list: &CalendarList, index: usize) -> Result<CalendarList, MutationError> {
    check_index(list, index)?;
    Ok(list
        .rows()
        .filter(|(position, _)| *position != index)
        .map(|(_, entry)| entry.clone())
        .collect())
}

/// Appends `entry` with the lowest priority. Duplicates are allowed.
pub fn add(list: &CalendarList, entry: Entry) -> CalendarList {
    list.iter().cloned().chain(std::iter::once(entry)).collect()
}

fn check_index(list: &CalendarList, index: usize) -> Result<(), MutationError> {
    if index >= list.len() {
        return Err(MutationError::IndexOutOfRange {
            index,
            len: list.len(),
        });
    }
    Ok(())
}

fn swapped(list: &CalendarList, upper: usize, lower: usize) -> CalendarList {
    let mut entries = list.entries().to_vec();
    entries.swap(upper, lower);
    CalendarList::new(entries)
}

#[cfg(test)]
#[path = "tests/mutation_tests.rs"]
mod tests;
