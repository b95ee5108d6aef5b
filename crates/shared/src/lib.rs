pub mod domain;
pub mod error;
pub mod mutation;
pub mod protocol;

pub use domain::{CalendarKind, CalendarList, Entry};
pub use mutation::{ListIntent, MutationError};
