use shared::{
    domain::CalendarList,
    mutation::{self, ListIntent},
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

pub mod error;
pub mod next_event;
pub mod transport;

pub use error::ListStoreError;
pub use next_event::{LookAhead, NextEventFinder, UpcomingEvent};
pub use transport::{HttpListStore, ListStore};

/// What the view layer hears about. `ListUpdated` carries the new
/// authoritative list after every successful pull or push.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ListUpdated(CalendarList),
    Error(String),
}

/// Owns the single local copy of the calendar list.
///
/// The copy only ever changes by wholesale replacement with a list the store
/// returned. A list computed locally is a proposal until the store answers;
/// a failed round trip leaves the copy at its last synced value and is not
/// retried.
pub struct ListStoreClient<S: ListStore> {
    store: S,
    snapshot: RwLock<CalendarList>,
    events: broadcast::Sender<ClientEvent>,
}

impl ListStoreClient<HttpListStore> {
    pub fn connect(server_url: &str) -> Result<Self, ListStoreError> {
        Ok(Self::new(HttpListStore::new(server_url)?))
    }
}

impl<S: ListStore> ListStoreClient<S> {
    pub fn new(store: S) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            store,
            snapshot: RwLock::new(CalendarList::default()),
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> CalendarList {
        self.snapshot.read().await.clone()
    }

    pub async fn pull(&self) -> Result<CalendarList, ListStoreError> {
        match self.store.fetch_calendars().await {
            Ok(calendars) => {
                debug!(calendars = calendars.len(), "pulled calendar list");
                Ok(self.adopt(calendars).await)
            }
            Err(err) => Err(self.report("pull", err)),
        }
    }

    /// Sends `proposed` and adopts whatever the store says it persisted.
    pub async fn push(&self, proposed: &CalendarList) -> Result<CalendarList, ListStoreError> {
        match self.store.replace_calendars(proposed).await {
            Ok(stored) => {
                if &stored != proposed {
                    info!(
                        proposed = proposed.len(),
                        stored = stored.len(),
                        "list store adjusted the pushed list"
                    );
                }
                Ok(self.adopt(stored).await)
            }
            Err(err) => Err(self.report("push", err)),
        }
    }

    /// Computes the intent against the current snapshot and pushes the result.
    /// An intent the engine rejects never reaches the store.
    pub async fn apply(&self, intent: &ListIntent) -> Result<CalendarList, ListStoreError> {
        let current = self.snapshot().await;
        let proposed = mutation::apply(&current, intent)?;
        debug!(intent = intent.name(), "applying list intent");
        self.push(&proposed).await
    }

    async fn adopt(&self, calendars: CalendarList) -> CalendarList {
        *self.snapshot.write().await = calendars.clone();
        let _ = self.events.send(ClientEvent::ListUpdated(calendars.clone()));
        calendars
    }

    fn report(&self, operation: &'static str, err: ListStoreError) -> ListStoreError {
        warn!(operation, error = %err, "calendar list sync failed");
        let _ = self
            .events
            .send(ClientEvent::Error(format!("{operation} failed: {err}")));
        err
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
