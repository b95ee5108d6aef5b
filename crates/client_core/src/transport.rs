use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{domain::CalendarList, error::ApiError, protocol::CalendarsPayload};
use url::Url;

use crate::error::ListStoreError;

const CALENDARS_PATH: &str = "calendars";

/// The remote list store: one read of the whole list, one wholesale write.
#[async_trait]
pub trait ListStore: Send + Sync {
    async fn fetch_calendars(&self) -> Result<CalendarList, ListStoreError>;
    /// Returns the list the store actually persisted.
    async fn replace_calendars(
        &self,
        calendars: &CalendarList,
    ) -> Result<CalendarList, ListStoreError>;
}

pub struct HttpListStore {
    http: Client,
    calendars_url: Url,
}

impl HttpListStore {
    pub fn new(server_url: &str) -> Result<Self, ListStoreError> {
        Self::with_client(Client::new(), server_url)
    }

    /// Timeouts and TLS settings belong to the injected client.
    pub fn with_client(http: Client, server_url: &str) -> Result<Self, ListStoreError> {
        let mut base = Url::parse(server_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let calendars_url = base.join(CALENDARS_PATH)?;
        Ok(Self {
            http,
            calendars_url,
        })
    }

    pub fn calendars_url(&self) -> &Url {
        &self.calendars_url
    }
}

#[async_trait]
impl ListStore for HttpListStore {
    async fn fetch_calendars(&self) -> Result<CalendarList, ListStoreError> {
        let response = self.http.get(self.calendars_url.clone()).send().await?;
        decode_calendars(response).await
    }

    async fn replace_calendars(
        &self,
        calendars: &CalendarList,
    ) -> Result<CalendarList, ListStoreError> {
        let response = self
            .http
            .post(self.calendars_url.clone())
            .json(&CalendarsPayload::new(calendars.clone()))
            .send()
            .await?;
        decode_calendars(response).await
    }
}

async fn decode_calendars(response: Response) -> Result<CalendarList, ListStoreError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ApiError>(&body)
            .map(|err| err.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        return Err(ListStoreError::Status { status, message });
    }

    let payload: CalendarsPayload = serde_json::from_slice(&body)?;
    Ok(payload.calendars)
}
