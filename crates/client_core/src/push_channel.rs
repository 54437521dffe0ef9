use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::{
    header::{ACCEPT, CACHE_CONTROL},
    Client,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use crate::{application::AppMessage, sse::SseDecoder};

const LAST_EVENT_ID: &str = "Last-Event-ID";

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

pub struct PushChannel {
    http: Client,
    url: Url,
    reconnect_delay: Duration,
    last_event_id: Option<String>,
}

impl PushChannel {
    pub fn new(http: Client, url: Url) -> Self {
        Self {
            http,
            url,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            last_event_id: None,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn spawn(self, inbox: mpsc::UnboundedSender<AppMessage>) -> JoinHandle<()> {
        tokio::spawn(self.run(inbox))
    }

    pub async fn run(mut self, inbox: mpsc::UnboundedSender<AppMessage>) {
        loop {
            match self.read_stream(&inbox).await {
                Ok(()) => info!(url = %self.url, "push channel closed"),
                Err(err) => warn!(url = %self.url, error = %err, "push channel failed"),
            }
            if inbox.is_closed() {
                debug!("application inbox closed; stopping push channel");
                return;
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn read_stream(&mut self, inbox: &mpsc::UnboundedSender<AppMessage>) -> Result<()> {
        let mut request = self
            .http
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(last_event_id) = &self.last_event_id {
            request = request.header(LAST_EVENT_ID, last_event_id.as_str());
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("failed to connect push channel: {}", self.url))?
            .error_for_status()?;
        info!(url = %self.url, "push channel connected");

        let mut decoder = SseDecoder::resuming(self.last_event_id.take());
        let mut body = response.bytes_stream();
        let outcome = loop {
            let Some(chunk) = body.next().await else {
                break Ok(());
            };
            let chunk = match chunk.context("push channel receive failed") {
                Ok(chunk) => chunk,
                Err(err) => break Err(err),
            };
            let mut delivered = true;
            for message in decoder.push(&chunk) {
                if inbox.send(AppMessage::Push(message)).is_err() {
                    delivered = false;
                    break;
                }
            }
            if !delivered {
                break Ok(());
            }
        };

        self.last_event_id = decoder.last_event_id().map(str::to_string);
        if let Some(retry) = decoder.retry() {
            self.reconnect_delay = retry;
        }
        outcome
    }
}
