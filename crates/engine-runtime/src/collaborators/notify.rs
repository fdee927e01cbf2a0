use crate::error::NotifyError;
use async_trait::async_trait;
use engine_config::settings::Settings;
use engine_core::{
    event_bus::bus::EventBus,
    retry::{RetryDisposition, RetryError, RetryPolicy},
};
use model::events::pipeline::PipelineEvent;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Operator-facing channel for failures and finished merges.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts `{ "text": ... }` to a chat webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    policy: RetryPolicy,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            policy: RetryPolicy::for_notifications(),
        })
    }
}

fn classify_http(err: &reqwest::Error) -> RetryDisposition {
    match err.status() {
        Some(status) if status.is_client_error() && status.as_u16() != 429 => {
            RetryDisposition::Stop
        }
        _ => RetryDisposition::Retry,
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        let payload = WebhookPayload { text };
        let result = self
            .policy
            .run(
                |attempt| {
                    debug!(attempt, "Posting webhook notification");
                    let request = self.client.post(&self.url).json(&payload);
                    async move {
                        request.send().await?.error_for_status()?;
                        Ok::<(), reqwest::Error>(())
                    }
                },
                classify_http,
            )
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(RetryError::Fatal { error, .. }) => Err(NotifyError::Http(error)),
            Err(err) => Err(NotifyError::Exhausted {
                attempts: err.attempts(),
                source: err.into_error(),
            }),
        }
    }
}

/// Used when no webhook is configured or notifications are disabled.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        info!(notification = text, "Notification");
        Ok(())
    }
}

/// Picks the notifier the settings ask for, falling back to logging.
pub fn notifier_for(settings: &Settings) -> Arc<dyn Notifier> {
    match (&settings.webhook_url, settings.notify_enabled) {
        (Some(url), true) => match WebhookNotifier::new(url.clone()) {
            Ok(webhook) => Arc::new(webhook),
            Err(e) => {
                warn!(error = %e, "Webhook client unavailable, logging notifications instead");
                Arc::new(LogNotifier)
            }
        },
        _ => Arc::new(LogNotifier),
    }
}

/// Forwards notifiable pipeline events until cancelled. Events still
/// buffered at cancellation are delivered before the task ends.
pub async fn spawn_notifier(
    events: &EventBus<PipelineEvent>,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let (_, mut rx) = events.subscribe(256).await;
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => return,
                },
            };
            forward(notifier.as_ref(), &event).await;
        }
        while let Ok(event) = rx.try_recv() {
            forward(notifier.as_ref(), &event).await;
        }
    })
}

async fn forward(notifier: &dyn Notifier, event: &PipelineEvent) {
    if !event.is_notifiable() {
        return;
    }
    if let Err(e) = notifier.notify(&event.to_string()).await {
        error!(error = %e, event = %event, "Failed to deliver notification");
    }
}
