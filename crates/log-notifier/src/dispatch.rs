// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Message delivery to Telegram.

use crate::config::NotifierConfig;
use crate::format::Message;
use crate::http::get_client;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use snapshot_status::retry::{retry, RetryStrategy};
use std::time::Duration;
use tracing::{debug, error, info};

/// Result of delivering one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { attempts: u32 },
    /// Every attempt failed.
    Exhausted { attempts: u32 },
}

impl DeliveryOutcome {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &Message) -> DeliveryOutcome;
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    url: String,
    chat_id: String,
    retry_strategy: RetryStrategy,
}

impl TelegramNotifier {
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        chat_id: impl Into<String>,
        retry_strategy: RetryStrategy,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            chat_id: chat_id.into(),
            retry_strategy,
        }
    }

    #[must_use]
    pub fn from_config(config: &NotifierConfig) -> Self {
        Self::new(
            get_client(config.https_proxy.as_deref(), config.request_timeout),
            config.send_message_url(),
            config.chat_id.clone(),
            RetryStrategy::Fixed(config.send_retries, config.retry_delay),
        )
    }

    async fn post(&self, message: &Message) -> Result<(), SendError> {
        let response = self
            .client
            .post(&self.url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: message.text(),
                parse_mode: message.parse_mode(),
            })
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(SendError::Status { status, body })
    }
}

/// Any non-2xx response or transport error is retried until the budget runs out.
#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &Message) -> DeliveryOutcome {
        let max_attempts = self.retry_strategy.max_attempts();
        let result = retry(&self.retry_strategy, move |attempt| async move {
            self.post(message).await.map_err(|e| {
                error!(
                    "Failed to send Telegram message (attempt {attempt}/{max_attempts}): {e}"
                );
                e
            })
        })
        .await;

        match result {
            Ok(retried) => {
                info!("Sent Telegram message: {}", message.text());
                DeliveryOutcome::Delivered {
                    attempts: retried.attempts,
                }
            }
            Err(e) => {
                error!(
                    "Failed to send Telegram message after {} attempts.",
                    e.attempts
                );
                DeliveryOutcome::Exhausted {
                    attempts: e.attempts,
                }
            }
        }
    }
}

/// Sends a batch of messages one after another, pausing between them.
pub struct Dispatcher<N> {
    notifier: N,
    message_delay: Duration,
}

impl<N: Notifier> Dispatcher<N> {
    pub fn new(notifier: N, message_delay: Duration) -> Self {
        Self {
            notifier,
            message_delay,
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Delivers `messages` in order. The pause is not applied after the last message.
    pub async fn dispatch(&self, messages: &[Message]) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(messages.len());
        for (index, message) in messages.iter().enumerate() {
            let outcome = self.notifier.send(message).await;
            debug!("Delivery outcome: {outcome:?}");
            outcomes.push(outcome);
            if index + 1 < messages.len() && !self.message_delay.is_zero() {
                tokio::time::sleep(self.message_delay).await;
            }
        }
        outcomes
    }
}
