//! Game API Client
//!
//! Authenticated calls against the upstream REST API. Every non-2xx response
//! is classified into an [`ApiError`]; cooldowns are waited out and retried
//! without touching the retry budget, "already satisfied" answers count as
//! success, and everything else gets a bounded number of attempts.

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{BotConfig, EngineSettings};
use crate::error::{classify, cooldown_wait, ApiError, Result};
use crate::events::EventSink;
use crate::types::{ActionData, CharacterSnapshot, DataEnvelope, ItemStack, Position, Severity};

/// Client for one character's calls to the game API
pub struct GameApiClient {
    client: Client,
    base_url: String,
    api_token: String,
    character: String,
    settings: EngineSettings,
    events: Option<EventSink>,
}

impl GameApiClient {
    /// Create new game API client
    pub fn new(config: &BotConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.settings.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            character: config.character_name.clone(),
            settings: config.settings,
            events: None,
        })
    }

    /// Report retries and cooldown waits on this sink
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = Some(events);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a call, absorbing cooldowns and retrying transient failures
    ///
    /// A 490 ("already satisfied") answer yields an empty JSON object.
    pub async fn call(&self, endpoint: &str, method: Method, body: Option<&Value>) -> Result<Value> {
        let max_attempts = self.settings.max_retries.max(1);
        let mut attempts = 0u32;

        loop {
            let err = match self.send_once(endpoint, method.clone(), body).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            match err {
                ApiError::CooldownActive { remaining_ms } => {
                    let wait = cooldown_wait(remaining_ms, self.settings.cooldown_buffer());
                    info!(
                        "{} in cooldown on {}, waiting {}ms",
                        self.character,
                        endpoint,
                        wait.as_millis()
                    );
                    self.emit(
                        format!("Waiting for cooldown: {:.1} seconds", remaining_ms as f64 / 1000.0),
                        Severity::Info,
                        serde_json::json!({ "cooldownMs": remaining_ms, "waitMs": wait.as_millis() as u64 }),
                    );
                    tokio::time::sleep(wait).await;
                }
                ApiError::AlreadySatisfied(message) => {
                    debug!("{} {}: already satisfied ({})", method, endpoint, message);
                    return Ok(Value::Object(Default::default()));
                }
                err if err.is_retryable() => {
                    attempts += 1;
                    if attempts >= max_attempts {
                        warn!("{} {} failed after {} attempts: {}", method, endpoint, attempts, err);
                        return Err(ApiError::RetriesExhausted {
                            attempts,
                            last: err.to_string(),
                        });
                    }
                    warn!(
                        "{} {} failed (attempt {}/{}): {}",
                        method, endpoint, attempts, max_attempts, err
                    );
                    self.emit(
                        format!(
                            "Request failed, retrying in {}s...",
                            self.settings.retry_delay().as_secs_f64()
                        ),
                        Severity::Warning,
                        serde_json::json!({
                            "retryCount": attempts,
                            "maxRetries": max_attempts,
                            "retryDelay": self.settings.retry_delay_ms,
                            "error": err.to_string(),
                        }),
                    );
                    tokio::time::sleep(self.settings.retry_delay()).await;
                }
                err => return Err(err),
            }
        }
    }

    /// Single HTTP round trip, classified
    async fn send_once(&self, endpoint: &str, method: Method, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&self.api_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;

        if !status.is_success() {
            return Err(classify(status.as_u16(), &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&text)
            .map_err(|e| ApiError::Transient(format!("Malformed response body: {}", e)))
    }

    fn emit(&self, message: String, severity: Severity, details: Value) {
        if let Some(events) = &self.events {
            events.log(message, severity, Some(details));
        }
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let value = self.call(endpoint, Method::GET, None).await?;
        decode(value)
    }

    async fn post<B: Serialize>(&self, endpoint: &str, body: Option<&B>) -> Result<Value> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ApiError::Transient(format!("Unserializable request body: {}", e)))?;
        self.call(endpoint, Method::POST, body.as_ref()).await
    }

    /// Run a character action and decode its `data` block
    ///
    /// An already-satisfied answer decodes to an empty [`ActionData`].
    pub async fn action<B: Serialize>(&self, action: &str, body: Option<&B>) -> Result<ActionData> {
        let endpoint = format!("/my/{}/action/{}", self.character, action);
        let value = self.post(&endpoint, body).await?;
        match value.get("data") {
            Some(data) => serde_json::from_value(data.clone())
                .map_err(|e| ApiError::Transient(format!("Malformed action response: {}", e))),
            None => Ok(ActionData::default()),
        }
    }

    /// Fetch every character on the account
    pub async fn characters(&self) -> Result<Vec<CharacterSnapshot>> {
        let envelope: DataEnvelope<Vec<CharacterSnapshot>> = self.get("/my/characters").await?;
        Ok(envelope.data)
    }

    /// Fetch this client's character from the roster
    pub async fn character(&self) -> Result<CharacterSnapshot> {
        self.characters()
            .await?
            .into_iter()
            .find(|c| c.name == self.character)
            .ok_or_else(|| ApiError::NotFound(format!("Character {} not found", self.character)))
    }

    pub async fn move_to(&self, position: Position) -> Result<ActionData> {
        self.action("move", Some(&position)).await
    }

    pub async fn fight(&self) -> Result<ActionData> {
        self.action::<Value>("fight", None).await
    }

    pub async fn gather(&self) -> Result<ActionData> {
        self.action::<Value>("gathering", None).await
    }

    pub async fn rest(&self) -> Result<ActionData> {
        self.action::<Value>("rest", None).await
    }

    pub async fn deposit(&self, item: &ItemStack) -> Result<ActionData> {
        self.action("bank/deposit", Some(item)).await
    }

    pub async fn withdraw(&self, item: &ItemStack) -> Result<ActionData> {
        self.action("bank/withdraw", Some(item)).await
    }

    pub async fn craft(&self, item: &ItemStack) -> Result<ActionData> {
        self.action("crafting", Some(item)).await
    }

    pub async fn recycle(&self, item: &ItemStack) -> Result<ActionData> {
        self.action("recycling", Some(item)).await
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::Transient(format!("Malformed response body: {}", e)))
}
