use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_sqs::error::SdkError;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::post::PurgeJob;

#[derive(Debug)]
pub struct ReceivedJob {
    pub job: PurgeJob,
    pub receipt_handle: String,
    /// How many times this message has been handed out, this delivery included.
    pub attempts: u32,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: &PurgeJob) -> Result<()>;
    async fn receive(&self, wait_time_seconds: i32) -> Result<Option<ReceivedJob>>;
    /// Removes a processed message.
    async fn ack(&self, receipt_handle: &str) -> Result<()>;
    /// Makes a message visible again after `delay_seconds`.
    async fn release(&self, receipt_handle: &str, delay_seconds: i32) -> Result<()>;
}

#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.queue_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut sqs_builder = aws_sdk_sqs::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(config.queue_endpoint.clone());
        if let Some(provider) = shared_config.credentials_provider() {
            sqs_builder = sqs_builder.credentials_provider(provider);
        }
        let client = Client::from_conf(sqs_builder.build());

        let queue_url = match client
            .get_queue_url()
            .queue_name(&config.queue_name)
            .send()
            .await
        {
            Ok(response) => response
                .queue_url()
                .ok_or_else(|| anyhow!("missing queue url"))?
                .to_string(),
            Err(SdkError::ServiceError(service_err))
                if service_err.err().is_queue_does_not_exist() =>
            {
                let created = client
                    .create_queue()
                    .queue_name(&config.queue_name)
                    .send()
                    .await?;
                created
                    .queue_url()
                    .ok_or_else(|| anyhow!("missing queue url"))?
                    .to_string()
            }
            Err(err) => return Err(anyhow!(err)),
        };

        Ok(Self { client, queue_url })
    }
}

#[async_trait]
impl JobQueue for SqsQueue {
    async fn enqueue(&self, job: &PurgeJob) -> Result<()> {
        let body = serde_json::to_string(job)?;
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await?;
        Ok(())
    }

    async fn receive(&self, wait_time_seconds: i32) -> Result<Option<ReceivedJob>> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait_time_seconds)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await?;

        let message = match response.messages().first() {
            Some(message) => message,
            None => return Ok(None),
        };

        let receipt_handle = match message.receipt_handle() {
            Some(handle) => handle.to_string(),
            None => {
                warn!("queue message missing receipt handle");
                return Ok(None);
            }
        };

        let body = match message.body() {
            Some(body) => body,
            None => {
                warn!("queue message missing body, deleting");
                let _ = self.ack(&receipt_handle).await;
                return Ok(None);
            }
        };

        let job: PurgeJob = match serde_json::from_str(body) {
            Ok(job) => job,
            Err(err) => {
                warn!(error = ?err, "failed to parse queue message body");
                let _ = self.ack(&receipt_handle).await;
                return Ok(None);
            }
        };

        let attempts = message
            .attributes()
            .and_then(|attributes| attributes.get(&MessageSystemAttributeName::ApproximateReceiveCount))
            .and_then(|count| count.parse().ok())
            .unwrap_or(1);

        debug!(post_id = %job.post_id, attempts, "received purge job");
        Ok(Some(ReceivedJob {
            job,
            receipt_handle,
            attempts,
        }))
    }

    async fn ack(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await?;
        Ok(())
    }

    async fn release(&self, receipt_handle: &str, delay_seconds: i32) -> Result<()> {
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(delay_seconds)
            .send()
            .await?;
        Ok(())
    }
}

/// In-process queue. Delays are ignored: a released message is immediately
/// visible again. Messages received `max_receives` times without an ack are
/// moved to a dead-letter list instead of being delivered again.
#[derive(Clone)]
pub struct MemoryQueue {
    state: Arc<Mutex<MemoryQueueState>>,
    max_receives: u32,
}

#[derive(Default)]
struct MemoryQueueState {
    ready: VecDeque<QueuedMessage>,
    in_flight: HashMap<String, QueuedMessage>,
    dead_letters: Vec<PurgeJob>,
}

#[derive(Clone)]
struct QueuedMessage {
    job: PurgeJob,
    receives: u32,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::with_max_receives(5)
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_receives(max_receives: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryQueueState::default())),
            max_receives,
        }
    }

    /// Messages waiting to be received.
    pub fn pending(&self) -> Vec<PurgeJob> {
        self.state.lock().ready.iter().map(|message| message.job).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn dead_letters(&self) -> Vec<PurgeJob> {
        self.state.lock().dead_letters.clone()
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: &PurgeJob) -> Result<()> {
        self.state.lock().ready.push_back(QueuedMessage {
            job: *job,
            receives: 0,
        });
        Ok(())
    }

    async fn receive(&self, _wait_time_seconds: i32) -> Result<Option<ReceivedJob>> {
        let mut state = self.state.lock();
        while let Some(mut message) = state.ready.pop_front() {
            if message.receives >= self.max_receives {
                warn!(post_id = %message.job.post_id, receives = message.receives, "purge job moved to dead letters");
                state.dead_letters.push(message.job);
                continue;
            }

            message.receives += 1;
            let receipt_handle = Uuid::new_v4().to_string();
            let received = ReceivedJob {
                job: message.job,
                receipt_handle: receipt_handle.clone(),
                attempts: message.receives,
            };
            state.in_flight.insert(receipt_handle, message);
            return Ok(Some(received));
        }
        Ok(None)
    }

    async fn ack(&self, receipt_handle: &str) -> Result<()> {
        self.state
            .lock()
            .in_flight
            .remove(receipt_handle)
            .map(|_| ())
            .ok_or_else(|| anyhow!("unknown receipt handle"))
    }

    async fn release(&self, receipt_handle: &str, _delay_seconds: i32) -> Result<()> {
        let mut state = self.state.lock();
        let message = state
            .in_flight
            .remove(receipt_handle)
            .ok_or_else(|| anyhow!("unknown receipt handle"))?;
        state.ready.push_back(message);
        Ok(())
    }
}
