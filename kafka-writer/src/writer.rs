// Copyright 2025 The Drasi Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The Kafka writer component.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, info};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::{KafkaWriterConfig, BOOTSTRAP_SERVERS};
use crate::error::{Result, WriterError};
use crate::publisher::{KafkaPublisher, MessagePublisher};
use crate::result::WriteDataResult;
use crate::row::Row;
use crate::template;

/// Lifecycle state of a [`KafkaWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterStatus {
    Uninitialized,
    Initialized,
    Closed,
}

enum WriterState {
    Uninitialized,
    Initialized(Arc<dyn MessagePublisher>),
    Closed,
}

/// Renders each row into a key/value message and publishes it to a Kafka topic.
///
/// The writer moves through `Uninitialized -> Initialized -> Closed` and never
/// goes back. All methods take `&self`, so one writer can be shared between
/// tasks; the message counter is the only state touched per message.
pub struct KafkaWriter {
    config: KafkaWriterConfig,
    /// Publish client (set on initialize, cleared on teardown).
    state: RwLock<WriterState>,
    message_count: AtomicU64,
}

impl KafkaWriter {
    /// Create a new writer from a validated config.
    pub fn new(config: KafkaWriterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: RwLock::new(WriterState::Uninitialized),
            message_count: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn type_name(&self) -> &str {
        "kafka"
    }

    /// Descriptive view of the writer's settings.
    pub fn properties(&self) -> HashMap<String, Value> {
        let mut props = HashMap::new();
        props.insert("topic".into(), Value::String(self.config.topic.clone()));
        props.insert(
            "bootstrap_servers".into(),
            self.config
                .connection
                .get(BOOTSTRAP_SERVERS)
                .map_or(Value::Null, |s| Value::String(s.to_string())),
        );
        props.insert(
            "key_template".into(),
            self.config
                .key_template
                .clone()
                .map_or(Value::Null, Value::String),
        );
        props.insert(
            "value_template".into(),
            Value::String(self.config.value_template.clone()),
        );
        props.insert(
            "variables".into(),
            Value::Array(
                self.config
                    .variables
                    .iter()
                    .map(|b| Value::String(b.name.clone()))
                    .collect(),
            ),
        );
        props
    }

    pub async fn status(&self) -> WriterStatus {
        match *self.state.read().await {
            WriterState::Uninitialized => WriterStatus::Uninitialized,
            WriterState::Initialized(_) => WriterStatus::Initialized,
            WriterState::Closed => WriterStatus::Closed,
        }
    }

    /// Build the Kafka client from the configured connection properties.
    pub async fn initialize(&self) -> Result<()> {
        let mut state = self.state.write().await;
        check_can_initialize(&state)?;

        info!(
            "[{}] Initializing Kafka writer (bootstrap.servers={}, topic={})",
            self.config.id,
            self.config.connection.get(BOOTSTRAP_SERVERS).unwrap_or("<unset>"),
            self.config.topic
        );

        let publisher = KafkaPublisher::connect(&self.config.connection, self.config.flush_timeout())
            .inspect_err(|e| error!("[{}] Failed to create Kafka producer: {e}", self.config.id))?;
        self.install(&mut state, Arc::new(publisher));
        Ok(())
    }

    /// Initialize with an already-built publisher instead of a Kafka client.
    pub async fn initialize_with(&self, publisher: Arc<dyn MessagePublisher>) -> Result<()> {
        let mut state = self.state.write().await;
        check_can_initialize(&state)?;
        self.install(&mut state, publisher);
        Ok(())
    }

    fn install(&self, state: &mut WriterState, publisher: Arc<dyn MessagePublisher>) {
        self.message_count.store(0, Ordering::SeqCst);
        *state = WriterState::Initialized(publisher);
        info!("[{}] Kafka writer initialized", self.config.id);
    }

    /// Render the key template for `row`. `None` when no key template is set.
    pub fn render_key<R: Row + ?Sized>(&self, row: &R) -> Option<String> {
        template::render(
            self.config.key_template.as_deref(),
            &self.config.variables,
            row,
        )
    }

    /// Render the value template for `row`.
    pub fn render_value<R: Row + ?Sized>(&self, row: &R) -> String {
        template::render(
            Some(self.config.value_template.as_str()),
            &self.config.variables,
            row,
        )
        .unwrap_or_default()
    }

    /// Publish the message rendered from `row` `repeat` times.
    ///
    /// Key and value are rendered once. The first failed send stops the loop
    /// and is returned; sends that already went through stay counted.
    pub async fn dispatch<R: Row + ?Sized>(&self, row: &R, repeat: usize) -> Result<()> {
        let publisher = match &*self.state.read().await {
            WriterState::Initialized(publisher) => publisher.clone(),
            WriterState::Uninitialized => return Err(WriterError::NotInitialized),
            WriterState::Closed => return Err(WriterError::Closed),
        };

        let key = self.render_key(row);
        let value = self.render_value(row);
        debug!(
            "[{}] Dispatching message x{repeat} (key={key:?})",
            self.config.id
        );

        for _ in 0..repeat {
            if let Err(e) = publisher
                .send(&self.config.topic, key.as_deref(), &value)
                .await
            {
                error!("[{}] Failed to publish to Kafka: {e}", self.config.id);
                return Err(e);
            }
            self.message_count.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Number of messages accepted by the client since initialization.
    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::SeqCst)
    }

    pub fn result(&self) -> WriteDataResult {
        WriteDataResult::written(self.message_count())
    }

    /// Release the client. Does nothing unless the writer is initialized.
    ///
    /// The writer is closed even when flushing the client fails.
    pub async fn teardown(&self) -> Result<()> {
        let publisher = {
            let mut state = self.state.write().await;
            match std::mem::replace(&mut *state, WriterState::Closed) {
                WriterState::Initialized(publisher) => publisher,
                other => {
                    *state = other;
                    return Ok(());
                }
            }
        };

        info!(
            "[{}] Closing Kafka writer ({} messages sent)",
            self.config.id,
            self.message_count()
        );
        publisher.close().await
    }
}

fn check_can_initialize(state: &WriterState) -> Result<()> {
    match state {
        WriterState::Uninitialized => Ok(()),
        WriterState::Initialized(_) => Err(WriterError::AlreadyInitialized),
        WriterState::Closed => Err(WriterError::Closed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Map};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    type Sent = (String, Option<String>, String);

    /// Records every send; fails every send after `fail_after` successes.
    #[derive(Default)]
    struct RecordingPublisher {
        sent: Mutex<Vec<Sent>>,
        fail_after: Option<usize>,
        closes: AtomicUsize,
    }

    impl RecordingPublisher {
        fn failing_after(n: usize) -> Self {
            Self {
                fail_after: Some(n),
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessagePublisher for RecordingPublisher {
        async fn send(&self, topic: &str, key: Option<&str>, value: &str) -> Result<()> {
            let mut sent = self.sent.lock().unwrap();
            if self.fail_after.is_some_and(|n| sent.len() >= n) {
                return Err(WriterError::send(topic, "broker unavailable"));
            }
            sent.push((topic.to_string(), key.map(str::to_string), value.to_string()));
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config() -> KafkaWriterConfig {
        KafkaWriterConfig::builder("test-writer", "sensors", "{\"device\": \"DEVICE\", \"temp\": TEMP}")
            .variable("DEVICE", "device_id")
            .variable("TEMP", "temperature")
            .key_template("DEVICE")
            .build()
    }

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    async fn initialized(publisher: &Arc<RecordingPublisher>) -> KafkaWriter {
        let writer = KafkaWriter::new(config()).unwrap();
        writer.initialize_with(publisher.clone()).await.unwrap();
        writer
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = KafkaWriterConfig::builder("w", "", "value").build();
        assert!(matches!(
            KafkaWriter::new(config),
            Err(WriterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_render_key_and_value() {
        let writer = KafkaWriter::new(config()).unwrap();
        let row = row(json!({"device_id": "sensor-1", "temperature": 21.5}));

        assert_eq!(writer.render_key(&row).as_deref(), Some("sensor-1"));
        assert_eq!(
            writer.render_value(&row),
            "{\"device\": \"sensor-1\", \"temp\": 21.5}"
        );
    }

    #[test]
    fn test_no_key_template_renders_no_key() {
        let config = KafkaWriterConfig::builder("w", "t", "X").variable("X", "x").build();
        let writer = KafkaWriter::new(config).unwrap();

        assert_eq!(writer.render_key(&row(json!({"x": 1}))), None);
    }

    #[tokio::test]
    async fn test_dispatch_repeats_same_message() {
        let publisher = Arc::new(RecordingPublisher::default());
        let writer = initialized(&publisher).await;

        writer
            .dispatch(&row(json!({"device_id": "d1", "temperature": 30})), 3)
            .await
            .unwrap();

        let expected = (
            "sensors".to_string(),
            Some("d1".to_string()),
            "{\"device\": \"d1\", \"temp\": 30}".to_string(),
        );
        assert_eq!(publisher.sent(), vec![expected.clone(), expected.clone(), expected]);
        assert_eq!(writer.message_count(), 3);
    }

    #[tokio::test]
    async fn test_dispatch_zero_repeat_sends_nothing() {
        let publisher = Arc::new(RecordingPublisher::default());
        let writer = initialized(&publisher).await;

        writer.dispatch(&row(json!({"device_id": "d1"})), 0).await.unwrap();

        assert!(publisher.sent().is_empty());
        assert_eq!(writer.message_count(), 0);
    }

    #[tokio::test]
    async fn test_null_values_render_empty() {
        let publisher = Arc::new(RecordingPublisher::default());
        let writer = initialized(&publisher).await;

        writer
            .dispatch(&row(json!({"device_id": null})), 1)
            .await
            .unwrap();

        let sent = publisher.sent();
        assert_eq!(sent[0].1.as_deref(), Some(""));
        assert_eq!(sent[0].2, "{\"device\": \"\", \"temp\": }");
    }

    #[tokio::test]
    async fn test_failed_send_stops_repeat_loop() {
        let publisher = Arc::new(RecordingPublisher::failing_after(2));
        let writer = initialized(&publisher).await;

        let err = writer
            .dispatch(&row(json!({"device_id": "d1"})), 5)
            .await
            .unwrap_err();

        assert!(matches!(err, WriterError::Send { ref topic, .. } if topic == "sensors"));
        assert_eq!(publisher.sent().len(), 2);
        assert_eq!(writer.message_count(), 2);
    }

    #[tokio::test]
    async fn test_result_counts_across_rows() {
        let publisher = Arc::new(RecordingPublisher::default());
        let writer = initialized(&publisher).await;

        writer.dispatch(&row(json!({"device_id": "a"})), 2).await.unwrap();
        writer.dispatch(&row(json!({})), 1).await.unwrap();
        writer.dispatch(&row(json!({"device_id": "c"})), 4).await.unwrap();

        assert_eq!(writer.result(), WriteDataResult::written(7));
        assert_eq!(writer.result().to_string(), "7 written, 0 updated, 0 errors");
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_counts_every_send() {
        let publisher = Arc::new(RecordingPublisher::default());
        let writer = Arc::new(initialized(&publisher).await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                let row = row(json!({"device_id": format!("d{i}")}));
                writer.dispatch(&row, 5).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(writer.message_count(), 40);
        assert_eq!(publisher.sent().len(), 40);
    }

    #[tokio::test]
    async fn test_dispatch_requires_initialization() {
        let writer = KafkaWriter::new(config()).unwrap();

        let err = writer.dispatch(&row(json!({})), 1).await.unwrap_err();
        assert!(matches!(err, WriterError::NotInitialized));
    }

    #[tokio::test]
    async fn test_teardown_is_idempotent() {
        let publisher = Arc::new(RecordingPublisher::default());
        let writer = KafkaWriter::new(config()).unwrap();

        writer.teardown().await.unwrap();
        assert_eq!(writer.status().await, WriterStatus::Uninitialized);

        writer.initialize_with(publisher.clone()).await.unwrap();
        writer.teardown().await.unwrap();
        writer.teardown().await.unwrap();

        assert_eq!(writer.status().await, WriterStatus::Closed);
        assert_eq!(publisher.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_transition_out_of_closed() {
        let publisher = Arc::new(RecordingPublisher::default());
        let writer = initialized(&publisher).await;
        writer.dispatch(&row(json!({})), 2).await.unwrap();
        writer.teardown().await.unwrap();

        assert!(matches!(
            writer.dispatch(&row(json!({})), 1).await,
            Err(WriterError::Closed)
        ));
        assert!(matches!(
            writer.initialize_with(publisher.clone()).await,
            Err(WriterError::Closed)
        ));
        // The count from the finished run is still reported.
        assert_eq!(writer.result().written, 2);
    }

    #[tokio::test]
    async fn test_double_initialize_rejected() {
        let publisher = Arc::new(RecordingPublisher::default());
        let writer = initialized(&publisher).await;

        assert!(matches!(
            writer.initialize_with(publisher.clone()).await,
            Err(WriterError::AlreadyInitialized)
        ));
        assert_eq!(writer.status().await, WriterStatus::Initialized);
    }

    #[tokio::test]
    async fn test_initialize_with_bad_properties_fails() {
        let config = KafkaWriterConfig::builder("w", "t", "v")
            .connection_property("key.serializer", "com.example.JsonSerializer")
            .build();
        let writer = KafkaWriter::new(config).unwrap();

        let err = writer.initialize().await.unwrap_err();
        assert!(err.is_config_error());
        assert_eq!(writer.status().await, WriterStatus::Uninitialized);
    }

    #[tokio::test]
    async fn test_kafka_publisher_enqueues_without_broker() {
        // Nothing listens on port 1, so records stay queued and the flush times out.
        let keyed = KafkaWriterConfig::builder("keyed", "sensors", "temp=TEMP")
            .variable("TEMP", "temperature")
            .key_template("sensor-1")
            .bootstrap_servers("127.0.0.1:1")
            .flush_timeout(Duration::from_millis(200))
            .build();
        let writer = KafkaWriter::new(keyed).unwrap();
        writer.initialize().await.unwrap();
        assert_eq!(writer.status().await, WriterStatus::Initialized);

        writer
            .dispatch(&row(json!({"temperature": 21.5})), 2)
            .await
            .unwrap();
        assert_eq!(writer.message_count(), 2);

        let err = writer.teardown().await.unwrap_err();
        assert!(matches!(err, WriterError::Close(_)));
        assert_eq!(writer.status().await, WriterStatus::Closed);
        assert!(writer.teardown().await.is_ok());
        assert_eq!(writer.result().written, 2);
    }

    #[tokio::test]
    async fn test_kafka_publisher_sends_without_key() {
        let unkeyed = KafkaWriterConfig::builder("unkeyed", "sensors", "temp=TEMP")
            .variable("TEMP", "temperature")
            .bootstrap_servers("127.0.0.1:1")
            .flush_timeout(Duration::from_millis(200))
            .build();
        let writer = KafkaWriter::new(unkeyed).unwrap();
        writer.initialize().await.unwrap();

        assert_eq!(writer.render_key(&row(json!({}))), None);
        writer.dispatch(&row(json!({"temperature": 3})), 1).await.unwrap();
        assert_eq!(writer.message_count(), 1);

        let _ = writer.teardown().await;
        assert_eq!(writer.status().await, WriterStatus::Closed);
    }

    #[test]
    fn test_properties() {
        let writer = KafkaWriter::new(config()).unwrap();
        let props = writer.properties();

        assert_eq!(writer.type_name(), "kafka");
        assert_eq!(props["topic"], "sensors");
        assert_eq!(props["bootstrap_servers"], "localhost:9092");
        assert_eq!(props["key_template"], "DEVICE");
        assert_eq!(props["variables"], json!(["DEVICE", "TEMP"]));
    }
}
