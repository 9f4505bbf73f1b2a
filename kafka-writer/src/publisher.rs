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

//! Publish clients used by the writer.
//!
//! [`MessagePublisher`] is the narrow seam the writer talks to.
//! [`KafkaPublisher`] implements it on top of librdkafka.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use rdkafka::producer::{BaseRecord, DefaultProducerContext, Producer, ThreadedProducer};
use rdkafka::ClientConfig;

use crate::config::{ConnectionProperties, KEY_SERIALIZER, STRING_SERIALIZER, VALUE_SERIALIZER};
use crate::error::{Result, WriterError};

/// Something that can publish string key/value messages to a topic.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Submit one message. Returning `Ok` means the client accepted it,
    /// not that the broker acknowledged it.
    async fn send(&self, topic: &str, key: Option<&str>, value: &str) -> Result<()>;

    /// Release the client, flushing whatever it still buffers.
    async fn close(&self) -> Result<()>;
}

/// Kafka publisher backed by a [`ThreadedProducer`].
///
/// Sends only enqueue the record; the producer's background thread handles
/// delivery.
pub struct KafkaPublisher {
    producer: Arc<ThreadedProducer<DefaultProducerContext>>,
    flush_timeout: Duration,
}

impl KafkaPublisher {
    /// Build a producer from the given properties.
    pub fn connect(props: &ConnectionProperties, flush_timeout: Duration) -> Result<Self> {
        let producer: ThreadedProducer<DefaultProducerContext> =
            build_client_config(props)?.create()?;

        Ok(Self {
            producer: Arc::new(producer),
            flush_timeout,
        })
    }
}

/// Translate connection properties into a librdkafka client config.
///
/// Serializer entries are checked here and not forwarded, since librdkafka
/// only deals in raw bytes.
pub fn build_client_config(props: &ConnectionProperties) -> Result<ClientConfig> {
    let mut client_config = ClientConfig::new();
    for (key, value) in props.iter() {
        if key == KEY_SERIALIZER || key == VALUE_SERIALIZER {
            if !is_string_serializer(value) {
                return Err(WriterError::UnsupportedSerializer {
                    property: key.to_string(),
                    value: value.to_string(),
                });
            }
            continue;
        }
        client_config.set(key, value);
    }
    Ok(client_config)
}

fn is_string_serializer(value: &str) -> bool {
    value == STRING_SERIALIZER || value.eq_ignore_ascii_case("string")
}

#[async_trait]
impl MessagePublisher for KafkaPublisher {
    async fn send(&self, topic: &str, key: Option<&str>, value: &str) -> Result<()> {
        let mut record: BaseRecord<'_, str, str> = BaseRecord::to(topic).payload(value);
        if let Some(key) = key {
            record = record.key(key);
        }

        self.producer
            .send(record)
            .map_err(|(err, _)| WriterError::send(topic, err))
    }

    async fn close(&self) -> Result<()> {
        let producer = self.producer.clone();
        let timeout = self.flush_timeout;
        debug!("Flushing Kafka producer (timeout {timeout:?})");

        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| WriterError::Close(e.to_string()))?
            .map_err(|e| WriterError::Close(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{default_connection_properties, ACKS, BOOTSTRAP_SERVERS};

    #[test]
    fn test_serializers_are_not_forwarded() {
        let client_config = build_client_config(&default_connection_properties()).unwrap();

        assert_eq!(client_config.get(BOOTSTRAP_SERVERS), Some("localhost:9092"));
        assert_eq!(client_config.get(ACKS), Some("1"));
        assert_eq!(client_config.get(KEY_SERIALIZER), None);
        assert_eq!(client_config.get(VALUE_SERIALIZER), None);
    }

    #[test]
    fn test_short_serializer_name_accepted() {
        let props: ConnectionProperties =
            [(BOOTSTRAP_SERVERS, "b:9092"), (KEY_SERIALIZER, "string")]
                .into_iter()
                .collect();
        assert!(build_client_config(&props).is_ok());
    }

    #[test]
    fn test_unsupported_serializer_rejected() {
        let mut props = default_connection_properties();
        props.set(VALUE_SERIALIZER, "io.confluent.kafka.serializers.KafkaAvroSerializer");

        let err = build_client_config(&props).unwrap_err();
        assert!(err.is_config_error());
        assert!(matches!(
            err,
            WriterError::UnsupportedSerializer { ref property, .. } if property == VALUE_SERIALIZER
        ));
    }

    #[test]
    fn test_unknown_property_fails_construction() {
        let mut props = default_connection_properties();
        props.set("no.such.property", "1");

        let err = KafkaPublisher::connect(&props, Duration::from_secs(1))
            .err()
            .expect("producer creation should fail");
        assert!(matches!(err, WriterError::Kafka(_)));
    }

    #[tokio::test]
    async fn test_connect_and_close_without_traffic() {
        // Producer creation does not contact the broker.
        let publisher =
            KafkaPublisher::connect(&default_connection_properties(), Duration::from_secs(1))
                .unwrap();
        assert!(publisher.close().await.is_ok());
    }
}
