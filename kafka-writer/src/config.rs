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

//! Configuration types for the Kafka writer.

use std::fmt;
use std::time::Duration;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::error::{Result, WriterError};

pub const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";
pub const KEY_SERIALIZER: &str = "key.serializer";
pub const VALUE_SERIALIZER: &str = "value.serializer";
pub const ACKS: &str = "acks";

/// Serializer identifier understood by Kafka clients configured from the same property set.
pub const STRING_SERIALIZER: &str = "org.apache.kafka.common.serialization.StringSerializer";

const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 30_000;

/// Pairs a template variable name with the row column it is resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Binding {
    /// Literal text searched for in the templates.
    pub name: String,
    /// Column looked up in each row.
    pub column: String,
}

impl Binding {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }
}

/// Ordered string-to-string property set handed to the Kafka client.
///
/// Insertion order is kept; setting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionProperties {
    entries: Vec<(String, String)>,
}

impl ConnectionProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConnectionProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut props = ConnectionProperties::new();
        for (k, v) in iter {
            props.set(k, v);
        }
        props
    }
}

impl<'de> Deserialize<'de> for ConnectionProperties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = ConnectionProperties;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of string properties")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut props = ConnectionProperties::new();
                while let Some((key, value)) = map.next_entry::<String, String>()? {
                    props.set(key, value);
                }
                Ok(props)
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

/// Default connection properties: a local broker, string serializers and leader acks.
///
/// Returns a fresh value on every call.
pub fn default_connection_properties() -> ConnectionProperties {
    let mut props = ConnectionProperties::new();
    props
        .set(BOOTSTRAP_SERVERS, "localhost:9092")
        .set(KEY_SERIALIZER, STRING_SERIALIZER)
        .set(VALUE_SERIALIZER, STRING_SERIALIZER)
        .set(ACKS, "1");
    props
}

fn default_flush_timeout_ms() -> u64 {
    DEFAULT_FLUSH_TIMEOUT_MS
}

/// Configuration for the Kafka writer.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaWriterConfig {
    /// Writer identifier, used as the log prefix.
    pub id: String,
    /// Topic messages are published to.
    pub topic: String,
    /// Template variables, applied in this order.
    #[serde(default)]
    pub variables: Vec<Binding>,
    /// Optional key template. Without one, messages are sent without a key.
    #[serde(default)]
    pub key_template: Option<String>,
    /// Value template.
    pub value_template: String,
    /// Properties used to build the Kafka client.
    #[serde(default = "default_connection_properties")]
    pub connection: ConnectionProperties,
    /// How long teardown waits for queued messages to be flushed.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
}

impl KafkaWriterConfig {
    /// Start building a new config with the required fields.
    pub fn builder(
        id: impl Into<String>,
        topic: impl Into<String>,
        value_template: impl Into<String>,
    ) -> KafkaWriterConfigBuilder {
        KafkaWriterConfigBuilder {
            id: id.into(),
            topic: topic.into(),
            value_template: value_template.into(),
            variables: Vec::new(),
            key_template: None,
            connection: default_connection_properties(),
            flush_timeout_ms: DEFAULT_FLUSH_TIMEOUT_MS,
        }
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Names of the template variables, in substitution order.
    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|b| b.name.as_str()).collect()
    }

    /// Check the config before it is used to build a writer.
    ///
    /// Rendering itself is a plain search/replace, but an empty variable name
    /// is refused here: replacing `""` would insert the value between every
    /// character of the template.
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(WriterError::InvalidConfig("topic must not be empty".into()));
        }
        if let Some(index) = self.variables.iter().position(|b| b.name.is_empty()) {
            return Err(WriterError::InvalidConfig(format!(
                "variable name at position {index} must not be empty"
            )));
        }
        if let Some(servers) = self.connection.get(BOOTSTRAP_SERVERS) {
            if servers.trim().is_empty() {
                return Err(WriterError::InvalidConfig(format!(
                    "'{BOOTSTRAP_SERVERS}' must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`KafkaWriterConfig`].
pub struct KafkaWriterConfigBuilder {
    id: String,
    topic: String,
    value_template: String,
    variables: Vec<Binding>,
    key_template: Option<String>,
    connection: ConnectionProperties,
    flush_timeout_ms: u64,
}

impl KafkaWriterConfigBuilder {
    /// Append a template variable bound to `column`.
    pub fn variable(mut self, name: impl Into<String>, column: impl Into<String>) -> Self {
        self.variables.push(Binding::new(name, column));
        self
    }

    pub fn key_template(mut self, template: impl Into<String>) -> Self {
        self.key_template = Some(template.into());
        self
    }

    pub fn bootstrap_servers(self, servers: impl Into<String>) -> Self {
        self.connection_property(BOOTSTRAP_SERVERS, servers)
    }

    pub fn connection_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.connection.set(key, value);
        self
    }

    /// Replace the whole property set, defaults included.
    pub fn connection(mut self, connection: ConnectionProperties) -> Self {
        self.connection = connection;
        self
    }

    pub fn flush_timeout(mut self, timeout: Duration) -> Self {
        self.flush_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Build the config.
    pub fn build(self) -> KafkaWriterConfig {
        KafkaWriterConfig {
            id: self.id,
            topic: self.topic,
            variables: self.variables,
            key_template: self.key_template,
            value_template: self.value_template,
            connection: self.connection,
            flush_timeout_ms: self.flush_timeout_ms,
        }
    }
}
