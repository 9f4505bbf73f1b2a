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

//! Error types for the Kafka writer.

use rdkafka::error::KafkaError;
use thiserror::Error;

/// Errors raised while configuring, running or closing a [`KafkaWriter`](crate::KafkaWriter).
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported serializer for '{property}': {value}")]
    UnsupportedSerializer { property: String, value: String },

    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    #[error("Failed to send message to topic '{topic}': {source}")]
    Send {
        topic: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to close publisher: {0}")]
    Close(String),

    #[error("Writer has not been initialized")]
    NotInitialized,

    #[error("Writer is already initialized")]
    AlreadyInitialized,

    #[error("Writer has been closed")]
    Closed,
}

impl WriterError {
    /// Wrap any error raised by a publisher's send call.
    pub fn send(
        topic: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        WriterError::Send {
            topic: topic.into(),
            source: source.into(),
        }
    }

    /// True for errors that stem from the configuration rather than from runtime traffic.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            WriterError::InvalidConfig(_)
                | WriterError::UnsupportedSerializer { .. }
                | WriterError::Kafka(_)
        )
    }
}

/// Result type alias for writer operations.
pub type Result<T> = std::result::Result<T, WriterError>;
