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

//! Templated Kafka row writer.
//!
//! Renders a key and a value template for each incoming row by replacing
//! variable names with column values, then publishes the pair to a Kafka
//! topic a given number of times.
//!
//! # Example
//!
//! ```ignore
//! use kafka_writer::{KafkaWriter, KafkaWriterConfig};
//!
//! let config = KafkaWriterConfig::builder("orders", "orders-topic", "order ID for NAME")
//!     .variable("ID", "order_id")
//!     .variable("NAME", "customer")
//!     .key_template("ID")
//!     .bootstrap_servers("broker.local:9092")
//!     .build();
//!
//! let writer = KafkaWriter::new(config)?;
//! writer.initialize().await?;
//! writer.dispatch(&row, 1).await?;
//! writer.teardown().await?;
//! println!("{}", writer.result());
//! ```

pub mod config;
pub mod error;
pub mod publisher;
pub mod result;
pub mod row;
pub mod template;
pub mod writer;

pub use config::{
    default_connection_properties, Binding, ConnectionProperties, KafkaWriterConfig,
    KafkaWriterConfigBuilder,
};
pub use error::{Result, WriterError};
pub use publisher::{KafkaPublisher, MessagePublisher};
pub use result::WriteDataResult;
pub use row::Row;
pub use writer::{KafkaWriter, WriterStatus};
