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

//! Reads JSON rows from stdin, one object per line, and writes each through a
//! [`KafkaWriter`].
//!
//! Usage: `jsonl-to-kafka <config.json> [repeat]`

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::thread;

use anyhow::{bail, Context, Result};
use kafka_writer::{KafkaWriter, KafkaWriterConfig};
use log::{info, warn};
use serde_json::Value;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let mut args = env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!("usage: jsonl-to-kafka <config.json> [repeat]");
    };
    let repeat = match args.next() {
        Some(n) => n.parse::<usize>().context("repeat must be a non-negative integer")?,
        None => 1,
    };

    let file = File::open(&config_path).with_context(|| format!("failed to open {config_path}"))?;
    let config: KafkaWriterConfig = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {config_path}"))?;

    let writer = KafkaWriter::new(config)?;
    writer.initialize().await?;

    let run = run(&writer, repeat).await;
    let closed = writer.teardown().await;
    info!("[{}] Finished: {}", writer.id(), writer.result());

    run?;
    closed?;
    Ok(())
}

async fn run(writer: &KafkaWriter, repeat: usize) -> Result<()> {
    let mut lines = spawn_line_reader(BufReader::new(io::stdin()));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut line_no = 0usize;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("[{}] Shutdown signal received", writer.id());
                return Ok(());
            }
            line = lines.recv() => {
                let Some(line) = line else {
                    return Ok(());
                };
                let line = line.context("failed to read stdin")?;
                line_no += 1;
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<Value>(&line) {
                    Ok(Value::Object(row)) => writer.dispatch(&row, repeat).await?,
                    Ok(_) => warn!("[{}] Skipping line {line_no}: not a JSON object", writer.id()),
                    Err(e) => warn!("[{}] Skipping line {line_no}: {e}", writer.id()),
                }
            }
        }
    }
}

/// Read lines on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_line_reader<R: BufRead + Send + 'static>(reader: R) -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(64);
    thread::spawn(move || {
        for line in reader.lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}
