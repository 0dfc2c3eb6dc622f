// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::metrics::tags::SortedTags;
use hashbrown::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};
use ustr::Ustr;

/// One counter series and its current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSample {
    pub name: Ustr,
    pub tags: SortedTags,
    pub value: u64,
}

#[derive(Debug)]
pub enum AggregatorCommand {
    Increment {
        name: Ustr,
        tags: SortedTags,
        value: u64,
    },
    Snapshot(oneshot::Sender<Vec<CounterSample>>),
    Shutdown,
}

/// Cheap, cloneable sender side of the aggregator. Safe to use from any number
/// of tasks; sending never blocks.
#[derive(Clone, Debug)]
pub struct AggregatorHandle {
    tx: mpsc::UnboundedSender<AggregatorCommand>,
}

impl AggregatorHandle {
    pub fn increment(
        &self,
        name: Ustr,
        tags: SortedTags,
        value: u64,
    ) -> Result<(), mpsc::error::SendError<AggregatorCommand>> {
        self.tx
            .send(AggregatorCommand::Increment { name, tags, value })
    }

    /// Current value of every series, sorted by name then tags. Counters are
    /// cumulative and are not reset by a snapshot.
    pub async fn snapshot(&self) -> Result<Vec<CounterSample>, String> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(AggregatorCommand::Snapshot(response_tx))
            .map_err(|e| format!("Failed to send snapshot command: {}", e))?;

        response_rx
            .await
            .map_err(|e| format!("Failed to receive snapshot response: {}", e))
    }

    pub fn shutdown(&self) -> Result<(), mpsc::error::SendError<AggregatorCommand>> {
        self.tx.send(AggregatorCommand::Shutdown)
    }
}

pub struct AggregatorService {
    counters: HashMap<(Ustr, SortedTags), u64>,
    max_contexts: usize,
    rx: mpsc::UnboundedReceiver<AggregatorCommand>,
}

impl AggregatorService {
    /// `max_contexts` caps the number of distinct series; increments that would
    /// open a new series past the cap are dropped.
    pub fn new(max_contexts: usize) -> (Self, AggregatorHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let service = Self {
            counters: HashMap::new(),
            max_contexts,
            rx,
        };
        (service, AggregatorHandle { tx })
    }

    pub async fn run(mut self) {
        debug!("Aggregator service started");

        let mut dropped: u64 = 0;
        while let Some(command) = self.rx.recv().await {
            match command {
                AggregatorCommand::Increment { name, tags, value } => {
                    if !self.insert(name, tags, value) {
                        dropped += 1;
                        // logged at 1, 2, 4, 8, ... drops
                        if dropped.is_power_of_two() {
                            warn!(
                                "Context limit of {} reached, dropped {} increments so far",
                                self.max_contexts, dropped
                            );
                        }
                    }
                }

                AggregatorCommand::Snapshot(response_tx) => {
                    if response_tx.send(self.samples()).is_err() {
                        error!("Failed to send snapshot response - receiver dropped");
                    }
                }

                AggregatorCommand::Shutdown => {
                    debug!("Aggregator service shutting down");
                    break;
                }
            }
        }

        debug!("Aggregator service stopped");
    }

    fn insert(&mut self, name: Ustr, tags: SortedTags, value: u64) -> bool {
        let key = (name, tags);
        if let Some(count) = self.counters.get_mut(&key) {
            *count = count.saturating_add(value);
            return true;
        }
        if self.counters.len() >= self.max_contexts {
            return false;
        }
        self.counters.insert(key, value);
        true
    }

    fn samples(&self) -> Vec<CounterSample> {
        let mut samples: Vec<CounterSample> = self
            .counters
            .iter()
            .map(|((name, tags), value)| CounterSample {
                name: *name,
                tags: tags.clone(),
                value: *value,
            })
            .collect();
        samples.sort_by(|a, b| {
            a.name
                .as_str()
                .cmp(b.name.as_str())
                .then_with(|| a.tags.cmp(&b.tags))
        });
        samples
    }
}
