// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Counter declarations.
//!
//! Every counter the process emits is declared once, at startup, with its
//! label keys. The resulting [`MetricRegistry`] is read-only; components get
//! [`Counter`] handles out of it and never touch global state.

use crate::error::MetricError;
use crate::metrics::aggregator_service::AggregatorHandle;
use crate::metrics::tags::{SortedTags, TagKey};
use hashbrown::HashMap;
use std::sync::Arc;
use ustr::Ustr;

/// Static description of a counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
    pub tag_keys: &'static [TagKey],
}

#[derive(Debug, Default)]
pub struct MetricRegistryBuilder {
    specs: Vec<CounterSpec>,
}

impl MetricRegistryBuilder {
    pub fn counter(mut self, spec: CounterSpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn build(self, aggregator: AggregatorHandle) -> Result<MetricRegistry, MetricError> {
        let mut counters = HashMap::with_capacity(self.specs.len());
        for spec in self.specs {
            let name = spec.name;
            let counter = Counter {
                name: Ustr::from(name),
                spec: Arc::new(spec),
                aggregator: aggregator.clone(),
            };
            if counters.insert(name, counter).is_some() {
                return Err(MetricError::DuplicateCounter(name));
            }
        }
        Ok(MetricRegistry { counters })
    }
}

/// Read-only set of declared counters.
#[derive(Debug)]
pub struct MetricRegistry {
    counters: HashMap<&'static str, Counter>,
}

impl MetricRegistry {
    pub fn builder() -> MetricRegistryBuilder {
        MetricRegistryBuilder::default()
    }

    pub fn counter(&self, name: &str) -> Result<Counter, MetricError> {
        self.counters
            .get(name)
            .cloned()
            .ok_or_else(|| MetricError::UnknownCounter(name.to_string()))
    }

    pub fn specs(&self) -> impl Iterator<Item = &CounterSpec> {
        self.counters.values().map(|c| c.spec.as_ref())
    }
}

/// Handle to one declared counter.
#[derive(Debug, Clone)]
pub struct Counter {
    name: Ustr,
    spec: Arc<CounterSpec>,
    aggregator: AggregatorHandle,
}

impl Counter {
    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn increment(&self, tags: &[(TagKey, &str)]) -> Result<(), MetricError> {
        self.add(1, tags)
    }

    /// Records `value` for the series identified by `tags`. Declared keys
    /// missing from `tags` are recorded with an empty value.
    pub fn add(&self, value: u64, tags: &[(TagKey, &str)]) -> Result<(), MetricError> {
        if let Some((undeclared, _)) = tags
            .iter()
            .find(|(key, _)| !self.spec.tag_keys.contains(key))
        {
            return Err(MetricError::UndeclaredTag {
                counter: self.spec.name,
                tag: undeclared.to_string(),
            });
        }

        let tag_set = SortedTags::from_pairs(self.spec.tag_keys.iter().map(|key| {
            let value = tags
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| *v)
                .unwrap_or_default();
            (*key, value)
        }));

        self.aggregator
            .increment(self.name, tag_set, value)
            .map_err(|_| MetricError::AggregatorClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::aggregator_service::AggregatorService;
    use crate::metrics::tags::{CLUSTER, MESSAGE_KIND, REQUEST_PATH, RESPONSE_CODE};

    const REQUESTS: CounterSpec = CounterSpec {
        name: "test.requests",
        description: "test counter",
        unit: "1",
        tag_keys: &[REQUEST_PATH, RESPONSE_CODE, CLUSTER],
    };

    #[test]
    fn test_duplicate_counter_is_rejected() {
        let (_service, handle) = AggregatorService::new(10);
        let err = MetricRegistry::builder()
            .counter(REQUESTS)
            .counter(REQUESTS)
            .build(handle)
            .unwrap_err();
        assert!(matches!(err, MetricError::DuplicateCounter("test.requests")));
    }

    #[test]
    fn test_unknown_counter_lookup() {
        let (_service, handle) = AggregatorService::new(10);
        let registry = MetricRegistry::builder()
            .counter(REQUESTS)
            .build(handle)
            .unwrap();
        assert!(registry.counter("test.requests").is_ok());
        assert!(matches!(
            registry.counter("nope"),
            Err(MetricError::UnknownCounter(_))
        ));
        assert_eq!(registry.specs().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_tags_default_to_empty() {
        let (service, handle) = AggregatorService::new(10);
        let task = tokio::spawn(service.run());
        let registry = MetricRegistry::builder()
            .counter(REQUESTS)
            .build(handle.clone())
            .unwrap();

        let counter = registry.counter("test.requests").unwrap();
        counter
            .increment(&[(REQUEST_PATH, "/foo"), (CLUSTER, "svcA")])
            .unwrap();

        let samples = handle.snapshot().await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name.as_str(), "test.requests");
        assert_eq!(samples[0].tags.get(RESPONSE_CODE), Some(""));
        assert_eq!(samples[0].tags.len(), 3);

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[test]
    fn test_undeclared_tag_is_rejected() {
        let (_service, handle) = AggregatorService::new(10);
        let registry = MetricRegistry::builder()
            .counter(REQUESTS)
            .build(handle)
            .unwrap();
        let err = registry
            .counter("test.requests")
            .unwrap()
            .increment(&[(MESSAGE_KIND, "http")])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "tag 'kind' is not declared for counter 'test.requests'"
        );
    }
}
