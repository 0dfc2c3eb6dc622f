// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tag vocabulary shared by every counter.

use std::fmt;
use ustr::Ustr;

/// Name of a metric label. Declared as constants and checked by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagKey(&'static str);

impl TagKey {
    pub const fn new(name: &'static str) -> Self {
        TagKey(name)
    }

    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

pub const REQUEST_PATH: TagKey = TagKey::new("request_path");
pub const RESPONSE_CODE: TagKey = TagKey::new("response_code");
pub const CLUSTER: TagKey = TagKey::new("cluster");
pub const MESSAGE_KIND: TagKey = TagKey::new("kind");
pub const STREAM_STATUS: TagKey = TagKey::new("status");

/// Immutable key/value set attached to one counter sample, ordered by key so
/// equal sets hash and compare equal regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SortedTags {
    values: Vec<(Ustr, Ustr)>,
}

impl SortedTags {
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (TagKey, &'a str)>) -> Self {
        let mut values: Vec<(Ustr, Ustr)> = pairs
            .into_iter()
            .map(|(k, v)| (Ustr::from(k.as_str()), Ustr::from(v)))
            .collect();
        values.sort_unstable();
        values.dedup_by(|a, b| a.0 == b.0);
        SortedTags { values }
    }

    pub fn get(&self, key: TagKey) -> Option<&str> {
        self.values
            .binary_search_by(|(k, _)| k.as_str().cmp(key.as_str()))
            .ok()
            .map(|i| self.values[i].1.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for SortedTags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}:{v}")?;
        }
        Ok(())
    }
}
