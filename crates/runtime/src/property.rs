// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! String-keyed property bags for devices and compiled models.

use std::collections::BTreeMap;
use std::fmt;

/// Properties as written by callers: key → string value.
pub type PropertyMap = BTreeMap<String, String>;

/// Builds a [`PropertyMap`] from key/value pairs.
///
/// ```
/// use infer_runtime::properties;
/// let config = properties([("THROUGHPUT_STREAMS", "4")]);
/// assert_eq!(config["THROUGHPUT_STREAMS"], "4");
/// ```
pub fn properties<I, K, V>(pairs: I) -> PropertyMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Canonical property keys understood by the built-in devices.
pub mod keys {
    pub const NUM_STREAMS: &str = "NUM_STREAMS";
    pub const THROUGHPUT_STREAMS: &str = "THROUGHPUT_STREAMS";
    pub const CPU_THROUGHPUT_STREAMS: &str = "CPU_THROUGHPUT_STREAMS";
    pub const PERFORMANCE_HINT: &str = "PERFORMANCE_HINT";
    pub const PERFORMANCE_HINT_NUM_REQUESTS: &str = "PERFORMANCE_HINT_NUM_REQUESTS";
    pub const ENABLE_PROFILING: &str = "ENABLE_PROFILING";
    pub const DEVICE_MEMORY_BUDGET: &str = "DEVICE_MEMORY_BUDGET";

    pub const OPTIMAL_NUMBER_OF_REQUESTS: &str = "OPTIMAL_NUMBER_OF_REQUESTS";
    pub const OPTIMAL_NUMBER_OF_INFER_REQUESTS: &str = "OPTIMAL_NUMBER_OF_INFER_REQUESTS";
    pub const SUPPORTED_PROPERTIES: &str = "SUPPORTED_PROPERTIES";
    pub const FULL_DEVICE_NAME: &str = "FULL_DEVICE_NAME";
    pub const RANGE_FOR_STREAMS: &str = "RANGE_FOR_STREAMS";

    /// Compiled models only.
    pub const NETWORK_NAME: &str = "NETWORK_NAME";
}

/// Whether callers may write a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    ReadOnly,
    ReadWrite,
}

/// A property a device declares, as listed by `SUPPORTED_PROPERTIES`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: &'static str,
    pub mutability: Mutability,
}

impl PropertyInfo {
    pub const fn read_only(name: &'static str) -> Self {
        Self {
            name,
            mutability: Mutability::ReadOnly,
        }
    }

    pub const fn read_write(name: &'static str) -> Self {
        Self {
            name,
            mutability: Mutability::ReadWrite,
        }
    }

    pub fn is_mutable(&self) -> bool {
        self.mutability == Mutability::ReadWrite
    }
}

/// A property value as read back from a device.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Str(String),
    Int(u64),
    Bool(bool),
    List(Vec<String>),
}

impl PropertyValue {
    pub fn as_int(&self) -> Option<u64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            PropertyValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            PropertyValue::List(v) => Some(v),
            _ => None,
        }
    }
}

/// Renders the value the way it would be written back with `set_property`.
impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Str(s) => f.write_str(s),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Bool(true) => f.write_str("YES"),
            PropertyValue::Bool(false) => f.write_str("NO"),
            PropertyValue::List(items) => f.write_str(&items.join(" ")),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Str(s)
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<usize> for PropertyValue {
    fn from(v: usize) -> Self {
        PropertyValue::Int(v as u64)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

/// Parses the boolean spellings accepted in property bags.
pub(crate) fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_uppercase().as_str() {
        "YES" | "TRUE" | "ON" | "1" => Some(true),
        "NO" | "FALSE" | "OFF" | "0" => Some(false),
        _ => None,
    }
}
