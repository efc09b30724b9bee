// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Property handling for the reference CPU device.

use std::fmt;
use std::num::NonZeroUsize;

use memory_manager::MemoryBudget;

use crate::property::{keys, parse_flag, PropertyInfo, PropertyMap, PropertyValue};
use crate::RuntimeError;

/// Every property the CPU device answers, in `SUPPORTED_PROPERTIES` order.
pub(crate) const PROPERTIES: &[PropertyInfo] = &[
    PropertyInfo::read_write(keys::NUM_STREAMS),
    PropertyInfo::read_write(keys::THROUGHPUT_STREAMS),
    PropertyInfo::read_write(keys::CPU_THROUGHPUT_STREAMS),
    PropertyInfo::read_write(keys::PERFORMANCE_HINT),
    PropertyInfo::read_write(keys::PERFORMANCE_HINT_NUM_REQUESTS),
    PropertyInfo::read_write(keys::ENABLE_PROFILING),
    PropertyInfo::read_write(keys::DEVICE_MEMORY_BUDGET),
    PropertyInfo::read_only(keys::OPTIMAL_NUMBER_OF_REQUESTS),
    PropertyInfo::read_only(keys::OPTIMAL_NUMBER_OF_INFER_REQUESTS),
    PropertyInfo::read_only(keys::SUPPORTED_PROPERTIES),
    PropertyInfo::read_only(keys::FULL_DEVICE_NAME),
    PropertyInfo::read_only(keys::RANGE_FOR_STREAMS),
];

/// Number of parallel execution streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Streams {
    /// Let the device pick from the hardware and the performance hint.
    Auto,
    Fixed(NonZeroUsize),
}

impl Streams {
    fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("AUTO") || value == "-1" {
            return Some(Streams::Auto);
        }
        value.parse().ok().map(Streams::Fixed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PerformanceHint {
    #[default]
    Undefined,
    Latency,
    Throughput,
}

impl PerformanceHint {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "" | "UNDEFINED" => Some(Self::Undefined),
            "LATENCY" => Some(Self::Latency),
            "THROUGHPUT" => Some(Self::Throughput),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "UNDEFINED",
            Self::Latency => "LATENCY",
            Self::Throughput => "THROUGHPUT",
        }
    }
}

impl fmt::Display for PerformanceHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Effective configuration of the CPU device or of one compiled model.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuConfig {
    /// `None` until a stream count is written.
    pub streams: Option<Streams>,
    pub hint: PerformanceHint,
    /// Upper bound on requests the caller intends to run; 0 means unset.
    pub hint_num_requests: usize,
    pub profiling: bool,
    /// Budget for the activation buffers of all requests of one compiled model.
    pub memory_budget: MemoryBudget,
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            streams: None,
            hint: PerformanceHint::Undefined,
            hint_num_requests: 0,
            profiling: false,
            memory_budget: MemoryBudget::unlimited(),
        }
    }
}

pub(crate) fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

impl CpuConfig {
    /// Returns a copy with `properties` applied, or the first rejection.
    pub fn merged(&self, device: &str, properties: &PropertyMap) -> Result<Self, RuntimeError> {
        let mut next = self.clone();
        for (key, value) in properties {
            next.apply(device, key, value)?;
        }
        Ok(next)
    }

    fn apply(&mut self, device: &str, key: &str, value: &str) -> Result<(), RuntimeError> {
        let bad_value = |expected: &str| {
            RuntimeError::unsupported(device, key, format!("invalid value '{value}', expected {expected}"))
        };
        match key {
            keys::NUM_STREAMS | keys::THROUGHPUT_STREAMS | keys::CPU_THROUGHPUT_STREAMS => {
                let streams = Streams::parse(value)
                    .ok_or_else(|| bad_value("a positive integer or AUTO"))?;
                self.streams = Some(streams);
            }
            keys::PERFORMANCE_HINT => {
                self.hint = PerformanceHint::parse(value)
                    .ok_or_else(|| bad_value("LATENCY or THROUGHPUT"))?;
            }
            keys::PERFORMANCE_HINT_NUM_REQUESTS => {
                self.hint_num_requests = value
                    .trim()
                    .parse()
                    .map_err(|_| bad_value("a non-negative integer"))?;
            }
            keys::ENABLE_PROFILING => {
                self.profiling = parse_flag(value).ok_or_else(|| bad_value("YES or NO"))?;
            }
            keys::DEVICE_MEMORY_BUDGET => {
                self.memory_budget = if value.trim().eq_ignore_ascii_case("unlimited") {
                    MemoryBudget::unlimited()
                } else {
                    MemoryBudget::parse(value).map_err(|_| bad_value("a size such as 512M"))?
                };
            }
            _ if PROPERTIES.iter().any(|p| p.name == key) => {
                return Err(RuntimeError::unsupported(device, key, "property is read-only"));
            }
            _ => return Err(RuntimeError::unsupported(device, key, "unknown property")),
        }
        Ok(())
    }

    /// Requests needed to keep the device busy.
    pub fn optimal_requests(&self) -> usize {
        let limit = available_parallelism();
        let hinted = || match self.hint_num_requests {
            0 => limit,
            n => n.min(limit),
        };
        match (self.streams, self.hint) {
            (Some(Streams::Fixed(n)), _) => n.get(),
            (Some(Streams::Auto), _) | (None, PerformanceHint::Throughput) => hinted(),
            (None, _) => 1,
        }
    }

    pub fn get(&self, device: &str, key: &str) -> Result<PropertyValue, RuntimeError> {
        let value = match key {
            keys::NUM_STREAMS | keys::THROUGHPUT_STREAMS | keys::CPU_THROUGHPUT_STREAMS => {
                match self.streams {
                    Some(Streams::Auto) => PropertyValue::from("AUTO"),
                    Some(Streams::Fixed(n)) => PropertyValue::from(n.get()),
                    None => PropertyValue::Int(1),
                }
            }
            keys::PERFORMANCE_HINT => PropertyValue::from(self.hint.as_str()),
            keys::PERFORMANCE_HINT_NUM_REQUESTS => PropertyValue::from(self.hint_num_requests),
            keys::ENABLE_PROFILING => PropertyValue::Bool(self.profiling),
            keys::DEVICE_MEMORY_BUDGET => PropertyValue::Str(self.memory_budget.to_string()),
            keys::OPTIMAL_NUMBER_OF_REQUESTS | keys::OPTIMAL_NUMBER_OF_INFER_REQUESTS => {
                PropertyValue::from(self.optimal_requests())
            }
            keys::SUPPORTED_PROPERTIES => {
                PropertyValue::List(PROPERTIES.iter().map(|p| p.name.to_string()).collect())
            }
            keys::FULL_DEVICE_NAME => PropertyValue::Str(format!(
                "Reference CPU ({} threads)",
                available_parallelism()
            )),
            keys::RANGE_FOR_STREAMS => PropertyValue::List(vec![
                "1".to_string(),
                available_parallelism().to_string(),
            ]),
            _ => return Err(RuntimeError::unsupported(device, key, "unknown property")),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::properties;

    fn get(config: &CpuConfig, key: &str) -> String {
        config.get("CPU", key).unwrap().to_string()
    }

    #[test]
    fn test_defaults() {
        let config = CpuConfig::default();
        assert_eq!(config.optimal_requests(), 1);
        assert_eq!(get(&config, keys::NUM_STREAMS), "1");
        assert_eq!(get(&config, keys::PERFORMANCE_HINT), "UNDEFINED");
        assert_eq!(get(&config, keys::ENABLE_PROFILING), "NO");
        assert_eq!(get(&config, keys::DEVICE_MEMORY_BUDGET), "unlimited");
    }

    #[test]
    fn test_stream_aliases_share_state() {
        let config = CpuConfig::default()
            .merged("CPU", &properties([(keys::THROUGHPUT_STREAMS, "4")]))
            .unwrap();
        assert_eq!(config.optimal_requests(), 4);
        assert_eq!(get(&config, keys::NUM_STREAMS), "4");
        assert_eq!(get(&config, keys::CPU_THROUGHPUT_STREAMS), "4");
        assert_eq!(get(&config, keys::OPTIMAL_NUMBER_OF_INFER_REQUESTS), "4");
    }

    #[test]
    fn test_auto_streams_follow_hint() {
        let limit = available_parallelism();
        let auto = CpuConfig::default()
            .merged("CPU", &properties([(keys::NUM_STREAMS, "AUTO")]))
            .unwrap();
        assert_eq!(auto.optimal_requests(), limit);
        assert_eq!(get(&auto, keys::NUM_STREAMS), "AUTO");

        let hinted = CpuConfig::default()
            .merged(
                "CPU",
                &properties([
                    (keys::PERFORMANCE_HINT, "THROUGHPUT"),
                    (keys::PERFORMANCE_HINT_NUM_REQUESTS, "1"),
                ]),
            )
            .unwrap();
        assert_eq!(hinted.optimal_requests(), 1);

        let latency = CpuConfig::default()
            .merged("CPU", &properties([(keys::PERFORMANCE_HINT, "LATENCY")]))
            .unwrap();
        assert_eq!(latency.optimal_requests(), 1);
    }

    #[test]
    fn test_round_trip_of_mutable_keys() {
        let written = [
            (keys::NUM_STREAMS, "3"),
            (keys::PERFORMANCE_HINT, "THROUGHPUT"),
            (keys::PERFORMANCE_HINT_NUM_REQUESTS, "8"),
            (keys::ENABLE_PROFILING, "YES"),
            (keys::DEVICE_MEMORY_BUDGET, "64M"),
        ];
        let config = CpuConfig::default()
            .merged("CPU", &properties(written))
            .unwrap();
        for (key, value) in written {
            assert_eq!(get(&config, key), value, "{key}");
        }
    }

    #[test]
    fn test_rejections_leave_config_untouched() {
        let base = CpuConfig::default();
        for (key, value) in [
            (keys::NUM_STREAMS, "0"),
            (keys::NUM_STREAMS, "many"),
            (keys::PERFORMANCE_HINT, "FAST"),
            (keys::ENABLE_PROFILING, "perhaps"),
            (keys::DEVICE_MEMORY_BUDGET, "0M"),
            (keys::OPTIMAL_NUMBER_OF_REQUESTS, "2"),
            ("CPU_BIND_THREAD", "YES"),
        ] {
            let props = properties([(keys::PERFORMANCE_HINT, "THROUGHPUT"), (key, value)]);
            let err = base.merged("CPU", &props).unwrap_err();
            assert!(
                matches!(err, RuntimeError::UnsupportedConfig { .. }),
                "{key}={value}"
            );
        }
        assert_eq!(base, CpuConfig::default());
    }

    #[test]
    fn test_read_only_listing() {
        let config = CpuConfig::default();
        let supported = config.get("CPU", keys::SUPPORTED_PROPERTIES).unwrap();
        assert_eq!(supported.as_list().unwrap().len(), PROPERTIES.len());
        assert!(get(&config, keys::FULL_DEVICE_NAME).starts_with("Reference CPU"));
        let range = config.get("CPU", keys::RANGE_FOR_STREAMS).unwrap();
        assert_eq!(range.as_list().unwrap()[0], "1");
        assert!(config.get("CPU", "NOPE").is_err());
    }
}
