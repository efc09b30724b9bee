// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Built-in devices.

pub mod cpu;

pub use cpu::{CpuConfig, CpuDevice, PerformanceHint, Streams};
