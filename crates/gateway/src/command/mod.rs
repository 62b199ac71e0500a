// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command processing: validation, per-device priority queues, batching/dedup, rate
//! limiting, and retry before dispatch through the registry (design note 4.5).

pub mod model;
pub mod processor;
pub mod queue;
pub mod rate;

pub use model::{Command, CommandKind, Priority};
pub use processor::{CommandProcessor, CommandProcessorConfig};
pub use queue::DeviceQueue;
pub use rate::{DeviceRateConfig, DeviceTokenBucket};
