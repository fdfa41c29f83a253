//! Loop thread configuration

use std::time::Duration;
use thunk_core::constants::{
    DEFAULT_IDLE_PARK_US, DEFAULT_LOOP_THREAD_NAME, DEFAULT_QUEUE_CAPACITY,
};
use thunk_core::env::{env_get, env_get_micros, env_get_str};

/// Configuration for the loop thread
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum number of queued, not yet executing thunks
    pub queue_capacity: usize,

    /// Longest time the idle loop thread parks before re-checking its queue
    pub idle_park: Duration,

    /// OS thread name of the loop thread
    pub thread_name: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_park: Duration::from_micros(DEFAULT_IDLE_PARK_US),
            thread_name: DEFAULT_LOOP_THREAD_NAME.to_string(),
        }
    }
}

impl LoopConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by the environment
    ///
    /// - `THUNK_QUEUE_CAPACITY` - queue slots
    /// - `THUNK_IDLE_PARK_US` - idle park timeout in microseconds
    /// - `THUNK_LOOP_NAME` - loop thread name
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            queue_capacity: env_get("THUNK_QUEUE_CAPACITY", defaults.queue_capacity),
            idle_park: env_get_micros("THUNK_IDLE_PARK_US", defaults.idle_park),
            thread_name: env_get_str("THUNK_LOOP_NAME", &defaults.thread_name),
        }
    }

    /// Set queue capacity
    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    /// Set idle park timeout
    pub fn idle_park(mut self, d: Duration) -> Self {
        self.idle_park = d;
        self
    }

    /// Set loop thread name
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be at least 1");
        }
        if self.idle_park.is_zero() {
            return Err("idle_park must be non-zero");
        }
        if self.thread_name.is_empty() {
            return Err("thread_name must not be empty");
        }
        if self.thread_name.contains('\0') {
            return Err("thread_name must not contain NUL");
        }
        Ok(())
    }
}
