//! Redpanda (Kafka-compatible) backend for the sync job queue.

pub mod client;
pub mod config;
pub mod consumer;
pub mod dead_letters;
pub mod health;
pub mod partitioner;
pub mod producer;
pub mod queue;
pub mod topics;

pub use config::*;
pub use queue::RedpandaQueue;
