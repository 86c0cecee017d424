//! poly-exec: Market data consistency and execution safety for Polymarket
//!
//! This library provides the core components for:
//! - Bounded LRU/TTL caching
//! - A market data store fed by the WebSocket push feed and REST polls
//! - Immutable per-attempt market snapshots with integrity checks
//! - Liquidity-aware smart selling with fill verification
//! - Endpoint latency monitoring and trading blocks
//! - Scavenger mode for illiquid markets
//! - A market scanner producing trade candidates
//! - Full observability stack

pub mod cache;
pub mod cli;
pub mod config;
pub mod execution;
pub mod latency;
pub mod market;
pub mod market_data;
pub mod notify;
pub mod orderbook;
pub mod scanner;
pub mod scavenger;
pub mod snapshot;
pub mod telemetry;
