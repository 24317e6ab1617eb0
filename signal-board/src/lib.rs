#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Signal Board
//! Status aggregation over a loosely structured analytics upstream.
//!
//! Polls one analytics endpoint and one trading bot liveness endpoint, then produces two
//! always-populated outputs:
//! * A [`NormalizedSignal`](normalize::NormalizedSignal) for every token of the fixed
//!   [`TOKENS`](universe::TOKENS) universe, sorted by score.
//! * A [`HealthStatus`](health::HealthStatus) with a freshness verdict for the most recent
//!   signal.
//!
//! Upstream failures never reach the caller: every failure path degrades to a well-defined
//! default payload. See [`SignalBoard`](board::SignalBoard) for the exposed operations.

/// The [`SignalBoard`](board::SignalBoard) and its combined dashboard payload.
pub mod board;

/// Upstream endpoints, fixed timeouts and the freshness threshold.
pub mod config;

/// All errors generated in `signal-board`.
pub mod error;

/// Raw Fetcher: the [`Transport`](fetch::Transport) seam and its sentinel-producing helpers.
pub mod fetch;

/// Health Aggregator.
pub mod health;

/// Signal Normalizer.
pub mod normalize;

/// The fixed token universe.
pub mod universe;

/// Safe accessors over untrusted JSON.
pub mod value;

pub use board::{Dashboard, SignalBoard};
pub use config::BoardConfig;
pub use error::{CombinedError, ConfigError, FetchError, NormalizeError};
pub use fetch::{HttpTransport, Transport};
pub use health::{HealthStatus, ServiceStatus};
pub use normalize::{Action, NormalizedSignal};
