//! Colony Sync Server Library
//!
//! Server-side state synchronization for persistent colonies: subscriber
//! interest management, dirty-flag gated dispatch, and the persisted work
//! order model.

pub mod colony;
pub mod config;
pub mod metrics;
pub mod net;
pub mod persist;
pub mod sync;
pub mod util;
