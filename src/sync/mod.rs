//! Colony state synchronization

pub mod coordinator;
pub mod dirty;
pub mod subscribers;
pub mod world;

pub use coordinator::{PassOutcome, PassReport, SyncCoordinator};
pub use dirty::{SyncChannel, SyncPass, SyncSubsystem};
pub use subscribers::{InterestRadii, SubscriberSet};
pub use world::{ConnectedClient, WorldSnapshot};
