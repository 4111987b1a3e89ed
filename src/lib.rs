// Statically allocated timeline scheduler for interrupt-driven firmware

#![cfg_attr(not(test), no_std)]

pub mod config {
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

pub mod kernel;

pub use kernel::{
    ActionId, ActionScheduler, Callback, CancelError, Disposition, ScheduleError, TickCounter,
};

/// Scheduler sized by [`config::MAX_NODES`].
pub type DefaultScheduler<M, T> = ActionScheduler<M, T, { config::MAX_NODES }>;
