// Timeline scheduler and its tick source
// Single core, one interrupt context racing the main loop.
//
// pool:      fixed slots, free-slot scan, generations
// timeline:  delta-encoded ordering over pool slots
// handle:    generational ActionId
// scheduler: public surface, tick processing, critical sections
// wake:      ISR-fed elapsed tick counter, WFI

pub mod handle;
mod pool;
pub mod scheduler;
mod timeline;
pub mod wake;

pub use handle::{ActionId, INVALID_RAW_ID};
pub use scheduler::{ActionScheduler, Callback, CancelError, Disposition, ScheduleError};
pub use wake::{TickCounter, wait_for_interrupt};
