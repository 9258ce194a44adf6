//! Background Tasks Module
//!
//! Periodic tasks that run alongside a cache until told to stop.
//!
//! # Tasks
//! - Refresh worker: re-fetches every refreshable entry at a fixed interval
//! - Flush task: removes expired entries at a fixed interval
//!
//! Both stop cooperatively: a [`StopSignal`] is checked between ticks, and a
//! cycle that is already running finishes first.

mod flush;
mod refresh;
mod signal;

pub use flush::spawn_flush_task;
pub use refresh::spawn_refresh_worker;
pub use signal::{stop_channel, StopHandle, StopSignal};

use tokio::runtime::Handle;

use crate::error::{CacheError, Result};

fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|_| CacheError::NoRuntime)
}
