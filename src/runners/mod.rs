//! Execution entry points layered on top of `Engine` (§5): run synchronously
//! inline, enqueue for a worker pool, or subscribe to a live event stream.
//! The engine itself is runner-agnostic; these are thin conveniences.

mod stream;
mod sync;
mod task_queue;

pub use stream::{Event, StreamRunner};
pub use sync::SyncRunner;
pub use task_queue::{Adapter, AsyncRunner, Job};
