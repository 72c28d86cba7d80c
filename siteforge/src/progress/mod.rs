//! Live progress channel: ephemeral events fanned out to observers.

mod broadcaster;
mod event;

pub use broadcaster::{ProgressBroadcaster, ProgressListener};
pub use event::{ProgressEvent, ProgressUpdate};
