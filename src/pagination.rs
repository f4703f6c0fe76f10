//! Paging through result sets the store returns in bounded chunks.
//!
//! `drain` buffers every page; `stream` pushes each page to an [`EntitySink`]
//! as it arrives. Both sanitize every page and honour the query's `top` cap.

mod cursor;
mod sinks;

pub use cursor::{PageCursor, drain, stream};
pub use sinks::{ChannelSink, EntitySink, NdjsonSink, VecSink};
