//! Operational notices.
//!
//! `notice!` logs at WARN under the `tableshim::notice` target. A
//! [`NoticeCapture`] additionally records every notice raised on the current
//! thread while it is alive, which lets callers and tests see the fallback and
//! partial-failure messages without installing a logger.

use std::cell::RefCell;
use std::marker::PhantomData;

/// Log target for notices.
pub const NOTICE_TARGET: &str = "tableshim::notice";

thread_local! {
    static CAPTURED: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Records notices raised on this thread until dropped. Starting a new capture
/// discards whatever an earlier one on the same thread held.
pub struct NoticeCapture {
    // Tied to the thread whose notices it records.
    _thread: PhantomData<*const ()>,
}

impl NoticeCapture {
    #[must_use]
    pub fn start() -> Self {
        CAPTURED.with(|c| *c.borrow_mut() = Some(Vec::new()));
        Self { _thread: PhantomData }
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        CAPTURED.with(|c| c.borrow().clone().unwrap_or_default())
    }

    /// Removes and returns what has been captured so far.
    pub fn take(&self) -> Vec<String> {
        CAPTURED.with(|c| c.borrow_mut().as_mut().map(std::mem::take).unwrap_or_default())
    }

    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        CAPTURED.with(|c| c.borrow().as_ref().is_some_and(|v| v.iter().any(|m| m.contains(needle))))
    }
}

impl Drop for NoticeCapture {
    fn drop(&mut self) {
        CAPTURED.with(|c| *c.borrow_mut() = None);
    }
}

#[doc(hidden)]
pub fn record(message: &str) {
    CAPTURED.with(|c| {
        if let Some(v) = c.borrow_mut().as_mut() {
            v.push(message.to_owned());
        }
    });
}

/// Emits an operational notice.
#[macro_export]
macro_rules! notice {
    ($($arg:tt)*) => {{
        let __notice = format!($($arg)*);
        $crate::utils::devlog::record(&__notice);
        log::log!(target: $crate::utils::devlog::NOTICE_TARGET, log::Level::Warn, "{}", __notice);
    }};
}
