//! Per-connection profiling hook.
//!
//! The engine reports each finished statement through a C callback taking an
//! opaque context pointer. The hook closure is owned by its connection and the
//! pointer handed to the engine is that closure's heap address; there is no
//! process-wide registry.

use libsqlite3_sys as ffi;
use parking_lot::Mutex;
use std::ffi::{c_char, c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::time::Duration;

/// Timing data for one finished statement.
#[derive(Debug, Clone, Copy)]
pub struct ProfileEvent<'a> {
    sql: &'a str,
    ticks: u64,
}

impl<'a> ProfileEvent<'a> {
    /// Creates an event.
    pub fn new(sql: &'a str, ticks: u64) -> Self {
        Self { sql, ticks }
    }

    /// The statement's original SQL text.
    pub fn sql(&self) -> &'a str {
        self.sql
    }

    /// Elapsed wall-clock time in engine ticks (nanoseconds).
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Elapsed wall-clock time.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.ticks)
    }
}

/// A boxed profiling hook.
pub(crate) type ProfileHook = Box<dyn FnMut(&ProfileEvent<'_>) + Send>;

/// Storage for the hook currently registered with the engine.
#[derive(Default)]
pub(crate) struct ProfileSlot {
    current: Mutex<Option<NonNull<ProfileHook>>>,
}

impl ProfileSlot {
    /// Registers `hook` (or unregisters when `None`) and releases the previous one.
    ///
    /// The engine is pointed at the new hook before the old one is freed, so
    /// no callback can observe a dangling context.
    pub(crate) fn install(&self, db: *mut ffi::sqlite3, hook: Option<ProfileHook>) {
        let mut current = self.current.lock();
        let next = hook.map(|hook| {
            // SAFETY: Box::into_raw never returns null.
            unsafe { NonNull::new_unchecked(Box::into_raw(Box::new(hook))) }
        });

        if !db.is_null() {
            match next {
                // SAFETY: `db` is live; `ptr` stays valid until the next install.
                Some(ptr) => unsafe {
                    ffi::sqlite3_profile(db, Some(profile_trampoline), ptr.as_ptr().cast());
                },
                // SAFETY: `db` is live; a null callback unregisters.
                None => unsafe {
                    ffi::sqlite3_profile(db, None, ptr::null_mut());
                },
            };
        }

        let previous = std::mem::replace(&mut *current, next);
        if let Some(previous) = previous {
            // SAFETY: produced by Box::into_raw above and no longer registered.
            drop(unsafe { Box::from_raw(previous.as_ptr()) });
        }
    }

    /// Returns true if a hook is registered.
    pub(crate) fn is_installed(&self) -> bool {
        self.current.lock().is_some()
    }
}

impl Drop for ProfileSlot {
    fn drop(&mut self) {
        if let Some(hook) = self.current.get_mut().take() {
            // SAFETY: produced by Box::into_raw in `install`; the owning
            // connection has closed its handle by the time its fields drop.
            drop(unsafe { Box::from_raw(hook.as_ptr()) });
        }
    }
}

unsafe extern "C" fn profile_trampoline(
    context: *mut c_void,
    sql: *const c_char,
    ticks: ffi::sqlite3_uint64,
) {
    if context.is_null() {
        return;
    }
    // SAFETY: `context` is the pointer registered by `ProfileSlot::install`,
    // alive for as long as it stays registered. The engine calls back on the
    // thread that is stepping the connection, which holds it exclusively.
    let hook = unsafe { &mut *context.cast::<ProfileHook>() };
    let text = if sql.is_null() {
        std::borrow::Cow::Borrowed("")
    } else {
        // SAFETY: the engine passes a nul-terminated statement text.
        unsafe { CStr::from_ptr(sql) }.to_string_lossy()
    };
    let event = ProfileEvent::new(&text, ticks);

    // Unwinding across the C frame is undefined.
    if catch_unwind(AssertUnwindSafe(|| hook(&event))).is_err() {
        tracing::error!(sql = %text, "profile hook panicked");
    }
}
