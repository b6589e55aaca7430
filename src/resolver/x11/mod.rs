//! X11 platform adapter: reference implementation of the resolver
//! abstraction.
//!
//! X11 has no clipboard change counter. [`SelectionWatcher`] builds one
//! from XFixes selection-owner notifications: every owner change on
//! `CLIPBOARD` bumps the counter. Events are drained without blocking
//! whenever the counter is sampled, so no event thread is needed.

pub mod clipboard;

use std::sync::atomic::{AtomicU64, Ordering};

use x11rb::connection::{Connection, RequestConnection};
use x11rb::protocol::Event;
use x11rb::protocol::xfixes::{self, ConnectionExt as _, SelectionEventMask};
use x11rb::protocol::xproto::{self, Atom};
use x11rb::rust_connection::RustConnection;

use super::ResolverError;

/// XFixes version requested during setup. Selection tracking needs 1.0+.
const XFIXES_VERSION: (u32, u32) = (5, 0);

/// XFixes-backed change counter for the `CLIPBOARD` selection.
pub struct SelectionWatcher {
    conn: RustConnection,
    clipboard: Atom,
    changes: AtomicU64,
}

impl std::fmt::Debug for SelectionWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionWatcher")
            .field("clipboard", &self.clipboard)
            .field("changes", &self.changes)
            .finish_non_exhaustive()
    }
}

impl SelectionWatcher {
    /// Connect to the X11 display and subscribe to `CLIPBOARD` owner
    /// changes on the root window.
    pub fn connect() -> Result<Self, ResolverError> {
        let (conn, screen_num) = RustConnection::connect(None)
            .map_err(|e| ResolverError::Display(format!("X11 connect failed: {e}")))?;

        let root = conn.setup().roots[screen_num].root;

        if conn
            .extension_information(xfixes::X11_EXTENSION_NAME)
            .map_err(|e| ResolverError::Display(format!("query XFixes: {e}")))?
            .is_none()
        {
            return Err(ResolverError::Display(
                "XFixes extension not available".into(),
            ));
        }

        let version = conn
            .xfixes_query_version(XFIXES_VERSION.0, XFIXES_VERSION.1)
            .map_err(|e| ResolverError::Display(format!("xfixes_query_version: {e}")))?
            .reply()
            .map_err(|e| ResolverError::Display(format!("xfixes_query_version reply: {e}")))?;

        let clipboard = xproto::intern_atom(&conn, false, b"CLIPBOARD")
            .map_err(|e| ResolverError::Display(format!("intern_atom: {e}")))?
            .reply()
            .map_err(|e| ResolverError::Display(format!("intern_atom reply: {e}")))?
            .atom;

        conn.xfixes_select_selection_input(
            root,
            clipboard,
            SelectionEventMask::SET_SELECTION_OWNER
                | SelectionEventMask::SELECTION_WINDOW_DESTROY
                | SelectionEventMask::SELECTION_CLIENT_CLOSE,
        )
        .map_err(|e| ResolverError::Display(format!("xfixes_select_selection_input: {e}")))?;
        conn.flush()
            .map_err(|e| ResolverError::Display(format!("flush: {e}")))?;

        tracing::debug!(
            screen = screen_num,
            xfixes_major = version.major_version,
            xfixes_minor = version.minor_version,
            "watching CLIPBOARD selection"
        );

        Ok(Self {
            conn,
            clipboard,
            changes: AtomicU64::new(0),
        })
    }

    /// Drain pending selection events and return the change counter.
    pub fn sample(&self) -> Result<u64, ResolverError> {
        loop {
            match self.conn.poll_for_event() {
                Ok(Some(Event::XfixesSelectionNotify(ev))) if ev.selection == self.clipboard => {
                    self.changes.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    return Err(ResolverError::Display(format!("X11 connection error: {e}")));
                }
            }
        }
        Ok(self.changes.load(Ordering::Relaxed))
    }
}
