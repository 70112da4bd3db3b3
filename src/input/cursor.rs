//! Shared mouse cursor
//!
//! One cursor image serves every mouse and touchpad. It is created on first
//! use, kept for the life of the process, and shown only while at least one
//! such device is connected.

use log::{debug, warn};

use super::sink::{CursorHandle, InputSink};

#[derive(Debug, Default)]
pub struct CursorManager {
    cursor: Option<CursorHandle>,
    visible: bool,
}

impl CursorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cursor handle, creating the image if needed
    pub fn ensure(&mut self, sink: &mut dyn InputSink) -> Option<CursorHandle> {
        if self.cursor.is_none() {
            match sink.create_cursor() {
                Some(handle) => {
                    sink.set_cursor_visible(handle, false);
                    self.cursor = Some(handle);
                    self.visible = false;
                    debug!("Cursor created");
                }
                None => warn!("Could not create cursor image"),
            }
        }
        self.cursor
    }

    /// Show the cursor iff any mouse or touchpad is connected
    pub fn update_visibility(
        &mut self,
        sink: &mut dyn InputSink,
        mouse_count: usize,
        touchpad_count: usize,
    ) {
        let visible = mouse_count + touchpad_count > 0;
        let cursor = if visible {
            self.ensure(sink)
        } else {
            self.cursor
        };
        let Some(cursor) = cursor else {
            return;
        };
        if self.visible != visible {
            sink.set_cursor_visible(cursor, visible);
            self.visible = visible;
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn handle(&self) -> Option<CursorHandle> {
        self.cursor
    }
}
