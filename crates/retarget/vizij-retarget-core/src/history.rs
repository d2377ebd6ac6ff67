//! Host undo-history control.
//!
//! Bakes and snaps turn undo recording off for their whole duration; the
//! [`UndoSuspension`] guard restores the previous setting when dropped, on
//! success and on error alike.

use tracing::debug;

/// Host-side switch for undo recording.
pub trait UndoHistory {
    fn is_recording(&self) -> bool;
    fn set_recording(&mut self, enabled: bool);
}

/// For hosts without an undo stack.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoUndo;

impl UndoHistory for NoUndo {
    fn is_recording(&self) -> bool {
        false
    }

    fn set_recording(&mut self, _enabled: bool) {}
}

/// Plain in-memory recording flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UndoFlag {
    pub recording: bool,
}

impl Default for UndoFlag {
    fn default() -> Self {
        Self { recording: true }
    }
}

impl UndoHistory for UndoFlag {
    fn is_recording(&self) -> bool {
        self.recording
    }

    fn set_recording(&mut self, enabled: bool) {
        self.recording = enabled;
    }
}

/// Disables recording on creation and restores the prior state on drop.
pub struct UndoSuspension<'a, H: UndoHistory + ?Sized> {
    history: &'a mut H,
    previous: bool,
}

impl<'a, H: UndoHistory + ?Sized> UndoSuspension<'a, H> {
    pub fn new(history: &'a mut H) -> Self {
        let previous = history.is_recording();
        history.set_recording(false);
        debug!(previous, "undo recording suspended");
        Self { history, previous }
    }
}

impl<H: UndoHistory + ?Sized> Drop for UndoSuspension<'_, H> {
    fn drop(&mut self) {
        self.history.set_recording(self.previous);
        debug!(restored = self.previous, "undo recording restored");
    }
}
