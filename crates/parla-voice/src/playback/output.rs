//! `AudioOutput` abstraction over the host audio subsystem.
//!
//! An output takes ownership of a [`PlaybackCallback`] and drives it from
//! whatever thread the host schedules. Closing the returned handle must stop
//! the callback from running again before it returns, so the controller can
//! tear the queue down afterwards.

use super::PlaybackCallback;
use crate::config::StreamConfig;
use crate::error::BridgeError;

/// Something that can open a device stream for a session.
pub trait AudioOutput: Send {
    /// Open and start a stream that calls `callback` once per period.
    fn open(
        &self,
        stream: StreamConfig,
        callback: PlaybackCallback,
    ) -> Result<Box<dyn OutputStreamHandle>, BridgeError>;
}

/// A running device stream.
pub trait OutputStreamHandle: Send {
    /// Stop and release the stream. The callback is not invoked afterwards.
    fn close(self: Box<Self>);
}
