//! Synthesis engine handle.
//!
//! The bridge only talks to the engine through [`SynthesisEngine`] and
//! [`EngineSpawner`], so the concurrency logic can be driven by an in-process
//! fake (`testing` module, feature `test-utils`) instead of a real Piper
//! binary.
//!
//! | Implementor | Where used |
//! |---|---|
//! | [`PiperSpawner`] / [`PiperEngine`] | Production: persistent `piper --output-raw` subprocess |
//! | `testing::FakeSpawner` | Tests: synthetic PCM generated per text line |

mod piper;
mod shutdown;

use std::io::{self, Read};

pub use piper::{PiperEngine, PiperSpawner, build_command};
pub use shutdown::terminate_child;

use crate::config::BridgeConfig;
use crate::error::BridgeError;

/// Raw PCM byte stream produced by an engine.
pub type EngineOutput = Box<dyn Read + Send>;

/// A running synthesis engine.
pub trait SynthesisEngine: Send {
    /// Send one line of text for synthesis. `line` must not contain a newline.
    ///
    /// Fails with [`BridgeError::EngineClosed`] once the engine has exited.
    fn write_text(&mut self, line: &str) -> Result<(), BridgeError>;

    /// Close the input without signalling. The engine finishes the lines it
    /// has, ends its output and exits on its own.
    fn finish_input(&mut self);

    /// Hand over the engine's audio output. Returns `None` after the first call.
    fn take_output(&mut self) -> Option<EngineOutput>;

    /// Close the input, ask the engine to exit, and force it after the grace
    /// period. Calling it again is a no-op.
    fn terminate(&mut self) -> Result<(), BridgeError>;

    /// Whether the engine is still running.
    fn is_alive(&mut self) -> bool;

    /// OS process id, when there is one.
    fn pid(&self) -> Option<u32> {
        None
    }
}

/// Launches [`SynthesisEngine`]s.
#[cfg_attr(test, mockall::automock)]
pub trait EngineSpawner: Send {
    fn spawn(&self, config: &BridgeConfig) -> Result<Box<dyn SynthesisEngine>, BridgeError>;
}

/// Fill `buf` from `reader`, stopping early only at end-of-stream.
///
/// Returns the number of bytes read; anything short of `buf.len()` means the
/// stream has ended.
pub fn read_chunk<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle {
        data: Vec<u8>,
        pos: usize,
        step: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn read_chunk_assembles_short_reads() {
        let mut reader = Trickle {
            data: (0..10).collect(),
            pos: 0,
            step: 3,
        };
        let mut buf = [0u8; 8];
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), 8);
        assert_eq!(buf, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn read_chunk_returns_short_count_at_eof() {
        let mut reader = Trickle {
            data: vec![9; 5],
            pos: 0,
            step: 2,
        };
        let mut buf = [0u8; 8];
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), 5);
        assert_eq!(read_chunk(&mut reader, &mut buf).unwrap(), 0);
    }
}
