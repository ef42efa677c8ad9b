//! Transport abstraction for talking to the programmer
//!
//! The session never opens a USB device itself. Hosts hand it anything that
//! can move a message out and, optionally, a reply back in.

use crate::error::{Error, Result};

/// Message exchange with the programmer
///
/// One call is one request/response pair. An empty `input` means the message
/// is write-only and no reply is read.
pub trait Transport {
    /// Send `output` and read the reply into `input`
    ///
    /// Returns the number of reply bytes actually received. Implementations
    /// report I/O failures as [`Error::Transport`].
    fn exchange(&mut self, output: &[u8], input: &mut [u8]) -> Result<usize>;

    /// Send a write-only message
    fn send(&mut self, output: &[u8]) -> Result<()> {
        self.exchange(output, &mut [])?;
        Ok(())
    }

    /// Send a message and require a complete reply
    fn transact(&mut self, output: &[u8], input: &mut [u8]) -> Result<()> {
        let got = self.exchange(output, input)?;
        if got < input.len() {
            log::warn!(
                "Short reply to command {:#04x}: {} of {} bytes",
                output.first().copied().unwrap_or_default(),
                got,
                input.len()
            );
            return Err(Error::ShortReply);
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, output: &[u8], input: &mut [u8]) -> Result<usize> {
        (**self).exchange(output, input)
    }
}
