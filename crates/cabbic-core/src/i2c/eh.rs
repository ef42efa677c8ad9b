//! embedded-hal I2C trait implementation for the bit-banged master

use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};

use super::BitbangI2c;
use crate::error::{Error, Result};
use crate::transport::Transport;

impl i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::I2cAddressNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Error::I2cDataNack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data),
            _ => ErrorKind::Other,
        }
    }
}

impl<T: Transport> i2c::ErrorType for BitbangI2c<'_, T> {
    type Error = Error;
}

fn is_read(op: &Operation<'_>) -> bool {
    matches!(op, Operation::Read(_))
}

impl<T: Transport> I2c<SevenBitAddress> for BitbangI2c<'_, T> {
    /// Execute the operations as one bus transaction
    ///
    /// A start and the address are sent before the first operation and again
    /// (as a repeated start) whenever the direction changes. The final byte of
    /// each run of reads is NACKed. A single stop ends the transaction.
    fn transaction(&mut self, address: SevenBitAddress, operations: &mut [Operation<'_>]) -> Result<()> {
        let mut direction: Option<bool> = None;

        for i in 0..operations.len() {
            let read = is_read(&operations[i]);
            let group_ends = !operations.get(i + 1).is_some_and(|next| is_read(next) == read);

            if direction != Some(read) {
                self.start()?;
                self.address(address, read)?;
                direction = Some(read);
            }

            match &mut operations[i] {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        self.data(byte)?;
                    }
                }
                Operation::Read(buf) => {
                    let len = buf.len();
                    for (n, slot) in buf.iter_mut().enumerate() {
                        let last = group_ends && n + 1 == len;
                        *slot = self.read_byte(!last)?;
                    }
                }
            }
        }

        if direction.is_some() {
            self.stop()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::I2cPins;
    use crate::session::tests::Recorder;
    use crate::session::Session;

    #[test]
    fn test_error_kinds() {
        use embedded_hal::i2c::Error as _;
        assert_eq!(
            Error::I2cAddressNack.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
        );
        assert_eq!(
            Error::I2cDataNack.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
        );
        assert_eq!(Error::Overcurrent.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_empty_transaction_is_silent() {
        let mut s = Session::new(Recorder::default());
        s.reset(&[16], &[40], &[], 5.0, 0.0).unwrap();
        s.transport_mut().sent.clear();
        let mut bus = BitbangI2c::new(&mut s, I2cPins { scl: 21, sda: 22 });
        bus.transaction(0x50, &mut []).unwrap();
        assert!(s.transport().sent.is_empty());
    }
}
