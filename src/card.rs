//! Card session state
//!
//! Owns the mounted file system, the response buffer, and the optional
//! proprietary-class handler, and drives the procedure-byte protocol
//! for whole raw APDUs.

use crate::apdu::{ApduCmd, ApduRes, Sw1, DATA_MAX_SHORT};
use crate::apduh::{self, ProprietaryHandler};
use crate::error::{Result, UiccError};
use crate::fs::disk::Disk;
use crate::fs::va::Fs;

/// Holds overflow response bytes between the command that produced them
/// and the GET RESPONSE retrievals that drain them.
pub struct ResBuffer {
    b: [u8; DATA_MAX_SHORT],
    len: u16,
    offset: u16,
}

impl ResBuffer {
    fn new() -> Self {
        ResBuffer {
            b: [0; DATA_MAX_SHORT],
            len: 0,
            offset: 0,
        }
    }

    /// Drop any pending bytes.
    pub fn clear(&mut self) {
        self.len = 0;
        self.offset = 0;
    }

    /// Replace the buffer contents and rewind the cursor.
    pub fn stash(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > DATA_MAX_SHORT {
            return Err(UiccError::BufferTooShort);
        }
        self.b[..bytes.len()].copy_from_slice(bytes);
        self.len = bytes.len() as u16;
        self.offset = 0;
        Ok(())
    }

    /// Bytes still pending retrieval.
    pub fn available(&self) -> u16 {
        self.len - self.offset
    }

    /// Read `n` bytes at the cursor and advance it. `n` must not exceed
    /// `available()`.
    pub fn read(&mut self, n: u16) -> &[u8] {
        let start = usize::from(self.offset);
        self.offset += n;
        &self.b[start..start + usize::from(n)]
    }
}

impl Default for ResBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// An emulated card with a mounted disk.
pub struct Card {
    pub fs: Fs,
    pub(crate) res: ResBuffer,
    pub(crate) apduh_pro: Option<ProprietaryHandler>,
}

impl Card {
    /// Mount a disk and perform the initial reset (selects the MF).
    pub fn mount(disk: Disk) -> Result<Self> {
        let mut card = Card {
            fs: Fs::new(disk),
            res: ResBuffer::new(),
            apduh_pro: None,
        };
        card.reset()?;
        Ok(card)
    }

    /// Hard reset: drop pending response bytes, clear the selection
    /// state, and select the MF.
    pub fn reset(&mut self) -> Result<()> {
        self.res.clear();
        self.fs.reset()
    }

    /// Install a handler for proprietary-class APDUs.
    pub fn register_proprietary_handler(&mut self, handler: ProprietaryHandler) {
        self.apduh_pro = Some(handler);
    }

    /// Dispatch a single handler entry for a decoded command.
    pub fn handle(&mut self, cmd: &ApduCmd, procedure_count: u32) -> ApduRes {
        apduh::demux(self, cmd, procedure_count)
    }

    /// Process one raw short APDU end to end.
    ///
    /// Enters the handler without the data field first; if the card
    /// answers with the ACK-ALL procedure, the data field is transferred
    /// and the handler re-entered. Returns the response frame
    /// `data || SW1 SW2`.
    pub fn transact(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        let cmd = ApduCmd::parse(frame)?;
        let first = self.handle(&cmd.without_data(), 0);
        let res = if first.sw1 == Sw1::AckAll {
            self.handle(&cmd, 1)
        } else {
            first
        };
        tracing::debug!(
            cla = cmd.hdr.cla.raw,
            ins = cmd.hdr.ins,
            sw = res.sw(),
            "transacted APDU"
        );
        Ok(res.into_frame())
    }
}
