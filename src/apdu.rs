//! APDU frames, class classification, and status words
//!
//! Short APDUs only: a 4-byte header, one length byte P3, an optional
//! data field, and an optional trailing Le byte. Responses carry a data
//! field plus SW1/SW2.

use crate::error::{Result, UiccError};

/// Maximum data length of a short APDU in either direction.
pub const DATA_MAX_SHORT: usize = 256;

/// Command header length: CLA, INS, P1, P2.
pub const APDU_HDR_LEN: usize = 4;

/// Pre-classified APDU class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaType {
    Interindustry,
    Proprietary,
    Rfu,
    Invalid,
}

/// The raw class byte together with its classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cla {
    pub raw: u8,
    pub typ: ClaType,
}

impl Cla {
    /// Classify a class byte (ISO 7816-4:2020 sec.5.4.1 table 2).
    pub fn from_raw(raw: u8) -> Self {
        let typ = if raw == 0xFF {
            ClaType::Invalid
        } else if raw & 0x80 != 0 {
            ClaType::Proprietary
        } else if raw & 0x60 == 0x20 {
            ClaType::Rfu
        } else {
            ClaType::Interindustry
        };
        Cla { raw, typ }
    }
}

/// Command APDU header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApduHdr {
    pub cla: Cla,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

/// A decoded command APDU.
///
/// `p3` is the raw length byte: Lc for commands that carry data, Ne for
/// the ones that only expect a response. `data` is empty until the host
/// has answered the ACK-ALL procedure by transmitting the data field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduCmd {
    pub hdr: ApduHdr,
    pub p3: u8,
    pub data: Vec<u8>,
}

impl ApduCmd {
    /// Parse a raw short command APDU.
    ///
    /// A trailing Le byte after the data field is tolerated and dropped;
    /// the supported instructions signal response length through SW
    /// 0x61XX and GET RESPONSE instead.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < APDU_HDR_LEN {
            return Err(UiccError::BadParameters("APDU shorter than its header"));
        }
        let hdr = ApduHdr {
            cla: Cla::from_raw(frame[0]),
            ins: frame[1],
            p1: frame[2],
            p2: frame[3],
        };
        let p3 = frame.get(APDU_HDR_LEN).copied().unwrap_or(0);
        let data = if frame.len() > APDU_HDR_LEN + 1 {
            let start = APDU_HDR_LEN + 1;
            let end = start + usize::from(p3);
            if frame.len() < end {
                return Err(UiccError::BadParameters("APDU data field truncated"));
            }
            frame[start..end].to_vec()
        } else {
            Vec::new()
        };
        Ok(ApduCmd { hdr, p3, data })
    }

    /// The same command before its data field has been transferred.
    pub fn without_data(&self) -> ApduCmd {
        ApduCmd {
            hdr: self.hdr,
            p3: self.p3,
            data: Vec::new(),
        }
    }
}

/// First status byte of a response, or the ACK-ALL procedure signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sw1 {
    /// 0x90: normal processing.
    Success,
    /// 0x61: normal processing, SW2 bytes retrievable via GET RESPONSE.
    BytesAvailable,
    /// 0x62: warning, state unchanged; SW2 qualifies (0x82 = end of file).
    Warning,
    /// 0x67: wrong length; SW2 qualifies (0x02 = Lc mismatch).
    WrongLength,
    /// 0x69: command not allowed; SW2 qualifies.
    CommandNotAllowed,
    /// 0x6A: wrong parameters P1-P2; SW2 qualifies.
    WrongParamsQualified,
    /// 0x6B: wrong parameters P1-P2 (out of range).
    WrongParams,
    /// 0x6C: wrong Le; SW2 holds the exact length.
    WrongLe,
    /// 0x6D: instruction not supported or invalid.
    InsNotSupported,
    /// 0x6E: class not supported.
    ClaNotSupported,
    /// 0x6F: no precise diagnosis.
    UnknownError,
    /// Procedure: acknowledge, transfer all remaining data. Never leaves
    /// the card as a status word; the transport re-enters the handler.
    AckAll,
}

impl Sw1 {
    /// Wire value of the status byte.
    pub fn to_byte(self) -> u8 {
        match self {
            Sw1::Success | Sw1::AckAll => 0x90,
            Sw1::BytesAvailable => 0x61,
            Sw1::Warning => 0x62,
            Sw1::WrongLength => 0x67,
            Sw1::CommandNotAllowed => 0x69,
            Sw1::WrongParamsQualified => 0x6A,
            Sw1::WrongParams => 0x6B,
            Sw1::WrongLe => 0x6C,
            Sw1::InsNotSupported => 0x6D,
            Sw1::ClaNotSupported => 0x6E,
            Sw1::UnknownError => 0x6F,
        }
    }
}

/// A response APDU: data field plus SW1/SW2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduRes {
    pub sw1: Sw1,
    pub sw2: u8,
    pub data: Vec<u8>,
}

impl ApduRes {
    /// Response with a status word and no data.
    pub fn status(sw1: Sw1, sw2: u8) -> Self {
        ApduRes {
            sw1,
            sw2,
            data: Vec::new(),
        }
    }

    /// Plain success, no data.
    pub fn success() -> Self {
        Self::status(Sw1::Success, 0)
    }

    /// ACK-ALL procedure signal.
    pub fn ack_all() -> Self {
        Self::status(Sw1::AckAll, 0)
    }

    /// Success carrying response data.
    pub fn with_data(sw1: Sw1, sw2: u8, data: Vec<u8>) -> Self {
        ApduRes { sw1, sw2, data }
    }

    /// Combined status word.
    pub fn sw(&self) -> u16 {
        u16::from(self.sw1.to_byte()) << 8 | u16::from(self.sw2)
    }

    /// Serialize as `data || SW1 SW2`.
    pub fn into_frame(self) -> Vec<u8> {
        let mut frame = self.data;
        frame.push(self.sw1.to_byte());
        frame.push(self.sw2);
        frame
    }
}
