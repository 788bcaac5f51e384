//! UICC file-system primitives
//!
//! Defines the packed on-image headers (item and file) and the by-value
//! file snapshots the rest of the emulator works with. Every item in a
//! disk image starts with a fixed 10-byte item header; files extend it
//! with an ID, a short ID, and a name, and some types append a
//! type-specific tail (AID for ADFs, record size for record-oriented EFs).

pub mod disk;
pub mod va;

#[cfg(test)]
pub(crate) mod testutil;

use crate::error::{Result, UiccError};

/// Maximum significant length of a file name.
pub const NAME_LEN_MAX: usize = 16;

/// Maximum nesting depth of the file tree (MF or ADF -> DF -> EF).
pub const DEPTH_MAX: usize = 3;

/// ID value marking "no FID assigned".
pub const ID_MISSING: u16 = 0;

/// SID value marking "no SFI assigned".
pub const SID_MISSING: u8 = 0;

/// Length of the registered application provider identifier part of an AID.
pub const AID_RID_LEN: usize = 5;

/// Length of the proprietary application identifier extension part of an AID.
pub const AID_PIX_LEN: usize = 11;

/// Total AID length (ETSI TS 101 220).
pub const AID_LEN: usize = AID_RID_LEN + AID_PIX_LEN;

/// Packed item header: size(4) + lcs(1) + type(1) + offset_prel(4).
pub const ITEM_HDR_LEN: usize = 10;

/// Packed file header: item header + id(2) + sid(1) + name(16 + NUL).
pub const FILE_HDR_LEN: usize = ITEM_HDR_LEN + 2 + 1 + (NAME_LEN_MAX + 1);

/// Packed ADF header: file header + AID.
pub const ADF_HDR_LEN: usize = FILE_HDR_LEN + AID_LEN;

/// Packed linear-fixed / cyclic EF header: file header + record size(1).
pub const EF_RECORD_HDR_LEN: usize = FILE_HDR_LEN + 1;

/// Type tag of an item in the disk image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ItemType {
    Invalid = 0,
    FileMf = 1,
    FileAdf = 2,
    FileDf = 3,
    FileEfTransparent = 4,
    FileEfLinearFixed = 5,
    FileEfCyclic = 6,
    DatoBerTlv = 7,
    Hex = 8,
    Ascii = 9,
}

impl ItemType {
    /// Decode a raw type byte. Unknown values decode to `Invalid`.
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ItemType::FileMf,
            2 => ItemType::FileAdf,
            3 => ItemType::FileDf,
            4 => ItemType::FileEfTransparent,
            5 => ItemType::FileEfLinearFixed,
            6 => ItemType::FileEfCyclic,
            7 => ItemType::DatoBerTlv,
            8 => ItemType::Hex,
            9 => ItemType::Ascii,
            _ => ItemType::Invalid,
        }
    }

    /// True for the folder file types (MF, ADF, DF).
    pub fn is_folder(self) -> bool {
        matches!(self, ItemType::FileMf | ItemType::FileAdf | ItemType::FileDf)
    }

    /// True for the elementary file types.
    pub fn is_ef(self) -> bool {
        matches!(
            self,
            ItemType::FileEfTransparent | ItemType::FileEfLinearFixed | ItemType::FileEfCyclic
        )
    }

    /// True for any file type (folder or EF).
    pub fn is_file(self) -> bool {
        self.is_folder() || self.is_ef()
    }

    /// Length of the packed header for this file type.
    pub fn hdr_len(self) -> usize {
        match self {
            ItemType::FileAdf => ADF_HDR_LEN,
            ItemType::FileEfLinearFixed | ItemType::FileEfCyclic => EF_RECORD_HDR_LEN,
            _ => FILE_HDR_LEN,
        }
    }
}

/// Life-cycle status (ISO 7816-4:2020 sec.7.4.10 table 15).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Lcs {
    OperationalActivated = 0,
    OperationalDeactivated = 1,
    Terminated = 2,
}

impl Lcs {
    /// Decode the in-image LCS byte.
    pub fn from_u8(raw: u8) -> Result<Self> {
        match raw {
            0 => Ok(Lcs::OperationalActivated),
            1 => Ok(Lcs::OperationalDeactivated),
            2 => Ok(Lcs::Terminated),
            _ => Err(UiccError::InvalidLcs(raw)),
        }
    }

    /// ISO 7816-4 wire encoding of the status, as reported in FCP tag 0x8A.
    pub fn iso_byte(self) -> u8 {
        match self {
            Lcs::OperationalActivated => 0x05,
            Lcs::OperationalDeactivated => 0x04,
            Lcs::Terminated => 0x0C,
        }
    }
}

/// Parsed item header.
///
/// `offset_trel` is the offset of this header from the top of the tree; it
/// is not stored in the image but derived while parsing. `offset_prel` is
/// stored: the offset from the parent's header to this header, 0 for tree
/// roots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemHdr {
    pub size: u32,
    pub lcs: Lcs,
    pub typ: ItemType,
    pub offset_trel: u32,
    pub offset_prel: u32,
}

impl ItemHdr {
    /// Parse an item header from the start of `raw`.
    pub fn from_bytes(raw: &[u8], offset_trel: u32) -> Result<Self> {
        if raw.len() < ITEM_HDR_LEN {
            return Err(UiccError::BufferTooShort);
        }
        Ok(ItemHdr {
            size: u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            lcs: Lcs::from_u8(raw[4])?,
            typ: ItemType::from_u8(raw[5]),
            offset_trel,
            offset_prel: u32::from_le_bytes([raw[6], raw[7], raw[8], raw[9]]),
        })
    }

    /// Serialize to the packed 10-byte layout.
    pub fn to_bytes(&self) -> [u8; ITEM_HDR_LEN] {
        let mut out = [0u8; ITEM_HDR_LEN];
        out[0..4].copy_from_slice(&self.size.to_le_bytes());
        out[4] = self.lcs as u8;
        out[5] = self.typ as u8;
        out[6..10].copy_from_slice(&self.offset_prel.to_le_bytes());
        out
    }
}

/// File-specific fields shared by MF, ADF, DF, and EF headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHdr {
    /// File identifier, `ID_MISSING` when absent.
    pub id: u16,
    /// Short file identifier, `SID_MISSING` when absent.
    pub sid: u8,
    /// Null-padded name with a trailing NUL.
    pub name: [u8; NAME_LEN_MAX + 1],
}

impl FileHdr {
    /// Parse the file portion of a header (`raw` starts at the item header).
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < FILE_HDR_LEN {
            return Err(UiccError::BufferTooShort);
        }
        let mut name = [0u8; NAME_LEN_MAX + 1];
        name.copy_from_slice(&raw[ITEM_HDR_LEN + 3..FILE_HDR_LEN]);
        Ok(FileHdr {
            id: u16::from_le_bytes([raw[ITEM_HDR_LEN], raw[ITEM_HDR_LEN + 1]]),
            sid: raw[ITEM_HDR_LEN + 2],
            name,
        })
    }

    /// Serialize the file portion (id + sid + name) of the packed layout.
    pub fn to_bytes(&self) -> [u8; FILE_HDR_LEN - ITEM_HDR_LEN] {
        let mut out = [0u8; FILE_HDR_LEN - ITEM_HDR_LEN];
        out[0..2].copy_from_slice(&self.id.to_le_bytes());
        out[2] = self.sid;
        out[3..].copy_from_slice(&self.name);
        out
    }
}

/// Type-specific header tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSpec {
    /// MF, DF, and transparent EF carry no extra header fields.
    None,
    /// ADF roots embed their application identifier.
    Adf {
        rid: [u8; AID_RID_LEN],
        pix: [u8; AID_PIX_LEN],
    },
    /// Linear-fixed and cyclic EFs carry the fixed record size.
    Record { rcrd_size: u8 },
}

/// By-value snapshot of a file in a tree.
///
/// Snapshots carry tree-relative offsets rather than references; they stay
/// cheap to copy and never alias the tree buffer. Mutating a tree
/// invalidates outstanding snapshots, so callers re-parse after mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct File {
    pub hdr_item: ItemHdr,
    pub hdr_file: FileHdr,
    pub spec: FileSpec,
    /// Tree-relative offset of the first payload byte.
    pub data_offset: u32,
    /// Payload length: item size minus the type-specific header length.
    pub data_size: u32,
}

impl File {
    /// Parse the file whose header starts at `offset` in `tree_buf`.
    pub fn parse(tree_buf: &[u8], offset: u32) -> Result<Self> {
        let start = offset as usize;
        let raw = tree_buf
            .get(start..)
            .ok_or_else(|| UiccError::Corrupt(format!("file offset {offset} out of tree")))?;
        let hdr_item = ItemHdr::from_bytes(raw, offset)?;
        if !hdr_item.typ.is_file() {
            return Err(UiccError::InvalidItemType(hdr_item.typ as u8));
        }
        let hdr_len = hdr_item.typ.hdr_len();
        if (hdr_item.size as usize) < hdr_len || raw.len() < hdr_item.size as usize {
            return Err(UiccError::Corrupt(format!(
                "file at {offset} claims {} bytes",
                hdr_item.size
            )));
        }
        let hdr_file = FileHdr::from_bytes(raw)?;
        let spec = match hdr_item.typ {
            ItemType::FileAdf => {
                let mut rid = [0u8; AID_RID_LEN];
                let mut pix = [0u8; AID_PIX_LEN];
                rid.copy_from_slice(&raw[FILE_HDR_LEN..FILE_HDR_LEN + AID_RID_LEN]);
                pix.copy_from_slice(&raw[FILE_HDR_LEN + AID_RID_LEN..ADF_HDR_LEN]);
                FileSpec::Adf { rid, pix }
            }
            ItemType::FileEfLinearFixed | ItemType::FileEfCyclic => {
                let rcrd_size = raw[FILE_HDR_LEN];
                if rcrd_size == 0 {
                    return Err(UiccError::Corrupt(format!(
                        "record EF at {offset} has zero record size"
                    )));
                }
                FileSpec::Record { rcrd_size }
            }
            _ => FileSpec::None,
        };
        Ok(File {
            hdr_item,
            hdr_file,
            spec,
            data_offset: offset + hdr_len as u32,
            data_size: hdr_item.size - hdr_len as u32,
        })
    }

    /// True for MF, ADF, and DF.
    pub fn is_folder(&self) -> bool {
        self.hdr_item.typ.is_folder()
    }

    /// Record size for record-oriented EFs.
    pub fn rcrd_size(&self) -> Option<u8> {
        match self.spec {
            FileSpec::Record { rcrd_size } => Some(rcrd_size),
            _ => None,
        }
    }

    /// File descriptor byte (ISO 7816-4 table 12), first byte of FCP tag 0x82.
    pub fn descriptor_byte(&self) -> u8 {
        match self.hdr_item.typ {
            ItemType::FileMf | ItemType::FileAdf | ItemType::FileDf => 0x38,
            ItemType::FileEfTransparent => 0x01,
            ItemType::FileEfLinearFixed => 0x02,
            ItemType::FileEfCyclic => 0x06,
            _ => 0x00,
        }
    }

    /// Data coding byte, second byte of FCP tag 0x82.
    pub fn data_coding_byte(&self) -> u8 {
        0x21
    }
}
