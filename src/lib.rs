//! Software UICC (SIM card) emulator
//!
//! Emulates a UICC at the ISO 7816-4 application-protocol layer. A host
//! feeds command APDUs to a [`Card`]; the emulator interprets them
//! against an in-memory file system, mutates its selection state, and
//! returns response APDUs with the status words a physical card would
//! produce.
//!
//! ## Layers
//!
//! - [`fs`] - the packed header codec and the disk store: a forest of
//!   trees (one MF plus any number of ADFs) serialized as a compact
//!   byte image, indexed by ID and SID lookup tables
//! - [`fs::va`] - the virtual-application selection state machine
//! - [`tlv`] - the backward two-pass BER-TLV encoder behind the
//!   FCP/FMD/FCI response templates
//! - [`apdu`] / [`apduh`] - APDU frames, the interindustry dispatcher,
//!   and the SELECT / READ BINARY / READ RECORD / GET RESPONSE handlers
//! - [`json`] - the human-authored JSON disk description: ingest to a
//!   binary image and export back
//! - [`card`] - the session tying it all together
//!
//! ## Example
//!
//! ```no_run
//! use uicc_emu::{json, Card};
//!
//! let disk = json::disk_from_path("card.json")?;
//! let mut card = Card::mount(disk)?;
//!
//! // SELECT MF by FID, no response data requested.
//! let frame = card.transact(&[0x00, 0xA4, 0x00, 0x0C, 0x02, 0x3F, 0x00])?;
//! assert_eq!(frame, [0x90, 0x00]);
//! # Ok::<(), uicc_emu::UiccError>(())
//! ```
//!
//! The electrical ISO 7816-3 transport (ATR, PPS, timing) is out of
//! scope; [`Card::transact`] stands in for the host-side pump that
//! drives the procedure-byte protocol.

pub mod apdu;
pub mod apduh;
pub mod card;
pub mod error;
pub mod fs;
pub mod json;
pub mod tlv;

pub use apdu::{ApduCmd, ApduRes, Cla, ClaType, Sw1, DATA_MAX_SHORT};
pub use apduh::ProprietaryHandler;
pub use card::Card;
pub use error::{Result, UiccError};
pub use fs::disk::{Disk, MAGIC};
pub use fs::va::{Fs, Va};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
