//! Virtual-application selection state
//!
//! Tracks the card's current selection tuple (tree, ADF, DF, EF, file,
//! record) and advances it according to the ISO 7816-4:2020 sec.7.2.2
//! rules as SELECT-family operations resolve files.

use crate::error::{Result, UiccError};
use crate::fs::disk::{Disk, Tree};
use crate::fs::{File, FileSpec, ItemType, AID_PIX_LEN, AID_RID_LEN};

/// FID of the master file, the selection target of a card reset.
pub const MF_ID: u16 = 0x3F00;

/// Path operand of the (unimplemented) by-path selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// Path is relative to the MF.
    FromMf,
    /// Path is relative to the current DF.
    FromCurrentDf,
}

/// A sequence of FIDs forming a selection path.
#[derive(Debug, Clone, Copy)]
pub struct FsPath<'a> {
    pub typ: PathType,
    pub b: &'a [u8],
}

/// The current selection tuple. All members are absent until the first
/// selection succeeds; file members are by-value snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct Va {
    pub cur_tree: Option<u8>,
    pub cur_adf: Option<File>,
    pub cur_df: Option<File>,
    pub cur_ef: Option<File>,
    pub cur_file: Option<File>,
    pub cur_rcrd: Option<u8>,
}

impl Va {
    fn clear(&mut self) {
        *self = Va::default();
    }
}

/// The mounted file system: the disk plus the selection state over it.
#[derive(Debug, Default)]
pub struct Fs {
    pub disk: Disk,
    pub va: Va,
}

impl Fs {
    pub fn new(disk: Disk) -> Self {
        Fs {
            disk,
            va: Va::default(),
        }
    }

    /// Clear the selection state and select the MF.
    pub fn reset(&mut self) -> Result<()> {
        self.va.clear();
        self.select_file_id(MF_ID)
    }

    /// The tree the current selection lives in.
    pub fn cur_tree(&self) -> Result<&Tree> {
        let idx = self
            .va
            .cur_tree
            .ok_or(UiccError::BadParameters("no current tree"))?;
        self.disk.tree(idx)
    }

    /// Apply the file-type selection rules for a resolved file.
    ///
    /// Selecting an EF always rebinds `cur_df` to the EF's parent, also
    /// when the EF was resolved through a short EF identifier. ISO
    /// 7816-4:2020 sec.7.2.2 keeps `cur_df` unchanged for that case; the
    /// deviation is intentional and load-bearing for callers that probe
    /// the DF after an SFI read.
    fn select_file(&mut self, tree_idx: u8, file: File) -> Result<()> {
        let tree = self.disk.tree(tree_idx)?;
        let root = tree.root()?;
        let parent = tree.parent_of(&file)?;
        match file.hdr_item.typ {
            ItemType::FileMf | ItemType::FileAdf => {
                self.va.clear();
                self.va.cur_tree = Some(tree_idx);
                self.va.cur_adf = Some(file);
                self.va.cur_df = Some(file);
                self.va.cur_file = Some(file);
            }
            ItemType::FileDf => {
                self.va.clear();
                self.va.cur_tree = Some(tree_idx);
                self.va.cur_adf = Some(root);
                self.va.cur_df = Some(file);
                self.va.cur_file = Some(file);
            }
            ItemType::FileEfTransparent
            | ItemType::FileEfLinearFixed
            | ItemType::FileEfCyclic => {
                self.va.clear();
                self.va.cur_tree = Some(tree_idx);
                self.va.cur_adf = Some(root);
                self.va.cur_df = Some(parent);
                self.va.cur_ef = Some(file);
                self.va.cur_file = Some(file);
            }
            other => return Err(UiccError::InvalidItemType(other as u8)),
        }
        Ok(())
    }

    /// Select the first ADF whose RID matches and whose first `pix_len`
    /// PIX bytes match the given AID prefix.
    pub fn select_adf(&mut self, aid: &[u8], pix_len: usize) -> Result<()> {
        if pix_len > AID_PIX_LEN || aid.len() < AID_RID_LEN + pix_len {
            return Err(UiccError::BadParameters("AID shorter than claimed"));
        }
        for tree_idx in 0..self.disk.tree_count() {
            let tree = self.disk.tree(tree_idx as u8)?;
            let root = tree.root()?;
            if let FileSpec::Adf { rid, pix } = root.spec {
                if rid[..] == aid[..AID_RID_LEN]
                    && pix[..pix_len] == aid[AID_RID_LEN..AID_RID_LEN + pix_len]
                {
                    return self.select_file(tree_idx as u8, root);
                }
            }
        }
        Err(UiccError::NotFound)
    }

    /// Select any file in the forest by its FID.
    pub fn select_file_id(&mut self, id: u16) -> Result<()> {
        let (tree_idx, file) = self.disk.lutid_lookup(id)?;
        self.select_file(tree_idx, file)
    }

    /// Select a file in the current tree by its SFI.
    pub fn select_file_sid(&mut self, sid: u8) -> Result<()> {
        let tree_idx = self
            .va
            .cur_tree
            .ok_or(UiccError::BadParameters("no current tree"))?;
        let file = self.disk.tree(tree_idx)?.lutsid_lookup(sid)?;
        self.select_file(tree_idx, file)
    }

    /// Select a record of the current EF by index.
    pub fn select_record_idx(&mut self, idx: u8) -> Result<()> {
        let ef = self
            .va
            .cur_ef
            .ok_or(UiccError::BadParameters("no current EF"))?;
        if ef.rcrd_size().is_none() {
            return Err(UiccError::BadParameters("current EF has no records"));
        }
        let count = self.cur_tree()?.record_count(&ef)?;
        if u32::from(idx) >= count {
            return Err(UiccError::NotFound);
        }
        self.va.cur_rcrd = Some(idx);
        Ok(())
    }

    /// Selection by DF name. Declared but not implemented.
    pub fn select_file_dfname(&mut self, _df_name: &[u8]) -> Result<()> {
        Err(UiccError::NotImplemented)
    }

    /// Selection by path. Declared but not implemented.
    pub fn select_file_path(&mut self, _path: FsPath<'_>) -> Result<()> {
        Err(UiccError::NotImplemented)
    }

    /// Selection of a data-object offset. Declared but not implemented.
    pub fn select_data_offset(&mut self, _offset_prel: u32) -> Result<()> {
        Err(UiccError::NotImplemented)
    }
}
