//! Disk store: the forest of file trees and its lookup tables
//!
//! A disk image is an 8-byte magic prefix followed by one byte image per
//! tree. The first tree is rooted at the MF, every later tree at an ADF.
//! Each tree owns a SID lookup table; the disk owns one ID lookup table
//! spanning the whole forest. Both tables are sorted arrays of fixed
//! records, keyed by the big-endian byte sequence of the key, resolved
//! with binary search.

use crate::error::{Result, UiccError};
use crate::fs::{File, ItemType, DEPTH_MAX, ID_MISSING, SID_MISSING};
use std::io::{Read, Write};
use std::path::Path;

/// Disk image magic: format tag + version.
pub const MAGIC: [u8; 8] = *b"UICC\x00\x01\x00\x00";

/// The tree index is carried as a single byte in the ID LUT.
pub const TREE_COUNT_MAX: usize = 255;

/// Initial entry capacity of a freshly built LUT.
const LUT_CAPACITY_START: usize = 64;

/// SID LUT entry: short file identifier -> tree-relative header offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SidLutEntry {
    pub sid: u8,
    pub offset: u32,
}

/// Per-tree SID lookup table, ascending by SID.
#[derive(Debug, Default)]
pub struct SidLut {
    entries: Vec<SidLutEntry>,
}

impl SidLut {
    fn new() -> Self {
        SidLut {
            entries: Vec::with_capacity(LUT_CAPACITY_START),
        }
    }

    fn insert(&mut self, sid: u8, offset: u32) {
        let pos = self.entries.partition_point(|e| e.sid < sid);
        self.entries.insert(pos, SidLutEntry { sid, offset });
    }

    /// Resolve a SID to its header offset.
    pub fn lookup(&self, sid: u8) -> Option<u32> {
        self.entries
            .binary_search_by_key(&sid, |e| e.sid)
            .ok()
            .map(|i| self.entries[i].offset)
    }

    /// Entries in key order.
    pub fn entries(&self) -> &[SidLutEntry] {
        &self.entries
    }
}

/// ID LUT entry: big-endian FID -> (tree-relative offset, tree index).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdLutEntry {
    pub id_be: [u8; 2],
    pub offset: u32,
    pub tree_idx: u8,
}

/// Disk-wide ID lookup table, ascending by big-endian FID bytes.
#[derive(Debug, Default)]
pub struct IdLut {
    entries: Vec<IdLutEntry>,
}

impl IdLut {
    fn new() -> Self {
        IdLut {
            entries: Vec::with_capacity(LUT_CAPACITY_START),
        }
    }

    fn insert(&mut self, id: u16, offset: u32, tree_idx: u8) {
        let id_be = id.to_be_bytes();
        let pos = self.entries.partition_point(|e| e.id_be < id_be);
        self.entries.insert(
            pos,
            IdLutEntry {
                id_be,
                offset,
                tree_idx,
            },
        );
    }

    /// Resolve a FID to its (offset, tree index) pair.
    pub fn lookup(&self, id: u16) -> Option<(u32, u8)> {
        let key = id.to_be_bytes();
        self.entries
            .binary_search_by(|e| e.id_be.cmp(&key))
            .ok()
            .map(|i| (self.entries[i].offset, self.entries[i].tree_idx))
    }

    /// Entries in key order.
    pub fn entries(&self) -> &[IdLutEntry] {
        &self.entries
    }
}

/// One tree of the forest: a contiguous byte image rooted at an MF or ADF,
/// plus the SID lookup table over its files.
#[derive(Debug)]
pub struct Tree {
    buf: Vec<u8>,
    lutsid: SidLut,
}

impl Tree {
    fn new(buf: Vec<u8>) -> Self {
        Tree {
            buf,
            lutsid: SidLut::default(),
        }
    }

    /// Raw tree image.
    pub fn buf(&self) -> &[u8] {
        &self.buf
    }

    /// Image length in bytes.
    pub fn len(&self) -> u32 {
        self.buf.len() as u32
    }

    /// True when the tree holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// SID lookup table of this tree.
    pub fn lutsid(&self) -> &SidLut {
        &self.lutsid
    }

    /// Parse the file whose header starts at `offset`.
    pub fn file_at(&self, offset: u32) -> Result<File> {
        File::parse(&self.buf, offset)
    }

    /// Parse the tree root; it must be an MF or an ADF.
    pub fn root(&self) -> Result<File> {
        let root = self.file_at(0)?;
        match root.hdr_item.typ {
            ItemType::FileMf | ItemType::FileAdf => Ok(root),
            other => Err(UiccError::InvalidItemType(other as u8)),
        }
    }

    /// Parse the parent of `file`. The tree root is its own parent.
    pub fn parent_of(&self, file: &File) -> Result<File> {
        if file.hdr_item.offset_prel == 0 {
            return Ok(*file);
        }
        let parent_offset = file
            .hdr_item
            .offset_trel
            .checked_sub(file.hdr_item.offset_prel)
            .ok_or_else(|| {
                UiccError::Corrupt(format!(
                    "parent offset underflow at {}",
                    file.hdr_item.offset_trel
                ))
            })?;
        self.file_at(parent_offset)
    }

    /// Payload bytes of `file`.
    pub fn data_of(&self, file: &File) -> &[u8] {
        let start = file.data_offset as usize;
        &self.buf[start..start + file.data_size as usize]
    }

    /// Depth-first walk over every file in the tree, root included.
    ///
    /// A bounded stack of in-tree cursors drives the walk: folders are
    /// descended past their header, EFs are skipped whole, and a cursor
    /// reaching its parent's extent pops. Nesting past `DEPTH_MAX` or an
    /// invalid item terminates the walk with an error.
    pub fn for_each_file<F>(&self, mut cb: F) -> Result<()>
    where
        F: FnMut(&File) -> Result<()>,
    {
        let root = self.root()?;
        cb(&root)?;

        let mut stack: Vec<(u32, u32)> = Vec::with_capacity(DEPTH_MAX);
        stack.push((root.hdr_item.typ.hdr_len() as u32, root.hdr_item.size));
        while let Some(&(cursor, end)) = stack.last() {
            if cursor >= end {
                stack.pop();
                continue;
            }
            let file = self.file_at(cursor)?;
            cb(&file)?;

            let next = cursor + file.hdr_item.size;
            if next > end {
                return Err(UiccError::Corrupt(format!(
                    "file at {} overruns its parent",
                    file.hdr_item.offset_trel
                )));
            }
            if let Some(top) = stack.last_mut() {
                top.0 = next;
            }
            if file.is_folder() {
                if stack.len() >= DEPTH_MAX - 1 {
                    return Err(UiccError::Corrupt(format!(
                        "folder at {} nests deeper than {DEPTH_MAX}",
                        file.hdr_item.offset_trel
                    )));
                }
                let child_start = cursor + file.hdr_item.typ.hdr_len() as u32;
                stack.push((child_start, next));
            }
        }
        Ok(())
    }

    /// Resolve a SID through this tree's LUT and parse the file.
    pub fn lutsid_lookup(&self, sid: u8) -> Result<File> {
        let offset = self.lutsid.lookup(sid).ok_or(UiccError::NotFound)?;
        if offset >= self.len() {
            return Err(UiccError::Corrupt(format!(
                "SID LUT offset {offset} out of tree"
            )));
        }
        self.file_at(offset)
    }

    /// Rebuild the SID LUT from scratch. On failure the LUT is left empty.
    pub fn lutsid_rebuild(&mut self) -> Result<()> {
        let mut lut = SidLut::new();
        let built = self.for_each_file(|file| {
            if file.hdr_file.sid != SID_MISSING {
                lut.insert(file.hdr_file.sid, file.hdr_item.offset_trel);
            }
            Ok(())
        });
        match built {
            Ok(()) => {
                self.lutsid = lut;
                Ok(())
            }
            Err(e) => {
                self.lutsid = SidLut::default();
                Err(e)
            }
        }
    }

    /// Number of records in a record-oriented EF.
    pub fn record_count(&self, file: &File) -> Result<u32> {
        match file.rcrd_size() {
            Some(rcrd_size) => Ok(file.data_size / u32::from(rcrd_size)),
            None => Err(UiccError::BadParameters("file has no records")),
        }
    }

    /// Byte slice of record `idx` of a record-oriented EF.
    pub fn record(&self, file: &File, idx: u8) -> Result<&[u8]> {
        let rcrd_size = file
            .rcrd_size()
            .ok_or(UiccError::BadParameters("file has no records"))?;
        if u32::from(idx) >= self.record_count(file)? {
            return Err(UiccError::NotFound);
        }
        let data = self.data_of(file);
        let start = usize::from(idx) * usize::from(rcrd_size);
        Ok(&data[start..start + usize::from(rcrd_size)])
    }
}

/// The mounted forest: every tree plus the disk-wide ID lookup table.
#[derive(Debug, Default)]
pub struct Disk {
    trees: Vec<Tree>,
    lutid: IdLut,
}

impl Disk {
    /// Assemble a disk from raw tree images and rebuild all lookup tables.
    ///
    /// The first image must be rooted at an MF, all others at ADFs, and
    /// each root's size field must cover its image exactly.
    pub fn from_tree_images(images: Vec<Vec<u8>>) -> Result<Self> {
        if images.is_empty() {
            return Err(UiccError::Corrupt("disk has no trees".into()));
        }
        if images.len() > TREE_COUNT_MAX {
            return Err(UiccError::Corrupt(format!(
                "{} trees exceed the maximum of {TREE_COUNT_MAX}",
                images.len()
            )));
        }
        let mut trees = Vec::with_capacity(images.len());
        for (tree_idx, image) in images.into_iter().enumerate() {
            let root = File::parse(&image, 0)?;
            let expected = if tree_idx == 0 {
                ItemType::FileMf
            } else {
                ItemType::FileAdf
            };
            if root.hdr_item.typ != expected {
                return Err(UiccError::InvalidItemType(root.hdr_item.typ as u8));
            }
            if root.hdr_item.size as usize != image.len() {
                return Err(UiccError::Corrupt(format!(
                    "tree {tree_idx} root claims {} bytes, image holds {}",
                    root.hdr_item.size,
                    image.len()
                )));
            }
            let mut tree = Tree::new(image);
            tree.lutsid_rebuild()?;
            trees.push(tree);
        }
        let mut disk = Disk {
            trees,
            lutid: IdLut::default(),
        };
        disk.lutid_rebuild()?;
        Ok(disk)
    }

    /// Load a disk image from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = std::fs::File::open(&path)?;
        let total = file.metadata()?.len();

        let mut magic = [0u8; MAGIC.len()];
        file.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(UiccError::InvalidMagic);
        }

        let mut images = Vec::new();
        let mut consumed = MAGIC.len() as u64;
        while consumed < total {
            let mut hdr_raw = [0u8; crate::fs::ITEM_HDR_LEN];
            file.read_exact(&mut hdr_raw)?;
            let hdr = crate::fs::ItemHdr::from_bytes(&hdr_raw, 0)?;
            let size = hdr.size as u64;
            if size < hdr_raw.len() as u64 || size > total - consumed {
                return Err(UiccError::Corrupt(format!(
                    "tree {} claims {size} bytes, {} remain",
                    images.len(),
                    total - consumed
                )));
            }
            let mut image = vec![0u8; hdr.size as usize];
            image[..hdr_raw.len()].copy_from_slice(&hdr_raw);
            file.read_exact(&mut image[hdr_raw.len()..])?;
            consumed += size;
            images.push(image);
        }

        let disk = Self::from_tree_images(images)?;
        tracing::info!(
            trees = disk.trees.len(),
            bytes = total,
            "loaded disk image"
        );
        Ok(disk)
    }

    /// Save the disk image to a file: magic, then each tree image in
    /// forest order.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = std::fs::File::create(&path)?;
        file.write_all(&MAGIC)?;
        for tree in &self.trees {
            file.write_all(&tree.buf)?;
        }
        file.flush()?;
        tracing::debug!(trees = self.trees.len(), "saved disk image");
        Ok(())
    }

    /// Trees in forest order.
    pub fn trees(&self) -> impl ExactSizeIterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Number of trees in the forest.
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Tree by forest index.
    pub fn tree(&self, idx: u8) -> Result<&Tree> {
        self.trees.get(usize::from(idx)).ok_or(UiccError::NotFound)
    }

    /// Disk-wide ID lookup table.
    pub fn lutid(&self) -> &IdLut {
        &self.lutid
    }

    /// Resolve a FID through the ID LUT to its tree index and file.
    pub fn lutid_lookup(&self, id: u16) -> Result<(u8, File)> {
        let (offset, tree_idx) = self.lutid.lookup(id).ok_or(UiccError::NotFound)?;
        let tree = self.tree(tree_idx)?;
        if offset >= tree.len() {
            return Err(UiccError::Corrupt(format!(
                "ID LUT offset {offset} out of tree {tree_idx}"
            )));
        }
        Ok((tree_idx, tree.file_at(offset)?))
    }

    /// Rebuild the disk-wide ID LUT. On failure the LUT is left empty.
    pub fn lutid_rebuild(&mut self) -> Result<()> {
        let mut lut = IdLut::new();
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            let built = tree.for_each_file(|file| {
                if file.hdr_file.id != ID_MISSING {
                    lut.insert(
                        file.hdr_file.id,
                        file.hdr_item.offset_trel,
                        tree_idx as u8,
                    );
                }
                Ok(())
            });
            if let Err(e) = built {
                self.lutid = IdLut::default();
                return Err(e);
            }
        }
        self.lutid = lut;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::testutil::{build_test_disk, build_test_tree};
    use crate::fs::FILE_HDR_LEN;

    #[test]
    fn test_walk_visits_every_file_once() {
        let disk = build_test_disk();
        let tree = disk.tree(0).unwrap();
        let mut ids = Vec::new();
        let mut bytes = 0u32;
        tree.for_each_file(|file| {
            ids.push(file.hdr_file.id);
            if !file.is_folder() {
                bytes += file.hdr_item.size;
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(ids, vec![0x3F00, 0x7FFF, 0x6F07, 0x2F00]);
        // Folder headers + EF extents cover the tree exactly.
        assert_eq!(bytes + 2 * FILE_HDR_LEN as u32, tree.len());
    }

    #[test]
    fn test_offset_prel_invariant() {
        let disk = build_test_disk();
        let tree = disk.tree(0).unwrap();
        tree.for_each_file(|file| {
            let parent = tree.parent_of(file)?;
            assert_eq!(
                file.hdr_item.offset_trel - file.hdr_item.offset_prel,
                parent.hdr_item.offset_trel
            );
            assert_eq!(file.hdr_item.offset_prel == 0, file.hdr_item.offset_trel == 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_lutid_lookup_matches_walk() {
        let disk = build_test_disk();
        let tree = disk.tree(0).unwrap();
        tree.for_each_file(|file| {
            let (tree_idx, found) = disk.lutid_lookup(file.hdr_file.id)?;
            assert_eq!(tree_idx, 0);
            assert_eq!(&found, file);
            Ok(())
        })
        .unwrap();
        assert!(matches!(
            disk.lutid_lookup(0xDEAD),
            Err(UiccError::NotFound)
        ));
    }

    #[test]
    fn test_lutid_keys_strictly_ascending() {
        let disk = build_test_disk();
        let entries = disk.lutid().entries();
        assert_eq!(entries.len(), 4);
        for pair in entries.windows(2) {
            assert!(pair[0].id_be < pair[1].id_be);
        }
    }

    #[test]
    fn test_lutsid_lookup() {
        let disk = build_test_disk();
        let tree = disk.tree(0).unwrap();
        let ef = tree.lutsid_lookup(0x07).unwrap();
        assert_eq!(ef.hdr_file.id, 0x6F07);
        assert_eq!(tree.data_of(&ef), &[0x01, 0x02, 0x03, 0x04, 0x05]);
        assert!(matches!(
            tree.lutsid_lookup(0x1E),
            Err(UiccError::NotFound)
        ));
    }

    #[test]
    fn test_record_access() {
        let disk = build_test_disk();
        let tree = disk.tree(0).unwrap();
        let ef = tree.lutsid_lookup(0x05).unwrap();
        assert_eq!(tree.record_count(&ef).unwrap(), 2);
        assert_eq!(tree.record(&ef, 0).unwrap(), &[0xAA, 0xBB, 0xCC]);
        assert_eq!(tree.record(&ef, 1).unwrap(), &[0xFF, 0xFF, 0xFF]);
        assert!(matches!(tree.record(&ef, 2), Err(UiccError::NotFound)));
    }

    #[test]
    fn test_record_access_rejects_transparent() {
        let disk = build_test_disk();
        let tree = disk.tree(0).unwrap();
        let ef = tree.lutsid_lookup(0x07).unwrap();
        assert!(matches!(
            tree.record(&ef, 0),
            Err(UiccError::BadParameters(_))
        ));
    }

    #[test]
    fn test_save_load_round_trip() {
        let disk = build_test_disk();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.img");
        disk.save(&path).unwrap();

        let loaded = Disk::load(&path).unwrap();
        assert_eq!(loaded.tree_count(), 1);
        assert_eq!(loaded.tree(0).unwrap().buf(), disk.tree(0).unwrap().buf());
        assert_eq!(loaded.lutid().entries(), disk.lutid().entries());
    }

    #[test]
    fn test_load_rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.img");
        std::fs::write(&path, b"NOTADISK").unwrap();
        assert!(matches!(Disk::load(&path), Err(UiccError::InvalidMagic)));
    }

    #[test]
    fn test_first_tree_must_be_mf() {
        let mut image = build_test_tree();
        // Retag the root as a DF; the forest head must be an MF.
        image[5] = ItemType::FileDf as u8;
        assert!(matches!(
            Disk::from_tree_images(vec![image]),
            Err(UiccError::InvalidItemType(_))
        ));
    }

    #[test]
    fn test_root_size_must_cover_image() {
        let mut image = build_test_tree();
        image.extend_from_slice(&[0u8; 4]);
        assert!(matches!(
            Disk::from_tree_images(vec![image]),
            Err(UiccError::Corrupt(_))
        ));
    }
}
