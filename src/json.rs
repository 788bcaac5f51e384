//! JSON disk descriptions
//!
//! A human-authored JSON document describes the whole forest: a root
//! object with a `"disk"` array of file items, the first of which must
//! be the MF. Ingest converts the document into binary tree images and
//! mounts them; export walks a mounted disk back into an equivalent
//! document.
//!
//! Folder and record-EF items carry their children in a `"contents"`
//! array, transparent EFs carry a single leaf object (or null), and the
//! `hex` / `ascii` leaves carry their payload as a string.

use crate::error::{Result, UiccError};
use crate::fs::disk::{Disk, Tree};
use crate::fs::{
    File, FileHdr, FileSpec, ItemHdr, ItemType, Lcs, ADF_HDR_LEN, AID_LEN, AID_RID_LEN,
    EF_RECORD_HDR_LEN, FILE_HDR_LEN, ID_MISSING, ITEM_HDR_LEN, NAME_LEN_MAX, SID_MISSING,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Initial size of a tree emit buffer.
const DISK_SIZE_START: usize = 512;

/// Growth step applied when an emit pass reports `BufferTooShort`.
const DISK_SIZE_RESIZE: usize = 256;

/// Item type tag as spelled in the JSON document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    #[serde(rename = "file_mf")]
    Mf,
    #[serde(rename = "file_adf")]
    Adf,
    #[serde(rename = "file_df")]
    Df,
    #[serde(rename = "file_ef_transparent")]
    EfTransparent,
    #[serde(rename = "file_ef_linear-fixed")]
    EfLinearFixed,
    #[serde(rename = "file_ef_cyclic")]
    EfCyclic,
    #[serde(rename = "dato_ber-tlv")]
    BerTlvDo,
    #[serde(rename = "hex")]
    Hex,
    #[serde(rename = "ascii")]
    Ascii,
}

/// Contents of an item: child items, a single leaf, or a payload string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Contents {
    Items(Vec<ItemDoc>),
    Item(Box<ItemDoc>),
    Text(String),
}

/// One item of the JSON disk description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDoc {
    #[serde(rename = "type")]
    pub kind: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// FID as a 4-character hex string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// SFI as a 2-character hex string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// ADF application identifier as a hex string, RID first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rcrd_size: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Contents>,
}

/// The root document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskDoc {
    pub disk: Vec<ItemDoc>,
}

/// Build a disk from a JSON string.
pub fn disk_from_str(s: &str) -> Result<Disk> {
    let doc: DiskDoc = serde_json::from_str(s)?;
    disk_from_doc(&doc)
}

/// Build a disk from a JSON file.
pub fn disk_from_path<P: AsRef<Path>>(path: P) -> Result<Disk> {
    disk_from_str(&std::fs::read_to_string(path)?)
}

/// Build a disk from a parsed document.
///
/// Each tree is emitted into a growable buffer: an emit pass that runs
/// out of room reports `BufferTooShort`, the buffer grows by a fixed
/// step, and the pass retries.
pub fn disk_from_doc(doc: &DiskDoc) -> Result<Disk> {
    let mut images = Vec::with_capacity(doc.disk.len());
    for tree_doc in &doc.disk {
        let mut buf = vec![0u8; DISK_SIZE_START];
        let len = loop {
            match emit_item(tree_doc, &mut buf) {
                Ok(len) => break len,
                Err(UiccError::BufferTooShort) => {
                    let grown = buf.len() + DISK_SIZE_RESIZE;
                    buf.resize(grown, 0);
                }
                Err(e) => return Err(e),
            }
        };
        buf.truncate(len);
        tracing::debug!(bytes = len, "emitted tree from JSON description");
        images.push(buf);
    }
    Disk::from_tree_images(images)
}

/// Export a mounted disk as a document that re-parses into a disk with
/// identical ID and SID lookup-table contents.
pub fn disk_to_doc(disk: &Disk) -> Result<DiskDoc> {
    let mut docs = Vec::with_capacity(disk.tree_count());
    for tree in disk.trees() {
        let root = tree.root()?;
        docs.push(doc_for_file(tree, &root)?);
    }
    Ok(DiskDoc { disk: docs })
}

/// Export a mounted disk as pretty-printed JSON.
pub fn disk_to_json(disk: &Disk) -> Result<String> {
    Ok(serde_json::to_string_pretty(&disk_to_doc(disk)?)?)
}

fn emit_item(doc: &ItemDoc, buf: &mut [u8]) -> Result<usize> {
    match doc.kind {
        ItemKind::Mf => emit_folder(doc, buf, ItemType::FileMf),
        ItemKind::Df => emit_folder(doc, buf, ItemType::FileDf),
        ItemKind::Adf => emit_adf(doc, buf),
        ItemKind::EfTransparent => emit_ef_transparent(doc, buf),
        ItemKind::EfLinearFixed => emit_ef_record(doc, buf, ItemType::FileEfLinearFixed),
        ItemKind::EfCyclic => emit_ef_record(doc, buf, ItemType::FileEfCyclic),
        // Acknowledged stub: BER-TLV data objects parse to no payload.
        ItemKind::BerTlvDo => Ok(0),
        ItemKind::Hex => emit_hex(doc, buf),
        ItemKind::Ascii => emit_ascii(doc, buf),
    }
}

fn parse_file_hdr(doc: &ItemDoc) -> Result<FileHdr> {
    let name_str = doc
        .name
        .as_deref()
        .ok_or(UiccError::BadParameters("file item without a name"))?;
    if name_str.len() > NAME_LEN_MAX {
        return Err(UiccError::BadParameters("file name longer than 16 bytes"));
    }
    let mut name = [0u8; NAME_LEN_MAX + 1];
    name[..name_str.len()].copy_from_slice(name_str.as_bytes());

    let id = match doc.id.as_deref() {
        Some(s) => {
            let bytes = decode_hex(s)?;
            if bytes.len() != 2 {
                return Err(UiccError::BadParameters("id must be 4 hex characters"));
            }
            u16::from_be_bytes([bytes[0], bytes[1]])
        }
        None => ID_MISSING,
    };
    let sid = match doc.sid.as_deref() {
        Some(s) => {
            let bytes = decode_hex(s)?;
            if bytes.len() != 1 {
                return Err(UiccError::BadParameters("sid must be 2 hex characters"));
            }
            bytes[0]
        }
        None => SID_MISSING,
    };
    Ok(FileHdr { id, sid, name })
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|_| UiccError::BadParameters("invalid hex string"))
}

fn write_file_hdr(buf: &mut [u8], typ: ItemType, size: u32, hdr: &FileHdr) -> Result<()> {
    if buf.len() < FILE_HDR_LEN {
        return Err(UiccError::BufferTooShort);
    }
    let item = ItemHdr {
        size,
        lcs: Lcs::OperationalActivated,
        typ,
        offset_trel: 0,
        offset_prel: 0,
    };
    buf[..ITEM_HDR_LEN].copy_from_slice(&item.to_bytes());
    buf[ITEM_HDR_LEN..FILE_HDR_LEN].copy_from_slice(&hdr.to_bytes());
    Ok(())
}

/// Emit the children of a folder into `buf`, patching each child's
/// parent-relative offset once its position is known.
fn emit_children(doc: &ItemDoc, buf: &mut [u8], hdr_len: usize) -> Result<usize> {
    let items = match &doc.contents {
        Some(Contents::Items(items)) => items,
        _ => {
            return Err(UiccError::BadParameters(
                "folder contents must be an array",
            ))
        }
    };
    let mut children_len = 0usize;
    for child in items {
        if !matches!(
            child.kind,
            ItemKind::Mf
                | ItemKind::Adf
                | ItemKind::Df
                | ItemKind::EfTransparent
                | ItemKind::EfLinearFixed
                | ItemKind::EfCyclic
        ) {
            return Err(UiccError::BadParameters("folder child is not a file"));
        }
        let child_off = hdr_len + children_len;
        if buf.len() < child_off {
            return Err(UiccError::BufferTooShort);
        }
        let written = emit_item(child, &mut buf[child_off..])?;
        buf[child_off + 6..child_off + ITEM_HDR_LEN]
            .copy_from_slice(&(child_off as u32).to_le_bytes());
        children_len += written;
    }
    Ok(children_len)
}

fn emit_folder(doc: &ItemDoc, buf: &mut [u8], typ: ItemType) -> Result<usize> {
    let hdr = parse_file_hdr(doc)?;
    if buf.len() < FILE_HDR_LEN {
        return Err(UiccError::BufferTooShort);
    }
    let children_len = emit_children(doc, buf, FILE_HDR_LEN)?;
    let size = FILE_HDR_LEN + children_len;
    write_file_hdr(buf, typ, size as u32, &hdr)?;
    Ok(size)
}

fn emit_adf(doc: &ItemDoc, buf: &mut [u8]) -> Result<usize> {
    let hdr = parse_file_hdr(doc)?;
    if buf.len() < ADF_HDR_LEN {
        return Err(UiccError::BufferTooShort);
    }
    let mut aid = [0u8; AID_LEN];
    if let Some(aid_str) = doc.aid.as_deref() {
        let bytes = decode_hex(aid_str)?;
        if bytes.len() < AID_RID_LEN || bytes.len() > AID_LEN {
            return Err(UiccError::BadParameters(
                "aid must be 10 to 32 hex characters",
            ));
        }
        aid[..bytes.len()].copy_from_slice(&bytes);
    }
    let children_len = emit_children(doc, buf, ADF_HDR_LEN)?;
    let size = ADF_HDR_LEN + children_len;
    write_file_hdr(buf, ItemType::FileAdf, size as u32, &hdr)?;
    buf[FILE_HDR_LEN..ADF_HDR_LEN].copy_from_slice(&aid);
    Ok(size)
}

fn emit_ef_transparent(doc: &ItemDoc, buf: &mut [u8]) -> Result<usize> {
    let hdr = parse_file_hdr(doc)?;
    if buf.len() < FILE_HDR_LEN {
        return Err(UiccError::BufferTooShort);
    }
    let content_len = match &doc.contents {
        None => 0,
        Some(Contents::Item(item)) => emit_item(item, &mut buf[FILE_HDR_LEN..])?,
        _ => {
            return Err(UiccError::BadParameters(
                "transparent EF contents must be an object or null",
            ))
        }
    };
    let size = FILE_HDR_LEN + content_len;
    write_file_hdr(buf, ItemType::FileEfTransparent, size as u32, &hdr)?;
    Ok(size)
}

fn emit_ef_record(doc: &ItemDoc, buf: &mut [u8], typ: ItemType) -> Result<usize> {
    let hdr = parse_file_hdr(doc)?;
    if buf.len() < EF_RECORD_HDR_LEN {
        return Err(UiccError::BufferTooShort);
    }
    let rcrd_size = doc
        .rcrd_size
        .ok_or(UiccError::BadParameters("record EF without rcrd_size"))?;
    if rcrd_size == 0 {
        return Err(UiccError::BadParameters("rcrd_size must be positive"));
    }
    let items = match &doc.contents {
        Some(Contents::Items(items)) => items,
        _ => {
            return Err(UiccError::BadParameters(
                "record EF contents must be an array",
            ))
        }
    };

    let mut contents_len = 0usize;
    for item in items {
        let slot = EF_RECORD_HDR_LEN + contents_len;
        if buf.len() < slot + usize::from(rcrd_size) {
            return Err(UiccError::BufferTooShort);
        }
        // Unused record bytes are 0xFF.
        buf[slot..slot + usize::from(rcrd_size)].fill(0xFF);
        let written = emit_item(item, &mut buf[slot..])?;
        if written > usize::from(rcrd_size) {
            return Err(UiccError::BadParameters("record longer than rcrd_size"));
        }
        contents_len += usize::from(rcrd_size);
    }

    let size = EF_RECORD_HDR_LEN + contents_len;
    write_file_hdr(buf, typ, size as u32, &hdr)?;
    buf[FILE_HDR_LEN] = rcrd_size;
    Ok(size)
}

fn emit_hex(doc: &ItemDoc, buf: &mut [u8]) -> Result<usize> {
    let text = match &doc.contents {
        Some(Contents::Text(text)) => text,
        _ => {
            return Err(UiccError::BadParameters(
                "hex item contents must be a string",
            ))
        }
    };
    let bytes = decode_hex(text)?;
    if buf.len() < bytes.len() {
        return Err(UiccError::BufferTooShort);
    }
    buf[..bytes.len()].copy_from_slice(&bytes);
    Ok(bytes.len())
}

fn emit_ascii(doc: &ItemDoc, buf: &mut [u8]) -> Result<usize> {
    let text = match &doc.contents {
        Some(Contents::Text(text)) => text,
        _ => {
            return Err(UiccError::BadParameters(
                "ascii item contents must be a string",
            ))
        }
    };
    let bytes = text.as_bytes();
    if buf.len() < bytes.len() {
        return Err(UiccError::BufferTooShort);
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

fn doc_for_file(tree: &Tree, file: &File) -> Result<ItemDoc> {
    let kind = match file.hdr_item.typ {
        ItemType::FileMf => ItemKind::Mf,
        ItemType::FileAdf => ItemKind::Adf,
        ItemType::FileDf => ItemKind::Df,
        ItemType::FileEfTransparent => ItemKind::EfTransparent,
        ItemType::FileEfLinearFixed => ItemKind::EfLinearFixed,
        ItemType::FileEfCyclic => ItemKind::EfCyclic,
        other => return Err(UiccError::InvalidItemType(other as u8)),
    };
    let name_bytes = &file.hdr_file.name;
    let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(NAME_LEN_MAX);
    let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

    let mut doc = ItemDoc {
        kind,
        name: Some(name),
        id: (file.hdr_file.id != ID_MISSING).then(|| format!("{:04x}", file.hdr_file.id)),
        sid: (file.hdr_file.sid != SID_MISSING).then(|| format!("{:02x}", file.hdr_file.sid)),
        aid: None,
        rcrd_size: None,
        contents: None,
    };

    match file.spec {
        FileSpec::Adf { rid, pix } => {
            let mut aid = Vec::with_capacity(AID_LEN);
            aid.extend_from_slice(&rid);
            aid.extend_from_slice(&pix);
            doc.aid = Some(hex::encode(aid));
        }
        FileSpec::Record { rcrd_size } => doc.rcrd_size = Some(rcrd_size),
        FileSpec::None => {}
    }

    match file.hdr_item.typ {
        ItemType::FileMf | ItemType::FileAdf | ItemType::FileDf => {
            let mut children = Vec::new();
            let mut cursor = file.hdr_item.typ.hdr_len() as u32;
            while cursor < file.hdr_item.size {
                let child = tree.file_at(file.hdr_item.offset_trel + cursor)?;
                children.push(doc_for_file(tree, &child)?);
                cursor += child.hdr_item.size;
            }
            doc.contents = Some(Contents::Items(children));
        }
        ItemType::FileEfTransparent => {
            let data = tree.data_of(file);
            if !data.is_empty() {
                doc.contents = Some(Contents::Item(Box::new(hex_leaf(data))));
            }
        }
        ItemType::FileEfLinearFixed | ItemType::FileEfCyclic => {
            let count = tree.record_count(file)?;
            let mut records = Vec::with_capacity(count as usize);
            for idx in 0..count {
                records.push(hex_leaf(tree.record(file, idx as u8)?));
            }
            doc.contents = Some(Contents::Items(records));
        }
        _ => {}
    }
    Ok(doc)
}

fn hex_leaf(data: &[u8]) -> ItemDoc {
    ItemDoc {
        kind: ItemKind::Hex,
        name: None,
        id: None,
        sid: None,
        aid: None,
        rcrd_size: None,
        contents: Some(Contents::Text(hex::encode(data))),
    }
}
