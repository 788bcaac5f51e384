//! Shared fixtures for file-system unit tests.

use crate::fs::disk::Disk;
use crate::fs::{
    FileHdr, ItemHdr, ItemType, Lcs, ADF_HDR_LEN, AID_PIX_LEN, AID_RID_LEN, EF_RECORD_HDR_LEN,
    FILE_HDR_LEN,
};

pub(crate) fn name(n: &str) -> [u8; 17] {
    let mut out = [0u8; 17];
    out[..n.len()].copy_from_slice(n.as_bytes());
    out
}

pub(crate) fn file_hdr_bytes(
    typ: ItemType,
    size: u32,
    offset_prel: u32,
    id: u16,
    sid: u8,
    nm: &str,
) -> Vec<u8> {
    let item = ItemHdr {
        size,
        lcs: Lcs::OperationalActivated,
        typ,
        offset_trel: 0,
        offset_prel,
    };
    let file = FileHdr {
        id,
        sid,
        name: name(nm),
    };
    let mut out = Vec::new();
    out.extend_from_slice(&item.to_bytes());
    out.extend_from_slice(&file.to_bytes());
    out
}

/// MF 3F00 [ DF 7FFF [ EF-transparent 6F07 (5 bytes, SID 7) ],
///           EF-linear-fixed 2F00 (2 records of 3, SID 5) ]
pub(crate) fn build_test_tree() -> Vec<u8> {
    let fh = FILE_HDR_LEN as u32;
    let ef_t_size = fh + 5;
    let df_size = fh + ef_t_size;
    let ef_lf_size = EF_RECORD_HDR_LEN as u32 + 6;
    let mf_size = fh + df_size + ef_lf_size;

    let mut buf = Vec::new();
    buf.extend_from_slice(&file_hdr_bytes(ItemType::FileMf, mf_size, 0, 0x3F00, 0, "MF"));
    buf.extend_from_slice(&file_hdr_bytes(
        ItemType::FileDf,
        df_size,
        fh,
        0x7FFF,
        0,
        "DF_TEST",
    ));
    buf.extend_from_slice(&file_hdr_bytes(
        ItemType::FileEfTransparent,
        ef_t_size,
        fh,
        0x6F07,
        0x07,
        "EF_T",
    ));
    buf.extend_from_slice(&[0x01, 0x02, 0x03, 0x04, 0x05]);
    buf.extend_from_slice(&file_hdr_bytes(
        ItemType::FileEfLinearFixed,
        ef_lf_size,
        fh + df_size,
        0x2F00,
        0x05,
        "EF_LF",
    ));
    buf.push(3); // rcrd_size
    buf.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xFF, 0xFF, 0xFF]);
    assert_eq!(buf.len(), mf_size as usize);
    buf
}

/// ADF tree: ADF 7F90 (given RID, PIX starting 10 02)
/// [ EF-transparent 6F05 (4 bytes, SID 3) ]
pub(crate) fn build_adf_tree(rid: [u8; AID_RID_LEN]) -> Vec<u8> {
    let ef_size = FILE_HDR_LEN as u32 + 4;
    let adf_size = ADF_HDR_LEN as u32 + ef_size;

    let mut buf = Vec::new();
    buf.extend_from_slice(&file_hdr_bytes(
        ItemType::FileAdf,
        adf_size,
        0,
        0x7F90,
        0,
        "ADF_TEST",
    ));
    let mut pix = [0u8; AID_PIX_LEN];
    pix[0] = 0x10;
    pix[1] = 0x02;
    buf.extend_from_slice(&rid);
    buf.extend_from_slice(&pix);
    buf.extend_from_slice(&file_hdr_bytes(
        ItemType::FileEfTransparent,
        ef_size,
        ADF_HDR_LEN as u32,
        0x6F05,
        0x03,
        "EF_A",
    ));
    buf.extend_from_slice(&[0x09, 0x09, 0x09, 0x09]);
    assert_eq!(buf.len(), adf_size as usize);
    buf
}

pub(crate) fn build_test_disk() -> Disk {
    Disk::from_tree_images(vec![build_test_tree()]).unwrap()
}

pub(crate) fn build_two_tree_disk() -> Disk {
    Disk::from_tree_images(vec![
        build_test_tree(),
        build_adf_tree([0xA0, 0x00, 0x00, 0x00, 0x87]),
    ])
    .unwrap()
}
