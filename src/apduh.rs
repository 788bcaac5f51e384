//! Interindustry APDU dispatch
//!
//! Routes a command APDU by its class and instruction byte, drives the
//! two-phase procedure protocol, and implements SELECT, READ BINARY,
//! READ RECORD, and GET RESPONSE. Handlers never surface internal
//! errors: every failure is translated into a status word so the card
//! stays responsive no matter which file-system invariant was violated.

use crate::apdu::{ApduCmd, ApduRes, ClaType, Sw1};
use crate::card::Card;
use crate::error::{Result, UiccError};
use crate::fs::va::{Fs, FsPath, PathType};
use crate::fs::{File, ItemType, AID_LEN, AID_RID_LEN, ID_MISSING, NAME_LEN_MAX, SID_MISSING};
use crate::tlv::{Encoder, Tag};

/// Hook for proprietary-class APDUs. Returning `None` reports the
/// command as unhandled.
pub type ProprietaryHandler = Box<dyn FnMut(&mut Fs, &ApduCmd, u32) -> Option<ApduRes> + Send>;

/// Route one command APDU to its handler.
///
/// `procedure_count` is the number of times this APDU has already
/// re-entered dispatch for the current command: 0 before the host has
/// transferred the data field, 1 or more after.
pub fn demux(card: &mut Card, cmd: &ApduCmd, procedure_count: u32) -> ApduRes {
    let res = match cmd.hdr.cla.typ {
        ClaType::Invalid | ClaType::Rfu => ApduRes::status(Sw1::ClaNotSupported, 0),
        ClaType::Proprietary => match card.apduh_pro.take() {
            Some(mut handler) => {
                let res = handler(&mut card.fs, cmd, procedure_count);
                card.apduh_pro = Some(handler);
                res.unwrap_or_else(|| ApduRes::status(Sw1::InsNotSupported, 0))
            }
            None => ApduRes::status(Sw1::InsNotSupported, 0),
        },
        ClaType::Interindustry => match cmd.hdr.ins {
            0xA4 => select(card, cmd, procedure_count),
            0xB0 | 0xB1 => read_binary(card, cmd, procedure_count),
            0xB2 | 0xB3 => read_record(card, cmd, procedure_count),
            0xC0 => get_response(card, cmd, procedure_count),
            _ => ApduRes::status(Sw1::InsNotSupported, 0),
        },
    };
    tracing::trace!(ins = cmd.hdr.ins, sw = res.sw(), "dispatched APDU");
    res
}

/// File reference method encoded in P1 of SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meth {
    MfDfEf,
    DfNested,
    EfNested,
    DfParent,
    DfName,
    MfPath,
    DfPath,
    Do,
    DoParent,
    Rfu,
}

/// Occurrence selector encoded in the low bits of P2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occ {
    First,
    Last,
    Next,
    Prev,
}

/// Requested response template encoded in bits 3..2 of P2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataReq {
    Fci,
    Fcp,
    Fmd,
    Tags,
    Absent,
}

/// SELECT (INS 0xA4), ISO 7816-4:2020 sec.11.2.2.
fn select(card: &mut Card, cmd: &ApduCmd, procedure_count: u32) -> ApduRes {
    // Any value of P2 with the high nibble set is RFU.
    if cmd.hdr.p2 & 0xF0 != 0 {
        return ApduRes::status(Sw1::WrongParamsQualified, 0x86);
    }

    if procedure_count == 0 {
        // No data may arrive before the procedure byte was sent.
        if !cmd.data.is_empty() {
            return ApduRes::status(Sw1::UnknownError, 0);
        }
        if cmd.p3 > 0 {
            return ApduRes::ack_all();
        }
    }
    if procedure_count >= 1 && cmd.data.len() != usize::from(cmd.p3) {
        return ApduRes::status(Sw1::WrongLength, 0x02);
    }

    let meth = match cmd.hdr.p1 {
        0x00 => Meth::MfDfEf,
        0x01 => Meth::DfNested,
        0x02 => Meth::EfNested,
        0x03 => Meth::DfParent,
        0x04 => Meth::DfName,
        0x08 => Meth::MfPath,
        0x09 => Meth::DfPath,
        0x10 => Meth::Do,
        0x13 => Meth::DoParent,
        _ => Meth::Rfu,
    };
    let occ = match cmd.hdr.p2 & 0x03 {
        0x00 => Occ::First,
        0x01 => Occ::Last,
        0x02 => Occ::Next,
        _ => Occ::Prev,
    };
    let data_req = match cmd.hdr.p2 & 0x0C {
        0x00 => DataReq::Fci,
        0x04 => DataReq::Fcp,
        0x08 => {
            if matches!(meth, Meth::Do | Meth::DoParent) {
                DataReq::Tags
            } else {
                DataReq::Fmd
            }
        }
        _ => DataReq::Absent,
    };

    // DO selection and RFU methods are rejected outright.
    if matches!(meth, Meth::Rfu | Meth::Do | Meth::DoParent) {
        return ApduRes::status(Sw1::WrongParamsQualified, 0);
    }

    let ret_select = match meth {
        Meth::MfDfEf => {
            if cmd.data.len() == 2 {
                let fid = u16::from_be_bytes([cmd.data[0], cmd.data[1]]);
                card.fs.select_file_id(fid)
            } else if cmd.data.len() >= AID_RID_LEN && cmd.data.len() <= AID_LEN {
                card.fs.select_adf(&cmd.data, cmd.data.len() - AID_RID_LEN)
            } else {
                Err(UiccError::BadParameters("reference is neither a FID nor an AID"))
            }
        }
        Meth::DfNested | Meth::EfNested | Meth::DfParent => Err(UiccError::NotImplemented),
        Meth::DfName => {
            if cmd.data.is_empty() || occ != Occ::First {
                Err(UiccError::BadParameters("DF name must be a first occurrence"))
            } else {
                card.fs.select_file_dfname(&cmd.data)
            }
        }
        Meth::MfPath | Meth::DfPath => {
            if cmd.data.len() < 2 || occ != Occ::First {
                Err(UiccError::BadParameters("path must hold at least one FID"))
            } else {
                let typ = if meth == Meth::MfPath {
                    PathType::FromMf
                } else {
                    PathType::FromCurrentDf
                };
                card.fs.select_file_path(FsPath { typ, b: &cmd.data })
            }
        }
        Meth::Rfu | Meth::Do | Meth::DoParent => unreachable!("rejected above"),
    };
    match ret_select {
        Err(UiccError::NotFound) => return ApduRes::status(Sw1::WrongParamsQualified, 0x82),
        Err(_) => return ApduRes::status(Sw1::UnknownError, 0),
        Ok(()) => {}
    }

    // The file the selection landed on: the EF if one is set, else the DF.
    let file = match card.fs.va.cur_ef.or(card.fs.va.cur_df) {
        Some(file) => file,
        None => return ApduRes::status(Sw1::UnknownError, 0),
    };

    if data_req == DataReq::Absent {
        return ApduRes::success();
    }

    let encoded = match encode_select_response(&file, data_req) {
        Ok(encoded) => encoded,
        Err(_) => {
            card.res.clear();
            return ApduRes::status(Sw1::UnknownError, 0);
        }
    };
    if encoded.len() > 0xFF || card.res.stash(&encoded).is_err() {
        card.res.clear();
        return ApduRes::status(Sw1::UnknownError, 0);
    }
    if encoded.is_empty() {
        ApduRes::success()
    } else {
        ApduRes::status(Sw1::BytesAvailable, encoded.len() as u8)
    }
}

/// Encode the requested FCI/FCP/FMD templates for a selected file,
/// running the dry pass to size the buffer and the real pass to fill it.
fn encode_select_response(file: &File, data_req: DataReq) -> Result<Vec<u8>> {
    let mut dry = Encoder::dry();
    encode_select_templates(&mut dry, file, data_req)?;
    let mut buf = vec![0u8; dry.len()];
    let mut real = Encoder::real(&mut buf);
    encode_select_templates(&mut real, file, data_req)?;
    Ok(buf)
}

fn encode_select_templates(enc: &mut Encoder<'_>, file: &File, data_req: DataReq) -> Result<()> {
    let fci = data_req == DataReq::Fci;
    if fci {
        enc.nstd_start();
    }
    if fci || data_req == DataReq::Fcp {
        enc.nstd_start();
        if !file.is_folder() && file.hdr_file.sid != SID_MISSING {
            enc.data(&[file.hdr_file.sid])?;
            enc.hdr(&Tag::new(0x88))?;
        }
        if file.is_folder() {
            enc.data(&file.hdr_file.name[..NAME_LEN_MAX])?;
            enc.hdr(&Tag::new(0x84))?;
        }
        enc.data(&file.data_size.to_be_bytes())?;
        enc.hdr(&Tag::new(0x80))?;
        enc.data(&[file.hdr_item.lcs.iso_byte()])?;
        enc.hdr(&Tag::new(0x8A))?;
        if file.hdr_file.id != ID_MISSING {
            enc.data(&file.hdr_file.id.to_be_bytes())?;
            enc.hdr(&Tag::new(0x83))?;
        }
        enc.data(&[file.descriptor_byte(), file.data_coding_byte()])?;
        enc.hdr(&Tag::new(0x82))?;
        enc.nstd_end()?;
        enc.hdr(&Tag::new(0x62))?;
    }
    if fci || data_req == DataReq::Fmd {
        // FMD content is empty in this implementation.
        enc.nstd_start();
        enc.nstd_end()?;
        enc.hdr(&Tag::new(0x64))?;
    }
    if fci {
        enc.nstd_end()?;
        enc.hdr(&Tag::new(0x6F))?;
    }
    Ok(())
}

/// READ BINARY (INS 0xB0), ISO 7816-4:2020 sec.11.3.3. The odd
/// instruction 0xB1 (BER-TLV encoded data field) is not supported.
fn read_binary(card: &mut Card, cmd: &ApduCmd, procedure_count: u32) -> ApduRes {
    if cmd.hdr.ins != 0xB0 {
        return ApduRes::status(Sw1::InsNotSupported, 0);
    }

    // No command data: acknowledge with 0 bytes expected.
    if procedure_count == 0 {
        return ApduRes::ack_all();
    }
    if !cmd.data.is_empty() {
        return ApduRes::status(Sw1::WrongLength, 0x02);
    }

    let ne = usize::from(cmd.p3);
    let sid_use = cmd.hdr.p1 & 0x80 != 0;
    let (file, offset, sid) = if sid_use {
        // b7..b6 of P1 must be 0; b5..b1 encode the SFI, P2 the offset.
        if cmd.hdr.p1 & 0x60 != 0 {
            return ApduRes::status(Sw1::WrongParamsQualified, 0x86);
        }
        let sid = cmd.hdr.p1 & 0x1F;
        let tree = match card.fs.cur_tree() {
            Ok(tree) => tree,
            Err(_) => return ApduRes::status(Sw1::UnknownError, 0),
        };
        match tree.lutsid_lookup(sid) {
            Ok(file) => (file, u32::from(cmd.hdr.p2), Some(sid)),
            Err(UiccError::NotFound) => {
                return ApduRes::status(Sw1::WrongParamsQualified, 0x82)
            }
            Err(_) => return ApduRes::status(Sw1::UnknownError, 0),
        }
    } else {
        // P1-P2 encode a 15-bit offset into the current EF.
        let offset = u32::from(cmd.hdr.p1 & 0x7F) << 8 | u32::from(cmd.hdr.p2);
        match card.fs.va.cur_ef {
            Some(file) => (file, offset, None),
            None => return ApduRes::status(Sw1::CommandNotAllowed, 0x86),
        }
    };

    if file.hdr_item.typ != ItemType::FileEfTransparent {
        return ApduRes::status(Sw1::CommandNotAllowed, 0x81);
    }
    if offset >= file.data_size {
        return ApduRes::status(Sw1::WrongParams, 0);
    }

    let readable = (file.data_size - offset) as usize;
    let len_read = ne.min(readable);
    let data = {
        let tree = match card.fs.cur_tree() {
            Ok(tree) => tree,
            Err(_) => return ApduRes::status(Sw1::UnknownError, 0),
        };
        let start = offset as usize;
        tree.data_of(&file)[start..start + len_read].to_vec()
    };

    // A successful SFI read also binds the selection to the EF.
    if let Some(sid) = sid {
        if card.fs.select_file_sid(sid).is_err() {
            return ApduRes::status(Sw1::UnknownError, 0);
        }
    }

    if len_read < ne {
        ApduRes::with_data(Sw1::Warning, 0x82, data)
    } else {
        ApduRes::with_data(Sw1::Success, 0, data)
    }
}

/// READ RECORD (INS 0xB2), ISO 7816-4:2020 sec.11.4.3. The odd
/// instruction 0xB3 is not supported.
fn read_record(card: &mut Card, cmd: &ApduCmd, procedure_count: u32) -> ApduRes {
    if cmd.hdr.ins != 0xB2 {
        return ApduRes::status(Sw1::InsNotSupported, 0);
    }

    if procedure_count == 0 {
        return ApduRes::ack_all();
    }
    if !cmd.data.is_empty() {
        return ApduRes::status(Sw1::WrongLength, 0x02);
    }

    // P2 bits 7..3 select the target, bit 2 the addressing method, bits
    // 1..0 which records to read.
    let target_sel = (cmd.hdr.p2 & 0xF8) >> 3;
    let number_mode = cmd.hdr.p2 & 0x04 != 0;

    // Record-ID addressing and the many-EFs target are not supported.
    if !number_mode || target_sel == 0x1F {
        return ApduRes::status(Sw1::WrongParamsQualified, 0x81);
    }
    // P1 0x00 is reserved for special purposes, 0xFF is RFU.
    if cmd.hdr.p1 == 0x00 || cmd.hdr.p1 == 0xFF {
        return ApduRes::status(Sw1::WrongParamsQualified, 0x86);
    }
    match cmd.hdr.p2 & 0x03 {
        // Only "record number P1" is implemented.
        0x00 => {}
        // P1-to-last and last-to-P1 ranges.
        0x01 | 0x02 => return ApduRes::status(Sw1::WrongParamsQualified, 0x81),
        // RFU.
        _ => return ApduRes::status(Sw1::WrongParamsQualified, 0x86),
    }

    let rcrd_idx = cmd.hdr.p1 - 1;
    let sid = (target_sel != 0).then_some(target_sel);
    let ef = if let Some(sid) = sid {
        let tree = match card.fs.cur_tree() {
            Ok(tree) => tree,
            Err(_) => return ApduRes::status(Sw1::UnknownError, 0),
        };
        match tree.lutsid_lookup(sid) {
            Ok(file) => file,
            Err(UiccError::NotFound) => {
                return ApduRes::status(Sw1::WrongParamsQualified, 0x82)
            }
            Err(_) => return ApduRes::status(Sw1::UnknownError, 0),
        }
    } else {
        match card.fs.va.cur_ef {
            Some(file) => file,
            None => return ApduRes::status(Sw1::CommandNotAllowed, 0x86),
        }
    };

    let record = {
        let tree = match card.fs.cur_tree() {
            Ok(tree) => tree,
            Err(_) => return ApduRes::status(Sw1::UnknownError, 0),
        };
        match tree.record(&ef, rcrd_idx) {
            Ok(record) => record.to_vec(),
            Err(UiccError::NotFound) => {
                return ApduRes::status(Sw1::WrongParamsQualified, 0x83)
            }
            Err(_) => return ApduRes::status(Sw1::UnknownError, 0),
        }
    };

    // Ne must equal the record size; otherwise ask the host to retry
    // with the correct expected length.
    if usize::from(cmd.p3) != record.len() {
        return ApduRes::status(Sw1::WrongLe, record.len() as u8);
    }

    if sid.is_some() && card.fs.select_file_sid(ef.hdr_file.sid).is_err() {
        return ApduRes::status(Sw1::UnknownError, 0);
    }
    if card.fs.select_record_idx(rcrd_idx).is_err() {
        return ApduRes::status(Sw1::UnknownError, 0);
    }
    ApduRes::with_data(Sw1::Success, 0, record)
}

/// GET RESPONSE (INS 0xC0), ISO 7816-4:2020 sec.11.7.1: retrieve bytes
/// stashed in the response buffer by an earlier command.
fn get_response(card: &mut Card, cmd: &ApduCmd, procedure_count: u32) -> ApduRes {
    if procedure_count == 0 {
        return ApduRes::ack_all();
    }
    // Lc is absent for this command, so any data marks a malformed APDU.
    if !cmd.data.is_empty() {
        return ApduRes::status(Sw1::WrongLength, 0x01);
    }
    if cmd.hdr.p1 != 0 || cmd.hdr.p2 != 0 {
        return ApduRes::status(Sw1::WrongParamsQualified, 0x86);
    }
    if cmd.p3 == 0 {
        return ApduRes::success();
    }

    let ne = u16::from(cmd.p3);
    let available = card.res.available();
    if available < ne {
        return ApduRes::status(Sw1::Warning, 0x82);
    }
    let data = card.res.read(ne).to_vec();
    if available == ne {
        ApduRes::with_data(Sw1::Success, 0, data)
    } else {
        ApduRes::with_data(Sw1::BytesAvailable, (available - ne) as u8, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::testutil::build_test_disk;

    fn mounted_card() -> Card {
        Card::mount(build_test_disk()).unwrap()
    }

    fn apdu(bytes: &[u8]) -> ApduCmd {
        ApduCmd::parse(bytes).unwrap()
    }

    #[test]
    fn test_rfu_class_rejected() {
        let mut card = mounted_card();
        let cmd = apdu(&[0x20, 0xA4, 0x00, 0x04]);
        assert_eq!(demux(&mut card, &cmd, 0).sw(), 0x6E00);
    }

    #[test]
    fn test_proprietary_class_unhandled_without_hook() {
        let mut card = mounted_card();
        let cmd = apdu(&[0x80, 0x10, 0x00, 0x00]);
        assert_eq!(demux(&mut card, &cmd, 0).sw(), 0x6D00);
    }

    #[test]
    fn test_proprietary_hook_invoked() {
        let mut card = mounted_card();
        card.register_proprietary_handler(Box::new(|_fs, cmd, _count| {
            (cmd.hdr.ins == 0x10).then(|| ApduRes::with_data(Sw1::Success, 0, vec![0x42]))
        }));
        let cmd = apdu(&[0x80, 0x10, 0x00, 0x00]);
        let res = demux(&mut card, &cmd, 0);
        assert_eq!(res.sw(), 0x9000);
        assert_eq!(res.data, vec![0x42]);
        let cmd = apdu(&[0x80, 0x11, 0x00, 0x00]);
        assert_eq!(demux(&mut card, &cmd, 0).sw(), 0x6D00);
    }

    #[test]
    fn test_odd_read_instructions_rejected() {
        let mut card = mounted_card();
        let cmd = apdu(&[0x00, 0xB1, 0x00, 0x00, 0x05]);
        assert_eq!(demux(&mut card, &cmd, 0).sw(), 0x6D00);
        let cmd = apdu(&[0x00, 0xB3, 0x01, 0x04, 0x03]);
        assert_eq!(demux(&mut card, &cmd, 0).sw(), 0x6D00);
    }

    #[test]
    fn test_select_rfu_p2_rejected() {
        let mut card = mounted_card();
        let cmd = apdu(&[0x00, 0xA4, 0x00, 0x14, 0x02, 0x3F, 0x00]);
        assert_eq!(demux(&mut card, &cmd, 0).sw(), 0x6A86);
    }

    #[test]
    fn test_select_do_method_rejected() {
        let mut card = mounted_card();
        let cmd = apdu(&[0x00, 0xA4, 0x10, 0x04, 0x02, 0x3F, 0x00]);
        let first = demux(&mut card, &cmd.without_data(), 0);
        assert_eq!(first.sw1, Sw1::AckAll);
        assert_eq!(demux(&mut card, &cmd, 1).sw(), 0x6A00);
    }

    #[test]
    fn test_select_lc_mismatch() {
        let mut card = mounted_card();
        let mut cmd = apdu(&[0x00, 0xA4, 0x00, 0x04, 0x02, 0x3F, 0x00]);
        cmd.data.pop();
        assert_eq!(demux(&mut card, &cmd, 1).sw(), 0x6702);
    }

    #[test]
    fn test_read_record_by_number() {
        let mut card = mounted_card();
        // Select EF 2F00 (2 records of 3 bytes), then read record 1.
        let sel = apdu(&[0x00, 0xA4, 0x00, 0x0C, 0x02, 0x2F, 0x00]);
        assert_eq!(demux(&mut card, &sel, 1).sw(), 0x9000);
        let rd = apdu(&[0x00, 0xB2, 0x01, 0x04, 0x03]);
        let res = demux(&mut card, &rd, 1);
        assert_eq!(res.sw(), 0x9000);
        assert_eq!(res.data, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(card.fs.va.cur_rcrd, Some(0));
    }

    #[test]
    fn test_read_record_wrong_le_reports_length() {
        let mut card = mounted_card();
        let sel = apdu(&[0x00, 0xA4, 0x00, 0x0C, 0x02, 0x2F, 0x00]);
        assert_eq!(demux(&mut card, &sel, 1).sw(), 0x9000);
        let rd = apdu(&[0x00, 0xB2, 0x01, 0x04, 0x05]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6C03);
    }

    #[test]
    fn test_read_record_not_found() {
        let mut card = mounted_card();
        let sel = apdu(&[0x00, 0xA4, 0x00, 0x0C, 0x02, 0x2F, 0x00]);
        assert_eq!(demux(&mut card, &sel, 1).sw(), 0x9000);
        let rd = apdu(&[0x00, 0xB2, 0x03, 0x04, 0x03]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6A83);
    }

    #[test]
    fn test_read_record_by_sfi() {
        let mut card = mounted_card();
        // SFI 5 in P2 bits 7..3, record number mode.
        let rd = apdu(&[0x00, 0xB2, 0x02, 0x2C, 0x03]);
        let res = demux(&mut card, &rd, 1);
        assert_eq!(res.sw(), 0x9000);
        assert_eq!(res.data, vec![0xFF, 0xFF, 0xFF]);
        assert_eq!(card.fs.va.cur_ef.unwrap().hdr_file.id, 0x2F00);
        assert_eq!(card.fs.va.cur_rcrd, Some(1));
    }

    #[test]
    fn test_read_record_id_mode_unsupported() {
        let mut card = mounted_card();
        let rd = apdu(&[0x00, 0xB2, 0x01, 0x00, 0x03]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6A81);
    }

    #[test]
    fn test_read_record_reserved_p1() {
        let mut card = mounted_card();
        let rd = apdu(&[0x00, 0xB2, 0x00, 0x04, 0x03]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6A86);
        let rd = apdu(&[0x00, 0xB2, 0xFF, 0x04, 0x03]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6A86);
    }

    #[test]
    fn test_read_record_range_modes_unsupported() {
        let mut card = mounted_card();
        let rd = apdu(&[0x00, 0xB2, 0x01, 0x05, 0x03]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6A81);
        let rd = apdu(&[0x00, 0xB2, 0x01, 0x07, 0x03]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6A86);
    }

    #[test]
    fn test_read_binary_incompatible_structure() {
        let mut card = mounted_card();
        let sel = apdu(&[0x00, 0xA4, 0x00, 0x0C, 0x02, 0x2F, 0x00]);
        assert_eq!(demux(&mut card, &sel, 1).sw(), 0x9000);
        let rd = apdu(&[0x00, 0xB0, 0x00, 0x00, 0x03]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6981);
    }

    #[test]
    fn test_read_binary_no_current_ef() {
        let mut card = mounted_card();
        let rd = apdu(&[0x00, 0xB0, 0x00, 0x00, 0x05]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6986);
    }

    #[test]
    fn test_read_binary_offset_out_of_range() {
        let mut card = mounted_card();
        let sel = apdu(&[0x00, 0xA4, 0x00, 0x0C, 0x02, 0x6F, 0x07]);
        assert_eq!(demux(&mut card, &sel, 1).sw(), 0x9000);
        let rd = apdu(&[0x00, 0xB0, 0x00, 0x05, 0x01]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6B00);
    }

    #[test]
    fn test_read_binary_sfi_reserved_bits() {
        let mut card = mounted_card();
        let rd = apdu(&[0x00, 0xB0, 0xC7, 0x00, 0x02]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6A86);
    }

    #[test]
    fn test_read_binary_sfi_not_found() {
        let mut card = mounted_card();
        let rd = apdu(&[0x00, 0xB0, 0x9E, 0x00, 0x02]);
        assert_eq!(demux(&mut card, &rd, 1).sw(), 0x6A82);
    }

    #[test]
    fn test_get_response_p1p2_nonzero() {
        let mut card = mounted_card();
        let cmd = apdu(&[0x00, 0xC0, 0x01, 0x00, 0x10]);
        assert_eq!(demux(&mut card, &cmd, 1).sw(), 0x6A86);
    }

    #[test]
    fn test_get_response_zero_le() {
        let mut card = mounted_card();
        let cmd = apdu(&[0x00, 0xC0, 0x00, 0x00, 0x00]);
        assert_eq!(demux(&mut card, &cmd, 1).sw(), 0x9000);
    }
}
