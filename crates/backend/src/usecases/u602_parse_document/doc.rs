//! Текст из DOC (Word 97-2003): FIB потока WordDocument и таблица кусков (CLX)

use encoding_rs::WINDOWS_1252;
use std::io::{Cursor, Read};

use crate::shared::error::LoaderError;

const WORD_IDENT: u16 = 0xA5EC;
const FLAG_ENCRYPTED: u16 = 0x0100;
const FLAG_WHICH_TABLE: u16 = 0x0200;
/// fcClx/lcbClx в FibRgFcLcb97
const CLX_PAIR_INDEX: usize = 33;
const FC_COMPRESSED: u32 = 0x4000_0000;
const FC_MASK: u32 = 0x3FFF_FFFF;

const FIELD_BEGIN: u16 = 0x13;
const FIELD_SEPARATOR: u16 = 0x14;
const FIELD_END: u16 = 0x15;

fn parse_error(message: impl Into<String>) -> LoaderError {
    LoaderError::DocumentParse(message.into())
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, LoaderError> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| parse_error(format!("Unexpected end of data at offset {}", offset)))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, LoaderError> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| parse_error(format!("Unexpected end of data at offset {}", offset)))
}

/// Нужные поля File Information Block
#[derive(Debug, PartialEq, Eq)]
struct Fib {
    table_stream: &'static str,
    ccp_text: u32,
    fc_clx: u32,
    lcb_clx: u32,
}

impl Fib {
    fn parse(word: &[u8]) -> Result<Self, LoaderError> {
        if read_u16(word, 0)? != WORD_IDENT {
            return Err(parse_error("WordDocument stream has no Word signature"));
        }
        let flags = read_u16(word, 0x0A)?;
        if flags & FLAG_ENCRYPTED != 0 {
            return Err(parse_error("Encrypted documents are not supported"));
        }

        // FibBase (32) -> csw, fibRgW -> cslw, fibRgLw -> cbRgFcLcb, fibRgFcLcbBlob
        let mut offset = 32;
        let csw = read_u16(word, offset)? as usize;
        offset += 2 + csw * 2;
        let cslw = read_u16(word, offset)? as usize;
        let rg_lw = offset + 2;
        if cslw < 4 {
            return Err(parse_error("FIB has no text length"));
        }
        let ccp_text = read_u32(word, rg_lw + 3 * 4)?;
        offset = rg_lw + cslw * 4;
        let cb_rg_fc_lcb = read_u16(word, offset)? as usize;
        if cb_rg_fc_lcb <= CLX_PAIR_INDEX {
            return Err(parse_error("FIB has no piece table location"));
        }
        let clx = offset + 2 + CLX_PAIR_INDEX * 8;

        Ok(Self {
            table_stream: if flags & FLAG_WHICH_TABLE != 0 { "1Table" } else { "0Table" },
            ccp_text,
            fc_clx: read_u32(word, clx)?,
            lcb_clx: read_u32(word, clx + 4)?,
        })
    }
}

/// Кусок текста: диапазон символов и его место в WordDocument
#[derive(Debug, PartialEq, Eq)]
struct Piece {
    cp_start: u32,
    cp_end: u32,
    offset: usize,
    compressed: bool,
}

/// Разобрать CLX: пропустить Prc, найти Pcdt и прочитать PlcPcd
fn parse_pieces(clx: &[u8]) -> Result<Vec<Piece>, LoaderError> {
    let mut pos = 0;
    loop {
        match clx.get(pos) {
            Some(0x01) => {
                let size = read_u16(clx, pos + 1)? as usize;
                pos += 3 + size;
            }
            Some(0x02) => break,
            _ => return Err(parse_error("Piece table not found in CLX")),
        }
    }

    let lcb = read_u32(clx, pos + 1)? as usize;
    let plc = clx
        .get(pos + 5..pos + 5 + lcb)
        .ok_or_else(|| parse_error("Piece table is truncated"))?;
    if lcb < 4 || (lcb - 4) % 12 != 0 {
        return Err(parse_error(format!("Invalid piece table size {}", lcb)));
    }
    let count = (lcb - 4) / 12;
    let pcd_base = (count + 1) * 4;

    (0..count)
        .map(|i| {
            let fc = read_u32(plc, pcd_base + i * 8 + 2)?;
            let compressed = fc & FC_COMPRESSED != 0;
            let raw = (fc & FC_MASK) as usize;
            Ok(Piece {
                cp_start: read_u32(plc, i * 4)?,
                cp_end: read_u32(plc, (i + 1) * 4)?,
                offset: if compressed { raw / 2 } else { raw },
                compressed,
            })
        })
        .collect()
}

/// Символы основного текста (без колонтитулов и сносок) как UTF-16 единицы
fn read_text_units(word: &[u8], pieces: &[Piece], ccp_text: u32) -> Result<Vec<u16>, LoaderError> {
    let covered = pieces.last().map_or(0, |p| p.cp_end);
    if ccp_text > covered {
        return Err(parse_error(format!(
            "Text length {} exceeds piece table coverage {}",
            ccp_text, covered
        )));
    }

    // Один символ занимает не меньше байта потока WordDocument
    let mut units = Vec::with_capacity((ccp_text as usize).min(word.len()));
    for piece in pieces {
        if piece.cp_start >= ccp_text {
            break;
        }
        let end = piece.cp_end.min(ccp_text);
        let chars = end.saturating_sub(piece.cp_start) as usize;
        let width = if piece.compressed { 1 } else { 2 };
        let bytes = word
            .get(piece.offset..piece.offset + chars * width)
            .ok_or_else(|| parse_error("Text piece points outside WordDocument stream"))?;

        if piece.compressed {
            let (decoded, _, _) = WINDOWS_1252.decode(bytes);
            units.extend(decoded.encode_utf16());
        } else {
            units.extend(bytes.chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]])));
        }
    }
    Ok(units)
}

/// Спецсимволы Word: разрывы, ячейки, поля
fn clean_text(units: &[u16]) -> String {
    // Для каждого открытого поля: true, пока идет код поля (до разделителя)
    let mut fields: Vec<bool> = Vec::new();
    let mut out: Vec<u16> = Vec::with_capacity(units.len());

    for &unit in units {
        match unit {
            FIELD_BEGIN => fields.push(true),
            FIELD_SEPARATOR => {
                if let Some(in_code) = fields.last_mut() {
                    *in_code = false;
                }
            }
            FIELD_END => {
                fields.pop();
            }
            _ if fields.iter().any(|in_code| *in_code) => {}
            0x0D | 0x0B | 0x0C => out.push(u16::from(b'\n')),
            0x07 => out.push(u16::from(b'\t')),
            0x09 => out.push(unit),
            0x1E => out.push(u16::from(b'-')),
            u if u < 0x20 => {}
            u => out.push(u),
        }
    }

    String::from_utf16_lossy(&out).trim_end().to_string()
}

/// Извлечь основной текст документа
pub fn extract_text(bytes: &[u8]) -> Result<String, LoaderError> {
    let mut file = cfb::CompoundFile::open(Cursor::new(bytes))
        .map_err(|e| parse_error(format!("Not an OLE compound file: {}", e)))?;

    let mut word = Vec::new();
    file.open_stream("/WordDocument")
        .and_then(|mut s| s.read_to_end(&mut word))
        .map_err(|e| parse_error(format!("WordDocument stream is unreadable: {}", e)))?;

    let fib = Fib::parse(&word)?;
    if fib.lcb_clx == 0 {
        return Err(parse_error("Document has no piece table"));
    }

    let mut table = Vec::new();
    file.open_stream(format!("/{}", fib.table_stream))
        .and_then(|mut s| s.read_to_end(&mut table))
        .map_err(|e| parse_error(format!("{} stream is unreadable: {}", fib.table_stream, e)))?;

    let start = fib.fc_clx as usize;
    let clx = table
        .get(start..start + fib.lcb_clx as usize)
        .ok_or_else(|| parse_error("CLX points outside table stream"))?;

    let pieces = parse_pieces(clx)?;
    let units = read_text_units(&word, &pieces, fib.ccp_text)?;
    Ok(clean_text(&units))
}
