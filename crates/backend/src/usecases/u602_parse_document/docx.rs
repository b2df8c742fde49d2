//! Текст из DOCX: `word/document.xml` внутри ZIP

use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::{BytesRef, Event};
use quick_xml::Reader;
use std::io::{BufReader, Cursor, Read, Take};
use zip::ZipArchive;

use crate::shared::error::LoaderError;

const DOCUMENT_PART: &str = "word/document.xml";

fn parse_error(context: &str, err: impl std::fmt::Display) -> LoaderError {
    LoaderError::DocumentParse(format!("{}: {}", context, err))
}

fn too_large(max_xml_bytes: u64) -> LoaderError {
    LoaderError::DocumentParse(format!(
        "{} inflates beyond {} bytes",
        DOCUMENT_PART, max_xml_bytes
    ))
}

/// Распакованная часть прочитана сверх лимита
fn inflated_past_limit<R: Read>(reader: &Reader<BufReader<Take<R>>>) -> bool {
    reader.get_ref().get_ref().limit() == 0
}

/// Извлечь текст абзацев; абзацы разделяются переводом строки
///
/// `max_xml_bytes` ограничивает распакованный `word/document.xml`.
pub fn extract_text(bytes: &[u8], max_xml_bytes: u64) -> Result<String, LoaderError> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| parse_error("Not a DOCX archive", e))?;
    let part = archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| parse_error("DOCX has no main document part", e))?;
    if part.size() > max_xml_bytes {
        return Err(too_large(max_xml_bytes));
    }

    // Размер в заголовке ZIP не гарантирован: читаем не больше лимита и одного байта
    let bounded = part.take(max_xml_bytes.saturating_add(1));
    let mut reader = Reader::from_reader(BufReader::new(bounded));
    let config = reader.config_mut();
    config.check_end_names = false;
    config.expand_empty_elements = true;
    config.trim_text(false);

    let mut buf = Vec::with_capacity(1024);
    let mut text = String::new();
    let mut in_text = false;
    let mut in_tab_stops = false;

    loop {
        buf.clear();
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(_) if inflated_past_limit(&reader) => return Err(too_large(max_xml_bytes)),
            Err(e) => return Err(parse_error("Malformed document.xml", e)),
        };
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tabs" => in_tab_stops = true,
                // w:tab внутри w:tabs описывает позицию табуляции, а не символ
                b"tab" if !in_tab_stops => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"tabs" => in_tab_stops = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => {
                let content = t
                    .xml_content()
                    .map_err(|e| parse_error("Invalid text encoding", e))?;
                text.push_str(&content);
            }
            Event::GeneralRef(r) if in_text => push_reference(&mut text, &r)?,
            Event::Eof if inflated_past_limit(&reader) => return Err(too_large(max_xml_bytes)),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text.trim_end().to_string())
}

fn push_reference(text: &mut String, reference: &BytesRef) -> Result<(), LoaderError> {
    let raw = reference
        .xml_content()
        .map_err(|e| parse_error("Invalid entity", e))?;
    if let Some(number) = raw.strip_prefix('#') {
        let code = match number.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => number.parse::<u32>(),
        }
        .map_err(|e| parse_error("Invalid character reference", e))?;
        if let Some(c) = char::from_u32(code) {
            text.push(c);
        }
    } else if let Some(entity) = resolve_xml_entity(&raw) {
        text.push_str(entity);
    } else {
        return Err(parse_error("Unknown entity", raw));
    }
    Ok(())
}
