//! Legacy binary presentation reader.
//!
//! The pre-XML format stores everything in an OLE compound file whose
//! "PowerPoint Document" stream is a tree of 8-byte-headed records.
//! Full decoding is out of reach, so the reader works in tiers:
//!
//! 1. Structural scan: walk the record tree, count slide persist atoms
//!    and opportunistically collect text runs. Exact-ish count.
//! 2. Size estimate: `clamp(file_size / 50_000, 2, 100)` slides.
//! 3. Default: a single-slide document.
//!
//! Each tier's provenance and confidence is recorded on the document so
//! the detection orchestrator can label results derived from it.

use crate::types::{
    ContentSource, DetectionMethod, Document, DocumentFormat, SlideContent,
};
use cfb::CompoundFile;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, trace, warn};

/// Bytes of file per slide, tuned against real-world legacy decks
const BYTES_PER_SLIDE: u64 = 50_000;

/// Record type constants for the legacy binary format
mod record_types {
    pub const RT_SLIDE_PERSIST_ATOM: u16 = 0x03F0;
    pub const RT_TEXT_HEADER_ATOM: u16 = 0x0F9F;
    pub const RT_TEXT_CHARS_ATOM: u16 = 0x0FA0;
    pub const RT_TEXT_BYTES_ATOM: u16 = 0x0FA8;
}

/// Confidence tiers for the three extraction strategies
const STRUCTURAL_CONFIDENCE: f32 = 0.6;
const ESTIMATE_CONFIDENCE: f32 = 0.3;

/// Parse a legacy binary presentation. Infallible: each tier falls through
/// to the next, ending at a single-slide default.
pub fn parse(bytes: &[u8], path: &Path) -> Document {
    if let Some((slides, total)) = structural_scan(bytes) {
        debug!("Structural scan of {:?} found {} slides", path, total);
        return Document {
            path: path.to_path_buf(),
            format: DocumentFormat::LegacyBinary,
            total_slides: total,
            slides,
            count_method: DetectionMethod::FileEstimate,
            count_confidence: STRUCTURAL_CONFIDENCE,
        };
    }

    if !bytes.is_empty() {
        let total = estimate_slide_count(bytes.len() as u64);
        debug!(
            "Estimated {} slides for {:?} from {} bytes",
            total,
            path,
            bytes.len()
        );
        return Document {
            path: path.to_path_buf(),
            format: DocumentFormat::LegacyBinary,
            total_slides: total,
            slides: (1..=total).map(SlideContent::placeholder).collect(),
            count_method: DetectionMethod::FileEstimate,
            count_confidence: ESTIMATE_CONFIDENCE,
        };
    }

    warn!("No usable structure in {:?}, defaulting to one slide", path);
    Document {
        path: path.to_path_buf(),
        format: DocumentFormat::LegacyBinary,
        total_slides: 1,
        slides: vec![SlideContent::placeholder(1)],
        count_method: DetectionMethod::Default,
        count_confidence: 0.0,
    }
}

/// Size-based slide count estimate.
pub fn estimate_slide_count(file_size: u64) -> u32 {
    (file_size / BYTES_PER_SLIDE).clamp(2, 100) as u32
}

/// Kind of text a header atom announces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextKind {
    Title,
    Body,
    Notes,
}

impl TextKind {
    fn from_header(value: u32) -> Self {
        match value {
            // Title and centered title placeholders
            0 | 6 => TextKind::Title,
            2 => TextKind::Notes,
            _ => TextKind::Body,
        }
    }
}

struct TextEntry {
    text: String,
    kind: TextKind,
    slide_hint: usize,
}

/// Walk the record tree of the document stream. Returns slide contents and
/// a total when more than one slide persist atom is present; a flat or
/// unreadable stream falls through to the size estimate.
fn structural_scan(bytes: &[u8]) -> Option<(Vec<SlideContent>, u32)> {
    let mut cfb = CompoundFile::open(Cursor::new(bytes)).ok()?;
    let mut stream = cfb.open_stream("/PowerPoint Document").ok()?;
    let mut data = Vec::new();
    stream.read_to_end(&mut data).ok()?;

    let mut entries = Vec::new();
    let mut persist_count = 0usize;
    let mut current_kind = TextKind::Body;
    walk_records(
        &data,
        0,
        data.len(),
        &mut entries,
        &mut persist_count,
        &mut current_kind,
    );

    if persist_count < 2 {
        trace!("Structural scan found {} persist atoms, falling back", persist_count);
        return None;
    }

    let total = persist_count as u32;
    let mut slides: Vec<SlideContent> = (1..=total).map(SlideContent::placeholder).collect();

    for entry in entries {
        // Entries before the first persist atom belong to masters, skip them
        if entry.slide_hint == 0 || entry.slide_hint > slides.len() {
            continue;
        }
        let slide = &mut slides[entry.slide_hint - 1];
        slide.source = ContentSource::NativeParse;
        match entry.kind {
            TextKind::Title if slide.title.is_none() => slide.title = Some(entry.text),
            TextKind::Notes => match &mut slide.notes {
                Some(notes) => {
                    notes.push('\n');
                    notes.push_str(&entry.text);
                }
                None => slide.notes = Some(entry.text),
            },
            _ => {
                if !slide.body.is_empty() {
                    slide.body.push('\n');
                }
                slide.body.push_str(&entry.text);
            }
        }
    }

    Some((slides, total))
}

/// Recursive record walk. Records carry an 8-byte header: 2 bytes of
/// recVer/recInstance, 2 bytes of recType, 4 bytes of recLen; a recVer of
/// 0xF marks a container whose payload is itself a record list.
fn walk_records(
    data: &[u8],
    start: usize,
    end: usize,
    entries: &mut Vec<TextEntry>,
    persist_count: &mut usize,
    current_kind: &mut TextKind,
) {
    let mut pos = start;

    while pos + 8 <= end {
        let rec_ver_instance = read_u16_le(data, pos);
        let rec_type = read_u16_le(data, pos + 2);
        let rec_len = read_u32_le(data, pos + 4) as usize;

        let rec_ver = rec_ver_instance & 0x0F;
        let content_start = pos + 8;
        let content_end = content_start + rec_len;

        if content_end > end || content_end > data.len() {
            // Record extends past boundary, stop
            break;
        }

        match rec_type {
            record_types::RT_SLIDE_PERSIST_ATOM => {
                *persist_count += 1;
            }
            record_types::RT_TEXT_HEADER_ATOM => {
                if rec_len >= 4 {
                    *current_kind = TextKind::from_header(read_u32_le(data, content_start));
                }
            }
            record_types::RT_TEXT_CHARS_ATOM => {
                if let Some(text) = decode_utf16le(&data[content_start..content_end]) {
                    entries.push(TextEntry {
                        text,
                        kind: *current_kind,
                        slide_hint: *persist_count,
                    });
                }
            }
            record_types::RT_TEXT_BYTES_ATOM => {
                if let Some(text) = decode_ansi(&data[content_start..content_end]) {
                    entries.push(TextEntry {
                        text,
                        kind: *current_kind,
                        slide_hint: *persist_count,
                    });
                }
            }
            _ => {}
        }

        if rec_ver == 0x0F {
            walk_records(
                data,
                content_start,
                content_end,
                entries,
                persist_count,
                current_kind,
            );
        }

        pos = content_end;
    }
}

fn decode_utf16le(slice: &[u8]) -> Option<String> {
    if slice.is_empty() || slice.len() % 2 != 0 {
        return None;
    }

    let units: Vec<u16> = slice
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect();

    let text: String = char::decode_utf16(units.iter().copied())
        .take_while(|r| r.as_ref().map(|&c| c != '\0').unwrap_or(false))
        .filter_map(|r| r.ok())
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Latin-1 approximation of the legacy ANSI code page.
fn decode_ansi(slice: &[u8]) -> Option<String> {
    let end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
    let text: String = slice[..end]
        .iter()
        .map(|&b| char::from_u32(b as u32).unwrap_or('?'))
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn record(ver: u8, rec_type: u16, payload: &[u8]) -> Vec<u8> {
        let mut rec = Vec::with_capacity(8 + payload.len());
        rec.extend_from_slice(&(ver as u16).to_le_bytes());
        rec.extend_from_slice(&rec_type.to_le_bytes());
        rec.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        rec.extend_from_slice(payload);
        rec
    }

    fn utf16le(s: &str) -> Vec<u8> {
        s.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    /// Build an OLE container whose document stream describes two slides.
    fn two_slide_container() -> Vec<u8> {
        let mut stream = Vec::new();
        stream.extend(record(0, record_types::RT_SLIDE_PERSIST_ATOM, &[0u8; 20]));
        stream.extend(record(0, record_types::RT_TEXT_HEADER_ATOM, &0u32.to_le_bytes()));
        stream.extend(record(0, record_types::RT_TEXT_BYTES_ATOM, b"Opening"));
        stream.extend(record(0, record_types::RT_SLIDE_PERSIST_ATOM, &[0u8; 20]));
        stream.extend(record(0, record_types::RT_TEXT_HEADER_ATOM, &1u32.to_le_bytes()));
        stream.extend(record(
            0,
            record_types::RT_TEXT_CHARS_ATOM,
            &utf16le("Second slide text"),
        ));

        // Wrap the records in a container record
        let container = record(0x0F, 0x03E8, &stream);

        let cursor = Cursor::new(Vec::new());
        let mut cfb = CompoundFile::create(cursor).unwrap();
        {
            let mut s = cfb.create_stream("/PowerPoint Document").unwrap();
            s.write_all(&container).unwrap();
        }
        cfb.into_inner().into_inner()
    }

    #[test]
    fn test_structural_scan_counts_and_text() {
        let bytes = two_slide_container();
        let doc = parse(&bytes, Path::new("old.ppt"));

        assert_eq!(doc.total_slides, 2);
        assert_eq!(doc.count_method, DetectionMethod::FileEstimate);
        assert_eq!(doc.count_confidence, STRUCTURAL_CONFIDENCE);
        assert_eq!(doc.slides[0].title.as_deref(), Some("Opening"));
        assert_eq!(doc.slides[1].body, "Second slide text");
    }

    #[test]
    fn test_size_estimate_when_stream_unreadable() {
        // Valid-looking prefix, but not a parseable container
        let mut bytes = vec![0u8; 914_000];
        bytes[..8].copy_from_slice(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]);

        let doc = parse(&bytes, Path::new("big.ppt"));
        assert_eq!(doc.total_slides, 18);
        assert_eq!(doc.count_method, DetectionMethod::FileEstimate);
        assert_eq!(doc.count_confidence, ESTIMATE_CONFIDENCE);
        assert_eq!(doc.slides.len(), 18);
        assert!(doc.total_is_estimate());
    }

    #[test]
    fn test_estimate_clamping() {
        assert_eq!(estimate_slide_count(914_000), 18);
        assert_eq!(estimate_slide_count(10), 2);
        assert_eq!(estimate_slide_count(0), 2);
        assert_eq!(estimate_slide_count(100_000_000), 100);
    }

    #[test]
    fn test_empty_file_defaults_to_one_slide() {
        let doc = parse(&[], Path::new("empty.ppt"));
        assert_eq!(doc.total_slides, 1);
        assert_eq!(doc.count_method, DetectionMethod::Default);
        assert_eq!(doc.count_confidence, 0.0);
    }

    #[test]
    fn test_single_persist_atom_falls_back_to_estimate() {
        let mut stream = Vec::new();
        stream.extend(record(0, record_types::RT_SLIDE_PERSIST_ATOM, &[0u8; 20]));

        let cursor = Cursor::new(Vec::new());
        let mut cfb = CompoundFile::create(cursor).unwrap();
        {
            let mut s = cfb.create_stream("/PowerPoint Document").unwrap();
            s.write_all(&stream).unwrap();
        }
        let bytes = cfb.into_inner().into_inner();

        let doc = parse(&bytes, Path::new("flat.ppt"));
        assert_eq!(doc.count_confidence, ESTIMATE_CONFIDENCE);
        assert_eq!(doc.total_slides, 2); // tiny file clamps to the floor
    }
}
