//! Modern XML-zip presentation reader.
//!
//! The package keeps one XML part per slide under `ppt/slides/`, with the
//! presentation order defined by the relationship entries in
//! `ppt/_rels/presentation.xml.rels`. Text lives in `<a:t>` runs inside
//! shapes; the first non-empty shape of a slide is treated as its title.

use crate::types::{
    ContentSource, DetectionMethod, Document, DocumentFormat, SlideContent, TrackError,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, trace};
use zip::ZipArchive;

/// Parse a ZIP-packaged XML presentation.
pub fn parse(bytes: &[u8], path: &Path) -> Result<Document, TrackError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| TrackError::CorruptDocument(format!("failed to open archive: {}", e)))?;

    let slide_paths = slide_order(&mut archive)?;
    if slide_paths.is_empty() {
        return Err(TrackError::CorruptDocument(
            "no slide relationships in presentation".to_string(),
        ));
    }

    let mut slides = Vec::with_capacity(slide_paths.len());
    for (i, slide_path) in slide_paths.iter().enumerate() {
        let index = (i + 1) as u32;
        let xml = read_archive_file(&mut archive, slide_path)?;
        let mut slide = parse_slide(&xml, index)?;

        // Notes parts are numbered like their slide part, which can differ
        // from the presentation order
        if let Some(part_number) = trailing_number(slide_path) {
            let notes_path = format!("ppt/notesSlides/notesSlide{}.xml", part_number);
            if let Ok(notes_xml) = read_archive_file(&mut archive, &notes_path) {
                slide.notes = extract_notes(&notes_xml)?;
            }
        }

        trace!("Parsed slide {} from {}", index, slide_path);
        slides.push(slide);
    }

    debug!("Parsed {} slides from {:?}", slides.len(), path);

    Ok(Document {
        path: path.to_path_buf(),
        format: DocumentFormat::ModernXml,
        total_slides: slides.len() as u32,
        slides,
        count_method: DetectionMethod::FileEstimate,
        count_confidence: 1.0,
    })
}

/// Ordered slide part paths from the presentation relationships.
fn slide_order<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<String>, TrackError> {
    let rels = read_archive_file(archive, "ppt/_rels/presentation.xml.rels")?;
    let mut slides: Vec<(String, Option<u32>)> = Vec::new();

    let mut reader = Reader::from_str(&rels);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut id = String::new();

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Type" => rel_type = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }

                // Slide relationships only; layouts and masters share the prefix
                if rel_type.contains("/slide")
                    && !rel_type.contains("slideLayout")
                    && !rel_type.contains("slideMaster")
                {
                    let order = trailing_number(&id).or_else(|| trailing_number(&target));
                    let full_path = if let Some(stripped) = target.strip_prefix('/') {
                        stripped.to_string()
                    } else {
                        format!("ppt/{}", target)
                    };
                    slides.push((full_path, order));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TrackError::CorruptDocument(format!(
                    "error parsing relationships: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    slides.sort_by(|a, b| match (a.1, b.1) {
        (Some(na), Some(nb)) => na.cmp(&nb),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.0.cmp(&b.0),
    });

    Ok(slides.into_iter().map(|(path, _)| path).collect())
}

/// Parse one slide part into content. Shape texts are collected in document
/// order; the first non-empty one becomes the title.
fn parse_slide(xml: &str, index: u32) -> Result<SlideContent, TrackError> {
    let shapes = shape_texts(xml)?;

    let mut shapes = shapes.into_iter();
    let title = shapes.next();
    let body = shapes.collect::<Vec<_>>().join("\n");

    Ok(SlideContent {
        index,
        title,
        body,
        notes: None,
        source: ContentSource::NativeParse,
    })
}

/// Notes are shapes like any other; join them all.
fn extract_notes(xml: &str) -> Result<Option<String>, TrackError> {
    let shapes = shape_texts(xml)?;
    if shapes.is_empty() {
        Ok(None)
    } else {
        Ok(Some(shapes.join("\n")))
    }
}

/// Collect the text of each `<p:sp>` shape, paragraphs joined by newlines,
/// empty shapes dropped.
fn shape_texts(xml: &str) -> Result<Vec<String>, TrackError> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut in_shape = false;
    let mut in_text_run = false;
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" => {
                    in_shape = true;
                    current.clear();
                }
                b"p" if in_shape && !current.is_empty() => current.push('\n'),
                b"t" if in_shape => in_text_run = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                if in_text_run {
                    let text = e.unescape().unwrap_or_default();
                    current.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" => {
                    let text = current.trim().to_string();
                    if !text.is_empty() {
                        shapes.push(text);
                    }
                    current.clear();
                    in_shape = false;
                    in_text_run = false;
                }
                b"t" => in_text_run = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TrackError::CorruptDocument(format!(
                    "error parsing slide XML: {}",
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(shapes)
}

fn read_archive_file<R: Read + std::io::Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<String, TrackError> {
    let mut file = archive.by_name(path).map_err(|e| {
        TrackError::CorruptDocument(format!("missing archive part '{}': {}", path, e))
    })?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| TrackError::CorruptDocument(format!("failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Trailing digits of a string like "rId2" or "slide3.xml".
fn trailing_number(s: &str) -> Option<u32> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");
    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.chars().rev().collect::<String>().parse().ok()
}
