//! Core types used throughout the slide tracking engine.
//!
//! This module defines the fundamental data structures for window snapshots,
//! slide positions, detection results, and extracted slide content.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a window (platform-specific)
pub type WindowId = u64;

/// How a slide position was determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectionMethod {
    /// Parsed from the window title (exact)
    TitleParse,
    /// Recognized from a screen capture
    Ocr,
    /// Estimated from document structure or file size
    FileEstimate,
    /// Nothing better was available
    Default,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::TitleParse => "title-parse",
            DetectionMethod::Ocr => "ocr",
            DetectionMethod::FileEstimate => "file-estimate",
            DetectionMethod::Default => "default",
        }
    }
}

/// Presentation application state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationMode {
    /// Slide thumbnails / editor visible
    Editing,
    /// Slides shown full-screen sequentially
    Slideshow,
    Unknown,
}

/// Position inside a live presentation.
///
/// `total` is `None` when the source (e.g. a bare "Slide N" title) did not
/// carry a slide count; `current` is provisional in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidePosition {
    /// 1-based current slide
    pub current: u32,
    /// Total slide count, when known
    pub total: Option<u32>,
    pub mode: PresentationMode,
}

impl SlidePosition {
    pub fn new(current: u32, total: Option<u32>, mode: PresentationMode) -> Self {
        Self { current, total, mode }
    }

    /// Clamp `current` into `[1, total]` when the total is known.
    pub fn clamped(mut self) -> Self {
        if let Some(total) = self.total {
            self.current = self.current.clamp(1, total.max(1));
        } else {
            self.current = self.current.max(1);
        }
        self
    }
}

/// Result of one detection pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub position: SlidePosition,
    pub method: DetectionMethod,
    /// Confidence score in [0.0, 1.0]
    pub confidence: f32,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl DetectionResult {
    pub fn new(position: SlidePosition, method: DetectionMethod, confidence: f32) -> Self {
        Self {
            position,
            method,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: chrono::Utc::now(),
        }
    }

    /// A non-Default result always supersedes a Default one.
    pub fn supersedes(&self, previous: &DetectionResult) -> bool {
        self.method != DetectionMethod::Default || previous.method == DetectionMethod::Default
    }
}

/// Information about a window, valid for one enumeration snapshot only.
///
/// The OS may recycle or move windows between polls, so handles are
/// re-resolved on every cycle rather than held across them.
#[derive(Debug, Clone)]
pub struct WindowInfo {
    /// Unique window identifier
    pub id: WindowId,
    /// Window title
    pub title: String,
    /// Owning application name (process name on platforms without one)
    pub app_name: String,
    /// Window bounds (x, y, width, height)
    pub bounds: WindowBounds,
    /// Process ID of the owning application
    pub pid: u32,
    /// Whether this window has keyboard focus
    pub is_focused: bool,
}

/// Window position and size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowBounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Get the center point of the window
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width as i32 / 2),
            self.y + (self.height as i32 / 2),
        )
    }

    /// Check if a point is inside this bounds
    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x
            && x < self.x + self.width as i32
            && y >= self.y
            && y < self.y + self.height as i32
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Shrink the bounds by `margin` on every side, used to tolerate OS
    /// chrome variance when capturing a window region.
    pub fn padded(&self, margin: u32) -> Self {
        let m = margin as i32;
        Self {
            x: self.x + m,
            y: self.y + m,
            width: self.width.saturating_sub(2 * margin).max(1),
            height: self.height.saturating_sub(2 * margin).max(1),
        }
    }
}

/// Where slide content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentSource {
    /// Parsed out of the document file
    NativeParse,
    /// Recognized from a screen capture
    Ocr,
}

/// Text content of a single slide. Immutable once produced for a given
/// document version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideContent {
    /// 1-based slide index
    pub index: u32,
    pub title: Option<String>,
    pub body: String,
    pub notes: Option<String>,
    pub source: ContentSource,
}

impl SlideContent {
    /// Placeholder slide for documents whose content is not recoverable
    /// (legacy format tracked purely by count).
    pub fn placeholder(index: u32) -> Self {
        Self {
            index,
            title: None,
            body: String::new(),
            notes: None,
            source: ContentSource::NativeParse,
        }
    }

    /// All searchable text of this slide, lowercased.
    pub fn searchable_text(&self) -> String {
        let mut text = String::new();
        if let Some(title) = &self.title {
            text.push_str(title);
            text.push('\n');
        }
        text.push_str(&self.body);
        if let Some(notes) = &self.notes {
            text.push('\n');
            text.push_str(notes);
        }
        text.to_lowercase()
    }
}

/// Container format of a presentation file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    /// Modern XML-zip package
    ModernXml,
    /// Legacy OLE compound-file binary
    LegacyBinary,
}

impl DocumentFormat {
    /// Detect the format from container magic bytes, not the extension.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        // ZIP local file header
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::ModernXml);
        }

        // OLE compound file signature
        if bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]) {
            return Some(Self::LegacyBinary);
        }

        None
    }
}

/// A loaded presentation document. Read-only for callers after load; the
/// only permitted mutation is an upward revision of the slide count when a
/// later window-based detection disagrees with the initial parse.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub total_slides: u32,
    /// Slides in presentation order; entry `i` is slide index `i + 1`
    pub slides: Vec<SlideContent>,
    /// Provenance of `total_slides`
    pub count_method: DetectionMethod,
    /// Confidence in `total_slides`, below 1.0 for estimated counts
    pub count_confidence: f32,
}

impl Document {
    /// Slide content by 1-based index.
    pub fn slide(&self, n: u32) -> Result<&SlideContent, TrackError> {
        if n < 1 || n > self.total_slides {
            return Err(TrackError::IndexOutOfRange {
                requested: n,
                total: self.total_slides,
            });
        }
        self.slides
            .get((n - 1) as usize)
            .ok_or(TrackError::IndexOutOfRange {
                requested: n,
                total: self.total_slides,
            })
    }

    /// 1-based indices of slides containing `text` (case-insensitive).
    pub fn search(&self, text: &str) -> Vec<u32> {
        let needle = text.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.slides
            .iter()
            .filter(|s| s.searchable_text().contains(&needle))
            .map(|s| s.index)
            .collect()
    }

    /// Whether `total_slides` came from an estimate rather than an exact parse.
    pub fn total_is_estimate(&self) -> bool {
        self.count_confidence < 1.0
    }

    /// Revise the slide count upward, extending with placeholders. Downward
    /// revisions are ignored; they require an explicit re-load.
    pub fn revise_total_upward(&mut self, new_total: u32) -> bool {
        if new_total <= self.total_slides {
            return false;
        }
        for index in (self.total_slides + 1)..=new_total {
            self.slides.push(SlideContent::placeholder(index));
        }
        self.total_slides = new_total;
        true
    }
}

/// A token of recognized text with its location and confidence, as reported
/// by the OCR backend.
#[derive(Debug, Clone)]
pub struct OcrToken {
    pub text: String,
    pub bounds: WindowBounds,
    /// Per-token recognition confidence in [0.0, 1.0]
    pub confidence: f32,
}

/// Errors that can occur during document loading and tracking
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt document: {0}")]
    CorruptDocument(String),

    #[error("Slide index {requested} outside [1, {total}]")]
    IndexOutOfRange { requested: u32, total: u32 },

    #[error("No matching presentation window this cycle")]
    DetectionUnavailable,

    #[error("OCR capture exceeded its time box")]
    CaptureTimeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds_center() {
        let bounds = WindowBounds::new(100, 200, 800, 600);
        assert_eq!(bounds.center(), (500, 500));
    }

    #[test]
    fn test_window_bounds_contains() {
        let bounds = WindowBounds::new(0, 0, 100, 100);
        assert!(bounds.contains(50, 50));
        assert!(bounds.contains(0, 0));
        assert!(!bounds.contains(100, 100));
        assert!(!bounds.contains(-1, 50));
    }

    #[test]
    fn test_window_bounds_padded() {
        let bounds = WindowBounds::new(10, 10, 100, 80).padded(5);
        assert_eq!(bounds, WindowBounds::new(15, 15, 90, 70));

        // Padding never collapses the region to zero
        let tiny = WindowBounds::new(0, 0, 4, 4).padded(5);
        assert_eq!(tiny.width, 1);
        assert_eq!(tiny.height, 1);
    }

    #[test]
    fn test_format_from_magic() {
        assert_eq!(
            DocumentFormat::from_magic(&[0x50, 0x4B, 0x03, 0x04, 0x00]),
            Some(DocumentFormat::ModernXml)
        );
        assert_eq!(
            DocumentFormat::from_magic(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
            Some(DocumentFormat::LegacyBinary)
        );
        assert_eq!(DocumentFormat::from_magic(b"%PDF"), None);
        assert_eq!(DocumentFormat::from_magic(&[0x50, 0x4B]), None);
    }

    #[test]
    fn test_position_clamped() {
        let pos = SlidePosition::new(12, Some(10), PresentationMode::Slideshow).clamped();
        assert_eq!(pos.current, 10);

        let pos = SlidePosition::new(0, None, PresentationMode::Unknown).clamped();
        assert_eq!(pos.current, 1);
    }

    #[test]
    fn test_default_result_superseded() {
        let fallback = DetectionResult::new(
            SlidePosition::new(1, Some(1), PresentationMode::Unknown),
            DetectionMethod::Default,
            0.0,
        );
        let parsed = DetectionResult::new(
            SlidePosition::new(3, Some(12), PresentationMode::Slideshow),
            DetectionMethod::TitleParse,
            1.0,
        );

        assert!(parsed.supersedes(&fallback));
        assert!(!fallback.supersedes(&parsed));
    }

    #[test]
    fn test_document_search_and_bounds() {
        let doc = Document {
            path: PathBuf::from("deck.pptx"),
            format: DocumentFormat::ModernXml,
            total_slides: 2,
            slides: vec![
                SlideContent {
                    index: 1,
                    title: Some("Intro".into()),
                    body: "Welcome".into(),
                    notes: None,
                    source: ContentSource::NativeParse,
                },
                SlideContent {
                    index: 2,
                    title: None,
                    body: "Body A".into(),
                    notes: Some("speaker notes".into()),
                    source: ContentSource::NativeParse,
                },
            ],
            count_method: DetectionMethod::TitleParse,
            count_confidence: 1.0,
        };

        assert_eq!(doc.search("body"), vec![2]);
        assert_eq!(doc.search("speaker"), vec![2]);
        assert_eq!(doc.search("INTRO"), vec![1]);
        assert!(doc.search("missing").is_empty());
        assert!(doc.search("").is_empty());

        assert!(doc.slide(1).is_ok());
        assert!(matches!(
            doc.slide(3),
            Err(TrackError::IndexOutOfRange { requested: 3, total: 2 })
        ));
        assert!(matches!(doc.slide(0), Err(TrackError::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_revise_total_upward_only() {
        let mut doc = Document {
            path: PathBuf::from("deck.ppt"),
            format: DocumentFormat::LegacyBinary,
            total_slides: 3,
            slides: (1..=3).map(SlideContent::placeholder).collect(),
            count_method: DetectionMethod::FileEstimate,
            count_confidence: 0.3,
        };

        assert!(doc.revise_total_upward(5));
        assert_eq!(doc.total_slides, 5);
        assert_eq!(doc.slides.len(), 5);

        // Downward revision is ignored
        assert!(!doc.revise_total_upward(2));
        assert_eq!(doc.total_slides, 5);
    }
}
