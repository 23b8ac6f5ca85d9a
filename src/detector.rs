//! Detection orchestration.
//!
//! One detection pass takes a window snapshot and an optional loaded
//! document and produces the best available position, trying sources in
//! order of fidelity: title parse, OCR, document-derived fallback. Every
//! failure falls through to the next source; the pass itself never errors.

use crate::config::DetectionConfig;
use crate::ocr::OcrFallback;
use crate::title;
use crate::types::{
    DetectionMethod, DetectionResult, Document, PresentationMode, SlideContent, SlidePosition,
    WindowInfo,
};
use crate::window::presentation_candidates;
use tracing::{debug, trace, warn};

/// Confidence for a title parse carrying an explicit total
const TITLE_CONFIDENCE: f32 = 1.0;
/// Confidence for a bare "Slide N" title
const TITLE_PARTIAL_CONFIDENCE: f32 = 0.9;
/// Ceiling for document-derived fallback results
const DOCUMENT_CONFIDENCE: f32 = 0.4;

pub struct Detector {
    config: DetectionConfig,
    /// Absent OCR means the capture step is skipped deterministically
    ocr: Option<OcrFallback>,
}

impl Detector {
    pub fn new(config: DetectionConfig, ocr: Option<OcrFallback>) -> Self {
        Self { config, ocr }
    }

    /// Pick the presentation window to track from a snapshot: the focused
    /// candidate, else one whose title carries a slideshow marker, else the
    /// largest by area.
    pub fn pick_candidate<'a>(&self, windows: &'a [WindowInfo]) -> Option<&'a WindowInfo> {
        let candidates = presentation_candidates(windows, &self.config);
        if candidates.is_empty() {
            return None;
        }

        if let Some(focused) = candidates.iter().copied().find(|w| w.is_focused) {
            return Some(focused);
        }

        if let Some(slideshow) = candidates
            .iter()
            .copied()
            .find(|w| title::parse_mode(&w.title) == PresentationMode::Slideshow)
        {
            return Some(slideshow);
        }

        candidates.into_iter().max_by_key(|w| w.bounds.area())
    }

    /// Run one detection pass. `last_current` carries the previously
    /// published slide so document-derived fallbacks do not snap back to
    /// slide 1. Returns `None` when no presentation window is visible and
    /// no fallback applies.
    pub async fn detect(
        &self,
        windows: &[WindowInfo],
        document: Option<&Document>,
        last_current: Option<u32>,
    ) -> Option<DetectionResult> {
        let window = self.pick_candidate(windows)?;
        trace!("Detecting against window {} ({:?})", window.id, window.title);

        if let Some(position) = title::parse(&window.title) {
            let confidence = if position.total.is_some() {
                TITLE_CONFIDENCE
            } else {
                TITLE_PARTIAL_CONFIDENCE
            };
            let position = self.fill_total(position, document);
            return Some(self.finish(DetectionResult::new(
                position,
                DetectionMethod::TitleParse,
                confidence,
            )));
        }

        if let Some(ocr) = &self.ocr {
            match ocr.detect_position(window).await {
                Ok(Some(result)) if result.confidence >= self.config.min_ocr_confidence => {
                    let position = self.fill_total(result.position, document);
                    return Some(self.finish(DetectionResult::new(
                        position,
                        result.method,
                        result.confidence,
                    )));
                }
                Ok(Some(result)) => debug!(
                    "OCR position {} below confidence floor ({:.2} < {:.2})",
                    result.position.current, result.confidence, self.config.min_ocr_confidence
                ),
                Ok(None) => trace!("OCR yielded no position for window {}", window.id),
                Err(e) => debug!("OCR pass failed: {}", e),
            }
        }

        if let Some(doc) = document {
            let mode = title::parse_mode(&window.title);
            let (method, confidence) = match doc.count_method {
                DetectionMethod::Default => (DetectionMethod::Default, 0.0),
                _ => (
                    DetectionMethod::FileEstimate,
                    DOCUMENT_CONFIDENCE * doc.count_confidence,
                ),
            };
            // Only the extent is known; hold the last published slide
            let current = last_current.unwrap_or(1);
            return Some(self.finish(DetectionResult::new(
                SlidePosition::new(current, Some(doc.total_slides), mode),
                method,
                confidence,
            )));
        }

        debug!("Window {} carries no position and no fallback applies", window.id);
        None
    }

    /// Recognize the visible slide's text from its pixels, for sessions
    /// without a document copy. Failures are absorbed.
    pub async fn recognize_slide(&self, window: &WindowInfo, index: u32) -> Option<SlideContent> {
        let ocr = self.ocr.as_ref()?;
        match ocr.recognize_slide(window, index).await {
            Ok(content) => content,
            Err(e) => {
                debug!("OCR content pass failed: {}", e);
                None
            }
        }
    }

    /// A title without a total borrows the document's slide count.
    fn fill_total(&self, mut position: SlidePosition, document: Option<&Document>) -> SlidePosition {
        if position.total.is_none() {
            if let Some(doc) = document {
                if doc.count_method != DetectionMethod::Default {
                    position.total = Some(doc.total_slides.max(position.current));
                }
            }
        }
        position
    }

    fn finish(&self, mut result: DetectionResult) -> DetectionResult {
        if let Some(total) = result.position.total {
            if result.position.current > total {
                warn!(
                    "Detected slide {} beyond total {}, clamping",
                    result.position.current, total
                );
                result.position = result.position.clamped();
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::ScreenCapture;
    use crate::ocr::OcrEngine;
    use crate::types::{ContentSource, DocumentFormat, OcrToken, SlideContent, TrackError, WindowBounds};
    use image::DynamicImage;
    use std::path::PathBuf;

    fn window(id: u64, title: &str, app: &str, focused: bool, area: (u32, u32)) -> WindowInfo {
        WindowInfo {
            id,
            title: title.to_string(),
            app_name: app.to_string(),
            bounds: WindowBounds::new(0, 0, area.0, area.1),
            pid: 42,
            is_focused: focused,
        }
    }

    fn document(total: u32, method: DetectionMethod, confidence: f32) -> Document {
        Document {
            path: PathBuf::from("deck.ppt"),
            format: DocumentFormat::LegacyBinary,
            total_slides: total,
            slides: (1..=total)
                .map(|i| SlideContent {
                    index: i,
                    title: None,
                    body: String::new(),
                    notes: None,
                    source: ContentSource::NativeParse,
                })
                .collect(),
            count_method: method,
            count_confidence: confidence,
        }
    }

    fn detector() -> Detector {
        Detector::new(DetectionConfig::default(), None)
    }

    #[test]
    fn test_focused_candidate_preferred() {
        let windows = vec![
            window(1, "big.pptx - PowerPoint", "PowerPoint", false, (1920, 1080)),
            window(2, "small.pptx - PowerPoint", "PowerPoint", true, (800, 600)),
        ];
        assert_eq!(detector().pick_candidate(&windows).unwrap().id, 2);
    }

    #[test]
    fn test_slideshow_title_beats_area() {
        let windows = vec![
            window(1, "edit.pptx - PowerPoint", "PowerPoint", false, (1920, 1080)),
            window(2, "deck - PowerPoint Slide Show", "PowerPoint", false, (800, 600)),
        ];
        assert_eq!(detector().pick_candidate(&windows).unwrap().id, 2);
    }

    #[test]
    fn test_largest_area_fallback() {
        let windows = vec![
            window(1, "a.pptx - PowerPoint", "PowerPoint", false, (800, 600)),
            window(2, "b.pptx - PowerPoint", "PowerPoint", false, (1920, 1080)),
        ];
        assert_eq!(detector().pick_candidate(&windows).unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_title_parse_path() {
        let windows = vec![window(
            1,
            "Slide 5 of 20 - Presentation - PowerPoint",
            "PowerPoint",
            true,
            (1920, 1080),
        )];
        let result = detector().detect(&windows, None, None).await.unwrap();
        assert_eq!(result.method, DetectionMethod::TitleParse);
        assert_eq!(result.position.current, 5);
        assert_eq!(result.position.total, Some(20));
        assert_eq!(result.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_no_candidate_yields_none() {
        let windows = vec![window(1, "bash", "Terminal", true, (800, 600))];
        assert!(detector().detect(&windows, None, None).await.is_none());
    }

    #[tokio::test]
    async fn test_document_fallback() {
        let windows = vec![window(1, "deck.pptx - PowerPoint", "PowerPoint", true, (800, 600))];
        let doc = document(18, DetectionMethod::FileEstimate, 0.3);
        let result = detector().detect(&windows, Some(&doc), None).await.unwrap();
        assert_eq!(result.method, DetectionMethod::FileEstimate);
        assert_eq!(result.position.current, 1);
        assert_eq!(result.position.total, Some(18));
        assert!(result.confidence > 0.0 && result.confidence < 0.2);
    }

    #[tokio::test]
    async fn test_document_fallback_holds_last_position() {
        let windows = vec![window(1, "deck.pptx - PowerPoint", "PowerPoint", true, (800, 600))];
        let doc = document(18, DetectionMethod::FileEstimate, 0.3);
        let result = detector().detect(&windows, Some(&doc), Some(7)).await.unwrap();
        assert_eq!(result.position.current, 7);
        assert_eq!(result.position.total, Some(18));
    }

    #[tokio::test]
    async fn test_default_count_document_gives_default_method() {
        let windows = vec![window(1, "deck.ppt - PowerPoint", "PowerPoint", true, (800, 600))];
        let doc = document(1, DetectionMethod::Default, 0.0);
        let result = detector().detect(&windows, Some(&doc), None).await.unwrap();
        assert_eq!(result.method, DetectionMethod::Default);
        assert_eq!(result.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_title_total_borrowed_from_document() {
        let windows = vec![window(1, "Slide 4", "PowerPoint", true, (800, 600))];
        let doc = document(12, DetectionMethod::FileEstimate, 1.0);
        let result = detector().detect(&windows, Some(&doc), None).await.unwrap();
        assert_eq!(result.method, DetectionMethod::TitleParse);
        assert_eq!(result.position.current, 4);
        assert_eq!(result.position.total, Some(12));
    }

    #[tokio::test]
    async fn test_current_beyond_total_is_clamped() {
        let windows = vec![window(1, "Slide 25 of 20", "PowerPoint", true, (800, 600))];
        let result = detector().detect(&windows, None, None).await.unwrap();
        assert_eq!(result.position.current, 20);
    }

    struct FixedCapture;

    impl ScreenCapture for FixedCapture {
        fn capture_window(&self, _window: &WindowInfo) -> Option<DynamicImage> {
            Some(DynamicImage::new_luma8(1000, 1000))
        }
    }

    struct FixedEngine {
        tokens: Vec<OcrToken>,
    }

    #[async_trait::async_trait]
    impl OcrEngine for FixedEngine {
        async fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrToken>, TrackError> {
            Ok(self.tokens.clone())
        }
    }

    #[tokio::test]
    async fn test_ocr_path_when_title_is_bare() {
        let tokens = vec![OcrToken {
            text: "5 / 20".to_string(),
            bounds: WindowBounds::new(700, 950, 60, 20),
            confidence: 0.8,
        }];
        let ocr = OcrFallback::new(
            Box::new(FixedCapture),
            Box::new(FixedEngine { tokens }),
            std::time::Duration::from_secs(2),
        );
        let detector = Detector::new(DetectionConfig::default(), Some(ocr));

        let windows = vec![window(1, "deck.pptx - PowerPoint", "PowerPoint", true, (800, 1000))];
        let result = detector.detect(&windows, None, None).await.unwrap();
        assert_eq!(result.method, DetectionMethod::Ocr);
        assert_eq!(result.position.current, 5);
        assert_eq!(result.position.total, Some(20));
    }

    #[tokio::test]
    async fn test_low_confidence_ocr_falls_through_to_document() {
        let tokens = vec![OcrToken {
            text: "5 / 20".to_string(),
            bounds: WindowBounds::new(700, 950, 60, 20),
            confidence: 0.1,
        }];
        let ocr = OcrFallback::new(
            Box::new(FixedCapture),
            Box::new(FixedEngine { tokens }),
            std::time::Duration::from_secs(2),
        );
        let detector = Detector::new(DetectionConfig::default(), Some(ocr));

        let windows = vec![window(1, "deck.pptx - PowerPoint", "PowerPoint", true, (800, 1000))];
        let doc = document(18, DetectionMethod::FileEstimate, 0.3);
        let result = detector.detect(&windows, Some(&doc), None).await.unwrap();
        assert_eq!(result.method, DetectionMethod::FileEstimate);
    }
}
