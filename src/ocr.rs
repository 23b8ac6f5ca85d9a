//! OCR fallback for slide position and content.
//!
//! When the window title carries no positional information (full-screen
//! slideshows often drop it), the tracker captures the presentation window
//! and runs text recognition over it. The OCR backend itself is injected
//! behind the `OcrEngine` trait; this module owns preprocessing, the time
//! box, and the heuristics that turn raw tokens into a slide position.

use crate::capture::{ScreenCapture, SystemCapture};
use crate::config::OcrConfig;
use crate::title;
use crate::types::{
    ContentSource, DetectionMethod, DetectionResult, OcrToken, PresentationMode, SlideContent,
    SlidePosition, TrackError, WindowInfo,
};
use image::DynamicImage;
use lazy_static::lazy_static;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, trace};

lazy_static! {
    // Captures grab shared OS surfaces; serialize them across all sessions
    static ref CAPTURE_LOCK: Mutex<()> = Mutex::new(());
}

/// Text recognition backend.
#[async_trait::async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text tokens in an image, with per-token bounds and
    /// confidence.
    async fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrToken>, TrackError>;
}

/// Capture-and-recognize pipeline with a hard time ceiling.
pub struct OcrFallback {
    capture: Box<dyn ScreenCapture>,
    engine: Box<dyn OcrEngine>,
    timeout: Duration,
}

impl OcrFallback {
    pub fn new(
        capture: Box<dyn ScreenCapture>,
        engine: Box<dyn OcrEngine>,
        timeout: Duration,
    ) -> Self {
        Self {
            capture,
            engine,
            timeout,
        }
    }

    /// Build the fallback from configuration, capturing through the OS.
    /// Returns `None` when OCR is disabled.
    pub fn from_config(config: &OcrConfig, engine: Box<dyn OcrEngine>) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self::new(
            Box::new(SystemCapture::new(config.capture_margin)),
            engine,
            Duration::from_millis(config.timeout_ms),
        ))
    }

    /// Detect the slide position from the window's pixels.
    ///
    /// Returns `Ok(None)` when the window could not be captured or the
    /// recognized text carries no position. A recognition pass that blows
    /// the time ceiling fails with `CaptureTimeout`.
    pub async fn detect_position(
        &self,
        window: &WindowInfo,
    ) -> Result<Option<DetectionResult>, TrackError> {
        let tokens = match self.recognize_window(window).await? {
            Some(tokens) => tokens,
            None => return Ok(None),
        };

        let height = window.bounds.height;
        match position_from_tokens(&tokens, height) {
            Some((position, confidence)) => {
                debug!(
                    "OCR position {}/{:?} (confidence {:.2})",
                    position.current, position.total, confidence
                );
                Ok(Some(DetectionResult::new(
                    position,
                    DetectionMethod::Ocr,
                    confidence,
                )))
            }
            None => {
                trace!("OCR found no positional text in window {}", window.id);
                Ok(None)
            }
        }
    }

    /// Recognize the visible slide's text content.
    pub async fn recognize_slide(
        &self,
        window: &WindowInfo,
        index: u32,
    ) -> Result<Option<SlideContent>, TrackError> {
        let tokens = match self.recognize_window(window).await? {
            Some(tokens) => tokens,
            None => return Ok(None),
        };

        if tokens.is_empty() {
            return Ok(None);
        }

        let title = title_from_tokens(&tokens);
        let body = tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Some(SlideContent {
            index,
            title,
            body,
            notes: None,
            source: ContentSource::Ocr,
        }))
    }

    async fn recognize_window(
        &self,
        window: &WindowInfo,
    ) -> Result<Option<Vec<OcrToken>>, TrackError> {
        let image = {
            let _guard = CAPTURE_LOCK.lock().await;
            self.capture.capture_window(window)
        };

        let image = match image {
            Some(image) => preprocess(&image),
            None => {
                trace!("Window {} not capturable, skipping OCR", window.id);
                return Ok(None);
            }
        };

        let tokens = tokio::time::timeout(self.timeout, self.engine.recognize(&image))
            .await
            .map_err(|_| TrackError::CaptureTimeout)??;

        Ok(Some(tokens))
    }
}

/// Grayscale + contrast stretch, makes slide text stand out for the backend.
fn preprocess(image: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageLuma8(image.to_luma8()).adjust_contrast(30.0)
}

/// Extract a slide position from recognized tokens.
///
/// First the whole recognized text is run through the title-parsing
/// conventions (slides often render "5 / 20" or "Slide 5 of 20" somewhere).
/// Failing that, a standalone 1-3 digit token in the bottom fifth of the
/// window is taken as the slide number the way presentation footers render
/// it. Confidence is the mean of the contributing tokens.
pub fn position_from_tokens(
    tokens: &[OcrToken],
    window_height: u32,
) -> Option<(SlidePosition, f32)> {
    if tokens.is_empty() {
        return None;
    }

    let joined = tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let mean_confidence =
        tokens.iter().map(|t| t.confidence).sum::<f32>() / tokens.len() as f32;

    if let Some(position) = title::parse(&joined) {
        return Some((position, mean_confidence));
    }

    // Footer heuristic: standalone digits near the bottom edge
    let bottom_start = (window_height as f32 * 0.8) as i32;
    let footer_number = tokens
        .iter()
        .filter(|t| t.bounds.y >= bottom_start)
        .filter(|t| {
            let trimmed = t.text.trim();
            !trimmed.is_empty()
                && trimmed.len() <= 3
                && trimmed.chars().all(|c| c.is_ascii_digit())
        })
        .max_by_key(|t| t.bounds.y);

    if let Some(token) = footer_number {
        let current: u32 = token.text.trim().parse().ok()?;
        if current == 0 {
            return None;
        }
        let mode = match title::parse_mode(&joined) {
            PresentationMode::Unknown => PresentationMode::Slideshow,
            explicit => explicit,
        };
        return Some((
            SlidePosition::new(current, None, mode),
            token.confidence.min(mean_confidence),
        ));
    }

    None
}

/// The topmost text line is usually the slide title.
pub fn title_from_tokens(tokens: &[OcrToken]) -> Option<String> {
    let top = tokens.iter().map(|t| t.bounds.y).min()?;

    // Tokens within one line height of the topmost token
    let line: Vec<&OcrToken> = tokens
        .iter()
        .filter(|t| (t.bounds.y - top).unsigned_abs() <= t.bounds.height.max(16))
        .collect();

    let mut line = line;
    line.sort_by_key(|t| t.bounds.x);

    let text = line
        .iter()
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WindowBounds;

    struct NoopEngine;

    #[async_trait::async_trait]
    impl OcrEngine for NoopEngine {
        async fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrToken>, TrackError> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_from_config_respects_enable_flag() {
        let mut config = OcrConfig::default();
        config.timeout_ms = 500;
        let fallback = OcrFallback::from_config(&config, Box::new(NoopEngine)).unwrap();
        assert_eq!(fallback.timeout, Duration::from_millis(500));

        config.enabled = false;
        assert!(OcrFallback::from_config(&config, Box::new(NoopEngine)).is_none());
    }

    fn token(text: &str, x: i32, y: i32, confidence: f32) -> OcrToken {
        OcrToken {
            text: text.to_string(),
            bounds: WindowBounds::new(x, y, 40, 20),
            confidence,
        }
    }

    #[test]
    fn test_position_from_fraction_text() {
        let tokens = vec![token("Roadmap", 100, 50, 0.9), token("5 / 20", 700, 980, 0.8)];
        let (pos, conf) = position_from_tokens(&tokens, 1000).unwrap();
        assert_eq!(pos.current, 5);
        assert_eq!(pos.total, Some(20));
        assert!((conf - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_footer_digit_heuristic() {
        let tokens = vec![
            token("Quarterly", 100, 40, 0.9),
            token("Results", 220, 40, 0.9),
            token("7", 900, 950, 0.7),
        ];
        let (pos, _) = position_from_tokens(&tokens, 1000).unwrap();
        assert_eq!(pos.current, 7);
        assert_eq!(pos.total, None);
        assert_eq!(pos.mode, PresentationMode::Slideshow);
    }

    #[test]
    fn test_digits_above_footer_ignored() {
        // A year in the body text must not read as a slide number
        let tokens = vec![token("2024", 100, 400, 0.9), token("Revenue", 200, 400, 0.9)];
        assert!(position_from_tokens(&tokens, 1000).is_none());
    }

    #[test]
    fn test_empty_tokens() {
        assert!(position_from_tokens(&[], 1000).is_none());
        assert!(title_from_tokens(&[]).is_none());
    }

    #[test]
    fn test_title_from_topmost_line() {
        let tokens = vec![
            token("Quarterly", 100, 40, 0.9),
            token("Results", 220, 42, 0.9),
            token("body text", 100, 300, 0.9),
            token("3", 900, 950, 0.7),
        ];
        assert_eq!(title_from_tokens(&tokens).unwrap(), "Quarterly Results");
    }
}
