//! Slide Tracker - Presentation detection and tracking engine
//!
//! This crate detects a running slide presentation on the local machine and
//! tracks which slide is showing as the presenter moves through the deck:
//!
//! - **Title parse**: Exact position from window titles ("Slide 5 of 20")
//! - **OCR**: Screen-capture fallback for bare full-screen slideshows
//! - **Document model**: Slide content and counts parsed from the
//!   presentation file itself, modern XML-zip or legacy binary
//!
//! # Architecture
//!
//! A `TrackerSession` polls a fresh window snapshot each cycle, runs the
//! detection pipeline in fidelity order, and publishes change notifications
//! over a channel. Window enumeration, capture, and OCR sit behind traits
//! so hosts and tests can inject their own.

pub mod capture;
pub mod config;
pub mod detector;
pub mod document;
pub mod ocr;
pub mod title;
pub mod tracker;
pub mod types;
pub mod window;

// Re-export commonly used types
pub use capture::{ScreenCapture, SystemCapture};
pub use config::Config;
pub use detector::Detector;
pub use ocr::{OcrEngine, OcrFallback};
pub use tracker::{Notification, Tracker, TrackerSession, TrackerState};
pub use types::{
    ContentSource, DetectionMethod, DetectionResult, Document, DocumentFormat, OcrToken,
    PresentationMode, SlideContent, SlidePosition, TrackError, WindowBounds, WindowId, WindowInfo,
};
pub use window::{SystemWindowSource, WindowSource};
