//! Window title parsing.
//!
//! Presentation applications encode the slide position in their window
//! titles in a handful of conventions ("Slide 5 of 20", "3/12", "7 of 30",
//! a bare "Slide 4"). This module turns a raw title into a `SlidePosition`
//! without touching the OS. Everything here is pure and synchronous.

use crate::types::{PresentationMode, SlidePosition};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Ordered by specificity; first match wins
    static ref SLIDE_N_OF_M: Regex = Regex::new(r"(?i)slide\s+(\d+)\s+of\s+(\d+)").unwrap();
    static ref N_OF_M: Regex = Regex::new(r"(?i)\b(\d+)\s+of\s+(\d+)\b").unwrap();
    static ref N_SLASH_M: Regex = Regex::new(r"\b(\d+)\s*/\s*(\d+)\b").unwrap();
    static ref SLIDE_N: Regex = Regex::new(r"(?i)slide\s+(\d+)\b").unwrap();
    static ref SLIDESHOW_MARKER: Regex = Regex::new(r"(?i)slide\s?show|\[slideshow\]").unwrap();
    static ref EDIT_MARKER: Regex = Regex::new(r"(?i)\bnormal\b|\bedit(ing)?\b").unwrap();
}

/// Parse a window title into a slide position.
///
/// Returns `None` for titles that carry no positional information, including
/// marker-only titles like "MyDeck.pptx - PowerPoint". Numbers in document
/// names do not false-positive because the positional conventions all
/// require the `of`/`/`/`Slide` shape around the digits.
pub fn parse(title: &str) -> Option<SlidePosition> {
    let (current, total) = if let Some(caps) = SLIDE_N_OF_M.captures(title) {
        (parse_u32(&caps[1])?, Some(parse_u32(&caps[2])?))
    } else if let Some(caps) = N_OF_M.captures(title) {
        (parse_u32(&caps[1])?, Some(parse_u32(&caps[2])?))
    } else if let Some(caps) = N_SLASH_M.captures(title) {
        (parse_u32(&caps[1])?, Some(parse_u32(&caps[2])?))
    } else if let Some(caps) = SLIDE_N.captures(title) {
        (parse_u32(&caps[1])?, None)
    } else {
        return None;
    };

    if current == 0 {
        return None;
    }

    // Positional conventions imply slideshow unless an explicit marker
    // says otherwise
    let mode = match parse_mode(title) {
        PresentationMode::Unknown if total.is_some() => PresentationMode::Slideshow,
        PresentationMode::Unknown => PresentationMode::Unknown,
        explicit => explicit,
    };

    Some(SlidePosition { current, total, mode })
}

/// Infer the application mode from title markers alone.
pub fn parse_mode(title: &str) -> PresentationMode {
    if SLIDESHOW_MARKER.is_match(title) {
        PresentationMode::Slideshow
    } else if EDIT_MARKER.is_match(title) {
        PresentationMode::Editing
    } else {
        PresentationMode::Unknown
    }
}

fn parse_u32(s: &str) -> Option<u32> {
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_n_of_m_with_slideshow_marker() {
        let pos = parse("Slide 5 of 20 - My Presentation - PowerPoint Slide Show").unwrap();
        assert_eq!(pos.current, 5);
        assert_eq!(pos.total, Some(20));
        assert_eq!(pos.mode, PresentationMode::Slideshow);
    }

    #[test]
    fn test_slide_n_of_m_without_marker_defaults_to_slideshow() {
        let pos = parse("Slide 5 of 20 - Presentation - PowerPoint").unwrap();
        assert_eq!(pos.current, 5);
        assert_eq!(pos.total, Some(20));
        assert_eq!(pos.mode, PresentationMode::Slideshow);
    }

    #[test]
    fn test_marker_only_title_yields_none() {
        assert!(parse("MyDeck.pptx - PowerPoint").is_none());
        assert!(parse("Presentation1 - PowerPoint").is_none());
        assert!(parse("").is_none());
    }

    #[test]
    fn test_compact_fraction() {
        let pos = parse("3/12").unwrap();
        assert_eq!(pos.current, 3);
        assert_eq!(pos.total, Some(12));
    }

    #[test]
    fn test_n_of_m() {
        let pos = parse("7 of 30 - Deck").unwrap();
        assert_eq!(pos.current, 7);
        assert_eq!(pos.total, Some(30));
    }

    #[test]
    fn test_bare_slide_n_has_no_total() {
        let pos = parse("Slide 4").unwrap();
        assert_eq!(pos.current, 4);
        assert_eq!(pos.total, None);
    }

    #[test]
    fn test_edit_marker_overrides_slideshow_default() {
        let pos = parse("Slide 2 of 9 - Deck.pptx - Normal view").unwrap();
        assert_eq!(pos.mode, PresentationMode::Editing);
    }

    #[test]
    fn test_numbers_in_document_name_do_not_false_positive() {
        assert!(parse("Q3 Report 2024.pptx - PowerPoint").is_none());
    }

    #[test]
    fn test_zero_current_rejected() {
        assert!(parse("Slide 0 of 10").is_none());
    }

    #[test]
    fn test_parse_mode_markers() {
        assert_eq!(
            parse_mode("Deck.pptx - PowerPoint Slide Show"),
            PresentationMode::Slideshow
        );
        assert_eq!(parse_mode("Deck.pptx - Normal"), PresentationMode::Editing);
        assert_eq!(parse_mode("Deck.pptx"), PresentationMode::Unknown);
    }
}
