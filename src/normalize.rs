//! Text normalization for extracted PDF text.
//!
//! PDF extraction produces text with stray control characters, invisible
//! formatting marks, private-use glyphs (Symbol-font bullets such as
//! U+F0B7), decomposed Unicode, and ragged whitespace. [`normalize`] folds
//! all of that into one canonical form:
//!
//! 1. line endings become `\n`, and every non-printable character is
//!    dropped: general categories Cc, Cf, Co and Cn (newline and tab survive
//!    this step)
//! 2. canonical composition (NFC)
//! 3. the extraction artifact `––` becomes `-`
//! 4. a whitespace run holding two or more newlines becomes one paragraph
//!    separator (`\n\n`); every other run becomes a single space
//! 5. leading and trailing whitespace is trimmed
//!
//! Separator characters (Zs, Zl, Zp) are whitespace, so step 4 already
//! turns them into a space or a paragraph break; the output holds no
//! non-printable character other than `\n`.
//!
//! Paragraph separators are kept on purpose: the chunker splits on them.
//! The function is total and idempotent.

use unicode_general_category::{get_general_category, GeneralCategory};
use unicode_normalization::UnicodeNormalization;

/// Separator placed between paragraphs, pages, and documents.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Normalize raw extracted text. See the module docs for the exact steps.
pub fn normalize(raw: &str) -> String {
    let stripped: String = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|&c| c == '\n' || c == '\t' || !is_strippable(c))
        .collect();

    let composed: String = stripped.nfc().collect();
    let dashed = composed.replace("\u{2013}\u{2013}", "-");

    collapse_whitespace(&dashed).trim().to_string()
}

/// Non-printable characters: controls, format marks (soft hyphens,
/// zero-width and bidi marks, BOM), private-use and unassigned code points.
fn is_strippable(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::Control
            | GeneralCategory::Format
            | GeneralCategory::PrivateUse
            | GeneralCategory::Unassigned
            | GeneralCategory::Surrogate
    )
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    let mut newlines = 0usize;

    for c in text.chars() {
        if c.is_whitespace() {
            in_run = true;
            if c == '\n' {
                newlines += 1;
            }
            continue;
        }
        if in_run {
            out.push_str(if newlines >= 2 { PARAGRAPH_SEPARATOR } else { " " });
            in_run = false;
            newlines = 0;
        }
        out.push(c);
    }
    // A trailing run is dropped by the caller's trim anyway.
    out
}
