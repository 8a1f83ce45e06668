//! Text normalization applied before any pattern matching.
//!
//! Typographic glyphs that PDF/DOCX decoders commonly emit (fancy bullets, dashes, quotes)
//! are mapped to their plain ASCII equivalents so the extraction regexes only need to
//! reason about one spelling of each.

/// Glyph substitutions, applied in order. Replacements are pure ASCII, which is what keeps
/// `normalize` idempotent.
const GLYPH_SUBSTITUTIONS: &[(char, &str)] = &[
    // bullets
    ('•', "-"),
    ('●', "-"),
    ('▪', "-"),
    ('■', "-"),
    ('◦', "-"),
    ('‣', "-"),
    ('∙', "-"),
    ('►', "-"),
    ('➢', "-"),
    ('✓', "-"),
    ('✔', "-"),
    // dashes
    ('–', "-"),
    ('—', "-"),
    ('‒', "-"),
    ('−', "-"),
    // quotes
    ('‘', "'"),
    ('’', "'"),
    ('‚', "'"),
    ('′', "'"),
    ('“', "\""),
    ('”', "\""),
    ('„', "\""),
    ('″', "\""),
    // misc
    ('…', "..."),
    ('\u{200B}', ""),
    ('\u{FEFF}', ""),
];

/// Replaces typographic glyphs with ASCII equivalents. Whitespace is left untouched.
pub fn substitute_glyphs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match GLYPH_SUBSTITUTIONS.iter().find(|(glyph, _)| *glyph == c) {
            Some((_, replacement)) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

/// Canonical single-line form: glyphs substituted, every whitespace run collapsed to one
/// space, trimmed at both ends. `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    substitute_glyphs(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Line-preserving variant used by the section-aware extractors: every line is normalized
/// on its own and blank lines are dropped. Also idempotent.
pub fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(normalize)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
