//! Heuristic field extraction for job descriptions.
//!
//! Every field has an ordered list of strategies; the first one that produces a value wins
//! and a missing section always degrades to a document-level fallback instead of an error.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::extraction::normalize::normalize_lines;
use crate::extraction::sections::{segment, SectionHeader, Sections};
use crate::models::job_description::{JobDescriptionRecord, ParseMode};

pub const UNDEFINED_TITLE: &str = "Undefined Role";

/// First lines at or above this length are prose, not titles.
const MAX_FIRST_LINE_TITLE_CHARS: usize = 100;

/// "Salary: 120000" is not a skill requirement.
const MAX_PLAUSIBLE_YEARS: u32 = 40;

/// Known technology terms, in their canonical spelling.
pub const KNOWN_SKILLS: &[&str] = &[
    "Python",
    "Java",
    "JavaScript",
    "TypeScript",
    "SQL",
    "AWS",
    "Docker",
    "Kubernetes",
    "Machine Learning",
    "React",
    "TensorFlow",
    "PyTorch",
    "Azure",
    "GCP",
    "Node.js",
    "Rust",
    "PostgreSQL",
    "Terraform",
];

/// Words that end a skill phrase ("Python and Go" → "Python").
const SKILL_STOP_WORDS: &[&str] = &[
    "and",
    "or",
    "with",
    "in",
    "using",
    "including",
    "experience",
    "preferred",
    "required",
    "plus",
    "for",
    "is",
    "a",
];

static KNOWN_SKILL_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    KNOWN_SKILLS
        .iter()
        .map(|skill| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(skill)))
                .expect("known skill regex is valid");
            (*skill, re)
        })
        .collect()
});

static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*+]|\d{1,2}[.)])[ \t]*").expect("bullet regex is valid"));

// ────────────────────────────────────────────────────────────────────────────
// Title
// ────────────────────────────────────────────────────────────────────────────

static LABELED_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*#*[ \t]*(?:job[ \t]+title|title|position|role)[ \t]*:[ \t]*(\S[^\n]*)$")
        .expect("labeled title regex is valid")
});

static DASH_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t]*#*[ \t]*(\S[^\n]*?)[ \t]+-[ \t]+(?:job|position|role)\b")
        .expect("dash title regex is valid")
});

static DEVELOPER_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Z][a-z]+[ \t]+Developer(?:[ \t]+\([^)\n]*\))?")
        .expect("developer title regex is valid")
});

/// A title strategy: returns `Some` when it applies.
type TitleRule = (&'static str, fn(&str, &Sections) -> Option<String>);

/// Ordered title strategies, most explicit first. The first rule that matches wins.
pub const TITLE_RULES: &[TitleRule] = &[
    ("labeled", title_from_label),
    ("dash_suffix", title_from_dash_suffix),
    ("developer", title_from_developer),
    ("first_line", title_from_first_line),
];

fn title_from_label(text: &str, sections: &Sections) -> Option<String> {
    let from_section = sections
        .get(&SectionHeader::JobTitle)
        .and_then(|content| content.lines().next())
        .map(str::trim)
        .filter(|line| !line.is_empty());
    if let Some(line) = from_section {
        return Some(line.to_string());
    }
    capture_trimmed(&LABELED_TITLE_RE, text, 1)
}

fn title_from_dash_suffix(text: &str, _sections: &Sections) -> Option<String> {
    capture_trimmed(&DASH_TITLE_RE, text, 1)
}

fn title_from_developer(text: &str, _sections: &Sections) -> Option<String> {
    capture_trimmed(&DEVELOPER_TITLE_RE, text, 0)
}

fn title_from_first_line(text: &str, _sections: &Sections) -> Option<String> {
    let first = text.trim().lines().next()?.trim();
    if first.is_empty() || first.chars().count() >= MAX_FIRST_LINE_TITLE_CHARS {
        return None;
    }
    Some(first.to_string())
}

fn capture_trimmed(re: &Regex, text: &str, group: usize) -> Option<String> {
    let value = re.captures(text)?.get(group)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

pub fn extract_title(text: &str, sections: &Sections) -> String {
    for (name, rule) in TITLE_RULES {
        if let Some(title) = rule(text, sections) {
            debug!(rule = name, %title, "title matched");
            return title;
        }
    }
    UNDEFINED_TITLE.to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Skills
// ────────────────────────────────────────────────────────────────────────────

const SKILL_WORD: &str = r"[a-z][a-z0-9+#]*(?:\.[a-z0-9]+)*";

/// Which end of a captured phrase names the skill.
#[derive(Clone, Copy)]
enum PhraseCut {
    /// "4 years of Rust and Go" → "Rust".
    BeforeFirstStop,
    /// "Experience with Python: 5" → "Python".
    AfterLastStop,
}

/// How a skill pattern's captures map onto (skill, years).
struct SkillPattern {
    name: &'static str,
    regex: Regex,
    skill_group: usize,
    years_group: usize,
    cut: PhraseCut,
}

static SKILL_PATTERNS: Lazy<Vec<SkillPattern>> = Lazy::new(|| {
    let phrase = format!(r"{SKILL_WORD}(?:[ \t]+{SKILL_WORD}){{0,2}}");
    vec![
        SkillPattern {
            name: "skill_colon_years",
            regex: Regex::new(&format!(
                r"(?i)\b({phrase})[ \t]*:[ \t]*(\d+)\+?(?:[ \t]*(?:years?|yrs?)\b)?"
            ))
            .expect("skill colon regex is valid"),
            skill_group: 1,
            years_group: 2,
            cut: PhraseCut::AfterLastStop,
        },
        SkillPattern {
            name: "years_of_skill",
            regex: Regex::new(&format!(
                r"(?i)\b(\d+)\+?[ \t]+years?[ \t]+(?:of[ \t]+)?(?:(?:professional|hands-on|commercial)[ \t]+)?(?:experience[ \t]+(?:with|in)[ \t]+)?({phrase})"
            ))
            .expect("years-of regex is valid"),
            skill_group: 2,
            years_group: 1,
            cut: PhraseCut::BeforeFirstStop,
        },
        SkillPattern {
            name: "expertise_in",
            regex: Regex::new(r"(?i)expertise[ \t]+in[ \t]+([^()\n]+?)[ \t]*\(([^)\n]*)\)")
                .expect("expertise regex is valid"),
            skill_group: 1,
            years_group: 2,
            cut: PhraseCut::BeforeFirstStop,
        },
    ]
});

/// Python-style title case: a letter is upper-cased when it does not follow another letter.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.split_whitespace().collect::<Vec<_>>().join(" ").chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

fn is_stop_word(word: &str) -> bool {
    SKILL_STOP_WORDS.contains(&word.to_ascii_lowercase().as_str())
}

/// Cuts a captured phrase at a stop word and title-cases what remains.
fn clean_skill_name(raw: &str, cut: PhraseCut) -> Option<String> {
    let words: Vec<&str> = raw
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, '.' | ',' | ';' | ':')))
        .filter(|w| !w.is_empty())
        .collect();
    let kept = match cut {
        PhraseCut::BeforeFirstStop => {
            let end = words.iter().position(|w| is_stop_word(w)).unwrap_or(words.len());
            &words[..end]
        }
        PhraseCut::AfterLastStop => {
            let start = words.iter().rposition(|w| is_stop_word(w)).map_or(0, |i| i + 1);
            &words[start..]
        }
    };
    if kept.is_empty() {
        return None;
    }
    let name = kept.join(" ");
    if name.len() > 40 || SectionHeader::from_label(&name).is_some() {
        return None;
    }
    Some(title_case(&name))
}

/// Leading digits of a years capture; "5+" → 5, "" or "senior" → 1.
fn parse_years(raw: &str) -> u32 {
    let digits: String = raw
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(1)
}

fn record_max(skills: &mut BTreeMap<String, u32>, skill: String, years: u32) {
    let entry = skills.entry(skill).or_insert(years);
    if years > *entry {
        *entry = years;
    }
}

/// Pattern-based skills: each pattern runs over the whole scan text; duplicates keep the
/// largest year count.
pub fn extract_pattern_skills(text: &str) -> BTreeMap<String, u32> {
    let mut skills = BTreeMap::new();
    for pattern in SKILL_PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(text) {
            if let Some((skill, years)) = skill_from_captures(pattern, &caps) {
                debug!(pattern = pattern.name, %skill, years, "skill matched");
                record_max(&mut skills, skill, years);
            }
        }
    }
    skills
}

fn skill_from_captures(pattern: &SkillPattern, caps: &Captures<'_>) -> Option<(String, u32)> {
    let skill = clean_skill_name(caps.get(pattern.skill_group)?.as_str(), pattern.cut)?;
    let years = parse_years(caps.get(pattern.years_group)?.as_str());
    (years <= MAX_PLAUSIBLE_YEARS).then_some((skill, years))
}

/// Known skills present in `text`, ordered by first occurrence.
pub fn mentioned_terms(text: &str) -> Vec<String> {
    let mut hits: Vec<(usize, &str)> = KNOWN_SKILL_RES
        .iter()
        .filter_map(|(skill, re)| re.find(text).map(|m| (m.start(), *skill)))
        .collect();
    hits.sort_by_key(|&(pos, _)| pos);
    hits.into_iter().map(|(_, skill)| skill.to_string()).collect()
}

/// Skills for the record: patterns over the requirement sections (or the whole document when
/// those sections are absent), falling back to vocabulary presence with one year each.
pub fn extract_skills(text: &str, sections: &Sections) -> BTreeMap<String, u32> {
    let scoped: Vec<&str> = [
        SectionHeader::RequiredQualifications,
        SectionHeader::KeyResponsibilities,
        SectionHeader::PreferredSkills,
    ]
    .iter()
    .filter_map(|h| sections.get(h).map(String::as_str))
    .collect();
    let scan_text = if scoped.is_empty() {
        text.to_string()
    } else {
        scoped.join("\n")
    };

    let skills = extract_pattern_skills(&scan_text);
    if !skills.is_empty() {
        return skills;
    }

    debug!("no pattern skills found, falling back to known vocabulary");
    KNOWN_SKILL_RES
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(skill, _)| (title_case(skill), 1))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Lists (responsibilities / qualifications)
// ────────────────────────────────────────────────────────────────────────────

fn strip_bullet(line: &str) -> &str {
    let line = line.trim();
    match BULLET_RE.find(line) {
        Some(m) => line[m.end()..].trim(),
        None => line,
    }
}

fn is_bullet_line(line: &str) -> bool {
    let line = line.trim();
    BULLET_RE.is_match(line) && !strip_bullet(line).is_empty()
}

/// One entry per non-empty line, bullet glyphs stripped, source order.
pub fn list_items(content: &str) -> Vec<String> {
    content
        .lines()
        .map(strip_bullet)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

static RESPONSIBILITIES_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#*[ \t]*(?:key[ \t]+)?(?:responsibilities|duties)\b[ \t]*:?")
        .expect("responsibilities heading regex is valid")
});

static QUALIFICATIONS_HEADING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^#*[ \t]*(?:required[ \t]+|minimum[ \t]+)?(?:requirements|qualifications)\b[ \t]*:?")
        .expect("qualifications heading regex is valid")
});

/// Document-level fallback: bullet lines following a loosely phrased heading, up to the next
/// non-bullet line.
fn bullets_after_heading(text: &str, heading: &Regex) -> Vec<String> {
    let mut lines = text.lines().skip_while(|line| !heading.is_match(line.trim()));
    if lines.next().is_none() {
        return Vec::new();
    }
    lines
        .take_while(|line| is_bullet_line(line))
        .map(|line| strip_bullet(line).to_string())
        .collect()
}

fn section_list(text: &str, sections: &Sections, header: SectionHeader, heading: &Regex) -> Vec<String> {
    match sections.get(&header) {
        Some(content) => list_items(content),
        None => bullets_after_heading(text, heading),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tech stack
// ────────────────────────────────────────────────────────────────────────────

static CATEGORY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(back[ -]?end|front[ -]?end|dev[ -]?ops|databases?|cloud|mobile|data|testing)[ \t]*:[ \t]*(.*)$",
    )
    .expect("tech stack category regex is valid")
});

fn canonical_category(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match compact.as_str() {
        "databases" => "database".to_string(),
        _ => compact,
    }
}

fn push_items(target: &mut Vec<String>, raw: &str) {
    for item in raw.split(',') {
        let item = item.trim().trim_end_matches('.').trim();
        if !item.is_empty() && !target.iter().any(|t| t == item) {
            target.push(item.to_string());
        }
    }
}

/// `category: items` lines open a category; bullet lines that follow append comma-split
/// items to it until another category line. Prose in between does not close the category.
pub fn extract_tech_stack(text: &str, sections: &Sections) -> BTreeMap<String, Vec<String>> {
    let source = sections
        .get(&SectionHeader::TechStack)
        .map(String::as_str)
        .unwrap_or(text);

    let mut stack: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in source.lines() {
        let stripped = strip_bullet(line);
        if let Some(caps) = CATEGORY_RE.captures(stripped) {
            let category = canonical_category(&caps[1]);
            push_items(stack.entry(category.clone()).or_default(), &caps[2]);
            current = Some(category);
        } else if is_bullet_line(line) {
            if let Some(category) = &current {
                push_items(stack.entry(category.clone()).or_default(), stripped);
            }
        }
    }

    stack.retain(|_, items| !items.is_empty());
    stack
}

// ────────────────────────────────────────────────────────────────────────────
// Entry points
// ────────────────────────────────────────────────────────────────────────────

/// Builds the full record from line-normalized text. `sections` is computed when absent.
pub fn extract_record(text: &str, sections: Option<&Sections>) -> JobDescriptionRecord {
    let owned;
    let sections = match sections {
        Some(s) => s,
        None => {
            owned = segment(text);
            &owned
        }
    };

    JobDescriptionRecord {
        title: extract_title(text, sections),
        skills: extract_skills(text, sections),
        mentioned_terms: mentioned_terms(text),
        responsibilities: section_list(
            text,
            sections,
            SectionHeader::KeyResponsibilities,
            &RESPONSIBILITIES_HEADING_RE,
        ),
        qualifications: section_list(
            text,
            sections,
            SectionHeader::RequiredQualifications,
            &QUALIFICATIONS_HEADING_RE,
        ),
        tech_stack: extract_tech_stack(text, sections),
        parse_mode: ParseMode::Full,
    }
}

/// Raw job-description text → projected record. Extraction always runs in full.
pub fn parse_job_description(raw: &str, mode: ParseMode) -> JobDescriptionRecord {
    let text = normalize_lines(raw);
    let sections = segment(&text);
    let record = extract_record(&text, Some(&sections));
    debug!(
        title = %record.title,
        skills = record.skills.len(),
        sections = sections.len(),
        "job description extracted"
    );
    record.project(mode)
}
