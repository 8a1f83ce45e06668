//! Section segmentation for job-description text.
//!
//! A header is one of the fixed labels below, matched case-insensitively. At the start of a
//! line it may be followed by `:` or the end of that line; anywhere else it needs the `:`,
//! which keeps headers found in single-line text while prose like "great benefits" is not one.
//! Content runs from the end of a header to the start of the next recognized header (or end
//! of text).

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionHeader {
    JobTitle,
    Location,
    EmploymentType,
    CompanyDescription,
    KeyResponsibilities,
    RequiredQualifications,
    PreferredSkills,
    TechStack,
    Benefits,
    HowToApply,
}

impl SectionHeader {
    /// Recognized headers in their canonical order.
    pub const ALL: [SectionHeader; 10] = [
        SectionHeader::JobTitle,
        SectionHeader::Location,
        SectionHeader::EmploymentType,
        SectionHeader::CompanyDescription,
        SectionHeader::KeyResponsibilities,
        SectionHeader::RequiredQualifications,
        SectionHeader::PreferredSkills,
        SectionHeader::TechStack,
        SectionHeader::Benefits,
        SectionHeader::HowToApply,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SectionHeader::JobTitle => "JOB TITLE",
            SectionHeader::Location => "LOCATION",
            SectionHeader::EmploymentType => "EMPLOYMENT TYPE",
            SectionHeader::CompanyDescription => "COMPANY DESCRIPTION",
            SectionHeader::KeyResponsibilities => "KEY RESPONSIBILITIES",
            SectionHeader::RequiredQualifications => "REQUIRED QUALIFICATIONS",
            SectionHeader::PreferredSkills => "PREFERRED SKILLS",
            SectionHeader::TechStack => "TECH STACK",
            SectionHeader::Benefits => "BENEFITS",
            SectionHeader::HowToApply => "HOW TO APPLY",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = label.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::ALL
            .into_iter()
            .find(|h| h.label().eq_ignore_ascii_case(&wanted))
    }
}

static HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    let alternatives = SectionHeader::ALL
        .iter()
        .map(|h| h.label().split(' ').map(regex::escape).collect::<Vec<_>>().join(r"[ \t]+"))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        r"(?im)^[ \t]*#*[ \t]*({alternatives})[ \t]*(?::|$)|\b({alternatives})[ \t]*:"
    ))
    .expect("section header regex is valid")
});

/// Segmented job description: header → content.
pub type Sections = BTreeMap<SectionHeader, String>;

/// Splits line-normalized text into sections. Headers are taken in source order; a label
/// that occurs twice keeps the content of its last occurrence. No headers → empty map.
pub fn segment(text: &str) -> Sections {
    let headers: Vec<(SectionHeader, usize, usize)> = HEADER_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1).or_else(|| caps.get(2))?;
            let header = SectionHeader::from_label(label.as_str())?;
            Some((header, whole.start(), whole.end()))
        })
        .collect();

    let mut sections = Sections::new();
    for (i, &(header, _, content_start)) in headers.iter().enumerate() {
        let content_end = headers
            .get(i + 1)
            .map(|&(_, next_start, _)| next_start)
            .unwrap_or(text.len());
        let content = text[content_start..content_end].trim().to_string();
        sections.insert(header, content);
    }
    sections
}
