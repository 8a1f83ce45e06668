use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which fields of a parsed job description the caller asked for.
/// Extraction always runs in full; the mode only restricts the returned projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    #[default]
    Full,
    Skills,
    Responsibilities,
}

impl ParseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseMode::Full => "full",
            ParseMode::Skills => "skills",
            ParseMode::Responsibilities => "responsibilities",
        }
    }
}

impl fmt::Display for ParseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(ParseMode::Full),
            "skills" => Ok(ParseMode::Skills),
            "responsibilities" => Ok(ParseMode::Responsibilities),
            other => Err(format!(
                "invalid parse_mode '{other}', allowed: full, skills, responsibilities"
            )),
        }
    }
}

/// Structured form of a job posting.
///
/// `skills` keys are title-cased and unique; the value is the largest number of years
/// seen for that skill (1 when the skill was only detected by presence).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptionRecord {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub skills: BTreeMap<String, u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_terms: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responsibilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub qualifications: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tech_stack: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub parse_mode: ParseMode,
}

impl JobDescriptionRecord {
    /// Restricts a fully extracted record to the fields relevant for `mode`.
    pub fn project(self, mode: ParseMode) -> Self {
        match mode {
            ParseMode::Full => Self {
                parse_mode: ParseMode::Full,
                ..self
            },
            ParseMode::Skills => Self {
                skills: self.skills,
                mentioned_terms: self.mentioned_terms,
                parse_mode: ParseMode::Skills,
                ..Self::default()
            },
            ParseMode::Responsibilities => Self {
                responsibilities: self.responsibilities,
                qualifications: self.qualifications,
                parse_mode: ParseMode::Responsibilities,
                ..Self::default()
            },
        }
    }

    /// Plain-text summary used when building rating prompts.
    pub fn to_prompt_text(&self) -> String {
        let mut out = String::new();
        if !self.title.is_empty() {
            out.push_str(&format!("Title: {}\n", self.title));
        }
        if !self.skills.is_empty() {
            let skills: Vec<String> = self
                .skills
                .iter()
                .map(|(skill, years)| format!("{skill} ({years}+ years)"))
                .collect();
            out.push_str(&format!("Required skills: {}\n", skills.join(", ")));
        }
        for (category, items) in &self.tech_stack {
            out.push_str(&format!("Tech stack ({category}): {}\n", items.join(", ")));
        }
        push_list(&mut out, "Responsibilities", &self.responsibilities);
        push_list(&mut out, "Qualifications", &self.qualifications);
        out.trim_end().to_string()
    }
}

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(heading);
    out.push_str(":\n");
    for item in items {
        out.push_str("- ");
        out.push_str(item);
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> JobDescriptionRecord {
        JobDescriptionRecord {
            title: "Senior Backend Engineer".to_string(),
            skills: BTreeMap::from([("Python".to_string(), 5), ("Rust".to_string(), 3)]),
            mentioned_terms: vec!["Python".to_string()],
            responsibilities: vec!["Design APIs".to_string()],
            qualifications: vec!["BSc in CS".to_string()],
            tech_stack: BTreeMap::from([(
                "backend".to_string(),
                vec!["Rust".to_string(), "Postgres".to_string()],
            )]),
            parse_mode: ParseMode::Full,
        }
    }

    #[test]
    fn test_parse_mode_from_str() {
        assert_eq!("full".parse::<ParseMode>(), Ok(ParseMode::Full));
        assert_eq!(" Skills ".parse::<ParseMode>(), Ok(ParseMode::Skills));
        assert_eq!(
            "responsibilities".parse::<ParseMode>(),
            Ok(ParseMode::Responsibilities)
        );
        assert!("everything".parse::<ParseMode>().is_err());
    }

    #[test]
    fn test_parse_mode_serde_is_snake_case() {
        let json = serde_json::to_string(&ParseMode::Responsibilities).unwrap();
        assert_eq!(json, r#""responsibilities""#);
    }

    #[test]
    fn test_project_skills_keeps_only_skills() {
        let projected = sample().project(ParseMode::Skills);
        assert_eq!(projected.parse_mode, ParseMode::Skills);
        assert_eq!(projected.skills.len(), 2);
        assert!(projected.title.is_empty());
        assert!(projected.responsibilities.is_empty());
        assert!(projected.tech_stack.is_empty());
    }

    #[test]
    fn test_project_responsibilities_keeps_lists() {
        let projected = sample().project(ParseMode::Responsibilities);
        assert_eq!(projected.responsibilities, vec!["Design APIs"]);
        assert_eq!(projected.qualifications, vec!["BSc in CS"]);
        assert!(projected.skills.is_empty());
    }

    #[test]
    fn test_project_full_is_identity_on_fields() {
        let record = sample();
        assert_eq!(record.clone().project(ParseMode::Full), record);
    }

    #[test]
    fn test_projection_serializes_without_empty_fields() {
        let json = serde_json::to_value(sample().project(ParseMode::Skills)).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("skills"));
        assert!(!obj.contains_key("responsibilities"));
        assert_eq!(obj["parse_mode"], "skills");
    }

    #[test]
    fn test_prompt_text_lists_sections() {
        let text = sample().to_prompt_text();
        assert!(text.starts_with("Title: Senior Backend Engineer"));
        assert!(text.contains("Python (5+ years)"));
        assert!(text.contains("Tech stack (backend): Rust, Postgres"));
        assert!(text.contains("Responsibilities:\n- Design APIs"));
    }
}
