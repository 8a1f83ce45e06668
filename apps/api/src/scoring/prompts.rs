use crate::llm_client::prompts::PLAIN_ANSWER_SYSTEM;
use crate::models::resume::ResumeRecord;
use crate::scoring::coordinator::JobContext;

pub const RATING_SYSTEM_ROLE: &str = "You are a resume evaluation assistant. \
    You judge how well a resume matches a job description.";

pub const RATING_INSTRUCTION: &str = "On a scale of 0-100, score how well this resume \
    matches the job requirements. Reply in the form `Score: N/100`.";

pub fn rating_system_prompt() -> String {
    format!("{RATING_SYSTEM_ROLE} {PLAIN_ANSWER_SYSTEM}")
}

/// Rating request for one résumé: job requirements (structured summary first, when the JD
/// was parsed), résumé text, résumé metadata.
pub fn build_rating_prompt(job: &JobContext, resume: &ResumeRecord) -> String {
    let mut requirements = String::new();
    if let Some(record) = &job.record {
        let summary = record.to_prompt_text();
        if !summary.is_empty() {
            requirements.push_str(&summary);
            requirements.push_str("\n\n");
        }
    }
    requirements.push_str(job.raw_text.trim());

    let metadata = resume
        .metadata_json()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "No metadata".to_string());

    format!(
        "Job Requirements:\n{requirements}\n\n\
         Resume Content:\n{resume_text}\n\n\
         Metadata:\n{metadata}\n\n\
         {RATING_INSTRUCTION}",
        resume_text = resume.text.trim(),
    )
}
