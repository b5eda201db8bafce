use crate::config::get_config;
use crate::services::storage_service::{StorageError, StorageService};
use base64::Engine;
use chrono::{Datelike, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const PARSE_TIMEOUT: Duration = Duration::from_secs(120);
const ERROR_BODY_EXCERPT: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("resume parser is not configured")]
    MissingConfiguration,

    #[error("could not download CV from object store: {0}")]
    DownloadFailed(String),

    #[error("parser request failed: {0}")]
    Network(String),

    #[error("parser returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("parser response was not understood: {0}")]
    Malformed(String),
}

impl ParseError {
    /// Transient failures raise a queue retry; the rest are terminal for the job.
    pub fn is_transient(&self) -> bool {
        match self {
            ParseError::Network(_) | ParseError::DownloadFailed(_) => true,
            ParseError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

// --- Typed subset of the parser's response document. Every intermediate is
// --- optional; extraction never fails on a missing key.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ResumeData {
    pub contact_information: Option<ContactInformation>,
    pub personal_attributes: Option<PersonalAttributes>,
    pub education: Option<Education>,
    pub employment_history: Option<EmploymentHistory>,
    pub skills: Option<Skills>,
    pub language_competencies: Option<Vec<LanguageCompetency>>,
    pub training: Option<Training>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ContactInformation {
    pub candidate_name: Option<CandidateName>,
    pub email_addresses: Option<Vec<String>>,
    pub telephones: Option<Vec<Telephone>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct CandidateName {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Telephone {
    pub raw: Option<String>,
    pub normalized: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PersonalAttributes {
    pub date_of_birth: Option<DateValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct DateValue {
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TextValue {
    pub raw: Option<String>,
    pub normalized: Option<String>,
}

impl TextValue {
    fn best(&self) -> Option<&str> {
        self.normalized.as_deref().or(self.raw.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Education {
    pub education_details: Option<Vec<EducationDetail>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EducationDetail {
    pub school_name: Option<TextValue>,
    pub degree: Option<Degree>,
    pub start_date: Option<DateValue>,
    pub end_date: Option<DateValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Degree {
    pub name: Option<TextValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EmploymentHistory {
    pub positions: Option<Vec<EmploymentPosition>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EmploymentPosition {
    pub employer: Option<Employer>,
    pub job_title: Option<TextValue>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Employer {
    pub name: Option<TextValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Skills {
    pub raw: Option<Vec<RawSkill>>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RawSkill {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct LanguageCompetency {
    pub language: Option<String>,
    pub language_code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Training {
    pub text: Option<String>,
    pub trainings: Option<Vec<TrainingDetail>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TrainingDetail {
    pub text: Option<String>,
    pub entity: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ParseRequest {
    document_as_base64_string: String,
    document_last_modified: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ParseEnvelope {
    value: Option<ParseEnvelopeValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ParseEnvelopeValue {
    resume_data: Option<ResumeData>,
}

// --- Extracted profile handed to the ingestion orchestrator.

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub age: Option<i32>,
    pub education_summary: Option<String>,
    pub experience_summary: Option<String>,
    pub skills_summary: Option<String>,
    pub languages: Option<String>,
    pub seminars: Option<String>,
}

impl CandidateProfile {
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(|s| s.as_str())
    }

    pub fn primary_phone(&self) -> Option<&str> {
        self.phones.first().map(|s| s.as_str())
    }
}

/// Pure projection of the parsed document into the fields the pipeline
/// stores. Missing intermediates collapse to None / "Unknown", never an error.
pub fn extract_profile(resume: &ResumeData, today: NaiveDate) -> CandidateProfile {
    let contact = resume.contact_information.as_ref();

    let (first_name, last_name) = contact
        .and_then(|c| c.candidate_name.as_ref())
        .map(|n| (clean(&n.given_name), clean(&n.family_name)))
        .unwrap_or((None, None));

    let emails: Vec<String> = contact
        .and_then(|c| c.email_addresses.as_ref())
        .map(|list| {
            list.iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let phones: Vec<String> = contact
        .and_then(|c| c.telephones.as_ref())
        .map(|list| {
            list.iter()
                .filter_map(|t| {
                    t.normalized
                        .as_deref()
                        .or(t.raw.as_deref())
                        .map(|s| s.trim().to_string())
                })
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let age = resume
        .personal_attributes
        .as_ref()
        .and_then(|p| p.date_of_birth.as_ref())
        .and_then(|d| d.date.as_deref())
        .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .map(|dob| age_on(dob, today));

    let education_summary = resume
        .education
        .as_ref()
        .and_then(|e| e.education_details.as_ref())
        .map(|details| {
            details
                .iter()
                .map(|d| {
                    let school = d
                        .school_name
                        .as_ref()
                        .and_then(TextValue::best)
                        .unwrap_or(UNKNOWN);
                    let degree = d
                        .degree
                        .as_ref()
                        .and_then(|deg| deg.name.as_ref())
                        .and_then(TextValue::best)
                        .unwrap_or(UNKNOWN);
                    let start = date_or_unknown(&d.start_date);
                    let end = date_or_unknown(&d.end_date);
                    format!("{}: {} ({} to {})", school, degree, start, end)
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|s| !s.is_empty());

    let experience_summary = resume
        .employment_history
        .as_ref()
        .and_then(|e| e.positions.as_ref())
        .map(|positions| {
            positions
                .iter()
                .map(|p| {
                    let title = p
                        .job_title
                        .as_ref()
                        .and_then(TextValue::best)
                        .unwrap_or(UNKNOWN);
                    let employer = p
                        .employer
                        .as_ref()
                        .and_then(|e| e.name.as_ref())
                        .and_then(TextValue::best)
                        .unwrap_or(UNKNOWN);
                    match p.description.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
                        Some(desc) => format!("{} at {}: {}", title, employer, desc),
                        None => format!("{} at {}", title, employer),
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|s| !s.is_empty());

    let skills_summary = resume.skills.as_ref().and_then(|s| {
        let from_list = s.raw.as_ref().map(|raw| {
            raw.iter()
                .filter_map(|sk| sk.name.as_deref())
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        });
        match from_list.filter(|j| !j.is_empty()) {
            Some(joined) => Some(joined),
            None => s.text.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(String::from),
        }
    });

    let languages = resume
        .language_competencies
        .as_ref()
        .map(|list| {
            list.iter()
                .filter_map(|l| l.language.as_deref().or(l.language_code.as_deref()))
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|s| !s.is_empty());

    let seminars = resume
        .training
        .as_ref()
        .and_then(|t| {
            let from_list = t.trainings.as_ref().map(|list| {
                list.iter()
                    .filter_map(|d| d.text.as_deref().or(d.entity.as_deref()))
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            match from_list.filter(|j| !j.is_empty()) {
                Some(joined) => Some(joined),
                None => t.text.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from),
            }
        });

    CandidateProfile {
        first_name,
        last_name,
        emails,
        phones,
        age,
        education_summary,
        experience_summary,
        skills_summary,
        languages,
        seminars,
    }
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn date_or_unknown(value: &Option<DateValue>) -> &str {
    value
        .as_ref()
        .and_then(|d| d.date.as_deref())
        .unwrap_or(UNKNOWN)
}

fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

#[derive(Clone)]
pub struct ParserService {
    client: Client,
    storage: StorageService,
}

impl ParserService {
    pub fn new(storage: StorageService) -> Self {
        let client = Client::builder()
            .timeout(PARSE_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self { client, storage }
    }

    /// Fetches the CV bytes and submits them to the external parsing service.
    pub async fn parse(&self, storage_key: &str) -> Result<ResumeData, ParseError> {
        let config = get_config();
        if !config.textkernel_enabled
            || config.textkernel_base_endpoint.is_empty()
            || config.textkernel_api_key.is_empty()
            || config.textkernel_account_id.is_empty()
        {
            return Err(ParseError::MissingConfiguration);
        }

        let bytes = self.storage.get(storage_key).await.map_err(|e| match e {
            StorageError::NotFound(key) => ParseError::DownloadFailed(format!("missing object {}", key)),
            StorageError::Transient(msg) => ParseError::DownloadFailed(msg),
        })?;

        let endpoint = Url::parse(&config.textkernel_base_endpoint)
            .and_then(|base| base.join("parser/resume"))
            .map_err(|e| {
                tracing::warn!(error = %e, "invalid parser base endpoint");
                ParseError::MissingConfiguration
            })?;

        let body = ParseRequest {
            document_as_base64_string: base64::engine::general_purpose::STANDARD.encode(&bytes),
            document_last_modified: Utc::now().format("%Y-%m-%d").to_string(),
        };

        let resp = self
            .client
            .post(endpoint)
            .header("tx-accountid", &config.textkernel_account_id)
            .header("tx-servicekey", &config.textkernel_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ParseError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ParseError::Http {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        let envelope: ParseEnvelope = resp
            .json()
            .await
            .map_err(|e| ParseError::Malformed(e.to_string()))?;

        envelope
            .value
            .and_then(|v| v.resume_data)
            .ok_or_else(|| ParseError::Malformed("response carried no ResumeData".to_string()))
    }
}

/// Bounded excerpt kept in history events and job errors.
pub fn excerpt(text: &str) -> String {
    if text.len() <= ERROR_BODY_EXCERPT {
        text.to_string()
    } else {
        let mut cut = ERROR_BODY_EXCERPT;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &text[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resume_from(value: serde_json::Value) -> ResumeData {
        serde_json::from_value(value).expect("resume json")
    }

    #[test]
    fn extracts_full_profile() {
        let resume = resume_from(json!({
            "ContactInformation": {
                "CandidateName": { "GivenName": "Alice", "FamilyName": "Papadopoulos" },
                "EmailAddresses": ["Alice@Example.com", "alt@example.com"],
                "Telephones": [
                    { "Raw": "697 123 4567", "Normalized": "+306971234567" },
                    { "Raw": "210-555-0000" }
                ]
            },
            "PersonalAttributes": { "DateOfBirth": { "Date": "1990-06-15" } },
            "Education": { "EducationDetails": [
                { "SchoolName": { "Normalized": "NTUA" },
                  "Degree": { "Name": { "Raw": "MEng" } },
                  "StartDate": { "Date": "2008-09-01" },
                  "EndDate": { "Date": "2013-06-30" } }
            ]},
            "EmploymentHistory": { "Positions": [
                { "Employer": { "Name": { "Raw": "Acme" } },
                  "JobTitle": { "Raw": "Engineer" },
                  "Description": "Built things." }
            ]},
            "Skills": { "Raw": [{ "Name": "Rust" }, { "Name": "SQL" }] },
            "LanguageCompetencies": [{ "Language": "Greek" }, { "Language": "English" }],
            "Training": { "Trainings": [{ "Text": "Scrum seminar" }] }
        }));

        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let profile = extract_profile(&resume, today);
        assert_eq!(profile.first_name.as_deref(), Some("Alice"));
        assert_eq!(profile.last_name.as_deref(), Some("Papadopoulos"));
        assert_eq!(profile.primary_email(), Some("alice@example.com"));
        assert_eq!(profile.phones[0], "+306971234567");
        assert_eq!(profile.phones[1], "210-555-0000");
        assert_eq!(profile.age, Some(34));
        assert_eq!(
            profile.education_summary.as_deref(),
            Some("NTUA: MEng (2008-09-01 to 2013-06-30)")
        );
        assert_eq!(
            profile.experience_summary.as_deref(),
            Some("Engineer at Acme: Built things.")
        );
        assert_eq!(profile.skills_summary.as_deref(), Some("Rust, SQL"));
        assert_eq!(profile.languages.as_deref(), Some("Greek, English"));
        assert_eq!(profile.seminars.as_deref(), Some("Scrum seminar"));
    }

    #[test]
    fn tolerates_missing_intermediate_keys() {
        let resume = resume_from(json!({}));
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let profile = extract_profile(&resume, today);
        assert_eq!(profile, CandidateProfile::default());
        assert!(profile.primary_email().is_none());
    }

    #[test]
    fn unknown_sentinels_fill_partial_education() {
        let resume = resume_from(json!({
            "Education": { "EducationDetails": [ { "Degree": { "Name": { "Raw": "BSc" } } } ] }
        }));
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let profile = extract_profile(&resume, today);
        assert_eq!(
            profile.education_summary.as_deref(),
            Some("Unknown: BSc (Unknown to Unknown)")
        );
    }

    #[test]
    fn skills_fall_back_to_free_text() {
        let resume = resume_from(json!({ "Skills": { "Text": "welding, plumbing" } }));
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let profile = extract_profile(&resume, today);
        assert_eq!(profile.skills_summary.as_deref(), Some("welding, plumbing"));
    }

    #[test]
    fn age_respects_birthday_not_yet_reached() {
        let dob = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()), 34);
        assert_eq!(age_on(dob, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()), 35);
    }

    #[test]
    fn excerpt_bounds_long_bodies() {
        let long = "x".repeat(2000);
        let cut = excerpt(&long);
        assert!(cut.len() <= 520);
        assert!(cut.ends_with("..."));
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn http_errors_classify_by_status() {
        assert!(ParseError::Http { status: 500, body: String::new() }.is_transient());
        assert!(ParseError::Http { status: 429, body: String::new() }.is_transient());
        assert!(!ParseError::Http { status: 400, body: String::new() }.is_transient());
        assert!(ParseError::Network("reset".into()).is_transient());
        assert!(!ParseError::MissingConfiguration.is_transient());
    }
}
