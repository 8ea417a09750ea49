// Data shapes exchanged with the Honulabs API.
//
// `Job` is the handle for a server-side asynchronous job. The client never
// edits one in place: every refresh yields a brand-new `Job` that replaces
// the previous one (see `poller`).

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Job type tag the server uses for business deletion jobs.
pub const DELETE_BUSINESS_JOB: &str = "delete_business";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
        }
    }

    /// `success` and `failed` are final; no refresh moves a job out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organisation {
    pub org_id: String,
    pub domain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    pub org: Organisation,
    pub name: String,
    pub business_id: String,
    pub model_ref: String,
}

/// Snapshot of a server-side job.
///
/// On the wire the owning business is a nested object; only its id is kept
/// because that is all a refresh needs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub job_type: String,
    #[serde(rename = "business", deserialize_with = "business_id_of")]
    pub business_id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(deserialize_with = "timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "optional_timestamp")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Decode the job's `result` payload into a typed structure.
    ///
    /// Returns `None` when the job carries no result.
    pub fn result_as<T>(&self) -> Option<Result<T, serde_json::Error>>
    where
        T: serde::de::DeserializeOwned,
    {
        self.result
            .as_ref()
            .map(|value| serde_json::from_value(value.clone()))
    }
}

fn business_id_of<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct BusinessRef {
        business_id: String,
    }
    Ok(BusinessRef::deserialize(deserializer)?.business_id)
}

// The API emits either RFC 3339 or naive ISO 8601 timestamps; naive ones are UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
    }
}

// Job payloads

/// Answers collected before requirements generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessPlanRequirementsCreate {
    pub idea: String,
    pub inspiration: String,
    pub long_term_goals: String,
    pub brand_interpretation: String,
    pub risk_assessment: String,
}

impl BusinessPlanRequirementsCreate {
    pub const IDEA_PROMPT: &'static str = "Detailed description of the idea for your new SaaS product:";
    pub const INSPIRATION_PROMPT: &'static str = "What inspired you to pursue this SaaS idea?";
    pub const GOALS_PROMPT: &'static str =
        "What long-term goals do you have for your SaaS business?";
    pub const BRAND_PROMPT: &'static str =
        "How do you want your customers to feel when interacting with your brand?";
    pub const RISK_PROMPT: &'static str = "Are you willing to take calculated risks to achieve long-term goals, even if it means facing short-term uncertainties?";

    /// Question and answer summary of everything except the idea itself.
    pub fn q_n_a(&self) -> String {
        [
            (Self::INSPIRATION_PROMPT, &self.inspiration),
            (Self::GOALS_PROMPT, &self.long_term_goals),
            (Self::BRAND_PROMPT, &self.brand_interpretation),
            (Self::RISK_PROMPT, &self.risk_assessment),
        ]
        .iter()
        .map(|(question, answer)| format!("- {question}\n{answer}"))
        .collect::<Vec<_>>()
        .join("\n\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessPlan {
    pub business_plan: String,
    #[serde(default)]
    pub business_plan_concise: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessNameWithDomain {
    pub business_name: String,
    pub domain_name_options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessNamesDomains {
    pub business_names_with_domains: Vec<BusinessNameWithDomain>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullBusinessDetailsCreate {
    pub business_name: String,
    pub base_business_plan: BusinessPlan,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VercelSecrets {
    pub secrets: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborators {
    pub collaborators: Vec<Collaborator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSegment {
    pub core_market: String,
    pub sub_category: String,
    pub niche: String,
}

/// A generated SaaS idea. The feasibility rank arrives as either a number
/// or a label, so it stays untyped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdeaSuggestion {
    pub challenge: String,
    pub saas_venture_title: String,
    pub saas_venture_description: String,
    #[serde(default)]
    pub feasibility_rank: serde_json::Value,
}

/// Result payload shared by the segmentation and idea generation jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct Suggestions<T> {
    pub ideas: Vec<T>,
}
