//! Narrative writers for the weekly brief: LLM-backed, disabled, mock.
//!
//! A writer answers `None` whenever it cannot produce a usable narrative or
//! company summary; the caller then falls back to rule-derived text.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::InitError;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_THEMES: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub timeline: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefNarrative {
    pub themes: Vec<String>,
    pub recommendations: Vec<Recommendation>,
}

/// One company's week in four short lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    #[serde(default)]
    pub what_they_shipped: Vec<String>,
    #[serde(default)]
    pub who_they_hired: Vec<String>,
    #[serde(default)]
    pub signals_narrative: Vec<String>,
    #[serde(default)]
    pub key_insights: Vec<String>,
}

impl CompanySummary {
    pub fn is_empty(&self) -> bool {
        self.what_they_shipped.is_empty()
            && self.who_they_hired.is_empty()
            && self.signals_narrative.is_empty()
            && self.key_insights.is_empty()
    }
}

#[async_trait::async_trait]
pub trait BriefWriter: Send + Sync {
    /// `context` is the plain-text activity summary for the week.
    async fn write(&self, context: &str) -> Option<BriefNarrative>;

    /// `context` lists one company's items for the week.
    async fn summarize_company(&self, _company: &str, _context: &str) -> Option<CompanySummary> {
        None
    }

    fn name(&self) -> &'static str;
}

pub type DynBriefWriter = Arc<dyn BriefWriter>;

/// LLM settings as read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub api_key: String,
    pub model: String,
}

/// Factory:
/// * `BRIEF_TEST_MODE=mock` → deterministic mock writer.
/// * no settings → disabled writer.
/// * else the OpenAI writer.
pub fn build_writer(settings: Option<&LlmSettings>) -> Result<DynBriefWriter, InitError> {
    if std::env::var("BRIEF_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(MockWriter::default()));
    }
    match settings {
        None => Ok(Arc::new(DisabledWriter)),
        Some(s) => Ok(Arc::new(OpenAiBriefWriter::try_new(s)?)),
    }
}

/// Chat Completions writer. Requires `OPENAI_API_KEY`.
pub struct OpenAiBriefWriter {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiBriefWriter {
    pub fn try_new(settings: &LlmSettings) -> Result<Self, InitError> {
        if settings.api_key.trim().is_empty() {
            return Err(InitError::Empty {
                name: "OPENAI_API_KEY",
            });
        }
        let http = reqwest::Client::builder()
            .user_agent("rival-watch/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()?;
        let model = if settings.model.trim().is_empty() {
            DEFAULT_OPENAI_MODEL.to_string()
        } else {
            settings.model.clone()
        };
        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            model,
        })
    }
}

impl OpenAiBriefWriter {
    /// One chat completion; `None` on transport errors, non-2xx or an empty answer.
    async fn chat(&self, system: &str, user: &str, max_tokens: u32) -> Option<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.3,
            max_tokens,
        };

        let resp = match self
            .http
            .post(OPENAI_URL)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(target: "brief", error = %e, "openai request failed");
                return None;
            }
        };
        if !resp.status().is_success() {
            tracing::warn!(target: "brief", status = %resp.status(), "openai non-2xx");
            return None;
        }
        let body: Resp = resp.json().await.ok()?;
        body.choices.into_iter().next().map(|c| c.message.content)
    }
}

#[async_trait::async_trait]
impl BriefWriter for OpenAiBriefWriter {
    async fn write(&self, context: &str) -> Option<BriefNarrative> {
        let sys = "You are a competitive intelligence analyst. From the weekly activity summary, \
                   return ONLY a JSON object {\"themes\": [3-5 short cross-company themes], \
                   \"recommendations\": [{\"category\", \"title\", \"description\", \"priority\", \"timeline\"}]}.";
        let content = self.chat(sys, context, 800).await?;
        parse_narrative(&content)
    }

    async fn summarize_company(&self, company: &str, context: &str) -> Option<CompanySummary> {
        let sys = format!(
            "You are a competitive intelligence analyst reviewing {company}'s activity this week. \
             Return ONLY a JSON object {{\"what_they_shipped\": [product launches, updates, features], \
             \"who_they_hired\": [hiring activity, departments, seniority], \
             \"signals_narrative\": [strategic themes, positioning, competitive moves], \
             \"key_insights\": [3-5 key insights]}}."
        );
        let content = self.chat(&sys, context, 1000).await?;
        let summary = parse_company_summary(&content);
        if summary.is_none() {
            tracing::warn!(target: "brief", company, "unusable company summary answer");
        }
        summary
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Returns `None` always; used when no LLM is configured.
pub struct DisabledWriter;

#[async_trait::async_trait]
impl BriefWriter for DisabledWriter {
    async fn write(&self, _context: &str) -> Option<BriefNarrative> {
        None
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Simple mock writer for tests/local runs.
#[derive(Clone)]
pub struct MockWriter {
    pub fixed: BriefNarrative,
    pub company: CompanySummary,
}

impl Default for MockWriter {
    fn default() -> Self {
        Self {
            fixed: BriefNarrative {
                themes: vec!["Mock theme (mock)".to_string()],
                recommendations: vec![Recommendation {
                    category: "strategy".into(),
                    title: "Mock recommendation".into(),
                    ..Default::default()
                }],
            },
            company: CompanySummary {
                key_insights: vec!["Mock insight (mock)".to_string()],
                ..Default::default()
            },
        }
    }
}

#[async_trait::async_trait]
impl BriefWriter for MockWriter {
    async fn write(&self, _context: &str) -> Option<BriefNarrative> {
        Some(self.fixed.clone())
    }
    async fn summarize_company(&self, _company: &str, _context: &str) -> Option<CompanySummary> {
        Some(self.company.clone())
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// --- tolerant parsing of the model answer ---

#[derive(Deserialize)]
#[serde(untagged)]
enum RecommendationAny {
    Full(Recommendation),
    Text(String),
}

#[derive(Deserialize)]
struct NarrativeAny {
    #[serde(default)]
    themes: Vec<String>,
    #[serde(default)]
    recommendations: Vec<RecommendationAny>,
}

fn strip_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim()
}

/// Parse `{themes, recommendations}`, tolerating a ```json fence and
/// plain-string recommendations. Empty answers count as no answer.
pub fn parse_narrative(content: &str) -> Option<BriefNarrative> {
    let any: NarrativeAny = serde_json::from_str(strip_fence(content)).ok()?;
    let themes: Vec<String> = any
        .themes
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_THEMES)
        .collect();
    let recommendations: Vec<Recommendation> = any
        .recommendations
        .into_iter()
        .map(|r| match r {
            RecommendationAny::Full(r) => r,
            RecommendationAny::Text(title) => Recommendation {
                title,
                ..Default::default()
            },
        })
        .filter(|r| !r.title.trim().is_empty())
        .collect();

    if themes.is_empty() && recommendations.is_empty() {
        return None;
    }
    Some(BriefNarrative {
        themes,
        recommendations,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<String>),
    One(String),
}

impl Default for OneOrMany {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl OneOrMany {
    fn into_clean(self) -> Vec<String> {
        let v = match self {
            OneOrMany::Many(v) => v,
            OneOrMany::One(s) => vec![s],
        };
        v.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Deserialize)]
struct CompanySummaryAny {
    #[serde(default)]
    what_they_shipped: OneOrMany,
    #[serde(default)]
    who_they_hired: OneOrMany,
    #[serde(default)]
    signals_narrative: OneOrMany,
    #[serde(default)]
    key_insights: OneOrMany,
}

/// Parse a company summary; each field may be a list or a single string.
pub fn parse_company_summary(content: &str) -> Option<CompanySummary> {
    let any: CompanySummaryAny = serde_json::from_str(strip_fence(content)).ok()?;
    let summary = CompanySummary {
        what_they_shipped: any.what_they_shipped.into_clean(),
        who_they_hired: any.who_they_hired.into_clean(),
        signals_narrative: any.signals_narrative.into_clean(),
        key_insights: any.key_insights.into_clean(),
    };
    (!summary.is_empty()).then_some(summary)
}
