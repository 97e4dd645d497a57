// src/brief/mod.rs
//! Weekly brief: aggregates the last seven days of archived items into
//! per-company activity, top keywords, highlights and market sentiment,
//! plus themes, recommendations and per-company summaries from a
//! [`BriefWriter`] or from rules. Saved as JSON with a Markdown twin.

pub mod writer;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{truncate_display, DISPLAY_CHARS};
use crate::analyze::{AlertLevel, Sentiment};
use crate::archive::ItemRecord;
use crate::ingest::types::SourceType;
use crate::notify::RenderedMessage;
use crate::priority::{sort_by_priority, Leveled};

pub use writer::{BriefNarrative, BriefWriter, CompanySummary, Recommendation};

pub const BRIEF_WINDOW_DAYS: i64 = 7;
const TOP_KEYWORDS: usize = 10;
const MAX_HIGHLIGHTS: usize = 5;

const MAX_SUMMARY_LINES: usize = 3;

/// ISO week label of `now` in its own offset, e.g. `2025-W31`.
pub fn week_label<Tz: TimeZone>(now: &DateTime<Tz>) -> String {
    let w = now.iso_week();
    format!("{}-W{:02}", w.year(), w.week())
}

/// ISO week label in UTC.
pub fn iso_week_label(now: DateTime<Utc>) -> String {
    week_label(&now)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyActivity {
    pub company: String,
    pub total: usize,
    pub by_level: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
    /// Highest level seen for the company this week.
    pub top_level: Option<AlertLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub level: AlertLevel,
    pub company: String,
    pub source_type: SourceType,
    pub text: String,
    pub url: Option<String>,
}

impl Leveled for Highlight {
    fn level(&self) -> AlertLevel {
        self.level
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketOverview {
    pub total_activity: usize,
    pub companies_active: usize,
    pub market_sentiment: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyBrief {
    pub week: String,
    pub generated_at: DateTime<Utc>,
    pub overview: MarketOverview,
    pub companies: Vec<CompanyActivity>,
    pub top_keywords: Vec<(String, usize)>,
    pub highlights: Vec<Highlight>,
    pub themes: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    /// Writer that produced themes/recommendations, or `fallback`.
    pub narrative_source: String,
    #[serde(default)]
    pub company_summaries: BTreeMap<String, CompanySummary>,
}

/// Per-company material for the company summaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyNotes {
    /// Blog posts that read like launches or updates.
    pub shipped: Vec<String>,
    /// Posts mentioning partnerships or expansion.
    pub moves: Vec<String>,
    pub jobs: usize,
    /// `[level] source: text` lines for the writer.
    pub lines: Vec<String>,
}

/// Pure aggregation part of the brief (no writer call).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BriefDigest {
    pub overview: MarketOverview,
    pub companies: Vec<CompanyActivity>,
    pub top_keywords: Vec<(String, usize)>,
    pub highlights: Vec<Highlight>,
    pub job_departments: BTreeMap<String, usize>,
    /// Jobs per company per department.
    pub company_departments: BTreeMap<String, BTreeMap<String, usize>>,
    pub product_updates: usize,
    pub funding_companies: Vec<String>,
    pub notes: BTreeMap<String, CompanyNotes>,
}

pub fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(BRIEF_WINDOW_DAYS)
}

const FUNDING_MARKERS: [&str; 5] = ["funding", "series", "seed", "acquired", "acqui-hire"];
const PRODUCT_MARKERS: [&str; 3] = ["launch", "update", "new"];
const SHIPPED_MARKERS: [&str; 4] = ["launch", "update", "new", "feature"];
const MOVE_MARKERS: [&str; 3] = ["partnership", "collaboration", "expansion"];

pub fn digest(records: &[ItemRecord]) -> BriefDigest {
    let mut companies: BTreeMap<String, CompanyActivity> = BTreeMap::new();
    let mut keywords: BTreeMap<String, usize> = BTreeMap::new();
    let mut highlights = Vec::new();
    let mut d = BriefDigest::default();
    let (mut pos, mut neg) = (0usize, 0usize);

    for r in records {
        let c = companies
            .entry(r.company.clone())
            .or_insert_with(|| CompanyActivity {
                company: r.company.clone(),
                ..Default::default()
            });
        c.total += 1;
        *c.by_level.entry(r.level.as_str().to_string()).or_default() += 1;
        *c.by_source.entry(r.source_type.as_str().to_string()).or_default() += 1;
        c.top_level = c.top_level.max(Some(r.level));

        for k in &r.keywords {
            *keywords.entry(k.clone()).or_default() += 1;
        }

        match r.signals.sentiment {
            Sentiment::Positive => pos += 1,
            Sentiment::Negative => neg += 1,
            Sentiment::Neutral => {}
        }

        if r.level > AlertLevel::Low {
            highlights.push(Highlight {
                level: r.level,
                company: r.company.clone(),
                source_type: r.source_type,
                text: truncate_display(&r.text, DISPLAY_CHARS),
                url: r.url.clone(),
            });
        }

        if let Some(job) = &r.signals.job {
            *d.job_departments.entry(job.department.clone()).or_default() += 1;
            *d.company_departments
                .entry(r.company.clone())
                .or_default()
                .entry(job.department.clone())
                .or_default() += 1;
        }

        let lower = r.text.to_lowercase();
        if r.source_type == SourceType::Blog && PRODUCT_MARKERS.iter().any(|m| lower.contains(m)) {
            d.product_updates += 1;
        }

        let short = truncate_display(&r.text, DISPLAY_CHARS);
        let n = d.notes.entry(r.company.clone()).or_default();
        n.lines.push(format!("[{}] {}: {}", r.level, r.source_type.as_str(), short));
        match r.source_type {
            SourceType::Blog if SHIPPED_MARKERS.iter().any(|m| lower.contains(m)) => {
                n.shipped.push(short)
            }
            SourceType::JobPosting => n.jobs += 1,
            _ if MOVE_MARKERS.iter().any(|m| lower.contains(m)) => n.moves.push(short),
            _ => {}
        }
        if r.keywords.iter().any(|k| FUNDING_MARKERS.contains(&k.as_str()))
            && !d.funding_companies.contains(&r.company)
        {
            d.funding_companies.push(r.company.clone());
        }
    }

    sort_by_priority(&mut highlights);
    highlights.truncate(MAX_HIGHLIGHTS);

    let mut top: Vec<(String, usize)> = keywords.into_iter().collect();
    // count desc, then keyword asc (BTreeMap order survives the stable sort)
    top.sort_by(|a, b| b.1.cmp(&a.1));
    top.truncate(TOP_KEYWORDS);

    d.overview = MarketOverview {
        total_activity: records.len(),
        companies_active: companies.len(),
        market_sentiment: match pos.cmp(&neg) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        },
    };
    d.companies = companies.into_values().collect();
    d.top_keywords = top;
    d.highlights = highlights;
    d
}

/// Plain-text activity summary handed to the narrative writer.
pub fn writer_context(d: &BriefDigest) -> String {
    let mut out = format!(
        "Total activity: {} items across {} companies. Market sentiment: {}.\n",
        d.overview.total_activity,
        d.overview.companies_active,
        d.overview.market_sentiment.as_str()
    );
    for c in &d.companies {
        let levels = c
            .by_level
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("{}: {} items ({levels})\n", c.company, c.total));
    }
    if !d.top_keywords.is_empty() {
        let kws = d
            .top_keywords
            .iter()
            .map(|(k, n)| format!("{k} ({n})"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("Top keywords: {kws}\n"));
    }
    for h in &d.highlights {
        out.push_str(&format!("[{}] {}: {}\n", h.level, h.company, h.text));
    }
    out
}

/// Rule-derived themes and recommendations used when no writer answers.
pub fn fallback_narrative(d: &BriefDigest) -> BriefNarrative {
    let mut themes = Vec::new();

    if !d.funding_companies.is_empty() {
        themes.push(format!(
            "Funding activity at {}",
            d.funding_companies.join(", ")
        ));
    }

    let total_jobs: usize = d.job_departments.values().sum();
    if total_jobs > 20 {
        themes.push(format!(
            "High hiring activity across companies ({total_jobs} total jobs)"
        ));
    }
    let eng = d.job_departments.get("engineering").copied().unwrap_or(0);
    let mkt = d.job_departments.get("marketing").copied().unwrap_or(0);
    match eng.cmp(&mkt) {
        std::cmp::Ordering::Greater => themes.push("Engineering-focused hiring trend".into()),
        std::cmp::Ordering::Less => themes.push("Marketing-focused hiring trend".into()),
        std::cmp::Ordering::Equal => {}
    }

    if d.product_updates > 5 {
        themes.push(format!(
            "Active product development cycle ({} updates)",
            d.product_updates
        ));
    }

    let mut engineering_focus = Vec::new();
    let mut marketing_focus = Vec::new();
    for (company, depts) in &d.company_departments {
        let jobs: usize = depts.values().sum();
        if jobs <= 5 {
            continue;
        }
        if depts.get("engineering").copied().unwrap_or(0) > 3 {
            engineering_focus.push(company.as_str());
        }
        if depts.get("marketing").copied().unwrap_or(0) > 2 {
            marketing_focus.push(company.as_str());
        }
    }

    let mut recommendations = Vec::new();
    if !engineering_focus.is_empty() {
        recommendations.push(Recommendation {
            category: "product".into(),
            title: "Accelerate engineering hiring".into(),
            description: format!(
                "{} are hiring engineers aggressively. Consider ramping up engineering recruitment.",
                engineering_focus.join(", ")
            ),
            priority: "high".into(),
            timeline: "short-term".into(),
        });
    }
    if !marketing_focus.is_empty() {
        recommendations.push(Recommendation {
            category: "marketing".into(),
            title: "Review marketing efforts".into(),
            description: format!(
                "{} are focusing on marketing. Review marketing strategy and budget allocation.",
                marketing_focus.join(", ")
            ),
            priority: "medium".into(),
            timeline: "short-term".into(),
        });
    }

    BriefNarrative {
        themes,
        recommendations,
    }
}

/// Items of one company, one per line, for the company summary writer.
pub fn company_context(company: &str, d: &BriefDigest) -> String {
    let mut out = format!("Company: {company}\n");
    if let Some(n) = d.notes.get(company) {
        for line in &n.lines {
            out.push_str(line);
            out.push('\n');
        }
    }
    if let Some(depts) = d.company_departments.get(company) {
        let list = depts
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("Open roles by department: {list}\n"));
    }
    out
}

/// Rule-derived company summary used when no writer answers.
pub fn fallback_company_summary(company: &str, d: &BriefDigest) -> CompanySummary {
    let Some(n) = d.notes.get(company) else {
        return CompanySummary::default();
    };

    let mut who_they_hired = Vec::new();
    if n.jobs > 0 {
        who_they_hired.push(format!("Posted {} new job positions", n.jobs));
        // max_by_key keeps the last maximum; reversed, ties go to the first department
        let top = d
            .company_departments
            .get(company)
            .and_then(|depts| depts.iter().rev().max_by_key(|(_, count)| **count));
        if let Some((dept, count)) = top {
            who_they_hired.push(format!("Focus on {dept} hiring ({count} positions)"));
        }
    }

    CompanySummary {
        what_they_shipped: n.shipped.iter().take(MAX_SUMMARY_LINES).cloned().collect(),
        who_they_hired,
        signals_narrative: n.moves.iter().take(MAX_SUMMARY_LINES).cloned().collect(),
        key_insights: Vec::new(),
    }
}

/// Build the brief labelled `week` from already filtered records.
pub async fn build_brief(
    records: &[ItemRecord],
    now: DateTime<Utc>,
    week: String,
    writer: &dyn BriefWriter,
) -> WeeklyBrief {
    let d = digest(records);
    let (narrative, source) = match writer.write(&writer_context(&d)).await {
        Some(n) => (n, writer.name().to_string()),
        None => {
            tracing::info!(target: "brief", writer = writer.name(), "using fallback themes");
            (fallback_narrative(&d), "fallback".to_string())
        }
    };

    let mut company_summaries = BTreeMap::new();
    for c in &d.companies {
        let summary = match writer
            .summarize_company(&c.company, &company_context(&c.company, &d))
            .await
        {
            Some(s) => s,
            None => fallback_company_summary(&c.company, &d),
        };
        company_summaries.insert(c.company.clone(), summary);
    }

    WeeklyBrief {
        week,
        generated_at: now,
        overview: d.overview,
        companies: d.companies,
        top_keywords: d.top_keywords,
        highlights: d.highlights,
        themes: narrative.themes,
        recommendations: narrative.recommendations,
        narrative_source: source,
        company_summaries,
    }
}

pub fn brief_path(dir: &Path, week: &str) -> PathBuf {
    dir.join(format!("brief_{week}.json"))
}

pub fn markdown_path(dir: &Path, week: &str) -> PathBuf {
    dir.join(format!("brief_{week}.md"))
}

/// Writes `brief_<week>.json` and `brief_<week>.md`; returns the JSON path.
pub fn save_brief(dir: &Path, brief: &WeeklyBrief) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = brief_path(dir, &brief.week);
    let json = serde_json::to_vec_pretty(brief).context("serialize brief")?;
    fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;

    let md = markdown_path(dir, &brief.week);
    fs::write(&md, render_markdown(brief)).with_context(|| format!("write {}", md.display()))?;
    Ok(path)
}

fn push_list(out: &mut String, heading: &str, items: &[String]) {
    out.push_str(&format!("**{heading}:**\n"));
    if items.is_empty() {
        out.push_str("- No significant activity\n");
    }
    for i in items {
        out.push_str(&format!("- {i}\n"));
    }
    out.push('\n');
}

/// Human-readable brief.
pub fn render_markdown(brief: &WeeklyBrief) -> String {
    let o = &brief.overview;
    let mut out = format!(
        "# Week {} - Competitive Intelligence Brief\n\n## Executive Summary\n\n\
         **Week:** {}  \n**Generated:** {}  \n**Market Sentiment:** {}  \n\
         **Total Activity:** {} items across {} companies\n\n## Company Snapshots\n\n",
        brief.week,
        brief.week,
        brief.generated_at.format("%Y-%m-%d %H:%M UTC"),
        o.market_sentiment.as_str(),
        o.total_activity,
        o.companies_active,
    );

    if brief.companies.is_empty() {
        out.push_str("No competitor activity this week.\n\n");
    }
    for c in &brief.companies {
        out.push_str(&format!("### {}\n\n", c.company));
        let summary = brief.company_summaries.get(&c.company).cloned().unwrap_or_default();
        push_list(&mut out, "What They Shipped", &summary.what_they_shipped);
        push_list(&mut out, "Who They Hired", &summary.who_they_hired);
        push_list(&mut out, "Signals & Narrative", &summary.signals_narrative);
        if !summary.key_insights.is_empty() {
            push_list(&mut out, "Key Insights", &summary.key_insights);
        }
        out.push_str(&format!(
            "**Alert Level:** {} ({} items)\n\n---\n\n",
            c.top_level.unwrap_or(AlertLevel::Low).as_str().to_uppercase(),
            c.total
        ));
    }

    if !brief.themes.is_empty() {
        out.push_str("## Cross-Company Themes\n\n");
        for (i, t) in brief.themes.iter().enumerate() {
            out.push_str(&format!("{}. {t}\n", i + 1));
        }
        out.push('\n');
    }

    if !brief.recommendations.is_empty() {
        out.push_str("## Recommended Actions\n\n");
        for (i, r) in brief.recommendations.iter().enumerate() {
            out.push_str(&format!("### {}. {}\n\n", i + 1, r.title));
            out.push_str(&format!(
                "**Category:** {} | **Priority:** {} | **Timeline:** {}\n\n",
                r.category, r.priority, r.timeline
            ));
            if !r.description.is_empty() {
                out.push_str(&format!("{}\n\n", r.description));
            }
        }
    }

    out.push_str("## Alert Summary\n\n");
    if brief.highlights.is_empty() {
        out.push_str("No high or medium priority activity this week.\n");
    }
    for h in &brief.highlights {
        out.push_str(&format!(
            "- **{}** {} ({}): {}\n",
            h.level.as_str().to_uppercase(),
            h.company,
            h.source_type.as_str(),
            h.text
        ));
    }
    out
}

pub fn render_brief(brief: &WeeklyBrief) -> RenderedMessage {
    let mut body = format!(
        "Weekly competitive intelligence summary, week {}\n\nMarket overview:\n- Sentiment: {}\n- Total activity: {} items\n- Active companies: {}\n",
        brief.week,
        brief.overview.market_sentiment.as_str(),
        brief.overview.total_activity,
        brief.overview.companies_active,
    );
    if !brief.highlights.is_empty() {
        body.push_str("\nKey highlights:\n");
        for h in &brief.highlights {
            body.push_str(&format!(
                "- [{}] {}: {}\n",
                h.level.as_str().to_uppercase(),
                h.company,
                h.text
            ));
        }
    }
    if !brief.themes.is_empty() {
        body.push_str("\nCross-company themes:\n");
        for t in brief.themes.iter().take(3) {
            body.push_str(&format!("- {t}\n"));
        }
    }
    if !brief.recommendations.is_empty() {
        body.push_str("\nRecommendations:\n");
        for r in &brief.recommendations {
            body.push_str(&format!("- {}\n", r.title));
        }
    }

    RenderedMessage {
        title: format!("Weekly CI summary - week {}", brief.week),
        body,
        level: None,
        link: None,
        fields: brief
            .companies
            .iter()
            .map(|c| {
                (
                    c.company.clone(),
                    format!(
                        "Alert: {} | Activity: {} items",
                        c.top_level.unwrap_or(AlertLevel::Low).as_str().to_uppercase(),
                        c.total
                    ),
                )
            })
            .collect(),
        ts: brief.generated_at,
    }
}
