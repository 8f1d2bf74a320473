//! Prompt compiler.
//!
//! Folds a render [`Snapshot`] and the user's [`PromptBuilder`] settings into
//! a JSON context payload and a final prompt for the text-generation model.
//! Hashtag suggestions are picked from the data: tags matching the prompt's
//! keywords come first, fading tags that do not match are listed to avoid.

use crate::dashboard::Snapshot;
use crate::error::Result;
use crate::frame::{cell_number, cell_text, ResultFrame};
use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SYSTEM_PROMPT: &str = "You are a TikTok content strategist. Read the JSON context \
(trend data and prompt-builder settings) and propose ideas and scripts that can be acted on. \
Always combine niche and trending hashtags and say why each choice fits.";

pub const PROMPT_FILE: &str = "tiktok_prompt_compiled.txt";
pub const CONTEXT_FILE: &str = "tiktok_context.json";

const KEYWORD_SCAN_CHARS: usize = 5000;
const LIST_LIMIT: usize = 50;
const PROVEN_LIMIT: usize = 100;
const WEEKLY_LIMIT: usize = 100;
const FADING_LIMIT: usize = 30;
const PICK_PER_LIST: usize = 10;
const PICK_LIMIT: usize = 20;

lazy_static! {
    static ref HASHTAG_RE: Regex = Regex::new(r"#([a-z0-9_]+)").unwrap();
    static ref WORD_RE: Regex = Regex::new(r"[a-z0-9_]{3,}").unwrap();
}

/// Campaign settings typed in by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptBuilder {
    pub goal: String,
    pub audience: String,
    pub product_service: String,
    pub tone: String,
    pub kpi: String,
    pub constraints: String,
    pub freeform: String,
    pub idea_count: u32,
    pub output_language: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            goal: String::new(),
            audience: String::new(),
            product_service: String::new(),
            tone: "Cheerful, energetic, natural".to_string(),
            kpi: "Views >= 50k/video, ER >= 6%".to_string(),
            constraints: String::new(),
            freeform: String::new(),
            idea_count: 3,
            output_language: "English".to_string(),
        }
    }
}

impl PromptBuilder {
    /// Keywords of the free-text fields that describe the campaign.
    pub fn keywords(&self) -> Vec<String> {
        extract_keywords(&[
            self.goal.as_str(),
            self.audience.as_str(),
            self.product_service.as_str(),
            self.tone.as_str(),
            self.freeform.as_str(),
        ])
    }

    fn block(&self) -> String {
        let or_missing = |s: &str| {
            if s.trim().is_empty() {
                "(not provided)".to_string()
            } else {
                s.to_string()
            }
        };
        let mut out = String::from("[Builder]\n");
        out.push_str(&format!("- Goal: {}\n", or_missing(&self.goal)));
        out.push_str(&format!("- Audience: {}\n", or_missing(&self.audience)));
        out.push_str(&format!("- Product/service: {}\n", or_missing(&self.product_service)));
        out.push_str(&format!("- Tone: {}\n", or_missing(&self.tone)));
        out.push_str(&format!("- KPI: {}\n", or_missing(&self.kpi)));
        out.push_str(&format!("- Constraints: {}\n", or_missing(&self.constraints)));
        if !self.freeform.trim().is_empty() {
            out.push_str(&format!("- Additional instructions: {}\n", self.freeform.trim()));
        }
        out.push_str(&format!("- Number of ideas: {}\n", self.idea_count));
        out.push_str(&format!("- Output language: {}\n", self.output_language));
        out
    }
}

/// Case-insensitive dedupe keeping the first spelling and order. Blank
/// entries are dropped.
pub fn dedup_ci<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .unique_by(|s| s.to_lowercase())
        .collect()
}

/// `#tag` captures followed by plain words of three or more characters,
/// from the first 5000 characters of the lower-cased text.
pub fn extract_keywords(texts: &[&str]) -> Vec<String> {
    let joined = texts.iter().filter(|t| !t.is_empty()).join(" ");
    let text: String = joined.chars().take(KEYWORD_SCAN_CHARS).collect::<String>().to_lowercase();

    let tags = HASHTAG_RE.captures_iter(&text).filter_map(|c| c.get(1)).map(|m| m.as_str());
    let words = WORD_RE.find_iter(&text).map(|m| m.as_str());
    dedup_ci(tags.chain(words))
}

pub fn matches_prompt(tag: &str, keywords: &[String]) -> bool {
    let tag = tag.to_lowercase();
    let tag = tag.trim_start_matches('#');
    keywords.iter().any(|kw| tag.contains(kw.as_str()))
}

/// Hashtags grouped by why they are interesting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HashtagLists {
    /// Biggest view gain on the latest momentum day.
    pub hot: Vec<String>,
    /// Longest consecutive-day streaks.
    pub evergreen: Vec<String>,
    /// Most views per video on the latest day.
    pub opportunity: Vec<String>,
    pub proven: Vec<String>,
    /// Oldest week first, best rank first within a week.
    pub weekly: Vec<String>,
    /// Biggest view loss on the latest momentum day.
    pub fading: Vec<String>,
}

impl HashtagLists {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let latest = &snapshot.momentum_latest;
        Self {
            hot: head_texts(&latest.sort_by_number("view_delta", true), "hashtag", LIST_LIMIT),
            evergreen: head_texts(
                &snapshot.retention.frame.sort_by_number("streak_days", true),
                "hashtag",
                LIST_LIMIT,
            ),
            opportunity: by_views_per_video(&snapshot.opportunity.frame)
                .into_iter()
                .take(LIST_LIMIT)
                .collect(),
            proven: head_texts(&snapshot.top100.frame, "hashtag", PROVEN_LIMIT),
            weekly: weekly_order(&snapshot.weekly.frame)
                .into_iter()
                .take(WEEKLY_LIMIT)
                .collect(),
            fading: head_texts(&latest.sort_by_number("view_delta", false), "hashtag", FADING_LIMIT),
        }
    }

    /// Every suggested tag, deduped, in list order.
    pub fn all_suggested(&self) -> Vec<String> {
        dedup_ci(
            self.hot
                .iter()
                .chain(&self.evergreen)
                .chain(&self.opportunity)
                .chain(&self.proven)
                .chain(&self.weekly),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HashtagPicks {
    pub prefer: Vec<String>,
    pub avoid: Vec<String>,
}

/// Prefer: prompt matches, then the head of each list (max 20).
/// Avoid: fading tags unrelated to the prompt (max 20).
pub fn pick_hashtags(lists: &HashtagLists, keywords: &[String]) -> HashtagPicks {
    let matching = lists
        .all_suggested()
        .into_iter()
        .filter(|t| matches_prompt(t, keywords));
    let heads = [&lists.hot, &lists.evergreen, &lists.opportunity, &lists.proven, &lists.weekly]
        .into_iter()
        .flat_map(|list| list.iter().take(PICK_PER_LIST).cloned());

    let mut prefer = dedup_ci(matching.chain(heads));
    prefer.truncate(PICK_LIMIT);

    let mut avoid = dedup_ci(lists.fading.iter().filter(|t| !matches_prompt(t, keywords)));
    avoid.truncate(PICK_LIMIT);

    HashtagPicks { prefer, avoid }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveFilters {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub countries: Vec<String>,
    pub industries: Vec<String>,
    pub keyword: String,
    pub topn: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HashtagContext {
    pub prefer: Vec<String>,
    pub avoid: Vec<String>,
    pub hot_top10: Vec<Map<String, Value>>,
    pub evergreen_top20: Vec<Map<String, Value>>,
    pub opportunity_top20: Vec<Map<String, Value>>,
    pub proven_top100: Vec<Map<String, Value>>,
    pub weekly_top: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketContext {
    pub industry_share_latest: Vec<Map<String, Value>>,
    pub industry_efficiency_latest: Vec<Map<String, Value>>,
    pub country_views_timeseries_head: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextPayload {
    pub filters_active: ActiveFilters,
    pub prompt_builder: PromptBuilder,
    pub hashtags: HashtagContext,
    pub market: MarketContext,
}

#[derive(Debug, Clone)]
pub struct CompiledPrompt {
    pub system: String,
    pub context: ContextPayload,
    pub user: String,
}

impl CompiledPrompt {
    pub fn context_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.context)?)
    }

    /// Write the prompt text and the context JSON into `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;
        let prompt_path = dir.join(PROMPT_FILE);
        let context_path = dir.join(CONTEXT_FILE);
        std::fs::write(&prompt_path, &self.user)?;
        std::fs::write(&context_path, self.context_json()?)?;
        info!("Wrote {} and {}", prompt_path.display(), context_path.display());
        Ok((prompt_path, context_path))
    }
}

pub fn compile(snapshot: &Snapshot, builder: &PromptBuilder) -> Result<CompiledPrompt> {
    let lists = HashtagLists::from_snapshot(snapshot);
    let picks = pick_hashtags(&lists, &builder.keywords());
    let filters = &snapshot.filters;

    let context = ContextPayload {
        filters_active: ActiveFilters {
            start_date: filters.start_date.map(|d| d.to_string()),
            end_date: filters.end_date.map(|d| d.to_string()),
            countries: filters.countries.clone(),
            industries: filters.industries.clone(),
            keyword: filters.keyword.clone(),
            topn: filters.top_n.value(),
        },
        prompt_builder: builder.clone(),
        hashtags: HashtagContext {
            prefer: picks.prefer,
            avoid: picks.avoid,
            hot_top10: snapshot
                .momentum_latest
                .sort_by_number("view_delta", true)
                .head(10)
                .select(&["hashtag", "industry", "view_delta"])
                .records(),
            evergreen_top20: snapshot
                .retention
                .frame
                .sort_by_number("streak_days", true)
                .head(20)
                .select(&["hashtag", "streak_days"])
                .records(),
            opportunity_top20: lists
                .opportunity
                .iter()
                .take(20)
                .map(|h| {
                    let mut record = Map::new();
                    record.insert("hashtag".to_string(), Value::String(h.clone()));
                    record
                })
                .collect(),
            proven_top100: snapshot
                .top100
                .frame
                .head(100)
                .select(&["hashtag", "rank", "view_count", "video_count"])
                .records(),
            weekly_top: lists.weekly.iter().take(30).cloned().collect(),
        },
        market: MarketContext {
            industry_share_latest: snapshot.industry_share.records(),
            industry_efficiency_latest: snapshot.industry_efficiency.records(),
            country_views_timeseries_head: snapshot.country_views.frame.head(50).records(),
        },
    };

    let context_json = serde_json::to_string(&context)?;
    let user = format!(
        "[Context JSON]
{context}

[User Prompt]
{builder}
[Output requirements]
1) Channel analysis from the market data and the builder: niche, strengths, weaknesses and openings.
2) Propose {ideas} video ideas. Each idea must include:
   - Hook of 3 seconds or less
   - Visual (shot by shot)
   - Voiceover (short)
   - CTA (specific)
   - Suggested hashtags (preferred tags mixed with fitting hot or evergreen trends)
3) Pick the best idea and write a detailed 30-45s script.
4) Suggest a one-week posting schedule (peak hours) and A/B test notes.
Keep it short and use bullets.
",
        context = context_json,
        builder = builder.block(),
        ideas = builder.idea_count,
    );

    Ok(CompiledPrompt {
        system: SYSTEM_PROMPT.to_string(),
        context,
        user,
    })
}

fn head_texts(frame: &ResultFrame, column: &str, n: usize) -> Vec<String> {
    frame.texts(column).into_iter().take(n).collect()
}

/// Hashtags by `view_count / video_count` descending; rows without a usable
/// ratio are skipped.
fn by_views_per_video(frame: &ResultFrame) -> Vec<String> {
    let (Some(tag), Some(views), Some(videos)) = (
        frame.column_index("hashtag"),
        frame.column_index("view_count"),
        frame.column_index("video_count"),
    ) else {
        return Vec::new();
    };

    frame
        .rows()
        .iter()
        .filter_map(|row| {
            let video_count = cell_number(&row[videos]).filter(|v| *v != 0.0)?;
            let ratio = cell_number(&row[views])? / video_count;
            Some((cell_text(&row[tag])?, ratio))
        })
        .sorted_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
        .map(|(tag, _)| tag)
        .collect()
}

fn weekly_order(frame: &ResultFrame) -> Vec<String> {
    let (Some(week), Some(rank), Some(tag)) = (
        frame.column_index("week"),
        frame.column_index("best_rank"),
        frame.column_index("hashtag"),
    ) else {
        return Vec::new();
    };

    frame
        .rows()
        .iter()
        .filter_map(|row| {
            Some((
                cell_text(&row[week]).unwrap_or_default(),
                cell_number(&row[rank])?,
                cell_text(&row[tag])?,
            ))
        })
        .sorted_by(|a, b| a.0.cmp(&b.0).then(a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal)))
        .map(|(_, _, tag)| tag)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultFrame {
        ResultFrame::new(columns.iter().map(|c| c.to_string()).collect(), rows).unwrap()
    }

    fn tags(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn test_extract_keywords_tags_then_words() {
        let kw = extract_keywords(&["Grow #StreetFood views", "", "in HCM"]);
        assert_eq!(kw, vec!["streetfood", "grow", "views", "hcm"]);
    }

    #[test]
    fn test_extract_keywords_scans_prefix_only() {
        let long = format!("{} tailword", "x".repeat(KEYWORD_SCAN_CHARS));
        assert!(!extract_keywords(&[long.as_str()]).contains(&"tailword".to_string()));
    }

    #[test]
    fn test_dedup_ci_keeps_first_spelling() {
        assert_eq!(dedup_ci(["Food", "food", " ", "Travel", "FOOD"]), vec!["Food", "Travel"]);
    }

    #[test]
    fn test_matches_prompt_ignores_hash_and_case() {
        let keywords = vec!["food".to_string()];
        assert!(matches_prompt("#StreetFood", &keywords));
        assert!(!matches_prompt("travel", &keywords));
        assert!(!matches_prompt("food", &[]));
    }

    #[test]
    fn test_prefer_is_capped_and_matches_first() {
        let lists = HashtagLists {
            hot: tags("hot", 15),
            evergreen: tags("ever", 15),
            opportunity: tags("opp", 15),
            proven: tags("proven", 15),
            weekly: {
                let mut w = tags("week", 15);
                w.push("WeekendFood".to_string());
                w
            },
            fading: vec!["oldfood".to_string(), "dance".to_string(), "Dance".to_string()],
        };
        let picks = pick_hashtags(&lists, &["food".to_string()]);
        assert_eq!(picks.prefer.len(), PICK_LIMIT);
        assert_eq!(picks.prefer[0], "WeekendFood");
        assert_eq!(picks.prefer[1], "hot0");
        assert_eq!(picks.avoid, vec!["dance"]);
    }

    #[test]
    fn test_views_per_video_skips_zero_videos() {
        let f = frame(
            &["hashtag", "view_count", "video_count"],
            vec![
                vec![json!("a"), json!(100), json!(10)],
                vec![json!("b"), json!(100), json!(0)],
                vec![json!("c"), json!("900"), json!(30)],
                vec![json!("d"), Value::Null, json!(1)],
            ],
        );
        assert_eq!(by_views_per_video(&f), vec!["c", "a"]);
    }

    #[test]
    fn test_weekly_order_oldest_week_best_rank() {
        let f = frame(
            &["week", "hashtag", "best_rank"],
            vec![
                vec![json!("2024-01-08"), json!("late"), json!(1)],
                vec![json!("2024-01-01"), json!("second"), json!(5)],
                vec![json!("2024-01-01"), json!("first"), json!(2)],
                vec![json!("2024-01-01"), json!("unranked"), Value::Null],
            ],
        );
        assert_eq!(weekly_order(&f), vec!["first", "second", "late"]);
    }

    #[test]
    fn test_builder_block_marks_missing_fields() {
        let block = PromptBuilder::default().block();
        assert!(block.contains("- Goal: (not provided)"));
        assert!(block.contains("- Number of ideas: 3"));
        assert!(!block.contains("Additional instructions"));
    }
}
