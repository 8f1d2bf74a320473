//! One render pass over every view.
//!
//! A pass compiles the view SQL for the current filters, resolves each view
//! (precomputed first, recompute on empty or error), and derives the
//! summaries on top. Failures in one view never stop the others; they end up
//! in [`Snapshot::warnings`].

use crate::analytics::{self, IndustryPersistence, PromotedSummary};
use crate::catalog::{self, FilterOptions};
use crate::execution::QueryExecutor;
use crate::filters::{coerce_date, FilterState};
use crate::frame::ResultFrame;
use crate::resolver::{QueryPair, QueryResolver, Resolution, ResolvedFrom};
use crate::views::{ViewKind, ViewSql, GOLD_COUNTRY_SUMMARY, GOLD_PROMOTED_SHARE};
use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Header counts for the current filters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Kpis {
    pub uniq_hashtags: u64,
    pub today_tags: u64,
    pub uniq_countries: u64,
    pub uniq_industries: u64,
}

impl Kpis {
    fn from_frame(frame: &ResultFrame) -> Self {
        let count = |name: &str| frame.number(0, name).unwrap_or(0.0).max(0.0) as u64;
        Self {
            uniq_hashtags: count("uniq_hashtags"),
            today_tags: count("today_tags"),
            uniq_countries: count("uniq_countries"),
            uniq_industries: count("uniq_industries"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub render_id: String,
    pub filters: FilterState,
    pub kpis: Kpis,
    /// `view_delta` and `rank_velocity` are numeric.
    pub momentum: Resolution,
    pub momentum_latest: ResultFrame,
    pub retention: Resolution,
    pub new_entries: ResultFrame,
    pub opportunity: Resolution,
    pub latest_day: Option<NaiveDate>,
    pub industry_share: ResultFrame,
    pub industry_efficiency: ResultFrame,
    pub industry_persistence: Vec<IndustryPersistence>,
    pub country_views: Resolution,
    pub top100: Resolution,
    pub weekly: Resolution,
    pub promoted: Resolution,
    pub promoted_summary: PromotedSummary,
    pub warnings: Vec<String>,
}

impl Snapshot {
    pub fn view(&self, kind: ViewKind) -> &ResultFrame {
        match kind {
            ViewKind::Momentum => &self.momentum.frame,
            ViewKind::Retention => &self.retention.frame,
            ViewKind::NewEntries => &self.new_entries,
            ViewKind::Opportunity => &self.opportunity.frame,
            ViewKind::IndustryShare => &self.industry_share,
            ViewKind::IndustryEfficiency => &self.industry_efficiency,
            ViewKind::CountryViews => &self.country_views.frame,
            ViewKind::Top100 => &self.top100.frame,
            ViewKind::Weekly => &self.weekly.frame,
            ViewKind::PromotedShare => &self.promoted.frame,
        }
    }

    /// Which path produced each gold-backed view.
    pub fn sources(&self) -> Vec<(ViewKind, ResolvedFrom)> {
        vec![
            (ViewKind::Momentum, self.momentum.source),
            (ViewKind::Retention, self.retention.source),
            (ViewKind::Opportunity, self.opportunity.source),
            (ViewKind::CountryViews, self.country_views.source),
            (ViewKind::Top100, self.top100.source),
            (ViewKind::Weekly, self.weekly.source),
            (ViewKind::PromotedShare, self.promoted.source),
        ]
    }
}

pub struct Dashboard<E> {
    executor: E,
}

impl<E: QueryExecutor> Dashboard<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub async fn filter_options(&self) -> FilterOptions {
        catalog::filter_options(&self.executor).await
    }

    pub async fn render(&self, filters: &FilterState) -> Snapshot {
        let render_id = Uuid::new_v4().to_string();
        let span = info_span!("render", id = %render_id, engine = self.executor.name());
        self.render_pass(render_id, filters).instrument(span).await
    }

    async fn render_pass(&self, render_id: String, filters: &FilterState) -> Snapshot {
        let started = Instant::now();
        let executor: &dyn QueryExecutor = &self.executor;
        let mut pass = Pass {
            resolver: QueryResolver::new(executor),
            warnings: Vec::new(),
        };
        let views = ViewSql::new(filters, executor.dialect());

        let kpis = Kpis::from_frame(&pass.single("kpi", &views.kpi()).await);

        let mut momentum = pass.resolve("momentum", &views.momentum()).await;
        momentum.frame = analytics::prepare_momentum(momentum.frame);
        let momentum_latest = if momentum.frame.is_empty() {
            ResultFrame::empty()
        } else {
            analytics::latest_slice(&momentum.frame, "dt")
        };

        let retention = pass.resolve("retention", &views.retention()).await;
        let new_entries = pass.single("new entries", &views.new_entries()).await;
        let opportunity = pass.resolve("opportunity", &views.opportunity()).await;

        let latest_day = pass
            .single("latest day", &views.latest_day())
            .await
            .text(0, "mx")
            .as_deref()
            .and_then(coerce_date);
        let (industry_share, industry_efficiency) = match latest_day {
            Some(day) => (
                pass.single("industry share", &views.industry_share(day)).await,
                pass.single("industry efficiency", &views.industry_efficiency(day)).await,
            ),
            None => (ResultFrame::empty(), ResultFrame::empty()),
        };
        let industry_persistence = analytics::industry_persistence(&retention.frame)
            .unwrap_or_else(|e| pass.note(format!("industry persistence: {}", e)));

        let country_columns = catalog::table_columns(executor, GOLD_COUNTRY_SUMMARY).await;
        let country_views = pass
            .resolve("country views", &views.country_views(&country_columns))
            .await;
        let top100 = pass.resolve("top 100", &views.top100()).await;
        let weekly = pass.resolve("weekly", &views.weekly()).await;

        let promoted_columns = catalog::table_columns(executor, GOLD_PROMOTED_SHARE).await;
        let promoted = pass
            .resolve("promoted share", &views.promoted_share(&promoted_columns))
            .await;
        let promoted_summary = analytics::promoted_summary(&promoted.frame)
            .unwrap_or_else(|e| pass.note(format!("promoted summary: {}", e)));

        info!(
            "render finished in {}ms with {} warnings",
            started.elapsed().as_millis(),
            pass.warnings.len()
        );

        Snapshot {
            render_id,
            filters: filters.clone(),
            kpis,
            momentum,
            momentum_latest,
            retention,
            new_entries,
            opportunity,
            latest_day,
            industry_share,
            industry_efficiency,
            industry_persistence,
            country_views,
            top100,
            weekly,
            promoted,
            promoted_summary,
            warnings: pass.warnings,
        }
    }
}

/// Resolver plus the warnings collected so far.
struct Pass<'a> {
    resolver: QueryResolver<'a>,
    warnings: Vec<String>,
}

impl<'a> Pass<'a> {
    async fn single(&mut self, label: &str, sql: &str) -> ResultFrame {
        let (frame, warning) = self.resolver.run_safe(label, sql).await;
        self.warnings.extend(warning);
        frame
    }

    async fn resolve(&mut self, label: &str, pair: &QueryPair) -> Resolution {
        let resolution = self.resolver.resolve(label, pair).await;
        self.warnings.extend(resolution.warnings.iter().cloned());
        resolution
    }

    fn note<T: Default>(&mut self, warning: String) -> T {
        warn!("{}", warning);
        self.warnings.push(warning);
        T::default()
    }
}
