//! Primary/fallback query resolution.
//!
//! Precomputed (gold) tables can lag behind or be empty in a fresh
//! deployment; the raw (silver) table is always current. Each view therefore
//! carries two queries: read the precomputed aggregate, and if that fails or
//! comes back empty, recompute the same view from raw rows.
//!
//! The resolver never returns an error. A failing query becomes an empty
//! frame plus a warning so one bad view cannot stop the rest of a render pass.
//! There are at most two executions per view and no retry loop.

use crate::execution::QueryExecutor;
use crate::frame::ResultFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Two queries meant to produce the same logical rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryPair {
    /// Reads the precomputed aggregate. `None` when catalog probing showed the
    /// aggregate table is missing the columns this view needs.
    pub primary: Option<String>,
    /// Recomputes the view from raw rows.
    pub fallback: String,
}

impl QueryPair {
    pub fn new(primary: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            primary: Some(primary.into()),
            fallback: fallback.into(),
        }
    }

    pub fn fallback_only(fallback: impl Into<String>) -> Self {
        Self {
            primary: None,
            fallback: fallback.into(),
        }
    }
}

/// Which query produced the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedFrom {
    Primary,
    Fallback,
    /// Both paths failed or were empty.
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub frame: ResultFrame,
    pub source: ResolvedFrom,
    pub warnings: Vec<String>,
}

pub struct QueryResolver<'a> {
    executor: &'a dyn QueryExecutor,
}

impl<'a> QueryResolver<'a> {
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        Self { executor }
    }

    /// Execute one query. Errors become an empty frame and a warning.
    pub async fn run_safe(&self, label: &str, sql: &str) -> (ResultFrame, Option<String>) {
        match self.executor.execute(sql).await {
            Ok(frame) => {
                debug!("{}: {} rows", label, frame.row_count());
                (frame.normalize(), None)
            }
            Err(e) => {
                let warning = format!("SQL error in {}: {}", label, e);
                warn!("{}", warning);
                (ResultFrame::empty(), Some(warning))
            }
        }
    }

    /// Primary first; fallback only when the primary errored or had no rows.
    pub async fn resolve(&self, label: &str, pair: &QueryPair) -> Resolution {
        let mut warnings = Vec::new();

        if let Some(primary) = &pair.primary {
            let (frame, warning) = self.run_safe(&format!("{} (precomputed)", label), primary).await;
            warnings.extend(warning);
            if !frame.is_empty() {
                return Resolution {
                    frame,
                    source: ResolvedFrom::Primary,
                    warnings,
                };
            }
            info!("{}: precomputed result empty, recomputing from raw rows", label);
        }

        let (frame, warning) = self.run_safe(&format!("{} (recomputed)", label), &pair.fallback).await;
        warnings.extend(warning);
        let source = if frame.is_empty() {
            ResolvedFrom::Nothing
        } else {
            ResolvedFrom::Fallback
        };
        Resolution {
            frame,
            source,
            warnings,
        }
    }
}
