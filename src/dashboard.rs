//! All-or-nothing loading of the dashboard and report views.
//!
//! Each view issues its reads concurrently and only becomes ready once all
//! of them succeed. One failure fails the whole view; partial snapshots are
//! never exposed. Nothing is cached between loads.

use std::cell::RefCell;

use tracing::info;

use crate::backend::ChurnBackend;
use crate::error::ConsoleResult;
use crate::models::{
    ChargeBucket, DashboardStats, ModelMetrics, SegmentSummary, SegmentType, TenureBucket,
};
use crate::notice::Notice;

pub const DASHBOARD_SEGMENT: SegmentType = SegmentType::Contract;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading,
    Ready(T),
    Failed(Notice),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub stats: DashboardStats,
    pub tenure_churn: Vec<TenureBucket>,
    pub charges_distribution: Vec<ChargeBucket>,
    pub segment_type: SegmentType,
    pub segments: Vec<SegmentSummary>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportSnapshot {
    pub stats: DashboardStats,
    pub model: ModelMetrics,
    pub segment_type: SegmentType,
    pub segments: Vec<SegmentSummary>,
}

pub async fn fetch_dashboard(
    backend: &dyn ChurnBackend,
    segment_type: SegmentType,
) -> ConsoleResult<DashboardSnapshot> {
    let (stats, tenure_churn, charges_distribution, segments) = tokio::try_join!(
        backend.dashboard_stats(),
        backend.tenure_churn_chart(),
        backend.charges_distribution_chart(),
        backend.segments(segment_type),
    )?;
    Ok(DashboardSnapshot {
        stats,
        tenure_churn,
        charges_distribution,
        segment_type,
        segments: segments.segments,
    })
}

pub async fn fetch_report(
    backend: &dyn ChurnBackend,
    segment_type: SegmentType,
) -> ConsoleResult<ReportSnapshot> {
    let (segments, model, stats) = tokio::try_join!(
        backend.segments(segment_type),
        backend.model_metrics(),
        backend.dashboard_stats(),
    )?;
    Ok(ReportSnapshot {
        stats,
        model,
        segment_type,
        segments: segments.segments,
    })
}

pub struct DashboardView {
    state: RefCell<ViewState<DashboardSnapshot>>,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardView {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(ViewState::Loading),
        }
    }

    /// Fetches a fresh snapshot; called on every mount.
    pub async fn load(&self, backend: &dyn ChurnBackend) -> ViewState<DashboardSnapshot> {
        *self.state.borrow_mut() = ViewState::Loading;
        let next = match fetch_dashboard(backend, DASHBOARD_SEGMENT).await {
            Ok(snapshot) => {
                info!(customers = snapshot.stats.total_customers, "dashboard ready");
                ViewState::Ready(snapshot)
            }
            Err(err) => ViewState::Failed(Notice::failure("load dashboard data", &err)),
        };
        *self.state.borrow_mut() = next.clone();
        next
    }

    pub fn state(&self) -> ViewState<DashboardSnapshot> {
        self.state.borrow().clone()
    }
}

pub struct ReportView {
    segment_type: RefCell<SegmentType>,
    state: RefCell<ViewState<ReportSnapshot>>,
}

impl Default for ReportView {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportView {
    pub fn new() -> Self {
        Self {
            segment_type: RefCell::new(SegmentType::Contract),
            state: RefCell::new(ViewState::Loading),
        }
    }

    pub fn set_segment_type(&self, segment_type: SegmentType) {
        *self.segment_type.borrow_mut() = segment_type;
    }

    pub async fn load(&self, backend: &dyn ChurnBackend) -> ViewState<ReportSnapshot> {
        let segment_type = *self.segment_type.borrow();
        *self.state.borrow_mut() = ViewState::Loading;
        let next = match fetch_report(backend, segment_type).await {
            Ok(snapshot) => ViewState::Ready(snapshot),
            Err(err) => ViewState::Failed(Notice::failure("load report data", &err)),
        };
        // A load for a segment type that was changed meanwhile is left to the
        // load that the change triggers.
        if *self.segment_type.borrow() == segment_type {
            *self.state.borrow_mut() = next.clone();
        }
        next
    }

    pub fn state(&self) -> ViewState<ReportSnapshot> {
        self.state.borrow().clone()
    }
}
