//! Filter, sort and pagination state for the customer listing.
//!
//! Every refresh is tagged with a sequence number when it is issued. A
//! response is applied only if its tag is still the latest one issued, so a
//! slow reply for an older filter/page combination can never overwrite
//! newer results.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::backend::ChurnBackend;
use crate::error::ConsoleResult;
use crate::models::{Customer, CustomerPage};
use crate::notice::Notice;

/// Value the filter dropdowns use for "no constraint".
pub const ALL_SENTINEL: &str = "all";
pub const SORT_BY: &str = "churn_probability";
pub const SORT_ORDER: &str = "desc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKey {
    RiskLevel,
    Contract,
    InternetService,
    Search,
}

impl FilterKey {
    pub fn param_name(&self) -> &'static str {
        match self {
            FilterKey::RiskLevel => "risk_level",
            FilterKey::Contract => "contract",
            FilterKey::InternetService => "internet_service",
            FilterKey::Search => "search",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    values: BTreeMap<FilterKey, String>,
}

impl FilterSet {
    /// Stores a normalized value; returns whether the set changed.
    pub fn set(&mut self, key: FilterKey, value: &str) -> bool {
        match normalize(key, value) {
            Some(value) => self.values.insert(key, value.clone()) != Some(value),
            None => self.values.remove(&key).is_some(),
        }
    }

    pub fn get(&self, key: FilterKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterKey, &str)> + '_ {
        self.values.iter().map(|(key, value)| (*key, value.as_str()))
    }
}

fn normalize(key: FilterKey, value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL_SENTINEL) {
        return None;
    }
    match key {
        FilterKey::Search => Some(value.to_string()),
        _ => Some(trimmed.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    /// Only ever taken from the latest accepted response.
    pub total: u64,
}

impl Pagination {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
        }
    }

    pub fn total_pages(&self) -> u32 {
        let pages = self.total.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX).max(1)
    }

    pub fn clamp(&self, page: u32) -> u32 {
        page.clamp(1, self.total_pages())
    }

    /// 1-based inclusive row range shown on the current page, `None` when
    /// the page holds no rows.
    pub fn displayed_range(&self) -> Option<(u64, u64)> {
        let size = u64::from(self.page_size);
        let start = (u64::from(self.page) - 1) * size + 1;
        let end = (u64::from(self.page) * size).min(self.total);
        if start > end {
            None
        } else {
            Some((start, end))
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }
}

/// Query string of one listing request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingParams {
    pub page: u32,
    pub limit: u32,
    pub sort_by: &'static str,
    pub sort_order: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internet_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl ListingParams {
    pub fn from_state(filters: &FilterSet, pagination: &Pagination) -> Self {
        let owned = |key| filters.get(key).map(str::to_string);
        Self {
            page: pagination.page,
            limit: pagination.page_size,
            sort_by: SORT_BY,
            sort_order: SORT_ORDER,
            risk_level: owned(FilterKey::RiskLevel),
            contract: owned(FilterKey::Contract),
            internet_service: owned(FilterKey::InternetService),
            search: owned(FilterKey::Search),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingTicket {
    pub seq: u64,
    pub params: ListingParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Accepted,
    Failed,
    /// A newer request was issued after this one; the response was dropped.
    Superseded,
}

#[derive(Debug, Clone)]
struct ListingState {
    filters: FilterSet,
    pagination: Pagination,
    customers: Vec<Customer>,
    dirty: bool,
    error: Option<Notice>,
}

pub struct QueryController {
    state: RefCell<ListingState>,
    issued: Cell<u64>,
}

impl QueryController {
    pub fn new(page_size: u32) -> Self {
        Self {
            state: RefCell::new(ListingState {
                filters: FilterSet::default(),
                pagination: Pagination::new(page_size),
                customers: Vec::new(),
                dirty: true,
                error: None,
            }),
            issued: Cell::new(0),
        }
    }

    pub fn set_filter(&self, key: FilterKey, value: &str) {
        let mut state = self.state.borrow_mut();
        state.filters.set(key, value);
        state.pagination.page = 1;
        state.dirty = true;
        debug!(filter = key.param_name(), value, "filter changed");
    }

    /// Moves to page `n`, clamped to the known page count. Returns the page
    /// actually selected.
    pub fn set_page(&self, n: u32) -> u32 {
        let mut state = self.state.borrow_mut();
        let page = state.pagination.clamp(n);
        if page != n {
            debug!(requested = n, page, "page clamped");
        }
        if page != state.pagination.page {
            state.pagination.page = page;
            state.dirty = true;
        }
        page
    }

    /// Tags a new listing request with the next sequence number.
    pub fn issue(&self) -> ListingTicket {
        let seq = self.issued.get() + 1;
        self.issued.set(seq);
        let mut state = self.state.borrow_mut();
        state.dirty = false;
        let params = ListingParams::from_state(&state.filters, &state.pagination);
        debug!(seq, page = params.page, "listing request issued");
        ListingTicket { seq, params }
    }

    pub fn apply(&self, seq: u64, result: ConsoleResult<CustomerPage>) -> ApplyOutcome {
        if seq != self.issued.get() {
            warn!(seq, latest = self.issued.get(), "discarding superseded listing response");
            return ApplyOutcome::Superseded;
        }
        let mut state = self.state.borrow_mut();
        match result {
            Ok(page) => {
                info!(
                    seq,
                    rows = page.customers.len(),
                    total = page.total,
                    "listing response accepted"
                );
                state.customers = page.customers;
                state.pagination.total = page.total;
                if page.total_pages != state.pagination.total_pages() {
                    debug!(
                        reported = page.total_pages,
                        derived = state.pagination.total_pages(),
                        "page count differs from backend"
                    );
                }
                state.error = None;
                ApplyOutcome::Accepted
            }
            Err(err) => {
                state.error = Some(Notice::failure("load customers", &err));
                ApplyOutcome::Failed
            }
        }
    }

    pub async fn refresh(&self, backend: &dyn ChurnBackend) -> ApplyOutcome {
        let ticket = self.issue();
        let result = backend.list_customers(&ticket.params).await;
        self.apply(ticket.seq, result)
    }

    pub fn customers(&self) -> Vec<Customer> {
        self.state.borrow().customers.clone()
    }

    pub fn pagination(&self) -> Pagination {
        self.state.borrow().pagination
    }

    pub fn filters(&self) -> FilterSet {
        self.state.borrow().filters.clone()
    }

    pub fn error(&self) -> Option<Notice> {
        self.state.borrow().error.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.borrow().dirty
    }
}
