//! Retention recommendation workflow.
//!
//! The request context (a selected high-risk customer or a hand-built
//! scenario) is captured when the request is issued and travels with the
//! result. Switching mode drops any pending or completed result, so an
//! answer for the old context is never shown under the new one.

use std::cell::{Cell, RefCell};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::backend::ChurnBackend;
use crate::error::{ConsoleError, ConsoleResult};
use crate::markup::{self, TextSegment};
use crate::models::{
    ContractType, Customer, InternetService, RecommendationRequest, RecommendationResponse,
    RiskTier,
};
use crate::notice::Notice;
use crate::pipeline::SingleFlight;
use crate::query::{ListingParams, SORT_BY, SORT_ORDER};
use crate::risk;

pub const CANDIDATE_LIMIT: u32 = 10;

/// Add-on services that can be ticked in a scenario.
pub const SCENARIO_SERVICES: [&str; 4] = [
    "Online Security",
    "Tech Support",
    "Streaming TV",
    "Streaming Movies",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecommendationMode {
    Customer,
    Scenario,
}

/// Manually entered, non-persisted customer profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioInput {
    churn_probability: f64,
    risk_level: RiskTier,
    pub tenure: u32,
    pub contract: ContractType,
    pub monthly_charges: f64,
    pub internet_service: InternetService,
    pub services: Vec<String>,
}

impl Default for ScenarioInput {
    fn default() -> Self {
        let churn_probability = 0.65;
        Self {
            churn_probability,
            risk_level: risk::classify(churn_probability),
            tenure: 6,
            contract: ContractType::MonthToMonth,
            monthly_charges: 85.0,
            internet_service: InternetService::FiberOptic,
            services: Vec::new(),
        }
    }
}

impl ScenarioInput {
    pub fn churn_probability(&self) -> f64 {
        self.churn_probability
    }

    pub fn risk_level(&self) -> RiskTier {
        self.risk_level
    }

    /// The tier always follows the probability.
    pub fn set_probability(&mut self, probability: f64) {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        self.churn_probability = probability;
        self.risk_level = risk::classify(probability);
    }

    pub fn set_probability_percent(&mut self, percent: u8) {
        self.set_probability(risk::probability_from_percent(percent));
    }

    pub fn toggle_service(&mut self, service: &str) {
        if let Some(pos) = self.services.iter().position(|s| s == service) {
            self.services.remove(pos);
        } else {
            self.services.push(service.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomerContext {
    pub customer_id: String,
    pub churn_probability: f64,
    pub risk_level: RiskTier,
    pub tenure: u32,
    pub contract: ContractType,
    pub monthly_charges: f64,
    pub internet_service: InternetService,
    pub services: Vec<String>,
}

impl From<&Customer> for CustomerContext {
    fn from(customer: &Customer) -> Self {
        Self {
            customer_id: customer.customer_id.clone(),
            churn_probability: customer.churn_probability,
            risk_level: customer.risk_level,
            tenure: customer.tenure,
            contract: customer.contract,
            monthly_charges: customer.monthly_charges,
            internet_service: customer.internet_service,
            services: customer.active_services(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestContext {
    Customer(CustomerContext),
    Scenario(ScenarioInput),
}

impl RequestContext {
    pub fn to_request(&self) -> RecommendationRequest {
        match self {
            RequestContext::Customer(ctx) => RecommendationRequest {
                customer_id: Some(ctx.customer_id.clone()),
                churn_probability: ctx.churn_probability,
                risk_level: ctx.risk_level,
                tenure: ctx.tenure,
                contract: ctx.contract,
                monthly_charges: ctx.monthly_charges,
                internet_service: ctx.internet_service,
                services: ctx.services.clone(),
            },
            RequestContext::Scenario(input) => RecommendationRequest {
                customer_id: None,
                churn_probability: input.churn_probability,
                risk_level: input.risk_level,
                tenure: input.tenure,
                contract: input.contract,
                monthly_charges: input.monthly_charges,
                internet_service: input.internet_service,
                services: input.services.clone(),
            },
        }
    }

    pub fn label(&self) -> String {
        match self {
            RequestContext::Customer(ctx) => ctx.customer_id.clone(),
            RequestContext::Scenario(_) => "Custom scenario".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub context: RequestContext,
    pub generated_at: DateTime<Utc>,
    pub segments: Vec<TextSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GenerateOutcome {
    Ready(Recommendation),
    /// Customer mode without a selected customer.
    NoContext,
    /// The mode changed while the request was in flight.
    Discarded,
}

pub struct RecommendationWorkflow {
    mode: Cell<RecommendationMode>,
    epoch: Cell<u64>,
    candidates: RefCell<Vec<Customer>>,
    selected: RefCell<Option<Customer>>,
    scenario: RefCell<ScenarioInput>,
    flight: SingleFlight<RecommendationResponse>,
    result: RefCell<Option<Recommendation>>,
    notice: RefCell<Option<Notice>>,
}

impl Default for RecommendationWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl RecommendationWorkflow {
    pub fn new() -> Self {
        Self {
            mode: Cell::new(RecommendationMode::Customer),
            epoch: Cell::new(0),
            candidates: RefCell::new(Vec::new()),
            selected: RefCell::new(None),
            scenario: RefCell::new(ScenarioInput::default()),
            flight: SingleFlight::new("recommendation", "generate AI recommendation"),
            result: RefCell::new(None),
            notice: RefCell::new(None),
        }
    }

    /// Loads the highest-risk customers offered for selection.
    pub async fn load_candidates(&self, backend: &dyn ChurnBackend) -> ConsoleResult<usize> {
        let params = ListingParams {
            page: 1,
            limit: CANDIDATE_LIMIT,
            sort_by: SORT_BY,
            sort_order: SORT_ORDER,
            risk_level: Some(RiskTier::High.as_str().to_string()),
            contract: None,
            internet_service: None,
            search: None,
        };
        match backend.list_customers(&params).await {
            Ok(page) => {
                let count = page.customers.len();
                *self.candidates.borrow_mut() = page.customers;
                Ok(count)
            }
            Err(err) => {
                *self.notice.borrow_mut() = Some(Notice::failure("load high-risk customers", &err));
                Err(err)
            }
        }
    }

    pub fn candidates(&self) -> Vec<Customer> {
        self.candidates.borrow().clone()
    }

    /// Selects one of the loaded candidates. Returns false for unknown ids.
    pub fn select_customer(&self, customer_id: &str) -> bool {
        let found = self
            .candidates
            .borrow()
            .iter()
            .find(|c| c.customer_id == customer_id)
            .cloned();
        match found {
            Some(customer) => {
                *self.selected.borrow_mut() = Some(customer);
                true
            }
            None => false,
        }
    }

    /// Uses a customer fetched elsewhere (e.g. the detail view).
    pub fn select(&self, customer: Customer) {
        *self.selected.borrow_mut() = Some(customer);
    }

    pub fn set_mode(&self, mode: RecommendationMode) {
        if self.mode.get() == mode {
            return;
        }
        self.mode.set(mode);
        self.epoch.set(self.epoch.get() + 1);
        *self.result.borrow_mut() = None;
        self.flight.clear();
        info!(?mode, "recommendation mode switched");
    }

    pub fn edit_scenario<F: FnOnce(&mut ScenarioInput)>(&self, edit: F) {
        edit(&mut self.scenario.borrow_mut());
    }

    pub fn scenario(&self) -> ScenarioInput {
        self.scenario.borrow().clone()
    }

    pub fn current_context(&self) -> Option<RequestContext> {
        match self.mode.get() {
            RecommendationMode::Customer => self
                .selected
                .borrow()
                .as_ref()
                .map(|c| RequestContext::Customer(CustomerContext::from(c))),
            RecommendationMode::Scenario => {
                Some(RequestContext::Scenario(self.scenario.borrow().clone()))
            }
        }
    }

    /// Requests a recommendation for the current context. Calling it again
    /// with the same context regenerates.
    pub async fn generate(&self, backend: &dyn ChurnBackend) -> ConsoleResult<GenerateOutcome> {
        if self.flight.is_pending() {
            return Err(ConsoleError::Busy {
                slot: self.flight.slot(),
            });
        }
        let Some(context) = self.current_context() else {
            return Ok(GenerateOutcome::NoContext);
        };
        let epoch = self.epoch.get();
        *self.result.borrow_mut() = None;

        let request = context.to_request();
        let response = self.flight.execute(|| backend.recommend(&request)).await;

        if self.epoch.get() != epoch {
            warn!(context = %context.label(), "discarding recommendation for previous mode");
            self.flight.clear();
            return Ok(GenerateOutcome::Discarded);
        }

        match response {
            Ok(response) => {
                let recommendation = Recommendation {
                    segments: markup::segment(&response.recommendation),
                    generated_at: response.generated_at,
                    context,
                };
                *self.result.borrow_mut() = Some(recommendation.clone());
                *self.notice.borrow_mut() =
                    Some(Notice::success("AI recommendation generated successfully"));
                Ok(GenerateOutcome::Ready(recommendation))
            }
            Err(err) => {
                *self.notice.borrow_mut() = self.flight.failure();
                Err(err)
            }
        }
    }

    pub fn result(&self) -> Option<Recommendation> {
        self.result.borrow().clone()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice.borrow().clone()
    }
}
