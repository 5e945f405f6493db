use std::cell::RefCell;

use crate::backend::ChurnBackend;
use crate::error::ConsoleResult;
use crate::models::{PredictionRequest, PredictionResult, RiskTier};
use crate::notice::Notice;
use crate::pipeline::SingleFlight;
use crate::risk;

/// Form plus single-flight submission for ad-hoc churn predictions.
pub struct PredictionWorkflow {
    form: RefCell<PredictionRequest>,
    flight: SingleFlight<PredictionResult>,
    notice: RefCell<Option<Notice>>,
}

impl Default for PredictionWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionWorkflow {
    pub fn new() -> Self {
        Self {
            form: RefCell::new(PredictionRequest::default()),
            flight: SingleFlight::new("prediction", "generate prediction"),
            notice: RefCell::new(None),
        }
    }

    pub fn edit<F: FnOnce(&mut PredictionRequest)>(&self, edit: F) {
        edit(&mut self.form.borrow_mut());
    }

    pub fn form(&self) -> PredictionRequest {
        self.form.borrow().clone()
    }

    pub async fn submit(&self, backend: &dyn ChurnBackend) -> ConsoleResult<PredictionResult> {
        let request = self.form();
        let result = self.flight.execute(|| backend.predict(&request)).await;
        let notice = match &result {
            Ok(_) => Some(Notice::success("Prediction completed successfully")),
            Err(_) => self.flight.failure(),
        };
        if notice.is_some() {
            *self.notice.borrow_mut() = notice;
        }
        result
    }

    pub fn result(&self) -> Option<PredictionResult> {
        self.flight.success()
    }

    /// Tier shown on the gauge, derived locally from the returned probability.
    pub fn gauge_tier(&self) -> Option<RiskTier> {
        self.result().map(|r| risk::classify(r.churn_probability))
    }

    pub fn notice(&self) -> Option<Notice> {
        self.notice.borrow().clone()
    }
}
