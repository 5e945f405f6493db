//! Client for the churn analytics backend.
//!
//! Every component talks to the backend through [`ChurnBackend`], so the
//! orchestration logic can be driven by an in-memory fake in tests.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{ConsoleError, ConsoleResult};
use crate::models::{
    ChargeBucket, Customer, CustomerPage, DashboardStats, ExportFormat, ExportPayload,
    ModelMetrics, PredictionRequest, PredictionResult, RecommendationRequest,
    RecommendationResponse, RiskTier, SegmentList, SegmentType, TenureBucket,
};
use crate::query::ListingParams;

#[async_trait(?Send)]
pub trait ChurnBackend {
    async fn dashboard_stats(&self) -> ConsoleResult<DashboardStats>;
    async fn list_customers(&self, params: &ListingParams) -> ConsoleResult<CustomerPage>;
    async fn get_customer(&self, id: &str) -> ConsoleResult<Customer>;
    async fn predict(&self, request: &PredictionRequest) -> ConsoleResult<PredictionResult>;
    async fn segments(&self, segment_type: SegmentType) -> ConsoleResult<SegmentList>;
    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> ConsoleResult<RecommendationResponse>;
    async fn tenure_churn_chart(&self) -> ConsoleResult<Vec<TenureBucket>>;
    async fn charges_distribution_chart(&self) -> ConsoleResult<Vec<ChargeBucket>>;
    async fn model_metrics(&self) -> ConsoleResult<ModelMetrics>;
    async fn export_customers(
        &self,
        format: ExportFormat,
        risk_level: Option<RiskTier>,
    ) -> ConsoleResult<ExportPayload>;
}

const NO_QUERY: &[(&str, &str)] = &[];

/// HTTP/JSON implementation against the `/api` routes.
pub struct HttpBackend {
    http: Client,
    api_base: String,
}

#[derive(Serialize)]
struct SegmentQuery<'a> {
    segment_type: &'a str,
}

#[derive(Serialize)]
struct ExportQuery<'a> {
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    risk_level: Option<&'a str>,
}

#[derive(Deserialize)]
struct JsonExport {
    data: Vec<serde_json::Value>,
}

impl HttpBackend {
    pub fn new(config: &Config) -> ConsoleResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            api_base: config.api_base(),
        })
    }

    async fn get<T, Q>(&self, path: &str, query: &Q) -> ConsoleResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let bytes = self.get_bytes(path, query).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_bytes<Q>(&self, path: &str, query: &Q) -> ConsoleResult<Vec<u8>>
    where
        Q: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.api_base, path);
        debug!(%url, "GET");
        let response = self.http.get(&url).query(query).send().await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> ConsoleResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.api_base, path);
        debug!(%url, "POST");
        let response = self.http.post(&url).json(body).send().await?;
        let response = check_status(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn check_status(response: reqwest::Response) -> ConsoleResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ConsoleError::from_status(status.as_u16(), body))
}

#[async_trait(?Send)]
impl ChurnBackend for HttpBackend {
    async fn dashboard_stats(&self) -> ConsoleResult<DashboardStats> {
        self.get("/dashboard/stats", NO_QUERY).await
    }

    async fn list_customers(&self, params: &ListingParams) -> ConsoleResult<CustomerPage> {
        self.get("/customers", params).await
    }

    async fn get_customer(&self, id: &str) -> ConsoleResult<Customer> {
        let path = customer_path(id);
        match self.get(&path, NO_QUERY).await {
            Err(ConsoleError::Rejected { status, .. })
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Err(ConsoleError::NotFound { id: id.to_string() })
            }
            other => other,
        }
    }

    async fn predict(&self, request: &PredictionRequest) -> ConsoleResult<PredictionResult> {
        self.post("/predict", request).await
    }

    async fn segments(&self, segment_type: SegmentType) -> ConsoleResult<SegmentList> {
        let query = SegmentQuery {
            segment_type: segment_type.as_str(),
        };
        self.get("/segments", &query).await
    }

    async fn recommend(
        &self,
        request: &RecommendationRequest,
    ) -> ConsoleResult<RecommendationResponse> {
        self.post("/ai-recommendations", request).await
    }

    async fn tenure_churn_chart(&self) -> ConsoleResult<Vec<TenureBucket>> {
        self.get("/charts/tenure-churn", NO_QUERY).await
    }

    async fn charges_distribution_chart(&self) -> ConsoleResult<Vec<ChargeBucket>> {
        self.get("/charts/monthly-charges-distribution", NO_QUERY).await
    }

    async fn model_metrics(&self) -> ConsoleResult<ModelMetrics> {
        self.get("/model/metrics", NO_QUERY).await
    }

    async fn export_customers(
        &self,
        format: ExportFormat,
        risk_level: Option<RiskTier>,
    ) -> ConsoleResult<ExportPayload> {
        let query = ExportQuery {
            format: format.as_str(),
            risk_level: risk_level.as_ref().map(RiskTier::as_str),
        };
        match format {
            ExportFormat::Csv => Ok(ExportPayload::Csv(
                self.get_bytes("/export/customers", &query).await?,
            )),
            ExportFormat::Json => {
                let export: JsonExport = self.get("/export/customers", &query).await?;
                Ok(ExportPayload::Json(export.data))
            }
        }
    }
}

fn customer_path(id: &str) -> String {
    format!("/customers/{}", urlencoding::encode(id))
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::cell::{Cell, RefCell};
    use std::collections::{BTreeMap, HashSet, VecDeque};

    use chrono::{TimeZone, Utc};
    use tokio::sync::oneshot;

    use super::*;
    use crate::risk;

    pub(crate) fn customer_json(id: &str, probability: f64, tier: &str) -> serde_json::Value {
        serde_json::json!({
            "customerID": id,
            "gender": "Female",
            "SeniorCitizen": 0,
            "Partner": "Yes",
            "Dependents": "No",
            "tenure": 8,
            "PhoneService": "Yes",
            "MultipleLines": "Yes",
            "InternetService": "Fiber optic",
            "OnlineSecurity": "No",
            "OnlineBackup": "No",
            "DeviceProtection": "Yes",
            "TechSupport": "Yes",
            "StreamingTV": "Yes",
            "StreamingMovies": "No internet service",
            "Contract": "Month-to-month",
            "PaperlessBilling": "Yes",
            "PaymentMethod": "Electronic check",
            "MonthlyCharges": 99.65,
            "TotalCharges": 820.5,
            "churn_probability": probability,
            "risk_level": tier,
            "clv": 797.2,
            "Churn": "Yes"
        })
    }

    pub(crate) fn customer(id: &str, probability: f64) -> Customer {
        let tier = risk::classify(probability);
        serde_json::from_value(customer_json(id, probability, tier.as_str()))
            .expect("fixture customer decodes")
    }

    pub(crate) fn stats() -> DashboardStats {
        DashboardStats {
            total_customers: 237,
            churned_customers: 61,
            retained_customers: 176,
            churn_rate: 25.74,
            retention_rate: 74.26,
            high_risk_customers: 40,
            medium_risk_customers: 77,
            low_risk_customers: 120,
            total_mrr: 15_402.5,
            avg_mrr: 64.99,
            total_clv: 502_113.0,
            avg_clv: 2118.62,
            avg_tenure: 32.6,
            model_metrics: BTreeMap::from([
                ("accuracy".to_string(), 0.81),
                ("roc_auc".to_string(), 0.86),
            ]),
        }
    }

    /// Scripted backend. Customers are filtered and paged the way the real
    /// service does it; individual endpoints can be made to fail or to wait
    /// on a gate before answering.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub customers: Vec<Customer>,
        pub recommendation_text: String,
        pub failing: RefCell<HashSet<&'static str>>,
        pub calls: RefCell<Vec<&'static str>>,
        pub listing_params: RefCell<Vec<ListingParams>>,
        pub listing_gates: RefCell<VecDeque<Option<oneshot::Receiver<()>>>>,
        pub recommend_requests: RefCell<Vec<RecommendationRequest>>,
        pub recommend_gate: RefCell<Option<oneshot::Receiver<()>>>,
        pub predict_gate: RefCell<Option<oneshot::Receiver<()>>>,
        pub segments_gate: RefCell<Option<oneshot::Receiver<()>>>,
        pub predictions: Cell<u32>,
    }

    impl FakeBackend {
        pub(crate) fn with_customers(customers: Vec<Customer>) -> Self {
            Self {
                customers,
                recommendation_text: "**Risk Assessment**\nShort tenure.".to_string(),
                ..Default::default()
            }
        }

        pub(crate) fn fail(&self, endpoint: &'static str) {
            self.failing.borrow_mut().insert(endpoint);
        }

        /// Queues one gate per upcoming listing call; `false` answers at once.
        pub(crate) fn gate_listings(&self, gated: &[bool]) -> Vec<oneshot::Sender<()>> {
            let mut senders = Vec::new();
            let mut gates = self.listing_gates.borrow_mut();
            for &is_gated in gated {
                if is_gated {
                    let (tx, rx) = oneshot::channel();
                    senders.push(tx);
                    gates.push_back(Some(rx));
                } else {
                    gates.push_back(None);
                }
            }
            senders
        }

        pub(crate) fn gate_recommend(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            *self.recommend_gate.borrow_mut() = Some(rx);
            tx
        }

        pub(crate) fn gate_predict(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            *self.predict_gate.borrow_mut() = Some(rx);
            tx
        }

        pub(crate) fn gate_segments(&self) -> oneshot::Sender<()> {
            let (tx, rx) = oneshot::channel();
            *self.segments_gate.borrow_mut() = Some(rx);
            tx
        }

        pub(crate) fn call_count(&self, endpoint: &str) -> usize {
            self.calls.borrow().iter().filter(|c| **c == endpoint).count()
        }

        fn enter(&self, endpoint: &'static str) -> ConsoleResult<()> {
            self.calls.borrow_mut().push(endpoint);
            if self.failing.borrow().contains(endpoint) {
                return Err(ConsoleError::Server {
                    status: 500,
                    body: format!("{endpoint} unavailable"),
                });
            }
            Ok(())
        }

        fn matching(&self, risk_level: Option<&str>) -> Vec<Customer> {
            self.customers
                .iter()
                .filter(|c| risk_level.map_or(true, |r| c.risk_level.as_str() == r))
                .cloned()
                .collect()
        }
    }

    #[async_trait(?Send)]
    impl ChurnBackend for FakeBackend {
        async fn dashboard_stats(&self) -> ConsoleResult<DashboardStats> {
            self.enter("stats")?;
            Ok(stats())
        }

        async fn list_customers(&self, params: &ListingParams) -> ConsoleResult<CustomerPage> {
            self.enter("customers")?;
            self.listing_params.borrow_mut().push(params.clone());
            let gate = self.listing_gates.borrow_mut().pop_front().flatten();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            let mut rows: Vec<Customer> = self
                .matching(params.risk_level.as_deref())
                .into_iter()
                .filter(|c| {
                    params
                        .contract
                        .as_deref()
                        .map_or(true, |v| c.contract.as_str() == v)
                })
                .filter(|c| {
                    params
                        .internet_service
                        .as_deref()
                        .map_or(true, |v| c.internet_service.as_str() == v)
                })
                .filter(|c| {
                    params.search.as_deref().map_or(true, |s| {
                        c.customer_id.to_lowercase().contains(&s.to_lowercase())
                    })
                })
                .collect();
            rows.sort_by(|a, b| {
                b.churn_probability
                    .partial_cmp(&a.churn_probability)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let total = rows.len() as u64;
            let limit = params.limit.max(1) as usize;
            let start = (params.page.max(1) as usize - 1) * limit;
            let customers = rows.into_iter().skip(start).take(limit).collect();
            Ok(CustomerPage {
                customers,
                total,
                total_pages: total.div_ceil(limit as u64) as u32,
            })
        }

        async fn get_customer(&self, id: &str) -> ConsoleResult<Customer> {
            self.enter("customer")?;
            self.customers
                .iter()
                .find(|c| c.customer_id == id)
                .cloned()
                .ok_or_else(|| ConsoleError::NotFound { id: id.to_string() })
        }

        async fn predict(&self, request: &PredictionRequest) -> ConsoleResult<PredictionResult> {
            self.enter("predict")?;
            let gate = self.predict_gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            self.predictions.set(self.predictions.get() + 1);
            let probability = if request.tenure < 12 { 0.82 } else { 0.31 };
            Ok(PredictionResult {
                churn_probability: probability,
                churn_prediction: probability >= 0.5,
                risk_level: risk::classify(probability),
            })
        }

        async fn segments(&self, segment_type: SegmentType) -> ConsoleResult<SegmentList> {
            self.enter("segments")?;
            let gate = self.segments_gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            let names: &[&str] = match segment_type {
                SegmentType::Contract => &["Month-to-month", "One year", "Two year"],
                SegmentType::InternetService => &["DSL", "Fiber optic", "No"],
                SegmentType::RiskLevel => &["Low", "Medium", "High"],
            };
            Ok(SegmentList {
                segments: names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| crate::models::SegmentSummary {
                        segment_name: name.to_string(),
                        total_customers: 100 + i as u64,
                        churn_rate: 42.0 / (i as f64 + 1.0),
                        avg_clv: 1000.0 * (i as f64 + 1.0),
                        avg_monthly_charges: None,
                        avg_tenure: None,
                    })
                    .collect(),
            })
        }

        async fn recommend(
            &self,
            request: &RecommendationRequest,
        ) -> ConsoleResult<RecommendationResponse> {
            self.enter("recommend")?;
            self.recommend_requests.borrow_mut().push(request.clone());
            let gate = self.recommend_gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(RecommendationResponse {
                recommendation: self.recommendation_text.clone(),
                generated_at: Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap(),
            })
        }

        async fn tenure_churn_chart(&self) -> ConsoleResult<Vec<TenureBucket>> {
            self.enter("tenure")?;
            Ok(vec![
                TenureBucket {
                    tenure_bucket: "0-12".to_string(),
                    customers: 80,
                    avg_churn_prob: 48.2,
                    actual_churn_rate: 47.7,
                },
                TenureBucket {
                    tenure_bucket: "13-24".to_string(),
                    customers: 41,
                    avg_churn_prob: 29.1,
                    actual_churn_rate: 28.5,
                },
            ])
        }

        async fn charges_distribution_chart(&self) -> ConsoleResult<Vec<ChargeBucket>> {
            self.enter("charges")?;
            Ok(vec![ChargeBucket {
                charges_bucket: "$70-90".to_string(),
                retained: 30,
                churned: 12,
            }])
        }

        async fn model_metrics(&self) -> ConsoleResult<ModelMetrics> {
            self.enter("metrics")?;
            Ok(ModelMetrics {
                metrics: BTreeMap::from([
                    ("accuracy".to_string(), 0.81),
                    ("precision".to_string(), 0.67),
                ]),
                feature_importance: BTreeMap::from([
                    ("Contract".to_string(), 0.31),
                    ("tenure".to_string(), 0.18),
                ]),
            })
        }

        async fn export_customers(
            &self,
            format: ExportFormat,
            risk_level: Option<RiskTier>,
        ) -> ConsoleResult<ExportPayload> {
            self.enter("export")?;
            let rows = self.matching(risk_level.as_ref().map(RiskTier::as_str));
            match format {
                ExportFormat::Csv => {
                    let mut body = String::from("customerID,churn_probability,risk_level\n");
                    for row in &rows {
                        body.push_str(&format!(
                            "{},{},{}\n",
                            row.customer_id, row.churn_probability, row.risk_level
                        ));
                    }
                    Ok(ExportPayload::Csv(body.into_bytes()))
                }
                ExportFormat::Json => Ok(ExportPayload::Json(
                    rows.iter()
                        .map(|c| serde_json::json!({ "customerID": c.customer_id }))
                        .collect(),
                )),
            }
        }
    }
}
