use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Medium => "Medium",
            RiskTier::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskTier::Low),
            "medium" => Some(RiskTier::Medium),
            "high" => Some(RiskTier::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractType {
    #[serde(rename = "Month-to-month")]
    MonthToMonth,
    #[serde(rename = "One year")]
    OneYear,
    #[serde(rename = "Two year")]
    TwoYear,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractType::MonthToMonth => "Month-to-month",
            ContractType::OneYear => "One year",
            ContractType::TwoYear => "Two year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InternetService {
    #[serde(rename = "DSL")]
    Dsl,
    #[serde(rename = "Fiber optic")]
    FiberOptic,
    No,
}

impl InternetService {
    pub fn as_str(&self) -> &'static str {
        match self {
            InternetService::Dsl => "DSL",
            InternetService::FiberOptic => "Fiber optic",
            InternetService::No => "No",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "Electronic check")]
    ElectronicCheck,
    #[serde(rename = "Mailed check")]
    MailedCheck,
    #[serde(rename = "Bank transfer (automatic)")]
    BankTransfer,
    #[serde(rename = "Credit card (automatic)")]
    CreditCard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum YesNo {
    Yes,
    No,
}

/// Add-on service column. The dependent variants only appear when the
/// underlying phone or internet line is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceFlag {
    Yes,
    No,
    #[serde(rename = "No internet service")]
    NoInternetService,
    #[serde(rename = "No phone service")]
    NoPhoneService,
}

impl ServiceFlag {
    pub fn is_active(&self) -> bool {
        matches!(self, ServiceFlag::Yes)
    }
}

/// Historical churn label, present only for records the backend trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChurnLabel {
    Yes,
    No,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "customerID")]
    pub customer_id: String,
    pub gender: String,
    #[serde(rename = "SeniorCitizen")]
    pub senior_citizen: u8,
    #[serde(rename = "Partner")]
    pub partner: YesNo,
    #[serde(rename = "Dependents")]
    pub dependents: YesNo,
    pub tenure: u32,
    #[serde(rename = "PhoneService")]
    pub phone_service: YesNo,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: ServiceFlag,
    #[serde(rename = "InternetService")]
    pub internet_service: InternetService,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: ServiceFlag,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: ServiceFlag,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: ServiceFlag,
    #[serde(rename = "TechSupport")]
    pub tech_support: ServiceFlag,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: ServiceFlag,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: ServiceFlag,
    #[serde(rename = "Contract")]
    pub contract: ContractType,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: YesNo,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges")]
    pub total_charges: f64,
    pub churn_probability: f64,
    pub risk_level: RiskTier,
    pub clv: f64,
    #[serde(rename = "Churn", default)]
    pub churn: Option<ChurnLabel>,
}

impl Customer {
    /// Human-readable names of the add-on services the customer pays for.
    pub fn active_services(&self) -> Vec<String> {
        [
            (self.online_security, "Online Security"),
            (self.tech_support, "Tech Support"),
            (self.streaming_tv, "Streaming TV"),
            (self.streaming_movies, "Streaming Movies"),
        ]
        .iter()
        .filter(|(flag, _)| flag.is_active())
        .map(|(_, name)| name.to_string())
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CustomerPage {
    pub customers: Vec<Customer>,
    pub total: u64,
    pub total_pages: u32,
}

/// Full attribute set accepted by the prediction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub gender: String,
    #[serde(rename = "SeniorCitizen")]
    pub senior_citizen: u8,
    #[serde(rename = "Partner")]
    pub partner: YesNo,
    #[serde(rename = "Dependents")]
    pub dependents: YesNo,
    pub tenure: u32,
    #[serde(rename = "PhoneService")]
    pub phone_service: YesNo,
    #[serde(rename = "MultipleLines")]
    pub multiple_lines: ServiceFlag,
    #[serde(rename = "InternetService")]
    pub internet_service: InternetService,
    #[serde(rename = "OnlineSecurity")]
    pub online_security: ServiceFlag,
    #[serde(rename = "OnlineBackup")]
    pub online_backup: ServiceFlag,
    #[serde(rename = "DeviceProtection")]
    pub device_protection: ServiceFlag,
    #[serde(rename = "TechSupport")]
    pub tech_support: ServiceFlag,
    #[serde(rename = "StreamingTV")]
    pub streaming_tv: ServiceFlag,
    #[serde(rename = "StreamingMovies")]
    pub streaming_movies: ServiceFlag,
    #[serde(rename = "Contract")]
    pub contract: ContractType,
    #[serde(rename = "PaperlessBilling")]
    pub paperless_billing: YesNo,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "MonthlyCharges")]
    pub monthly_charges: f64,
    #[serde(rename = "TotalCharges")]
    pub total_charges: f64,
}

impl Default for PredictionRequest {
    fn default() -> Self {
        Self {
            gender: "Male".to_string(),
            senior_citizen: 0,
            partner: YesNo::No,
            dependents: YesNo::No,
            tenure: 12,
            phone_service: YesNo::Yes,
            multiple_lines: ServiceFlag::No,
            internet_service: InternetService::Dsl,
            online_security: ServiceFlag::No,
            online_backup: ServiceFlag::No,
            device_protection: ServiceFlag::No,
            tech_support: ServiceFlag::No,
            streaming_tv: ServiceFlag::No,
            streaming_movies: ServiceFlag::No,
            contract: ContractType::MonthToMonth,
            paperless_billing: YesNo::Yes,
            payment_method: PaymentMethod::ElectronicCheck,
            monthly_charges: 50.0,
            total_charges: 600.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictionResult {
    pub churn_probability: f64,
    pub churn_prediction: bool,
    pub risk_level: RiskTier,
}

/// Body of the recommendation endpoint, built from either a customer or a scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub churn_probability: f64,
    pub risk_level: RiskTier,
    pub tenure: u32,
    pub contract: ContractType,
    pub monthly_charges: f64,
    pub internet_service: InternetService,
    pub services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecommendationResponse {
    pub recommendation: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentType {
    Contract,
    InternetService,
    RiskLevel,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Contract => "Contract",
            SegmentType::InternetService => "InternetService",
            SegmentType::RiskLevel => "RiskLevel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentSummary {
    pub segment_name: String,
    pub total_customers: u64,
    pub churn_rate: f64,
    pub avg_clv: f64,
    #[serde(default)]
    pub avg_monthly_charges: Option<f64>,
    #[serde(default)]
    pub avg_tenure: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentList {
    pub segments: Vec<SegmentSummary>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DashboardStats {
    pub total_customers: u64,
    pub churned_customers: u64,
    #[serde(default)]
    pub retained_customers: u64,
    pub churn_rate: f64,
    #[serde(default)]
    pub retention_rate: f64,
    pub high_risk_customers: u64,
    pub medium_risk_customers: u64,
    pub low_risk_customers: u64,
    pub total_mrr: f64,
    pub avg_mrr: f64,
    #[serde(default)]
    pub total_clv: f64,
    pub avg_clv: f64,
    #[serde(default)]
    pub avg_tenure: f64,
    #[serde(default)]
    pub model_metrics: BTreeMap<String, f64>,
}

impl DashboardStats {
    pub fn risk_distribution(&self) -> [(RiskTier, u64); 3] {
        [
            (RiskTier::Low, self.low_risk_customers),
            (RiskTier::Medium, self.medium_risk_customers),
            (RiskTier::High, self.high_risk_customers),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TenureBucket {
    pub tenure_bucket: String,
    pub customers: u64,
    pub avg_churn_prob: f64,
    pub actual_churn_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChargeBucket {
    pub charges_bucket: String,
    pub retained: u64,
    pub churned: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelMetrics {
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub feature_importance: BTreeMap<String, f64>,
}

impl ModelMetrics {
    /// Feature importances, highest first.
    pub fn ranked_features(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .feature_importance
            .iter()
            .map(|(name, weight)| (name.as_str(), *weight))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TierSummary {
    pub tier: RiskTier,
    pub count: usize,
    pub avg_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportPayload {
    Csv(Vec<u8>),
    Json(Vec<serde_json::Value>),
}
