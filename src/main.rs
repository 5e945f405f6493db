use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod backend;
mod config;
mod dashboard;
mod error;
mod export;
mod markup;
mod models;
mod notice;
mod pipeline;
mod prediction;
mod query;
mod recommendation;
mod report;
mod risk;

use backend::{ChurnBackend, HttpBackend};
use config::Config;
use dashboard::{DashboardView, ReportView, ViewState};
use export::{DirectorySink, ExportOutcome, ExportTrigger};
use models::{ContractType, ExportFormat, InternetService, RiskTier, SegmentType};
use prediction::PredictionWorkflow;
use query::{ApplyOutcome, FilterKey, QueryController};
use notice::Notice;
use recommendation::{
    GenerateOutcome, RecommendationMode, RecommendationWorkflow, SCENARIO_SERVICES,
};

#[derive(Parser)]
#[command(name = "churnguard-console")]
#[command(about = "Customer churn analytics console", long_about = None)]
struct Cli {
    /// Backend root, without the `/api` suffix
    #[arg(long, global = true)]
    backend_url: Option<String>,
    /// Log request lifecycle at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show headline statistics, charts and contract segments
    Dashboard,
    /// Browse customers ordered by churn probability
    Customers {
        #[arg(long)]
        risk_level: Option<String>,
        #[arg(long)]
        contract: Option<String>,
        #[arg(long)]
        internet_service: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one customer's profile
    Customer { id: String },
    /// Score an ad-hoc customer profile
    Predict {
        #[arg(long, default_value_t = 12)]
        tenure: u32,
        #[arg(long, value_enum, default_value_t = ContractArg::MonthToMonth)]
        contract: ContractArg,
        #[arg(long, value_enum, default_value_t = InternetArg::Dsl)]
        internet_service: InternetArg,
        #[arg(long, default_value_t = 50.0)]
        monthly_charges: f64,
        #[arg(long, default_value_t = 600.0)]
        total_charges: f64,
        #[arg(long)]
        senior: bool,
    },
    /// Generate a retention strategy for a customer or a scenario
    #[command(group(
        ArgGroup::new("scenario")
            .args([
                "probability_percent",
                "tenure",
                "contract",
                "internet_service",
                "monthly_charges",
                "service",
            ])
            .multiple(true)
            .conflicts_with("customer")
    ))]
    Recommend {
        /// High-risk customer id; omit to describe a scenario instead
        #[arg(long)]
        customer: Option<String>,
        #[arg(long)]
        probability_percent: Option<u8>,
        #[arg(long)]
        tenure: Option<u32>,
        #[arg(long, value_enum)]
        contract: Option<ContractArg>,
        #[arg(long, value_enum)]
        internet_service: Option<InternetArg>,
        #[arg(long)]
        monthly_charges: Option<f64>,
        /// Add-on service to include; may be repeated
        #[arg(long, value_parser = SCENARIO_SERVICES)]
        service: Vec<String>,
    },
    /// Segment breakdown with model metrics
    Report {
        #[arg(long, value_enum, default_value_t = SegmentArg::Contract)]
        segment_type: SegmentArg,
    },
    /// Download the customer list
    Export {
        #[arg(long, value_enum, default_value_t = FormatArg::Csv)]
        format: FormatArg,
        #[arg(long)]
        risk_level: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ContractArg {
    MonthToMonth,
    OneYear,
    TwoYear,
}

impl From<ContractArg> for ContractType {
    fn from(arg: ContractArg) -> Self {
        match arg {
            ContractArg::MonthToMonth => ContractType::MonthToMonth,
            ContractArg::OneYear => ContractType::OneYear,
            ContractArg::TwoYear => ContractType::TwoYear,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum InternetArg {
    Dsl,
    FiberOptic,
    No,
}

impl From<InternetArg> for InternetService {
    fn from(arg: InternetArg) -> Self {
        match arg {
            InternetArg::Dsl => InternetService::Dsl,
            InternetArg::FiberOptic => InternetService::FiberOptic,
            InternetArg::No => InternetService::No,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SegmentArg {
    Contract,
    InternetService,
    RiskLevel,
}

impl From<SegmentArg> for SegmentType {
    fn from(arg: SegmentArg) -> Self {
        match arg {
            SegmentArg::Contract => SegmentType::Contract,
            SegmentArg::InternetService => SegmentType::InternetService,
            SegmentArg::RiskLevel => SegmentType::RiskLevel,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_tier(value: Option<&str>) -> anyhow::Result<Option<RiskTier>> {
    value
        .map(|v| RiskTier::parse(v).with_context(|| format!("unknown risk level '{v}'")))
        .transpose()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::from_env(cli.backend_url)?;
    let backend = HttpBackend::new(&config).context("failed to build backend client")?;

    match cli.command {
        Commands::Dashboard => {
            let view = DashboardView::new();
            view.load(&backend).await;
            match view.state() {
                ViewState::Ready(snapshot) => {
                    print!("{}", report::build_dashboard_report(&snapshot))
                }
                ViewState::Failed(notice) => anyhow::bail!("{notice}"),
                ViewState::Loading => {}
            }
        }
        Commands::Customers {
            risk_level,
            contract,
            internet_service,
            search,
            page,
        } => {
            let controller = QueryController::new(config.page_size);
            for (key, value) in [
                (FilterKey::RiskLevel, risk_level),
                (FilterKey::Contract, contract),
                (FilterKey::InternetService, internet_service),
                (FilterKey::Search, search),
            ] {
                if let Some(value) = value {
                    controller.set_filter(key, &value);
                }
            }
            // The page bound is only known once the first page has loaded.
            refresh_listing(&controller, &backend).await?;
            controller.set_page(page);
            if controller.is_dirty() {
                refresh_listing(&controller, &backend).await?;
            }
            print!(
                "{}",
                report::render_listing(
                    &controller.customers(),
                    &controller.pagination(),
                    &controller.filters()
                )
            );
        }
        Commands::Customer { id } => {
            let customer = backend
                .get_customer(&id)
                .await
                .with_context(|| format!("failed to load customer {id}"))?;
            print!("{}", report::render_customer(&customer));
        }
        Commands::Predict {
            tenure,
            contract,
            internet_service,
            monthly_charges,
            total_charges,
            senior,
        } => {
            let workflow = PredictionWorkflow::new();
            workflow.edit(|form| {
                form.tenure = tenure;
                form.contract = contract.into();
                form.internet_service = internet_service.into();
                form.monthly_charges = monthly_charges;
                form.total_charges = total_charges;
                form.senior_citizen = u8::from(senior);
            });
            workflow
                .submit(&backend)
                .await
                .context("failed to generate prediction")?;
            print_notice(workflow.notice());
            if let (Some(result), Some(gauge)) = (workflow.result(), workflow.gauge_tier()) {
                print!("{}", report::render_prediction(&result, gauge));
            }
        }
        Commands::Recommend {
            customer,
            probability_percent,
            tenure,
            contract,
            internet_service,
            monthly_charges,
            service,
        } => {
            let workflow = RecommendationWorkflow::new();
            match customer {
                Some(id) => {
                    workflow
                        .load_candidates(&backend)
                        .await
                        .context("failed to load high-risk customers")?;
                    if !workflow.select_customer(&id) {
                        warn!(
                            customer = %id,
                            candidates = workflow.candidates().len(),
                            "not among high-risk candidates, loading directly"
                        );
                        let customer = backend
                            .get_customer(&id)
                            .await
                            .with_context(|| format!("failed to load customer {id}"))?;
                        workflow.select(customer);
                    }
                }
                None => {
                    workflow.set_mode(RecommendationMode::Scenario);
                    workflow.edit_scenario(|scenario| {
                        if let Some(percent) = probability_percent {
                            scenario.set_probability_percent(percent);
                        }
                        if let Some(tenure) = tenure {
                            scenario.tenure = tenure;
                        }
                        if let Some(contract) = contract {
                            scenario.contract = contract.into();
                        }
                        if let Some(internet_service) = internet_service {
                            scenario.internet_service = internet_service.into();
                        }
                        if let Some(monthly_charges) = monthly_charges {
                            scenario.monthly_charges = monthly_charges;
                        }
                        for name in &service {
                            scenario.toggle_service(name);
                        }
                    });
                    let scenario = workflow.scenario();
                    info!(
                        probability = scenario.churn_probability(),
                        tier = %scenario.risk_level(),
                        services = scenario.services.len(),
                        "scenario prepared"
                    );
                }
            }
            match workflow
                .generate(&backend)
                .await
                .context("failed to generate AI recommendation")?
            {
                GenerateOutcome::Ready(_) => {
                    print_notice(workflow.notice());
                    if let Some(recommendation) = workflow.result() {
                        print!("{}", report::render_recommendation(&recommendation));
                    }
                }
                GenerateOutcome::NoContext => println!("Select a customer first."),
                GenerateOutcome::Discarded => {}
            }
        }
        Commands::Report { segment_type } => {
            let view = ReportView::new();
            view.set_segment_type(segment_type.into());
            view.load(&backend).await;
            match view.state() {
                ViewState::Ready(snapshot) => {
                    print!("{}", report::build_segment_report(&snapshot))
                }
                ViewState::Failed(notice) => anyhow::bail!("{notice}"),
                ViewState::Loading => {}
            }
        }
        Commands::Export { format, risk_level } => {
            let tier = parse_tier(risk_level.as_deref())?;
            let trigger = ExportTrigger::new(DirectorySink::new(&config.export_dir));
            match trigger
                .export_customers(&backend, format.into(), tier)
                .await
                .context("failed to export data")?
            {
                ExportOutcome::Saved { path, rows } => {
                    print_notice(trigger.notice());
                    println!("Exported {rows} customers to {}.", path.display())
                }
                ExportOutcome::Records(records) => {
                    println!("{}", serde_json::to_string_pretty(&records)?)
                }
            }
        }
    }

    Ok(())
}

/// Failures are reported through the returned error, so only successes print.
fn print_notice(notice: Option<Notice>) {
    if let Some(notice) = notice.filter(|n| !n.is_error()) {
        println!("{notice}");
    }
}

async fn refresh_listing(
    controller: &QueryController,
    backend: &dyn ChurnBackend,
) -> anyhow::Result<()> {
    match controller.refresh(backend).await {
        ApplyOutcome::Failed => match controller.error() {
            Some(notice) => anyhow::bail!("{notice}"),
            None => anyhow::bail!("failed to load customers"),
        },
        ApplyOutcome::Accepted | ApplyOutcome::Superseded => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn scenario_flags_conflict_with_customer() {
        for flag in [
            ["--contract", "one-year"],
            ["--internet-service", "fiber-optic"],
            ["--tenure", "4"],
        ] {
            let args = ["churnguard-console", "recommend", "--customer", "CUST-1"]
                .into_iter()
                .chain(flag);
            assert!(Cli::try_parse_from(args).is_err(), "{flag:?} accepted");
        }
    }

    #[test]
    fn scenario_flags_parse_without_customer() {
        let cli = Cli::try_parse_from([
            "churnguard-console",
            "recommend",
            "--contract",
            "one-year",
            "--internet-service",
            "dsl",
            "--service",
            "Tech Support",
        ])
        .unwrap();
        match cli.command {
            Commands::Recommend {
                customer,
                contract,
                service,
                ..
            } => {
                assert!(customer.is_none());
                assert!(matches!(contract, Some(ContractArg::OneYear)));
                assert_eq!(service, vec!["Tech Support".to_string()]);
            }
            _ => panic!("expected recommend"),
        }
    }

    #[test]
    fn unknown_scenario_service_is_rejected() {
        let result = Cli::try_parse_from([
            "churnguard-console",
            "recommend",
            "--service",
            "Carrier Pigeon",
        ]);
        assert!(result.is_err());
    }
}
