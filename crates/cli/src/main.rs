use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use api_shared::{ClinCalcContribution, ClinCalcPreventRequest, MdCalcAssessment, MdCalcPreventRequest};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use prevent_core::{
    build_payloads, core_config_from_env_values, Aggregator, AssessmentSession, AssessmentView,
    ClinicalProfile, FileSnapshotStore, InMemoryStore, Intake, IntakeStore, PatientProfile,
    ProfileStore, RiskCalculator, Sex,
};
use prevent_providers::{
    http_client, ChartDataTableExtractor, ClinCalcClient, ContributionExtractor, GatewayClient,
    HiddenFields, MdCalcClient,
};

#[derive(Parser)]
#[command(name = "prevent")]
#[command(about = "PREVENT cardiovascular risk assessment CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one assessment against both calculators
    Assess(AssessArgs),
    /// Run the contribution extractor on a saved ClinCalc results page
    Scrape {
        /// Path to the saved HTML page
        file: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SexArg {
    Male,
    Female,
}

impl From<SexArg> for Sex {
    fn from(value: SexArg) -> Self {
        match value {
            SexArg::Male => Sex::Male,
            SexArg::Female => Sex::Female,
        }
    }
}

#[derive(Args, Debug)]
struct AssessArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    /// Sex at birth
    #[arg(long, value_enum)]
    sex: SexArg,
    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    dob: String,
    /// Total cholesterol (mg/dL)
    #[arg(long)]
    total_cholesterol: f64,
    /// HDL cholesterol (mg/dL)
    #[arg(long)]
    hdl: f64,
    /// Systolic blood pressure (mmHg)
    #[arg(long)]
    sbp: f64,
    #[arg(long)]
    bmi: f64,
    /// eGFR (mL/min/1.73m²)
    #[arg(long)]
    egfr: f64,
    #[arg(long)]
    diabetes: bool,
    #[arg(long)]
    smoker: bool,
    /// Taking anti-hypertensive medication
    #[arg(long)]
    antihypertensive: bool,
    #[arg(long)]
    statin: bool,
    /// Identity the snapshot is recorded under
    #[arg(long, default_value = "local")]
    patient_id: String,
    /// Snapshot directory (defaults to ASSESSMENT_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Print the provider payloads without calling anything
    #[arg(long)]
    dry_run: bool,
    /// Base URL of a running PREVENT gateway to call instead of the calculators
    #[arg(long)]
    gateway: Option<String>,
    /// API key for the gateway
    #[arg(long, env = "API_KEY")]
    api_key: Option<String>,
    /// Print the full assessment view as JSON
    #[arg(long)]
    json: bool,
}

impl AssessArgs {
    fn records(&self) -> (PatientProfile, Intake) {
        let profile = PatientProfile {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            sex_at_birth: self.sex.into(),
            date_of_birth: self.dob.clone(),
        };
        let intake = Intake {
            total_cholesterol: self.total_cholesterol,
            hdl_cholesterol: self.hdl,
            systolic_bp: self.sbp,
            bmi: self.bmi,
            egfr: self.egfr,
            is_diabetes: self.diabetes,
            is_smoker: self.smoker,
            is_taking_antihypertensive: self.antihypertensive,
            is_taking_statin: self.statin,
        };
        (profile, intake)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("prevent=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Assess(args)) => assess(args).await?,
        Some(Commands::Scrape { file }) => scrape(&file)?,
        None => {
            println!("Use 'prevent --help' for commands");
        }
    }

    Ok(())
}

async fn assess(args: AssessArgs) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    let (profile, intake) = args.records();

    if args.dry_run {
        println!("{}", dry_run_report(&profile, &intake, today)?);
        return Ok(());
    }

    let cfg = core_config_from_env_values(
        std::env::var("MDCALC_URL").ok(),
        std::env::var("CLINCALC_URL").ok(),
        std::env::var("ASSESSMENT_DATA_DIR").ok(),
    )?;
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| cfg.assessment_data_dir().to_path_buf());

    let records = InMemoryStore::new();
    records
        .upsert_profile(&args.patient_id, profile, today)
        .context("Invalid profile")?;
    records
        .upsert_intake(&args.patient_id, intake)
        .context("Invalid intake")?;

    let http = http_client()?;
    let snapshots = Arc::new(FileSnapshotStore::new(&data_dir));
    let view = match &args.gateway {
        Some(url) => {
            let mut client = GatewayClient::new(http, url.as_str());
            if let Some(key) = &args.api_key {
                client = client.with_api_key(key.as_str());
            }
            let (mdcalc, clincalc) = client.split();
            let mut session =
                AssessmentSession::new(&args.patient_id, Aggregator::new(mdcalc, clincalc), snapshots);
            run_session(&mut session, &records, today).await?
        }
        None => {
            let mdcalc = MdCalcClient::new(http.clone(), cfg.mdcalc_url());
            let clincalc = ClinCalcClient::new(http, cfg.clincalc_url());
            let mut session =
                AssessmentSession::new(&args.patient_id, Aggregator::new(mdcalc, clincalc), snapshots);
            run_session(&mut session, &records, today).await?
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print!("{}", render_view(&view));
        if view.snapshot_recorded {
            println!("Snapshot recorded under {}", data_dir.join(&args.patient_id).display());
        }
    }
    Ok(())
}

async fn run_session<A, B>(
    session: &mut AssessmentSession<A, B>,
    records: &InMemoryStore,
    today: NaiveDate,
) -> anyhow::Result<AssessmentView>
where
    A: RiskCalculator<Request = MdCalcPreventRequest, Output = MdCalcAssessment>,
    B: RiskCalculator<Request = ClinCalcPreventRequest, Output = Vec<ClinCalcContribution>>,
{
    Ok(session.assess_from_stores(records, records, today).await?)
}

/// Validates the records and prints both payloads as JSON.
fn dry_run_report(
    profile: &PatientProfile,
    intake: &Intake,
    today: NaiveDate,
) -> anyhow::Result<String> {
    profile.validate(today).context("Invalid profile")?;
    intake.validate().context("Invalid intake")?;

    let clinical = ClinicalProfile::from_records(Some(profile), Some(intake), today);
    clinical.check_complete()?;
    let payloads = build_payloads(&clinical).context("Profile is incomplete")?;

    let report = serde_json::json!({
        "age": clinical.age,
        "mdcalc": payloads.mdcalc,
        "clincalc": payloads.clincalc,
    });
    Ok(serde_json::to_string_pretty(&report)?)
}

fn render_view(view: &AssessmentView) -> String {
    let mut out = String::new();
    let summary = &view.summary;

    out.push_str(&format!("Status: {:?}\n", view.status));
    if let Some(age) = view.age {
        out.push_str(&format!("Age: {age}\n"));
    }
    out.push_str(&format!(
        "10-year total CVD risk: {} ({})\n",
        summary.absolute_risk_display,
        summary.category.label()
    ));
    out.push_str(&format!("  {}\n", summary.category_description));
    for level in &summary.levels {
        let marker = if level.active { ">" } else { " " };
        out.push_str(&format!("  {marker} {:<14} {}\n", level.label, level.range));
    }

    if view.mdcalc.is_some() {
        out.push_str("Events:\n");
        for event in &summary.events {
            out.push_str(&format!("  {:<24} {}\n", event.label, event.value));
        }
    }

    if !summary.risk_factors.is_empty() {
        out.push_str("Top risk factors:\n");
        for factor in &summary.risk_factors {
            out.push_str(&format!("  {:<24} {}\n", factor.label, factor.delta));
        }
    }

    if let Some(notice) = &view.notice {
        out.push_str(&format!("{}: {}\n", notice.title, notice.description));
        for message in &notice.messages {
            out.push_str(&format!("  - {message}\n"));
        }
    }
    out
}

fn scrape(file: &std::path::Path) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    match HiddenFields::from_html(&html) {
        Ok(_) => println!("Hidden form fields: present"),
        Err(e) => println!("Hidden form fields: {e}"),
    }

    let contributions = ChartDataTableExtractor.extract(&html)?;
    println!("{}", serde_json::to_string_pretty(&contributions)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prevent_core::{AssessmentStatus, RiskSummary};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date")
    }

    fn args(extra: &[&str]) -> AssessArgs {
        let mut argv = vec![
            "prevent", "assess", "--first-name", "Alan", "--last-name", "Turing", "--sex", "male",
            "--dob", "1962-06-23", "--total-cholesterol", "210", "--hdl", "45", "--sbp", "138",
            "--bmi", "27.1", "--egfr", "84", "--smoker",
        ];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).expect("valid arguments").command {
            Some(Commands::Assess(args)) => args,
            _ => panic!("expected assess command"),
        }
    }

    #[test]
    fn test_assess_flags_build_records() {
        let (profile, intake) = args(&["--statin"]).records();
        assert_eq!(profile.sex_at_birth, Sex::Male);
        assert!(intake.is_smoker);
        assert!(intake.is_taking_statin);
        assert!(!intake.is_diabetes);
    }

    #[test]
    fn test_dry_run_prints_both_payloads() {
        let (profile, intake) = args(&[]).records();
        let report = dry_run_report(&profile, &intake, today()).expect("valid records");
        let json: serde_json::Value = serde_json::from_str(&report).expect("json report");

        assert_eq!(json["age"], 64);
        assert_eq!(json["mdcalc"]["sex"], 1);
        assert_eq!(json["mdcalc"]["smoker"], 1);
        assert_eq!(json["clincalc"]["gender"], "male");
    }

    #[test]
    fn test_dry_run_rejects_out_of_range_intake() {
        let (profile, mut intake) = args(&[]).records();
        intake.hdl_cholesterol = 150.0;
        let err = dry_run_report(&profile, &intake, today()).expect_err("hdl out of range");
        assert!(format!("{err:#}").contains("HDL cholesterol must be between 20 and 100"));
    }

    #[test]
    fn test_render_view_lists_notice_messages() {
        let view = AssessmentView {
            status: AssessmentStatus::Error,
            missing_data: false,
            age: Some(64),
            errors: vec!["MdCalc is unreachable right now.".into()],
            notice: None,
            mdcalc_payload: None,
            clincalc_payload: None,
            mdcalc: None,
            clincalc: None,
            summary: RiskSummary::from_results(None, None),
            snapshot_recorded: true,
        };
        let text = render_view(&view);
        assert!(text.contains("Status: Error"));
        assert!(text.contains("N/A"));
        assert!(!text.contains("Events:"));
        assert!(text.contains("    Borderline     5-7.5%"));
        assert!(!text.contains("  > "));
    }
}
