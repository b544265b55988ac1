//! Subcommand dispatch and response envelopes.

use crate::cli::{Command, GenerateArgs, GroupArgs, IngestArgs, TextArgs};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{parse_timestamp, MetricRecord, NameMap};
use crate::narrative::backend::TextBackend;
use crate::narrative::{GroupMode, PlanMode, PlanNarrativeOptions};
use crate::service::MetricsService;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// Machine-readable failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Uniform response printed for every command.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    pub fn ok<T: Serialize>(data: &T, warnings: Vec<String>) -> Result<Self> {
        Ok(Self {
            success: true,
            data: Some(serde_json::to_value(data).context("Failed to serialize response")?),
            warnings: if warnings.is_empty() { None } else { Some(warnings) },
            error: None,
        })
    }

    pub fn failure(err: &ServiceError) -> Self {
        Self {
            success: false,
            data: None,
            warnings: None,
            error: Some(ErrorBody {
                code: err.code(),
                message: err.to_string(),
            }),
        }
    }

    fn from_result<T: Serialize>(result: ServiceResult<T>, warnings: Vec<String>) -> Result<Self> {
        match result {
            Ok(data) => Self::ok(&data, warnings),
            Err(err) => Ok(Self::failure(&err)),
        }
    }
}

/// Run one data command. `InitConfig` is handled before a service exists.
pub async fn dispatch<B: TextBackend>(service: &MetricsService<B>, command: Command) -> Result<Envelope> {
    match command {
        Command::Ingest(args) => {
            let result = ingest_record(&args).and_then(|record| service.ingest(record));
            Envelope::from_result(result, Vec::new())
        }
        Command::Report { plan_id } => Envelope::from_result(service.report(plan_id), Vec::new()),
        Command::Text(args) => plan_text(service, &args).await,
        Command::Group(args) => group(service, &args).await,
        Command::Generate(GenerateArgs { prompt, system }) => {
            Envelope::from_result(service.generate(&system, &prompt).await, Vec::new())
        }
        Command::InitConfig => anyhow::bail!("init-config does not take a data service"),
    }
}

fn ingest_record(args: &IngestArgs) -> ServiceResult<MetricRecord> {
    let created_at = match args.created_at.as_deref() {
        Some(raw) => Some(parse_timestamp(raw).ok_or_else(|| {
            ServiceError::InvalidRecord(format!("created_at '{}' is not an RFC 3339 timestamp", raw))
        })?),
        None => None,
    };

    Ok(MetricRecord {
        plan_id: args.plan_id,
        member_id: args.member_id,
        distance_km: args.distance_km,
        travel_minutes: args.travel_minutes,
        late_minutes: args.late_minutes,
        wait_minutes: args.wait_minutes,
        created_at,
    })
}

async fn plan_text<B: TextBackend>(service: &MetricsService<B>, args: &TextArgs) -> Result<Envelope> {
    let names = match args.names {
        Some(ref path) => load_names(path)?,
        None => NameMap::default(),
    };

    let options = PlanNarrativeOptions {
        mode: PlanMode::resolve(&args.mode),
        style: args.style.clone(),
        notes: args.notes.clone(),
        seed: args.seed,
        names,
    };

    Envelope::from_result(service.plan_text(args.plan_id, &options).await, Vec::new())
}

async fn group<B: TextBackend>(service: &MetricsService<B>, args: &GroupArgs) -> Result<Envelope> {
    if !args.text {
        return match service.group_summary(&args.plan_ids) {
            Ok(report) => Envelope::ok(&report.summary, report.warnings),
            Err(err) => Ok(Envelope::failure(&err)),
        };
    }

    let mode = GroupMode::resolve(&args.mode);
    match service
        .group_text(&args.plan_ids, mode, &args.style, &args.notes)
        .await
    {
        Ok((data, warnings)) => Envelope::ok(&data, warnings),
        Err(err) => Ok(Envelope::failure(&err)),
    }
}

/// Read a JSON object of member id to display name.
pub fn load_names(path: &Path) -> Result<NameMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read names file: {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse names file: {}", path.display()))?;
    let obj = value
        .as_object()
        .with_context(|| format!("Names file must hold a JSON object: {}", path.display()))?;
    Ok(NameMap::from_json_object(obj))
}
