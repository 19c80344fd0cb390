//! The run itself: load libraries and files, simulate, pull out the summary.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{OmcError, OmcResult};
use crate::omc::{self, Engine, Value};

pub mod plan;

pub use plan::RunPlan;

/// The three result fields the downstream harness consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub result_file: String,
    pub messages: String,
    pub time_total: Value,
}

/// Issue the load commands in order, then simulate. Nothing is printed here.
pub async fn execute<E: Engine>(engine: &mut E, plan: &RunPlan) -> OmcResult<SimulationSummary> {
    for library in &plan.libraries {
        load(engine, omc::load_model_expr(library), plan.strict).await?;
    }
    for package in &plan.packages {
        load(engine, omc::load_file_expr(package), plan.strict).await?;
    }
    load(engine, omc::load_file_expr(&plan.model_file), plan.strict).await?;

    info!(model = %plan.model, "simulating");
    let result = engine
        .send_expression(&omc::simulate_expr(&plan.model, &plan.simulate))
        .await?;
    summarize(&result)
}

async fn load<E: Engine>(engine: &mut E, command: String, strict: bool) -> OmcResult<()> {
    let reply = engine.send_expression(&command).await?;
    if reply.as_bool() != Some(false) {
        return Ok(());
    }
    let details = match engine.send_expression(omc::GET_ERROR_STRING).await? {
        Value::String(s) => s.trim().to_string(),
        _ => String::new(),
    };
    if strict {
        return Err(OmcError::LoadFailed { command, details });
    }
    warn!(%command, "returned false: {details}");
    Ok(())
}

/// Extract `resultFile`, `messages` and `timeTotal` from a simulate reply.
pub fn summarize(result: &Value) -> OmcResult<SimulationSummary> {
    let field = |name: &'static str| result.get(name).ok_or(OmcError::MissingField(name));
    let string_field = |name: &'static str| -> OmcResult<String> {
        let v = field(name)?;
        v.as_str().map(str::to_string).ok_or(OmcError::FieldType {
            field: name,
            expected: "a string",
            found: v.kind(),
        })
    };

    let result_file = string_field("resultFile")?;
    let messages = string_field("messages")?;
    let time_total = field("timeTotal")?;
    if !time_total.is_numeric() {
        return Err(OmcError::FieldType {
            field: "timeTotal",
            expected: "a number",
            found: time_total.kind(),
        });
    }
    Ok(SimulationSummary { result_file, messages, time_total: time_total.clone() })
}
