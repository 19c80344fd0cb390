//! OpenModelica engine access: reply values, reply parser, live session and
//! the scripting expressions the driver sends.

use std::path::Path;
use std::str::FromStr;

use crate::error::{OmcError, OmcResult};

pub mod parser;
pub mod session;
pub mod value;

pub use value::Value;

/// Anything that evaluates scripting expressions and answers with a value.
pub trait Engine {
    async fn send_expression(&mut self, expr: &str) -> OmcResult<Value>;
}

/// Quote a string literal for the scripting language.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn load_model_expr(library: &str) -> String {
    format!("loadModel({library})")
}

pub fn load_file_expr(path: &Path) -> String {
    format!("loadFile({})", quote(&path.to_string_lossy()))
}

pub const GET_ERROR_STRING: &str = "getErrorString()";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Dassl,
    Euler,
    Ida,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Dassl => "dassl",
            Method::Euler => "euler",
            Method::Ida => "ida",
        }
    }
}

impl FromStr for Method {
    type Err = OmcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dassl" => Ok(Method::Dassl),
            "euler" => Ok(Method::Euler),
            "ida" => Ok(Method::Ida),
            other => Err(OmcError::Settings(format!("unknown solver algorithm '{other}'"))),
        }
    }
}

/// Keyword arguments of `simulate(...)`. Unset fields are left to the model's
/// experiment annotation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulateOptions {
    pub start_time: Option<f64>,
    pub stop_time: Option<f64>,
    pub number_of_intervals: Option<u64>,
    pub tolerance: Option<f64>,
    pub method: Option<Method>,
}

pub fn simulate_expr(model: &str, opts: &SimulateOptions) -> String {
    let mut args = vec![model.to_string()];
    if let Some(v) = opts.start_time {
        args.push(format!("startTime={}", value::format_real(v)));
    }
    if let Some(v) = opts.stop_time {
        args.push(format!("stopTime={}", value::format_real(v)));
    }
    if let Some(n) = opts.number_of_intervals {
        args.push(format!("numberOfIntervals={n}"));
    }
    if let Some(v) = opts.tolerance {
        args.push(format!("tolerance={}", value::format_real(v)));
    }
    if let Some(m) = opts.method {
        args.push(format!("method={}", quote(m.as_str())));
    }
    format!("simulate({})", args.join(", "))
}
