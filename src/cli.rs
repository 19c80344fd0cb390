use std::path::PathBuf;

use clap::Parser;

use crate::printer::OutputFormat;

#[derive(Parser, Debug, Clone)]
#[command(name = "omsim", about = "Load models into OpenModelica, simulate one, report the result", version)]
pub struct Cli {
    /// Model to simulate (default: MODEL_NAME, "systest").
    #[arg(value_name = "MODEL")]
    pub model: Option<String>,

    /// Working directory for the run; relative model paths resolve against it.
    #[arg(short = 'C', long)]
    pub workdir: Option<PathBuf>,

    /// Library to load with loadModel before anything else.
    /// Can be used multiple times (default: STANDARD_LIBRARY, "Modelica").
    #[arg(short = 'l', long = "library", action = clap::ArgAction::Append)]
    pub libraries: Vec<String>,

    /// Package file to load with loadFile.
    /// Can be used multiple times: --package Buildings/package.mo --package Lib/package.mo
    #[arg(short = 'p', long = "package", action = clap::ArgAction::Append)]
    pub packages: Vec<PathBuf>,

    /// File containing the model (default: MODEL_FILE, or ../<MODEL>.mo).
    #[arg(short = 'f', long = "model-file")]
    pub model_file: Option<PathBuf>,

    /// JSON simulation settings (startTime, stopTime, interval, tolerance, algorithm).
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Path to the omc executable.
    #[arg(long)]
    pub omc: Option<PathBuf>,

    /// Output format for the simulation summary.
    #[arg(long, value_enum, default_value_t = OutputFormat::Delimited)]
    pub format: OutputFormat,

    /// Fail when a load command returns false.
    #[arg(long)]
    pub strict: bool,

    /// Debug logging on stderr.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
