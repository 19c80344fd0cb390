//! Printers: `@`-delimited summary and JSON.

use std::io::{self, Write};

use clap::ValueEnum;

use crate::driver::SimulationSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `<resultFile>@<messages>@<timeTotal>`, no trailing newline.
    Delimited,
    /// One JSON object per run.
    Json,
}

pub struct SummaryPrinter {
    pub format: OutputFormat,
}

impl SummaryPrinter {
    pub fn print(&self, summary: &SimulationSummary) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write(summary, &mut out)?;
        out.flush()
    }

    pub fn write<W: Write>(&self, summary: &SimulationSummary, out: &mut W) -> io::Result<()> {
        match self.format {
            OutputFormat::Delimited => write!(
                out,
                "{}@{}@{}",
                summary.result_file, summary.messages, summary.time_total
            ),
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, summary)?;
                writeln!(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::omc::Value;

    fn summary(time_total: Value) -> SimulationSummary {
        SimulationSummary {
            result_file: "C:/work/systest_res.mat".into(),
            messages: "LOG_SUCCESS | info | The simulation finished successfully.\n".into(),
            time_total,
        }
    }

    fn render(format: OutputFormat, s: &SimulationSummary) -> String {
        let mut buf = Vec::new();
        SummaryPrinter { format }.write(s, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn delimited_is_byte_exact() {
        let out = render(OutputFormat::Delimited, &summary(Value::Real(3.66)));
        assert_eq!(
            out,
            "C:/work/systest_res.mat@LOG_SUCCESS | info | The simulation finished successfully.\n@3.66"
        );
        assert!(!out.ends_with('\n'));
    }

    #[test]
    fn delimited_whole_seconds_keep_fraction() {
        let out = render(OutputFormat::Delimited, &summary(Value::Real(2.0)));
        assert!(out.ends_with("@2.0"), "{out}");
    }

    #[test]
    fn empty_fields_still_delimited() {
        let s = SimulationSummary {
            result_file: String::new(),
            messages: String::new(),
            time_total: Value::Real(0.01),
        };
        assert_eq!(render(OutputFormat::Delimited, &s), "@@0.01");
    }

    #[test]
    fn json_object_with_newline() {
        let out = render(OutputFormat::Json, &summary(Value::Real(0.5)));
        assert!(out.ends_with("}\n"));
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["resultFile"], "C:/work/systest_res.mat");
        assert_eq!(v["timeTotal"], 0.5);
    }
}
