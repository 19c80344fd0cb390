//! Resolving a run from the command line and config.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::cli::Cli;
use crate::config::Config;
use crate::omc::SimulateOptions;
use crate::settings::SimulationSettings;

/// Everything the driver needs to know, fully resolved.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub workdir: Option<PathBuf>,
    pub libraries: Vec<String>,
    pub packages: Vec<PathBuf>,
    pub model_file: PathBuf,
    pub model: String,
    pub simulate: SimulateOptions,
    pub strict: bool,
}

impl RunPlan {
    /// CLI overrides config; config falls back to built-in defaults.
    pub fn resolve(args: &Cli, cfg: &Config) -> Result<Self> {
        let model = args
            .model
            .clone()
            .or_else(|| cfg.get("MODEL_NAME"))
            .unwrap_or_else(|| "systest".to_string());
        check_name(&model, "model")?;

        let libraries = if args.libraries.is_empty() {
            vec![cfg.get("STANDARD_LIBRARY").unwrap_or_else(|| "Modelica".to_string())]
        } else {
            args.libraries.clone()
        };
        for lib in &libraries {
            check_name(lib, "library")?;
        }

        let packages = if args.packages.is_empty() {
            cfg.get_path("PACKAGE_FILE").into_iter().collect::<Vec<_>>()
        } else {
            args.packages.clone()
        };
        if packages.is_empty() {
            bail!("no package file given; pass --package or set PACKAGE_FILE");
        }

        let model_file = args
            .model_file
            .clone()
            .or_else(|| cfg.get_path("MODEL_FILE"))
            .unwrap_or_else(|| default_model_file(&model));

        let simulate = match &args.settings {
            Some(path) => {
                let settings = SimulationSettings::load(path)?;
                if let Some(info) = settings.info.as_deref().filter(|i| !i.is_empty()) {
                    debug!(%info, settings = %path.display(), "simulation settings");
                }
                settings.to_options()?
            }
            None => SimulateOptions::default(),
        };

        Ok(Self {
            workdir: args.workdir.clone().or_else(|| cfg.get_path("WORK_DIR")),
            libraries,
            packages,
            model_file,
            model,
            simulate,
            strict: args.strict || cfg.get_bool("STRICT_LOADS"),
        })
    }

    /// Change into the working directory, if one is set.
    pub fn enter_workdir(&self) -> Result<()> {
        if let Some(dir) = &self.workdir {
            env::set_current_dir(dir)
                .with_context(|| format!("cannot change into working directory {}", dir.display()))?;
        }
        Ok(())
    }

    /// Every file handed to loadFile must exist relative to the current directory.
    pub fn check_files(&self) -> Result<()> {
        let packages = self.packages.iter().map(|p| ("package file", p));
        for (what, path) in packages.chain(std::iter::once(("model file", &self.model_file))) {
            if !path.is_file() {
                bail!("{what} '{}' does not exist", path.display());
            }
        }
        Ok(())
    }
}

/// The test model sits next to the working directory: `../<model>.mo`.
fn default_model_file(model: &str) -> PathBuf {
    let last = model.rsplit('.').next().unwrap_or(model);
    Path::new("..").join(format!("{last}.mo"))
}

/// Names are spliced into expressions unquoted, so only dotted identifiers pass.
fn check_name(name: &str, what: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if !valid {
        bail!("invalid {what} name '{name}'");
    }
    Ok(())
}
