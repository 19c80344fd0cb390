use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::from_sources(default_config_path(), env::vars())
    }

    /// Defaults, then the rc file, then matching environment variables.
    fn from_sources(config_path: PathBuf, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut map = default_map();

        // Read .omsimrc if exists
        map.extend(read_rc_file(&config_path));

        // Overlay environment variables (take precedence)
        for (k, v) in vars {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path }
    }

    /// Empty values, from the rc file or the environment, count as unset.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).filter(|v| !v.is_empty()).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }
}

fn read_rc_file(path: &Path) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Ok(file) = fs::File::open(path) else {
        return map;
    };
    for line in BufReader::new(file).lines().map_while(Result::ok) {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            map.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    map
}

fn is_config_key(k: &str) -> bool {
    // Accept known keys or OMSIM_* for forward-compat
    const KEYS: &[&str] = &[
        "OMC_PATH",
        "OMC_STARTUP_TIMEOUT",
        "STANDARD_LIBRARY",
        "PACKAGE_FILE",
        "MODEL_NAME",
        "MODEL_FILE",
        "WORK_DIR",
        "STRICT_LOADS",
    ];

    KEYS.contains(&k) || k.starts_with("OMSIM_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("omsim").join(".omsimrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Numbers
    m.insert("OMC_STARTUP_TIMEOUT".into(), "10".into());

    // Strings
    m.insert("STANDARD_LIBRARY".into(), "Modelica".into());
    m.insert("MODEL_NAME".into(), "systest".into());

    // Bools as strings
    m.insert("STRICT_LOADS".into(), "false".into());

    m
}

#[cfg(test)]
impl Config {
    /// Defaults plus the given entries, without touching the rc file.
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        let mut inner = default_map();
        for (k, v) in entries {
            inner.insert(k.to_string(), v.to_string());
        }
        Self { inner, config_path: PathBuf::from(".omsimrc") }
    }
}
