//! Engine process bootstrap and ZeroMQ request/reply glue.

use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use rand::{distributions::Alphanumeric, Rng};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};
use zeromq::{ReqSocket, Socket, SocketRecv, SocketSend};

use crate::config::Config;
use crate::error::{OmcError, OmcResult};

use super::{parser::parse_reply, Engine, Value};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const QUIT_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub program: PathBuf,
    pub startup_timeout: Duration,
    /// Where the engine writes its port file and where its log goes.
    pub temp_dir: PathBuf,
}

impl SessionOptions {
    /// Resolve the engine executable: explicit override, then `OMC_PATH`, then
    /// `$OPENMODELICAHOME/bin/omc`, then `omc` on `PATH`.
    pub fn from_config(cfg: &Config, program_override: Option<&Path>) -> Self {
        let program = program_override
            .map(Path::to_path_buf)
            .or_else(|| cfg.get_path("OMC_PATH"))
            .or_else(|| {
                env::var_os("OPENMODELICAHOME")
                    .map(|home| PathBuf::from(home).join("bin").join(omc_binary_name()))
            })
            .unwrap_or_else(|| PathBuf::from(omc_binary_name()));
        let startup_timeout = Duration::from_secs(startup_timeout_secs(cfg));
        Self { program, startup_timeout, temp_dir: env::temp_dir() }
    }
}

fn startup_timeout_secs(cfg: &Config) -> u64 {
    match cfg.get("OMC_STARTUP_TIMEOUT") {
        None => DEFAULT_STARTUP_TIMEOUT_SECS,
        Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
            warn!("OMC_STARTUP_TIMEOUT={raw:?} is not a whole number of seconds; using {DEFAULT_STARTUP_TIMEOUT_SECS}");
            DEFAULT_STARTUP_TIMEOUT_SECS
        }),
    }
}

fn omc_binary_name() -> &'static str {
    if cfg!(windows) {
        "omc.exe"
    } else {
        "omc"
    }
}

/// Live connection to a running engine process.
pub struct OmcSession {
    child: Child,
    socket: ReqSocket,
    port_file: PathBuf,
}

impl OmcSession {
    pub async fn start(opts: &SessionOptions) -> OmcResult<Self> {
        let suffix = random_suffix();
        let tmp = &opts.temp_dir;
        let user = current_user();
        let port_file = port_file_path(tmp, &user, &suffix);
        let log_file = tmp.join(format!("openmodelica.{user}.objid.{suffix}.log"));

        // Engine chatter goes to the log file; stdout belongs to the result.
        let log = File::create(&log_file)?;
        let log_err = log.try_clone()?;

        let mut cmd = Command::new(&opts.program);
        cmd.arg("--interactive=zmq")
            .arg("--locale=C")
            .arg(format!("-z={suffix}"))
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .kill_on_drop(true);

        info!(program = %opts.program.display(), log = %log_file.display(), "starting engine");
        let mut child = cmd.spawn().map_err(|source| OmcError::Spawn {
            program: opts.program.display().to_string(),
            source,
        })?;

        let endpoint = wait_for_endpoint(&port_file, &log_file, opts.startup_timeout, || {
            Ok(child.try_wait()?.map(|status| format!("engine exited early ({status})")))
        })
        .await?;

        let mut socket = ReqSocket::new();
        socket.connect(&endpoint).await?;
        info!(%endpoint, "connected to engine");

        Ok(Self { child, socket, port_file })
    }

    /// Ask the engine to exit and reap it. Failures here only get logged.
    pub async fn quit(mut self) {
        debug!("-> quit()");
        if let Err(e) = self.socket.send("quit()".to_string().into()).await {
            warn!("could not send quit(): {e}");
        }
        match tokio::time::timeout(QUIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => info!(%status, "engine exited"),
            Ok(Err(e)) => warn!("waiting for engine failed: {e}"),
            Err(_) => {
                warn!("engine still running after quit(); killing it");
                if let Err(e) = self.child.kill().await {
                    warn!("could not kill engine: {e}");
                }
            }
        }
        let _ = std::fs::remove_file(&self.port_file);
    }
}

impl Engine for OmcSession {
    async fn send_expression(&mut self, expr: &str) -> OmcResult<Value> {
        debug!("-> {expr}");
        self.socket.send(expr.to_string().into()).await?;
        let reply = self.socket.recv().await?;
        let text: String = reply
            .into_vec()
            .iter()
            .map(|frame| String::from_utf8_lossy(frame).into_owned())
            .collect();
        debug!("<- {}", text.trim_end());
        parse_reply(&text)
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

fn current_user() -> String {
    ["LOGNAME", "USER", "LNAME", "USERNAME"]
        .iter()
        .find_map(|k| env::var(k).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "nobody".to_string())
}

/// Where the engine publishes its endpoint for a given `-z` suffix.
pub fn port_file_path(tmp: &Path, user: &str, suffix: &str) -> PathBuf {
    if cfg!(windows) {
        tmp.join(format!("openmodelica.port.{suffix}"))
    } else {
        tmp.join(format!("openmodelica.{user}.port.{suffix}"))
    }
}

/// Poll `port_file` until it holds an endpoint. `exited` reports why the
/// engine can no longer write it, if it has gone away.
pub async fn wait_for_endpoint<F>(
    port_file: &Path,
    log_file: &Path,
    timeout: Duration,
    mut exited: F,
) -> OmcResult<String>
where
    F: FnMut() -> OmcResult<Option<String>>,
{
    let started = Instant::now();
    let startup_error = |reason: String| OmcError::Startup {
        port_file: port_file.to_path_buf(),
        log_file: log_file.to_path_buf(),
        reason,
    };
    loop {
        if let Ok(text) = tokio::fs::read_to_string(port_file).await {
            let endpoint = text.trim();
            if !endpoint.is_empty() {
                return Ok(endpoint.to_string());
            }
        }
        if let Some(reason) = exited()? {
            return Err(startup_error(reason));
        }
        if started.elapsed() >= timeout {
            return Err(startup_error(format!("timed out after {}s", timeout.as_secs_f64())));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_file_naming() {
        let p = port_file_path(Path::new("/tmp"), "ian", "abc123");
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        if cfg!(windows) {
            assert_eq!(name, "openmodelica.port.abc123");
        } else {
            assert_eq!(name, "openmodelica.ian.port.abc123");
        }
    }

    #[test]
    fn suffix_is_alphanumeric() {
        let s = random_suffix();
        assert_eq!(s.len(), 16);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(s, random_suffix());
    }

    #[tokio::test]
    async fn endpoint_is_read_once_published() {
        let dir = tempfile::tempdir().unwrap();
        let port_file = dir.path().join("openmodelica.t.port.x");
        let log_file = dir.path().join("log");
        let writer_path = port_file.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            tokio::fs::write(writer_path, "tcp://127.0.0.1:41234\n").await.unwrap();
        });
        let endpoint = wait_for_endpoint(&port_file, &log_file, Duration::from_secs(5), || Ok(None))
            .await
            .unwrap();
        assert_eq!(endpoint, "tcp://127.0.0.1:41234");
    }

    #[tokio::test]
    async fn startup_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let port_file = dir.path().join("never");
        let err = wait_for_endpoint(&port_file, Path::new("log"), Duration::from_millis(250), || Ok(None))
            .await
            .unwrap_err();
        match err {
            OmcError::Startup { port_file: p, reason, .. } => {
                assert_eq!(p, port_file);
                assert!(reason.contains("timed out"), "{reason}");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn early_exit_stops_the_wait() {
        let dir = tempfile::tempdir().unwrap();
        let port_file = dir.path().join("never");
        let err = wait_for_endpoint(&port_file, Path::new("log"), Duration::from_secs(30), || {
            Ok(Some("engine exited early (exit status: 1)".to_string()))
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("exited early"));
    }

    #[tokio::test]
    async fn missing_executable_is_a_spawn_error() {
        let opts = SessionOptions {
            program: PathBuf::from("/nonexistent/omsim-test/omc"),
            startup_timeout: Duration::from_secs(1),
            temp_dir: env::temp_dir(),
        };
        match OmcSession::start(&opts).await {
            Err(OmcError::Spawn { program, .. }) => assert!(program.contains("nonexistent")),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("engine should not start"),
        }
    }

    #[test]
    fn startup_timeout_from_config() {
        let set = Config::with_entries(&[("OMC_STARTUP_TIMEOUT", "25")]);
        assert_eq!(SessionOptions::from_config(&set, None).startup_timeout, Duration::from_secs(25));
        let bad = Config::with_entries(&[("OMC_STARTUP_TIMEOUT", "soon")]);
        assert_eq!(
            SessionOptions::from_config(&bad, None).startup_timeout,
            Duration::from_secs(DEFAULT_STARTUP_TIMEOUT_SECS)
        );
    }

    #[test]
    fn explicit_program_wins() {
        let cfg = Config::with_entries(&[("OMC_PATH", "/opt/omc/bin/omc")]);
        assert_eq!(SessionOptions::from_config(&cfg, None).program, PathBuf::from("/opt/omc/bin/omc"));
        let opts = SessionOptions::from_config(&cfg, Some(Path::new("/usr/local/bin/omc")));
        assert_eq!(opts.program, PathBuf::from("/usr/local/bin/omc"));
    }

    const SIM_RECORD: &str = "record SimulationResult\n    resultFile = \"/work/systest_res.mat\",\n    messages = \"\",\n    timeTotal = 1.5\nend SimulationResult;\n";

    /// A stand-in engine: publishes the endpoint of a REP socket owned by the
    /// test, then lingers until the test drops a marker file.
    #[cfg(unix)]
    fn write_fake_engine(dir: &Path, endpoint: &str, done: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let port_prefix = port_file_path(dir, &current_user(), "");
        let script = format!(
            "#!/bin/sh\n\
             for arg in \"$@\"; do\n\
             \x20 case \"$arg\" in -z=*) suffix=\"${{arg#-z=}}\" ;; esac\n\
             done\n\
             printf '%s' '{endpoint}' > '{prefix}'\"$suffix\"\n\
             while [ ! -f '{done}' ]; do sleep 0.1; done\n",
            prefix = port_prefix.display(),
            done = done.display(),
        );
        let path = dir.join("fake-omc");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn session_round_trip_over_zeromq() {
        use zeromq::RepSocket;

        let dir = tempfile::tempdir().unwrap();
        let done = dir.path().join("done");

        let mut server = RepSocket::new();
        let endpoint = server.bind("tcp://127.0.0.1:0").await.unwrap().to_string();
        let marker = done.clone();
        let engine = tokio::spawn(async move {
            let mut seen = Vec::new();
            loop {
                let request = server.recv().await.unwrap();
                assert_eq!(request.len(), 1, "one frame per command");
                let text = String::from_utf8(request.get(0).unwrap().to_vec()).unwrap();
                seen.push(text.clone());
                match text.as_str() {
                    "quit()" => {
                        std::fs::write(&marker, "").unwrap();
                        return seen;
                    }
                    "loadModel(Modelica)" => server.send("true\n".to_string().into()).await.unwrap(),
                    _ => server.send(SIM_RECORD.to_string().into()).await.unwrap(),
                }
            }
        });

        let opts = SessionOptions {
            program: write_fake_engine(dir.path(), &endpoint, &done),
            startup_timeout: Duration::from_secs(10),
            temp_dir: dir.path().to_path_buf(),
        };
        let mut session = OmcSession::start(&opts).await.unwrap();
        assert_eq!(session.send_expression("loadModel(Modelica)").await.unwrap(), Value::Bool(true));
        let result = session.send_expression("simulate(systest)").await.unwrap();
        assert_eq!(result.get("resultFile").and_then(Value::as_str), Some("/work/systest_res.mat"));
        assert_eq!(result.get("timeTotal"), Some(&Value::Real(1.5)));
        session.quit().await;

        let seen = engine.await.unwrap();
        assert_eq!(seen, vec!["loadModel(Modelica)", "simulate(systest)", "quit()"]);
    }
}
