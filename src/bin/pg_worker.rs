//! Runs embedded `PostgreSQL` lifecycle steps for a test runner that is root.
//!
//! Usage:
//!
//! ```text
//! pg_worker <setup|start|stop> <config-path>
//! ```
//!
//! `config-path` names a JSON `WorkerPayload` from `pg-embed-setup-unpriv`
//! carrying the cluster settings and environment overrides. `PostgreSQL`
//! refuses to run as root, so a root invocation re-executes itself as
//! `nobody` through `runuser`, or `su` where `runuser` is missing.

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(unix)]
fn main() -> Result<(), BoxError> {
    worker::main().map_err(Into::into)
}

#[cfg(not(unix))]
fn main() -> Result<(), BoxError> {
    Err("pg_worker requires a Unix host".into())
}

#[cfg(unix)]
mod worker {
    use camino::{Utf8Path, Utf8PathBuf};
    use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
    use pg_embedded_setup_unpriv::{
        ExecutionPrivileges, ambient_dir_and_path, detect_execution_privileges,
    };
    use postgresql_embedded::{PostgreSQL, Status};
    use std::env;
    use std::fmt;
    use std::io::{self, Read};
    use std::process::{Command, ExitStatus};
    use thiserror::Error;

    /// Marks the child started by the privilege switch.
    const REEXEC_ENV: &str = "PG_WORKER_REEXEC";
    const TRUSTED_PATH: &str = "/usr/sbin:/usr/bin:/sbin:/bin";
    const UNPRIVILEGED_USER: &str = "nobody";

    /// Failures reported by the worker process.
    #[derive(Debug, Error)]
    pub(crate) enum WorkerError {
        #[error("invalid arguments: {0}")]
        InvalidArgs(String),
        #[error("failed to read worker config {path}: {reason}")]
        ConfigRead { path: Utf8PathBuf, reason: String },
        #[error("failed to parse worker config: {0}")]
        ConfigParse(#[source] serde_json::Error),
        #[error("invalid cluster settings: {0}")]
        Settings(String),
        #[error("failed to build the worker runtime: {0}")]
        Runtime(#[source] io::Error),
        #[error("failed to switch to nobody: {0}")]
        PrivilegeDrop(String),
        #[error("postgres {operation} failed: {source}")]
        Postgres {
            operation: Operation,
            source: postgresql_embedded::Error,
        },
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Operation {
        Setup,
        Start,
        Stop,
    }

    impl Operation {
        fn parse(raw: &str) -> Result<Self, WorkerError> {
            match raw {
                "setup" => Ok(Self::Setup),
                "start" => Ok(Self::Start),
                "stop" => Ok(Self::Stop),
                other => Err(WorkerError::InvalidArgs(format!(
                    "unknown operation '{other}'; expected setup, start or stop"
                ))),
            }
        }

        const fn as_str(self) -> &'static str {
            match self {
                Self::Setup => "setup",
                Self::Start => "start",
                Self::Stop => "stop",
            }
        }
    }

    impl fmt::Display for Operation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    pub(crate) fn main() -> Result<(), WorkerError> {
        let args = collect_args()?;
        let (operation, config_path) = parse_args(&args)?;
        if matches!(detect_execution_privileges(), ExecutionPrivileges::Root) {
            if env::var_os(REEXEC_ENV).is_some() {
                return Err(WorkerError::PrivilegeDrop(
                    "process is still root after re-executing".to_owned(),
                ));
            }
            let status = reexec_unprivileged(&args)?;
            std::process::exit(status.code().unwrap_or(1));
        }

        let payload = load_payload(&config_path)?;
        run(operation, payload)
    }

    fn collect_args() -> Result<Vec<String>, WorkerError> {
        env::args_os()
            .map(|arg| {
                arg.into_string()
                    .map_err(|_| WorkerError::InvalidArgs("argument is not valid UTF-8".to_owned()))
            })
            .collect()
    }

    /// Splits `program operation config-path` into its parts.
    pub(crate) fn parse_args(args: &[String]) -> Result<(Operation, Utf8PathBuf), WorkerError> {
        let mut rest = args.iter().skip(1);
        let operation = rest
            .next()
            .ok_or_else(|| WorkerError::InvalidArgs("missing operation argument".to_owned()))
            .and_then(|raw| Operation::parse(raw))?;
        let config_path = rest
            .next()
            .map(Utf8PathBuf::from)
            .ok_or_else(|| WorkerError::InvalidArgs("missing config path argument".to_owned()))?;
        if let Some(extra) = rest.next() {
            return Err(WorkerError::InvalidArgs(format!(
                "unexpected extra argument: {extra}"
            )));
        }
        Ok((operation, config_path))
    }

    fn reexec_unprivileged(args: &[String]) -> Result<ExitStatus, WorkerError> {
        let exe = env::current_exe()
            .map_err(|err| WorkerError::PrivilegeDrop(err.to_string()))
            .and_then(|path| {
                Utf8PathBuf::from_path_buf(path).map_err(|_| {
                    WorkerError::PrivilegeDrop("worker path is not valid UTF-8".to_owned())
                })
            })?;
        let forwarded = args.get(1..).unwrap_or_default();
        let outcome = Command::new("runuser")
            .args(["-u", UNPRIVILEGED_USER, "--"])
            .arg(exe.as_std_path())
            .args(forwarded)
            .env(REEXEC_ENV, "1")
            .env("PATH", TRUSTED_PATH)
            .status();
        match outcome {
            Ok(status) => Ok(status),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Command::new("/bin/su")
                .args(["-s", "/bin/sh", UNPRIVILEGED_USER, "-c"])
                .arg(su_command(&exe, forwarded))
                .env("PATH", TRUSTED_PATH)
                .status()
                .map_err(|su_err| WorkerError::PrivilegeDrop(su_err.to_string())),
            Err(err) => Err(WorkerError::PrivilegeDrop(err.to_string())),
        }
    }

    /// Shell line `su -c` runs to re-enter the worker with `args`.
    pub(crate) fn su_command(exe: &Utf8Path, args: &[String]) -> String {
        let mut command = format!("{REEXEC_ENV}=1 exec {}", shell_quote(exe.as_str()));
        for arg in args {
            command.push(' ');
            command.push_str(&shell_quote(arg));
        }
        command
    }

    /// Single-quotes `value` for `sh`.
    pub(crate) fn shell_quote(value: &str) -> String {
        format!("'{}'", value.replace('\'', r"'\''"))
    }

    fn load_payload(config_path: &Utf8Path) -> Result<WorkerPayload, WorkerError> {
        let read_failed = |reason: String| WorkerError::ConfigRead {
            path: config_path.to_owned(),
            reason,
        };
        let (dir, relative) =
            ambient_dir_and_path(config_path).map_err(|err| read_failed(err.to_string()))?;
        let mut bytes = Vec::new();
        dir.open(relative.as_std_path())
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .map_err(|err| read_failed(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(WorkerError::ConfigParse)
    }

    fn run(operation: Operation, payload: WorkerPayload) -> Result<(), WorkerError> {
        let settings = payload
            .settings
            .into_settings()
            .map_err(|err| WorkerError::Settings(err.to_string()))?;
        apply_environment(&payload.environment);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(WorkerError::Runtime)?;

        let mut server = PostgreSQL::new(settings);
        let failed =
            |source: postgresql_embedded::Error| WorkerError::Postgres { operation, source };
        runtime.block_on(async {
            match operation {
                Operation::Setup => {
                    server.setup().await.map_err(failed)?;
                    ensure_started(&mut server).await.map_err(failed)
                }
                Operation::Start => ensure_started(&mut server).await.map_err(failed),
                Operation::Stop => server.stop().await.map_err(failed),
            }
        })?;
        if operation == Operation::Start {
            // The server must outlive this process.
            std::mem::forget(server);
        }
        Ok(())
    }

    async fn ensure_started(server: &mut PostgreSQL) -> Result<(), postgresql_embedded::Error> {
        if matches!(server.status(), Status::Started) {
            return Ok(());
        }
        server.start().await
    }

    fn apply_environment(environment: &[(String, Option<PlainSecret>)]) {
        for (key, value) in environment {
            // SAFETY: called before the runtime exists, while this process
            // has a single thread.
            unsafe {
                match value {
                    Some(secret) => env::set_var(key, secret.expose()),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
