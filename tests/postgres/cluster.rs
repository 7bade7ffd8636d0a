//! Embedded `PostgreSQL` cluster shared by the scheduling integration tests.
//!
//! One cluster is launched per test binary. Unprivileged runners host it in
//! process; root runners drive it through the `pg_worker` binary, which
//! drops to `nobody` before touching the data directory. When no cluster
//! can be launched (binaries unavailable offline, no worker binary for a
//! root runner) the fixture prints the reason and yields `None`.

use crate::test_helpers::EnvVarGuard;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use diesel::prelude::*;
use pg_embedded_setup_unpriv::worker_process_test_api::{
    WorkerOperation, WorkerRequest, WorkerRequestArgs, run as run_worker,
};
use pg_embedded_setup_unpriv::{
    ExecutionPrivileges, TestBootstrapSettings, bootstrap_for_tests, detect_execution_privileges,
};
use postgresql_embedded::{PostgreSQL, Settings, Status};
use rstest::{fixture, rstest};
use std::ffi::OsString;
use std::io;
use std::net::TcpListener;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tokio::runtime::Runtime;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared cluster handle passed to tests.
pub type PostgresCluster = &'static TestCluster;

static CLUSTER: OnceLock<Option<TestCluster>> = OnceLock::new();

/// Line of `postmaster.pid` holding the listening port.
const PID_FILE_PORT_LINE: usize = 3;

/// Variable through which the bootstrap learns the worker binary.
const WORKER_ENV: &str = "PG_EMBEDDED_WORKER";

fn boxed(err: impl std::error::Error + Send + Sync + 'static) -> BoxError {
    Box::new(err)
}

/// How the server process is owned and stopped.
enum Lifecycle {
    InProcess {
        runtime: Runtime,
        server: PostgreSQL,
    },
    Worker {
        bootstrap: TestBootstrapSettings,
        env_vars: Vec<(String, Option<String>)>,
    },
}

/// Running embedded server plus whatever drives it.
pub struct TestCluster {
    settings: Settings,
    lifecycle: Lifecycle,
    template_guard: Mutex<()>,
}

impl TestCluster {
    fn launch() -> Result<Self, BoxError> {
        let mut overrides = free_port_override()?;
        if matches!(detect_execution_privileges(), ExecutionPrivileges::Root)
            && std::env::var_os(WORKER_ENV).is_none()
        {
            overrides.push((OsString::from(WORKER_ENV), Some(staged_worker()?)));
        }
        let bootstrap_env = EnvVarGuard::set_many(&overrides);
        let mut bootstrap = bootstrap_for_tests().map_err(boxed)?;
        drop(bootstrap_env);
        adopt_password_file(&mut bootstrap.settings)?;

        let env_vars = bootstrap.environment.to_env();
        match bootstrap.privileges {
            ExecutionPrivileges::Root => Self::launch_via_worker(bootstrap, env_vars),
            ExecutionPrivileges::Unprivileged => {
                Self::launch_in_process(bootstrap.settings, &env_vars)
            }
        }
    }

    fn launch_in_process(
        requested: Settings,
        env_vars: &[(String, Option<String>)],
    ) -> Result<Self, BoxError> {
        let env_guard = EnvVarGuard::set_many(&to_os_pairs(env_vars));
        let runtime = Runtime::new().map_err(boxed)?;
        let mut server = PostgreSQL::new(requested);
        runtime
            .block_on(async {
                server.setup().await?;
                if !matches!(server.status(), Status::Started) {
                    server.start().await?;
                }
                Ok::<(), postgresql_embedded::Error>(())
            })
            .map_err(boxed)?;
        drop(env_guard);

        let mut settings = server.settings().clone();
        adopt_pid_file_port(&mut settings)?;
        Ok(Self {
            settings,
            lifecycle: Lifecycle::InProcess { runtime, server },
            template_guard: Mutex::new(()),
        })
    }

    fn launch_via_worker(
        bootstrap: TestBootstrapSettings,
        env_vars: Vec<(String, Option<String>)>,
    ) -> Result<Self, BoxError> {
        worker_step(
            &bootstrap,
            &env_vars,
            WorkerOperation::Setup,
            bootstrap.setup_timeout,
        )?;
        worker_step(
            &bootstrap,
            &env_vars,
            WorkerOperation::Start,
            bootstrap.start_timeout,
        )?;

        let mut settings = bootstrap.settings.clone();
        adopt_pid_file_port(&mut settings)?;
        Ok(Self {
            settings,
            lifecycle: Lifecycle::Worker {
                bootstrap,
                env_vars,
            },
            template_guard: Mutex::new(()),
        })
    }

    /// Connection URL for `database` on this cluster.
    #[must_use]
    pub fn database_url(&self, database: &str) -> String {
        self.settings.url(database)
    }

    /// Creates `name`, optionally as a copy of `template`.
    pub fn create_database(&self, name: &str, template: Option<&str>) -> Result<(), BoxError> {
        let sql = match template {
            Some(source) => format!(
                "CREATE DATABASE {} TEMPLATE {}",
                quoted(name),
                quoted(source)
            ),
            None => format!("CREATE DATABASE {}", quoted(name)),
        };
        self.run_admin(&sql)
    }

    /// Drops `name`, disconnecting any remaining sessions.
    pub fn drop_database(&self, name: &str) -> Result<(), BoxError> {
        self.run_admin(&format!(
            "DROP DATABASE IF EXISTS {} WITH (FORCE)",
            quoted(name)
        ))
    }

    /// Creates the template database once and runs `migrate` against it.
    ///
    /// A failed migration drops the half-built template so the next caller
    /// starts clean.
    pub fn ensure_template(
        &self,
        name: &str,
        migrate: impl FnOnce(&str) -> Result<(), BoxError>,
    ) -> Result<(), BoxError> {
        let _serialized = self
            .template_guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.has_database(name)? {
            return Ok(());
        }
        self.create_database(name, None)?;
        migrate(name).or_else(|err| {
            self.drop_database(name)?;
            Err(err)
        })
    }

    fn has_database(&self, name: &str) -> Result<bool, BoxError> {
        #[derive(diesel::QueryableByName)]
        struct Found {
            #[diesel(sql_type = diesel::sql_types::Bool)]
            found: bool,
        }

        let mut admin = self.admin_connection()?;
        diesel::sql_query(
            "SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1) AS found",
        )
        .bind::<diesel::sql_types::Text, _>(name)
        .get_result::<Found>(&mut admin)
        .map(|row| row.found)
        .map_err(boxed)
    }

    fn run_admin(&self, sql: &str) -> Result<(), BoxError> {
        let mut admin = self.admin_connection()?;
        diesel::sql_query(sql).execute(&mut admin).map_err(boxed)?;
        Ok(())
    }

    fn admin_connection(&self) -> Result<PgConnection, BoxError> {
        PgConnection::establish(&self.database_url("postgres")).map_err(boxed)
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        match &self.lifecycle {
            Lifecycle::InProcess { runtime, server } => drop(runtime.block_on(server.stop())),
            Lifecycle::Worker {
                bootstrap,
                env_vars,
            } => drop(worker_step(
                bootstrap,
                env_vars,
                WorkerOperation::Stop,
                bootstrap.shutdown_timeout,
            )),
        }
    }
}

/// Runs one lifecycle `operation` through the `pg_worker` binary.
fn worker_step(
    bootstrap: &TestBootstrapSettings,
    env_vars: &[(String, Option<String>)],
    operation: WorkerOperation,
    timeout: Duration,
) -> Result<(), BoxError> {
    let worker = bootstrap.worker_binary.as_ref().ok_or_else(|| {
        boxed(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{WORKER_ENV} does not name a worker binary"),
        ))
    })?;
    let request = WorkerRequest::new(WorkerRequestArgs {
        worker: worker.as_path(),
        settings: &bootstrap.settings,
        env_vars,
        operation,
        timeout,
    });
    run_worker(&request).map_err(boxed)?;
    Ok(())
}

/// Copies `pg_worker` into the temp directory with permissions `nobody`
/// can execute, returning the copy's path.
fn staged_worker() -> Result<OsString, BoxError> {
    let source = locate_worker().ok_or_else(|| {
        boxed(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "tests running as root need the pg_worker binary; \
                 run `cargo build --bin pg_worker` or set {WORKER_ENV}"
            ),
        ))
    })?;
    let temp_dir = to_utf8(std::env::temp_dir())?;
    let staged_name = format!("cadence_pg_worker_{}", std::process::id());
    let (source_dir, source_name) = open_parent(&source)?;
    let target_dir = Dir::open_ambient_dir(&temp_dir, ambient_authority()).map_err(boxed)?;
    source_dir
        .copy(source_name, &target_dir, &staged_name)
        .map_err(boxed)?;
    #[cfg(unix)]
    {
        use cap_std::fs::{Permissions, PermissionsExt};
        target_dir
            .set_permissions(&staged_name, Permissions::from_mode(0o755))
            .map_err(boxed)?;
    }
    Ok(OsString::from(temp_dir.join(staged_name).into_string()))
}

/// Finds the `pg_worker` built alongside this test binary.
fn locate_worker() -> Option<Utf8PathBuf> {
    option_env!("CARGO_BIN_EXE_pg_worker")
        .map(Utf8PathBuf::from)
        .filter(|path| path.is_file())
        .or_else(worker_in_target_dir)
}

fn worker_in_target_dir() -> Option<Utf8PathBuf> {
    let test_binary = Utf8PathBuf::from_path_buf(std::env::current_exe().ok()?).ok()?;
    let candidate = test_binary.parent()?.parent()?.join("pg_worker");
    candidate.is_file().then_some(candidate)
}

fn open_parent(path: &Utf8Path) -> Result<(Dir, &str), BoxError> {
    let file_name = path.file_name().ok_or_else(|| {
        boxed(io::Error::other(format!("{path} does not name a file")))
    })?;
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(boxed)?;
    Ok((dir, file_name))
}

fn to_os_pairs(env_vars: &[(String, Option<String>)]) -> Vec<(OsString, Option<OsString>)> {
    env_vars
        .iter()
        .map(|(key, value)| (OsString::from(key), value.as_ref().map(OsString::from)))
        .collect()
}

/// Provides the shared cluster, or `None` when this environment cannot run
/// one.
#[expect(
    clippy::print_stderr,
    reason = "skipped cluster tests must say why in the test output"
)]
#[fixture]
pub fn postgres_cluster() -> Option<PostgresCluster> {
    CLUSTER
        .get_or_init(|| {
            TestCluster::launch()
                .inspect_err(|err| eprintln!("SKIP-TEST-CLUSTER: PostgreSQL unavailable: {err}"))
                .ok()
        })
        .as_ref()
}

fn quoted(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Picks a free port for the cluster unless `PG_PORT` already names one.
fn free_port_override() -> Result<Vec<(OsString, Option<OsString>)>, BoxError> {
    if std::env::var_os("PG_PORT").is_some() {
        return Ok(Vec::new());
    }
    let port = TcpListener::bind(("127.0.0.1", 0))
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .map_err(boxed)?;
    Ok(vec![(
        OsString::from("PG_PORT"),
        Some(OsString::from(port.to_string())),
    )])
}

fn adopt_password_file(settings: &mut Settings) -> Result<(), BoxError> {
    let path = to_utf8(settings.password_file.clone())?;
    let Some(file_name) = path.file_name() else {
        return Ok(());
    };
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let Some(contents) = read_if_present(parent, file_name)? else {
        return Ok(());
    };
    let password = contents.trim_end();
    if !password.is_empty() {
        password.clone_into(&mut settings.password);
    }
    Ok(())
}

fn adopt_pid_file_port(settings: &mut Settings) -> Result<(), BoxError> {
    let data_dir = to_utf8(settings.data_dir.clone())?;
    let Some(contents) = read_if_present(&data_dir, "postmaster.pid")? else {
        return Ok(());
    };
    if let Some(port) = contents
        .lines()
        .nth(PID_FILE_PORT_LINE)
        .and_then(|line| line.trim().parse::<u16>().ok())
    {
        settings.port = port;
    }
    Ok(())
}

fn read_if_present(dir: &Utf8Path, file_name: &str) -> Result<Option<String>, BoxError> {
    let handle = match Dir::open_ambient_dir(dir, ambient_authority()) {
        Ok(handle) => handle,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(boxed(err)),
    };
    match handle.read_to_string(file_name) {
        Ok(contents) => Ok(Some(contents)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(boxed(err)),
    }
}

fn to_utf8(path: std::path::PathBuf) -> Result<Utf8PathBuf, BoxError> {
    Utf8PathBuf::from_path_buf(path).map_err(|rejected| {
        boxed(io::Error::other(format!(
            "cluster path is not UTF-8: {}",
            rejected.display()
        )))
    })
}

#[rstest]
fn worker_binary_is_built_with_the_tests() {
    let worker = locate_worker().expect("pg_worker should be available to root runners");

    assert_eq!(worker.file_stem(), Some("pg_worker"));
}
