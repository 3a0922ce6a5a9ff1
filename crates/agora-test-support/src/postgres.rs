//! Disposable `PostgreSQL` databases for integration suites.
//!
//! `AGORA_TEST_DATABASE_URL` points at an existing server; each call creates a
//! fresh database on it. Without the variable, a throwaway server is launched
//! from local `initdb`/`postgres` binaries. Callers skip their test when
//! [`start_postgres`] fails.

use std::env;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow, bail};
use postgres::NoTls;
use url::Url;

/// Environment variable naming an existing server to create databases on.
pub const DATABASE_URL_ENV: &str = "AGORA_TEST_DATABASE_URL";

const SERVER_BINARIES: [&str; 3] = ["initdb", "postgres", "pg_isready"];
const READY_ATTEMPTS: u32 = 30;

static NAME_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A database that is dropped (and its server stopped, if local) on drop.
pub struct TestDatabase {
    connection_string: String,
    admin_url: String,
    database: String,
    server: Option<LocalServer>,
}

struct LocalServer {
    process: Child,
    data_dir: PathBuf,
}

impl TestDatabase {
    /// Connection string for `sqlx` or any other client.
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// Name of the created database.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        let _ = run_admin(
            &self.admin_url,
            format!("DROP DATABASE IF EXISTS \"{}\"", self.database),
        );
    }
}

impl Drop for LocalServer {
    fn drop(&mut self) {
        let _ = self.process.kill();
        let _ = self.process.wait();
        let _ = fs::remove_dir_all(&self.data_dir);
    }
}

/// Create a fresh database for one test.
///
/// # Errors
///
/// Returns an error when no server URL is configured and local binaries are
/// missing or fail to start, or when the database cannot be created.
pub fn start_postgres() -> Result<TestDatabase> {
    if let Ok(url) = env::var(DATABASE_URL_ENV) {
        return create_database(&url, None);
    }

    let (server, url) = launch_local_server()?;
    create_database(&url, Some(server))
}

fn create_database(base_url: &str, server: Option<LocalServer>) -> Result<TestDatabase> {
    let base = Url::parse(base_url).context("invalid postgres connection url")?;
    let database = unique_name("agora_test");

    let mut target = base.clone();
    target.set_path(&format!("/{database}"));

    let mut maintenance = base.clone();
    maintenance.set_path("/postgres");
    let mut candidates = vec![maintenance.to_string()];
    if maintenance.path() != base.path() {
        candidates.push(base.to_string());
    }

    let mut last_error = None;
    for admin_url in candidates {
        match run_admin(&admin_url, format!("CREATE DATABASE \"{database}\"")) {
            Ok(()) => {
                return Ok(TestDatabase {
                    connection_string: target.to_string(),
                    admin_url,
                    database,
                    server,
                });
            }
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or_else(|| anyhow!("failed to create test database")))
}

/// The blocking client refuses to run inside a Tokio runtime thread, so admin
/// statements run on a dedicated thread.
fn run_admin(admin_url: &str, statement: String) -> Result<()> {
    let admin_url = admin_url.to_string();
    thread::spawn(move || -> Result<()> {
        let mut client = postgres::Config::from_str(&admin_url)?.connect(NoTls)?;
        client
            .simple_query(&statement)
            .map(|_| ())
            .with_context(|| format!("failed to run `{statement}`"))
    })
    .join()
    .unwrap_or_else(|_| Err(anyhow!("admin statement thread panicked")))
}

fn launch_local_server() -> Result<(LocalServer, String)> {
    let [initdb, server_bin, pg_isready] = SERVER_BINARIES.map(find_binary);
    let (initdb, server_bin, pg_isready) = (initdb?, server_bin?, pg_isready?);

    let port = free_port()?;
    let data_dir = env::temp_dir().join(unique_name("agora-pg"));
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    let data_arg = data_dir
        .to_str()
        .context("data dir contains non-utf8 characters")?;

    let status = Command::new(&initdb)
        .args(["-D", data_arg, "--username=postgres", "--auth=trust"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("failed to run initdb")?;
    if !status.success() {
        bail!("initdb exited with failure status");
    }

    let process = Command::new(&server_bin)
        .args(["-D", data_arg, "-p", &port.to_string(), "-h", "127.0.0.1"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to start postgres process")?;
    let server = LocalServer { process, data_dir };

    wait_until_ready(&pg_isready, port)?;
    Ok((server, format!("postgres://postgres@127.0.0.1:{port}/postgres")))
}

fn find_binary(name: &str) -> Result<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/lib/postgresql/16/bin"),
        PathBuf::from("/opt/homebrew/opt/postgresql@16/bin"),
    ];
    if let Some(path) = env::var_os("PATH") {
        dirs.extend(env::split_paths(&path));
    }
    dirs.into_iter()
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| anyhow!("{name} binary is required for Postgres tests"))
}

fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("failed to reserve port")?;
    Ok(listener
        .local_addr()
        .context("failed to read listener address")?
        .port())
}

fn wait_until_ready(pg_isready: &Path, port: u16) -> Result<()> {
    for _ in 0..READY_ATTEMPTS {
        let ready = Command::new(pg_isready)
            .args(["-h", "127.0.0.1", "-p", &port.to_string(), "-U", "postgres"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success());
        if ready {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(200));
    }
    bail!("postgres process did not become ready in time")
}

fn unique_name(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let sequence = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{}_{nanos}_{sequence}", std::process::id())
}
