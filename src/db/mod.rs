use std::{
    fmt,
    path::PathBuf,
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
mod repositories;

use migrations::run_migrations;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the session history lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// Private to this handle; gone when the worker stops.
    Memory,
}

impl fmt::Display for DbLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbLocation::File(path) => write!(f, "{}", path.display()),
            DbLocation::Memory => f.write_str(":memory:"),
        }
    }
}

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum WorkerMessage {
    Run(Job),
    Close,
}

struct Worker {
    jobs: mpsc::Sender<WorkerMessage>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Worker {
    fn stop(&self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(handle) = handle else {
            return;
        };

        if self.jobs.send(WorkerMessage::Close).is_err() {
            debug!("Database worker already gone");
        }
        if let Err(join_err) = handle.join() {
            error!("Database worker panicked: {join_err:?}");
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Cloneable handle to the SQLite connection. The connection itself never
/// leaves its worker thread; callers hand it closures and await the result.
#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    location: Arc<DbLocation>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        Self::open(DbLocation::File(db_path))
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(DbLocation::Memory)
    }

    pub fn open(location: DbLocation) -> Result<Self> {
        if let DbLocation::File(path) = &location {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create database directory {}", parent.display())
                })?;
            }
        }

        let (jobs_tx, jobs_rx) = mpsc::channel::<WorkerMessage>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let worker_location = location.clone();

        let thread = thread::Builder::new()
            .name("facefocus-db".into())
            .spawn(move || {
                let mut conn = match open_connection(&worker_location) {
                    Ok(conn) => conn,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }
                serve(&mut conn, jobs_rx);
            })
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before it was ready")??;

        info!("Session database ready at {location}");

        Ok(Self {
            worker: Arc::new(Worker {
                jobs: jobs_tx,
                thread: Mutex::new(Some(thread)),
            }),
            location: Arc::new(location),
        })
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    /// Run `task` on the worker thread.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have given up waiting; the work is done either way.
            let _ = reply_tx.send(task(conn));
        });

        self.worker
            .jobs
            .send(WorkerMessage::Run(job))
            .map_err(|_| anyhow!("database worker has stopped"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database worker dropped the request"))?
    }
}

fn open_connection(location: &DbLocation) -> Result<Connection> {
    let mut conn = match location {
        DbLocation::File(path) => Connection::open(path)
            .with_context(|| format!("failed to open SQLite database {}", path.display()))?,
        DbLocation::Memory => {
            Connection::open_in_memory().context("failed to open in-memory SQLite database")?
        }
    };

    if let DbLocation::File(_) = location {
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("Failed to enable WAL mode: {err}");
        }
    }
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;

    run_migrations(&mut conn).context("failed to run database migrations")?;
    Ok(conn)
}

fn serve(conn: &mut Connection, jobs: mpsc::Receiver<WorkerMessage>) {
    while let Ok(message) = jobs.recv() {
        match message {
            WorkerMessage::Run(job) => job(conn),
            WorkerMessage::Close => break,
        }
    }
    debug!("Database worker shutting down");
}
