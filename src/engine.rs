//! Engine Module
//!
//! Coordinates the store, the command dispatcher and the append-only log.
//!
//! ## Responsibilities
//! - Replay the log into a fresh store on startup
//! - Append mutating commands before executing them
//! - Own the background flusher
//! - Shut the log down cleanly

use std::sync::Arc;

use parking_lot::Mutex;

use crate::aof::{Aof, DurabilityStatus, Flusher, ReplayStats};
use crate::command::{self, Dispatch, Request};
use crate::config::Config;
use crate::error::{KvError, Result};
use crate::store::Store;

/// The server core
///
/// ## Concurrency Model
///
/// - **Store**: flat map and hash map each behind their own RwLock
/// - **Log**: every append, sync and close serialized by the log mutex
/// - **Order**: the log order across connections is the order in which
///   appends win the log mutex; replay reproduces exactly that order
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// In-memory keyed state
    store: Store,

    /// Durable command log
    aof: Arc<Aof>,

    /// Background fsync thread (None after close)
    flusher: Mutex<Option<Flusher>>,

    /// What startup replay found
    replay_stats: ReplayStats,
}

impl Engine {
    /// Open the log, replay it, and start the flusher
    ///
    /// On startup:
    /// 1. Open/create the log file
    /// 2. Replay every record into an empty store
    /// 3. Start the background flusher
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        if config.fsync_interval.is_zero() {
            return Err(KvError::Config("fsync interval must be non-zero".to_string()));
        }

        // Step 1: Create the parent directory and open the log
        if let Some(parent) = config.aof_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let aof = Arc::new(Aof::open_with_limits(&config.aof_path, config.limits)?);

        // Step 2: Replay through the same dispatcher clients use
        let store = Store::new();
        let replay_stats = replay_into(&aof, &store)?;

        tracing::info!(
            "AOF replay: {} records ({} bytes){}; {} keys, {} hashes",
            replay_stats.records_replayed,
            replay_stats.bytes_replayed,
            match &replay_stats.tail_saved_to {
                Some(saved_to) => format!(", partial tail moved to {}", saved_to.display()),
                None => String::new(),
            },
            store.string_count(),
            store.hash_count()
        );

        // Step 3: Background durability
        let flusher = Flusher::spawn(Arc::clone(&aof), config.fsync_interval, config.fsync_policy)?;

        Ok(Self {
            config,
            store,
            aof,
            flusher: Mutex::new(Some(flusher)),
            replay_stats,
        })
    }

    /// Execute a client request
    ///
    /// Mutating commands are appended to the log first. A failed append is
    /// logged and the command still runs against the store.
    pub fn execute(&self, request: &Request) -> Dispatch {
        if let Some(kind) = request.kind() {
            if kind.is_mutating() {
                if let Err(e) = self.aof.append(request.as_value()) {
                    tracing::error!(
                        "ERR can not write {} to AOF, change will be lost after restart: {}",
                        kind.name(),
                        e
                    );
                }
            }
        }

        command::dispatch(&self.store, request)
    }

    /// Stop the flusher, sync and close the log
    ///
    /// The store stays readable; later mutating commands can no longer be logged.
    pub fn close(&self) -> Result<()> {
        if let Some(flusher) = self.flusher.lock().take() {
            flusher.stop();
        }
        self.aof.close()
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn aof(&self) -> &Aof {
        &self.aof
    }

    pub fn durability(&self) -> DurabilityStatus {
        self.aof.status()
    }

    pub fn replay_stats(&self) -> &ReplayStats {
        &self.replay_stats
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("Failed to close AOF cleanly: {}", e);
        }
    }
}

/// Re-execute every logged command against `store`
///
/// Replies are discarded and nothing is appended. Records that are not
/// commands, or name unknown commands, are skipped.
pub fn replay_into(aof: &Aof, store: &Store) -> Result<ReplayStats> {
    aof.replay(|value| match Request::from_value(value) {
        Ok(request) => {
            if let Dispatch::UnknownCommand(name) = command::dispatch(store, &request) {
                tracing::warn!("AOF replay: skipping unknown command {}", name);
            }
        }
        Err(reason) => tracing::warn!("AOF replay: skipping invalid record: {}", reason),
    })
}
