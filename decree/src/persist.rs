//! Durable ballot state, one file per node.
//!
//! The file holds the current state only, never history: every write seeks
//! to the start and replaces the whole record. State must be on disk before
//! a promise or acceptance is acknowledged, so writes end with `sync_data`.

use std::collections::BTreeMap;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::ballot::{Ballot, BallotState};
use crate::config::StoreConfig;
use crate::role::Role;

/// The on-disk record. `accepted`, `promised` and `value` are authoritative
/// on restore; the remaining fields describe the node that wrote the file.
#[derive(Debug, Serialize, Deserialize)]
struct StateRecord {
    role: Role,
    addr: String,
    accepted: Ballot,
    promised: Ballot,
    value: String,
    quorum: usize,
    members: BTreeMap<String, Role>,
}

/// File-backed store for a node's [`BallotState`].
pub(crate) struct BallotStore {
    file: Option<File>,
    path: PathBuf,
    keep_on_shutdown: bool,
    role: Role,
    addr: String,
    quorum: usize,
    members: BTreeMap<String, Role>,
}

impl BallotStore {
    /// Open (or create) the node's state file and restore any previous
    /// state. With persistence disabled the store is inert and nothing is
    /// read or written.
    pub(crate) async fn open(
        config: &StoreConfig,
        role: Role,
        addr: &str,
        quorum: usize,
        members: &BTreeMap<String, Role>,
    ) -> io::Result<(Self, Option<BallotState>)> {
        let path = config.dir.join(format!("{role}-{addr}"));
        let mut store = BallotStore {
            file: None,
            path,
            keep_on_shutdown: config.keep_on_shutdown,
            role,
            addr: addr.to_owned(),
            quorum,
            members: members.clone(),
        };

        if !config.persist {
            return Ok((store, None));
        }

        tokio::fs::create_dir_all(&config.dir).await?;

        let restored = if config.restore {
            restore(&store.path).await
        } else {
            None
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&store.path)
            .await?;
        store.file = Some(file);

        // Initial commit so the file always holds a full record.
        match &restored {
            Some(state) => {
                debug!(path = %store.path.display(), ballot = %state.accepted, "restored state");
                store.write(state).await?;
            }
            None => store.write(&BallotState::default()).await?,
        }

        Ok((store, restored))
    }

    /// Overwrite the file with the given state.
    pub(crate) async fn write(&mut self, state: &BallotState) -> io::Result<()> {
        let Some(file) = &mut self.file else {
            return Ok(());
        };

        let record = StateRecord {
            role: self.role,
            addr: self.addr.clone(),
            accepted: state.accepted,
            promised: state.promised,
            value: state.value.clone(),
            quorum: self.quorum,
            members: self.members.clone(),
        };
        let mut encoded = serde_json::to_vec_pretty(&record)?;
        encoded.push(b'\n');

        file.seek(SeekFrom::Start(0)).await?;
        file.set_len(0).await?;
        file.write_all(&encoded).await?;
        file.sync_data().await?;
        Ok(())
    }

    /// Close the file; remove it unless configured to keep state around.
    pub(crate) async fn close(mut self) -> io::Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        drop(file);
        if !self.keep_on_shutdown {
            tokio::fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

/// Decode a previous state file. Missing or unreadable files yield fresh
/// state rather than an error, matching a first boot.
async fn restore(path: &Path) -> Option<BallotState> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), %err, "could not read state file, starting fresh");
            return None;
        }
    };

    match serde_json::from_str::<StateRecord>(&contents) {
        Ok(record) => Some(BallotState {
            accepted: record.accepted,
            promised: record.promised,
            value: record.value,
        }),
        Err(err) => {
            warn!(path = %path.display(), %err, "could not decode state file, starting fresh");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn members() -> BTreeMap<String, Role> {
        BTreeMap::from([
            ("127.0.0.1:9001".to_owned(), Role::Acceptor),
            ("127.0.0.1:9002".to_owned(), Role::Acceptor),
        ])
    }

    #[tokio::test]
    async fn round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default()
            .with_dir(dir.path())
            .keep_on_shutdown(true);

        let (mut store, restored) =
            BallotStore::open(&config, Role::Acceptor, "127.0.0.1:9001", 2, &members())
                .await
                .unwrap();
        assert!(restored.is_none());

        let state = BallotState {
            accepted: Ballot::new(3, 1),
            promised: Ballot::new(4, 0),
            value: "v1".to_owned(),
        };
        store.write(&state).await.unwrap();
        store.close().await.unwrap();

        let (store, restored) =
            BallotStore::open(&config, Role::Acceptor, "127.0.0.1:9001", 2, &members())
                .await
                .unwrap();
        assert_eq!(restored, Some(state));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn overwrites_rather_than_appends() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default()
            .with_dir(dir.path())
            .keep_on_shutdown(true);

        let (mut store, _) =
            BallotStore::open(&config, Role::Acceptor, "127.0.0.1:9001", 2, &members())
                .await
                .unwrap();

        let long = BallotState {
            accepted: Ballot::new(1, 0),
            promised: Ballot::new(1, 0),
            value: "a".repeat(512),
        };
        store.write(&long).await.unwrap();

        let short = BallotState {
            accepted: Ballot::new(2, 0),
            promised: Ballot::new(2, 0),
            value: "b".to_owned(),
        };
        store.write(&short).await.unwrap();
        store.close().await.unwrap();

        // A shorter record fully replaces the longer one.
        let (store, restored) =
            BallotStore::open(&config, Role::Acceptor, "127.0.0.1:9001", 2, &members())
                .await
                .unwrap();
        assert_eq!(restored, Some(short));
        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn removed_on_close_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default().with_dir(dir.path());

        let (store, _) =
            BallotStore::open(&config, Role::Acceptor, "127.0.0.1:9001", 2, &members())
                .await
                .unwrap();
        let path = dir.path().join("acceptor-127.0.0.1:9001");
        assert!(path.exists());

        store.close().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn ephemeral_store_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::ephemeral().with_dir(dir.path());

        let (mut store, restored) =
            BallotStore::open(&config, Role::Learner, "127.0.0.1:9003", 2, &members())
                .await
                .unwrap();
        assert!(restored.is_none());
        store.write(&BallotState::default()).await.unwrap();
        store.close().await.unwrap();

        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn garbage_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::default()
            .with_dir(dir.path())
            .keep_on_shutdown(true);
        let path = dir.path().join("acceptor-127.0.0.1:9001");
        std::fs::write(&path, "not json").unwrap();

        let (store, restored) =
            BallotStore::open(&config, Role::Acceptor, "127.0.0.1:9001", 2, &members())
                .await
                .unwrap();
        assert!(restored.is_none());
        store.close().await.unwrap();
    }
}
