//! Snapshot-on-write storage shared by tenders and bids
//!
//! Every content or status change appends exactly one version row and
//! overwrites the live row inside a single sled transaction. Rollback restores
//! an old row's content but is itself stamped with the next version number.
use std::marker::PhantomData;

use chrono::Utc;
use sled::transaction::{
    ConflictableTransactionError, TransactionError, Transactional, TransactionalTree, abort,
};
use sled::{Db, Tree};

use crate::content::{Content, EditMode};
use crate::directory::ResponsibilityDirectory;
use crate::error::{MarketError, MarketResult, StorageResultExt};
use crate::guard::MutationGuard;
use crate::record::{LiveRecord, TimeStamp, VersionRecord, history_prefix, version_key};
use crate::status::Status;
use crate::utils::new_id;

/// A kind of entity with versioned history.
pub trait EntityKind: Send + Sync + 'static {
    /// Lower-case name, used for tree names and error messages.
    const NAME: &'static str;
    /// bech32 prefix of generated ids.
    const ID_PREFIX: &'static str;

    type Content: Content;
    type Status: Status;
}

pub type Live<K> = LiveRecord<<K as EntityKind>::Content, <K as EntityKind>::Status>;
pub type Version<K> = VersionRecord<<K as EntityKind>::Content, <K as EntityKind>::Status>;

type TxResult<T> = Result<T, ConflictableTransactionError<MarketError>>;

pub struct VersionedRepository<K> {
    live: Tree,
    versions: Tree,
    kind: PhantomData<K>,
}

impl<K: EntityKind> VersionedRepository<K> {
    pub fn open(db: &Db) -> MarketResult<Self> {
        Ok(Self {
            live: db
                .open_tree(format!("{}_live", K::NAME))
                .storage("open live tree")?,
            versions: db
                .open_tree(format!("{}_versions", K::NAME))
                .storage("open version tree")?,
            kind: PhantomData,
        })
    }

    pub fn find(&self, id: &str) -> MarketResult<Option<Live<K>>> {
        self.live
            .get(id.as_bytes())
            .storage_for("load live row", id)?
            .map(|bytes| minicbor::decode(&bytes).storage_for("decode live row", id))
            .transpose()
    }

    pub fn get(&self, id: &str) -> MarketResult<Live<K>> {
        self.find(id)?.ok_or_else(|| not_found::<K>(id))
    }

    pub fn version(&self, id: &str, version: u32) -> MarketResult<Option<Version<K>>> {
        self.versions
            .get(version_key(id, version))
            .storage_for("load version row", id)?
            .map(|bytes| minicbor::decode(&bytes).storage_for("decode version row", id))
            .transpose()
    }

    /// Highest version number stored for `id`, or 0 when there is no history.
    pub fn max_version(&self, id: &str) -> MarketResult<u32> {
        match self.versions.scan_prefix(history_prefix(id)).next_back() {
            Some(entry) => {
                let (_, bytes) = entry.storage_for("scan version rows", id)?;
                let row: Version<K> =
                    minicbor::decode(&bytes).storage_for("decode version row", id)?;
                Ok(row.version)
            }
            None => Ok(0),
        }
    }

    /// Full history of `id`, newest first.
    pub fn list_versions(&self, id: &str) -> MarketResult<Vec<Version<K>>> {
        self.versions
            .scan_prefix(history_prefix(id))
            .rev()
            .map(|entry| {
                let (_, bytes) = entry.storage_for("scan version rows", id)?;
                minicbor::decode(&bytes).storage_for("decode version row", id)
            })
            .collect()
    }

    /// Every live row, in key order.
    pub fn scan(&self) -> MarketResult<Vec<Live<K>>> {
        self.live
            .iter()
            .map(|entry| {
                let (_, bytes) = entry.storage("scan live rows")?;
                minicbor::decode(&bytes).storage("decode live row")
            })
            .collect()
    }

    /// Stores a new entity at version 1 together with its first snapshot.
    pub fn create<D: ResponsibilityDirectory>(
        &self,
        guard: &MutationGuard<D>,
        username: &str,
        organization_id: &str,
        content: K::Content,
    ) -> MarketResult<(Live<K>, Version<K>)> {
        content.validate()?;
        let actor = guard.authorize(username, organization_id)?;

        let now = TimeStamp::new();
        let record = Live::<K> {
            id: new_id(K::ID_PREFIX)?,
            organization_id: organization_id.to_string(),
            creator_username: actor.username,
            content,
            status: K::Status::INITIAL,
            version: 1,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let snapshot = record.snapshot(now)?;
        let live_bytes = minicbor::to_vec(&record).storage("encode live row")?;
        let version_bytes = minicbor::to_vec(&snapshot).storage("encode version row")?;
        let key = version_key(&record.id, 1);

        let outcome: Result<(), TransactionError<MarketError>> = (&self.live, &self.versions)
            .transaction(|(live, versions)| {
                if live.get(record.id.as_bytes())?.is_some() || versions.get(&key)?.is_some() {
                    return abort(conflict::<K>(&record.id, 1));
                }
                live.insert(record.id.as_bytes(), live_bytes.clone())?;
                versions.insert(key.as_slice(), version_bytes.clone())?;
                Ok(())
            });
        unwrap_transaction::<K, _>(outcome, "create", &record.id)?;

        tracing::info!(kind = K::NAME, id = %record.id, actor = %record.creator_username, "created");
        Ok((record, snapshot))
    }

    /// Merges the supplied fields over the live content.
    ///
    /// Writes a new version only when the effective content changed.
    pub fn edit<D: ResponsibilityDirectory>(
        &self,
        guard: &MutationGuard<D>,
        id: &str,
        username: &str,
        edit: &<K::Content as Content>::Edit,
        mode: EditMode,
    ) -> MarketResult<Live<K>> {
        let actor = guard.resolve(username)?;
        let current = self.get(id)?;
        guard.check(&actor, &current.organization_id)?;

        let mut merged = current.content.clone();
        if !merged.apply(edit, mode) {
            tracing::debug!(kind = K::NAME, id, version = current.version, "edit changed nothing");
            return Ok(current);
        }
        merged.validate()?;

        self.commit(id, current.version, "edit", |record| {
            record.content = merged.clone();
        })
    }

    pub fn set_status<D: ResponsibilityDirectory>(
        &self,
        guard: &MutationGuard<D>,
        id: &str,
        username: &str,
        status: K::Status,
    ) -> MarketResult<Live<K>> {
        let actor = guard.resolve(username)?;
        let current = self.get(id)?;
        guard.check(&actor, &current.organization_id)?;

        if current.status == status {
            return Ok(current);
        }
        self.commit(id, current.version, "set status", |record| {
            record.status = status;
        })
    }

    /// Restores the content and status of `target` as a new version.
    pub fn rollback<D: ResponsibilityDirectory>(
        &self,
        guard: &MutationGuard<D>,
        id: &str,
        target: u32,
        username: &str,
    ) -> MarketResult<Live<K>> {
        let actor = guard.resolve(username)?;
        let current = self.get(id)?;
        guard.check(&actor, &current.organization_id)?;

        let restored = self
            .version(id, target)?
            .ok_or_else(|| MarketError::VersionNotFound {
                kind: K::NAME,
                id: id.to_string(),
                version: target,
            })?;

        let record = self.commit(id, current.version, "rollback", |record| {
            record.content = restored.content.clone();
            record.status = restored.status;
        })?;
        tracing::info!(kind = K::NAME, id, from = target, to = record.version, "rolled back");
        Ok(record)
    }

    // Appends version `expected + 1` and overwrites the live row atomically.
    // Aborts with a conflict if someone else committed since `expected` was read.
    fn commit<F>(
        &self,
        id: &str,
        expected: u32,
        operation: &'static str,
        mutate: F,
    ) -> MarketResult<Live<K>>
    where
        F: Fn(&mut Live<K>),
    {
        let next = expected
            .checked_add(1)
            .ok_or_else(|| MarketError::storage(operation, "version counter exhausted"))?;
        let key = version_key(id, next);
        let now = TimeStamp::<Utc>::new();

        let outcome: Result<Live<K>, TransactionError<MarketError>> =
            (&self.live, &self.versions).transaction(|(live, versions)| {
                let mut record = load_in_tx::<K>(live, id)?;
                if record.version != expected || versions.get(&key)?.is_some() {
                    return abort(conflict::<K>(id, next));
                }

                mutate(&mut record);
                record.version = next;
                record.updated_at = now.clone();

                let snapshot = record.snapshot(now.clone()).map_err(ConflictableTransactionError::Abort)?;
                versions.insert(key.as_slice(), encode_in_tx(&snapshot)?)?;
                live.insert(id.as_bytes(), encode_in_tx(&record)?)?;
                Ok(record)
            });
        let record = unwrap_transaction::<K, _>(outcome, operation, id)?;

        tracing::info!(kind = K::NAME, id, version = record.version, operation, "committed version");
        Ok(record)
    }
}

fn load_in_tx<K: EntityKind>(live: &TransactionalTree, id: &str) -> TxResult<Live<K>> {
    match live.get(id.as_bytes())? {
        Some(bytes) => minicbor::decode(&bytes)
            .storage_for("decode live row", id)
            .map_err(ConflictableTransactionError::Abort),
        None => abort(not_found::<K>(id)),
    }
}

fn encode_in_tx<T: minicbor::Encode<()>>(value: &T) -> TxResult<Vec<u8>> {
    minicbor::to_vec(value)
        .storage("encode row")
        .map_err(ConflictableTransactionError::Abort)
}

fn unwrap_transaction<K: EntityKind, T>(
    outcome: Result<T, TransactionError<MarketError>>,
    operation: &'static str,
    id: &str,
) -> MarketResult<T> {
    match outcome {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => {
            if err.is_retriable() {
                tracing::warn!(kind = K::NAME, id, operation, "version conflict");
            }
            Err(err)
        }
        Err(TransactionError::Storage(err)) => Err(MarketError::storage_for(operation, id, err)),
    }
}

fn not_found<K: EntityKind>(id: &str) -> MarketError {
    MarketError::NotFound {
        kind: K::NAME,
        id: id.to_string(),
    }
}

fn conflict<K: EntityKind>(id: &str, version: u32) -> MarketError {
    MarketError::VersionConflict {
        kind: K::NAME,
        id: id.to_string(),
        version,
    }
}
