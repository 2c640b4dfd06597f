//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for CertChain. It uses rusqlite
//! with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use certchain_core::{
    Block, BlockId, Certificate, ChainHash, CoreError, DraftCertificate, Lookup, NewBlock,
    PrevLink, RecordId, Timestamp,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AnchoredCertificate, ChainTx, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` on the connection from the blocking pool.
    ///
    /// The connection guard lives exactly as long as `f`.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await?
    }
}

/// `ChainTx` over an open rusqlite transaction.
struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl ChainTx for SqliteTx<'_> {
    fn insert_certificate(&mut self, draft: &DraftCertificate) -> Result<RecordId> {
        self.conn.execute(
            "INSERT INTO certificates (student_name, course, issued_date, certificate_hash)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                draft.subject,
                draft.qualifier,
                draft.issued_at.to_canonical(),
                draft.provisional_hash.to_hex(),
            ],
        )?;
        Ok(RecordId(self.conn.last_insert_rowid()))
    }

    fn chain_tip(&mut self) -> Result<PrevLink> {
        let tip = self
            .conn
            .query_row(
                "SELECT current_hash FROM blocks ORDER BY id DESC LIMIT 1",
                [],
                |row| parse_column(row, 0, str::parse::<ChainHash>),
            )
            .optional()?;
        Ok(PrevLink::from(tip))
    }

    fn insert_block(&mut self, block: &NewBlock) -> Result<BlockId> {
        self.conn.execute(
            "INSERT INTO blocks (previous_hash, current_hash, timestamp, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                block.previous_hash.to_text(),
                block.current_hash.to_hex(),
                block.timestamp.to_canonical(),
                block.payload,
            ],
        )?;
        Ok(BlockId(self.conn.last_insert_rowid()))
    }

    fn finalize_certificate(&mut self, id: RecordId, hash: &ChainHash) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE certificates SET certificate_hash = ?1 WHERE id = ?2",
            params![hash.to_hex(), id.0],
        )?;
        if updated != 1 {
            return Err(StoreError::MissingRow(format!("certificate {}", id)));
        }
        Ok(())
    }
}

// Helper to parse a TEXT column through a core parser.
fn parse_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> std::result::Result<T, CoreError>,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// Helper to convert a certificates row (columns 0..=4) to a Certificate.
fn row_to_certificate(row: &Row<'_>) -> rusqlite::Result<Certificate> {
    Ok(Certificate {
        id: RecordId(row.get(0)?),
        subject: row.get(1)?,
        qualifier: row.get(2)?,
        issued_at: parse_column(row, 3, Timestamp::parse)?,
        hash: parse_column(row, 4, str::parse::<ChainHash>)?,
    })
}

// Helper to convert a blocks row to a Block.
fn row_to_block(row: &Row<'_>) -> rusqlite::Result<Block> {
    Ok(Block {
        id: BlockId(row.get(0)?),
        previous_hash: parse_column(row, 1, PrevLink::parse)?,
        current_hash: parse_column(row, 2, str::parse::<ChainHash>)?,
        timestamp: parse_column(row, 3, Timestamp::parse)?,
        payload: row.get(4)?,
    })
}

fn row_to_anchored(row: &Row<'_>) -> rusqlite::Result<AnchoredCertificate> {
    Ok(AnchoredCertificate {
        certificate: row_to_certificate(row)?,
        previous_hash: parse_column(row, 5, PrevLink::parse)?,
        block_timestamp: parse_column(row, 6, Timestamp::parse)?,
    })
}

const ANCHORED_SELECT: &str =
    "SELECT c.id, c.student_name, c.course, c.issued_date, c.certificate_hash,
            b.previous_hash, b.timestamp
     FROM certificates c
     JOIN blocks b ON c.certificate_hash = b.current_hash";

const BLOCK_COLUMNS: &str = "id, previous_hash, current_hash, timestamp, data";

#[async_trait]
impl Store for SqliteStore {
    async fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn ChainTx) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let result = f(&mut SqliteTx { conn: &tx });
            match result {
                Ok(value) => {
                    tx.commit()?;
                    Ok(value)
                }
                Err(e) => {
                    // Dropping the transaction rolls it back.
                    tracing::warn!(error = %e, "rolling back ledger transaction");
                    drop(tx);
                    Err(e)
                }
            }
        })
        .await
    }

    async fn find_certificate(&self, lookup: &Lookup) -> Result<Option<AnchoredCertificate>> {
        let lookup = *lookup;

        self.with_conn(move |conn| {
            let found = match lookup {
                Lookup::Hash(hash) => conn
                    .query_row(
                        &format!(
                            "{ANCHORED_SELECT} WHERE c.certificate_hash = ?1 ORDER BY b.id LIMIT 1"
                        ),
                        params![hash.to_hex()],
                        row_to_anchored,
                    )
                    .optional()?,
                Lookup::Id(id) => conn
                    .query_row(
                        &format!("{ANCHORED_SELECT} WHERE c.id = ?1 ORDER BY b.id LIMIT 1"),
                        params![id.0],
                        row_to_anchored,
                    )
                    .optional()?,
            };
            Ok(found)
        })
        .await
    }

    async fn list_certificates(&self) -> Result<Vec<Certificate>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, student_name, course, issued_date, certificate_hash
                 FROM certificates
                 ORDER BY issued_date DESC, id DESC",
            )?;
            let certificates = stmt
                .query_map([], row_to_certificate)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(certificates)
        })
        .await
    }

    async fn count_non_genesis_blocks(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM blocks WHERE previous_hash != ?1",
                params![certchain_core::GENESIS_SENTINEL],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn get_block_by_hash(&self, hash: &ChainHash) -> Result<Option<Block>> {
        let hash = *hash;

        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {BLOCK_COLUMNS} FROM blocks WHERE current_hash = ?1 ORDER BY id LIMIT 1"
                ),
                params![hash.to_hex()],
                row_to_block,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn count_successors(&self, hash: &ChainHash) -> Result<u64> {
        let hash = *hash;

        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM blocks WHERE previous_hash = ?1",
                params![hash.to_hex()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    async fn list_blocks(&self) -> Result<Vec<Block>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {BLOCK_COLUMNS} FROM blocks ORDER BY id"))?;
            let blocks = stmt
                .query_map([], row_to_block)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(blocks)
        })
        .await
    }

    async fn tip(&self) -> Result<Option<Block>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {BLOCK_COLUMNS} FROM blocks ORDER BY id DESC LIMIT 1"),
                [],
                row_to_block,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certchain_core::IssueRequest;

    fn draft(subject: &str) -> DraftCertificate {
        IssueRequest::new(subject, "Course")
            .unwrap()
            .draft(Timestamp::now())
    }

    /// Insert certificate + block + finalize, the way the ledger does.
    async fn issue(store: &SqliteStore, subject: &str) -> (RecordId, ChainHash) {
        let draft = draft(subject);
        store
            .atomically(move |tx| {
                let id = tx.insert_certificate(&draft)?;
                let provisional = draft.assign_id(id);
                let tip = tx.chain_tip()?;
                let block =
                    NewBlock::seal(provisional.canonical_payload()?, tip, Timestamp::now());
                tx.insert_block(&block)?;
                tx.finalize_certificate(id, &block.current_hash)?;
                Ok((id, block.current_hash))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_block_is_genesis() {
        let store = SqliteStore::open_memory().unwrap();
        let (id, hash) = issue(&store, "Alice").await;
        assert_eq!(id, RecordId(1));

        let block = store.get_block_by_hash(&hash).await.unwrap().unwrap();
        assert_eq!(block.id, BlockId(1));
        assert!(block.is_genesis());
        assert_eq!(block.recompute_hash(), hash);
        assert_eq!(store.count_non_genesis_blocks().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tip_links_next_block() {
        let store = SqliteStore::open_memory().unwrap();
        let (_, first) = issue(&store, "Alice").await;
        let (_, second) = issue(&store, "Bob").await;

        let tip = store.tip().await.unwrap().unwrap();
        assert_eq!(tip.current_hash, second);
        assert_eq!(tip.previous_hash, PrevLink::Block(first));
        assert_eq!(store.count_successors(&first).await.unwrap(), 1);
        assert_eq!(store.count_successors(&second).await.unwrap(), 0);
        assert_eq!(store.count_non_genesis_blocks().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_certificate_by_hash_and_id() {
        let store = SqliteStore::open_memory().unwrap();
        let (id, hash) = issue(&store, "Alice").await;

        let by_hash = store
            .find_certificate(&Lookup::Hash(hash))
            .await
            .unwrap()
            .unwrap();
        let by_id = store.find_certificate(&Lookup::Id(id)).await.unwrap().unwrap();
        assert_eq!(by_hash, by_id);
        assert_eq!(by_hash.certificate.subject, "Alice");
        assert_eq!(by_hash.certificate.hash, hash);
        assert_eq!(by_hash.previous_hash, PrevLink::Genesis);

        let missing = store
            .find_certificate(&Lookup::Hash(certchain_core::digest(b"nope")))
            .await
            .unwrap();
        assert!(missing.is_none());
        assert!(store
            .find_certificate(&Lookup::Id(RecordId(42)))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_transaction_rolls_back() {
        let store = SqliteStore::open_memory().unwrap();
        let draft = draft("Mallory");

        let err = store
            .atomically(move |tx| {
                let id = tx.insert_certificate(&draft)?;
                let block = NewBlock::seal("{}".into(), tx.chain_tip()?, Timestamp::now());
                tx.insert_block(&block)?;
                tx.finalize_certificate(RecordId(id.0 + 100), &block.current_hash)?;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingRow(_)));

        assert!(store.list_certificates().await.unwrap().is_empty());
        assert!(store.list_blocks().await.unwrap().is_empty());
        assert!(store.tip().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unfinalized_certificate_is_not_anchored() {
        let store = SqliteStore::open_memory().unwrap();
        let draft = draft("Eve");
        let provisional = draft.provisional_hash;
        let id = store
            .atomically(move |tx| tx.insert_certificate(&draft))
            .await
            .unwrap();

        assert!(store.find_certificate(&Lookup::Id(id)).await.unwrap().is_none());
        let listed = store.list_certificates().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].hash, provisional);
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_chain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");

        let hash = {
            let store = SqliteStore::open(&path).unwrap();
            issue(&store, "Alice").await.1
        };

        let store = SqliteStore::open(&path).unwrap();
        let blocks = store.list_blocks().await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].current_hash, hash);

        let (id, _) = issue(&store, "Bob").await;
        assert_eq!(id, RecordId(2));
    }

    #[tokio::test]
    async fn test_corrupt_row_surfaces_as_error() {
        let store = SqliteStore::open_memory().unwrap();
        issue(&store, "Alice").await;
        store
            .with_conn(|conn| {
                conn.execute("UPDATE blocks SET timestamp = 'garbage'", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let err = store.list_blocks().await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
