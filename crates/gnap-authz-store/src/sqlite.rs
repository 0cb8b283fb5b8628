//! SQLite implementation of the SessionStore trait.
//!
//! Uses rusqlite with bundled SQLite, wrapped in async via
//! `tokio::task::spawn_blocking`. One connection behind a mutex serializes
//! every operation; compound updates additionally run in a transaction so a
//! failure part way leaves nothing behind.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use gnap_authz_core::{
    now_millis, AccessDescriptor, AccessToken, ClientId, ClientKey, ContinueToken,
    Ed25519PublicKey, ProofMethod, Session, TokenFlag, TokenRequest, TokenValue,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{ContinuationGrant, SessionLookup, SessionStore};

/// SQLite-based session store.
pub struct SqliteSessionStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(mut conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Task(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn invalid(what: &str, e: impl std::fmt::Display) -> StoreError {
    StoreError::InvalidData(format!("{}: {}", what, e))
}

/// Raw `sessions` row.
struct SessionRow {
    client_id: String,
    public_key: Vec<u8>,
    proof: String,
    continue_token: Option<String>,
    continue_issued_at: Option<i64>,
    pending: Vec<u8>,
    created_at: i64,
}

/// Raw `access_tokens` row.
struct TokenRow {
    value: String,
    access: Vec<u8>,
    flags: Vec<u8>,
    label: Option<String>,
    issued_at: i64,
    expires_at: Option<i64>,
}

impl TokenRow {
    fn into_token(self) -> Result<AccessToken> {
        Ok(AccessToken {
            value: TokenValue::from_hex(&self.value).map_err(|e| invalid("token value", e))?,
            access: decode::<Vec<AccessDescriptor>>(&self.access)?,
            flags: decode::<BTreeSet<TokenFlag>>(&self.flags)?,
            label: self.label,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
        })
    }
}

/// Load a full session by hex client id.
fn load_session(conn: &Connection, client_id: &str) -> Result<Option<Session>> {
    let row = conn
        .query_row(
            "SELECT client_id, public_key, proof, continue_token, continue_issued_at,
                    pending, created_at
             FROM sessions WHERE client_id = ?1",
            params![client_id],
            |row| {
                Ok(SessionRow {
                    client_id: row.get(0)?,
                    public_key: row.get(1)?,
                    proof: row.get(2)?,
                    continue_token: row.get(3)?,
                    continue_issued_at: row.get(4)?,
                    pending: row.get(5)?,
                    created_at: row.get(6)?,
                })
            },
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let public_key: [u8; 32] = row
        .public_key
        .try_into()
        .map_err(|_| StoreError::InvalidData("public key is not 32 bytes".into()))?;

    let continue_token = match (row.continue_token, row.continue_issued_at) {
        (Some(value), Some(issued_at)) => Some(ContinueToken {
            value: TokenValue::from_hex(&value).map_err(|e| invalid("continue token", e))?,
            issued_at,
        }),
        _ => None,
    };

    let mut stmt = conn.prepare(
        "SELECT value, access, flags, label, issued_at, expires_at
         FROM access_tokens WHERE client_id = ?1 ORDER BY issued_seq",
    )?;
    let access_tokens = stmt
        .query_map(params![client_id], |row| {
            Ok(TokenRow {
                value: row.get(0)?,
                access: row.get(1)?,
                flags: row.get(2)?,
                label: row.get(3)?,
                issued_at: row.get(4)?,
                expires_at: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?
        .into_iter()
        .map(TokenRow::into_token)
        .collect::<Result<Vec<_>>>()?;

    let mut stmt = conn.prepare("SELECT name, value FROM subject_data WHERE client_id = ?1")?;
    let subject_data = stmt
        .query_map(params![client_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<BTreeMap<String, String>>>()?;

    Ok(Some(Session {
        client_id: ClientId::from_hex(&row.client_id).map_err(|e| invalid("client id", e))?,
        client_key: ClientKey::new(
            Ed25519PublicKey::from_bytes(public_key),
            ProofMethod::from(row.proof),
        ),
        continue_token,
        access_tokens,
        pending_requests: decode(&row.pending)?,
        subject_data,
        created_at: row.created_at,
    }))
}

/// Find the owning client id with a single-parameter query, then load it.
fn load_session_where(conn: &Connection, sql: &str, param: &str) -> Result<Option<Session>> {
    let client_id: Option<String> = conn
        .query_row(sql, params![param], |row| row.get(0))
        .optional()?;
    match client_id {
        Some(id) => load_session(conn, &id),
        None => Ok(None),
    }
}

fn session_exists(conn: &Connection, client_id: &str) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM sessions WHERE client_id = ?1",
            params![client_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn token_exists(conn: &Connection, value: &str) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM access_tokens WHERE value = ?1",
            params![value],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn insert_token(conn: &Connection, token: &AccessToken, client_id: &str) -> Result<()> {
    let next_seq: i64 = conn.query_row(
        "SELECT COALESCE(MAX(issued_seq), 0) + 1 FROM access_tokens WHERE client_id = ?1",
        params![client_id],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO access_tokens (
            value, client_id, issued_seq, access, flags, label, issued_at, expires_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            token.value.to_hex(),
            client_id,
            next_seq,
            encode(&token.access)?,
            encode(&token.flags)?,
            token.label,
            token.issued_at,
            token.expires_at,
        ],
    )?;
    Ok(())
}

fn merge_subject_data(
    conn: &Connection,
    data: &BTreeMap<String, String>,
    client_id: &str,
) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO subject_data (client_id, name, value) VALUES (?1, ?2, ?3)
         ON CONFLICT(client_id, name) DO UPDATE SET value = excluded.value",
    )?;
    for (name, value) in data {
        stmt.execute(params![client_id, name, value])?;
    }
    Ok(())
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get_by_id(&self, id: &ClientId) -> Result<Option<Session>> {
        let id = id.to_hex();
        self.blocking(move |conn| load_session(conn, &id)).await
    }

    async fn get_by_key(&self, key: &ClientKey) -> Result<Option<Session>> {
        let fingerprint = key.fingerprint();
        self.blocking(move |conn| {
            let client_id: Option<String> = conn
                .query_row(
                    "SELECT client_id FROM sessions WHERE key_fingerprint = ?1",
                    params![fingerprint.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            match client_id {
                Some(id) => load_session(conn, &id),
                None => Ok(None),
            }
        })
        .await
    }

    async fn get_or_create_by_key(&self, key: &ClientKey) -> Result<SessionLookup> {
        let key = key.clone();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let fingerprint = key.fingerprint();

            let existing: Option<String> = tx
                .query_row(
                    "SELECT client_id FROM sessions WHERE key_fingerprint = ?1",
                    params![fingerprint.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(id) = existing {
                let session = load_session(&tx, &id)?
                    .ok_or_else(|| StoreError::InvalidData(format!("session {} vanished", id)))?;
                return Ok(SessionLookup::Existing(session));
            }

            let id = loop {
                let candidate = ClientId::generate();
                if !session_exists(&tx, &candidate.to_hex())? {
                    break candidate;
                }
            };
            let session = Session::new(id, key, now_millis());

            tx.execute(
                "INSERT INTO sessions (
                    client_id, key_fingerprint, public_key, proof, pending, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_hex(),
                    fingerprint.as_bytes().as_slice(),
                    session.client_key.public_key.as_bytes().as_slice(),
                    session.client_key.proof.as_str(),
                    encode(&session.pending_requests)?,
                    session.created_at,
                ],
            )?;
            tx.commit()?;

            tracing::debug!(client_id = %id, key = %fingerprint, "created session");
            Ok(SessionLookup::Created(session))
        })
        .await
    }

    async fn get_by_continue_token(&self, token: &TokenValue) -> Result<Option<Session>> {
        let token = token.to_hex();
        self.blocking(move |conn| {
            load_session_where(
                conn,
                "SELECT client_id FROM sessions WHERE continue_token = ?1",
                &token,
            )
        })
        .await
    }

    async fn get_by_access_token(
        &self,
        token: &TokenValue,
    ) -> Result<Option<(Session, AccessToken)>> {
        let value = *token;
        self.blocking(move |conn| {
            let session = load_session_where(
                conn,
                "SELECT client_id FROM access_tokens WHERE value = ?1",
                &value.to_hex(),
            )?;
            Ok(session.and_then(|s| s.access_token(&value).cloned().map(|t| (s, t))))
        })
        .await
    }

    async fn session_count(&self) -> Result<usize> {
        self.blocking(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }

    async fn set_continue_token(&self, token: ContinueToken, id: &ClientId) -> Result<()> {
        let id = *id;
        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE sessions SET continue_token = ?1, continue_issued_at = ?2
                 WHERE client_id = ?3",
                params![token.value.to_hex(), token.issued_at, id.to_hex()],
            )?;
            if updated == 0 {
                return Err(StoreError::SessionNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn save_requests(&self, requests: Vec<TokenRequest>, id: &ClientId) -> Result<()> {
        let id = *id;
        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE sessions SET pending = ?1 WHERE client_id = ?2",
                params![encode(&requests)?, id.to_hex()],
            )?;
            if updated == 0 {
                return Err(StoreError::SessionNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn save_subject_data(
        &self,
        data: BTreeMap<String, String>,
        id: &ClientId,
    ) -> Result<()> {
        let id = *id;
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let client_id = id.to_hex();
            if !session_exists(&tx, &client_id)? {
                return Err(StoreError::SessionNotFound(id));
            }
            merge_subject_data(&tx, &data, &client_id)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn add_token(&self, token: AccessToken, id: &ClientId) -> Result<()> {
        let id = *id;
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let client_id = id.to_hex();
            if !session_exists(&tx, &client_id)? {
                return Err(StoreError::SessionNotFound(id));
            }
            if token_exists(&tx, &token.value.to_hex())? {
                return Err(StoreError::DuplicateToken);
            }
            insert_token(&tx, &token, &client_id)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn revoke_access_token(&self, token: &TokenValue) -> Result<bool> {
        let value = token.to_hex();
        self.blocking(move |conn| {
            let removed = conn.execute(
                "DELETE FROM access_tokens WHERE value = ?1",
                params![value],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn begin_continuation(
        &self,
        token: ContinueToken,
        pending: Vec<TokenRequest>,
        id: &ClientId,
    ) -> Result<()> {
        let id = *id;
        self.blocking(move |conn| {
            let updated = conn.execute(
                "UPDATE sessions
                 SET continue_token = ?1, continue_issued_at = ?2, pending = ?3
                 WHERE client_id = ?4",
                params![
                    token.value.to_hex(),
                    token.issued_at,
                    encode(&pending)?,
                    id.to_hex()
                ],
            )?;
            if updated == 0 {
                return Err(StoreError::SessionNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn redeem_continuation(
        &self,
        token: &TokenValue,
        grant: ContinuationGrant,
        id: &ClientId,
    ) -> Result<Vec<AccessToken>> {
        let token = *token;
        let id = *id;
        let mut grant = grant;
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let client_id = id.to_hex();

            let row: Option<(Option<String>, Vec<u8>)> = tx
                .query_row(
                    "SELECT continue_token, pending FROM sessions WHERE client_id = ?1",
                    params![client_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((current, pending)) = row else {
                return Err(StoreError::SessionNotFound(id));
            };
            if current.as_deref() != Some(token.to_hex().as_str()) {
                return Err(StoreError::StaleContinuation(id));
            }

            let pending: Vec<TokenRequest> = decode(&pending)?;
            grant.retain_requested(&pending);

            let mut seen = HashSet::new();
            for minted in &grant.tokens {
                if !seen.insert(minted.value) || token_exists(&tx, &minted.value.to_hex())? {
                    return Err(StoreError::DuplicateToken);
                }
            }

            tx.execute(
                "UPDATE sessions
                 SET continue_token = NULL, continue_issued_at = NULL, pending = ?1
                 WHERE client_id = ?2",
                params![encode(&Vec::<TokenRequest>::new())?, client_id],
            )?;
            merge_subject_data(&tx, &grant.subject_data, &client_id)?;
            for minted in &grant.tokens {
                insert_token(&tx, minted, &client_id)?;
            }
            tx.commit()?;

            Ok(grant.tokens)
        })
        .await
    }
}
