//! SQL schema for the registrar SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS records (
    record_id   TEXT NOT NULL,
    kind        TEXT NOT NULL,   -- 'student' | 'teacher' | 'subject' | ...
    body        TEXT NOT NULL,   -- JSON object; reference fields hold raw ids
    created_at  TEXT NOT NULL,   -- ISO 8601 UTC; store-assigned
    updated_at  TEXT NOT NULL,
    PRIMARY KEY (kind, record_id)
);

-- Domain-key uniqueness. Key rows move in the same transaction as the
-- record row, so a collision aborts the whole insert or update.
CREATE TABLE IF NOT EXISTS unique_keys (
    kind       TEXT NOT NULL,
    field      TEXT NOT NULL,
    key_value  TEXT NOT NULL,   -- canonical JSON encoding of the key value
    record_id  TEXT NOT NULL,
    PRIMARY KEY (kind, field, key_value)
);

CREATE INDEX IF NOT EXISTS unique_keys_record_idx
    ON unique_keys(kind, record_id);

PRAGMA user_version = 1;
";
