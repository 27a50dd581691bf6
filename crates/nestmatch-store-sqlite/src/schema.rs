//! SQL schema for the nestmatch SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id      TEXT PRIMARY KEY,
    email        TEXT NOT NULL UNIQUE,
    household_id TEXT REFERENCES households(household_id),   -- NULL when unaffiliated
    preferences  TEXT NOT NULL DEFAULT '{\"cities\":[],\"neighborhoods\":[]}',
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY,    -- hex SHA-256 of the bearer token
    user_id      TEXT NOT NULL REFERENCES users(user_id),
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS households (
    household_id TEXT PRIMARY KEY,
    name         TEXT NOT NULL,
    created_by   TEXT NOT NULL REFERENCES users(user_id),
    member_count INTEGER NOT NULL DEFAULT 0 CHECK (member_count >= 0),
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS invitations (
    token         TEXT PRIMARY KEY,
    household_id  TEXT NOT NULL REFERENCES households(household_id),
    invited_email TEXT NOT NULL,
    created_by    TEXT NOT NULL REFERENCES users(user_id),
    status        TEXT NOT NULL,   -- 'pending' | 'accepted' | 'expired' | 'revoked' | 'superseded'
    accepted_by   TEXT REFERENCES users(user_id),
    created_at    TEXT NOT NULL,
    expires_at    TEXT NOT NULL
);

-- At most one live invitation per (household, email).
CREATE UNIQUE INDEX IF NOT EXISTS invitations_pending_idx
    ON invitations(household_id, invited_email) WHERE status = 'pending';

-- Interactions are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS interactions (
    interaction_id   INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id          TEXT NOT NULL REFERENCES users(user_id),
    household_id     TEXT,            -- household at swipe time, may be NULL
    property_id      TEXT NOT NULL,
    interaction_type TEXT NOT NULL CHECK (interaction_type IN ('like', 'dislike')),
    created_at       TEXT NOT NULL    -- fixed-width RFC 3339 UTC; server-assigned
);

CREATE TABLE IF NOT EXISTS resolutions (
    household_id        TEXT NOT NULL REFERENCES households(household_id),
    property_id         TEXT NOT NULL,
    resolved_by         TEXT NOT NULL REFERENCES users(user_id),
    resolved_at         TEXT NOT NULL,
    last_interaction_id INTEGER NOT NULL,
    PRIMARY KEY (household_id, property_id)
);

-- Listing records, written by the ingestion side.
CREATE TABLE IF NOT EXISTS properties (
    property_id     TEXT PRIMARY KEY,
    address         TEXT NOT NULL,
    city            TEXT NOT NULL,
    state           TEXT NOT NULL,
    neighborhood_id TEXT,
    price           INTEGER,
    bedrooms        INTEGER
);

CREATE INDEX IF NOT EXISTS users_household_idx      ON users(household_id);
CREATE INDEX IF NOT EXISTS interactions_latest_idx  ON interactions(user_id, property_id, created_at, interaction_id);

PRAGMA user_version = 1;
";
