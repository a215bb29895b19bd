//! SQL schema for the Sightline SQLite store.
//!
//! Executed once at connection startup. The schema only ever grows: new
//! tables and columns are added behind `PRAGMA user_version`, and a new AI
//! model is a new `model_name` value, never a new column.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS keywords (
    keyword_id  TEXT PRIMARY KEY,
    text        TEXT NOT NULL UNIQUE,   -- trimmed, lower-cased
    created_at  TEXT NOT NULL
);

-- keyword_id is a weak reference: rows survive without their keyword and are
-- reported as orphans instead.
CREATE TABLE IF NOT EXISTS rankings (
    keyword_id   TEXT NOT NULL,
    domain       TEXT NOT NULL,
    check_date   TEXT NOT NULL,         -- YYYY-MM-DD
    position     INTEGER CHECK (position IS NULL OR position >= 1),  -- NULL = unranked
    observed_url TEXT,
    recorded_at  TEXT NOT NULL,
    PRIMARY KEY (keyword_id, domain, check_date)
);

-- One row per model answer. `mentioned` is always derived from answer_text.
CREATE TABLE IF NOT EXISTS mentions (
    keyword      TEXT NOT NULL,
    check_date   TEXT NOT NULL,
    model_name   TEXT NOT NULL,
    answer_text  TEXT NOT NULL,
    mentioned    INTEGER NOT NULL CHECK (mentioned IN (0, 1)),
    recorded_at  TEXT NOT NULL,
    PRIMARY KEY (keyword, check_date, model_name)
);

CREATE TABLE IF NOT EXISTS sitemaps (
    sitemap_url          TEXT PRIMARY KEY,
    status               TEXT NOT NULL DEFAULT 'pending',
    last_processed       TEXT,
    last_attempted       TEXT,
    consecutive_failures INTEGER NOT NULL DEFAULT 0,
    last_error           TEXT,
    registered_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS urls (
    url            TEXT PRIMARY KEY,
    sitemap_url    TEXT NOT NULL REFERENCES sitemaps(sitemap_url),
    word_count     INTEGER,
    date_published TEXT,
    date_modified  TEXT,
    last_checked   TEXT NOT NULL,
    discovery_date TEXT NOT NULL,
    domain_name    TEXT NOT NULL,
    status         TEXT NOT NULL,
    last_processed TEXT,
    missed_runs    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS url_analysis (
    url                  TEXT PRIMARY KEY REFERENCES urls(url) ON DELETE CASCADE,
    summary              TEXT NOT NULL,
    category             TEXT NOT NULL,
    primary_keyword      TEXT NOT NULL,
    estimated_word_count INTEGER NOT NULL,
    analysis_version     INTEGER NOT NULL,
    last_analyzed        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS rankings_date_idx   ON rankings(check_date);
CREATE INDEX IF NOT EXISTS mentions_date_idx   ON mentions(check_date);
CREATE INDEX IF NOT EXISTS mentions_model_idx  ON mentions(model_name);
CREATE INDEX IF NOT EXISTS urls_sitemap_idx    ON urls(sitemap_url);
CREATE INDEX IF NOT EXISTS urls_domain_idx     ON urls(domain_name);

PRAGMA user_version = 1;
";
