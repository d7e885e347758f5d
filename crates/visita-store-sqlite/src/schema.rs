//! SQL schema for the official visits SQLite store.
//!
//! Executed once at connection startup; `PRAGMA user_version` records the
//! version so future migrations can be gated on it.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS` / `INSERT OR IGNORE`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- AUTOINCREMENT guarantees minted ids are never reused, even after a
-- rolled-back batch.
CREATE TABLE IF NOT EXISTS prison_time_slots (
    prison_time_slot_id INTEGER PRIMARY KEY AUTOINCREMENT,
    prison_code         TEXT NOT NULL,
    day_code            TEXT NOT NULL,        -- MON .. SUN
    start_time          TEXT NOT NULL,        -- HH:MM:SS
    end_time            TEXT NOT NULL,
    effective_date      TEXT NOT NULL,        -- YYYY-MM-DD
    expiry_date         TEXT,                 -- NULL = open-ended
    legacy_prison_code  TEXT,
    legacy_day_code     TEXT,
    legacy_sequence     INTEGER,
    created_by          TEXT NOT NULL,
    created_time        TEXT NOT NULL,        -- RFC 3339 UTC
    updated_by          TEXT,
    updated_time        TEXT,
    CHECK  (start_time < end_time),
    UNIQUE (legacy_prison_code, legacy_day_code, legacy_sequence)
);

CREATE TABLE IF NOT EXISTS prison_visit_slots (
    prison_visit_slot_id INTEGER PRIMARY KEY AUTOINCREMENT,
    prison_time_slot_id  INTEGER NOT NULL REFERENCES prison_time_slots(prison_time_slot_id),
    dps_location_id      TEXT NOT NULL,
    max_adults           INTEGER,
    max_groups           INTEGER,
    max_video_sessions   INTEGER,
    legacy_visit_slot_id INTEGER UNIQUE,
    created_by           TEXT NOT NULL,
    created_time         TEXT NOT NULL,
    updated_by           TEXT,
    updated_time         TEXT
);

CREATE TABLE IF NOT EXISTS official_visits (
    official_visit_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    prison_visit_slot_id INTEGER NOT NULL REFERENCES prison_visit_slots(prison_visit_slot_id),
    prison_code          TEXT NOT NULL,
    prisoner_number      TEXT NOT NULL,
    visit_date           TEXT NOT NULL,
    start_time           TEXT NOT NULL,
    end_time             TEXT NOT NULL,
    visit_type           TEXT NOT NULL,
    dps_location_id      TEXT NOT NULL,
    status               TEXT NOT NULL,
    completion_code      TEXT,
    search_type          TEXT,
    notes                TEXT,
    legacy_visit_id      INTEGER UNIQUE,
    created_by           TEXT NOT NULL,
    created_time         TEXT NOT NULL,
    updated_by           TEXT,
    updated_time         TEXT,
    CHECK (start_time < end_time),
    CHECK ((status IN ('SCHEDULED', 'EXPIRED')) = (completion_code IS NULL))
);

-- Visitors are only ever written through their visit.
CREATE TABLE IF NOT EXISTS official_visitors (
    official_visitor_id INTEGER PRIMARY KEY AUTOINCREMENT,
    official_visit_id   INTEGER NOT NULL REFERENCES official_visits(official_visit_id),
    visitor_type        TEXT NOT NULL,
    contact_id          INTEGER,
    prisoner_contact_id INTEGER,
    first_name          TEXT,
    last_name           TEXT,
    relationship_type   TEXT,
    relationship_code   TEXT,
    lead_visitor        INTEGER NOT NULL DEFAULT 0,
    assisted_visit      INTEGER NOT NULL DEFAULT 0,
    attendance          TEXT,
    notes               TEXT,
    legacy_person_id    INTEGER,
    created_by          TEXT NOT NULL,
    created_time        TEXT NOT NULL,
    updated_by          TEXT,
    updated_time        TEXT,
    UNIQUE (official_visit_id, legacy_person_id)
);

CREATE TABLE IF NOT EXISTS reference_codes (
    group_code  TEXT NOT NULL,
    code        TEXT NOT NULL,
    description TEXT NOT NULL,
    PRIMARY KEY (group_code, code)
);

INSERT OR IGNORE INTO reference_codes (group_code, code, description) VALUES
    ('RELATIONSHIP', 'SOL',  'Solicitor'),
    ('RELATIONSHIP', 'BAR',  'Barrister'),
    ('RELATIONSHIP', 'LEG',  'Legal representative'),
    ('RELATIONSHIP', 'POL',  'Police officer'),
    ('RELATIONSHIP', 'PROB', 'Probation officer'),
    ('RELATIONSHIP', 'SW',   'Social worker');

CREATE INDEX IF NOT EXISTS time_slots_prison_day_idx ON prison_time_slots(prison_code, day_code);
CREATE INDEX IF NOT EXISTS visit_slots_time_slot_idx ON prison_visit_slots(prison_time_slot_id);
CREATE INDEX IF NOT EXISTS visits_slot_date_idx      ON official_visits(prison_visit_slot_id, visit_date);
CREATE INDEX IF NOT EXISTS visits_prison_date_idx    ON official_visits(prison_code, visit_date);
CREATE INDEX IF NOT EXISTS visitors_visit_idx        ON official_visitors(official_visit_id);

PRAGMA user_version = 1;
";
