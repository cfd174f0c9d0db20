//! Canonical SQLite schema for inforequests.
//!
//! - `obligees` holds the current obligee rows; every insert or update writes
//!   an immutable row into `obligee_snapshots` through triggers
//! - `inforequests` own `branches` and `action_drafts` (cascade)
//! - `branches` own `actions` (cascade); an advancement's spawned branches
//!   point back at it through `branches.advanced_by_id`
//! - `messages`/`recipients` keep the correspondence bound to actions
//! - `store_meta` tracks the schema version and the last expiration sweep

/// Migration v1: core tables, snapshot triggers, and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS obligees (
    obligee_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(trim(name)) > 0),
    street TEXT NOT NULL DEFAULT '',
    city TEXT NOT NULL DEFAULT '',
    zip TEXT NOT NULL DEFAULT '',
    emails TEXT NOT NULL DEFAULT '',
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS obligee_snapshots (
    snapshot_id INTEGER PRIMARY KEY AUTOINCREMENT,
    obligee_id INTEGER NOT NULL REFERENCES obligees(obligee_id),
    name TEXT NOT NULL,
    street TEXT NOT NULL,
    city TEXT NOT NULL,
    zip TEXT NOT NULL,
    emails TEXT NOT NULL,
    created_at_us INTEGER NOT NULL
);

CREATE TRIGGER IF NOT EXISTS obligees_snapshot_ai
AFTER INSERT ON obligees
BEGIN
    INSERT INTO obligee_snapshots (obligee_id, name, street, city, zip, emails, created_at_us)
    VALUES (new.obligee_id, new.name, new.street, new.city, new.zip, new.emails, new.updated_at_us);
END;

CREATE TRIGGER IF NOT EXISTS obligees_snapshot_au
AFTER UPDATE ON obligees
BEGIN
    INSERT INTO obligee_snapshots (obligee_id, name, street, city, zip, emails, created_at_us)
    VALUES (new.obligee_id, new.name, new.street, new.city, new.zip, new.emails, new.updated_at_us);
END;

CREATE TRIGGER IF NOT EXISTS obligee_snapshots_immutable
BEFORE UPDATE ON obligee_snapshots
BEGIN
    SELECT RAISE(ABORT, 'obligee snapshots are append-only');
END;

CREATE TRIGGER IF NOT EXISTS obligee_snapshots_undeletable
BEFORE DELETE ON obligee_snapshots
BEGIN
    SELECT RAISE(ABORT, 'obligee snapshots are append-only');
END;

CREATE TABLE IF NOT EXISTS inforequests (
    inforequest_id INTEGER PRIMARY KEY AUTOINCREMENT,
    applicant TEXT NOT NULL,
    subject TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    unique_email TEXT UNIQUE,
    submission_date TEXT NOT NULL,
    closed INTEGER NOT NULL DEFAULT 0 CHECK (closed IN (0, 1)),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    message_id INTEGER PRIMARY KEY AUTOINCREMENT,
    direction TEXT NOT NULL CHECK (direction IN ('inbound', 'outbound')),
    from_name TEXT NOT NULL DEFAULT '',
    from_mail TEXT NOT NULL,
    subject TEXT NOT NULL DEFAULT '',
    text TEXT NOT NULL DEFAULT '',
    processed_at_us INTEGER
);

CREATE TABLE IF NOT EXISTS recipients (
    recipient_id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id INTEGER NOT NULL REFERENCES messages(message_id) ON DELETE CASCADE,
    name TEXT NOT NULL DEFAULT '',
    mail TEXT NOT NULL CHECK (length(trim(mail)) > 0),
    kind TEXT NOT NULL CHECK (kind IN ('to', 'cc', 'bcc'))
);

CREATE TABLE IF NOT EXISTS branches (
    branch_id INTEGER PRIMARY KEY AUTOINCREMENT,
    inforequest_id INTEGER NOT NULL REFERENCES inforequests(inforequest_id) ON DELETE CASCADE,
    obligee_id INTEGER NOT NULL REFERENCES obligees(obligee_id),
    snapshot_id INTEGER NOT NULL REFERENCES obligee_snapshots(snapshot_id),
    advanced_by_id INTEGER REFERENCES actions(action_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS actions (
    action_id INTEGER PRIMARY KEY AUTOINCREMENT,
    branch_id INTEGER NOT NULL REFERENCES branches(branch_id) ON DELETE CASCADE,
    position INTEGER NOT NULL CHECK (position > 0),
    action_type TEXT NOT NULL CHECK (action_type IN (
        'request', 'clarification_request', 'clarification_response', 'confirmation',
        'extension', 'advancement', 'disclosure', 'refusal', 'appeal', 'affirmation',
        'reversion', 'remandment', 'advanced_request', 'expiration', 'appeal_expiration'
    )),
    subject TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    effective_date TEXT NOT NULL,
    deadline_days INTEGER CHECK (deadline_days IS NULL OR deadline_days >= 0),
    extension_days INTEGER CHECK (extension_days IS NULL OR extension_days >= 0),
    disclosure_level TEXT CHECK (disclosure_level IS NULL OR disclosure_level IN ('none', 'partial', 'full')),
    message_id INTEGER REFERENCES messages(message_id) ON DELETE SET NULL,
    created_at_us INTEGER NOT NULL,
    UNIQUE (branch_id, position),
    CHECK (disclosure_level IS NULL OR action_type = 'disclosure')
);

CREATE TABLE IF NOT EXISTS action_drafts (
    draft_id INTEGER PRIMARY KEY AUTOINCREMENT,
    inforequest_id INTEGER NOT NULL REFERENCES inforequests(inforequest_id) ON DELETE CASCADE,
    branch_id INTEGER REFERENCES branches(branch_id) ON DELETE CASCADE,
    action_type TEXT NOT NULL,
    subject TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL DEFAULT '',
    effective_date TEXT,
    deadline_days INTEGER,
    disclosure_level TEXT,
    obligee_ids TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_sweep_at_us INTEGER
);

INSERT OR IGNORE INTO store_meta (id, schema_version, last_sweep_at_us)
VALUES (1, 1, NULL);
";

/// Migration v2: read-path indexes for branch listings and batch loaders.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_obligee_snapshots_obligee_created
    ON obligee_snapshots(obligee_id, created_at_us DESC, snapshot_id DESC);

CREATE INDEX IF NOT EXISTS idx_branches_inforequest
    ON branches(inforequest_id);

CREATE INDEX IF NOT EXISTS idx_branches_obligee
    ON branches(obligee_id);

CREATE INDEX IF NOT EXISTS idx_branches_snapshot
    ON branches(snapshot_id);

CREATE INDEX IF NOT EXISTS idx_branches_advanced_by
    ON branches(advanced_by_id);

CREATE INDEX IF NOT EXISTS idx_actions_message
    ON actions(message_id);

CREATE INDEX IF NOT EXISTS idx_recipients_message
    ON recipients(message_id);

CREATE INDEX IF NOT EXISTS idx_action_drafts_inforequest
    ON action_drafts(inforequest_id, branch_id);

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by the listing and batch-loading query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_obligee_snapshots_obligee_created",
    "idx_branches_inforequest",
    "idx_branches_obligee",
    "idx_branches_snapshot",
    "idx_branches_advanced_by",
    "idx_actions_message",
    "idx_recipients_message",
    "idx_action_drafts_inforequest",
];
