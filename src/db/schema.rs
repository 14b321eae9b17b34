//! Database schema and migrations for depot.
//!
//! Migrations are applied sequentially when the database is first opened
//! or upgraded.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: File metadata
    r#"
-- One row per stored blob. AUTOINCREMENT keeps ids from ever being reused.
CREATE TABLE files (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    original_name   TEXT NOT NULL,
    generated_name  TEXT NOT NULL UNIQUE,
    upload_date     TEXT NOT NULL,
    downloads       INTEGER NOT NULL DEFAULT 0 CHECK (downloads >= 0)
);

CREATE INDEX idx_files_upload_date ON files(upload_date);
"#,
];
