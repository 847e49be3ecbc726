//! v001 -- Settings table.
//!
//! A single-row table holding the console settings as one JSON document.
//! New settings fields need no migration; missing keys take their defaults
//! when read.

use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS app_settings (
    id   INTEGER PRIMARY KEY CHECK (id = 1),
    json TEXT NOT NULL
);
"#;

pub fn up(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(UP_SQL)
}
