use rusqlite::Connection;

/// Pragmas shared by every journal connection. Read-only handles leave the
/// journal mode alone since switching it needs a write.
pub fn configure_connection(conn: &Connection, read_only: bool) -> rusqlite::Result<()> {
    if !read_only {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;\n\
             PRAGMA synchronous = NORMAL;\n",
        )?;
    }
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;\n\
         PRAGMA temp_store = MEMORY;\n\
         PRAGMA busy_timeout = 5000;\n",
    )
}
