use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "campus.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS config(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            pass_hash TEXT NOT NULL,
            pass_salt TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            aadhaar TEXT NOT NULL UNIQUE,
            dob TEXT NOT NULL,
            roll_no TEXT NOT NULL,
            class TEXT NOT NULL,
            section TEXT NOT NULL,
            is_blocked INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_section ON students(class, section)",
        [],
    )?;

    // The guardian/address fields arrived after the first schema; every
    // registry, fresh or old, gets them added in place.
    ensure_students_profile_columns(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            staff_id TEXT NOT NULL UNIQUE,
            pin_hash TEXT NOT NULL,
            pin_salt TEXT NOT NULL,
            assigned_class TEXT NOT NULL,
            section TEXT NOT NULL,
            section_category TEXT NOT NULL,
            teacher_role TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_section ON teachers(assigned_class, section)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS notifications(
            id TEXT PRIMARY KEY,
            subject TEXT NOT NULL,
            content TEXT NOT NULL,
            sender_name TEXT NOT NULL,
            targets TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_events(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            target_classes TEXT NOT NULL,
            datesheet_url TEXT,
            syllabus_url TEXT,
            note TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_students_profile_columns(conn: &Connection) -> anyhow::Result<()> {
    for col in [
        "father_name",
        "mother_name",
        "address",
        "admission_since",
        "admission_class",
    ] {
        if !table_has_column(conn, "students", col)? {
            conn.execute(
                &format!("ALTER TABLE students ADD COLUMN {} TEXT", col),
                [],
            )?;
        }
    }
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM config WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO config(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    const PROFILE_COLUMNS: [&str; 5] = [
        "father_name",
        "mother_name",
        "address",
        "admission_since",
        "admission_class",
    ];

    fn temp_workspace() -> std::path::PathBuf {
        let p = std::env::temp_dir().join(format!(
            "campus-db-{}",
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn fresh_registries_carry_the_profile_columns() {
        let workspace = temp_workspace();
        let conn = open_db(&workspace).expect("open");
        for col in PROFILE_COLUMNS {
            assert!(table_has_column(&conn, "students", col).expect("pragma"));
        }
        drop(conn);
        let _ = std::fs::remove_dir_all(workspace);
    }

    #[test]
    fn first_schema_registries_are_migrated_in_place() {
        let workspace = temp_workspace();
        {
            let conn = Connection::open(workspace.join(DB_FILE)).expect("seed");
            conn.execute(
                "CREATE TABLE students(
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    aadhaar TEXT NOT NULL UNIQUE,
                    dob TEXT NOT NULL,
                    roll_no TEXT NOT NULL,
                    class TEXT NOT NULL,
                    section TEXT NOT NULL,
                    is_blocked INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                )",
                [],
            )
            .expect("seed schema");
            conn.execute(
                "INSERT INTO students(id, name, aadhaar, dob, roll_no, class, section, created_at)
                 VALUES('s1', 'Ravi', '111122223333', '2014-06-01', '12', '5', 'B', 'then')",
                [],
            )
            .expect("seed row");
        }

        let conn = open_db(&workspace).expect("reopen");
        for col in PROFILE_COLUMNS {
            assert!(table_has_column(&conn, "students", col).expect("pragma"));
        }
        // The old row survives with the new fields null.
        let father: Option<String> = conn
            .query_row(
                "SELECT father_name FROM students WHERE id = 's1'",
                [],
                |r| r.get(0),
            )
            .expect("old row");
        assert_eq!(father, None);

        drop(conn);
        let _ = std::fs::remove_dir_all(workspace);
    }
}
