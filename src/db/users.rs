use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::User;

const USER_COLUMNS: &str =
    "id, username, password_hash, email, first_name, last_name, date_joined";

fn from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        email: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        date_joined: row.get(6)?,
    })
}

/// Insert a user. Returns `Ok(None)` when the username is already taken.
pub fn create(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    email: &str,
) -> rusqlite::Result<Option<i64>> {
    let inserted = conn.execute(
        "INSERT INTO users (username, password_hash, email) VALUES (?1, ?2, ?3)
         ON CONFLICT(username) DO NOTHING",
        params![username, password_hash, email],
    )?;
    if inserted == 0 {
        return Ok(None);
    }
    Ok(Some(conn.last_insert_rowid()))
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        from_row,
    )
    .optional()
}

pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
        params![username],
        from_row,
    )
    .optional()
}

pub fn update_profile(
    conn: &Connection,
    id: i64,
    first_name: &str,
    last_name: &str,
    email: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3 WHERE id = ?4",
        params![first_name, last_name, email, id],
    )?;
    Ok(())
}

pub fn set_password_hash(conn: &Connection, id: i64, password_hash: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, id],
    )?;
    Ok(())
}

/// Delete a user; photos, comments, likes and sessions go with it.
pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}
