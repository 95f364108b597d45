use rusqlite::{params, Connection};

use crate::db::models::{Comment, CommentWithAuthor};

pub fn create(
    conn: &Connection,
    photo_id: i64,
    author_id: i64,
    content: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO comments (content, photo_id, author_id) VALUES (?1, ?2, ?3)",
        params![content, photo_id, author_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Active comments on a photo, oldest first.
pub fn for_photo(conn: &Connection, photo_id: i64) -> rusqlite::Result<Vec<CommentWithAuthor>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.content, c.created_at, c.photo_id, c.author_id, c.active, u.username
         FROM comments c
         JOIN users u ON u.id = c.author_id
         WHERE c.photo_id = ?1 AND c.active = 1
         ORDER BY c.created_at ASC, c.id ASC",
    )?;

    let rows = stmt.query_map(params![photo_id], |row| {
        Ok(CommentWithAuthor {
            comment: Comment {
                id: row.get(0)?,
                content: row.get(1)?,
                created_at: row.get(2)?,
                photo_id: row.get(3)?,
                author_id: row.get(4)?,
                active: row.get(5)?,
            },
            author_username: row.get(6)?,
        })
    })?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_pool;
    use crate::db::{photos, users};

    #[test]
    fn comments_default_to_active_and_list_in_order() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let owner = users::create(&conn, "owner", "h", "").unwrap().unwrap();
        let guest = users::create(&conn, "guest", "h", "").unwrap().unwrap();
        let photo = photos::create(&conn, owner, "p.png", "").unwrap();

        create(&conn, photo, guest, "first").unwrap();
        create(&conn, photo, owner, "second").unwrap();

        let listed = for_photo(&conn, photo).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].comment.content, "first");
        assert_eq!(listed[0].author_username, "guest");
        assert!(listed[0].comment.active);
        assert_eq!(listed[1].author_username, "owner");
    }

    #[test]
    fn inactive_comments_are_hidden() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let owner = users::create(&conn, "owner", "h", "").unwrap().unwrap();
        let photo = photos::create(&conn, owner, "p.png", "").unwrap();
        let hidden = create(&conn, photo, owner, "spam").unwrap();
        create(&conn, photo, owner, "kept").unwrap();
        conn.execute(
            "UPDATE comments SET active = 0 WHERE id = ?1",
            params![hidden],
        )
        .unwrap();

        let listed = for_photo(&conn, photo).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].comment.content, "kept");
    }

    #[test]
    fn deleting_author_removes_their_comments() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let owner = users::create(&conn, "owner", "h", "").unwrap().unwrap();
        let guest = users::create(&conn, "guest", "h", "").unwrap().unwrap();
        let photo = photos::create(&conn, owner, "p.png", "").unwrap();
        create(&conn, photo, guest, "bye").unwrap();

        users::delete(&conn, guest).unwrap();
        assert!(for_photo(&conn, photo).unwrap().is_empty());
    }
}
