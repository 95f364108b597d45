use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::models::{Photo, PhotoSummary};

// Columns 0..=4 are the photo, the rest feed `PhotoSummary`.
// ?1 is always the viewing user's id (NULL for anonymous viewers).
const SUMMARY_SELECT: &str = "
    SELECT p.id, p.path, p.description, p.created_at, p.owner_id,
           u.username,
           (SELECT COUNT(*) FROM photo_likes l WHERE l.photo_id = p.id),
           (SELECT COUNT(*) FROM comments c WHERE c.photo_id = p.id AND c.active = 1),
           EXISTS(SELECT 1 FROM photo_likes l WHERE l.photo_id = p.id AND l.user_id = ?1)
    FROM photos p
    JOIN users u ON u.id = p.owner_id";

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        path: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        owner_id: row.get(4)?,
    })
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<PhotoSummary> {
    Ok(PhotoSummary {
        photo: photo_from_row(row)?,
        owner_username: row.get(5)?,
        like_count: row.get(6)?,
        comment_count: row.get(7)?,
        liked_by_viewer: row.get(8)?,
    })
}

pub fn create(
    conn: &Connection,
    owner_id: i64,
    path: &str,
    description: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO photos (path, description, owner_id) VALUES (?1, ?2, ?3)",
        params![path, description, owner_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Photo>> {
    conn.query_row(
        "SELECT id, path, description, created_at, owner_id FROM photos WHERE id = ?1",
        params![id],
        photo_from_row,
    )
    .optional()
}

pub fn find_summary(
    conn: &Connection,
    id: i64,
    viewer_id: Option<i64>,
) -> rusqlite::Result<Option<PhotoSummary>> {
    conn.query_row(
        &format!("{SUMMARY_SELECT} WHERE p.id = ?2"),
        params![viewer_id, id],
        summary_from_row,
    )
    .optional()
}

pub fn count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM photos", [], |r| r.get(0))
}

/// One page of the global feed, newest first.
pub fn feed_page(
    conn: &Connection,
    viewer_id: Option<i64>,
    limit: i64,
    offset: i64,
) -> rusqlite::Result<Vec<PhotoSummary>> {
    let mut stmt = conn.prepare(&format!(
        "{SUMMARY_SELECT} ORDER BY p.created_at DESC, p.id DESC LIMIT ?2 OFFSET ?3"
    ))?;
    let rows = stmt.query_map(params![viewer_id, limit, offset], summary_from_row)?;
    rows.collect()
}

/// The owner's own photos, newest first. The owner is also the viewer.
pub fn by_owner(conn: &Connection, owner_id: i64) -> rusqlite::Result<Vec<PhotoSummary>> {
    let mut stmt = conn.prepare(&format!(
        "{SUMMARY_SELECT} WHERE p.owner_id = ?1 ORDER BY p.created_at DESC, p.id DESC"
    ))?;
    let rows = stmt.query_map(params![owner_id], summary_from_row)?;
    rows.collect()
}

pub fn update_description(conn: &Connection, id: i64, description: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE photos SET description = ?1 WHERE id = ?2",
        params![description, id],
    )?;
    Ok(())
}

/// Delete a photo along with its comments and likes.
pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let rows = conn.execute("DELETE FROM photos WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

pub fn like(conn: &Connection, photo_id: i64, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO photo_likes (photo_id, user_id) VALUES (?1, ?2)",
        params![photo_id, user_id],
    )?;
    Ok(())
}

pub fn unlike(conn: &Connection, photo_id: i64, user_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM photo_likes WHERE photo_id = ?1 AND user_id = ?2",
        params![photo_id, user_id],
    )?;
    Ok(())
}

/// Ids of the users who like a photo, ascending.
pub fn likers(conn: &Connection, photo_id: i64) -> rusqlite::Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT user_id FROM photo_likes WHERE photo_id = ?1 ORDER BY user_id")?;
    let rows = stmt.query_map(params![photo_id], |r| r.get(0))?;
    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_pool;
    use crate::db::{comments, users};

    fn user(conn: &Connection, name: &str) -> i64 {
        users::create(conn, name, "hash", "").unwrap().unwrap()
    }

    fn set_created_at(conn: &Connection, id: i64, ts: &str) {
        conn.execute(
            "UPDATE photos SET created_at = ?1 WHERE id = ?2",
            params![ts, id],
        )
        .unwrap();
    }

    #[test]
    fn like_is_idempotent_and_unlike_is_a_noop_when_absent() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        let p = create(&conn, a, "sunset.png", "Sunset").unwrap();

        unlike(&conn, p, b).unwrap();
        assert!(likers(&conn, p).unwrap().is_empty());

        like(&conn, p, b).unwrap();
        like(&conn, p, b).unwrap();
        assert_eq!(likers(&conn, p).unwrap(), vec![b]);

        unlike(&conn, p, b).unwrap();
        assert!(likers(&conn, p).unwrap().is_empty());
    }

    #[test]
    fn feed_is_newest_first() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let a = user(&conn, "a");
        let old = create(&conn, a, "1.png", "old").unwrap();
        let newest = create(&conn, a, "2.png", "newest").unwrap();
        let middle = create(&conn, a, "3.png", "middle").unwrap();
        set_created_at(&conn, old, "2024-01-01 10:00:00.000");
        set_created_at(&conn, newest, "2024-03-01 10:00:00.000");
        set_created_at(&conn, middle, "2024-02-01 10:00:00.000");

        let ids: Vec<i64> = feed_page(&conn, None, 10, 0)
            .unwrap()
            .into_iter()
            .map(|s| s.photo.id)
            .collect();
        assert_eq!(ids, vec![newest, middle, old]);

        let second_page: Vec<i64> = feed_page(&conn, None, 2, 2)
            .unwrap()
            .into_iter()
            .map(|s| s.photo.id)
            .collect();
        assert_eq!(second_page, vec![old]);
    }

    #[test]
    fn summary_reports_counts_and_viewer_like() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        let p = create(&conn, a, "x.png", "x").unwrap();
        like(&conn, p, b).unwrap();
        comments::create(&conn, p, a, "nice").unwrap();

        let for_b = find_summary(&conn, p, Some(b)).unwrap().unwrap();
        assert_eq!(for_b.owner_username, "a");
        assert_eq!(for_b.like_count, 1);
        assert_eq!(for_b.comment_count, 1);
        assert!(for_b.liked_by_viewer);

        let anonymous = find_summary(&conn, p, None).unwrap().unwrap();
        assert!(!anonymous.liked_by_viewer);
        assert!(find_summary(&conn, p + 1, None).unwrap().is_none());
    }

    #[test]
    fn by_owner_only_lists_that_users_photos() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        create(&conn, a, "a1.png", "").unwrap();
        create(&conn, b, "b1.png", "").unwrap();
        create(&conn, a, "a2.png", "").unwrap();

        let mine = by_owner(&conn, a).unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|s| s.photo.owner_id == a));
        assert_eq!(count(&conn).unwrap(), 3);
    }

    #[test]
    fn deleting_photo_removes_comments_and_likes() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let a = user(&conn, "a");
        let b = user(&conn, "b");
        let p = create(&conn, a, "x.png", "x").unwrap();
        comments::create(&conn, p, b, "first").unwrap();
        comments::create(&conn, p, a, "second").unwrap();
        like(&conn, p, b).unwrap();

        assert!(delete(&conn, p).unwrap());
        let comment_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))
            .unwrap();
        let like_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM photo_likes", [], |r| r.get(0))
            .unwrap();
        assert_eq!(comment_rows, 0);
        assert_eq!(like_rows, 0);
    }

    #[test]
    fn update_description_leaves_other_fields() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let a = user(&conn, "a");
        let p = create(&conn, a, "x.png", "before").unwrap();
        let before = find(&conn, p).unwrap().unwrap();

        update_description(&conn, p, "after").unwrap();
        let after = find(&conn, p).unwrap().unwrap();
        assert_eq!(after.description, "after");
        assert_eq!(after.path, before.path);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.owner_id, before.owner_id);
    }
}
