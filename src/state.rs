use std::path::Path;

use crate::models::{Bookmark, LibraryItem};
use crate::sync::ReaderQuery;
use chrono::Utc;
use eyre::Result;
use rusqlite::{Connection, OptionalExtension, params};

use crate::config::get_app_data_prefix;

/// Reading positions, library and bookmarks, kept in SQLite.
pub struct State {
    conn: Connection,
}

impl State {
    pub fn new() -> Result<Self> {
        let prefix = get_app_data_prefix()?;
        Self::open(&prefix.join("states.db"))
    }

    pub fn open(filepath: &Path) -> Result<Self> {
        if let Some(parent) = filepath.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(filepath)?;
        Self::init_db(&conn)?;
        Ok(Self { conn })
    }

    fn init_db(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS reading_states (
                manga_id TEXT PRIMARY KEY,
                chapter INTEGER NOT NULL,
                page INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS library (
                last_read DATETIME DEFAULT (datetime('now')),
                manga_id TEXT PRIMARY KEY,
                title TEXT,
                FOREIGN KEY (manga_id) REFERENCES reading_states(manga_id)
                ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS bookmarks (
                id TEXT PRIMARY KEY,
                manga_id TEXT,
                name TEXT,
                chapter INTEGER NOT NULL,
                page INTEGER NOT NULL,
                FOREIGN KEY (manga_id) REFERENCES reading_states(manga_id)
                ON DELETE CASCADE
            );
            ",
        )?;
        Ok(())
    }

    pub fn get_from_history(&self) -> Result<Vec<LibraryItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.last_read, l.manga_id, l.title, r.chapter, r.page
             FROM library l JOIN reading_states r ON r.manga_id = l.manga_id
             ORDER BY l.last_read DESC",
        )?;

        let items = stmt.query_map([], |row| {
            Ok(LibraryItem {
                last_read: row.get(0)?,
                manga_id: row.get(1)?,
                title: row.get(2)?,
                chapter: row.get(3)?,
                page: row.get::<_, i64>(4)?.max(0) as usize,
            })
        })?;

        let mut library_items = Vec::new();
        for item in items {
            library_items.push(item?);
        }
        Ok(library_items)
    }

    pub fn delete_from_library(&self, manga_id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM reading_states WHERE manga_id=?", params![manga_id])?;
        Ok(())
    }

    /// Position of the most recently read manga.
    pub fn get_last_read(&self) -> Result<Option<ReaderQuery>> {
        let library = self.get_from_history()?;
        Ok(library
            .into_iter()
            .next()
            .map(|item| ReaderQuery::new(item.manga_id, item.chapter, item.page)))
    }

    pub fn get_last_reading_state(&self, manga_id: &str) -> Result<Option<ReaderQuery>> {
        let position = self
            .conn
            .query_row(
                "SELECT chapter, page FROM reading_states WHERE manga_id=?",
                params![manga_id],
                |row| Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        Ok(position.map(|(chapter, page)| {
            ReaderQuery::new(manga_id, chapter, page.max(0) as usize)
        }))
    }

    pub fn set_last_reading_state(&self, position: &ReaderQuery) -> Result<()> {
        let Some(manga_id) = position.manga.as_deref() else {
            return Ok(());
        };
        // An upsert keeps the row, so library and bookmarks survive.
        self.conn.execute(
            "INSERT INTO reading_states (manga_id, chapter, page) VALUES (?1, ?2, ?3)
             ON CONFLICT(manga_id) DO UPDATE SET chapter=excluded.chapter, page=excluded.page",
            params![manga_id, position.chapter, position.page as i64],
        )?;
        Ok(())
    }

    pub fn update_library(&self, manga_id: &str, title: Option<&str>) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO library (last_read, manga_id, title) VALUES (?, ?, ?)",
            params![Utc::now(), manga_id, title],
        )?;
        Ok(())
    }

    pub fn insert_bookmark(
        &self,
        manga_id: &str,
        name: &str,
        chapter: u32,
        page: usize,
    ) -> Result<()> {
        use sha1::{Digest, Sha1};
        let mut hasher = Sha1::new();
        hasher.update(format!("{manga_id}{name}").as_bytes());
        let hash = hasher.finalize();
        let id = &hex::encode(hash)[..10];

        self.conn.execute(
            "INSERT OR REPLACE INTO bookmarks (id, manga_id, name, chapter, page) VALUES (?, ?, ?, ?, ?)",
            params![id, manga_id, name, chapter, page as i64],
        )?;
        Ok(())
    }

    pub fn delete_bookmark(&self, manga_id: &str, name: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM bookmarks WHERE manga_id=? AND name=?",
            params![manga_id, name],
        )?;
        Ok(())
    }

    pub fn get_bookmarks(&self, manga_id: &str) -> Result<Vec<Bookmark>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, chapter, page FROM bookmarks WHERE manga_id=? ORDER BY chapter, page",
        )?;
        let rows = stmt.query_map(params![manga_id], |row| {
            Ok(Bookmark {
                name: row.get(0)?,
                chapter: row.get(1)?,
                page: row.get::<_, i64>(2)?.max(0) as usize,
            })
        })?;

        let mut bookmarks = Vec::new();
        for bookmark in rows {
            bookmarks.push(bookmark?);
        }
        Ok(bookmarks)
    }
}
