//! SQLite-backed storage for reading records.

use readlog_kernel::Migration;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use super::models::{BookRecord, NewBook};

/// Errors from the book store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("no book titled '{0}'")]
    NotFound(String),
    #[error("a book titled '{0}' is already recorded")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub(crate) const MIGRATIONS: &[Migration] = &[Migration {
    id: "001_init",
    up: r#"
        CREATE TABLE IF NOT EXISTS books (
            id     INTEGER PRIMARY KEY AUTOINCREMENT,
            title  TEXT    NOT NULL,
            author TEXT    NOT NULL,
            pages  INTEGER NOT NULL,
            start  TEXT    NOT NULL,
            "end"  TEXT    NOT NULL DEFAULT '',
            score  INTEGER NOT NULL DEFAULT -1
        );
        CREATE UNIQUE INDEX IF NOT EXISTS books_title_unique ON books (title);
    "#,
}];

/// Handle to the `books` table, built once at startup and shared by every
/// request. Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct BookStore {
    pool: SqlitePool,
}

impl BookStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every record, in insertion order.
    pub async fn list_all(&self) -> Result<Vec<BookRecord>, StoreError> {
        let rows = sqlx::query_as::<_, BookRecord>(
            r#"
            SELECT id, title, author, pages, start, "end", score
            FROM books
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_by_title(&self, title: &str) -> Result<BookRecord, StoreError> {
        let mut con = self.pool.acquire().await?;
        SqliteBookInternal::find_by_title(&mut con, title).await
    }

    /// Insert `book` and return it with its assigned id.
    pub async fn create(&self, book: NewBook) -> Result<BookRecord, StoreError> {
        let mut con = self.pool.acquire().await?;
        SqliteBookInternal::create(&mut con, book).await
    }

    /// Write every mutable field of `record` back to its row.
    pub async fn update(&self, record: &BookRecord) -> Result<(), StoreError> {
        let mut con = self.pool.acquire().await?;
        SqliteBookInternal::update(&mut con, record).await
    }

    pub async fn delete(&self, record: &BookRecord) -> Result<(), StoreError> {
        let mut con = self.pool.acquire().await?;
        SqliteBookInternal::delete(&mut con, record.id).await
    }

    /// Load the record titled `title`, let `mutate` change it and write it
    /// back, all inside one transaction.
    ///
    /// The write lock is taken before the lookup, so a concurrent writer
    /// waits out the busy timeout instead of failing on upgrade.
    pub async fn modify<F>(&self, title: &str, mutate: F) -> Result<BookRecord, StoreError>
    where
        F: FnOnce(&mut BookRecord),
    {
        let mut tx = self.begin_write().await?;
        let mut record = SqliteBookInternal::find_by_title(&mut tx, title).await?;
        mutate(&mut record);
        SqliteBookInternal::update(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Look up and delete the record titled `title` inside one transaction.
    pub async fn remove(&self, title: &str) -> Result<BookRecord, StoreError> {
        let mut tx = self.begin_write().await?;
        let record = SqliteBookInternal::find_by_title(&mut tx, title).await?;
        SqliteBookInternal::delete(&mut tx, record.id).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

struct SqliteBookInternal;

impl SqliteBookInternal {
    async fn find_by_title(
        con: &mut SqliteConnection,
        title: &str,
    ) -> Result<BookRecord, StoreError> {
        sqlx::query_as::<_, BookRecord>(
            r#"
            SELECT id, title, author, pages, start, "end", score
            FROM books
            WHERE title = ?
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(title)
        .fetch_optional(con)
        .await?
        .ok_or_else(|| StoreError::NotFound(title.to_string()))
    }

    async fn create(con: &mut SqliteConnection, book: NewBook) -> Result<BookRecord, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO books (title, author, pages, start, "end", score)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.pages)
        .bind(&book.start)
        .bind(&book.end)
        .bind(book.score)
        .execute(con)
        .await
        .map_err(|e| conflict_or(e, &book.title))?;

        Ok(BookRecord {
            id: result.last_insert_rowid(),
            title: book.title,
            author: book.author,
            pages: book.pages,
            start: book.start,
            end: book.end,
            score: book.score,
        })
    }

    async fn update(con: &mut SqliteConnection, record: &BookRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE books
            SET title = ?, author = ?, pages = ?, start = ?, "end" = ?, score = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.title)
        .bind(&record.author)
        .bind(record.pages)
        .bind(&record.start)
        .bind(&record.end)
        .bind(record.score)
        .bind(record.id)
        .execute(con)
        .await
        .map_err(|e| conflict_or(e, &record.title))?;
        Ok(())
    }

    async fn delete(con: &mut SqliteConnection, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(con)
            .await?;
        Ok(())
    }
}

fn conflict_or(error: sqlx::Error, title: &str) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(title.to_string())
        }
        _ => StoreError::Database(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readlog_db::Database;
    use readlog_kernel::settings::DatabaseSettings;

    async fn test_store() -> (Database, BookStore) {
        let db = Database::open_in_memory().await.unwrap();
        let migrations: Vec<(String, Migration)> = MIGRATIONS
            .iter()
            .map(|m| ("books".to_string(), m.clone()))
            .collect();
        db.apply_migrations(&migrations).await.unwrap();
        let store = BookStore::new(db.pool().clone());
        (db, store)
    }

    async fn file_store(dir: &tempfile::TempDir) -> (Database, BookStore) {
        let settings = DatabaseSettings {
            path: dir.path().join("books.sqlite3"),
            ..DatabaseSettings::default()
        };
        let db = Database::open(&settings).await.unwrap();
        let migrations: Vec<(String, Migration)> = MIGRATIONS
            .iter()
            .map(|m| ("books".to_string(), m.clone()))
            .collect();
        db.apply_migrations(&migrations).await.unwrap();
        let store = BookStore::new(db.pool().clone());
        (db, store)
    }

    fn new_book(title: &str) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: "Frank Herbert".to_string(),
            pages: 412,
            start: "02/01/2024".to_string(),
            end: String::new(),
            score: -1,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_ids_in_order() {
        let (_db, store) = test_store().await;
        let first = store.create(new_book("Dune")).await.unwrap();
        let second = store.create(new_book("Emma")).await.unwrap();
        assert!(second.id > first.id);

        let all = store.list_all().await.unwrap();
        assert_eq!(all, vec![first, second]);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_empty() {
        let (_db, store) = test_store().await;
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_missing_title() {
        let (_db, store) = test_store().await;
        let err = store.find_by_title("Nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(title) if title == "Nope"));
    }

    #[tokio::test]
    async fn test_duplicate_title_conflicts() {
        let (_db, store) = test_store().await;
        store.create(new_book("Dune")).await.unwrap();
        let err = store.create(new_book("Dune")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_persists_loaded_record() {
        let (_db, store) = test_store().await;
        store.create(new_book("Dune")).await.unwrap();

        let mut record = store.find_by_title("Dune").await.unwrap();
        record.pages = 500;
        store.update(&record).await.unwrap();

        assert_eq!(store.find_by_title("Dune").await.unwrap().pages, 500);
    }

    #[tokio::test]
    async fn test_modify_commits_mutation() {
        let (_db, store) = test_store().await;
        store.create(new_book("Dune")).await.unwrap();

        let updated = store
            .modify("Dune", |record| record.score = 5)
            .await
            .unwrap();
        assert_eq!(updated.score, 5);
        assert_eq!(store.find_by_title("Dune").await.unwrap().score, 5);
    }

    #[tokio::test]
    async fn test_modify_rename_onto_existing_title_rolls_back() {
        let (_db, store) = test_store().await;
        store.create(new_book("Dune")).await.unwrap();
        store.create(new_book("Emma")).await.unwrap();

        let err = store
            .modify("Emma", |record| {
                record.title = "Dune".to_string();
                record.pages = 1;
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.find_by_title("Emma").await.unwrap().pages, 412);
    }

    #[tokio::test]
    async fn test_delete_and_remove() {
        let (_db, store) = test_store().await;
        let dune = store.create(new_book("Dune")).await.unwrap();
        store.create(new_book("Emma")).await.unwrap();

        store.delete(&dune).await.unwrap();
        assert!(matches!(
            store.find_by_title("Dune").await,
            Err(StoreError::NotFound(_))
        ));

        let removed = store.remove("Emma").await.unwrap();
        assert_eq!(removed.title, "Emma");
        assert!(matches!(
            store.remove("Emma").await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_modify_on_one_title_all_commit() {
        let dir = tempfile::tempdir().unwrap();
        let (db, store) = file_store(&dir).await;
        store.create(new_book("Dune")).await.unwrap();

        let writers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.modify("Dune", |record| record.score += 1).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        assert_eq!(store.find_by_title("Dune").await.unwrap().score, -1 + 8);
        db.close().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_remove_and_modify_do_not_fail_on_lock() {
        let dir = tempfile::tempdir().unwrap();
        let (db, store) = file_store(&dir).await;
        store.create(new_book("Dune")).await.unwrap();

        let remover = {
            let store = store.clone();
            tokio::spawn(async move { store.remove("Dune").await })
        };
        let modifier = {
            let store = store.clone();
            tokio::spawn(async move { store.modify("Dune", |record| record.pages = 1).await })
        };

        remover.await.unwrap().unwrap();
        // Either the update landed first or the row was already gone
        match modifier.await.unwrap() {
            Ok(record) => assert_eq!(record.pages, 1),
            Err(err) => assert!(matches!(err, StoreError::NotFound(_))),
        }
        assert_eq!(store.count().await.unwrap(), 0);
        db.close().await;
    }
}
