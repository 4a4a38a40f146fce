mod schema;


use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row};
use time::OffsetDateTime;

use crate::models::{ContentItem, ItemId, Label, LabelId, Vocabulary};
use crate::store::{ContentStore, StoreError, VocabularyStore};
use schema::INITIAL_SCHEMA;

type Result<T> = std::result::Result<T, StoreError>;

/// SQLite-backed vocabulary and content store.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens an in-memory SQLite database.
    ///
    /// Automatically initializes the schema on connection open.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    /// Opens a file-based SQLite database at the given path.
    ///
    /// Creates the database file if it does not exist.
    /// Automatically initializes the schema on connection open.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize_schema()?;
        Ok(db)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute("PRAGMA foreign_keys = ON", [])?;
        self.conn.execute_batch(INITIAL_SCHEMA)?;
        Ok(())
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Adds a label, or updates the name and description of an existing one.
    ///
    /// An empty `name` defaults to the slug. The usage count of an existing
    /// label is preserved.
    pub fn add_label(&self, vocabulary: &str, slug: &str, name: &str, description: &str) -> Result<Label> {
        let name = if name.trim().is_empty() { slug } else { name };
        self.conn.execute(
            "INSERT INTO labels (vocabulary, slug, name, description) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (vocabulary, slug) DO UPDATE SET name = excluded.name, description = excluded.description",
            (vocabulary, slug, name, description),
        )?;

        self.find_label(vocabulary, slug)?
            .ok_or_else(|| StoreError::UnknownLabel {
                vocabulary: vocabulary.to_string(),
                slug: slug.to_string(),
            })
    }

    /// Stores a content item and returns its ID.
    pub fn add_content_item(&self, title: &str, excerpt: &str, body: &str) -> Result<ItemId> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.conn.execute(
            "INSERT INTO content_items (title, excerpt, body, created_at) VALUES (?1, ?2, ?3, ?4)",
            (title, excerpt, body, now),
        )?;
        let id = ItemId::new(self.conn.last_insert_rowid());
        tracing::debug!(item = %id, "stored content item");
        Ok(id)
    }

    fn find_label(&self, vocabulary: &str, slug: &str) -> Result<Option<Label>> {
        let label = self
            .conn
            .query_row(
                "SELECT id, slug, name, description, usage_count FROM labels
                 WHERE vocabulary = ?1 AND slug = ?2",
                (vocabulary, slug),
                label_from_row,
            )
            .optional()?;
        Ok(label)
    }

    fn load_vocabulary(&self, name: &str) -> Result<Option<Vocabulary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, slug, name, description, usage_count FROM labels
             WHERE vocabulary = ?1 ORDER BY id",
        )?;
        let labels = stmt
            .query_map([name], label_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if labels.is_empty() {
            return Ok(None);
        }
        Ok(Some(Vocabulary::new(name, labels)))
    }

    fn existing_labels(&self, id: ItemId) -> Result<BTreeMap<String, Vec<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT l.vocabulary, l.slug FROM item_labels il
             JOIN labels l ON il.label_id = l.id
             WHERE il.item_id = ?1
             ORDER BY l.vocabulary, l.slug",
        )?;
        let rows = stmt.query_map([id.get()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let (vocabulary, slug) = row?;
            grouped.entry(vocabulary).or_default().push(slug);
        }
        Ok(grouped)
    }
}

fn label_from_row(row: &Row<'_>) -> rusqlite::Result<Label> {
    let id: i64 = row.get(0)?;
    let slug: String = row.get(1)?;
    let name: String = row.get(2)?;
    let description: String = row.get(3)?;
    let usage_count: i64 = row.get(4)?;

    Ok(Label::new(LabelId::new(id), slug)
        .with_name(name)
        .with_description(description)
        .with_usage_count(u64::try_from(usage_count).unwrap_or(0)))
}

impl VocabularyStore for Database {
    fn vocabulary_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT vocabulary FROM labels ORDER BY vocabulary")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn vocabularies(&self, names: &[&str]) -> Result<Vec<Vocabulary>> {
        let all;
        let names: Vec<&str> = if names.is_empty() {
            all = self.vocabulary_names()?;
            all.iter().map(String::as_str).collect()
        } else {
            names.to_vec()
        };

        let mut vocabularies = Vec::with_capacity(names.len());
        for name in names {
            match self.load_vocabulary(name)? {
                Some(vocabulary) => vocabularies.push(vocabulary),
                None => tracing::warn!(vocabulary = name, "vocabulary has no labels; skipping"),
            }
        }
        Ok(vocabularies)
    }

    fn usage_count(&self, vocabulary: &str, slug: &str) -> Result<u64> {
        self.find_label(vocabulary, slug)?
            .map(|label| label.usage_count())
            .ok_or_else(|| StoreError::UnknownLabel {
                vocabulary: vocabulary.to_string(),
                slug: slug.to_string(),
            })
    }

    fn assign_label(&self, item: ItemId, vocabulary: &str, slug: &str) -> Result<bool> {
        let label = self
            .find_label(vocabulary, slug)?
            .ok_or_else(|| StoreError::UnknownLabel {
                vocabulary: vocabulary.to_string(),
                slug: slug.to_string(),
            })?;

        let item_exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM content_items WHERE id = ?1)",
            [item.get()],
            |row| row.get(0),
        )?;
        if !item_exists {
            return Err(StoreError::UnknownItem(item));
        }

        let now = OffsetDateTime::now_utc().unix_timestamp();
        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO item_labels (item_id, label_id, assigned_at) VALUES (?1, ?2, ?3)",
            (item.get(), label.id().get(), now),
        )?;
        if inserted > 0 {
            tx.execute(
                "UPDATE labels SET usage_count = usage_count + 1 WHERE id = ?1",
                [label.id().get()],
            )?;
        }
        tx.commit()?;

        tracing::debug!(item = %item, vocabulary, slug, new = inserted > 0, "assigned label");
        Ok(inserted > 0)
    }
}

impl ContentStore for Database {
    fn content_item(&self, id: ItemId) -> Result<Option<ContentItem>> {
        let row = self
            .conn
            .query_row(
                "SELECT title, excerpt, body FROM content_items WHERE id = ?1",
                [id.get()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((title, excerpt, body)) = row else {
            tracing::debug!(item = %id, "content item lookup missed");
            return Ok(None);
        };

        let mut item = ContentItem::new(id, title).with_excerpt(excerpt).with_body(body);
        item.existing_labels = self.existing_labels(id)?;
        Ok(Some(item))
    }

    fn item_ids(&self) -> Result<Vec<ItemId>> {
        let mut stmt = self.conn.prepare("SELECT id FROM content_items ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .map(|id| id.map(ItemId::new))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}
