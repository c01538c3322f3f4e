//! Shopping list repository implementation

use std::collections::BTreeSet;

use crate::error::Result;
use crate::models::list::items_from_json;
use crate::models::{Item, ListDraft, ListId, ShoppingList, UserId, UserProfile, Visibility};
use crate::util::unix_millis_now;
use libsql::{params, Connection, Row};

const LIST_COLUMNS: &str =
    "l.id, l.name, l.items, l.owner_id, l.visibility, l.created_at, l.updated_at";

/// libSQL-backed storage for list documents, share grants, and user profiles
pub struct LibSqlListRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlListRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new document owned by `owner`, with server-assigned id and timestamps.
    pub async fn insert(&self, owner: &UserId, draft: &ListDraft) -> Result<ShoppingList> {
        let now = unix_millis_now();
        let list = ShoppingList {
            id: ListId::generate(),
            name: draft.name.clone(),
            items: draft.items.clone(),
            owner_id: owner.clone(),
            shared_with: BTreeSet::new(),
            visibility: draft.visibility,
            created_at: now,
            updated_at: now,
        };

        self.conn
            .execute(
                "INSERT INTO shopping_lists (id, name, items, owner_id, visibility, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    list.id.as_str(),
                    list.name.as_str(),
                    serde_json::to_string(&list.items)?,
                    list.owner_id.as_str(),
                    visibility_label(list.visibility),
                    list.created_at,
                    list.updated_at
                ],
            )
            .await?;

        Ok(list)
    }

    pub async fn get(&self, id: &ListId) -> Result<Option<ShoppingList>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {LIST_COLUMNS} FROM shopping_lists l WHERE l.id = ?"),
                [id.as_str()],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        match parse_list_row(&row)? {
            Some(mut list) => {
                list.shared_with = self.load_shares(&list.id, &list.owner_id).await?;
                Ok(Some(list))
            }
            None => Ok(None),
        }
    }

    /// Lists owned by `user` or shared with `user`, oldest first.
    pub async fn visible_to(&self, user: &UserId) -> Result<Vec<ShoppingList>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {LIST_COLUMNS}
                     FROM shopping_lists l
                     WHERE l.owner_id = ?
                        OR EXISTS (
                            SELECT 1 FROM list_shares s
                            WHERE s.list_id = l.id AND s.user_id = ?
                        )
                     ORDER BY l.created_at ASC, l.id ASC"
                ),
                [user.as_str(), user.as_str()],
            )
            .await?;

        let mut lists = Vec::new();
        while let Some(row) = rows.next().await? {
            if let Some(list) = parse_list_row(&row)? {
                lists.push(list);
            }
        }
        for list in &mut lists {
            list.shared_with = self.load_shares(&list.id, &list.owner_id).await?;
        }
        Ok(lists)
    }

    /// Rewrite name and items only. Returns false when the document does not exist.
    pub async fn update_contents(&self, id: &ListId, name: &str, items: &[Item]) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE shopping_lists SET name = ?, items = ?, updated_at = ? WHERE id = ?",
                params![
                    name,
                    serde_json::to_string(items)?,
                    unix_millis_now(),
                    id.as_str()
                ],
            )
            .await?;
        Ok(rows > 0)
    }

    /// Replace the full items array. Returns false when the document does not exist.
    pub async fn replace_items(&self, id: &ListId, items: &[Item]) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE shopping_lists SET items = ?, updated_at = ? WHERE id = ?",
                params![serde_json::to_string(items)?, unix_millis_now(), id.as_str()],
            )
            .await?;
        Ok(rows > 0)
    }

    /// Delete a document and its share grants in one transaction. Returns
    /// false when nothing was deleted.
    pub async fn delete(&self, id: &ListId) -> Result<bool> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = self.delete_rows(id).await;
        self.finish_transaction(result).await
    }

    async fn delete_rows(&self, id: &ListId) -> Result<bool> {
        self.conn
            .execute("DELETE FROM list_shares WHERE list_id = ?", [id.as_str()])
            .await?;
        let rows = self
            .conn
            .execute("DELETE FROM shopping_lists WHERE id = ?", [id.as_str()])
            .await?;
        Ok(rows > 0)
    }

    /// Add `user` to the share set and bump `updated_at` atomically. Returns
    /// false when the grant already existed.
    pub async fn add_share(&self, id: &ListId, user: &UserId) -> Result<bool> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let result = self.add_share_rows(id, user).await;
        self.finish_transaction(result).await
    }

    async fn add_share_rows(&self, id: &ListId, user: &UserId) -> Result<bool> {
        let now = unix_millis_now();
        let rows = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO list_shares (list_id, user_id, granted_at) VALUES (?, ?, ?)",
                params![id.as_str(), user.as_str(), now],
            )
            .await?;
        if rows > 0 {
            self.conn
                .execute(
                    "UPDATE shopping_lists SET updated_at = ? WHERE id = ?",
                    params![now, id.as_str()],
                )
                .await?;
        }
        Ok(rows > 0)
    }

    /// Commit after a successful body, roll back otherwise.
    async fn finish_transaction<T>(&self, result: Result<T>) -> Result<T> {
        let value = match result {
            Ok(value) => value,
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(error);
            }
        };
        if let Err(error) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }
        Ok(value)
    }

    pub async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO user_profiles (id, email, display_name) VALUES (?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET email = excluded.email, display_name = excluded.display_name",
                params![
                    profile.id.as_str(),
                    profile.email.as_str(),
                    profile.display_name.clone().unwrap_or_default()
                ],
            )
            .await?;
        Ok(())
    }

    /// Look up a profile by an already-normalized e-mail address.
    pub async fn find_profile_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, email, display_name FROM user_profiles WHERE email = ?",
                [email],
            )
            .await?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        let display_name: String = row.get(2)?;
        Ok(Some(UserProfile {
            id: UserId::from(row.get::<String>(0)?),
            email: row.get(1)?,
            display_name: (!display_name.is_empty()).then_some(display_name),
        }))
    }

    async fn load_shares(&self, id: &ListId, owner: &UserId) -> Result<BTreeSet<UserId>> {
        let mut rows = self
            .conn
            .query(
                "SELECT user_id FROM list_shares WHERE list_id = ?",
                [id.as_str()],
            )
            .await?;

        let mut shared = BTreeSet::new();
        while let Some(row) = rows.next().await? {
            let user = UserId::from(row.get::<String>(0)?);
            if user != *owner {
                shared.insert(user);
            }
        }
        Ok(shared)
    }
}

/// Parse a list row; malformed documents are logged and skipped.
fn parse_list_row(row: &Row) -> Result<Option<ShoppingList>> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let items_json: String = row.get(2)?;

    if name.trim().is_empty() {
        tracing::warn!(list_id = %id, "Document missing 'name'; skipping");
        return Ok(None);
    }
    let items = match items_from_json(&items_json) {
        Ok(items) => items,
        Err(error) => {
            tracing::warn!(list_id = %id, %error, "Document has malformed 'items'; skipping");
            return Ok(None);
        }
    };

    Ok(Some(ShoppingList {
        id: ListId::from(id),
        name,
        items,
        owner_id: UserId::from(row.get::<String>(3)?),
        shared_with: BTreeSet::new(),
        visibility: parse_visibility(&row.get::<String>(4)?),
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    }))
}

const fn visibility_label(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::Public => "public",
        Visibility::Private => "private",
    }
}

fn parse_visibility(raw: &str) -> Visibility {
    if raw.eq_ignore_ascii_case("public") {
        Visibility::Public
    } else {
        Visibility::Private
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn draft(name: &str) -> ListDraft {
        ListDraft::new(name, &["Milk", "Eggs"], Visibility::Private).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_get() {
        let db = setup().await;
        let repo = LibSqlListRepository::new(db.connection());
        let alice = UserId::from("alice");

        let list = repo.insert(&alice, &draft("Groceries")).await.unwrap();
        let fetched = repo.get(&list.id).await.unwrap().unwrap();

        assert_eq!(fetched, list);
        assert!(fetched.shared_with.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_visible_to_owner_and_shared_users() {
        let db = setup().await;
        let repo = LibSqlListRepository::new(db.connection());
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");

        let groceries = repo.insert(&alice, &draft("Groceries")).await.unwrap();
        repo.insert(&alice, &draft("Hardware")).await.unwrap();
        repo.add_share(&groceries.id, &bob).await.unwrap();

        assert_eq!(repo.visible_to(&alice).await.unwrap().len(), 2);
        let bob_lists = repo.visible_to(&bob).await.unwrap();
        assert_eq!(bob_lists.len(), 1);
        assert_eq!(bob_lists[0].name, "Groceries");
        assert!(bob_lists[0].shared_with.contains(&bob));
        assert!(repo
            .visible_to(&UserId::from("carol"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_share_is_a_union() {
        let db = setup().await;
        let repo = LibSqlListRepository::new(db.connection());
        let list = repo
            .insert(&UserId::from("alice"), &draft("Groceries"))
            .await
            .unwrap();

        assert!(repo.add_share(&list.id, &UserId::from("bob")).await.unwrap());
        assert!(!repo.add_share(&list.id, &UserId::from("bob")).await.unwrap());
        assert!(repo
            .add_share(&list.id, &UserId::from("carol"))
            .await
            .unwrap());

        let fetched = repo.get(&list.id).await.unwrap().unwrap();
        assert_eq!(fetched.shared_with.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_contents_keeps_owner_and_shares() {
        let db = setup().await;
        let repo = LibSqlListRepository::new(db.connection());
        let list = repo
            .insert(&UserId::from("alice"), &draft("Groceries"))
            .await
            .unwrap();
        repo.add_share(&list.id, &UserId::from("bob")).await.unwrap();

        let updated = repo
            .update_contents(&list.id, "Weekly", &[Item::new("Bread")])
            .await
            .unwrap();
        assert!(updated);

        let fetched = repo.get(&list.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Weekly");
        assert_eq!(fetched.items, vec![Item::new("Bread")]);
        assert_eq!(fetched.owner_id, UserId::from("alice"));
        assert_eq!(fetched.created_at, list.created_at);
        assert!(fetched.shared_with.contains(&UserId::from("bob")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_reports_missing_documents() {
        let db = setup().await;
        let repo = LibSqlListRepository::new(db.connection());
        let list = repo
            .insert(&UserId::from("alice"), &draft("Groceries"))
            .await
            .unwrap();

        assert!(repo.delete(&list.id).await.unwrap());
        assert!(!repo.delete(&list.id).await.unwrap());
        assert!(repo.get(&list.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_delete_keeps_share_grants() {
        let db = setup().await;
        let conn = db.connection();
        let repo = LibSqlListRepository::new(conn);
        let bob = UserId::from("bob");
        let list = repo
            .insert(&UserId::from("alice"), &draft("Groceries"))
            .await
            .unwrap();
        repo.add_share(&list.id, &bob).await.unwrap();
        conn.execute(
            "CREATE TRIGGER block_list_delete BEFORE DELETE ON shopping_lists
             BEGIN SELECT RAISE(ABORT, 'delete blocked'); END",
            (),
        )
        .await
        .unwrap();

        assert!(repo.delete(&list.id).await.is_err());

        let fetched = repo.get(&list.id).await.unwrap().unwrap();
        assert!(fetched.shared_with.contains(&bob));
        assert_eq!(repo.visible_to(&bob).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_share_leaves_no_grant() {
        let db = setup().await;
        let conn = db.connection();
        let repo = LibSqlListRepository::new(conn);
        let bob = UserId::from("bob");
        let list = repo
            .insert(&UserId::from("alice"), &draft("Groceries"))
            .await
            .unwrap();
        conn.execute(
            "CREATE TRIGGER block_list_update BEFORE UPDATE ON shopping_lists
             BEGIN SELECT RAISE(ABORT, 'update blocked'); END",
            (),
        )
        .await
        .unwrap();

        assert!(repo.add_share(&list.id, &bob).await.is_err());

        let fetched = repo.get(&list.id).await.unwrap().unwrap();
        assert!(fetched.shared_with.is_empty());
        assert_eq!(fetched.updated_at, list.updated_at);

        conn.execute("DROP TRIGGER block_list_update", ()).await.unwrap();
        assert!(repo.add_share(&list.id, &bob).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_profiles_lookup_by_email() {
        let db = setup().await;
        let repo = LibSqlListRepository::new(db.connection());
        let profile = UserProfile::new(UserId::from("bob"), "Bob@Example.com", None);

        repo.upsert_profile(&profile).await.unwrap();

        let found = repo
            .find_profile_by_email("bob@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, profile);
        assert!(repo
            .find_profile_by_email("nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_legacy_items_and_empty_names() {
        let db = setup().await;
        let conn = db.connection();
        conn.execute(
            "INSERT INTO shopping_lists (id, name, items, owner_id, visibility, created_at, updated_at)
             VALUES ('legacy', 'Old list', '[\"Milk\"]', 'alice', 'private', 1, 1),
                    ('broken', '', '[]', 'alice', 'private', 2, 2)",
            (),
        )
        .await
        .unwrap();
        let repo = LibSqlListRepository::new(conn);

        let lists = repo.visible_to(&UserId::from("alice")).await.unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].items, vec![Item::new("Milk")]);
    }
}
