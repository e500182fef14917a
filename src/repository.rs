use crate::error::AppResult;
use crate::models::{Hoarding, HoardingFields, HoardingFilter, MatchMode, User};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use sqlx::{PgPool, query_builder::QueryBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

/// UserStore Trait
///
/// Abstract contract for the credential/identity records. Kept separate from
/// [`HoardingStore`] so the auth layer only ever sees user lookups, never the
/// record table.
///
/// **Send + Sync + async_trait** are required to make the trait objects safely
/// shareable and usable across Axum's asynchronous task boundaries.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>>;
    // Returns Ok(None) when the email is already taken (single-statement
    // conflict handling, no read-then-write race).
    async fn add_user(
        &self,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn count_users(&self) -> AppResult<i64>;
}

/// HoardingStore Trait
///
/// Abstract contract for hoarding record persistence: filtered, ordered
/// retrieval plus the mutations and the dashboard aggregations.
#[async_trait]
pub trait HoardingStore: Send + Sync {
    /// Filtered listing, always ordered by `renewal_date ASC, id ASC` so ties
    /// resolve deterministically.
    async fn list(&self, filter: &HoardingFilter) -> AppResult<Vec<Hoarding>>;
    async fn get(&self, id: Uuid) -> AppResult<Option<Hoarding>>;
    async fn add(
        &self,
        fields: &HoardingFields,
        image_filename: Option<&str>,
        created_by: Uuid,
    ) -> AppResult<Hoarding>;
    /// Full replacement of the descriptive fields; `image_filename = None`
    /// keeps the stored image reference untouched. Returns Ok(None) when the
    /// id does not exist.
    async fn update(
        &self,
        id: Uuid,
        fields: &HoardingFields,
        image_filename: Option<&str>,
    ) -> AppResult<Option<Hoarding>>;
    // True if a row was actually removed.
    async fn delete(&self, id: Uuid) -> AppResult<bool>;

    // --- Dashboard Queries ---
    async fn distinct_places(&self) -> AppResult<Vec<String>>;
    async fn distinct_showrooms(&self) -> AppResult<Vec<String>>;
    /// Record count per showroom name; records without a showroom are left out.
    async fn aggregate_by_showroom(&self) -> AppResult<BTreeMap<String, i64>>;
    async fn count_total(&self) -> AppResult<i64>;
    /// Records whose `renewal_date` is on or before today + `days` (inclusive).
    async fn count_due_within(&self, days: i64) -> AppResult<i64>;
}

/// Shared handles used by the application state.
pub type UserStoreState = Arc<dyn UserStore>;
pub type HoardingStoreState = Arc<dyn HoardingStore>;

/// PostgresRepository
///
/// The concrete implementation of both store traits, backed by the PostgreSQL
/// database. One instance serves both roles over a single connection pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Wraps an already-connected pool; migrations are the caller's problem.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const HOARDING_COLUMNS: &str = "id, size, place, owner_name, contact, address, location_url, \
     showroom_name, showroom_location, renewal_date, amount, image_filename, created_by";

#[async_trait]
impl UserStore for PostgresRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_admin FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_admin FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// add_user
    ///
    /// Inserts a new user. Uses `ON CONFLICT DO NOTHING` so a duplicate email
    /// surfaces as `Ok(None)` instead of racing a prior existence check.
    async fn add_user(
        &self,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, email, password_hash, is_admin) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (email) DO NOTHING \
             RETURNING id, email, password_hash, is_admin",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(is_admin)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_admin FROM users ORDER BY email ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn count_users(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl HoardingStore for PostgresRepository {
    /// list
    ///
    /// Implements the filtered listing using QueryBuilder for safe
    /// parameterization. Every criterion is bound, never interpolated, and the
    /// column names come from a fixed table below, so no user input reaches
    /// the SQL text itself.
    async fn list(&self, filter: &HoardingFilter) -> AppResult<Vec<Hoarding>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {HOARDING_COLUMNS} FROM hoardings"));

        let criteria = [
            ("place", &filter.place),
            ("showroom_name", &filter.showroom),
            ("showroom_location", &filter.location),
        ];

        let mut has_clause = false;
        for (column, value) in criteria {
            let Some(value) = value else { continue };
            builder.push(if has_clause { " AND " } else { " WHERE " });
            has_clause = true;
            match filter.mode {
                MatchMode::Contains => {
                    builder.push(column).push(" ILIKE ");
                    builder.push_bind(format!("%{value}%"));
                }
                MatchMode::Exact => {
                    builder.push(column).push(" = ");
                    builder.push_bind(value.clone());
                }
            }
        }

        builder.push(" ORDER BY renewal_date ASC, id ASC");

        let rows = builder
            .build_query_as::<Hoarding>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Hoarding>> {
        let record = sqlx::query_as::<_, Hoarding>(&format!(
            "SELECT {HOARDING_COLUMNS} FROM hoardings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// add
    ///
    /// Inserts a new record in one statement and returns the stored row.
    /// Field order in the VALUES list mirrors the struct so nothing is copied
    /// over dynamically.
    async fn add(
        &self,
        fields: &HoardingFields,
        image_filename: Option<&str>,
        created_by: Uuid,
    ) -> AppResult<Hoarding> {
        let record = sqlx::query_as::<_, Hoarding>(&format!(
            "INSERT INTO hoardings (id, size, place, owner_name, contact, address, \
             location_url, showroom_name, showroom_location, renewal_date, amount, \
             image_filename, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {HOARDING_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&fields.size)
        .bind(&fields.place)
        .bind(&fields.owner_name)
        .bind(&fields.contact)
        .bind(&fields.address)
        .bind(&fields.location_url)
        .bind(&fields.showroom_name)
        .bind(&fields.showroom_location)
        .bind(fields.renewal_date)
        .bind(fields.amount)
        .bind(image_filename)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    /// update
    ///
    /// Replaces the descriptive fields wholesale (the edit form always submits
    /// the full set) while `COALESCE` keeps the existing image reference when
    /// no replacement was uploaded. `created_by` is never touched: ownership is
    /// immutable.
    async fn update(
        &self,
        id: Uuid,
        fields: &HoardingFields,
        image_filename: Option<&str>,
    ) -> AppResult<Option<Hoarding>> {
        let record = sqlx::query_as::<_, Hoarding>(&format!(
            "UPDATE hoardings \
             SET size = $2, place = $3, owner_name = $4, contact = $5, address = $6, \
                 location_url = $7, showroom_name = $8, showroom_location = $9, \
                 renewal_date = $10, amount = $11, \
                 image_filename = COALESCE($12, image_filename) \
             WHERE id = $1 \
             RETURNING {HOARDING_COLUMNS}"
        ))
        .bind(id)
        .bind(&fields.size)
        .bind(&fields.place)
        .bind(&fields.owner_name)
        .bind(&fields.contact)
        .bind(&fields.address)
        .bind(&fields.location_url)
        .bind(&fields.showroom_name)
        .bind(&fields.showroom_location)
        .bind(fields.renewal_date)
        .bind(fields.amount)
        .bind(image_filename)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM hoardings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn distinct_places(&self) -> AppResult<Vec<String>> {
        let places =
            sqlx::query_scalar::<_, String>("SELECT DISTINCT place FROM hoardings ORDER BY place")
                .fetch_all(&self.pool)
                .await?;
        Ok(places)
    }

    async fn distinct_showrooms(&self) -> AppResult<Vec<String>> {
        let showrooms = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT showroom_name FROM hoardings \
             WHERE showroom_name IS NOT NULL ORDER BY showroom_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(showrooms)
    }

    async fn aggregate_by_showroom(&self) -> AppResult<BTreeMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT showroom_name, COUNT(*) FROM hoardings \
             WHERE showroom_name IS NOT NULL GROUP BY showroom_name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn count_total(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM hoardings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_due_within(&self, days: i64) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM hoardings WHERE renewal_date <= CURRENT_DATE + $1",
        )
        .bind(days as i32)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

/// MemoryRepository
///
/// In-memory twin of [`PostgresRepository`] implementing the same two traits.
/// Backs the integration tests and lets the router be exercised without a
/// database; the filtering, ordering, and conflict semantics deliberately
/// mirror the SQL implementation above.
#[derive(Default)]
pub struct MemoryRepository {
    users: RwLock<Vec<User>>,
    hoardings: RwLock<Vec<Hoarding>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(record: &Hoarding, filter: &HoardingFilter) -> bool {
        let fields: [(&Option<String>, Option<&str>); 3] = [
            (&filter.place, Some(record.place.as_str())),
            (&filter.showroom, record.showroom_name.as_deref()),
            (&filter.location, record.showroom_location.as_deref()),
        ];

        fields.iter().all(|(wanted, actual)| match wanted {
            None => true,
            Some(wanted) => match (filter.mode, actual) {
                (_, None) => false,
                (MatchMode::Contains, Some(actual)) => {
                    actual.to_lowercase().contains(&wanted.to_lowercase())
                }
                (MatchMode::Exact, Some(actual)) => *actual == wanted.as_str(),
            },
        })
    }
}

#[async_trait]
impl UserStore for MemoryRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.users.read().iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.read().iter().find(|u| u.id == id).cloned())
    }

    async fn add_user(
        &self,
        email: &str,
        password_hash: &str,
        is_admin: bool,
    ) -> AppResult<Option<User>> {
        let mut users = self.users.write();
        if users.iter().any(|u| u.email == email) {
            return Ok(None);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_admin,
        };
        users.push(user.clone());
        Ok(Some(user))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users = self.users.read().clone();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(self.users.read().len() as i64)
    }
}

#[async_trait]
impl HoardingStore for MemoryRepository {
    async fn list(&self, filter: &HoardingFilter) -> AppResult<Vec<Hoarding>> {
        let mut rows: Vec<Hoarding> = self
            .hoardings
            .read()
            .iter()
            .filter(|h| Self::matches(h, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.renewal_date
                .cmp(&b.renewal_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Hoarding>> {
        Ok(self.hoardings.read().iter().find(|h| h.id == id).cloned())
    }

    async fn add(
        &self,
        fields: &HoardingFields,
        image_filename: Option<&str>,
        created_by: Uuid,
    ) -> AppResult<Hoarding> {
        let record = Hoarding {
            id: Uuid::new_v4(),
            size: fields.size.clone(),
            place: fields.place.clone(),
            owner_name: fields.owner_name.clone(),
            contact: fields.contact.clone(),
            address: fields.address.clone(),
            location_url: fields.location_url.clone(),
            showroom_name: fields.showroom_name.clone(),
            showroom_location: fields.showroom_location.clone(),
            renewal_date: fields.renewal_date,
            amount: fields.amount,
            image_filename: image_filename.map(str::to_string),
            created_by,
        };
        self.hoardings.write().push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        id: Uuid,
        fields: &HoardingFields,
        image_filename: Option<&str>,
    ) -> AppResult<Option<Hoarding>> {
        let mut rows = self.hoardings.write();
        let Some(record) = rows.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };
        record.size = fields.size.clone();
        record.place = fields.place.clone();
        record.owner_name = fields.owner_name.clone();
        record.contact = fields.contact.clone();
        record.address = fields.address.clone();
        record.location_url = fields.location_url.clone();
        record.showroom_name = fields.showroom_name.clone();
        record.showroom_location = fields.showroom_location.clone();
        record.renewal_date = fields.renewal_date;
        record.amount = fields.amount;
        if let Some(name) = image_filename {
            record.image_filename = Some(name.to_string());
        }
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut rows = self.hoardings.write();
        let before = rows.len();
        rows.retain(|h| h.id != id);
        Ok(rows.len() < before)
    }

    async fn distinct_places(&self) -> AppResult<Vec<String>> {
        let places: BTreeSet<String> = self
            .hoardings
            .read()
            .iter()
            .map(|h| h.place.clone())
            .collect();
        Ok(places.into_iter().collect())
    }

    async fn distinct_showrooms(&self) -> AppResult<Vec<String>> {
        let showrooms: BTreeSet<String> = self
            .hoardings
            .read()
            .iter()
            .filter_map(|h| h.showroom_name.clone())
            .collect();
        Ok(showrooms.into_iter().collect())
    }

    async fn aggregate_by_showroom(&self) -> AppResult<BTreeMap<String, i64>> {
        let mut counts = BTreeMap::new();
        for record in self.hoardings.read().iter() {
            if let Some(name) = &record.showroom_name {
                *counts.entry(name.clone()).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn count_total(&self) -> AppResult<i64> {
        Ok(self.hoardings.read().len() as i64)
    }

    async fn count_due_within(&self, days: i64) -> AppResult<i64> {
        let deadline = Utc::now().date_naive() + Duration::days(days);
        let count = self
            .hoardings
            .read()
            .iter()
            .filter(|h| h.renewal_date <= deadline)
            .count();
        Ok(count as i64)
    }
}

/// Convenience for tests and DB-less runs: one shared instance serving both
/// store roles, mirroring how `PostgresRepository` is wired in `main`.
pub fn memory_stores() -> (UserStoreState, HoardingStoreState) {
    let repo = Arc::new(MemoryRepository::new());
    (repo.clone(), repo)
}
