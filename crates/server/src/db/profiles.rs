//! Profile repository: users, roles and password hashes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use bazaar_core::{Email, Role, UserId};

use super::{PAGE_SIZE, RepositoryError};

const PROFILE_COLUMNS: &str = "id, email, display_name, role, phone, shipping_address, \
     store_name, bio, identity_uid, disabled, created_at, updated_at";

/// A marketplace user.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub id: UserId,
    pub email: Email,
    pub display_name: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub shipping_address: Option<String>,
    pub store_name: Option<String>,
    pub bio: Option<String>,
    #[serde(skip_serializing)]
    pub identity_uid: Option<String>,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Display name, falling back to the email's local part.
    #[must_use]
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.local_part())
    }
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: UserId,
    email: String,
    display_name: Option<String>,
    role: Role,
    phone: Option<String>,
    shipping_address: Option<String>,
    store_name: Option<String>,
    bio: Option<String>,
    identity_uid: Option<String>,
    disabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = RepositoryError;

    fn try_from(r: ProfileRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&r.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: r.id,
            email,
            display_name: r.display_name,
            role: r.role,
            phone: r.phone,
            shipping_address: r.shipping_address,
            store_name: r.store_name,
            bio: r.bio,
            identity_uid: r.identity_uid,
            disabled: r.disabled,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub shipping_address: Option<String>,
    pub store_name: Option<String>,
    pub bio: Option<String>,
}

/// Filters for the admin user list.
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct ProfileFilter {
    pub role: Option<Role>,
    pub q: Option<String>,
    pub page: Option<u32>,
}

/// Repository for profile database operations.
pub struct ProfileRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profile WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Profile::try_from).transpose()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profile WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(Profile::try_from).transpose()
    }

    /// Find the profile linked to an identity provider account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_identity_uid(&self, uid: &str) -> Result<Option<Profile>, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profile WHERE identity_uid = $1"
        ))
        .bind(uid)
        .fetch_optional(self.pool)
        .await?;

        row.map(Profile::try_from).transpose()
    }

    /// Create a profile together with its password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create_with_password(
        &self,
        email: &Email,
        display_name: Option<&str>,
        role: Role,
        password_hash: &str,
    ) -> Result<Profile, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "INSERT INTO profile (email, display_name, role) VALUES ($1, $2, $3) \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(email.as_str())
        .bind(display_name)
        .bind(role)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "email already exists"))?;

        sqlx::query("INSERT INTO profile_password (profile_id, password_hash) VALUES ($1, $2)")
            .bind(row.id)
            .bind(password_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Profile::try_from(row)
    }

    /// Get a profile and its password hash for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(Profile, String)>, RepositoryError> {
        let Some(profile) = self.get_by_email(email).await? else {
            return Ok(None);
        };

        let hash: Option<String> = sqlx::query_scalar(
            "SELECT password_hash FROM profile_password WHERE profile_id = $1",
        )
        .bind(profile.id)
        .fetch_optional(self.pool)
        .await?;

        Ok(hash.map(|h| (profile, h)))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn set_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO profile_password (profile_id, password_hash) VALUES ($1, $2) \
             ON CONFLICT (profile_id) DO UPDATE SET password_hash = $2, updated_at = NOW()",
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Apply a profile update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn update(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Profile, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "UPDATE profile SET \
                display_name = COALESCE($2, display_name), \
                phone = COALESCE($3, phone), \
                shipping_address = COALESCE($4, shipping_address), \
                store_name = COALESCE($5, store_name), \
                bio = COALESCE($6, bio), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(update.display_name.as_deref())
        .bind(update.phone.as_deref())
        .bind(update.shipping_address.as_deref())
        .bind(update.store_name.as_deref())
        .bind(update.bio.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Profile::try_from(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn set_role(&self, id: UserId, role: Role) -> Result<Profile, RepositoryError> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!(
            "UPDATE profile SET role = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Profile::try_from(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn set_disabled(&self, id: UserId, disabled: bool) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE profile SET disabled = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(disabled)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Page through profiles for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &ProfileFilter) -> Result<Vec<Profile>, RepositoryError> {
        let pattern = filter
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{q}%"));

        let rows = sqlx::query_as::<_, ProfileRow>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profile \
             WHERE ($1::user_role IS NULL OR role = $1) \
               AND ($2::text IS NULL OR email ILIKE $2 OR display_name ILIKE $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        ))
        .bind(filter.role)
        .bind(pattern)
        .bind(PAGE_SIZE)
        .bind(super::page_offset(filter.page))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Profile::try_from).collect()
    }

    /// Number of profiles per role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_role(&self) -> Result<Vec<(Role, i64)>, RepositoryError> {
        let counts = sqlx::query_as::<_, (Role, i64)>(
            "SELECT role, COUNT(*) FROM profile GROUP BY role ORDER BY role",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(counts)
    }
}
