//! PostgreSQL storage

use async_trait::async_trait;
use common::error::DatabaseError;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use super::{ContentTypeRepository, PermissionRepository, UserRepository};
use crate::error::{AccountsError, AccountsResult};
use crate::models::{ContentTypeRecord, Gender, PermissionRecord, ProviderRecord, UserRecord};

const SELECT_CONTENT_TYPES: &str = "SELECT id, name, app_label, model FROM content_types";

const SELECT_PERMISSIONS: &str = "SELECT id, name, content_type_id, codename FROM permissions";

const SELECT_USERS: &str = r#"
    SELECT id, username, first_name, last_name, email, password, is_staff, is_active,
           is_superuser, last_login, date_joined, permission_ids, birthdate, web_url,
           facebook_page, youtube_channel, gender, is_complete, providers, photo_url, uid,
           display_name
    FROM users
"#;

/// Account repositories backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> AccountsResult<()> {
        info!("Running account migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        Ok(())
    }

    async fn fetch_user(&self, filter: &str, value: &str) -> AccountsResult<Option<UserRecord>> {
        let sql = format!("{} WHERE {} = $1", SELECT_USERS, filter);
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        row.map(|row| user_from_row(&row))
            .transpose()
            .map_err(|e| DatabaseError::Query(e).into())
    }
}

fn user_from_row(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    let gender: Option<String> = row.try_get("gender")?;
    let providers: Json<Vec<ProviderRecord>> = row.try_get("providers")?;

    Ok(UserRecord {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        password: row.try_get("password")?,
        is_staff: row.try_get("is_staff")?,
        is_active: row.try_get("is_active")?,
        is_superuser: row.try_get("is_superuser")?,
        last_login: row.try_get("last_login")?,
        date_joined: row.try_get("date_joined")?,
        permissions: row.try_get("permission_ids")?,
        birthdate: row.try_get("birthdate")?,
        web_url: row.try_get("web_url")?,
        facebook_page: row.try_get("facebook_page")?,
        youtube_channel: row.try_get("youtube_channel")?,
        gender: Gender::from_db(gender.as_deref()),
        is_complete: row.try_get("is_complete")?,
        providers: providers.0,
        photo_url: row.try_get("photo_url")?,
        uid: row.try_get("uid")?,
        display_name: row.try_get("display_name")?,
    })
}

/// Binds `$1..$22` in column order; `$1` is the id.
fn bind_user<'q>(
    query: Query<'q, Postgres, PgArguments>,
    user: &'q UserRecord,
) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(user.id)
        .bind(user.username.as_deref())
        .bind(user.first_name.as_deref())
        .bind(user.last_name.as_deref())
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.is_staff)
        .bind(user.is_active)
        .bind(user.is_superuser)
        .bind(user.last_login)
        .bind(user.date_joined)
        .bind(&user.permissions)
        .bind(user.birthdate)
        .bind(user.web_url.as_deref())
        .bind(user.facebook_page.as_deref())
        .bind(user.youtube_channel.as_deref())
        .bind(user.gender.as_db())
        .bind(user.is_complete)
        .bind(Json(&user.providers))
        .bind(user.photo_url.as_deref())
        .bind(&user.uid)
        .bind(user.display_name.as_deref())
}

const USERNAME_CONSTRAINT: &str = "users_username_key";

/// Map a failed user write to the uniqueness rule it broke
fn user_write_error(err: DatabaseError, user: &UserRecord) -> AccountsError {
    if !matches!(err, DatabaseError::UniqueViolation { .. }) {
        return err.into();
    }
    if err.violated_constraint() == Some(USERNAME_CONSTRAINT) {
        AccountsError::duplicate("username", user.username.clone().unwrap_or_default())
    } else {
        AccountsError::duplicate("id", user.id.to_string())
    }
}

#[async_trait]
impl ContentTypeRepository for PgStore {
    async fn insert_content_type(&self, content_type: &ContentTypeRecord) -> AccountsResult<()> {
        info!("Creating content type: {}", content_type.label());

        sqlx::query(
            r#"
            INSERT INTO content_types (id, name, app_label, model)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(content_type.id)
        .bind(&content_type.name)
        .bind(&content_type.app_label)
        .bind(&content_type.model)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from_query(e) {
            DatabaseError::UniqueViolation { .. } => {
                AccountsError::duplicate("content_type", content_type.label())
            }
            other => other.into(),
        })?;

        Ok(())
    }

    async fn content_type_by_id(&self, id: Uuid) -> AccountsResult<Option<ContentTypeRecord>> {
        let sql = format!("{} WHERE id = $1", SELECT_CONTENT_TYPES);
        let content_type = sqlx::query_as::<_, ContentTypeRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;
        Ok(content_type)
    }

    async fn content_type_by_natural_key(
        &self,
        app_label: &str,
        model: &str,
    ) -> AccountsResult<Option<ContentTypeRecord>> {
        let sql = format!("{} WHERE app_label = $1 AND model = $2", SELECT_CONTENT_TYPES);
        let content_type = sqlx::query_as::<_, ContentTypeRecord>(&sql)
            .bind(app_label)
            .bind(model)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;
        Ok(content_type)
    }
}

#[async_trait]
impl PermissionRepository for PgStore {
    async fn insert_permission(&self, permission: &PermissionRecord) -> AccountsResult<()> {
        info!("Creating permission: {}", permission.codename);

        sqlx::query(
            r#"
            INSERT INTO permissions (id, name, content_type_id, codename)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(permission.id)
        .bind(&permission.name)
        .bind(permission.content_type)
        .bind(&permission.codename)
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from_query(e) {
            DatabaseError::UniqueViolation { .. } => {
                AccountsError::duplicate("permission", permission.codename.clone())
            }
            other => other.into(),
        })?;

        Ok(())
    }

    async fn permission_by_id(&self, id: Uuid) -> AccountsResult<Option<PermissionRecord>> {
        let sql = format!("{} WHERE id = $1", SELECT_PERMISSIONS);
        let permission = sqlx::query_as::<_, PermissionRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;
        Ok(permission)
    }

    async fn permission_by_codename(
        &self,
        content_type_id: Uuid,
        codename: &str,
    ) -> AccountsResult<Option<PermissionRecord>> {
        let sql = format!("{} WHERE content_type_id = $1 AND codename = $2", SELECT_PERMISSIONS);
        let permission = sqlx::query_as::<_, PermissionRecord>(&sql)
            .bind(content_type_id)
            .bind(codename)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;
        Ok(permission)
    }

    async fn permissions_by_ids(&self, ids: &[Uuid]) -> AccountsResult<Vec<PermissionRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("{} WHERE id = ANY($1)", SELECT_PERMISSIONS);
        let found = sqlx::query_as::<_, PermissionRecord>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        Ok(ids
            .iter()
            .filter_map(|id| found.iter().find(|p| p.id == *id).cloned())
            .collect())
    }

    async fn list_permissions(&self) -> AccountsResult<Vec<PermissionRecord>> {
        let sql = format!("{} ORDER BY content_type_id, codename", SELECT_PERMISSIONS);
        let permissions = sqlx::query_as::<_, PermissionRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;
        Ok(permissions)
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert_user(&self, user: &UserRecord) -> AccountsResult<()> {
        info!("Creating new user: {}", user.id);

        let query = sqlx::query(
            r#"
            INSERT INTO users (
                id, username, first_name, last_name, email, password, is_staff, is_active,
                is_superuser, last_login, date_joined, permission_ids, birthdate, web_url,
                facebook_page, youtube_channel, gender, is_complete, providers, photo_url, uid,
                display_name
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22)
            "#,
        );
        bind_user(query, user)
            .execute(&self.pool)
            .await
            .map_err(|e| user_write_error(DatabaseError::from_query(e), user))?;

        Ok(())
    }

    async fn update_user(&self, user: &UserRecord) -> AccountsResult<()> {
        info!("Saving user: {}", user.id);

        let query = sqlx::query(
            r#"
            UPDATE users SET
                username = $2, first_name = $3, last_name = $4, email = $5, password = $6,
                is_staff = $7, is_active = $8, is_superuser = $9, last_login = $10,
                date_joined = $11, permission_ids = $12, birthdate = $13, web_url = $14,
                facebook_page = $15, youtube_channel = $16, gender = $17, is_complete = $18,
                providers = $19, photo_url = $20, uid = $21, display_name = $22
            WHERE id = $1
            "#,
        );
        let result = bind_user(query, user)
            .execute(&self.pool)
            .await
            .map_err(|e| user_write_error(DatabaseError::from_query(e), user))?;

        if result.rows_affected() == 0 {
            return Err(AccountsError::not_found("user", user.id.to_string()));
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> AccountsResult<bool> {
        info!("Deleting user: {}", id);

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;
        Ok(result.rows_affected() > 0)
    }

    async fn user_by_id(&self, id: Uuid) -> AccountsResult<Option<UserRecord>> {
        let sql = format!("{} WHERE id = $1", SELECT_USERS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        row.map(|row| user_from_row(&row))
            .transpose()
            .map_err(|e| DatabaseError::Query(e).into())
    }

    async fn user_by_username(&self, username: &str) -> AccountsResult<Option<UserRecord>> {
        self.fetch_user("username", username).await
    }

    async fn user_by_uid(&self, uid: &str) -> AccountsResult<Option<UserRecord>> {
        self.fetch_user("uid", uid).await
    }

    async fn users_by_email(&self, email: &str) -> AccountsResult<Vec<UserRecord>> {
        let sql = format!("{} WHERE email = $1 ORDER BY date_joined", SELECT_USERS);
        let rows = sqlx::query(&sql)
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        rows.iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::Query(e).into())
    }

    async fn user_by_provider(
        &self,
        provider_id: &str,
        uid: &str,
    ) -> AccountsResult<Option<UserRecord>> {
        let sql = format!("{} WHERE providers @> $1 LIMIT 1", SELECT_USERS);
        let needle = serde_json::json!([{ "provider_id": provider_id, "uid": uid }]);
        let row = sqlx::query(&sql)
            .bind(Json(needle))
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        row.map(|row| user_from_row(&row))
            .transpose()
            .map_err(|e| DatabaseError::Query(e).into())
    }

    async fn list_users(&self) -> AccountsResult<Vec<UserRecord>> {
        let sql = format!("{} ORDER BY date_joined", SELECT_USERS);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from_query)?;

        rows.iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| DatabaseError::Query(e).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(constraint: Option<&str>) -> DatabaseError {
        DatabaseError::UniqueViolation {
            constraint: constraint.map(str::to_string),
        }
    }

    #[test]
    fn username_constraint_maps_to_username_conflict() {
        let mut user = UserRecord::new("ana@example.com", "uid-1");
        user.username = Some("ana".to_string());

        let err = user_write_error(violation(Some(USERNAME_CONSTRAINT)), &user);
        assert!(matches!(
            err,
            AccountsError::UniquenessViolation { field: "username", ref value } if value == "ana"
        ));
    }

    #[test]
    fn other_violations_map_to_id_conflict() {
        let user = UserRecord::new("ana@example.com", "uid-1");

        for err in [violation(Some("users_pkey")), violation(None)] {
            assert!(matches!(
                user_write_error(err, &user),
                AccountsError::UniquenessViolation { field: "id", .. }
            ));
        }
        assert!(matches!(
            user_write_error(DatabaseError::Migration("boom".to_string()), &user),
            AccountsError::Database(_)
        ));
    }
}
