//! PostgreSQL record store.
//!
//! Permission sets are stored as `TEXT[]` of tag names so rows stay readable and
//! new tags need no bit renumbering. Channel overrides are one `JSONB` column
//! holding the normalized list.

use async_trait::async_trait;
use hearth_common::error::{HearthError, HearthResult};
use hearth_common::models::{
    Channel, ChannelType, Member, OverrideTarget, PermissionOverride, Role, RolePatch,
};
use hearth_common::permissions::Permissions;
use serde::Deserialize;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::{RecordReader, RecordWriter};

const ROLE_COLUMNS: &str = "id, server_id, name, color, position, permissions, is_default";
const MEMBER_COLUMNS: &str = "server_id, user_id, role_ids, is_owner";
const CHANNEL_COLUMNS: &str =
    "id, server_id, channel_type, name, recipients, permission_overrides";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    pub async fn connect(url: &str, max_connections: u32, min_connections: u32) -> anyhow::Result<Self> {
        tracing::info!("Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .connect(url)
            .await?;
        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("Migrations complete");
        Ok(())
    }
}

fn role_from_row(row: &PgRow) -> Result<Role, sqlx::Error> {
    let tags: Vec<String> = row.try_get("permissions")?;
    Ok(Role {
        id: row.try_get("id")?,
        server_id: row.try_get("server_id")?,
        name: row.try_get("name")?,
        color: row.try_get("color")?,
        position: row.try_get("position")?,
        permissions: Permissions::from_tag_names(&tags),
        is_default: row.try_get("is_default")?,
    })
}

fn member_from_row(row: &PgRow) -> Result<Member, sqlx::Error> {
    Ok(Member {
        user_id: row.try_get("user_id")?,
        server_id: row.try_get("server_id")?,
        role_ids: row.try_get("role_ids")?,
        is_owner: row.try_get("is_owner")?,
    })
}

/// Override as stored in JSONB. Tags are parsed leniently on read.
#[derive(Deserialize)]
struct StoredOverride {
    target_type: OverrideTarget,
    target_id: Uuid,
    #[serde(default)]
    allow: Vec<String>,
    #[serde(default)]
    deny: Vec<String>,
}

impl From<StoredOverride> for PermissionOverride {
    fn from(stored: StoredOverride) -> Self {
        Self {
            target_type: stored.target_type,
            target_id: stored.target_id,
            allow: Permissions::from_tag_names(&stored.allow),
            deny: Permissions::from_tag_names(&stored.deny),
        }
    }
}

fn channel_from_row(row: &PgRow) -> Result<Channel, sqlx::Error> {
    let raw_type: String = row.try_get("channel_type")?;
    let channel_type = ChannelType::parse(&raw_type).ok_or_else(|| {
        sqlx::Error::Decode(format!("unknown channel type '{raw_type}'").into())
    })?;
    let Json(stored): Json<Vec<StoredOverride>> = row.try_get("permission_overrides")?;
    let permission_overrides = stored.into_iter().map(PermissionOverride::from).collect();

    Ok(Channel {
        id: row.try_get("id")?,
        server_id: row.try_get("server_id")?,
        channel_type,
        name: row.try_get("name")?,
        recipients: row.try_get("recipients")?,
        permission_overrides,
    })
}

/// Drop overrides targeting `target_type`/`target_id` from every channel of a server.
///
/// Rebuilds the JSONB array in SQL so concurrent edits to other entries in the
/// same channel are not lost to a read-modify-write.
const PRUNE_OVERRIDES: &str = r#"
    UPDATE channels SET
        permission_overrides = COALESCE((
            SELECT jsonb_agg(ow)
            FROM jsonb_array_elements(permission_overrides) AS ow
            WHERE NOT (ow->>'target_type' = $2 AND ow->>'target_id' = $3)
        ), '[]'::jsonb),
        updated_at = NOW()
    WHERE server_id = $1
      AND permission_overrides @> jsonb_build_array(jsonb_build_object('target_type', $2::text, 'target_id', $3::text))
"#;

#[async_trait]
impl RecordReader for PgStore {
    async fn find_channel(&self, channel_id: Uuid) -> HearthResult<Option<Channel>> {
        let row = sqlx::query(&format!("SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = $1"))
            .bind(channel_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(channel_from_row).transpose()?)
    }

    async fn find_member(&self, server_id: Uuid, user_id: Uuid) -> HearthResult<Option<Member>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE server_id = $1 AND user_id = $2"
        ))
        .bind(server_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(member_from_row).transpose()?)
    }

    async fn find_owner(&self, server_id: Uuid) -> HearthResult<Option<Member>> {
        let row = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE server_id = $1 AND is_owner"
        ))
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(member_from_row).transpose()?)
    }

    async fn list_server_roles(&self, server_id: Uuid) -> HearthResult<Vec<Role>> {
        let rows = sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE server_id = $1 ORDER BY position DESC, id DESC"
        ))
        .bind(server_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(role_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[async_trait]
impl RecordWriter for PgStore {
    async fn create_role(&self, role: Role) -> HearthResult<Role> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO roles (id, server_id, name, color, position, permissions, is_default, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(role.id)
        .bind(role.server_id)
        .bind(&role.name)
        .bind(role.color)
        .bind(role.position)
        .bind(role.permissions.to_tag_names())
        .bind(role.is_default)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => HearthError::Conflict {
                message: "Role already exists".into(),
            },
            other => HearthError::Database(other),
        })?;
        Ok(role_from_row(&row)?)
    }

    async fn update_role(&self, server_id: Uuid, role_id: Uuid, patch: RolePatch) -> HearthResult<Role> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE roles SET
                name = COALESCE($3, name),
                color = COALESCE($4, color),
                permissions = COALESCE($5, permissions),
                updated_at = NOW()
            WHERE id = $1 AND server_id = $2
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(role_id)
        .bind(server_id)
        .bind(patch.name)
        .bind(patch.color)
        .bind(patch.permissions.map(|p| p.to_tag_names()))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| HearthError::not_found("Role"))?;
        Ok(role_from_row(&row)?)
    }

    async fn set_role_position(
        &self,
        server_id: Uuid,
        role_id: Uuid,
        expected: i32,
        position: i32,
    ) -> HearthResult<Role> {
        let moved = sqlx::query(&format!(
            r#"
            UPDATE roles SET position = $4, updated_at = NOW()
            WHERE id = $1 AND server_id = $2 AND position = $3
            RETURNING {ROLE_COLUMNS}
            "#
        ))
        .bind(role_id)
        .bind(server_id)
        .bind(expected)
        .bind(position)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = moved {
            return Ok(role_from_row(&row)?);
        }

        let current: Option<i32> =
            sqlx::query_scalar("SELECT position FROM roles WHERE id = $1 AND server_id = $2")
                .bind(role_id)
                .bind(server_id)
                .fetch_optional(&self.pool)
                .await?;
        match current {
            None => Err(HearthError::not_found("Role")),
            Some(found) => Err(HearthError::Conflict {
                message: format!("Role position changed (expected {expected}, found {found})"),
            }),
        }
    }

    async fn delete_role(&self, server_id: Uuid, role_id: Uuid) -> HearthResult<()> {
        let mut tx = self.pool.begin().await?;

        let is_default: Option<bool> = sqlx::query_scalar(
            "SELECT is_default FROM roles WHERE id = $1 AND server_id = $2 FOR UPDATE",
        )
        .bind(role_id)
        .bind(server_id)
        .fetch_optional(&mut *tx)
        .await?;

        match is_default {
            None => return Err(HearthError::not_found("Role")),
            Some(true) => {
                return Err(HearthError::bad_request("The @everyone role cannot be deleted"));
            }
            Some(false) => {}
        }

        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE members SET role_ids = array_remove(role_ids, $2) WHERE server_id = $1 AND $2 = ANY(role_ids)",
        )
        .bind(server_id)
        .bind(role_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(PRUNE_OVERRIDES)
            .bind(server_id)
            .bind("role")
            .bind(role_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(%server_id, %role_id, "Role deleted");
        Ok(())
    }

    async fn assign_role(&self, server_id: Uuid, user_id: Uuid, role_id: Uuid) -> HearthResult<Member> {
        let is_default: Option<bool> =
            sqlx::query_scalar("SELECT is_default FROM roles WHERE id = $1 AND server_id = $2")
                .bind(role_id)
                .bind(server_id)
                .fetch_optional(&self.pool)
                .await?;
        match is_default {
            None => return Err(HearthError::not_found("Role")),
            Some(true) => return Err(HearthError::bad_request("The @everyone role is held implicitly")),
            Some(false) => {}
        }

        let row = sqlx::query(&format!(
            r#"
            UPDATE members SET
                role_ids = CASE WHEN $3 = ANY(role_ids) THEN role_ids ELSE array_append(role_ids, $3) END
            WHERE server_id = $1 AND user_id = $2
            RETURNING {MEMBER_COLUMNS}
            "#
        ))
        .bind(server_id)
        .bind(user_id)
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| HearthError::not_found("Member"))?;
        Ok(member_from_row(&row)?)
    }

    async fn unassign_role(&self, server_id: Uuid, user_id: Uuid, role_id: Uuid) -> HearthResult<Member> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE members SET role_ids = array_remove(role_ids, $3)
            WHERE server_id = $1 AND user_id = $2
            RETURNING {MEMBER_COLUMNS}
            "#
        ))
        .bind(server_id)
        .bind(user_id)
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| HearthError::not_found("Member"))?;
        Ok(member_from_row(&row)?)
    }

    async fn remove_member(&self, server_id: Uuid, user_id: Uuid) -> HearthResult<()> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM members WHERE server_id = $1 AND user_id = $2")
            .bind(server_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if removed.rows_affected() == 0 {
            return Err(HearthError::not_found("Member"));
        }

        sqlx::query(PRUNE_OVERRIDES)
            .bind(server_id)
            .bind("member")
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn replace_channel_overrides(
        &self,
        channel_id: Uuid,
        overrides: Vec<PermissionOverride>,
    ) -> HearthResult<Channel> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE channels SET permission_overrides = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CHANNEL_COLUMNS}
            "#
        ))
        .bind(channel_id)
        .bind(Json(overrides))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(HearthError::ChannelNotFound)?;
        Ok(channel_from_row(&row)?)
    }
}
