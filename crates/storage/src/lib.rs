use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use shared::domain::{
    Activity, ActivityDetail, ActivityId, ActivityInvite, Actor, Connection, ConnectionDetail,
    ConnectionId, ConnectionStatus, InviteDetail, InviteId, InviteStatus, Role, UserId,
    UserSummary,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CONNECTION_COLUMNS: &str = "id, professional_id, client_id, status, initiated_by, created_at";
const INVITE_COLUMNS: &str = "id, activity_id, client_id, status, created_at";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Outcome of the conditional invite insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InviteInsert {
    Created(ActivityInvite),
    /// The activity does not exist or is not owned by the given professional.
    ActivityMissing,
    /// No accepted connection joins the activity owner and the client.
    NotConnected,
    /// A pending invite already exists for this activity and client.
    Duplicate,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, name: &str, email: &str, role: Role) -> Result<Actor> {
        let row = sqlx::query(
            "INSERT INTO users (name, email, role) VALUES (?, ?, ?)
             RETURNING id, name, email, role",
        )
        .bind(name)
        .bind(email.trim())
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to create user '{}'", email.trim()))?;
        actor_from_row(&row)
    }

    pub async fn actor_by_id(&self, user_id: UserId) -> Result<Option<Actor>> {
        let row = sqlx::query("SELECT id, name, email, role FROM users WHERE id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(actor_from_row).transpose()
    }

    /// Emails compare case-insensitively.
    pub async fn actor_by_email(&self, email: &str) -> Result<Option<Actor>> {
        let row = sqlx::query("SELECT id, name, email, role FROM users WHERE email = ?")
            .bind(email.trim())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(actor_from_row).transpose()
    }

    pub async fn list_users(&self, role: Option<Role>) -> Result<Vec<UserSummary>> {
        let rows = match role {
            Some(role) => {
                sqlx::query("SELECT id, name, email FROM users WHERE role = ? ORDER BY id ASC")
                    .bind(role.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT id, name, email FROM users ORDER BY id ASC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter()
            .map(|r| -> Result<UserSummary> {
                Ok(UserSummary {
                    id: UserId(r.try_get("id")?),
                    name: r.try_get("name")?,
                    email: r.try_get("email")?,
                })
            })
            .collect()
    }

    /// Inserts a pending connection. Returns `None` when the pair already has a
    /// pending or accepted connection.
    pub async fn insert_connection(
        &self,
        professional_id: UserId,
        client_id: UserId,
        initiated_by: UserId,
    ) -> Result<Option<Connection>> {
        let result = sqlx::query(&format!(
            "INSERT INTO connections (professional_id, client_id, status, initiated_by, created_at)
             VALUES (?, ?, 'pending', ?, ?)
             RETURNING {CONNECTION_COLUMNS}"
        ))
        .bind(professional_id.0)
        .bind(client_id.0)
        .bind(initiated_by.0)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => connection_from_row(&row).map(Some),
            Err(err) if is_unique_violation(&err) => Ok(None),
            Err(err) => Err(err).context("failed to insert connection"),
        }
    }

    pub async fn connection(&self, connection_id: ConnectionId) -> Result<Option<Connection>> {
        let row = sqlx::query(&format!(
            "SELECT {CONNECTION_COLUMNS} FROM connections WHERE id = ?"
        ))
        .bind(connection_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(connection_from_row).transpose()
    }

    /// Moves a connection out of `pending`. Returns `None` if it is gone or no longer
    /// pending by the time the write runs.
    pub async fn resolve_pending_connection(
        &self,
        connection_id: ConnectionId,
        next: ConnectionStatus,
    ) -> Result<Option<Connection>> {
        let row = sqlx::query(&format!(
            "UPDATE connections SET status = ?
             WHERE id = ? AND status = 'pending'
             RETURNING {CONNECTION_COLUMNS}"
        ))
        .bind(next.as_str())
        .bind(connection_id.0)
        .fetch_optional(&self.pool)
        .await
        .context("failed to update connection status")?;
        row.as_ref().map(connection_from_row).transpose()
    }

    /// Hard-deletes an accepted connection. Returns `false` if nothing matched.
    pub async fn delete_accepted_connection(&self, connection_id: ConnectionId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM connections WHERE id = ? AND status = 'accepted'")
            .bind(connection_id.0)
            .execute(&self.pool)
            .await
            .context("failed to delete connection")?
            .rows_affected();
        Ok(deleted > 0)
    }

    /// Every connection involving the user, in creation order, joined with both parties.
    pub async fn list_connections_for_user(&self, user_id: UserId) -> Result<Vec<ConnectionDetail>> {
        let rows = sqlx::query(
            "SELECT c.id, c.professional_id, c.client_id, c.status, c.initiated_by, c.created_at,
                    p.id AS professional_user_id, p.name AS professional_name, p.email AS professional_email,
                    u.id AS client_user_id, u.name AS client_name, u.email AS client_email
             FROM connections c
             LEFT JOIN users p ON p.id = c.professional_id
             LEFT JOIN users u ON u.id = c.client_id
             WHERE c.professional_id = ? OR c.client_id = ?
             ORDER BY c.id ASC",
        )
        .bind(user_id.0)
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<ConnectionDetail> {
                Ok(ConnectionDetail {
                    connection: connection_from_row(r)?,
                    professional: joined_user(r, "professional")?,
                    client: joined_user(r, "client")?,
                })
            })
            .collect()
    }

    pub async fn insert_activity(
        &self,
        created_by: UserId,
        title: &str,
        description: &str,
    ) -> Result<Activity> {
        let row = sqlx::query(
            "INSERT INTO activities (title, description, created_by, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, title, description, created_by, created_at",
        )
        .bind(title)
        .bind(description)
        .bind(created_by.0)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("failed to insert activity")?;
        activity_from_row(&row)
    }

    pub async fn activity(&self, activity_id: ActivityId) -> Result<Option<Activity>> {
        let row = sqlx::query(
            "SELECT id, title, description, created_by, created_at FROM activities WHERE id = ?",
        )
        .bind(activity_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(activity_from_row).transpose()
    }

    /// Deletes an activity owned by `owner` together with all of its invites, in one
    /// transaction. Returns the number of invites removed, or `None` if no such
    /// activity exists for that owner.
    pub async fn delete_activity_cascade(
        &self,
        activity_id: ActivityId,
        owner: UserId,
    ) -> Result<Option<u64>> {
        let mut tx = self.pool.begin().await?;

        let invites = sqlx::query("DELETE FROM activity_invites WHERE activity_id = ?")
            .bind(activity_id.0)
            .execute(&mut *tx)
            .await
            .context("failed to delete activity invites")?
            .rows_affected();

        let activities = sqlx::query("DELETE FROM activities WHERE id = ? AND created_by = ?")
            .bind(activity_id.0)
            .bind(owner.0)
            .execute(&mut *tx)
            .await
            .context("failed to delete activity")?
            .rows_affected();

        if activities == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(invites))
    }

    pub async fn list_activities_for_creator(&self, user_id: UserId) -> Result<Vec<ActivityDetail>> {
        let rows = sqlx::query(
            "SELECT a.id, a.title, a.description, a.created_by, a.created_at,
                    cr.id AS creator_user_id, cr.name AS creator_name, cr.email AS creator_email
             FROM activities a
             LEFT JOIN users cr ON cr.id = a.created_by
             WHERE a.created_by = ?
             ORDER BY a.id ASC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<ActivityDetail> {
                Ok(ActivityDetail {
                    activity: activity_from_row(r)?,
                    creator: joined_user(r, "creator")?,
                })
            })
            .collect()
    }

    /// Inserts a pending invite only if the activity belongs to `owner` and an accepted
    /// connection joins `owner` and `client_id`. The check and the write are one
    /// statement.
    pub async fn insert_invite_if_connected(
        &self,
        activity_id: ActivityId,
        owner: UserId,
        client_id: UserId,
    ) -> Result<InviteInsert> {
        let result = sqlx::query(&format!(
            "INSERT INTO activity_invites (activity_id, client_id, status, created_at)
             SELECT a.id, ?, 'pending', ?
             FROM activities a
             WHERE a.id = ? AND a.created_by = ?
               AND EXISTS (
                   SELECT 1 FROM connections c
                   WHERE c.professional_id = a.created_by
                     AND c.client_id = ?
                     AND c.status = 'accepted'
               )
             RETURNING {INVITE_COLUMNS}"
        ))
        .bind(client_id.0)
        .bind(Utc::now())
        .bind(activity_id.0)
        .bind(owner.0)
        .bind(client_id.0)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => Ok(InviteInsert::Created(invite_from_row(&row)?)),
            Ok(None) => {
                let owned = self
                    .activity(activity_id)
                    .await?
                    .is_some_and(|activity| activity.created_by == owner);
                Ok(if owned {
                    InviteInsert::NotConnected
                } else {
                    InviteInsert::ActivityMissing
                })
            }
            Err(err) if is_unique_violation(&err) => Ok(InviteInsert::Duplicate),
            Err(err) => Err(err).context("failed to insert activity invite"),
        }
    }

    pub async fn invite(&self, invite_id: InviteId) -> Result<Option<ActivityInvite>> {
        let row = sqlx::query(&format!(
            "SELECT {INVITE_COLUMNS} FROM activity_invites WHERE id = ?"
        ))
        .bind(invite_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(invite_from_row).transpose()
    }

    pub async fn resolve_pending_invite(
        &self,
        invite_id: InviteId,
        next: InviteStatus,
    ) -> Result<Option<ActivityInvite>> {
        let row = sqlx::query(&format!(
            "UPDATE activity_invites SET status = ?
             WHERE id = ? AND status = 'pending'
             RETURNING {INVITE_COLUMNS}"
        ))
        .bind(next.as_str())
        .bind(invite_id.0)
        .fetch_optional(&self.pool)
        .await
        .context("failed to update invite status")?;
        row.as_ref().map(invite_from_row).transpose()
    }

    pub async fn count_invites_for_activity(&self, activity_id: ActivityId) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM activity_invites WHERE activity_id = ?")
            .bind(activity_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Invites addressed to a client, joined with the activity, its creator and the client.
    pub async fn list_invites_for_client(&self, client_id: UserId) -> Result<Vec<InviteDetail>> {
        let rows = sqlx::query(
            "SELECT i.id, i.activity_id, i.client_id, i.status, i.created_at,
                    a.title AS activity_title, a.description AS activity_description,
                    a.created_by AS activity_created_by, a.created_at AS activity_created_at,
                    cr.id AS creator_user_id, cr.name AS creator_name, cr.email AS creator_email,
                    u.id AS client_user_id, u.name AS client_name, u.email AS client_email
             FROM activity_invites i
             INNER JOIN activities a ON a.id = i.activity_id
             LEFT JOIN users cr ON cr.id = a.created_by
             LEFT JOIN users u ON u.id = i.client_id
             WHERE i.client_id = ?
             ORDER BY i.id ASC",
        )
        .bind(client_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| -> Result<InviteDetail> {
                let invite = invite_from_row(r)?;
                let activity = Activity {
                    id: invite.activity_id,
                    title: r.try_get("activity_title")?,
                    description: r.try_get("activity_description")?,
                    created_by: UserId(r.try_get("activity_created_by")?),
                    created_at: r.try_get("activity_created_at")?,
                };
                Ok(InviteDetail {
                    invite,
                    activity: ActivityDetail {
                        activity,
                        creator: joined_user(r, "creator")?,
                    },
                    client: joined_user(r, "client")?,
                })
            })
            .collect()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn actor_from_row(row: &SqliteRow) -> Result<Actor> {
    let role: String = row.try_get("role")?;
    Ok(Actor {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: role.parse::<Role>().map_err(|e| anyhow!(e))?,
    })
}

fn connection_from_row(row: &SqliteRow) -> Result<Connection> {
    let status: String = row.try_get("status")?;
    Ok(Connection {
        id: ConnectionId(row.try_get("id")?),
        professional_id: UserId(row.try_get("professional_id")?),
        client_id: UserId(row.try_get("client_id")?),
        status: status.parse::<ConnectionStatus>().map_err(|e| anyhow!(e))?,
        initiated_by: UserId(row.try_get("initiated_by")?),
        created_at: row.try_get("created_at")?,
    })
}

fn activity_from_row(row: &SqliteRow) -> Result<Activity> {
    Ok(Activity {
        id: ActivityId(row.try_get("id")?),
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        created_by: UserId(row.try_get("created_by")?),
        created_at: row.try_get("created_at")?,
    })
}

fn invite_from_row(row: &SqliteRow) -> Result<ActivityInvite> {
    let status: String = row.try_get("status")?;
    Ok(ActivityInvite {
        id: InviteId(row.try_get("id")?),
        activity_id: ActivityId(row.try_get("activity_id")?),
        client_id: UserId(row.try_get("client_id")?),
        status: status.parse::<InviteStatus>().map_err(|e| anyhow!(e))?,
        created_at: row.try_get("created_at")?,
    })
}

/// Reads `<prefix>_user_id`, `<prefix>_name`, `<prefix>_email` from a LEFT JOIN.
fn joined_user(row: &SqliteRow, prefix: &str) -> Result<Option<UserSummary>> {
    let id: Option<i64> = row.try_get(format!("{prefix}_user_id").as_str())?;
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(Some(UserSummary {
        id: UserId(id),
        name: row.try_get(format!("{prefix}_name").as_str())?,
        email: row.try_get(format!("{prefix}_email").as_str())?,
    }))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
