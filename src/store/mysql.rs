use super::{LEAVE_APPLIER_DATE, LeaveFilter, LeaveStore, StoreError, USER_USERNAME, UserStore};
use crate::model::applier_approver::ApplierApprover;
use crate::model::capability::Capability;
use crate::model::leave::{Leave, LeaveId, LeaveStatus, NewLeave};
use crate::model::page::PageRequest;
use crate::model::role::Role;
use crate::model::user::{NewUser, User, UserId, normalize_username};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::TryStreamExt;
use sqlx::{FromRow, MySqlPool};
use std::str::FromStr;

pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct LeaveRow {
    id: u64,
    applier_id: u64,
    approver_id: u64,
    date: NaiveDate,
    date_applied: DateTime<Utc>,
    reason: String,
    rejection_reason: Option<String>,
    status: String,
}

impl TryFrom<LeaveRow> for Leave {
    type Error = StoreError;

    fn try_from(row: LeaveRow) -> Result<Self, Self::Error> {
        let status = LeaveStatus::from_str(&row.status)
            .map_err(|_| StoreError::Corrupt(format!("leave {} has status '{}'", row.id, row.status)))?;

        Ok(Leave {
            id: LeaveId(row.id),
            applier: UserId(row.applier_id),
            approver: UserId(row.approver_id),
            date: row.date,
            date_applied: row.date_applied,
            reason: row.reason,
            rejection_reason: row.rejection_reason,
            status,
        })
    }
}

#[derive(FromRow)]
struct UserRow {
    id: u64,
    username: String,
    password: String,
    role: String,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = Role::from_str(&row.role)
            .map_err(|_| StoreError::Corrupt(format!("user {} has role '{}'", row.id, row.role)))?;

        Ok(User {
            id: UserId(row.id),
            username: row.username,
            password: row.password,
            role,
        })
    }
}

const LEAVE_COLUMNS: &str =
    "id, applier_id, approver_id, date, date_applied, reason, rejection_reason, status";

const USER_COLUMNS: &str = "id, username, password, role";

// Helper enum for typed SQLx binding
#[derive(Debug, PartialEq, Eq)]
enum FilterValue {
    U64(u64),
    Str(&'static str),
}

fn where_clause(filter: &LeaveFilter) -> (String, Vec<FilterValue>) {
    let mut where_sql = String::from(" WHERE 1=1");
    let mut args = Vec::new();

    if let Some(applier) = filter.applier {
        where_sql.push_str(" AND applier_id = ?");
        args.push(FilterValue::U64(applier.0));
    }
    if let Some(approver) = filter.approver {
        where_sql.push_str(" AND approver_id = ?");
        args.push(FilterValue::U64(approver.0));
    }
    if let Some(status) = filter.status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.into()));
    }

    (where_sql, args)
}

fn map_unique(e: sqlx::Error, constraint: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation(constraint);
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::MissingReference;
        }
    }
    StoreError::Database(e)
}

#[async_trait]
impl LeaveStore for MySqlStore {
    async fn insert_leave(&self, leave: NewLeave) -> Result<Leave, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO leaves
                (applier_id, approver_id, date, date_applied, reason, status)
            VALUES (?, ?, ?, ?, ?, 'PENDING')
            "#,
        )
        .bind(leave.applier.0)
        .bind(leave.approver.0)
        .bind(leave.date)
        .bind(leave.date_applied)
        .bind(&leave.reason)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, LEAVE_APPLIER_DATE))?;

        Ok(leave.into_leave(LeaveId(result.last_insert_id())))
    }

    async fn get_leave(&self, id: LeaveId) -> Result<Option<Leave>, StoreError> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ?");

        sqlx::query_as::<_, LeaveRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(Leave::try_from)
            .transpose()
    }

    async fn resolve_if_pending(
        &self,
        id: LeaveId,
        status: LeaveStatus,
        rejection_reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE leaves
            SET status = ?, rejection_reason = ?
            WHERE id = ?
            AND status = 'PENDING'
            "#,
        )
        .bind(status.as_ref())
        .bind(rejection_reason)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn filter_leaves(
        &self,
        filter: &LeaveFilter,
        page: Option<PageRequest>,
    ) -> Result<Vec<Leave>, StoreError> {
        let (where_sql, args) = where_clause(filter);
        let limit_sql = if page.is_some() { " LIMIT ? OFFSET ?" } else { "" };
        let data_sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leaves{where_sql} ORDER BY date_applied DESC, id DESC{limit_sql}"
        );

        let mut data_q = sqlx::query_as::<_, LeaveRow>(&data_sql);
        for arg in args {
            data_q = match arg {
                FilterValue::U64(v) => data_q.bind(v),
                FilterValue::Str(s) => data_q.bind(s),
            };
        }
        if let Some(page) = page {
            data_q = data_q.bind(page.per_page).bind(page.offset());
        }

        data_q
            .fetch(&self.pool)
            .map_err(StoreError::from)
            .and_then(|row| async move { Leave::try_from(row) })
            .try_collect()
            .await
    }

    async fn count_leaves(&self, filter: &LeaveFilter) -> Result<u64, StoreError> {
        let (where_sql, args) = where_clause(filter);
        let count_sql = format!("SELECT COUNT(*) FROM leaves{where_sql}");

        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(v),
                FilterValue::Str(s) => count_q.bind(s),
            };
        }

        let total = count_q.fetch_one(&self.pool).await?;
        Ok(total.max(0) as u64)
    }

    async fn applier_mapping(&self, applier: UserId) -> Result<Option<ApplierApprover>, StoreError> {
        let row = sqlx::query_as::<_, (u64, Option<u64>)>(
            "SELECT user_id, approver_id FROM applier_approvers WHERE user_id = ?",
        )
        .bind(applier.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(user, approver)| ApplierApprover {
            user: UserId(user),
            approver: approver.map(UserId),
        }))
    }

    async fn assign_approver(&self, mapping: ApplierApprover) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO applier_approvers (user_id, approver_id)
            VALUES (?, ?)
            ON DUPLICATE KEY UPDATE approver_id = VALUES(approver_id)
            "#,
        )
        .bind(mapping.user.0)
        .bind(mapping.approver.map(|a| a.0))
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "applier_approvers_pkey"))?;

        Ok(())
    }

    async fn is_applier_of(&self, approver: UserId, applier: UserId) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM applier_approvers WHERE approver_id = ? AND user_id = ? LIMIT 1)",
        )
        .bind(approver.0)
        .bind(applier.0)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists != 0)
    }

    async fn appliers_of(&self, approver: UserId) -> Result<Vec<User>, StoreError> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT u.id, u.username, u.password, u.role
            FROM users u
            JOIN applier_approvers aa ON aa.user_id = u.id
            WHERE aa.approver_id = ?
            ORDER BY u.username
            "#,
        )
        .bind(approver.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }
}

#[async_trait]
impl UserStore for MySqlStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let result = sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
            .bind(&user.username)
            .bind(&user.password)
            .bind(user.role.as_ref())
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique(e, USER_USERNAME))?;

        Ok(User {
            id: UserId(result.last_insert_id()),
            username: user.username,
            password: user.password,
            role: user.role,
        })
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");

        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        // username_lower is a stored generated column with a unique key
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username_lower = ?");

        sqlx::query_as::<_, UserRow>(&sql)
            .bind(normalize_username(username))
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");

        sqlx::query_as::<_, UserRow>(&sql)
            .fetch(&self.pool)
            .map_err(StoreError::from)
            .and_then(|row| async move { User::try_from(row) })
            .try_collect()
            .await
    }

    async fn sync_role_grants(&self, role: Role, capabilities: &[Capability]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT IGNORE INTO roles (name) VALUES (?)")
            .bind(role.as_ref())
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM role_capabilities WHERE role = ?")
            .bind(role.as_ref())
            .execute(&mut *tx)
            .await?;

        for capability in capabilities {
            sqlx::query("INSERT INTO role_capabilities (role, capability) VALUES (?, ?)")
                .bind(role.as_ref())
                .bind(capability.as_ref())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn role_grants(&self) -> Result<Vec<(Role, Capability)>, StoreError> {
        let rows = sqlx::query_as::<_, (String, String)>(
            "SELECT role, capability FROM role_capabilities ORDER BY role, capability",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(role, capability)| {
                let parsed_role = Role::from_str(&role)
                    .map_err(|_| StoreError::Corrupt(format!("unknown role '{role}'")))?;
                let parsed_capability = Capability::from_str(&capability)
                    .map_err(|_| StoreError::Corrupt(format!("unknown capability '{capability}'")))?;
                Ok((parsed_role, parsed_capability))
            })
            .collect()
    }

    async fn insert_refresh_token(
        &self,
        user: UserId,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, jti, expires_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user.0)
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique(e, "uq_refresh_tokens_jti"))?;

        Ok(())
    }

    async fn revoke_refresh_token(&self, jti: &str) -> Result<Option<UserId>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let owner = sqlx::query_scalar::<_, u64>(
            "SELECT user_id FROM refresh_tokens WHERE jti = ? AND revoked = 0 FOR UPDATE",
        )
        .bind(jti)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(owner) = owner else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE jti = ?")
            .bind(jti)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(UserId(owner)))
    }
}
