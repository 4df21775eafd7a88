use crate::auth::repo_types::User;
use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, is_admin, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, is_admin, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Inserts a regular (non-admin) user. Admins are promoted through
    /// `PATCH /admin/users/:id`.
    pub async fn create(
        db: &PgPool,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, name, is_admin, password_hash, created_at
            "#,
        )
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(db)
        .await
        .context("insert user")?;
        Ok(user)
    }
}

/// True when `e` carries a unique-constraint failure from Postgres, such as
/// an email registered between the lookup and the insert.
pub fn is_unique_violation(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<sqlx::Error>(),
        Some(sqlx::Error::Database(db)) if db.is_unique_violation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::db_error;
    use sqlx::error::ErrorKind;

    fn wrapped(e: sqlx::Error) -> anyhow::Error {
        Err::<(), _>(e).context("insert user").unwrap_err()
    }

    #[test]
    fn unique_violation_is_seen_through_context() {
        assert!(is_unique_violation(&wrapped(db_error(ErrorKind::UniqueViolation))));
        assert!(!is_unique_violation(&wrapped(db_error(ErrorKind::ForeignKeyViolation))));
        assert!(!is_unique_violation(&wrapped(sqlx::Error::PoolTimedOut)));
        assert!(!is_unique_violation(&anyhow::anyhow!("duplicate key")));
    }
}
