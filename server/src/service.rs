use entity::employees;
use platform_api::{ApiError, ApiResult};
use platform_db::{EmployeeRecord, EmployeeStore, NewEmployee};
use sea_orm::{DbErr, SqlErr};

/// Business-rule layer over an [`EmployeeStore`]. Holds the one invariant —
/// no duplicate email on create — and keeps id-lookup absence an `Ok(None)`
/// so only the handler decides what a miss means.
#[derive(Clone, Debug)]
pub struct EmployeeService<S> {
    store: S,
}

impl<S: EmployeeStore> EmployeeService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn create_employee(&self, new: NewEmployee) -> ApiResult<employees::Model> {
        if let Some(existing) = self.store.find_by_email(&new.email).await.map_err(db_error)? {
            return Err(ApiError::DuplicateEmail(existing.email));
        }
        let email = new.email.clone();
        // The pre-check above is not atomic with the insert; the unique index
        // on email catches concurrent creates that slip past it.
        self.store
            .insert(new)
            .await
            .map_err(|err| unique_violation_or(err, &email))
    }

    pub async fn list_employees(&self) -> ApiResult<Vec<employees::Model>> {
        self.store.list_all().await.map_err(db_error)
    }

    pub async fn get_employee(&self, id: i64) -> ApiResult<Option<employees::Model>> {
        self.store.find_by_id(id).await.map_err(db_error)
    }

    /// Persists the full caller-supplied state. No uniqueness pre-check; a
    /// unique-index violation surfaces as [`ApiError::DuplicateEmail`].
    pub async fn update_employee(&self, record: EmployeeRecord) -> ApiResult<employees::Model> {
        let email = record.email.clone();
        self.store
            .save(record)
            .await
            .map_err(|err| unique_violation_or(err, &email))
    }

    /// Idempotent: deleting an absent id is not an error.
    pub async fn delete_employee(&self, id: i64) -> ApiResult<()> {
        self.store.delete_by_id(id).await.map_err(db_error)?;
        Ok(())
    }
}

fn db_error(err: DbErr) -> ApiError {
    ApiError::internal(anyhow::Error::new(err))
}

fn unique_violation_or(err: DbErr, email: &str) -> ApiError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ApiError::DuplicateEmail(email.to_string()),
        _ => db_error(err),
    }
}
