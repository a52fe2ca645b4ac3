//! Database primitives: connection settings, the shared pool alias, and the
//! employee persistence gateway.

use entity::employees;
use sea_orm::{
    ActiveModelTrait,
    ActiveValue::{NotSet, Set},
    ColumnTrait, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, Statement, TryIntoModel,
};
use serde::Deserialize;
use thiserror::Error;

/// Shared connection handle alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (set {0})")]
    MissingUrl(String),
    #[error(transparent)]
    Orm(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            env_key: default_url_key(),
        }
    }
}

impl DatabaseSettings {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
        }
    }

    pub fn database_url(&self) -> DbResult<String> {
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl(self.env_key.clone()))
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url()?;
    Database::connect(&url).await.map_err(Into::into)
}

/// Insert input: everything but the server-generated id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEmployee {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Full-state record for the upsert path. `id: None` inserts, `Some` updates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmployeeRecord {
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<employees::Model> for EmployeeRecord {
    fn from(model: employees::Model) -> Self {
        Self {
            id: Some(model.id),
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
        }
    }
}

/// Storage seam for employee records. The business-rule layer only sees this
/// trait; production wires in [`EmployeeRepo`], tests substitute an in-memory
/// double. Operations report existence, never business invariants.
pub trait EmployeeStore {
    fn insert(
        &self,
        new: NewEmployee,
    ) -> impl Future<Output = Result<employees::Model, DbErr>> + Send;
    fn list_all(&self) -> impl Future<Output = Result<Vec<employees::Model>, DbErr>> + Send;
    fn find_by_id(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<Option<employees::Model>, DbErr>> + Send;
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<employees::Model>, DbErr>> + Send;
    fn save(
        &self,
        record: EmployeeRecord,
    ) -> impl Future<Output = Result<employees::Model, DbErr>> + Send;
    /// Returns rows affected; deleting an absent id affects zero rows.
    fn delete_by_id(&self, id: i64) -> impl Future<Output = Result<u64, DbErr>> + Send;
    /// Equality match on both name columns; one arbitrary match if several.
    fn find_by_name_exact(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> impl Future<Output = Result<Option<employees::Model>, DbErr>> + Send;
}

/// sea-orm-backed gateway. Constructed once at startup and handed by
/// reference into the business-rule layer.
#[derive(Clone, Debug)]
pub struct EmployeeRepo {
    pool: DbPool,
}

impl EmployeeRepo {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Raw-SQL twin of [`EmployeeStore::find_by_name_exact`], going through a
    /// parameterized statement instead of the query builder.
    pub async fn find_by_name_query(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<employees::Model>, DbErr> {
        let backend = self.pool.get_database_backend();
        let sql = match backend {
            DatabaseBackend::Postgres => {
                "SELECT * FROM employees WHERE first_name = $1 AND last_name = $2"
            }
            _ => "SELECT * FROM employees WHERE first_name = ? AND last_name = ?",
        };
        employees::Entity::find()
            .from_raw_sql(Statement::from_sql_and_values(
                backend,
                sql,
                [first_name.into(), last_name.into()],
            ))
            .one(&self.pool)
            .await
    }
}

impl EmployeeStore for EmployeeRepo {
    async fn insert(&self, new: NewEmployee) -> Result<employees::Model, DbErr> {
        let model = employees::ActiveModel {
            id: NotSet,
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            email: Set(new.email),
        };
        model.insert(&self.pool).await
    }

    async fn list_all(&self) -> Result<Vec<employees::Model>, DbErr> {
        employees::Entity::find().all(&self.pool).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<employees::Model>, DbErr> {
        employees::Entity::find_by_id(id).one(&self.pool).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<employees::Model>, DbErr> {
        employees::Entity::find()
            .filter(employees::Column::Email.eq(email))
            .one(&self.pool)
            .await
    }

    async fn save(&self, record: EmployeeRecord) -> Result<employees::Model, DbErr> {
        let model = employees::ActiveModel {
            id: record.id.map_or(NotSet, Set),
            first_name: Set(record.first_name),
            last_name: Set(record.last_name),
            email: Set(record.email),
        };
        model.save(&self.pool).await?.try_into_model()
    }

    async fn delete_by_id(&self, id: i64) -> Result<u64, DbErr> {
        let result = employees::Entity::delete_by_id(id).exec(&self.pool).await?;
        Ok(result.rows_affected)
    }

    async fn find_by_name_exact(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<Option<employees::Model>, DbErr> {
        employees::Entity::find()
            .filter(employees::Column::FirstName.eq(first_name))
            .filter(employees::Column::LastName.eq(last_name))
            .one(&self.pool)
            .await
    }
}
