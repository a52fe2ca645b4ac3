use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
};
use entity::employees;
use platform_api::{ApiError, ApiResult};
use platform_db::{DbPool, EmployeeRecord, EmployeeRepo, NewEmployee};
use sea_orm::{ConnectionTrait, Statement};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::{config::AppConfig, service::EmployeeService};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub service: EmployeeService<EmployeeRepo>,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "employee server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/employees",
            get(list_employees_handler).post(create_employee_handler),
        )
        .route(
            "/api/employees/{id}",
            get(get_employee_handler)
                .put(update_employee_handler)
                .delete(delete_employee_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// Request body for create and update. An `id` in the body is ignored; on
/// updates the path id is authoritative.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmployeeInput {
    first_name: String,
    last_name: String,
    email: String,
}

impl From<EmployeeInput> for NewEmployee {
    fn from(input: EmployeeInput) -> Self {
        Self {
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
        }
    }
}

async fn create_employee_handler(
    State(state): State<AppState>,
    Json(input): Json<EmployeeInput>,
) -> ApiResult<(StatusCode, Json<employees::Model>)> {
    let created = state.service.create_employee(input.into()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_employees_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<employees::Model>>> {
    let records = state.service.list_employees().await?;
    Ok(Json(records))
}

async fn get_employee_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<employees::Model>> {
    state
        .service
        .get_employee(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn update_employee_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<EmployeeInput>,
) -> ApiResult<Json<employees::Model>> {
    let existing = state
        .service
        .get_employee(id)
        .await?
        .ok_or(ApiError::NotFound)?;
    let updated = state
        .service
        .update_employee(EmployeeRecord {
            id: Some(existing.id),
            first_name: input.first_name,
            last_name: input.last_name,
            email: input.email,
        })
        .await?;
    Ok(Json(updated))
}

async fn delete_employee_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<&'static str> {
    state.service.delete_employee(id).await?;
    Ok("Employee deleted successfully")
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state
        .pool
        .execute(Statement::from_string(
            state.pool.get_database_backend(),
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use sea_orm::{Database, DatabaseBackend};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let conn = Database::connect("sqlite::memory:").await.unwrap();
        conn.execute(Statement::from_string(
            DatabaseBackend::Sqlite,
            r#"
            CREATE TABLE employees (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE
            );
            "#,
        ))
        .await
        .unwrap();

        let state = AppState {
            pool: conn.clone(),
            service: EmployeeService::new(EmployeeRepo::new(conn)),
            config: Arc::new(AppConfig::default()),
        };
        build_router(state)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn bheem() -> Value {
        json!({
            "firstName": "Bheem",
            "lastName": "Shekhar",
            "email": "bheem@gmail.com"
        })
    }

    #[tokio::test]
    async fn create_returns_201_with_the_stored_record() {
        let router = test_router().await;
        let response = router
            .oneshot(json_request("POST", "/api/employees", bheem()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert!(body["id"].as_i64().unwrap() > 0);
        assert_eq!(body["firstName"], "Bheem");
        assert_eq!(body["lastName"], "Shekhar");
        assert_eq!(body["email"], "bheem@gmail.com");
    }

    #[tokio::test]
    async fn create_with_taken_email_returns_409() {
        let router = test_router().await;
        router
            .clone()
            .oneshot(json_request("POST", "/api/employees", bheem()))
            .await
            .unwrap();

        let response = router
            .clone()
            .oneshot(json_request("POST", "/api/employees", bheem()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["code"], "DUPLICATE_EMAIL");

        let listed = router
            .oneshot(empty_request("GET", "/api/employees"))
            .await
            .unwrap();
        assert_eq!(body_json(listed).await.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_is_empty_before_any_create() {
        let router = test_router().await;
        let response = router
            .oneshot(empty_request("GET", "/api/employees"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn get_by_id_roundtrips_the_record() {
        let router = test_router().await;
        let created = body_json(
            router
                .clone()
                .oneshot(json_request("POST", "/api/employees", bheem()))
                .await
                .unwrap(),
        )
        .await;
        let id = created["id"].as_i64().unwrap();

        let response = router
            .oneshot(empty_request("GET", &format!("/api/employees/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, created);
    }

    #[tokio::test]
    async fn get_by_unknown_id_is_404_with_empty_body() {
        let router = test_router().await;
        let response = router
            .oneshot(empty_request("GET", "/api/employees/999"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn update_overwrites_fields_and_ignores_a_body_id() {
        let router = test_router().await;
        let created = body_json(
            router
                .clone()
                .oneshot(json_request("POST", "/api/employees", bheem()))
                .await
                .unwrap(),
        )
        .await;
        let id = created["id"].as_i64().unwrap();

        let response = router
            .clone()
            .oneshot(json_request(
                "PUT",
                &format!("/api/employees/{id}"),
                json!({
                    "id": 424242,
                    "firstName": "Raj",
                    "lastName": "Shekhar",
                    "email": "rajshekhar@gmail.com"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"].as_i64().unwrap(), id);
        assert_eq!(body["firstName"], "Raj");
        assert_eq!(body["email"], "rajshekhar@gmail.com");
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_404_and_mutates_nothing() {
        let router = test_router().await;
        let response = router
            .clone()
            .oneshot(json_request("PUT", "/api/employees/999", bheem()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let listed = router
            .oneshot(empty_request("GET", "/api/employees"))
            .await
            .unwrap();
        assert_eq!(body_json(listed).await, json!([]));
    }

    #[tokio::test]
    async fn update_to_a_taken_email_returns_409() {
        let router = test_router().await;
        router
            .clone()
            .oneshot(json_request("POST", "/api/employees", bheem()))
            .await
            .unwrap();
        let second = body_json(
            router
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/api/employees",
                    json!({
                        "firstName": "Raj",
                        "lastName": "Shekhar",
                        "email": "rajshekhar@gmail.com"
                    }),
                ))
                .await
                .unwrap(),
        )
        .await;
        let id = second["id"].as_i64().unwrap();

        // No pre-check on update; the unique index rejects the collision.
        let response = router
            .oneshot(json_request(
                "PUT",
                &format!("/api/employees/{id}"),
                bheem(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn delete_confirms_and_stays_200_for_unknown_ids() {
        let router = test_router().await;
        let created = body_json(
            router
                .clone()
                .oneshot(json_request("POST", "/api/employees", bheem()))
                .await
                .unwrap(),
        )
        .await;
        let id = created["id"].as_i64().unwrap();

        let response = router
            .clone()
            .oneshot(empty_request("DELETE", &format!("/api/employees/{id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"Employee deleted successfully");

        let gone = router
            .clone()
            .oneshot(empty_request("GET", &format!("/api/employees/{id}")))
            .await
            .unwrap();
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);

        let again = router
            .oneshot(empty_request("DELETE", &format!("/api/employees/{id}")))
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_database_liveness() {
        let router = test_router().await;
        let response = router
            .oneshot(empty_request("GET", "/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["db_ok"], true);
    }
}
