use std::env;

use anyhow::{anyhow, Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tender_backend::config::AppConfig;
use tender_backend::db::{self, PgPool};
use tender_backend::domain::OrganizationType;
use tender_backend::models::{NewEmployee, NewOrganization, NewOrganizationResponsible};
use tender_backend::routes;
use tender_backend::schema::{employee, organization, organization_responsible};
use tender_backend::state::AppState;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;

        let config = AppConfig {
            database_url,
            database_max_pool_size: 10,
            server_address: "127.0.0.1:0".to_string(),
            cors_allowed_origin: None,
            run_migrations: false,
        };

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let state = AppState::new(pool, config);
        let router = routes::create_router(state.clone());

        Ok(Self { state, router })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(|conn| truncate_all(conn)).await
    }

    pub async fn insert_employee(&self, username: &str) -> Result<Uuid> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            let row = NewEmployee {
                id: Uuid::new_v4(),
                username,
                first_name: None,
                last_name: None,
            };
            diesel::insert_into(employee::table)
                .values(&row)
                .execute(conn)
                .context("failed to insert employee")?;
            Ok(row.id)
        })
        .await
    }

    pub async fn insert_organization(&self, name: &str) -> Result<Uuid> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            let row = NewOrganization {
                id: Uuid::new_v4(),
                name,
                description: None,
                organization_type: OrganizationType::LimitedLiabilityCompany
                    .as_str()
                    .to_string(),
            };
            diesel::insert_into(organization::table)
                .values(&row)
                .execute(conn)
                .context("failed to insert organization")?;
            Ok(row.id)
        })
        .await
    }

    pub async fn make_responsible(&self, employee_id: Uuid, organization_id: Uuid) -> Result<()> {
        self.with_conn(move |conn| {
            diesel::insert_into(organization_responsible::table)
                .values(&NewOrganizationResponsible {
                    id: Uuid::new_v4(),
                    organization_id,
                    user_id: employee_id,
                })
                .execute(conn)
                .context("failed to insert responsibility")?;
            Ok(())
        })
        .await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload).await
    }

    pub async fn get(&self, path: &str) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path).await
    }

    #[allow(dead_code)]
    pub async fn put(&self, path: &str) -> Result<hyper::Response<Body>> {
        self.send(Method::PUT, path).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str) -> Result<hyper::Response<Body>> {
        self.send(Method::DELETE, path).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn send(&self, method: Method, path: &str) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

/// Asserts the status, then decodes the JSON body.
pub async fn expect_json<T: DeserializeOwned>(
    response: hyper::Response<Body>,
    status: StatusCode,
) -> Result<T> {
    let actual = response.status();
    let body = body_to_vec(response.into_body()).await?;
    assert_eq!(
        actual,
        status,
        "unexpected status, body: {}",
        String::from_utf8_lossy(&body)
    );
    Ok(serde_json::from_slice(&body)?)
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        db::run_migrations(&mut conn)?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE bid_reviews, bid_versions, bids, tender_versions, tenders, \
         organization_responsible, organization, employee RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
