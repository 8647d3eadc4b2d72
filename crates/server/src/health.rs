//! Readiness probe mounted at `/health`, outside the `/api` prefix.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{SecondsFormat, Utc};
use lynco_db::{migrations, ping, DbPool};
use serde::Serialize;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    Degraded,
}

#[derive(Debug, Serialize)]
pub struct Probe {
    pub status: Readiness,
    pub detail: String,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: Readiness,
    pub database: Probe,
    pub schema: Probe,
    pub pool_size: u32,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(db_pool)
}

pub async fn health(State(pool): State<DbPool>) -> (StatusCode, Json<HealthReport>) {
    let database = match ping(&pool).await {
        Ok(()) => Probe { status: Readiness::Ready, detail: "database reachable".to_string() },
        Err(error) => degraded("system.health.database_degraded", "database unreachable", error),
    };

    let schema = if database.status == Readiness::Degraded {
        Probe { status: Readiness::Degraded, detail: "not checked".to_string() }
    } else {
        match migrations::pending_count(&pool).await {
            Ok(0) => Probe {
                status: Readiness::Ready,
                detail: format!("schema version {}", migrations::latest_version()),
            },
            Ok(pending) => Probe {
                status: Readiness::Degraded,
                detail: format!("{pending} pending migration(s)"),
            },
            Err(error) => degraded("system.health.schema_degraded", "schema state unknown", error),
        }
    };

    let ready = database.status == Readiness::Ready && schema.status == Readiness::Ready;
    let report = HealthReport {
        status: if ready { Readiness::Ready } else { Readiness::Degraded },
        database,
        schema,
        pool_size: pool.size(),
        checked_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };

    let code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(report))
}

fn degraded(event_name: &'static str, detail: &str, error: sqlx::Error) -> Probe {
    warn!(event_name, correlation_id = "health", error = %error, "health probe failed");
    Probe { status: Readiness::Degraded, detail: detail.to_string() }
}
