//! Token-gated routes for the approver (`/approve/{token}`) and the
//! customer (`/q/{token}`). Both POSTs are idempotent.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use lynco_core::domain::quote::QuoteStatus;
use lynco_core::lifecycle::{AcceptanceInput, DecisionInput, PortalView, TransitionReceipt};
use serde::Serialize;

use crate::api::{client_origin, ApiError, ApiJson, AppState, CorrelationId};

#[derive(Debug, Serialize)]
pub struct StatusAck {
    pub ok: bool,
    pub status: QuoteStatus,
}

impl From<TransitionReceipt> for StatusAck {
    fn from(receipt: TransitionReceipt) -> Self {
        Self { ok: true, status: receipt.status }
    }
}

pub async fn approval_view(
    State(state): State<AppState>,
    correlation: CorrelationId,
    Path(token): Path<String>,
) -> Result<Json<PortalView>, ApiError> {
    state
        .lifecycle()
        .fetch_for_approval(&token)
        .await
        .map(Json)
        .map_err(|error| state.reject(error, &correlation))
}

pub async fn decide(
    State(state): State<AppState>,
    correlation: CorrelationId,
    Path(token): Path<String>,
    ApiJson(input): ApiJson<DecisionInput>,
) -> Result<Json<StatusAck>, ApiError> {
    state
        .lifecycle()
        .decide(&token, &input)
        .await
        .map(|receipt| Json(receipt.into()))
        .map_err(|error| state.reject(error, &correlation))
}

pub async fn customer_view(
    State(state): State<AppState>,
    correlation: CorrelationId,
    Path(token): Path<String>,
) -> Result<Json<PortalView>, ApiError> {
    state
        .lifecycle()
        .fetch_for_customer(&token)
        .await
        .map(Json)
        .map_err(|error| state.reject(error, &correlation))
}

pub async fn accept(
    State(state): State<AppState>,
    correlation: CorrelationId,
    Path(token): Path<String>,
    headers: HeaderMap,
    ApiJson(input): ApiJson<AcceptanceInput>,
) -> Result<Json<StatusAck>, ApiError> {
    state
        .lifecycle()
        .accept(&token, &input, client_origin(&headers))
        .await
        .map(|receipt| Json(receipt.into()))
        .map_err(|error| state.reject(error, &correlation))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::api::testing::{api, create_body, send, token_from};

    async fn created(app: &axum::Router) -> (String, String, String) {
        let (_, created) = send(app, "POST", "/quotes", Some(create_body()), &[]).await;
        (
            created["id"].as_str().expect("id").to_string(),
            token_from(&created["approvalUrl"], "/approve/"),
            token_from(&created["customerUrl"], "/q/"),
        )
    }

    fn decision(verdict: &str) -> Value {
        json!({"decision": verdict, "name": "Priya Shah", "email": "priya@lynco.test", "comment": "ok"})
    }

    #[tokio::test]
    async fn portal_views_hide_tokens_and_require_the_right_kind() {
        let app = api();
        let (_, approval, customer) = created(&app).await;

        let (status, view) = send(&app, "GET", &format!("/approve/{approval}"), None, &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["quote"]["total_cents"], 21000);
        assert!(!view.to_string().contains(&approval));
        assert!(!view.to_string().contains(&customer));

        let (status, _) = send(&app, "GET", &format!("/q/{customer}"), None, &[]).await;
        assert_eq!(status, StatusCode::OK);

        let (status, error) = send(&app, "GET", &format!("/q/{approval}"), None, &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["code"], "not_found");
    }

    #[tokio::test]
    async fn decision_is_idempotent() {
        let app = api();
        let (id, approval, _) = created(&app).await;
        let uri = format!("/approve/{approval}");

        let (status, ack) = send(&app, "POST", &uri, Some(decision("rejected")), &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true, "status": "rejected"}));

        let (status, replay) = send(&app, "POST", &uri, Some(decision("approved")), &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replay["status"], "rejected");

        let (_, detail) = send(&app, "GET", &format!("/quotes/{id}"), None, &[]).await;
        assert_eq!(detail["approvals"].as_array().map(Vec::len), Some(1));
        assert_eq!(detail["events"].as_array().map(Vec::len), Some(2));
        assert_eq!(detail["events"][0]["type"], "rejected");
        assert_eq!(detail["events"][0]["actor_name"], "Priya Shah");
    }

    #[tokio::test]
    async fn bad_decision_input_is_rejected() {
        let app = api();
        let (_, approval, _) = created(&app).await;
        let uri = format!("/approve/{approval}");

        let (status, _) = send(&app, "POST", &uri, Some(decision("maybe")), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "POST", &uri, Some(decision(" approved ")), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let long = json!({"decision": "approved", "name": "Priya", "comment": "x".repeat(2001)});
        let (status, _) = send(&app, "POST", &uri, Some(long), &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(&app, "POST", "/approve/unknown-token", Some(decision("approved")), &[]).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn acceptance_records_client_origin_once() {
        let app = api();
        let (id, _, customer) = created(&app).await;
        let uri = format!("/q/{customer}");
        let body = json!({"signerName": "Dana Reyes", "signerCompany": "Acme", "poNumber": "PO-9"});
        let headers = [("x-forwarded-for", "203.0.113.7, 10.0.0.1"), ("user-agent", "Mozilla/5.0")];

        let (status, ack) = send(&app, "POST", &uri, Some(body.clone()), &headers).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true, "status": "customer_approved"}));

        let (status, replay) = send(&app, "POST", &uri, Some(body), &headers).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replay["status"], "customer_approved");

        let (_, detail) = send(&app, "GET", &format!("/quotes/{id}"), None, &[]).await;
        let acceptances = detail["acceptances"].as_array().expect("acceptances");
        assert_eq!(acceptances.len(), 1);
        assert_eq!(acceptances[0]["ip"], "203.0.113.7");
        assert_eq!(acceptances[0]["user_agent"], "Mozilla/5.0");
        assert_eq!(detail["events"][0]["metadata"]["poNumber"], "PO-9");
        assert!(detail["quote"]["customer_approved_at"].is_string());
    }

    #[tokio::test]
    async fn acceptance_requires_signer_name() {
        let app = api();
        let (_, _, customer) = created(&app).await;

        let (status, error) =
            send(&app, "POST", &format!("/q/{customer}"), Some(json!({"signerName": " "})), &[])
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["code"], "validation_error");
    }
}
