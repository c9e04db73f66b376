use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::clients::health::HealthChecker;
use crate::error::NotificationError;
use crate::inbox::{DEFAULT_LIMIT, DEFAULT_PAGE, InboxService};
use crate::models::health::HealthStatus;
use crate::models::notification::{
    BulkReport, ChannelResults, DispatchReport, NotificationPage, NotificationRequest,
    NotificationStats,
};
use crate::models::push::{PushSubscription, SubscriptionKeys};
use crate::models::response::ApiResponse;
use crate::orchestrator::Orchestrator;
use crate::scheduler::Scheduler;
use crate::stores::PushSubscriptionStore;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub inbox: Arc<InboxService>,
    pub scheduler: Arc<Scheduler>,
    pub push_subscriptions: Arc<dyn PushSubscriptionStore>,
    pub push_public_key: Option<String>,
    pub health_checker: HealthChecker,
}

pub async fn run_api_server(
    state: Arc<AppState>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Notification API server started");

    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/notifications", post(send_notification))
        .route("/api/v1/notifications/bulk", post(send_bulk))
        .route(
            "/api/v1/notifications/{notification_id}/schedule",
            delete(cancel_scheduled),
        )
        .route(
            "/api/v1/users/{user_id}/notifications",
            get(list_notifications),
        )
        .route(
            "/api/v1/users/{user_id}/notifications/stats",
            get(notification_stats),
        )
        .route(
            "/api/v1/users/{user_id}/notifications/{notification_id}/read",
            post(mark_read),
        )
        .route(
            "/api/v1/users/{user_id}/notifications/read-all",
            post(mark_all_read),
        )
        .route(
            "/api/v1/push/subscriptions",
            post(subscribe_push).delete(unsubscribe_push),
        )
        .route("/api/v1/push/public-key", get(push_public_key))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct SendNotificationData {
    notification: DispatchReport,
    channels: ChannelResults,
}

async fn send_notification(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NotificationRequest>,
) -> impl IntoResponse {
    match state.orchestrator.send(request).await {
        Ok(report) => {
            let channels = report.channel_results();
            let data = SendNotificationData {
                notification: report,
                channels,
            };
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    data,
                    "Notification processed".to_string(),
                )),
            )
        }
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct BulkSendRequest {
    notifications: Vec<NotificationRequest>,
}

async fn send_bulk(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkSendRequest>,
) -> (StatusCode, Json<ApiResponse<BulkReport>>) {
    let report = state.orchestrator.send_bulk(body.notifications).await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(report, "Bulk send complete".to_string())),
    )
}

async fn cancel_scheduled(
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<bool>>) {
    let cancelled = state.scheduler.cancel(&notification_id).await;
    (
        StatusCode::OK,
        Json(ApiResponse::success(
            cancelled,
            "Schedule cancellation processed".to_string(),
        )),
    )
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    page: Option<u64>,
    limit: Option<u64>,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> (StatusCode, Json<ApiResponse<NotificationPage>>) {
    let page = query.page.unwrap_or(DEFAULT_PAGE);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 100);

    match state.inbox.list(&user_id, page, limit).await {
        Ok(result) => (
            StatusCode::OK,
            Json(ApiResponse::success(result, "Notifications".to_string())),
        ),
        Err(e) => error_response(e),
    }
}

async fn notification_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<NotificationStats>>) {
    match state.inbox.stats(&user_id).await {
        Ok(stats) => (
            StatusCode::OK,
            Json(ApiResponse::success(stats, "Notification stats".to_string())),
        ),
        Err(e) => error_response(e),
    }
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path((user_id, notification_id)): Path<(String, String)>,
) -> (StatusCode, Json<ApiResponse<bool>>) {
    match state.inbox.mark_read(&user_id, &notification_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(ApiResponse::success(true, "Notification marked read".to_string())),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(
                "not_found".to_string(),
                "Notification not found".to_string(),
            )),
        ),
        Err(e) => error_response(e),
    }
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> (StatusCode, Json<ApiResponse<u64>>) {
    match state.inbox.mark_all_read(&user_id).await {
        Ok(updated) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                updated,
                "Notifications marked read".to_string(),
            )),
        ),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct SubscriptionPayload {
    endpoint: String,
    keys: SubscriptionKeys,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest {
    user_id: String,
    subscription: SubscriptionPayload,
    #[serde(default)]
    user_agent: Option<String>,
}

async fn subscribe_push(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SubscribeRequest>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let subscription = PushSubscription::new(
        body.user_id,
        body.subscription.endpoint,
        body.subscription.keys,
        body.user_agent,
    );

    match state.push_subscriptions.subscribe(subscription).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(ApiResponse::success((), "Subscribed".to_string())),
        ),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnsubscribeRequest {
    user_id: String,
    endpoint: String,
}

async fn unsubscribe_push(
    State(state): State<Arc<AppState>>,
    Json(body): Json<UnsubscribeRequest>,
) -> (StatusCode, Json<ApiResponse<bool>>) {
    match state
        .push_subscriptions
        .unsubscribe(&body.user_id, &body.endpoint)
        .await
    {
        Ok(removed) => (
            StatusCode::OK,
            Json(ApiResponse::success(removed, "Unsubscribed".to_string())),
        ),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyData {
    public_key: String,
}

async fn push_public_key(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<PublicKeyData>>) {
    match &state.push_public_key {
        Some(public_key) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                PublicKeyData {
                    public_key: public_key.clone(),
                },
                "VAPID public key".to_string(),
            )),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error(
                "push_unconfigured".to_string(),
                "Push notifications are not configured".to_string(),
            )),
        ),
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

fn error_response<T>(error: NotificationError) -> (StatusCode, Json<ApiResponse<T>>) {
    let status = match &error {
        NotificationError::Validation(_) => StatusCode::BAD_REQUEST,
        NotificationError::TemplateNotFound(_) | NotificationError::MissingVariables { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = if status == StatusCode::BAD_REQUEST {
        "Invalid request"
    } else if status == StatusCode::UNPROCESSABLE_ENTITY {
        "Content cannot be rendered"
    } else {
        "Internal error"
    };

    (
        status,
        Json(ApiResponse::error(error.to_string(), message.to_string())),
    )
}
