use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use shared::types::{MenuSnapshot, ServiceRef};
use crate::actions::ActivationError;
use crate::notify::NotificationToggle;
use crate::presentation::render::PublishedMenu;
use crate::reconciler::ReconcilerHandle;

#[derive(Clone)]
pub struct AppState {
    pub reconciler: ReconcilerHandle,
    pub menu_rx: watch::Receiver<PublishedMenu>,
    pub notifications: NotificationToggle,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationSettings {
    pub enabled: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/menu", get(get_menu))
        .route("/v1/menu/hash", get(get_hash))
        .route("/v1/activate", post(activate))
        .route("/v1/notifications", get(get_notifications).put(set_notifications))
        .with_state(state)
}

async fn get_menu(State(state): State<AppState>) -> Json<MenuSnapshot> {
    Json(state.menu_rx.borrow().menu.clone())
}

async fn get_hash(State(state): State<AppState>) -> String {
    state.menu_rx.borrow().hash.clone()
}

async fn activate(State(state): State<AppState>, Json(target): Json<ServiceRef>) -> StatusCode {
    match state.reconciler.activate(target).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(ActivationError::NotFound(_)) => StatusCode::NOT_FOUND,
        Err(ActivationError::NoAction(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        Err(ActivationError::Unavailable) => {
            tracing::error!("Activation requested while the event loop is down");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn get_notifications(State(state): State<AppState>) -> Json<NotificationSettings> {
    Json(NotificationSettings {
        enabled: state.notifications.is_enabled(),
    })
}

async fn set_notifications(
    State(state): State<AppState>,
    Json(settings): Json<NotificationSettings>,
) -> StatusCode {
    state.notifications.set(settings.enabled);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use crate::presentation::render::{Renderer, SnapshotPublisher};
    use crate::reconciler::UiCommand;
    use shared::types::ServiceTypeMenu;

    fn target(name: &str) -> ServiceRef {
        ServiceRef {
            interface: "*".to_string(),
            domain: "local".to_string(),
            name: name.to_string(),
            service_type: "_http._tcp".to_string(),
        }
    }

    /// App backed by a fake event loop that knows only "printer" and has an
    /// action for nothing else
    fn app() -> (Router, SnapshotPublisher, NotificationToggle) {
        let (reconciler, mut commands) = ReconcilerHandle::new();
        tokio::spawn(async move {
            while let Some(UiCommand::Activate(target, reply)) = commands.recv().await {
                let result = match target.name.as_str() {
                    "printer" => Ok(()),
                    "bare" => Err(ActivationError::NoAction(target.service_type.clone())),
                    _ => Err(ActivationError::NotFound(target)),
                };
                let _ = reply.send(result);
            }
        });

        let (publisher, menu_rx) = SnapshotPublisher::new();
        let notifications = NotificationToggle::new(false);
        let state = AppState {
            reconciler,
            menu_rx,
            notifications: notifications.clone(),
        };
        (router(state), publisher, notifications)
    }

    fn post_json(uri: &str, method: &str, body: String) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_menu_reflects_latest_render() {
        let (app, mut publisher, _) = app();
        let menu = MenuSnapshot {
            hosts: Vec::new(),
            service_types: vec![ServiceTypeMenu {
                service_type: "_http._tcp".to_string(),
                title: "http (tcp)".to_string(),
                entries: Vec::new(),
            }],
        };
        publisher.render(&menu);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/v1/menu").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let served: MenuSnapshot = serde_json::from_slice(&body).unwrap();
        assert_eq!(served, menu);

        let response = app
            .oneshot(Request::builder().uri("/v1/menu/hash").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.len(), 64);
    }

    #[tokio::test]
    async fn test_activate_status_codes() {
        let (app, _publisher, _) = app();
        let cases = [
            ("printer", StatusCode::ACCEPTED),
            ("bare", StatusCode::UNPROCESSABLE_ENTITY),
            ("ghost", StatusCode::NOT_FOUND),
        ];

        for (name, expected) in cases {
            let body = serde_json::to_string(&target(name)).unwrap();
            let response = app
                .clone()
                .oneshot(post_json("/v1/activate", "POST", body))
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "activating {}", name);
        }
    }

    #[tokio::test]
    async fn test_toggle_notifications() {
        let (app, _publisher, toggle) = app();

        let response = app
            .clone()
            .oneshot(post_json("/v1/notifications", "PUT", r#"{"enabled":true}"#.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(toggle.is_enabled());

        let response = app
            .oneshot(Request::builder().uri("/v1/notifications").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let settings: NotificationSettings = serde_json::from_slice(&body).unwrap();
        assert!(settings.enabled);
    }
}
