//! alertmanager webhook endpoint, `POST /{profile}/send`
//!
//! Every request runs through resolve profile, decode, render, mention and
//! deliver. Failures end the request with a status code for alertmanager,
//! details only go to the log.

use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Extension, Path},
    http::StatusCode,
    routing::post,
    Router,
};
use prometheus::Registry;
use serde::Deserialize;

use crate::{
    alert::WebhookMessage,
    delivery::DeliveryClient,
    error::Error,
    metrics::Metrics,
    notification::Notification,
    profiles::{Profile, ProfileMap},
    template::AlertRenderer,
};

#[derive(Debug, Deserialize, Clone)]
pub struct ReceiverSettings {
    pub bind_address: IpAddr,
    pub port: u16,
}

impl ReceiverSettings {
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// shared between all requests, nothing in here is mutated after startup
pub struct State {
    profiles: ProfileMap,
    renderer: AlertRenderer,
    client: DeliveryClient,
    metrics: Metrics,
}

impl State {
    pub fn new(
        profiles: ProfileMap,
        renderer: AlertRenderer,
        client: DeliveryClient,
        registry: &Registry,
    ) -> Result<Self> {
        let metrics = Metrics::new(registry).context("failed to register metrics")?;

        Ok(Self {
            profiles,
            renderer,
            client,
            metrics,
        })
    }

    /// decode, build, mention, deliver
    async fn process(&self, name: &str, profile: &Profile, body: &[u8]) -> Result<(), Error> {
        let msg: WebhookMessage = serde_json::from_slice(body).map_err(Error::Decode)?;

        let mut notification = Notification::build(&self.renderer, &msg)?;
        notification.inject_mentions(&profile.mention);

        let response = {
            let _timer = self.metrics.delivery_timer(name);
            self.client.deliver(&profile.url, &notification).await?
        };

        if !response.is_success() {
            return Err(Error::Application {
                code: response.error_code,
                message: response.error_message,
            });
        }

        Ok(())
    }
}

fn log_failure(profile: &str, err: &Error) {
    match err {
        Error::Application { code, message } => tracing::error!(
            profile,
            resp_code = code,
            resp_msg = message.as_str(),
            "failed to send notification to dingtalk"
        ),
        Error::UnexpectedStatus(status) => tracing::error!(
            profile,
            status,
            "failed to send notification"
        ),
        Error::Decode(_) => tracing::error!(
            profile,
            "cannot decode prometheus webhook JSON request: {:?}",
            err
        ),
        Error::Template { .. } => tracing::error!(
            profile,
            "failed to build notification: {:?}",
            err
        ),
        Error::Encoding(_) | Error::Transport(_) | Error::ResponseDecode(_) => tracing::error!(
            profile,
            "failed to send notification: {:?}",
            err
        ),
    }
}

async fn send_notification(
    Extension(state): Extension<Arc<State>>,
    Path(name): Path<String>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let profile = match state.profiles.resolve(&name) {
        Some(profile) => profile,
        None => {
            tracing::debug!(profile = name.as_str(), "unknown or incomplete profile");
            state
                .metrics
                .record_request("unknown_profile", StatusCode::NOT_FOUND.as_u16());
            return (StatusCode::NOT_FOUND, "Not Found");
        }
    };

    // delivery is detached from the connection, it finishes even if alertmanager hangs up
    let task = tokio::spawn({
        let state = Arc::clone(&state);
        let name = name.clone();
        let profile = profile.clone();
        async move { state.process(&name, &profile, &body).await }
    });

    let result = match task.await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(profile = name.as_str(), "notification task failed: {:?}", err);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    let (status, body) = match result {
        Ok(()) => {
            tracing::debug!(profile = name.as_str(), "notification delivered");
            (StatusCode::OK, "OK")
        }
        Err(err) => {
            log_failure(&name, &err);
            (err.status_code(), err.public_message())
        }
    };

    state.metrics.record_request(&name, status.as_u16());

    (status, body)
}

pub fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/:profile/send", post(send_notification))
        .layer(Extension(state))
}

pub async fn run_webhook_receiver(settings: ReceiverSettings, state: State) -> Result<()> {
    let addr = settings.to_socket_addr();

    tracing::info!("listening for alertmanager webhooks on {}", addr);

    axum::Server::bind(&addr)
        .serve(router(Arc::new(state)).into_make_service())
        .await
        .context("alertmanager webhook endpoint crashed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use axum::{body::Body, http::Request};
    use serde_json::json;
    use tower::ServiceExt;
    use url::Url;

    use super::*;
    use crate::{
        alert::tests::FIXTURE,
        delivery::tests::{closed_robot, stub},
        profiles::ProfileSettings,
    };

    const MENTION: &str = "18600000000,18700000000";

    fn state(url: &Url) -> Arc<State> {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            String::from("ops"),
            ProfileSettings {
                url: url.to_string(),
                mention: MENTION.into(),
            },
        );
        profiles.insert(
            String::from("silent"),
            ProfileSettings {
                url: url.to_string(),
                mention: String::new(),
            },
        );

        let state = State::new(
            ProfileMap::new(&profiles).unwrap(),
            AlertRenderer::from_sources("{{ status }}", "{{ alerts | length }} alerts").unwrap(),
            DeliveryClient::new(None).unwrap(),
            &Registry::new(),
        )
        .unwrap();

        Arc::new(state)
    }

    async fn send(state: Arc<State>, path: &str, body: &str) -> (StatusCode, String) {
        let response = router(state)
            .oneshot(
                Request::post(path)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_owned()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();

        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn delivers_notification_with_mentions() {
        let (url, received) = stub(StatusCode::OK, r#"{"errcode":0,"errmsg":"ok"}"#);
        let state = state(&url);

        let (status, body) = send(Arc::clone(&state), "/ops/send", FIXTURE).await;

        assert_eq!((status, body.as_str()), (StatusCode::OK, "OK"));
        assert_eq!(
            received.bodies.lock().unwrap().as_slice(),
            [json!({
                "msgtype": "markdown",
                "markdown": {
                    "title": "firing",
                    "text": "3 alerts@18600000000@18700000000",
                },
                "at": { "atMobiles": ["18600000000", "18700000000"], "isAtAll": false },
            })]
        );
        assert_eq!(state.metrics.requests("ops", 200), 1);
    }

    #[tokio::test]
    async fn unknown_profile_is_not_found() {
        let (url, received) = stub(StatusCode::OK, r#"{"errcode":0,"errmsg":"ok"}"#);

        let (status, _) = send(state(&url), "/does-not-exist/send", "not even json").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(received.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn profile_without_mentions_is_not_found() {
        let (url, received) = stub(StatusCode::OK, r#"{"errcode":0,"errmsg":"ok"}"#);

        let (status, _) = send(state(&url), "/silent/send", FIXTURE).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(received.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_before_delivery() {
        let (url, received) = stub(StatusCode::OK, r#"{"errcode":0,"errmsg":"ok"}"#);

        let (status, body) = send(state(&url), "/ops/send", r#"{"alerts": ["#).await;

        assert_eq!((status, body.as_str()), (StatusCode::BAD_REQUEST, "Bad Request"));
        assert!(received.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn schema_mismatch_is_a_bad_request() {
        let (url, received) = stub(StatusCode::OK, r#"{"errcode":0,"errmsg":"ok"}"#);

        let (status, _) = send(state(&url), "/ops/send", r#"{"version":"4"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(received.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn template_errors_are_bad_requests() {
        let (url, received) = stub(StatusCode::OK, r#"{"errcode":0,"errmsg":"ok"}"#);
        let mut profiles = BTreeMap::new();
        profiles.insert(
            String::from("ops"),
            ProfileSettings {
                url: url.to_string(),
                mention: MENTION.into(),
            },
        );
        let state = State::new(
            ProfileMap::new(&profiles).unwrap(),
            AlertRenderer::from_sources("{{ nope }}", "ok").unwrap(),
            DeliveryClient::new(None).unwrap(),
            &Registry::new(),
        )
        .unwrap();

        let (status, _) = send(Arc::new(state), "/ops/send", FIXTURE).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(received.bodies.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dingtalk_errcode_is_unprocessable() {
        let (url, _) = stub(StatusCode::OK, r#"{"errcode":1,"errmsg":"token invalid"}"#);
        let state = state(&url);

        let (status, body) = send(Arc::clone(&state), "/ops/send", FIXTURE).await;

        assert_eq!(
            (status, body.as_str()),
            (StatusCode::UNPROCESSABLE_ENTITY, "Unable to talk to DingTalk")
        );
        assert_eq!(state.metrics.requests("ops", 422), 1);
    }

    #[tokio::test]
    async fn dingtalk_server_error_is_a_bad_request() {
        let (url, _) = stub(StatusCode::INTERNAL_SERVER_ERROR, "oops");

        let (status, body) = send(state(&url), "/ops/send", FIXTURE).await;

        assert_eq!((status, body.as_str()), (StatusCode::BAD_REQUEST, "Bad Request"));
    }

    #[tokio::test]
    async fn unreachable_dingtalk_is_a_bad_request() {
        let (status, _) = send(state(&closed_robot()), "/ops/send", FIXTURE).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn only_post_is_routed() {
        let (url, _) = stub(StatusCode::OK, r#"{"errcode":0,"errmsg":"ok"}"#);

        let response = router(state(&url))
            .oneshot(Request::get("/ops/send").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
