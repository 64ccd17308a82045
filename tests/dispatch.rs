//! End-to-end dispatch through the Axum router.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use futures_util::future::join_all;
use tokio::sync::Notify;
use tower::ServiceExt;

use plugin_gateway::config::GatewayConfig;
use plugin_gateway::exchange::Exchange;
use plugin_gateway::http::build_router;
use plugin_gateway::lifecycle::Gateway;
use plugin_gateway::plugins::{InterceptPoint, Plugin, PluginDescriptor, PluginRegistry, Service};
use plugin_gateway::routing::MatchPolicy;
use plugin_gateway::GatewayError;

mod common;
use common::*;

fn gateway(config: GatewayConfig) -> (Router, Arc<PluginRegistry>) {
    let gateway = Gateway::new(config).unwrap();
    let registry = gateway.registry().clone();
    (build_router(registry.clone(), Duration::from_secs(5)), registry)
}

fn open(name: &str) -> PluginDescriptor {
    PluginDescriptor::new(name).secured(false)
}

#[tokio::test]
async fn test_ping_is_open() {
    let (router, _) = gateway(GatewayConfig::default());
    let response = router.oneshot(get("/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "pong");
}

#[tokio::test]
async fn test_secured_route_challenges() {
    let (router, _) = gateway(secured_config());

    let response = router.clone().oneshot(get("/roles")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let challenges: Vec<_> = response
        .headers()
        .get_all("www-authenticate")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(challenges.contains(&"Basic realm=\"gateway\"".to_string()));

    let response = router
        .clone()
        .oneshot(get_as("/roles", &basic("alice", "wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = router
        .oneshot(get_as("/roles", "Basic !!not-base64!!"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_acl_grants_and_forbids() {
    let (router, _) = gateway(secured_config());

    let response = router
        .clone()
        .oneshot(get_as("/roles", &basic("bob", "hunter2")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["principal"], "bob");
    assert_eq!(body["roles"][0], "user");

    let post = Request::post("/roles")
        .header("authorization", basic("bob", "hunter2"))
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(post).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let post = Request::post("/roles")
        .header("authorization", basic("alice", "secret"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(post).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_token_flow() {
    let (router, _) = gateway(secured_config());

    let response = router
        .clone()
        .oneshot(get_as("/tokens", &basic("bob", "hunter2")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = response
        .headers()
        .get("auth-token")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let bearer = format!("Bearer {token}");
    let response = router.clone().oneshot(get_as("/roles", &bearer)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("auth-token").unwrap(), token.as_str());
    assert_eq!(body_json(response).await["principal"], "bob");

    let delete = Request::delete("/tokens")
        .header("authorization", &bearer)
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(delete).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router.oneshot(get_as("/roles", &bearer)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_interceptors_run_in_priority_order() {
    let (router, registry) = gateway(GatewayConfig::default());
    let journal = journal();

    registry
        .register_plugin(open("svc"), Text::new("ok", &journal))
        .unwrap();
    for priority in [30, 10, 20] {
        registry
            .register_plugin(
                PluginDescriptor::new(format!("p{priority}"))
                    .intercept_at(InterceptPoint::RequestAfterAuth)
                    .with_priority(priority),
                Recorder::new(format!("p{priority}"), &journal),
            )
            .unwrap();
    }

    let response = router.oneshot(get("/svc")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(entries(&journal), vec!["p10", "p20", "p30", "service:ok"]);
}

#[tokio::test]
async fn test_opt_out_skips_interceptors() {
    let (router, registry) = gateway(GatewayConfig::default());
    let journal = journal();

    registry
        .register_plugin(
            open("quiet").dont_intercept(InterceptPoint::Response),
            Text::new("quiet", &journal),
        )
        .unwrap();
    registry
        .register_plugin(open("loud"), Text::new("loud", &journal))
        .unwrap();
    registry
        .register_plugin(
            PluginDescriptor::new("on-response").intercept_at(InterceptPoint::Response),
            Recorder::new("response", &journal),
        )
        .unwrap();

    router.clone().oneshot(get("/quiet")).await.unwrap();
    assert_eq!(entries(&journal), vec!["service:quiet"]);

    router.oneshot(get("/loud")).await.unwrap();
    assert_eq!(
        entries(&journal),
        vec!["service:quiet", "service:loud", "response"]
    );
}

#[tokio::test]
async fn test_content_interceptor_sees_materialized_body() {
    let (router, registry) = gateway(GatewayConfig::default());
    let journal = journal();

    registry
        .register_plugin(open("items"), Text::json("stored", &journal))
        .unwrap();
    registry
        .register_plugin(
            PluginDescriptor::new("inspect")
                .intercept_at(InterceptPoint::RequestBeforeAuth)
                .requires_content(true),
            Recorder::new("inspect", &journal),
        )
        .unwrap();

    let request = Request::post("/items")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"a":1}"#))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(entries(&journal), vec![r#"inspect:{"a":1}"#, "service:stored"]);

    let request = Request::post("/items")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(entries(&journal).len(), 2);
}

fn post_json(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

#[tokio::test]
async fn test_undecodable_body_never_reaches_service() {
    let mut config = GatewayConfig::default();
    config.limits.max_body_size = 32;
    let (router, registry) = gateway(config);
    let journal = journal();

    registry
        .register_plugin(open("items"), Text::json("stored", &journal))
        .unwrap();
    registry
        .register_plugin(
            PluginDescriptor::new("after").intercept_at(InterceptPoint::RequestAfterAuth),
            Recorder::new("after", &journal),
        )
        .unwrap();
    registry
        .register_plugin(
            PluginDescriptor::new("outgoing").intercept_at(InterceptPoint::Response),
            Recorder::new("outgoing", &journal),
        )
        .unwrap();

    let response = router
        .clone()
        .oneshot(post_json("/items", "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["status"], 400);

    let oversized = format!(r#"{{"pad":"{}"}}"#, "x".repeat(64));
    let response = router.clone().oneshot(post_json("/items", oversized)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Only the stage before decoding ran; no service, no response interceptor.
    assert_eq!(entries(&journal), vec!["after", "after"]);

    let response = router.oneshot(post_json("/items", r#"{"a":1}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        entries(&journal),
        vec!["after", "after", "after", "service:stored", r#"outgoing:{"a":1}"#]
    );
}

#[tokio::test]
async fn test_halting_interceptor_short_circuits() {
    let (router, registry) = gateway(GatewayConfig::default());
    let journal = journal();

    registry
        .register_plugin(open("guarded"), Text::new("unreachable", &journal))
        .unwrap();
    registry
        .register_plugin(
            PluginDescriptor::new("gate").intercept_at(InterceptPoint::RequestBeforeAuth),
            Recorder::halting("gate", &journal),
        )
        .unwrap();
    registry
        .register_plugin(
            PluginDescriptor::new("after").intercept_at(InterceptPoint::Response),
            Recorder::new("after", &journal),
        )
        .unwrap();

    let response = router.oneshot(get("/guarded")).await.unwrap();
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert_eq!(body_text(response).await, "halted");
    assert_eq!(entries(&journal), vec!["gate"]);
}

#[tokio::test]
async fn test_exact_binding_beats_prefix() {
    let (router, registry) = gateway(GatewayConfig::default());
    let journal = journal();

    registry
        .register_plugin(open("tree"), Text::new("tree", &journal))
        .unwrap();
    registry
        .register_plugin(
            open("leaf")
                .with_default_uri("/tree/leaf")
                .with_match_policy(MatchPolicy::Exact),
            Text::new("leaf", &journal),
        )
        .unwrap();

    let leaf = router.clone().oneshot(get("/tree/leaf")).await.unwrap();
    assert_eq!(body_text(leaf).await, "leaf");
    let below = router.clone().oneshot(get("/tree/leaf/more")).await.unwrap();
    assert_eq!(body_text(below).await, "tree");
    let other = router.oneshot(get("/treehouse")).await.unwrap();
    assert_eq!(other.status(), StatusCode::NOT_FOUND);
}

struct Gated {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl Service for Gated {
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
        self.entered.notify_one();
        self.release.notified().await;
        exchange.response.set_text("old");
        Ok(())
    }
}

impl Plugin for Gated {
    fn as_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        Some(self)
    }
}

#[tokio::test]
async fn test_in_flight_request_keeps_its_pipeline() {
    let (router, registry) = gateway(GatewayConfig::default());
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    registry
        .register_plugin(
            open("gated").with_default_uri("/slot"),
            Arc::new(Gated {
                entered: entered.clone(),
                release: release.clone(),
            }),
        )
        .unwrap();

    let in_flight = tokio::spawn(router.clone().oneshot(get("/slot")));
    entered.notified().await;

    registry
        .register_plugin(
            open("fresh").with_default_uri("/slot"),
            Text::new("new", &journal()),
        )
        .unwrap();
    release.notify_one();

    let old = in_flight.await.unwrap().unwrap();
    assert_eq!(body_text(old).await, "old");
    let new = router.oneshot(get("/slot")).await.unwrap();
    assert_eq!(body_text(new).await, "new");
}

#[tokio::test]
async fn test_concurrent_dispatch_during_rebinds() {
    let (router, registry) = gateway(GatewayConfig::default());
    let journal = journal();
    registry
        .register_plugin(open("stable"), Text::new("stable", &journal))
        .unwrap();

    let churn = {
        let registry = registry.clone();
        let journal = journal.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                let service: Arc<dyn Service> = Text::new("churn", &journal);
                let record = plugin_gateway::plugins::PluginRecord::named("churn", service);
                registry
                    .register_service(Arc::new(record), "/churn", MatchPolicy::Prefix, false)
                    .unwrap();
                tokio::task::yield_now().await;
                registry.unregister_service("/churn", MatchPolicy::Prefix);
            }
        })
    };

    let requests = (0..100).map(|_| router.clone().oneshot(get("/stable")));
    let responses = join_all(requests).await;
    churn.await.unwrap();

    for response in responses {
        let response = response.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "stable");
    }
    assert!(registry.lookup("/churn").is_none());
}
