//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use plugin_gateway::config::{AclRule, GatewayConfig, UserConfig};
use plugin_gateway::exchange::{ContentKind, Exchange, Payload};
use plugin_gateway::lifecycle::{Gateway, Shutdown};
use plugin_gateway::plugins::{Interceptor, Plugin, Service};
use plugin_gateway::{Flow, GatewayError};

/// Shared log of what ran, in order.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Interceptor that writes its label to a journal, optionally halting.
pub struct Recorder {
    pub label: String,
    pub journal: Journal,
    pub halt: bool,
}

impl Recorder {
    pub fn new(label: impl Into<String>, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            journal: journal.clone(),
            halt: false,
        })
    }

    pub fn halting(label: impl Into<String>, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            journal: journal.clone(),
            halt: true,
        })
    }
}

#[async_trait]
impl Interceptor for Recorder {
    async fn handle(&self, exchange: &mut Exchange) -> Result<Flow, GatewayError> {
        let seen = match exchange.request.payload() {
            Some(Payload::Json(value)) => format!("{}:{}", self.label, value),
            _ => self.label.clone(),
        };
        self.journal.lock().unwrap().push(seen);
        if self.halt {
            exchange.response.set_status(axum::http::StatusCode::IM_A_TEAPOT);
            exchange.response.set_text("halted");
            return Ok(Flow::Halt);
        }
        Ok(Flow::Continue)
    }
}

impl Plugin for Recorder {
    fn as_interceptor(self: Arc<Self>) -> Option<Arc<dyn Interceptor>> {
        Some(self)
    }
}

/// Service answering with a fixed text and journaling each call.
pub struct Text {
    pub text: String,
    pub journal: Journal,
    pub content: ContentKind,
}

impl Text {
    pub fn new(text: impl Into<String>, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            text: text.into(),
            journal: journal.clone(),
            content: ContentKind::Raw,
        })
    }

    pub fn json(text: impl Into<String>, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            text: text.into(),
            journal: journal.clone(),
            content: ContentKind::Json,
        })
    }
}

#[async_trait]
impl Service for Text {
    async fn handle(&self, exchange: &mut Exchange) -> Result<(), GatewayError> {
        self.journal.lock().unwrap().push(format!("service:{}", self.text));
        exchange.response.set_text(self.text.clone());
        Ok(())
    }

    fn request_content(&self) -> ContentKind {
        self.content
    }
}

impl Plugin for Text {
    fn as_service(self: Arc<Self>) -> Option<Arc<dyn Service>> {
        Some(self)
    }
}

/// Config with two users and an ACL: `alice` (admin) may do anything,
/// `bob` (user) may only read `/roles` and `/tokens`.
pub fn secured_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.security.users = vec![
        UserConfig {
            userid: "alice".into(),
            password: "secret".into(),
            roles: vec!["admin".into()],
        },
        UserConfig {
            userid: "bob".into(),
            password: "hunter2".into(),
            roles: vec!["user".into()],
        },
    ];
    config.security.acl = vec![
        AclRule {
            role: "admin".into(),
            path_prefix: "/".into(),
            methods: vec![],
        },
        AclRule {
            role: "user".into(),
            path_prefix: "/roles".into(),
            methods: vec!["GET".into()],
        },
        AclRule {
            role: "user".into(),
            path_prefix: "/tokens".into(),
            methods: vec![],
        },
    ];
    config
}

pub fn basic(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn get_as(uri: &str, authorization: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", authorization)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

/// Run a gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> (SocketAddr, Shutdown, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let gateway = Gateway::new(config).unwrap();
    let shutdown = gateway.shutdown().clone();
    let task = tokio::spawn(async move {
        gateway.run(listener).await.unwrap();
    });
    (addr, shutdown, task)
}
