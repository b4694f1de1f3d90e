//! In-process JSON-RPC node stub.
//!
//! Binds an axum server to an ephemeral localhost port and answers every
//! POST with the body produced by a responder closure.

#![allow(missing_docs)]

use axum::{routing::post, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub struct RpcStub {
    url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    handle: JoinHandle<()>,
}

impl RpcStub {
    pub async fn start<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let responder = Arc::new(responder);

        let app = Router::new().route(
            "/",
            post(move |Json(body): Json<Value>| {
                let recorded = Arc::clone(&recorded);
                let responder = Arc::clone(&responder);
                async move {
                    let reply = (*responder)(&body);
                    recorded.lock().push(body);
                    Json(reply)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub local addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{addr}/"),
            requests,
            handle,
        }
    }

    pub fn url(&self) -> String {
        self.url.clone()
    }

    /// Request bodies received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().clone()
    }

    pub fn result(req: &Value, result: Value) -> Value {
        json!({ "jsonrpc": "2.0", "id": req["id"], "result": result })
    }

    pub fn error(req: &Value, code: i64, message: &str) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": req["id"],
            "error": { "code": code, "message": message }
        })
    }
}

impl Drop for RpcStub {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
