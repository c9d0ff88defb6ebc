//! # Example: ping
//!
//! Two message buses connected by an in-process [`ChannelTransport`] pair.
//! The "worker" side answers `ping` requests; the "client" side sends a request,
//! a fire-and-forget notice, and waits for the correlated reply.
//!
//! ## Flow
//! ```text
//! client.request("ping", {n}) ──► {label:"ping", data, callbackNum:1} ──► worker handler
//! client responder(1) ◄── {label:1, data:{pong}, callbackNum:null} ◄──── auto-reply
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example ping
//! ```

use coopvisor::{ChannelTransport, MessageBus};
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::LocalSet;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let (client_end, worker_end) = ChannelTransport::pair();
    let client = MessageBus::new(client_end.clone());
    let worker = MessageBus::new(worker_end.clone());

    worker.listen("ping", |data, _| Some(json!({ "pong": data })));
    worker.listen("notice", |data, callback| {
        println!("[worker] notice {data} (callback={callback:?})");
        None
    });

    LocalSet::new()
        .run_until(async move {
            tokio::task::spawn_local(async move { worker_end.pump().await });
            tokio::task::spawn_local({
                let client_end = client_end.clone();
                async move { client_end.pump().await }
            });

            client.send("notice", json!("hello"))?;

            let (tx, rx) = oneshot::channel();
            let id = client.request("ping", json!(7), move |reply| {
                let _ = tx.send(reply);
            })?;
            println!("[client] sent ping as request {id}");

            let reply = rx.await?;
            println!("[client] reply {reply}");
            println!("[client] pending requests: {}", client.pending());
            Ok::<_, anyhow::Error>(())
        })
        .await
}
