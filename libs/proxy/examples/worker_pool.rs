//! Pool of in-process workers serving a few operations
//!
//! Run with `RUST_LOG=debug` to watch calls being queued and dispatched.

use std::time::Duration;

use bytes::Bytes;
use courier_core::{Options, TransferList, Value};
use courier_fabric::Channel;
use courier_proxy::{Dispatcher, OperationRegistry, Proxy};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn operations() -> OperationRegistry {
    OperationRegistry::builder()
        .register("greet", |args, done| {
            let name = args.first().and_then(Value::as_str).unwrap_or("stranger");
            done.ok(vec![format!("Hello, {}!", name).into()])?;
            Ok(())
        })
        .register("addToFirstIndexInBuffer", |args, done| {
            let how_much = args.get(1).and_then(Value::as_i64).unwrap_or(1);
            let mut data = args
                .first()
                .and_then(Value::as_buffer)
                .ok_or("expected a buffer")?
                .to_vec();
            if let Some(first) = data.first_mut() {
                *first = first.wrapping_add(how_much as u8);
            }
            done.transfer(TransferList::new([0]), None, vec![data.into()])?;
            Ok(())
        })
        .register("answer", |_args, done| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                let _ = done.ok(vec![42.into()]);
            });
            Ok(())
        })
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let worker_options = Options::builder()
        .catch_errors(true)
        .announce_functions(true)
        .build();

    let mut callers = Vec::new();
    for _ in 0..3 {
        let (caller, callee) = Channel::pair();
        Dispatcher::new(operations(), worker_options.clone()).start(callee);
        callers.push(caller);
    }

    let proxy = Proxy::pool(callers, Options::builder().time_calls(true).build())?;
    let names = proxy.negotiate().await?;
    info!(?names, "workers ready");

    let greet = proxy.stub("greet").ok_or("greet not announced")?;
    let reply = greet.call(vec!["World".into()]).await?;
    info!(reply = ?reply.value(), "greeted");

    let answers: Vec<_> = (0..6).map(|_| proxy.call("answer", vec![])).collect();
    info!(
        in_flight = proxy.in_flight(),
        queued = proxy.queued_calls(),
        "answers requested"
    );
    for reply in futures::future::join_all(answers).await {
        info!(reply = ?reply?.value(), "answered");
    }

    let buffer = Bytes::from(vec![1u8, 2, 3]);
    let reply = proxy
        .operation("addToFirstIndexInBuffer")
        .transfer(TransferList::new([0]), vec![buffer.into(), 10.into()])
        .await?;
    info!(reply = ?reply.value(), "buffer updated");

    let greetings = greet.broadcast(vec!["everyone".into()]).await;
    info!(count = greetings.len(), "broadcast answered");

    Ok(())
}
