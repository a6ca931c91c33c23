use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use courier_core::{descriptor, ErrorDescriptor, Options, TransferList, Value};
use courier_fabric::codec::BincodeCodec;
use courier_fabric::transport::TcpTransportListener;
use courier_fabric::Channel;
use courier_proxy::{create, Dispatcher, Error, OperationRegistry, Proxy, Reply, WorkerProxy};

fn registry() -> OperationRegistry {
    OperationRegistry::builder()
        .register("greet", |args, done| {
            let name = args.first().and_then(Value::as_str).unwrap_or("stranger");
            done.ok(vec![Value::from(format!("Hello, {}!", name))])?;
            Ok(())
        })
        .register("addToFirstIndexInBuffer", |args, done| {
            let how_much = args.get(1).and_then(Value::as_i64).unwrap_or(1);
            let mut data = args
                .first()
                .and_then(Value::as_buffer)
                .ok_or("expected a buffer")?
                .to_vec();
            data[0] = data[0].wrapping_add(how_much as u8);
            done.transfer(TransferList::new([0]), None, vec![Value::from(data)])?;
            Ok(())
        })
        .register("address", |args, done| {
            let address = args
                .first()
                .and_then(Value::as_buffer)
                .map_or(0, |b| b.as_ptr() as i64);
            done.ok(vec![Value::from(address)])?;
            Ok(())
        })
        .register("answer", |_args, done| {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                let _ = done.ok(vec![Value::from(42)]);
            });
            Ok(())
        })
        .register("fail", |_args, _done| Err("deliberate failure".into()))
        .build()
}

fn connected(options: Options) -> Proxy {
    let (caller, callee) = Channel::pair();
    Dispatcher::new(registry(), Options::builder().catch_errors(true).build()).start(callee);
    Proxy::new(caller, options)
}

async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn greet_round_trip_runs_callback_once() {
    let proxy = connected(Options::builder().function_names(["greet"]).build());
    let replies = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&replies);
    proxy
        .stub("greet")
        .unwrap()
        .call_with(vec!["World".into()], move |reply| sink.lock().unwrap().push(reply));

    wait_until(|| !replies.lock().unwrap().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let replies = replies.lock().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(
        replies[0].results(),
        &[Value::Null, Value::from("Hello, World!")]
    );
}

#[tokio::test]
async fn call_awaits_the_reply() {
    let proxy = connected(Options::default());

    let reply = proxy.call("greet", vec!["async".into()]).await.unwrap();
    assert!(!reply.is_error());
    assert_eq!(reply.value(), Some(&Value::from("Hello, async!")));
    assert_eq!(proxy.pending_calls(), 0);
}

#[tokio::test]
async fn unknown_operation_comes_back_as_error() {
    let proxy = connected(Options::default());

    let reply = proxy.call("doesNotExist", vec![]).await.unwrap();
    let error = reply.into_result().unwrap_err();
    assert!(error.is_kind(descriptor::UNKNOWN_OPERATION));

    // The dispatcher keeps serving
    let reply = proxy.call("greet", vec!["still".into()]).await.unwrap();
    assert_eq!(reply.value(), Some(&Value::from("Hello, still!")));
}

#[tokio::test]
async fn contained_failure_comes_back_as_error() {
    let proxy = connected(Options::default());

    let reply = proxy.call("fail", vec![]).await.unwrap();
    assert_eq!(
        reply.error(),
        Some(&ErrorDescriptor::invocation_failure("deliberate failure"))
    );
}

#[tokio::test]
async fn operations_can_answer_later() {
    let proxy = Proxy::pool(
        (0..2)
            .map(|_| {
                let (caller, callee) = Channel::pair();
                Dispatcher::new(registry(), Options::default()).start(callee);
                caller
            })
            .collect(),
        Options::default(),
    )
    .unwrap();

    let replies: Vec<_> = (0..5).map(|_| proxy.call("answer", vec![])).collect();
    assert_eq!(proxy.in_flight(), 2);

    for reply in futures::future::join_all(replies).await {
        assert_eq!(reply.unwrap().value(), Some(&Value::from(42)));
    }
    assert_eq!(proxy.pending_calls(), 0);
}

#[tokio::test]
async fn transfer_moves_buffers_and_copy_duplicates_them() {
    let proxy = connected(Options::default());
    let address = proxy.operation("address");

    let buffer = Bytes::from(vec![1u8, 2, 3]);
    let original = buffer.as_ptr() as i64;

    let copied = address
        .call(vec![Value::Buffer(buffer.clone())])
        .await
        .unwrap();
    assert_ne!(copied.value(), Some(&Value::from(original)));

    let moved = address
        .transfer(TransferList::new([0]), vec![Value::Buffer(buffer)])
        .await
        .unwrap();
    assert_eq!(moved.value(), Some(&Value::from(original)));
}

#[tokio::test]
async fn transferred_result_buffer_is_updated() {
    let proxy = connected(Options::default());

    let buffer = Bytes::from(vec![1u8, 0, 0]);
    let reply = proxy
        .operation("addToFirstIndexInBuffer")
        .transfer(
            TransferList::new([0]),
            vec![Value::Buffer(buffer), Value::from(4)],
        )
        .await
        .unwrap();

    let values = reply.into_result().unwrap();
    assert_eq!(values[0].as_buffer().unwrap().as_ref(), &[5u8, 0, 0]);
}

#[tokio::test]
async fn transfer_outside_arguments_fails_before_sending() {
    let proxy = connected(Options::default());
    let stub = proxy.operation("address");

    let result = stub
        .transfer(TransferList::new([3]), vec![Value::from(1)])
        .await;
    assert!(matches!(
        result,
        Err(Error::Core(courier_core::Error::InvalidTransfer { index: 3, len: 1 }))
    ));

    let result = stub.transfer_with(TransferList::new([1]), vec![], |_| {});
    assert!(matches!(result, Err(Error::Core(_))));
    assert_eq!(proxy.pending_calls(), 0);
}

#[tokio::test]
async fn notify_is_answered_without_a_callback() {
    let proxy = connected(Options::default());

    proxy.operation("greet").notify(vec!["nobody".into()]);
    assert_eq!(proxy.pending_calls(), 1);
    wait_until(|| proxy.pending_calls() == 0).await;
}

#[tokio::test]
async fn stubs_come_from_announced_operations() {
    let (caller, callee) = Channel::pair();
    let options = Options::builder().announce_functions(true).build();
    Dispatcher::new(registry(), options).start(callee);

    let proxy = Proxy::new(caller, Options::default());
    let names = tokio::time::timeout(Duration::from_secs(5), proxy.negotiate())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        names,
        vec!["addToFirstIndexInBuffer", "address", "answer", "fail", "greet"]
    );

    assert_eq!(proxy.stubs().len(), 5);
    assert!(proxy.stub("nope").is_none());
    let reply = proxy
        .stub("greet")
        .unwrap()
        .call(vec!["stub".into()])
        .await
        .unwrap();
    assert_eq!(reply.value(), Some(&Value::from("Hello, stub!")));
}

#[tokio::test]
async fn configured_names_are_known_up_front() {
    let proxy = connected(Options::builder().function_names(["greet", "fail"]).build());

    assert_eq!(proxy.capabilities(), vec!["greet", "fail"]);
    assert_eq!(proxy.negotiate().await.unwrap(), vec!["greet", "fail"]);
    assert!(proxy.stub("answer").is_none());
}

#[tokio::test]
async fn broadcast_with_runs_once_per_worker() {
    let callers: Vec<Channel> = (0..3)
        .map(|_| {
            let (caller, callee) = Channel::pair();
            Dispatcher::new(registry(), Options::default()).start(callee);
            caller
        })
        .collect();
    let proxy = Proxy::pool(callers, Options::default()).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    proxy
        .operation("greet")
        .broadcast_with(vec!["all".into()], move |reply: Reply| {
            assert_eq!(reply.value(), Some(&Value::from("Hello, all!")));
            counter.fetch_add(1, Ordering::SeqCst);
        });

    wait_until(|| count.load(Ordering::SeqCst) == 3).await;
    assert_eq!(proxy.pending_calls(), 0);
}

#[tokio::test]
async fn timed_calls_still_complete() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("courier_proxy=info")
        .with_test_writer()
        .try_init();

    let proxy = connected(Options::builder().time_calls(true).build());
    let reply = proxy.call("greet", vec!["timer".into()]).await.unwrap();
    assert_eq!(reply.value(), Some(&Value::from("Hello, timer!")));
}

#[tokio::test]
async fn options_from_json_drive_the_proxy() {
    let options = Options::from_json(r#"{"functionNames": ["greet"], "timeCalls": true, "extra": 1}"#)
        .unwrap();
    let proxy = connected(options);

    assert!(proxy.options().time_calls());
    let reply = proxy.stub("greet").unwrap().call(vec![]).await.unwrap();
    assert_eq!(reply.value(), Some(&Value::from("Hello, stranger!")));
}

#[tokio::test]
async fn create_picks_the_role_from_the_endpoint() {
    let (caller, callee) = Channel::pair();

    let callee = create((registry(), callee), Options::default()).unwrap();
    assert!(matches!(callee, WorkerProxy::Callee(_)));

    let proxy = create(caller, Options::default())
        .unwrap()
        .into_caller()
        .unwrap();
    assert!(!proxy.is_pool());
    let reply = proxy.call("greet", vec!["create".into()]).await.unwrap();
    assert_eq!(reply.value(), Some(&Value::from("Hello, create!")));

    let pool = create(vec![Channel::pair().0, Channel::pair().0], Options::default())
        .unwrap()
        .into_caller()
        .unwrap();
    assert!(pool.is_pool());
    assert_eq!(pool.channel_count(), 2);

    let empty = create(Vec::<Channel>::new(), Options::default());
    assert!(matches!(empty, Err(Error::EmptyPool)));
}

#[tokio::test]
async fn callee_stops_when_the_caller_goes_away() {
    let (caller, callee) = Channel::pair();
    let handle = create((registry(), callee), Options::default())
        .unwrap()
        .into_callee()
        .unwrap();

    drop(caller);
    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[test]
fn reply_splits_on_the_leading_error_slot() {
    let ok = Reply::new(vec![Value::Null, Value::from(1), Value::from(2)]);
    assert!(!ok.is_error());
    assert_eq!(ok.values(), &[Value::from(1), Value::from(2)]);
    assert_eq!(ok.into_result().unwrap(), vec![Value::from(1), Value::from(2)]);

    let failed = Reply::new(vec![Value::Error(ErrorDescriptor::call_timeout("slow", 10))]);
    assert!(failed.is_error());
    assert!(failed.values().is_empty());
    assert!(failed
        .into_result()
        .unwrap_err()
        .is_kind(descriptor::CALL_TIMEOUT));

    assert_eq!(Reply::default().value(), None);
}

#[tokio::test]
async fn pool_over_tcp_workers() {
    let listener = TcpTransportListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((transport, _peer)) = listener.accept().await {
            let channel = Channel::from_transport(transport, BincodeCodec);
            Dispatcher::new(registry(), Options::default()).start(channel);
        }
    });

    let mut channels = Vec::new();
    for _ in 0..2 {
        channels.push(Channel::tcp(addr, BincodeCodec).await.unwrap());
    }
    let proxy = Proxy::pool(channels, Options::default()).unwrap();

    let names = ["a", "b", "c", "d"];
    let replies: Vec<_> = names
        .iter()
        .map(|name| proxy.call("greet", vec![Value::from(*name)]))
        .collect();

    for (name, reply) in names.iter().zip(futures::future::join_all(replies).await) {
        assert_eq!(
            reply.unwrap().value(),
            Some(&Value::from(format!("Hello, {}!", name)))
        );
    }
    assert_eq!(proxy.pending_calls(), 0);
}
