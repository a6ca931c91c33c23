use bytes::Bytes;
use courier_core::{
    Announcement, CallId, CallRequest, CallResponse, Message, TransferList, Value,
};
use courier_fabric::{
    codec::BincodeCodec,
    error::Error,
    transport::{TcpTransportListener, UnixTransportListener},
    Channel,
};

fn request(arguments: Vec<Value>) -> CallRequest {
    CallRequest {
        call_id: CallId::FIRST,
        call: "addToFirstIndexInBuffer".to_string(),
        arguments,
    }
}

fn buffer_ptr(message: &Message, position: usize) -> *const u8 {
    match message {
        Message::Request(r) => r.arguments[position].as_buffer().unwrap().as_ptr(),
        Message::Response(r) => r.arguments[position].as_buffer().unwrap().as_ptr(),
        Message::Announcement(_) => panic!("announcements carry no buffers"),
    }
}

#[tokio::test]
async fn pair_delivers_in_both_directions() {
    let (left, mut right) = Channel::pair();

    left.post(request(vec![Value::from(1)]), &TransferList::none())
        .unwrap();
    let received = right.receive().await.unwrap();
    assert_eq!(received, Message::Request(request(vec![Value::from(1)])));

    let response = CallResponse {
        call_response: CallId::FIRST,
        arguments: vec![Value::Null, Value::from("done")],
    };
    right.post(response.clone(), &TransferList::none()).unwrap();

    let (_, mut left_inbox) = left.split();
    assert_eq!(left_inbox.receive().await, Some(Message::Response(response)));
}

#[tokio::test]
async fn pair_copies_buffers_that_are_not_transferred() {
    let (left, mut right) = Channel::pair();
    let buffer = Bytes::from(vec![7u8; 16]);

    left.post(
        request(vec![Value::Buffer(buffer.clone())]),
        &TransferList::none(),
    )
    .unwrap();

    let received = right.receive().await.unwrap();
    assert_ne!(buffer_ptr(&received, 0), buffer.as_ptr());
}

#[tokio::test]
async fn pair_moves_transferred_buffers_without_copying() {
    let (left, mut right) = Channel::pair();
    let moved = Bytes::from(vec![1u8; 16]);
    let copied = Bytes::from(vec![2u8; 16]);
    let moved_ptr = moved.as_ptr();
    let copied_ptr = copied.as_ptr();

    left.post(
        request(vec![Value::Buffer(moved), Value::Buffer(copied), Value::from(3)]),
        &TransferList::new([0]),
    )
    .unwrap();

    let received = right.receive().await.unwrap();
    assert_eq!(buffer_ptr(&received, 0), moved_ptr);
    assert_ne!(buffer_ptr(&received, 1), copied_ptr);
}

#[tokio::test]
async fn post_rejects_transfer_outside_arguments() {
    let (left, mut right) = Channel::pair();

    let result = left.post(request(vec![Value::Null]), &TransferList::new([1]));
    assert!(matches!(result, Err(Error::Core(_))));
    assert!(right.try_receive().is_none());
}

#[tokio::test]
async fn post_fails_once_far_side_is_gone() {
    let (left, right) = Channel::pair();
    drop(right);

    assert!(left.poster().is_closed());
    let result = left.post(request(Vec::new()), &TransferList::none());
    assert!(matches!(result, Err(Error::ConnectionClosed)));
}

#[tokio::test]
async fn receive_ends_when_far_side_is_gone() {
    let (mut left, right) = Channel::pair();
    drop(right);

    assert_eq!(left.receive().await, None);
}

#[tokio::test]
async fn tcp_channel_carries_messages() {
    let listener = TcpTransportListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    // Echo every message back as a response to it
    tokio::spawn(async move {
        let (transport, _addr) = listener.accept().await.unwrap();
        let mut channel = Channel::from_transport(transport, BincodeCodec);
        while let Some(message) = channel.receive().await {
            if let Message::Request(r) = message {
                let response = CallResponse {
                    call_response: r.call_id,
                    arguments: r.arguments,
                };
                channel.post(response, &TransferList::none()).unwrap();
            }
        }
    });

    let mut channel = Channel::tcp(addr, BincodeCodec).await.unwrap();
    let arguments = vec![
        Value::from("World"),
        Value::from(vec![1u8, 2, 3]),
        Value::List(vec![Value::from(1.5), Value::Bool(true)]),
    ];

    // Transfer hints are accepted and ignored on byte transports
    channel
        .post(request(arguments.clone()), &TransferList::new([1]))
        .unwrap();

    match channel.receive().await.unwrap() {
        Message::Response(r) => {
            assert_eq!(r.call_response, CallId::FIRST);
            assert_eq!(r.arguments, arguments);
        }
        other => panic!("Expected a response, got {:?}", other),
    }
}

#[tokio::test]
async fn unix_channel_carries_announcements() {
    let socket_path = "/tmp/courier_test_unix_channel.sock";
    let _ = std::fs::remove_file(socket_path);

    let listener = UnixTransportListener::bind(socket_path).await.unwrap();
    let announcement = Announcement {
        function_names: vec!["greet".to_string()],
    };
    let sent = announcement.clone();

    tokio::spawn(async move {
        let transport = listener.accept().await.unwrap();
        let channel = Channel::from_transport(transport, BincodeCodec);
        channel.post(sent, &TransferList::none()).unwrap();
        // Keep the channel open until the client has read
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    });

    let mut channel = Channel::unix(socket_path, BincodeCodec).await.unwrap();
    assert_eq!(
        channel.receive().await,
        Some(Message::Announcement(announcement))
    );
}
