//! End-to-end protocol tests against a broker bound to an ephemeral port on
//! 127.0.0.1, exercising the six scenarios of the session state machine.

use rendezvous_broker::{Broker, BrokerConfig};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

async fn spawn_broker() -> std::net::SocketAddr {
    spawn_broker_with(BrokerConfig::new()).await
}

async fn spawn_broker_with(config: BrokerConfig) -> std::net::SocketAddr {
    let broker = Broker::bind(config.with_port(0)).await.expect("bind");
    // `local_addr()` reports the wildcard bind address; tests connect over
    // loopback explicitly rather than dialing 0.0.0.0 back.
    let port = broker.local_addr().expect("local_addr").port();
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    tokio::spawn(async move {
        let _ = broker.run().await;
    });
    addr
}

async fn send_prologue(stream: &mut TcpStream, lines: &[&str]) {
    for line in lines {
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();
    }
    stream.flush().await.unwrap();
}

async fn read_line(reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>) -> String {
    let mut buf = String::new();
    reader.read_line(&mut buf).await.unwrap();
    buf.trim().to_string()
}

#[tokio::test]
async fn discover_sees_existing_discoverable_peers() {
    let addr = spawn_broker().await;

    let mut joiner = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut joiner, &["g", "0", "AA:AA"]).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut discoverer = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut discoverer, &["g", "2", "BB:BB"]).await;
    let (read_half, _write_half) = discoverer.into_split();
    let mut reader = BufReader::new(read_half);
    assert_eq!(read_line(&mut reader).await, "AA:AA");
}

#[tokio::test]
async fn join_notifies_existing_discoverers() {
    let addr = spawn_broker().await;

    let mut discoverer = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut discoverer, &["g", "2", "BB:BB"]).await;
    let (read_half, _write_half) = discoverer.into_split();
    let mut reader = BufReader::new(read_half);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut joiner = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut joiner, &["g", "0", "AA:AA"]).await;

    assert_eq!(read_line(&mut reader).await, "AA:AA");
}

#[tokio::test]
async fn leave_is_obsolete_and_closes_the_session() {
    let addr = spawn_broker().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut stream, &["g", "1", "AA:AA"]).await;

    let (read_half, _write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    let n = reader.read_line(&mut buf).await.unwrap();
    assert_eq!(n, 0, "session should close with no reply");
}

#[tokio::test]
async fn listen_refuses_a_duplicate_uuid() {
    let addr = spawn_broker().await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut first, &["g", "3", "SS:SS", "uuid-1"]).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut second = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut second, &["g", "3", "SS:SS", "uuid-1"]).await;

    let (read_half, _write_half) = second.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    let n = reader.read_line(&mut buf).await.unwrap();
    assert_eq!(n, 0, "duplicate LISTEN should be refused and the socket closed");
}

#[tokio::test]
async fn connect_fails_fast_when_no_service_is_listening() {
    let addr = spawn_broker().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut stream, &["g", "4", "CC:CC", "SS:SS", "uuid-missing"]).await;

    let (read_half, _write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    assert_eq!(read_line(&mut reader).await, "fail");
}

#[tokio::test]
async fn connect_then_link_splices_the_two_sockets() {
    let addr = spawn_broker().await;

    let mut listener = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut listener, &["g", "3", "SS:SS", "uuid-1"]).await;
    let (listen_read, listen_write) = listener.into_split();
    let mut listen_reader = BufReader::new(listen_read);

    let mut connector = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut connector, &["g", "4", "CC:CC", "SS:SS", "uuid-1"]).await;
    let (connect_read, mut connect_write) = connector.into_split();
    let mut connect_reader = BufReader::new(connect_read);
    assert_eq!(read_line(&mut connect_reader).await, "ok");

    let peer_addr = read_line(&mut listen_reader).await;
    assert_eq!(peer_addr, "CC:CC");
    let conn_id = read_line(&mut listen_reader).await;

    let mut linker = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut linker, &["g", "5", "SS:SS", &conn_id]).await;

    linker.write_all(b"payload-from-service").await.unwrap();
    linker.flush().await.unwrap();

    let mut buf = [0u8; "payload-from-service".len()];
    tokio::time::timeout(Duration::from_secs(2), connect_reader.read_exact(&mut buf))
        .await
        .expect("timed out waiting for spliced bytes")
        .unwrap();
    assert_eq!(&buf, b"payload-from-service");

    connect_write.write_all(b"reply-from-client").await.unwrap();
    connect_write.flush().await.unwrap();
    let mut reply = [0u8; "reply-from-client".len()];
    tokio::time::timeout(Duration::from_secs(2), linker.read_exact(&mut reply))
        .await
        .expect("timed out waiting for the reply direction")
        .unwrap();
    assert_eq!(&reply, b"reply-from-client");
}

#[tokio::test]
async fn link_with_an_unknown_conn_id_closes_silently() {
    let addr = spawn_broker().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut stream, &["g", "5", "SS:SS", "999999"]).await;

    let (read_half, _write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    let n = reader.read_line(&mut buf).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn unrecognized_command_closes_the_session() {
    let addr = spawn_broker().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut stream, &["g", "9", "AA:AA"]).await;

    let (read_half, _write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf = String::new();
    let n = reader.read_line(&mut buf).await.unwrap();
    assert_eq!(n, 0);
}

#[tokio::test]
async fn empty_group_name_falls_back_to_peer_ip() {
    let addr = spawn_broker().await;

    // Two JOINs with an empty group name from the same loopback address land
    // in the same (IP-keyed) group, so a DISCOVER into that implicit group
    // sees the first peer.
    let mut joiner = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut joiner, &["", "0", "AA:AA"]).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut discoverer = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut discoverer, &["", "2", "BB:BB"]).await;
    let (read_half, _write_half) = discoverer.into_split();
    let mut reader = BufReader::new(read_half);
    assert_eq!(read_line(&mut reader).await, "AA:AA");
}

#[tokio::test]
async fn connect_times_out_and_restores_service_availability_when_never_linked() {
    let addr = spawn_broker_with(BrokerConfig::new().with_connect_timeout(Duration::from_millis(200))).await;

    let mut listener = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut listener, &["g", "3", "SS:SS", "uuid-1"]).await;
    let (listen_read, _listen_write) = listener.into_split();
    let mut listen_reader = BufReader::new(listen_read);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut connector = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut connector, &["g", "4", "CC:CC", "SS:SS", "uuid-1"]).await;
    let (connect_read, _connect_write) = connector.into_split();
    let mut connect_reader = BufReader::new(connect_read);
    assert_eq!(read_line(&mut connect_reader).await, "ok");

    // The service does get notified of the pending connection...
    assert_eq!(read_line(&mut listen_reader).await, "CC:CC");

    // ...but nobody ever sends LINK. Past the (short, test-configured)
    // timeout the CONNECT session must give up and close its socket.
    let mut buf = String::new();
    let n = tokio::time::timeout(
        Duration::from_secs(2),
        connect_reader.read_line(&mut buf),
    )
    .await
    .expect("CONNECT should close once its bounded wait times out")
    .unwrap();
    assert_eq!(n, 0, "CONNECT socket should be closed with no further reply");

    // The service's `available` flag must have been restored: a second
    // CONNECT against the same addr/uuid should succeed.
    let mut second_connector = TcpStream::connect(addr).await.unwrap();
    send_prologue(&mut second_connector, &["g", "4", "DD:DD", "SS:SS", "uuid-1"]).await;
    let (second_read, _second_write) = second_connector.into_split();
    let mut second_reader = BufReader::new(second_read);
    assert_eq!(
        read_line(&mut second_reader).await,
        "ok",
        "service availability should have been restored after the first CONNECT timed out"
    );
}
