//! Serve/stop state machine of the concrete servers.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use rpc_server::net::listener::ListenerError;
use rpc_server::protocol::BinaryProtocolFactory;
use rpc_server::server::{
    Server, ServerBuilder, ServerError, SimpleServer, SimpleServerArgs, ThreadedServer,
    ThreadedServerArgs,
};

#[tokio::test]
async fn serving_flag_follows_serve_and_stop() {
    let running = start_threaded(ThreadedServerArgs::new("127.0.0.1:0").processor(echo())).await;
    assert!(running.server.is_serving());
    assert!(running.server.local_addr().is_some());

    running.server.stop();
    join(running.handle).await.unwrap();

    assert!(!running.server.is_serving());
    assert!(running.server.local_addr().is_none());
}

#[tokio::test]
async fn fresh_server_is_not_serving() {
    let server = SimpleServer::new(SimpleServerArgs::new("127.0.0.1:0").processor(echo()));
    assert!(!server.is_serving());
    assert!(server.local_addr().is_none());
}

#[tokio::test]
async fn threaded_server_restarts_after_stop() {
    let server = Arc::new(ThreadedServer::new(
        ThreadedServerArgs::new("127.0.0.1:0").processor(echo()),
    ));
    let protocol = BinaryProtocolFactory::default();

    for round in 0..2 {
        let running = Arc::clone(&server);
        let handle = tokio::spawn(async move { running.serve().await });
        wait_for(|| server.is_serving()).await;

        let addr = server.local_addr().unwrap();
        let mut client = Client::connect(addr, &protocol).await;
        let reply = client.call(&call("ping", round, b"up")).await.unwrap().unwrap();
        assert_eq!(reply.sequence_id, round);

        server.stop();
        join(handle).await.unwrap();
        assert!(!server.is_serving());
    }
}

#[tokio::test]
async fn simple_server_restarts_after_stop() {
    let server = Arc::new(SimpleServer::new(
        SimpleServerArgs::new("127.0.0.1:0").processor(echo()),
    ));

    for _ in 0..2 {
        let running = Arc::clone(&server);
        let handle = tokio::spawn(async move { running.serve().await });
        wait_for(|| server.is_serving()).await;
        server.stop();
        join(handle).await.unwrap();
        assert!(!server.is_serving());
    }
}

#[tokio::test]
async fn concurrent_serve_is_rejected() {
    let running = start_threaded(ThreadedServerArgs::new("127.0.0.1:0").processor(echo())).await;

    let second = within(running.server.serve()).await;
    assert!(matches!(second, Err(ServerError::AlreadyServing)));
    assert!(running.server.is_serving());

    running.server.stop();
    join(running.handle).await.unwrap();
}

#[tokio::test]
async fn serve_without_processor_fails_before_binding() {
    let simple = SimpleServer::new(SimpleServerArgs::new("127.0.0.1:0"));
    let result = within(simple.serve()).await;
    assert!(matches!(result, Err(ServerError::MissingProcessorFactory)));
    assert!(!simple.is_serving());

    let threaded = ThreadedServer::new(ThreadedServerArgs::new("not an address"));
    let result = within(threaded.serve()).await;
    assert!(matches!(result, Err(ServerError::MissingProcessorFactory)));
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap();

    let server = ThreadedServer::new(ThreadedServerArgs::new(addr.to_string()).processor(echo()));
    let result = within(server.serve()).await;

    assert!(matches!(
        result,
        Err(ServerError::Listener(ListenerError::Bind { .. }))
    ));
    assert!(!server.is_serving());
}

#[tokio::test]
async fn stop_before_ready_is_honored() {
    let handler = Arc::new(CountingHandler::default());
    let server = ThreadedServer::new(ThreadedServerArgs::new("127.0.0.1:0").processor(echo()));
    server.set_server_event_handler(handler.clone());

    server.stop();
    within(server.serve()).await.unwrap();

    assert!(!server.is_serving());
    assert_eq!(CountingHandler::get(&handler.pre_serve), 1);
}

#[tokio::test]
async fn stop_closes_idle_sessions() {
    let running = start_simple(SimpleServerArgs::new("127.0.0.1:0").processor(echo())).await;
    let mut client = Client::connect(running.addr, &BinaryProtocolFactory::default()).await;
    client.call(&call("ping", 1, b"")).await.unwrap().unwrap();

    running.server.stop();
    join(running.handle).await.unwrap();

    assert!(client.recv().await.unwrap().is_none());
}

#[tokio::test]
async fn drain_timeout_aborts_stuck_sessions() {
    let args = ThreadedServerArgs::new("127.0.0.1:0")
        .processor(echo())
        .drain_timeout(Duration::from_millis(100));
    let running = start_threaded(args).await;

    let mut client = Client::connect(running.addr, &BinaryProtocolFactory::default()).await;
    client.send(&call("sleep", 1, b"")).await.unwrap();
    wait_for(|| running.server.active_connections() == 1).await;

    let started = Instant::now();
    running.server.stop();
    join(running.handle).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(running.server.active_connections(), 0);
}

#[tokio::test]
async fn simple_stop_does_not_wait_on_stuck_processor() {
    let handler = Arc::new(CountingHandler::default());
    let args = SimpleServerArgs::new("127.0.0.1:0")
        .processor(echo())
        .drain_timeout(Duration::from_millis(100));
    let running = start_simple(args).await;
    running.server.set_server_event_handler(handler.clone());
    let addr = running.addr;

    let mut client = Client::connect(addr, &BinaryProtocolFactory::default()).await;
    client.send(&call("sleep", 1, b"")).await.unwrap();
    wait_for(|| CountingHandler::get(&handler.processed) == 1).await;

    let started = Instant::now();
    running.server.stop();
    join(running.handle).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(!running.server.is_serving());
    assert!(running.server.local_addr().is_none());
    assert_eq!(running.server.active_connections(), 0);
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn simple_stop_clears_flag_before_session_drains() {
    let args = SimpleServerArgs::new("127.0.0.1:0")
        .processor(echo())
        .drain_timeout(Duration::from_secs(60));
    let running = start_simple(args).await;
    let handler = Arc::new(CountingHandler::default());
    running.server.set_server_event_handler(handler.clone());

    let mut client = Client::connect(running.addr, &BinaryProtocolFactory::default()).await;
    client.send(&call("sleep", 1, b"")).await.unwrap();
    wait_for(|| CountingHandler::get(&handler.processed) == 1).await;

    running.server.stop();
    wait_for(|| !running.server.is_serving()).await;
    assert!(running.server.local_addr().is_none());
    assert!(!running.handle.is_finished());

    running.handle.abort();
}

#[tokio::test]
async fn max_connections_holds_back_extra_clients() {
    let args = ThreadedServerArgs::new("127.0.0.1:0")
        .processor(echo())
        .max_connections(1);
    let running = start_threaded(args).await;
    let protocol = BinaryProtocolFactory::default();

    let mut first = Client::connect(running.addr, &protocol).await;
    first.call(&call("ping", 1, b"")).await.unwrap().unwrap();

    let mut second = Client::connect(running.addr, &protocol).await;
    let pending = tokio::time::timeout(
        Duration::from_millis(200),
        second.call(&call("ping", 2, b"")),
    )
    .await;
    assert!(pending.is_err(), "second client served while first held the only slot");

    drop(first);
    let reply = second.recv().await.unwrap().unwrap();
    assert_eq!(reply.sequence_id, 2);

    running.server.stop();
    join(running.handle).await.unwrap();
}
