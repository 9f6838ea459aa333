//! TCP Transport Tests
//!
//! End-to-end over a real socket: server binary wiring minus the binary.

use std::sync::Arc;

use tetherkv::rpc::tcp::{self, TcpServer};
use tetherkv::rpc::Peer;
use tetherkv::store::MemStore;
use tetherkv::{ClientConfig, RemoteStore, Result, Service, ServiceConfig, TetherError};

fn start_server() -> (Arc<TcpServer>, std::net::SocketAddr, Arc<Service>) {
    let service = Service::new(MemStore::content_addressed(), ServiceConfig::default());
    let server = Arc::new(TcpServer::bind("127.0.0.1:0").unwrap());
    service.register(server.as_ref());
    let addr = server.local_addr().unwrap();

    let accept = Arc::clone(&server);
    std::thread::spawn(move || {
        let _ = accept.serve();
    });
    (server, addr, service)
}

#[test]
fn test_tcp_round_trip() {
    let (server, addr, _service) = start_server();
    let peer = tcp::dial(addr).unwrap();
    let store = RemoteStore::new(peer, ClientConfig::default());
    let kv = store.keyspace("data").unwrap();

    kv.put(b"alpha", b"one", false).unwrap();
    kv.put(b"beta", b"two", false).unwrap();
    assert_eq!(kv.get(b"alpha").unwrap(), b"one");
    assert_eq!(kv.len().unwrap(), 2);

    let keys: Result<Vec<_>> = kv.keys().collect();
    assert_eq!(keys.unwrap(), vec![b"alpha".to_vec(), b"beta".to_vec()]);

    server.stop().unwrap();
}

#[test]
fn test_tcp_error_round_trip() {
    let (server, addr, _service) = start_server();
    let peer = tcp::dial(addr).unwrap();
    let store = RemoteStore::new(peer, ClientConfig::default());
    let kv = store.keyspace("data").unwrap();

    // Domain errors survive the wire, key payload included.
    let err = kv.get(b"ghost").unwrap_err();
    match err {
        TetherError::KeyNotFound { key } => assert_eq!(key, b"ghost"),
        other => panic!("expected KeyNotFound, got {other:?}"),
    }

    kv.put(b"dup", b"1", false).unwrap();
    let err = kv.put(b"dup", b"2", false).unwrap_err();
    assert!(matches!(err, TetherError::KeyExists { .. }));

    server.stop().unwrap();
}

#[test]
fn test_tcp_cas_and_sync() {
    let (server, addr, _service) = start_server();
    let peer = tcp::dial(addr).unwrap();
    let store = RemoteStore::new(peer, ClientConfig::default());
    let kv = store.keyspace("cas").unwrap();

    let key = kv.cas_put(b"abcde\n", &[], &[]).unwrap();
    assert_eq!(kv.get(&key).unwrap(), b"abcde\n");
    assert_eq!(kv.len().unwrap(), 1);

    let missing = kv.sync_keys(&[&key[..], b"absent"]).unwrap();
    assert_eq!(missing, vec![b"absent".to_vec()]);

    server.stop().unwrap();
}

#[test]
fn test_tcp_unknown_method_code() {
    let (server, addr, _service) = start_server();
    let peer = tcp::dial(addr).unwrap();

    let err = peer.call("no-such-method", &[]).unwrap_err();
    match err {
        TetherError::Call { code, message, .. } => {
            assert_eq!(code, tcp::CODE_UNKNOWN_METHOD);
            assert!(message.contains("no-such-method"));
        }
        other => panic!("expected Call error, got {other:?}"),
    }

    server.stop().unwrap();
}

#[test]
fn test_tcp_client_stop() {
    let (server, addr, _service) = start_server();
    let peer = tcp::dial(addr).unwrap();
    let store = RemoteStore::new(peer, ClientConfig::default());
    let kv = store.keyspace("data").unwrap();
    kv.put(b"k", b"v", false).unwrap();

    store.close().unwrap();
    assert!(kv.get(b"k").is_err());

    server.stop().unwrap();
}
