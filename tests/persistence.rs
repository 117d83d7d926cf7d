//! Restart behaviour: state written through one server instance must be
//! visible after a fresh instance replays the same append-only file.

use bytes::Bytes;
use ledgerkv::commands::CommandHandler;
use ledgerkv::connection::{handle_connection, ConnectionStats};
use ledgerkv::protocol::{parse_message, RespValue};
use ledgerkv::storage::StorageEngine;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_aof() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("appendonly.aof");
    (temp_dir, path)
}

fn cmd(parts: &[&str]) -> RespValue {
    RespValue::command(parts.iter().map(|s| Bytes::from(s.to_string())))
}

fn bulk(s: &str) -> RespValue {
    RespValue::bulk_string(Bytes::from(s.to_string()))
}

fn boot(path: &Path) -> CommandHandler {
    let (handler, _) = CommandHandler::recover(Arc::new(StorageEngine::new()), path).unwrap();
    handler
}

async fn start_server(path: &Path) -> SocketAddr {
    let handler = boot(path);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stats = Arc::new(ConnectionStats::new());

    tokio::spawn(async move {
        while let Ok((stream, client_addr)) = listener.accept().await {
            tokio::spawn(handle_connection(
                stream,
                client_addr,
                handler.clone(),
                Arc::clone(&stats),
            ));
        }
    });

    addr
}

/// Sends one request and reads exactly one reply.
async fn roundtrip(client: &mut TcpStream, request: RespValue) -> RespValue {
    client.write_all(&request.serialize()).await.unwrap();

    let mut buf = Vec::new();
    loop {
        if let Some((reply, _)) = parse_message(&buf).unwrap() {
            return reply;
        }
        let mut chunk = [0u8; 1024];
        let n = client.read(&mut chunk).await.unwrap();
        assert!(n > 0, "server closed the connection");
        buf.extend_from_slice(&chunk[..n]);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_state_survives_restart() {
    let (_temp, path) = setup_temp_aof();

    {
        let handler = boot(&path);
        handler.execute(cmd(&["SET", "foo", "bar"]));
        handler.execute(cmd(&["INCR", "n"]));
        handler.execute(cmd(&["INCR", "n"]));
        handler.execute(cmd(&["HSET", "h", "f", "v"]));
        handler.execute(cmd(&["RPUSH", "l", "a", "b", "c"]));
        handler.execute(cmd(&["LSET", "l", "0", "A"]));
        handler.execute(cmd(&["GET", "foo"]));
    }

    let (handler, report) = CommandHandler::recover(Arc::new(StorageEngine::new()), &path).unwrap();
    assert_eq!(report.commands_applied, 6);
    assert!(!report.was_truncated());

    assert_eq!(handler.execute(cmd(&["GET", "foo"])), bulk("bar"));
    assert_eq!(handler.execute(cmd(&["GET", "n"])), bulk("2"));
    assert_eq!(handler.execute(cmd(&["HGET", "h", "f"])), bulk("v"));
    assert_eq!(
        handler.execute(cmd(&["LRANGE", "l", "0", "-1"])),
        RespValue::array(vec![bulk("A"), bulk("b"), bulk("c")])
    );
}

#[test]
fn test_replay_is_idempotent_across_restarts() {
    let (_temp, path) = setup_temp_aof();

    {
        let handler = boot(&path);
        handler.execute(cmd(&["APPEND", "s", "x"]));
        handler.execute(cmd(&["LPUSH", "l", "1", "2"]));
    }

    // Restarting twice without new writes must not duplicate anything.
    drop(boot(&path));
    let handler = boot(&path);

    assert_eq!(handler.execute(cmd(&["GET", "s"])), bulk("x"));
    assert_eq!(handler.execute(cmd(&["LLEN", "l"])), RespValue::integer(2));
}

#[test]
fn test_torn_tail_is_dropped_and_later_writes_survive() {
    let (_temp, path) = setup_temp_aof();

    {
        let handler = boot(&path);
        handler.execute(cmd(&["SET", "before", "crash"]));
    }

    // Simulate a crash in the middle of writing a record.
    let mut contents = std::fs::read(&path).unwrap();
    contents.extend_from_slice(b"*3\r\n$3\r\nSET\r\n$4\r\nhalf");
    std::fs::write(&path, &contents).unwrap();

    {
        let (handler, report) =
            CommandHandler::recover(Arc::new(StorageEngine::new()), &path).unwrap();
        assert_eq!(report.commands_applied, 1);
        assert!(report.was_truncated());

        assert_eq!(handler.execute(cmd(&["GET", "before"])), bulk("crash"));
        handler.execute(cmd(&["SET", "after", "crash"]));
    }

    let (handler, report) = CommandHandler::recover(Arc::new(StorageEngine::new()), &path).unwrap();
    assert_eq!(report.commands_applied, 2);
    assert!(!report.was_truncated());
    assert_eq!(handler.execute(cmd(&["GET", "after"])), bulk("crash"));
    assert_eq!(handler.execute(cmd(&["GET", "half"])), RespValue::null());
}

#[tokio::test]
async fn test_restart_over_tcp() {
    let (_temp, path) = setup_temp_aof();

    let addr = start_server(&path).await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    assert_eq!(
        roundtrip(&mut client, cmd(&["SET", "k", "v\r\n"])).await,
        RespValue::ok()
    );
    assert_eq!(
        roundtrip(&mut client, cmd(&["HSET", "h", "f1", "v1"])).await,
        RespValue::ok()
    );
    assert_eq!(
        roundtrip(&mut client, cmd(&["HDEL", "h", "f1"])).await,
        RespValue::integer(1)
    );
    assert_eq!(
        roundtrip(&mut client, cmd(&["COPY", "k", "k2"])).await,
        RespValue::integer(1)
    );
    drop(client);

    // A second server instance on the same file sees the same data.
    let addr = start_server(&path).await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    assert_eq!(roundtrip(&mut client, cmd(&["GET", "k2"])).await, bulk("v\r\n"));
    assert_eq!(
        roundtrip(&mut client, cmd(&["HGETALL", "h"])).await,
        RespValue::null()
    );
    assert_eq!(
        roundtrip(&mut client, cmd(&["EXISTS", "k", "k2", "nope"])).await,
        RespValue::integer(2)
    );
}
