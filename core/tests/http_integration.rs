/*
 * http_integration.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Rover, a command-line web client.
 *
 * Rover is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Rover is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Rover.  If not, see <http://www.gnu.org/licenses/>.
 */

//! HTTP fetch over the TCP transport (and the TLS decorator on top of it) against local servers.
//!
//! Real-network test is ignored by default:
//!   cargo test -p rover_core --test http_integration -- --ignored --nocapture

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use tokio::runtime::Runtime;

use rover_core::protocol::http::{HttpClient, Method, RequestBuilder, Transaction, TransactionState};
use rover_core::uri::Url;
use rover_core::{Cancellation, ClientTransport, TcpTransport, TlsConfig, TlsDecorator};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

/// Read one request head (up to the blank line).
fn read_head(stream: &mut impl Read) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
    }
    String::from_utf8(head).unwrap()
}

/// Serve one connection: hand the request head to `respond` and write what it returns.
fn serve_once(respond: impl FnOnce(&str) -> Vec<u8> + Send + 'static) -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let head = read_head(&mut stream);
        let reply = respond(&head);
        stream.write_all(&reply).unwrap();
        head
    });
    (port, handle)
}

fn fetch(transport: Arc<dyn ClientTransport>, url: &str, timeout: Duration) -> Transaction {
    let client = HttpClient::new(transport).with_timeout(timeout);
    client.fetch(&RequestBuilder::get(Url::parse(url).unwrap()), &Cancellation::new())
}

#[test]
fn fetch_with_content_length() {
    let rt = runtime();
    let (port, server) = serve_once(|_| {
        b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello".to_vec()
    });
    let tcp = Arc::new(TcpTransport::new(rt.handle().clone()));
    let tx = fetch(tcp, &format!("http://127.0.0.1:{}/hello?x=1", port), Duration::from_secs(5));

    assert_eq!(tx.state, TransactionState::Completed);
    assert_eq!(tx.response.code, 200);
    assert_eq!(tx.response.reason, "OK");
    assert_eq!(tx.response.header("content-type"), Some("text/plain"));
    assert_eq!(tx.response.body, b"hello");

    let head = server.join().unwrap();
    assert!(head.starts_with("GET /hello?x=1 HTTP/1.1\r\n"));
    assert!(head.contains(&format!("Host: 127.0.0.1:{}\r\n", port)));
    assert!(head.contains("Connection: close\r\n"));
}

#[test]
fn fetch_chunked_body() {
    let rt = runtime();
    let (port, server) = serve_once(|_| {
        b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n".to_vec()
    });
    let tcp = Arc::new(TcpTransport::new(rt.handle().clone()));
    let tx = fetch(tcp, &format!("http://127.0.0.1:{}/", port), Duration::from_secs(5));
    assert_eq!(tx.state, TransactionState::Completed);
    assert_eq!(tx.response.body, b"abcde");
    server.join().unwrap();
}

#[test]
fn body_until_close_completes_when_server_closes() {
    let rt = runtime();
    let (port, server) = serve_once(|_| b"HTTP/1.0 200 OK\r\n\r\nall of it".to_vec());
    let tcp = Arc::new(TcpTransport::new(rt.handle().clone()));
    let tx = fetch(tcp, &format!("http://127.0.0.1:{}/", port), Duration::from_secs(5));
    assert_eq!(tx.state, TransactionState::Completed);
    assert_eq!(tx.response.body, b"all of it");
    server.join().unwrap();
}

#[test]
fn close_before_body_is_complete_is_broken() {
    let rt = runtime();
    let (port, server) = serve_once(|_| b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial".to_vec());
    let tcp = Arc::new(TcpTransport::new(rt.handle().clone()));
    let tx = fetch(tcp, &format!("http://127.0.0.1:{}/", port), Duration::from_secs(5));
    assert_eq!(tx.state, TransactionState::Broken);
    assert_eq!(tx.response.body, b"partial");
    server.join().unwrap();
}

#[test]
fn continue_head_before_final_response_is_skipped() {
    let rt = runtime();
    let (port, server) = serve_once(|_| {
        b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 4\r\n\r\ndone".to_vec()
    });
    let tcp = Arc::new(TcpTransport::new(rt.handle().clone()));
    let tx = fetch(tcp, &format!("http://127.0.0.1:{}/", port), Duration::from_secs(5));
    assert_eq!(tx.state, TransactionState::Completed);
    assert_eq!(tx.response.code, 200);
    assert_eq!(tx.response.body, b"done");
    server.join().unwrap();
}

#[test]
fn head_request_has_no_body() {
    let rt = runtime();
    let (port, server) = serve_once(|_| b"HTTP/1.1 200 OK\r\nContent-Length: 1234\r\n\r\n".to_vec());
    let tcp = Arc::new(TcpTransport::new(rt.handle().clone()));
    let client = HttpClient::new(tcp).with_timeout(Duration::from_secs(5));
    let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
    let tx = client.fetch(&RequestBuilder::new(Method::Head, url), &Cancellation::new());
    assert_eq!(tx.state, TransactionState::Completed);
    assert!(tx.response.body.is_empty());
    assert!(server.join().unwrap().starts_with("HEAD / HTTP/1.1\r\n"));
}

#[test]
fn silent_server_times_out() {
    let rt = runtime();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let tcp = Arc::new(TcpTransport::new(rt.handle().clone()));
    let tx = fetch(tcp, &format!("http://127.0.0.1:{}/", port), Duration::from_millis(300));
    assert_eq!(tx.state, TransactionState::Timeout);
    drop(listener);
}

#[test]
fn cancelled_fetch_stops_waiting() {
    let rt = runtime();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let tcp = Arc::new(TcpTransport::new(rt.handle().clone()));
    let cancel = Cancellation::new();
    let canceller = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            cancel.cancel();
        })
    };
    let client = HttpClient::new(tcp).with_timeout(Duration::from_secs(30));
    let url = Url::parse(&format!("http://127.0.0.1:{}/", port)).unwrap();
    let tx = client.fetch(&RequestBuilder::get(url), &cancel);
    assert_eq!(tx.state, TransactionState::Cancelled);
    canceller.join().unwrap();
    drop(listener);
}

#[test]
fn refused_connection_is_unable_to_connect() {
    let rt = runtime();
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let tcp = Arc::new(TcpTransport::new(rt.handle().clone()));
    let tx = fetch(tcp, &format!("http://127.0.0.1:{}/", port), Duration::from_secs(5));
    assert_eq!(tx.state, TransactionState::UnableToConnect);
}

#[test]
fn https_fetch_through_decorator() {
    let rt = runtime();
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));
    let server_config = Arc::new(
        ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(vec![cert.clone()], key)
            .unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (tcp, _) = listener.accept().unwrap();
        let mut tls = StreamOwned::new(ServerConnection::new(server_config).unwrap(), tcp);
        let head = read_head(&mut tls);
        tls.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 6\r\n\r\nsecret").unwrap();
        tls.conn.send_close_notify();
        tls.flush().unwrap();
        head
    });

    let tcp: Arc<dyn ClientTransport> = Arc::new(TcpTransport::new(rt.handle().clone()));
    let tls = Arc::new(TlsDecorator::new(tcp, TlsConfig::new().with_root_certificates(vec![cert])));
    let tx = fetch(tls, &format!("https://localhost:{}/private", port), Duration::from_secs(10));

    assert_eq!(tx.state, TransactionState::Completed);
    assert_eq!(tx.response.code, 200);
    assert_eq!(tx.response.body, b"secret");
    let head = server.join().unwrap();
    assert!(head.starts_with("GET /private HTTP/1.1\r\n"));
    assert!(head.contains(&format!("Host: localhost:{}\r\n", port)));
}

/// Fetch https://example.com/ with platform roots. Requires network access.
#[test]
#[ignore]
fn https_fetch_real_server() {
    let rt = runtime();
    let tcp: Arc<dyn ClientTransport> = Arc::new(TcpTransport::new(rt.handle().clone()));
    let tls = Arc::new(TlsDecorator::new(tcp, TlsConfig::new()));
    let tx = fetch(tls, "https://example.com/", Duration::from_secs(15));
    println!("state: {:?}", tx.state);
    println!("status: {} {}", tx.response.code, tx.response.reason);
    for (name, value) in &tx.response.headers {
        println!("  {}: {}", name, value);
    }
    assert_eq!(tx.state, TransactionState::Completed);
    assert_eq!(tx.response.code, 200);
    assert!(String::from_utf8_lossy(&tx.response.body).contains("Example Domain"));
}
