//! Scripted local HTTP server for client tests

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Serve `responses` in order, one connection each, and return the raw requests
pub(crate) async fn spawn_rpc_server(
    responses: Vec<(&'static str, String)>,
) -> (std::net::SocketAddr, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind local server");
    let addr = listener.local_addr().expect("read addr");

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status_line, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            requests.push(read_request(&mut socket).await);
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        requests
    });

    (addr, handle)
}

/// JSON-RPC success envelope
pub(crate) fn ok(result: serde_json::Value) -> (&'static str, String) {
    (
        "200 OK",
        serde_json::json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string(),
    )
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        data.extend_from_slice(&buf[..n]);
        if let Some(header_end) = find(&data, b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&data[..header_end]).to_lowercase();
            let length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= header_end + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
