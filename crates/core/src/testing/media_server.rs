//! Scriptable HTTP origin for download fault injection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the origin answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 200 with an accurate `Content-Length`.
    Body(Vec<u8>),
    /// 200 without `Content-Length`; the body ends when the connection closes.
    Unsized(Vec<u8>),
    /// 200 declaring `declared` bytes but sending only `body` before closing.
    Truncated { declared: usize, body: Vec<u8> },
    /// Empty response with the given status.
    Status(u16),
    /// Close the connection without answering.
    Drop,
}

#[derive(Default)]
struct Routes {
    replies: HashMap<String, Vec<Reply>>,
    hits: HashMap<String, usize>,
}

/// A minimal HTTP/1.1 origin on `127.0.0.1`.
///
/// Each path has a script of replies; the n-th request to a path receives the
/// n-th reply, and the last reply repeats once the script runs out. Unknown
/// paths get a 404. Every response closes its connection.
pub struct MediaServer {
    addr: SocketAddr,
    routes: Arc<Mutex<Routes>>,
    task: JoinHandle<()>,
}

impl MediaServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let routes = Arc::new(Mutex::new(Routes::default()));

        let accept_routes = Arc::clone(&routes);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = Arc::clone(&accept_routes);
                tokio::spawn(async move {
                    let _ = serve(stream, routes).await;
                });
            }
        });

        Ok(Self { addr, routes, task })
    }

    /// Scripts the replies for `path`.
    pub fn route(&self, path: &str, replies: Vec<Reply>) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.replies.insert(path.to_string(), replies);
            routes.hits.remove(path);
        }
    }

    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Requests received for `path` so far.
    pub fn hits(&self, path: &str) -> usize {
        self.routes
            .lock()
            .map(|routes| routes.hits.get(path).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl Drop for MediaServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut stream: TcpStream, routes: Arc<Mutex<Routes>>) -> std::io::Result<()> {
    let mut head = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 || head.len() > 16 * 1024 {
            return Ok(());
        }
        head.extend_from_slice(&chunk[..n]);
    }

    let request_line = String::from_utf8_lossy(&head);
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .split('?')
        .next()
        .unwrap_or("/")
        .to_string();

    let reply = {
        let Ok(mut routes) = routes.lock() else {
            return Ok(());
        };
        let hit = {
            let counter = routes.hits.entry(path.clone()).or_insert(0);
            *counter += 1;
            *counter - 1
        };
        routes
            .replies
            .get(&path)
            .and_then(|script| script.get(hit).or_else(|| script.last()))
            .cloned()
            .unwrap_or(Reply::Status(404))
    };

    match reply {
        Reply::Body(body) => {
            write_head(&mut stream, 200, Some(body.len())).await?;
            stream.write_all(&body).await?;
        }
        Reply::Unsized(body) => {
            write_head(&mut stream, 200, None).await?;
            stream.write_all(&body).await?;
        }
        Reply::Truncated { declared, body } => {
            write_head(&mut stream, 200, Some(declared)).await?;
            stream.write_all(&body).await?;
        }
        Reply::Status(status) => write_head(&mut stream, status, Some(0)).await?,
        Reply::Drop => {}
    }
    stream.flush().await?;
    stream.shutdown().await
}

async fn write_head(
    stream: &mut TcpStream,
    status: u16,
    content_length: Option<usize>,
) -> std::io::Result<()> {
    let mut head = format!("HTTP/1.1 {} X\r\nConnection: close\r\n", status);
    if let Some(len) = content_length {
        head.push_str(&format!("Content-Length: {}\r\n", len));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await
}
