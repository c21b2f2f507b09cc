//! Shared helpers for render-engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Path that answers with headers and then never sends its body.
pub const STALL_PATH: &str = "/stall.mp4";

type Objects = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// Minimal HTTP/1.1 server: GET serves stored objects (404 otherwise),
/// PUT stores the request body.
pub struct HttpFixture {
    addr: SocketAddr,
    objects: Objects,
    handle: JoinHandle<()>,
}

impl HttpFixture {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let objects: Objects = Arc::new(Mutex::new(HashMap::new()));

        let shared = objects.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let objects = shared.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, objects).await;
                });
            }
        });

        Self {
            addr,
            objects,
            handle,
        }
    }

    pub fn insert(&self, path: &str, body: Vec<u8>) {
        self.objects.lock().unwrap().insert(path.to_string(), body);
    }

    pub fn stored(&self, path: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(path).cloned()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for HttpFixture {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, objects: Objects) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    match method.as_str() {
        "GET" if path == STALL_PATH => {
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1048576\r\nConnection: close\r\n\r\npartial")
                .await?;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        "GET" => {
            let found = objects.lock().unwrap().get(&path).cloned();
            match found {
                Some(bytes) => respond(&mut stream, "200 OK", &bytes).await,
                None => respond(&mut stream, "404 Not Found", b"not found").await,
            }
        }
        "PUT" => {
            objects.lock().unwrap().insert(path, body);
            respond(&mut stream, "201 Created", b"").await
        }
        _ => respond(&mut stream, "405 Method Not Allowed", b"").await,
    }
}

async fn respond(stream: &mut TcpStream, status: &str, body: &[u8]) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.shutdown().await
}

/// True when `ffmpeg` (with libx264) and `ffprobe` are on PATH.
pub async fn media_tools_available() -> bool {
    let encoders = tokio::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output()
        .await;
    let has_x264 = match encoders {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).contains("libx264")
        }
        _ => false,
    };
    let has_probe = tokio::process::Command::new("ffprobe")
        .arg("-version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false);
    has_x264 && has_probe
}

/// Encode a solid-colour clip, optionally with a sine audio track.
pub async fn make_clip(path: &Path, color: &str, size: &str, secs: f64, audio: bool) {
    let mut cmd = tokio::process::Command::new("ffmpeg");
    cmd.args(["-y", "-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"])
        .arg(format!("color=c={color}:s={size}:d={secs}:r=25"));
    if audio {
        cmd.args(["-f", "lavfi", "-i"])
            .arg(format!("sine=frequency=440:duration={secs}"))
            .args(["-c:a", "aac", "-shortest"]);
    }
    cmd.args(["-c:v", "libx264", "-pix_fmt", "yuv420p"]).arg(path);

    let status = cmd.status().await.unwrap();
    assert!(status.success(), "failed to generate {}", path.display());
}

/// Decode the frame at `secs` into RGB.
pub async fn frame_at(video: &Path, secs: f64, out: &Path) -> image::RgbImage {
    let status = tokio::process::Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-ss"])
        .arg(format!("{secs}"))
        .arg("-i")
        .arg(video)
        .args(["-frames:v", "1"])
        .arg(out)
        .status()
        .await
        .unwrap();
    assert!(status.success());
    image::open(out).unwrap().to_rgb8()
}

pub fn is_reddish(pixel: &image::Rgb<u8>) -> bool {
    pixel[0] > 180 && pixel[1] < 80 && pixel[2] < 80
}

pub fn is_blueish(pixel: &image::Rgb<u8>) -> bool {
    pixel[2] > 180 && pixel[0] < 80 && pixel[1] < 80
}
