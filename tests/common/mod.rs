#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

use pfp_rotator::errors::{AppError, AppResult};
use pfp_rotator::image_processor;
use pfp_rotator::rotator::{AvatarUploader, ImageFetcher, Pipeline, ProfileSource, UserProfile};

/// Deterministic test picture
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 128]));
    image_processor::encode_png(&DynamicImage::ImageRgb8(img)).unwrap()
}

pub fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

// ---------------------------------------------------------------------------
// Scripted in-memory adapters
// ---------------------------------------------------------------------------

/// Fails `failures` times with `make_err`, then succeeds
pub struct Script {
    failures: Mutex<u32>,
    make_err: fn() -> AppError,
}

impl Script {
    pub fn ok() -> Self {
        Self::failing(0, || AppError::not_found("unused"))
    }

    pub fn failing(failures: u32, make_err: fn() -> AppError) -> Self {
        Self {
            failures: Mutex::new(failures),
            make_err,
        }
    }

    fn next(&self) -> AppResult<()> {
        let mut left = self.failures.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            return Err((self.make_err)());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct CallLog {
    pub profiles: Vec<Instant>,
    pub fetches: Vec<(Instant, String)>,
    pub uploads: Vec<(Instant, Vec<u8>)>,
}

pub type SharedLog = Arc<Mutex<CallLog>>;

pub struct FakeProfiles {
    pub log: SharedLog,
    pub script: Script,
}

pub struct FakeImages {
    pub log: SharedLog,
    pub script: Script,
    pub png: Vec<u8>,
}

pub struct FakeUploader {
    pub log: SharedLog,
    pub script: Script,
}

#[async_trait]
impl ProfileSource for FakeProfiles {
    async fn get_user_profile(&self, _user_id: &str) -> AppResult<UserProfile> {
        self.log.lock().unwrap().profiles.push(Instant::now());
        self.script.next()?;
        Ok(UserProfile {
            display_name: "Alice".to_string(),
            real_name: "Alice".to_string(),
            avatar_url: "http://x/a.png".to_string(),
        })
    }
}

#[async_trait]
impl ImageFetcher for FakeImages {
    async fn fetch_image(&self, url: &str) -> AppResult<Vec<u8>> {
        self.log
            .lock()
            .unwrap()
            .fetches
            .push((Instant::now(), url.to_string()));
        self.script.next()?;
        Ok(self.png.clone())
    }
}

#[async_trait]
impl AvatarUploader for FakeUploader {
    async fn set_avatar(&self, _user_id: &str, image: Vec<u8>) -> AppResult<()> {
        self.log.lock().unwrap().uploads.push((Instant::now(), image));
        self.script.next()
    }
}

/// Records the upload, then takes `delay` before acknowledging it
pub struct SlowUploader {
    pub log: SharedLog,
    pub delay: std::time::Duration,
}

#[async_trait]
impl AvatarUploader for SlowUploader {
    async fn set_avatar(&self, _user_id: &str, image: Vec<u8>) -> AppResult<()> {
        self.log.lock().unwrap().uploads.push((Instant::now(), image));
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

pub fn fake_pipeline(log: &SharedLog, profiles: Script, images: Script, uploads: Script) -> Pipeline {
    Pipeline::new(
        Box::new(FakeProfiles {
            log: log.clone(),
            script: profiles,
        }),
        Box::new(FakeImages {
            log: log.clone(),
            script: images,
            png: gradient_png(100, 50),
        }),
        Box::new(FakeUploader {
            log: log.clone(),
            script: uploads,
        }),
        "U1",
    )
}

// ---------------------------------------------------------------------------
// Minimal HTTP/1.1 responder for exercising the real reqwest clients
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct CannedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl CannedResponse {
    pub fn json(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn png(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "image/png",
            body,
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/html",
            body: body.as_bytes().to_vec(),
        }
    }
}

pub type Responder = Arc<dyn Fn(&RecordedRequest) -> CannedResponse + Send + Sync>;

pub struct TestServer {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl TestServer {
    pub async fn start(responder: Responder) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let recorded = recorded.clone();
                let responder = responder.clone();
                tokio::spawn(async move {
                    let _ = serve_one(stream, recorded, responder).await;
                });
            }
        });

        Self { base_url, requests }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path_prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.target.starts_with(path_prefix))
            .collect()
    }
}

async fn serve_one(
    mut stream: TcpStream,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    responder: Responder,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let header = |name: &str| {
        headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.clone())
    };

    let mut body = buf[header_end..].to_vec();
    if let Some(len) = header("content-length").and_then(|v| v.parse::<usize>().ok()) {
        while body.len() < len {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body.truncate(len);
    } else if header("transfer-encoding").is_some_and(|v| v.eq_ignore_ascii_case("chunked")) {
        while !body.ends_with(b"0\r\n\r\n") {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
        }
        body = dechunk(&body);
    }

    let request = RecordedRequest {
        method,
        target,
        headers,
        body,
    };
    let response = responder(&request);
    recorded.lock().unwrap().push(request);

    let head = format!(
        "HTTP/1.1 {} Test\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.content_type,
        response.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.shutdown().await
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn dechunk(mut raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(line_end) = find(raw, b"\r\n") {
        let size_str = String::from_utf8_lossy(&raw[..line_end]);
        let size = usize::from_str_radix(size_str.split(';').next().unwrap_or("0").trim(), 16)
            .unwrap_or(0);
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        let end = (start + size).min(raw.len());
        out.extend_from_slice(&raw[start..end]);
        raw = &raw[(end + 2).min(raw.len())..];
    }
    out
}
