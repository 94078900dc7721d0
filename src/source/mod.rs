use std::io;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use url::Url;

use crate::downloader::error::DownloadError;

pub mod ftp;
pub mod http;

use ftp::FtpSource;
use http::HttpSource;

/// 远端字节流
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Ftp,
    Unknown,
}

impl Scheme {
    /// 只看协议名，解析失败也算未知
    pub fn classify(url: &str) -> Scheme {
        match Url::parse(url) {
            Ok(u) => match u.scheme() {
                "http" | "https" => Scheme::Http,
                "ftp" => Scheme::Ftp,
                _ => Scheme::Unknown,
            },
            Err(_) => Scheme::Unknown,
        }
    }
}

/// 打开成功的远端资源
pub struct RemoteSource {
    /// 源建议的文件名，没有时由 worker 生成
    pub name: Option<String>,
    /// 声明的大小，`None` 表示未知
    pub size: Option<u64>,
    pub body: ByteStream,
}

impl std::fmt::Debug for RemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSource")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// 给定 URL 打开可读字节流
#[async_trait]
pub trait SourceOpener: Send + Sync {
    async fn open(&self, scheme: Scheme, url: &str) -> Result<RemoteSource, DownloadError>;
}

/// 按协议分派到 HTTP / FTP
pub struct DefaultOpener {
    http: HttpSource,
    ftp: FtpSource,
}

impl DefaultOpener {
    pub fn new() -> Self {
        Self {
            http: HttpSource::new(),
            ftp: FtpSource::default(),
        }
    }
}

impl Default for DefaultOpener {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceOpener for DefaultOpener {
    async fn open(&self, scheme: Scheme, url: &str) -> Result<RemoteSource, DownloadError> {
        match scheme {
            Scheme::Http => self.http.open(url).await,
            Scheme::Ftp => self.ftp.open(url).await,
            Scheme::Unknown => Err(DownloadError::Scheme(url.to_string())),
        }
    }
}

/// 只保留最后一段路径，避免头部或 URL 里带目录跳转
pub fn sanitize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches(['/', '\\']);
    let last = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    let name = Path::new(last).file_name()?.to_str()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}
