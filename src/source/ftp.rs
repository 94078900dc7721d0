use std::io::{self, Read};
use std::net::ToSocketAddrs;
use std::time::Duration;

use bytes::Bytes;
use suppaftp::FtpStream;
use suppaftp::types::FileType;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use url::Url;

use super::{RemoteSource, sanitize_name};
use crate::downloader::error::{DownloadError, TransportError};

const DIAL_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_PORT: u16 = 21;
const ANONYMOUS: &str = "anonymous";
const READ_BUF: usize = 32 * 1024;
// 阻塞线程和异步端之间缓冲的块数
const CHUNK_QUEUE: usize = 8;

/// 解析后的 `ftp://[user[:password]@]host[:port]/path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpTarget {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl FtpTarget {
    pub fn parse(link: &str) -> Result<Self, TransportError> {
        let u = Url::parse(link).map_err(|e| TransportError::InvalidFtpUrl(e.to_string()))?;

        let host = u
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TransportError::InvalidFtpUrl("缺少主机".to_string()))?
            .to_string();

        let user = Some(decode(u.username()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string());
        let password = u
            .password()
            .map(decode)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ANONYMOUS.to_string());

        let path = decode(u.path());
        if path.is_empty() || path == "/" {
            return Err(TransportError::InvalidFtpUrl(format!(
                "URL 中没有文件路径: {}",
                link
            )));
        }

        Ok(Self {
            user,
            password,
            host,
            port: u.port().unwrap_or(DEFAULT_PORT),
            path,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[derive(Debug, Clone)]
pub struct FtpSource {
    timeout: Duration,
}

impl Default for FtpSource {
    fn default() -> Self {
        Self {
            timeout: DIAL_TIMEOUT,
        }
    }
}

impl FtpSource {
    pub async fn open(&self, url: &str) -> Result<RemoteSource, DownloadError> {
        let target = FtpTarget::parse(url).map_err(DownloadError::ftp)?;
        let name = sanitize_name(&target.path);

        let (opened_tx, opened_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_QUEUE);
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || retrieve(target, timeout, opened_tx, chunk_tx));

        let size = match opened_rx.await {
            Ok(Ok(size)) => size,
            Ok(Err(e)) => return Err(DownloadError::ftp(e)),
            Err(_) => {
                return Err(DownloadError::ftp(io::Error::other("FTP 线程意外退出")));
            }
        };
        debug!("FTP 源已打开: {}, 名称: {:?}, 大小: {:?}", url, name, size);

        let body = futures::stream::unfold(chunk_rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });

        Ok(RemoteSource {
            name,
            size,
            body: Box::pin(body),
        })
    }
}

fn connect(target: &FtpTarget, timeout: Duration) -> Result<FtpStream, TransportError> {
    let mut last_err = None;
    for addr in target.address().to_socket_addrs()? {
        match FtpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(match last_err {
        Some(e) => TransportError::Ftp(e),
        None => TransportError::InvalidFtpUrl(format!("无法解析主机: {}", target.host)),
    })
}

fn login(target: &FtpTarget, timeout: Duration) -> Result<FtpStream, TransportError> {
    let mut ftp = connect(target, timeout)?;
    ftp.login(target.user.as_str(), target.password.as_str())?;
    ftp.transfer_type(FileType::Binary)?;
    Ok(ftp)
}

/// 在阻塞线程中完成登录、取文件，并把数据块推给异步端
fn retrieve(
    target: FtpTarget,
    timeout: Duration,
    opened: oneshot::Sender<Result<Option<u64>, TransportError>>,
    chunks: mpsc::Sender<io::Result<Bytes>>,
) {
    let mut ftp = match login(&target, timeout) {
        Ok(ftp) => ftp,
        Err(e) => {
            let _ = opened.send(Err(e));
            return;
        }
    };

    // 不支持 SIZE 的服务器按未知大小处理
    let size = ftp
        .size(target.path.as_str())
        .ok()
        .map(|s| s as u64)
        .filter(|&s| s > 0);

    let mut data = match ftp.retr_as_stream(target.path.as_str()) {
        Ok(data) => data,
        Err(e) => {
            let _ = opened.send(Err(e.into()));
            let _ = ftp.quit();
            return;
        }
    };
    if opened.send(Ok(size)).is_err() {
        return;
    }

    let mut buf = vec![0u8; READ_BUF];
    loop {
        match data.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if chunks
                    .blocking_send(Ok(Bytes::copy_from_slice(&buf[..n])))
                    .is_err()
                {
                    return;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = chunks.blocking_send(Err(e));
                return;
            }
        }
    }

    if let Err(e) = ftp.finalize_retr_stream(data) {
        warn!("FTP 传输收尾失败: {}", e);
        let _ = chunks.blocking_send(Err(io::Error::other(e)));
        return;
    }
    let _ = ftp.quit();
}
