use std::io;
use std::time::Duration;

use futures::TryStreamExt;
use reqwest::{
    Client, ClientBuilder, Response, Url,
    header::{CONTENT_DISPOSITION, HeaderValue, USER_AGENT},
};
use tracing::{debug, error, warn};

use super::{RemoteSource, sanitize_name};
use crate::downloader::error::{DownloadError, TransportError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct HttpSource {
    inner: Client,
}

impl HttpSource {
    pub fn new() -> Self {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("fetchpool/", env!("CARGO_PKG_VERSION"))),
        );

        let inner = match ClientBuilder::new()
            .connect_timeout(CONNECT_TIMEOUT)
            .default_headers(headers)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                // TLS 后端初始化失败时退回默认客户端
                error!("创建HTTP客户端失败: {}", e);
                Client::new()
            }
        };

        Self { inner }
    }

    pub fn with_client(inner: Client) -> Self {
        Self { inner }
    }

    pub async fn open(&self, url: &str) -> Result<RemoteSource, DownloadError> {
        let mut target = Url::parse(url).map_err(|_| DownloadError::Scheme(url.to_string()))?;

        // URL 中带的账号密码转成 Basic 认证头
        let credentials = if target.username().is_empty() {
            None
        } else {
            let user = decode(target.username());
            let password = target.password().map(decode);
            let _ = target.set_username("");
            let _ = target.set_password(None);
            Some((user, password))
        };

        let mut request = self.inner.get(target);
        if let Some((user, password)) = credentials {
            request = request.basic_auth(user, password);
        }

        let response = request.send().await.map_err(DownloadError::http)?;
        check_response_status(&response, url)?;

        let name = filename_from_response(&response);
        let size = response.content_length().filter(|&len| len > 0);
        debug!("HTTP 源已打开: {}, 名称: {:?}, 大小: {:?}", url, name, size);

        let body = response.bytes_stream().map_err(io::Error::other);

        Ok(RemoteSource {
            name,
            size,
            body: Box::pin(body),
        })
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

// 非 2xx 不保存响应体
fn check_response_status(response: &Response, url: &str) -> Result<(), DownloadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    warn!("非成功状态码: {}, URL: {}", status, url);
    Err(DownloadError::http(TransportError::HttpStatus(status.as_u16())))
}

/// Content-Disposition 的 filename，其次是最终 URL 的路径末段
fn filename_from_response(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_disposition)
        .and_then(|name| sanitize_name(&name))
        .or_else(|| {
            response
                .url()
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .and_then(|last| sanitize_name(&decode(last)))
        })
}

/// 支持 `filename="a.bin"`, `filename=a.bin`, `filename*=UTF-8''a%20b.bin`
pub fn parse_content_disposition(value: &str) -> Option<String> {
    let lower = value.to_ascii_lowercase();

    if let Some(i) = lower.find("filename*=") {
        let raw = value[i + "filename*=".len()..].trim();
        let raw = raw.split(';').next().unwrap_or(raw).trim().trim_matches('"');
        let encoded = match raw.find("''") {
            Some(pos) => &raw[pos + 2..],
            None => raw,
        };
        if let Ok(decoded) = urlencoding::decode(encoded) {
            let name = decoded.trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }

    if let Some(i) = lower.find("filename=") {
        let raw = value[i + "filename=".len()..].trim();
        let raw = raw.split(';').next().unwrap_or(raw).trim();
        let name = raw.trim_matches('"').trim_matches('\'').trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_forms() {
        assert_eq!(
            parse_content_disposition("attachment; filename=\"report.pdf\"").as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            parse_content_disposition("attachment; filename=data.csv; size=3").as_deref(),
            Some("data.csv")
        );
        assert_eq!(
            parse_content_disposition("attachment; filename*=UTF-8''na%C3%AFve%20file.txt")
                .as_deref(),
            Some("naïve file.txt")
        );
        assert_eq!(parse_content_disposition("inline"), None);
        assert_eq!(parse_content_disposition("attachment; filename=\"\""), None);
    }
}
