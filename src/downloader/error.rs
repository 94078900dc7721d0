use std::fmt;
use std::io;

use thiserror::Error;

/// 单个资源的最终错误，所有错误都是终态，只影响对应资源
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("无法识别的URL协议: {0}")]
    Scheme(String),

    #[error("无法获取{protocol}源: {source}")]
    Source {
        protocol: Protocol,
        #[source]
        source: TransportError,
    },

    #[error("无法创建本地文件: {0}")]
    LocalIo(#[source] io::Error),

    #[error("传输中断: {0}")]
    Transfer(#[source] io::Error),

    #[error("下载后文件大小不一致: 声明 {expected} 字节, 实际 {actual} 字节")]
    SizeMismatch { expected: u64, actual: u64 },

    /// worker 没有发出终态消息就退出了（例如数据源 panic）
    #[error("下载任务意外中止")]
    Interrupted,
}

impl DownloadError {
    pub fn http(source: impl Into<TransportError>) -> Self {
        DownloadError::Source {
            protocol: Protocol::Http,
            source: source.into(),
        }
    }

    pub fn ftp(source: impl Into<TransportError>) -> Self {
        DownloadError::Source {
            protocol: Protocol::Ftp,
            source: source.into(),
        }
    }
}

/// 底层传输库的错误
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP错误: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP 请求失败，状态码: {0}")]
    HttpStatus(u16),

    #[error("FTP错误: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("无效的FTP地址: {0}")]
    InvalidFtpUrl(String),

    #[error("IO错误: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Ftp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "http"),
            Protocol::Ftp => write!(f, "ftp"),
        }
    }
}
