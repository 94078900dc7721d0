//! 并发批量下载：固定大小的 worker 池执行 HTTP/FTP 传输，
//! 每个资源通过容量为 1 的信箱上报进度，由调用方所在任务汇总并原地刷新终端。
//!
//! ```no_run
//! use fetchpool::{DownloadConfig, Downloader};
//!
//! # async fn run() {
//! let config = DownloadConfig::default()
//!     .with_output_dir("./downloads")
//!     .with_max_concurrency(4);
//! let results = Downloader::new(config)
//!     .download(&["https://example.com/a.bin", "ftp://ftp.example.com/pub/b.iso"])
//!     .await;
//! for r in &results {
//!     println!("{} -> {:?}", r.url, r.path);
//! }
//! # }
//! ```

pub mod common;
pub mod downloader;
pub mod source;

pub use downloader::error::{DownloadError, Protocol, TransportError};
pub use downloader::models::{BatchResult, TaskStatus};
pub use downloader::{DownloadConfig, Downloader};
