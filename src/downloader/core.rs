use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::error::DownloadError;
use super::models::{StatusUpdate, TaskStatus};
use super::naming::NameGenerator;
use crate::source::{ByteStream, Scheme, SourceOpener};

/// 单个资源的信箱，容量为 1，只有一个 worker 写
pub type Mailbox = mpsc::Sender<StatusUpdate>;

/// 工作队列中的一项
pub struct Job {
    pub url: String,
    pub mailbox: Mailbox,
}

/// 所有 worker 共享的只读依赖
pub struct DownloadCore {
    opener: Arc<dyn SourceOpener>,
    namer: Arc<dyn NameGenerator>,
    output_dir: PathBuf,
}

impl DownloadCore {
    pub fn new(
        opener: Arc<dyn SourceOpener>,
        namer: Arc<dyn NameGenerator>,
        output_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            opener,
            namer,
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// 下载一个资源，最后必定发送一条终态消息并关闭信箱
    pub async fn run(&self, job: Job) {
        let Job { url, mailbox } = job;
        debug!("开始下载任务: {}", url);

        let mut snapshot = Snapshot::default();
        let last = match self.transfer(&url, &mailbox, &mut snapshot).await {
            Ok(()) => {
                debug!("✅ 下载任务完成: {}", url);
                snapshot.into_update(TaskStatus::Complete, None)
            }
            Err(e) => {
                debug!("❌ 下载任务失败: {}, 错误: {}", url, e);
                snapshot.into_update(TaskStatus::Error, Some(e))
            }
        };

        // 终态消息必须送达，汇总循环只能靠它结束
        if mailbox.send(last).await.is_err() {
            warn!("信箱已被关闭，终态消息丢失: {}", url);
        }
        // 此处 mailbox 被 drop，接收端随后看到通道关闭
    }

    async fn transfer(
        &self,
        url: &str,
        mailbox: &Mailbox,
        snapshot: &mut Snapshot,
    ) -> Result<(), DownloadError> {
        let scheme = Scheme::classify(url);
        if scheme == Scheme::Unknown {
            return Err(DownloadError::Scheme(url.to_string()));
        }

        let source = self.opener.open(scheme, url).await?;
        snapshot.size = source.size;
        let suggested = source.name.unwrap_or_else(|| self.namer.generate());

        let (name, mut file) = self.create_output(suggested).await?;
        snapshot.name = Some(name);
        snapshot.start = Some(Local::now());

        let copied = copy(source.body, &mut file, mailbox, snapshot).await;
        // 出错时也先落盘，已写入的字节留在磁盘上
        let flushed = file.flush().await;
        copied?;
        flushed.map_err(DownloadError::Transfer)?;

        match snapshot.size {
            Some(expected) if expected != snapshot.written => Err(DownloadError::SizeMismatch {
                expected,
                actual: snapshot.written,
            }),
            _ => {
                snapshot.size = Some(snapshot.written);
                Ok(())
            }
        }
    }

    /// 用建议的名称创建文件，失败后换一个随机名称再试一次
    async fn create_output(&self, suggested: String) -> Result<(String, File), DownloadError> {
        match File::create(self.output_dir.join(&suggested)).await {
            Ok(file) => Ok((suggested, file)),
            Err(e) => {
                let fallback = self.namer.generate();
                warn!(
                    "无法创建文件 {}: {}，改用名称 {}",
                    suggested, e, fallback
                );
                let file = File::create(self.output_dir.join(&fallback))
                    .await
                    .map_err(DownloadError::LocalIo)?;
                Ok((fallback, file))
            }
        }
    }
}

/// worker 自己知道的资源状态
#[derive(Debug, Default)]
struct Snapshot {
    name: Option<String>,
    size: Option<u64>,
    written: u64,
    start: Option<DateTime<Local>>,
}

impl Snapshot {
    fn to_update(&self, status: TaskStatus) -> StatusUpdate {
        StatusUpdate {
            name: self.name.clone(),
            size: self.size,
            written: self.written,
            start: self.start,
            status,
            error: None,
        }
    }

    fn into_update(self, status: TaskStatus, error: Option<DownloadError>) -> StatusUpdate {
        StatusUpdate {
            name: self.name,
            size: self.size,
            written: self.written,
            start: self.start,
            status,
            error,
        }
    }
}

async fn copy(
    mut body: ByteStream,
    file: &mut File,
    mailbox: &Mailbox,
    snapshot: &mut Snapshot,
) -> Result<(), DownloadError> {
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(DownloadError::Transfer)?;
        file.write_all(&chunk)
            .await
            .map_err(DownloadError::Transfer)?;
        snapshot.written += chunk.len() as u64;

        // 进度消息尽力而为，信箱满了就丢掉这一条
        match mailbox.try_send(snapshot.to_update(TaskStatus::Downloading)) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Closed(_)) => debug!("信箱已关闭，忽略进度"),
        }
    }
    Ok(())
}
