use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver, error::TryRecvError};
use tokio::time::Duration;
use tracing::{info, warn};

use crate::common::terminal::{CrosstermGeometry, SharedSink, TerminalGeometry, shared_sink};
use crate::source::{DefaultOpener, SourceOpener};

use self::core::{DownloadCore, Job};
use self::error::DownloadError;
use self::manager::{DownloadManager, worker_count};
use self::models::{BatchResult, ResourceRecord, StatusUpdate};
use self::naming::{NameGenerator, RandomNames};
use self::progress::ProgressRenderer;

pub mod core;
pub mod error;
pub mod manager;
pub mod models;
pub mod naming;
pub mod progress;

/// 默认刷新间隔
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
    pub silent: bool,
    /// 负数不限制，0 串行，正数为最大并发
    pub max_concurrency: i64,
    pub refresh_interval: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            silent: false,
            max_concurrency: 0,
            refresh_interval: DEFAULT_REFRESH,
        }
    }
}

impl DownloadConfig {
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_max_concurrency(mut self, max: i64) -> Self {
        self.max_concurrency = max.max(-1);
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

/// 批量下载入口
pub struct Downloader {
    config: DownloadConfig,
    opener: Arc<dyn SourceOpener>,
    namer: Arc<dyn NameGenerator>,
    geometry: Arc<dyn TerminalGeometry>,
    sink: SharedSink,
}

impl Downloader {
    /// 真实的 HTTP/FTP、随机文件名、标准输出
    pub fn new(config: DownloadConfig) -> Self {
        Self::with_parts(
            config,
            Arc::new(DefaultOpener::new()),
            Arc::new(RandomNames::new()),
            Arc::new(CrosstermGeometry),
            shared_sink(std::io::stdout()),
        )
    }

    pub fn with_parts(
        config: DownloadConfig,
        opener: Arc<dyn SourceOpener>,
        namer: Arc<dyn NameGenerator>,
        geometry: Arc<dyn TerminalGeometry>,
        sink: SharedSink,
    ) -> Self {
        Self {
            config,
            opener,
            namer,
            geometry,
            sink,
        }
    }

    pub fn with_output(mut self, out: impl Write + Send + 'static) -> Self {
        self.sink = shared_sink(out);
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// 下载全部 URL，按输入顺序返回每个资源的结果
    pub async fn download<S: AsRef<str>>(&self, urls: &[S]) -> Vec<BatchResult> {
        let workers = worker_count(self.config.max_concurrency, urls.len());
        info!("开始批量下载: {} 个资源, {} 个 worker", urls.len(), workers);

        let mut aggregator = Aggregator::default();
        let mut jobs = Vec::with_capacity(urls.len());
        for url in urls {
            let url = url.as_ref();
            let (tx, rx) = mpsc::channel(1);
            aggregator.track(ResourceRecord::new(url, &self.config.output_dir), rx);
            jobs.push(Job {
                url: url.to_string(),
                mailbox: tx,
            });
        }

        let core = Arc::new(DownloadCore::new(
            Arc::clone(&self.opener),
            Arc::clone(&self.namer),
            &self.config.output_dir,
        ));
        // worker 不需要 join，信箱关闭就是完成信号
        let _handles = DownloadManager::new(core, workers).dispatch(jobs);

        let renderer = if self.config.silent {
            None
        } else {
            Some(ProgressRenderer::new(
                Arc::clone(&self.sink),
                Arc::clone(&self.geometry),
            ))
        };
        let records = aggregator
            .run(renderer, self.config.refresh_interval)
            .await;

        let results: Vec<BatchResult> = records
            .into_iter()
            .map(ResourceRecord::into_result)
            .collect();
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        info!("批量下载结束: 成功 {}, 失败 {}", results.len() - failed, failed);
        results
    }
}

/// 汇总循环：唯一修改资源记录的地方
#[derive(Default)]
struct Aggregator {
    records: Vec<ResourceRecord>,
    /// 与 records 一一对应，`None` 表示信箱已关闭
    mailboxes: Vec<Option<Receiver<StatusUpdate>>>,
    pad: usize,
}

impl Aggregator {
    fn track(&mut self, record: ResourceRecord, mailbox: Receiver<StatusUpdate>) {
        self.records.push(record);
        self.mailboxes.push(Some(mailbox));
    }

    /// 每个仍打开的信箱非阻塞地取一条消息，返回是否全部结束
    fn tick(&mut self) -> bool {
        for (record, slot) in self.records.iter_mut().zip(self.mailboxes.iter_mut()) {
            if let Some(rx) = slot {
                match rx.try_recv() {
                    Ok(update) => record.apply(update),
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        if !record.status.is_terminal() {
                            warn!("{} 的 worker 未报告结果就退出了", record.url);
                            record.apply(StatusUpdate::failed(DownloadError::Interrupted));
                        }
                        *slot = None;
                    }
                }
            }
            self.pad = self.pad.max(record.name_width());
        }
        self.mailboxes.iter().all(Option::is_none)
    }

    /// 固定间隔轮询，直到所有信箱关闭
    async fn run(
        mut self,
        mut renderer: Option<ProgressRenderer>,
        interval: Duration,
    ) -> Vec<ResourceRecord> {
        loop {
            let finished = self.tick();

            if let Some(renderer) = renderer.as_mut() {
                if let Err(e) = renderer.render(&self.records, self.pad) {
                    warn!("刷新进度失败: {}", e);
                }
            }

            if finished {
                break;
            }
            tokio::time::sleep(interval).await;
        }
        self.records
    }
}
