use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

use super::core::{DownloadCore, Job};

/// 根据并发配置计算 worker 数
///
/// 负数表示不限制（每个资源一个 worker），0 表示串行，正数即上限。
/// 超过资源数的 worker 永远拿不到任务，所以正数也不超过资源数。
pub fn worker_count(max_concurrency: i64, total: usize) -> usize {
    match max_concurrency {
        c if c < 0 => total,
        0 => 1,
        c => usize::try_from(c).unwrap_or(usize::MAX).min(total),
    }
}

/// 固定大小的 worker 池，从共享队列中取任务
pub struct DownloadManager {
    core: Arc<DownloadCore>,
    workers: usize,
}

impl DownloadManager {
    pub fn new(core: Arc<DownloadCore>, workers: usize) -> Self {
        Self { core, workers }
    }

    /// 启动 worker 和投递任务的 feeder，立即返回
    ///
    /// 队列容量等于任务数，feeder 投递完后关闭队列，worker 取空后各自退出。
    pub fn dispatch(&self, jobs: Vec<Job>) -> Vec<JoinHandle<()>> {
        if jobs.is_empty() {
            return Vec::new();
        }

        let (queue_tx, queue_rx) = mpsc::channel::<Job>(jobs.len());
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let mut handles = Vec::with_capacity(self.workers + 1);
        for id in 0..self.workers {
            let queue = Arc::clone(&queue_rx);
            let core = Arc::clone(&self.core);
            handles.push(tokio::spawn(async move {
                loop {
                    // 锁只在取任务期间持有
                    let job = queue.lock().await.recv().await;
                    match job {
                        Some(job) => core.run(job).await,
                        None => break,
                    }
                }
                debug!("worker {} 退出", id);
            }));
        }

        handles.push(tokio::spawn(async move {
            for job in jobs {
                if queue_tx.send(job).await.is_err() {
                    break;
                }
            }
            // queue_tx 在这里被 drop，队列关闭
        }));

        handles
    }
}
