use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::error::DownloadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Starting,
    Downloading,
    Complete,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Error)
    }
}

/// worker 发给汇总循环的状态消息
///
/// `name` 和 `start` 为 `None` 时表示"不更新"，其余字段总是覆盖。
#[derive(Debug, Default)]
pub struct StatusUpdate {
    pub name: Option<String>,
    pub size: Option<u64>,
    pub written: u64,
    pub start: Option<DateTime<Local>>,
    pub status: TaskStatus,
    pub error: Option<DownloadError>,
}

impl StatusUpdate {
    pub fn failed(error: DownloadError) -> Self {
        Self {
            status: TaskStatus::Error,
            error: Some(error),
            ..Default::default()
        }
    }
}

/// 单个资源的权威状态，只由汇总循环修改
#[derive(Debug)]
pub struct ResourceRecord {
    pub url: String,
    pub output_dir: PathBuf,
    pub name: String,
    pub size: Option<u64>,
    pub written: u64,
    pub status: TaskStatus,
    pub start: Option<DateTime<Local>>,
    pub end: Option<DateTime<Local>>,
    pub error: Option<DownloadError>,
}

impl ResourceRecord {
    pub fn new(url: impl Into<String>, output_dir: impl AsRef<Path>) -> Self {
        Self {
            url: url.into(),
            output_dir: output_dir.as_ref().to_path_buf(),
            name: String::new(),
            size: None,
            written: 0,
            status: TaskStatus::Starting,
            start: None,
            end: None,
            error: None,
        }
    }

    /// 合并一条状态消息；终态之后的消息直接丢弃
    pub fn apply(&mut self, update: StatusUpdate) {
        if self.status.is_terminal() {
            return;
        }

        self.size = update.size;
        self.written = update.written;
        if let Some(name) = update.name.filter(|n| !n.is_empty()) {
            self.name = name;
        }
        if self.start.is_none() {
            self.start = update.start;
        }
        self.status = update.status;
        self.error = update.error;

        if self.status.is_terminal() {
            self.end = Some(Local::now());
        }
    }

    /// 名称列宽，按字符计算
    pub fn name_width(&self) -> usize {
        self.name.chars().count()
    }

    pub fn into_result(self) -> BatchResult {
        let path = if !self.name.is_empty() && self.error.is_none() {
            Some(self.output_dir.join(&self.name))
        } else {
            None
        };

        BatchResult {
            url: self.url,
            name: self.name,
            path,
            size: self.size.unwrap_or(0),
            start: self.start,
            end: self.end,
            error: self.error,
        }
    }
}

/// 批量下载返回给调用方的结果，与输入顺序一一对应
#[derive(Debug)]
pub struct BatchResult {
    pub url: String,
    pub name: String,
    /// 失败时为 `None`，不会返回写了一半的文件
    pub path: Option<PathBuf>,
    pub size: u64,
    pub start: Option<DateTime<Local>>,
    pub end: Option<DateTime<Local>>,
    pub error: Option<DownloadError>,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.path.is_some()
    }
}
