use std::fmt::Write as _;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::common::format::{format_bytes, format_duration, truncate};
use crate::common::terminal::{FrameWriter, SharedSink, TerminalGeometry};

use super::models::{ResourceRecord, TaskStatus};

/// URL 列的显示宽度
pub const URL_WIDTH: usize = 33;
/// 字节数列宽
const BYTES_WIDTH: usize = 8;

/// 把资源表画成一帧并原地刷新
pub struct ProgressRenderer {
    writer: FrameWriter,
}

impl ProgressRenderer {
    pub fn new(sink: SharedSink, geometry: Arc<dyn TerminalGeometry>) -> Self {
        Self {
            writer: FrameWriter::new(sink, geometry),
        }
    }

    pub fn render(&mut self, records: &[ResourceRecord], pad: usize) -> io::Result<()> {
        let frame = build_frame(records, pad, Local::now());
        self.writer.flush_frame(&frame)
    }

    /// 上一帧占用的终端行数
    pub fn last_rows(&self) -> usize {
        self.writer.last_rows()
    }
}

/// 按输入顺序每个资源一行
pub fn build_frame(records: &[ResourceRecord], pad: usize, now: DateTime<Local>) -> String {
    let mut frame = String::new();
    for record in records {
        frame.push_str(&format_line(record, pad, now));
        frame.push('\n');
    }
    frame
}

pub fn format_line(record: &ResourceRecord, pad: usize, now: DateTime<Local>) -> String {
    match record.status {
        TaskStatus::Starting => format!(
            "[{:>width$}] Waiting for download ",
            truncate(&record.url, URL_WIDTH),
            width = URL_WIDTH
        ),
        TaskStatus::Downloading => format_downloading(record, pad, now),
        TaskStatus::Complete => format_complete(record, pad),
        TaskStatus::Error => format_error(record),
    }
}

fn header(record: &ResourceRecord, pad: usize) -> String {
    format!(
        "[{:>url_w$}] {:<pad$}:",
        truncate(&record.url, URL_WIDTH),
        record.name,
        url_w = URL_WIDTH,
        pad = pad
    )
}

fn bytes_column(bytes: u64) -> String {
    format!("{:>width$}", format_bytes(bytes), width = BYTES_WIDTH)
}

fn elapsed_since(start: Option<DateTime<Local>>, now: DateTime<Local>) -> Duration {
    start
        .and_then(|s| (now - s).to_std().ok())
        .unwrap_or(Duration::ZERO)
}

fn format_downloading(record: &ResourceRecord, pad: usize, now: DateTime<Local>) -> String {
    let mut line = header(record, pad);
    let elapsed = elapsed_since(record.start, now);
    // String 的 fmt::Write 不会失败
    match record.size {
        Some(size) => {
            let _ = write!(
                line,
                " Downloading {} / {} [etr {}]",
                bytes_column(record.written),
                bytes_column(size),
                format_duration(remaining(elapsed, record.written, size))
            );
        }
        None => {
            let _ = write!(
                line,
                " Downloading {} [start {}]",
                bytes_column(record.written),
                format_duration(elapsed)
            );
        }
    }
    line
}

/// 预计剩余时间 = 已用时间 × 剩余字节 / 已写字节
pub fn remaining(elapsed: Duration, written: u64, size: u64) -> Duration {
    if written == 0 {
        return Duration::ZERO;
    }
    let left = size.saturating_sub(written) as f64;
    // 声明大小来自服务器，结果可能超出 Duration 的范围
    Duration::try_from_secs_f64(elapsed.as_secs_f64() * left / written as f64)
        .unwrap_or(Duration::MAX)
}

fn format_complete(record: &ResourceRecord, pad: usize) -> String {
    format!(
        "{} Download complete [in {}]",
        header(record, pad),
        format_duration(completion_time(record))
    )
}

/// 开始时间从未被观察到时显示 0
pub fn completion_time(record: &ResourceRecord) -> Duration {
    match (record.start, record.end) {
        (Some(start), Some(end)) => (end - start).to_std().unwrap_or(Duration::ZERO),
        _ => Duration::ZERO,
    }
}

fn format_error(record: &ResourceRecord) -> String {
    let who = if record.name.is_empty() {
        &record.url
    } else {
        &record.name
    };
    match &record.error {
        Some(err) => format!("{}: error - {}", who, err),
        None => format!("{}: error - unknown", who),
    }
}
