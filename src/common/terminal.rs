use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crossterm::{
    cursor::MoveUp,
    queue,
    terminal::{self, Clear, ClearType},
};

/// 终端几何信息，拿不到宽度时返回 `None`
pub trait TerminalGeometry: Send + Sync {
    fn width(&self) -> Option<u16>;
}

/// 通过 crossterm 查询当前终端
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermGeometry;

impl TerminalGeometry for CrosstermGeometry {
    fn width(&self) -> Option<u16> {
        terminal::size().ok().map(|(cols, _)| cols).filter(|&c| c > 0)
    }
}

/// 固定宽度，`FixedGeometry(None)` 相当于没有终端
#[derive(Debug, Clone, Copy)]
pub struct FixedGeometry(pub Option<u16>);

impl TerminalGeometry for FixedGeometry {
    fn width(&self) -> Option<u16> {
        self.0.filter(|&w| w > 0)
    }
}

/// 多个渲染方共享的输出
pub type SharedSink = Arc<Mutex<Box<dyn Write + Send>>>;

pub fn shared_sink(out: impl Write + Send + 'static) -> SharedSink {
    Arc::new(Mutex::new(Box::new(out)))
}

/// 一行文本在给定宽度下占用的终端行数
pub fn rows_for_line(line: &str, width: u16) -> usize {
    1 + line.chars().count() / width as usize
}

/// 整帧占用的行数；宽度未知时为 0，下一次就不清屏
pub fn rows_for_frame(frame: &str, width: Option<u16>) -> usize {
    match width {
        Some(w) if w > 0 => frame.lines().map(|line| rows_for_line(line, w)).sum(),
        _ => 0,
    }
}

/// 原地刷新的帧输出
///
/// 每次 `flush_frame` 先清掉上一帧占用的行，再把整帧一次性写入输出。
/// 清屏序列和新帧拼在同一个缓冲区里，持锁写入，外部看不到半帧。
pub struct FrameWriter {
    sink: SharedSink,
    geometry: Arc<dyn TerminalGeometry>,
    last_rows: usize,
}

impl FrameWriter {
    pub fn new(sink: SharedSink, geometry: Arc<dyn TerminalGeometry>) -> Self {
        Self {
            sink,
            geometry,
            last_rows: 0,
        }
    }

    pub fn last_rows(&self) -> usize {
        self.last_rows
    }

    pub fn flush_frame(&mut self, frame: &str) -> io::Result<()> {
        let mut buf: Vec<u8> = Vec::with_capacity(frame.len() + self.last_rows * 8);
        for _ in 0..self.last_rows {
            queue!(buf, MoveUp(1), Clear(ClearType::CurrentLine))?;
        }
        buf.extend_from_slice(frame.as_bytes());

        self.last_rows = rows_for_frame(frame, self.geometry.width());

        let mut out = self
            .sink
            .lock()
            .map_err(|_| io::Error::other("输出锁已损坏"))?;
        out.write_all(&buf)?;
        out.flush()
    }
}
