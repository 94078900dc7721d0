#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;

use fetchpool::DownloadError;
use fetchpool::source::{RemoteSource, Scheme, SourceOpener};

/// 内存中的远端资源
#[derive(Clone, Default)]
pub struct FakeBody {
    pub name: Option<String>,
    pub declared: Option<u64>,
    pub data: Vec<u8>,
    pub delay: Duration,
    /// 发送完 data 后返回一个读错误
    pub fail_mid_stream: bool,
    /// open 时直接 panic
    pub panics: bool,
}

impl FakeBody {
    pub fn named(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: Some(name.to_string()),
            declared: Some(data.len() as u64),
            data,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// 记录调用次数和最大并发的假数据源
#[derive(Default)]
pub struct FakeOpener {
    bodies: HashMap<String, FakeBody>,
    fallback: Option<FakeBody>,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: FakeBody) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    /// 没有单独配置的 URL 都返回这个
    pub fn with_fallback(mut self, body: FakeBody) -> Self {
        self.fallback = Some(body);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceOpener for FakeOpener {
    async fn open(&self, _scheme: Scheme, url: &str) -> Result<RemoteSource, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let body = self
            .bodies
            .get(url)
            .or(self.fallback.as_ref())
            .cloned()
            .unwrap_or_default();
        tokio::time::sleep(body.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        if body.panics {
            panic!("fake source blew up on {}", url);
        }

        let mut chunks: Vec<io::Result<Bytes>> = body
            .data
            .chunks(16)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        if body.fail_mid_stream {
            chunks.push(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }

        Ok(RemoteSource {
            name: body.name,
            size: body.declared,
            body: Box::pin(stream::iter(chunks)),
        })
    }
}

/// 可以在测试中读取内容的输出
#[derive(Clone, Default)]
pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn take(&self) -> String {
        let mut buf = self.0.lock().unwrap();
        let out = String::from_utf8_lossy(&buf).into_owned();
        buf.clear();
        out
    }
}

impl Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
