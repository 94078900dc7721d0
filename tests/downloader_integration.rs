mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use fetchpool::common::terminal::{FixedGeometry, shared_sink};
use fetchpool::downloader::naming::{NameGenerator, RandomNames};
use fetchpool::{DownloadConfig, DownloadError, Downloader};

use common::{FakeBody, FakeOpener, SharedBuf};

fn silent_config(dir: &std::path::Path) -> DownloadConfig {
    DownloadConfig::default()
        .with_output_dir(dir)
        .with_silent(true)
        .with_refresh_interval(Duration::from_millis(5))
}

fn downloader(config: DownloadConfig, opener: Arc<FakeOpener>) -> Downloader {
    Downloader::with_parts(
        config,
        opener,
        Arc::new(RandomNames::seeded(42)),
        Arc::new(FixedGeometry(Some(80))),
        shared_sink(std::io::sink()),
    )
}

fn urls(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("http://files.test/item{}.bin", i))
        .collect()
}

fn slow_opener() -> Arc<FakeOpener> {
    Arc::new(FakeOpener::new().with_fallback(
        FakeBody {
            name: None,
            declared: None,
            data: vec![1u8; 64],
            ..Default::default()
        }
        .with_delay(Duration::from_millis(60)),
    ))
}

#[tokio::test]
async fn test_negative_concurrency_runs_everything_at_once() {
    let dir = tempfile::tempdir().unwrap();
    let opener = slow_opener();
    let dl = downloader(silent_config(dir.path()).with_max_concurrency(-1), opener.clone());

    let results = dl.download(&urls(5)).await;

    assert_eq!(results.len(), 5);
    assert_eq!(opener.peak(), 5);
}

#[tokio::test]
async fn test_zero_concurrency_is_serial() {
    let dir = tempfile::tempdir().unwrap();
    let opener = slow_opener();
    let dl = downloader(silent_config(dir.path()).with_max_concurrency(0), opener.clone());

    let results = dl.download(&urls(4)).await;

    assert_eq!(results.len(), 4);
    assert_eq!(opener.peak(), 1);
    assert_eq!(opener.calls(), 4);
}

#[tokio::test]
async fn test_positive_concurrency_is_a_ceiling() {
    for limit in [1usize, 2, 3] {
        let dir = tempfile::tempdir().unwrap();
        let opener = slow_opener();
        let dl = downloader(
            silent_config(dir.path()).with_max_concurrency(limit as i64),
            opener.clone(),
        );

        let results = dl.download(&urls(6)).await;

        assert_eq!(results.len(), 6);
        assert!(opener.peak() <= limit, "limit {} peak {}", limit, opener.peak());
        assert_eq!(opener.peak(), limit);
    }
}

#[tokio::test]
async fn test_huge_concurrency_is_bounded_by_batch_size() {
    let dir = tempfile::tempdir().unwrap();
    let opener = slow_opener();
    let dl = downloader(
        silent_config(dir.path()).with_max_concurrency(i64::MAX),
        opener.clone(),
    );

    let results = tokio::time::timeout(Duration::from_secs(10), dl.download(&urls(3)))
        .await
        .expect("batch should start and finish");

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.is_success()));
    assert_eq!(opener.peak(), 3);
}

#[tokio::test]
async fn test_unknown_scheme_never_touches_network() {
    let dir = tempfile::tempdir().unwrap();
    let opener = Arc::new(FakeOpener::new());
    let dl = downloader(silent_config(dir.path()).with_max_concurrency(-1), opener.clone());

    let results = dl.download(&["notaurl", "ftp2://x"]).await;

    assert_eq!(results.len(), 2);
    for r in &results {
        assert!(matches!(r.error, Some(DownloadError::Scheme(_))));
        assert!(r.path.is_none());
        assert!(!r.is_success());
        assert!(r.end.is_some());
    }
    assert_eq!(opener.calls(), 0);
}

#[tokio::test]
async fn test_size_mismatch_keeps_partial_file_but_no_path() {
    let dir = tempfile::tempdir().unwrap();
    let url = "http://files.test/short.bin";
    let opener = Arc::new(FakeOpener::new().with(
        url,
        FakeBody {
            name: Some("short.bin".to_string()),
            declared: Some(100),
            data: vec![7u8; 50],
            ..Default::default()
        },
    ));
    let dl = downloader(silent_config(dir.path()), opener);

    let results = dl.download(&[url]).await;

    let r = &results[0];
    assert!(matches!(
        r.error,
        Some(DownloadError::SizeMismatch {
            expected: 100,
            actual: 50
        })
    ));
    assert!(r.path.is_none());
    assert_eq!(r.name, "short.bin");
    let on_disk = std::fs::metadata(dir.path().join("short.bin")).unwrap();
    assert_eq!(on_disk.len(), 50);
}

#[tokio::test]
async fn test_results_follow_input_order_with_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let opener = Arc::new(
        FakeOpener::new()
            .with(
                "http://files.test/slow",
                FakeBody::named("slow.bin", vec![1; 32]).with_delay(Duration::from_millis(80)),
            )
            .with(
                "http://files.test/fast",
                FakeBody::named("fast.bin", vec![2; 48]),
            ),
    );
    let dl = downloader(silent_config(dir.path()).with_max_concurrency(-1), opener);
    let input = [
        "http://files.test/slow",
        "http://files.test/fast",
        "bogus",
        "http://files.test/fast",
        "http://files.test/slow",
    ];

    let results = dl.download(&input).await;

    assert_eq!(results.len(), input.len());
    for (r, url) in results.iter().zip(input.iter()) {
        assert_eq!(&r.url, url);
    }
    assert_eq!(results[0].name, "slow.bin");
    assert_eq!(results[1].size, 48);
    assert!(results[2].error.is_some());
    assert!(results[3].is_success());
    assert_eq!(results[4].path, Some(dir.path().join("slow.bin")));
}

#[tokio::test]
async fn test_unknown_size_adopts_bytes_written() {
    let dir = tempfile::tempdir().unwrap();
    let url = "http://files.test/stream";
    let opener = Arc::new(FakeOpener::new().with(
        url,
        FakeBody {
            name: Some("stream.dat".to_string()),
            declared: None,
            data: vec![9u8; 100],
            ..Default::default()
        },
    ));
    let dl = downloader(silent_config(dir.path()), opener);

    let results = dl.download(&[url]).await;

    let r = &results[0];
    assert!(r.error.is_none());
    assert_eq!(r.size, 100);
    assert_eq!(r.path, Some(dir.path().join("stream.dat")));
    assert!(r.start.is_some());
    assert!(r.end >= r.start);
    assert_eq!(std::fs::read(dir.path().join("stream.dat")).unwrap(), vec![9u8; 100]);
}

#[tokio::test]
async fn test_mid_stream_failure_is_transfer_error() {
    let dir = tempfile::tempdir().unwrap();
    let url = "http://files.test/broken";
    let opener = Arc::new(FakeOpener::new().with(
        url,
        FakeBody {
            name: Some("broken.bin".to_string()),
            declared: Some(1000),
            data: vec![0u8; 40],
            fail_mid_stream: true,
            ..Default::default()
        },
    ));
    let dl = downloader(silent_config(dir.path()), opener);

    let results = dl.download(&[url]).await;

    assert!(matches!(results[0].error, Some(DownloadError::Transfer(_))));
    assert!(results[0].path.is_none());
}

#[tokio::test]
async fn test_creation_failure_falls_back_to_generated_name_once() {
    let dir = tempfile::tempdir().unwrap();
    let url = "http://files.test/nested";
    let opener = Arc::new(FakeOpener::new().with(
        url,
        FakeBody::named("no_such_dir/file.bin", vec![5u8; 20]),
    ));
    let dl = downloader(silent_config(dir.path()), opener);

    let results = dl.download(&[url]).await;

    let expected = RandomNames::seeded(42).generate();
    let r = &results[0];
    assert!(r.error.is_none(), "{:?}", r.error);
    assert_eq!(r.name, expected);
    assert_eq!(r.path, Some(dir.path().join(&expected)));
    assert_eq!(std::fs::read(dir.path().join(&expected)).unwrap().len(), 20);
}

#[tokio::test]
async fn test_second_creation_failure_is_local_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("does-not-exist");
    let url = "http://files.test/a.bin";
    let opener = Arc::new(FakeOpener::new().with(url, FakeBody::named("a.bin", vec![1; 8])));
    let dl = downloader(silent_config(&missing), opener);

    let results = dl.download(&[url]).await;

    assert!(matches!(results[0].error, Some(DownloadError::LocalIo(_))));
    assert!(results[0].path.is_none());
}

#[tokio::test]
async fn test_missing_name_uses_generated_name() {
    let dir = tempfile::tempdir().unwrap();
    let url = "http://files.test/";
    let opener = Arc::new(FakeOpener::new().with(
        url,
        FakeBody {
            name: None,
            declared: Some(3),
            data: vec![1, 2, 3],
            ..Default::default()
        },
    ));
    let dl = downloader(silent_config(dir.path()), opener);

    let results = dl.download(&[url]).await;

    assert_eq!(results[0].name, RandomNames::seeded(42).generate());
    assert!(results[0].is_success());
}

#[tokio::test]
async fn test_empty_batch_returns_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let opener = Arc::new(FakeOpener::new());
    let dl = downloader(silent_config(dir.path()), opener.clone());

    let empty: [&str; 0] = [];
    let results = dl.download(&empty).await;

    assert!(results.is_empty());
    assert_eq!(opener.calls(), 0);
}

#[tokio::test]
async fn test_rendered_frames_show_final_state() {
    let dir = tempfile::tempdir().unwrap();
    let out = SharedBuf::default();
    let opener = Arc::new(
        FakeOpener::new().with("http://files.test/ok", FakeBody::named("ok.bin", vec![1; 64])),
    );
    let dl = Downloader::with_parts(
        DownloadConfig::default()
            .with_output_dir(dir.path())
            .with_refresh_interval(Duration::from_millis(5)),
        opener,
        Arc::new(RandomNames::seeded(1)),
        Arc::new(FixedGeometry(Some(80))),
        shared_sink(out.clone()),
    );

    let results = dl.download(&["http://files.test/ok", "nope"]).await;
    assert_eq!(results.len(), 2);

    let printed = out.take();
    assert!(printed.contains("ok.bin:"));
    assert!(printed.contains("Download complete [in "));
    assert!(printed.contains("nope: error - "));
    // 第二帧起都会先清掉上一帧的两行
    assert!(printed.contains("\x1b[1A\x1b[2K\x1b[1A\x1b[2K"));
}

#[tokio::test]
async fn test_silent_mode_prints_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let out = SharedBuf::default();
    let opener = Arc::new(FakeOpener::new().with_fallback(FakeBody::named("x.bin", vec![1; 4])));
    let dl = Downloader::with_parts(
        silent_config(dir.path()),
        opener,
        Arc::new(RandomNames::seeded(1)),
        Arc::new(FixedGeometry(Some(80))),
        shared_sink(out.clone()),
    );

    let results = dl.download(&["http://files.test/x"]).await;

    assert!(results[0].is_success());
    assert!(out.take().is_empty());
}

#[tokio::test]
async fn test_slow_consumer_drops_progress_but_gets_final_state() {
    let dir = tempfile::tempdir().unwrap();
    let out = SharedBuf::default();
    let url = "http://files.test/many-chunks.bin";
    // 10000 个 16 字节的块
    let data = vec![3u8; 16 * 10_000];
    let opener = Arc::new(FakeOpener::new().with(url, FakeBody::named("many.bin", data.clone())));
    let dl = Downloader::with_parts(
        DownloadConfig::default()
            .with_output_dir(dir.path())
            .with_refresh_interval(Duration::from_millis(200)),
        opener,
        Arc::new(RandomNames::seeded(1)),
        Arc::new(FixedGeometry(None)),
        shared_sink(out.clone()),
    );

    let started = Instant::now();
    let results = dl.download(&[url]).await;
    let elapsed = started.elapsed();

    let r = &results[0];
    assert!(r.error.is_none(), "{:?}", r.error);
    assert_eq!(r.size, data.len() as u64);
    assert_eq!(std::fs::read(dir.path().join("many.bin")).unwrap(), data);
    assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);

    // 没有终端几何信息时不清屏，每帧正好一行
    let printed = out.take();
    let frames: Vec<&str> = printed.lines().collect();
    assert!(frames.len() < 20, "{} frames for 10000 chunks", frames.len());
    assert!(frames.last().unwrap().contains("Download complete [in "));
}

#[tokio::test]
async fn test_panicking_source_fails_only_its_resource() {
    let dir = tempfile::tempdir().unwrap();
    let opener = Arc::new(
        FakeOpener::new()
            .with(
                "http://files.test/boom",
                FakeBody {
                    name: Some("boom.bin".to_string()),
                    panics: true,
                    ..Default::default()
                },
            )
            .with("http://files.test/fine", FakeBody::named("fine.bin", vec![4; 32])),
    );
    let dl = downloader(silent_config(dir.path()).with_max_concurrency(-1), opener);

    let results = dl.download(&["http://files.test/boom", "http://files.test/fine"]).await;

    assert!(matches!(results[0].error, Some(DownloadError::Interrupted)));
    assert!(results[0].path.is_none());
    assert!(results[0].end.is_some());
    assert!(results[1].is_success());
}
