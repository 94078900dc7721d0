use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};

use fetchpool::common::logger::{PrettyLogger, init_tracing};
use fetchpool::{BatchResult, Downloader};

mod cli;

/// `--json` 输出的单项
#[derive(Debug, Serialize)]
struct ResultSummary<'a> {
    url: &'a str,
    name: &'a str,
    path: Option<String>,
    size: u64,
    start: Option<DateTime<Local>>,
    end: Option<DateTime<Local>>,
    error: Option<String>,
}

impl<'a> From<&'a BatchResult> for ResultSummary<'a> {
    fn from(r: &'a BatchResult) -> Self {
        Self {
            url: &r.url,
            name: &r.name,
            path: r.path.as_ref().map(|p| p.display().to_string()),
            size: r.size,
            start: r.start,
            end: r.end,
            error: r.error.as_ref().map(|e| e.to_string()),
        }
    }
}

/// 收集命令行和文件中的链接
async fn collect_urls(args: &cli::Cli) -> Result<Vec<String>> {
    let mut urls = args.urls.clone();
    if let Some(file) = &args.input_file {
        let text = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("读取链接文件失败: {}", file.display()))?;
        urls.extend(cli::parse_url_list(&text));
    }
    if urls.is_empty() {
        bail!("没有需要下载的链接");
    }
    Ok(urls)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_tracing(args.verbose);

    let urls = collect_urls(&args).await?;
    debug!("链接列表: {:?}", urls);

    // 创建输出目录
    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("创建输出目录失败: {}", args.output_dir.display()))?;

    let config = args.download_config();
    info!("开始下载 {} 个资源到 {:?}", urls.len(), config.output_dir);
    let results = Downloader::new(config).download(&urls).await;

    if args.json {
        let summary: Vec<ResultSummary> = results.iter().map(ResultSummary::from).collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        PrettyLogger::completion_summary(&results);
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    if failed > 0 {
        bail!("{} 个资源下载失败", failed);
    }
    Ok(())
}
