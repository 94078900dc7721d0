use clap::Parser;
use std::path::PathBuf;

use fetchpool::DownloadConfig;
use tokio::time::Duration;

/// 批量下载器
#[derive(Parser, Debug)]
#[command(name = "fetchpool")]
#[command(version)]
#[command(author = "rpeng252@gmail.com")]
#[command(about = "并发下载一批 HTTP/HTTPS/FTP 资源，并在终端实时显示进度", long_about = None)]
pub struct Cli {
    /// 要下载的链接
    #[arg(value_name = "URL")]
    #[arg(value_hint = clap::ValueHint::Url)]
    pub urls: Vec<String>,

    /// 从文件读取链接，每行一个，`#` 开头为注释
    #[arg(short = 'i', long, value_name = "FILE")]
    #[arg(value_hint = clap::ValueHint::FilePath)]
    pub input_file: Option<PathBuf>,

    /// 保存目录
    #[arg(short, long, value_name = "DIR")]
    #[arg(default_value = ".")]
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub output_dir: PathBuf,

    /// 不显示进度
    #[arg(short, long)]
    pub silent: bool,

    /// 最大并发数
    #[arg(short = 'c', long, value_name = "N", default_value_t = 0)]
    #[arg(allow_negative_numbers = true)]
    #[arg(help = "最大并发数: 0=串行, 负数=不限制")]
    pub concurrency: i64,

    /// 刷新间隔（毫秒）
    #[arg(long, value_name = "MS", default_value_t = 25)]
    pub refresh_ms: u64,

    /// 以 JSON 输出结果
    #[arg(long)]
    pub json: bool,

    /// 日志详细程度 (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig::default()
            .with_output_dir(&self.output_dir)
            .with_silent(self.silent)
            .with_max_concurrency(self.concurrency)
            .with_refresh_interval(Duration::from_millis(self.refresh_ms))
    }
}

/// 解析链接列表文件，跳过空行和注释
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
