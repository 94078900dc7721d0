use colored::*;
use tracing::Level;

use crate::common::format::{format_bytes, format_duration};
use crate::downloader::models::BatchResult;

/// 初始化日志，输出到 stderr，避免和进度帧混在一起
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    // 重复初始化（例如测试中）时忽略
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 批量下载结束后的汇总输出
pub struct PrettyLogger;

impl PrettyLogger {
    /// 显示成功消息
    pub fn success(message: impl AsRef<str>) {
        println!("{} {}", "✓".green().bold(), message.as_ref());
    }

    /// 显示错误消息
    pub fn error(message: impl AsRef<str>) {
        println!("{} {}", "✗".red().bold(), message.as_ref());
    }

    /// 显示分割线
    pub fn separator() {
        println!("{}", "─".repeat(50).bright_black());
    }

    /// 单个资源的结果
    pub fn result_line(result: &BatchResult) -> String {
        match (&result.error, &result.path) {
            (None, Some(path)) => {
                let elapsed = match (result.start, result.end) {
                    (Some(start), Some(end)) => (end - start).to_std().unwrap_or_default(),
                    _ => Default::default(),
                };
                format!(
                    "{} -> {} ({}, {})",
                    result.name.bold(),
                    path.display(),
                    format_bytes(result.size),
                    format_duration(elapsed)
                )
            }
            (Some(err), _) => format!("{}: {}", result.url, err.to_string().red()),
            (None, None) => format!("{}: {}", result.url, "没有生成文件".yellow()),
        }
    }

    /// 显示完成总结
    pub fn completion_summary(results: &[BatchResult]) {
        Self::separator();
        for result in results {
            if result.is_success() {
                Self::success(Self::result_line(result));
            } else {
                Self::error(Self::result_line(result));
            }
        }
        Self::separator();

        let ok = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - ok;
        let total: u64 = results
            .iter()
            .filter(|r| r.is_success())
            .map(|r| r.size)
            .sum();
        let line = format!(
            "完成 {} 个，失败 {} 个，共 {}",
            ok,
            failed,
            format_bytes(total)
        );
        if failed == 0 {
            println!("{}", line.green().bold());
        } else {
            println!("{}", line.yellow().bold());
        }
    }
}
