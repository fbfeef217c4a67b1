//! # module-convert
//!
//! CLI 工具，批量把代理软件模块文件在 Loon、QX、Surge 等方言之间转换。
//!
//! ## 功能
//! - 读取 module_sources.json 中的模块源配置
//! - 调用远端转换服务完成方言翻译
//! - Surge 目标额外附带两个规则匹配加速提示参数:
//!   - extendedMatching: 域名/正则值（SNI 扩展匹配）
//!   - preMatching: 拒绝类策略的域名/IP 值（前置快速拒绝）
//! - 并行转换多个模块，失败不中断整批任务
//!
//! ## 使用
//! ```bash
//! # 批量转换（默认读取 ./module_sources.json，输出到 ./module/）
//! module-convert convert
//!
//! # 指定配置和输出目录，限制并发为 4
//! module-convert convert --config sources.json --output-dir out --jobs 4
//!
//! # 调试：对本地文档运行规则匹配提取引擎
//! module-convert extract adblock.sgmodule
//!
//! # JSON 格式输出提取结果
//! module-convert extract adblock.sgmodule --json
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod batch;
mod config;
mod matcher;
mod remote;

use batch::{BatchOptions, BatchReport};
use config::DialectTable;
use remote::RemoteClient;

/// 默认转换服务地址
const DEFAULT_BASE_URL: &str = "https://sc.sephiroth.club";

// ========================================
// CLI 参数定义
// ========================================

/// 代理模块方言批量转换工具
#[derive(Parser)]
#[command(name = "module-convert")]
#[command(version = "0.1.0")]
#[command(about = "Batch-convert proxy module files between Loon/QX/Surge dialects")]
struct Cli {
    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

/// 支持的子命令
#[derive(Subcommand)]
enum Commands {
    /// 批量转换模块源配置中的全部模块
    Convert {
        /// 模块源配置文件路径
        #[arg(long, default_value = "module_sources.json")]
        config: PathBuf,

        /// 输出根目录
        #[arg(long, default_value = "module")]
        output_dir: PathBuf,

        /// 转换服务地址
        #[arg(long, default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// 工作线程数（默认由 rayon 决定）
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// 单次请求超时（秒）
        #[arg(long, default_value_t = 30)]
        timeout: u64,

        /// 不清理已有输出目录
        #[arg(long)]
        keep_dirs: bool,
    },
    /// 对单个文档运行规则匹配提取引擎（调试用）
    Extract {
        /// 文档路径，`-` 表示从 stdin 读取
        file: String,

        /// JSON 格式输出
        #[arg(long)]
        json: bool,
    },
}

// ========================================
// 主函数
// ========================================

fn main() {
    // 解析命令行参数
    let cli = Cli::parse();

    // 执行对应的子命令
    let result = match cli.command {
        Commands::Convert {
            config,
            output_dir,
            base_url,
            jobs,
            timeout,
            keep_dirs,
        } => run_convert(config, BatchOptions { base_url, output_dir, jobs, keep_dirs }, timeout),
        Commands::Extract { file, json } => run_extract(&file, json),
    };

    // 处理错误
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

// ========================================
// 转换命令实现
// ========================================

/// 执行批量转换命令
fn run_convert(config_path: PathBuf, opts: BatchOptions, timeout_secs: u64) -> Result<()> {
    // 1. 加载模块源配置
    let sources = config::load_module_sources(&config_path)?;

    // 2. 构造不可变的方言转换表并注入驱动器
    let table = DialectTable::builtin();

    // 3. 创建 HTTP 客户端
    let client = RemoteClient::new(Duration::from_secs(timeout_secs))?;

    // 4. 执行批量转换
    println!("Starting module conversion...");
    let report = batch::run_batch(&table, &sources, &client, &opts)?;

    // 5. 按配置顺序输出报告
    print_report(&report);

    // 有失败任务时以非零码退出，方便 CI 判断
    if report.failed() > 0 {
        anyhow::bail!("{} of {} conversions failed", report.failed(), report.total());
    }
    Ok(())
}

/// 打印按配置顺序排列的转换报告
fn print_report(report: &BatchReport) {
    println!("\nConversion report:");
    for outcome in &report.outcomes {
        let label = format!(
            "{} ({} -> {})",
            outcome.module_name, outcome.source_dialect, outcome.target
        );
        match (&outcome.output, &outcome.error) {
            (Some(path), _) => println!("  [OK]   {}: {}", label, path.display()),
            (None, Some(err)) => println!("  [FAIL] {}: {}", label, err),
            (None, None) => println!("  [FAIL] {}", label),
        }
    }

    println!(
        "\nTotal: {}, succeeded: {}, failed: {}",
        report.total(),
        report.succeeded(),
        report.failed()
    );
    if report.skipped_lines() > 0 {
        println!("Classifier skipped {} malformed rule lines", report.skipped_lines());
    }
}

// ========================================
// 提取命令实现
// ========================================

/// 对单个文档运行定位 + 分类，打印两个集合
fn run_extract(file: &str, json_output: bool) -> Result<()> {
    // 读取文档内容
    let document = if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read: {}", file))?
    };

    let hints = matcher::extract_matching_hints(&document);

    if json_output {
        // JSON 格式输出
        let json = serde_json::to_string_pretty(&hints)?;
        println!("{}", json);
    } else {
        println!(
            "extendedMatching: {}",
            hints.extended_param().as_deref().unwrap_or("(empty)")
        );
        println!(
            "preMatching:      {}",
            hints.pre_param().as_deref().unwrap_or("(empty)")
        );
        println!("skipped lines:    {}", hints.skipped);
    }

    Ok(())
}
