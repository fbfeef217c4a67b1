//! # 批量转换编排模块
//!
//! 这个模块是业务流程所在，负责：
//! 1. 清理并重建 `module/<目标方言>/` 输出目录
//! 2. 把模块源配置展开成（模块, 目标）转换任务列表
//! 3. 在有界线程池上并行执行任务
//! 4. 汇总按配置顺序排列的转换报告
//!
//! ## 单个任务的流程
//! 1. 目标支持匹配加速时，先拉取一份普通转换结果，
//!    用规则匹配提取引擎算出两个提示集合
//! 2. 带提示参数拼出最终转换 URL
//! 3. 下载产物到 `<输出目录>/<目标>/<模块名>.<扩展名>`
//!
//! 提示文档拉取失败只降级为「无提示」，不会让整批任务失败。

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::config::{DialectTable, ModuleSource, ModuleSources};
use crate::matcher;
use crate::remote::RemoteClient;

// ========================================
// 任务与结果
// ========================================

/// 批量转换的运行参数
pub struct BatchOptions {
    /// 转换服务地址
    pub base_url: String,
    /// 输出根目录
    pub output_dir: PathBuf,
    /// 工作线程数；None 表示用 rayon 默认值
    pub jobs: Option<usize>,
    /// 跳过清理步骤，保留已有输出目录
    pub keep_dirs: bool,
}

/// 一个（模块, 目标）转换任务
#[derive(Debug, Clone)]
pub struct ConversionJob {
    /// 源方言名
    pub source_dialect: String,
    /// 模块源
    pub module: ModuleSource,
    /// 目标方言名
    pub target: String,
}

/// 单个任务的执行结果
#[derive(Debug)]
pub struct ConversionOutcome {
    /// 模块名
    pub module_name: String,
    /// 源方言名
    pub source_dialect: String,
    /// 目标方言名
    pub target: String,
    /// 成功时的产物路径
    pub output: Option<PathBuf>,
    /// 失败原因
    pub error: Option<String>,
    /// 提示提取时分类器跳过的格式错误行数
    pub skipped_lines: usize,
}

impl ConversionOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// 整批任务的汇总报告，条目按配置顺序排列
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ConversionOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// 全批次分类器跳过的规则行总数
    pub fn skipped_lines(&self) -> usize {
        self.outcomes.iter().map(|o| o.skipped_lines).sum()
    }
}

// ========================================
// 批量执行
// ========================================

/// 执行完整的批量转换
///
/// 任务执行顺序不保证，但报告条目保持配置文件中的顺序。
pub fn run_batch(
    table: &DialectTable,
    sources: &ModuleSources,
    client: &RemoteClient,
    opts: &BatchOptions,
) -> Result<BatchReport> {
    // 1. 准备输出目录
    prepare_output_dirs(table, opts)?;

    // 2. 展开任务列表（保持配置顺序）
    let jobs = build_jobs(table, sources);
    if jobs.is_empty() {
        println!("No conversion jobs configured.");
        return Ok(BatchReport::default());
    }

    // 3. 并行执行；par_iter + collect 保持任务顺序
    let run = || {
        jobs.par_iter()
            .map(|job| convert_one(table, client, opts, job))
            .collect::<Vec<_>>()
    };
    let outcomes = match opts.jobs {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .context("Failed to build worker pool")?
            .install(run),
        None => run(),
    };

    Ok(BatchReport { outcomes })
}

/// 清理并重建输出目录结构
fn prepare_output_dirs(table: &DialectTable, opts: &BatchOptions) -> Result<()> {
    if !opts.keep_dirs && opts.output_dir.exists() {
        println!("Cleaning output directory: {}", opts.output_dir.display());
        fs::remove_dir_all(&opts.output_dir)
            .with_context(|| format!("Failed to clean: {}", opts.output_dir.display()))?;
    }

    for target in table.all_target_names() {
        let dir = opts.output_dir.join(&target);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        println!("Created directory: {}", dir.display());
    }

    Ok(())
}

/// 把模块源配置展开成任务列表
///
/// 不支持的（源, 目标）组合被跳过并打印警告，与源配置中
/// 显式写错目标名的行为一致。
pub fn build_jobs(table: &DialectTable, sources: &ModuleSources) -> Vec<ConversionJob> {
    let mut jobs = Vec::new();

    for (source_dialect, modules) in sources {
        let supported = table.supported_targets(source_dialect);
        if supported.is_empty() {
            eprintln!("Warning: unknown source dialect '{}', skipping its modules", source_dialect);
            continue;
        }

        for module in modules {
            match &module.description {
                Some(desc) => println!("Module {} ({}): {}", module.name, source_dialect, desc),
                None => println!("Module {} ({})", module.name, source_dialect),
            }

            for target in module.effective_targets(&supported) {
                if table.target(source_dialect, &target).is_none() {
                    eprintln!(
                        "Warning: {} -> {} not supported, skipping for module '{}'",
                        source_dialect, target, module.name
                    );
                    continue;
                }
                jobs.push(ConversionJob {
                    source_dialect: source_dialect.clone(),
                    module: module.clone(),
                    target,
                });
            }
        }
    }

    jobs
}

/// 执行单个转换任务
fn convert_one(
    table: &DialectTable,
    client: &RemoteClient,
    opts: &BatchOptions,
    job: &ConversionJob,
) -> ConversionOutcome {
    let mut outcome = ConversionOutcome {
        module_name: job.module.name.clone(),
        source_dialect: job.source_dialect.clone(),
        target: job.target.clone(),
        output: None,
        error: None,
        skipped_lines: 0,
    };

    match run_job(table, client, opts, job, &mut outcome) {
        Ok(path) => {
            println!("Saved: {}", path.display());
            outcome.output = Some(path);
        }
        Err(e) => {
            eprintln!("Failed {} -> {}: {:#}", job.module.name, job.target, e);
            outcome.error = Some(format!("{:#}", e));
        }
    }

    outcome
}

fn run_job(
    table: &DialectTable,
    client: &RemoteClient,
    opts: &BatchOptions,
    job: &ConversionJob,
    outcome: &mut ConversionOutcome,
) -> Result<PathBuf> {
    let module = &job.module;

    // 1. 目标支持加速时先提取匹配提示
    let accelerated = table
        .target(&job.source_dialect, &job.target)
        .map(|t| t.accelerated)
        .unwrap_or(false);

    let hints = if accelerated {
        let hint_url = table.conversion_url(
            &opts.base_url,
            &job.source_dialect,
            &job.target,
            &module.name,
            &module.url,
            None,
        )?;
        match client.fetch_text(&hint_url) {
            Ok(document) => {
                let hints = matcher::extract_matching_hints(&document);
                outcome.skipped_lines = hints.skipped;
                Some(hints)
            }
            Err(e) => {
                // 提示拉取失败降级为无提示，转换照常进行
                eprintln!(
                    "Warning: matching hints unavailable for {} -> {}: {:#}",
                    module.name, job.target, e
                );
                None
            }
        }
    } else {
        None
    };

    // 2. 拼最终转换 URL 并下载产物
    let final_url = table.conversion_url(
        &opts.base_url,
        &job.source_dialect,
        &job.target,
        &module.name,
        &module.url,
        hints.as_ref(),
    )?;

    let filename = table.output_filename(&job.source_dialect, &job.target, &module.name)?;
    let path = opts.output_dir.join(&job.target).join(filename);

    println!("Converting {} -> {}: {}", module.name, job.target, final_url);
    client.download(&final_url, &path)?;

    Ok(path)
}
