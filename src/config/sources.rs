//! # 模块源配置
//!
//! 解析 `module_sources.json`：按源方言分组的模块列表。
//!
//! ## 格式示例
//! ```json
//! {
//!   "loon": [
//!     {
//!       "name": "adblock",
//!       "url": "https://example.com/adblock.plugin",
//!       "description": "广告拦截",
//!       "targets": ["surge", "stash"]
//!     }
//!   ]
//! }
//! ```
//!
//! `targets` 缺省或为空时表示转换到该源方言支持的全部目标。

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// 单个模块源
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleSource {
    /// 模块名（用作产物文件名）
    pub name: String,
    /// 源文件地址
    pub url: String,
    /// 可选的人类可读描述
    #[serde(default)]
    pub description: Option<String>,
    /// 可选的目标方言列表；缺省表示全部支持的目标
    #[serde(default)]
    pub targets: Option<Vec<String>>,
}

impl ModuleSource {
    /// 该模块的有效目标列表
    ///
    /// 显式配置了非空 `targets` 时用配置值，否则用 `fallback`
    /// （源方言支持的全部目标）。
    pub fn effective_targets(&self, fallback: &[String]) -> Vec<String> {
        match &self.targets {
            Some(targets) if !targets.is_empty() => targets.clone(),
            _ => fallback.to_vec(),
        }
    }
}

/// 按源方言分组的模块源配置
pub type ModuleSources = BTreeMap<String, Vec<ModuleSource>>;

/// 从 JSON 文本解析模块源配置
pub fn parse_module_sources(text: &str) -> Result<ModuleSources> {
    serde_json::from_str(text).context("Failed to parse module sources JSON")
}

/// 从文件加载模块源配置
pub fn load_module_sources(path: &Path) -> Result<ModuleSources> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read module sources: {}", path.display()))?;
    parse_module_sources(&text)
}
