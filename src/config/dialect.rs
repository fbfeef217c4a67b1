//! # 方言转换表
//!
//! 定义「源方言 → 目标方言」的转换配置：远端服务识别的类型标记、
//! 目标文件扩展名，以及转换 URL 的拼装。
//!
//! 转换表是启动时构造的不可变值，由调用方显式传入批量驱动器，
//! 便于在测试中注入替代表。

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};

use crate::matcher::Classification;

// ========================================
// 表结构
// ========================================

/// 单个转换目标的配置
#[derive(Debug, Clone)]
pub struct TargetDialect {
    /// 远端服务的目标类型标记，如 `surge-module`
    pub target_token: String,
    /// 产物文件扩展名，如 `sgmodule`
    pub extension: String,
    /// 目标方言是否支持匹配加速提示参数
    pub accelerated: bool,
}

/// 单个源方言的配置
#[derive(Debug, Clone)]
pub struct SourceDialect {
    /// 远端服务的源类型标记，如 `loon-plugin`
    pub type_token: String,
    /// 该源方言支持的所有转换目标
    pub targets: BTreeMap<String, TargetDialect>,
}

/// 完整的方言转换表
#[derive(Debug, Clone)]
pub struct DialectTable {
    sources: BTreeMap<String, SourceDialect>,
}

fn target(token: &str, extension: &str, accelerated: bool) -> TargetDialect {
    TargetDialect {
        target_token: token.to_string(),
        extension: extension.to_string(),
        accelerated,
    }
}

impl DialectTable {
    /// 内置转换表
    ///
    /// Surge 是唯一支持匹配加速提示的目标；QX 只支持转换回自身，
    /// 其余源方言不支持转换到 QX。
    pub fn builtin() -> Self {
        let common_targets = || {
            BTreeMap::from([
                ("surge".to_string(), target("surge-module", "sgmodule", true)),
                ("loon".to_string(), target("loon-plugin", "plugin", false)),
                ("stash".to_string(), target("stash-stoverride", "stoverride", false)),
                ("shadowrocket".to_string(), target("shadowrocket-module", "sgmodule", false)),
            ])
        };

        let mut qx_targets = common_targets();
        qx_targets.insert("qx".to_string(), target("qx-rewrite", "conf", false));

        let sources = BTreeMap::from([
            (
                "loon".to_string(),
                SourceDialect {
                    type_token: "loon-plugin".to_string(),
                    targets: common_targets(),
                },
            ),
            (
                "qx".to_string(),
                SourceDialect {
                    type_token: "qx-rewrite".to_string(),
                    targets: qx_targets,
                },
            ),
            (
                "surge".to_string(),
                SourceDialect {
                    type_token: "surge-module".to_string(),
                    targets: common_targets(),
                },
            ),
        ]);

        Self { sources }
    }

    /// 查找源方言配置
    pub fn source(&self, name: &str) -> Option<&SourceDialect> {
        self.sources.get(name)
    }

    /// 查找某个源方言到某个目标的配置
    pub fn target(&self, source: &str, target: &str) -> Option<&TargetDialect> {
        self.sources.get(source).and_then(|s| s.targets.get(target))
    }

    /// 某个源方言支持的全部目标名（字典序）
    pub fn supported_targets(&self, source: &str) -> Vec<String> {
        self.sources
            .get(source)
            .map(|s| s.targets.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// 全表出现过的所有目标名，用于创建输出目录
    pub fn all_target_names(&self) -> BTreeSet<String> {
        self.sources
            .values()
            .flat_map(|s| s.targets.keys().cloned())
            .collect()
    }

    /// 产物文件名：`<模块名>.<目标扩展名>`
    pub fn output_filename(&self, source: &str, target: &str, module_name: &str) -> Result<String> {
        let Some(cfg) = self.target(source, target) else {
            bail!("unsupported conversion: {} -> {}", source, target);
        };
        Ok(format!("{}.{}", module_name, cfg.extension))
    }

    /// 拼装转换 URL
    ///
    /// 模板：`{base}/file/_start_/{源地址}/_end_/{文件名}?type=..&target=..&del=true&jqEnabled=true`
    ///
    /// 仅当目标支持加速且对应集合非空时才追加
    /// `extendedMatching=` / `preMatching=` 两个参数。
    pub fn conversion_url(
        &self,
        base_url: &str,
        source: &str,
        target: &str,
        module_name: &str,
        source_url: &str,
        hints: Option<&Classification>,
    ) -> Result<String> {
        let Some(source_cfg) = self.source(source) else {
            bail!("unknown source dialect: {}", source);
        };
        let Some(target_cfg) = source_cfg.targets.get(target) else {
            bail!("unsupported conversion: {} -> {}", source, target);
        };

        let filename = format!("{}.{}", module_name, target_cfg.extension);
        let mut url = format!(
            "{}/file/_start_/{}/_end_/{}?type={}&target={}&del=true&jqEnabled=true",
            base_url.trim_end_matches('/'),
            source_url,
            filename,
            source_cfg.type_token,
            target_cfg.target_token,
        );

        if target_cfg.accelerated {
            if let Some(hints) = hints {
                if let Some(extended) = hints.extended_param() {
                    url.push_str("&extendedMatching=");
                    url.push_str(&extended);
                }
                if let Some(pre) = hints.pre_param() {
                    url.push_str("&preMatching=");
                    url.push_str(&pre);
                }
            }
        }

        Ok(url)
    }
}
