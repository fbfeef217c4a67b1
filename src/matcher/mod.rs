//! # 规则匹配提取引擎
//!
//! 此模块是整个工具里唯一包含真正解析逻辑的部分，负责：
//! 1. 从转换后的文档中定位 `[Rule]` 段（locator）
//! 2. 逐行分类规则并聚合两个匹配值集合（classifier）
//!
//! 引擎是纯函数：无 I/O、无共享状态，对任意文本输入都不会 panic。

pub mod classifier;
pub mod locator;

pub use classifier::{classify, Classification};
pub use locator::locate_rule_section;

/// 对完整文档一步完成定位 + 分类
pub fn extract_matching_hints(document: &str) -> Classification {
    classify(locate_rule_section(document))
}
