//! # 规则段定位器
//!
//! 从转换后的模块文档中切出 `[Rule]` 段的正文。
//!
//! ## 边界判定
//! - 段头：独立一行的 `[Rule]`（段名大小写不敏感）
//! - 段尾：下一个段头行，即去除空白后以 `[` + 字母开头的行
//!
//! 要求 `[` 后紧跟字母是为了区分段头和规则值里的 IPv6 字面量
//! （如 `[::1]`），后者不能被误认为段边界。

use once_cell::sync::Lazy;
use regex::Regex;

/// `[Rule]` 段头行（整行匹配，段名大小写不敏感）
static RULE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\[rule\]$").unwrap());

/// 任意段头行：`[` 后必须紧跟字母
static SECTION_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[[A-Za-z]").unwrap());

/// 定位文档中 `[Rule]` 段的正文
///
/// 返回第一个 `[Rule]` 段头与下一个段头（或文档结尾）之间的全部文本。
/// 文档中没有 `[Rule]` 段时返回空串，这不是错误。
pub fn locate_rule_section(document: &str) -> &str {
    let mut start = None;
    let mut end = document.len();

    // 按行扫描并记录每行在文档中的偏移量，这样可以直接切片原文
    let mut offset = 0;
    for line in document.split_inclusive('\n') {
        let trimmed = line.trim();
        match start {
            None => {
                if RULE_HEADER.is_match(trimmed) {
                    // 段正文从段头行之后开始
                    start = Some(offset + line.len());
                }
            }
            Some(_) => {
                if SECTION_BOUNDARY.is_match(trimmed) {
                    end = offset;
                    break;
                }
            }
        }
        offset += line.len();
    }

    match start {
        Some(s) if s <= end => &document[s..end],
        _ => "",
    }
}
