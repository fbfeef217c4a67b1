//! # 规则分类与聚合
//!
//! 逐行解析 `[Rule]` 段正文，按匹配类型和策略把规则值归入两个集合：
//! - `extended`: 域名/正则值，提示目标方言的 SNI 扩展匹配
//! - `pre`: 域名/IP 值，提示目标方言的拒绝前置匹配（仅 REJECT 类策略）
//!
//! ## 解析策略
//! 解析是尽力而为的：格式错误的行只会被跳过并计入 `skipped`，
//! 任何输入都不会导致 panic 或中断整个文档的分类。

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// 复合规则（AND/OR/NOT）里的嵌套子条件
///
/// 形如 `(DOMAIN-SUFFIX,ads.example.com` 或 `(URL-REGEX,"^https://ads"`，
/// 值以下一个 `,` 或 `)` 为界；URL-REGEX 的值允许带引号。
/// 交替分支按长度排序，保证 DOMAIN-SUFFIX 不会被 DOMAIN 截断。
static NESTED_CONDITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\(\s*(DOMAIN-SUFFIX|DOMAIN-KEYWORD|DOMAIN|IP-CIDR6|IP-CIDR|URL-REGEX)\s*,\s*(?:"([^"]*)"|([^,)]+))"#,
    )
    .unwrap()
});

// ========================================
// 分类结果
// ========================================

/// 一次分类的完整结果
///
/// 两个集合内部无序且去重，序列化时按字典序排序。
/// `skipped` 记录被跳过的格式错误行数，供测试和报告使用。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    /// 扩展匹配集合（域名、正则）
    pub extended: BTreeSet<String>,
    /// 前置匹配集合（仅 REJECT 类策略的域名、IP）
    pub pre: BTreeSet<String>,
    /// 被跳过的格式错误行数
    pub skipped: usize,
}

impl Classification {
    /// 扩展匹配集合的参数值：排序后用 `+` 连接；空集合时不产生参数
    pub fn extended_param(&self) -> Option<String> {
        join_sorted(&self.extended)
    }

    /// 前置匹配集合的参数值：排序后用 `+` 连接；空集合时不产生参数
    pub fn pre_param(&self) -> Option<String> {
        join_sorted(&self.pre)
    }

    /// 两个集合是否都为空
    pub fn is_empty(&self) -> bool {
        self.extended.is_empty() && self.pre.is_empty()
    }
}

fn join_sorted(set: &BTreeSet<String>) -> Option<String> {
    if set.is_empty() {
        None
    } else {
        // BTreeSet 迭代本身就是字典序
        Some(set.iter().cloned().collect::<Vec<_>>().join("+"))
    }
}

// ========================================
// 核心分类函数
// ========================================

/// 对规则段正文逐行分类，聚合两个匹配值集合
///
/// ## 每行处理流程
/// 1. 跳过空行和 `#` 注释行
/// 2. 按 `,` 切分并去除字段两侧空白；字段不足 2 个视为格式错误
/// 3. 解析策略：复合规则（AND/OR/NOT）取最后一个字段，
///    简单规则取第三个字段（缺省为空）
/// 4. 策略以 REJECT 开头（大小写不敏感）即视为拒绝类
/// 5. 按匹配类型分发到 `extended` / `pre`；未知类型直接忽略
pub fn classify(rule_section: &str) -> Classification {
    let mut out = Classification::default();

    for raw_line in rule_section.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 2 {
            out.skipped += 1;
            continue;
        }

        // 匹配类型大小写不敏感，值保留原始大小写
        let kind = fields[0].to_ascii_uppercase();
        let value = fields[1].trim_matches('"');

        // 已知限制：复合规则假定策略总是最后一个字段。
        // 如果策略之后还跟着 no-resolve 之类的修饰符，这里会取错。
        let policy = if is_composite(&kind) {
            fields.last().copied().unwrap_or("")
        } else {
            fields.get(2).copied().unwrap_or("")
        };
        let is_reject = policy.to_ascii_uppercase().starts_with("REJECT");

        match kind.as_str() {
            "DOMAIN" | "DOMAIN-SUFFIX" | "DOMAIN-KEYWORD" => {
                out.extended.insert(value.to_string());
                if is_reject {
                    out.pre.insert(value.to_string());
                }
            }
            "IP-CIDR" | "IP-CIDR6" => {
                if is_reject {
                    out.pre.insert(value.to_string());
                }
            }
            "URL-REGEX" => {
                out.extended.insert(value.to_string());
            }
            "AND" | "OR" | "NOT" => {
                // 嵌套子条件从原始行文本中重新扫描，不依赖逗号切分结果
                extract_nested(line, is_reject, &mut out);
            }
            _ => {}
        }
    }

    out
}

fn is_composite(kind: &str) -> bool {
    matches!(kind, "AND" | "OR" | "NOT")
}

/// 提取复合规则里的嵌套子条件
///
/// 括号不配对时正则不会命中，对应子条件自然被跳过，不影响其余提取。
fn extract_nested(line: &str, is_reject: bool, out: &mut Classification) {
    for caps in NESTED_CONDITION.captures_iter(line) {
        let kind = caps[1].to_ascii_uppercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().trim())
            .unwrap_or("");
        if value.is_empty() {
            continue;
        }

        match kind.as_str() {
            "DOMAIN" | "DOMAIN-SUFFIX" | "DOMAIN-KEYWORD" => {
                out.extended.insert(value.to_string());
                if is_reject {
                    out.pre.insert(value.to_string());
                }
            }
            "IP-CIDR" | "IP-CIDR6" => {
                if is_reject {
                    out.pre.insert(value.to_string());
                }
            }
            "URL-REGEX" => {
                out.extended.insert(value.to_string());
            }
            _ => {}
        }
    }
}

// ========================================
// 测试模块
// ========================================
#[cfg(test)]
mod tests {
    use super::*;

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_empty_section_yields_empty_sets() {
        let result = classify("");
        assert!(result.is_empty());
        assert_eq!(result.skipped, 0);
        assert_eq!(result.extended_param(), None);
        assert_eq!(result.pre_param(), None);
    }

    #[test]
    fn test_domain_reject_goes_to_both_sets() {
        let result = classify("DOMAIN,example.com,REJECT\n");
        assert!(result.extended.contains("example.com"));
        assert!(result.pre.contains("example.com"));
    }

    #[test]
    fn test_domain_direct_goes_to_extended_only() {
        let result = classify("DOMAIN,example.com,DIRECT\n");
        assert!(result.extended.contains("example.com"));
        assert!(!result.pre.contains("example.com"));
    }

    #[test]
    fn test_domain_suffix_and_keyword() {
        let result = classify("DOMAIN-SUFFIX,ads.net,REJECT-DROP\nDOMAIN-KEYWORD,track,PROXY\n");
        assert_eq!(names(&result.extended), ["ads.net", "track"]);
        assert_eq!(names(&result.pre), ["ads.net"]);
    }

    #[test]
    fn test_ip_cidr_reject_goes_to_pre_only() {
        let result = classify("IP-CIDR,10.0.0.0/8,REJECT-DROP,no-resolve\n");
        assert!(result.pre.contains("10.0.0.0/8"));
        assert!(result.extended.is_empty());
    }

    #[test]
    fn test_ip_cidr_non_reject_is_not_collected() {
        let result = classify("IP-CIDR,10.0.0.0/8,DIRECT,no-resolve\nIP-CIDR6,2001:db8::/32,PROXY\n");
        assert!(result.is_empty());
    }

    #[test]
    fn test_reject_variants_all_count() {
        let section = "\
DOMAIN,a.com,REJECT
DOMAIN,b.com,REJECT-TINYGIF
DOMAIN,c.com,REJECT-NO-DROP
DOMAIN,d.com,reject-drop
";
        let result = classify(section);
        assert_eq!(names(&result.pre), ["a.com", "b.com", "c.com", "d.com"]);
    }

    #[test]
    fn test_url_regex_is_unquoted_and_extended_only() {
        let result = classify(r#"URL-REGEX,"^https://ads\.",REJECT"#);
        assert!(result.extended.contains(r"^https://ads\."));
        assert!(result.pre.is_empty());
    }

    #[test]
    fn test_composite_and_rule() {
        let line = "AND,((DOMAIN-KEYWORD,adserver),(DOMAIN-SUFFIX,ads.example.com)),REJECT\n";
        let result = classify(line);
        assert_eq!(names(&result.extended), ["ads.example.com", "adserver"]);
        assert_eq!(names(&result.pre), ["ads.example.com", "adserver"]);
    }

    #[test]
    fn test_composite_non_reject_skips_pre() {
        let line = "OR,((DOMAIN,one.com),(IP-CIDR,192.168.0.0/16)),DIRECT\n";
        let result = classify(line);
        assert_eq!(names(&result.extended), ["one.com"]);
        assert!(result.pre.is_empty());
    }

    #[test]
    fn test_composite_ip_cidr_reject_goes_to_pre() {
        let line = "NOT,((IP-CIDR,192.168.0.0/16)),REJECT\n";
        let result = classify(line);
        assert!(result.extended.is_empty());
        assert_eq!(names(&result.pre), ["192.168.0.0/16"]);
    }

    #[test]
    fn test_composite_url_regex_quoted() {
        let line = r#"AND,((URL-REGEX,"^https://track\."),(DOMAIN,t.com)),REJECT"#;
        let result = classify(line);
        assert!(result.extended.contains(r"^https://track\."));
        assert!(result.extended.contains("t.com"));
        // URL-REGEX 不进入前置匹配集合
        assert!(!result.pre.contains(r"^https://track\."));
        assert!(result.pre.contains("t.com"));
    }

    #[test]
    fn test_comments_and_blank_lines_are_skipped() {
        let section = "\n# DOMAIN,commented.com,REJECT\n   \nDOMAIN,real.com,REJECT\n";
        let result = classify(section);
        assert_eq!(names(&result.extended), ["real.com"]);
        assert_eq!(result.skipped, 0);
    }

    #[test]
    fn test_malformed_lines_are_counted_not_fatal() {
        let section = "GARBAGE\nDOMAIN\nDOMAIN,good.com,REJECT\n";
        let result = classify(section);
        assert_eq!(result.skipped, 2);
        assert!(result.extended.contains("good.com"));
    }

    #[test]
    fn test_unknown_matcher_kind_is_ignored() {
        let result = classify("USER-AGENT,MyApp*,REJECT\nRULE-SET,https://x/y.list,PROXY\n");
        assert!(result.is_empty());
        assert_eq!(result.skipped, 0);
    }

    #[test]
    fn test_matcher_kind_case_insensitive_value_case_preserved() {
        let result = classify("domain-suffix,CDN.Example.COM,reject\n");
        assert!(result.extended.contains("CDN.Example.COM"));
        assert!(result.pre.contains("CDN.Example.COM"));
    }

    #[test]
    fn test_values_are_deduplicated() {
        let section = "DOMAIN,dup.com,REJECT\nDOMAIN-SUFFIX,dup.com,REJECT\nDOMAIN,dup.com,DIRECT\n";
        let result = classify(section);
        assert_eq!(names(&result.extended), ["dup.com"]);
        assert_eq!(names(&result.pre), ["dup.com"]);
    }

    #[test]
    fn test_unbalanced_composite_does_not_panic() {
        let result = classify("AND,((DOMAIN-KEYWORD,adserver),(DOMAIN-SUFFIX,REJECT\nAND,(((,),REJECT\n");
        // 能提取多少提取多少，其余静默跳过
        assert!(result.extended.contains("adserver"));
    }

    #[test]
    fn test_binary_garbage_does_not_panic() {
        let garbage = "\u{0}\u{1}\u{2},\u{fffd}\nDOMAIN,ok.com,REJECT\n";
        let result = classify(garbage);
        assert!(result.extended.contains("ok.com"));
    }

    #[test]
    fn test_classify_is_idempotent() {
        let section = "DOMAIN,a.com,REJECT\nIP-CIDR,10.0.0.0/8,REJECT\nURL-REGEX,\"^x\"\n";
        let first = classify(section);
        let second = classify(section);
        assert_eq!(first, second);
    }

    #[test]
    fn test_param_serialization_is_sorted_and_joined() {
        let result = classify("DOMAIN,b.com,DIRECT\nDOMAIN,a.com,PROXY\n");
        assert_eq!(result.extended_param().as_deref(), Some("a.com+b.com"));
        assert_eq!(result.pre_param(), None);
    }
}
