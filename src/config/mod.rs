//! # 配置模块
//!
//! 此模块负责：
//! 1. 方言转换表（源方言 → 目标方言的类型标记与扩展名）
//! 2. 模块源配置文件的解析（module_sources.json）

pub mod dialect;
pub mod sources;

pub use dialect::DialectTable;
pub use sources::{load_module_sources, parse_module_sources, ModuleSource, ModuleSources};
