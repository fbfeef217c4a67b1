//! # 远端转换服务客户端
//!
//! 对远端转换服务的两种访问方式：
//! 1. `fetch_text`: 拉取转换结果正文，供规则匹配提取引擎解析
//! 2. `download`: 把最终产物写入磁盘
//!
//! 转换服务本身是黑盒，这里只负责 HTTP 往返；重试/退避不在范围内。

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// 远端服务客户端
///
/// 内部的 reqwest blocking Client 自带连接池，可在多个
/// rayon 工作线程间共享（Client 是 Clone + Send + Sync）。
pub struct RemoteClient {
    client: reqwest::blocking::Client,
}

impl RemoteClient {
    /// 创建客户端，`timeout` 作用于单次请求的整个往返
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }

    /// 拉取 URL 并按文本解码返回正文
    ///
    /// 非 2xx 状态码视为失败；调用方决定失败后如何降级。
    pub fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Request failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Server returned {} for {}", status, url);
        }

        response.text().context("Failed to decode response body")
    }

    /// 下载 URL 内容写入 `path`，必要时创建父目录
    pub fn download(&self, url: &str, path: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Request failed: {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Server returned {} for {}", status, url);
        }

        let content = response.bytes().context("Failed to read response body")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let mut file = fs::File::create(path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        file.write_all(&content)
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        Ok(())
    }
}
