//! 微信服务器签名校验
//!
//! 签名算法：将参与签名的字符串按字典序排序后拼接，取 SHA-1 的小写十六进制。
//! 这是平台公开的算法，比较过程不做常量时间处理。

use sha1::{Digest, Sha1};

/// 计算签名
pub fn compute_signature(parts: &[&str]) -> String {
    let mut sorted = parts.to_vec();
    sorted.sort_unstable();

    let mut sha = Sha1::new();
    for part in sorted {
        sha.update(part.as_bytes());
    }
    hex::encode(sha.finalize())
}

/// 校验服务器验证请求的签名
pub fn verify(token: &str, timestamp: &str, nonce: &str, signature: &str) -> bool {
    compute_signature(&[token, timestamp, nonce]) == signature
}
