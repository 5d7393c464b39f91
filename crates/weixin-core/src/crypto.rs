//! 安全模式消息加解密
//!
//! AES-256-CBC，密钥为 EncodingAESKey 补 `=` 后 Base64 解码得到的 32 字节，IV 取密钥前 16 字节。
//! 明文格式：16 字节随机串 ‖ 4 字节网络序消息长度 ‖ 消息 ‖ AppId，按 32 字节做 PKCS#7 填充。

use aes::Aes256;
use base64::Engine as _;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};
use rand::Rng;

use crate::error::{Result, WeixinError};
use crate::payload;
use crate::signature::compute_signature;

const BLOCK_SIZE: usize = 32;
const RANDOM_LEN: usize = 16;

/// 平台生成的 43 位密钥末尾可能带有非零填充位
const KEY_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// 消息加解密器
#[derive(Clone)]
pub struct MessageCryptor {
    appid: String,
    token: String,
    key: [u8; 32],
}

impl std::fmt::Debug for MessageCryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCryptor")
            .field("appid", &self.appid)
            .finish_non_exhaustive()
    }
}

/// 解析后的加密回复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub encrypt: String,
    pub msg_signature: String,
    pub timestamp: String,
    pub nonce: String,
}

impl EncryptedEnvelope {
    pub fn to_xml(&self) -> String {
        format!(
            "<xml>\
             <Encrypt><![CDATA[{}]]></Encrypt>\
             <MsgSignature><![CDATA[{}]]></MsgSignature>\
             <TimeStamp>{}</TimeStamp>\
             <Nonce><![CDATA[{}]]></Nonce>\
             </xml>",
            self.encrypt, self.msg_signature, self.timestamp, self.nonce
        )
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let payload = payload::decode(xml)?;
        Ok(Self {
            encrypt: payload.require("Encrypt")?.to_string(),
            msg_signature: payload.require("MsgSignature")?.to_string(),
            timestamp: payload.require("TimeStamp")?.to_string(),
            nonce: payload.require("Nonce")?.to_string(),
        })
    }
}

impl MessageCryptor {
    pub fn new(
        appid: impl Into<String>,
        token: impl Into<String>,
        encoding_aes_key: &str,
    ) -> Result<Self> {
        let key_text = encoding_aes_key.trim();
        if key_text.len() != 43 {
            return Err(WeixinError::UnsupportedCredentialFormat(format!(
                "EncodingAESKey 长度应为 43，实际为 {}",
                key_text.len()
            )));
        }

        let raw = KEY_ENGINE
            .decode(format!("{}=", key_text))
            .map_err(|e| WeixinError::UnsupportedCredentialFormat(e.to_string()))?;
        let key: [u8; 32] = raw.try_into().map_err(|raw: Vec<u8>| {
            WeixinError::UnsupportedCredentialFormat(format!(
                "EncodingAESKey 解码后应为 32 字节，实际为 {}",
                raw.len()
            ))
        })?;

        Ok(Self {
            appid: appid.into(),
            token: token.into(),
            key,
        })
    }

    pub fn appid(&self) -> &str {
        &self.appid
    }

    /// 计算加密消息签名
    pub fn signature(&self, timestamp: &str, nonce: &str, encrypt: &str) -> String {
        compute_signature(&[&self.token, timestamp, nonce, encrypt])
    }

    /// 加密明文，返回 Base64 密文
    pub fn encrypt(&self, message: &str) -> Result<String> {
        let random: [u8; RANDOM_LEN] = rand::random();
        self.encrypt_with_random(message, &random)
    }

    fn encrypt_with_random(&self, message: &str, random: &[u8; RANDOM_LEN]) -> Result<String> {
        let message_len = u32::try_from(message.len())
            .map_err(|_| WeixinError::Crypto("消息过长".to_string()))?;

        let mut buf = Vec::with_capacity(RANDOM_LEN + 4 + message.len() + self.appid.len() + BLOCK_SIZE);
        buf.extend_from_slice(random);
        buf.extend_from_slice(&message_len.to_be_bytes());
        buf.extend_from_slice(message.as_bytes());
        buf.extend_from_slice(self.appid.as_bytes());

        let pad = BLOCK_SIZE - buf.len() % BLOCK_SIZE;
        buf.resize(buf.len() + pad, pad as u8);

        let len = buf.len();
        let iv = &self.key[..16];
        let ciphertext = cbc::Encryptor::<Aes256>::new((&self.key).into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, len)
            .map_err(|e| WeixinError::Crypto(e.to_string()))?;

        Ok(STANDARD.encode(ciphertext))
    }

    /// 解密 Base64 密文并校验 AppId
    pub fn decrypt(&self, encrypt: &str) -> Result<String> {
        let mut buf = STANDARD
            .decode(encrypt.trim())
            .map_err(|e| WeixinError::Crypto(format!("密文不是合法的 Base64: {}", e)))?;

        let iv = &self.key[..16];
        let plaintext = cbc::Decryptor::<Aes256>::new((&self.key).into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|e| WeixinError::Crypto(e.to_string()))?;

        let content = strip_padding(plaintext)?;
        if content.len() < RANDOM_LEN + 4 {
            return Err(WeixinError::Crypto("解密后的数据过短".to_string()));
        }

        let len_bytes = [
            content[RANDOM_LEN],
            content[RANDOM_LEN + 1],
            content[RANDOM_LEN + 2],
            content[RANDOM_LEN + 3],
        ];
        let msg_start = RANDOM_LEN + 4;
        let msg_end = msg_start.saturating_add(u32::from_be_bytes(len_bytes) as usize);
        if msg_end > content.len() {
            return Err(WeixinError::Crypto("消息长度不合法".to_string()));
        }

        if &content[msg_end..] != self.appid.as_bytes() {
            return Err(WeixinError::AppIdMismatch);
        }

        String::from_utf8(content[msg_start..msg_end].to_vec())
            .map_err(|e| WeixinError::Crypto(format!("消息不是 UTF-8: {}", e)))
    }

    /// 校验签名并解密收到的加密消息
    pub fn decrypt_message(
        &self,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
        encrypt: &str,
    ) -> Result<String> {
        if self.signature(timestamp, nonce, encrypt) != msg_signature {
            return Err(WeixinError::InvalidSignature);
        }
        self.decrypt(encrypt)
    }

    /// 加密回复并生成加密消息包
    pub fn encrypt_message(
        &self,
        reply: &str,
        timestamp: Option<&str>,
        nonce: Option<&str>,
    ) -> Result<EncryptedEnvelope> {
        let timestamp = timestamp
            .map(str::to_string)
            .unwrap_or_else(|| chrono::Utc::now().timestamp().to_string());
        let nonce = nonce
            .map(str::to_string)
            .unwrap_or_else(|| rand::thread_rng().gen_range(100_000_000u32..1_000_000_000).to_string());

        let encrypt = self.encrypt(reply)?;
        let msg_signature = self.signature(&timestamp, &nonce, &encrypt);
        Ok(EncryptedEnvelope {
            encrypt,
            msg_signature,
            timestamp,
            nonce,
        })
    }
}

fn strip_padding(input: &[u8]) -> Result<&[u8]> {
    let Some(&last) = input.last() else {
        return Err(WeixinError::Crypto("解密后的数据为空".to_string()));
    };
    let pad = last as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > input.len() {
        return Err(WeixinError::Crypto("填充不合法".to_string()));
    }
    if !input[input.len() - pad..].iter().all(|&b| b == last) {
        return Err(WeixinError::Crypto("填充不合法".to_string()));
    }
    Ok(&input[..input.len() - pad])
}
