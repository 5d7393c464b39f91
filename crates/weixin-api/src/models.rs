//! 接口数据类型

use serde::{Deserialize, Serialize};

/// 素材类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Voice,
    Video,
    Thumb,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Voice => "voice",
            MediaType::Video => "video",
            MediaType::Thumb => "thumb",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = weixin_core::WeixinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "voice" => Ok(MediaType::Voice),
            "video" => Ok(MediaType::Video),
            "thumb" => Ok(MediaType::Thumb),
            other => Err(weixin_core::WeixinError::Config(format!(
                "未知的素材类型: {}",
                other
            ))),
        }
    }
}

/// 临时素材上传结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaUpload {
    #[serde(rename = "type", default)]
    pub media_type: String,
    /// 缩略图上传时返回 thumb_media_id
    #[serde(alias = "thumb_media_id")]
    pub media_id: String,
    #[serde(default)]
    pub created_at: i64,
}

/// 永久素材上传结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialUpload {
    pub media_id: String,
    /// 图片素材的访问地址
    #[serde(default)]
    pub url: Option<String>,
}

/// 视频素材信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMaterial {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub down_url: String,
}

/// 永久素材总数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialCount {
    #[serde(default)]
    pub voice_count: u64,
    #[serde(default)]
    pub video_count: u64,
    #[serde(default)]
    pub image_count: u64,
    #[serde(default)]
    pub news_count: u64,
}

/// 永久图文素材中的文章
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub thumb_media_id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub show_cover_pic: u8,
    pub content: String,
    #[serde(default)]
    pub content_source_url: String,
}

/// 用户基本信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subscriber {
    pub subscribe: i32,
    pub openid: String,
    pub nickname: String,
    pub sex: i32,
    pub language: String,
    pub city: String,
    pub province: String,
    pub country: String,
    pub headimgurl: String,
    pub subscribe_time: i64,
    pub unionid: Option<String>,
    pub remark: String,
    pub groupid: i64,
    pub tagid_list: Vec<i64>,
}

impl Subscriber {
    pub fn is_subscribed(&self) -> bool {
        self.subscribe == 1
    }
}

/// 关注者 OpenID 列表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdList {
    #[serde(default)]
    pub openid: Vec<String>,
}

/// 关注者列表的一页
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberList {
    pub total: u64,
    pub count: u64,
    pub data: OpenIdList,
    pub next_openid: String,
}

impl SubscriberList {
    pub fn openids(&self) -> &[String] {
        &self.data.openid
    }

    /// 是否还有下一页
    pub fn has_next(&self) -> bool {
        self.count > 0 && self.openids().last().map(String::as_str) == Some(self.next_openid.as_str())
    }
}

/// 用户标签
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

/// 用户分组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub count: u64,
}

/// 群发消息状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MassStatus {
    pub msg_id: i64,
    pub msg_status: String,
}
