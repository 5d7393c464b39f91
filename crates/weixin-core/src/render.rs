//! 被动回复消息渲染
//!
//! 按平台固定的 XML 模板生成回复，文本字段使用 CDATA 包裹，不做长度和编码校验。

use std::fmt::Write;

/// 图文消息中的一篇文章
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub pic_url: String,
    pub url: String,
}

impl Article {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        pic_url: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            pic_url: pic_url.into(),
            url: url.into(),
        }
    }
}

/// 音乐消息内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Music {
    pub title: String,
    pub description: String,
    pub music_url: String,
    pub hq_music_url: String,
    pub thumb_media_id: String,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn header(to_user: &str, from_user: &str, timestamp: Option<i64>, msg_type: &str) -> String {
    format!(
        "<ToUserName><![CDATA[{}]]></ToUserName>\
         <FromUserName><![CDATA[{}]]></FromUserName>\
         <CreateTime>{}</CreateTime>\
         <MsgType><![CDATA[{}]]></MsgType>",
        to_user,
        from_user,
        timestamp.unwrap_or_else(now),
        msg_type
    )
}

pub fn text(to_user: &str, from_user: &str, content: &str, timestamp: Option<i64>) -> String {
    format!(
        "<xml>{}<Content><![CDATA[{}]]></Content></xml>",
        header(to_user, from_user, timestamp, "text"),
        content
    )
}

pub fn image(to_user: &str, from_user: &str, media_id: &str, timestamp: Option<i64>) -> String {
    format!(
        "<xml>{}<Image><MediaId><![CDATA[{}]]></MediaId></Image></xml>",
        header(to_user, from_user, timestamp, "image"),
        media_id
    )
}

pub fn voice(to_user: &str, from_user: &str, media_id: &str, timestamp: Option<i64>) -> String {
    format!(
        "<xml>{}<Voice><MediaId><![CDATA[{}]]></MediaId></Voice></xml>",
        header(to_user, from_user, timestamp, "voice"),
        media_id
    )
}

pub fn video(
    to_user: &str,
    from_user: &str,
    media_id: &str,
    title: &str,
    description: &str,
    timestamp: Option<i64>,
) -> String {
    format!(
        "<xml>{}<Video>\
         <MediaId><![CDATA[{}]]></MediaId>\
         <Title><![CDATA[{}]]></Title>\
         <Description><![CDATA[{}]]></Description>\
         </Video></xml>",
        header(to_user, from_user, timestamp, "video"),
        media_id,
        title,
        description
    )
}

pub fn music(to_user: &str, from_user: &str, music: &Music, timestamp: Option<i64>) -> String {
    format!(
        "<xml>{}<Music>\
         <Title><![CDATA[{}]]></Title>\
         <Description><![CDATA[{}]]></Description>\
         <MusicUrl><![CDATA[{}]]></MusicUrl>\
         <HQMusicUrl><![CDATA[{}]]></HQMusicUrl>\
         <ThumbMediaId><![CDATA[{}]]></ThumbMediaId>\
         </Music></xml>",
        header(to_user, from_user, timestamp, "music"),
        music.title,
        music.description,
        music.music_url,
        music.hq_music_url,
        music.thumb_media_id
    )
}

pub fn news(to_user: &str, from_user: &str, articles: &[Article], timestamp: Option<i64>) -> String {
    let mut items = String::new();
    for article in articles {
        let _ = write!(
            items,
            "<item>\
             <Title><![CDATA[{}]]></Title>\
             <Description><![CDATA[{}]]></Description>\
             <PicUrl><![CDATA[{}]]></PicUrl>\
             <Url><![CDATA[{}]]></Url>\
             </item>",
            article.title, article.description, article.pic_url, article.url
        );
    }

    format!(
        "<xml>{}<ArticleCount>{}</ArticleCount><Articles>{}</Articles></xml>",
        header(to_user, from_user, timestamp, "news"),
        articles.len(),
        items
    )
}

/// 绑定公众号的渲染器，回复方固定为公众号本身
#[derive(Debug, Clone)]
pub struct Renderer {
    account: String,
}

impl Renderer {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn text(&self, to_user: &str, content: &str) -> String {
        text(to_user, &self.account, content, None)
    }

    pub fn image(&self, to_user: &str, media_id: &str) -> String {
        image(to_user, &self.account, media_id, None)
    }

    pub fn voice(&self, to_user: &str, media_id: &str) -> String {
        voice(to_user, &self.account, media_id, None)
    }

    pub fn video(&self, to_user: &str, media_id: &str, title: &str, description: &str) -> String {
        video(to_user, &self.account, media_id, title, description, None)
    }

    pub fn music(&self, to_user: &str, item: &Music) -> String {
        music(to_user, &self.account, item, None)
    }

    pub fn news(&self, to_user: &str, articles: &[Article]) -> String {
        news(to_user, &self.account, articles, None)
    }
}
