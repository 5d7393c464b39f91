//! 微信服务器推送的消息与事件
//!
//! 消息类型由 `MsgType` 决定，事件类型由 `Event` 决定，均不区分大小写。
//! 无法识别的类型解析为 [`InboundMessage::Unknown`]，保留原始字段。

use crate::error::{Result, WeixinError};
use crate::payload::Payload;

/// 扫码关注事件的 EventKey 前缀
pub const SUBSCRIBE_QRSCENE_PREFIX: &str = "qrscene_";

/// 所有消息共有的字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// 开发者微信号
    pub to_user_name: String,
    /// 发送方账号（OpenID）
    pub from_user_name: String,
    /// 消息创建时间
    pub create_time: i64,
    /// 消息类型
    pub msg_type: String,
}

impl MessageHeader {
    fn from_payload(payload: &Payload) -> Result<Self> {
        let create_time = payload.require("CreateTime")?;
        let create_time = create_time.trim().parse::<i64>().map_err(|_| {
            WeixinError::MalformedPayload(format!("CreateTime 不是整数: {}", create_time))
        })?;

        Ok(Self {
            to_user_name: payload.require("ToUserName")?.to_string(),
            from_user_name: payload.require("FromUserName")?.to_string(),
            create_time,
            msg_type: payload.require("MsgType")?.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub header: MessageHeader,
    pub msg_id: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMessage {
    pub header: MessageHeader,
    pub msg_id: String,
    pub pic_url: String,
    pub media_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceMessage {
    pub header: MessageHeader,
    pub msg_id: String,
    pub media_id: String,
    /// 语音格式，如 amr、speex
    pub format: String,
    /// 语音识别结果，未开启识别时为空
    pub recognition: String,
}

/// 视频与小视频消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMessage {
    pub header: MessageHeader,
    pub msg_id: String,
    pub media_id: String,
    pub thumb_media_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationMessage {
    pub header: MessageHeader,
    pub msg_id: String,
    pub location_x: String,
    pub location_y: String,
    pub scale: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkMessage {
    pub header: MessageHeader,
    pub msg_id: String,
    pub title: String,
    pub description: String,
    pub url: String,
}

/// 事件推送
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub header: MessageHeader,
    /// 原始事件名
    pub event_name: String,
    pub event: Event,
}

/// 事件类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// 关注
    Subscribe,
    /// 未关注用户扫描带参数二维码后关注
    SubscribeScan {
        event_key: String,
        /// 去掉 `qrscene_` 前缀后的场景值
        scene: String,
        ticket: Option<String>,
    },
    /// 取消关注
    Unsubscribe,
    /// 已关注用户扫描带参数二维码
    Scan {
        event_key: String,
        ticket: Option<String>,
    },
    /// 上报地理位置
    Location {
        latitude: String,
        longitude: String,
        precision: String,
    },
    /// 点击菜单拉取消息
    Click { event_key: String },
    /// 点击菜单跳转链接
    View { event_key: String },
    ScancodePush { event_key: String },
    ScancodeWaitmsg { event_key: String },
    PicSysPhoto { event_key: String },
    PicPhotoOrAlbum { event_key: String },
    PicWeixin { event_key: String },
    LocationSelect { event_key: String },
}

/// 服务器推送的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Text(TextMessage),
    Image(ImageMessage),
    Voice(VoiceMessage),
    Video(VideoMessage),
    ShortVideo(VideoMessage),
    Location(LocationMessage),
    Link(LinkMessage),
    Event(EventMessage),
    /// 无法识别的消息，保留原始字段
    Unknown(Payload),
}

impl InboundMessage {
    /// 消息头；未知消息没有可靠的消息头
    pub fn header(&self) -> Option<&MessageHeader> {
        match self {
            InboundMessage::Text(m) => Some(&m.header),
            InboundMessage::Image(m) => Some(&m.header),
            InboundMessage::Voice(m) => Some(&m.header),
            InboundMessage::Video(m) | InboundMessage::ShortVideo(m) => Some(&m.header),
            InboundMessage::Location(m) => Some(&m.header),
            InboundMessage::Link(m) => Some(&m.header),
            InboundMessage::Event(m) => Some(&m.header),
            InboundMessage::Unknown(_) => None,
        }
    }

    /// 消息 ID；事件与未知消息没有消息 ID
    pub fn msg_id(&self) -> Option<&str> {
        match self {
            InboundMessage::Text(m) => Some(&m.msg_id),
            InboundMessage::Image(m) => Some(&m.msg_id),
            InboundMessage::Voice(m) => Some(&m.msg_id),
            InboundMessage::Video(m) | InboundMessage::ShortVideo(m) => Some(&m.msg_id),
            InboundMessage::Location(m) => Some(&m.msg_id),
            InboundMessage::Link(m) => Some(&m.msg_id),
            InboundMessage::Event(_) | InboundMessage::Unknown(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Text(_) => "text",
            InboundMessage::Image(_) => "image",
            InboundMessage::Voice(_) => "voice",
            InboundMessage::Video(_) => "video",
            InboundMessage::ShortVideo(_) => "shortvideo",
            InboundMessage::Location(_) => "location",
            InboundMessage::Link(_) => "link",
            InboundMessage::Event(_) => "event",
            InboundMessage::Unknown(_) => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, InboundMessage::Unknown(_))
    }
}

fn owned(payload: &Payload, key: &str) -> Result<String> {
    payload.require(key).map(str::to_string)
}

fn optional(payload: &Payload, key: &str) -> Option<String> {
    payload.get(key).map(str::to_string)
}

fn event_key(payload: &Payload) -> String {
    payload.get("EventKey").unwrap_or_default().to_string()
}

/// 将解析后的字段转换为具体的消息类型
pub fn classify(payload: Payload) -> Result<InboundMessage> {
    let msg_type = match payload.get("MsgType") {
        Some(t) => t.trim().to_lowercase(),
        None => return Err(WeixinError::MissingField("MsgType".to_string())),
    };

    if msg_type == "event" {
        return classify_event(payload);
    }

    let message = match msg_type.as_str() {
        "text" => InboundMessage::Text(TextMessage {
            header: MessageHeader::from_payload(&payload)?,
            msg_id: owned(&payload, "MsgId")?,
            content: owned(&payload, "Content")?,
        }),
        "image" => InboundMessage::Image(ImageMessage {
            header: MessageHeader::from_payload(&payload)?,
            msg_id: owned(&payload, "MsgId")?,
            pic_url: owned(&payload, "PicUrl")?,
            media_id: owned(&payload, "MediaId")?,
        }),
        "voice" => InboundMessage::Voice(VoiceMessage {
            header: MessageHeader::from_payload(&payload)?,
            msg_id: owned(&payload, "MsgId")?,
            media_id: owned(&payload, "MediaId")?,
            format: owned(&payload, "Format")?,
            recognition: optional(&payload, "Recognition").unwrap_or_default(),
        }),
        "video" | "shortvideo" => {
            let video = VideoMessage {
                header: MessageHeader::from_payload(&payload)?,
                msg_id: owned(&payload, "MsgId")?,
                media_id: owned(&payload, "MediaId")?,
                thumb_media_id: owned(&payload, "ThumbMediaId")?,
            };
            if msg_type == "video" {
                InboundMessage::Video(video)
            } else {
                InboundMessage::ShortVideo(video)
            }
        }
        "location" => InboundMessage::Location(LocationMessage {
            header: MessageHeader::from_payload(&payload)?,
            msg_id: owned(&payload, "MsgId")?,
            location_x: owned(&payload, "Location_X")?,
            location_y: owned(&payload, "Location_Y")?,
            scale: optional(&payload, "Scale").unwrap_or_else(|| "1".to_string()),
            label: owned(&payload, "Label")?,
        }),
        "link" => InboundMessage::Link(LinkMessage {
            header: MessageHeader::from_payload(&payload)?,
            msg_id: owned(&payload, "MsgId")?,
            title: owned(&payload, "Title")?,
            description: owned(&payload, "Description")?,
            url: owned(&payload, "Url")?,
        }),
        other => {
            tracing::debug!("Unknown message type: {}", other);
            InboundMessage::Unknown(payload)
        }
    };

    Ok(message)
}

fn classify_event(payload: Payload) -> Result<InboundMessage> {
    let event_name = owned(&payload, "Event")?;
    let event = match event_name.trim().to_lowercase().as_str() {
        "subscribe" => {
            let key = event_key(&payload);
            match key.strip_prefix(SUBSCRIBE_QRSCENE_PREFIX) {
                Some(scene) => Event::SubscribeScan {
                    scene: scene.to_string(),
                    event_key: key.clone(),
                    ticket: optional(&payload, "Ticket"),
                },
                None => Event::Subscribe,
            }
        }
        "unsubscribe" => Event::Unsubscribe,
        "scan" => Event::Scan {
            event_key: event_key(&payload),
            ticket: optional(&payload, "Ticket"),
        },
        "location" => Event::Location {
            latitude: owned(&payload, "Latitude")?,
            longitude: owned(&payload, "Longitude")?,
            precision: owned(&payload, "Precision")?,
        },
        "click" => Event::Click {
            event_key: event_key(&payload),
        },
        "view" => Event::View {
            event_key: event_key(&payload),
        },
        "scancode_push" => Event::ScancodePush {
            event_key: event_key(&payload),
        },
        "scancode_waitmsg" => Event::ScancodeWaitmsg {
            event_key: event_key(&payload),
        },
        "pic_sysphoto" => Event::PicSysPhoto {
            event_key: event_key(&payload),
        },
        "pic_photo_or_album" => Event::PicPhotoOrAlbum {
            event_key: event_key(&payload),
        },
        "pic_weixin" => Event::PicWeixin {
            event_key: event_key(&payload),
        },
        "location_select" => Event::LocationSelect {
            event_key: event_key(&payload),
        },
        other => {
            tracing::debug!("Unknown event type: {}", other);
            return Ok(InboundMessage::Unknown(payload));
        }
    };

    Ok(InboundMessage::Event(EventMessage {
        header: MessageHeader::from_payload(&payload)?,
        event_name,
        event,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::decode;

    fn parse(body: &str) -> InboundMessage {
        let xml = format!(
            "<xml>\
            <ToUserName><![CDATA[toUser]]></ToUserName>\
            <FromUserName><![CDATA[fromUser]]></FromUserName>\
            <CreateTime>1348831860</CreateTime>\
            {}\
            </xml>",
            body
        );
        classify(decode(&xml).unwrap()).unwrap()
    }

    #[test]
    fn test_text_message() {
        let msg = parse(
            "<MsgType><![CDATA[text]]></MsgType>\
             <Content><![CDATA[这是测试数据]]></Content>\
             <MsgId>1234567890123456</MsgId>",
        );
        let InboundMessage::Text(text) = &msg else {
            panic!("expected text message, got {:?}", msg);
        };
        assert_eq!(text.content, "这是测试数据");
        assert_eq!(text.header.to_user_name, "toUser");
        assert_eq!(text.header.from_user_name, "fromUser");
        assert_eq!(text.header.create_time, 1348831860);
        assert_eq!(msg.msg_id(), Some("1234567890123456"));
    }

    #[test]
    fn test_image_message() {
        let msg = parse(
            "<MsgType><![CDATA[image]]></MsgType>\
             <PicUrl><![CDATA[这是测试URL]]></PicUrl>\
             <MediaId><![CDATA[media_id]]></MediaId>\
             <MsgId>1234567890123456</MsgId>",
        );
        let InboundMessage::Image(image) = msg else {
            panic!("expected image message");
        };
        assert_eq!(image.pic_url, "这是测试URL");
        assert_eq!(image.media_id, "media_id");
    }

    #[test]
    fn test_voice_message() {
        let msg = parse(
            "<MsgType><![CDATA[voice]]></MsgType>\
             <MediaId><![CDATA[media_id]]></MediaId>\
             <Format><![CDATA[Format]]></Format>\
             <Recognition><![CDATA[腾讯微信团队]]></Recognition>\
             <MsgId>1234567890123456</MsgId>",
        );
        let InboundMessage::Voice(voice) = msg else {
            panic!("expected voice message");
        };
        assert_eq!(voice.media_id, "media_id");
        assert_eq!(voice.format, "Format");
        assert_eq!(voice.recognition, "腾讯微信团队");
    }

    #[test]
    fn test_voice_without_recognition() {
        let msg = parse(
            "<MsgType><![CDATA[voice]]></MsgType>\
             <MediaId><![CDATA[media_id]]></MediaId>\
             <Format><![CDATA[amr]]></Format>\
             <MsgId>1</MsgId>",
        );
        let InboundMessage::Voice(voice) = msg else {
            panic!("expected voice message");
        };
        assert_eq!(voice.recognition, "");
    }

    #[test]
    fn test_video_and_shortvideo() {
        let msg = parse(
            "<MsgType><![CDATA[video]]></MsgType>\
             <MediaId><![CDATA[media_id]]></MediaId>\
             <ThumbMediaId><![CDATA[thumb_media_id]]></ThumbMediaId>\
             <MsgId>1234567890123456</MsgId>",
        );
        let InboundMessage::Video(video) = msg else {
            panic!("expected video message");
        };
        assert_eq!(video.thumb_media_id, "thumb_media_id");

        let msg = parse(
            "<MsgType><![CDATA[shortvideo]]></MsgType>\
             <MediaId><![CDATA[short_media_id]]></MediaId>\
             <ThumbMediaId><![CDATA[short_thumb_media_id]]></ThumbMediaId>\
             <MsgId>1234567890123456</MsgId>",
        );
        let InboundMessage::ShortVideo(video) = msg else {
            panic!("expected short video message");
        };
        assert_eq!(video.media_id, "short_media_id");
        assert_eq!(video.thumb_media_id, "short_thumb_media_id");
    }

    #[test]
    fn test_location_message() {
        let msg = parse(
            "<MsgType><![CDATA[location]]></MsgType>\
             <Location_X>23.134521</Location_X>\
             <Location_Y>113.358803</Location_Y>\
             <Scale>20</Scale>\
             <Label><![CDATA[位置信息]]></Label>\
             <MsgId>1234567890123456</MsgId>",
        );
        let InboundMessage::Location(location) = msg else {
            panic!("expected location message");
        };
        assert_eq!(location.location_x, "23.134521");
        assert_eq!(location.location_y, "113.358803");
        assert_eq!(location.scale, "20");
        assert_eq!(location.label, "位置信息");
    }

    #[test]
    fn test_link_message() {
        let msg = parse(
            "<MsgType><![CDATA[link]]></MsgType>\
             <Title><![CDATA[Title]]></Title>\
             <Description><![CDATA[公众平台官网链接]]></Description>\
             <Url><![CDATA[这是测试URL]]></Url>\
             <MsgId>1234567890123456</MsgId>",
        );
        let InboundMessage::Link(link) = msg else {
            panic!("expected link message");
        };
        assert_eq!(link.title, "Title");
        assert_eq!(link.description, "公众平台官网链接");
        assert_eq!(link.url, "这是测试URL");
    }

    #[test]
    fn test_unknown_message_type() {
        let msg = parse(
            "<MsgType><![CDATA[WrongType]]></MsgType>\
             <Title><![CDATA[Title]]></Title>\
             <MsgId>1234567890123456</MsgId>",
        );
        let InboundMessage::Unknown(raw) = &msg else {
            panic!("expected unknown message");
        };
        assert_eq!(raw.get("MsgType"), Some("WrongType"));
        assert!(msg.header().is_none());
    }

    #[test]
    fn test_msg_type_is_case_insensitive() {
        let msg = parse(
            "<MsgType><![CDATA[TEXT]]></MsgType>\
             <Content><![CDATA[hi]]></Content>\
             <MsgId>1</MsgId>",
        );
        assert_eq!(msg.kind(), "text");
    }

    #[test]
    fn test_subscribe_events() {
        let msg = parse(
            "<MsgType><![CDATA[event]]></MsgType>\
             <Event><![CDATA[subscribe]]></Event>",
        );
        let InboundMessage::Event(event) = &msg else {
            panic!("expected event");
        };
        assert_eq!(event.event, Event::Subscribe);
        assert_eq!(msg.msg_id(), None);

        let msg = parse(
            "<MsgType><![CDATA[event]]></MsgType>\
             <Event><![CDATA[subscribe]]></Event>\
             <EventKey><![CDATA[qrscene_123123]]></EventKey>\
             <Ticket><![CDATA[TICKET]]></Ticket>",
        );
        let InboundMessage::Event(event) = msg else {
            panic!("expected event");
        };
        assert_eq!(
            event.event,
            Event::SubscribeScan {
                event_key: "qrscene_123123".to_string(),
                scene: "123123".to_string(),
                ticket: Some("TICKET".to_string()),
            }
        );
    }

    #[test]
    fn test_keyed_events_are_case_insensitive() {
        let msg = parse(
            "<MsgType><![CDATA[event]]></MsgType>\
             <Event><![CDATA[CLICK]]></Event>\
             <EventKey><![CDATA[EVENTKEY]]></EventKey>",
        );
        let InboundMessage::Event(event) = msg else {
            panic!("expected event");
        };
        assert_eq!(event.event_name, "CLICK");
        assert_eq!(
            event.event,
            Event::Click {
                event_key: "EVENTKEY".to_string()
            }
        );

        let msg = parse(
            "<MsgType><![CDATA[event]]></MsgType>\
             <Event><![CDATA[SCAN]]></Event>\
             <EventKey><![CDATA[SCENE_VALUE]]></EventKey>\
             <Ticket><![CDATA[TICKET]]></Ticket>",
        );
        let InboundMessage::Event(event) = msg else {
            panic!("expected event");
        };
        assert!(matches!(event.event, Event::Scan { ref event_key, .. } if event_key == "SCENE_VALUE"));
    }

    #[test]
    fn test_location_event() {
        let msg = parse(
            "<MsgType><![CDATA[event]]></MsgType>\
             <Event><![CDATA[LOCATION]]></Event>\
             <Latitude>23.137466</Latitude>\
             <Longitude>113.352425</Longitude>\
             <Precision>119.385040</Precision>",
        );
        let InboundMessage::Event(event) = msg else {
            panic!("expected event");
        };
        assert_eq!(
            event.event,
            Event::Location {
                latitude: "23.137466".to_string(),
                longitude: "113.352425".to_string(),
                precision: "119.385040".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_event() {
        let msg = parse(
            "<MsgType><![CDATA[event]]></MsgType>\
             <Event><![CDATA[TEMPLATESENDJOBFINISH]]></Event>",
        );
        assert!(msg.is_unknown());
    }

    #[test]
    fn test_missing_required_field() {
        let payload = decode(
            "<xml><ToUserName>a</ToUserName><FromUserName>b</FromUserName>\
             <CreateTime>1</CreateTime><MsgType>text</MsgType><MsgId>1</MsgId></xml>",
        )
        .unwrap();
        let err = classify(payload).unwrap_err();
        assert!(matches!(err, WeixinError::MissingField(ref f) if f == "Content"));

        let err = classify(Payload::new()).unwrap_err();
        assert!(matches!(err, WeixinError::MissingField(ref f) if f == "MsgType"));
    }

    #[test]
    fn test_invalid_create_time() {
        let payload = Payload::new()
            .with("ToUserName", "a")
            .with("FromUserName", "b")
            .with("CreateTime", "yesterday")
            .with("MsgType", "text")
            .with("MsgId", "1")
            .with("Content", "c");
        assert!(matches!(
            classify(payload),
            Err(WeixinError::MalformedPayload(_))
        ));
    }
}
