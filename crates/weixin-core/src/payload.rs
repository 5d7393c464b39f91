//! 微信消息 XML 解析
//!
//! 微信推送的消息是只有一层子节点的扁平 XML，子节点名作为键，文本（含 CDATA）作为值。
//! 含有子节点的元素不做递归解析，其值视为无文本。

use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

use crate::error::{Result, WeixinError};

/// 解析后的消息字段
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    fields: HashMap<String, Option<String>>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加字段，便于在代码中构造消息
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), Some(value.into()));
        self
    }

    /// 字段文本；字段不存在或无文本时返回 None
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_deref())
    }

    /// 必需字段；字段存在但无文本时视为空字符串
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.fields.get(key) {
            Some(value) => Ok(value.as_deref().unwrap_or_default()),
            None => Err(WeixinError::MissingField(key.to_string())),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// 字段存在但没有文本（空元素或含子节点的元素）
    pub fn is_textless(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(None))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }
}

struct Field {
    name: String,
    text: String,
    has_text: bool,
    nested: bool,
}

impl Field {
    fn new(name: String) -> Self {
        Self {
            name,
            text: String::new(),
            has_text: false,
            nested: false,
        }
    }

    fn push(&mut self, text: &str) {
        self.text.push_str(text);
        self.has_text = true;
    }

    fn into_entry(self) -> (String, Option<String>) {
        let value = (!self.nested && self.has_text).then_some(self.text);
        (self.name, value)
    }
}

fn tag_name(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| WeixinError::MalformedPayload(format!("元素名不是 UTF-8: {}", e)))
}

/// 将消息 XML 解析为字段集合
pub fn decode(xml: &str) -> Result<Payload> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields = HashMap::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut current: Option<Field> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            WeixinError::MalformedPayload(format!("{} (位置 {})", e, reader.error_position()))
        })?;

        match event {
            Event::Start(e) => {
                match depth {
                    0 if seen_root => {
                        return Err(WeixinError::MalformedPayload("存在多个根节点".to_string()));
                    }
                    0 => seen_root = true,
                    1 => current = Some(Field::new(tag_name(e.name().as_ref())?)),
                    _ => {
                        if let Some(field) = current.as_mut() {
                            field.nested = true;
                        }
                    }
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if depth == 1 {
                    if let Some(field) = current.take() {
                        let (name, value) = field.into_entry();
                        fields.insert(name, value);
                    }
                }
            }
            Event::Empty(e) => match depth {
                0 if seen_root => {
                    return Err(WeixinError::MalformedPayload("存在多个根节点".to_string()));
                }
                0 => seen_root = true,
                1 => {
                    fields.insert(tag_name(e.name().as_ref())?, None);
                }
                _ => {
                    if let Some(field) = current.as_mut() {
                        field.nested = true;
                    }
                }
            },
            Event::Text(e) => {
                let text = e
                    .unescape()
                    .map_err(|e| WeixinError::MalformedPayload(e.to_string()))?;
                if depth == 0 {
                    return Err(WeixinError::MalformedPayload(format!(
                        "根节点外存在文本: {}",
                        text
                    )));
                }
                if depth == 2 {
                    if let Some(field) = current.as_mut() {
                        field.push(&text);
                    }
                }
            }
            Event::CData(e) => {
                let text = String::from_utf8(e.into_inner().into_owned())
                    .map_err(|e| WeixinError::MalformedPayload(e.to_string()))?;
                if depth == 2 {
                    if let Some(field) = current.as_mut() {
                        field.push(&text);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(WeixinError::MalformedPayload("缺少根节点".to_string()));
    }
    if depth != 0 {
        return Err(WeixinError::MalformedPayload("存在未闭合的元素".to_string()));
    }

    Ok(Payload { fields })
}
