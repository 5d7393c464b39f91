//! 自定义菜单
//!
//! 一级菜单最多 3 个，每个子菜单最多 5 个按钮，子菜单下不能再嵌套子菜单。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use weixin_core::{Result, WeixinError};

pub const MAX_TOP_LEVEL_BUTTONS: usize = 3;
pub const MAX_SUB_BUTTONS: usize = 5;

/// 按钮动作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MenuAction {
    Click { key: String },
    View { url: String },
    ScancodePush { key: String },
    ScancodeWaitmsg { key: String },
    PicSysphoto { key: String },
    PicPhotoOrAlbum { key: String },
    PicWeixin { key: String },
    LocationSelect { key: String },
    Miniprogram {
        url: String,
        appid: String,
        pagepath: String,
    },
    MediaId { media_id: String },
    ViewLimited { media_id: String },
}

/// 带动作的按钮
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafButton {
    pub name: String,
    #[serde(flatten)]
    pub action: MenuAction,
}

impl LeafButton {
    pub fn new(name: impl Into<String>, action: MenuAction) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }
}

/// 一级菜单项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MenuButton {
    Leaf(LeafButton),
    Submenu {
        name: String,
        sub_button: Vec<LeafButton>,
    },
}

impl MenuButton {
    pub fn leaf(name: impl Into<String>, action: MenuAction) -> Self {
        MenuButton::Leaf(LeafButton::new(name, action))
    }

    pub fn submenu(name: impl Into<String>, children: Vec<LeafButton>) -> Self {
        MenuButton::Submenu {
            name: name.into(),
            sub_button: children,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MenuButton::Leaf(leaf) => &leaf.name,
            MenuButton::Submenu { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    #[serde(default)]
    pub button: Vec<MenuButton>,
}

impl Menu {
    pub fn new(button: Vec<MenuButton>) -> Self {
        Self { button }
    }

    /// 从菜单 JSON 构造，兼容查询接口返回的 `{"menu": {...}}` 格式
    pub fn from_value(value: &Value) -> Result<Self> {
        let inner = value.get("menu").unwrap_or(value);
        if inner.get("button").is_none() {
            return Err(WeixinError::InvalidMenu("缺少 button 字段".to_string()));
        }

        let menu: Menu = serde_json::from_value(inner.clone())
            .map_err(|e| WeixinError::InvalidMenu(e.to_string()))?;
        menu.validate()?;
        Ok(menu)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.button.is_empty() {
            return Err(WeixinError::InvalidMenu("菜单为空".to_string()));
        }
        if self.button.len() > MAX_TOP_LEVEL_BUTTONS {
            return Err(WeixinError::InvalidMenu(format!(
                "一级菜单最多 {} 个，实际 {} 个",
                MAX_TOP_LEVEL_BUTTONS,
                self.button.len()
            )));
        }

        for button in &self.button {
            if let MenuButton::Submenu { name, sub_button } = button {
                if sub_button.is_empty() || sub_button.len() > MAX_SUB_BUTTONS {
                    return Err(WeixinError::InvalidMenu(format!(
                        "子菜单 {} 应有 1 到 {} 个按钮，实际 {} 个",
                        name,
                        MAX_SUB_BUTTONS,
                        sub_button.len()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.button.iter().map(MenuButton::name).collect()
    }
}
