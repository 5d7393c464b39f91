//! 公众号 API 客户端
//!
//! 所有调用都附带当前有效的 access_token；服务器返回令牌失效类错误码时清除缓存，
//! 错误照常返回给调用方，不自动重试。

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use weixin_core::{Result, WeixinError};

use crate::menu::Menu;
use crate::models::*;
use crate::token::AccessTokenManager;
use crate::transport::{ApiRequest, ApiResponse, ApiTransport};

/// 令牌无效、不合法或已过期
pub const INVALID_TOKEN_CODES: [i64; 3] = [40001, 40014, 42001];

/// 菜单不存在
pub const MENU_NOT_FOUND: i64 = 46003;

pub struct ApiClient {
    transport: Arc<dyn ApiTransport>,
    tokens: Arc<AccessTokenManager>,
}

fn field<T: DeserializeOwned>(value: &Value, key: &str) -> Result<T> {
    let raw = value
        .get(key)
        .ok_or_else(|| WeixinError::Http(format!("微信 API 响应缺少字段 {}", key)))?;
    Ok(serde_json::from_value(raw.clone())?)
}

impl ApiClient {
    pub fn new(
        appid: impl Into<String>,
        secret: impl Into<String>,
        transport: Arc<dyn ApiTransport>,
    ) -> Self {
        let tokens = Arc::new(AccessTokenManager::new(appid, secret, transport.clone()));
        Self { transport, tokens }
    }

    pub fn with_token_manager(
        transport: Arc<dyn ApiTransport>,
        tokens: Arc<AccessTokenManager>,
    ) -> Self {
        Self { transport, tokens }
    }

    pub fn appid(&self) -> &str {
        self.tokens.appid()
    }

    pub fn token_manager(&self) -> &Arc<AccessTokenManager> {
        &self.tokens
    }

    /// 当前有效的 access_token
    pub async fn token(&self) -> Result<String> {
        self.tokens.token().await
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let token = self.tokens.token().await?;
        self.transport
            .execute(request.query("access_token", token))
            .await
    }

    async fn watch_token_error<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if let Some(code) = err.api_code() {
                if INVALID_TOKEN_CODES.contains(&code) {
                    tracing::warn!("Access token rejected for {} ({}), cache cleared", self.appid(), code);
                    self.tokens.invalidate().await;
                }
            }
        }
        result
    }

    /// 发送请求并取 JSON 响应
    pub async fn call(&self, request: ApiRequest) -> Result<Value> {
        let path = request.path.clone();
        let result = match self.send(request).await {
            Ok(response) => response.into_json(),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            tracing::debug!("Weixin API {} failed: {}", path, e);
        }
        self.watch_token_error(result).await
    }

    /// 发送请求并取二进制响应
    pub async fn download(&self, request: ApiRequest) -> Result<Vec<u8>> {
        let result = match self.send(request).await {
            Ok(response) => response.into_bytes(),
            Err(e) => Err(e),
        };
        self.watch_token_error(result).await
    }

    // 自定义菜单

    pub async fn create_menu(&self, menu: &Menu) -> Result<()> {
        menu.validate()?;
        self.call(ApiRequest::post("menu/create", menu.to_value()?))
            .await?;
        Ok(())
    }

    /// 查询菜单；未创建菜单时返回 None
    pub async fn get_menu(&self) -> Result<Option<Menu>> {
        match self.call(ApiRequest::get("menu/get")).await {
            Ok(value) => Menu::from_value(&value).map(Some),
            Err(e) if e.api_code() == Some(MENU_NOT_FOUND) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn delete_menu(&self) -> Result<()> {
        self.call(ApiRequest::get("menu/delete")).await?;
        Ok(())
    }

    // 临时素材

    pub async fn upload_media(
        &self,
        media_type: MediaType,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<MediaUpload> {
        let request = ApiRequest::upload("media/upload", filename, content)
            .query("type", media_type.as_str());
        Ok(serde_json::from_value(self.call(request).await?)?)
    }

    pub async fn download_media(&self, media_id: &str) -> Result<Vec<u8>> {
        self.download(ApiRequest::get("media/get").query("media_id", media_id))
            .await
    }

    // 永久素材

    /// 上传视频以外的永久素材
    pub async fn add_material(
        &self,
        media_type: MediaType,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<MaterialUpload> {
        if media_type == MediaType::Video {
            return Err(WeixinError::Http(
                "视频素材需要标题和简介，请使用 add_video_material".to_string(),
            ));
        }
        let request = ApiRequest::upload("material/add_material", filename, content)
            .query("type", media_type.as_str());
        Ok(serde_json::from_value(self.call(request).await?)?)
    }

    pub async fn add_video_material(
        &self,
        filename: &str,
        content: Vec<u8>,
        title: &str,
        introduction: &str,
    ) -> Result<MaterialUpload> {
        let description = json!({"title": title, "introduction": introduction});
        let request = ApiRequest::upload("material/add_material", filename, content)
            .query("type", MediaType::Video.as_str())
            .form_field("description", description.to_string());
        Ok(serde_json::from_value(self.call(request).await?)?)
    }

    pub async fn get_material(&self, media_id: &str) -> Result<Vec<u8>> {
        self.download(ApiRequest::post(
            "material/get_material",
            json!({"media_id": media_id}),
        ))
        .await
    }

    pub async fn get_video_material(&self, media_id: &str) -> Result<VideoMaterial> {
        let value = self
            .call(ApiRequest::post(
                "material/get_material",
                json!({"media_id": media_id}),
            ))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete_material(&self, media_id: &str) -> Result<()> {
        self.call(ApiRequest::post(
            "material/del_material",
            json!({"media_id": media_id}),
        ))
        .await?;
        Ok(())
    }

    pub async fn material_count(&self) -> Result<MaterialCount> {
        let value = self.call(ApiRequest::get("material/get_materialcount")).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 分页获取永久素材列表，结果结构随素材类型不同，按原样返回
    pub async fn material_list(
        &self,
        media_type: &str,
        offset: u64,
        count: u64,
    ) -> Result<Value> {
        self.call(ApiRequest::post(
            "material/batchget_material",
            json!({"type": media_type, "offset": offset, "count": count}),
        ))
        .await
    }

    /// 上传永久图文素材，返回 media_id
    pub async fn add_news(&self, articles: &[NewsArticle]) -> Result<String> {
        let value = self
            .call(ApiRequest::post(
                "material/add_news",
                json!({ "articles": articles }),
            ))
            .await?;
        field(&value, "media_id")
    }

    // 用户管理

    pub async fn user_info(&self, openid: &str) -> Result<Subscriber> {
        let value = self
            .call(
                ApiRequest::get("user/info")
                    .query("openid", openid)
                    .query("lang", "zh_CN"),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 关注者列表，`next_openid` 为空时从头开始
    pub async fn subscribers(&self, next_openid: Option<&str>) -> Result<SubscriberList> {
        let mut request = ApiRequest::get("user/get");
        if let Some(openid) = next_openid.filter(|s| !s.is_empty()) {
            request = request.query("next_openid", openid);
        }
        Ok(serde_json::from_value(self.call(request).await?)?)
    }

    // 标签管理

    pub async fn create_tag(&self, name: &str) -> Result<Tag> {
        let value = self
            .call(ApiRequest::post("tags/create", json!({"tag": {"name": name}})))
            .await?;
        field(&value, "tag")
    }

    pub async fn tags(&self) -> Result<Vec<Tag>> {
        let value = self.call(ApiRequest::get("tags/get")).await?;
        field(&value, "tags")
    }

    pub async fn update_tag(&self, id: i64, name: &str) -> Result<()> {
        self.call(ApiRequest::post(
            "tags/update",
            json!({"tag": {"id": id, "name": name}}),
        ))
        .await?;
        Ok(())
    }

    pub async fn delete_tag(&self, id: i64) -> Result<()> {
        self.call(ApiRequest::post("tags/delete", json!({"tag": {"id": id}})))
            .await?;
        Ok(())
    }

    pub async fn tag_users(&self, tag_id: i64, openids: &[String]) -> Result<()> {
        self.call(ApiRequest::post(
            "tags/members/batchtagging",
            json!({"openid_list": openids, "tagid": tag_id}),
        ))
        .await?;
        Ok(())
    }

    pub async fn untag_users(&self, tag_id: i64, openids: &[String]) -> Result<()> {
        self.call(ApiRequest::post(
            "tags/members/batchuntagging",
            json!({"openid_list": openids, "tagid": tag_id}),
        ))
        .await?;
        Ok(())
    }

    // 分组管理

    pub async fn create_group(&self, name: &str) -> Result<Group> {
        let value = self
            .call(ApiRequest::post(
                "groups/create",
                json!({"group": {"name": name}}),
            ))
            .await?;
        let group = value.get("group").cloned().unwrap_or(value);
        Ok(serde_json::from_value(group)?)
    }

    pub async fn groups(&self) -> Result<Vec<Group>> {
        let value = self.call(ApiRequest::get("groups/get")).await?;
        field(&value, "groups")
    }

    /// 用户所在分组的 ID
    pub async fn user_group(&self, openid: &str) -> Result<i64> {
        let value = self
            .call(ApiRequest::post("groups/getid", json!({"openid": openid})))
            .await?;
        field(&value, "groupid")
    }

    pub async fn update_group(&self, id: i64, name: &str) -> Result<()> {
        self.call(ApiRequest::post(
            "groups/update",
            json!({"group": {"id": id, "name": name}}),
        ))
        .await?;
        Ok(())
    }

    pub async fn delete_group(&self, id: i64) -> Result<()> {
        self.call(ApiRequest::post(
            "groups/delete",
            json!({"group": {"id": id}}),
        ))
        .await?;
        Ok(())
    }

    // 其他

    pub async fn mass_status(&self, msg_id: i64) -> Result<MassStatus> {
        let value = self
            .call(ApiRequest::post("message/mass/get", json!({"msg_id": msg_id})))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 微信服务器 IP 地址列表
    pub async fn callback_ips(&self) -> Result<Vec<String>> {
        let value = self.call(ApiRequest::get("getcallbackip")).await?;
        field(&value, "ip_list")
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("appid", &self.appid())
            .finish_non_exhaustive()
    }
}
