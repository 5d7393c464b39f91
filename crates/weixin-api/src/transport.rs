//! 接口传输层
//!
//! [`ApiTransport`] 负责把请求发送到微信服务器，客户端只和这个 trait 打交道，
//! 测试中可以替换为脚本化的实现。

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;
use weixin_core::{Result, WeixinError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// 请求体
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// 文件上传，`fields` 为附加的表单字段
    Multipart {
        filename: String,
        content: Vec<u8>,
        fields: Vec<(String, String)>,
    },
}

/// 一次接口调用
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// 相对 API 基础地址的路径，例如 `menu/create`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Json(body),
        }
    }

    pub fn upload(path: impl Into<String>, filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Multipart {
                filename: filename.into(),
                content,
                fields: Vec::new(),
            },
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let RequestBody::Multipart { fields, .. } = &mut self.body {
            fields.push((key.into(), value.into()));
        }
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// 接口响应
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    /// 媒体文件等二进制内容
    Binary(Vec<u8>),
}

impl ApiResponse {
    /// 取 JSON 响应并检查错误码
    pub fn into_json(self) -> Result<Value> {
        match self {
            ApiResponse::Json(value) => {
                check_api_error(&value)?;
                Ok(value)
            }
            ApiResponse::Binary(data) => Err(WeixinError::Http(format!(
                "期望 JSON 响应，实际收到 {} 字节二进制内容",
                data.len()
            ))),
        }
    }

    /// 取二进制响应；JSON 响应先检查错误码，再按原文返回
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            ApiResponse::Binary(data) => Ok(data),
            ApiResponse::Json(value) => {
                check_api_error(&value)?;
                Ok(serde_json::to_vec(&value)?)
            }
        }
    }
}

/// 检查响应中的 errcode，非零时返回 [`WeixinError::Api`]
pub fn check_api_error(value: &Value) -> Result<()> {
    let code = value.get("errcode").and_then(Value::as_i64).unwrap_or(0);
    if code == 0 {
        return Ok(());
    }

    let message = value
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Err(WeixinError::Api { code, message })
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// 基于 reqwest 的传输实现
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WeixinError::Http(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &weixin_core::ApiConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn is_json_content(content_type: &str) -> bool {
    content_type.contains("json") || content_type.starts_with("text/")
}

#[async_trait]
impl ApiTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = format!("{}/{}", self.base_url, request.path.trim_start_matches('/'));
        tracing::debug!("Weixin API request: {:?} {}", request.method, url);

        let builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        }
        .query(&request.query);

        let builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart {
                filename,
                content,
                fields,
            } => {
                let mut form = Form::new().part("media", Part::bytes(content).file_name(filename));
                for (key, value) in fields {
                    form = form.text(key, value);
                }
                builder.multipart(form)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| WeixinError::Http(format!("微信 API 请求失败: {}", e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| WeixinError::Http(format!("读取微信 API 响应失败: {}", e)))?;

        if !status.is_success() {
            return Err(WeixinError::Http(format!(
                "微信 API 返回状态码 {}: {}",
                status,
                String::from_utf8_lossy(&bytes)
            )));
        }

        if is_json_content(&content_type) {
            if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
                return Ok(ApiResponse::Json(value));
            }
        }
        Ok(ApiResponse::Binary(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> ReqwestTransport {
        ReqwestTransport::new(format!("{}/cgi-bin/", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_check_api_error() {
        assert!(check_api_error(&json!({"access_token": "x"})).is_ok());
        assert!(check_api_error(&json!({"errcode": 0, "errmsg": "ok"})).is_ok());

        let err = check_api_error(&json!({"errcode": 40013, "errmsg": "invalid appid"})).unwrap_err();
        assert_eq!(err.api_code(), Some(40013));
        assert!(err.to_string().contains("invalid appid"));
    }

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::upload("media/upload", "a.jpg", vec![1, 2])
            .query("type", "image")
            .form_field("description", "{}");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.query_value("type"), Some("image"));
        assert!(matches!(
            request.body,
            RequestBody::Multipart { ref fields, .. } if fields.len() == 1
        ));

        let request = ApiRequest::get("menu/get").form_field("ignored", "x");
        assert_eq!(request.body, RequestBody::Empty);
    }

    #[tokio::test]
    async fn test_get_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/getcallbackip"))
            .and(query_param("access_token", "TOKEN"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ip_list": ["127.0.0.1"]
            })))
            .mount(&server)
            .await;

        let response = transport(&server)
            .execute(ApiRequest::get("getcallbackip").query("access_token", "TOKEN"))
            .await
            .unwrap();
        assert_eq!(response, ApiResponse::Json(json!({"ip_list": ["127.0.0.1"]})));
    }

    #[tokio::test]
    async fn test_post_json_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cgi-bin/menu/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errcode": 40018,
                "errmsg": "invalid button name size"
            })))
            .mount(&server)
            .await;

        let response = transport(&server)
            .execute(ApiRequest::post("menu/create", json!({"button": []})))
            .await
            .unwrap();
        let err = response.into_json().unwrap_err();
        assert_eq!(err.api_code(), Some(40018));
    }

    #[tokio::test]
    async fn test_binary_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cgi-bin/media/get"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(vec![0xFFu8, 0xD8, 0xFF], "image/jpeg"),
            )
            .mount(&server)
            .await;

        let response = transport(&server)
            .execute(ApiRequest::get("media/get").query("media_id", "m"))
            .await
            .unwrap();
        assert_eq!(response.clone().into_bytes().unwrap(), vec![0xFF, 0xD8, 0xFF]);
        assert!(response.into_json().is_err());
    }

    #[tokio::test]
    async fn test_multipart_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/cgi-bin/media/upload"))
            .and(query_param("type", "image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "image",
                "media_id": "MEDIA_ID",
                "created_at": 123456789
            })))
            .mount(&server)
            .await;

        let value = transport(&server)
            .execute(ApiRequest::upload("media/upload", "a.jpg", vec![1, 2, 3]).query("type", "image"))
            .await
            .unwrap()
            .into_json()
            .unwrap();
        assert_eq!(value["media_id"], "MEDIA_ID");
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = transport(&server)
            .execute(ApiRequest::get("token"))
            .await
            .unwrap_err();
        assert!(matches!(err, WeixinError::Http(ref msg) if msg.contains("502")));
    }
}
