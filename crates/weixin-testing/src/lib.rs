pub mod transport {
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use weixin_api::{ApiRequest, ApiResponse, ApiTransport};
    use weixin_core::{Result, WeixinError};

    pub const MOCK_ACCESS_TOKEN: &str = "MOCK_ACCESS_TOKEN";

    /// 按路径返回预设响应的传输层，记录收到的每个请求
    #[derive(Clone, Default)]
    pub struct MockTransport {
        responses: Arc<Mutex<HashMap<String, VecDeque<Result<ApiResponse>>>>>,
        fixed: Arc<Mutex<HashMap<String, Value>>>,
        requests: Arc<Mutex<Vec<ApiRequest>>>,
    }

    impl MockTransport {
        /// `token` 路径默认返回 [`MOCK_ACCESS_TOKEN`]
        pub fn new() -> Self {
            let transport = Self::default();
            transport.always(
                "token",
                json!({"access_token": MOCK_ACCESS_TOKEN, "expires_in": 7200}),
            );
            transport
        }

        /// 该路径每次都返回同一个 JSON
        pub fn always(&self, path: impl Into<String>, value: Value) -> &Self {
            self.fixed.lock().unwrap().insert(path.into(), value);
            self
        }

        /// 为路径追加一次性响应，优先于固定响应
        pub fn push(&self, path: impl Into<String>, response: Result<ApiResponse>) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .entry(path.into())
                .or_default()
                .push_back(response);
            self
        }

        pub fn push_json(&self, path: impl Into<String>, value: Value) -> &Self {
            self.push(path, Ok(ApiResponse::Json(value)))
        }

        pub fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn call_count(&self, path: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.path == path)
                .count()
        }
    }

    #[async_trait]
    impl ApiTransport for MockTransport {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
            let path = request.path.clone();
            self.requests.lock().unwrap().push(request);

            if let Some(response) = self
                .responses
                .lock()
                .unwrap()
                .get_mut(&path)
                .and_then(VecDeque::pop_front)
            {
                return response;
            }
            if let Some(value) = self.fixed.lock().unwrap().get(&path) {
                return Ok(ApiResponse::Json(value.clone()));
            }
            Err(WeixinError::Http(format!("mock transport: no response for {}", path)))
        }
    }
}

pub mod fixtures {
    use weixin_core::signature::compute_signature;

    pub const APPID: &str = "wxff1ec8c09ae8c622";
    pub const TOKEN: &str = "resplendsky";
    pub const AES_KEY: &str = "ATAQEUbhPfxqUEwI3KkemTuS1tRrhKyUH1yC1iuvT6J";
    pub const TIMESTAMP: &str = "1515914909";
    pub const NONCE: &str = "691998230";

    pub fn text_message(from: &str, to: &str, content: &str) -> String {
        format!(
            "<xml>\
             <ToUserName><![CDATA[{}]]></ToUserName>\
             <FromUserName><![CDATA[{}]]></FromUserName>\
             <CreateTime>1348831860</CreateTime>\
             <MsgType><![CDATA[text]]></MsgType>\
             <Content><![CDATA[{}]]></Content>\
             <MsgId>1234567890123456</MsgId>\
             </xml>",
            to, from, content
        )
    }

    pub fn image_message(from: &str, to: &str) -> String {
        format!(
            "<xml>\
             <ToUserName><![CDATA[{}]]></ToUserName>\
             <FromUserName><![CDATA[{}]]></FromUserName>\
             <CreateTime>1348831860</CreateTime>\
             <MsgType><![CDATA[image]]></MsgType>\
             <PicUrl><![CDATA[http://mmbiz.qpic.cn/test]]></PicUrl>\
             <MediaId><![CDATA[media_id]]></MediaId>\
             <MsgId>1234567890123456</MsgId>\
             </xml>",
            to, from
        )
    }

    pub fn event_message(from: &str, to: &str, event: &str, event_key: &str) -> String {
        format!(
            "<xml>\
             <ToUserName><![CDATA[{}]]></ToUserName>\
             <FromUserName><![CDATA[{}]]></FromUserName>\
             <CreateTime>123456789</CreateTime>\
             <MsgType><![CDATA[event]]></MsgType>\
             <Event><![CDATA[{}]]></Event>\
             <EventKey><![CDATA[{}]]></EventKey>\
             </xml>",
            to, from, event, event_key
        )
    }

    /// 服务器验证请求的签名
    pub fn signature(token: &str, timestamp: &str, nonce: &str) -> String {
        compute_signature(&[token, timestamp, nonce])
    }

    /// 带正确签名的服务器验证查询串
    pub fn verify_query(token: &str, echostr: &str) -> String {
        format!(
            "signature={}&timestamp={}&nonce={}&echostr={}",
            signature(token, TIMESTAMP, NONCE),
            TIMESTAMP,
            NONCE,
            echostr
        )
    }
}

pub mod config {
    use weixin_core::{AccountConfig, Config};

    use crate::fixtures::{AES_KEY, APPID, TOKEN};

    /// 两个公众号：`ycx` 使用 echo 处理器，`ycx.test` 未配置处理器
    pub fn mock_config() -> Config {
        let mut config = Config::default();
        config.accounts.insert(
            "ycx".to_string(),
            AccountConfig::new(APPID, "secret", TOKEN).with_handlers(vec!["echo".to_string()]),
        );
        config.accounts.insert(
            "ycx.test".to_string(),
            AccountConfig::new("wx_test_appid", "secret", TOKEN),
        );
        config
    }

    /// 启用安全模式的公众号配置
    pub fn encrypted_account() -> AccountConfig {
        AccountConfig::new(APPID, "secret", TOKEN)
            .with_encoding_aes_key(AES_KEY)
            .with_handlers(vec!["echo".to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::transport::{MOCK_ACCESS_TOKEN, MockTransport};
    use serde_json::json;
    use weixin_api::{ApiClient, ApiRequest, ApiTransport};

    #[tokio::test]
    async fn test_mock_transport_queue_then_fixed() {
        let transport = MockTransport::new();
        transport
            .always("getcallbackip", json!({"ip_list": ["1.1.1.1"]}))
            .push_json("getcallbackip", json!({"ip_list": ["2.2.2.2"]}));

        let client = ApiClient::new("wx", "s", std::sync::Arc::new(transport.clone()));
        assert_eq!(client.callback_ips().await.unwrap(), vec!["2.2.2.2"]);
        assert_eq!(client.callback_ips().await.unwrap(), vec!["1.1.1.1"]);
        assert_eq!(transport.call_count("token"), 1);

        let requests = transport.requests();
        assert_eq!(requests[1].query_value("access_token"), Some(MOCK_ACCESS_TOKEN));
    }

    #[tokio::test]
    async fn test_mock_transport_unknown_path() {
        let transport = MockTransport::new();
        assert!(transport.execute(ApiRequest::get("nothing")).await.is_err());
    }

    #[test]
    fn test_fixture_payloads_decode() {
        let payload = weixin_core::payload::decode(&fixtures::text_message("A", "B", "hello")).unwrap();
        assert_eq!(payload.get("FromUserName"), Some("A"));
        assert_eq!(payload.get("Content"), Some("hello"));
        assert!(weixin_core::signature::verify(
            fixtures::TOKEN,
            fixtures::TIMESTAMP,
            fixtures::NONCE,
            &fixtures::signature(fixtures::TOKEN, fixtures::TIMESTAMP, fixtures::NONCE),
        ));
    }
}
