use crate::types::{SavePipelineBody, SearchResponse};
use crate::{
    BackendConfig, BackendError, BackendResult, FunctionCatalog, FunctionInfo, NlRequest,
    NlResponse, PipelineBackend, PreviewRequest, PreviewTable, SavedPipeline, User,
    sort_by_relevance,
};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Default, Deserialize)]
struct PipelineList {
    #[serde(default)]
    pipelines: Vec<SavedPipeline>,
}

/// HTTP client for the pipeline backend.
#[derive(Clone, Debug)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.filter(|token| !token.trim().is_empty()),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.base_url.clone(), config.token.clone())
    }

    pub fn from_env() -> Self {
        Self::from_config(&BackendConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn segments_url(&self, segments: &[&str]) -> BackendResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|err| BackendError::Transport(format!("invalid base url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Transport(format!("invalid base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> BackendResult<T> {
        let response = self
            .request(request)
            .send()
            .await
            .map_err(|err| BackendError::Transport(format!("{what} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendError::from_response(status.as_u16(), &text));
        }
        let text = response
            .text()
            .await
            .map_err(|err| BackendError::Transport(format!("{what} read body failed: {err}")))?;
        serde_json::from_str(&text)
            .map_err(|err| BackendError::Decode(format!("{what} json decode failed: {err}")))
    }
}

#[async_trait::async_trait]
impl FunctionCatalog for BackendClient {
    async fn search_functions(&self, query: &str) -> BackendResult<Vec<FunctionInfo>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .client
            .get(self.endpoint("/pandas/search"))
            .query(&[("query", query)]);
        let response: SearchResponse = self.send_json(request, "function search").await?;
        let mut functions = response.functions;
        sort_by_relevance(&mut functions);
        Ok(functions)
    }

    async fn function_detail(&self, name: &str) -> BackendResult<Option<FunctionInfo>> {
        let url = self.segments_url(&["pandas", "function", name])?;
        let response = self
            .request(self.client.get(url))
            .send()
            .await
            .map_err(|err| BackendError::Transport(format!("function detail failed: {err}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| BackendError::Transport(format!("function detail read body failed: {err}")))?;
        if !status.is_success() {
            return Err(BackendError::from_response(status.as_u16(), &text));
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|err| BackendError::Decode(format!("function detail json decode failed: {err}")))
    }
}

#[async_trait::async_trait]
impl PipelineBackend for BackendClient {
    async fn run_preview(&self, request: PreviewRequest) -> BackendResult<PreviewTable> {
        let mut form = Form::new()
            .text("yaml", request.yaml)
            .text("preview_node", request.preview_node.clone());
        if let Some(file) = request.file {
            form = form.part("file", Part::bytes(file.bytes).file_name(file.name));
        }
        tracing::debug!(node_id = %request.preview_node, "running preview");
        self.send_json(
            self.client.post(self.endpoint("/pipeline/run")).multipart(form),
            "preview",
        )
        .await
    }

    async fn nl_to_yaml(&self, request: NlRequest) -> BackendResult<NlResponse> {
        let mut form = Form::new()
            .text("prompt", request.prompt)
            .text("mode", request.mode)
            .text("yaml", request.current_yaml.clone())
            .text("yaml_text", request.current_yaml.clone())
            .text("current_yaml", request.current_yaml);
        if let Some(receiver) = request.receiver {
            form = form.text("receiver", receiver);
        }
        self.send_json(
            self.client.post(self.endpoint("/nl2yaml")).multipart(form),
            "nl2yaml",
        )
        .await
    }

    async fn me(&self) -> BackendResult<User> {
        self.send_json(self.client.get(self.endpoint("/me")), "me").await
    }

    async fn list_pipelines(&self) -> BackendResult<Vec<SavedPipeline>> {
        let list: PipelineList = self
            .send_json(self.client.get(self.endpoint("/pipelines")), "list pipelines")
            .await?;
        let mut pipelines = list.pipelines;
        pipelines.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(pipelines)
    }

    async fn save_pipeline(&self, name: &str, yaml: &str) -> BackendResult<SavedPipeline> {
        let body = SavePipelineBody { name, yaml };
        self.send_json(
            self.client.post(self.endpoint("/pipelines")).json(&body),
            "save pipeline",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trailing_slashes_expected_single_separator() {
        let client = BackendClient::new("http://localhost:8000/api/", None);
        assert_eq!(
            client.endpoint("/pandas/search"),
            "http://localhost:8000/api/pandas/search"
        );
    }

    #[test]
    fn segments_url_dotted_name_expected_encoded_path() {
        let client = BackendClient::new("http://localhost:8000/api", None);
        let url = client
            .segments_url(&["pandas", "function", "DataFrame.groupby agg"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/pandas/function/DataFrame.groupby%20agg"
        );
    }

    #[test]
    fn new_blank_token_expected_no_auth() {
        let client = BackendClient::new("http://x", Some(" ".to_string()));
        assert!(client.token.is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn search_functions_blank_query_expected_empty_without_request() {
        let client = BackendClient::new("http://127.0.0.1:9", None);
        let functions = client.search_functions("   ").await.expect("no request");
        assert!(functions.is_empty());
    }
}
