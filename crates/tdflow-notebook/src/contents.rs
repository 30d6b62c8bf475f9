use crate::store::{NotebookError, NotebookResult, NotebookStore};
use crate::{NotebookConfig, NotebookContent};
use serde::{Deserialize, Serialize};

/// Contents API envelope (`GET`/`PUT /api/contents/<path>`).
#[derive(Debug, Serialize, Deserialize)]
struct ContentsModel<C> {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    format: Option<String>,
    content: Option<C>,
}

/// Notebook store backed by a Jupyter server's contents API.
#[derive(Clone, Debug)]
pub struct JupyterContentsClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl JupyterContentsClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.filter(|token| !token.is_empty()),
        }
    }

    pub fn from_config(config: &NotebookConfig) -> Self {
        Self::new(config.base_url.clone(), config.token.clone())
    }

    fn contents_url(&self, path: &str) -> NotebookResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!(
            "{}/api/contents",
            self.base_url.trim_end_matches('/')
        ))
        .map_err(|err| NotebookError::InvalidUrl(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| NotebookError::InvalidUrl(self.base_url.clone()))?
            .extend(path.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("Token {token}")),
            None => request,
        }
    }
}

#[async_trait::async_trait]
impl NotebookStore for JupyterContentsClient {
    async fn load(&self, path: &str) -> NotebookResult<Option<NotebookContent>> {
        let response = self
            .authorize(self.client.get(self.contents_url(path)?))
            .send()
            .await
            .map_err(|err| NotebookError::Transport(format!("http get failed: {err}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| NotebookError::Transport(format!("http read body failed: {err}")))?;
        if !status.is_success() {
            return Err(NotebookError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let model: ContentsModel<NotebookContent> = serde_json::from_str(&text)
            .map_err(|err| NotebookError::Decode(err.to_string()))?;
        if model.kind != "notebook" {
            return Err(NotebookError::NotANotebook(path.to_string()));
        }
        model
            .content
            .map(Some)
            .ok_or_else(|| NotebookError::Decode("missing notebook content".to_string()))
    }

    async fn save(&self, path: &str, content: &NotebookContent) -> NotebookResult<()> {
        let body = ContentsModel {
            kind: "notebook".to_string(),
            format: Some("json".to_string()),
            content: Some(content),
        };
        let response = self
            .authorize(self.client.put(self.contents_url(path)?))
            .json(&body)
            .send()
            .await
            .map_err(|err| NotebookError::Transport(format!("http put failed: {err}")))?;

        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(NotebookError::Http {
            status: status.as_u16(),
            body: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contents_url_expected_encoded_segments() {
        let client = JupyterContentsClient::new("http://localhost:8888/", None);
        let url = client.contents_url("work dir/My Notebook.ipynb").expect("url");
        assert_eq!(
            url.as_str(),
            "http://localhost:8888/api/contents/work%20dir/My%20Notebook.ipynb"
        );
    }

    #[test]
    fn new_empty_token_expected_no_auth() {
        let client = JupyterContentsClient::new("http://nb", Some(String::new()));
        assert!(client.token.is_none());
    }

    #[test]
    fn contents_model_decode_expected_notebook() {
        let raw = r#"{"name":"a.ipynb","type":"notebook","format":"json",
            "content":{"cells":[],"metadata":{},"nbformat":4,"nbformat_minor":5}}"#;
        let model: ContentsModel<NotebookContent> =
            serde_json::from_str(raw).expect("model should decode");
        assert_eq!(model.kind, "notebook");
        assert_eq!(model.content.map(|c| c.nbformat), Some(4));
    }
}
