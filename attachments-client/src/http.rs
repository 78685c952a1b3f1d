use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use taskboard_attachments_api::AttachmentRef;
use taskboard_attachments_api::BlobStore;
use taskboard_attachments_api::DeleteError;
use taskboard_attachments_api::DeleteOutcome;
use taskboard_attachments_api::OwnerId;
use taskboard_attachments_api::RecordError;
use taskboard_attachments_api::RecordStore;
use taskboard_attachments_api::TaskId;
use taskboard_attachments_api::TaskRecord;
use taskboard_attachments_api::TaskUpdate;
use taskboard_attachments_api::UploadError;
use tracing::debug;
use tracing::warn;
use uuid::Uuid;

use crate::media::extension_for_mime;

const DEFAULT_USER_AGENT: &str = "taskboard-cli";
const DEFAULT_TABLE: &str = "tasks";

/// Connection settings shared by the blob and record stores.
#[derive(Clone, Debug, Default)]
pub struct HttpConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub bearer_token: Option<String>,
    pub user_agent: Option<String>,
    pub timeout: Option<Duration>,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    fn trimmed_base(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }
}

#[derive(Clone, Debug)]
struct RestClient {
    http: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
}

impl RestClient {
    fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url: config.trimmed_base(),
            headers: default_headers(config),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

fn default_headers(config: &HttpConfig) -> HeaderMap {
    let mut h = HeaderMap::new();
    let ua = config
        .user_agent
        .as_deref()
        .and_then(|ua| HeaderValue::from_str(ua).ok())
        .unwrap_or(HeaderValue::from_static(DEFAULT_USER_AGENT));
    h.insert(USER_AGENT, ua);
    if let Some(key) = &config.api_key
        && let Ok(hv) = HeaderValue::from_str(key)
    {
        h.insert(HeaderName::from_static("apikey"), hv);
    }
    if let Some(token) = &config.bearer_token
        && let Ok(hv) = HeaderValue::from_str(&format!("Bearer {token}"))
    {
        h.insert(AUTHORIZATION, hv);
    }
    h
}

/// Percent-encode each `/`-separated segment of an object path.
fn encode_object_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Bucket-addressed object storage over HTTP.
#[derive(Clone, Debug)]
pub struct HttpBlobStore {
    rest: RestClient,
    bucket: String,
}

impl HttpBlobStore {
    pub fn new(config: &HttpConfig, bucket: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
            bucket: bucket.into(),
        })
    }

    fn object_url(&self, object_path: &str) -> String {
        self.rest.url(&format!(
            "storage/v1/object/{}/{}",
            urlencoding::encode(&self.bucket),
            encode_object_path(object_path)
        ))
    }

    async fn delete_one(&self, attachment_ref: &AttachmentRef) -> Result<(), DeleteError> {
        let url = self.object_url(attachment_ref.as_str());
        let res = self
            .rest
            .http
            .delete(&url)
            .headers(self.rest.headers.clone())
            .send()
            .await
            .map_err(|e| DeleteError::new(format!("DELETE {url} failed: {e}")))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(DeleteError::new(format!(
                "DELETE {url} failed status={status} body={body}"
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(
        &self,
        owner: &OwnerId,
        payload: Bytes,
        mime_hint: &str,
    ) -> Result<AttachmentRef, UploadError> {
        let object_path = format!(
            "{owner}/{}.{}",
            Uuid::new_v4().simple(),
            extension_for_mime(mime_hint)
        );
        let url = self.object_url(&object_path);
        let size = payload.len();
        let content_type = HeaderValue::from_str(mime_hint)
            .unwrap_or(HeaderValue::from_static("application/octet-stream"));
        let res = self
            .rest
            .http
            .post(&url)
            .headers(self.rest.headers.clone())
            .header(CONTENT_TYPE, content_type)
            .body(payload)
            .send()
            .await
            .map_err(|e| UploadError::new(format!("POST {url} failed: {e}")))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(UploadError::new(format!(
                "POST {url} failed status={status} body={body}"
            )));
        }
        debug!("attachments.http.uploaded path={object_path} bytes={size}");
        Ok(AttachmentRef::new(object_path))
    }

    fn resolve_public_ref(&self, attachment_ref: &AttachmentRef) -> String {
        self.rest.url(&format!(
            "storage/v1/object/public/{}/{}",
            urlencoding::encode(&self.bucket),
            encode_object_path(attachment_ref.as_str())
        ))
    }

    async fn delete(&self, refs: &[AttachmentRef]) -> Vec<DeleteOutcome> {
        let outcomes = join_all(refs.iter().map(|r| self.delete_one(r))).await;
        refs.iter().cloned().zip(outcomes).collect()
    }
}

/// Task rows behind a REST table endpoint.
#[derive(Clone, Debug)]
pub struct HttpRecordStore {
    rest: RestClient,
    table: String,
}

impl HttpRecordStore {
    pub fn new(config: &HttpConfig) -> anyhow::Result<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
            table: DEFAULT_TABLE.to_string(),
        })
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    fn table_url(&self) -> String {
        self.rest
            .url(&format!("rest/v1/{}", urlencoding::encode(&self.table)))
    }
}

#[async_trait::async_trait]
impl RecordStore for HttpRecordStore {
    async fn get_task(&self, task_id: &TaskId) -> Result<TaskRecord, RecordError> {
        let url = self.table_url();
        let res = self
            .rest
            .http
            .get(&url)
            .headers(self.rest.headers.clone())
            .query(&[("id", format!("eq.{task_id}")), ("select", "*".to_string())])
            .send()
            .await
            .map_err(|e| RecordError::Transport(format!("GET {url} failed: {e}")))?;
        let rows: Vec<TaskRecord> = decode_rows(res, &url).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| RecordError::not_found(task_id))
    }

    async fn update_task(
        &self,
        task_id: &TaskId,
        update: TaskUpdate,
    ) -> Result<TaskRecord, RecordError> {
        let url = self.table_url();
        let res = self
            .rest
            .http
            .patch(&url)
            .headers(self.rest.headers.clone())
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{task_id}"))])
            .json(&update)
            .send()
            .await
            .map_err(|e| RecordError::Transport(format!("PATCH {url} failed: {e}")))?;
        let rows: Vec<TaskRecord> = decode_rows(res, &url).await?;
        match rows.into_iter().next() {
            Some(record) => {
                debug!(
                    "attachments.http.task_updated task={task_id} refs={}",
                    record.ordered_refs.len()
                );
                Ok(record)
            }
            None => {
                warn!("attachments.http.task_update_matched_nothing task={task_id}");
                Err(RecordError::not_found(task_id))
            }
        }
    }
}

async fn decode_rows<T: DeserializeOwned>(
    res: reqwest::Response,
    url: &str,
) -> Result<T, RecordError> {
    let status = res.status();
    let ct = res
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body = res.text().await.unwrap_or_default();
    if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::FORBIDDEN {
        return Err(RecordError::Rejected(format!("{status}: {body}")));
    }
    if !status.is_success() {
        return Err(RecordError::Http {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str::<T>(&body).map_err(|e| {
        RecordError::Decode(format!("{url}: {e}; content-type={ct}; body={body}"))
    })
}
