//! Dropbox HTTP API implementation of `DestinationStore`.

use crate::ports::storage::{DestinationStore, EntryKind, RemoteEntry, StorageError, StoredFile};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const API_BASE: &str = "https://api.dropboxapi.com";
pub const CONTENT_BASE: &str = "https://content.dropboxapi.com";

#[derive(Debug, Serialize)]
struct ListFolderArg<'a> {
    path: &'a str,
    recursive: bool,
    include_deleted: bool,
}

#[derive(Debug, Serialize)]
struct ListFolderContinueArg<'a> {
    cursor: &'a str,
}

#[derive(Debug, Deserialize)]
struct ListFolderResult {
    #[serde(default)]
    entries: Vec<Metadata>,
    #[serde(default)]
    cursor: String,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = ".tag")]
    tag: String,
    #[serde(default)]
    name: String,
}

impl From<Metadata> for RemoteEntry {
    fn from(meta: Metadata) -> Self {
        let kind = match meta.tag.as_str() {
            "file" => EntryKind::File,
            "folder" => EntryKind::Folder,
            _ => EntryKind::Deleted,
        };
        RemoteEntry {
            name: meta.name,
            kind,
        }
    }
}

#[derive(Debug, Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: &'a str,
    autorename: bool,
    mute: bool,
    strict_conflict: bool,
}

#[derive(Debug, Deserialize)]
struct FileMetadata {
    #[serde(default)]
    path_display: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// Dropbox client bound to one access token.
#[derive(Debug, Clone)]
pub struct DropboxStore {
    client: Client,
    token: String,
    api_base: String,
    content_base: String,
    list_timeout: Duration,
    upload_timeout: Duration,
}

impl DropboxStore {
    pub fn new(client: Client, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            api_base: API_BASE.to_string(),
            content_base: CONTENT_BASE.to_string(),
            list_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeouts(mut self, list: Duration, upload: Duration) -> Self {
        self.list_timeout = list;
        self.upload_timeout = upload;
        self
    }

    /// Point the client at other API hosts (proxies, test servers).
    pub fn with_endpoints(mut self, api_base: &str, content_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.content_base = content_base.trim_end_matches('/').to_string();
        self
    }

    fn rpc(&self, route: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/2/files/{}", self.api_base, route))
            .bearer_auth(&self.token)
            .timeout(self.list_timeout)
    }

    async fn send_list(
        &self,
        request: RequestBuilder,
        folder: &str,
    ) -> Result<ListFolderResult, StorageError> {
        let response = request.send().await.map_err(transport)?;
        if response.status() == StatusCode::CONFLICT {
            return Err(StorageError::NotFound(folder.to_string()));
        }
        let response = check_status(response).await?;
        response.json().await.map_err(transport)
    }
}

fn transport(err: reqwest::Error) -> StorageError {
    StorageError::Transport(err.to_string())
}

async fn check_status(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// Serialize `value` for an HTTP header, escaping every non-ASCII character.
fn header_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    let json = serde_json::to_string(value)
        .map_err(|e| StorageError::Transport(format!("cannot encode API argument: {}", e)))?;
    let mut escaped = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(escaped)
}

#[async_trait]
impl DestinationStore for DropboxStore {
    async fn list_folder(&self, folder: &str) -> Result<Vec<RemoteEntry>, StorageError> {
        let first = self.rpc("list_folder").json(&ListFolderArg {
            path: folder,
            recursive: false,
            include_deleted: false,
        });
        let mut page = self.send_list(first, folder).await?;
        let mut entries: Vec<RemoteEntry> = Vec::new();

        loop {
            entries.extend(page.entries.drain(..).map(RemoteEntry::from));
            if !page.has_more || page.cursor.is_empty() {
                break;
            }
            debug!("{} has more entries, continuing listing", folder);
            let next = self.rpc("list_folder/continue").json(&ListFolderContinueArg {
                cursor: &page.cursor,
            });
            page = self.send_list(next, folder).await?;
        }

        Ok(entries)
    }

    async fn upload(&self, path: &str, content: Vec<u8>) -> Result<StoredFile, StorageError> {
        let size = content.len() as u64;
        let arg = header_json(&UploadArg {
            path,
            mode: "add",
            autorename: true,
            mute: true,
            strict_conflict: false,
        })?;

        let response = self
            .client
            .post(format!("{}/2/files/upload", self.content_base))
            .bearer_auth(&self.token)
            .header("Content-Type", "application/octet-stream")
            .header("Dropbox-API-Arg", arg)
            .timeout(self.upload_timeout)
            .body(content)
            .send()
            .await
            .map_err(transport)?;
        let response = check_status(response).await?;

        let meta: FileMetadata = response.json().await.map_err(transport)?;
        Ok(StoredFile {
            path: meta.path_display.unwrap_or_else(|| path.to_string()),
            size: meta.size.unwrap_or(size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorded {
        list_bodies: Arc<Mutex<Vec<Value>>>,
        upload_args: Arc<Mutex<Vec<String>>>,
        upload_auth: Arc<Mutex<Vec<String>>>,
    }

    async fn list_folder(State(rec): State<Recorded>, Json(body): Json<Value>) -> (AxumStatus, Json<Value>) {
        rec.list_bodies.lock().unwrap().push(body.clone());
        match body["path"].as_str() {
            Some("/root/missing") => (
                AxumStatus::CONFLICT,
                Json(json!({"error_summary": "path/not_found/"})),
            ),
            Some("/root/broken") => (AxumStatus::INTERNAL_SERVER_ERROR, Json(json!({}))),
            _ => (
                AxumStatus::OK,
                Json(json!({
                    "entries": [
                        {".tag": "file", "name": "a.wav"},
                        {".tag": "folder", "name": "nested"}
                    ],
                    "cursor": "page-2",
                    "has_more": true
                })),
            ),
        }
    }

    async fn list_continue(Json(body): Json<Value>) -> Json<Value> {
        assert_eq!(body["cursor"], "page-2");
        Json(json!({
            "entries": [{".tag": "file", "name": "b.wav"}],
            "cursor": "page-3",
            "has_more": false
        }))
    }

    async fn upload(State(rec): State<Recorded>, headers: HeaderMap, body: axum::body::Bytes) -> Json<Value> {
        let arg = headers["dropbox-api-arg"].to_str().unwrap().to_string();
        let auth = headers["authorization"].to_str().unwrap().to_string();
        rec.upload_args.lock().unwrap().push(arg);
        rec.upload_auth.lock().unwrap().push(auth);
        Json(json!({
            "path_display": "/root/01/ep-001 (1).wav",
            "size": body.len()
        }))
    }

    async fn spawn_fake_dropbox() -> (String, Recorded) {
        let rec = Recorded::default();
        let app = Router::new()
            .route("/2/files/list_folder", post(list_folder))
            .route("/2/files/list_folder/continue", post(list_continue))
            .route("/2/files/upload", post(upload))
            .with_state(rec.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (base, rec)
    }

    fn store(base: &str) -> DropboxStore {
        DropboxStore::new(Client::new(), "sl.secret").with_endpoints(base, base)
    }

    #[tokio::test]
    async fn listing_follows_cursor_pages() {
        let (base, rec) = spawn_fake_dropbox().await;
        let entries = store(&base).list_folder("/root/01").await.unwrap();

        assert_eq!(
            entries,
            vec![
                RemoteEntry::file("a.wav"),
                RemoteEntry::folder("nested"),
                RemoteEntry::file("b.wav"),
            ]
        );
        let bodies = rec.list_bodies.lock().unwrap();
        assert_eq!(bodies[0]["recursive"], false);
        assert_eq!(bodies[0]["include_deleted"], false);
    }

    #[tokio::test]
    async fn conflict_means_folder_not_found() {
        let (base, _) = spawn_fake_dropbox().await;
        let err = store(&base).list_folder("/root/missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(p) if p == "/root/missing"));
    }

    #[tokio::test]
    async fn server_error_is_rejected() {
        let (base, _) = spawn_fake_dropbox().await;
        let err = store(&base).list_folder("/root/broken").await.unwrap_err();
        assert!(matches!(err, StorageError::Rejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn upload_sends_add_mode_with_autorename() {
        let (base, rec) = spawn_fake_dropbox().await;
        let stored = store(&base)
            .upload("/root/01/ep-001.wav", b"RIFF....".to_vec())
            .await
            .unwrap();

        assert_eq!(stored.path, "/root/01/ep-001 (1).wav");
        assert_eq!(stored.size, 8);

        let arg: Value = serde_json::from_str(&rec.upload_args.lock().unwrap()[0]).unwrap();
        assert_eq!(arg["path"], "/root/01/ep-001.wav");
        assert_eq!(arg["mode"], "add");
        assert_eq!(arg["autorename"], true);
        assert_eq!(arg["mute"], true);
        assert_eq!(arg["strict_conflict"], false);
        assert_eq!(rec.upload_auth.lock().unwrap()[0], "Bearer sl.secret");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let err = store("http://127.0.0.1:1").list_folder("/root/01").await.unwrap_err();
        assert!(matches!(err, StorageError::Transport(_)));
    }

    #[test]
    fn header_argument_escapes_non_ascii() {
        let arg = header_json(&json!({"path": "/café/ü.wav"})).unwrap();
        assert!(arg.is_ascii());
        assert_eq!(arg, r#"{"path":"/caf\u00e9/\u00fc.wav"}"#);
        let decoded: Value = serde_json::from_str(&arg).unwrap();
        assert_eq!(decoded["path"], "/café/ü.wav");
    }
}
