use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};

use super::google_auth::TokenSource;
use crate::app::ports::UploadPort;
use crate::config::DriveSettings;
use crate::error::{AppError, Result};
use crate::observability::metrics;

const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";
const CSV_MIME: &str = "text/csv";

/// Uploads artifacts into one Google Drive folder, replacing files by name.
pub struct GoogleDriveUploader {
    client: reqwest::Client,
    tokens: TokenSource,
    folder_id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

impl GoogleDriveUploader {
    pub fn from_settings(settings: &DriveSettings) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            tokens: TokenSource::from_settings(settings)?,
            folder_id: settings.folder_id.clone(),
        })
    }

    async fn access_token(&self) -> Result<String> {
        self.tokens.access_token(&self.client).await
    }

    async fn find_existing(&self, name: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(FILES_URL)
            .bearer_auth(self.access_token().await?)
            .query(&[
                ("q", search_query(name, &self.folder_id).as_str()),
                ("spaces", "drive"),
                ("fields", "files(id, name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ])
            .send()
            .await?;
        let list: FileList = checked(response).await?.json().await?;
        Ok(list.files.into_iter().next().map(|file| file.id))
    }

    async fn create_metadata(&self, name: &str) -> Result<String> {
        let response = self
            .client
            .post(FILES_URL)
            .bearer_auth(self.access_token().await?)
            .query(&[("supportsAllDrives", "true"), ("fields", "id")])
            .json(&json!({ "name": name, "parents": [self.folder_id] }))
            .send()
            .await?;
        let file: DriveFile = checked(response).await?.json().await?;
        Ok(file.id)
    }

    async fn upload_media(&self, file_id: &str, bytes: Vec<u8>) -> Result<()> {
        let response = self
            .client
            .patch(format!("{}/{}", UPLOAD_URL, file_id))
            .bearer_auth(self.access_token().await?)
            .query(&[("uploadType", "media"), ("supportsAllDrives", "true")])
            .header(reqwest::header::CONTENT_TYPE, CSV_MIME)
            .body(bytes)
            .send()
            .await?;
        checked(response).await?;
        Ok(())
    }
}

#[async_trait]
impl UploadPort for GoogleDriveUploader {
    #[instrument(skip(self, path), fields(path = %path.display()))]
    async fn upload(&self, path: &Path, name: &str) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;

        let result = async {
            let file_id = match self.find_existing(name).await? {
                Some(id) => id,
                None => self.create_metadata(name).await?,
            };
            self.upload_media(&file_id, bytes).await?;
            Ok::<_, AppError>(file_id)
        }
        .await;

        match &result {
            Ok(file_id) => {
                metrics::artifacts::upload_succeeded();
                info!(file_id = %file_id, "Uploaded sheet to Drive");
            }
            Err(_) => metrics::artifacts::upload_failed(),
        }
        result
    }
}

/// Drive search for a live file with this exact name inside the folder.
fn search_query(name: &str, folder_id: &str) -> String {
    format!(
        "name='{}' and '{}' in parents and trashed = false",
        name.replace('\\', "\\\\").replace('\'', "\\'"),
        folder_id
    )
}

async fn checked(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Api {
        message: format!("Drive returned {}: {}", status, body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_query_escapes_quotes() {
        assert_eq!(
            search_query("o'brien.csv", "folder"),
            "name='o\\'brien.csv' and 'folder' in parents and trashed = false"
        );
    }

    #[test]
    fn credentials_are_required() {
        let settings = DriveSettings::default();
        assert!(matches!(
            GoogleDriveUploader::from_settings(&settings),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn file_list_tolerates_missing_files_key() {
        let list: FileList = serde_json::from_str("{}").unwrap();
        assert!(list.files.is_empty());
    }
}
