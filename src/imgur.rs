//! Imgur upload client.
//!
//! Deliberately built on the blocking `reqwest` client: the upload is a
//! single long call that runs under `tokio::task::spawn_blocking`, so the
//! event loop never waits on it. Each upload refreshes the OAuth access
//! token from the configured refresh token first, matching Imgur's
//! short-lived token model.

use crate::config::{Settings, IMGUR_HTTP_TIMEOUT_SECS};
use reqwest::blocking::{multipart, Client};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const IMGUR_API_BASE: &str = "https://api.imgur.com";

/// Errors produced by the Imgur client
#[derive(Debug, Error)]
pub enum ImgurError {
    /// Connectivity or protocol failure
    #[error("imgur request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Non-success status from the API
    #[error("imgur API error: {status} - {message}")]
    Api {
        /// HTTP status code returned by the API
        status: reqwest::StatusCode,
        /// Response body, truncated
        message: String,
    },
    /// Response parsed but a required field is missing
    #[error("malformed imgur response: missing {0}")]
    MalformedResponse(&'static str),
    /// Local file could not be read
    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),
}

/// A successfully uploaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// Public link to the hosted image
    pub link: String,
    /// Hash allowing later deletion, when the API returns one
    pub delete_hash: Option<String>,
}

/// Client for the two Imgur operations this bot needs: token refresh and
/// image upload.
pub struct ImgurClient {
    client_id: String,
    client_secret: String,
    refresh_token: String,
    album_id: Option<String>,
    http: Client,
}

impl ImgurClient {
    /// Build a client from settings, honoring the configured proxy.
    ///
    /// # Errors
    ///
    /// Returns `ImgurError::Network` when the HTTP client (or proxy URL)
    /// cannot be constructed.
    pub fn new(settings: &Settings) -> Result<Self, ImgurError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(IMGUR_HTTP_TIMEOUT_SECS));
        if let Some(proxy) = &settings.requests_proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client_id: settings.imgur_client_id.clone(),
            client_secret: settings.imgur_client_secret.clone(),
            refresh_token: settings.imgur_refresh_token.clone(),
            album_id: settings.imgur_album_id.clone(),
            http: builder.build()?,
        })
    }

    /// Exchange the stored refresh token for a fresh access token.
    fn refresh_access_token(&self) -> Result<String, ImgurError> {
        let response = self
            .http
            .post(format!("{IMGUR_API_BASE}/oauth2/token"))
            .form(&[
                ("refresh_token", self.refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()?;

        let value = check_status(response)?;
        parse_token_response(&value)
    }

    /// Upload an image file, filing it under the configured album when set.
    ///
    /// Blocking; run it via `tokio::task::spawn_blocking` from async code.
    ///
    /// # Errors
    ///
    /// Fails when the token refresh fails, the file is unreadable, or the
    /// upload is rejected by the API.
    pub fn upload_image(&self, path: &Path) -> Result<UploadedImage, ImgurError> {
        let token = self.refresh_access_token()?;

        let mut form = multipart::Form::new().file("image", path)?;
        if let Some(album) = &self.album_id {
            form = form.text("album", album.clone());
        }

        debug!("Uploading {} to Imgur", path.display());
        let response = self
            .http
            .post(format!("{IMGUR_API_BASE}/3/image"))
            .bearer_auth(token)
            .multipart(form)
            .send()?;

        let value = check_status(response)?;
        parse_upload_response(&value)
    }
}

/// Turn a non-success response into `ImgurError::Api`, otherwise parse JSON.
fn check_status(response: reqwest::blocking::Response) -> Result<Value, ImgurError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        let message = if body.len() > 500 {
            format!("{}... (truncated)", &body[..500])
        } else {
            body
        };
        return Err(ImgurError::Api { status, message });
    }
    Ok(response.json()?)
}

fn parse_token_response(value: &Value) -> Result<String, ImgurError> {
    value
        .get("access_token")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or(ImgurError::MalformedResponse("access_token"))
}

fn parse_upload_response(value: &Value) -> Result<UploadedImage, ImgurError> {
    let data = value
        .get("data")
        .ok_or(ImgurError::MalformedResponse("data"))?;
    let link = data
        .get("link")
        .and_then(Value::as_str)
        .ok_or(ImgurError::MalformedResponse("data.link"))?;
    let delete_hash = data
        .get("deletehash")
        .and_then(Value::as_str)
        .map(ToString::to_string);

    Ok(UploadedImage {
        link: link.to_string(),
        delete_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_token_response() -> Result<(), ImgurError> {
        let value = json!({"access_token": "abc", "expires_in": 3600});
        assert_eq!(parse_token_response(&value)?, "abc");
        Ok(())
    }

    #[test]
    fn test_parse_token_response_missing_field() {
        let value = json!({"expires_in": 3600});
        assert!(matches!(
            parse_token_response(&value),
            Err(ImgurError::MalformedResponse("access_token"))
        ));
    }

    #[test]
    fn test_parse_upload_response() -> Result<(), ImgurError> {
        let value = json!({
            "data": {"link": "https://i.imgur.com/xyz.jpg", "deletehash": "d41n"},
            "success": true,
            "status": 200
        });
        let uploaded = parse_upload_response(&value)?;
        assert_eq!(uploaded.link, "https://i.imgur.com/xyz.jpg");
        assert_eq!(uploaded.delete_hash, Some("d41n".to_string()));
        Ok(())
    }

    #[test]
    fn test_parse_upload_response_without_deletehash() -> Result<(), ImgurError> {
        let value = json!({"data": {"link": "https://i.imgur.com/xyz.jpg"}});
        let uploaded = parse_upload_response(&value)?;
        assert_eq!(uploaded.delete_hash, None);
        Ok(())
    }

    #[test]
    fn test_parse_upload_response_missing_link() {
        let value = json!({"data": {"id": "xyz"}});
        assert!(matches!(
            parse_upload_response(&value),
            Err(ImgurError::MalformedResponse("data.link"))
        ));
    }
}
