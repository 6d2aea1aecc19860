#![doc = "Publisher integration for the CLI: multipart upload of fetched documents to the destination site's upload endpoint."]
//
//! # Publisher Integration (CLI <-> Core)
//!
//! This module provides the bridge between the transfer engine in
//! [`pdf_relay_core::transfer`] and the destination's bespoke upload endpoint. It wires up the
//! [`Publisher`] trait with [`MultipartPublisher`].
//!
//! ## Request
//! One multipart POST per document with the text fields `title`, `url`, `date`, `size`, an
//! optional `action` (admin-ajax style endpoints route on it), and the binary `file` part.
//!
//! ## Acknowledgment
//! A success status is not trusted on its own: the body must parse as a JSON object with
//! `success: true` or an assigned identifier. See [`interpret_acknowledgement`].

use async_trait::async_trait;
use pdf_relay_core::contract::{Acknowledgement, PublishRequest, Publisher};
use pdf_relay_core::error::{excerpt, PublishError};
use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value};
use tokio_util::io::ReaderStream;

const ID_FIELDS: [&str; 3] = ["id", "post_id", "attachment_id"];

pub struct MultipartPublisher {
    client: reqwest::Client,
    endpoint: String,
    action: Option<String>,
}

impl MultipartPublisher {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, action: Option<String>) -> Self {
        let endpoint = endpoint.into();
        tracing::info!(
            endpoint = %endpoint,
            action = action.as_deref().unwrap_or("<none>"),
            "Initialized MultipartPublisher"
        );
        Self {
            client,
            endpoint,
            action,
        }
    }

    async fn build_form(&self, req: &PublishRequest<'_>) -> Result<Form, PublishError> {
        let file = tokio::fs::File::open(req.file_path)
            .await
            .map_err(|e| PublishError::Io(e.to_string()))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, req.size)
            .file_name(req.file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let mut form = Form::new()
            .text("title", req.title.to_string())
            .text("url", req.url.to_string())
            .text("date", req.date.to_string())
            .text("size", req.size.to_string());
        if let Some(action) = &self.action {
            form = form.text("action", action.clone());
        }
        Ok(form.part("file", part))
    }
}

#[async_trait]
impl Publisher for MultipartPublisher {
    async fn publish<'a>(&self, req: PublishRequest<'a>) -> Result<Acknowledgement, PublishError> {
        tracing::info!(
            url = req.url,
            title = req.title,
            size = req.size,
            "[PUBLISH] Uploading document"
        );
        let form = self.build_form(&req).await?;

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, url = req.url, "[PUBLISH] Transport error");
                PublishError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), url = req.url, "[PUBLISH] Endpoint returned error status");
            return Err(PublishError::Status {
                status: status.as_u16(),
                body_excerpt: excerpt(&body),
            });
        }

        match interpret_acknowledgement(&body) {
            Ok(ack) => {
                tracing::info!(url = req.url, remote_id = ?ack.remote_id, "[PUBLISH] Upload acknowledged");
                Ok(ack)
            }
            Err(reason) => {
                tracing::error!(url = req.url, %reason, "[PUBLISH] Success status without acknowledgment");
                Err(PublishError::Rejected {
                    status: status.as_u16(),
                    reason,
                    body_excerpt: excerpt(&body),
                })
            }
        }
    }
}

/// Classifies an upload response body.
///
/// Accepted: an object with `success: true`, or without a `success` field but with an
/// identifier (`id`, `post_id`, `attachment_id`, at top level or under `data`). `success: false`
/// is negative regardless of any identifier.
pub fn interpret_acknowledgement(body: &str) -> Result<Acknowledgement, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("response is not JSON: {e}"))?;
    let obj = value
        .as_object()
        .ok_or_else(|| "response is not a JSON object".to_string())?;
    let data = obj.get("data").and_then(Value::as_object);

    let remote_id = find_identifier(obj).or_else(|| data.and_then(find_identifier));
    let message = string_field(obj, "message").or_else(|| data.and_then(|d| string_field(d, "message")));

    match (obj.get("success").and_then(Value::as_bool), remote_id) {
        (Some(false), _) => {
            let detail = obj
                .get("data")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(message)
                .unwrap_or_else(|| "no detail".to_string());
            Err(format!("endpoint reported failure: {detail}"))
        }
        (Some(true), remote_id) => Ok(Acknowledgement { remote_id, message }),
        (None, Some(remote_id)) => Ok(Acknowledgement {
            remote_id: Some(remote_id),
            message,
        }),
        (None, None) => Err("response has neither a success flag nor an identifier".to_string()),
    }
}

fn find_identifier(obj: &Map<String, Value>) -> Option<String> {
    ID_FIELDS.iter().find_map(|key| match obj.get(*key) {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}
