// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for the appfleet API

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use appfleet_core::domain::application::{Deployment, PortToOpen};
use appfleet_core::domain::volume::VolumeMount;
use appfleet_core::presentation::api::USER_HEADER;
use appfleet_core::presentation::resources::{
    AliasResource, ApplicationResource, ModuleResource, VolumeResource,
};

#[derive(Debug, Clone)]
pub struct FleetClient {
    client: Client,
    base_url: String,
    user: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl FleetClient {
    pub fn new(host: &str, port: u16, user: Option<String>) -> Result<Self> {
        Self::with_base_url(format!("http://{}:{}", host, port), user)
    }

    pub fn with_base_url(base_url: impl Into<String>, user: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let user = self
            .user
            .as_deref()
            .context("No user given: pass --user or set APPFLEET_USER")?;
        Ok(request.header(USER_HEADER, user))
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .with_context(|| format!("Failed to {}", action))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        anyhow::bail!("Failed to {} ({}): {}", action, status, message)
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder, action: &str) -> Result<T> {
        self.send(request, action)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse response to {}", action))
    }

    pub async fn health(&self) -> Result<serde_json::Value> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .context("Failed to reach appfleet server")?;
        response.json().await.context("Failed to parse health response")
    }

    // ------------------------------------------------------------------
    // Applications
    // ------------------------------------------------------------------

    pub async fn create_application(
        &self,
        name: &str,
        display_name: Option<&str>,
        server_type: &str,
    ) -> Result<ApplicationResource> {
        let body = json!({
            "name": name,
            "display_name": display_name,
            "server_type": server_type,
        });
        self.json(
            self.client.post(self.url("/applications")).json(&body),
            "create application",
        )
        .await
    }

    pub async fn list_applications(&self) -> Result<Vec<ApplicationResource>> {
        self.json(self.client.get(self.url("/applications")), "list applications")
            .await
    }

    pub async fn get_application(&self, id: Uuid) -> Result<ApplicationResource> {
        self.json(
            self.client.get(self.url(&format!("/applications/{}", id))),
            "get application",
        )
        .await
    }

    /// `action` is one of `start`, `stop`, `restart`
    pub async fn lifecycle_action(&self, id: Uuid, action: &str) -> Result<()> {
        self.send(
            self.client
                .post(self.url(&format!("/applications/{}/{}", id, action))),
            &format!("{} application", action),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_application(&self, id: Uuid) -> Result<()> {
        self.send(
            self.client.delete(self.url(&format!("/applications/{}", id))),
            "delete application",
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Aliases
    // ------------------------------------------------------------------

    pub async fn add_alias(&self, id: Uuid, alias: &str) -> Result<String> {
        let created: AliasResource = self
            .json(
                self.client
                    .post(self.url(&format!("/applications/{}/aliases", id)))
                    .json(&json!({ "alias": alias })),
                "add alias",
            )
            .await?;
        Ok(created.alias)
    }

    pub async fn list_aliases(&self, id: Uuid) -> Result<Vec<String>> {
        let aliases: Vec<AliasResource> = self
            .json(
                self.client
                    .get(self.url(&format!("/applications/{}/aliases", id))),
                "list aliases",
            )
            .await?;
        Ok(aliases.into_iter().map(|a| a.alias).collect())
    }

    pub async fn remove_alias(&self, id: Uuid, alias: &str) -> Result<()> {
        self.send(
            self.client
                .delete(self.url(&format!("/applications/{}/aliases/{}", id, alias))),
            "remove alias",
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ports
    // ------------------------------------------------------------------

    pub async fn open_port(
        &self,
        id: Uuid,
        number: u32,
        nature: &str,
        quick_access: bool,
    ) -> Result<PortToOpen> {
        self.json(
            self.client
                .post(self.url(&format!("/applications/{}/ports", id)))
                .json(&json!({
                    "number": number,
                    "nature": nature,
                    "quick_access": quick_access,
                })),
            "open port",
        )
        .await
    }

    pub async fn list_ports(&self, id: Uuid) -> Result<Vec<PortToOpen>> {
        self.json(
            self.client.get(self.url(&format!("/applications/{}/ports", id))),
            "list ports",
        )
        .await
    }

    pub async fn close_port(&self, id: Uuid, number: u16) -> Result<()> {
        self.send(
            self.client
                .delete(self.url(&format!("/applications/{}/ports/{}", id, number))),
            "close port",
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deployments
    // ------------------------------------------------------------------

    pub async fn create_deployment(
        &self,
        id: Uuid,
        deployment_type: &str,
        context_path: &str,
    ) -> Result<Deployment> {
        self.json(
            self.client
                .post(self.url(&format!("/applications/{}/deployments", id)))
                .json(&json!({ "type": deployment_type, "context_path": context_path })),
            "create deployment",
        )
        .await
    }

    pub async fn list_deployments(&self, id: Uuid) -> Result<Vec<Deployment>> {
        self.json(
            self.client
                .get(self.url(&format!("/applications/{}/deployments", id))),
            "list deployments",
        )
        .await
    }

    // ------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------

    pub async fn add_module(&self, id: Uuid, image: &str) -> Result<ModuleResource> {
        self.json(
            self.client
                .post(self.url(&format!("/applications/{}/modules", id)))
                .json(&json!({ "image": image })),
            "add module",
        )
        .await
    }

    pub async fn list_modules(&self, id: Uuid) -> Result<Vec<ModuleResource>> {
        self.json(
            self.client
                .get(self.url(&format!("/applications/{}/modules", id))),
            "list modules",
        )
        .await
    }

    pub async fn remove_module(&self, id: Uuid, name: &str) -> Result<()> {
        self.send(
            self.client
                .delete(self.url(&format!("/applications/{}/modules/{}", id, name))),
            "remove module",
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Volumes
    // ------------------------------------------------------------------

    pub async fn create_volume(&self, name: &str) -> Result<VolumeResource> {
        self.json(
            self.client
                .post(self.url("/volumes"))
                .json(&json!({ "name": name })),
            "create volume",
        )
        .await
    }

    pub async fn list_volumes(&self) -> Result<Vec<VolumeResource>> {
        self.json(self.client.get(self.url("/volumes")), "list volumes")
            .await
    }

    pub async fn remove_volume(&self, name: &str) -> Result<()> {
        self.send(
            self.client.delete(self.url(&format!("/volumes/{}", name))),
            "remove volume",
        )
        .await?;
        Ok(())
    }

    pub async fn mount_volume(
        &self,
        name: &str,
        application_id: Uuid,
        path: &str,
        read_only: bool,
        container: Option<&str>,
    ) -> Result<VolumeMount> {
        self.json(
            self.client
                .post(self.url(&format!("/volumes/{}/mounts", name)))
                .json(&json!({
                    "application_id": application_id,
                    "path": path,
                    "read_only": read_only,
                    "container": container,
                })),
            "mount volume",
        )
        .await
    }

    pub async fn unmount_volume(
        &self,
        name: &str,
        application_id: Uuid,
        container: &str,
    ) -> Result<()> {
        self.send(
            self.client.delete(self.url(&format!(
                "/volumes/{}/mounts?application_id={}&container={}",
                name, application_id, container
            ))),
            "unmount volume",
        )
        .await?;
        Ok(())
    }
}
