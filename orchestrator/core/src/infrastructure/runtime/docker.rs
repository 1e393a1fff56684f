// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Docker Runtime
//!
//! `ContainerRuntime` adapter over the Docker Engine API (bollard).
//!
//! Docker cannot add a bind mount to an existing container, so volume
//! (un)mounting recreates the container with the same name, image, env,
//! labels and host config, then restarts it if it was running.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::service::HostConfig;
use bollard::volume::{CreateVolumeOptions, RemoveVolumeOptions};
use bollard::Docker;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::domain::runtime::{ContainerRef, ContainerRuntime, ContainerSpec, RuntimeError};

pub const LABEL_MANAGED: &str = "io.appfleet.managed";

pub struct DockerRuntime {
    docker: Docker,
    network: Option<String>,
    image_registry: Option<String>,
    stop_timeout_secs: i64,
}

impl DockerRuntime {
    pub fn new(
        socket_path: Option<String>,
        network: Option<String>,
        image_registry: Option<String>,
        stop_timeout_secs: u64,
    ) -> Result<Self, RuntimeError> {
        let docker = if let Some(path) = socket_path {
            #[cfg(unix)]
            let result = Docker::connect_with_unix(&path, 120, bollard::API_DEFAULT_VERSION);

            #[cfg(windows)]
            let result = Docker::connect_with_named_pipe(&path, 120, bollard::API_DEFAULT_VERSION);

            result.map_err(|e| {
                RuntimeError::Unavailable(format!(
                    "Failed to connect to Docker at {}: {}\n\n\
                     Ensure Docker is running and the socket path is correct.",
                    path, e
                ))
            })?
        } else {
            Docker::connect_with_local_defaults().map_err(|e| {
                RuntimeError::Unavailable(format!(
                    "Failed to connect to Docker: {}\n\n\
                     Check that the daemon is running (docker ps) and that the\n\
                     current user may access the Docker socket.",
                    e
                ))
            })?
        };

        Ok(Self {
            docker,
            network,
            image_registry,
            stop_timeout_secs: stop_timeout_secs as i64,
        })
    }

    /// Verify Docker daemon is accessible
    pub async fn healthcheck(&self) -> Result<(), RuntimeError> {
        self.docker.ping().await.map_err(|e| {
            RuntimeError::Unavailable(format!(
                "Cannot connect to Docker daemon: {}\n\nVerify with: docker ps",
                e
            ))
        })?;
        Ok(())
    }

    /// Pull the image unless it is already present locally
    async fn ensure_image(&self, image: &str) -> Result<(), String> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }

        info!("Pulling image: {}", image);
        let options = Some(CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(result) = stream.next().await {
            if let Err(e) = result {
                return Err(format!(
                    "Failed to pull image {}: {}\n\nTry manually: docker pull {}",
                    image, e, image
                ));
            }
        }
        info!("Successfully pulled image: {}", image);
        Ok(())
    }

    /// Recreate `container` with its binds rewritten by `edit`
    async fn recreate_with_binds<F>(
        &self,
        container: &ContainerRef,
        volume: &str,
        edit: F,
    ) -> Result<(), RuntimeError>
    where
        F: FnOnce(&mut Vec<String>),
    {
        let volume_error = |reason: String| RuntimeError::VolumeFailed {
            volume: volume.to_string(),
            reason,
        };

        let inspect = self
            .docker
            .inspect_container(container.as_str(), None)
            .await
            .map_err(|e| classify(container, e, |reason| volume_error(reason)))?;

        let was_running = inspect
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false);
        let config = inspect.config.unwrap_or_default();
        let mut host_config = inspect.host_config.unwrap_or_default();

        let mut binds = host_config.binds.take().unwrap_or_default();
        edit(&mut binds);
        host_config.binds = Some(binds);

        if was_running {
            self.stop_container(container).await?;
        }
        self.docker
            .remove_container(
                container.as_str(),
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| volume_error(e.to_string()))?;

        let recreated = Config {
            image: config.image,
            env: config.env,
            labels: config.labels,
            cmd: config.cmd,
            host_config: Some(host_config),
            ..Default::default()
        };
        self.docker
            .create_container(
                Some(CreateContainerOptions {
                    name: container.to_string(),
                    platform: None,
                }),
                recreated,
            )
            .await
            .map_err(|e| volume_error(e.to_string()))?;

        if was_running {
            self.start_container(container).await?;
        }
        debug!("Recreated container {} with updated binds", container);
        Ok(())
    }
}

/// 404 becomes `ContainerNotFound`, everything else goes through `other`
fn classify<F>(container: &ContainerRef, error: DockerError, other: F) -> RuntimeError
where
    F: FnOnce(String) -> RuntimeError,
{
    match error {
        DockerError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::ContainerNotFound(container.to_string()),
        e => other(e.to_string()),
    }
}

/// 304 means the container already is in the requested state
fn is_not_modified(error: &DockerError) -> bool {
    matches!(
        error,
        DockerError::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}

/// Prefix `image` with the configured registry unless it already names one
fn qualify_image(registry: Option<&str>, image: &str) -> String {
    let names_registry = image
        .split_once('/')
        .is_some_and(|(host, _)| host.contains('.') || host.contains(':') || host == "localhost");
    match registry {
        Some(registry) if !names_registry => format!("{}/{}", registry.trim_end_matches('/'), image),
        _ => image.to_string(),
    }
}

fn bind_spec(volume: &str, path: &str, read_only: bool) -> String {
    if read_only {
        format!("{}:{}:ro", volume, path)
    } else {
        format!("{}:{}", volume, path)
    }
}

fn bind_source(bind: &str) -> &str {
    bind.split(':').next().unwrap_or(bind)
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerRef, RuntimeError> {
        let create_error = |reason: String| RuntimeError::CreateFailed {
            container: spec.name.clone(),
            reason,
        };

        let image = qualify_image(self.image_registry.as_deref(), &spec.image);
        self.ensure_image(&image).await.map_err(create_error)?;

        let mut labels = spec.labels.clone();
        labels.insert(LABEL_MANAGED.to_string(), "true".to_string());

        let host_config = HostConfig {
            network_mode: self.network.clone(),
            ..Default::default()
        };
        let config = Config {
            image: Some(image),
            env: Some(spec.env.clone()),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        self.docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| create_error(e.to_string()))?;

        info!("Created container: {}", spec.name);
        // Addressed by name so the reference survives recreation
        Ok(ContainerRef::new(spec.name.clone()))
    }

    async fn start_container(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
        match self
            .docker
            .start_container(container.as_str(), None::<StartContainerOptions<String>>)
            .await
        {
            Ok(()) => {
                info!("Started container: {}", container);
                Ok(())
            }
            Err(e) if is_not_modified(&e) => {
                debug!("Container {} already running", container);
                Ok(())
            }
            Err(e) => Err(classify(container, e, |reason| RuntimeError::StartFailed {
                container: container.to_string(),
                reason,
            })),
        }
    }

    async fn stop_container(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
        let options = StopContainerOptions {
            t: self.stop_timeout_secs,
        };
        match self
            .docker
            .stop_container(container.as_str(), Some(options))
            .await
        {
            Ok(()) => {
                info!("Stopped container: {}", container);
                Ok(())
            }
            Err(e) if is_not_modified(&e) => {
                debug!("Container {} already stopped", container);
                Ok(())
            }
            Err(e) => Err(classify(container, e, |reason| RuntimeError::StopFailed {
                container: container.to_string(),
                reason,
            })),
        }
    }

    async fn remove_container(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        self.docker
            .remove_container(container.as_str(), Some(options))
            .await
            .map_err(|e| {
                classify(container, e, |reason| RuntimeError::RemoveFailed {
                    container: container.to_string(),
                    reason,
                })
            })?;

        info!("Removed container: {}", container);
        Ok(())
    }

    async fn create_volume(&self, name: &str) -> Result<(), RuntimeError> {
        let options = CreateVolumeOptions {
            name: name.to_string(),
            labels: [(LABEL_MANAGED.to_string(), "true".to_string())].into(),
            ..Default::default()
        };
        self.docker
            .create_volume(options)
            .await
            .map_err(|e| RuntimeError::VolumeFailed {
                volume: name.to_string(),
                reason: e.to_string(),
            })?;

        info!("Created volume: {}", name);
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
        match self
            .docker
            .remove_volume(name, None::<RemoveVolumeOptions>)
            .await
        {
            Ok(()) => {
                info!("Removed volume: {}", name);
                Ok(())
            }
            Err(DockerError::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                warn!("Volume {} already absent from the runtime", name);
                Ok(())
            }
            Err(e) => Err(RuntimeError::VolumeFailed {
                volume: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    async fn mount_volume(
        &self,
        volume: &str,
        path: &str,
        read_only: bool,
        container: &ContainerRef,
    ) -> Result<(), RuntimeError> {
        let bind = bind_spec(volume, path, read_only);
        self.recreate_with_binds(container, volume, |binds| {
            binds.retain(|b| bind_source(b) != volume);
            binds.push(bind);
        })
        .await?;

        info!("Mounted volume {} at {} in {}", volume, path, container);
        Ok(())
    }

    async fn unmount_volume(&self, volume: &str, container: &ContainerRef) -> Result<(), RuntimeError> {
        self.recreate_with_binds(container, volume, |binds| {
            binds.retain(|b| bind_source(b) != volume);
        })
        .await?;

        info!("Unmounted volume {} from {}", volume, container);
        Ok(())
    }
}
