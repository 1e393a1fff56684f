// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Container Runtime Infrastructure Module
//!
//! Implementations of the `ContainerRuntime` port: Docker through bollard,
//! and a recording runtime for tests.

pub mod docker;

pub use docker::DockerRuntime;

// Re-export MockContainerRuntime for testing
pub use mock::{MockContainerRuntime, RuntimeCall, RuntimeOp};

mod mock {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    use crate::domain::runtime::{ContainerRef, ContainerRuntime, ContainerSpec, RuntimeError};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RuntimeOp {
        Create,
        Start,
        Stop,
        Remove,
        CreateVolume,
        RemoveVolume,
        Mount,
        Unmount,
    }

    /// One driver invocation, in call order
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum RuntimeCall {
        Create(String),
        Start(String),
        Stop(String),
        Remove(String),
        CreateVolume(String),
        RemoveVolume(String),
        Mount {
            volume: String,
            container: String,
            path: String,
            read_only: bool,
        },
        Unmount {
            volume: String,
            container: String,
        },
    }

    /// Records every call and fails the ones matching an injected rule.
    ///
    /// Each call yields once so concurrent actions interleave in tests.
    #[derive(Clone, Default)]
    pub struct MockContainerRuntime {
        calls: Arc<Mutex<Vec<RuntimeCall>>>,
        failures: Arc<Mutex<Vec<(RuntimeOp, String)>>>,
    }

    impl MockContainerRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail `op` on every target whose name contains `target`
        pub fn fail_on(&self, op: RuntimeOp, target: impl Into<String>) {
            self.failures.lock().push((op, target.into()));
        }

        pub fn clear_failures(&self) {
            self.failures.lock().clear();
        }

        pub fn calls(&self) -> Vec<RuntimeCall> {
            self.calls.lock().clone()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().clear();
        }

        async fn record(&self, op: RuntimeOp, target: &str, call: RuntimeCall) -> Result<(), String> {
            tokio::task::yield_now().await;
            self.calls.lock().push(call);
            let fails = self
                .failures
                .lock()
                .iter()
                .any(|(o, t)| *o == op && target.contains(t.as_str()));
            if fails {
                Err(format!("injected {:?} failure", op))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockContainerRuntime {
        async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerRef, RuntimeError> {
            self.record(RuntimeOp::Create, &spec.name, RuntimeCall::Create(spec.name.clone()))
                .await
                .map_err(|reason| RuntimeError::CreateFailed {
                    container: spec.name.clone(),
                    reason,
                })?;
            Ok(ContainerRef::new(spec.name.clone()))
        }

        async fn start_container(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
            let name = container.to_string();
            self.record(RuntimeOp::Start, &name, RuntimeCall::Start(name.clone()))
                .await
                .map_err(|reason| RuntimeError::StartFailed { container: name, reason })
        }

        async fn stop_container(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
            let name = container.to_string();
            self.record(RuntimeOp::Stop, &name, RuntimeCall::Stop(name.clone()))
                .await
                .map_err(|reason| RuntimeError::StopFailed { container: name, reason })
        }

        async fn remove_container(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
            let name = container.to_string();
            self.record(RuntimeOp::Remove, &name, RuntimeCall::Remove(name.clone()))
                .await
                .map_err(|reason| RuntimeError::RemoveFailed { container: name, reason })
        }

        async fn create_volume(&self, name: &str) -> Result<(), RuntimeError> {
            self.record(RuntimeOp::CreateVolume, name, RuntimeCall::CreateVolume(name.to_string()))
                .await
                .map_err(|reason| RuntimeError::VolumeFailed {
                    volume: name.to_string(),
                    reason,
                })
        }

        async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
            self.record(RuntimeOp::RemoveVolume, name, RuntimeCall::RemoveVolume(name.to_string()))
                .await
                .map_err(|reason| RuntimeError::VolumeFailed {
                    volume: name.to_string(),
                    reason,
                })
        }

        async fn mount_volume(
            &self,
            volume: &str,
            path: &str,
            read_only: bool,
            container: &ContainerRef,
        ) -> Result<(), RuntimeError> {
            let call = RuntimeCall::Mount {
                volume: volume.to_string(),
                container: container.to_string(),
                path: path.to_string(),
                read_only,
            };
            self.record(RuntimeOp::Mount, volume, call)
                .await
                .map_err(|reason| RuntimeError::VolumeFailed {
                    volume: volume.to_string(),
                    reason,
                })
        }

        async fn unmount_volume(&self, volume: &str, container: &ContainerRef) -> Result<(), RuntimeError> {
            let call = RuntimeCall::Unmount {
                volume: volume.to_string(),
                container: container.to_string(),
            };
            self.record(RuntimeOp::Unmount, volume, call)
                .await
                .map_err(|reason| RuntimeError::VolumeFailed {
                    volume: volume.to_string(),
                    reason,
                })
        }
    }
}
