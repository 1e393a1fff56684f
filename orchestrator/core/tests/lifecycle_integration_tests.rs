// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use appfleet_core::application::{
    ActionGuard, AliasService, ApplicationLifecycleService, CreateApplicationRequest,
    DeploymentService, ModuleService, MountVolumeRequest, PortService, StandardAliasService,
    StandardApplicationLifecycleService, StandardDeploymentService, StandardModuleService,
    StandardPortService, StandardVolumeService, VolumeService,
};
use appfleet_core::domain::application::{
    DeploymentType, OwnerId, PortNature, ServerType, Status,
};
use appfleet_core::domain::events::ApplicationEvent;
use appfleet_core::domain::repository::ApplicationRepository;
use appfleet_core::infrastructure::event_bus::{ApplicationEventListener, EventBus};
use appfleet_core::infrastructure::repositories::{
    InMemoryApplicationRepository, InMemoryVolumeRepository,
};
use appfleet_core::infrastructure::runtime::{MockContainerRuntime, RuntimeCall, RuntimeOp};
use appfleet_core::infrastructure::AuditListener;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

struct RecordingListener {
    kinds: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl ApplicationEventListener for RecordingListener {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_event(&self, event: &ApplicationEvent) -> anyhow::Result<()> {
        self.kinds.lock().push(event.kind());
        Ok(())
    }
}

struct BrokenListener;

#[async_trait]
impl ApplicationEventListener for BrokenListener {
    fn name(&self) -> &str {
        "broken"
    }

    async fn on_event(&self, _event: &ApplicationEvent) -> anyhow::Result<()> {
        anyhow::bail!("listener is down")
    }
}

struct Fleet {
    lifecycle: StandardApplicationLifecycleService,
    aliases: StandardAliasService,
    ports: StandardPortService,
    deployments: StandardDeploymentService,
    modules: StandardModuleService,
    volumes: StandardVolumeService,
    repository: Arc<InMemoryApplicationRepository>,
    runtime: MockContainerRuntime,
    recorder: Arc<RecordingListener>,
}

fn fleet() -> Fleet {
    let repository = Arc::new(InMemoryApplicationRepository::new());
    let volume_repository = Arc::new(InMemoryVolumeRepository::new());
    let runtime = MockContainerRuntime::new();
    let driver = Arc::new(runtime.clone());
    let event_bus = Arc::new(EventBus::with_default_capacity());
    let recorder = Arc::new(RecordingListener {
        kinds: Mutex::new(Vec::new()),
    });
    event_bus.register_listener(Arc::new(BrokenListener));
    event_bus.register_listener(Arc::new(AuditListener));
    event_bus.register_listener(recorder.clone());
    let guard = Arc::new(ActionGuard::new(repository.clone()));

    Fleet {
        lifecycle: StandardApplicationLifecycleService::new(
            repository.clone(),
            volume_repository.clone(),
            driver.clone(),
            guard.clone(),
            event_bus.clone(),
        ),
        aliases: StandardAliasService::new(repository.clone(), guard.clone()),
        ports: StandardPortService::new(repository.clone(), guard.clone(), "apps.example.net"),
        deployments: StandardDeploymentService::new(repository.clone(), guard.clone()),
        modules: StandardModuleService::new(repository.clone(), driver.clone(), guard.clone()),
        volumes: StandardVolumeService::new(
            volume_repository,
            repository.clone(),
            driver,
            guard,
            event_bus,
        ),
        repository,
        runtime,
        recorder,
    }
}

fn request(name: &str, server_type: ServerType) -> CreateApplicationRequest {
    CreateApplicationRequest {
        name: name.to_string(),
        display_name: None,
        server_type,
    }
}

#[tokio::test]
async fn test_full_application_lifecycle() {
    let fleet = fleet();
    let user = OwnerId::new("jdoe");

    let app = fleet
        .lifecycle
        .create(&user, request("shop", ServerType::Tomcat))
        .await
        .unwrap();
    assert_eq!(app.status(), Status::Start);

    fleet.aliases.add(&user, app.id, "Shop.Example.com ").await.unwrap();
    fleet
        .ports
        .add(&user, app.id, PortNature::Web, 8080, true)
        .await
        .unwrap();
    fleet
        .deployments
        .create(&user, app.id, DeploymentType::War, "/shop")
        .await
        .unwrap();
    let database = fleet.modules.add(&user, app.id, "postgres:16").await.unwrap();
    fleet.volumes.create("shop-data").await.unwrap();
    fleet
        .volumes
        .mount(
            &user,
            "shop-data",
            MountVolumeRequest {
                application_id: app.id,
                path: "/var/lib/shop".into(),
                read_only: false,
                container: None,
            },
        )
        .await
        .unwrap();

    let stopped = fleet.lifecycle.stop(&user, app.id).await.unwrap();
    assert_eq!(stopped.status(), Status::Stop);
    let started = fleet.lifecycle.start(&user, app.id).await.unwrap();
    assert_eq!(started.status(), Status::Start);
    let restarted = fleet.lifecycle.restart(&user, app.id).await.unwrap();
    assert_eq!(restarted.status(), Status::Start);

    let detail = fleet.lifecycle.detail(&user, app.id).await.unwrap();
    assert_eq!(detail.aliases(), ["shop.example.com".to_string()]);
    assert_eq!(detail.ports().len(), 1);
    assert_eq!(detail.deployments().len(), 1);
    assert_eq!(detail.modules().len(), 2);

    fleet.lifecycle.delete(&user, app.id).await.unwrap();

    assert!(fleet.lifecycle.detail(&user, app.id).await.unwrap_err().is_not_found());
    assert!(fleet.volumes.get("shop-data").await.unwrap().mounts().is_empty());
    fleet.volumes.remove("shop-data").await.unwrap();
    let calls = fleet.runtime.calls();
    assert!(calls.contains(&RuntimeCall::Remove("jdoe-shop-tomcat".into())));
    assert!(calls.contains(&RuntimeCall::Remove(database.name.clone())));

    // The broken listener sits first and never blocks the others
    assert_eq!(
        *fleet.recorder.kinds.lock(),
        vec![
            "pending", "started", // create
            "pending", "stopped", // stop
            "pending", "started", // start
            "pending", "started", // restart
            "pending", "deleted", // delete
        ]
    );
}

#[tokio::test]
async fn test_failed_start_recovers_on_next_start() {
    let fleet = fleet();
    let user = OwnerId::new("jdoe");
    let app = fleet
        .lifecycle
        .create(&user, request("blog", ServerType::Nginx))
        .await
        .unwrap();
    fleet.lifecycle.stop(&user, app.id).await.unwrap();

    fleet.runtime.fail_on(RuntimeOp::Start, "jdoe-blog");
    assert!(fleet.lifecycle.start(&user, app.id).await.is_err());
    let failed = fleet.repository.find_by_id(app.id).await.unwrap().unwrap();
    assert_eq!(failed.status(), Status::Fail);

    fleet.runtime.clear_failures();
    let recovered = fleet.lifecycle.start(&user, app.id).await.unwrap();
    assert_eq!(recovered.status(), Status::Start);
}

#[tokio::test]
async fn test_aliases_are_unique_across_owners() {
    let fleet = fleet();
    let alice = OwnerId::new("alice");
    let bob = OwnerId::new("bob");
    let first = fleet
        .lifecycle
        .create(&alice, request("shop", ServerType::Node))
        .await
        .unwrap();
    let second = fleet
        .lifecycle
        .create(&bob, request("shop", ServerType::Node))
        .await
        .unwrap();

    fleet.aliases.add(&alice, first.id, "shop.example.com").await.unwrap();
    let err = fleet
        .aliases
        .add(&bob, second.id, "SHOP.example.com")
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(fleet.aliases.list(&bob, second.id).await.unwrap().is_empty());
    // Bob cannot see Alice's application at all
    assert!(fleet
        .aliases
        .list(&bob, first.id)
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_one_pending_action_per_owner() {
    let fleet = fleet();
    let user = OwnerId::new("jdoe");
    let shop = fleet
        .lifecycle
        .create(&user, request("shop", ServerType::Tomcat))
        .await
        .unwrap();
    let blog = fleet
        .lifecycle
        .create(&user, request("blog", ServerType::Apache))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        fleet.lifecycle.restart(&user, shop.id),
        fleet.lifecycle.restart(&user, blog.id)
    );

    assert_eq!(
        [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "exactly one restart may run at a time for one owner"
    );
    let loser = a.err().or(b.err()).unwrap();
    assert!(loser.is_conflict());
    for id in [shop.id, blog.id] {
        let stored = fleet.repository.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status(), Status::Start);
    }
}
