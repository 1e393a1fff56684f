// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application
//!
//! The `Application` aggregate root: a server container plus auxiliary modules,
//! network aliases, opened ports and deployment history, owned by one user.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Status state machine and sub-resource invariants
//!
//! Status transitions are only ever driven through the `mark_*` commands:
//!
//! ```text
//! START | STOP | FAIL ──mark_pending──▶ PENDING
//! PENDING ──mark_started──▶ START
//! PENDING ──mark_stopped──▶ STOP
//! PENDING ──release_to(previous)──▶ previous
//! any ──mark_failed──▶ FAIL
//! ```
//!
//! Hostnames routed to an application are its aliases plus the forwarding
//! hostnames of quick-access ports; both share one fleet-wide namespace.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::module::{Module, ModuleKind};
use crate::domain::runtime::ContainerRef;

static APPLICATION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{0,63}$").expect("application name pattern"));

static HOSTNAME_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("hostname label pattern"));

const MAX_HOSTNAME_LEN: usize = 253;

// ============================================================================
// Value Objects
// ============================================================================

/// Unique identifier for an application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for ApplicationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Login of the user owning (and acting on) applications
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(login: impl Into<String>) -> Self {
        Self(login.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of an application.
///
/// `Pending` only ever persists while a lifecycle action is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Pending,
    Start,
    Stop,
    Fail,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Fail => "FAIL",
        }
    }

    /// Whether a new lifecycle action may be claimed from this status
    pub fn is_at_rest(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "START" => Ok(Self::Start),
            "STOP" => Ok(Self::Stop),
            "FAIL" => Ok(Self::Fail),
            other => Err(ApplicationError::UnknownStatus(other.to_string())),
        }
    }
}

/// Kind of server the application's primary container runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Java,
    Tomcat,
    Wildfly,
    Apache,
    Nginx,
    Node,
}

impl ServerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Tomcat => "tomcat",
            Self::Wildfly => "wildfly",
            Self::Apache => "apache",
            Self::Nginx => "nginx",
            Self::Node => "node",
        }
    }

    /// Container image used for the server module
    pub fn image(&self) -> &'static str {
        match self {
            Self::Java => "eclipse-temurin:21-jre",
            Self::Tomcat => "tomcat:10.1",
            Self::Wildfly => "quay.io/wildfly/wildfly:latest",
            Self::Apache => "httpd:2.4",
            Self::Nginx => "nginx:stable",
            Self::Node => "node:22-slim",
        }
    }

    pub fn is_jvm(&self) -> bool {
        matches!(self, Self::Java | Self::Tomcat | Self::Wildfly)
    }
}

impl fmt::Display for ServerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerType {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "java" => Ok(Self::Java),
            "tomcat" => Ok(Self::Tomcat),
            "wildfly" => Ok(Self::Wildfly),
            "apache" => Ok(Self::Apache),
            "nginx" => Ok(Self::Nginx),
            "node" => Ok(Self::Node),
            other => Err(ApplicationError::UnknownServerType(other.to_string())),
        }
    }
}

/// What an opened port is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortNature {
    Web,
    Jmx,
    Debug,
}

impl PortNature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::Jmx => "jmx",
            Self::Debug => "debug",
        }
    }

    /// JMX and remote debugging only make sense on a JVM server
    pub fn is_compatible_with(&self, server_type: ServerType) -> bool {
        match self {
            Self::Web => true,
            Self::Jmx | Self::Debug => server_type.is_jvm(),
        }
    }
}

impl fmt::Display for PortNature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortNature {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Self::Web),
            "jmx" => Ok(Self::Jmx),
            "debug" => Ok(Self::Debug),
            other => Err(ApplicationError::UnknownPortNature(other.to_string())),
        }
    }
}

/// A port exposed by the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortToOpen {
    pub number: u16,
    pub nature: PortNature,
    pub quick_access: bool,
    /// Forwarding hostname, present when quick access was requested
    pub alias: Option<String>,
}

/// Packaging of a deployed artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    War,
    Ear,
    Jar,
}

impl DeploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::War => "war",
            Self::Ear => "ear",
            Self::Jar => "jar",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentType {
    type Err = ApplicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "war" => Ok(Self::War),
            "ear" => Ok(Self::Ear),
            "jar" => Ok(Self::Jar),
            other => Err(ApplicationError::UnknownDeploymentType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeploymentId(pub Uuid);

impl DeploymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeploymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Record of one artifact deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub context_path: String,
    pub deployment_type: DeploymentType,
    pub deployed_at: DateTime<Utc>,
}

// ============================================================================
// Aggregate Root: Application
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub display_name: String,
    pub owner: OwnerId,
    pub server_type: ServerType,
    status: Status,
    modules: Vec<Module>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    ports: Vec<PortToOpen>,
    #[serde(default)]
    deployments: Vec<Deployment>,
    pub created_at: DateTime<Utc>,
    /// Optimistic concurrency counter, bumped by the store on every write
    #[serde(default)]
    pub version: u64,
}

impl Application {
    /// Allocate a new application around its server module.
    ///
    /// The aggregate starts out `PENDING`; it only becomes durable once the
    /// server container is running and `mark_started` has been applied.
    pub fn new(
        name: impl Into<String>,
        display_name: Option<String>,
        owner: OwnerId,
        server_type: ServerType,
        server: Module,
    ) -> Result<Self, ApplicationError> {
        let name = name.into();
        validate_application_name(&name)?;
        if server.kind != ModuleKind::Server {
            return Err(ApplicationError::MissingServerModule);
        }

        let display_name = display_name
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| name.clone());

        Ok(Self {
            id: ApplicationId::new(),
            name,
            display_name,
            owner,
            server_type,
            status: Status::Pending,
            modules: vec![server],
            aliases: Vec::new(),
            ports: Vec::new(),
            deployments: Vec::new(),
            created_at: Utc::now(),
            version: 0,
        })
    }

    /// Resolve kind-specific module behaviour after the record was loaded
    pub fn rehydrate(&mut self) {
        for module in &mut self.modules {
            module.resolve_profile();
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    // ========================================================================
    // Status transitions
    // ========================================================================

    pub fn mark_pending(&mut self) -> Result<(), ApplicationError> {
        if !self.status.is_at_rest() {
            return Err(ApplicationError::InvalidStateTransition {
                from: self.status,
                to: Status::Pending,
            });
        }
        self.status = Status::Pending;
        Ok(())
    }

    pub fn mark_started(&mut self) -> Result<(), ApplicationError> {
        self.require_pending(Status::Start)?;
        let now = Utc::now();
        for module in &mut self.modules {
            module.started_at = Some(now);
        }
        self.status = Status::Start;
        Ok(())
    }

    pub fn mark_stopped(&mut self) -> Result<(), ApplicationError> {
        self.require_pending(Status::Stop)?;
        self.status = Status::Stop;
        Ok(())
    }

    /// FAIL is reachable from every status
    pub fn mark_failed(&mut self) {
        self.status = Status::Fail;
    }

    /// Hand back a claim taken for a sub-resource change
    pub fn release_to(&mut self, previous: Status) -> Result<(), ApplicationError> {
        self.require_pending(previous)?;
        if !previous.is_at_rest() {
            return Err(ApplicationError::InvalidStateTransition {
                from: self.status,
                to: previous,
            });
        }
        self.status = previous;
        Ok(())
    }

    fn require_pending(&self, to: Status) -> Result<(), ApplicationError> {
        if self.status != Status::Pending {
            return Err(ApplicationError::InvalidStateTransition {
                from: self.status,
                to,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Modules
    // ========================================================================

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn server(&self) -> &Module {
        // constructor and remove_module keep the server at index 0
        &self.modules[0]
    }

    pub fn auxiliary_modules(&self) -> impl DoubleEndedIterator<Item = &Module> {
        self.modules.iter().filter(|m| m.kind == ModuleKind::Module)
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Auxiliary modules in declared order, then the server
    pub fn start_order(&self) -> Vec<&Module> {
        let mut order: Vec<&Module> = self.auxiliary_modules().collect();
        order.push(self.server());
        order
    }

    /// The server first, then auxiliary modules in reverse declared order
    pub fn stop_order(&self) -> Vec<&Module> {
        let mut order = vec![self.server()];
        order.extend(self.auxiliary_modules().rev());
        order
    }

    /// Next free instance number for a module running `image`
    pub fn next_module_index(&self, image: &str) -> usize {
        self.auxiliary_modules().filter(|m| m.image == image).count() + 1
    }

    pub fn add_module(&mut self, module: Module) -> Result<(), ApplicationError> {
        if module.kind == ModuleKind::Server {
            return Err(ApplicationError::DuplicateServerModule);
        }
        if self.module(&module.name).is_some() {
            return Err(ApplicationError::DuplicateModule(module.name));
        }
        self.modules.push(module);
        Ok(())
    }

    pub fn remove_module(&mut self, name: &str) -> Result<Module, ApplicationError> {
        let index = self
            .modules
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| ApplicationError::ModuleNotFound(name.to_string()))?;
        if self.modules[index].kind == ModuleKind::Server {
            return Err(ApplicationError::ServerModuleRemoval);
        }
        Ok(self.modules.remove(index))
    }

    /// Record the reference the runtime created a module's container under
    pub fn bind_container(&mut self, module_name: &str, container: ContainerRef) -> Result<(), ApplicationError> {
        let module = self
            .modules
            .iter_mut()
            .find(|m| m.name == module_name)
            .ok_or_else(|| ApplicationError::ModuleNotFound(module_name.to_string()))?;
        module.container = container;
        Ok(())
    }

    // ========================================================================
    // Aliases
    // ========================================================================

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.iter().any(|a| a == alias)
    }

    /// Aliases, then quick-access port hostnames
    pub fn hostnames(&self) -> impl Iterator<Item = &str> {
        self.aliases
            .iter()
            .map(String::as_str)
            .chain(self.ports.iter().filter_map(|p| p.alias.as_deref()))
    }

    pub fn holds_hostname(&self, hostname: &str) -> bool {
        self.hostnames().any(|h| h == hostname)
    }

    /// Add an already normalized alias
    pub fn add_alias(&mut self, alias: String) -> Result<(), ApplicationError> {
        if self.has_alias(&alias) {
            return Err(ApplicationError::DuplicateAlias(alias));
        }
        self.aliases.push(alias);
        Ok(())
    }

    pub fn remove_alias(&mut self, alias: &str) -> Result<(), ApplicationError> {
        let before = self.aliases.len();
        self.aliases.retain(|a| a != alias);
        if self.aliases.len() == before {
            return Err(ApplicationError::AliasNotFound(alias.to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Ports
    // ========================================================================

    pub fn ports(&self) -> &[PortToOpen] {
        &self.ports
    }

    pub fn port(&self, number: u16) -> Option<&PortToOpen> {
        self.ports.iter().find(|p| p.number == number)
    }

    /// Open a port; the number arrives unchecked from the caller
    pub fn open_port(
        &mut self,
        nature: PortNature,
        number: u32,
        quick_access: bool,
        domain_suffix: &str,
    ) -> Result<PortToOpen, ApplicationError> {
        let number = u16::try_from(number)
            .ok()
            .filter(|n| *n != 0)
            .ok_or(ApplicationError::InvalidPort(number))?;
        if self.port(number).is_some() {
            return Err(ApplicationError::PortAlreadyOpen(number));
        }
        if !nature.is_compatible_with(self.server_type) {
            return Err(ApplicationError::IncompatiblePortNature {
                nature,
                server_type: self.server_type,
            });
        }

        let alias = quick_access.then(|| {
            format!(
                "{}-{}-forward-{}.{}",
                self.name,
                hostname_fragment(self.owner.as_str()),
                number,
                domain_suffix.trim_start_matches('.')
            )
        });
        let port = PortToOpen {
            number,
            nature,
            quick_access,
            alias,
        };
        self.ports.push(port.clone());
        Ok(port)
    }

    pub fn close_port(&mut self, number: u16) -> Result<PortToOpen, ApplicationError> {
        let index = self
            .ports
            .iter()
            .position(|p| p.number == number)
            .ok_or(ApplicationError::PortNotFound(number))?;
        Ok(self.ports.remove(index))
    }

    // ========================================================================
    // Deployments
    // ========================================================================

    /// Deployment history, oldest first
    pub fn deployments(&self) -> &[Deployment] {
        &self.deployments
    }

    pub fn add_deployment(
        &mut self,
        deployment_type: DeploymentType,
        context_path: &str,
    ) -> Result<Deployment, ApplicationError> {
        let context_path = context_path.trim();
        if !context_path.starts_with('/') || context_path.contains(char::is_whitespace) {
            return Err(ApplicationError::InvalidContextPath(context_path.to_string()));
        }
        let deployment = Deployment {
            id: DeploymentId::new(),
            context_path: context_path.to_string(),
            deployment_type,
            deployed_at: Utc::now(),
        };
        self.deployments.push(deployment.clone());
        Ok(deployment)
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

pub fn validate_application_name(name: &str) -> Result<(), ApplicationError> {
    if APPLICATION_NAME.is_match(name) {
        Ok(())
    } else {
        Err(ApplicationError::InvalidName(name.to_string()))
    }
}

/// Lower-case and trim a hostname alias, then check every dot-separated label
pub fn normalize_alias(raw: &str) -> Result<String, ApplicationError> {
    let alias = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    let valid = !alias.is_empty()
        && alias.len() <= MAX_HOSTNAME_LEN
        && alias.split('.').all(|label| HOSTNAME_LABEL.is_match(label));
    if !valid {
        return Err(ApplicationError::InvalidAlias(raw.to_string()));
    }
    Ok(alias)
}

/// Encode a login into hostname label characters.
///
/// Lower-case letters and digits are kept; every other character becomes
/// `-{hex code point}-`, so two logins never share a fragment.
fn hostname_fragment(login: &str) -> String {
    let mut fragment = String::with_capacity(login.len());
    for c in login.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            fragment.push(c);
        } else {
            fragment.push_str(&format!("-{:x}-", u32::from(c)));
        }
    }
    fragment
}

// ============================================================================
// Domain Errors
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("Invalid application name '{0}': expected 1-64 chars of [a-z0-9-] starting with a letter")]
    InvalidName(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Unknown server type: {0}")]
    UnknownServerType(String),

    #[error("Unknown port nature: {0}")]
    UnknownPortNature(String),

    #[error("Unknown deployment type: {0}")]
    UnknownDeploymentType(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: Status, to: Status },

    #[error("Application requires a server module")]
    MissingServerModule,

    #[error("Application already has a server module")]
    DuplicateServerModule,

    #[error("Module '{0}' already exists")]
    DuplicateModule(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("The server module cannot be removed")]
    ServerModuleRemoval,

    #[error("Invalid alias: '{0}'")]
    InvalidAlias(String),

    #[error("Alias '{0}' is already used by this application")]
    DuplicateAlias(String),

    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    #[error("Invalid port number {0}: expected 1-65535")]
    InvalidPort(u32),

    #[error("Port {0} is already open")]
    PortAlreadyOpen(u16),

    #[error("Port nature {nature} is not supported by a {server_type} server")]
    IncompatiblePortNature {
        nature: PortNature,
        server_type: ServerType,
    },

    #[error("Port not found: {0}")]
    PortNotFound(u16),

    #[error("Invalid context path '{0}': must start with '/'")]
    InvalidContextPath(String),
}

impl ApplicationError {
    /// Errors that name a sub-resource the application does not have
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound(_) | Self::AliasNotFound(_) | Self::PortNotFound(_)
        )
    }
}
