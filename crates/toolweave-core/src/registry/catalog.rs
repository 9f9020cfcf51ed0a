//! The tool catalog: registration, resolution, and introspection.
//!
//! The catalog maps tool name to every registered version of that tool.
//! Registration is the only writer and runs under the catalog write lock
//! from first check to final insert, so a rejected descriptor leaves no
//! trace. Invocations take a short read lock to resolve a tool and then run
//! without holding it.
//!
//! `enabled` / `deprecated` are runtime flags kept per tool name, separate
//! from the immutable descriptors.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use semver::Version;
use tokio::sync::RwLock;

use toolweave_types::config::EngineConfig;
use toolweave_types::error::ToolError;
use toolweave_types::tool::{
    DependencyReport, RegistrationReport, RegistryStats, ToolDependency, ToolDescriptor,
    ToolFilter, ToolStats, ToolSummary,
};

use super::graph::DependencyGraph;
use super::handler::{BoxToolHandler, ToolHandler};
use crate::retry::RetryEngine;
use crate::schema::check_schema;
use crate::version::{
    VersionError, VersionRange, host_compatible, max_satisfying, parse_version,
};

pub(crate) type Catalog = BTreeMap<String, BTreeMap<Version, Arc<RegisteredTool>>>;

/// A descriptor paired with its handler, as stored in the catalog.
#[derive(Debug)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub version: Version,
    pub(crate) handler: BoxToolHandler,
}

/// Mutable per-name flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFlags {
    pub enabled: bool,
    pub deprecated: bool,
    pub deprecation_message: Option<String>,
}

impl ToolFlags {
    fn from_descriptor(descriptor: &ToolDescriptor) -> Self {
        Self {
            enabled: descriptor.enabled,
            deprecated: descriptor.deprecated,
            deprecation_message: descriptor.deprecation_message.clone(),
        }
    }
}

/// Versioned catalog of executable tools.
///
/// Construct one per process (or per test) and share it behind an `Arc`.
#[derive(Debug)]
pub struct ToolRegistry {
    pub(crate) catalog: RwLock<Catalog>,
    pub(crate) flags: DashMap<String, ToolFlags>,
    pub(crate) stats: DashMap<String, ToolStats>,
    pub(crate) retry: Arc<RetryEngine>,
    host_version: Version,
}

impl ToolRegistry {
    pub fn new(retry: Arc<RetryEngine>) -> Self {
        let host_version =
            Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0));
        Self {
            catalog: RwLock::new(BTreeMap::new()),
            flags: DashMap::new(),
            stats: DashMap::new(),
            retry,
            host_version,
        }
    }

    /// Build a registry (and its retry engine) from engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, VersionError> {
        let host_version = parse_version(&config.host_version)?;
        let retry = RetryEngine::with_policies(config.retry_policies.clone());
        Ok(Self::new(Arc::new(retry)).with_host_version(host_version))
    }

    pub fn with_host_version(mut self, host_version: Version) -> Self {
        self.host_version = host_version;
        self
    }

    pub fn host_version(&self) -> &Version {
        &self.host_version
    }

    pub fn retry_engine(&self) -> &Arc<RetryEngine> {
        &self.retry
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a tool, reporting the outcome instead of failing.
    pub async fn register<H>(&self, descriptor: ToolDescriptor, handler: H) -> RegistrationReport
    where
        H: ToolHandler + 'static,
    {
        let name = descriptor.name.clone();
        match self.try_register(descriptor, handler).await {
            Ok(report) => report,
            Err(err) => {
                tracing::warn!(tool = name.as_str(), error = %err, "tool registration rejected");
                RegistrationReport {
                    accepted: false,
                    errors: vec![err.to_string()],
                    warnings: Vec::new(),
                }
            }
        }
    }

    /// Register a tool. On error the catalog is unchanged.
    ///
    /// Fails on a malformed descriptor, a duplicate `(name, version)`, a
    /// missing required dependency, or a dependency cycle. Absent optional
    /// dependencies and unsatisfied ranges on present ones become warnings.
    pub async fn try_register<H>(
        &self,
        descriptor: ToolDescriptor,
        handler: H,
    ) -> Result<RegistrationReport, ToolError>
    where
        H: ToolHandler + 'static,
    {
        let checked = check_descriptor(&descriptor, &self.host_version)?;

        let mut catalog = self.catalog.write().await;

        if catalog
            .get(&descriptor.name)
            .is_some_and(|versions| versions.contains_key(&checked.version))
        {
            return Err(ToolError::AlreadyRegistered {
                name: descriptor.name.clone(),
                version: checked.version.to_string(),
            });
        }

        let mut warnings = Vec::new();
        for (dep, range) in descriptor.dependencies.iter().zip(&checked.ranges) {
            match catalog.get(&dep.name) {
                None if dep.optional => {
                    warnings.push(format!("optional dependency '{}' is not registered", dep.name));
                }
                None => {
                    return Err(ToolError::Dependency(format!(
                        "required dependency '{}' of '{}' is not registered",
                        dep.name, descriptor.name
                    )));
                }
                Some(versions) => {
                    if max_satisfying(versions.keys(), range).is_none() {
                        let available: Vec<String> =
                            versions.keys().map(ToString::to_string).collect();
                        warnings.push(format!(
                            "dependency '{}' has no version matching '{}' (registered: {})",
                            dep.name,
                            range,
                            available.join(", ")
                        ));
                    }
                }
            }
        }

        if let Some(cycle) = DependencyGraph::from_catalog(&catalog)
            .with_descriptor(&descriptor)
            .find_cycle()
        {
            return Err(ToolError::Cycle(cycle));
        }

        if descriptor.deprecated {
            warnings.push(match &descriptor.deprecation_message {
                Some(message) => format!("'{}' is deprecated: {message}", descriptor.name),
                None => format!("'{}' is deprecated", descriptor.name),
            });
        }

        let name = descriptor.name.clone();
        let version = checked.version;
        let is_newest = catalog
            .get(&name)
            .and_then(|versions| versions.keys().next_back())
            .is_none_or(|highest| version > *highest);
        {
            let mut flags = self
                .flags
                .entry(name.clone())
                .or_insert_with(|| ToolFlags::from_descriptor(&descriptor));
            // A newest version that declares itself deprecated deprecates the name.
            if is_newest && descriptor.deprecated && !flags.deprecated {
                flags.deprecated = true;
                flags.deprecation_message = descriptor.deprecation_message.clone();
            }
        }
        self.stats.entry(name.clone()).or_default();
        catalog.entry(name.clone()).or_default().insert(
            version.clone(),
            Arc::new(RegisteredTool {
                descriptor,
                version: version.clone(),
                handler: BoxToolHandler::new(handler),
            }),
        );

        tracing::info!(
            tool = name.as_str(),
            version = %version,
            warnings = warnings.len(),
            "registered tool"
        );

        Ok(RegistrationReport {
            accepted: true,
            errors: Vec::new(),
            warnings,
        })
    }

    /// Remove one version, or every version when `version` is `None`.
    ///
    /// Refused while another tool requires this one and no version would remain.
    pub async fn unregister(&self, name: &str, version: Option<&str>) -> Result<(), ToolError> {
        let mut catalog = self.catalog.write().await;
        let versions = catalog
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let target = match version {
            Some(v) => {
                let v = parse_version(v).map_err(|e| ToolError::InvalidDescriptor(e.to_string()))?;
                if !versions.contains_key(&v) {
                    return Err(ToolError::NotFound(format!("{name}@{v}")));
                }
                Some(v)
            }
            None => None,
        };

        let removes_all = target.is_none() || versions.len() == 1;
        if removes_all {
            let required_by = required_by(&catalog, name);
            if !required_by.is_empty() {
                return Err(ToolError::Dependency(format!(
                    "cannot unregister '{name}': required by {}",
                    required_by.join(", ")
                )));
            }
            catalog.remove(name);
            self.flags.remove(name);
            self.stats.remove(name);
        } else if let (Some(v), Some(versions)) = (target, catalog.get_mut(name)) {
            versions.remove(&v);
        }

        tracing::info!(tool = name, version = version.unwrap_or("*"), "unregistered tool");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Highest registered version of `name`.
    pub async fn resolve(&self, name: &str) -> Result<Arc<RegisteredTool>, ToolError> {
        let catalog = self.catalog.read().await;
        latest(&catalog, name).ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Highest registered version of `name` satisfying `range`.
    pub async fn resolve_matching(
        &self,
        name: &str,
        range: &str,
    ) -> Result<Arc<RegisteredTool>, ToolError> {
        let range = VersionRange::parse(range).map_err(|e| ToolError::Validation {
            tool: name.to_string(),
            message: e.to_string(),
        })?;
        let catalog = self.catalog.read().await;
        let versions = catalog
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        max_satisfying(versions.keys(), &range)
            .and_then(|v| versions.get(v))
            .cloned()
            .ok_or_else(|| ToolError::NotFound(format!("{name}@{range}")))
    }

    /// Check the direct dependencies of the highest version of `name`.
    pub async fn resolve_dependencies(&self, name: &str) -> Result<DependencyReport, ToolError> {
        let catalog = self.catalog.read().await;
        let tool = latest(&catalog, name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        Ok(self.dependency_report(&catalog, &tool.descriptor))
    }

    /// Disabled tools count as missing.
    pub(crate) fn dependency_report(
        &self,
        catalog: &Catalog,
        descriptor: &ToolDescriptor,
    ) -> DependencyReport {
        let mut report = DependencyReport::default();
        for dep in &descriptor.dependencies {
            if !self.dependency_available(catalog, dep) {
                let entry = format!("{}@{}", dep.name, dep.version_range);
                if dep.optional {
                    report.missing_optional.push(entry);
                } else {
                    report.missing_required.push(entry);
                }
            }
        }
        report.satisfied = report.missing_required.is_empty();
        report
    }

    fn dependency_available(&self, catalog: &Catalog, dep: &ToolDependency) -> bool {
        let enabled = self.flags.get(&dep.name).is_some_and(|f| f.enabled);
        let Some(versions) = catalog.get(&dep.name) else {
            return false;
        };
        let Ok(range) = VersionRange::parse(&dep.version_range) else {
            return false;
        };
        enabled && max_satisfying(versions.keys(), &range).is_some()
    }

    /// Names of tools that declare a dependency on `name` (any version).
    pub async fn dependents(&self, name: &str) -> Vec<String> {
        let catalog = self.catalog.read().await;
        DependencyGraph::from_catalog(&catalog).dependents_of(name)
    }

    // -----------------------------------------------------------------------
    // Flags
    // -----------------------------------------------------------------------

    pub fn flags(&self, name: &str) -> Option<ToolFlags> {
        self.flags.get(name).map(|f| f.clone())
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<(), ToolError> {
        let mut flags = self
            .flags
            .get_mut(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        flags.enabled = enabled;
        tracing::info!(tool = name, enabled, "tool enabled flag changed");
        Ok(())
    }

    pub fn set_deprecated(
        &self,
        name: &str,
        deprecated: bool,
        message: Option<String>,
    ) -> Result<(), ToolError> {
        let mut flags = self
            .flags
            .get_mut(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        flags.deprecated = deprecated;
        if message.is_some() || !deprecated {
            flags.deprecation_message = message;
        }
        tracing::info!(tool = name, deprecated, "tool deprecated flag changed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Catalog rows matching `filter`, sorted by name.
    pub async fn list_tools(&self, filter: &ToolFilter) -> Vec<ToolSummary> {
        let catalog = self.catalog.read().await;
        catalog
            .iter()
            .filter_map(|(name, versions)| {
                let latest = versions.values().next_back()?;
                let flags = self
                    .flags(name)
                    .unwrap_or_else(|| ToolFlags::from_descriptor(&latest.descriptor));
                let descriptor = &latest.descriptor;

                if filter
                    .category
                    .as_ref()
                    .is_some_and(|c| descriptor.category.as_ref() != Some(c))
                {
                    return None;
                }
                if filter.tag.as_ref().is_some_and(|t| !descriptor.tags.contains(t)) {
                    return None;
                }
                if filter.deprecated.is_some_and(|d| d != flags.deprecated) {
                    return None;
                }
                if filter.enabled.is_some_and(|e| e != flags.enabled) {
                    return None;
                }

                Some(ToolSummary {
                    name: name.clone(),
                    version: latest.version.to_string(),
                    description: descriptor.description.clone(),
                    category: descriptor.category.clone(),
                    tags: descriptor.tags.clone(),
                    enabled: flags.enabled,
                    deprecated: flags.deprecated,
                    risk_tier: descriptor.security.risk_tier,
                    versions: versions.keys().map(ToString::to_string).collect(),
                })
            })
            .collect()
    }

    pub async fn get_stats(&self) -> RegistryStats {
        let catalog = self.catalog.read().await;
        let mut stats = RegistryStats {
            total_tools: catalog.len(),
            total_versions: catalog.values().map(BTreeMap::len).sum(),
            ..RegistryStats::default()
        };
        for name in catalog.keys() {
            if let Some(flags) = self.flags.get(name) {
                stats.enabled_tools += usize::from(flags.enabled);
                stats.deprecated_tools += usize::from(flags.deprecated);
            }
            let per_tool = self.stats.get(name).map(|s| s.clone()).unwrap_or_default();
            stats.per_tool.insert(name.clone(), per_tool);
        }
        stats
    }

    pub(crate) fn record_invocation(&self, name: &str, success: bool, duration_ms: u64) {
        let mut entry = self.stats.entry(name.to_string()).or_default();
        entry.invocations += 1;
        if success {
            entry.successes += 1;
        } else {
            entry.failures += 1;
        }
        entry.total_duration_ms = entry.total_duration_ms.saturating_add(duration_ms);
        entry.last_invoked_at = Some(Utc::now());
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(Arc::new(RetryEngine::new()))
    }
}

pub(crate) fn latest(catalog: &Catalog, name: &str) -> Option<Arc<RegisteredTool>> {
    catalog
        .get(name)
        .and_then(|versions| versions.values().next_back())
        .cloned()
}

/// Other tools with a required dependency on `name`.
fn required_by(catalog: &Catalog, name: &str) -> Vec<String> {
    catalog
        .iter()
        .filter(|(other, _)| other.as_str() != name)
        .filter(|(_, versions)| {
            versions.values().any(|tool| {
                tool.descriptor
                    .dependencies
                    .iter()
                    .any(|dep| dep.name == name && !dep.optional)
            })
        })
        .map(|(other, _)| other.clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Descriptor checks
// ---------------------------------------------------------------------------

struct CheckedDescriptor {
    version: Version,
    /// Parsed ranges, index-aligned with `descriptor.dependencies`.
    ranges: Vec<VersionRange>,
}

/// Structural checks that need no catalog access.
fn check_descriptor(
    descriptor: &ToolDescriptor,
    host_version: &Version,
) -> Result<CheckedDescriptor, ToolError> {
    let invalid = |message: String| {
        ToolError::InvalidDescriptor(format!("'{}': {message}", descriptor.name))
    };

    if !is_valid_name(&descriptor.name) {
        return Err(invalid(
            "name must be lowercase letters, digits, '.', '_' or '-'".to_string(),
        ));
    }

    let version = parse_version(&descriptor.version).map_err(|e| invalid(e.to_string()))?;

    check_schema(&descriptor.input_schema).map_err(|e| invalid(format!("input schema {e}")))?;
    check_schema(&descriptor.output_schema).map_err(|e| invalid(format!("output schema {e}")))?;

    let compatible = host_compatible(
        host_version,
        descriptor.min_host_version.as_deref(),
        descriptor.max_host_version.as_deref(),
    )
    .map_err(|e| invalid(e.to_string()))?;
    if !compatible {
        return Err(invalid(format!(
            "not compatible with host version {host_version} (requires {} .. {})",
            descriptor.min_host_version.as_deref().unwrap_or("*"),
            descriptor.max_host_version.as_deref().unwrap_or("*"),
        )));
    }

    let mut ranges = Vec::with_capacity(descriptor.dependencies.len());
    for (i, dep) in descriptor.dependencies.iter().enumerate() {
        if dep.name == descriptor.name {
            return Err(invalid("a tool cannot depend on itself".to_string()));
        }
        if descriptor.dependencies[..i].iter().any(|d| d.name == dep.name) {
            return Err(invalid(format!("dependency '{}' is declared twice", dep.name)));
        }
        ranges.push(VersionRange::parse(&dep.version_range).map_err(|e| invalid(e.to_string()))?);
    }

    Ok(CheckedDescriptor { version, ranges })
}

/// Slug: `[a-z0-9._-]+`, starting and ending with a letter or digit.
fn is_valid_name(name: &str) -> bool {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    !name.is_empty()
        && name.chars().all(|c| alnum(c) || matches!(c, '.' | '_' | '-'))
        && name.starts_with(alnum)
        && name.ends_with(alnum)
}
