//! Command reports and their rendering
//!
//! Every package command produces a [`Report`]. Reports render either as
//! the line-oriented text operators read, or as JSON for scripts.

use package_registry::{CatalogWarning, RegistryChange, UpdateCatalog, UpdateOutcome};
use sdk::errors::{PackageError, Result};
use sdk::manifest::{InstalledPlugin, PackageDescriptor, Repository, StatusReport};
use serde::Serialize;
use std::fmt::Write as _;

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Result of a successfully executed package command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "report", rename_all = "snake_case")]
pub enum Report {
    RepositoryAdded {
        name: String,
        change: RegistryChange,
    },
    Installed {
        plugins: Vec<InstalledPlugin>,
    },
    Available {
        catalog: UpdateCatalog,
    },
    PackageInstalled {
        plugin: InstalledPlugin,
        warnings: Vec<CatalogWarning>,
    },
    Deployment {
        status: StatusReport,
    },
    Updates {
        updates: Vec<PackageDescriptor>,
        warnings: Vec<CatalogWarning>,
    },
    PackageUpdate {
        outcome: UpdateOutcome,
        warnings: Vec<CatalogWarning>,
    },
}

impl Report {
    /// Repositories that were skipped while building the catalog
    pub fn warnings(&self) -> &[CatalogWarning] {
        match self {
            Report::Available { catalog } => catalog.warnings(),
            Report::PackageInstalled { warnings, .. }
            | Report::Updates { warnings, .. }
            | Report::PackageUpdate { warnings, .. } => warnings.as_slice(),
            Report::RepositoryAdded { .. }
            | Report::Installed { .. }
            | Report::Deployment { .. } => &[],
        }
    }

    /// Render for stdout. Text output ends with a newline unless empty.
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => self.render_text(),
            OutputFormat::Json => {
                let mut out = serde_json::to_string_pretty(self)
                    .map_err(|e| PackageError::Serialization(format!("report: {}", e)))?;
                out.push('\n');
                Ok(out)
            }
        }
    }

    fn render_text(&self) -> Result<String> {
        let mut out = String::new();
        match self {
            Report::RepositoryAdded { name, change } => {
                let before = encode_registry(&change.before)?;
                let after = encode_registry(&change.after)?;
                line(&mut out, before);
                line(&mut out, format!("Added repository: {}", name));
                line(&mut out, after);
                line(
                    &mut out,
                    format!("Trust key fingerprint: {}", change.key_fingerprint),
                );
            }
            Report::Installed { plugins } => {
                for plugin in plugins {
                    line(&mut out, plugin);
                }
            }
            Report::Available { catalog } => {
                line(&mut out, "Available packages:\n-----");
                packages(&mut out, catalog.packages());
            }
            Report::PackageInstalled { plugin, .. } => {
                line(&mut out, format!("{} installed.", plugin.id));
            }
            Report::Deployment { status } => {
                line(&mut out, status);
            }
            Report::Updates { updates, .. } => {
                if updates.is_empty() {
                    line(&mut out, "No updates found. System is up to date.");
                } else {
                    line(&mut out, "Available updates:\n-----");
                    packages(&mut out, updates.iter());
                }
            }
            Report::PackageUpdate { outcome, .. } => match outcome {
                UpdateOutcome::Updated { id, to, .. } => {
                    line(&mut out, format!("Updating [{}] to version: {}", id, to));
                }
                UpdateOutcome::AlreadyUpToDate { id, .. } => {
                    line(&mut out, format!("Package {} is already up to date.", id));
                }
            },
        }
        Ok(out)
    }
}

fn encode_registry(repositories: &[Repository]) -> Result<String> {
    serde_json::to_string(repositories)
        .map_err(|e| PackageError::Serialization(format!("registry document: {}", e)))
}

fn line(out: &mut String, text: impl std::fmt::Display) {
    let _ = writeln!(out, "{}", text);
}

fn packages<'a>(out: &mut String, packages: impl Iterator<Item = &'a PackageDescriptor>) {
    for package in packages {
        line(out, format!("{} \t\t{}", package.id, package.description));
        for release in &package.versions {
            line(out, format!("\tVersion: {}", release.version));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::manifest::{DeployAction, PackageVersion};

    fn descriptor(id: &str, versions: &[&str]) -> PackageDescriptor {
        PackageDescriptor {
            id: id.to_string(),
            description: format!("{} plugin", id),
            versions: versions
                .iter()
                .map(|v| PackageVersion::new(*v, format!("http://repo.test/{}-{}.jar", id, v)))
                .collect(),
        }
    }

    fn text(report: &Report) -> String {
        report.render(OutputFormat::Text).unwrap()
    }

    #[test]
    fn test_installed_listing() {
        let report = Report::Installed {
            plugins: vec![
                InstalledPlugin::new("dih", "1.0"),
                InstalledPlugin::new("ltr", "2.1"),
            ],
        };
        assert_eq!(text(&report), "dih (1.0)\nltr (2.1)\n");

        let empty = Report::Installed { plugins: vec![] };
        assert_eq!(text(&empty), "");
    }

    #[test]
    fn test_available_listing() {
        let mut catalog = UpdateCatalog::new();
        catalog.merge("r1", vec![descriptor("ltr", &["1.0", "1.1"])]);

        assert_eq!(
            text(&Report::Available { catalog }),
            "Available packages:\n-----\nltr \t\tltr plugin\n\tVersion: 1.0\n\tVersion: 1.1\n"
        );
    }

    #[test]
    fn test_update_listing() {
        let none = Report::Updates {
            updates: vec![],
            warnings: vec![],
        };
        assert_eq!(text(&none), "No updates found. System is up to date.\n");

        let some = Report::Updates {
            updates: vec![descriptor("ltr", &["2.0"])],
            warnings: vec![],
        };
        assert_eq!(
            text(&some),
            "Available updates:\n-----\nltr \t\tltr plugin\n\tVersion: 2.0\n"
        );
    }

    #[test]
    fn test_single_package_update() {
        let updated = Report::PackageUpdate {
            outcome: UpdateOutcome::Updated {
                id: "ltr".into(),
                from: "1.0".into(),
                to: "2.0".into(),
            },
            warnings: vec![],
        };
        assert_eq!(text(&updated), "Updating [ltr] to version: 2.0\n");

        let current = Report::PackageUpdate {
            outcome: UpdateOutcome::AlreadyUpToDate {
                id: "ltr".into(),
                version: "2.0".into(),
            },
            warnings: vec![],
        };
        assert_eq!(text(&current), "Package ltr is already up to date.\n");
    }

    #[test]
    fn test_repository_added() {
        let repo = Repository::new("community", "http://repo.test");
        let report = Report::RepositoryAdded {
            name: "community".into(),
            change: RegistryChange {
                before: vec![],
                after: vec![repo],
                key_fingerprint: "abcd:ef01:2345:6789".into(),
            },
        };

        let lines: Vec<String> = text(&report).lines().map(String::from).collect();
        assert_eq!(lines[0], "[]");
        assert_eq!(lines[1], "Added repository: community");
        assert!(lines[2].contains("\"id\":\"community\""));
        assert_eq!(lines[3], "Trust key fingerprint: abcd:ef01:2345:6789");
    }

    #[test]
    fn test_deployment_and_install() {
        let report = Report::Deployment {
            status: StatusReport {
                id: "ltr".into(),
                version: "1.0".into(),
                action: DeployAction::Deployed,
                args: vec!["collection=techproducts".into()],
            },
        };
        assert_eq!(
            text(&report),
            "ltr (1.0) deployed with args: collection=techproducts\n"
        );

        let report = Report::PackageInstalled {
            plugin: InstalledPlugin::new("ltr", "1.0"),
            warnings: vec![],
        };
        assert_eq!(text(&report), "ltr installed.\n");
    }

    #[test]
    fn test_json_rendering() {
        let report = Report::PackageUpdate {
            outcome: UpdateOutcome::AlreadyUpToDate {
                id: "ltr".into(),
                version: "2.0".into(),
            },
            warnings: vec![CatalogWarning {
                repository: "down".into(),
                error: "HTTP status 500".into(),
            }],
        };

        let json: serde_json::Value =
            serde_json::from_str(&report.render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["report"], "package_update");
        assert_eq!(json["outcome"]["status"], "already_up_to_date");
        assert_eq!(json["warnings"][0]["repository"], "down");
        assert_eq!(report.warnings().len(), 1);
    }
}
