//! Shared helper functions for CLI commands

use std::fs;
use std::io::{self, IsTerminal};

use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};
use tracing::debug;

use crate::core::identity::EntityId;
use crate::core::{
    BomEngine, CategoryRules, CompletionReconciler, Config, LogNotifier, NetworkAllocator,
    NoopNotifier, Notifier, PrefabConfigurator, Project, Registry, Store,
};

/// Everything a command needs: the discovered project, its config and database
pub struct Session {
    pub project: Project,
    pub config: Config,
    pub store: Store,
    rules: CategoryRules,
    notifier: Box<dyn Notifier>,
    author: String,
    label_template: Option<String>,
}

impl Session {
    /// Discover the project from the current directory and open its database
    pub fn open() -> Result<Self> {
        let project = Project::discover().map_err(|e| miette::miette!("{}", e))?;
        Self::for_project(project)
    }

    pub fn for_project(project: Project) -> Result<Self> {
        let config = Config::load(Some(&project))?;
        let db_path = config.database_path(&project);
        debug!(path = %db_path.display(), "opening provisioning database");
        let store = Store::open(&db_path)?;
        let rules = config.category_rules()?;

        let notifier: Box<dyn Notifier> = if config.notifications.enabled {
            Box::new(LogNotifier)
        } else {
            Box::new(NoopNotifier)
        };

        let label_template = match &config.label.template {
            Some(path) => {
                let path = project.root().join(path);
                let source = fs::read_to_string(&path)
                    .map_err(|e| miette::miette!("label template {}: {}", path.display(), e))?;
                Some(source)
            }
            None => None,
        };

        Ok(Self {
            author: config.author(),
            project,
            config,
            store,
            rules,
            notifier,
            label_template,
        })
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn registry(&self) -> Registry<'_> {
        Registry::new(&self.store)
    }

    pub fn bom(&self) -> BomEngine<'_> {
        BomEngine::new(&self.store, &self.rules)
    }

    pub fn net(&self) -> NetworkAllocator<'_> {
        NetworkAllocator::new(&self.store)
    }

    pub fn pick(&self) -> CompletionReconciler<'_> {
        CompletionReconciler::new(&self.store, self.notifier.as_ref()).with_operator(&self.author)
    }

    pub fn prefab(&self) -> PrefabConfigurator<'_> {
        let configurator = PrefabConfigurator::new(&self.store, self.notifier.as_ref())
            .with_operator(&self.author);
        match &self.label_template {
            Some(source) => configurator.with_label_template(source),
            None => configurator,
        }
    }

    /// Resolve a device given as assignment ID or hostname within a subsystem
    pub fn resolve_device(&self, subsystem: &str, device: &str) -> Result<EntityId> {
        let id = device.parse::<EntityId>().ok();
        self.net()
            .ip_matrix(subsystem)?
            .into_iter()
            .find(|row| Some(row.assignment_id) == id || row.hostname.eq_ignore_ascii_case(device))
            .map(|row| row.assignment_id)
            .ok_or_else(|| miette::miette!("No device '{}' in subsystem {}", device, subsystem))
    }

    /// Resolve a device of a prefabrication task by assignment ID or hostname
    pub fn resolve_task_device(&self, task: &str, device: &str) -> Result<EntityId> {
        let id = device.parse::<EntityId>().ok();
        self.prefab()
            .device_table(task)?
            .into_iter()
            .find(|row| Some(row.assignment_id) == id || row.hostname.eq_ignore_ascii_case(device))
            .map(|row| row.assignment_id)
            .ok_or_else(|| miette::miette!("No device '{}' in task {}", device, task))
    }
}

/// Ask before a destructive action; `--yes` or a non-interactive stdin skips the prompt
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        return Err(miette::miette!(
            "{} (refusing without a terminal; pass --yes)",
            prompt
        ));
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .into_diagnostic()
}

/// Format an EntityId for display, truncating if too long
pub fn format_short_id(id: &EntityId) -> String {
    let s = id.to_string();
    if s.len() > 16 {
        format!("{}...", &s[..13])
    } else {
        s
    }
}

/// Truncate a string to max_len, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// `-` for absent values in tables
pub fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityPrefix;

    #[test]
    fn test_format_short_id() {
        let id = EntityId::new(EntityPrefix::Sub);
        let formatted = format_short_id(&id);
        assert!(formatted.len() <= 16);
        assert!(formatted.ends_with("..."));
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("Kamera Außen", 9), "Kamera...");
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(None), "-");
        assert_eq!(or_dash(Some("x")), "x");
    }

    #[test]
    fn test_session_opens_initialized_project() {
        let tmp = tempfile::tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        let session = Session::for_project(project).unwrap();
        assert!(session.registry().list_contracts().unwrap().is_empty());
        assert!(tmp.path().join(".sysprov/provisioning.db").exists());
    }
}
