//! Plan generation module.
//!
//! Turns identified records into an ordered list of filesystem operations:
//! 1. Render the naming template for the record
//! 2. Reuse an existing season folder that numbers the same season
//! 3. Resolve collisions against the filesystem and the rest of the batch
//! 4. Pick the operation kind
//!
//! Planning only reads the filesystem: existence checks, directory listings
//! of season parents and content hashes of colliding files.

use crate::events::{Event, EventBus};
use crate::generators::template::Template;
use crate::models::config::NamingConfig;
use crate::models::media::MediaRecord;
use crate::models::plan::{OperationKind, OrganizationPlan, PlannedOperation};
use crate::utils::fs::{same_file, season_number};
use crate::utils::hash::same_content;
use crate::{Error, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One file to plan in a batch.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub record: MediaRecord,
    pub source: PathBuf,
}

/// Organization planner.
#[derive(Debug, Clone)]
pub struct Planner {
    naming: NamingConfig,
    events: EventBus,
}

impl Planner {
    pub fn new(naming: NamingConfig, events: EventBus) -> Self {
        Self { naming, events }
    }

    pub fn naming(&self) -> &NamingConfig {
        &self.naming
    }

    /// Configured template for a record.
    pub fn template_for(&self, record: &MediaRecord) -> Result<Template> {
        let source = self.naming.template_for(record).ok_or_else(|| Error::PlanInvalid {
            template: String::new(),
            reason: format!("no template configured for {}", record.content_type),
        })?;
        Template::parse(source)
    }

    /// Plan one file with an explicit template.
    pub fn plan(
        &self,
        record: &MediaRecord,
        source: &Path,
        library_root: &Path,
        template: &str,
    ) -> Result<OrganizationPlan> {
        let template = Template::parse(template)?;
        let mut claimed = HashSet::new();
        let operation = self.plan_one(record, source, library_root, &template, &mut claimed)?;
        Ok(new_plan(library_root, operation.into_iter().collect()))
    }

    /// Plan one file with the configured template for its record.
    pub fn plan_default(&self, record: &MediaRecord, source: &Path, library_root: &Path) -> Result<OrganizationPlan> {
        let template = self.template_for(record)?;
        self.plan(record, source, library_root, template.as_str())
    }

    /// Plan several files together.
    ///
    /// Destinations already claimed by earlier files in the batch count as
    /// collisions. Every template is validated before anything is planned.
    pub fn plan_batch(&self, requests: &[PlanRequest], library_root: &Path) -> Result<OrganizationPlan> {
        let templates = requests
            .iter()
            .map(|request| self.template_for(&request.record))
            .collect::<Result<Vec<_>>>()?;

        let mut claimed = HashSet::new();
        let mut operations = Vec::new();
        for (request, template) in requests.iter().zip(&templates) {
            if let Some(op) = self.plan_one(
                &request.record,
                &request.source,
                library_root,
                template,
                &mut claimed,
            )? {
                operations.push(op);
            }
        }

        tracing::info!(
            "Planned {} operations for {} files under {:?}",
            operations.len(),
            requests.len(),
            library_root
        );
        Ok(new_plan(library_root, operations))
    }

    fn plan_one(
        &self,
        record: &MediaRecord,
        source: &Path,
        library_root: &Path,
        template: &Template,
        claimed: &mut HashSet<PathBuf>,
    ) -> Result<Option<PlannedOperation>> {
        let extension = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        let relative = template.render(record, &extension, &self.naming.safe_replacement)?;
        let wanted = reuse_season_folders(library_root, &relative);

        let mut chosen = wanted.clone();
        let mut counter = 1;
        loop {
            if same_file(source, &chosen) {
                tracing::debug!("Already in place: {:?}", source);
                return Ok(None);
            }
            if chosen.is_file() && identical(source, &chosen) {
                tracing::warn!("{:?} duplicates {:?}, skipping", source, chosen);
                self.events.emit(Event::DuplicateSkipped {
                    source: source.to_path_buf(),
                    existing: chosen,
                });
                return Ok(None);
            }
            if !chosen.exists() && !claimed.contains(&chosen) {
                break;
            }
            chosen = with_suffix(&wanted, counter);
            counter += 1;
        }

        if chosen != wanted {
            tracing::warn!("Destination {:?} is taken, using {:?}", wanted, chosen);
            self.events.emit(Event::DestinationConflict {
                wanted: wanted.clone(),
                chosen: chosen.clone(),
            });
        }

        claimed.insert(chosen.clone());
        let kind = operation_kind(source, &chosen);
        tracing::debug!("Plan {}: {:?} -> {:?}", kind, source, chosen);

        Ok(Some(PlannedOperation {
            source: source.to_path_buf(),
            destination: chosen,
            kind,
        }))
    }
}

/// Join `relative` under `library_root`, swapping each season folder that
/// does not exist yet for an existing sibling naming the same season
/// (`Season 1`, `Saison 01`, `S01`).
fn reuse_season_folders(library_root: &Path, relative: &Path) -> PathBuf {
    let mut path = library_root.to_path_buf();
    let mut components = relative.components().peekable();

    while let Some(component) = components.next() {
        let name = component.as_os_str();
        let is_dir = components.peek().is_some();
        let candidate = path.join(name);

        let existing = match (is_dir, season_number(&name.to_string_lossy())) {
            (true, Some(season)) if !candidate.exists() => existing_season_folder(&path, season),
            _ => None,
        };
        match existing {
            Some(folder) => {
                tracing::debug!("Reusing season folder {:?}", folder);
                path = folder;
            }
            None => path = candidate,
        }
    }

    path
}

fn existing_season_folder(parent: &Path, season: u32) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = fs::read_dir(parent)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter(|entry| season_number(&entry.file_name().to_string_lossy()) == Some(season))
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches.into_iter().next()
}

fn identical(source: &Path, existing: &Path) -> bool {
    same_content(source, existing).unwrap_or_else(|e| {
        tracing::debug!("Content comparison failed: {}", e);
        false
    })
}

fn new_plan(library_root: &Path, operations: Vec<PlannedOperation>) -> OrganizationPlan {
    OrganizationPlan {
        id: Uuid::new_v4().to_string(),
        created_at: Utc::now().to_rfc3339(),
        library_root: library_root.to_path_buf(),
        operations,
    }
}

/// `Name.ext` -> `Name (n).ext`
fn with_suffix(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{} ({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{} ({})", stem, n),
    };
    path.with_file_name(name)
}

/// Decide how a file moves from `source` to `destination`.
pub fn operation_kind(source: &Path, destination: &Path) -> OperationKind {
    if source.parent() == destination.parent() {
        OperationKind::Rename
    } else if source.file_name() == destination.file_name() {
        OperationKind::Move
    } else {
        OperationKind::MoveAndRename
    }
}

/// Save a plan to a JSON file.
pub fn save_plan(plan: &OrganizationPlan, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(plan)?;

    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::File::create(path)?;
    file.write_all(json.as_bytes())?;

    tracing::info!("Plan saved to {:?}", path);
    Ok(())
}

/// Load a plan from a JSON file.
pub fn load_plan(path: &Path) -> Result<OrganizationPlan> {
    let content = fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
    let plan: OrganizationPlan = serde_json::from_str(&content)
        .map_err(|e| Error::InvalidPlanFile(format!("{}: {}", path.display(), e)))?;
    Ok(plan)
}

/// Get the default plan output path inside the library root.
pub fn default_plan_path(library_root: &Path) -> PathBuf {
    let filename = format!("plan_{}.json", Utc::now().format("%Y%m%d_%H%M%S"));
    library_root.join(filename)
}
