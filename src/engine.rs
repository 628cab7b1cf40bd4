//! Library façade.
//!
//! [`Engine`] owns the orchestrator, planner, executor and event bus built
//! from one [`Config`] and exposes the operations callers need.

use crate::core::executor::Executor;
use crate::core::orchestrator::{Orchestrator, Resolution};
use crate::core::parser::{self, ParseResult};
use crate::core::planner::{PlanRequest, Planner};
use crate::events::{Event, EventBus};
use crate::models::config::Config;
use crate::models::media::{CandidateId, ContentType, EpisodeRange, MediaRecord, MediaType, Position, Query};
use crate::models::plan::{ExecutionReport, OrganizationPlan};
use crate::services::ProviderRegistry;
use crate::{Error, Result};
use std::path::Path;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// What identifying one file produced.
#[derive(Debug, Clone, PartialEq)]
pub struct FileIdentification {
    pub parsed: ParseResult,
    pub query: Query,
    /// Resolved records are already positioned (episode, track).
    pub resolution: Resolution,
}

/// Media identification and organization engine.
pub struct Engine {
    config: Config,
    orchestrator: Orchestrator,
    planner: Planner,
    executor: Executor,
    events: EventBus,
}

impl Engine {
    /// Build an engine with the shipped provider clients.
    pub fn new(config: Config) -> Self {
        let registry = ProviderRegistry::from_config(&config);
        Self::with_registry(config, registry)
    }

    /// Build an engine around an explicit provider registry.
    pub fn with_registry(config: Config, registry: ProviderRegistry) -> Self {
        let events = EventBus::default();
        Self {
            orchestrator: Orchestrator::new(registry, &config, events.clone()),
            planner: Planner::new(config.naming.clone(), events.clone()),
            executor: Executor::new(config.executor.clone(), events.clone()),
            events,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Receive engine events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Parse a file name.
    pub fn parse(&self, name: &str, media_type: MediaType) -> ParseResult {
        parser::parse(name, media_type)
    }

    pub async fn identify(&self, query: &Query) -> Result<Resolution> {
        self.orchestrator.identify(query).await
    }

    pub async fn identify_with_cancel(&self, query: &Query, cancel: &CancellationToken) -> Result<Resolution> {
        self.orchestrator.identify_with_cancel(query, cancel).await
    }

    pub async fn disambiguate(&self, id: &CandidateId) -> Result<MediaRecord> {
        self.orchestrator.disambiguate(id).await
    }

    pub async fn locate_episode(
        &self,
        record: &MediaRecord,
        season: Option<u32>,
        episodes: EpisodeRange,
    ) -> Result<MediaRecord> {
        self.orchestrator.locate_episode(record, season, episodes).await
    }

    /// Parse a file's name, identify it, and position a resolved record at
    /// the episode or track the name points to.
    pub async fn identify_file(
        &self,
        path: &Path,
        media_type: MediaType,
        cancel: &CancellationToken,
    ) -> Result<FileIdentification> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::PathNotFound(path.display().to_string()))?;
        let parsed = self.parse(&name, media_type);
        let query = parsed.to_query(media_type);
        tracing::debug!("Parsed {:?} as {:?}", name, parsed);

        let resolution = match self.identify_with_cancel(&query, cancel).await? {
            Resolution::Resolved(record) => Resolution::Resolved(self.position(record, &parsed).await?),
            other => other,
        };

        Ok(FileIdentification {
            parsed,
            query,
            resolution,
        })
    }

    /// Position a record using what the file name says.
    pub async fn position(&self, record: MediaRecord, parsed: &ParseResult) -> Result<MediaRecord> {
        match record.content_type {
            ContentType::Series | ContentType::Episode => match parsed.episodes {
                Some(episodes) => self.locate_episode(&record, parsed.season, episodes).await,
                None => Ok(record),
            },
            ContentType::Track => {
                let mut record = self.with_track_details(record).await;
                if let Position::Track { disc, track, .. } = &mut record.position {
                    *disc = disc.or(parsed.disc);
                    *track = track.or(parsed.track);
                }
                Ok(record)
            }
            ContentType::Album => Ok(record.at_track(parsed.disc, parsed.track, parsed.title.clone())),
            _ => Ok(record),
        }
    }

    /// Fetch track details when the search result did not say which album
    /// the track is on. Failures keep the record as it is.
    async fn with_track_details(&self, record: MediaRecord) -> MediaRecord {
        let has_album = matches!(&record.position, Position::Track { album: Some(_), .. });
        if has_album {
            return record;
        }

        for (provider, id) in &record.provider_ids {
            let candidate = CandidateId {
                provider: provider.clone(),
                id: id.clone(),
                content_type: ContentType::Track,
            };
            match self.disambiguate(&candidate).await {
                Ok(details) => return details,
                Err(e) => tracing::warn!("Track details from {} failed: {}", provider, e),
            }
        }
        record
    }

    /// Plan one file with the configured template.
    pub fn plan(&self, record: &MediaRecord, source: &Path, library_root: &Path) -> Result<OrganizationPlan> {
        self.planner.plan_default(record, source, library_root)
    }

    /// Plan one file with an explicit template.
    pub fn plan_with_template(
        &self,
        record: &MediaRecord,
        source: &Path,
        library_root: &Path,
        template: &str,
    ) -> Result<OrganizationPlan> {
        self.planner.plan(record, source, library_root, template)
    }

    pub fn plan_batch(&self, requests: &[PlanRequest], library_root: &Path) -> Result<OrganizationPlan> {
        self.planner.plan_batch(requests, library_root)
    }

    pub fn validate(&self, plan: &OrganizationPlan) -> Result<()> {
        self.executor.validate(plan)
    }

    pub async fn execute(&self, plan: &OrganizationPlan, cancel: &CancellationToken) -> ExecutionReport {
        self.executor.execute(plan, cancel).await
    }

    pub async fn execute_all(&self, plans: &[OrganizationPlan], cancel: &CancellationToken) -> Vec<ExecutionReport> {
        self.executor.execute_all(plans, cancel).await
    }
}
