//! # Fetch Orchestrator
//!
//! Runs one primary adapter lookup, derives follow-up identifiers from the
//! result, fans the follow-up lookups out concurrently and folds whatever
//! comes back into the primary record in a fixed order.
//!
//! Only a failing primary lookup fails the call. Supplementary failures,
//! empty supplementary results and lookups cut off by the deadline become
//! [`FetchWarning`]s next to the record.

use crate::client::deriver::{AutomaticDoiDeriver, FieldDeriver, IdentifierDeriver, ManualDoiDeriver};
use crate::client::merge::{merge, FieldPrioritySet};
use crate::client::normalize::KeywordNormalizer;
use crate::client::providers::{AdapterRegistry, FetchError, SearchQuery, SourceAdapter};
use crate::config::OrchestratorSettings;
use crate::record::{Field, Record};
use crate::resilience::timeout::{Deadline, TimeoutExt};
use crate::{Config, Result};
use futures::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Lifecycle of one orchestrated call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationState {
    Idle,
    PrimaryInFlight,
    PrimaryFailed,
    PrimaryEmpty,
    PrimarySucceeded,
    IdentifiersDerived(usize),
    SupplementaryInFlight(usize),
    Merging,
    Done,
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::PrimaryInFlight => f.write_str("primary in flight"),
            Self::PrimaryFailed => f.write_str("primary failed"),
            Self::PrimaryEmpty => f.write_str("primary empty"),
            Self::PrimarySucceeded => f.write_str("primary succeeded"),
            Self::IdentifiersDerived(n) => write!(f, "{n} identifiers derived"),
            Self::SupplementaryInFlight(n) => write!(f, "{n} supplementary lookups in flight"),
            Self::Merging => f.write_str("merging"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// One configured follow-up: where the identifier comes from, which adapter
/// resolves it and which fields its result may overwrite.
#[derive(Clone)]
pub struct EnrichmentStep {
    name: String,
    deriver: Arc<dyn IdentifierDeriver>,
    adapter: Arc<dyn SourceAdapter>,
    priority: FieldPrioritySet,
}

impl EnrichmentStep {
    pub fn new(
        deriver: impl IdentifierDeriver + 'static,
        adapter: Arc<dyn SourceAdapter>,
        priority: FieldPrioritySet,
    ) -> Self {
        Self {
            name: deriver.name().to_string(),
            deriver: Arc::new(deriver),
            adapter,
            priority,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn priority(&self) -> &FieldPrioritySet {
        &self.priority
    }
}

impl fmt::Debug for EnrichmentStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnrichmentStep")
            .field("name", &self.name)
            .field("deriver", &self.deriver)
            .field("adapter", &self.adapter.name())
            .field("priority", &self.priority.name())
            .finish()
    }
}

/// A pending supplementary lookup
#[derive(Clone)]
pub struct FetchTask {
    pub step: String,
    pub identifier: String,
    pub adapter: Arc<dyn SourceAdapter>,
    pub priority: FieldPrioritySet,
}

impl FetchTask {
    fn warning(&self, error: FetchError) -> FetchWarning {
        FetchWarning {
            source: self.adapter.name().to_string(),
            step: self.step.clone(),
            identifier: self.identifier.clone(),
            error,
        }
    }
}

impl fmt::Debug for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchTask")
            .field("step", &self.step)
            .field("identifier", &self.identifier)
            .field("adapter", &self.adapter.name())
            .finish_non_exhaustive()
    }
}

/// A supplementary lookup that contributed nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchWarning {
    /// Adapter name
    pub source: String,
    /// Enrichment step that created the lookup
    pub step: String,
    pub identifier: String,
    pub error: FetchError,
}

impl fmt::Display for FetchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) for '{}': {}",
            self.source, self.step, self.identifier, self.error
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestrationResult {
    /// `None` only when the primary lookup found nothing
    pub record: Option<Record>,
    pub warnings: Vec<FetchWarning>,
}

impl OrchestrationResult {
    #[must_use]
    pub const fn is_found(&self) -> bool {
        self.record.is_some()
    }
}

type Outcome = std::result::Result<Option<Record>, FetchError>;

/// Primary lookup plus concurrent, deterministically merged enrichment
#[derive(Clone)]
pub struct FetchOrchestrator {
    primary: Arc<dyn SourceAdapter>,
    steps: Vec<EnrichmentStep>,
    normalizer: KeywordNormalizer,
    deadline: Duration,
    supplementary_timeout: Duration,
}

impl fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("primary", &self.primary.name())
            .field("steps", &self.steps)
            .field("normalizer", &self.normalizer)
            .field("deadline", &self.deadline)
            .field("supplementary_timeout", &self.supplementary_timeout)
            .finish()
    }
}

impl FetchOrchestrator {
    pub fn new(primary: Arc<dyn SourceAdapter>) -> Self {
        let settings = OrchestratorSettings::default();
        Self {
            primary,
            steps: Vec::new(),
            normalizer: KeywordNormalizer::default(),
            deadline: settings.deadline(),
            supplementary_timeout: settings.supplementary_timeout(),
        }
    }

    /// Append a step; steps are merged in the order they were added
    #[must_use]
    pub fn with_step(mut self, step: EnrichmentStep) -> Self {
        self.steps.push(step);
        self
    }

    #[must_use]
    pub fn with_normalizer(mut self, normalizer: KeywordNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[must_use]
    pub fn with_supplementary_timeout(mut self, timeout: Duration) -> Self {
        self.supplementary_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_settings(self, settings: &OrchestratorSettings) -> Self {
        self.with_deadline(settings.deadline())
            .with_supplementary_timeout(settings.supplementary_timeout())
    }

    /// arXiv lookups enriched from the arXiv-issued DOI and then from the
    /// publisher DOI the authors attached.
    pub fn arxiv(registry: &AdapterRegistry, config: &Config) -> Result<Self> {
        let mut orchestrator = Self::new(registry.get("arxiv")?)
            .with_settings(&config.orchestrator)
            .with_normalizer(KeywordNormalizer::new(config.keywords.separator_char()));

        if config.orchestrator.use_arxiv_doi_for_more_info {
            let doi = registry.get("doi")?;
            orchestrator = orchestrator
                .with_step(EnrichmentStep::new(
                    AutomaticDoiDeriver,
                    doi.clone(),
                    FieldPrioritySet::automatic_doi(),
                ))
                .with_step(EnrichmentStep::new(
                    ManualDoiDeriver,
                    doi,
                    FieldPrioritySet::manual_doi(),
                ));
        }

        Ok(orchestrator)
    }

    /// Fills a record from every identifier it already carries.
    ///
    /// Meant for [`Self::enrich`]: the record is already in hand, so no
    /// primary lookup runs. The DOI adapter stands in as primary only so
    /// that `fetch_by_id` still accepts a DOI.
    pub fn identifier_merging(registry: &AdapterRegistry, config: &Config) -> Result<Self> {
        let orchestrator = Self::new(registry.get("doi")?)
            .with_settings(&config.orchestrator)
            .with_normalizer(KeywordNormalizer::new(config.keywords.separator_char()))
            .with_step(EnrichmentStep::new(
                FieldDeriver::new(Field::Doi),
                registry.get("doi")?,
                FieldPrioritySet::fill_only(),
            ))
            .with_step(EnrichmentStep::new(
                FieldDeriver::new(Field::Isbn),
                registry.get("isbn")?,
                FieldPrioritySet::fill_only(),
            ))
            .with_step(EnrichmentStep::new(
                FieldDeriver::new(Field::Eprint),
                registry.get("arxiv")?,
                FieldPrioritySet::fill_only(),
            ));
        Ok(orchestrator)
    }

    #[must_use]
    pub fn primary(&self) -> &dyn SourceAdapter {
        self.primary.as_ref()
    }

    #[must_use]
    pub fn steps(&self) -> &[EnrichmentStep] {
        &self.steps
    }

    /// Look up `identifier` with the primary adapter and enrich the result
    #[instrument(skip(self), fields(primary = %self.primary.name()))]
    pub async fn fetch_by_id(&self, identifier: &str) -> std::result::Result<OrchestrationResult, FetchError> {
        let deadline = Deadline::after(self.deadline);
        log_state(OrchestrationState::Idle);

        log_state(OrchestrationState::PrimaryInFlight);
        let found = self
            .primary
            .fetch_by_id(identifier)
            .with_deadline(deadline.remaining())
            .await
            .and_then(|outcome| outcome);

        self.after_primary(found, deadline).await
    }

    /// Find the primary adapter's record for a partial entry; the found
    /// record wins, the entry fills its gaps and keeps its citation key.
    #[instrument(skip(self, entry), fields(primary = %self.primary.name()))]
    pub async fn fetch_by_entry(&self, entry: &Record) -> std::result::Result<OrchestrationResult, FetchError> {
        let deadline = Deadline::after(self.deadline);
        log_state(OrchestrationState::PrimaryInFlight);

        let found = self
            .primary
            .fetch_by_entry(entry)
            .with_deadline(deadline.remaining())
            .await
            .and_then(|outcome| outcome)
            .map(|found| found.map(|record| merge(&record, entry, &FieldPrioritySet::entry_preserving())));

        self.after_primary(found, deadline).await
    }

    /// Search with the primary adapter and enrich every hit concurrently
    #[instrument(skip(self, query), fields(primary = %self.primary.name(), query = %query.query))]
    pub async fn fetch_by_query(
        &self,
        query: &SearchQuery,
        page: u32,
    ) -> std::result::Result<Vec<OrchestrationResult>, FetchError> {
        let deadline = Deadline::after(self.deadline);
        log_state(OrchestrationState::PrimaryInFlight);

        let hits = match self
            .primary
            .fetch_by_query(query, page)
            .with_deadline(deadline.remaining())
            .await
            .and_then(|outcome| outcome)
        {
            Ok(hits) => hits,
            Err(error) => {
                log_state(OrchestrationState::PrimaryFailed);
                return Err(error);
            }
        };

        info!("{} returned {} hits", self.primary.name(), hits.len());
        Ok(join_all(hits.into_iter().map(|hit| self.enrich_within(hit, deadline))).await)
    }

    /// Enrich an already resolved record
    pub async fn enrich(&self, record: Record) -> OrchestrationResult {
        self.enrich_within(record, Deadline::after(self.deadline)).await
    }

    async fn after_primary(
        &self,
        found: Outcome,
        deadline: Deadline,
    ) -> std::result::Result<OrchestrationResult, FetchError> {
        match found {
            Err(error) => {
                log_state(OrchestrationState::PrimaryFailed);
                warn!("Primary lookup with {} failed: {}", self.primary.name(), error);
                Err(error)
            }
            Ok(None) => {
                log_state(OrchestrationState::PrimaryEmpty);
                Ok(OrchestrationResult::default())
            }
            Ok(Some(record)) => {
                log_state(OrchestrationState::PrimarySucceeded);
                Ok(self.enrich_within(record, deadline).await)
            }
        }
    }

    /// Derive and validate one task per applicable step
    fn derive_tasks(&self, record: &Record, warnings: &mut Vec<FetchWarning>) -> Vec<FetchTask> {
        let mut tasks = Vec::new();

        for step in &self.steps {
            let Some(raw) = step.deriver.derive(record) else {
                debug!("Step {} does not apply", step.name);
                continue;
            };

            match step.adapter.normalize_identifier(&raw) {
                Ok(identifier) => tasks.push(FetchTask {
                    step: step.name.clone(),
                    identifier,
                    adapter: step.adapter.clone(),
                    priority: step.priority.clone(),
                }),
                Err(error) => {
                    warn!("Step {} derived an unusable identifier: {}", step.name, error);
                    warnings.push(FetchWarning {
                        source: step.adapter.name().to_string(),
                        step: step.name.clone(),
                        identifier: raw,
                        error,
                    });
                }
            }
        }

        tasks
    }

    async fn enrich_within(&self, base: Record, deadline: Deadline) -> OrchestrationResult {
        let start_time = Instant::now();
        let mut warnings = Vec::new();
        let tasks = self.derive_tasks(&base, &mut warnings);
        log_state(OrchestrationState::IdentifiersDerived(tasks.len()));

        let outcomes = self.run_tasks(&tasks, deadline).await;

        log_state(OrchestrationState::Merging);
        let mut merged = base;
        for (task, outcome) in tasks.iter().zip(outcomes) {
            match outcome {
                Ok(Some(supplement)) => {
                    debug!(
                        "Merging {} record for {} with {}",
                        task.step, task.identifier, task.priority
                    );
                    merged = merge(&merged, &supplement, &task.priority);
                }
                Ok(None) => {
                    debug!("{} has no record for {}", task.adapter.name(), task.identifier);
                    warnings.push(task.warning(FetchError::NotFound {
                        identifier: task.identifier.clone(),
                    }));
                }
                Err(error) => {
                    warn!(
                        "Supplementary lookup {} for {} failed: {}",
                        task.step, task.identifier, error
                    );
                    warnings.push(task.warning(error));
                }
            }
        }

        let record = self.normalizer.normalize(&merged);
        log_state(OrchestrationState::Done);
        debug!(
            "Enrichment finished in {:?} with {} warnings",
            start_time.elapsed(),
            warnings.len()
        );

        OrchestrationResult {
            record: Some(record),
            warnings,
        }
    }

    /// Spawn every task, then collect completions until all have reported or
    /// the deadline passes. Outcomes come back in task order.
    async fn run_tasks(&self, tasks: &[FetchTask], deadline: Deadline) -> Vec<Outcome> {
        if tasks.is_empty() {
            return Vec::new();
        }

        let (sender, mut receiver) = mpsc::channel::<(usize, Outcome)>(tasks.len());
        let per_call = deadline.cap(self.supplementary_timeout);

        let handles: Vec<JoinHandle<()>> = tasks
            .iter()
            .enumerate()
            .map(|(slot, task)| {
                let adapter = task.adapter.clone();
                let identifier = task.identifier.clone();
                let sender = sender.clone();
                tokio::spawn(async move {
                    let outcome = adapter
                        .fetch_by_id(&identifier)
                        .with_deadline(per_call)
                        .await
                        .and_then(|outcome| outcome);
                    // The receiver is gone once the deadline has passed
                    let _ = sender.send((slot, outcome)).await;
                })
            })
            .collect();
        drop(sender);
        log_state(OrchestrationState::SupplementaryInFlight(tasks.len()));

        let mut slots: Vec<Option<Outcome>> = vec![None; tasks.len()];
        let mut received = 0;
        let mut expired = false;
        let expiry = tokio::time::sleep_until(deadline.instant());
        tokio::pin!(expiry);

        while received < tasks.len() {
            tokio::select! {
                message = receiver.recv() => match message {
                    Some((slot, outcome)) => {
                        slots[slot] = Some(outcome);
                        received += 1;
                    }
                    None => break,
                },
                () = &mut expiry => {
                    warn!(
                        "Deadline of {:?} reached with {} of {} lookups outstanding",
                        deadline.budget(),
                        tasks.len() - received,
                        tasks.len()
                    );
                    expired = true;
                    break;
                }
            }
        }

        // Results already queued when the deadline fired still count
        while let Ok((slot, outcome)) = receiver.try_recv() {
            slots[slot] = Some(outcome);
        }

        slots
            .into_iter()
            .zip(handles)
            .map(|(slot, handle)| {
                slot.unwrap_or_else(|| {
                    // A closed channel means every task has ended
                    if expired && !handle.is_finished() {
                        handle.abort();
                        Err(FetchError::Timeout(deadline.budget()))
                    } else {
                        Err(FetchError::Aborted("lookup ended without a result".to_string()))
                    }
                })
            })
            .collect()
    }
}

fn log_state(state: OrchestrationState) {
    debug!(%state, "orchestrator state");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EntryType;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Fixed {
        name: &'static str,
        record: Option<Record>,
    }

    #[async_trait]
    impl SourceAdapter for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fixed"
        }

        async fn fetch_by_id(&self, _identifier: &str) -> std::result::Result<Option<Record>, FetchError> {
            Ok(self.record.clone())
        }
    }

    #[derive(Debug)]
    struct Panicking;

    #[async_trait]
    impl SourceAdapter for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn description(&self) -> &str {
            "panics"
        }

        async fn fetch_by_id(&self, _identifier: &str) -> std::result::Result<Option<Record>, FetchError> {
            panic!("adapter bug")
        }
    }

    fn arxiv_record() -> Record {
        Record::new(EntryType::Article)
            .with_field(Field::Eprint, "2101.00001")
            .with_field(Field::Title, "X")
            .with_field(Field::Author, "A")
    }

    #[tokio::test]
    async fn test_no_steps_returns_primary() {
        let orchestrator = FetchOrchestrator::new(Arc::new(Fixed {
            name: "arxiv",
            record: Some(arxiv_record()),
        }));

        let result = orchestrator.fetch_by_id("2101.00001").await.unwrap();
        assert_eq!(result.record, Some(arxiv_record()));
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_empty_primary() {
        let orchestrator = FetchOrchestrator::new(Arc::new(Fixed { name: "arxiv", record: None }));
        let result = orchestrator.fetch_by_id("2101.00001").await.unwrap();
        assert!(!result.is_found());
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_supplement_becomes_warning() {
        let orchestrator = FetchOrchestrator::new(Arc::new(Fixed {
            name: "arxiv",
            record: Some(arxiv_record()),
        }))
        .with_step(EnrichmentStep::new(
            AutomaticDoiDeriver,
            Arc::new(Panicking),
            FieldPrioritySet::automatic_doi(),
        ));

        let result = orchestrator.fetch_by_id("2101.00001").await.unwrap();
        assert_eq!(result.record, Some(arxiv_record()));
        assert_eq!(result.warnings.len(), 1);
        assert!(matches!(result.warnings[0].error, FetchError::Aborted(_)));
    }

    #[tokio::test]
    async fn test_empty_supplement_is_not_found_warning() {
        let orchestrator = FetchOrchestrator::new(Arc::new(Fixed {
            name: "arxiv",
            record: Some(arxiv_record()),
        }))
        .with_step(EnrichmentStep::new(
            AutomaticDoiDeriver,
            Arc::new(Fixed { name: "doi", record: None }),
            FieldPrioritySet::automatic_doi(),
        ));

        let result = orchestrator.enrich(arxiv_record()).await;
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].source, "doi");
        assert_eq!(result.warnings[0].step, "automatic-doi");
        assert_eq!(
            result.warnings[0].error,
            FetchError::NotFound {
                identifier: "10.48550/arXiv.2101.00001".to_string()
            }
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            OrchestrationState::SupplementaryInFlight(2).to_string(),
            "2 supplementary lookups in flight"
        );
    }
}
