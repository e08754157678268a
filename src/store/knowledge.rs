//! Append-only knowledge logs: decisions, warnings, insights, patterns, and
//! the evolution timeline.
//!
//! Each add reads the full collection, appends one record, and atomically
//! writes the collection back, all under the store's write lock. Cost is
//! linear in the collection size, which stays in the hundreds-to-thousands.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

use super::types::{
    Decision, DecisionStatus, EvolutionEvent, Insight, NewDecision, NewEvolutionEvent,
    NewInsight, NewPattern, NewWarning, Pattern, Warning,
};
use super::{atomic, new_id, now, KnowledgeStore};
use crate::error::{StoreError, StoreResult};

pub const DECISION_PREFIX: &str = "dec";
pub const WARNING_PREFIX: &str = "warn";
pub const INSIGHT_PREFIX: &str = "ins";
pub const PATTERN_PREFIX: &str = "pat";
pub const EVOLUTION_PREFIX: &str = "evo";

impl KnowledgeStore {
    pub fn add_decision(&self, new: NewDecision) -> StoreResult<Decision> {
        let decision = Decision {
            id: new_id(DECISION_PREFIX),
            content: new.content,
            reason: new.reason,
            context: new.context,
            alternatives: new.alternatives,
            author: self.author_or_default(new.author),
            status: new.status.unwrap_or_default(),
            tags: new.tags,
            feature: new.feature,
            created_at: now(),
        };
        self.append(&self.layout.decisions(), decision.clone())?;
        tracing::info!(id = %decision.id, feature = ?decision.feature, "decision recorded");
        Ok(decision)
    }

    pub fn add_warning(&self, new: NewWarning) -> StoreResult<Warning> {
        let warning = Warning {
            id: new_id(WARNING_PREFIX),
            content: new.content,
            reason: new.reason,
            evidence: new.evidence,
            severity: new.severity.unwrap_or_default(),
            author: self.author_or_default(new.author),
            tags: new.tags,
            feature: new.feature,
            created_at: now(),
        };
        self.append(&self.layout.warnings(), warning.clone())?;
        tracing::info!(id = %warning.id, severity = %warning.severity, "warning recorded");
        Ok(warning)
    }

    pub fn add_insight(&self, new: NewInsight) -> StoreResult<Insight> {
        let insight = Insight {
            id: new_id(INSIGHT_PREFIX),
            content: new.content,
            author: self.author_or_default(new.author),
            feature: new.feature,
            created_at: now(),
        };
        self.append(&self.layout.insights(), insight.clone())?;
        tracing::info!(id = %insight.id, "insight recorded");
        Ok(insight)
    }

    pub fn add_pattern(&self, new: NewPattern) -> StoreResult<Pattern> {
        let pattern = Pattern {
            id: new_id(PATTERN_PREFIX),
            name: new.name,
            description: new.description,
            source: new.source.unwrap_or_default(),
            created_at: now(),
        };
        self.append(&self.layout.patterns(), pattern.clone())?;
        tracing::info!(id = %pattern.id, name = %pattern.name, "pattern recorded");
        Ok(pattern)
    }

    pub fn add_evolution_event(&self, new: NewEvolutionEvent) -> StoreResult<EvolutionEvent> {
        let event = EvolutionEvent {
            id: new_id(EVOLUTION_PREFIX),
            event_type: new.event_type,
            title: new.title,
            description: new.description,
            author: self.author_or_default(new.author),
            impact: new.impact.unwrap_or_default(),
            timestamp: now(),
        };
        self.append(&self.layout.evolution(), event.clone())?;
        tracing::info!(id = %event.id, event_type = %event.event_type, "evolution event recorded");
        Ok(event)
    }

    pub fn decisions(&self) -> StoreResult<Vec<Decision>> {
        let _guard = self.read_guard()?;
        atomic::read_json(&self.layout.decisions())
    }

    pub fn warnings(&self) -> StoreResult<Vec<Warning>> {
        let _guard = self.read_guard()?;
        atomic::read_json(&self.layout.warnings())
    }

    pub fn insights(&self) -> StoreResult<Vec<Insight>> {
        let _guard = self.read_guard()?;
        atomic::read_json(&self.layout.insights())
    }

    pub fn patterns(&self) -> StoreResult<Vec<Pattern>> {
        let _guard = self.read_guard()?;
        atomic::read_json(&self.layout.patterns())
    }

    pub fn evolution(&self) -> StoreResult<Vec<EvolutionEvent>> {
        let _guard = self.read_guard()?;
        atomic::read_json(&self.layout.evolution())
    }

    pub fn decisions_for_feature(&self, feature: &str) -> StoreResult<Vec<Decision>> {
        Ok(self
            .decisions()?
            .into_iter()
            .filter(|d| d.feature.as_deref() == Some(feature))
            .collect())
    }

    pub fn warnings_for_feature(&self, feature: &str) -> StoreResult<Vec<Warning>> {
        Ok(self
            .warnings()?
            .into_iter()
            .filter(|w| w.feature.as_deref() == Some(feature))
            .collect())
    }

    pub fn insights_for_feature(&self, feature: &str) -> StoreResult<Vec<Insight>> {
        Ok(self
            .insights()?
            .into_iter()
            .filter(|i| i.feature.as_deref() == Some(feature))
            .collect())
    }

    /// Flip a decision's status (the supersede workflow). The only mutation
    /// the decision log allows.
    pub fn set_decision_status(&self, id: &str, status: DecisionStatus) -> StoreResult<Decision> {
        let _guard = self.write_guard()?;
        let path = self.layout.decisions();
        let mut decisions: Vec<Decision> = atomic::read_json(&path)?;

        let decision = decisions
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound {
                what: format!("decision {id}"),
            })?;
        decision.status = status;
        let updated = decision.clone();

        atomic::write_json(&path, &decisions)?;
        tracing::info!(id = %id, status = %status, "decision status changed");
        Ok(updated)
    }

    /// Read-modify-write append under the exclusive lock.
    fn append<T>(&self, path: &Path, record: T) -> StoreResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let _guard = self.write_guard()?;
        let mut records: Vec<T> = atomic::read_json(path)?;
        records.push(record);
        atomic::write_json(path, &records)
    }
}
