//! Aggregated result of one reconciliation pass.

use std::fmt;
use std::time::Duration;

/// The three ordered phases of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Tunnels,
    StaticRoutes,
    EcmpRoutes,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Tunnels => "tunnels",
            Phase::StaticRoutes => "static_routes",
            Phase::EcmpRoutes => "ecmp_routes",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a single desired item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A mutating operation was issued and succeeded.
    Applied,
    /// The presence probe said it was already there; nothing was issued.
    AlreadyPresent,
    /// The operation failed; the diagnostic is kept for the log and report.
    Failed(String),
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Applied => "applied",
            ItemOutcome::AlreadyPresent => "present",
            ItemOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    pub phase: Phase,
    /// Human-readable identity: tunnel name, "dest via gw", or "selector table T".
    pub item: String,
    pub outcome: ItemOutcome,
}

/// Every item of a pass, in phase order then config order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    items: Vec<ItemReport>,
    elapsed: Duration,
}

impl ReconcileReport {
    pub(crate) fn push(&mut self, phase: Phase, item: String, outcome: ItemOutcome) {
        self.items.push(ItemReport { phase, item, outcome });
    }

    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn items(&self) -> &[ItemReport] {
        &self.items
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &ItemReport> + '_ {
        self.items.iter().filter(move |r| r.phase == phase)
    }

    /// Items of `phase` for which a mutating call succeeded.
    pub fn applied(&self, phase: Phase) -> Vec<&str> {
        self.phase(phase)
            .filter(|r| r.outcome == ItemOutcome::Applied)
            .map(|r| r.item.as_str())
            .collect()
    }

    pub fn already_present(&self, phase: Phase) -> Vec<&str> {
        self.phase(phase)
            .filter(|r| r.outcome == ItemOutcome::AlreadyPresent)
            .map(|r| r.item.as_str())
            .collect()
    }

    pub fn failures(&self) -> Vec<&ItemReport> {
        self.items
            .iter()
            .filter(|r| matches!(r.outcome, ItemOutcome::Failed(_)))
            .collect()
    }

    /// True when no item failed.
    pub fn is_converged(&self) -> bool {
        self.failures().is_empty()
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|r| pred(&r.outcome)).count()
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} applied, {} already present, {} failed in {:?}",
            self.count(|o| *o == ItemOutcome::Applied),
            self.count(|o| *o == ItemOutcome::AlreadyPresent),
            self.count(|o| matches!(o, ItemOutcome::Failed(_))),
            self.elapsed
        )
    }
}
