//! Client-side incident filtering and dashboard statistics.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::model::{Incident, IncidentStatus, Severity};
use crate::RECENT_ACTIVITY_LIMIT;

pub const CATEGORIES: [&str; 7] = [
    "Traffic Accident",
    "Fire Emergency",
    "Medical Emergency",
    "Crime",
    "Natural Disaster",
    "Infrastructure",
    "Other",
];

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    Month,
}

impl DateRange {
    /// Earliest creation time that passes, or `None` for no bound.
    #[must_use]
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::All => None,
            Self::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc()),
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => Some(now - Duration::days(30)),
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "All Time",
            Self::Today => "Today",
            Self::Week => "This Week",
            Self::Month => "This Month",
        }
    }
}

/// One edit to the filter form. Selector values use the form's strings,
/// where an empty value or an "All …" option clears that predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum FilterChange {
    Search(String),
    Category(String),
    Status(String),
    Severity(String),
    DateRange(DateRange),
}

fn is_all_selector(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case("all") || value.to_ascii_lowercase().starts_with("all ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IncidentFilter {
    pub search: String,
    pub category: Option<String>,
    pub status: Option<IncidentStatus>,
    pub severity: Option<Severity>,
    pub date_range: DateRange,
}

impl IncidentFilter {
    pub fn apply_change(&mut self, change: FilterChange) {
        match change {
            FilterChange::Search(text) => self.search = text,
            FilterChange::Category(value) => {
                self.category = (!is_all_selector(&value)).then(|| value.trim().to_string());
            }
            FilterChange::Status(value) => {
                self.status = if is_all_selector(&value) {
                    None
                } else {
                    let parsed = IncidentStatus::parse(&value);
                    if parsed.is_none() {
                        warn!(status = %value, "ignoring unknown status filter");
                    }
                    parsed
                };
            }
            FilterChange::Severity(value) => {
                self.severity = if is_all_selector(&value) {
                    None
                } else {
                    let parsed = Severity::parse(&value);
                    if parsed.is_none() {
                        warn!(severity = %value, "ignoring unknown severity filter");
                    }
                    parsed
                };
            }
            FilterChange::DateRange(range) => self.date_range = range,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active_count() > 0
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        [
            !self.search.trim().is_empty(),
            self.category.is_some(),
            self.status.is_some(),
            self.severity.is_some(),
            self.date_range != DateRange::All,
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }

    #[must_use]
    pub fn matches(&self, incident: &Incident, now: DateTime<Utc>) -> bool {
        self.matches_search(incident)
            && self
                .category
                .as_deref()
                .map_or(true, |c| incident.category.eq_ignore_ascii_case(c))
            && self.status.map_or(true, |s| incident.status == s)
            && self.severity.map_or(true, |s| incident.severity == s)
            && self.matches_date(incident, now)
    }

    /// Keeps matching incidents in their original order.
    #[must_use]
    pub fn apply<'a>(&self, incidents: &'a [Incident], now: DateTime<Utc>) -> Vec<&'a Incident> {
        incidents.iter().filter(|i| self.matches(i, now)).collect()
    }

    fn matches_search(&self, incident: &Incident) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            Some(incident.title.as_str()),
            Some(incident.description.as_str()),
            incident.location.as_deref(),
            incident.reporter_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    fn matches_date(&self, incident: &Incident, now: DateTime<Utc>) -> bool {
        match self.date_range.cutoff(now) {
            None => true,
            Some(cutoff) => incident.created_at.is_some_and(|created| created >= cutoff),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StatusCounts {
    pub pending: usize,
    pub investigating: usize,
    pub approved: usize,
    pub in_progress: usize,
    pub resolved: usize,
    pub rejected: usize,
}

impl StatusCounts {
    fn record(&mut self, status: IncidentStatus) {
        let slot = match status {
            IncidentStatus::Pending => &mut self.pending,
            IncidentStatus::Investigating => &mut self.investigating,
            IncidentStatus::Approved => &mut self.approved,
            IncidentStatus::InProgress => &mut self.in_progress,
            IncidentStatus::Resolved => &mut self.resolved,
            IncidentStatus::Rejected => &mut self.rejected,
        };
        *slot += 1;
    }

    #[must_use]
    pub fn get(&self, status: IncidentStatus) -> usize {
        match status {
            IncidentStatus::Pending => self.pending,
            IncidentStatus::Investigating => self.investigating,
            IncidentStatus::Approved => self.approved,
            IncidentStatus::InProgress => self.in_progress,
            IncidentStatus::Resolved => self.resolved,
            IncidentStatus::Rejected => self.rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct IncidentStats {
    pub total: usize,
    pub by_status: StatusCounts,
    /// Everything not yet resolved.
    pub active: usize,
    /// High or critical severity.
    pub critical: usize,
    pub by_category: Vec<Breakdown>,
    pub by_severity: Vec<Breakdown>,
    pub recent: Vec<Incident>,
}

#[allow(clippy::cast_precision_loss)]
fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (count as f64 / total as f64 * 1000.0).round() / 10.0
}

#[must_use]
pub fn compute_stats<'a>(incidents: impl IntoIterator<Item = &'a Incident>) -> IncidentStats {
    let incidents: Vec<&Incident> = incidents.into_iter().collect();
    let total = incidents.len();

    let mut by_status = StatusCounts::default();
    let mut categories: HashMap<&str, usize> = HashMap::new();
    let mut severities: HashMap<Severity, usize> = HashMap::new();

    for incident in &incidents {
        by_status.record(incident.status);
        let category = if incident.category.trim().is_empty() {
            UNCATEGORIZED
        } else {
            incident.category.as_str()
        };
        *categories.entry(category).or_default() += 1;
        *severities.entry(incident.severity).or_default() += 1;
    }

    let mut by_category: Vec<Breakdown> = categories
        .into_iter()
        .map(|(label, count)| Breakdown {
            label: label.to_string(),
            count,
            percentage: percentage(count, total),
        })
        .collect();
    by_category.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    let by_severity = Severity::ALL
        .iter()
        .map(|severity| {
            let count = severities.get(severity).copied().unwrap_or(0);
            Breakdown {
                label: severity.label().to_string(),
                count,
                percentage: percentage(count, total),
            }
        })
        .collect();

    let mut recent: Vec<&Incident> = incidents.clone();
    // Undated incidents sort after dated ones.
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let recent = recent
        .into_iter()
        .take(RECENT_ACTIVITY_LIMIT)
        .cloned()
        .collect();

    IncidentStats {
        total,
        active: total - by_status.resolved,
        critical: incidents.iter().filter(|i| i.severity.is_urgent()).count(),
        by_status,
        by_category,
        by_severity,
        recent,
    }
}
