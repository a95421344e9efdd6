//! Points, the rewards catalog, and leaderboard ranking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{LeaderboardEntry, PointsSummary, UserId};
use crate::{ValidationError, DEFAULT_LEADERBOARD_SIZE};

pub const REDEEM_FAILED: &str = "Failed to redeem reward";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub points: u32,
    pub category: String,
}

const CATALOG: [(u32, &str, &str, u32, &str); 8] = [
    (1, "Coffee Voucher", "Enjoy a free coffee at participating cafes", 100, "Food & Drink"),
    (2, "Mobile Data Bundle", "1GB mobile data for your phone", 150, "Technology"),
    (3, "Public Transport Pass", "Free day pass for public transportation", 200, "Transportation"),
    (4, "Movie Ticket", "Free movie ticket at participating cinemas", 250, "Entertainment"),
    (5, "Restaurant Meal", "Free meal at partner restaurants", 300, "Food & Drink"),
    (6, "Gym Day Pass", "One day access to partner fitness centers", 180, "Health & Fitness"),
    (7, "Book Store Voucher", "Discount voucher for books and stationery", 120, "Education"),
    (8, "Charity Donation", "Donate points to local community projects", 50, "Community"),
];

#[must_use]
pub fn catalog() -> Vec<Reward> {
    CATALOG
        .iter()
        .map(|&(id, title, description, points, category)| Reward {
            id,
            title: title.to_string(),
            description: description.to_string(),
            points,
            category: category.to_string(),
        })
        .collect()
}

#[must_use]
pub fn find_reward(id: u32) -> Option<Reward> {
    catalog().into_iter().find(|r| r.id == id)
}

/// Catalog grouped by category, categories in alphabetical order.
#[must_use]
pub fn grouped_by_category(rewards: &[Reward]) -> BTreeMap<String, Vec<Reward>> {
    let mut groups: BTreeMap<String, Vec<Reward>> = BTreeMap::new();
    for reward in rewards {
        groups.entry(reward.category.clone()).or_default().push(reward.clone());
    }
    groups
}

#[must_use]
pub fn can_afford(points: Option<&PointsSummary>, reward: &Reward) -> bool {
    points.map_or(0, |p| p.available_points) >= reward.points
}

pub fn check_redeem(points: Option<&PointsSummary>, reward: &Reward) -> Result<(), ValidationError> {
    if can_afford(points, reward) {
        Ok(())
    } else {
        Err(ValidationError::InsufficientPoints {
            required: reward.points,
            available: points.map_or(0, |p| p.available_points),
        })
    }
}

#[must_use]
pub fn redeemed_message(reward: &Reward) -> String {
    format!("Successfully redeemed {}! Check your email for details.", reward.title)
}

/// How points are earned; shown on the rewards page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningRule {
    pub action: String,
    pub points: u32,
    pub detail: String,
}

#[must_use]
pub fn earning_rules() -> Vec<EarningRule> {
    [
        ("Report Incident", 10, "per report"),
        ("Incident Resolved", 25, "when resolved"),
        ("Add Comment", 5, "per helpful comment"),
        ("Upload Evidence", 15, "per media upload"),
        ("High Priority Report", 50, "for urgent incidents"),
        ("Weekly Bonus", 100, "for active users"),
    ]
    .into_iter()
    .map(|(action, points, detail)| EarningRule {
        action: action.to_string(),
        points,
        detail: detail.to_string(),
    })
    .collect()
}

// --- Leaderboard ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeaderboardTimeframe {
    #[default]
    All,
    Week,
    Month,
}

impl LeaderboardTimeframe {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::All => "All Time",
            Self::Week => "This Week",
            Self::Month => "This Month",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default)]
    pub timeframe: LeaderboardTimeframe,
    #[serde(default = "default_top")]
    pub top: u32,
}

const fn default_top() -> u32 {
    DEFAULT_LEADERBOARD_SIZE
}

impl Default for LeaderboardQuery {
    fn default() -> Self {
        Self {
            timeframe: LeaderboardTimeframe::All,
            top: DEFAULT_LEADERBOARD_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: u32,
    pub id: UserId,
    pub name: String,
    pub points: u32,
    pub medal: Option<String>,
    pub is_current_user: bool,
}

#[must_use]
pub const fn medal(rank: u32) -> Option<&'static str> {
    match rank {
        1 => Some("🥇"),
        2 => Some("🥈"),
        3 => Some("🥉"),
        _ => None,
    }
}

/// Rank is list position; the backend already sorts by points.
#[must_use]
pub fn ranked_entries(entries: &[LeaderboardEntry], current_user: Option<&UserId>) -> Vec<RankedEntry> {
    entries
        .iter()
        .zip(1u32..)
        .map(|(entry, rank)| RankedEntry {
            rank,
            id: entry.id.clone(),
            name: entry.name.clone(),
            points: entry.points,
            medal: medal(rank).map(str::to_string),
            is_current_user: current_user == Some(&entry.id),
        })
        .collect()
}

#[must_use]
pub fn current_user_rank(entries: &[RankedEntry]) -> Option<u32> {
    entries.iter().find(|e| e.is_current_user).map(|e| e.rank)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(available: u32) -> PointsSummary {
        PointsSummary {
            points: available,
            available_points: available,
            rank: None,
        }
    }

    #[test]
    fn test_catalog_contents() {
        let rewards = catalog();
        assert_eq!(rewards.len(), 8);
        assert_eq!(find_reward(8).unwrap().points, 50);
        assert_eq!(find_reward(5).unwrap().title, "Restaurant Meal");
        assert!(find_reward(9).is_none());

        let groups = grouped_by_category(&rewards);
        assert_eq!(groups["Food & Drink"].len(), 2);
        assert_eq!(groups.len(), 7);
    }

    #[test]
    fn test_redeem_requires_available_points() {
        let coffee = find_reward(1).unwrap();
        assert!(check_redeem(Some(&summary(100)), &coffee).is_ok());
        let err = check_redeem(Some(&summary(99)), &coffee).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient points to redeem this reward");
        assert!(check_redeem(None, &coffee).is_err());
    }

    #[test]
    fn test_redeemed_message() {
        let ticket = find_reward(4).unwrap();
        assert_eq!(
            redeemed_message(&ticket),
            "Successfully redeemed Movie Ticket! Check your email for details."
        );
    }

    #[test]
    fn test_ranking_and_medals() {
        let entries: Vec<LeaderboardEntry> = ["a", "b", "c", "d"]
            .iter()
            .zip([90, 80, 70, 60])
            .map(|(id, points)| LeaderboardEntry {
                id: UserId::new(*id),
                name: id.to_uppercase(),
                points,
            })
            .collect();
        let me = UserId::new("d");
        let ranked = ranked_entries(&entries, Some(&me));
        assert_eq!(ranked[0].medal.as_deref(), Some("🥇"));
        assert_eq!(ranked[2].medal.as_deref(), Some("🥉"));
        assert_eq!(ranked[3].medal, None);
        assert_eq!(current_user_rank(&ranked), Some(4));
        assert_eq!(current_user_rank(&ranked_entries(&entries, None)), None);
    }

    #[test]
    fn test_query_defaults() {
        let query: LeaderboardQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query, LeaderboardQuery::default());
        assert_eq!(query.top, 10);
        assert_eq!(LeaderboardTimeframe::Week.as_str(), "week");
    }
}
