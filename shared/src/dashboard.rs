//! Role-based dashboard selection and navigation.

use serde::{Deserialize, Serialize};

use crate::model::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DashboardKind {
    Admin,
    Citizen,
}

impl DashboardKind {
    #[must_use]
    pub const fn for_role(role: Role) -> Self {
        if role.is_admin() {
            Self::Admin
        } else {
            Self::Citizen
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    Incidents,
    IncidentDetail,
    Report,
    Map,
    Rewards,
    Leaderboard,
    Profile,
    AdminUsers,
    Analytics,
}

impl Page {
    #[must_use]
    pub const fn requires_admin(self) -> bool {
        matches!(self, Self::AdminUsers | Self::Analytics)
    }

    #[must_use]
    pub const fn title(self, kind: DashboardKind) -> &'static str {
        match (self, kind) {
            (Self::Incidents, DashboardKind::Admin) => "Emergency Dashboard",
            (Self::Incidents, DashboardKind::Citizen) => "My Incidents",
            (Self::IncidentDetail, _) => "Incident Details",
            (Self::Report, _) => "Report Incident",
            (Self::Map, _) => "Accident Map",
            (Self::Rewards, _) => "Points & Rewards",
            (Self::Leaderboard, _) => "Community Leaderboard",
            (Self::Profile, _) => "My Profile",
            (Self::AdminUsers, _) => "User Management",
            (Self::Analytics, _) => "System Analytics",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavItem {
    pub page: Page,
    pub label: String,
    pub icon: String,
    pub description: Option<String>,
}

fn item(page: Page, label: &str, icon: &str, description: Option<&str>) -> NavItem {
    NavItem {
        page,
        label: label.to_string(),
        icon: icon.to_string(),
        description: description.map(str::to_string),
    }
}

#[must_use]
pub fn nav_items(kind: DashboardKind) -> Vec<NavItem> {
    match kind {
        DashboardKind::Admin => vec![
            item(Page::Incidents, "Dashboard", "🏠", Some("Emergency reports overview")),
            item(Page::Report, "Report Incident", "➕", Some("File a new report")),
            item(Page::Map, "Map View", "🗺️", Some("Location-based incidents")),
            item(Page::AdminUsers, "Admin Panel", "⚙️", Some("System management")),
            item(Page::Analytics, "Analytics", "📈", Some("Trends and breakdowns")),
            item(Page::Leaderboard, "Leaderboard", "🏅", None),
            item(Page::Profile, "Profile", "👤", None),
        ],
        DashboardKind::Citizen => vec![
            item(Page::Incidents, "My Incidents", "📋", None),
            item(Page::Report, "Report Incident", "➕", None),
            item(Page::Map, "Map View", "🗺️", None),
            item(Page::Rewards, "Points & Rewards", "🏆", None),
            item(Page::Leaderboard, "Leaderboard", "🏅", None),
            item(Page::Profile, "Profile", "👤", None),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_picks_dashboard() {
        assert_eq!(DashboardKind::for_role(Role::Admin), DashboardKind::Admin);
        assert_eq!(DashboardKind::for_role(Role::Moderator), DashboardKind::Citizen);
        assert_eq!(DashboardKind::for_role(Role::User), DashboardKind::Citizen);
    }

    #[test]
    fn test_citizen_nav_has_no_admin_pages() {
        assert!(nav_items(DashboardKind::Citizen)
            .iter()
            .all(|item| !item.page.requires_admin()));
        assert!(nav_items(DashboardKind::Admin)
            .iter()
            .any(|item| item.page == Page::AdminUsers));
    }

    #[test]
    fn test_page_titles_depend_on_dashboard() {
        assert_eq!(Page::Incidents.title(DashboardKind::Admin), "Emergency Dashboard");
        assert_eq!(Page::Incidents.title(DashboardKind::Citizen), "My Incidents");
    }
}
