//! What the current screen shows, derived from the model on demand.

use chrono::{DateTime, TimeZone, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::dashboard::{nav_items, DashboardKind, NavItem, Page};
use crate::filter::{compute_stats, DateRange, IncidentStats, CATEGORIES};
use crate::map::{to_feature_collection, MapAvailability, MapMarker, MapViewport};
use crate::media::{RejectedFile, UploadBatch};
use crate::model::{
    AppState, AuthScreen, Comment, Incident, IncidentId, IncidentStatus, MediaId, MediaItem, Model,
    PointsSummary, Role, Severity, User, UserId,
};
use crate::rewards::{
    can_afford, catalog, current_user_rank, earning_rules, ranked_entries, EarningRule,
    LeaderboardQuery, LeaderboardTimeframe, RankedEntry, Reward,
};
use crate::workflow::{self, StatusControl, StatusOption};
use crate::{format_time_ago, truncate_preview, ToastView, UserFacingError, DESCRIPTION_PREVIEW_LENGTH};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub state: ViewState,
    pub error: Option<UserFacingError>,
    pub toast: Option<ToastView>,
    pub is_global_loading: bool,
    pub is_authenticated: bool,
    pub user: Option<UserView>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Loading {
        message: Option<String>,
    },
    Unauthenticated {
        screen: AuthScreen,
        notice: Option<String>,
        is_submitting: bool,
    },
    Authenticating,
    Dashboard {
        dashboard: DashboardKind,
        title: String,
        nav: Vec<NavItem>,
        active: Page,
        page: Box<PageView>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum PageView {
    Incidents {
        filter: FilterView,
        items: Vec<IncidentListItem>,
        total: usize,
        stats: IncidentStats,
        points: Option<PointsSummary>,
        is_loading: bool,
    },
    IncidentDetail {
        detail: Option<IncidentDetailView>,
        is_loading: bool,
    },
    Report {
        categories: Vec<String>,
        severities: Vec<SeverityOption>,
        staged: Vec<StagedFileView>,
        rejected: Vec<RejectedFile>,
        uploads: Vec<UploadProgressView>,
        is_submitting: bool,
    },
    Map {
        availability: MapAvailability,
        viewport: MapViewport,
        markers: Vec<MapMarker>,
        geojson: serde_json::Value,
    },
    Rewards {
        points: Option<PointsSummary>,
        catalog: Vec<RewardView>,
        earning_rules: Vec<EarningRule>,
    },
    Leaderboard {
        query: LeaderboardQuery,
        timeframes: Vec<TimeframeOption>,
        entries: Vec<RankedEntry>,
        my_rank: Option<u32>,
    },
    Profile {
        user: Option<UserView>,
        points: Option<PointsSummary>,
    },
    AdminUsers {
        users: Vec<AdminUserRow>,
    },
    Analytics {
        stats: IncidentStats,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub points: u32,
    pub is_admin: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.display_name().to_string(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            role: user.role,
            points: user.points,
            is_admin: user.role.is_admin(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityOption {
    pub severity: Severity,
    pub label: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRangeOption {
    pub range: DateRange,
    pub label: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterView {
    pub search: String,
    pub category: Option<String>,
    pub status: Option<IncidentStatus>,
    pub severity: Option<Severity>,
    pub date_range: DateRange,
    pub active_count: usize,
    pub categories: Vec<String>,
    pub statuses: Vec<StatusOption>,
    pub severities: Vec<SeverityOption>,
    pub date_ranges: Vec<DateRangeOption>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IncidentListItem {
    pub id: IncidentId,
    pub title: String,
    pub description_preview: String,
    pub category: String,
    pub severity: Severity,
    pub severity_label: String,
    pub status: IncidentStatus,
    pub status_label: String,
    pub status_color: String,
    pub location: String,
    pub reporter_name: Option<String>,
    pub time_ago: Option<String>,
    pub created_at_ms: Option<u64>,
    pub media_count: usize,
    pub is_mine: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaView {
    pub id: Option<MediaId>,
    pub url: String,
    pub filename: Option<String>,
    pub is_video: bool,
}

impl From<&MediaItem> for MediaView {
    fn from(item: &MediaItem) -> Self {
        Self {
            id: item.id.clone(),
            url: item.file_url.clone(),
            filename: item.filename.clone(),
            is_video: item.is_video(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentView {
    pub author: String,
    pub text: String,
    pub time_ago: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IncidentDetailView {
    pub summary: IncidentListItem,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub casualty_count: u32,
    pub responder_count: u32,
    pub updated_time_ago: Option<String>,
    pub media: Vec<MediaView>,
    pub comments: Vec<CommentView>,
    /// Present for admins only.
    pub status_control: Option<StatusControl>,
    pub can_award_points: bool,
    pub upload: Option<UploadProgressView>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagedFileView {
    pub index: usize,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub is_video: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadProgressView {
    pub incident_id: IncidentId,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub pending: usize,
}

impl From<&UploadBatch> for UploadProgressView {
    fn from(batch: &UploadBatch) -> Self {
        Self {
            incident_id: batch.incident_id.clone(),
            total: batch.total(),
            succeeded: batch.succeeded.len(),
            failed: batch.failed.len(),
            pending: batch.pending.len(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardView {
    #[serde(flatten)]
    pub reward: Reward,
    pub affordable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeframeOption {
    pub timeframe: LeaderboardTimeframe,
    pub label: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminUserRow {
    pub user: UserView,
    pub is_self: bool,
    pub can_promote: bool,
    pub can_delete: bool,
}

#[must_use]
pub fn build(model: &Model) -> ViewModel {
    let now_ms = model.view_timestamp_ms;

    let state = match model.state {
        AppState::Loading => ViewState::Loading {
            message: Some("Loading...".to_string()),
        },
        AppState::Unauthenticated => ViewState::Unauthenticated {
            screen: model.auth_screen,
            notice: model.auth_notice.clone(),
            is_submitting: model.is_loading,
        },
        AppState::Authenticating => ViewState::Authenticating,
        AppState::Ready => match model.user.as_ref() {
            Some(user) => {
                let dashboard = DashboardKind::for_role(user.role);
                ViewState::Dashboard {
                    dashboard,
                    title: model.page.title(dashboard).to_string(),
                    nav: nav_items(dashboard),
                    active: model.page,
                    page: Box::new(build_page(model, now_ms)),
                }
            }
            None => ViewState::Unauthenticated {
                screen: model.auth_screen,
                notice: model.auth_notice.clone(),
                is_submitting: false,
            },
        },
    };

    ViewModel {
        state,
        error: model.active_error.as_ref().map(UserFacingError::from),
        toast: model.active_toast.as_ref().map(ToastView::from),
        is_global_loading: model.is_loading || model.incidents_loading,
        is_authenticated: model.is_authenticated(),
        user: model.user.as_ref().map(UserView::from),
    }
}

fn build_page(model: &Model, now_ms: u64) -> PageView {
    match model.page {
        Page::Incidents => {
            let now = to_datetime(now_ms);
            let items: Vec<IncidentListItem> = model
                .filter
                .apply(&model.incidents, now)
                .into_iter()
                .map(|incident| build_list_item(model, incident, now_ms))
                .collect();
            PageView::Incidents {
                filter: build_filter(model),
                items,
                total: model.incidents.len(),
                stats: compute_stats(&model.incidents),
                points: model.points,
                is_loading: model.incidents_loading,
            }
        }
        Page::IncidentDetail => PageView::IncidentDetail {
            detail: build_detail(model, now_ms),
            is_loading: model.detail_loading,
        },
        Page::Report => PageView::Report {
            categories: CATEGORIES.iter().map(|c| (*c).to_string()).collect(),
            severities: severity_options(),
            staged: model
                .staged_media
                .iter()
                .enumerate()
                .map(|(index, file)| {
                    let mime_type = file.effective_mime_type();
                    StagedFileView {
                        index,
                        name: file.name.clone(),
                        is_video: mime_type.starts_with("video/"),
                        mime_type,
                        size_bytes: file.size(),
                    }
                })
                .collect(),
            rejected: model.rejected_media.clone(),
            uploads: model.upload_batches.values().map(UploadProgressView::from).collect(),
            is_submitting: model.is_submitting,
        },
        Page::Map => {
            let availability =
                MapAvailability::from_key(model.config.map_api_key.as_ref().map(|k| k.expose_secret().as_str()));
            let geojson = serde_json::to_value(to_feature_collection(&model.map_markers))
                .unwrap_or(serde_json::Value::Null);
            PageView::Map {
                availability,
                viewport: MapViewport::default(),
                markers: model.map_markers.clone(),
                geojson,
            }
        }
        Page::Rewards => PageView::Rewards {
            points: model.points,
            catalog: catalog()
                .into_iter()
                .map(|reward| RewardView {
                    affordable: can_afford(model.points.as_ref(), &reward),
                    reward,
                })
                .collect(),
            earning_rules: earning_rules(),
        },
        Page::Leaderboard => {
            let entries = ranked_entries(&model.leaderboard, model.user_id());
            PageView::Leaderboard {
                query: model.leaderboard_query,
                timeframes: [
                    LeaderboardTimeframe::All,
                    LeaderboardTimeframe::Week,
                    LeaderboardTimeframe::Month,
                ]
                .into_iter()
                .map(|timeframe| TimeframeOption {
                    timeframe,
                    label: timeframe.label().to_string(),
                })
                .collect(),
                my_rank: current_user_rank(&entries),
                entries,
            }
        }
        Page::Profile => PageView::Profile {
            user: model.user.as_ref().map(UserView::from),
            points: model.points,
        },
        Page::AdminUsers => PageView::AdminUsers {
            users: model
                .users
                .iter()
                .map(|user| {
                    let is_self = model.user_id() == Some(&user.id);
                    AdminUserRow {
                        user: UserView::from(user),
                        is_self,
                        can_promote: !user.role.is_admin(),
                        can_delete: !is_self,
                    }
                })
                .collect(),
        },
        Page::Analytics => PageView::Analytics {
            stats: compute_stats(&model.incidents),
        },
    }
}

fn build_filter(model: &Model) -> FilterView {
    let filter = &model.filter;
    FilterView {
        search: filter.search.clone(),
        category: filter.category.clone(),
        status: filter.status,
        severity: filter.severity,
        date_range: filter.date_range,
        active_count: filter.active_count(),
        categories: CATEGORIES.iter().map(|c| (*c).to_string()).collect(),
        statuses: IncidentStatus::ALL.iter().copied().map(StatusOption::from).collect(),
        severities: severity_options(),
        date_ranges: [DateRange::All, DateRange::Today, DateRange::Week, DateRange::Month]
            .into_iter()
            .map(|range| DateRangeOption {
                range,
                label: range.label().to_string(),
            })
            .collect(),
    }
}

fn severity_options() -> Vec<SeverityOption> {
    Severity::ALL
        .iter()
        .map(|&severity| SeverityOption {
            severity,
            label: severity.label().to_string(),
        })
        .collect()
}

fn build_list_item(model: &Model, incident: &Incident, now_ms: u64) -> IncidentListItem {
    let is_mine = model.user_id().is_some_and(|id| incident.is_reported_by(id));
    let can_manage = model.is_admin() || is_mine;
    let created_at_ms = incident.created_at.as_ref().map(to_millis);

    IncidentListItem {
        id: incident.id.clone(),
        title: incident.title.clone(),
        description_preview: truncate_preview(&incident.description, DESCRIPTION_PREVIEW_LENGTH),
        category: incident.category.clone(),
        severity: incident.severity,
        severity_label: incident.severity.label().to_string(),
        status: incident.status,
        status_label: workflow::label(incident.status).to_string(),
        status_color: workflow::badge_color(incident.status).to_string(),
        location: incident.location_label(),
        reporter_name: incident.reporter_name.clone(),
        time_ago: created_at_ms.map(|ts| format_time_ago(ts, now_ms)),
        created_at_ms,
        media_count: incident.media.len(),
        is_mine,
        can_edit: can_manage,
        can_delete: can_manage,
    }
}

fn build_detail(model: &Model, now_ms: u64) -> Option<IncidentDetailView> {
    let id = model.selected_incident.as_ref()?;
    let incident = model
        .incident_detail
        .as_ref()
        .filter(|d| &d.id == id)
        .or_else(|| model.incidents.iter().find(|i| &i.id == id))?;
    let is_admin = model.is_admin();

    Some(IncidentDetailView {
        summary: build_list_item(model, incident, now_ms),
        description: incident.description.clone(),
        latitude: incident.latitude,
        longitude: incident.longitude,
        casualty_count: incident.casualty_count.unwrap_or(0),
        responder_count: incident.responder_count.unwrap_or(0),
        updated_time_ago: incident
            .updated_at
            .as_ref()
            .map(|ts| format_time_ago(to_millis(ts), now_ms)),
        media: incident.media.iter().map(MediaView::from).collect(),
        comments: model
            .comments
            .iter()
            .map(|comment| build_comment(comment, now_ms))
            .collect(),
        status_control: is_admin.then(|| StatusControl::for_status(incident.status)),
        can_award_points: is_admin && workflow::awards_points(incident.status),
        upload: model.upload_batches.get(id).map(UploadProgressView::from),
    })
}

fn build_comment(comment: &Comment, now_ms: u64) -> CommentView {
    CommentView {
        author: comment.author.clone(),
        text: comment.text.clone(),
        time_ago: comment
            .created_at
            .as_ref()
            .map(|ts| format_time_ago(to_millis(ts), now_ms)),
    }
}

fn to_millis(ts: &DateTime<Utc>) -> u64 {
    u64::try_from(ts.timestamp_millis()).unwrap_or(0)
}

fn to_datetime(ms: u64) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;

    fn user(role: &str) -> User {
        serde_json::from_value(json!({"id": 7, "name": "Wanjiku", "email": "w@example.com", "role": role}))
            .unwrap()
    }

    fn incident(id: u32, created_by: u32) -> Incident {
        serde_json::from_value(json!({
            "id": id,
            "title": format!("Incident {id}"),
            "description": "Matatu overturned near the roundabout",
            "category": "Traffic Accident",
            "severity": "high",
            "status": "pending",
            "created_by": created_by,
            "created_at": "2024-03-01T10:00:00Z",
        }))
        .unwrap()
    }

    fn signed_in(role: &str) -> Model {
        let mut model = Model::new(AppConfig::default());
        model.state = AppState::Ready;
        model.token = Some(secrecy::SecretString::new("t".into()));
        model.user = Some(user(role));
        model
    }

    #[test]
    fn test_unauthenticated_view_carries_notice() {
        let mut model = Model::default();
        model.state = AppState::Unauthenticated;
        model.auth_notice = Some("Your session has expired. Please sign in again.".into());

        let view = build(&model);
        assert!(!view.is_authenticated);
        match view.state {
            ViewState::Unauthenticated { screen, notice, .. } => {
                assert_eq!(screen, AuthScreen::Login);
                assert!(notice.unwrap().contains("expired"));
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn test_citizen_can_manage_only_own_reports() {
        let mut model = signed_in("user");
        model.incidents = vec![incident(1, 7), incident(2, 9)];

        let view = build(&model);
        let ViewState::Dashboard { dashboard, page, .. } = view.state else {
            panic!("expected dashboard");
        };
        assert_eq!(dashboard, DashboardKind::Citizen);
        let PageView::Incidents { items, total, .. } = *page else {
            panic!("expected incidents page");
        };
        assert_eq!(total, 2);
        assert!(items[0].is_mine && items[0].can_delete);
        assert!(!items[1].is_mine && !items[1].can_edit);
    }

    #[test]
    fn test_admin_detail_has_status_control() {
        let mut model = signed_in("admin");
        model.incidents = vec![incident(1, 9)];
        model.selected_incident = Some(IncidentId::new("1"));
        model.page = Page::IncidentDetail;

        let view = build(&model);
        let ViewState::Dashboard { page, .. } = view.state else {
            panic!("expected dashboard");
        };
        let PageView::IncidentDetail { detail: Some(detail), .. } = *page else {
            panic!("expected detail");
        };
        let control = detail.status_control.unwrap();
        assert_eq!(control.current.status, IncidentStatus::Pending);
        assert_eq!(control.suggested.unwrap().to, IncidentStatus::Investigating);
        assert!(detail.summary.can_edit);
        assert_eq!(detail.casualty_count, 0);
    }

    #[test]
    fn test_map_unavailable_without_key() {
        let mut model = signed_in("user");
        model.page = Page::Map;

        let ViewState::Dashboard { page, .. } = build(&model).state else {
            panic!("expected dashboard");
        };
        let PageView::Map { availability, geojson, .. } = *page else {
            panic!("expected map");
        };
        assert!(!availability.is_available());
        assert_eq!(geojson["type"], "FeatureCollection");
    }

    #[test]
    fn test_rewards_affordability() {
        let mut model = signed_in("user");
        model.page = Page::Rewards;
        model.points = Some(PointsSummary {
            points: 160,
            available_points: 160,
            rank: None,
        });

        let ViewState::Dashboard { page, .. } = build(&model).state else {
            panic!("expected dashboard");
        };
        let PageView::Rewards { catalog, .. } = *page else {
            panic!("expected rewards");
        };
        let affordable: Vec<u32> = catalog.iter().filter(|r| r.affordable).map(|r| r.reward.id).collect();
        assert_eq!(affordable, vec![1, 2, 7, 8]);
    }
}
