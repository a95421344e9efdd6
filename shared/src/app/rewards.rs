use tracing::{debug, info, warn};

use super::App;
use crate::api::{endpoints, RedeemRequest, RedeemResponse};
use crate::capabilities::{Capabilities, HttpReply, HttpResult};
use crate::model::{LeaderboardEntry, ListEnvelope, Model, PointsSummary};
use crate::rewards::{check_redeem, find_reward, redeemed_message, LeaderboardQuery, REDEEM_FAILED};
use crate::{AppError, ErrorKind, ToastKind};

impl App {
    pub(super) fn send_points_request(model: &mut Model, caps: &Capabilities) {
        let request = Self::client(model).get(endpoints::POINTS);
        Self::dispatch(request, HttpReply::Points, model, caps);
    }

    pub(super) fn handle_points_response(result: HttpResult, model: &mut Model, caps: &Capabilities) {
        let Some(response) = Self::settle(result, "Failed to load points", model, caps) else {
            return;
        };
        match response.json::<PointsSummary>() {
            Ok(summary) => {
                debug!(
                    points = summary.points,
                    available = summary.available_points,
                    "points refreshed"
                );
                if let Some(user) = model.user.as_mut() {
                    user.points = summary.points;
                }
                model.points = Some(summary);
            }
            Err(e) => model.set_error(Self::parse_error(&response, &e)),
        }
        caps.render.render();
    }

    pub(super) fn send_leaderboard_request(model: &mut Model, caps: &Capabilities) {
        let query = model.leaderboard_query;
        let request = Self::client(model).leaderboard(query.timeframe.as_str(), query.top);
        Self::dispatch(request, HttpReply::Leaderboard { query }, model, caps);
    }

    pub(super) fn handle_leaderboard_response(
        query: LeaderboardQuery,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        if query != model.leaderboard_query {
            debug!(timeframe = query.timeframe.as_str(), "dropping stale leaderboard");
            return;
        }
        let Some(response) = Self::settle(result, "Failed to load leaderboard", model, caps) else {
            return;
        };
        match response.json::<ListEnvelope<LeaderboardEntry>>() {
            Ok(list) => model.leaderboard = list.into_vec(),
            Err(e) => model.set_error(Self::parse_error(&response, &e)),
        }
        caps.render.render();
    }

    pub(super) fn redeem(reward_id: u32, model: &mut Model, caps: &Capabilities) {
        if !Self::require_session(model, caps) {
            return;
        }
        let Some(reward) = find_reward(reward_id) else {
            warn!(reward_id, "redeem requested for unknown reward");
            model.set_error(AppError::new(ErrorKind::NotFound, "Reward not found"));
            caps.render.render();
            return;
        };
        if let Err(e) = check_redeem(model.points.as_ref(), &reward) {
            Self::invalid(e, model, caps);
            return;
        }

        model.clear_error();
        model.is_loading = true;
        let body = RedeemRequest {
            reward: &reward.title,
            reward_id: reward.id,
            points: reward.points,
        };
        let request = Self::client(model).post_json(endpoints::REDEEM, &body);
        if !Self::dispatch(request, HttpReply::Redeem { reward_id }, model, caps) {
            model.is_loading = false;
        }
        caps.render.render();
    }

    pub(super) fn handle_redeem_response(
        reward_id: u32,
        result: HttpResult,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        model.is_loading = false;
        let Some(response) = Self::settle(result, REDEEM_FAILED, model, caps) else {
            return;
        };

        let remaining = match response.json::<RedeemResponse>() {
            Ok(body) => body.points_remaining,
            Err(e) => {
                debug!(error = %e, "redeem response carried no body");
                None
            }
        };
        let message = find_reward(reward_id).map_or_else(
            || "Reward redeemed".to_string(),
            |reward| {
                if remaining.is_none() {
                    if let Some(points) = model.points.as_mut() {
                        points.available_points = points.available_points.saturating_sub(reward.points);
                    }
                }
                redeemed_message(&reward)
            },
        );
        if let (Some(points), Some(remaining)) = (model.points.as_mut(), remaining) {
            points.available_points = remaining;
        }
        info!(reward_id, "reward redeemed");
        model.show_toast(message, ToastKind::Success);
        Self::send_points_request(model, caps);
        caps.render.render();
    }
}
