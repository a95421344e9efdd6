mod common;

use serde_json::json;

use shared::dashboard::Page;
use shared::model::{PointsSummary, Role, UserId};
use shared::rewards::{LeaderboardQuery, LeaderboardTimeframe, REDEEM_FAILED};
use shared::{ErrorKind, Event, Model};

use common::{json_body, respond, signed_in, user_json, Effects, Tester};

fn admin_with_users(app: &Tester) -> Model {
    let mut model = signed_in("admin");
    app.update(Event::Navigate(Page::AdminUsers), &mut model);
    app.update(
        Event::UsersResponse(respond(
            200,
            json!({ "data": [user_json(7, "admin"), user_json(8, "user"), user_json(9, "user")] }),
        )),
        &mut model,
    );
    model
}

#[test]
fn test_admin_page_loads_users() {
    let app = Tester::default();
    let mut model = signed_in("admin");

    let update = app.update(Event::Navigate(Page::AdminUsers), &mut model);
    assert!(update.find_http("/users").is_some());

    app.update(
        Event::UsersResponse(respond(200, json!([user_json(7, "admin"), user_json(8, "user")]))),
        &mut model,
    );
    assert_eq!(model.users.len(), 2);
    assert_eq!(model.users[1].role, Role::User);
}

#[test]
fn test_promote_user() {
    let app = Tester::default();
    let mut model = admin_with_users(&app);

    let update = app.update(Event::PromoteUserRequested { id: UserId::new("8") }, &mut model);
    let promote = update.find_http("/auth/users/8/promote").unwrap();
    assert_eq!(promote.method, "PUT");

    app.update(
        Event::PromoteUserResponse {
            id: UserId::new("8"),
            result: respond(200, json!({ "msg": "promoted" })),
        },
        &mut model,
    );
    assert_eq!(model.users[1].role, Role::Admin);
    assert_eq!(model.active_toast.as_ref().unwrap().message, "User promoted to admin");
}

#[test]
fn test_role_change_on_self_updates_session() {
    let app = Tester::default();
    let mut model = admin_with_users(&app);

    let update = app.update(
        Event::RoleChangeRequested {
            id: UserId::new("7"),
            role: Role::User,
        },
        &mut model,
    );
    let patch = update.find_http("/admin/users/7/role").unwrap();
    assert_eq!(patch.method, "PATCH");
    assert_eq!(json_body(patch), json!({ "role": "user" }));

    let update = app.update(
        Event::RoleChangeResponse {
            id: UserId::new("7"),
            role: Role::User,
            result: respond(200, json!({})),
        },
        &mut model,
    );
    assert_eq!(model.role(), Some(Role::User));
    assert_eq!(model.users[0].role, Role::User);
    assert_eq!(model.page, Page::Incidents);
    assert!(update.find_http("/incidents/mine").is_some());
    assert!(update.find_http("/users/points").is_some());
}

#[test]
fn test_role_change_on_other_user_stays_on_admin_page() {
    let app = Tester::default();
    let mut model = admin_with_users(&app);

    let update = app.update(
        Event::RoleChangeResponse {
            id: UserId::new("8"),
            role: Role::Admin,
            result: respond(200, json!({})),
        },
        &mut model,
    );
    assert_eq!(model.role(), Some(Role::Admin));
    assert_eq!(model.users[1].role, Role::Admin);
    assert_eq!(model.page, Page::AdminUsers);
    assert!(update.find_http("/incidents/mine").is_none());
}

#[test]
fn test_admin_cannot_delete_self() {
    let app = Tester::default();
    let mut model = admin_with_users(&app);

    let update = app.update(Event::DeleteUserRequested { id: UserId::new("7") }, &mut model);
    assert!(update.http().is_empty());
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::InvalidState);

    let update = app.update(Event::DeleteUserRequested { id: UserId::new("9") }, &mut model);
    assert_eq!(update.find_http("/users/9").unwrap().method, "DELETE");
    app.update(
        Event::DeleteUserResponse {
            id: UserId::new("9"),
            result: respond(200, json!({ "msg": "deleted" })),
        },
        &mut model,
    );
    let ids: Vec<&str> = model.users.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["7", "8"]);
}

#[test]
fn test_citizen_cannot_manage_users() {
    let app = Tester::default();
    let mut model = signed_in("user");

    let update = app.update(Event::PromoteUserRequested { id: UserId::new("8") }, &mut model);
    assert!(update.http().is_empty());
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::Authorization);
}

#[test]
fn test_points_response_updates_user() {
    let app = Tester::default();
    let mut model = signed_in("user");

    app.update(
        Event::PointsResponse(respond(200, json!({ "total_points": 180, "rank": 4 }))),
        &mut model,
    );
    let points = model.points.unwrap();
    assert_eq!(points.points, 180);
    assert_eq!(points.available_points, 180);
    assert_eq!(points.rank, Some(4));
    assert_eq!(model.user.as_ref().unwrap().points, 180);
}

#[test]
fn test_redeem_requires_enough_points() {
    let app = Tester::default();
    let mut model = signed_in("user");
    model.points = Some(PointsSummary {
        points: 90,
        available_points: 90,
        rank: None,
    });

    // Coffee Voucher costs 100.
    let update = app.update(Event::RedeemRequested { reward_id: 1 }, &mut model);
    assert!(update.http().is_empty());
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::Validation);

    let update = app.update(Event::RedeemRequested { reward_id: 99 }, &mut model);
    assert!(update.http().is_empty());
    assert_eq!(model.active_error.as_ref().unwrap().kind, ErrorKind::NotFound);
}

#[test]
fn test_redeem_deducts_points() {
    let app = Tester::default();
    let mut model = signed_in("user");
    model.points = Some(PointsSummary {
        points: 300,
        available_points: 300,
        rank: None,
    });

    let update = app.update(Event::RedeemRequested { reward_id: 8 }, &mut model);
    assert!(model.is_loading);
    let body = json_body(update.find_http("/users/redeem").unwrap());
    assert_eq!(body, json!({ "reward": "Charity Donation", "reward_id": 8, "points": 50 }));

    let update = app.update(
        Event::RedeemResponse {
            reward_id: 8,
            result: respond(200, json!({ "msg": "ok" })),
        },
        &mut model,
    );
    assert!(!model.is_loading);
    assert_eq!(model.points.unwrap().available_points, 250);
    assert!(model
        .active_toast
        .as_ref()
        .unwrap()
        .message
        .starts_with("Successfully redeemed Charity Donation"));
    assert!(update.find_http("/users/points").is_some());
}

#[test]
fn test_redeem_failure_keeps_balance() {
    let app = Tester::default();
    let mut model = signed_in("user");
    model.points = Some(PointsSummary {
        points: 300,
        available_points: 300,
        rank: None,
    });
    model.is_loading = true;

    app.update(
        Event::RedeemResponse {
            reward_id: 3,
            result: respond(500, json!({})),
        },
        &mut model,
    );
    assert!(!model.is_loading);
    assert_eq!(model.points.unwrap().available_points, 300);
    assert_eq!(model.active_error.as_ref().unwrap().message, REDEEM_FAILED);
}

#[test]
fn test_leaderboard_query_change_drops_stale_results() {
    let app = Tester::default();
    let mut model = signed_in("user");
    let all_time = LeaderboardQuery::default();
    let weekly = LeaderboardQuery {
        timeframe: LeaderboardTimeframe::Week,
        top: 5,
    };

    let update = app.update(Event::LeaderboardQueryChanged(weekly), &mut model);
    let request = update.find_http("/users/leaderboard").unwrap();
    assert!(request.url.ends_with("timeframe=week&top=5"));
    let keys: Vec<String> = update.kv_keys();
    assert_eq!(keys, vec!["settings:preferences"]);

    app.update(
        Event::LeaderboardResponse {
            query: all_time,
            result: respond(200, json!([{ "id": 1, "name": "Old", "points": 999 }])),
        },
        &mut model,
    );
    assert!(model.leaderboard.is_empty());

    app.update(
        Event::LeaderboardResponse {
            query: weekly,
            result: respond(200, json!({ "data": [{ "id": 7, "username": "User 7", "points": 40 }] })),
        },
        &mut model,
    );
    assert_eq!(model.leaderboard.len(), 1);
    assert_eq!(model.leaderboard[0].name, "User 7");
}
