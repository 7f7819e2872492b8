//! Landing page, dashboard, static pages, leaderboard and public profiles.

use axum::{
    Router,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use chrono::Utc;
use tower_cookies::Cookies;

use crate::{
    model::{
        CrudRepository, ResourceTyped,
        entity::{Completion, DailyBriefing, Enrollment, LeaderboardRow, UserEntity},
        progress,
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult,
        views::{
            self, BadgeView, CourseProgressView, DashboardPage, ExplorerPage, FaqPage, Layout,
            LeaderView, LeaderboardPage, ProfilePage, SupportPage,
        },
    },
};

const LEADERBOARD_SIZE: i64 = 50;

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(home_handler))
        .route("/dashboard", get(|| async { Redirect::to("/") }))
        .route("/faq", get(faq_handler))
        .route("/support", get(support_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/{handle}", get(profile_handler))
        .with_state(state)
}

/// Guests get the explorer page, users their dashboard.
#[tracing::instrument(skip_all)]
pub(crate) async fn home_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<Response> {
    let fact = DailyBriefing::current(state.pool(), &AuthenticatedUser::admin())
        .await
        .map_err(|e| WebError::resource_fetch_error(DailyBriefing::get_resource_type(), e))?
        .content()
        .to_string();

    let Some(user) = ctx.maybe_user() else {
        let page = ExplorerPage {
            layout: Layout::build(&state, &ctx, &cookies, "Explore").await,
            fact,
        };
        return Ok(views::render(&page)?.into_response());
    };

    let mut entity = UserEntity::find_by_id(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or(WebError::auth_required())?;

    let streak = progress::decay_streak(state.pool(), &mut entity, Utc::now())
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    let enrolled_count = Enrollment::count_for_user(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;
    let completed_count = Completion::count_for_user(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Completion::get_resource_type(), e))?;
    let courses = Enrollment::list_for_user(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;

    let page = DashboardPage {
        layout: Layout::build(&state, &ctx, &cookies, "Dashboard").await,
        username: entity.username().to_string(),
        level: entity.level(),
        xp: entity.xp(),
        streak,
        enrolled_count,
        completed_count,
        fact,
        courses: courses.into_iter().map(CourseProgressView::from).collect(),
    };
    Ok(views::render(&page)?.into_response())
}

pub(crate) async fn faq_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let page = FaqPage {
        layout: Layout::build(&state, &ctx, &cookies, "Frequently Asked Questions").await,
    };
    views::render(&page)
}

async fn support_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let page = SupportPage {
        layout: Layout::build(&state, &ctx, &cookies, "Support Center").await,
    };
    views::render(&page)
}

#[tracing::instrument(skip_all)]
async fn leaderboard_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let actor = AuthenticatedUser::admin();
    let rows = UserEntity::leaderboard(state.pool(), &actor, LEADERBOARD_SIZE)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    let me = ctx.maybe_user().map(|u| u.user_id());
    let mut my_rank = 0;
    if let Some(id) = me {
        if let Some(entity) = UserEntity::find_by_id(state.pool(), &actor, id)
            .await
            .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        {
            my_rank = entity
                .rank_of(state.pool())
                .await
                .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;
        }
    }

    let page = LeaderboardPage {
        layout: Layout::build(&state, &ctx, &cookies, "Leaderboard").await,
        rows: leader_views(rows, me),
        my_rank,
    };
    views::render(&page)
}

/// Rank is the 1-based position in leaderboard order.
pub(crate) fn leader_views(rows: Vec<LeaderboardRow>, me: Option<uuid::Uuid>) -> Vec<LeaderView> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| LeaderView {
            rank: i + 1,
            is_me: Some(row.id) == me,
            username: row.username,
            level: row.level,
            xp: row.xp,
            streak: row.streak_count,
        })
        .collect()
}

/// `/@{username}`; any other single-segment path is unknown.
pub(crate) async fn profile_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> WebResult<impl IntoResponse> {
    let Some(username) = handle.strip_prefix('@') else {
        return Err(WebError::resource_not_found(crate::model::ResourceType::Page));
    };

    let actor = AuthenticatedUser::admin();
    let user = UserEntity::find_by_username(state.pool(), &actor, username)
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or(WebError::resource_not_found(UserEntity::get_resource_type()))?;

    let badges = Enrollment::badges_for_user(state.pool(), &actor, user.id())
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;
    let rank = user
        .rank_of(state.pool())
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?;

    let page = ProfilePage {
        layout: Layout::build(&state, &ctx, &cookies, &format!("{}'s Comm-Link", user.username()))
            .await,
        username: user.username().to_string(),
        level: user.level(),
        xp: user.xp(),
        streak: user.streak_count(),
        rank,
        member_since: user.created_at().format("%B %Y").to_string(),
        badges: badges
            .into_iter()
            .map(|b| BadgeView {
                title: b.title,
                subject: b.subject,
            })
            .collect(),
    };
    views::render(&page)
}
