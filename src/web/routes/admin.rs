//! Administration: daily briefing, users, courses, regional prices, modules, quizzes,
//! analytics and broadcasts. Every route requires the admin role.

use axum::{
    Form, Router,
    extract::{Path, Query, State},
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    gamification::percent,
    model::{
        CrudRepository, DatabaseError, PaginatableRepository, ResourceTyped,
        entity::{
            Completion, Course, CourseCreate, CourseModule, CourseModuleCreate, CoursePrice,
            CoursePriceUpsert, DailyBriefing, Enrollment, GLOBAL_REGION, Notification, Quiz,
            QuizCreate, UserEntity, format_price, notification::KIND_SYSTEM,
        },
        quiz_format,
    },
    utils::countries::normalize_code,
    web::{
        AppState, AuthenticatedUser, RequestContext, UserRole, WebError, WebResult, flash,
        middlewares,
        routes::{PaginationQuery, field, home::leader_views, parse_id},
        views::{
            self, AdminAnalyticsPage, AdminBroadcastPage, AdminCourseFormPage,
            AdminCourseModulesPage, AdminCourseRow, AdminCoursesPage, AdminDashboardPage,
            AdminFactPage, AdminModuleFormPage, AdminModuleRow, AdminQuizFormPage, AdminUserRow,
            AdminUsersPage, AnalyticsRow, CourseFormValues, Layout, PriceView,
        },
    },
};

const TOP_LEARNERS: i64 = 10;

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/dashboard", get(dashboard_handler))
        .route("/manage-fact", get(fact_page_handler))
        .route("/update-fact", post(update_fact_handler))
        .route("/manage-users", get(users_handler))
        .route("/user/role", post(user_role_handler))
        .route("/delete-user/{id}", post(delete_user_handler))
        .route("/manage-courses", get(courses_handler))
        .route(
            "/create-course",
            get(create_course_page_handler).post(create_course_handler),
        )
        .route(
            "/edit-course/{id}",
            get(edit_course_page_handler).post(edit_course_handler),
        )
        .route("/delete-course/{id}", post(delete_course_handler))
        .route("/course/{id}/prices", post(set_price_handler))
        .route(
            "/course/{id}/prices/{country}/delete",
            post(delete_price_handler),
        )
        .route("/analytics", get(analytics_handler))
        .route("/course/{id}", get(course_modules_handler))
        .route(
            "/create-module/{id}",
            get(create_module_page_handler).post(create_module_handler),
        )
        .route(
            "/delete-module/{course_id}/{module_id}",
            post(delete_module_handler),
        )
        .route(
            "/modules/{id}/add-quiz",
            get(add_quiz_page_handler).post(add_quiz_handler),
        )
        .route(
            "/quiz/edit/{id}",
            get(edit_quiz_page_handler).post(edit_quiz_handler),
        )
        .route(
            "/broadcast",
            get(broadcast_page_handler).post(broadcast_handler),
        )
        .route_layer(middleware::from_fn(middlewares::require_admin))
        .with_state(state)
}

fn user_error(e: DatabaseError) -> WebError {
    WebError::resource_fetch_error(UserEntity::get_resource_type(), e)
}

fn course_error(e: DatabaseError) -> WebError {
    WebError::resource_fetch_error(Course::get_resource_type(), e)
}

fn module_error(e: DatabaseError) -> WebError {
    WebError::resource_fetch_error(CourseModule::get_resource_type(), e)
}

fn quiz_error(e: DatabaseError) -> WebError {
    WebError::resource_fetch_error(Quiz::get_resource_type(), e)
}

fn price_error(e: DatabaseError) -> WebError {
    WebError::resource_fetch_error(CoursePrice::get_resource_type(), e)
}

/// Parses a decimal amount such as `19.99` into cents. Blank means free.
pub(crate) fn parse_price(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(0);
    }

    let (units, fraction) = raw.split_once('.').unwrap_or((raw, ""));
    if units.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > 2
        || !units.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let units: i64 = if units.is_empty() { 0 } else { units.parse().ok()? };
    let cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().ok()? * 10,
        _ => fraction.parse().ok()?,
    };
    units.checked_mul(100)?.checked_add(cents)
}

fn currency_or_default(raw: &Option<String>) -> String {
    field(raw)
        .map(str::to_uppercase)
        .unwrap_or_else(|| String::from("USD"))
}

async fn find_course(state: &AppState, actor: &AuthenticatedUser, raw: &str) -> WebResult<Course> {
    let id = parse_id(raw, Course::get_resource_type())?;
    Course::find_by_id(state.pool(), actor, id)
        .await
        .map_err(course_error)?
        .ok_or(WebError::resource_not_found(Course::get_resource_type()))
}

async fn find_module(
    state: &AppState,
    actor: &AuthenticatedUser,
    raw: &str,
) -> WebResult<CourseModule> {
    let id = parse_id(raw, CourseModule::get_resource_type())?;
    CourseModule::find_by_id(state.pool(), actor, id)
        .await
        .map_err(module_error)?
        .ok_or(WebError::resource_not_found(CourseModule::get_resource_type()))
}

// dashboard

#[tracing::instrument(skip_all)]
async fn dashboard_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let admin = ctx.user()?;
    let users = UserEntity::count(state.pool(), admin).await.map_err(user_error)?;
    let courses = Course::count(state.pool(), admin).await.map_err(course_error)?;
    let enrollments = Enrollment::count(state.pool(), admin)
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;
    let completions = Completion::count(state.pool(), admin)
        .await
        .map_err(|e| WebError::resource_fetch_error(Completion::get_resource_type(), e))?;

    let page = AdminDashboardPage {
        layout: Layout::build(&state, &ctx, &cookies, "Command Center").await,
        users,
        courses,
        enrollments,
        completions,
    };
    views::render(&page)
}

// daily briefing

#[derive(Debug, Deserialize)]
pub struct FactForm {
    #[serde(rename = "factText")]
    pub fact_text: Option<String>,
}

async fn fact_page_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let admin = ctx.user()?;
    let briefing = DailyBriefing::current(state.pool(), admin)
        .await
        .map_err(|e| WebError::resource_fetch_error(DailyBriefing::get_resource_type(), e))?;

    let page = AdminFactPage {
        layout: Layout::build(&state, &ctx, &cookies, "Daily Briefing").await,
        content: briefing.content().to_string(),
        updated_at: briefing.updated_at().format("%Y-%m-%d %H:%M UTC").to_string(),
    };
    views::render(&page)
}

#[tracing::instrument(skip_all)]
async fn update_fact_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<FactForm>,
) -> WebResult<Redirect> {
    let admin = ctx.user()?;
    let Some(content) = field(&form.fact_text) else {
        flash::error(&cookies, "Fact content cannot be empty.");
        return Ok(Redirect::to("/admin/manage-fact"));
    };

    DailyBriefing::set(state.pool(), admin, content)
        .await
        .map_err(|e| WebError::resource_fetch_error(DailyBriefing::get_resource_type(), e))?;

    flash::success(&cookies, "Daily Discovery fact updated successfully!");
    Ok(Redirect::to("/admin/dashboard"))
}

// users

#[tracing::instrument(skip_all)]
async fn users_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> WebResult<impl IntoResponse> {
    let admin = ctx.user()?;
    let (limit, offset) = pagination.clamped();
    let page = UserEntity::page(state.pool(), admin, limit, offset)
        .await
        .map_err(user_error)?;

    let has_prev = page.has_prev();
    let has_next = page.has_next();
    let view = AdminUsersPage {
        layout: Layout::build(&state, &ctx, &cookies, "Manage Users").await,
        total: page.total,
        limit,
        prev_offset: (offset - limit).max(0),
        next_offset: offset + limit,
        has_prev,
        has_next,
        users: page
            .items
            .into_iter()
            .map(|u| AdminUserRow {
                id: u.id().to_string(),
                is_self: u.id() == admin.user_id(),
                username: u.username().to_string(),
                email: u.email().to_string(),
                role: u.role().to_string(),
                level: u.level(),
                xp: u.xp(),
                verified: u.is_verified(),
            })
            .collect(),
    };
    views::render(&view)
}

#[derive(Debug, Deserialize)]
pub struct RoleForm {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "newRole")]
    pub new_role: String,
}

#[tracing::instrument(skip_all)]
async fn user_role_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<RoleForm>,
) -> WebResult<Redirect> {
    let admin = ctx.user()?;
    let back = Redirect::to("/admin/manage-users");

    let Some(role) = UserRole::parse(form.new_role.trim()) else {
        flash::error(&cookies, "Unknown role.");
        return Ok(back);
    };
    let user_id = parse_id(form.user_id.trim(), UserEntity::get_resource_type())?;
    if user_id == admin.user_id() {
        flash::error(&cookies, "You cannot change your own role!");
        return Ok(back);
    }

    let mut user = UserEntity::find_by_id(state.pool(), admin, user_id)
        .await
        .map_err(user_error)?
        .ok_or(WebError::resource_not_found(UserEntity::get_resource_type()))?;
    user.set_role(state.pool(), role.clone()).await.map_err(user_error)?;

    tracing::info!("{} set role of {} to {role}", admin.username(), user.username());
    flash::success(&cookies, &format!("User role updated to {role}."));
    Ok(back)
}

#[tracing::instrument(skip_all, fields(user = %id))]
async fn delete_user_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Redirect> {
    let admin = ctx.user()?;
    let back = Redirect::to("/admin/manage-users");

    let user_id = parse_id(&id, UserEntity::get_resource_type())?;
    if user_id == admin.user_id() {
        flash::error(&cookies, "You cannot delete your own account via the admin panel.");
        return Ok(back);
    }

    let user = UserEntity::find_by_id(state.pool(), admin, user_id)
        .await
        .map_err(user_error)?
        .ok_or(WebError::resource_not_found(UserEntity::get_resource_type()))?;
    let username = user.username().to_string();
    user.delete(state.pool(), admin).await.map_err(user_error)?;

    tracing::info!("{} deleted user {username}", admin.username());
    flash::success(&cookies, "User deleted successfully.");
    Ok(back)
}

// courses

#[derive(Debug, Default, Deserialize)]
pub struct CourseForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub level: Option<String>,
    pub standard: Option<String>,
    pub region: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
}

impl CourseForm {
    /// Validated course data, or the message to show next to the form.
    fn validate(&self, instructor_id: Option<Uuid>) -> Result<CourseCreate, &'static str> {
        let (Some(title), Some(description), Some(subject), Some(level), Some(standard)) = (
            field(&self.title),
            field(&self.description),
            field(&self.subject),
            field(&self.level),
            field(&self.standard),
        ) else {
            return Err("All course fields including Academic Path are required.");
        };
        let price_cents =
            parse_price(self.price.as_deref().unwrap_or_default()).ok_or("Price must be a positive amount such as 19.99.")?;

        Ok(CourseCreate {
            title: title.to_string(),
            description: description.to_string(),
            subject: subject.to_string(),
            level: level.to_string(),
            standard: standard.to_string(),
            region: field(&self.region)
                .map(str::to_uppercase)
                .unwrap_or_else(|| GLOBAL_REGION.to_string()),
            price_cents,
            currency: currency_or_default(&self.currency),
            instructor_id,
        })
    }

    fn values(&self) -> CourseFormValues {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        CourseFormValues {
            title: text(&self.title),
            description: text(&self.description),
            subject: text(&self.subject),
            level: text(&self.level),
            standard: text(&self.standard),
            region: text(&self.region),
            price: text(&self.price),
            currency: text(&self.currency),
        }
    }
}

fn course_values(course: &Course) -> CourseFormValues {
    CourseFormValues {
        title: course.title().to_string(),
        description: course.description().to_string(),
        subject: course.subject().to_string(),
        level: course.level().to_string(),
        standard: course.standard().to_string(),
        region: course.region().to_string(),
        price: format!("{}.{:02}", course.price_cents() / 100, course.price_cents() % 100),
        currency: course.currency().to_string(),
    }
}

#[tracing::instrument(skip_all)]
async fn courses_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let admin = ctx.user()?;
    let rows = Course::with_instructors(state.pool(), admin)
        .await
        .map_err(course_error)?;

    let page = AdminCoursesPage {
        layout: Layout::build(&state, &ctx, &cookies, "Manage Courses").await,
        courses: rows
            .into_iter()
            .map(|c| AdminCourseRow {
                id: c.id.to_string(),
                price: format_price(c.price_cents, &c.currency),
                title: c.title,
                subject: c.subject,
                level: c.level,
                region: c.region,
                instructor: c.instructor_name.unwrap_or_else(|| String::from("Unassigned")),
                module_count: c.module_count,
            })
            .collect(),
    };
    views::render(&page)
}

async fn course_form_page(
    state: &AppState,
    layout: Layout,
    course: Option<&Course>,
    form: CourseFormValues,
) -> WebResult<Response> {
    let (heading, action, course_id, module_count, prices) = match course {
        None => (
            String::from("Create Course"),
            String::from("/admin/create-course"),
            String::new(),
            0,
            Vec::new(),
        ),
        Some(course) => {
            let actor = AuthenticatedUser::admin();
            let module_count = CourseModule::count_for_course(state.pool(), &actor, course.id())
                .await
                .map_err(module_error)?;
            let prices = CoursePrice::list_for_course(state.pool(), &actor, course.id())
                .await
                .map_err(price_error)?
                .into_iter()
                .map(|p| PriceView {
                    country: p.country().to_string(),
                    price: format_price(p.price_cents(), p.currency()),
                })
                .collect();
            (
                format!("Edit {}", course.title()),
                format!("/admin/edit-course/{}", course.id()),
                course.id().to_string(),
                module_count,
                prices,
            )
        }
    };

    let page = AdminCourseFormPage {
        layout,
        heading,
        action,
        course_id,
        form,
        module_count,
        prices,
    };
    Ok(views::render(&page)?.into_response())
}

async fn create_course_page_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<Response> {
    let layout = Layout::build(&state, &ctx, &cookies, "Create Course").await;
    let form = CourseFormValues {
        region: GLOBAL_REGION.to_string(),
        currency: String::from("USD"),
        ..Default::default()
    };
    course_form_page(&state, layout, None, form).await
}

#[tracing::instrument(skip_all)]
async fn create_course_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<CourseForm>,
) -> WebResult<Response> {
    let admin = ctx.user()?;
    let data = match form.validate(Some(admin.user_id())) {
        Ok(data) => data,
        Err(message) => {
            let layout = Layout::build(&state, &ctx, &cookies, "Create Course")
                .await
                .with_error(message);
            return course_form_page(&state, layout, None, form.values()).await;
        }
    };

    let course = Course::create(state.pool(), admin, data)
        .await
        .map_err(course_error)?;

    tracing::info!("{} created course {}", admin.username(), course.title());
    flash::success(&cookies, &format!("Course \"{}\" created successfully.", course.title()));
    Ok(Redirect::to("/admin/manage-courses").into_response())
}

async fn edit_course_page_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Response> {
    let admin = ctx.user()?;
    let course = find_course(&state, admin, &id).await?;
    let layout = Layout::build(&state, &ctx, &cookies, "Edit Course").await;
    course_form_page(&state, layout, Some(&course), course_values(&course)).await
}

#[tracing::instrument(skip_all, fields(course = %id))]
async fn edit_course_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<CourseForm>,
) -> WebResult<Response> {
    let admin = ctx.user()?;
    let course = find_course(&state, admin, &id).await?;

    let data = match form.validate(course.instructor_id()) {
        Ok(data) => data,
        Err(message) => {
            let layout = Layout::build(&state, &ctx, &cookies, "Edit Course")
                .await
                .with_error(message);
            return course_form_page(&state, layout, Some(&course), form.values()).await;
        }
    };

    let course = course
        .update(state.pool(), admin, data)
        .await
        .map_err(course_error)?;

    flash::success(&cookies, &format!("Course \"{}\" updated successfully.", course.title()));
    Ok(Redirect::to("/admin/manage-courses").into_response())
}

#[tracing::instrument(skip_all, fields(course = %id))]
async fn delete_course_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Redirect> {
    let admin = ctx.user()?;
    let course = find_course(&state, admin, &id).await?;
    let title = course.title().to_string();
    course.delete(state.pool(), admin).await.map_err(course_error)?;

    tracing::info!("{} deleted course {title}", admin.username());
    flash::success(&cookies, "Course deleted successfully.");
    Ok(Redirect::to("/admin/manage-courses"))
}

// regional prices

#[derive(Debug, Deserialize)]
pub struct PriceForm {
    pub country: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
}

#[tracing::instrument(skip_all, fields(course = %id))]
async fn set_price_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<PriceForm>,
) -> WebResult<Redirect> {
    let admin = ctx.user()?;
    let course = find_course(&state, admin, &id).await?;
    let back = Redirect::to(&format!("/admin/edit-course/{}", course.id()));

    let Some(country) = form.country.as_deref().and_then(normalize_code) else {
        flash::error(&cookies, "Country must be a two-letter code.");
        return Ok(back);
    };
    let Some(price_cents) = field(&form.price).and_then(parse_price) else {
        flash::error(&cookies, "Price must be a positive amount such as 19.99.");
        return Ok(back);
    };

    CoursePrice::upsert(
        state.pool(),
        admin,
        course.id(),
        CoursePriceUpsert {
            country: country.clone(),
            price_cents,
            currency: currency_or_default(&form.currency),
        },
    )
    .await
    .map_err(price_error)?;

    flash::success(&cookies, &format!("Price for {country} saved."));
    Ok(back)
}

#[tracing::instrument(skip_all, fields(course = %id))]
async fn delete_price_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path((id, country)): Path<(String, String)>,
) -> WebResult<Redirect> {
    let admin = ctx.user()?;
    let course = find_course(&state, admin, &id).await?;

    let removed = CoursePrice::delete_for(state.pool(), admin, course.id(), &country)
        .await
        .map_err(price_error)?;
    if removed {
        flash::success(&cookies, &format!("Price for {} removed.", country.to_uppercase()));
    } else {
        flash::error(&cookies, "No price override for that country.");
    }
    Ok(Redirect::to(&format!("/admin/edit-course/{}", course.id())))
}

// analytics

#[tracing::instrument(skip_all)]
async fn analytics_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let admin = ctx.user()?;
    let stats = Course::stats(state.pool(), admin).await.map_err(course_error)?;
    let learners = UserEntity::leaderboard(state.pool(), admin, TOP_LEARNERS)
        .await
        .map_err(user_error)?;

    let page = AdminAnalyticsPage {
        layout: Layout::build(&state, &ctx, &cookies, "Site Analytics").await,
        courses: stats
            .into_iter()
            .map(|s| AnalyticsRow {
                rate: percent(s.completed, s.enrollments),
                title: s.title,
                enrollments: s.enrollments,
                completed: s.completed,
            })
            .collect(),
        learners: leader_views(learners, None),
    };
    views::render(&page)
}

// modules

#[tracing::instrument(skip_all, fields(course = %id))]
async fn course_modules_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<impl IntoResponse> {
    let admin = ctx.user()?;
    let course = find_course(&state, admin, &id).await?;
    let modules = CourseModule::list_with_quiz(state.pool(), admin, course.id())
        .await
        .map_err(module_error)?;

    let page = AdminCourseModulesPage {
        layout: Layout::build(&state, &ctx, &cookies, course.title()).await,
        course_id: course.id().to_string(),
        course_title: course.title().to_string(),
        modules: modules
            .into_iter()
            .map(|m| AdminModuleRow {
                id: m.id.to_string(),
                title: m.module_title,
                order: m.module_order,
                quiz_id: m.quiz_id.map(|q| q.to_string()).unwrap_or_default(),
                quiz_title: m.quiz_title.unwrap_or_default(),
                question_count: m.question_count,
            })
            .collect(),
    };
    views::render(&page)
}

#[derive(Debug, Default, Deserialize)]
pub struct ModuleForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub module_number: Option<String>,
}

async fn create_module_page_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<impl IntoResponse> {
    let admin = ctx.user()?;
    let course = find_course(&state, admin, &id).await?;
    let next_order = CourseModule::count_for_course(state.pool(), admin, course.id())
        .await
        .map_err(module_error)?
        + 1;

    let page = AdminModuleFormPage {
        layout: Layout::build(&state, &ctx, &cookies, "New Module").await,
        course_id: course.id().to_string(),
        course_title: course.title().to_string(),
        title: String::new(),
        description: String::new(),
        video_url: String::new(),
        order: next_order.to_string(),
    };
    views::render(&page)
}

#[tracing::instrument(skip_all, fields(course = %id))]
async fn create_module_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<ModuleForm>,
) -> WebResult<Response> {
    let admin = ctx.user()?;
    let course = find_course(&state, admin, &id).await?;

    let order = field(&form.module_number).and_then(|v| v.parse::<i64>().ok());
    let (Some(title), Some(content), Some(order)) =
        (field(&form.title), field(&form.description), order)
    else {
        let page = AdminModuleFormPage {
            layout: Layout::build(&state, &ctx, &cookies, "New Module")
                .await
                .with_error("Title, Description, and Order are required."),
            course_id: course.id().to_string(),
            course_title: course.title().to_string(),
            title: form.title.unwrap_or_default(),
            description: form.description.unwrap_or_default(),
            video_url: form.video_url.unwrap_or_default(),
            order: form.module_number.unwrap_or_default(),
        };
        return Ok(views::render(&page)?.into_response());
    };

    let module = CourseModule::create(
        state.pool(),
        admin,
        CourseModuleCreate {
            course_id: course.id(),
            module_title: title.to_string(),
            module_content: content.to_string(),
            video_url: field(&form.video_url).map(str::to_string),
            module_order: order,
        },
    )
    .await
    .map_err(module_error)?;

    flash::success(&cookies, &format!("Module \"{}\" created successfully!", module.title()));
    Ok(Redirect::to(&format!("/admin/course/{}", course.id())).into_response())
}

#[tracing::instrument(skip_all, fields(module = %module_id))]
async fn delete_module_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> WebResult<Redirect> {
    let admin = ctx.user()?;
    let course = find_course(&state, admin, &course_id).await?;
    let module = find_module(&state, admin, &module_id).await?;
    if module.course_id() != course.id() {
        return Err(WebError::resource_not_found(CourseModule::get_resource_type()));
    }

    module.delete(state.pool(), admin).await.map_err(module_error)?;
    flash::success(&cookies, "Module deleted successfully.");
    Ok(Redirect::to(&format!("/admin/course/{}", course.id())))
}

// quizzes

#[derive(Debug, Deserialize)]
pub struct QuizForm {
    pub quiz_title: Option<String>,
    pub questions: Option<String>,
}

impl QuizForm {
    fn validate(&self) -> Result<(String, Vec<quiz_format::ParsedQuestion>), String> {
        let Some(title) = field(&self.quiz_title) else {
            return Err(String::from("Quiz title is required."));
        };
        let questions = quiz_format::parse(self.questions.as_deref().unwrap_or_default())
            .map_err(|e| e.to_string())?;
        Ok((title.to_string(), questions))
    }
}

async fn add_quiz_page_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Response> {
    let admin = ctx.user()?;
    let module = find_module(&state, admin, &id).await?;

    if let Some(quiz) = Quiz::find_for_module(state.pool(), admin, module.id())
        .await
        .map_err(quiz_error)?
    {
        return Ok(Redirect::to(&format!("/admin/quiz/edit/{}", quiz.id())).into_response());
    }

    let page = AdminQuizFormPage {
        layout: Layout::build(&state, &ctx, &cookies, "Deploy Quiz").await,
        heading: String::from("Deploy Quiz"),
        action: format!("/admin/modules/{}/add-quiz", module.id()),
        course_id: module.course_id().to_string(),
        module_title: module.title().to_string(),
        title: String::new(),
        body: String::new(),
    };
    Ok(views::render(&page)?.into_response())
}

#[tracing::instrument(skip_all, fields(module = %id))]
async fn add_quiz_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<QuizForm>,
) -> WebResult<Response> {
    let admin = ctx.user()?;
    let module = find_module(&state, admin, &id).await?;
    let modules_page = format!("/admin/course/{}", module.course_id());

    let (title, questions) = match form.validate() {
        Ok(parsed) => parsed,
        Err(message) => {
            let page = AdminQuizFormPage {
                layout: Layout::build(&state, &ctx, &cookies, "Deploy Quiz")
                    .await
                    .with_error(&format!("Failed to save quiz: {message}")),
                heading: String::from("Deploy Quiz"),
                action: format!("/admin/modules/{}/add-quiz", module.id()),
                course_id: module.course_id().to_string(),
                module_title: module.title().to_string(),
                title: form.quiz_title.unwrap_or_default(),
                body: form.questions.unwrap_or_default(),
            };
            return Ok(views::render(&page)?.into_response());
        }
    };

    let data = QuizCreate {
        module_id: module.id(),
        quiz_title: title,
        questions,
    };
    match Quiz::create(state.pool(), admin, data).await {
        Ok(quiz) => {
            tracing::info!("quiz {} deployed on module {}", quiz.title(), module.title());
            flash::success(&cookies, "Quiz deployed successfully!");
        }
        Err(e) if e.is_unique_violation() => {
            flash::error(&cookies, "This module already has a quiz.");
        }
        Err(e) => return Err(quiz_error(e)),
    }
    Ok(Redirect::to(&modules_page).into_response())
}

async fn find_quiz(state: &AppState, actor: &AuthenticatedUser, raw: &str) -> WebResult<(Quiz, CourseModule)> {
    let id = parse_id(raw, Quiz::get_resource_type())?;
    let quiz = Quiz::find_by_id(state.pool(), actor, id)
        .await
        .map_err(quiz_error)?
        .ok_or(WebError::resource_not_found(Quiz::get_resource_type()))?;
    let module = CourseModule::find_by_id(state.pool(), actor, quiz.module_id())
        .await
        .map_err(module_error)?
        .ok_or(WebError::resource_not_found(CourseModule::get_resource_type()))?;
    Ok((quiz, module))
}

async fn edit_quiz_page_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<impl IntoResponse> {
    let admin = ctx.user()?;
    let (quiz, module) = find_quiz(&state, admin, &id).await?;
    let questions = quiz.parsed_questions(state.pool()).await.map_err(quiz_error)?;

    let page = AdminQuizFormPage {
        layout: Layout::build(&state, &ctx, &cookies, "Edit Quiz").await,
        heading: String::from("Edit Quiz"),
        action: format!("/admin/quiz/edit/{}", quiz.id()),
        course_id: module.course_id().to_string(),
        module_title: module.title().to_string(),
        title: quiz.title().to_string(),
        body: quiz_format::render(&questions),
    };
    views::render(&page)
}

#[tracing::instrument(skip_all, fields(quiz = %id))]
async fn edit_quiz_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<QuizForm>,
) -> WebResult<Response> {
    let admin = ctx.user()?;
    let (quiz, module) = find_quiz(&state, admin, &id).await?;

    let (title, questions) = match form.validate() {
        Ok(parsed) => parsed,
        Err(message) => {
            let page = AdminQuizFormPage {
                layout: Layout::build(&state, &ctx, &cookies, "Edit Quiz")
                    .await
                    .with_error(&format!("Failed to save quiz: {message}")),
                heading: String::from("Edit Quiz"),
                action: format!("/admin/quiz/edit/{}", quiz.id()),
                course_id: module.course_id().to_string(),
                module_title: module.title().to_string(),
                title: form.quiz_title.unwrap_or_default(),
                body: form.questions.unwrap_or_default(),
            };
            return Ok(views::render(&page)?.into_response());
        }
    };

    quiz.replace(state.pool(), admin, title, &questions)
        .await
        .map_err(quiz_error)?;

    flash::success(&cookies, "Quiz updated successfully!");
    Ok(Redirect::to(&format!("/admin/course/{}", module.course_id())).into_response())
}

// broadcast

#[derive(Debug, Deserialize)]
pub struct BroadcastForm {
    pub title: Option<String>,
    pub message: Option<String>,
    pub kind: Option<String>,
}

async fn broadcast_page_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    let page = AdminBroadcastPage {
        layout: Layout::build(&state, &ctx, &cookies, "Global Transmission").await,
        title: String::new(),
        message: String::new(),
        kind: KIND_SYSTEM.to_string(),
    };
    views::render(&page)
}

#[tracing::instrument(skip_all)]
async fn broadcast_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Form(form): Form<BroadcastForm>,
) -> WebResult<Response> {
    let admin = ctx.user()?;
    let kind = field(&form.kind).unwrap_or(KIND_SYSTEM).to_lowercase();

    let (Some(title), Some(message)) = (field(&form.title), field(&form.message)) else {
        let page = AdminBroadcastPage {
            layout: Layout::build(&state, &ctx, &cookies, "Global Transmission")
                .await
                .with_error("Title and message are required."),
            title: form.title.unwrap_or_default(),
            message: form.message.unwrap_or_default(),
            kind,
        };
        return Ok(views::render(&page)?.into_response());
    };

    let recipients = Notification::broadcast(state.pool(), admin, &kind, title, message)
        .await
        .map_err(|e| WebError::resource_fetch_error(Notification::get_resource_type(), e))?;

    tracing::info!("{} broadcast \"{title}\" to {recipients} users", admin.username());
    flash::success(
        &cookies,
        &format!("Broadcast successful: Signal transmitted to {recipients} users."),
    );
    Ok(Redirect::to("/admin/dashboard").into_response())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn prices_are_parsed_into_cents() {
        assert_eq!(parse_price(""), Some(0));
        assert_eq!(parse_price("19.99"), Some(1999));
        assert_eq!(parse_price("19.9"), Some(1990));
        assert_eq!(parse_price("7"), Some(700));
        assert_eq!(parse_price(".5"), Some(50));
        assert_eq!(parse_price("-3"), None);
        assert_eq!(parse_price("1.234"), None);
        assert_eq!(parse_price("abc"), None);
        assert_eq!(parse_price("."), None);
    }

    #[test]
    fn course_form_requires_core_fields() {
        let form = CourseForm {
            title: Some(String::from("Stellar Nurseries")),
            description: Some(String::from("Where stars are born")),
            subject: Some(String::from("Astronomy")),
            level: Some(String::from("Beginner")),
            standard: Some(String::from("High School")),
            region: Some(String::from("in")),
            price: Some(String::from("4.50")),
            currency: None,
        };
        let data = form.validate(None).unwrap();
        assert_eq!(data.region, "IN");
        assert_eq!(data.price_cents, 450);
        assert_eq!(data.currency, "USD");

        let missing = CourseForm {
            standard: None,
            ..form
        };
        assert!(missing.validate(None).is_err());
        assert_eq!(CourseForm::default().validate(None).unwrap_err(), "All course fields including Academic Path are required.");
    }

    #[test]
    fn quiz_form_reports_format_errors() {
        let form = QuizForm {
            quiz_title: Some(String::from("Orbits")),
            questions: Some(String::from("What orbits Earth?\n*Moon")),
        };
        assert_eq!(
            form.validate().unwrap_err(),
            "Question 1 needs at least two options."
        );
    }
}
