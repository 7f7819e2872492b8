//! Catalog, enrollment, module progression and quizzes.

use std::collections::HashMap;

use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tower_cookies::Cookies;
use uuid::Uuid;

use crate::{
    gamification::{ScoredQuestion, percent, score_quiz},
    model::{
        CrudRepository, DatabaseError, ResourceTyped,
        entity::{
            Completion, Course, CourseFilter, CourseModule, CoursePrice, Enrollment, Quiz,
            QuizAttempt, UserEntity, format_price, neighbours,
            notification::KIND_PROGRESS,
        },
        notify::notify,
        progress,
    },
    web::{
        AppState, AuthenticatedUser, RequestContext, WebError, WebResult, flash,
        routes::{parse_id, viewer_country},
        views::{
            self, CourseCardView, CourseDetailPage, CoursesPage, Layout, ModulePage, OptionView,
            QuestionView, QuizResultPage, SyllabusItem, TakeQuizPage,
        },
    },
};

pub fn routes<S>(state: AppState) -> Router<S> {
    Router::new()
        .route("/", get(catalog_handler))
        .route("/course/{id}", get(course_detail_handler))
        .route("/enroll/{id}", post(enroll_handler))
        .route("/course/{course_id}/module/{module_id}", get(module_handler))
        .route(
            "/course/{course_id}/module/{module_id}/complete",
            post(complete_module_handler),
        )
        .route("/quiz/{id}", get(take_quiz_handler))
        .route("/quiz/{id}/submit", post(submit_quiz_handler))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub search: Option<String>,
    pub subject: Option<String>,
    pub level: Option<String>,
    pub standard: Option<String>,
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

fn card(course: &Course, price: Option<&CoursePrice>) -> CourseCardView {
    let price = match price {
        Some(p) => format_price(p.price_cents(), p.currency()),
        None => format_price(course.price_cents(), course.currency()),
    };
    CourseCardView {
        id: course.id().to_string(),
        title: course.title().to_string(),
        description: course.description().to_string(),
        subject: course.subject().to_string(),
        level: course.level().to_string(),
        standard: course.standard().to_string(),
        region: course.region().to_string(),
        price,
    }
}

async fn find_course(state: &AppState, actor: &AuthenticatedUser, id: Uuid) -> WebResult<Course> {
    Course::find_by_id(state.pool(), actor, id)
        .await
        .map_err(course_error)?
        .ok_or(WebError::resource_not_found(Course::get_resource_type()))
}

/// Module `module_id` of course `course_id`; a module of another course is not found.
async fn find_module(
    state: &AppState,
    actor: &AuthenticatedUser,
    course_id: Uuid,
    module_id: Uuid,
) -> WebResult<CourseModule> {
    CourseModule::find_by_id(state.pool(), actor, module_id)
        .await
        .map_err(module_error)?
        .filter(|m| m.course_id() == course_id)
        .ok_or(WebError::resource_not_found(CourseModule::get_resource_type()))
}

async fn is_enrolled(state: &AppState, user: &AuthenticatedUser, course_id: Uuid) -> WebResult<bool> {
    let found = Enrollment::find(state.pool(), user, user.user_id(), course_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Enrollment::get_resource_type(), e))?;
    Ok(found.is_some())
}

async fn load_user(state: &AppState, user: &AuthenticatedUser) -> WebResult<UserEntity> {
    UserEntity::find_by_id(state.pool(), user, user.user_id())
        .await
        .map_err(|e| WebError::resource_fetch_error(UserEntity::get_resource_type(), e))?
        .ok_or(WebError::auth_required())
}

#[tracing::instrument(skip_all)]
async fn catalog_handler(
    ctx: RequestContext,
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> WebResult<impl IntoResponse> {
    let actor = AuthenticatedUser::admin();
    let country = viewer_country(&state, &ctx, &headers).await;

    let filter = CourseFilter {
        search: query.search.clone(),
        subject: query.subject.clone(),
        level: query.level.clone(),
        standard: query.standard.clone(),
        country: country.clone(),
    };
    let courses = Course::filtered(state.pool(), &actor, &filter)
        .await
        .map_err(course_error)?;
    let subjects = Course::distinct_subjects(state.pool(), &actor)
        .await
        .map_err(course_error)?;

    let prices = match &country {
        Some(country) => CoursePrice::map_for_country(state.pool(), &actor, country)
            .await
            .map_err(|e| WebError::resource_fetch_error(CoursePrice::get_resource_type(), e))?,
        None => HashMap::new(),
    };

    let page = CoursesPage {
        layout: Layout::build(&state, &ctx, &cookies, "Course Catalog").await,
        courses: courses
            .iter()
            .map(|c| card(c, prices.get(&c.id())))
            .collect(),
        subjects,
        search: query.search.unwrap_or_default(),
        subject: query.subject.unwrap_or_default(),
        level: query.level.unwrap_or_default(),
        standard: query.standard.unwrap_or_default(),
        country: country.unwrap_or_default(),
        view_global: ctx.maybe_user().is_some_and(|u| u.view_global_always()),
    };
    views::render(&page)
}

#[tracing::instrument(skip_all, fields(course = %id))]
async fn course_detail_handler(
    ctx: RequestContext,
    cookies: Cookies,
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<impl IntoResponse> {
    let actor = AuthenticatedUser::admin();
    let id = parse_id(&id, Course::get_resource_type())?;
    let course = find_course(&state, &actor, id).await?;

    let modules = CourseModule::list_with_quiz(state.pool(), &actor, id)
        .await
        .map_err(module_error)?;

    let (enrolled, completed_ids) = match ctx.maybe_user() {
        Some(user) => {
            let enrolled = is_enrolled(&state, user, id).await?;
            let completed = Completion::completed_module_ids(state.pool(), user, user.user_id(), id)
                .await
                .map_err(|e| WebError::resource_fetch_error(Completion::get_resource_type(), e))?;
            (enrolled, completed)
        }
        None => (false, Vec::new()),
    };
    let can_open_modules = enrolled || ctx.maybe_user().is_some_and(|u| u.is_admin());

    let price = match viewer_country(&state, &ctx, &headers).await {
        Some(country) => CoursePrice::find_for(state.pool(), &actor, id, &country)
            .await
            .map_err(|e| WebError::resource_fetch_error(CoursePrice::get_resource_type(), e))?,
        None => None,
    };

    let done = modules
        .iter()
        .filter(|m| completed_ids.contains(&m.id))
        .count() as i64;
    let progress = percent(done, modules.len() as i64);

    let page = CourseDetailPage {
        layout: Layout::build(&state, &ctx, &cookies, course.title()).await,
        course: card(&course, price.as_ref()),
        enrolled,
        can_open_modules,
        progress,
        modules: modules
            .into_iter()
            .map(|m| SyllabusItem {
                completed: completed_ids.contains(&m.id),
                id: m.id.to_string(),
                title: m.module_title,
                order: m.module_order,
                quiz_id: m.quiz_id.map(|q| q.to_string()).unwrap_or_default(),
                quiz_title: m.quiz_title.unwrap_or_default(),
            })
            .collect(),
    };
    views::render(&page)
}

#[tracing::instrument(skip_all, fields(course = %id))]
async fn enroll_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<Redirect> {
    let Some(user) = ctx.maybe_user() else {
        flash::error(&cookies, "Please sign in to join this research mission.");
        return Ok(Redirect::to("/auth/login"));
    };

    let id = parse_id(&id, Course::get_resource_type())?;
    let course = find_course(&state, user, id).await?;
    let course_page = format!("/courses/course/{}", course.id());

    if is_enrolled(&state, user, id).await? {
        flash::error(&cookies, "Already part of this mission.");
        return Ok(Redirect::to(&course_page));
    }

    match Enrollment::create(state.pool(), user, user.user_id(), id).await {
        Ok(_) => {}
        Err(e) if e.is_unique_violation() => {
            flash::error(&cookies, "Already part of this mission.");
            return Ok(Redirect::to(&course_page));
        }
        Err(e) => return Err(WebError::resource_fetch_error(Enrollment::get_resource_type(), e)),
    }

    notify(
        state.pool(),
        user.user_id(),
        KIND_PROGRESS,
        "Mission Accepted",
        &format!("Your journey into \"{}\" has begun.", course.title()),
    )
    .await;
    tracing::info!("{} enrolled in {}", user.username(), course.title());

    flash::success(&cookies, "Enrollment successful!");
    Ok(Redirect::to("/"))
}

#[tracing::instrument(skip_all, fields(module = %module_id))]
async fn module_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> WebResult<Response> {
    let user = ctx.user()?;
    let course_id = parse_id(&course_id, Course::get_resource_type())?;
    let module_id = parse_id(&module_id, CourseModule::get_resource_type())?;

    let course = find_course(&state, user, course_id).await?;
    let module = find_module(&state, user, course_id, module_id).await?;

    if !user.is_admin() && !is_enrolled(&state, user, course_id).await? {
        flash::error(&cookies, "Enroll in this course to access its modules.");
        return Ok(Redirect::to(&format!("/courses/course/{course_id}")).into_response());
    }

    let syllabus = CourseModule::list_for_course(state.pool(), user, course_id)
        .await
        .map_err(module_error)?;
    let (prev, next) = neighbours(&syllabus, module_id);

    let quiz = Quiz::find_for_module(state.pool(), user, module_id)
        .await
        .map_err(quiz_error)?;
    let completed = Completion::find(state.pool(), user, user.user_id(), module_id)
        .await
        .map_err(|e| WebError::resource_fetch_error(Completion::get_resource_type(), e))?
        .is_some();

    let page = ModulePage {
        layout: Layout::build(&state, &ctx, &cookies, module.title()).await,
        course_id: course_id.to_string(),
        course_title: course.title().to_string(),
        module_id: module_id.to_string(),
        title: module.title().to_string(),
        content: module.content().to_string(),
        video_url: module.video_url().unwrap_or_default().to_string(),
        quiz_id: quiz.map(|q| q.id().to_string()).unwrap_or_default(),
        prev_id: prev.map(|id| id.to_string()).unwrap_or_default(),
        next_id: next.map(|id| id.to_string()).unwrap_or_default(),
        completed,
    };
    Ok(views::render(&page)?.into_response())
}

#[tracing::instrument(skip_all, fields(module = %module_id))]
async fn complete_module_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path((course_id, module_id)): Path<(String, String)>,
) -> WebResult<Redirect> {
    let user = ctx.user()?;
    let course_id = parse_id(&course_id, Course::get_resource_type())?;
    let module_id = parse_id(&module_id, CourseModule::get_resource_type())?;
    let module = find_module(&state, user, course_id, module_id).await?;

    if !user.is_admin() && !is_enrolled(&state, user, course_id).await? {
        flash::error(&cookies, "Enroll in this course to access its modules.");
        return Ok(Redirect::to(&format!("/courses/course/{course_id}")));
    }

    let mut entity = load_user(&state, user).await?;
    let outcome = progress::complete_module(state.pool(), &mut entity, &module, None, Utc::now())
        .await
        .map_err(module_error)?;

    if outcome.course_completed {
        flash::success(&cookies, "Course completed! Mastery badge unlocked.");
    } else if outcome.first_time {
        flash::success(&cookies, "Module completed! +100 XP");
    }

    let syllabus = CourseModule::list_for_course(state.pool(), user, course_id)
        .await
        .map_err(module_error)?;
    match neighbours(&syllabus, module_id).1 {
        Some(next) => Ok(Redirect::to(&format!(
            "/courses/course/{course_id}/module/{next}"
        ))),
        None => Ok(Redirect::to("/dashboard")),
    }
}

async fn find_quiz(state: &AppState, actor: &AuthenticatedUser, raw: &str) -> WebResult<Quiz> {
    let id = parse_id(raw, Quiz::get_resource_type())?;
    Quiz::find_by_id(state.pool(), actor, id)
        .await
        .map_err(quiz_error)?
        .ok_or(WebError::resource_not_found(Quiz::get_resource_type()))
}

async fn quiz_module(state: &AppState, actor: &AuthenticatedUser, quiz: &Quiz) -> WebResult<CourseModule> {
    CourseModule::find_by_id(state.pool(), actor, quiz.module_id())
        .await
        .map_err(module_error)?
        .ok_or(WebError::resource_not_found(CourseModule::get_resource_type()))
}

#[tracing::instrument(skip_all, fields(quiz = %id))]
async fn take_quiz_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = find_quiz(&state, user, &id).await?;
    let module = quiz_module(&state, user, &quiz).await?;

    let mut questions = Vec::new();
    for (i, q) in quiz.questions(state.pool()).await.map_err(quiz_error)?.into_iter().enumerate() {
        let options = q.options().map_err(quiz_error)?;
        questions.push(QuestionView {
            id: q.id().to_string(),
            number: i + 1,
            text: q.text().to_string(),
            options: options
                .into_iter()
                .enumerate()
                .map(|(index, text)| OptionView { index, text })
                .collect(),
        });
    }

    let page = TakeQuizPage {
        layout: Layout::build(&state, &ctx, &cookies, quiz.title()).await,
        quiz_id: quiz.id().to_string(),
        title: quiz.title().to_string(),
        module_title: module.title().to_string(),
        started_at: Utc::now().timestamp(),
        questions,
    };
    views::render(&page)
}

/// Answers arrive as `q_{question id}` fields plus the `started_at` timestamp.
#[tracing::instrument(skip_all, fields(quiz = %id))]
async fn submit_quiz_handler(
    ctx: RequestContext,
    cookies: Cookies,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> WebResult<impl IntoResponse> {
    let user = ctx.user()?;
    let quiz = find_quiz(&state, user, &id).await?;
    let module = quiz_module(&state, user, &quiz).await?;

    let questions = quiz.questions(state.pool()).await.map_err(quiz_error)?;
    let options = questions
        .iter()
        .map(|q| q.options())
        .collect::<Result<Vec<_>, _>>()
        .map_err(quiz_error)?;

    let scored: Vec<ScoredQuestion<'_>> = questions
        .iter()
        .zip(&options)
        .map(|(q, opts)| ScoredQuestion {
            text: q.text(),
            options: opts,
            correct_index: q.correct_index(),
        })
        .collect();
    let answers: Vec<Option<&str>> = questions
        .iter()
        .map(|q| form.get(&format!("q_{}", q.id())).map(String::as_str))
        .collect();
    let outcome = score_quiz(&scored, &answers);

    let now = Utc::now();
    let time_spent_secs = form
        .get("started_at")
        .and_then(|raw| raw.parse::<i64>().ok())
        .map(|started| (now.timestamp() - started).max(0));

    let mut entity = load_user(&state, user).await?;
    let completion = progress::complete_module(
        state.pool(),
        &mut entity,
        &module,
        Some(QuizAttempt {
            score: outcome.score,
            total: outcome.total,
            time_spent_secs,
        }),
        now,
    )
    .await
    .map_err(module_error)?;

    let page = QuizResultPage {
        layout: Layout::build(&state, &ctx, &cookies, "Mission Results").await,
        title: quiz.title().to_string(),
        course_id: module.course_id().to_string(),
        score: outcome.score,
        total: outcome.total,
        percentage: outcome.percentage,
        review: outcome.review,
        xp_awarded: completion.first_time,
        xp: completion.xp,
        level: completion.level,
    };
    views::render(&page)
}
