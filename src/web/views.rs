//! Askama page models. Handlers flatten entities into these before rendering.

use askama::Template;
use axum::response::Html;
use tower_cookies::Cookies;

use crate::{
    error::log_error,
    gamification::ReviewItem,
    model::entity::{EnrolledCourseRow, Notification},
    web::{AppState, RequestContext, WebError, WebResult, flash, flash::FlashKind},
};

/// Shared chrome of every page: title, navigation state and the pending flash.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub title: String,
    pub logged_in: bool,
    pub is_admin: bool,
    pub username: String,
    pub unread: i64,
    pub success: String,
    pub error: String,
}

impl Layout {
    pub fn anonymous(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Default::default()
        }
    }

    /// Consumes the flash cookie and looks up the unread count of the viewer.
    pub async fn build(
        state: &AppState,
        ctx: &RequestContext,
        cookies: &Cookies,
        title: &str,
    ) -> Self {
        let mut layout = Self::anonymous(title);

        if let Some(user) = ctx.maybe_user() {
            layout.logged_in = true;
            layout.is_admin = user.is_admin();
            layout.username = user.username().to_string();
            layout.unread = match Notification::unread_count(state.pool(), user, user.user_id()).await
            {
                Ok(n) => n,
                Err(e) => {
                    log_error(&e);
                    0
                }
            };
        }

        if let Some(flash) = flash::take(cookies) {
            match flash.kind {
                FlashKind::Success => layout.success = flash.message,
                FlashKind::Error => layout.error = flash.message,
            }
        }
        layout
    }

    pub fn with_error(mut self, message: &str) -> Self {
        self.error = message.to_string();
        self
    }

    pub fn with_success(mut self, message: &str) -> Self {
        self.success = message.to_string();
        self
    }
}

pub fn render<T: Template>(page: &T) -> WebResult<Html<String>> {
    page.render()
        .map(Html)
        .map_err(WebError::server_template_error)
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    pub layout: Layout,
    pub status: u16,
    pub message: String,
    pub details: String,
}

// ---------------------------------------------------------------------------
// Learner pages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CourseProgressView {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub level: String,
    pub completed_modules: i64,
    pub total_modules: i64,
    pub percent: i64,
    pub completed: bool,
}

impl From<EnrolledCourseRow> for CourseProgressView {
    fn from(row: EnrolledCourseRow) -> Self {
        Self {
            id: row.course_id.to_string(),
            percent: row.progress_percent(),
            completed: row.is_completed(),
            completed_modules: row.completed_modules,
            total_modules: row.total_modules,
            title: row.title,
            subject: row.subject,
            level: row.level,
        }
    }
}

#[derive(Template)]
#[template(path = "explorer.html")]
pub struct ExplorerPage {
    pub layout: Layout,
    pub fact: String,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage {
    pub layout: Layout,
    pub username: String,
    pub level: i64,
    pub xp: i64,
    pub streak: i64,
    pub enrolled_count: i64,
    pub completed_count: i64,
    pub fact: String,
    pub courses: Vec<CourseProgressView>,
}

#[derive(Template)]
#[template(path = "faq.html")]
pub struct FaqPage {
    pub layout: Layout,
}

#[derive(Template)]
#[template(path = "support.html")]
pub struct SupportPage {
    pub layout: Layout,
}

#[derive(Debug, Clone)]
pub struct BadgeView {
    pub title: String,
    pub subject: String,
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfilePage {
    pub layout: Layout,
    pub username: String,
    pub level: i64,
    pub xp: i64,
    pub streak: i64,
    pub rank: i64,
    pub member_since: String,
    pub badges: Vec<BadgeView>,
}

#[derive(Template)]
#[template(path = "settings.html")]
pub struct SettingsPage {
    pub layout: Layout,
    pub username: String,
    pub email: String,
    pub courses: Vec<CourseProgressView>,
}

#[derive(Debug, Clone)]
pub struct LeaderView {
    pub rank: usize,
    pub username: String,
    pub level: i64,
    pub xp: i64,
    pub streak: i64,
    pub is_me: bool,
}

#[derive(Template)]
#[template(path = "leaderboard.html")]
pub struct LeaderboardPage {
    pub layout: Layout,
    pub rows: Vec<LeaderView>,
    /// Zero for guests.
    pub my_rank: i64,
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginPage {
    pub layout: Layout,
    pub identity: String,
    pub google_enabled: bool,
}

#[derive(Template)]
#[template(path = "auth/register.html")]
pub struct RegisterPage {
    pub layout: Layout,
    pub username: String,
    pub email: String,
    pub google_enabled: bool,
}

#[derive(Template)]
#[template(path = "auth/verify.html")]
pub struct VerifyPage {
    pub layout: Layout,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct CountryOption {
    pub code: String,
    pub name: String,
    pub selected: bool,
}

#[derive(Template)]
#[template(path = "auth/select_country.html")]
pub struct SelectCountryPage {
    pub layout: Layout,
    pub countries: Vec<CountryOption>,
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CourseCardView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub level: String,
    pub standard: String,
    pub region: String,
    pub price: String,
}

#[derive(Template)]
#[template(path = "courses/index.html")]
pub struct CoursesPage {
    pub layout: Layout,
    pub courses: Vec<CourseCardView>,
    pub subjects: Vec<String>,
    pub search: String,
    pub subject: String,
    pub level: String,
    pub standard: String,
    /// Region the listing is restricted to, empty when everything is shown.
    pub country: String,
    pub view_global: bool,
}

#[derive(Debug, Clone)]
pub struct SyllabusItem {
    pub id: String,
    pub title: String,
    pub order: i64,
    pub completed: bool,
    pub quiz_id: String,
    pub quiz_title: String,
}

#[derive(Template)]
#[template(path = "courses/detail.html")]
pub struct CourseDetailPage {
    pub layout: Layout,
    pub course: CourseCardView,
    pub enrolled: bool,
    pub can_open_modules: bool,
    pub progress: i64,
    pub modules: Vec<SyllabusItem>,
}

#[derive(Template)]
#[template(path = "courses/module.html")]
pub struct ModulePage {
    pub layout: Layout,
    pub course_id: String,
    pub course_title: String,
    pub module_id: String,
    pub title: String,
    pub content: String,
    pub video_url: String,
    pub quiz_id: String,
    pub prev_id: String,
    pub next_id: String,
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct OptionView {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct QuestionView {
    pub id: String,
    pub number: usize,
    pub text: String,
    pub options: Vec<OptionView>,
}

#[derive(Template)]
#[template(path = "courses/quiz.html")]
pub struct TakeQuizPage {
    pub layout: Layout,
    pub quiz_id: String,
    pub title: String,
    pub module_title: String,
    pub started_at: i64,
    pub questions: Vec<QuestionView>,
}

#[derive(Template)]
#[template(path = "courses/quiz_result.html")]
pub struct QuizResultPage {
    pub layout: Layout,
    pub title: String,
    pub course_id: String,
    pub score: i64,
    pub total: i64,
    pub percentage: i64,
    pub review: Vec<ReviewItem>,
    pub xp_awarded: bool,
    pub xp: i64,
    pub level: i64,
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

#[derive(Template)]
#[template(path = "admin/dashboard.html")]
pub struct AdminDashboardPage {
    pub layout: Layout,
    pub users: i64,
    pub courses: i64,
    pub enrollments: i64,
    pub completions: i64,
}

#[derive(Template)]
#[template(path = "admin/fact.html")]
pub struct AdminFactPage {
    pub layout: Layout,
    pub content: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct AdminUserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub level: i64,
    pub xp: i64,
    pub verified: bool,
    pub is_self: bool,
}

#[derive(Template)]
#[template(path = "admin/users.html")]
pub struct AdminUsersPage {
    pub layout: Layout,
    pub users: Vec<AdminUserRow>,
    pub total: i64,
    pub limit: i64,
    pub prev_offset: i64,
    pub next_offset: i64,
    pub has_prev: bool,
    pub has_next: bool,
}

#[derive(Debug, Clone)]
pub struct AdminCourseRow {
    pub id: String,
    pub title: String,
    pub subject: String,
    pub level: String,
    pub region: String,
    pub price: String,
    pub instructor: String,
    pub module_count: i64,
}

#[derive(Template)]
#[template(path = "admin/courses.html")]
pub struct AdminCoursesPage {
    pub layout: Layout,
    pub courses: Vec<AdminCourseRow>,
}

/// Raw course form values, echoed back when validation fails.
#[derive(Debug, Clone, Default)]
pub struct CourseFormValues {
    pub title: String,
    pub description: String,
    pub subject: String,
    pub level: String,
    pub standard: String,
    pub region: String,
    pub price: String,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct PriceView {
    pub country: String,
    pub price: String,
}

#[derive(Template)]
#[template(path = "admin/course_form.html")]
pub struct AdminCourseFormPage {
    pub layout: Layout,
    pub heading: String,
    pub action: String,
    /// Empty while creating.
    pub course_id: String,
    pub form: CourseFormValues,
    pub module_count: i64,
    pub prices: Vec<PriceView>,
}

#[derive(Debug, Clone)]
pub struct AnalyticsRow {
    pub title: String,
    pub enrollments: i64,
    pub completed: i64,
    pub rate: i64,
}

#[derive(Template)]
#[template(path = "admin/analytics.html")]
pub struct AdminAnalyticsPage {
    pub layout: Layout,
    pub courses: Vec<AnalyticsRow>,
    pub learners: Vec<LeaderView>,
}

#[derive(Debug, Clone)]
pub struct AdminModuleRow {
    pub id: String,
    pub title: String,
    pub order: i64,
    pub quiz_id: String,
    pub quiz_title: String,
    pub question_count: i64,
}

#[derive(Template)]
#[template(path = "admin/course_modules.html")]
pub struct AdminCourseModulesPage {
    pub layout: Layout,
    pub course_id: String,
    pub course_title: String,
    pub modules: Vec<AdminModuleRow>,
}

#[derive(Template)]
#[template(path = "admin/module_form.html")]
pub struct AdminModuleFormPage {
    pub layout: Layout,
    pub course_id: String,
    pub course_title: String,
    pub title: String,
    pub description: String,
    pub video_url: String,
    pub order: String,
}

#[derive(Template)]
#[template(path = "admin/quiz_form.html")]
pub struct AdminQuizFormPage {
    pub layout: Layout,
    pub heading: String,
    pub action: String,
    pub course_id: String,
    pub module_title: String,
    pub title: String,
    pub body: String,
}

#[derive(Template)]
#[template(path = "admin/broadcast.html")]
pub struct AdminBroadcastPage {
    pub layout: Layout,
    pub title: String,
    pub message: String,
    pub kind: String,
}
