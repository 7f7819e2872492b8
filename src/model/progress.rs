//! Module completion: persistence of completions, XP, streaks and course mastery.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    gamification::{XP_PER_MODULE, decayed_streak, next_streak},
    model::{
        DatabaseResult, ModelManager,
        entity::{
            Completion, CourseModule, Enrollment, QuizAttempt, UserEntity,
            notification::{KIND_ACHIEVEMENT, KIND_PROGRESS},
        },
        notify::notify,
    },
    web::AuthenticatedUser,
};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CompletionOutcome {
    pub first_time: bool,
    pub xp: i64,
    pub level: i64,
    pub streak: i64,
    pub course_completed: bool,
}

/// Records that `user` finished `module` at `now`.
///
/// XP is only granted the first time; the streak moves on every completion. When the
/// last module of the course is done the enrollment flips to completed and the
/// mastery notification goes out once.
#[tracing::instrument(skip_all, fields(user = %user.id(), module = %module.id()))]
pub async fn complete_module(
    mm: &ModelManager,
    user: &mut UserEntity,
    module: &CourseModule,
    attempt: Option<QuizAttempt>,
    now: DateTime<Utc>,
) -> DatabaseResult<CompletionOutcome> {
    let actor = AuthenticatedUser::admin();
    let first_time = Completion::record(mm, &actor, user.id(), module.id(), attempt).await?;

    let streak = next_streak(user.streak_count(), user.last_activity_date(), now);
    let xp_gain = if first_time { XP_PER_MODULE } else { 0 };
    user.record_activity(mm, xp_gain, streak, now).await?;

    if first_time {
        notify(
            mm,
            user.id(),
            KIND_PROGRESS,
            "Module Completed!",
            &format!("Mastered: {}.", module.title()),
        )
        .await;
    }

    let course_completed = check_course_mastery(mm, user, module).await?;

    tracing::debug!(first_time, xp = user.xp(), course_completed, "module completed");
    Ok(CompletionOutcome {
        first_time,
        xp: user.xp(),
        level: user.level(),
        streak: user.streak_count(),
        course_completed,
    })
}

/// True when this call flipped the enrollment to completed.
async fn check_course_mastery(
    mm: &ModelManager,
    user: &UserEntity,
    module: &CourseModule,
) -> DatabaseResult<bool> {
    let actor = AuthenticatedUser::admin();
    let total = CourseModule::count_for_course(mm, &actor, module.course_id()).await?;
    let done = Completion::completed_module_ids(mm, &actor, user.id(), module.course_id())
        .await?
        .len() as i64;

    if total == 0 || done < total {
        return Ok(false);
    }

    let Some(mut enrollment) = Enrollment::find(mm, &actor, user.id(), module.course_id()).await?
    else {
        return Ok(false);
    };

    let flipped = enrollment.mark_completed(mm).await?;
    if flipped {
        notify(
            mm,
            user.id(),
            KIND_ACHIEVEMENT,
            "Mastery Badge Unlocked!",
            "Visit your profile to see your new badge.",
        )
        .await;
    }
    Ok(flipped)
}

/// Applies streak decay for a dashboard view, persisting a reset.
pub async fn decay_streak(
    mm: &ModelManager,
    user: &mut UserEntity,
    now: DateTime<Utc>,
) -> DatabaseResult<i64> {
    let decayed = decayed_streak(user.streak_count(), user.last_activity_date(), now);
    if decayed != user.streak_count() {
        user.set_streak(mm, decayed).await?;
    }
    Ok(decayed)
}
