//! Scoring, XP, levels and streaks.
//!
//! Everything here is plain arithmetic over values already loaded from the database,
//! the persistence side lives in [`crate::model::progress`].

use chrono::{DateTime, Utc};
use serde::Serialize;

/// XP awarded the first time a module is completed.
pub const XP_PER_MODULE: i64 = 100;

/// XP needed per level.
pub const XP_PER_LEVEL: i64 = 1000;

/// Rounded percentage, 0 when there is nothing to count.
pub fn percent(part: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    ((part as f64 / total as f64) * 100.0).round() as i64
}

fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> i64 {
    (later.date_naive() - earlier.date_naive()).num_days()
}

/// Streak after an activity at `now`.
pub fn next_streak(current: i64, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    let Some(last) = last_activity else {
        return 1;
    };

    match days_between(last, now) {
        1 => current.max(0) + 1,
        d if d > 1 => 1,
        _ => current.max(1),
    }
}

/// Streak as seen on the dashboard: a missed calendar day breaks it.
pub fn decayed_streak(current: i64, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    match last_activity {
        Some(last) if days_between(last, now) > 1 => 0,
        _ => current.max(0),
    }
}

/// A question as seen by the scorer.
#[derive(Debug, Clone)]
pub struct ScoredQuestion<'a> {
    pub text: &'a str,
    pub options: &'a [String],
    pub correct_index: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewItem {
    pub question: String,
    pub user_choice: String,
    pub correct_answer: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizOutcome {
    pub score: i64,
    pub total: i64,
    pub percentage: i64,
    pub review: Vec<ReviewItem>,
}

/// Scores submitted option indexes, one optional raw answer per question in order.
pub fn score_quiz(questions: &[ScoredQuestion<'_>], answers: &[Option<&str>]) -> QuizOutcome {
    let mut score = 0;
    let mut review = Vec::with_capacity(questions.len());

    for (i, q) in questions.iter().enumerate() {
        let choice = answers
            .get(i)
            .copied()
            .flatten()
            .and_then(|raw| raw.trim().parse::<i64>().ok());

        let is_correct = choice == Some(q.correct_index);
        if is_correct {
            score += 1;
        }

        let option_at = |idx: i64| -> Option<&String> {
            usize::try_from(idx).ok().and_then(|idx| q.options.get(idx))
        };

        review.push(ReviewItem {
            question: q.text.to_string(),
            user_choice: choice
                .and_then(option_at)
                .cloned()
                .unwrap_or_else(|| String::from("No answer")),
            correct_answer: option_at(q.correct_index)
                .cloned()
                .unwrap_or_else(|| String::from("Not Defined")),
            is_correct,
        });
    }

    let total = questions.len() as i64;
    QuizOutcome {
        score,
        total,
        percentage: percent(score, total),
        review,
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn percent_rounds_and_handles_empty() {
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(0, 0), 0);
        assert_eq!(percent(4, 4), 100);
    }

    #[test]
    fn streak_counts_calendar_days() {
        // first ever activity
        assert_eq!(next_streak(0, None, at(10, 9)), 1);
        // late evening then early next morning is still "yesterday"
        assert_eq!(next_streak(3, Some(at(9, 23)), at(10, 1)), 4);
        // same day keeps the streak, but never below one
        assert_eq!(next_streak(3, Some(at(10, 1)), at(10, 22)), 3);
        assert_eq!(next_streak(0, Some(at(10, 1)), at(10, 22)), 1);
        // a missed day starts over
        assert_eq!(next_streak(7, Some(at(7, 12)), at(10, 12)), 1);
    }

    #[test]
    fn streak_decays_after_missed_day() {
        let now = at(10, 12);
        assert_eq!(decayed_streak(5, Some(now - Duration::days(1)), now), 5);
        assert_eq!(decayed_streak(5, Some(now - Duration::days(2)), now), 0);
        assert_eq!(decayed_streak(5, None, now), 5);
    }

    #[test]
    fn quiz_scoring_matches_by_position() {
        let opts_a = vec!["Mercury".to_string(), "Venus".to_string()];
        let opts_b = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let questions = vec![
            ScoredQuestion {
                text: "Closest to the sun?",
                options: &opts_a,
                correct_index: 0,
            },
            ScoredQuestion {
                text: "Moons of Mars?",
                options: &opts_b,
                correct_index: 1,
            },
            ScoredQuestion {
                text: "Broken",
                options: &opts_b,
                correct_index: 9,
            },
        ];

        let outcome = score_quiz(&questions, &[Some("0"), Some("2")]);

        assert_eq!(outcome.score, 1);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.percentage, 33);
        assert!(outcome.review[0].is_correct);
        assert_eq!(outcome.review[1].user_choice, "3");
        assert_eq!(outcome.review[1].correct_answer, "2");
        assert_eq!(outcome.review[2].user_choice, "No answer");
        assert_eq!(outcome.review[2].correct_answer, "Not Defined");
    }

    #[test]
    fn garbage_answers_score_zero() {
        let opts = vec!["a".to_string(), "b".to_string()];
        let questions = vec![ScoredQuestion {
            text: "q",
            options: &opts,
            correct_index: 0,
        }];

        let outcome = score_quiz(&questions, &[Some("zero")]);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.review[0].user_choice, "No answer");

        let empty = score_quiz(&[], &[]);
        assert_eq!(empty.percentage, 0);
    }
}
