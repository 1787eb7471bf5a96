//! Per-learner persistent facts: enrollments and chapter completions.
//!
//! Writes here are the only mutation path for progression state. Derived
//! values (unlocking, current position, percentages) are never written,
//! they are recomputed by [`crate::sequencing`] from these facts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::error::Error;
use crate::utils::now_local;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Paused,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: i64,
    pub learner_id: String,
    pub course_id: i64,
    pub status: EnrollmentStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub enrolled_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// One (learner, chapter) completion fact. Absence of a row means the
/// chapter is untouched: not completed, zero watch time.
#[derive(Debug, Clone, FromRow)]
pub struct Completion {
    pub chapter_id: i64,
    pub is_completed: bool,
    pub completed_at: Option<OffsetDateTime>,
    pub watch_time_seconds: i64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub watch_time_seconds: Option<i64>,
    #[serde(default)]
    pub mark_completed: bool,
}

pub async fn completions_for_course(
    db: &SqlitePool,
    learner_id: &str,
    course_id: i64,
) -> Result<HashMap<i64, Completion>, Error> {
    let rows = sqlx::query_as::<_, Completion>(
        "select cp.chapter_id, cp.is_completed, cp.completed_at, cp.watch_time_seconds \
         from chapter_progress cp \
         join chapter c on cp.chapter_id = c.id \
         join module m on c.module_id = m.id \
         where cp.learner_id = ? and m.course_id = ?",
    )
    .bind(learner_id)
    .bind(course_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().map(|c| (c.chapter_id, c)).collect())
}

pub async fn enrollment(
    db: &SqlitePool,
    learner_id: &str,
    course_id: i64,
) -> Result<Option<Enrollment>, Error> {
    let row = sqlx::query_as::<_, Enrollment>(
        "select id, learner_id, course_id, status, enrolled_at, completed_at \
         from enrollment where learner_id = ? and course_id = ?",
    )
    .bind(learner_id)
    .bind(course_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn enrollments(db: &SqlitePool, learner_id: &str) -> Result<Vec<Enrollment>, Error> {
    let rows = sqlx::query_as::<_, Enrollment>(
        "select id, learner_id, course_id, status, enrolled_at, completed_at \
         from enrollment where learner_id = ?",
    )
    .bind(learner_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Explicit enrollment. Returns false when the learner was already
/// enrolled; the unique (learner, course) constraint makes concurrent
/// enrolls converge on a single row.
pub async fn enroll(db: &SqlitePool, learner_id: &str, course_id: i64) -> Result<bool, Error> {
    let published =
        sqlx::query_scalar::<_, bool>("select is_published from course where id = ?")
            .bind(course_id)
            .fetch_optional(db)
            .await?
            .ok_or(Error::not_found("course", course_id))?;
    if !published {
        return Err(Error::not_found("course", course_id));
    }
    let result = sqlx::query(
        "insert into enrollment (learner_id, course_id, status, enrolled_at) \
         values (?, ?, 'active', ?) \
         on conflict (learner_id, course_id) do nothing",
    )
    .bind(learner_id)
    .bind(course_id)
    .bind(now_local())
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Upserts the (learner, chapter) completion fact, auto-enrolling in the
/// chapter's course on first interaction. Runs in one transaction so a
/// failed progress write never leaves a half-applied enrollment behind.
///
/// `is_completed` is monotonic: a concurrent non-completing write can win
/// the race on `watch_time_seconds` but can never flip a completion back.
/// Returns the chapter's course id so callers can recompute derived state.
pub async fn record_chapter_progress(
    db: &SqlitePool,
    learner_id: &str,
    chapter_id: i64,
    update: ProgressUpdate,
) -> Result<i64, Error> {
    if update.watch_time_seconds.is_some_and(|w| w < 0) {
        return Err(Error::InvalidSubmission(
            "watchTimeSeconds must not be negative".to_string(),
        ));
    }

    let mut tx = db.begin().await?;

    let course_id = sqlx::query_scalar::<_, i64>(
        "select m.course_id from chapter c join module m on c.module_id = m.id where c.id = ?",
    )
    .bind(chapter_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(Error::not_found("chapter", chapter_id))?;

    let now = now_local();
    sqlx::query(
        "insert into enrollment (learner_id, course_id, status, enrolled_at) \
         values (?, ?, 'active', ?) \
         on conflict (learner_id, course_id) do nothing",
    )
    .bind(learner_id)
    .bind(course_id)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    let completed_at = update.mark_completed.then_some(now);
    sqlx::query(
        "insert into chapter_progress \
         (learner_id, chapter_id, is_completed, completed_at, watch_time_seconds) \
         values (?, ?, ?, ?, coalesce(?, 0)) \
         on conflict (learner_id, chapter_id) do update set \
         is_completed = max(chapter_progress.is_completed, excluded.is_completed), \
         completed_at = coalesce(chapter_progress.completed_at, excluded.completed_at), \
         watch_time_seconds = coalesce(?, chapter_progress.watch_time_seconds)",
    )
    .bind(learner_id)
    .bind(chapter_id)
    .bind(update.mark_completed)
    .bind(completed_at)
    .bind(update.watch_time_seconds)
    .bind(update.watch_time_seconds)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(course_id)
}

/// Policy call: flips an active enrollment to completed. Invoked by the
/// progress handler once the recomputed percentage reaches 100.
pub async fn mark_course_completed(
    db: &SqlitePool,
    learner_id: &str,
    course_id: i64,
) -> Result<(), Error> {
    sqlx::query(
        "update enrollment set status = 'completed', completed_at = ? \
         where learner_id = ? and course_id = ? and status = 'active'",
    )
    .bind(now_local())
    .bind(learner_id)
    .bind(course_id)
    .execute(db)
    .await?;
    Ok(())
}

/// Completed-chapter counts per course, for the catalog view.
pub async fn completed_counts_by_course(
    db: &SqlitePool,
    learner_id: &str,
) -> Result<HashMap<i64, i64>, Error> {
    let rows = sqlx::query_as::<_, (i64, i64)>(
        "select m.course_id, count(*) from chapter_progress cp \
         join chapter c on cp.chapter_id = c.id \
         join module m on c.module_id = m.id \
         where cp.learner_id = ? and cp.is_completed = 1 \
         group by m.course_id",
    )
    .bind(learner_id)
    .fetch_all(db)
    .await?;
    Ok(rows.into_iter().collect())
}

pub async fn completed_chapter_count(db: &SqlitePool, learner_id: &str) -> Result<i64, Error> {
    let count = sqlx::query_scalar::<_, i64>(
        "select count(*) from chapter_progress where learner_id = ? and is_completed = 1",
    )
    .bind(learner_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    /// In-memory database with the schema applied and one seeded course:
    /// course 1 (published, with evaluation), module 1 -> chapters 1, 2,
    /// module 2 -> chapter 3, and a three-question evaluation.
    pub(crate) async fn test_db() -> SqlitePool {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("pragma foreign_keys = on")
            .execute(&db)
            .await
            .unwrap();
        sqlx::migrate!().run(&db).await.unwrap();

        let seed = [
            "insert into course (id, title, slug, is_published, has_evaluation) \
             values (1, 'Limits', 'limits', 1, 1)",
            "insert into module (id, course_id, title, order_index) values (1, 1, 'Basics', 0)",
            "insert into module (id, course_id, title, order_index) values (2, 1, 'Practice', 1)",
            "insert into chapter (id, module_id, title, duration_minutes, order_index) \
             values (1, 1, 'Welcome', 5, 0)",
            "insert into chapter (id, module_id, title, duration_minutes, order_index) \
             values (2, 1, 'Why limits', 12, 1)",
            "insert into chapter (id, module_id, title, duration_minutes, order_index) \
             values (3, 2, 'At home', 8, 0)",
            "insert into material (id, chapter_id, title, kind, url, order_index) \
             values (1, 1, 'Workbook', 'pdf', 'https://cdn.example/wb.pdf', 0)",
            "insert into evaluation (id, course_id, title, passing_score) \
             values (1, 1, 'Final check', 70)",
            "insert into evaluation_question \
             (id, evaluation_id, question, options, correct_answer, order_index) \
             values (1, 1, 'Q1', '[\"a\",\"b\",\"c\"]', 0, 0)",
            "insert into evaluation_question \
             (id, evaluation_id, question, options, correct_answer, order_index) \
             values (2, 1, 'Q2', '[\"a\",\"b\",\"c\"]', 1, 1)",
            "insert into evaluation_question \
             (id, evaluation_id, question, options, correct_answer, order_index) \
             values (3, 1, 'Q3', '[\"a\",\"b\",\"c\"]', 2, 2)",
        ];
        for stmt in seed {
            sqlx::query(stmt).execute(&db).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn first_progress_write_auto_enrolls() {
        let db = test_db().await;
        assert!(enrollment(&db, "p1", 1).await.unwrap().is_none());

        let course_id = record_chapter_progress(
            &db,
            "p1",
            1,
            ProgressUpdate {
                watch_time_seconds: Some(30),
                mark_completed: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(course_id, 1);

        let enrollment = enrollment(&db, "p1", 1).await.unwrap().unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
        assert!(enrollment.completed_at.is_none());
    }

    #[tokio::test]
    async fn completion_is_monotonic() {
        let db = test_db().await;
        record_chapter_progress(
            &db,
            "p1",
            1,
            ProgressUpdate {
                watch_time_seconds: None,
                mark_completed: true,
            },
        )
        .await
        .unwrap();

        let before = completions_for_course(&db, "p1", 1).await.unwrap();
        let stamped = before[&1].completed_at.unwrap();

        // a later non-completing write must not clear the completion
        record_chapter_progress(
            &db,
            "p1",
            1,
            ProgressUpdate {
                watch_time_seconds: Some(999),
                mark_completed: false,
            },
        )
        .await
        .unwrap();

        let after = completions_for_course(&db, "p1", 1).await.unwrap();
        assert!(after[&1].is_completed);
        assert_eq!(after[&1].completed_at.unwrap(), stamped);
        assert_eq!(after[&1].watch_time_seconds, 999);
    }

    #[tokio::test]
    async fn watch_time_merges_last_writer_wins() {
        let db = test_db().await;
        let update = |w| ProgressUpdate {
            watch_time_seconds: w,
            mark_completed: false,
        };
        record_chapter_progress(&db, "p1", 2, update(Some(30))).await.unwrap();
        record_chapter_progress(&db, "p1", 2, update(None)).await.unwrap();
        let facts = completions_for_course(&db, "p1", 1).await.unwrap();
        assert_eq!(facts[&2].watch_time_seconds, 30);

        record_chapter_progress(&db, "p1", 2, update(Some(60))).await.unwrap();
        let facts = completions_for_course(&db, "p1", 1).await.unwrap();
        assert_eq!(facts[&2].watch_time_seconds, 60);
    }

    #[tokio::test]
    async fn negative_watch_time_is_rejected() {
        let db = test_db().await;
        let err = record_chapter_progress(
            &db,
            "p1",
            1,
            ProgressUpdate {
                watch_time_seconds: Some(-1),
                mark_completed: false,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSubmission(_)));
    }

    #[tokio::test]
    async fn unknown_chapter_is_not_found() {
        let db = test_db().await;
        let err = record_chapter_progress(&db, "p1", 999, ProgressUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        // nothing half-applied
        assert!(enrollment(&db, "p1", 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn explicit_enroll_is_idempotent() {
        let db = test_db().await;
        assert!(enroll(&db, "p1", 1).await.unwrap());
        assert!(!enroll(&db, "p1", 1).await.unwrap());
        assert_eq!(enrollments(&db, "p1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn course_completion_transitions_active_enrollments_only() {
        let db = test_db().await;
        enroll(&db, "p1", 1).await.unwrap();
        mark_course_completed(&db, "p1", 1).await.unwrap();
        let first = enrollment(&db, "p1", 1).await.unwrap().unwrap();
        assert_eq!(first.status, EnrollmentStatus::Completed);
        let stamped = first.completed_at.unwrap();

        // repeat call is a no-op, the original timestamp survives
        mark_course_completed(&db, "p1", 1).await.unwrap();
        let second = enrollment(&db, "p1", 1).await.unwrap().unwrap();
        assert_eq!(second.completed_at.unwrap(), stamped);
    }

    #[tokio::test]
    async fn completions_are_scoped_to_the_course() {
        let db = test_db().await;
        sqlx::query(
            "insert into course (id, title, slug, is_published) values (2, 'Other', 'other', 1)",
        )
        .execute(&db)
        .await
        .unwrap();
        sqlx::query("insert into module (id, course_id, title, order_index) values (9, 2, 'M', 0)")
            .execute(&db)
            .await
            .unwrap();
        sqlx::query(
            "insert into chapter (id, module_id, title, order_index) values (90, 9, 'C', 0)",
        )
        .execute(&db)
        .await
        .unwrap();

        record_chapter_progress(
            &db,
            "p1",
            90,
            ProgressUpdate {
                watch_time_seconds: None,
                mark_completed: true,
            },
        )
        .await
        .unwrap();

        assert!(completions_for_course(&db, "p1", 1).await.unwrap().is_empty());
        assert_eq!(
            completed_counts_by_course(&db, "p1").await.unwrap()[&2],
            1
        );
        assert_eq!(completed_chapter_count(&db, "p1").await.unwrap(), 1);
    }
}
