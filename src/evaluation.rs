//! Final course evaluation: question loading, scoring, attempt records.
//!
//! Scoring is positional: answer *i* corresponds to the *i*-th question in
//! canonical order, the same order the question view serves them in.
//! Every submission becomes its own attempt row; nothing is overwritten.

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::error::Error;
use crate::utils::now_local;

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRow {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub passing_score: i64,
}

#[derive(Debug, Clone, FromRow)]
struct QuestionRow {
    id: i64,
    question: String,
    options: String,
    correct_answer: i64,
    order_index: i64,
}

/// A question with its options decoded. `correct_answer` never leaves the
/// server; the question view strips it.
#[derive(Debug, Clone)]
pub struct Question {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: i64,
    pub order_index: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOutcome {
    pub score: i64,
    pub passed: bool,
    pub correct_count: usize,
    pub total_questions: usize,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResult {
    pub score: i64,
    pub passed: bool,
    pub correct_count: usize,
    pub total_questions: usize,
    pub passing_score: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRow {
    pub id: i64,
    pub score: i64,
    pub passed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub attempted_at: OffsetDateTime,
}

/// Loads a course's evaluation with its questions in canonical order.
/// Ambiguous question ordering or undecodable options fail the load, a
/// positional scorer must not guess.
pub async fn load_for_course(
    db: &SqlitePool,
    course_id: i64,
) -> Result<(EvaluationRow, Vec<Question>), Error> {
    let evaluation = sqlx::query_as::<_, EvaluationRow>(
        "select id, course_id, title, description, passing_score \
         from evaluation where course_id = ?",
    )
    .bind(course_id)
    .fetch_optional(db)
    .await?
    .ok_or(Error::not_found("evaluation for course", course_id))?;

    let rows = sqlx::query_as::<_, QuestionRow>(
        "select id, question, options, correct_answer, order_index \
         from evaluation_question where evaluation_id = ? order by order_index",
    )
    .bind(evaluation.id)
    .fetch_all(db)
    .await?;

    let mut questions = Vec::with_capacity(rows.len());
    for row in rows {
        let options: Vec<String> = serde_json::from_str(&row.options).map_err(|e| {
            Error::DataIntegrity(format!("question {} has undecodable options: {e}", row.id))
        })?;
        if row.correct_answer < 0 || row.correct_answer as usize >= options.len() {
            return Err(Error::DataIntegrity(format!(
                "question {} marks option {} correct but has {} options",
                row.id,
                row.correct_answer,
                options.len()
            )));
        }
        questions.push(Question {
            id: row.id,
            question: row.question,
            options,
            correct_answer: row.correct_answer,
            order_index: row.order_index,
        });
    }
    for pair in questions.windows(2) {
        if pair[0].order_index == pair[1].order_index {
            return Err(Error::DataIntegrity(format!(
                "evaluation {} has questions {} and {} with the same order index {}",
                evaluation.id, pair[0].id, pair[1].id, pair[0].order_index
            )));
        }
    }
    Ok((evaluation, questions))
}

/// Pure scoring. Rejects partial submissions before looking at a single
/// answer; a partial submission is never worth a partial score.
pub fn score_submission(
    questions: &[Question],
    passing_score: i64,
    answers: &[Option<i64>],
) -> Result<ScoreOutcome, Error> {
    if questions.is_empty() {
        return Err(Error::DataIntegrity(
            "evaluation has no questions".to_string(),
        ));
    }
    if answers.len() != questions.len() {
        return Err(Error::InvalidSubmission(format!(
            "expected {} answers, got {}",
            questions.len(),
            answers.len()
        )));
    }
    if let Some(missing) = answers.iter().position(|a| a.is_none()) {
        return Err(Error::InvalidSubmission(format!(
            "answer {} is missing",
            missing + 1
        )));
    }

    let correct_count = questions
        .iter()
        .zip(answers)
        .filter(|(q, a)| **a == Some(q.correct_answer))
        .count();
    let score = ((100.0 * correct_count as f64) / questions.len() as f64).round() as i64;
    Ok(ScoreOutcome {
        score,
        passed: score >= passing_score,
        correct_count,
        total_questions: questions.len(),
    })
}

/// Scores a submission against the course's evaluation and appends the
/// attempt. Attempts are insert-only; retaking never rewrites history, and
/// enrollment state is deliberately left untouched.
pub async fn submit(
    db: &SqlitePool,
    learner_id: &str,
    course_id: i64,
    answers: &[Option<i64>],
) -> Result<SubmitResult, Error> {
    let (evaluation, questions) = load_for_course(db, course_id).await?;
    let outcome = score_submission(&questions, evaluation.passing_score, answers)?;

    let chosen: Vec<i64> = answers.iter().flatten().copied().collect();
    sqlx::query(
        "insert into evaluation_attempt \
         (learner_id, evaluation_id, score, passed, answers, attempted_at) \
         values (?, ?, ?, ?, ?, ?)",
    )
    .bind(learner_id)
    .bind(evaluation.id)
    .bind(outcome.score)
    .bind(outcome.passed)
    .bind(serde_json::to_string(&chosen).map_err(anyhow::Error::from)?)
    .bind(now_local())
    .execute(db)
    .await?;

    Ok(SubmitResult {
        score: outcome.score,
        passed: outcome.passed,
        correct_count: outcome.correct_count,
        total_questions: outcome.total_questions,
        passing_score: evaluation.passing_score,
    })
}

pub async fn list_attempts(
    db: &SqlitePool,
    learner_id: &str,
    evaluation_id: i64,
) -> Result<Vec<AttemptRow>, Error> {
    let rows = sqlx::query_as::<_, AttemptRow>(
        "select id, score, passed, attempted_at from evaluation_attempt \
         where learner_id = ? and evaluation_id = ? \
         order by attempted_at desc, id desc",
    )
    .bind(learner_id)
    .bind(evaluation_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learner::tests::test_db;

    fn question(id: i64, correct_answer: i64) -> Question {
        Question {
            id,
            question: format!("Q{id}"),
            options: vec!["a".into(), "b".into(), "c".into()],
            correct_answer,
            order_index: id,
        }
    }

    #[test]
    fn perfect_and_failing_submissions() {
        let questions = vec![question(0, 0), question(1, 1), question(2, 2)];

        let outcome =
            score_submission(&questions, 70, &[Some(0), Some(1), Some(2)]).unwrap();
        assert_eq!(outcome.score, 100);
        assert!(outcome.passed);
        assert_eq!(outcome.correct_count, 3);

        let outcome =
            score_submission(&questions, 70, &[Some(0), Some(0), Some(0)]).unwrap();
        assert_eq!(outcome.score, 33);
        assert!(!outcome.passed);
        assert_eq!(outcome.correct_count, 1);
    }

    #[test]
    fn scoring_is_deterministic() {
        let questions = vec![question(0, 0), question(1, 1), question(2, 2)];
        let answers = [Some(0), Some(1), Some(0)];
        let first = score_submission(&questions, 70, &answers).unwrap();
        let second = score_submission(&questions, 70, &answers).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn exact_passing_score_passes() {
        let questions = vec![question(0, 0), question(1, 1)];
        let outcome = score_submission(&questions, 50, &[Some(0), Some(0)]).unwrap();
        assert_eq!(outcome.score, 50);
        assert!(outcome.passed);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let questions = vec![question(0, 0), question(1, 1)];
        let err = score_submission(&questions, 70, &[Some(0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidSubmission(_)));
    }

    #[test]
    fn missing_answer_is_rejected_not_scored() {
        let questions = vec![question(0, 0), question(1, 1)];
        let err = score_submission(&questions, 70, &[Some(0), None]).unwrap_err();
        assert!(matches!(err, Error::InvalidSubmission(_)));
    }

    #[test]
    fn answer_outside_the_options_is_just_wrong() {
        let questions = vec![question(0, 0)];
        let outcome = score_submission(&questions, 70, &[Some(7)]).unwrap();
        assert_eq!(outcome.correct_count, 0);
    }

    #[test]
    fn evaluation_without_questions_is_an_authoring_error() {
        let err = score_submission(&[], 70, &[]).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[tokio::test]
    async fn load_strips_nothing_and_orders_questions() {
        let db = test_db().await;
        let (evaluation, questions) = load_for_course(&db, 1).await.unwrap();
        assert_eq!(evaluation.passing_score, 70);
        let order: Vec<i64> = questions.iter().map(|q| q.order_index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(questions[0].options.len(), 3);
    }

    #[tokio::test]
    async fn course_without_evaluation_is_not_found() {
        let db = test_db().await;
        let err = load_for_course(&db, 999).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn duplicate_question_order_fails_the_load() {
        let db = test_db().await;
        sqlx::query(
            "insert into evaluation_question \
             (evaluation_id, question, options, correct_answer, order_index) \
             values (1, 'dup', '[\"a\",\"b\"]', 0, 2)",
        )
        .execute(&db)
        .await
        .unwrap();
        let err = load_for_course(&db, 1).await.unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[tokio::test]
    async fn out_of_range_correct_answer_fails_the_load() {
        let db = test_db().await;
        sqlx::query("update evaluation_question set correct_answer = 9 where id = 1")
            .execute(&db)
            .await
            .unwrap();
        let err = load_for_course(&db, 1).await.unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[tokio::test]
    async fn every_submission_appends_an_attempt() {
        let db = test_db().await;
        let first = submit(&db, "p1", 1, &[Some(0), Some(1), Some(2)]).await.unwrap();
        assert_eq!(first.score, 100);
        assert!(first.passed);

        let second = submit(&db, "p1", 1, &[Some(1), Some(0), Some(0)]).await.unwrap();
        assert_eq!(second.score, 0);
        assert!(!second.passed);

        let attempts = list_attempts(&db, "p1", 1).await.unwrap();
        assert_eq!(attempts.len(), 2);
        // newest first
        assert_eq!(attempts[0].score, 0);
        assert_eq!(attempts[1].score, 100);
    }

    #[tokio::test]
    async fn rejected_submission_records_no_attempt() {
        let db = test_db().await;
        let err = submit(&db, "p1", 1, &[Some(0), None, Some(2)]).await.unwrap_err();
        assert!(matches!(err, Error::InvalidSubmission(_)));
        assert!(list_attempts(&db, "p1", 1).await.unwrap().is_empty());
    }
}
