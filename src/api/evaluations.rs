use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::AppState;
use crate::auth::Learner;
use crate::error::Error;
use crate::evaluation::{self, AttemptRow, EvaluationRow, SubmitResult};

/// A question as served to the client: options only, never the answer key.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: i64,
    pub question: String,
    pub options: Vec<String>,
    pub order_index: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationDetail {
    pub evaluation: EvaluationRow,
    pub questions: Vec<QuestionView>,
    pub attempts: Vec<AttemptRow>,
}

/// Questions in canonical order plus the learner's previous attempts.
/// The submit endpoint scores answers positionally against this order.
#[utoipa::path(get, path = "/api/evaluations/{course_id}",
    responses((status = 200, body = EvaluationDetail), (status = 404)))]
pub async fn questions(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    Path(course_id): Path<i64>,
) -> Result<Json<EvaluationDetail>, Error> {
    let (evaluation, questions) = evaluation::load_for_course(&state.db, course_id).await?;
    let attempts = evaluation::list_attempts(&state.db, &learner_id, evaluation.id).await?;
    let questions = questions
        .into_iter()
        .map(|q| QuestionView {
            id: q.id,
            question: q.question,
            options: q.options,
            order_index: q.order_index,
        })
        .collect();
    Ok(Json(EvaluationDetail {
        evaluation,
        questions,
        attempts,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// One entry per question, in the served order. A null entry is a
    /// partial submission and is rejected outright.
    pub answers: Vec<Option<i64>>,
}

#[utoipa::path(post, path = "/api/evaluations/{course_id}/submit",
    request_body = SubmitRequest,
    responses((status = 200, body = SubmitResult), (status = 400), (status = 404)))]
pub async fn submit(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    Path(course_id): Path<i64>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResult>, Error> {
    let result = evaluation::submit(&state.db, &learner_id, course_id, &req.answers).await?;
    Ok(Json(result))
}
