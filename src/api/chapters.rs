use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use super::views::{ChapterView, CourseBrief, Navigation};
use crate::auth::Learner;
use crate::course::store;
use crate::error::Error;
use crate::learner::{self, ProgressUpdate};
use crate::sequencing;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChapterDetail {
    pub chapter: ChapterView,
    pub course: CourseBrief,
    pub navigation: Navigation,
}

/// Single chapter with prev/next links taken from the same flattened
/// order as the course view.
#[utoipa::path(get, path = "/api/chapters/{id}",
    responses((status = 200, body = ChapterDetail), (status = 404)))]
pub async fn detail(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    Path(id): Path<i64>,
) -> Result<Json<ChapterDetail>, Error> {
    let course_id = store::course_of_chapter(&state.db, id).await?;
    let tree = store::load_course_tree(&state.db, course_id).await?;
    let completions = learner::completions_for_course(&state.db, &learner_id, course_id).await?;
    let seq = sequencing::compute_sequencing(&tree, &completions);

    let index = seq
        .flat_order
        .iter()
        .position(|&c| c == id)
        .ok_or(Error::not_found("chapter", id))?;
    let node = tree
        .chapters()
        .nth(index)
        .ok_or(Error::not_found("chapter", id))?;

    Ok(Json(ChapterDetail {
        chapter: ChapterView::new(node, completions.get(&id)),
        course: CourseBrief {
            id: tree.course.id,
            title: tree.course.title.clone(),
            slug: tree.course.slug.clone(),
        },
        navigation: Navigation {
            current_index: index + 1,
            total_chapters: seq.flat_order.len(),
            prev_chapter_id: index.checked_sub(1).map(|i| seq.flat_order[i]),
            next_chapter_id: seq.flat_order.get(index + 1).copied(),
        },
    }))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub progress_percent: u8,
    pub course_completed: bool,
    pub current_module_index: Option<usize>,
    pub current_chapter_index: Option<usize>,
}

/// Records a watch-time/completion update, then returns the freshly
/// recomputed derived view. Reaching 100% flips the enrollment to
/// completed here, as an explicit policy step.
#[utoipa::path(post, path = "/api/chapters/{id}/progress",
    request_body = ProgressUpdate,
    responses((status = 200, body = ProgressResponse), (status = 404)))]
pub async fn progress(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    Path(id): Path<i64>,
    Json(update): Json<ProgressUpdate>,
) -> Result<Json<ProgressResponse>, Error> {
    let course_id = learner::record_chapter_progress(&state.db, &learner_id, id, update).await?;

    let tree = store::load_course_tree(&state.db, course_id).await?;
    let completions = learner::completions_for_course(&state.db, &learner_id, course_id).await?;
    let seq = sequencing::compute_sequencing(&tree, &completions);
    let progress = sequencing::compute_progress(&tree, &completions);

    if progress == 100 {
        learner::mark_course_completed(&state.db, &learner_id, course_id).await?;
    }

    Ok(Json(ProgressResponse {
        progress_percent: progress,
        course_completed: progress == 100,
        current_module_index: seq.current.map(|p| p.module_index),
        current_chapter_index: seq.current.map(|p| p.chapter_index),
    }))
}
