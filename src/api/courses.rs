use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use utoipa::ToSchema;

use super::AppState;
use super::views::{ChapterView, CourseSummary, ModuleView};
use crate::auth::Learner;
use crate::course::store;
use crate::error::Error;
use crate::learner::{self, EnrollmentStatus};
use crate::sequencing::{self, percent};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LearnerStats {
    pub active_courses: usize,
    pub completed_courses: usize,
    pub chapters_viewed: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseListResponse {
    pub courses: Vec<CourseSummary>,
    pub stats: LearnerStats,
}

/// Published courses with the learner's recomputed progress.
#[utoipa::path(get, path = "/api/courses",
    responses((status = 200, body = CourseListResponse), (status = 401)))]
pub async fn list(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
) -> Result<Json<CourseListResponse>, Error> {
    let courses = store::list_published_courses(&state.db).await?;
    let totals = store::chapter_totals(&state.db).await?;
    let enrollments = learner::enrollments(&state.db, &learner_id).await?;
    let completed = learner::completed_counts_by_course(&state.db, &learner_id).await?;

    let by_course: HashMap<i64, &learner::Enrollment> =
        enrollments.iter().map(|e| (e.course_id, e)).collect();

    let courses = courses
        .iter()
        .map(|course| {
            let (total_chapters, total_duration) =
                totals.get(&course.id).copied().unwrap_or((0, 0));
            let done = completed.get(&course.id).copied().unwrap_or(0);
            CourseSummary::new(
                course,
                total_chapters,
                total_duration,
                by_course.get(&course.id).copied(),
                percent(done as usize, total_chapters as usize),
            )
        })
        .collect();

    let stats = LearnerStats {
        active_courses: enrollments
            .iter()
            .filter(|e| e.status == EnrollmentStatus::Active)
            .count(),
        completed_courses: enrollments
            .iter()
            .filter(|e| e.status == EnrollmentStatus::Completed)
            .count(),
        chapters_viewed: learner::completed_chapter_count(&state.db, &learner_id).await?,
    };

    Ok(Json(CourseListResponse { courses, stats }))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    pub course: CourseSummary,
    pub modules: Vec<ModuleView>,
    pub current_module_index: Option<usize>,
    pub current_chapter_index: Option<usize>,
}

/// Full course view: modules with unlock/completion state, chapters with
/// the learner's progress, and the current position. Everything derived
/// fresh from the completion facts.
#[utoipa::path(get, path = "/api/courses/{id}",
    responses((status = 200, body = CourseDetail), (status = 404)))]
pub async fn detail(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    Path(id): Path<i64>,
) -> Result<Json<CourseDetail>, Error> {
    let tree = store::load_course_tree(&state.db, id).await?;
    if !tree.course.is_published {
        return Err(Error::not_found("course", id));
    }
    let completions = learner::completions_for_course(&state.db, &learner_id, id).await?;
    let seq = sequencing::compute_sequencing(&tree, &completions);
    let progress = sequencing::compute_progress(&tree, &completions);
    let enrollment = learner::enrollment(&state.db, &learner_id, id).await?;

    let modules = tree
        .modules
        .iter()
        .zip(&seq.modules)
        .map(|(node, state)| {
            let chapters = node
                .chapters
                .iter()
                .map(|c| ChapterView::new(c, completions.get(&c.chapter.id)))
                .collect();
            ModuleView::new(&node.module.title, node.module.order_index, state, chapters)
        })
        .collect();

    Ok(Json(CourseDetail {
        course: CourseSummary::new(
            &tree.course,
            tree.total_chapters() as i64,
            tree.total_duration(),
            enrollment.as_ref(),
            progress,
        ),
        modules,
        current_module_index: seq.current.map(|p| p.module_index),
        current_chapter_index: seq.current.map(|p| p.chapter_index),
    }))
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResponse {
    pub already_enrolled: bool,
}

#[utoipa::path(post, path = "/api/courses/{id}/enroll",
    responses((status = 200, body = EnrollResponse), (status = 404)))]
pub async fn enroll(
    State(state): State<AppState>,
    Learner(learner_id): Learner,
    Path(id): Path<i64>,
) -> Result<Json<EnrollResponse>, Error> {
    let created = learner::enroll(&state.db, &learner_id, id).await?;
    Ok(Json(EnrollResponse {
        already_enrolled: !created,
    }))
}
