//! Response shapes shared by the course and chapter views.

use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;

use crate::course::model::{ChapterNode, CourseRow, MaterialRow};
use crate::learner::{Completion, Enrollment, EnrollmentStatus};
use crate::sequencing::ModuleState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub category: String,
    pub has_evaluation: bool,
    pub total_chapters: i64,
    pub total_duration: i64,
    pub is_enrolled: bool,
    pub is_completed: bool,
    pub progress_percent: u8,
}

impl CourseSummary {
    pub fn new(
        course: &CourseRow,
        total_chapters: i64,
        total_duration: i64,
        enrollment: Option<&Enrollment>,
        progress_percent: u8,
    ) -> Self {
        Self {
            id: course.id,
            title: course.title.clone(),
            slug: course.slug.clone(),
            description: course.description.clone(),
            thumbnail_url: course.thumbnail_url.clone(),
            category: course.category.clone(),
            has_evaluation: course.has_evaluation,
            total_chapters,
            total_duration,
            is_enrolled: enrollment.is_some(),
            is_completed: enrollment
                .is_some_and(|e| e.status == EnrollmentStatus::Completed),
            progress_percent,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseBrief {
    pub id: i64,
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleView {
    pub id: i64,
    pub title: String,
    pub order_index: i64,
    pub is_unlocked: bool,
    pub is_completed: bool,
    pub completed_chapters: usize,
    pub total_chapters: usize,
    pub chapters: Vec<ChapterView>,
}

impl ModuleView {
    pub fn new(
        title: &str,
        order_index: i64,
        state: &ModuleState,
        chapters: Vec<ChapterView>,
    ) -> Self {
        Self {
            id: state.module_id,
            title: title.to_string(),
            order_index,
            is_unlocked: state.is_unlocked,
            is_completed: state.is_completed,
            completed_chapters: state.completed_chapters,
            total_chapters: state.total_chapters,
            chapters,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChapterView {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: i64,
    pub order_index: i64,
    pub is_completed: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    pub watch_time_seconds: i64,
    pub materials: Vec<MaterialRow>,
}

impl ChapterView {
    pub fn new(node: &ChapterNode, completion: Option<&Completion>) -> Self {
        Self {
            id: node.chapter.id,
            module_id: node.chapter.module_id,
            title: node.chapter.title.clone(),
            description: node.chapter.description.clone(),
            video_url: node.chapter.video_url.clone(),
            duration_minutes: node.chapter.duration_minutes,
            order_index: node.chapter.order_index,
            is_completed: completion.is_some_and(|c| c.is_completed),
            completed_at: completion.and_then(|c| c.completed_at),
            watch_time_seconds: completion.map_or(0, |c| c.watch_time_seconds),
            materials: node.materials.clone(),
        }
    }
}

/// Prev/next links derived from the flattened chapter order. The same
/// order backs the course view, so navigation agrees from any entry point.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Navigation {
    /// 1-based position in the flattened order.
    pub current_index: usize,
    pub total_chapters: usize,
    pub prev_chapter_id: Option<i64>,
    pub next_chapter_id: Option<i64>,
}
