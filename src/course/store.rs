use std::collections::HashMap;

use sqlx::SqlitePool;

use super::model::{ChapterRow, CourseRow, CourseTree, MaterialRow, ModuleRow};
use crate::error::Error;

/// Loads a course with its full module/chapter/material tree in canonical
/// order. Does not filter on publication status, callers that serve the
/// public catalog check `is_published` themselves.
pub async fn load_course_tree(db: &SqlitePool, course_id: i64) -> Result<CourseTree, Error> {
    let course = sqlx::query_as::<_, CourseRow>(
        "select id, title, slug, description, thumbnail_url, category, is_published, \
         has_evaluation from course where id = ?",
    )
    .bind(course_id)
    .fetch_optional(db)
    .await?
    .ok_or(Error::not_found("course", course_id))?;

    let modules = sqlx::query_as::<_, ModuleRow>(
        "select id, course_id, title, order_index from module where course_id = ?",
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;

    let chapters = sqlx::query_as::<_, ChapterRow>(
        "select c.id, c.module_id, c.title, c.description, c.video_url, c.duration_minutes, \
         c.order_index from chapter c join module m on c.module_id = m.id where m.course_id = ?",
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;

    let materials = sqlx::query_as::<_, MaterialRow>(
        "select mt.id, mt.chapter_id, mt.title, mt.kind, mt.url, mt.description, mt.order_index \
         from material mt \
         join chapter c on mt.chapter_id = c.id \
         join module m on c.module_id = m.id \
         where m.course_id = ?",
    )
    .bind(course_id)
    .fetch_all(db)
    .await?;

    CourseTree::assemble(course, modules, chapters, materials)
}

pub async fn list_published_courses(db: &SqlitePool) -> Result<Vec<CourseRow>, Error> {
    let courses = sqlx::query_as::<_, CourseRow>(
        "select id, title, slug, description, thumbnail_url, category, is_published, \
         has_evaluation from course where is_published = 1 order by id",
    )
    .fetch_all(db)
    .await?;
    Ok(courses)
}

/// Per-course (chapter count, total duration minutes) for the catalog view.
pub async fn chapter_totals(db: &SqlitePool) -> Result<HashMap<i64, (i64, i64)>, Error> {
    let rows = sqlx::query_as::<_, (i64, i64, i64)>(
        "select m.course_id, count(c.id), coalesce(sum(c.duration_minutes), 0) \
         from module m left join chapter c on c.module_id = m.id group by m.course_id",
    )
    .fetch_all(db)
    .await?;
    Ok(rows
        .into_iter()
        .map(|(course_id, chapters, minutes)| (course_id, (chapters, minutes)))
        .collect())
}

pub async fn course_of_chapter(db: &SqlitePool, chapter_id: i64) -> Result<i64, Error> {
    sqlx::query_scalar::<_, i64>(
        "select m.course_id from chapter c join module m on c.module_id = m.id where c.id = ?",
    )
    .bind(chapter_id)
    .fetch_optional(db)
    .await?
    .ok_or(Error::not_found("chapter", chapter_id))
}
