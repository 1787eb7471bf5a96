use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::Error;

/// Closed set of material kinds. Anything else in the column is an
/// authoring error and fails row decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MaterialKind {
    Video,
    Image,
    Pdf,
    Link,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CourseRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub category: String,
    pub is_published: bool,
    pub has_evaluation: bool,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRow {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub order_index: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRow {
    pub id: i64,
    pub module_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub duration_minutes: i64,
    pub order_index: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterialRow {
    pub id: i64,
    pub chapter_id: i64,
    pub title: String,
    pub kind: MaterialKind,
    pub url: String,
    pub description: Option<String>,
    pub order_index: i64,
}

#[derive(Debug, Clone)]
pub struct ChapterNode {
    pub chapter: ChapterRow,
    pub materials: Vec<MaterialRow>,
}

#[derive(Debug, Clone)]
pub struct ModuleNode {
    pub module: ModuleRow,
    pub chapters: Vec<ChapterNode>,
}

/// A course with its modules and chapters in canonical order. Construction
/// via [`CourseTree::assemble`] is the only place ordering is decided;
/// every derived view downstream iterates the tree as-is.
#[derive(Debug, Clone)]
pub struct CourseTree {
    pub course: CourseRow,
    pub modules: Vec<ModuleNode>,
}

impl CourseTree {
    /// Groups raw rows under their parents and sorts each level by its
    /// order key. Duplicate order keys within one scope mean the intended
    /// order is ambiguous, that is an authoring error and the whole tree
    /// is rejected rather than silently re-sorted.
    pub fn assemble(
        course: CourseRow,
        mut modules: Vec<ModuleRow>,
        chapters: Vec<ChapterRow>,
        materials: Vec<MaterialRow>,
    ) -> Result<Self, Error> {
        modules.sort_by_key(|m| m.order_index);
        for pair in modules.windows(2) {
            if pair[0].order_index == pair[1].order_index {
                return Err(Error::DataIntegrity(format!(
                    "course {} has modules {} and {} with the same order index {}",
                    course.id, pair[0].id, pair[1].id, pair[0].order_index
                )));
            }
        }

        let mut modules: Vec<ModuleNode> = modules
            .into_iter()
            .map(|module| ModuleNode {
                module,
                chapters: Vec::new(),
            })
            .collect();

        for chapter in chapters {
            let Some(node) = modules
                .iter_mut()
                .find(|m| m.module.id == chapter.module_id)
            else {
                return Err(Error::DataIntegrity(format!(
                    "chapter {} references module {} outside course {}",
                    chapter.id, chapter.module_id, course.id
                )));
            };
            node.chapters.push(ChapterNode {
                chapter,
                materials: Vec::new(),
            });
        }

        for node in &mut modules {
            node.chapters.sort_by_key(|c| c.chapter.order_index);
            for pair in node.chapters.windows(2) {
                if pair[0].chapter.order_index == pair[1].chapter.order_index {
                    return Err(Error::DataIntegrity(format!(
                        "module {} has chapters {} and {} with the same order index {}",
                        node.module.id,
                        pair[0].chapter.id,
                        pair[1].chapter.id,
                        pair[0].chapter.order_index
                    )));
                }
            }
        }

        for material in materials {
            if let Some(node) = modules
                .iter_mut()
                .flat_map(|m| m.chapters.iter_mut())
                .find(|c| c.chapter.id == material.chapter_id)
            {
                node.materials.push(material);
            }
        }
        for node in modules.iter_mut().flat_map(|m| m.chapters.iter_mut()) {
            node.materials.sort_by_key(|m| m.order_index);
        }

        Ok(CourseTree { course, modules })
    }

    /// All chapters across all modules, in canonical order.
    pub fn chapters(&self) -> impl Iterator<Item = &ChapterNode> {
        self.modules.iter().flat_map(|m| m.chapters.iter())
    }

    pub fn total_chapters(&self) -> usize {
        self.chapters().count()
    }

    pub fn total_duration(&self) -> i64 {
        self.chapters().map(|c| c.chapter.duration_minutes).sum()
    }
}
