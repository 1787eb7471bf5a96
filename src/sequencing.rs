//! Derived progression state: module unlocking, the flattened chapter
//! order, the learner's current position, and aggregate completion.
//!
//! Everything here is a pure function of the course tree and the persisted
//! completion facts, recomputed on every call. No derived value is ever
//! stored, so the views cannot drift from the facts they are derived from.

use std::collections::HashMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::course::model::CourseTree;
use crate::learner::Completion;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub module_index: usize,
    pub chapter_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleState {
    pub module_id: i64,
    pub is_unlocked: bool,
    pub is_completed: bool,
    pub completed_chapters: usize,
    pub total_chapters: usize,
}

#[derive(Debug, Clone)]
pub struct Sequencing {
    /// One entry per module, in canonical order.
    pub modules: Vec<ModuleState>,
    /// All chapter ids across modules in canonical order. The single
    /// source of truth for prev/next navigation, identical no matter
    /// which view derives it.
    pub flat_order: Vec<i64>,
    /// First incomplete chapter in an unlocked module; the last chapter
    /// once everything is complete (resolves to "review"); `None` only
    /// for a course with no chapters.
    pub current: Option<Position>,
}

pub fn compute_sequencing(
    tree: &CourseTree,
    completions: &HashMap<i64, Completion>,
) -> Sequencing {
    let done = |id: i64| completions.get(&id).is_some_and(|c| c.is_completed);

    let mut modules = Vec::with_capacity(tree.modules.len());
    let mut flat_order = Vec::new();
    let mut current = None;
    let mut last_position = None;
    let mut all_prior_complete = true;

    for (module_index, node) in tree.modules.iter().enumerate() {
        let total = node.chapters.len();
        let completed = node
            .chapters
            .iter()
            .filter(|c| done(c.chapter.id))
            .count();
        let is_unlocked = all_prior_complete;

        for (chapter_index, ch) in node.chapters.iter().enumerate() {
            flat_order.push(ch.chapter.id);
            last_position = Some(Position {
                module_index,
                chapter_index,
            });
            if current.is_none() && is_unlocked && !done(ch.chapter.id) {
                current = Some(Position {
                    module_index,
                    chapter_index,
                });
            }
        }

        // an empty module gates vacuously but is never reported completed
        all_prior_complete = all_prior_complete && completed == total;

        modules.push(ModuleState {
            module_id: node.module.id,
            is_unlocked,
            is_completed: total > 0 && completed == total,
            completed_chapters: completed,
            total_chapters: total,
        });
    }

    Sequencing {
        modules,
        flat_order,
        current: current.or(last_position),
    }
}

/// Rounded completion percentage; 0 when there is nothing to complete.
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((100.0 * completed as f64) / total as f64).round() as u8
}

pub fn compute_progress(tree: &CourseTree, completions: &HashMap<i64, Completion>) -> u8 {
    let total = tree.total_chapters();
    let completed = tree
        .chapters()
        .filter(|c| {
            completions
                .get(&c.chapter.id)
                .is_some_and(|p| p.is_completed)
        })
        .count();
    percent(completed, total)
}
