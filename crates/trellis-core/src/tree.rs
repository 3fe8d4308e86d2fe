//! Derived folder tree.
//!
//! The flat `Folder`/`Task` collections are the source of truth; the tree
//! is a throwaway view rebuilt after every change. Nodes own clones, never
//! references back into the collections, so consumers can hold a tree
//! across later mutations.

use crate::model::{Folder, Task};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A folder with its resolved children and the tasks filed under it.
#[derive(Debug, Clone, PartialEq)]
pub struct FolderNode {
    pub folder: Folder,
    pub children: Vec<FolderNode>,
    pub tasks: Vec<Task>,
}

impl FolderNode {
    pub fn id(&self) -> Uuid {
        self.folder.id
    }
}

/// Build the folder forest from the flat collections.
///
/// Pass 1 indexes folders by id and files each task under its folder, both
/// single scans. Pass 2 links every folder under its parent, promoting to
/// root any folder whose parent is missing (dangling `parent_id`s are
/// promoted, never dropped). Assembly carries a visited set, so a parent
/// cycle in stored data degrades to a root-promoted subtree instead of
/// recursing forever, and every folder lands in exactly one position.
///
/// Sibling lists (and the root list) are stable-sorted by ascending
/// `sort_order`, so ties keep the collection's relative order.
pub fn build_tree(folders: &[Folder], tasks: &[Task]) -> Vec<FolderNode> {
    let known: HashSet<Uuid> = folders.iter().map(|f| f.id).collect();

    let mut tasks_by_folder: HashMap<Uuid, Vec<Task>> = HashMap::new();
    for task in tasks {
        if let Some(folder_id) = task.folder_id {
            if known.contains(&folder_id) {
                tasks_by_folder.entry(folder_id).or_default().push(task.clone());
            }
        }
    }

    // Child indices in collection order, keyed by parent. Only live
    // parents get an entry; everything else is a root.
    let mut children_of: HashMap<Uuid, Vec<usize>> = HashMap::new();
    let mut root_indices = Vec::new();
    for (index, folder) in folders.iter().enumerate() {
        match folder.parent_id {
            Some(parent_id) if known.contains(&parent_id) && parent_id != folder.id => {
                children_of.entry(parent_id).or_default().push(index);
            }
            _ => root_indices.push(index),
        }
    }

    let mut visited = HashSet::new();
    let mut roots: Vec<FolderNode> = root_indices
        .into_iter()
        .filter_map(|index| {
            assemble(folders, &children_of, &mut tasks_by_folder, &mut visited, index)
        })
        .collect();

    // Anything unvisited sits on a parent cycle in stored data. Promote
    // each remaining folder to root; the visited set keeps every folder
    // placed exactly once.
    for index in 0..folders.len() {
        if !visited.contains(&folders[index].id) {
            if let Some(node) =
                assemble(folders, &children_of, &mut tasks_by_folder, &mut visited, index)
            {
                roots.push(node);
            }
        }
    }

    roots.sort_by_key(|node| node.folder.sort_order);
    roots
}

fn assemble(
    folders: &[Folder],
    children_of: &HashMap<Uuid, Vec<usize>>,
    tasks_by_folder: &mut HashMap<Uuid, Vec<Task>>,
    visited: &mut HashSet<Uuid>,
    index: usize,
) -> Option<FolderNode> {
    let folder = &folders[index];
    if !visited.insert(folder.id) {
        return None;
    }

    let mut children: Vec<FolderNode> = children_of
        .get(&folder.id)
        .into_iter()
        .flatten()
        .filter_map(|&child| assemble(folders, children_of, tasks_by_folder, visited, child))
        .collect();
    children.sort_by_key(|node| node.folder.sort_order);

    Some(FolderNode {
        folder: folder.clone(),
        children,
        tasks: tasks_by_folder.remove(&folder.id).unwrap_or_default(),
    })
}

/// Depth-first lookup over the forest.
pub fn find_by_id(forest: &[FolderNode], id: Uuid) -> Option<&FolderNode> {
    for node in forest {
        if node.id() == id {
            return Some(node);
        }
        if let Some(found) = find_by_id(&node.children, id) {
            return Some(found);
        }
    }
    None
}

/// Pre-order traversal producing a flat list, for search and autocomplete.
pub fn flatten(forest: &[FolderNode]) -> Vec<&FolderNode> {
    fn walk<'a>(nodes: &'a [FolderNode], out: &mut Vec<&'a FolderNode>) {
        for node in nodes {
            out.push(node);
            walk(&node.children, out);
        }
    }
    let mut out = Vec::new();
    walk(forest, &mut out);
    out
}

/// Every descendant folder id below `id`, pre-order, excluding `id`
/// itself. Used by aggregation views that roll a folder's own items up
/// with all of its descendants' items.
pub fn descendant_ids(forest: &[FolderNode], id: Uuid) -> Vec<Uuid> {
    let Some(node) = find_by_id(forest, id) else {
        return Vec::new();
    };
    flatten(&node.children).iter().map(|n| n.id()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FolderKind, Priority, TaskKind, TaskStatus};
    use chrono::Utc;

    fn folder(title: &str, parent_id: Option<Uuid>, sort_order: i64) -> Folder {
        Folder {
            id: Uuid::new_v4(),
            owner: Uuid::nil(),
            parent_id,
            title: title.into(),
            kind: FolderKind::Generic,
            color: None,
            icon: None,
            sort_order,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn task(title: &str, folder_id: Option<Uuid>) -> Task {
        Task {
            id: Uuid::new_v4(),
            owner: Uuid::nil(),
            folder_id,
            title: title.into(),
            content: String::new(),
            kind: TaskKind::Task,
            status: TaskStatus::Todo,
            done: false,
            pinned: false,
            due_date: None,
            scheduled_date: None,
            priority: Priority::Medium,
            tags: None,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_input_yields_empty_forest() {
        assert!(build_tree(&[], &[]).is_empty());
    }

    #[test]
    fn nests_and_sorts_by_sort_order() {
        let root_b = folder("b", None, 2);
        let root_a = folder("a", None, 1);
        let child_late = folder("late", Some(root_a.id), 5);
        let child_early = folder("early", Some(root_a.id), 1);
        let forest = build_tree(
            &[root_b.clone(), root_a.clone(), child_late.clone(), child_early.clone()],
            &[],
        );

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].folder.title, "a");
        assert_eq!(forest[1].folder.title, "b");
        let children: Vec<&str> =
            forest[0].children.iter().map(|c| c.folder.title.as_str()).collect();
        assert_eq!(children, ["early", "late"]);
    }

    #[test]
    fn sort_is_stable_on_ties() {
        let first = folder("first", None, 1);
        let second = folder("second", None, 1);
        let forest = build_tree(&[first.clone(), second.clone()], &[]);
        assert_eq!(forest[0].id(), first.id);
        assert_eq!(forest[1].id(), second.id);
    }

    #[test]
    fn orphans_are_promoted_not_dropped() {
        let dangling = folder("orphan", Some(Uuid::new_v4()), 0);
        let forest = build_tree(&[dangling.clone()], &[]);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].id(), dangling.id);
    }

    #[test]
    fn every_folder_appears_exactly_once() {
        let a = folder("a", None, 0);
        let b = folder("b", Some(a.id), 0);
        let c = folder("c", Some(b.id), 0);
        let dangling = folder("d", Some(Uuid::new_v4()), 0);
        let folders = vec![c.clone(), dangling.clone(), a.clone(), b.clone()];

        let forest = build_tree(&folders, &[]);
        let mut seen: Vec<Uuid> = flatten(&forest).iter().map(|n| n.id()).collect();
        seen.sort();
        let mut expected: Vec<Uuid> = folders.iter().map(|f| f.id).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn stored_cycle_does_not_recurse_forever() {
        let mut a = folder("a", None, 0);
        let b = folder("b", Some(a.id), 0);
        a.parent_id = Some(b.id);

        let forest = build_tree(&[a.clone(), b.clone()], &[]);
        assert_eq!(flatten(&forest).len(), 2);
    }

    #[test]
    fn self_parent_is_promoted_to_root() {
        let mut a = folder("a", None, 0);
        a.parent_id = Some(a.id);

        let forest = build_tree(&[a.clone()], &[]);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn descendant_ids_ignores_input_order() {
        let root = folder("root", None, 0);
        let child = folder("child", Some(root.id), 0);
        let grandchild = folder("grandchild", Some(child.id), 0);

        for folders in [
            vec![root.clone(), child.clone(), grandchild.clone()],
            vec![grandchild.clone(), child.clone(), root.clone()],
            vec![child.clone(), root.clone(), grandchild.clone()],
        ] {
            let forest = build_tree(&folders, &[]);
            let mut ids = descendant_ids(&forest, root.id);
            ids.sort();
            let mut expected = vec![child.id, grandchild.id];
            expected.sort();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn descendant_ids_of_unknown_folder_is_empty() {
        let root = folder("root", None, 0);
        let forest = build_tree(&[root], &[]);
        assert!(descendant_ids(&forest, Uuid::new_v4()).is_empty());
    }

    #[test]
    fn tasks_are_filed_under_their_folder() {
        let root = folder("root", None, 0);
        let filed = task("filed", Some(root.id));
        let inbox = task("inbox", None);

        let forest = build_tree(&[root.clone()], &[filed.clone(), inbox]);
        let node = find_by_id(&forest, root.id).unwrap();
        assert_eq!(node.tasks.len(), 1);
        assert_eq!(node.tasks[0].id, filed.id);
    }

    #[test]
    fn find_by_id_reaches_nested_nodes() {
        let root = folder("root", None, 0);
        let child = folder("child", Some(root.id), 0);
        let forest = build_tree(&[root.clone(), child.clone()], &[]);
        assert_eq!(find_by_id(&forest, child.id).unwrap().id(), child.id);
        assert!(find_by_id(&forest, Uuid::new_v4()).is_none());
    }
}
