//! Decoration tracking: id allocation, option records, and the two interval
//! trees (overview-ruler-visible vs. not).
//!
//! The tracker works purely in code-unit offsets; the model facade converts
//! to and from positions. Every decoration lives in exactly one tree, chosen
//! by whether its options carry an overview-ruler entry; an option change
//! that toggles that membership moves the node between trees.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;
use vellum_tree::{IntervalTree, NodeData, NodeId, Stickiness};

/// Interned-option counter. Zero is reserved for "not interned".
static LAST_STATIC_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverviewRulerLane {
    Left,
    Center,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverviewRulerOptions {
    pub color: String,
    pub position: OverviewRulerLane,
}

/// Immutable option bundle attached to a decoration.
#[derive(Debug, Clone, Default)]
pub struct DecorationOptions {
    pub class_name: Option<String>,
    pub hover_message: Option<String>,
    pub is_whole_line: bool,
    pub show_if_collapsed: bool,
    /// Collapse to the edit start when an edit rewrites the whole range.
    pub collapse_on_replace: bool,
    /// Validation decorations can be filtered out of queries.
    pub is_for_validation: bool,
    pub overview_ruler: Option<OverviewRulerOptions>,
    pub stickiness: Stickiness,
    pub static_id: u64,
}

impl DecorationOptions {
    /// Intern an option bundle: sanitize once, stamp a static id so repeated
    /// use skips re-sanitization.
    pub fn register(mut options: DecorationOptions) -> Arc<DecorationOptions> {
        options.sanitize();
        options.static_id = LAST_STATIC_ID.fetch_add(1, Ordering::Relaxed) + 1;
        Arc::new(options)
    }

    fn normalized(options: Arc<DecorationOptions>) -> Arc<DecorationOptions> {
        if options.static_id != 0 {
            return options;
        }
        let mut fresh = (*options).clone();
        fresh.sanitize();
        Arc::new(fresh)
    }

    fn sanitize(&mut self) {
        if let Some(class_name) = &mut self.class_name {
            *class_name = sanitize_class_name(class_name);
        }
    }

    pub fn in_overview_ruler(&self) -> bool {
        self.overview_ruler.is_some()
    }
}

/// Replace every character outside `[A-Za-z0-9-]` with a space.
pub fn sanitize_class_name(input: &str) -> String {
    input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { ' ' })
        .collect()
}

/// A decoration as reported by queries, in offset space.
#[derive(Debug, Clone)]
pub struct TrackedDecoration {
    pub id: String,
    pub owner_id: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub options: Arc<DecorationOptions>,
}

#[derive(Clone)]
struct Record {
    node: NodeId,
    in_ruler: bool,
    owner_id: usize,
    options: Arc<DecorationOptions>,
}

pub struct DecorationsTracker {
    instance_letter: char,
    last_decoration_id: u64,
    /// Decorations not projected onto the overview ruler.
    t0: IntervalTree,
    /// Decorations with an overview-ruler entry.
    t1: IntervalTree,
    records: HashMap<String, Record>,
    node_ids_t0: HashMap<NodeId, String>,
    node_ids_t1: HashMap<NodeId, String>,
}

impl DecorationsTracker {
    pub fn new(instance_letter: char) -> Self {
        Self {
            instance_letter,
            last_decoration_id: 0,
            t0: IntervalTree::new(),
            t1: IntervalTree::new(),
            records: HashMap::new(),
            node_ids_t0: HashMap::new(),
            node_ids_t1: HashMap::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    fn next_id(&mut self) -> String {
        self.last_decoration_id += 1;
        format!("{};{}", self.instance_letter, self.last_decoration_id)
    }

    fn node_data(owner_id: usize, options: &DecorationOptions) -> NodeData {
        NodeData {
            owner_id,
            stickiness: options.stickiness,
            collapse_on_replace: options.collapse_on_replace,
            is_for_validation: options.is_for_validation,
        }
    }

    pub fn add(
        &mut self,
        owner_id: usize,
        start_offset: usize,
        end_offset: usize,
        options: Arc<DecorationOptions>,
    ) -> String {
        let options = DecorationOptions::normalized(options);
        let id = self.next_id();
        let in_ruler = options.in_overview_ruler();
        let data = Self::node_data(owner_id, &options);
        let tree = if in_ruler { &mut self.t1 } else { &mut self.t0 };
        let node = tree.alloc(data);
        tree.insert(node, start_offset, end_offset);
        if in_ruler {
            self.node_ids_t1.insert(node, id.clone());
        } else {
            self.node_ids_t0.insert(node, id.clone());
        }
        self.records.insert(
            id.clone(),
            Record { node, in_ruler, owner_id, options },
        );
        trace!(target: "model.decorations", id = %id, start_offset, end_offset, "add");
        id
    }

    /// Remove by id. Unknown ids are silently ignored.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(record) = self.records.remove(id) else {
            return false;
        };
        if record.in_ruler {
            self.t1.delete(record.node);
            self.t1.dealloc(record.node);
            self.node_ids_t1.remove(&record.node);
        } else {
            self.t0.delete(record.node);
            self.t0.dealloc(record.node);
            self.node_ids_t0.remove(&record.node);
        }
        true
    }

    pub fn change_range(&mut self, id: &str, start_offset: usize, end_offset: usize) -> bool {
        let Some(record) = self.records.get(id).cloned() else {
            return false;
        };
        let tree = if record.in_ruler { &mut self.t1 } else { &mut self.t0 };
        tree.delete(record.node);
        tree.insert(record.node, start_offset, end_offset);
        true
    }

    pub fn change_options(&mut self, id: &str, options: Arc<DecorationOptions>) -> bool {
        let Some(record) = self.records.get(id).cloned() else {
            return false;
        };
        let (start, end) = self.offsets_of(&record);
        self.reinit(id, record.owner_id, start, end, options)
    }

    /// Re-point an existing decoration at a new range, options and owner,
    /// keeping its id.
    pub fn reinit(
        &mut self,
        id: &str,
        owner_id: usize,
        start_offset: usize,
        end_offset: usize,
        options: Arc<DecorationOptions>,
    ) -> bool {
        let Some(mut record) = self.records.get(id).cloned() else {
            return false;
        };
        let options = DecorationOptions::normalized(options);
        let in_ruler = options.in_overview_ruler();
        let data = Self::node_data(owner_id, &options);
        if in_ruler == record.in_ruler {
            let tree = if in_ruler { &mut self.t1 } else { &mut self.t0 };
            tree.delete(record.node);
            tree.set_data(record.node, data);
            tree.insert(record.node, start_offset, end_offset);
        } else {
            // Ruler membership flipped: move the node between trees.
            if record.in_ruler {
                self.t1.delete(record.node);
                self.t1.dealloc(record.node);
                self.node_ids_t1.remove(&record.node);
                let node = self.t0.alloc(data);
                self.t0.insert(node, start_offset, end_offset);
                self.node_ids_t0.insert(node, id.to_string());
                record.node = node;
            } else {
                self.t0.delete(record.node);
                self.t0.dealloc(record.node);
                self.node_ids_t0.remove(&record.node);
                let node = self.t1.alloc(data);
                self.t1.insert(node, start_offset, end_offset);
                self.node_ids_t1.insert(node, id.to_string());
                record.node = node;
            }
            record.in_ruler = in_ruler;
        }
        record.owner_id = owner_id;
        record.options = options;
        self.records.insert(id.to_string(), record);
        true
    }

    pub fn remove_all_with_owner(&mut self, owner_id: usize) -> bool {
        let ids: Vec<String> = self
            .records
            .iter()
            .filter(|(_, r)| r.owner_id == owner_id)
            .map(|(id, _)| id.clone())
            .collect();
        let any = !ids.is_empty();
        for id in ids {
            self.remove(&id);
        }
        any
    }

    /// Index-paired batch replace: reuse ids while both sides have entries,
    /// then pure removes or pure inserts for the excess.
    pub fn delta(
        &mut self,
        owner_id: usize,
        old_ids: &[String],
        new_decorations: Vec<(usize, usize, Arc<DecorationOptions>)>,
    ) -> Vec<String> {
        let mut result = Vec::with_capacity(new_decorations.len());
        let mut old_index = 0;
        let mut new_iter = new_decorations.into_iter();
        let mut pending_new = new_iter.next();

        while old_index < old_ids.len() && pending_new.is_some() {
            let id = &old_ids[old_index];
            if !self.records.contains_key(id) {
                // Garbage id: consumed without pairing.
                old_index += 1;
                continue;
            }
            let (start, end, options) = pending_new.take().expect("checked is_some");
            self.reinit(id, owner_id, start, end, options);
            result.push(id.clone());
            old_index += 1;
            pending_new = new_iter.next();
        }
        while old_index < old_ids.len() {
            self.remove(&old_ids[old_index]);
            old_index += 1;
        }
        while let Some((start, end, options)) = pending_new.take() {
            result.push(self.add(owner_id, start, end, options));
            pending_new = new_iter.next();
        }
        result
    }

    pub fn accept_replace(
        &mut self,
        offset: usize,
        length: usize,
        text_length: usize,
        force_move_markers: bool,
    ) {
        self.t0
            .accept_replace(offset, length, text_length, force_move_markers);
        self.t1
            .accept_replace(offset, length, text_length, force_move_markers);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn options_of(&self, id: &str) -> Option<Arc<DecorationOptions>> {
        self.records.get(id).map(|r| r.options.clone())
    }

    pub fn owner_of(&self, id: &str) -> Option<usize> {
        self.records.get(id).map(|r| r.owner_id)
    }

    pub fn resolve_offsets(&self, id: &str, version: u64) -> Option<(usize, usize)> {
        let record = self.records.get(id)?;
        let tree = if record.in_ruler { &self.t1 } else { &self.t0 };
        Some(tree.resolve(record.node, version))
    }

    fn offsets_of(&self, record: &Record) -> (usize, usize) {
        let tree = if record.in_ruler { &self.t1 } else { &self.t0 };
        tree.current_interval(record.node)
    }

    pub fn all_ids(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Rewrite the stored offsets of a decoration in place (used when the
    /// EOL change re-bases every offset).
    pub fn reset_offsets(&mut self, id: &str, start_offset: usize, end_offset: usize) {
        self.change_range(id, start_offset, end_offset);
    }

    /// Query decorations overlapping `[lo, hi]`, sorted by interval.
    pub fn decorations_in(
        &self,
        lo: usize,
        hi: usize,
        owner_filter: usize,
        filter_out_validation: bool,
        overview_ruler_only: bool,
        version: u64,
    ) -> Vec<TrackedDecoration> {
        let mut out = Vec::new();
        if !overview_ruler_only {
            self.collect(
                &self.t0,
                &self.node_ids_t0,
                Some((lo, hi)),
                owner_filter,
                filter_out_validation,
                version,
                &mut out,
            );
        }
        self.collect(
            &self.t1,
            &self.node_ids_t1,
            Some((lo, hi)),
            owner_filter,
            filter_out_validation,
            version,
            &mut out,
        );
        out.sort_by_key(|d| (d.start_offset, d.end_offset));
        out
    }

    /// All decorations, sorted by interval.
    pub fn all_decorations(
        &self,
        owner_filter: usize,
        filter_out_validation: bool,
        overview_ruler_only: bool,
        version: u64,
    ) -> Vec<TrackedDecoration> {
        let mut out = Vec::new();
        if !overview_ruler_only {
            self.collect(
                &self.t0,
                &self.node_ids_t0,
                None,
                owner_filter,
                filter_out_validation,
                version,
                &mut out,
            );
        }
        self.collect(
            &self.t1,
            &self.node_ids_t1,
            None,
            owner_filter,
            filter_out_validation,
            version,
            &mut out,
        );
        out.sort_by_key(|d| (d.start_offset, d.end_offset));
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn collect(
        &self,
        tree: &IntervalTree,
        ids: &HashMap<NodeId, String>,
        window: Option<(usize, usize)>,
        owner_filter: usize,
        filter_out_validation: bool,
        version: u64,
        out: &mut Vec<TrackedDecoration>,
    ) {
        let nodes = match window {
            Some((lo, hi)) => {
                tree.interval_search(lo, hi, owner_filter, filter_out_validation, version)
            }
            None => tree.search(owner_filter, filter_out_validation, version),
        };
        for node in nodes {
            let Some(id) = ids.get(&node) else { continue };
            let Some(record) = self.records.get(id) else { continue };
            let (start_offset, end_offset) = tree.resolve(node, version);
            out.push(TrackedDecoration {
                id: id.clone(),
                owner_id: record.owner_id,
                start_offset,
                end_offset,
                options: record.options.clone(),
            });
        }
    }
}
