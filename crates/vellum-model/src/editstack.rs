//! Undo/redo bookkeeping.
//!
//! The stack stores *inverse* operations: each element groups every
//! `push_edit_operations` call between two `push_stack_element` markers.
//! The model owns edit application; this type only records what to replay
//! and the cursor/version bookkeeping around it.

use vellum_text::{EditOperation, Selection};

/// One undo group.
#[derive(Debug, Clone)]
pub struct StackElement {
    pub before_version_id: u64,
    pub before_cursor_state: Option<Vec<Selection>>,
    pub after_version_id: u64,
    pub after_cursor_state: Option<Vec<Selection>>,
    /// Inverse operations per recorded edit, oldest first. Undo replays them
    /// newest-first; each replay swaps the group for its own inverse so the
    /// element is always ready for the opposite direction.
    pub edit_groups: Vec<Vec<EditOperation>>,
}

#[derive(Debug, Default)]
pub struct EditStack {
    past: Vec<StackElement>,
    future: Vec<StackElement>,
    open: Option<StackElement>,
}

impl EditStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the currently open group. Redundant calls are harmless.
    pub fn push_stack_element(&mut self) {
        if let Some(element) = self.open.take() {
            self.past.push(element);
        }
    }

    /// Record one applied edit (its inverse operations) into the open group,
    /// creating the group if necessary. Clears the redo stack.
    pub fn push_edit(
        &mut self,
        before_version_id: u64,
        before_cursor_state: Option<Vec<Selection>>,
        inverse_operations: Vec<EditOperation>,
        after_version_id: u64,
        after_cursor_state: Option<Vec<Selection>>,
    ) {
        self.future.clear();
        let element = self.open.get_or_insert_with(|| StackElement {
            before_version_id,
            before_cursor_state,
            after_version_id,
            after_cursor_state: None,
            edit_groups: Vec::new(),
        });
        element.edit_groups.push(inverse_operations);
        element.after_version_id = after_version_id;
        element.after_cursor_state = after_cursor_state;
    }

    pub fn can_undo(&self) -> bool {
        self.open.is_some() || !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Take the newest undo group; the model replays and then returns it via
    /// [`Self::push_future`].
    pub fn take_undo(&mut self) -> Option<StackElement> {
        self.push_stack_element();
        self.past.pop()
    }

    pub fn push_future(&mut self, element: StackElement) {
        self.future.push(element);
    }

    /// Take the newest redo group; the model replays and then returns it via
    /// [`Self::push_past`].
    pub fn take_redo(&mut self) -> Option<StackElement> {
        self.future.pop()
    }

    pub fn push_past(&mut self, element: StackElement) {
        self.past.push(element);
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.open = None;
    }
}
