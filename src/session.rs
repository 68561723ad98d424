//! Editor session state.
//!
//! [`EditorSession`] owns the annotation store, the view index for the
//! displayed image, and the current selection. Every shape edit goes
//! through the session so the data model and the tree change as one
//! logical transaction: a shape committed to the model appears in the
//! tree in the same call, and a tree restructure (drag-and-drop) is
//! written back to the model before the call returns.

use crate::error::BoxlabelError;
use crate::model::{AnnotationStore, ImageMetaData, ShapeData};
use crate::tree::{NodeId, ObjectTree, ReparentRejection};

/// The mutable state behind the editor UI.
#[derive(Default)]
pub struct EditorSession {
    store: AnnotationStore,
    tree: ObjectTree,
    current_image: Option<usize>,
    selected: Option<NodeId>,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AnnotationStore {
        &mut self.store
    }

    pub fn tree(&self) -> &ObjectTree {
        &self.tree
    }

    pub fn current_image(&self) -> Option<usize> {
        self.current_image
    }

    /// The currently selected tree node, if any.
    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Marks a node as the active selection.
    pub fn select(&mut self, id: NodeId) {
        self.selected = Some(id);
    }

    /// Clears the active selection.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Installs a freshly scanned image folder and displays its first
    /// image.
    pub fn load_image_folder(&mut self, images: Vec<ImageMetaData>) {
        self.store.set_image_folder(images);
        self.tree = ObjectTree::new();
        self.selected = None;
        self.current_image = None;
        if !self.store.images().is_empty() {
            self.display_image(0).expect("index 0 exists");
        }
    }

    /// Switches the displayed image: the outgoing image's tree is written
    /// back to the model, then the tree is rebuilt for the incoming
    /// image's shape list.
    pub fn display_image(&mut self, index: usize) -> Result<(), BoxlabelError> {
        let len = self.store.images().len();
        if index >= len {
            return Err(BoxlabelError::ImageIndexOutOfRange { index, len });
        }

        self.commit_tree()?;
        let shapes = self.store.images()[index].shapes.clone();
        self.tree.rebuild_for_image(&shapes);
        self.current_image = Some(index);
        self.selected = None;
        Ok(())
    }

    /// Re-syncs the tree from the model after an import touched the
    /// displayed image.
    pub fn refresh_tree(&mut self) {
        if let Some(index) = self.current_image {
            let shapes = self.store.images()[index].shapes.clone();
            self.tree.rebuild_for_image(&shapes);
            self.selected = None;
        }
    }

    /// Commits a finalized drawing: the shape enters the model and the
    /// tree in one step, and its node becomes the selection.
    pub fn add_shape(&mut self, shape: ShapeData) -> Result<NodeId, BoxlabelError> {
        let image_index = self.require_image()?;
        self.store.add_shape(image_index, shape.clone())?;
        let node = self.tree.insert_shape(&shape);
        self.selected = Some(node);
        Ok(node)
    }

    /// Removes a tree node (shape or whole category group) and writes the
    /// surviving shape list back to the model.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), BoxlabelError> {
        let image_index = self.require_image()?;
        self.tree.remove_node(id);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.store
            .replace_all_for_image(image_index, self.tree.extract_shapes())
    }

    /// Applies a drag-and-drop reparent; on success the model is updated
    /// and, for shape drags, the moved node becomes the selection.
    pub fn reparent(
        &mut self,
        dragged: NodeId,
        target: Option<NodeId>,
    ) -> Result<Result<NodeId, ReparentRejection>, BoxlabelError> {
        let image_index = self.require_image()?;
        let outcome = self.tree.reparent(dragged, target);
        if let Ok(node) = outcome {
            if self.tree.is_shape_node(node) {
                self.selected = Some(node);
            }
            self.store
                .replace_all_for_image(image_index, self.tree.extract_shapes())?;
        }
        Ok(outcome)
    }

    /// Moves a shape node to a different (existing) category: the model
    /// is updated and the tree regrouped.
    pub fn recategorize_node(
        &mut self,
        id: NodeId,
        new_category: &str,
    ) -> Result<(), BoxlabelError> {
        let image_index = self.require_image()?;
        if self.store.category(new_category).is_none() {
            return Err(BoxlabelError::UnknownCategory {
                name: new_category.to_string(),
            });
        }
        if !self.tree.set_shape_category(id, new_category) {
            return Err(BoxlabelError::InvalidShapePath);
        }
        self.store
            .replace_all_for_image(image_index, self.tree.extract_shapes())?;
        self.refresh_tree();
        Ok(())
    }

    /// Toggles a node's visibility (cascading per the tree contract).
    pub fn set_toggle(&mut self, id: NodeId, on: bool) {
        self.tree.set_toggle(id, on);
    }

    fn commit_tree(&mut self) -> Result<(), BoxlabelError> {
        if let Some(index) = self.current_image {
            self.store
                .replace_all_for_image(index, self.tree.extract_shapes())?;
        }
        Ok(())
    }

    fn require_image(&self) -> Result<usize, BoxlabelError> {
        self.current_image
            .ok_or(BoxlabelError::ImageIndexOutOfRange {
                index: 0,
                len: self.store.images().len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RectXYXY;

    fn session_with_images(count: usize) -> EditorSession {
        let mut session = EditorSession::new();
        session.load_image_folder(
            (0..count)
                .map(|i| ImageMetaData::new(format!("img_{i}.jpg"), "images", 640, 480, 3))
                .collect(),
        );
        session
    }

    fn unit_box(category: &str) -> ShapeData {
        ShapeData::new_box(category, RectXYXY::from_xyxy(0.25, 0.25, 0.5, 0.5))
    }

    #[test]
    fn add_shape_updates_model_and_tree_and_selection() {
        let mut session = session_with_images(2);
        session
            .store_mut()
            .add_category("Test", None)
            .expect("add category");

        let node = session.add_shape(unit_box("Test")).expect("add shape");
        assert_eq!(session.selected(), Some(node));
        assert_eq!(session.store().shape_count("Test"), 1);
        assert_eq!(session.tree().root_children().len(), 1);
    }

    #[test]
    fn image_switch_reconstructs_the_tree() {
        let mut session = session_with_images(2);
        session
            .store_mut()
            .add_category("Test", None)
            .expect("add category");
        session.add_shape(unit_box("Test")).expect("first");
        session.add_shape(unit_box("Test")).expect("second");
        let before = session.tree().snapshot();

        session.display_image(1).expect("switch away");
        assert!(session.tree().root_children().is_empty());

        session.display_image(0).expect("switch back");
        assert_eq!(session.tree().snapshot(), before);
    }

    #[test]
    fn remove_node_writes_back_to_model() {
        let mut session = session_with_images(1);
        session
            .store_mut()
            .add_category("Test", None)
            .expect("add category");
        let node = session.add_shape(unit_box("Test")).expect("add");

        session.remove_node(node).expect("remove");
        assert_eq!(session.store().shape_count("Test"), 0);
        assert!(!session.store().images()[0].has_annotations());
        assert_eq!(session.selected(), None);
    }

    #[test]
    fn reparent_writes_nesting_back_to_model() {
        let mut session = session_with_images(1);
        session.store_mut().add_category("Test", None).expect("cat");
        session.store_mut().add_category("Dummy", None).expect("cat");
        let test_node = session.add_shape(unit_box("Test")).expect("test shape");
        let dummy_node = session.add_shape(unit_box("Dummy")).expect("dummy shape");

        let outcome = session
            .reparent(test_node, Some(dummy_node))
            .expect("no model error");
        assert_eq!(outcome, Ok(test_node));
        assert_eq!(session.selected(), Some(test_node));

        let shapes = &session.store().images()[0].shapes;
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].category, "Dummy");
        assert_eq!(shapes[0].parts.len(), 1);
        assert_eq!(shapes[0].parts[0].category, "Test");
        // Counts are unchanged by restructuring.
        assert_eq!(session.store().shape_count("Test"), 1);
        assert_eq!(session.store().shape_count("Dummy"), 1);
    }

    #[test]
    fn recategorize_node_regroups_and_adjusts_counts() {
        let mut session = session_with_images(1);
        session.store_mut().add_category("Test", None).expect("cat");
        session.store_mut().add_category("Dummy", None).expect("cat");
        let node = session.add_shape(unit_box("Dummy")).expect("shape");

        session.recategorize_node(node, "Test").expect("recategorize");

        assert_eq!(session.store().shape_count("Test"), 1);
        assert_eq!(session.store().shape_count("Dummy"), 0);
        let roots = session.tree().root_children().to_vec();
        assert_eq!(roots.len(), 1);
        assert_eq!(session.tree().category_name(roots[0]), "Test");

        let err = session.recategorize_node(roots[0], "Dummy").unwrap_err();
        assert!(matches!(err, BoxlabelError::InvalidShapePath));
    }

    #[test]
    fn rejected_reparent_leaves_everything_untouched() {
        let mut session = session_with_images(1);
        session.store_mut().add_category("Test", None).expect("cat");
        let node = session.add_shape(unit_box("Test")).expect("shape");
        let before = session.tree().snapshot();

        let outcome = session.reparent(node, None).expect("no model error");
        assert_eq!(outcome, Err(ReparentRejection::NoOpDrop));
        assert_eq!(session.tree().snapshot(), before);
    }
}
