//! Integration tests for the view index driven through an editor session,
//! following the drawing / hiding / nesting / reloading / deleting flow
//! of the editor UI.

mod common;

use boxlabel::model::ImageMetaData;
use boxlabel::session::EditorSession;
use boxlabel::tree::ReparentRejection;
use common::sample_box;

fn session_with_images(count: usize) -> EditorSession {
    let mut session = EditorSession::new();
    session.load_image_folder(
        (0..count)
            .map(|i| ImageMetaData::new(format!("img_{i}.jpg"), "images", 640, 480, 3))
            .collect(),
    );
    session
}

#[test]
fn drawing_nesting_and_image_switching_reconstructs_the_tree() {
    let mut session = session_with_images(2);
    session.store_mut().add_category("Test", None).expect("cat");
    session.store_mut().add_category("Dummy", None).expect("cat");

    // Draw three "Test" boxes and one "Dummy" box.
    for _ in 0..3 {
        session
            .add_shape(sample_box("Test", 0.25, 0.25, 0.5, 0.5))
            .expect("test shape");
    }
    let dummy_node = session
        .add_shape(sample_box("Dummy", 0.6, 0.6, 0.85, 0.85))
        .expect("dummy shape");

    let tree = session.tree();
    let test_group = tree.top_level_category("Test").expect("Test group");
    assert_eq!(tree.children(test_group).len(), 3);
    let third_test = tree.children(test_group)[2];

    // Nest the third "Test" shape under the "Dummy" shape.
    let outcome = session
        .reparent(third_test, Some(dummy_node))
        .expect("no model error");
    assert_eq!(outcome, Ok(third_test));
    assert_eq!(session.selected(), Some(third_test));

    let snapshot = session.tree().snapshot();

    // Switch away: the next image has no annotations.
    session.display_image(1).expect("switch");
    assert!(session.tree().root_children().is_empty());

    // Switch back: the old tree is exactly reconstructed.
    session.display_image(0).expect("switch back");
    assert_eq!(session.tree().snapshot(), snapshot);
}

#[test]
fn deleting_shapes_renumbers_and_collapses() {
    let mut session = session_with_images(1);
    session.store_mut().add_category("Test", None).expect("cat");
    for _ in 0..3 {
        session
            .add_shape(sample_box("Test", 0.1, 0.1, 0.3, 0.3))
            .expect("shape");
    }

    let group = session.tree().top_level_category("Test").expect("group");
    let first = session.tree().children(group)[0];
    session.remove_node(first).expect("delete first");

    let tree = session.tree();
    let children = tree.children(group).to_vec();
    assert_eq!(children.len(), 2);
    assert_eq!(tree.sequence_id(children[0]), Some(1));
    assert_eq!(tree.sequence_id(children[1]), Some(2));

    // Deleting the remaining shapes removes the category group itself.
    session.remove_node(children[0]).expect("delete");
    let last = session.tree().top_level_category("Test").expect("group");
    let last_child = session.tree().children(last)[0];
    session.remove_node(last_child).expect("delete last");

    assert!(session.tree().root_children().is_empty());
    assert!(!session.store().images()[0].has_annotations());
    assert_eq!(session.store().shape_count("Test"), 0);
}

#[test]
fn deleting_a_category_group_deletes_all_its_shapes() {
    let mut session = session_with_images(1);
    session.store_mut().add_category("Test", None).expect("cat");
    session.store_mut().add_category("Dummy", None).expect("cat");
    session
        .add_shape(sample_box("Test", 0.1, 0.1, 0.3, 0.3))
        .expect("shape");
    session
        .add_shape(sample_box("Dummy", 0.4, 0.4, 0.6, 0.6))
        .expect("shape");

    let dummy_group = session.tree().top_level_category("Dummy").expect("group");
    session.remove_node(dummy_group).expect("delete group");

    assert_eq!(session.tree().root_children().len(), 1);
    assert_eq!(session.store().shape_count("Dummy"), 0);
    assert_eq!(session.store().shape_count("Test"), 1);
}

#[test]
fn cascade_toggling_through_the_session() {
    let mut session = session_with_images(1);
    session.store_mut().add_category("Test", None).expect("cat");
    let first = session
        .add_shape(sample_box("Test", 0.1, 0.1, 0.3, 0.3))
        .expect("shape");
    let second = session
        .add_shape(sample_box("Test", 0.4, 0.4, 0.6, 0.6))
        .expect("shape");

    let group = session.tree().top_level_category("Test").expect("group");

    session.set_toggle(first, false);
    assert!(session.tree().is_toggled_on(group));

    session.set_toggle(second, false);
    assert!(!session.tree().is_toggled_on(group));

    // Toggling one sibling back on turns the category back on.
    session.set_toggle(second, true);
    assert!(session.tree().is_toggled_on(group));

    // Toggling the category off hides every descendant shape.
    session.set_toggle(group, false);
    assert!(!session.tree().is_toggled_on(first));
    assert!(!session.tree().is_toggled_on(second));
}

#[test]
fn illegal_drops_leave_model_and_tree_unchanged() {
    let mut session = session_with_images(1);
    session.store_mut().add_category("Test", None).expect("cat");
    let node = session
        .add_shape(sample_box("Test", 0.1, 0.1, 0.3, 0.3))
        .expect("shape");
    let group = session.tree().top_level_category("Test").expect("group");
    let snapshot = session.tree().snapshot();

    assert_eq!(
        session.reparent(node, Some(node)).expect("no model error"),
        Err(ReparentRejection::TargetIsDragged)
    );
    assert_eq!(
        session.reparent(node, Some(group)).expect("no model error"),
        Err(ReparentRejection::TargetIsCategory)
    );
    assert_eq!(
        session.reparent(node, None).expect("no model error"),
        Err(ReparentRejection::NoOpDrop)
    );
    assert_eq!(session.tree().snapshot(), snapshot);
    assert_eq!(session.store().shape_count("Test"), 1);
}

#[test]
fn category_drag_merges_groups_and_renumbers() {
    let mut session = session_with_images(1);
    session.store_mut().add_category("Test", None).expect("cat");
    session.store_mut().add_category("Dummy", None).expect("cat");

    let container = session
        .add_shape(sample_box("Dummy", 0.1, 0.1, 0.9, 0.9))
        .expect("container");
    let nested = session
        .add_shape(sample_box("Test", 0.2, 0.2, 0.4, 0.4))
        .expect("to nest");
    session
        .reparent(nested, Some(container))
        .expect("no model error")
        .expect("nest accepted");
    session
        .add_shape(sample_box("Test", 0.5, 0.5, 0.7, 0.7))
        .expect("top-level test");

    // Drag the nested "Test" group out to the root; it merges into the
    // existing top-level "Test" group.
    let nested_group = session.tree().children(container)[0];
    let destination = session
        .reparent(nested_group, None)
        .expect("no model error")
        .expect("merge accepted");

    let tree = session.tree();
    assert_eq!(tree.children(destination).len(), 2);
    assert_eq!(tree.sequence_id(tree.children(destination)[1]), Some(2));

    // The model now holds two top-level "Test" shapes and the "Dummy"
    // container with no parts.
    let shapes = &session.store().images()[0].shapes;
    assert_eq!(shapes.len(), 3);
    assert!(shapes.iter().all(|shape| shape.parts.is_empty()));
}
