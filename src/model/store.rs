//! The aggregate annotation store.
//!
//! [`AnnotationStore`] owns the loaded image records, the category
//! registry, and the per-category assigned-shape count index. Every
//! mutation keeps the count index in step incrementally: for any category
//! `c`, `shape_count(c)` equals the number of shape records at any nesting
//! depth, across all images, whose category is `c`.
//!
//! All operations are synchronous and either fully apply or fully reject.
//! The one exception is [`AnnotationStore::merge_import`], which is built
//! for partial success: invalid entries are skipped and reported, valid
//! entries are applied.

use std::collections::HashMap;

use crate::error::BoxlabelError;
use crate::io::ErrorInfoEntry;

use super::category::{ObjectCategory, RgbaColor};
use super::image::{ImageMetaData, ImageRecord};
use super::shape::ShapeData;

/// Addresses a shape within one image: the first index selects a
/// top-level shape, each following index descends into a `parts` list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapePath(pub Vec<usize>);

impl ShapePath {
    /// Path to a top-level shape.
    pub fn top(index: usize) -> Self {
        Self(vec![index])
    }

    /// Extends the path one parts-level deeper.
    pub fn child(mut self, index: usize) -> Self {
        self.0.push(index);
        self
    }
}

/// Change notification emitted after a successful store mutation.
///
/// External collaborators (a rendering layer, a file-list view) subscribe
/// instead of observing fields directly.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    ImageFolderLoaded { image_count: usize },
    CategoryAdded { name: String },
    CategoryRenamed { old: String, new: String },
    CategoryRemoved { name: String, removed_shapes: usize },
    ShapeAdded { image_index: usize },
    ShapeRemoved { image_index: usize },
    ShapeRecategorized { image_index: usize },
    ImageShapesReplaced { image_index: usize },
    AnnotationsImported { image_count: usize },
}

/// Handle returned by [`AnnotationStore::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriberId(usize);

type EventCallback = Box<dyn Fn(&ModelEvent)>;

/// One annotated image produced by a codec, keyed to a loaded image by
/// file name.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedImage {
    pub file_name: String,
    pub shapes: Vec<ShapeData>,
}

/// The aggregate of everything a codec import produces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportedAnnotations {
    pub categories: Vec<ObjectCategory>,
    pub images: Vec<ImportedImage>,
}

/// The in-memory annotation model for the currently loaded image folder.
#[derive(Default)]
pub struct AnnotationStore {
    images: Vec<ImageRecord>,
    categories: Vec<ObjectCategory>,
    counts: HashMap<String, usize>,
    subscribers: Vec<(SubscriberId, EventCallback)>,
    next_subscriber: usize,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a freshly scanned image folder, discarding all previous
    /// image records and their shapes. Categories survive a folder
    /// change; their counts drop to zero with the shapes.
    pub fn set_image_folder(&mut self, images: Vec<ImageMetaData>) {
        self.images = images.into_iter().map(ImageRecord::new).collect();
        for value in self.counts.values_mut() {
            *value = 0;
        }
        let image_count = self.images.len();
        self.emit(&ModelEvent::ImageFolderLoaded { image_count });
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn image(&self, index: usize) -> Option<&ImageRecord> {
        self.images.get(index)
    }

    /// Index of the image with the given file name, if loaded.
    pub fn image_index(&self, file_name: &str) -> Option<usize> {
        self.images
            .iter()
            .position(|record| record.meta.file_name == file_name)
    }

    pub fn categories(&self) -> &[ObjectCategory] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&ObjectCategory> {
        self.categories.iter().find(|category| category.name == name)
    }

    /// Number of shapes assigned to `name`, at any nesting depth, across
    /// all images. O(1).
    pub fn shape_count(&self, name: &str) -> usize {
        self.counts.get(name).copied().unwrap_or(0)
    }

    /// The full per-category count index.
    pub fn category_shape_counts(&self) -> &HashMap<String, usize> {
        &self.counts
    }

    /// Adds a new category. Fails if the name already exists
    /// (case-sensitive exact match); a random color is generated when none
    /// is given.
    pub fn add_category(
        &mut self,
        name: impl Into<String>,
        color: Option<RgbaColor>,
    ) -> Result<&ObjectCategory, BoxlabelError> {
        let name = name.into();
        if self.category(&name).is_some() {
            return Err(BoxlabelError::DuplicateCategoryName { name });
        }

        self.counts.insert(name.clone(), 0);
        self.categories.push(ObjectCategory::new(
            name.clone(),
            color.unwrap_or_else(RgbaColor::random),
        ));
        self.emit(&ModelEvent::CategoryAdded { name });
        Ok(self.categories.last().expect("category was just pushed"))
    }

    /// Renames a category, updating every shape reference (all images,
    /// all nesting depths) and re-keying the count index.
    pub fn rename_category(&mut self, old: &str, new: &str) -> Result<(), BoxlabelError> {
        if old == new {
            return Ok(());
        }
        if self.category(new).is_some() {
            return Err(BoxlabelError::DuplicateCategoryName {
                name: new.to_string(),
            });
        }
        let position = self
            .categories
            .iter()
            .position(|category| category.name == old)
            .ok_or_else(|| BoxlabelError::UnknownCategory {
                name: old.to_string(),
            })?;

        self.categories[position].name = new.to_string();
        let count = self.counts.remove(old).unwrap_or(0);
        self.counts.insert(new.to_string(), count);

        for record in &mut self.images {
            rename_in_shapes(&mut record.shapes, old, new);
        }

        self.emit(&ModelEvent::CategoryRenamed {
            old: old.to_string(),
            new: new.to_string(),
        });
        Ok(())
    }

    /// Removes a category, cascading deletion of every shape assigned to
    /// it (at any nesting depth, across all images) together with those
    /// shapes' own nested parts. Returns the number of removed shapes
    /// that carried the removed category.
    pub fn remove_category(&mut self, name: &str) -> Result<usize, BoxlabelError> {
        let position = self
            .categories
            .iter()
            .position(|category| category.name == name)
            .ok_or_else(|| BoxlabelError::UnknownCategory {
                name: name.to_string(),
            })?;

        let mut removed_matching = 0;
        for record in &mut self.images {
            prune_category(
                &mut record.shapes,
                name,
                &mut self.counts,
                &mut removed_matching,
            );
        }

        self.categories.remove(position);
        self.counts.remove(name);

        self.emit(&ModelEvent::CategoryRemoved {
            name: name.to_string(),
            removed_shapes: removed_matching,
        });
        Ok(removed_matching)
    }

    /// Appends a shape to an image's shape list. The shape's category and
    /// every part's category must already be registered.
    pub fn add_shape(&mut self, image_index: usize, shape: ShapeData) -> Result<(), BoxlabelError> {
        self.check_image_index(image_index)?;
        self.check_categories_exist(&shape)?;

        increment_counts(&mut self.counts, &shape);
        self.images[image_index].shapes.push(shape);
        self.emit(&ModelEvent::ShapeAdded { image_index });
        Ok(())
    }

    /// Looks up a shape by path.
    pub fn shape_at(&self, image_index: usize, path: &ShapePath) -> Option<&ShapeData> {
        let record = self.images.get(image_index)?;
        shape_ref(&record.shapes, path)
    }

    /// Removes the addressed shape (and recursively all its parts) from
    /// wherever it is nested in the image's shape list. Returns the
    /// removed shape.
    pub fn remove_shape(
        &mut self,
        image_index: usize,
        path: &ShapePath,
    ) -> Result<ShapeData, BoxlabelError> {
        self.check_image_index(image_index)?;
        let removed = remove_at(&mut self.images[image_index].shapes, path)
            .ok_or(BoxlabelError::InvalidShapePath)?;

        decrement_counts(&mut self.counts, &removed);
        self.emit(&ModelEvent::ShapeRemoved { image_index });
        Ok(removed)
    }

    /// Moves the addressed shape to a different category. Only the shape
    /// itself changes category; its nested parts keep theirs, so the count
    /// adjustment is non-recursive.
    pub fn recategorize_shape(
        &mut self,
        image_index: usize,
        path: &ShapePath,
        new_category: &str,
    ) -> Result<(), BoxlabelError> {
        self.check_image_index(image_index)?;
        if self.category(new_category).is_none() {
            return Err(BoxlabelError::UnknownCategory {
                name: new_category.to_string(),
            });
        }

        let shape = shape_mut(&mut self.images[image_index].shapes, path)
            .ok_or(BoxlabelError::InvalidShapePath)?;
        let old = std::mem::replace(&mut shape.category, new_category.to_string());

        decrement_count(&mut self.counts, &old);
        increment_count(&mut self.counts, new_category);
        self.emit(&ModelEvent::ShapeRecategorized { image_index });
        Ok(())
    }

    /// Replaces an image's entire shape list, recomputing the count delta
    /// (old shapes decremented recursively, new ones incremented).
    pub fn replace_all_for_image(
        &mut self,
        image_index: usize,
        shapes: Vec<ShapeData>,
    ) -> Result<(), BoxlabelError> {
        self.check_image_index(image_index)?;
        for shape in &shapes {
            self.check_categories_exist(shape)?;
        }

        for shape in &shapes {
            increment_counts(&mut self.counts, shape);
        }
        let old = std::mem::replace(&mut self.images[image_index].shapes, shapes);
        for shape in &old {
            decrement_counts(&mut self.counts, shape);
        }
        self.emit(&ModelEvent::ImageShapesReplaced { image_index });
        Ok(())
    }

    /// Merges a codec's import result into the store.
    ///
    /// Categories are matched by name; a pre-existing category keeps its
    /// color. Entries referencing images that are not currently loaded are
    /// skipped and reported as non-fatal error entries. Annotations for a
    /// known image replace that image's shape list.
    pub fn merge_import(&mut self, import: ImportedAnnotations) -> Vec<ErrorInfoEntry> {
        for category in import.categories {
            if self.category(&category.name).is_none() {
                self.counts.insert(category.name.clone(), 0);
                self.categories.push(category);
            }
        }

        let mut errors = Vec::new();
        let mut applied = 0;
        for imported in import.images {
            let Some(image_index) = self.image_index(&imported.file_name) else {
                errors.push(ErrorInfoEntry::new(
                    imported.file_name.clone(),
                    format!(
                        "Image {} does not belong to the currently loaded image files",
                        imported.file_name
                    ),
                ));
                continue;
            };

            for shape in &imported.shapes {
                increment_counts(&mut self.counts, shape);
            }
            let old = std::mem::replace(&mut self.images[image_index].shapes, imported.shapes);
            for shape in &old {
                decrement_counts(&mut self.counts, shape);
            }
            applied += 1;
        }

        self.emit(&ModelEvent::AnnotationsImported {
            image_count: applied,
        });
        errors
    }

    /// Registers a change-notification callback.
    pub fn subscribe<F: Fn(&ModelEvent) + 'static>(&mut self, callback: F) -> SubscriberId {
        let id = SubscriberId(self.next_subscriber);
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Removes a previously registered callback.
    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|(existing, _)| *existing != id);
    }

    fn emit(&self, event: &ModelEvent) {
        for (_, callback) in &self.subscribers {
            callback(event);
        }
    }

    fn check_image_index(&self, index: usize) -> Result<(), BoxlabelError> {
        if index >= self.images.len() {
            return Err(BoxlabelError::ImageIndexOutOfRange {
                index,
                len: self.images.len(),
            });
        }
        Ok(())
    }

    fn check_categories_exist(&self, shape: &ShapeData) -> Result<(), BoxlabelError> {
        let mut missing = None;
        shape.for_each_category(&mut |name| {
            if missing.is_none() && self.category(name).is_none() {
                missing = Some(name.to_string());
            }
        });
        match missing {
            Some(name) => Err(BoxlabelError::UnknownCategory { name }),
            None => Ok(()),
        }
    }
}

fn rename_in_shapes(shapes: &mut [ShapeData], old: &str, new: &str) {
    for shape in shapes {
        if shape.category == old {
            shape.category = new.to_string();
        }
        rename_in_shapes(&mut shape.parts, old, new);
    }
}

/// Removes every shape assigned to `name`, with its whole part subtree,
/// decrementing counts for everything removed. `removed_matching` tallies
/// removed shapes that carried `name` itself.
fn prune_category(
    shapes: &mut Vec<ShapeData>,
    name: &str,
    counts: &mut HashMap<String, usize>,
    removed_matching: &mut usize,
) {
    shapes.retain_mut(|shape| {
        if shape.category == name {
            decrement_counts(counts, shape);
            shape.for_each_category(&mut |category| {
                if category == name {
                    *removed_matching += 1;
                }
            });
            false
        } else {
            prune_category(&mut shape.parts, name, counts, removed_matching);
            true
        }
    });
}

fn shape_ref<'a>(shapes: &'a [ShapeData], path: &ShapePath) -> Option<&'a ShapeData> {
    let (&first, rest) = path.0.split_first()?;
    let mut current = shapes.get(first)?;
    for &index in rest {
        current = current.parts.get(index)?;
    }
    Some(current)
}

fn shape_mut<'a>(shapes: &'a mut [ShapeData], path: &ShapePath) -> Option<&'a mut ShapeData> {
    let (&first, rest) = path.0.split_first()?;
    let mut current = shapes.get_mut(first)?;
    for &index in rest {
        current = current.parts.get_mut(index)?;
    }
    Some(current)
}

fn remove_at(shapes: &mut Vec<ShapeData>, path: &ShapePath) -> Option<ShapeData> {
    let (&last, prefix) = path.0.split_last()?;
    let container = if prefix.is_empty() {
        shapes
    } else {
        &mut shape_mut(shapes, &ShapePath(prefix.to_vec()))?.parts
    };
    if last >= container.len() {
        return None;
    }
    Some(container.remove(last))
}

fn increment_count(counts: &mut HashMap<String, usize>, name: &str) {
    *counts.entry(name.to_string()).or_insert(0) += 1;
}

fn decrement_count(counts: &mut HashMap<String, usize>, name: &str) {
    if let Some(value) = counts.get_mut(name) {
        *value = value.saturating_sub(1);
    }
}

fn increment_counts(counts: &mut HashMap<String, usize>, shape: &ShapeData) {
    shape.for_each_category(&mut |name| increment_count(counts, name));
}

fn decrement_counts(counts: &mut HashMap<String, usize>, shape: &ShapeData) {
    shape.for_each_category(&mut |name| decrement_count(counts, name));
}
