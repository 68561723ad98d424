//! Integration tests for the Pascal VOC codec.

mod common;

use std::fs;

use boxlabel::io::pvoc::{load_pvoc, save_pvoc};
use boxlabel::io::BatchOptions;
use boxlabel::model::{RgbaColor, ShapeGeometry};
use common::{assert_rect_close, sample_box, sample_polygon, store_with_images};

#[test]
fn save_writes_one_file_per_annotated_image_with_expected_name() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let mut store = store_with_images(&[("img.01.jpg", 640, 480), ("empty.jpg", 640, 480)]);
    store.add_category("Car", None).expect("add category");
    store
        .add_shape(0, sample_box("Car", 0.25, 0.25, 0.5, 0.5))
        .expect("add shape");

    let result = save_pvoc(&store, temp.path(), &BatchOptions::default()).expect("save");
    assert_eq!(result.success_count, 1);
    assert!(result.errors.is_empty());

    let xml_path = temp.path().join("img_01_jpg_A.xml");
    assert!(xml_path.is_file());
    assert!(!temp.path().join("empty_jpg_A.xml").exists());

    let xml = fs::read_to_string(xml_path).expect("read written xml");
    assert!(xml.contains("<folder>images</folder>"));
    assert!(xml.contains("<filename>img.01.jpg</filename>"));
    assert!(xml.contains("<width>640</width>"));
    assert!(xml.contains("<depth>3</depth>"));
    // Absolute 2-decimal pixel coordinates.
    assert!(xml.contains("<xmin>160.00</xmin>"));
    assert!(xml.contains("<ymax>240.00</ymax>"));
    assert!(xml.contains("<pose>Unspecified</pose>"));
    assert!(xml.contains("<difficult>0</difficult>"));
}

#[test]
fn roundtrip_preserves_categories_tags_parts_and_coordinates() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let images = [("img_a.jpg", 640, 480), ("img_b.jpg", 800, 600)];

    let mut store = store_with_images(&images);
    store
        .add_category("Car", Some(RgbaColor::rgb(255, 0, 0)))
        .expect("add Car");
    store.add_category("Wheel", None).expect("add Wheel");

    let shape = sample_box("Car", 0.25, 0.25, 0.5, 0.5)
        .with_tag("pose: sitting")
        .with_tag("truncated")
        .with_tag("action: jumping")
        .with_part(sample_polygon("Wheel", &[0.3, 0.3, 0.4, 0.3, 0.35, 0.45]));
    store.add_shape(0, shape).expect("add shape");
    store
        .add_shape(1, sample_box("Wheel", 0.0, 0.0, 1.0, 1.0))
        .expect("add second");

    save_pvoc(&store, temp.path(), &BatchOptions::default()).expect("save");

    let mut restored = store_with_images(&images);
    let result = load_pvoc(&mut restored, temp.path(), &BatchOptions::default()).expect("load");
    assert_eq!(result.success_count, 2);
    assert!(result.errors.is_empty(), "unexpected: {:?}", result.errors);

    let first = &restored.images()[0].shapes;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].category, "Car");
    assert!(first[0].tags.contains("pose: sitting"));
    assert!(first[0].tags.contains("truncated"));
    assert!(first[0].tags.contains("action: jumping"));
    assert_eq!(first[0].parts.len(), 1);
    assert_eq!(first[0].parts[0].category, "Wheel");

    // 2-decimal pixel precision: relative error is bounded by
    // 0.005 / image dimension.
    let eps = 0.005 / 480.0 + 1e-9;
    let ShapeGeometry::Box(rect) = &first[0].geometry else {
        panic!("expected a box");
    };
    assert_rect_close(
        rect,
        &boxlabel::model::RectXYXY::from_xyxy(0.25, 0.25, 0.5, 0.5),
        eps,
    );

    let ShapeGeometry::Polygon(points) = &first[0].parts[0].geometry else {
        panic!("expected a polygon part");
    };
    assert_eq!(points.len(), 3);
    assert!((points[2].y - 0.45).abs() <= eps);

    assert_eq!(restored.shape_count("Car"), 1);
    assert_eq!(restored.shape_count("Wheel"), 2);
}

#[test]
fn object_missing_name_is_skipped_with_an_error_entry() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <folder>images</folder>
  <filename>img_a.jpg</filename>
  <size>
    <width>640</width>
    <height>480</height>
    <depth>3</depth>
  </size>
  <object>
    <bndbox>
      <xmin>10</xmin>
      <xmax>20</xmax>
      <ymin>10</ymin>
      <ymax>20</ymax>
    </bndbox>
  </object>
  <object>
    <name>Car</name>
    <bndbox>
      <xmin>10</xmin>
      <xmax>20</xmax>
      <ymin>10</ymin>
      <ymax>20</ymax>
    </bndbox>
  </object>
</annotation>
"#;
    fs::write(temp.path().join("img_a_jpg_A.xml"), xml).expect("write xml");

    let mut store = store_with_images(&[("img_a.jpg", 640, 480)]);
    let result = load_pvoc(&mut store, temp.path(), &BatchOptions::default()).expect("load");

    // The file still imports: the valid object survives.
    assert_eq!(result.success_count, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].source_name, "img_a_jpg_A.xml");
    assert_eq!(result.errors[0].message, "Missing element: name");
    assert_eq!(store.images()[0].shapes.len(), 1);
}

#[test]
fn file_for_unknown_image_is_rejected_per_file() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <folder>images</folder>
  <filename>stranger.jpg</filename>
  <size><width>640</width><height>480</height><depth>3</depth></size>
  <object>
    <name>Car</name>
    <bndbox><xmin>1</xmin><xmax>2</xmax><ymin>1</ymin><ymax>2</ymax></bndbox>
  </object>
</annotation>
"#;
    fs::write(temp.path().join("stranger_jpg_A.xml"), xml).expect("write xml");

    let mut store = store_with_images(&[("img_a.jpg", 640, 480)]);
    let result = load_pvoc(&mut store, temp.path(), &BatchOptions::default()).expect("load");

    assert_eq!(result.success_count, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0]
        .message
        .contains("does not belong to the currently loaded images"));
    // Nothing was committed, not even the category.
    assert!(store.category("Car").is_none());
}

#[test]
fn missing_top_level_field_rejects_the_whole_file() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <filename>img_a.jpg</filename>
  <size><width>640</width><height>480</height><depth>3</depth></size>
</annotation>
"#;
    fs::write(temp.path().join("img_a_jpg_A.xml"), xml).expect("write xml");

    let mut store = store_with_images(&[("img_a.jpg", 640, 480)]);
    let result = load_pvoc(&mut store, temp.path(), &BatchOptions::default()).expect("load");

    assert_eq!(result.success_count, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].message, "Missing element: folder");
}

#[test]
fn file_with_zero_valid_objects_is_no_annotation_and_no_error() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <folder>images</folder>
  <filename>img_a.jpg</filename>
  <size><width>640</width><height>480</height><depth>3</depth></size>
</annotation>
"#;
    fs::write(temp.path().join("img_a_jpg_A.xml"), xml).expect("write xml");

    let mut store = store_with_images(&[("img_a.jpg", 640, 480)]);
    let result = load_pvoc(&mut store, temp.path(), &BatchOptions::default()).expect("load");

    assert_eq!(result.success_count, 0);
    assert!(result.errors.is_empty());
    assert!(!store.images()[0].has_annotations());
}

#[test]
fn failed_part_is_skipped_without_killing_its_container() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<annotation>
  <folder>images</folder>
  <filename>img_a.jpg</filename>
  <size><width>640</width><height>480</height><depth>3</depth></size>
  <object>
    <name>Car</name>
    <bndbox><xmin>10</xmin><xmax>200</xmax><ymin>10</ymin><ymax>200</ymax></bndbox>
    <part>
      <name>Wheel</name>
    </part>
    <part>
      <name>Wheel</name>
      <bndbox><xmin>20</xmin><xmax>40</xmax><ymin>20</ymin><ymax>40</ymax></bndbox>
    </part>
  </object>
</annotation>
"#;
    fs::write(temp.path().join("img_a_jpg_A.xml"), xml).expect("write xml");

    let mut store = store_with_images(&[("img_a.jpg", 640, 480)]);
    let result = load_pvoc(&mut store, temp.path(), &BatchOptions::default()).expect("load");

    assert_eq!(result.success_count, 1);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].message, "Missing element: bndbox");

    let shapes = &store.images()[0].shapes;
    assert_eq!(shapes[0].parts.len(), 1);
    assert_eq!(store.shape_count("Wheel"), 1);
}

#[test]
fn progress_callback_reaches_completion() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let mut store = store_with_images(&[("img_a.jpg", 640, 480)]);
    store.add_category("Car", None).expect("add category");
    store
        .add_shape(0, sample_box("Car", 0.1, 0.1, 0.2, 0.2))
        .expect("add shape");
    save_pvoc(&store, temp.path(), &BatchOptions::default()).expect("save");

    let fractions = std::sync::Mutex::new(Vec::new());
    let progress = |fraction: f64| fractions.lock().expect("lock").push(fraction);
    let options = BatchOptions {
        progress: Some(&progress),
        abort: None,
    };

    let mut restored = store_with_images(&[("img_a.jpg", 640, 480)]);
    load_pvoc(&mut restored, temp.path(), &options).expect("load");

    let seen = fractions.into_inner().expect("lock");
    assert!(!seen.is_empty());
    assert!((seen.last().copied().expect("at least one") - 1.0).abs() < 1e-12);
}
