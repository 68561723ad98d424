#![allow(dead_code)]

use boxlabel::model::{
    AnnotationStore, Coord, ImageMetaData, Normalized, RectXYXY, ShapeData, ShapeGeometry,
};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// 6-decimal YOLO output bounds the relative coordinate error.
pub const EPS_YOLO: f64 = 1e-6;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(32);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 512;
    config
}

pub fn category_name_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "Car".to_string(),
        "Person".to_string(),
        "Tree".to_string(),
        "Dog".to_string(),
        "Sign".to_string(),
    ])
}

/// Relative coordinates on a fine grid, always inside [0, 1].
pub fn rel_coord_strategy() -> impl Strategy<Value = f64> {
    (0u32..=1000).prop_map(|value| f64::from(value) / 1000.0)
}

pub fn rect_strategy() -> impl Strategy<Value = RectXYXY<Normalized>> {
    (
        rel_coord_strategy(),
        rel_coord_strategy(),
        rel_coord_strategy(),
        rel_coord_strategy(),
    )
        .prop_map(|(a, b, c, d)| {
            RectXYXY::from_xyxy(a.min(c), b.min(d), a.max(c), b.max(d))
        })
}

pub fn polygon_strategy() -> impl Strategy<Value = Vec<Coord<Normalized>>> {
    prop::collection::vec((rel_coord_strategy(), rel_coord_strategy()), 1..=5)
        .prop_map(|pairs| pairs.into_iter().map(|(x, y)| Coord::new(x, y)).collect())
}

pub fn geometry_strategy() -> impl Strategy<Value = ShapeGeometry> {
    prop_oneof![
        rect_strategy().prop_map(ShapeGeometry::Box),
        polygon_strategy().prop_map(ShapeGeometry::Polygon),
    ]
}

pub fn box_geometry_strategy() -> impl Strategy<Value = ShapeGeometry> {
    rect_strategy().prop_map(ShapeGeometry::Box)
}

pub fn tags_strategy() -> impl Strategy<Value = std::collections::BTreeSet<String>> {
    prop::collection::btree_set(
        prop::sample::select(vec![
            "difficult".to_string(),
            "occluded".to_string(),
            "truncated".to_string(),
            "pose: sitting".to_string(),
            "action: running".to_string(),
        ]),
        0..3,
    )
}

/// Shapes with up to two levels of nested parts.
pub fn shape_strategy() -> impl Strategy<Value = ShapeData> {
    let leaf = (category_name_strategy(), geometry_strategy(), tags_strategy()).prop_map(
        |(category, geometry, tags)| ShapeData {
            category,
            geometry,
            tags,
            parts: Vec::new(),
        },
    );
    leaf.prop_recursive(2, 6, 2, |inner| {
        (
            category_name_strategy(),
            geometry_strategy(),
            tags_strategy(),
            prop::collection::vec(inner, 0..=2),
        )
            .prop_map(|(category, geometry, tags, parts)| ShapeData {
                category,
                geometry,
                tags,
                parts,
            })
    })
}

pub fn top_level_box_strategy() -> impl Strategy<Value = ShapeData> {
    (category_name_strategy(), box_geometry_strategy()).prop_map(|(category, geometry)| {
        ShapeData {
            category,
            geometry,
            tags: std::collections::BTreeSet::new(),
            parts: Vec::new(),
        }
    })
}

pub const TEST_IMAGES: [(&str, u32, u32); 2] = [("img_0.jpg", 640, 480), ("img_1.jpg", 800, 600)];

/// Builds a store holding `per_image` shape lists, registering every
/// referenced category first.
pub fn store_from_shapes(per_image: &[Vec<ShapeData>]) -> AnnotationStore {
    let mut store = AnnotationStore::new();
    store.set_image_folder(
        TEST_IMAGES
            .iter()
            .map(|&(name, width, height)| ImageMetaData::new(name, "images", width, height, 3))
            .collect(),
    );

    for shapes in per_image {
        for shape in shapes {
            shape.for_each_category(&mut |name| {
                if store.category(name).is_none() {
                    store.add_category(name, None).expect("register category");
                }
            });
        }
    }
    for (index, shapes) in per_image.iter().enumerate() {
        for shape in shapes {
            store.add_shape(index, shape.clone()).expect("add shape");
        }
    }
    store
}

pub fn fresh_store() -> AnnotationStore {
    store_from_shapes(&[Vec::new(), Vec::new()])
}
