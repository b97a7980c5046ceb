use choropleth::compute::spatial::{multipolygon_area, validate_polygon};
use choropleth::prelude::*;
use choropleth::{ClassifierError, GeometryError};
use geo::{LineString, Rect, coord};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn rect_region(id: &str, x0: f64, y0: f64, x1: f64, y1: f64) -> Region {
    let rect = Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 });
    Region::new(id, rect.to_polygon().into())
}

fn ring(points: &[(f64, f64)]) -> LineString<f64> {
    LineString::from(points.to_vec())
}

fn pipeline(classes: usize) -> Pipeline {
    Pipeline::builder().classes(classes).build().unwrap()
}

/// Test 1: No observations at all
#[test]
fn test_no_observations() {
    init_logging();
    let output = pipeline(2)
        .run(vec![rect_region("a", 0.0, 0.0, 1.0, 1.0)], &[])
        .unwrap();

    assert_eq!(output.entries().len(), 1);
    assert_eq!(output.entries()[0].value, None);
    assert_eq!(output.breaks(), Err(&ClassifierError::NoData));
}

/// Test 2: No regions; every observation is unassigned
#[test]
fn test_no_regions() {
    init_logging();
    let obs = vec![
        Observation::from_xy(1.0, 1.0, 1.0, "a"),
        Observation::from_xy(2.0, 2.0, 1.0, "b"),
    ];
    let output = pipeline(1).run(vec![], &obs).unwrap();
    assert!(output.entries().is_empty());
    assert_eq!(output.join_stats().unassigned, 2);
    assert_eq!(output.aggregation().total_count(), 2);
}

/// Test 3: Self-intersecting (bowtie) region is repaired, both lobes count
#[test]
fn test_bowtie_region_repaired() {
    init_logging();
    let bowtie = Polygon::new(
        ring(&[(0.0, 0.0), (10.0, 10.0), (10.0, 0.0), (0.0, 10.0), (0.0, 0.0)]),
        vec![],
    );
    assert!(!validate_polygon(&bowtie).is_empty());

    let obs = vec![
        Observation::from_xy(1.0, 5.0, 2.0, "left"),
        Observation::from_xy(9.0, 5.0, 3.0, "right"),
        Observation::from_xy(5.0, 1.0, 100.0, "gap"),
    ];
    let output = pipeline(1)
        .run(vec![Region::new("bow", bowtie.into())], &obs)
        .unwrap();

    let entry = output.entry(&"bow".into()).unwrap();
    assert_eq!(entry.count, 2);
    assert_eq!(entry.value, Some(5.0));
    let repaired = output.regions().get(0).unwrap();
    assert_eq!(repaired.geometry().0.len(), 2);
    assert!((multipolygon_area(repaired.geometry()) - 50.0).abs() < 1e-9);
}

/// Test 4: Points inside a hole are not in the region
#[test]
fn test_region_with_hole() {
    init_logging();
    let with_hole = Polygon::new(
        ring(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]),
        vec![ring(&[(4.0, 4.0), (6.0, 4.0), (6.0, 6.0), (4.0, 6.0), (4.0, 4.0)])],
    );
    let obs = vec![
        Observation::from_xy(5.0, 5.0, 1.0, "hole"),
        Observation::from_xy(5.0, 4.0, 1.0, "hole-edge"),
        Observation::from_xy(1.0, 1.0, 1.0, "solid"),
    ];
    let output = pipeline(1)
        .run(vec![Region::new("ring", with_hole.into())], &obs)
        .unwrap();
    assert_eq!(output.entry(&"ring".into()).unwrap().count, 2);
    assert_eq!(output.join_stats().unassigned, 1);
}

/// Test 5: Disjoint parts of a multipolygon belong to one region
#[test]
fn test_multipart_region() {
    init_logging();
    let west = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }).to_polygon();
    let east = Rect::new(coord! { x: 10.0, y: 0.0 }, coord! { x: 11.0, y: 1.0 }).to_polygon();
    let islands = Region::new("islands", MultiPolygon::new(vec![west, east]));
    let obs = vec![
        Observation::from_xy(0.5, 0.5, 4.0, "w"),
        Observation::from_xy(10.5, 0.5, 6.0, "e"),
        Observation::from_xy(5.0, 0.5, 99.0, "sea"),
    ];
    let output = pipeline(1).run(vec![islands], &obs).unwrap();
    let entry = output.entry(&"islands".into()).unwrap();
    assert_eq!(entry.count, 2);
    assert_eq!(entry.value, Some(10.0));
}

/// Test 6: Overlapping regions resolve to the smaller id
#[test]
fn test_overlapping_regions() {
    init_logging();
    let output = pipeline(1)
        .run(
            vec![
                rect_region("beta", 5.0, 5.0, 15.0, 15.0),
                rect_region("alpha", 0.0, 0.0, 10.0, 10.0),
            ],
            &[
                Observation::from_xy(7.0, 7.0, 1.0, "both"),
                Observation::from_xy(12.0, 12.0, 1.0, "beta-only"),
            ],
        )
        .unwrap();
    assert_eq!(output.entry(&"alpha".into()).unwrap().count, 1);
    assert_eq!(output.entry(&"beta".into()).unwrap().count, 1);
}

/// Test 7: Points on the outer corners of the extent
#[test]
fn test_extent_corners() {
    init_logging();
    for kind in [IndexKind::Grid, IndexKind::RTree] {
        let output = Pipeline::builder()
            .index_kind(kind)
            .classes(1)
            .build()
            .unwrap()
            .run(
                vec![rect_region("a", 0.0, 0.0, 10.0, 10.0)],
                &[
                    Observation::from_xy(0.0, 0.0, 1.0, "min"),
                    Observation::from_xy(10.0, 10.0, 1.0, "max"),
                    Observation::from_xy(10.000001, 10.0, 1.0, "beyond"),
                ],
            )
            .unwrap();
        assert_eq!(output.entries()[0].count, 2);
        assert_eq!(output.join_stats().unassigned, 1);
    }
}

/// Test 8: Projected coordinates far from the origin
#[test]
fn test_large_projected_coordinates() {
    init_logging();
    let output = pipeline(1)
        .run(
            vec![rect_region("far", 2_500_000.0, 6_800_000.0, 2_500_010.0, 6_800_010.0)],
            &[Observation::from_xy(2_500_005.0, 6_800_005.0, 42.0, "p")],
        )
        .unwrap();
    assert_eq!(output.entries()[0].value, Some(42.0));
}

/// Test 9: Unrepairable region is reported, the rest continue
#[test]
fn test_degenerate_region_isolated() {
    init_logging();
    let line = Polygon::new(ring(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (0.0, 0.0)]), vec![]);
    let output = pipeline(1)
        .run(
            vec![
                Region::new("flat", line.into()),
                rect_region("ok", 0.0, 0.0, 1.0, 1.0),
            ],
            &[Observation::from_xy(0.5, 0.5, 1.0, "p")],
        )
        .unwrap();
    assert_eq!(output.entries().len(), 1);
    let failure = &output.repair_failures()[0];
    assert_eq!(failure.region_id.as_str(), "flat");
    assert!(matches!(failure.error, GeometryError::Degenerate(_)));
}

/// Test 10: Non-finite observation location is rejected up front
#[test]
fn test_non_finite_location_rejected() {
    init_logging();
    let result = pipeline(1).run(
        vec![rect_region("a", 0.0, 0.0, 1.0, 1.0)],
        &[Observation::from_xy(f64::INFINITY, 0.5, 1.0, "inf")],
    );
    assert!(matches!(result, Err(ChoroplethError::InvalidInput(_))));
}

/// Test 11: Class count equal to the number of regions with data
#[test]
fn test_class_count_equals_data_regions() {
    init_logging();
    let regions = vec![
        rect_region("a", 0.0, 0.0, 1.0, 1.0),
        rect_region("b", 1.0, 0.0, 2.0, 1.0),
        rect_region("c", 2.0, 0.0, 3.0, 1.0),
    ];
    let obs = vec![
        Observation::from_xy(0.5, 0.5, 1.0, "a"),
        Observation::from_xy(1.5, 0.5, 2.0, "b"),
        Observation::from_xy(2.5, 0.5, 3.0, "c"),
    ];
    let output = pipeline(3).run(regions, &obs).unwrap();
    let classes: Vec<Option<usize>> = output.entries().iter().map(|e| e.class).collect();
    assert_eq!(classes, vec![Some(0), Some(1), Some(2)]);
}

/// Test 12: Identical values across regions
#[test]
fn test_tied_values() {
    init_logging();
    let regions: Vec<Region> = (0..4)
        .map(|i| rect_region(&format!("r{}", i), i as f64, 0.0, i as f64 + 1.0, 1.0))
        .collect();
    let obs: Vec<Observation> = (0..4)
        .map(|i| Observation::from_xy(i as f64 + 0.5, 0.5, 7.0, format!("p{}", i)))
        .collect();
    let output = pipeline(2).run(regions, &obs).unwrap();

    let classes: Vec<Option<usize>> = output.entries().iter().map(|e| e.class).collect();
    assert!(classes.iter().all(|c| c.is_some()));
    assert!(classes.windows(2).all(|w| w[0] == w[1]));
}
