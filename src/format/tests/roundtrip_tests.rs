//! Export → CSV → recovery round trips.

use crate::format::{ExportProjection, read_store};
use crate::geometry::Region;
use crate::model::{LabelCatalog, Point};
use crate::reconcile::{ViewportReport, reconcile};
use crate::store::PointStore;

/// Build a store through the reconciler, the way a session would.
fn annotated_store() -> PointStore {
    let mut store = PointStore::new(LabelCatalog::default());
    let report = ViewportReport::from_points([
        (Point::new(300, 12), 0),
        (Point::new(12, 300), 1),
        (Point::new(150, 150), 2),
        (Point::new(0, 0), 0),
        (Point::new(151, 150), 1),
    ]);
    reconcile(&mut store, &Region::WholeImage, &report).unwrap();
    store
}

#[test]
fn test_csv_roundtrip_preserves_mapping() {
    let original = annotated_store();
    let csv = ExportProjection::from_store(&original)
        .unwrap()
        .to_csv()
        .unwrap();

    let recovered = read_store(csv.as_slice(), original.catalog()).unwrap();
    assert_eq!(recovered, original);
}

#[test]
fn test_csv_rows_in_raster_order() {
    let csv = ExportProjection::from_store(&annotated_store())
        .unwrap()
        .to_csv()
        .unwrap();
    let text = String::from_utf8(csv).unwrap();

    assert_eq!(
        text,
        "X,Y,Label\n\
         0,0,Positivo\n\
         300,12,Positivo\n\
         150,150,No importante\n\
         151,150,Negativo\n\
         12,300,Negativo\n"
    );
}

#[test]
fn test_empty_store_roundtrip() {
    let original = PointStore::new(LabelCatalog::default());
    let csv = ExportProjection::from_store(&original)
        .unwrap()
        .to_csv()
        .unwrap();
    assert_eq!(csv, b"X,Y,Label\n");
    let recovered = read_store(csv.as_slice(), original.catalog()).unwrap();
    assert!(recovered.is_empty());
}

#[test]
fn test_roundtrip_then_reconcile_matches_live_store() {
    // A recovered store must behave exactly like the live one it replaced.
    let mut live = annotated_store();
    let csv = ExportProjection::from_store(&live).unwrap().to_csv().unwrap();
    let mut recovered = read_store(csv.as_slice(), live.catalog()).unwrap();

    let next = ViewportReport::from_points([(Point::new(0, 0), 2), (Point::new(9, 9), 1)]);
    let a = reconcile(&mut live, &Region::WholeImage, &next).unwrap();
    let b = reconcile(&mut recovered, &Region::WholeImage, &next).unwrap();

    assert_eq!(a, b);
    assert_eq!(live, recovered);
    assert_eq!(live.len(), 2);
}
