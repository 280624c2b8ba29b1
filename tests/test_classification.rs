use idscan::detection::contours::{find_candidates, ClassifierParams, ContourForest};
use idscan::detection::validation::{
    largest_barcode, outline_ratio, validate_text_line, Rejection, ValidationParams,
};
use idscan::{BoundingBox, Candidate, Extent, RegionKind};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::point::Point;
use imageproc::rect::Rect;
use std::sync::Arc;

fn perimeter(width: u32, height: u32) -> Vec<Point<u32>> {
    let mut points = Vec::new();
    for x in 0..width {
        points.push(Point::new(x, 0));
        points.push(Point::new(x, height - 1));
    }
    for y in 1..height - 1 {
        points.push(Point::new(0, y));
        points.push(Point::new(width - 1, y));
    }
    points
}

fn candidate(bbox: BoundingBox, outline: Vec<Point<u32>>, kind: RegionKind) -> Candidate {
    Candidate {
        index: 0,
        bbox,
        outline: Arc::new(outline),
        kind,
        density: None,
    }
}

#[test]
fn test_classify_assigns_at_most_one_tag() {
    let params = ClassifierParams::default();
    let region = Extent::new(1000, 600);
    let mut overlap = 0;

    for w in (1..=1000).step_by(7) {
        for h in (1..=600).step_by(3) {
            let bbox = BoundingBox::new(0, 0, w, h);
            let text = params.is_text_line(&bbox, region);
            let barcode = params.is_barcode(&bbox, region);

            match params.classify(&bbox, region) {
                Some(RegionKind::Barcode) => assert!(barcode),
                Some(RegionKind::TextLine) => assert!(text && !barcode),
                None => assert!(!text && !barcode),
            }

            if text && barcode {
                overlap += 1;
                // only wide, flat boxes between 0.6W and W/1.5
                assert!(w >= 600 && (w as f64) < 1000.0 / 1.5, "{w}x{h}");
            }
        }
    }

    assert!(overlap > 0, "no box satisfied both predicates");
}

#[test]
fn test_pipelines_use_their_own_predicate() {
    let params = ClassifierParams::default();
    let region = Extent::new(1000, 600);
    let both = BoundingBox::new(0, 0, 620, 20);

    assert!(params.matches(RegionKind::TextLine, &both, region));
    assert!(params.matches(RegionKind::Barcode, &both, region));
    assert_eq!(params.classify(&both, region), Some(RegionKind::Barcode));
}

#[test]
fn test_find_candidates_on_mask() {
    let region = Extent::new(1000, 600);
    let mut mask = GrayImage::new(region.width, region.height);
    draw_filled_rect_mut(&mut mask, Rect::at(50, 50).of_size(300, 20), Luma([255]));
    draw_filled_rect_mut(&mut mask, Rect::at(50, 200).of_size(700, 100), Luma([255]));
    // too small for either
    draw_filled_rect_mut(&mut mask, Rect::at(900, 500).of_size(20, 20), Luma([255]));

    let forest = ContourForest::extract(&mask);
    assert_eq!(forest.roots().count(), 3);

    let params = ClassifierParams::default();
    let lines = find_candidates(&forest, region, RegionKind::TextLine, &params);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].bbox, BoundingBox::new(50, 50, 300, 20));
    assert_eq!(lines[0].kind, RegionKind::TextLine);

    let barcodes = find_candidates(&forest, region, RegionKind::Barcode, &params);
    assert_eq!(barcodes.len(), 1);
    assert_eq!(barcodes[0].bbox, BoundingBox::new(50, 200, 700, 100));
}

#[test]
fn test_sparse_fill_rejected_before_outline() {
    let bbox = BoundingBox::new(0, 0, 300, 20);
    // a solid outline would pass the second pass on its own
    let c = candidate(bbox, perimeter(300, 20), RegionKind::TextLine);
    let params = ValidationParams::default();
    assert!(outline_ratio(&c.outline, &bbox, params.outline_stroke) >= params.outline_threshold);

    let reader = GrayImage::new(400, 100);
    match validate_text_line(&c, &reader, &params) {
        Err(Rejection::SparseFill { ratio }) => assert_eq!(ratio, 0.0),
        other => panic!("expected sparse fill, got {other:?}"),
    }
}

#[test]
fn test_weak_outline_rejected_after_fill_passes() {
    let bbox = BoundingBox::new(0, 0, 400, 200);
    let c = candidate(bbox, perimeter(400, 200), RegionKind::TextLine);
    let reader = GrayImage::from_pixel(400, 200, Luma([255]));

    match validate_text_line(&c, &reader, &ValidationParams::default()) {
        // 3px band inside the box: 1 - 394 * 194 / 80000
        Err(Rejection::WeakOutline { ratio }) => assert!((ratio - 0.04455).abs() < 1e-3, "{ratio}"),
        other => panic!("expected weak outline, got {other:?}"),
    }
}

#[test]
fn test_dense_line_is_accepted() {
    let bbox = BoundingBox::new(10, 10, 300, 20);
    let outline: Vec<_> = perimeter(300, 20)
        .into_iter()
        .map(|p| Point::new(p.x + 10, p.y + 10))
        .collect();
    let c = candidate(bbox, outline, RegionKind::TextLine);
    let reader = GrayImage::from_pixel(400, 100, Luma([255]));

    let coverage = validate_text_line(&c, &reader, &ValidationParams::default()).unwrap();
    assert!(coverage > 0.3 && coverage < 0.5, "{coverage}");
}

#[test]
fn test_largest_barcode_first_seen_on_tie() {
    let a = candidate(BoundingBox::new(0, 0, 700, 100), Vec::new(), RegionKind::Barcode);
    let mut b = candidate(BoundingBox::new(0, 200, 100, 700), Vec::new(), RegionKind::Barcode);
    b.index = 1;
    let mut small = candidate(BoundingBox::new(0, 0, 650, 50), Vec::new(), RegionKind::Barcode);
    small.index = 2;

    let winner = largest_barcode(vec![small.clone(), a, b]).unwrap();
    assert_eq!(winner.index, 0);
    assert_eq!(winner.density, Some(70_000.0));

    assert!(largest_barcode(Vec::new()).is_none());
    assert_eq!(largest_barcode(vec![small]).unwrap().index, 2);
}
