use proptest::prelude::*;
use runline_core::document::PolylineVertex;
use runline_core::geometry::Point2;
use runline_core::path::{Path, PathSampler};

/// x 严格递增的折线不会自交。
fn monotone_polyline() -> impl Strategy<Value = Path> {
    prop::collection::vec((1.0f64..50.0, -40.0f64..40.0), 1..8).prop_map(|steps| {
        let mut x = 0.0;
        let mut points = vec![Point2::new(0.0, 0.0)];
        for (dx, y) in steps {
            x += dx;
            points.push(Point2::new(x, y));
        }
        Path::from_points(points).expect("monotone polyline is valid")
    })
}

fn single_arc() -> impl Strategy<Value = Path> {
    (5.0f64..80.0, prop_oneof![-2.0f64..-0.05, 0.05f64..2.0]).prop_map(|(chord, bulge)| {
        Path::new(
            [
                PolylineVertex::with_bulge(Point2::new(3.0, -2.0), bulge),
                PolylineVertex::new(Point2::new(3.0 + chord, -2.0)),
            ],
            false,
        )
        .expect("arc path is valid")
    })
}

proptest! {
    #[test]
    fn distance_round_trips_on_polylines(path in monotone_polyline(), fraction in 0.0f64..=1.0) {
        let sampler = PathSampler::new(path);
        let d = sampler.length() * fraction;
        let point = sampler.point_at(d);
        let back = sampler.distance_at(point).expect("sampled point lies on the path");
        prop_assert!((back - d).abs() < 1e-6, "d={d} back={back}");
    }

    #[test]
    fn distance_round_trips_on_arcs(path in single_arc(), fraction in 0.0f64..=1.0) {
        let sampler = PathSampler::new(path);
        let d = sampler.length() * fraction;
        let point = sampler.point_at(d);
        let back = sampler.distance_at(point).expect("sampled point lies on the arc");
        prop_assert!((back - d).abs() < 1e-6, "d={d} back={back}");
    }

    #[test]
    fn tangents_are_unit_length(path in monotone_polyline(), fraction in 0.0f64..=1.0) {
        let sampler = PathSampler::new(path);
        let tangent = sampler
            .tangent_at_distance(sampler.length() * fraction)
            .expect("non-degenerate path");
        prop_assert!((tangent.length() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn distance_along_path_is_monotonic(path in monotone_polyline()) {
        let sampler = PathSampler::new(path.clone());
        let mut previous = -1.0;
        for vertex in path.vertices() {
            let d = sampler.distance_at(vertex.position).expect("vertex lies on the path");
            prop_assert!(d >= previous);
            previous = d;
        }
    }
}

#[test]
fn sampler_from_path_reports_length() {
    let path = Path::from_points([Point2::new(0.0, 0.0), Point2::new(0.0, 250.0)]).unwrap();
    let sampler = PathSampler::new(path);
    assert!((sampler.length() - 250.0).abs() < 1e-9);
    assert_eq!(sampler.segments().len(), 1);
}
