use cgmath::Point2;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tern::{
    Config, DamageAccumulator, Declaration, Event, EventQueue, ManualClock,
    MouseButton, Rect, Scene, Transition, Value,
};

fn scene_at_zero() -> (Scene, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let scene = Scene::with_clock(Config::default(), clock.clone());
    (scene, clock)
}

fn number(value: Value) -> f64 {
    match value {
        Value::Number(n) => n,
        other => panic!("expected a number, got {:?}", other),
    }
}

fn rects() -> impl Strategy<Value = Vec<Rect>> {
    prop::collection::vec(
        (0u32..400, 0u32..400, 1u32..80, 1u32..80)
            .prop_map(|(x, y, w, h)| Rect::from_xywh(x as f64, y as f64, w as f64, h as f64)),
        1..24,
    )
}

fn contains_rect(outer: Rect, inner: Rect) -> bool {
    outer.union(inner) == outer
}

fn events() -> impl Strategy<Value = Vec<Event>> {
    let event = (0u8..4, 0u32..100).prop_map(|(kind, x)| {
        let at = Point2::new(x as f64, 0.);
        match kind {
            0 => Event::mouse_moved(at),
            1 => Event::mouse_dragged(at),
            2 => Event::mouse_pressed(at, MouseButton::Primary),
            _ => Event::key_typed('k'),
        }
    });
    prop::collection::vec(event, 0..64)
}

proptest! {
    #[test]
    fn transitions_move_forward_and_land(
        duration_ms in 1u64..10_000,
        target in 1.0f64..1000.,
        steps in prop::collection::btree_set(0u64..1000, 2..16),
    ) {
        let (mut scene, _clock) = scene_at_zero();
        let node = scene.create_element("Slider", [Arc::new(Declaration::value("x", 0.))]);
        let x = scene.property(node, "x").unwrap();
        let duration = Duration::from_millis(duration_ms);
        scene.set(x, target, Some(Transition::linear(duration))).unwrap();

        // the logical value is the target straight away
        prop_assert_eq!(scene.get(x).unwrap(), Value::Number(target));

        // k thousandths of the duration
        let at = |k: u64| Duration::from_micros(duration_ms * k);
        let mut last = f64::NEG_INFINITY;
        for k in steps {
            let visible = number(scene.get_visible_at(x, at(k)).unwrap());
            prop_assert!(visible > last);
            prop_assert!(visible < target);
            prop_assert!(!scene.is_done_transitioning(x, at(k)));
            last = visible;
        }

        prop_assert!(scene.is_done_transitioning(x, duration));
        prop_assert_eq!(number(scene.get_visible_at(x, duration).unwrap()), target);
        prop_assert_eq!(number(scene.get_visible_at(x, duration * 2).unwrap()), target);
    }

    #[test]
    fn clustering_covers_everything_in_any_order(
        rects in rects(),
        ratio in 0.0f64..4.,
        max_clusters in 1usize..8,
    ) {
        let mut forward = DamageAccumulator::new(ratio, max_clusters);
        let mut backward = DamageAccumulator::new(ratio, max_clusters);
        for rect in &rects {
            forward.add(*rect);
        }
        for rect in rects.iter().rev() {
            backward.add(*rect);
        }
        prop_assert_eq!(forward.bounds(), backward.bounds());

        for acc in [&forward, &backward] {
            let clusters = acc.clusters();
            prop_assert!(!clusters.is_empty());
            prop_assert!(clusters.len() <= max_clusters);
            let hull = clusters.iter().fold(Rect::zero(), |hull, c| hull.union(*c));
            prop_assert_eq!(hull, acc.bounds());
            for rect in &rects {
                prop_assert!(clusters.iter().any(|c| contains_rect(*c, *rect)));
            }
        }
    }

    #[test]
    fn queued_moves_never_sit_next_to_each_other(events in events()) {
        let mut queue = EventQueue::with_capacity(64);
        let mut expected: Vec<Event> = Vec::new();
        for event in events {
            match expected.last_mut() {
                Some(last) if last.kind.is_negligible() && last.kind == event.kind => {
                    *last = event.clone();
                }
                _ => expected.push(event.clone()),
            }
            queue.push(event).unwrap();
        }
        prop_assert_eq!(queue.len(), expected.len());

        let mut drained = Vec::new();
        while let Some(event) = queue.pop() {
            drained.push(event);
        }
        for pair in drained.windows(2) {
            prop_assert!(!(pair[0].kind.is_negligible() && pair[0].kind == pair[1].kind));
        }
        let kinds = |events: &[Event]| events.iter().map(|e| (e.kind, e.location)).collect::<Vec<_>>();
        prop_assert_eq!(kinds(&drained), kinds(&expected));
    }
}
