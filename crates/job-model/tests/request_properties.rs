use pipmerge_job_model::{CompositeDefaults, Job, JobError, JobRequest, PositionKind};
use proptest::prelude::*;

fn request(position: Option<String>, width: Option<f64>) -> JobRequest {
    JobRequest {
        background_url: Some("https://media.test/bg.mp4".to_string()),
        overlay_url: Some("https://media.test/ov.mp4".to_string()),
        overlay_width: width,
        position,
        feather_radius: None,
    }
}

proptest! {
    #[test]
    fn any_position_string_resolves_to_a_kind(raw in ".{0,24}") {
        let defaults = CompositeDefaults::default();
        let job = Job::from_request(&request(Some(raw.clone()), None), &defaults).unwrap();
        match PositionKind::parse(&raw) {
            Some(kind) => prop_assert_eq!(job.position(), kind),
            None => prop_assert_eq!(job.position(), defaults.default_position),
        }
    }

    #[test]
    fn canonical_names_survive_case_and_separators(index in 0usize..5, upper in any::<bool>()) {
        let kind = PositionKind::ALL[index];
        let mut snake = String::new();
        for c in kind.as_str().chars() {
            if c.is_ascii_uppercase() {
                snake.push('_');
            }
            snake.push(c.to_ascii_lowercase());
        }
        let name = if upper { snake.to_uppercase() } else { snake };
        prop_assert_eq!(PositionKind::parse(&name), Some(kind));
        prop_assert_eq!(PositionKind::parse(&name.replace('_', "-")), Some(kind));
    }

    #[test]
    fn scale_outside_unit_interval_is_rejected(width in prop_oneof![-10.0f64..=0.0, 1.0001f64..10.0]) {
        let result = Job::from_request(&request(None, Some(width)), &CompositeDefaults::default());
        let is_invalid_scale = matches!(result, Err(JobError::InvalidScale { .. }));
        prop_assert!(is_invalid_scale);
    }

    #[test]
    fn scale_inside_unit_interval_is_kept(width in 0.0001f64..=1.0) {
        let job = Job::from_request(&request(None, Some(width)), &CompositeDefaults::default()).unwrap();
        prop_assert_eq!(job.overlay_scale(), width);
    }
}

#[test]
fn jobs_never_share_an_id() {
    let defaults = CompositeDefaults::default();
    let a = Job::from_request(&request(None, None), &defaults).unwrap();
    let b = Job::from_request(&request(None, None), &defaults).unwrap();
    assert_ne!(a.id(), b.id());
}
