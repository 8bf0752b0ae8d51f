//! Property tests for the volume calculator and pipette trips

use norm_rs::calculator::compute_transfer_plan;
use norm_rs::deck::Pipette;
use norm_rs::sample::{AssayParameters, SampleRecord, Target};
use norm_rs::Infeasibility;
use proptest::prelude::*;

fn params(quantity: f64, final_volume: f64) -> AssayParameters {
    AssayParameters::new(Target::Quantity(quantity), final_volume)
}

proptest! {
    #[test]
    fn feasible_plans_fill_the_well_exactly(
        concentration in 0.05f64..50.0,
        available in 1.0f64..2000.0,
        quantity in 1.0f64..200.0,
        final_volume in 50.0f64..1000.0,
    ) {
        let params = params(quantity, final_volume);
        let sample = SampleRecord::new("s", concentration, available).unwrap();

        if let Ok(plan) = compute_transfer_plan(&sample, &params) {
            prop_assert!((plan.sample_volume + plan.diluent_volume - final_volume).abs() <= 0.01);
            prop_assert!(plan.sample_volume >= params.min_pipette_volume);
            prop_assert!(plan.sample_volume <= available + 1e-6);
            prop_assert!(plan.diluent_volume >= 0.0);
            // rounding moves the sample by at most half a step
            let exact = quantity / concentration;
            prop_assert!((plan.sample_volume - exact).abs() <= params.volume_resolution + 1e-6);
        }
    }

    #[test]
    fn feasible_plans_stay_within_quantity_tolerance(
        concentration in 0.05f64..200.0,
        available in 1.0f64..2000.0,
        quantity in 1.0f64..200.0,
        final_volume in 50.0f64..1000.0,
    ) {
        let params = params(quantity, final_volume);
        let sample = SampleRecord::new("s", concentration, available).unwrap();

        if let Ok(plan) = compute_transfer_plan(&sample, &params) {
            prop_assert!(plan.within_tolerance(params.quantity_tolerance + 1e-9));
        }
    }

    #[test]
    fn fine_resolution_never_trips_the_tolerance(
        concentration in 0.05f64..50.0,
        available in 1.0f64..2000.0,
        quantity in 1.0f64..200.0,
        final_volume in 50.0f64..1000.0,
    ) {
        // a 0.1 µL step is under 1% of any volume from 12 µL up
        let params = params(quantity, final_volume).min_pipette_volume(12.0);
        let sample = SampleRecord::new("s", concentration, available).unwrap();

        let outcome = compute_transfer_plan(&sample, &params);
        prop_assert!(
            !matches!(outcome, Err(Infeasibility::OutsideQuantityTolerance { .. })),
            "{:?}",
            outcome
        );
    }

    #[test]
    fn infeasibility_matches_its_cause(
        concentration in 0.05f64..50.0,
        available in 1.0f64..2000.0,
        quantity in 1.0f64..200.0,
        final_volume in 50.0f64..1000.0,
    ) {
        let params = params(quantity, final_volume);
        let sample = SampleRecord::new("s", concentration, available).unwrap();

        match compute_transfer_plan(&sample, &params) {
            Ok(_) => {}
            Err(Infeasibility::InsufficientSample { required, available: a, achievable_quantity }) => {
                prop_assert!(required > a);
                prop_assert!((achievable_quantity - concentration * available).abs() < 1e-6);
            }
            Err(Infeasibility::BelowMinimumPipetteVolume { required, minimum }) => {
                prop_assert!(required < minimum);
            }
            Err(Infeasibility::TargetVolumeTooSmall { required, target_final_volume }) => {
                prop_assert!(required > target_final_volume);
                prop_assert!(required <= available + 1e-6);
            }
            Err(Infeasibility::OutsideQuantityTolerance { volume, achieved, target, tolerance }) => {
                prop_assert!(volume >= params.min_pipette_volume);
                prop_assert!((achieved - volume * concentration).abs() < 1e-6);
                prop_assert!((achieved - target).abs() > tolerance * target);
            }
        }
    }

    #[test]
    fn more_concentrated_samples_need_less_volume(
        concentration in 0.05f64..25.0,
        factor in 1.0f64..4.0,
        available in 1.0f64..2000.0,
        quantity in 1.0f64..200.0,
    ) {
        let params = params(quantity, 1000.0);
        let dilute = SampleRecord::new("dilute", concentration, available).unwrap();
        let strong = SampleRecord::new("strong", concentration * factor, available).unwrap();

        if let (Ok(a), Ok(b)) = (
            compute_transfer_plan(&dilute, &params),
            compute_transfer_plan(&strong, &params),
        ) {
            prop_assert!(b.sample_volume <= a.sample_volume + 1e-9);
        }
    }

    #[test]
    fn pipette_trips_add_up(volume in 0.1f64..5000.0) {
        let pipette = Pipette::for_volume(volume).unwrap();
        let trips = pipette.split(volume);

        prop_assert!(!trips.is_empty());
        prop_assert!(trips.iter().all(|&v| v <= pipette.max_volume() + 1e-9));
        prop_assert!((trips.iter().sum::<f64>() - volume).abs() < 1e-6);
    }
}

#[test]
fn test_exact_boundaries_are_feasible() {
    // required == available
    let params = params(100.0, 200.0);
    let sample = SampleRecord::new("edge", 2.0, 50.0).unwrap();
    let plan = compute_transfer_plan(&sample, &params).unwrap();
    assert_eq!(plan.sample_volume, 50.0);

    // required == final volume: no diluent
    let sample = SampleRecord::new("neat", 0.5, 500.0).unwrap();
    let plan = compute_transfer_plan(&sample, &params).unwrap();
    assert_eq!(plan.sample_volume, 200.0);
    assert_eq!(plan.diluent_volume, 0.0);

    // required == min pipette volume
    let sample = SampleRecord::new("floor", 100.0, 10.0).unwrap();
    let plan = compute_transfer_plan(&sample, &params).unwrap();
    assert_eq!(plan.sample_volume, 1.0);
}
