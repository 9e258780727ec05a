use approx::assert_abs_diff_eq;
use crashrisk::chain::{Direction, build_chain, build_chains, support_count};
use crashrisk::config::{ChainConfig, EngineConfig, TrainingConfig};
use crashrisk::data::load_records;
use crashrisk::domains::DomainTable;
use crashrisk::hashing::DEFAULT_DIMENSION;
use crashrisk::model::predict;
use crashrisk::record::{Conditions, Field, Record};
use crashrisk::session::{Estimate, RiskSession};
use crashrisk::train::train;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use tempfile::tempdir;

const VEHICLES: [&str; 4] = ["Sedan", "Station Wagon", "Bike", "Box Truck"];
const ACTIONS: [&str; 3] = ["Going Straight Ahead", "Making Left Turn", "Parked"];
const BOROUGHS: [&str; 5] = ["BROOKLYN", "QUEENS", "MANHATTAN", "BRONX", "STATEN ISLAND"];

fn vehicle_only(vehicle: &str, injured: bool) -> Record {
    Record::new(
        Conditions {
            vehicle_type: Some(vehicle.to_string()),
            ..Conditions::default()
        },
        injured,
    )
}

fn four_records() -> Vec<Record> {
    vec![
        vehicle_only("Sedan", true),
        vehicle_only("Sedan", false),
        vehicle_only("Truck", true),
        vehicle_only("Truck", true),
    ]
}

/// Collisions where bikes, night hours and Brooklyn carry extra risk.
fn synthetic_records(count: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let vehicle = VEHICLES[rng.gen_range(0..VEHICLES.len())];
            let action = ACTIONS[rng.gen_range(0..ACTIONS.len())];
            let borough = BOROUGHS[rng.gen_range(0..BOROUGHS.len())];
            let hour: u8 = rng.gen_range(0..24);
            let dow: u8 = rng.gen_range(0..7);

            let mut risk: f64 = 0.15;
            if vehicle == "Bike" {
                risk += 0.35;
            }
            if !(6..22).contains(&hour) {
                risk += 0.2;
            }
            if borough == "BROOKLYN" {
                risk += 0.1;
            }
            if action == "Parked" {
                risk -= 0.1;
            }
            let injured = rng.gen_bool(risk.clamp(0.01, 0.99));

            Record::new(
                Conditions {
                    vehicle_type: Some(vehicle.to_string()),
                    pre_crash: Some(action.to_string()),
                    borough: rng.gen_bool(0.9).then(|| borough.to_string()),
                    hour: Some(hour),
                    dow: Some(dow),
                },
                injured,
            )
        })
        .collect()
}

#[test]
fn four_record_scenario_orders_vehicle_types() {
    let model = train(&four_records(), DEFAULT_DIMENSION, &TrainingConfig::default())
        .expect("non-empty training set");

    assert_abs_diff_eq!(model.base_rate(), 0.75, epsilon = 1e-12);

    let unconstrained = model.predict(&Conditions::new());
    assert!(
        (unconstrained - 0.75).abs() < 0.1,
        "unconstrained prediction {unconstrained} drifted away from the base rate"
    );

    let truck = model.predict(&Conditions {
        vehicle_type: Some("Truck".to_string()),
        ..Conditions::default()
    });
    let sedan = model.predict(&Conditions {
        vehicle_type: Some("Sedan".to_string()),
        ..Conditions::default()
    });
    assert!(truck > sedan, "truck {truck} should exceed sedan {sedan}");
}

#[test]
fn training_is_bit_for_bit_deterministic() {
    let records = synthetic_records(500, 7);
    let config = TrainingConfig::default();
    let first = train(&records, 256, &config).expect("model");
    let second = train(&records, 256, &config).expect("model");
    assert_eq!(first, second);

    let query = records[3].conditions.clone();
    assert_eq!(
        first.predict(&query).to_bits(),
        second.predict(&query).to_bits()
    );
}

#[test]
fn predictions_stay_in_unit_interval_for_unseen_values() {
    let records = synthetic_records(400, 11);
    let model = train(&records, DEFAULT_DIMENSION, &TrainingConfig::default()).expect("model");

    let unseen = Conditions {
        vehicle_type: Some("Hovercraft".to_string()),
        pre_crash: Some("Reversing Uphill".to_string()),
        borough: Some("ATLANTIS".to_string()),
        hour: Some(3),
        dow: Some(0),
    };
    for query in [Conditions::new(), unseen] {
        let p = model.predict(&query);
        assert!((0.0..=1.0).contains(&p), "prediction {p} out of range");
    }
}

#[test]
fn empty_training_set_yields_no_model() {
    assert!(train(&[], DEFAULT_DIMENSION, &TrainingConfig::default()).is_none());
    assert_eq!(predict(None, &Conditions::new()), None);
}

#[test]
fn chains_are_monotone_and_use_each_field_once() {
    let records = synthetic_records(3000, 42);
    let model = train(&records, DEFAULT_DIMENSION, &TrainingConfig::default()).expect("model");
    let config = ChainConfig::default();
    let domains = DomainTable::build(&records, config.domain_cap);

    for direction in [Direction::Worst, Direction::Best] {
        let chain = build_chain(&records, Some(&model), &domains, direction, &config);
        assert!(!chain.is_empty() && chain.len() <= config.max_depth + 1);
        assert!(chain[0].is_start());
        assert_eq!(chain[0].support, records.len());

        let mut seen = Vec::new();
        let mut selection = Conditions::new();
        for pair in chain.windows(2) {
            let (previous, step) = (&pair[0], &pair[1]);
            let field = step.field.expect("non-start steps carry a field");
            assert!(!seen.contains(&field), "{field} assigned twice");
            seen.push(field);

            let improvement = direction.score(step.probability - previous.probability);
            assert!(
                improvement >= config.min_delta,
                "{direction} step {} improved by only {improvement}",
                step.label
            );
            assert!(step.support >= config.min_support);
            assert!(step.support <= previous.support);

            selection.set(field, step.value.clone().expect("non-start steps carry a value"));
            assert_eq!(step.support, support_count(&records, &selection));
            assert_abs_diff_eq!(step.probability, model.predict(&selection), epsilon = 1e-15);
        }
    }
}

#[test]
fn support_threshold_above_record_count_stops_at_start() {
    let records = synthetic_records(200, 3);
    let model = train(&records, DEFAULT_DIMENSION, &TrainingConfig::default()).expect("model");
    let config = ChainConfig {
        min_support: records.len() + 1,
        ..ChainConfig::default()
    };
    let domains = DomainTable::build(&records, config.domain_cap);

    let chains = build_chains(&records, Some(&model), &domains, &config);
    for chain in [&chains.worst, &chains.best] {
        assert_eq!(chain.len(), 1);
        assert!(chain[0].is_start());
        assert_eq!(chain[0].support, records.len());
    }
}

#[test]
fn batch_scoring_matches_sequential_prediction() {
    let records = synthetic_records(300, 5);
    let model = train(&records, 512, &TrainingConfig::default()).expect("model");
    let batch = model.predict_many(&records);
    assert_eq!(batch.len(), records.len());
    for (record, p) in records.iter().zip(&batch) {
        assert_eq!(p.to_bits(), model.predict(&record.conditions).to_bits());
    }
}

#[test]
fn session_reads_files_and_configuration_from_disk() {
    let dir = tempdir().expect("temporary directory");
    let data_path = dir.path().join("collisions.tsv");
    let mut table = String::from("vehicle_type\tpre_crash\tborough\thour\tdow\tinjured\n");
    for row in 0..60 {
        let (vehicle, injured) = if row % 3 == 0 {
            ("Bike", "1")
        } else {
            ("Sedan", if row % 5 == 0 { "1" } else { "0" })
        };
        table.push_str(&format!(
            "{vehicle}\tGoing Straight Ahead\tQUEENS\t{}\t{}\t{injured}\n",
            row % 24,
            row % 7
        ));
    }
    fs::write(&data_path, table).expect("write data");

    let config_path = dir.path().join("crashrisk.toml");
    fs::write(
        &config_path,
        "[hashing]\ndimension = 2048\n\n[chain]\nmin_support = 10\nmax_depth = 2\n",
    )
    .expect("write config");

    let config = EngineConfig::load(&config_path).expect("valid configuration");
    assert_eq!(config.hashing.dimension, 2048);
    assert_eq!(config.chain.max_depth, 2);
    assert_eq!(config.training, TrainingConfig::default());

    let records = load_records(&data_path).expect("valid data");
    assert_eq!(records.len(), 60);

    let session = RiskSession::new(config, records);
    assert_eq!(session.model().expect("model").dimension(), 2048);

    let bike = Conditions {
        vehicle_type: Some("Bike".to_string()),
        ..Conditions::default()
    };
    let sedan = Conditions {
        vehicle_type: Some("Sedan".to_string()),
        ..Conditions::default()
    };
    let (Estimate::Probability(bike_risk), Estimate::Probability(sedan_risk)) =
        (session.estimate(&bike), session.estimate(&sedan))
    else {
        panic!("trained session must produce estimates");
    };
    assert!(bike_risk > sedan_risk);

    let worst = session.chain(Direction::Worst);
    assert!(worst.len() <= 3);
    assert_eq!(
        session.display_domains().values(Field::Borough).len(),
        1,
        "only QUEENS appears in the table"
    );
}
