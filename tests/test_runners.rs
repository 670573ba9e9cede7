use smrt::core::assembler::concat_results;
use smrt::core::microstructure::Exponential;
use smrt::core::runner::{DistributedRunner, LocalCluster, LocalParallelRunner, SequentialRunner};
use smrt::core::simulation::{AxisDescriptor, SNOWPACK_AXIS};
use smrt::core::snowpack::Layer;
use smrt::{make_model, Label, RunOptions, SensorConfiguration, SimulationResult, Snowpack};
use std::sync::Arc;
use std::time::Instant;

fn snowpacks() -> Vec<Snowpack> {
    [(0.3, 1e-4), (0.6, 1.5e-4), (1.0, 2e-4), (2.0, 2.5e-4), (5.0, 3e-4)]
        .iter()
        .map(|&(d, corr_length)| {
            let top = Arc::new(Exponential::new(0.25, corr_length).unwrap());
            let bottom = Arc::new(Exponential::new(0.35, 2.0 * corr_length).unwrap());
            Snowpack::new(vec![
                Layer::new(d, 255.0, 230.0, top).unwrap(),
                Layer::new(10.0, 265.0, 320.0, bottom).unwrap(),
            ])
        })
        .collect()
}

#[test]
fn test_strategies_give_identical_results() {
    let _ = env_logger::builder().is_test(true).try_init();

    let sensor = SensorConfiguration::passive(&[19e9, 37e9], &[40.0, 55.0]).unwrap();
    let model = make_model("iba", "first_order").unwrap();

    let start = Instant::now();
    let sequential = model
        .run(&sensor, snowpacks(), RunOptions::default().with_runner(Arc::new(SequentialRunner::new(false))))
        .unwrap();
    println!("sequential: {:.3} s", start.elapsed().as_secs_f64());

    let start = Instant::now();
    let parallel = model
        .run(
            &sensor,
            snowpacks(),
            RunOptions::default().with_runner(Arc::new(LocalParallelRunner::new(Some(3), 1))),
        )
        .unwrap();
    println!("local parallel: {:.3} s", start.elapsed().as_secs_f64());

    let start = Instant::now();
    let cluster = DistributedRunner::new(LocalCluster::new(2).unwrap()).with_chunk(3).unwrap();
    let distributed = model
        .run(&sensor, snowpacks(), RunOptions::default().with_runner(Arc::new(cluster)))
        .unwrap();
    println!("distributed: {:.3} s", start.elapsed().as_secs_f64());

    assert_eq!(sequential.data().shape(), &[2, 5, 2, 2]);
    assert_eq!(sequential, parallel);
    assert_eq!(sequential, distributed);
}

#[test]
fn test_batches_match_single_run() {
    let sensor = SensorConfiguration::passive(&[37e9], &[55.0]).unwrap();
    let model = make_model("iba", "first_order").unwrap();

    let whole = model.run(&sensor, snowpacks(), RunOptions::default().parallel()).unwrap();

    let parts: Vec<SimulationResult> = snowpacks()
        .into_iter()
        .map(|sp| model.run(&sensor, sp, RunOptions::default()).unwrap())
        .collect();
    let axis = AxisDescriptor::new(SNOWPACK_AXIS, (0..5usize).map(Label::from).collect());
    let joined = concat_results(parts, &axis).unwrap();

    assert_eq!(whole, joined);
}
