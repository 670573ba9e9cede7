use smrt::core::data_array::Selection;
use smrt::core::microstructure::Exponential;
use smrt::core::registry::default_registry;
use smrt::core::sensor::THETA_INC;
use smrt::core::snowpack::Layer;
use smrt::core::{SimpleIsotropicAtmosphere, SnowpackDimension};
use smrt::{make_model, make_snowpack, Label, Mode, Options, RunOptions, SensorConfiguration, SmrtError, Snowpack};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two layers, 200 and 400 kg/m3, exponential microstructure
fn two_layer_snowpack() -> Snowpack {
    let options = Options::new()
        .with("density", vec![200.0, 400.0])
        .with("temperature", 250.0)
        .with("corr_length", 5e-5);
    make_snowpack(&default_registry().microstructures, &[0.1, 100.0], "exponential", &options)
        .expect("Failed to build snowpack")
}

#[test]
fn test_passive_two_layer_snowpack() {
    init_logging();
    let sensor = SensorConfiguration::passive(&[37e9], &[55.0]).expect("Failed to build sensor");
    let model = make_model("iba", "first_order").expect("Failed to build model");

    let result = model
        .run(&sensor, two_layer_snowpack(), RunOptions::default())
        .expect("Simulation failed");
    let passive = result.as_passive().expect("Expected a passive result");

    let tbv = passive.tb_v(&Selection::new()).unwrap().as_f64().expect("TbV is not a scalar");
    let tbh = passive.tb_h(&Selection::new()).unwrap().as_f64().expect("TbH is not a scalar");
    println!("TbV = {:.2} K, TbH = {:.2} K", tbv, tbh);

    for tb in [tbv, tbh] {
        assert!(tb.is_finite());
        assert!((0.0..=300.0).contains(&tb));
    }
    assert!(tbv > tbh);
}

#[test]
fn test_passive_with_atmosphere() {
    init_logging();
    let sensor = SensorConfiguration::passive(&[19e9, 37e9], &[55.0]).unwrap();
    let model = make_model("iba", "first_order").unwrap();
    let bare = two_layer_snowpack();
    let with_sky = two_layer_snowpack().with_atmosphere(Arc::new(SimpleIsotropicAtmosphere::new(30.0, 6.0, 0.9)));

    let tb = |sp: Snowpack| {
        model
            .run(&sensor, sp, RunOptions::default())
            .unwrap()
            .as_passive()
            .unwrap()
            .tb_v(&Selection::new().with("frequency", 37e9))
            .unwrap()
            .as_f64()
            .unwrap()
    };
    let clear = tb(bare);
    let cloudy = tb(with_sky);
    assert!(cloudy != clear);
    assert!(cloudy > 0.9 * clear);
}

#[test]
fn test_active_channels_match_sigma_vv() {
    init_logging();
    let sensor = SensorConfiguration::active(&[13e9], &[30.0, 40.0])
        .unwrap()
        .with_named_channels();
    let model = make_model("iba", "first_order").unwrap();
    let result = model.run(&sensor, two_layer_snowpack(), RunOptions::default()).unwrap();
    assert_eq!(result.mode(), Mode::Active);
    let active = result.as_active().unwrap();

    let mut values = Vec::new();
    for (channel, angle) in [("13VV30", 30.0), ("13VV40", 40.0)] {
        let by_channel = active.sigma_db(Some(channel), &Selection::new()).unwrap().as_f64().unwrap();
        let direct = active
            .sigma_vv_db(&Selection::new().with(THETA_INC, angle))
            .unwrap()
            .as_f64()
            .unwrap();
        println!("{}: {:.3} dB", channel, by_channel);
        assert!(by_channel.is_finite());
        approx::assert_relative_eq!(by_channel, direct, epsilon = 1e-12);
        values.push(by_channel);
    }
    assert!(values[0] != values[1]);

    // linear and dB accessors agree for every selection
    let linear = active.sigma(None, &Selection::new()).unwrap();
    let decibel = active.sigma_db(None, &Selection::new()).unwrap();
    let (linear, decibel) = (linear.as_array().unwrap(), decibel.as_array().unwrap());
    for (a, b) in linear.data().iter().zip(decibel.data().iter()) {
        if *a > 0.0 {
            approx::assert_relative_eq!(10.0 * a.log10(), *b, epsilon = 1e-12);
        } else {
            // cross-polarized terms vanish at backscatter
            assert!(!b.is_finite());
        }
    }
}

#[test]
fn test_inconsistent_angles_are_rejected() {
    let sensor = SensorConfiguration::active(&[13e9], &[30.0, 40.0]).unwrap();
    let model = make_model("iba", "first_order").unwrap();
    let result = model.run(&sensor, two_layer_snowpack(), RunOptions::default()).unwrap();
    let selection = Selection::new().with("theta", 30.0).with(THETA_INC, 40.0);
    let err = result.as_active().unwrap().sigma_vv(&selection).unwrap_err();
    assert!(matches!(err, SmrtError::InconsistentAngle { .. }));
}

#[test]
fn test_time_series_dimension() {
    let sensor = SensorConfiguration::passive(&[37e9], &[55.0]).unwrap();
    let model = make_model("iba", "nonscattering").unwrap();
    let snowpacks: Vec<Snowpack> = [0.2, 0.5, 1.0]
        .iter()
        .map(|&d| {
            let ms = Arc::new(Exponential::new(0.3, 1e-4).unwrap());
            Snowpack::new(vec![Layer::new(d, 260.0, 275.0, ms).unwrap()])
        })
        .collect();
    let days = vec![Label::from("d1"), Label::from("d2"), Label::from("d3")];
    let options = RunOptions::default().with_snowpack_dimension(SnowpackDimension::with_values("time", days.clone()));

    let result = model.run(&sensor, snowpacks, options).unwrap();
    assert_eq!(result.coord("time").unwrap(), days.as_slice());
    let tbv = result.as_passive().unwrap().tb_v(&Selection::new()).unwrap();
    assert_eq!(tbv.as_array().unwrap().shape(), &[3]);
}
