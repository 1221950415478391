//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! Covers:
//! - Contract snapshots (config defaults, column naming)
//! - Extraction ordering and completeness over an in-memory source
//! - Extraction feeding the resampler, including chunk carry-over
//! - Handle release on completion, early drop and upstream failure
//! - Recording replay from disk

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{SyncPolicyConfig, TopicName, TIMESTAMP_COLUMN};

    #[test]
    fn test_config_defaults() {
        let config = ConfigLoader::load_from_str(
            r#"
[extract]
topics = [{ topic = "/imu" }]
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.version, contracts::ConfigVersion::V1);
        assert_eq!(config.source.batch_size, 256);
        assert_eq!(config.extract.window_sec, 5.0);
        assert!(config.sync.is_none());
        assert!(!config.output.skip_nulls);
    }

    #[test]
    fn test_sync_section_defaults() {
        let config = ConfigLoader::load_from_str(
            r#"{"extract": {}, "sync": {"target_fps": 10.0}}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        let sync = config.sync.unwrap();
        assert_eq!(sync.policy, SyncPolicyConfig::Hold);
        assert_eq!(sync.timestamp_column, TIMESTAMP_COLUMN);
    }

    #[test]
    fn test_column_naming() {
        assert_eq!(
            TopicName::from("/imu").column_name("acceleration.x"),
            "/imu.acceleration.x"
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use contracts::{
        Column, ContractError, ExtractConfig, Frame, Record, SyncConfig, SyncPolicyConfig,
        TopicSelection, Value, TIMESTAMP_COLUMN,
    };
    use extractor::{extract, ExtractRequest, MemorySource};
    use serde_json::json;
    use sync_engine::SyncTransformer;

    const MS: u64 = 1_000_000;
    const SEC: u64 = 1_000_000_000;

    /// IMU every 100 ms over 3 s, GPS every 250 ms starting at 30 ms
    fn two_rate_source(batch_size: usize) -> MemorySource {
        let imu = (0..30u64)
            .map(|i| {
                Record::new(
                    i * 100 * MS,
                    json!({
                        "acceleration": {"x": i, "y": -(i as i64)},
                        "header": {"seq": i, "frame_id": "imu_link"}
                    }),
                )
            })
            .collect();
        let gps = (0..12u64)
            .map(|i| Record::new(30 * MS + i * 250 * MS, json!({"lat": 48.0 + i as f64, "lon": 11.0})))
            .collect();
        MemorySource::new(batch_size)
            .with_topic("/imu", imu)
            .with_topic("/gps", gps)
    }

    fn collect_ok(source: &MemorySource, request: &ExtractRequest) -> Vec<Frame> {
        extract(source, request)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn non_null(frames: &[Frame], column: &str) -> Vec<Value> {
        frames
            .iter()
            .flat_map(|f| f.column(column).map(|c| c.values.clone()).unwrap_or_default())
            .filter(|v| !v.is_null())
            .collect()
    }

    #[test]
    fn test_full_load_single_sorted_chunk() {
        let source = two_rate_source(5);
        let frames = collect_ok(&source, &ExtractRequest::new(60.0));

        assert_eq!(frames.len(), 1);
        let ts = frames[0].timestamps(TIMESTAMP_COLUMN).unwrap();
        assert_eq!(ts.len(), 42);
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_chunks_concatenate_to_full_sample_set() {
        let source = two_rate_source(4);
        let request = ExtractRequest::new(0.7);
        let frames = collect_ok(&source, &request);

        assert!(frames.len() > 1);
        assert!(frames.iter().all(|f| !f.is_empty()));

        // strictly increasing, non-overlapping chunks
        let mut last_end: Option<u64> = None;
        let mut total = 0;
        for frame in &frames {
            let ts = frame.timestamps(TIMESTAMP_COLUMN).unwrap();
            assert!(ts.windows(2).all(|w| w[0] <= w[1]));
            if let Some(prev) = last_end {
                assert!(ts[0] > prev);
            }
            last_end = ts.last().copied();
            total += ts.len();
        }
        assert_eq!(total, 42);

        // every sample exactly once, in order
        let expected_x: Vec<Value> = (0..30u64).map(|i| json!(i)).collect();
        assert_eq!(non_null(&frames, "/imu.acceleration.x"), expected_x);
        let expected_lat: Vec<Value> = (0..12u64).map(|i| json!(48.0 + i as f64)).collect();
        assert_eq!(non_null(&frames, "/gps.lat"), expected_lat);
    }

    #[test]
    fn test_field_selection_leaf_and_group() {
        let source = two_rate_source(8);
        let request = ExtractRequest::new(1.0).with_selection(vec![
            TopicSelection::fields("/imu", ["acceleration.x", "header"]),
            TopicSelection::fields("/gps", ["lat"]),
        ]);
        let chunks = extract(&source, &request).unwrap();

        assert_eq!(
            chunks.column_names(),
            vec![
                "timestamp_ns",
                "/imu.acceleration.x",
                "/imu.header.frame_id",
                "/imu.header.seq",
                "/gps.lat",
            ]
        );
        let frames: Vec<Frame> = chunks.collect::<Result<_, _>>().unwrap();
        assert!(frames.iter().all(|f| f.column("/imu.acceleration.y").is_none()));
    }

    #[test]
    fn test_unknown_field_and_topic_fail_before_any_chunk() {
        let source = two_rate_source(8);

        let bad_field = ExtractRequest::new(1.0)
            .with_selection(vec![TopicSelection::fields("/imu", ["acceleration.w"])]);
        let err = extract(&source, &bad_field).unwrap_err();
        assert!(matches!(err, ContractError::FieldNotFound { .. }));
        assert_eq!(source.open_handles(), 0);

        let bad_topic =
            ExtractRequest::new(1.0).with_selection(vec![TopicSelection::all("/lidar")]);
        let err = extract(&source, &bad_topic).unwrap_err();
        assert!(matches!(err, ContractError::UnknownTopic { .. }));
        assert!(err.is_validation());
        assert_eq!(source.open_handles(), 0);
    }

    #[test]
    fn test_empty_source_is_no_data() {
        let source = MemorySource::new(4);
        let err = extract(&source, &ExtractRequest::new(1.0)).unwrap_err();
        assert!(err.is_no_data());
    }

    #[test]
    fn test_range_between_samples_is_no_data() {
        // /gps samples at 30ms and 280ms, nothing in between
        let source = two_rate_source(4);
        let request = ExtractRequest::new(0.05)
            .with_selection(vec![TopicSelection::all("/gps")])
            .with_range(Some(40 * MS), Some(200 * MS));
        let chunks = extract(&source, &request).unwrap();

        let items: Vec<Result<Frame, ContractError>> = chunks.collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Err(ContractError::NoData { .. })));
        assert_eq!(source.open_handles(), 0);
    }

    #[test]
    fn test_handles_closed_after_completion() {
        let source = two_rate_source(3);
        let mut chunks = extract(&source, &ExtractRequest::new(0.5)).unwrap();
        assert_eq!(source.open_handles(), 2);

        for chunk in chunks.by_ref() {
            chunk.unwrap();
        }
        assert_eq!(source.open_handles(), 0);
        assert!(chunks.next().is_none());
    }

    #[test]
    fn test_handles_closed_after_early_drop() {
        let source = two_rate_source(3);
        let mut chunks = extract(&source, &ExtractRequest::new(0.5)).unwrap();
        chunks.next().unwrap().unwrap();
        assert!(source.open_handles() > 0);

        drop(chunks);
        assert_eq!(source.open_handles(), 0);
    }

    #[test]
    fn test_handles_closed_after_upstream_failure() {
        let source = two_rate_source(2).fail_after("/gps", 1);
        let items: Vec<Result<Frame, ContractError>> =
            extract(&source, &ExtractRequest::new(0.5)).unwrap().collect();

        let errors: Vec<_> = items.iter().filter(|r| r.is_err()).collect();
        assert_eq!(errors.len(), 1);
        assert!(items.last().is_some_and(|r| r.is_err()));
        assert!(matches!(
            items.last(),
            Some(Err(ContractError::Source { .. }))
        ));
        assert_eq!(source.open_handles(), 0);
    }

    #[test]
    fn test_grid_spacing_constant_across_chunks() {
        let source = two_rate_source(4);
        let mut transformer = SyncTransformer::new(SyncConfig::new(7.0)).unwrap();
        let step = transformer.step_ns();

        let mut ticks = Vec::new();
        for chunk in extract(&source, &ExtractRequest::new(0.4)).unwrap() {
            let dense = transformer.fit_transform(&chunk.unwrap()).unwrap();
            ticks.extend(dense.timestamps(TIMESTAMP_COLUMN).unwrap());
        }

        assert!(ticks.len() > 10);
        assert_eq!(ticks[0], 0);
        assert!(ticks.windows(2).all(|w| w[1] - w[0] == step));
    }

    #[test]
    fn test_carry_over_across_extracted_chunks() {
        let records = [(0, 1), (1, 2), (2, 3), (4, 5)]
            .into_iter()
            .map(|(s, v)| Record::new(s * SEC, json!({ "val": v })))
            .collect();
        let source = MemorySource::new(2).with_topic("/a", records);
        let frames = collect_ok(&source, &ExtractRequest::new(3.0));
        assert_eq!(frames.len(), 2);

        let mut transformer = SyncTransformer::new(SyncConfig::new(1.0)).unwrap();
        let first = transformer.fit_transform(&frames[0]).unwrap();
        assert_eq!(
            first.timestamps(TIMESTAMP_COLUMN).unwrap(),
            vec![0, SEC, 2 * SEC]
        );

        let second = transformer.fit_transform(&frames[1]).unwrap();
        assert_eq!(second.timestamps(TIMESTAMP_COLUMN).unwrap(), vec![3 * SEC, 4 * SEC]);
        assert_eq!(
            second.column("/a.val").unwrap().values,
            vec![json!(3), json!(5)]
        );
    }

    #[test]
    fn test_ten_hz_grid() {
        let frame = Frame::new(vec![
            Column::timestamps(TIMESTAMP_COLUMN, &[0, 100 * MS, 200 * MS, 300 * MS]),
            Column::new("/imu.x", vec![json!(1), json!(2), json!(3), json!(4)]),
        ])
        .unwrap();
        let mut transformer = SyncTransformer::new(SyncConfig::new(10.0)).unwrap();
        let out = transformer.fit_transform(&frame).unwrap();

        assert_eq!(
            out.timestamps(TIMESTAMP_COLUMN).unwrap(),
            vec![0, 100 * MS, 200 * MS, 300 * MS]
        );
        assert_eq!(out.column("/imu.x").unwrap().values, frame.columns()[1].values);
    }

    #[test]
    fn test_reset_rederives_origin() {
        let chunk = |ts: &[u64]| {
            Frame::new(vec![
                Column::timestamps(TIMESTAMP_COLUMN, ts),
                Column::new("/a.v", ts.iter().map(|t| json!(t)).collect()),
            ])
            .unwrap()
        };
        let mut transformer = SyncTransformer::new(SyncConfig::new(1.0)).unwrap();
        transformer.fit_transform(&chunk(&[0, SEC])).unwrap();
        assert_eq!(transformer.next_tick_ns(), Some(2 * SEC));

        transformer.reset();
        assert_eq!(transformer.next_tick_ns(), None);
        assert!(transformer.cached_value("/a.v").is_none());

        let out = transformer
            .fit_transform(&chunk(&[10 * SEC + 500 * MS, 11 * SEC + 500 * MS]))
            .unwrap();
        assert_eq!(
            out.timestamps(TIMESTAMP_COLUMN).unwrap(),
            vec![10 * SEC + 500 * MS, 11 * SEC + 500 * MS]
        );
    }

    #[test]
    fn test_policies_over_extracted_chunks() {
        // GPS sampled every 250 ms, resampled at 10 Hz
        let source = two_rate_source(16);
        let request =
            ExtractRequest::new(1.0).with_selection(vec![TopicSelection::fields("/gps", ["lat"])]);

        let run = |policy: SyncPolicyConfig| {
            let mut transformer =
                SyncTransformer::new(SyncConfig::new(10.0).with_policy(policy)).unwrap();
            let mut lat = Vec::new();
            for chunk in extract(&source, &request).unwrap() {
                let dense = transformer.fit_transform(&chunk.unwrap()).unwrap();
                lat.extend(dense.column("/gps.lat").unwrap().values.clone());
            }
            lat
        };

        let hold = run(SyncPolicyConfig::Hold);
        assert!(hold.iter().all(|v| !v.is_null()));

        // a sample is at most 100 ms old on exactly 2 of every 5 ticks
        let drop = run(SyncPolicyConfig::Drop { step_ns: None });
        assert_eq!(hold.len(), drop.len());
        let kept = drop.iter().filter(|v| !v.is_null()).count();
        assert!(kept < hold.len());
        assert!(kept * 5 >= hold.len() * 2 - 5);

        let as_of = run(SyncPolicyConfig::AsOf {
            tolerance_ns: 300 * MS,
        });
        assert!(as_of.iter().all(|v| !v.is_null()));
    }

    #[test]
    fn test_config_driven_run() {
        let config = config_loader::ConfigLoader::load_from_str(
            r#"
[extract]
window_sec = 1.0
topics = [{ topic = "/imu", fields = ["acceleration"] }]

[sync]
target_fps = 5.0
policy = { kind = "as_of", tolerance_ns = 50000000 }
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let source = two_rate_source(8);
        let request = ExtractRequest::from(&config.extract);
        let mut transformer = SyncTransformer::new(config.sync.clone().unwrap()).unwrap();

        let mut rows = 0;
        for chunk in extract(&source, &request).unwrap() {
            let dense = transformer.fit_transform(&chunk.unwrap()).unwrap();
            assert_eq!(dense.num_columns(), 3);
            rows += dense.num_rows();
        }
        // 0 .. 2.9 s at 200 ms
        assert_eq!(rows, 15);
    }

    #[test]
    fn test_extract_config_conversion() {
        let request = ExtractRequest::from(&ExtractConfig::default());
        assert_eq!(request.selection, None);
        assert_eq!(request.window_sec, 5.0);
    }
}

#[cfg(test)]
mod replay_tests {
    use std::io::Write;

    use contracts::{SyncConfig, SyncPolicyConfig, TIMESTAMP_COLUMN};
    use extractor::{extract, ExtractRequest, Recording};
    use observability::RunMetricsAggregator;
    use sync_engine::SyncTransformer;

    #[test]
    fn test_recording_through_extract_and_sync() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..20u64 {
            writeln!(
                file,
                r#"{{"topic":"/speed","timestamp_ns":{},"data":{{"kmh":{}}}}}"#,
                i * 50_000_000,
                i
            )
            .unwrap();
        }
        // one late line, re-sorted on load
        writeln!(
            file,
            r#"{{"topic":"/brake","timestamp_ns":400000000,"data":{{"on":true}}}}"#
        )
        .unwrap();
        writeln!(
            file,
            r#"{{"topic":"/brake","timestamp_ns":100000000,"data":{{"on":false}}}}"#
        )
        .unwrap();
        file.flush().unwrap();

        let recording = Recording::load(file.path()).unwrap();
        assert_eq!(recording.len(), 22);
        assert_eq!(recording.out_of_order(), 1);

        let source = recording.into_source(4);
        let mut transformer = SyncTransformer::new(
            SyncConfig::new(5.0).with_policy(SyncPolicyConfig::Drop { step_ns: None }),
        )
        .unwrap();
        let mut metrics = RunMetricsAggregator::new();

        let mut ticks = Vec::new();
        let mut brake = Vec::new();
        for chunk in extract(&source, &ExtractRequest::new(0.25)).unwrap() {
            let chunk = chunk.unwrap();
            metrics.update_chunk(chunk.num_rows(), 0.0);
            let dense = transformer.fit_transform(&chunk).unwrap();
            ticks.extend(dense.timestamps(TIMESTAMP_COLUMN).unwrap());
            brake.extend(dense.column("/brake.on").unwrap().values.clone());
        }

        assert_eq!(metrics.summary().rows_extracted, 22);
        assert_eq!(
            ticks,
            vec![0, 200_000_000, 400_000_000, 600_000_000, 800_000_000]
        );
        assert_eq!(
            brake,
            vec![
                serde_json::Value::Null,
                serde_json::json!(false),
                serde_json::json!(true),
                serde_json::Value::Null,
                serde_json::Value::Null,
            ]
        );
    }
}
