mod support;

use fedstat_common::models::JoinSpec;
use fedstat_engine::{AnalysisDispatcher, JoinEngine, QueryOptions};
use fedstat_error::{ErrorCode, ErrorContext};
use serde_json::json;
use support::{harness, provider, stored_query, Harness, MockBehavior};

async fn two_source_harness() -> Harness {
    harness(
        vec![
            (
                "population",
                MockBehavior::Records(vec![json!({"state": "CA", "pop": 39})]),
            ),
            (
                "agriculture",
                MockBehavior::Records(vec![
                    json!({"state": "CA", "corn": 100}),
                    json!({"state": "TX", "corn": 50}),
                ]),
            ),
        ],
        vec![provider("population", true), provider("agriculture", true)],
        vec![stored_query(
            "ca_population",
            "population",
            json!({"year": "2020"}),
            true,
        )],
    )
    .await
}

fn spec(raw: serde_json::Value) -> JoinSpec {
    serde_json::from_value(raw).unwrap()
}

#[tokio::test]
async fn test_inner_join_keeps_matching_keys_only() {
    let h = two_source_harness().await;
    let join = JoinEngine::new(h.engine.clone());

    let table = join
        .join_to_table(
            &spec(json!({
                "queries": [
                    {"provider_id": "population"},
                    {"provider_id": "agriculture"}
                ],
                "join_on": ["state"],
                "how": "inner"
            })),
            &QueryOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        table.to_records(),
        vec![json!({"state": "CA", "pop": 39, "corn": 100})]
    );
}

#[tokio::test]
async fn test_left_join_follows_accumulated_left_side() {
    let h = two_source_harness().await;
    let join = JoinEngine::new(h.engine.clone());

    let table = join
        .join_to_table(
            &spec(json!({
                "queries": [
                    {"provider_id": "population"},
                    {"provider_id": "agriculture"}
                ],
                "join_on": ["state"],
                "how": "left"
            })),
            &QueryOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        table.to_records(),
        vec![json!({"state": "CA", "pop": 39, "corn": 100})]
    );
}

#[tokio::test]
async fn test_outer_join_marks_unmatched_absent() {
    let h = two_source_harness().await;
    let join = JoinEngine::new(h.engine.clone());

    let table = join
        .join_to_table(
            &spec(json!({
                "queries": [
                    {"provider_id": "population"},
                    {"provider_id": "agriculture"}
                ],
                "join_on": ["state"],
                "how": "outer"
            })),
            &QueryOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        table.to_records(),
        vec![
            json!({"state": "CA", "pop": 39, "corn": 100}),
            json!({"state": "TX", "pop": null, "corn": 50}),
        ]
    );
}

#[tokio::test]
async fn test_join_with_aggregation() {
    let h = harness(
        vec![
            (
                "crimes",
                MockBehavior::Records(vec![
                    json!({"state": "CA", "v": 10}),
                    json!({"state": "CA", "v": 20}),
                    json!({"state": "TX", "v": 5}),
                ]),
            ),
            (
                "names",
                MockBehavior::Records(vec![
                    json!({"state": "CA", "name": "California"}),
                    json!({"state": "TX", "name": "Texas"}),
                ]),
            ),
        ],
        vec![provider("crimes", true), provider("names", true)],
        vec![],
    )
    .await;
    let join = JoinEngine::new(h.engine.clone());

    let table = join
        .join_to_table(
            &spec(json!({
                "queries": [
                    {"provider_id": "crimes"},
                    {"provider_id": "names"}
                ],
                "join_on": ["state"],
                "how": "inner",
                "aggregation": {
                    "group_by": ["state"],
                    "metrics": [{"column": "v", "agg": "sum", "alias": "total"}]
                }
            })),
            &QueryOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        table.to_records(),
        vec![
            json!({"state": "CA", "total": 30}),
            json!({"state": "TX", "total": 5}),
        ]
    );
}

#[tokio::test]
async fn test_missing_join_key_names_offending_alias() {
    let h = harness(
        vec![
            (
                "population",
                MockBehavior::Records(vec![json!({"state": "CA", "pop": 39})]),
            ),
            (
                "agriculture",
                MockBehavior::Records(vec![json!({"state_abbr": "CA", "corn": 100})]),
            ),
        ],
        vec![provider("population", true), provider("agriculture", true)],
        vec![],
    )
    .await;
    let join = JoinEngine::new(h.engine.clone());

    let err = join
        .join_to_table(
            &spec(json!({
                "queries": [
                    {"provider_id": "population"},
                    {"provider_id": "agriculture", "alias": "ag"}
                ],
                "join_on": ["state"]
            })),
            &QueryOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::MissingJoinKey);
    match err.context.unwrap() {
        ErrorContext::MissingJoinKey {
            alias,
            missing_keys,
            available_columns,
        } => {
            assert_eq!(alias, "ag");
            assert_eq!(missing_keys, vec!["state"]);
            assert!(available_columns.contains(&"state_abbr".to_string()));
        }
        other => panic!("Unexpected context: {:?}", other),
    }
}

#[tokio::test]
async fn test_rename_columns_repairs_key_mismatch() {
    let h = harness(
        vec![
            (
                "population",
                MockBehavior::Records(vec![json!({"state": "CA", "pop": 39})]),
            ),
            (
                "agriculture",
                MockBehavior::Records(vec![json!({"state_abbr": "CA", "corn": 100})]),
            ),
        ],
        vec![provider("population", true), provider("agriculture", true)],
        vec![],
    )
    .await;
    let join = JoinEngine::new(h.engine.clone());

    let table = join
        .join_to_table(
            &spec(json!({
                "queries": [
                    {"provider_id": "population"},
                    {
                        "provider_id": "agriculture",
                        "rename_columns": {"state_abbr": "state"}
                    }
                ],
                "join_on": ["state"]
            })),
            &QueryOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        table.to_records(),
        vec![json!({"state": "CA", "pop": 39, "corn": 100})]
    );
}

#[tokio::test]
async fn test_descriptor_can_target_stored_query() {
    let h = harness(
        vec![
            ("population", MockBehavior::EchoParams),
            (
                "agriculture",
                MockBehavior::Records(vec![json!({"year": "2020", "corn": 100})]),
            ),
        ],
        vec![provider("population", true), provider("agriculture", true)],
        vec![stored_query(
            "pop_by_year",
            "population",
            json!({"year": "2020"}),
            true,
        )],
    )
    .await;
    let join = JoinEngine::new(h.engine.clone());

    let table = join
        .join_to_table(
            &spec(json!({
                "queries": [
                    {"query_id": "pop_by_year"},
                    {"provider_id": "agriculture"}
                ],
                "join_on": ["year"]
            })),
            &QueryOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(table.row_count(), 1);
    assert!(table.has_column("corn"));
}

#[tokio::test]
async fn test_single_descriptor_is_rejected() {
    let h = two_source_harness().await;
    let join = JoinEngine::new(h.engine.clone());

    let err = join
        .join_to_table(
            &spec(json!({
                "queries": [{"provider_id": "population"}],
                "join_on": ["state"]
            })),
            &QueryOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidJoinSpec);
}

#[tokio::test]
async fn test_failed_descriptor_fails_the_join() {
    let h = harness(
        vec![
            (
                "population",
                MockBehavior::Records(vec![json!({"state": "CA"})]),
            ),
            ("broken", MockBehavior::AlwaysTransient),
        ],
        vec![provider("population", true), provider("broken", true)],
        vec![],
    )
    .await;
    let join = JoinEngine::new(h.engine.clone());

    let err = join
        .join_to_table(
            &spec(json!({
                "queries": [
                    {"provider_id": "population"},
                    {"provider_id": "broken"}
                ],
                "join_on": ["state"]
            })),
            &QueryOptions::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::Transient);
}

#[tokio::test]
async fn test_joined_table_feeds_analysis() {
    let h = two_source_harness().await;
    let join = JoinEngine::new(h.engine.clone());

    let table = join
        .join_to_table(
            &spec(json!({
                "queries": [
                    {"provider_id": "population"},
                    {"provider_id": "agriculture"}
                ],
                "join_on": ["state"],
                "how": "outer"
            })),
            &QueryOptions::default(),
        )
        .await
        .unwrap();

    let dispatcher = AnalysisDispatcher::new();
    let plan = serde_json::from_value(json!({"basic_statistics": true})).unwrap();
    let report = dispatcher.run_analysis(&table, &plan);

    let stats = &report.sections["basic_statistics"];
    assert_eq!(stats["row_count"], json!(2));
    assert_eq!(stats["numeric_summary"]["corn"]["sum"], json!(150.0));
    // TX pop is absent after the outer join
    assert_eq!(stats["missing_values"]["pop"], json!(1));
}
