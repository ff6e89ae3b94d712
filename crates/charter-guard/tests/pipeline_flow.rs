// pipeline_flow.rs: end-to-end runs of the three-stage guard.
//
// Flow:
//   1. INPUT checks the farmer's question
//   2. SQL checks the generated statement (write confirmation handshake)
//   3. RESPONSE checks the answer before it is sent

use charter_core::{Principle, Severity};
use charter_guard::{
    CharterConfig, GuardError, PipelineContext, SqlAnalyzer, Stage, StatementKind,
    ValidationPipeline,
};

fn pipeline() -> ValidationPipeline {
    ValidationPipeline::standard().unwrap()
}

const UPDATE_SQL: &str = "UPDATE farmers SET name='x' WHERE id=1";

#[test]
fn unconfirmed_update_needs_confirmation() {
    let ctx = PipelineContext::from_json(r#"{"farmerId": 1, "writeConfirmation": ""}"#).unwrap();
    let result = pipeline().validate_sql(UPDATE_SQL, "rename me", &ctx).unwrap();

    assert!(!result.pass);
    assert_eq!(result.next, Stage::Blocked);
    assert!(result.flags.needs_confirmation);
    assert_eq!(result.flags.write_operation, Some(StatementKind::Update));
    assert_eq!(result.flags.sql_approved, Some(false));

    let pending = result
        .violations
        .iter()
        .find(|v| v.severity == Severity::ConfirmationRequired)
        .expect("confirmation violation");
    assert!(pending.remedy.as_deref().unwrap_or("").contains("\"UPDATE\""));
}

#[test]
fn confirmed_update_is_approved_with_audit_warning() {
    let ctx =
        PipelineContext::from_json(r#"{"farmerId": 1, "writeConfirmation": "UPDATE"}"#).unwrap();
    let result = pipeline().validate_sql(UPDATE_SQL, "rename me", &ctx).unwrap();

    assert!(result.pass);
    assert_eq!(result.next, Stage::Response);
    assert!(!result.flags.needs_confirmation);
    assert_eq!(result.flags.sql_approved, Some(true));
    assert!(result.violations.iter().any(|v| v.severity == Severity::Warning
        && v.description.contains("operation confirmed by user")));
    // Not scoped to farmer_id: reported, never blocking.
    assert!(result
        .violations
        .iter()
        .any(|v| v.description.contains("not scoped to farmer_id")));
}

#[test]
fn delete_confirmation_is_case_insensitive() {
    let analyzer = SqlAnalyzer::new(pipeline().evaluator()).unwrap();
    let sql = "DELETE FROM notes WHERE farmer_id = 3 AND id = 9";

    let wrong = analyzer.analyze(sql, &PipelineContext::new().with_write_confirmation("UPDATE"));
    assert!(!wrong.sql_approved);
    assert!(wrong.needs_confirmation);

    let lower = analyzer.analyze(sql, &PipelineContext::new().with_write_confirmation("delete"));
    assert!(lower.sql_approved);

    let via_metadata = analyzer.analyze(
        sql,
        &PipelineContext::new().with_metadata("writeConfirmation", "Delete"),
    );
    assert!(via_metadata.sql_approved);
}

#[test]
fn drop_table_is_blocked_even_when_confirmed() {
    let ctx = PipelineContext::new().with_write_confirmation("DROP");
    let result = pipeline()
        .validate_sql("DROP TABLE farmers", "clean up", &ctx)
        .unwrap();
    assert!(!result.pass);
    assert_eq!(result.flags.sql_approved, Some(false));
    assert!(result
        .violations
        .iter()
        .any(|v| v.severity == Severity::Critical && v.principle == Principle::SqlSafety));

    // Hidden after a harmless prefix.
    let sneaky = pipeline()
        .validate_sql("SELECT 1; DROP TABLE farmers", "q", &ctx)
        .unwrap();
    assert!(!sneaky.pass);
}

#[test]
fn select_is_never_blocked_by_confirmation() {
    let ctx = PipelineContext::for_farmer("5");
    let result = pipeline()
        .validate_sql(
            "SELECT field_name, area_ha FROM fields WHERE farmer_id = 5",
            "my fields",
            &ctx,
        )
        .unwrap();
    assert!(result.pass);
    assert!(!result.flags.needs_confirmation);
    assert_eq!(result.flags.write_operation, None);
}

#[test]
fn select_of_personal_columns_passes_but_is_not_approved() {
    let result = pipeline()
        .validate_sql(
            "SELECT phone FROM farmers WHERE farmer_id = 5",
            "q",
            &PipelineContext::new(),
        )
        .unwrap();
    assert!(result.pass);
    assert_eq!(result.flags.sql_approved, Some(false));
}

#[test]
fn discriminatory_query_is_blocked() {
    let p = pipeline();
    let ctx = PipelineContext::new();

    let blocked = p
        .validate_query("Why is mango not supported in Bulgaria?", &ctx)
        .unwrap();
    assert!(!blocked.pass);
    assert_eq!(blocked.next, Stage::Blocked);
    assert_eq!(blocked.flags.mango_rule_status.as_deref(), Some("FAIL"));

    let allowed = p
        .validate_query("How do I grow mango in Bulgaria?", &ctx)
        .unwrap();
    assert!(allowed.pass);
    assert_eq!(allowed.next, Stage::Sql);
}

#[test]
fn refusal_and_farmer_id_in_response() {
    let p = pipeline();
    let ctx = PipelineContext::for_farmer("1042");

    let refusal = p
        .validate_response("Sorry, we cannot help with mango in your region.", "q", &ctx)
        .unwrap();
    assert!(!refusal.pass);
    assert_eq!(refusal.next, Stage::Blocked);

    let leak = p
        .validate_response("Farmer 1042: irrigate field 3 tomorrow.", "q", &ctx)
        .unwrap();
    assert!(leak.pass);
    assert!(leak
        .violations
        .iter()
        .any(|v| v.principle == Principle::PrivacyFirst && v.severity == Severity::Warning));
    assert_eq!(leak.flags.response_approved, Some(false));
}

#[test]
fn guarded_request_runs_to_done_after_confirmation() {
    let p = pipeline();
    let mut request = p.start(PipelineContext::for_farmer("1")).unwrap();
    let sql = "UPDATE fields SET irrigated = true WHERE farmer_id = 1";

    assert!(request.query("Mark my fields as irrigated").unwrap().pass);
    assert_eq!(request.stage(), Stage::Sql);

    let first = request.sql(sql).unwrap();
    assert!(first.flags.needs_confirmation);
    assert_eq!(request.stage(), Stage::Blocked);

    request.confirm_write("UPDATE").unwrap();
    assert_eq!(request.stage(), Stage::Sql);
    assert!(request.sql(sql).unwrap().pass);

    assert!(request
        .response("Your fields are now marked as irrigated.")
        .unwrap()
        .pass);
    assert!(request.is_done());
    assert_eq!(request.history().len(), 4);
    assert_eq!(request.context().write_confirmation(), Some("UPDATE"));
}

#[test]
fn guarded_request_rejects_out_of_order_calls() {
    let p = pipeline();
    let mut request = p.start(PipelineContext::new()).unwrap();

    match request.sql("SELECT 1") {
        Err(GuardError::InvalidTransition { current, attempted }) => {
            assert_eq!(current, Stage::Input);
            assert_eq!(attempted, Stage::Sql);
        }
        other => panic!("expected InvalidTransition, got {:?}", other.map(|r| r.pass)),
    }

    // A discriminatory query blocks the request for good.
    assert!(!request.query("Is this only available in Croatia?").unwrap().pass);
    assert!(matches!(
        request.confirm_write("UPDATE"),
        Err(GuardError::InvalidTransition { .. })
    ));
    assert!(matches!(
        request.response("anything"),
        Err(GuardError::InvalidTransition { .. })
    ));
}

#[test]
fn drop_block_cannot_be_reopened() {
    let p = pipeline();
    let mut request = p.start(PipelineContext::new()).unwrap();
    request.query("Tidy up the database").unwrap();
    assert!(!request.sql("DROP TABLE fields").unwrap().pass);
    assert!(request.confirm_write("DROP").is_err());
    assert_eq!(request.stage(), Stage::Blocked);
}

#[test]
fn malformed_context_is_a_caller_error() {
    let ctx = PipelineContext::for_farmer("");
    assert!(matches!(
        pipeline().validate_query("hello", &ctx),
        Err(GuardError::MalformedContext { .. })
    ));
    assert!(pipeline().start(ctx).is_err());
}

#[test]
fn config_file_drives_both_layers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("charter.toml");
    std::fs::write(
        &path,
        "[guard]\ndiscriminatory_phrases = [\"only for locals\"]\n",
    )
    .unwrap();

    let config = CharterConfig::load(&path).unwrap();
    let p = ValidationPipeline::from_config(&config).unwrap();
    let result = p
        .validate_query("Is this only for locals?", &PipelineContext::new())
        .unwrap();
    assert!(!result.pass);
}

#[test]
fn stage_results_serialize_with_wire_names() {
    let ctx = PipelineContext::from_json(r#"{"farmerId": 1}"#).unwrap();
    let result = pipeline().validate_sql(UPDATE_SQL, "q", &ctx).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["stage"], "SQL");
    assert_eq!(json["next"], "BLOCKED");
    assert_eq!(json["flags"]["needsConfirmation"], true);
    assert_eq!(json["flags"]["writeOperation"], "UPDATE");
    assert_eq!(json["flags"]["sqlApproved"], false);
}

#[test]
fn writes_behind_comments_or_ctes_still_need_confirmation() {
    let p = pipeline();
    let ctx = PipelineContext::for_farmer("1");
    let cases = [
        ("-- remove stale rows\nDELETE FROM fields WHERE farmer_id = 1", StatementKind::Delete),
        ("/* cleanup */ UPDATE fields SET idle = true WHERE farmer_id = 1", StatementKind::Update),
        (
            "WITH gone AS (DELETE FROM fields WHERE farmer_id = 1 RETURNING id) SELECT count(*) FROM gone",
            StatementKind::Delete,
        ),
    ];
    for (sql, kind) in cases {
        let result = p.validate_sql(sql, "q", &ctx).unwrap();
        assert!(!result.pass, "{} should wait for confirmation", sql);
        assert!(result.flags.needs_confirmation);
        assert_eq!(result.flags.statement_kind, Some(kind));
        assert_eq!(result.flags.sql_approved, Some(false));
    }
}

#[test]
fn semicolon_inside_a_literal_is_one_statement() {
    let result = pipeline()
        .validate_sql(
            "SELECT id FROM notes WHERE body = 'water; then feed'",
            "q",
            &PipelineContext::for_farmer("1"),
        )
        .unwrap();
    assert!(result.pass);
    assert!(!result
        .violations
        .iter()
        .any(|v| v.description.starts_with("Multiple SQL statements")));
}
