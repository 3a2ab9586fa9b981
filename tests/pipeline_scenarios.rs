use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tempfile::tempdir;

use agro_reports::app::ports::ModelPort;
use agro_reports::app::ProcessReportUseCase;
use agro_reports::constants::SHEET_COLUMNS;
use agro_reports::infra::CsvSpreadsheetSink;
use agro_reports::pipeline::decode::decode_output;
use agro_reports::pipeline::{
    assign_departments, normalize_message, remove_negative_values, ReportPipeline,
};
use agro_reports::{ModelError, PipelineError, PipelineState};

struct CannedModel(String);

#[async_trait]
impl ModelPort for CannedModel {
    async fn invoke(&self, _prompt: &str) -> std::result::Result<String, ModelError> {
        Ok(self.0.clone())
    }
}

const FENCED_REPLY: &str = "```json\n{\"операции\":[{\"отделение\":3,\"площадь\":{\"за_день\":-5,\"c_начала_операции\":2}}]}\n```";

#[test]
fn end_to_end_pre_processing() {
    let text =
        normalize_message("Внесение почвенных гербицидов отд 3/4, озимая пшеница, площадь -5")
            .unwrap();
    assert!(text.contains("внесение гербицидов"));
    assert!(text.contains("Отделение 3/4"));
    assert!(text.contains("Пшеница озимая товарная"));
    assert!(text.contains("площадь -5"));
}

#[test]
fn end_to_end_post_processing() -> Result<()> {
    let assigned = assign_departments(FENCED_REPLY)?;
    let sanitized = remove_negative_values(assigned)?;
    let document = decode_output(&sanitized)?;

    let operations = document["операции"].as_array().expect("operations list");
    assert_eq!(operations.len(), 1);
    assert_eq!(operations[0]["подразделение"], json!("АОР"));
    assert_eq!(operations[0]["площадь"]["за_день"], json!(0));
    assert_eq!(operations[0]["площадь"]["c_начала_операции"], json!(2));
    Ok(())
}

#[test]
fn fan_out_then_sanitize() -> Result<()> {
    let reply = json!({"операции": [{
        "операция": "Дискование",
        "отделение": [3, 8],
        "площадь": {"за_день": [10, -5], "c_начала_операции": [110, 45]},
        "вал": {"за_день": -1, "c_начала_операции": 4}
    }]});

    let document = ReportPipeline::postprocess(reply)?;
    let operations = document["операции"].as_array().expect("operations list");
    assert_eq!(operations.len(), 2);

    assert_eq!(operations[0]["отделение"], json!(3));
    assert_eq!(operations[0]["подразделение"], json!("АОР"));
    assert_eq!(operations[0]["площадь"]["за_день"], json!(10));

    assert_eq!(operations[1]["отделение"], json!(8));
    assert!(operations[1].get("подразделение").is_none());
    assert_eq!(operations[1]["площадь"]["за_день"], json!(0));

    for op in operations {
        assert_eq!(op["вал"]["за_день"], json!(0));
        assert!(op["отделение"].is_number());
    }
    Ok(())
}

#[test]
fn sanitizer_output_round_trips() -> Result<()> {
    let once = remove_negative_values(assign_departments(FENCED_REPLY)?)?;
    let decoded = decode_output(&once)?;
    let again = remove_negative_values(decoded.clone())?;
    assert_eq!(decode_output(&again)?, decoded);
    assert_eq!(again, once);
    Ok(())
}

#[test]
fn misaligned_lists_abort_post_processing() {
    let reply = json!({"операции": [{
        "отделение": [3, 8],
        "площадь": {"за_день": [10], "c_начала_операции": [1, 2]}
    }]});
    let err = ReportPipeline::postprocess(reply).unwrap_err();
    assert!(matches!(err, PipelineError::IndexAlignment { .. }));
}

#[tokio::test]
async fn pipeline_run_reports_failure_state() {
    let pipeline = ReportPipeline::new(Arc::new(CannedModel("```json\n{\"операции\": [\n```".into())));
    let failure = pipeline.run("отд 1/2").await.unwrap_err();
    assert_eq!(failure.state, PipelineState::ModelInvoked);
    match failure.error {
        PipelineError::Decode { text, .. } => assert_eq!(text, "{\"операции\": ["),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn reports_accumulate_in_one_sheet() -> Result<()> {
    let dir = tempdir()?;
    let use_case = ProcessReportUseCase::new(
        Arc::new(CannedModel(FENCED_REPLY.to_string())),
        Box::new(CsvSpreadsheetSink::new(dir.path())),
        None,
    );

    let first = use_case.process("report-1", "отд 3 площадь -5").await?;
    let second = use_case.process("report-1", "отд 3 площадь -5").await?;
    assert_eq!(first.file, second.file);

    let content = std::fs::read_to_string(&second.file)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], SHEET_COLUMNS.join(","));
    assert_eq!(&lines[1..], [",АОР,3,,,0,2,,,,", ",АОР,3,,,0,2,,,,"]);
    Ok(())
}
