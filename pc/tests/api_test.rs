//! HTTP-level tests for the PerryOps client against a mock backend

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use perryclient::{
    ApiConfig, ApiError, Corrections, DocumentPart, Operation, PerryClient, RetryConfig, Role, SessionId, WorkflowApi,
};

fn client_for(server: &MockServer) -> PerryClient {
    PerryClient::new(ApiConfig {
        base_url: server.uri(),
        ..Default::default()
    })
    .expect("Failed to build client")
}

fn report() -> DocumentPart {
    DocumentPart::new("valid.pdf", b"%PDF-1.4 report".to_vec())
}

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_upload_returns_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .and(body_string_contains("name=\"report\"; filename=\"valid.pdf\""))
        .and(body_string_contains("application/pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "S1",
            "message": "Files uploaded successfully",
            "files_uploaded": ["report.pdf", "guidelines.pdf (default)"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).upload(&report(), None).await.unwrap();

    assert_eq!(result.session_id, SessionId::from("S1"));
    assert_eq!(result.message, "Files uploaded successfully");
    assert_eq!(result.files_uploaded, vec!["report.pdf", "guidelines.pdf (default)"]);
}

#[tokio::test]
async fn test_upload_sends_guidelines_part_with_default_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"session_id": "S2"})))
        .mount(&server)
        .await;

    let guidelines = DocumentPart::new("", b"%PDF-1.4 guidelines".to_vec());
    let result = client_for(&server).upload(&report(), Some(&guidelines)).await.unwrap();
    assert_eq!(result.session_id.as_str(), "S2");
    assert!(result.files_uploaded.is_empty());

    let requests = server.received_requests().await.expect("Request recording enabled");
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"guidelines\"; filename=\"guidelines.pdf\""));
}

#[tokio::test]
async fn test_upload_without_guidelines_sends_only_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "S3"})))
        .mount(&server)
        .await;

    client_for(&server).upload(&report(), None).await.unwrap();

    let requests = server.received_requests().await.expect("Request recording enabled");
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("name=\"report\""));
    assert!(!body.contains("name=\"guidelines\""));
}

#[tokio::test]
async fn test_upload_plain_text_success_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Files uploaded successfully"))
        .mount(&server)
        .await;

    let result = client_for(&server).upload(&report(), None).await.unwrap();
    assert!(result.session_id.is_empty());
    assert_eq!(result.message, "Files uploaded successfully");
}

#[tokio::test]
async fn test_upload_non_2xx_carries_status() {
    for status in [400u16, 404, 500, 503] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"detail": "Report must be a PDF file"})))
            .mount(&server)
            .await;

        let err = client_for(&server).upload(&report(), None).await.unwrap_err();

        assert!(matches!(err, ApiError::UploadFailed { .. }));
        assert_eq!(err.status(), Some(status));
        assert!(err.to_string().contains(&status.to_string()));
    }
}

#[tokio::test]
async fn test_upload_empty_report_fails_before_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let empty = DocumentPart::new("report.pdf", Vec::new());
    let err = client_for(&server).upload(&empty, None).await.unwrap_err();
    assert!(matches!(err, ApiError::MissingFile(_)));
}

// =============================================================================
// Workflow steps
// =============================================================================

#[tokio::test]
async fn test_extract_posts_form_with_default_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/extract"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("session_id=S1"))
        .and(body_string_contains("model=qwen32b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "S1",
            "structured_data": {"medications_instructions": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server).extract(&SessionId::from("S1")).await.unwrap();
    assert!(response.parsed_json.is_some());
    assert_eq!(response.display_text, "");
}

#[tokio::test]
async fn test_check_compliance_display_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/check-compliance"))
        .and(body_string_contains("compliance_model=amsaravi%2Fmedgemma-4b-it%3Aq8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "Patient compliant",
            "message": "ignored"
        })))
        .mount(&server)
        .await;

    let response = client_for(&server).check_compliance(&SessionId::from("S1")).await.unwrap();
    assert_eq!(response.display_text, "Patient compliant");
}

#[tokio::test]
async fn test_step_plain_text_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/check-compliance"))
        .respond_with(ResponseTemplate::new(200).set_body_string("All medications within guideline"))
        .mount(&server)
        .await;

    let response = client_for(&server).check_compliance(&SessionId::from("S1")).await.unwrap();
    assert!(response.parsed_json.is_none());
    assert_eq!(response.display_text, "All medications within guideline");
    assert_eq!(response.raw_body, "All medications within guideline");
}

#[tokio::test]
async fn test_merge_sends_json_corrections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/merge"))
        .and(body_json(json!({
            "session_id": "S1",
            "corrections": {"notes": "continue lisinopril"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "S1",
            "updated_data": {},
            "message": "Applied 1 corrections successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let corrections = Corrections::from_input("continue lisinopril");
    let response = client_for(&server)
        .merge(&SessionId::from("S1"), &corrections)
        .await
        .unwrap();
    assert_eq!(response.display_text, "Applied 1 corrections successfully");
}

#[tokio::test]
async fn test_merge_failure_carries_status_and_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/merge"))
        .and(body_json(json!({"session_id": "S1", "corrections": {}})))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "Merge failed: session locked"})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .merge(&SessionId::from("S1"), &Corrections::new())
        .await
        .unwrap_err();

    match &err {
        ApiError::StepFailed {
            operation,
            status,
            detail,
        } => {
            assert_eq!(*operation, Operation::Merge);
            assert_eq!(*status, 500);
            assert_eq!(detail, "Merge failed: session locked");
        }
        other => panic!("Expected StepFailed, got {:?}", other),
    }
    assert!(err.to_string().contains("Merge failed"));
}

#[tokio::test]
async fn test_generate_action_plan() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate-action-plan"))
        .and(body_string_contains("session_id=S1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "session_id": "S1",
            "action_plan": {"actions": [{"task": "Stop aspirin", "note": "7 days before"}]}
        })))
        .mount(&server)
        .await;

    let response = client_for(&server)
        .generate_action_plan(&SessionId::from("S1"))
        .await
        .unwrap();
    assert!(response.display_text.contains("Stop aspirin"));
}

#[tokio::test]
async fn test_step_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/extract"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = PerryClient::new(ApiConfig {
        base_url: server.uri(),
        extract_timeout_ms: 50,
        ..Default::default()
    })
    .unwrap();

    let err = client.extract(&SessionId::from("S1")).await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout(d) if d == Duration::from_millis(50)));
}

#[tokio::test]
async fn test_retry_policy_recovers_from_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/extract"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/extract"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "extracted"})))
        .mount(&server)
        .await;

    let client = PerryClient::new(ApiConfig {
        base_url: server.uri(),
        retry: RetryConfig {
            max_attempts: 2,
            initial_backoff_ms: 1,
        },
        ..Default::default()
    })
    .unwrap();

    let response = client.extract(&SessionId::from("S1")).await.unwrap();
    assert_eq!(response.display_text, "extracted");
}

#[tokio::test]
async fn test_default_policy_is_single_shot() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/extract"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).extract(&SessionId::from("S1")).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
}

// =============================================================================
// Patient reads
// =============================================================================

#[tokio::test]
async fn test_schedule_strips_patient_prefix() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patient/abc123/schedule"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "patient_id": "abc123",
            "surgery_date": "2025-10-27T09:00:00",
            "reminders": [
                {"id": "r1", "type": "medication", "medicine": "Aspirin", "action": "hold",
                 "reminder_datetime": "2025-10-20T08:00:00", "status": "completed"},
                {"id": "r2", "type": "fasting", "action": "start_fasting",
                 "reminder_datetime": "2025-10-26T21:00:00", "status": "pending"}
            ],
            "total_reminders": 2,
            "completed_reminders": 1,
            "is_optimized": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let schedule = client_for(&server).schedule("patient_abc123").await.unwrap();

    assert_eq!(schedule.reminders.len(), 2);
    assert_eq!(schedule.completed_reminders, 1);
    assert!(schedule.reminders[0].is_completed());
    assert!(schedule.surgery_at().is_some());
}

#[tokio::test]
async fn test_schedule_unprefixed_id_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patient/abc123/schedule"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"patient_id": "abc123", "reminders": []})))
        .expect(1)
        .mount(&server)
        .await;

    let schedule = client_for(&server).schedule("abc123").await.unwrap();
    assert!(schedule.reminders.is_empty());
}

#[tokio::test]
async fn test_reserved_characters_stay_in_one_segment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patient/ab%3Fc%23d/schedule"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"patient_id": "ab?c#d", "reminders": []})))
        .expect(1)
        .mount(&server)
        .await;

    let schedule = client_for(&server).schedule("patient_ab?c#d").await.unwrap();
    assert_eq!(schedule.patient_id, "ab?c#d");
}

#[tokio::test]
async fn test_reminder_id_with_slash_is_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/patient/abc/complete-reminder/r%2F1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Reminder marked as completed"})))
        .expect(1)
        .mount(&server)
        .await;

    let message = client_for(&server).complete_reminder("patient_abc", "r/1").await.unwrap();
    assert_eq!(message, "Reminder marked as completed");
}

#[tokio::test]
async fn test_schedule_error_detail_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patient/abc/schedule"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [{"loc": ["path", "patient_id"], "msg": "X", "type": "value_error"}]
        })))
        .mount(&server)
        .await;

    let err = client_for(&server).schedule("abc").await.unwrap_err();
    assert_eq!(err.to_string(), "X");
}

#[tokio::test]
async fn test_schedule_unstructured_error_is_generic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patient/abc/schedule"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&server)
        .await;

    let err = client_for(&server).schedule("abc").await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to load schedule (status 503)");
}

#[tokio::test]
async fn test_upcoming_reminders_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/patient/abc/upcoming-reminders"))
        .and(query_param("hours_ahead", "6"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "patient_id": "abc",
            "reminders": [{"id": "r9", "type": "bathing", "action": "chlorhexidine_shower"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let upcoming = client_for(&server).upcoming_reminders("patient_abc", 6).await.unwrap();
    assert_eq!(upcoming.hours_ahead, 6);
    assert_eq!(upcoming.count(), 1);
}

#[tokio::test]
async fn test_register_device_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/patient/abc/register-device-token"))
        .and(body_json(json!({"device_token": "fcm-token-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Device token registered successfully"})))
        .expect(1)
        .mount(&server)
        .await;

    let message = client_for(&server)
        .register_device_token("patient_abc", "fcm-token-1")
        .await
        .unwrap();
    assert_eq!(message, "Device token registered successfully");
}

#[tokio::test]
async fn test_complete_reminder_forbidden() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/patient/abc/complete-reminder/r1"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"detail": "Access denied"})))
        .mount(&server)
        .await;

    let err = client_for(&server).complete_reminder("abc", "r1").await.unwrap_err();
    assert_eq!(err.to_string(), "Access denied");
    assert_eq!(err.status(), Some(403));
}

// =============================================================================
// Accounts
// =============================================================================

#[tokio::test]
async fn test_login_invalid_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/patient/login"))
        .and(body_json(json!({"email": "pat@example.com", "password": "wrong"})))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid email or password"})))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .login(Role::Patient, "pat@example.com", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid email or password");
}

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cpc/patients"))
        .and(header("authorization", "Bearer jwt-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "p1", "user_id": "u1", "name": "Ada", "email": "ada@example.com"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let patients = client_for(&server).with_token("jwt-token").patients().await.unwrap();
    assert_eq!(patients.len(), 1);
    assert_eq!(patients[0].name, "Ada");
}
