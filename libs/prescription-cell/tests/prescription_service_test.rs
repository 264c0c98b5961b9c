use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};
use assert_matches::assert_matches;

use appointment_cell::models::AppointmentError;
use prescription_cell::models::{
    CreatePrescriptionRequest, PrescriptionError, PrescriptionItemInput, PrescriptionListQuery,
    UpdatePrescriptionRequest,
};
use prescription_cell::router::prescription_routes;
use prescription_cell::services::PrescriptionService;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

const DOCTOR_ID: i64 = 1;
const OTHER_DOCTOR_ID: i64 = 2;
const PATIENT_ID: i64 = 2;

fn amoxicillin() -> PrescriptionItemInput {
    PrescriptionItemInput {
        drug_name: "Amoxicillin".to_string(),
        dosage: "500 mg".to_string(),
        frequency: "3 times daily".to_string(),
        duration: Some("7 days".to_string()),
        instructions: Some("Take with food".to_string()),
    }
}

fn new_prescription(appointment_id: Option<i64>) -> CreatePrescriptionRequest {
    CreatePrescriptionRequest {
        patient_id: PATIENT_ID,
        appointment_id,
        diagnosis: Some("Acute sinusitis".to_string()),
        notes: None,
        items: vec![amoxicillin()],
    }
}

async fn mount_patient(mock_server: &MockServer, owner: i64) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", PATIENT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(PATIENT_ID, owner, "Ann Smith")
        ])))
        .mount(mock_server)
        .await;
}

async fn mount_prescription(mock_server: &MockServer, prescription_id: i64, owner: i64) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("id", format!("eq.{}", prescription_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::prescription_row(prescription_id, owner, PATIENT_ID)
        ])))
        .mount(mock_server)
        .await;
}

#[tokio::test]
async fn create_goes_through_one_rpc_and_reads_back_items() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let ctx = TestUser::default().context(DOCTOR_ID);

    mount_patient(&mock_server, DOCTOR_ID).await;
    mount_prescription(&mock_server, 7, DOCTOR_ID).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_prescription"))
        .and(body_partial_json(json!({
            "p_doctor_id": DOCTOR_ID,
            "p_patient_id": PATIENT_ID,
            "p_items": [{ "drug_name": "Amoxicillin", "dosage": "500 mg" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(7)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prescription = PrescriptionService::new(&config)
        .create_prescription(&ctx, new_prescription(None), "token")
        .await
        .unwrap();

    assert_eq!(prescription.id, 7);
    assert_eq!(prescription.items.len(), 1);
    assert_eq!(prescription.items[0].drug_name, "Amoxicillin");
}

#[tokio::test]
async fn create_rejects_appointment_of_another_patient() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let ctx = TestUser::default().context(DOCTOR_ID);

    mount_patient(&mock_server, DOCTOR_ID).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(3, DOCTOR_ID, 99, Some("2024-01-15T10:00:00+00:00"), Some("confirmed"))
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_prescription"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(1)))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = PrescriptionService::new(&config)
        .create_prescription(&ctx, new_prescription(Some(3)), "token")
        .await;

    assert_matches!(result, Err(PrescriptionError::ValidationError(_)));
}

#[tokio::test]
async fn create_with_foreign_appointment_is_denied() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let ctx = TestUser::default().context(DOCTOR_ID);

    mount_patient(&mock_server, DOCTOR_ID).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_row(4, OTHER_DOCTOR_ID, PATIENT_ID, None, Some("pending"))
        ])))
        .mount(&mock_server)
        .await;

    let result = PrescriptionService::new(&config)
        .create_prescription(&ctx, new_prescription(Some(4)), "token")
        .await;

    assert_matches!(result, Err(PrescriptionError::Appointment(AppointmentError::AccessDenied(4))));
}

#[tokio::test]
async fn empty_item_batch_never_reaches_the_store() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut request = new_prescription(None);
    request.items.clear();

    let result = PrescriptionService::new(&config)
        .create_prescription(&TestUser::default().context(DOCTOR_ID), request, "token")
        .await;

    assert_matches!(result, Err(PrescriptionError::ValidationError(_)));
}

#[tokio::test]
async fn update_replaces_item_batch_atomically() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let ctx = TestUser::default().context(DOCTOR_ID);

    mount_prescription(&mock_server, 5, DOCTOR_ID).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/update_prescription"))
        .and(body_partial_json(json!({
            "p_prescription_id": 5,
            "p_doctor_id": DOCTOR_ID,
            "p_notes": "Switch to evening dose",
            "p_items": [{ "drug_name": "Amoxicillin", "frequency": "3 times daily" }]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = UpdatePrescriptionRequest {
        notes: Some(Some("Switch to evening dose".to_string())),
        items: Some(vec![amoxicillin()]),
        ..Default::default()
    };

    let updated = PrescriptionService::new(&config)
        .update_prescription(&ctx, 5, request, "token")
        .await
        .unwrap();

    assert_eq!(updated.id, 5);
}

#[tokio::test]
async fn explicit_null_clears_linked_appointment_and_diagnosis() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let ctx = TestUser::default().context(DOCTOR_ID);

    mount_prescription(&mock_server, 6, DOCTOR_ID).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/update_prescription"))
        .and(body_partial_json(json!({
            "p_prescription_id": 6,
            "p_appointment_id": null,
            "p_diagnosis": null,
            "p_notes": null,
            "p_items": null,
            "p_clear_appointment": true,
            "p_clear_diagnosis": true,
            "p_clear_notes": false
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request: UpdatePrescriptionRequest = serde_json::from_value(json!({
        "appointment_id": null,
        "diagnosis": null
    }))
    .unwrap();

    PrescriptionService::new(&config)
        .update_prescription(&ctx, 6, request, "token")
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_runs_cascade_function_for_owned_prescription() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let ctx = TestUser::default().context(DOCTOR_ID);

    mount_prescription(&mock_server, 6, DOCTOR_ID).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/delete_prescription"))
        .and(body_partial_json(json!({ "p_prescription_id": 6, "p_doctor_id": DOCTOR_ID })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    PrescriptionService::new(&config)
        .delete_prescription(&ctx, 6, "token")
        .await
        .unwrap();
}

#[tokio::test]
async fn foreign_prescription_is_never_deleted() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let ctx = TestUser::default().context(DOCTOR_ID);

    mount_prescription(&mock_server, 8, OTHER_DOCTOR_ID).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/delete_prescription"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = PrescriptionService::new(&config)
        .delete_prescription(&ctx, 8, "token")
        .await;

    assert_matches!(result, Err(PrescriptionError::AccessDenied(8)));
}

#[tokio::test]
async fn list_is_scoped_to_doctor_and_patient() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let ctx = TestUser::default().context(DOCTOR_ID);

    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("select", "*,prescription_items(*)"))
        .and(query_param("doctor_id", format!("eq.{}", DOCTOR_ID)))
        .and(query_param("patient_id", format!("eq.{}", PATIENT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::prescription_row(1, DOCTOR_ID, PATIENT_ID),
            MockSupabaseResponses::prescription_row(2, DOCTOR_ID, PATIENT_ID)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prescriptions = PrescriptionService::new(&config)
        .list_prescriptions(&ctx, PrescriptionListQuery { patient_id: Some(PATIENT_ID) }, "token")
        .await
        .unwrap();

    assert_eq!(prescriptions.len(), 2);
    assert!(prescriptions.iter().all(|p| p.items.len() == 1));
}

#[tokio::test]
async fn pdf_route_returns_attachment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let user = TestUser::doctor("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(DOCTOR_ID, &user.id)
        ])))
        .mount(&mock_server)
        .await;

    mount_prescription(&mock_server, 9, DOCTOR_ID).await;
    mount_patient(&mock_server, DOCTOR_ID).await;

    let response = prescription_routes(Arc::new(config))
        .oneshot(
            Request::builder()
                .uri("/9/pdf")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"prescription-9.pdf\""
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = std::str::from_utf8(&bytes).unwrap();
    assert!(text.starts_with("%PDF-1.4"));
    assert!(text.contains("(Dr. Test) Tj"));
    assert!(text.contains("(1. Amoxicillin) Tj"));
    assert!(text.contains("(Allergies: penicillin) Tj"));
}

#[tokio::test]
async fn pdf_of_foreign_prescription_is_forbidden() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri()).to_app_config();
    let user = TestUser::doctor("jane@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(DOCTOR_ID, &user.id)
        ])))
        .mount(&mock_server)
        .await;

    mount_prescription(&mock_server, 10, OTHER_DOCTOR_ID).await;

    let response = prescription_routes(Arc::new(config))
        .oneshot(
            Request::builder()
                .uri("/10/pdf")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
