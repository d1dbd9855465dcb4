use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use super::common::*;
use crate::forms::router::save_handler;

#[tokio::test]
async fn save_route_creates_then_lists_template() {
    let harness = build_service();
    let router = forms_app(harness.service.clone());

    let draft = serde_json::to_value(consultation_draft()).expect("draft json");
    let response = router
        .clone()
        .oneshot(json_request("POST", "/api/v1/forms", draft))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    assert_eq!(created["stats"]["sent"], 0);

    let response = router
        .oneshot(empty_request("GET", "/api/v1/forms?q=consultation"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let listing = read_json_body(response).await;
    assert_eq!(listing["summary"]["total_forms"], 1);
    assert_eq!(listing["templates"][0]["id"], created["id"]);
}

#[tokio::test]
async fn save_handler_rejects_select_without_options() {
    let harness = build_service();
    let mut draft = consultation_draft();
    draft.fields[2].options = None;

    let response = save_handler(State(harness.service.clone()), axum::Json(draft)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn save_handler_returns_internal_error_on_repository_failure() {
    let service = Arc::new(service_with_templates(Arc::new(UnavailableTemplates)));
    let response = save_handler(State(service), axum::Json(consultation_draft())).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn new_form_route_returns_default_skeleton() {
    let harness = build_service();
    let response = forms_app(harness.service.clone())
        .oneshot(empty_request("GET", "/api/v1/forms/new"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = read_json_body(response).await;
    let fields = payload["draft"]["fields"].as_array().expect("fields");
    assert_eq!(fields.len(), 3);
    assert_eq!(fields[2]["kind"], "email");
    assert_eq!(payload["draft"]["branding"]["primary_color"], "#2563EB");
    assert_eq!(payload["field_kinds"].as_array().expect("kinds").len(), 8);
}

#[tokio::test]
async fn send_route_rejects_empty_recipient_list() {
    let harness = build_service();
    let template = harness
        .service
        .save_template(consultation_draft(), now())
        .expect("saved")
        .template;

    let response = forms_app(harness.service.clone())
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/forms/{}/send", template.id),
            json!({ "recipients": " , " }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(harness.dispatcher.invitations().is_empty());
}

#[tokio::test]
async fn send_route_maps_dispatch_failure_to_bad_gateway() {
    let service = Arc::new(service_with_dispatcher(Arc::new(OfflineDispatcher)));
    let template = service
        .save_template(consultation_draft(), now())
        .expect("saved")
        .template;

    let response = forms_app(service)
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/forms/{}/send", template.id),
            json!({ "recipients": "a@x.com" }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn share_route_reports_embed_snippet_and_records() {
    let harness = build_service();
    let template = harness
        .service
        .save_template(consultation_draft(), now())
        .expect("saved")
        .template;
    harness
        .service
        .send_form(
            &template.id,
            crate::forms::service::SendRequest {
                recipients: "a@x.com".to_string(),
                message: Some("See you soon".to_string()),
            },
            now(),
        )
        .expect("sent");

    let response = forms_app(harness.service.clone())
        .oneshot(empty_request(
            "GET",
            &format!("/api/v1/forms/{}/share", template.id),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let panel = read_json_body(response).await;
    assert_eq!(
        panel["embed_snippet"],
        format!(
            r#"<iframe src="{}" width="100%" height="600" frameborder="0"></iframe>"#,
            template.share_url
        )
    );
    assert_eq!(panel["records"][0]["badge"]["label"], "Sent");
    assert_eq!(panel["analytics"]["total_sent"], 1);
    assert_eq!(harness.dispatcher.invitations()[0].message, "See you soon");
}

#[tokio::test]
async fn unknown_template_is_not_found() {
    let harness = build_service();
    let response = forms_app(harness.service.clone())
        .oneshot(empty_request("DELETE", "/api/v1/forms/tpl-unknown"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn intake_routes_walk_pages_and_submit_once() {
    let harness = build_service();
    let template = harness
        .service
        .save_template(consultation_draft(), now())
        .expect("saved")
        .template;
    let router = forms_app(harness.service.clone());

    let response = router
        .clone()
        .oneshot(empty_request(
            "POST",
            &format!("/api/v1/intake/{}/sessions", template.id),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    let session = read_json_body(response).await;
    let session_id = session["session_id"].as_str().expect("session id").to_string();
    assert_eq!(session["page_count"], 2);
    assert_eq!(session["progress_percent"], 50.0);

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/intake-sessions/{session_id}/answers/consent"),
            json!("yes"),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/intake-sessions/{session_id}/answers/ghost"),
            json!("boo"),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    for expected in ["advanced", "submitted"] {
        let response = router
            .clone()
            .oneshot(empty_request(
                "POST",
                &format!("/api/v1/intake-sessions/{session_id}/next"),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let step = read_json_body(response).await;
        assert_eq!(step["transition"]["outcome"], expected);
    }

    let response = router
        .oneshot(empty_request(
            "POST",
            &format!("/api/v1/intake-sessions/{session_id}/next"),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let submissions = harness.service.submissions(&template.id).expect("submissions");
    assert_eq!(submissions.len(), 1);
}

#[tokio::test]
async fn upload_route_stores_raw_body() {
    let harness = build_service();
    let template = harness
        .service
        .save_template(consultation_draft(), now())
        .expect("saved")
        .template;
    let session = harness
        .service
        .start_intake(&template.id.0, None, now())
        .expect("session");

    let request = Request::builder()
        .method("POST")
        .uri(format!(
            "/api/v1/intake-sessions/{}/uploads/photos?kind=videos&filename=walkaround.mp4",
            session.session_id
        ))
        .header(header::CONTENT_TYPE, "video/mp4")
        .body(Body::from(vec![0u8; 16]))
        .expect("request");
    let response = forms_app(harness.service.clone())
        .oneshot(request)
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let files = read_json_body(response).await;
    assert_eq!(files[0]["kind"], "videos");
    assert_eq!(files[0]["size"], 16);
    assert_eq!(
        harness.storage.paths.lock().expect("storage mutex poisoned")[0],
        format!("patient-files/{}/videos/walkaround.mp4", template.id)
    );
}

#[tokio::test]
async fn staff_routes_refuse_anonymous_callers() {
    let harness = build_service();
    let template = harness
        .service
        .save_template(consultation_draft(), now())
        .expect("saved")
        .template;
    let router = forms_app(harness.service.clone());

    let draft = serde_json::to_vec(&consultation_draft()).expect("encode draft");
    let create = Request::builder()
        .method("POST")
        .uri("/api/v1/forms")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(draft))
        .expect("request");
    let response = router.clone().oneshot(create).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    for (method, uri) in [
        ("GET", "/api/v1/forms".to_string()),
        ("GET", format!("/api/v1/forms/{}/submissions", template.id)),
        ("GET", format!("/api/v1/forms/{}/share", template.id)),
        ("DELETE", format!("/api/v1/forms/{}", template.id)),
        ("POST", "/api/v1/distributions/expire".to_string()),
    ] {
        let response = router
            .clone()
            .oneshot(anonymous_request(method, &uri))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    }

    let forged = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/forms/{}", template.id))
        .header(header::AUTHORIZATION, "Bearer someone-else")
        .body(Body::empty())
        .expect("request");
    let response = router.oneshot(forged).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(harness.service.list_templates(None).expect("list").len(), 1);
}

#[tokio::test]
async fn patients_reach_intake_routes_without_signing_in() {
    let harness = build_service();
    let template = harness
        .service
        .save_template(consultation_draft(), now())
        .expect("saved")
        .template;
    let router = forms_app(harness.service.clone());

    let response = router
        .clone()
        .oneshot(anonymous_request("GET", &format!("/api/v1/intake/{}", template.id)))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let landing = read_json_body(response).await;
    assert_eq!(landing["name"], "Hair Transplant Consultation");
    assert!(landing.get("session_id").is_none());
    assert_eq!(harness.service.live_sessions().expect("sessions"), 0);

    let response = router
        .oneshot(anonymous_request(
            "POST",
            &format!("/api/v1/intake/{}/sessions", template.id),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(harness.service.live_sessions().expect("sessions"), 1);
}

#[tokio::test]
async fn failed_submission_store_is_retried_on_the_next_call() {
    let harness = build_service();
    let mut draft = consultation_draft();
    draft.fields.truncate(2);
    let template = harness
        .service
        .save_template(draft, now())
        .expect("saved")
        .template;
    let session = harness
        .service
        .start_intake(&template.id.0, None, now())
        .expect("session");
    let next = format!("/api/v1/intake-sessions/{}/next", session.session_id);
    let router = forms_app(harness.service.clone());

    harness.submissions.set_offline(true);
    let response = router
        .clone()
        .oneshot(anonymous_request("POST", &next))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(harness.service.submissions(&template.id).expect("submissions").is_empty());

    harness.submissions.set_offline(false);
    let response = router
        .oneshot(anonymous_request("POST", &next))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let step = read_json_body(response).await;
    assert_eq!(step["transition"]["outcome"], "submitted");
    assert_eq!(harness.service.submissions(&template.id).expect("submissions").len(), 1);
}
