//! Router-level tests for material authoring and moderation
//!
//! Tests cover:
//! - Role gates (401 without identity, 403 for the wrong role)
//! - Creation always pending, public visibility only once approved
//! - Moderation transitions and the edit reset
//! - All-or-nothing collaborator resolution
//! - Step reconciliation preserving media
//! - Delete leaving no dependent rows behind

mod common;

use axum::http::StatusCode;
use common::{setup, ADMIN, ANA, BEA, READER};
use serde_json::{json, Value};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

fn foam_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("name", "Foam A"),
        ("tools", r#"["Scissors", "glue gun"]"#),
        ("composition", r#"[{"element": "latex", "quantity": "80%"}]"#),
    ]
}

fn step_ordinals(material: &Value) -> Vec<i64> {
    material["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["ordinal"].as_i64().unwrap())
        .collect()
}

// =============================================================================
// Access control
// =============================================================================

#[tokio::test]
async fn test_health_needs_no_identity() {
    let app = setup().await;
    let (status, body) = app.request("GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "materia-api");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let app = setup().await;
    app.pool.close().await;
    let (status, body) = app.request("GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "down");
}

#[tokio::test]
async fn test_role_gates() {
    let app = setup().await;
    let id = app.create_material(ANA, &foam_fields()).await;

    let (status, body) = app.request("POST", "/materials", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = app
        .multipart("POST", "/materials", READER, &[("name", "Nope")], &[])
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.request("GET", "/admin/materials", Some(ANA)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request("PUT", &format!("/materials/{}/approve", id), Some(ANA))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request("DELETE", &format!("/materials/{}", id), Some(READER))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Public reads stay open
    let (status, _) = app.request("GET", "/materials", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_collaborator_of_material_cannot_edit_it() {
    let app = setup().await;
    let mut fields = foam_fields();
    fields.push(("collaborators", r#"["bea@example.com"]"#));
    let id = app.create_material(ANA, &fields).await;

    let (status, _) = app
        .multipart("PUT", &format!("/materials/{}", id), BEA, &[("name", "Foam B")], &[])
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// =============================================================================
// Creation and visibility
// =============================================================================

#[tokio::test]
async fn test_create_is_pending_and_hidden() {
    let app = setup().await;
    let mut fields = foam_fields();
    fields.push(("moderation_state", "approved"));

    let (status, body) = app.multipart("POST", "/materials", ANA, &fields, &[]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["moderation_state"], "pending");
    assert_eq!(body["creator_id"], ANA);
    assert_eq!(body["tools"], json!(["Scissors", "glue gun"]));
    assert_eq!(body["composition"][0]["element"], "latex");
    let id = body["id"].as_str().unwrap();

    let (status, _) = app.request("GET", &format!("/materials/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, public) = app.request("GET", "/materials", None).await;
    assert_eq!(public, json!([]));

    let (status, admin_view) = app
        .request("GET", &format!("/admin/materials/{}", id), Some(ADMIN))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(admin_view["name"], "Foam A");

    let (_, pending) = app.request("GET", "/admin/materials/pending", Some(ADMIN)).await;
    assert_eq!(pending["total"], 1);

    let (_, mine) = app.request("GET", "/my/materials", Some(ANA)).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, theirs) = app.request("GET", "/my/materials", Some(BEA)).await;
    assert_eq!(theirs, json!([]));

    app.settle().await;
    let (_, inbox) = app.request("GET", "/notifications", Some(ADMIN)).await;
    assert_eq!(inbox[0]["category"], "submitted");
    assert_eq!(inbox[0]["link"], format!("/admin/materials/{}", id));
}

#[tokio::test]
async fn test_malformed_block_is_rejected() {
    let app = setup().await;
    let (status, body) = app
        .multipart(
            "POST",
            "/materials",
            ANA,
            &[("name", "Foam A"), ("tools", "scissors, glue")],
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_FORMAT");
    assert_eq!(body["error"]["field"], "tools");

    let (status, _) = app
        .multipart("POST", "/materials", ANA, &[("description", "no name")], &[])
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, all) = app.request("GET", "/admin/materials", Some(ADMIN)).await;
    assert_eq!(all, json!([]));
}

#[tokio::test]
async fn test_public_reads_after_approval() {
    let app = setup().await;
    let parent = app.create_material(ANA, &foam_fields()).await;
    let (status, _) = app
        .multipart(
            "PUT",
            &format!("/materials/{}", parent),
            ANA,
            &[],
            &[("gallery_images[]", "front view.png", "image/png", PNG)],
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let child = app
        .create_material(BEA, &[("name", "Foam B"), ("derived_from", parent.as_str())])
        .await;

    for id in [&parent, &child] {
        let (status, _) = app
            .request("PUT", &format!("/materials/{}/approve", id), Some(ADMIN))
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.request("GET", &format!("/materials/{}", parent), None).await;
    assert_eq!(status, StatusCode::OK);
    let image_url = body["gallery"][0]["image_url"].as_str().unwrap().to_string();
    assert!(image_url.ends_with(&format!("materials/{}/0-front_view.png", parent)));

    let (_, derived) = app
        .request("GET", &format!("/materials/{}/derived", parent), None)
        .await;
    assert_eq!(derived.as_array().unwrap().len(), 1);
    assert_eq!(derived[0]["id"], child.as_str());

    let (_, summaries) = app.request("GET", "/materials-summary", None).await;
    let card = summaries
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["id"] == parent.as_str())
        .unwrap();
    assert_eq!(card["cover_image_url"], image_url.as_str());

    let (_, filters) = app.request("GET", "/materials/filters", None).await;
    assert_eq!(filters["tools"], json!(["Glue Gun", "Scissors"]));
    assert_eq!(filters["composition_elements"], json!(["Latex"]));
}

// =============================================================================
// Moderation
// =============================================================================

#[tokio::test]
async fn test_approve_twice_conflicts() {
    let app = setup().await;
    let id = app.create_material(ANA, &foam_fields()).await;
    let uri = format!("/materials/{}/approve", id);

    let (status, body) = app.request("PUT", &uri, Some(ADMIN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moderation_state"], "approved");

    let (status, body) = app.request("PUT", &uri, Some(ADMIN)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (status, _) = app
        .request("PUT", &format!("/materials/{}/approve", uuid::Uuid::new_v4()), Some(ADMIN))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reject_is_idempotent_and_notifies_with_reason() {
    let app = setup().await;
    let id = app.create_material(ANA, &foam_fields()).await;
    let uri = format!("/materials/{}/reject", id);

    let (status, body) = app
        .json("PUT", &uri, ADMIN, json!({ "reason": "Needs better photos" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moderation_state"], "rejected");

    let (status, body) = app.request("PUT", &uri, Some(ADMIN)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moderation_state"], "rejected");

    app.settle().await;
    let (_, inbox) = app.request("GET", "/notifications", Some(ANA)).await;
    let rejections: Vec<&Value> = inbox
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["category"] == "rejected")
        .collect();
    assert_eq!(rejections.len(), 2);
    assert!(rejections
        .iter()
        .any(|n| n["body"].as_str().unwrap().ends_with("Reason: Needs better photos")));
}

#[tokio::test]
async fn test_foam_a_lifecycle() {
    let app = setup().await;

    let (status, created) = app.multipart("POST", "/materials", ANA, &foam_fields(), &[]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["moderation_state"], "pending");
    assert_eq!(created["tools"].as_array().unwrap().len(), 2);
    assert_eq!(created["composition"].as_array().unwrap().len(), 1);
    let id = created["id"].as_str().unwrap();

    let (_, approved) = app
        .request("PUT", &format!("/materials/{}/approve", id), Some(ADMIN))
        .await;
    assert_eq!(approved["moderation_state"], "approved");

    let (_, toggled) = app
        .request("PUT", &format!("/materials/{}/toggle", id), Some(ADMIN))
        .await;
    assert_eq!(toggled["moderation_state"], "rejected");

    let (status, edited) = app
        .multipart(
            "PUT",
            &format!("/materials/{}", id),
            ANA,
            &[("description", "Soft, springy and light")],
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["moderation_state"], "pending");
    assert_eq!(edited["description"], "Soft, springy and light");
    assert_eq!(edited["tools"], created["tools"]);
}

#[tokio::test]
async fn test_owner_edit_resets_but_admin_edit_keeps_approval() {
    let app = setup().await;
    let id = app.create_material(ANA, &foam_fields()).await;
    app.request("PUT", &format!("/materials/{}/approve", id), Some(ADMIN))
        .await;

    let (_, by_admin) = app
        .multipart("PUT", &format!("/materials/{}", id), ADMIN, &[("name", "Foam A2")], &[])
        .await;
    assert_eq!(by_admin["moderation_state"], "approved");
    assert_eq!(by_admin["creator_id"], ANA);

    app.settle().await;
    let (_, inbox) = app.request("GET", "/notifications", Some(ANA)).await;
    assert!(inbox.as_array().unwrap().iter().any(|n| n["category"] == "edited"));

    let (_, by_owner) = app
        .multipart("PUT", &format!("/materials/{}", id), ANA, &[("name", "Foam A3")], &[])
        .await;
    assert_eq!(by_owner["moderation_state"], "pending");

    let (_, stats) = app.request("GET", "/admin/stats", Some(ADMIN)).await;
    assert_eq!(stats["pending"], 1);
    assert_eq!(stats["approved"], 0);
    assert_eq!(stats["users"], 4);
}

// =============================================================================
// Dependents
// =============================================================================

#[tokio::test]
async fn test_partial_collaborator_resolution_changes_nothing() {
    let app = setup().await;
    let mut fields = foam_fields();
    fields.push(("collaborators", r#"["bea@example.com"]"#));
    let id = app.create_material(ANA, &fields).await;

    let (status, body) = app
        .multipart(
            "PUT",
            &format!("/materials/{}", id),
            ANA,
            &[
                ("name", "Renamed"),
                ("collaborators", r#"["bea@example.com", "ghost@example.com"]"#),
            ],
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "PARTIAL_RESOLUTION");
    assert_eq!(body["error"]["missing"], json!(["ghost@example.com"]));

    let (_, material) = app
        .request("GET", &format!("/admin/materials/{}", id), Some(ADMIN))
        .await;
    assert_eq!(material["name"], "Foam A");
    let collaborators = material["collaborators"].as_array().unwrap();
    assert_eq!(collaborators.len(), 1);
    assert_eq!(collaborators[0]["id"], BEA);
}

#[tokio::test]
async fn test_step_reconciliation_keeps_media() {
    let app = setup().await;
    let steps = r#"[
        {"ordinal": 1, "description": "Mix"},
        {"ordinal": 2, "description": "Pour"},
        {"ordinal": 3, "description": "Cure"}
    ]"#;
    let (status, created) = app
        .multipart(
            "POST",
            "/materials",
            ANA,
            &[("name", "Foam A"), ("steps", steps)],
            &[("step_images[2]", "mold.png", "image/png", PNG)],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(step_ordinals(&created), vec![1, 2, 3]);
    let id = created["id"].as_str().unwrap();
    let image_url = created["steps"][1]["image_url"].as_str().unwrap().to_string();
    assert!(image_url.ends_with(&format!("materials/{}/steps/2/image/mold.png", id)));
    assert!(app
        .media_dir
        .path()
        .join(format!("materials/{}/steps/2/image/mold.png", id))
        .exists());

    let (status, updated) = app
        .multipart(
            "PUT",
            &format!("/materials/{}", id),
            ANA,
            &[(
                "steps",
                r#"[{"ordinal": 1, "description": "Mix well"}, {"ordinal": 2, "description": "Pour"}]"#,
            )],
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(step_ordinals(&updated), vec![1, 2]);
    assert_eq!(updated["steps"][0]["id"], created["steps"][0]["id"]);
    assert_eq!(updated["steps"][0]["description"], "Mix well");
    assert_eq!(updated["steps"][1]["id"], created["steps"][1]["id"]);
    assert_eq!(updated["steps"][1]["image_url"], image_url.as_str());
    assert_eq!(app.count("material_steps", id).await, 2);
}

#[tokio::test]
async fn test_blank_form_values_leave_material_untouched() {
    let app = setup().await;
    let steps = r#"[{"ordinal": 1, "description": "Mix"}, {"ordinal": 2, "description": "Pour"}]"#;
    let mut fields = foam_fields();
    fields.push(("steps", steps));
    fields.push(("collaborators", r#"["bea@example.com"]"#));
    let id = app.create_material(ANA, &fields).await;

    // Untouched inputs come back as empty strings
    let (status, updated) = app
        .multipart(
            "PUT",
            &format!("/materials/{}", id),
            ANA,
            &[
                ("name", "Foam A2"),
                ("description", ""),
                ("tools", ""),
                ("composition", ""),
                ("steps", ""),
                ("collaborators", ""),
                ("derived_from", ""),
            ],
            &[],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Foam A2");
    assert_eq!(updated["tools"], json!(["Scissors", "glue gun"]));
    assert_eq!(updated["composition"].as_array().unwrap().len(), 1);
    assert_eq!(step_ordinals(&updated), vec![1, 2]);
    assert_eq!(updated["collaborators"].as_array().unwrap().len(), 1);
    assert_eq!(app.count("material_steps", &id).await, 2);
}

#[tokio::test]
async fn test_same_named_gallery_images_do_not_collide() {
    let app = setup().await;
    let first: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR-first";
    let second: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR-second";
    let (status, created) = app
        .multipart(
            "POST",
            "/materials",
            ANA,
            &[("name", "Foam A")],
            &[
                ("gallery_images[]", "image.png", "image/png", first),
                ("gallery_images[]", "image.png", "image/png", second),
            ],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();
    let urls: Vec<&str> = created["gallery"]
        .as_array()
        .unwrap()
        .iter()
        .map(|g| g["image_url"].as_str().unwrap())
        .collect();
    assert_eq!(urls.len(), 2);
    assert_ne!(urls[0], urls[1]);

    let dir = app.media_dir.path().join(format!("materials/{}", id));
    assert_eq!(std::fs::read(dir.join("0-image.png")).unwrap(), first);
    assert_eq!(std::fs::read(dir.join("1-image.png")).unwrap(), second);
}

#[tokio::test]
async fn test_step_media_without_steps_keeps_approval() {
    let app = setup().await;
    let id = app
        .create_material(ANA, &[("name", "Foam A"), ("steps", r#"[{"ordinal": 1, "description": "Mix"}]"#)])
        .await;
    app.request("PUT", &format!("/materials/{}/approve", id), Some(ADMIN))
        .await;
    app.settle().await;
    let (_, before) = app.request("GET", "/notifications", Some(ANA)).await;

    let (status, body) = app
        .multipart(
            "PUT",
            &format!("/materials/{}", id),
            ANA,
            &[],
            &[("step_images[1]", "mix.png", "image/png", PNG)],
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["moderation_state"], "approved");
    assert_eq!(body["steps"][0]["image_url"], Value::Null);

    app.settle().await;
    let (_, after) = app.request("GET", "/notifications", Some(ANA)).await;
    assert_eq!(after.as_array().unwrap().len(), before.as_array().unwrap().len());
    let (_, admin_inbox) = app.request("GET", "/notifications", Some(ADMIN)).await;
    assert!(admin_inbox
        .as_array()
        .unwrap()
        .iter()
        .all(|n| n["category"] != "edited"));
}

#[tokio::test]
async fn test_delete_leaves_no_orphans() {
    let app = setup().await;
    let (status, created) = app
        .multipart(
            "POST",
            "/materials",
            ANA,
            &[
                ("name", "Foam A"),
                ("collaborators", r#"["bea@example.com"]"#),
                ("steps", r#"[{"ordinal": 1, "description": "Mix"}]"#),
                ("gallery_captions", r#"["front"]"#),
            ],
            &[("gallery_images[]", "front.png", "image/png", PNG)],
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();
    assert_eq!(created["gallery"][0]["caption"], "front");
    assert_eq!(app.count("material_collaborators", id).await, 1);
    app.settle().await;

    let (status, _) = app
        .json("DELETE", &format!("/materials/{}", id), ADMIN, json!({ "reason": "Duplicate" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    for table in ["material_steps", "material_gallery", "material_collaborators", "notifications"] {
        assert_eq!(app.count(table, id).await, 0, "{} still references the material", table);
    }
    let (status, _) = app
        .request("GET", &format!("/admin/materials/{}", id), Some(ADMIN))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request("DELETE", &format!("/materials/{}", id), Some(ADMIN))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.settle().await;
    let (_, inbox) = app.request("GET", "/notifications", Some(ANA)).await;
    let removed = &inbox[0];
    assert_eq!(removed["category"], "info");
    assert_eq!(removed["related_material_id"], Value::Null);
    assert!(removed["body"].as_str().unwrap().ends_with("Reason: Duplicate"));

    // The admin's submission notice survives without its material
    let (_, admin_inbox) = app.request("GET", "/notifications", Some(ADMIN)).await;
    assert_eq!(admin_inbox[0]["category"], "submitted");
    assert_eq!(admin_inbox[0]["related_material_id"], Value::Null);
}
