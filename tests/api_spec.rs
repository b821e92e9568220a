use axum::http::StatusCode;
use axum_test::TestServer;
use serde::Deserialize;
use serde_json::json;
use spy_cats::api::create_router;
use spy_cats::breeds::BreedValidator;
use spy_cats::db::Database;
use spy_cats::models::*;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

fn setup() -> TestServer {
    setup_with_breeds(BreedValidator::fixed(["Abyssinian", "Bengal", "Siamese"]))
}

fn setup_with_breeds(breeds: BreedValidator) -> TestServer {
    let db = Database::open_memory().expect("Failed to create database");
    db.migrate().expect("Failed to migrate");
    let app = create_router(db, breeds);
    TestServer::new(app).expect("Failed to create test server")
}

/// A remote catalogue on a port nothing listens on.
fn unreachable_breeds() -> BreedValidator {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    BreedValidator::remote(format!("http://{addr}/breeds"), Duration::from_secs(2)).unwrap()
}

async fn create_test_cat(server: &TestServer, name: &str) -> Cat {
    let response = server
        .post("/api/v1/cats")
        .json(&json!({
            "name": name,
            "years_of_experience": 5,
            "breed": "Bengal",
            "salary": 1500.25
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<Cat>()
}

async fn create_test_mission(
    server: &TestServer,
    title: &str,
    targets: &[&str],
) -> MissionWithTargets {
    let targets: Vec<_> = targets
        .iter()
        .map(|name| json!({ "name": name, "country": "France" }))
        .collect();
    let response = server
        .post("/api/v1/missions")
        .json(&json!({ "title": title, "targets": targets }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json::<MissionWithTargets>()
}

fn target_path(mission: &MissionWithTargets, index: usize, action: &str) -> String {
    format!(
        "/api/v1/missions/{}/targets/{}/{}",
        mission.mission.id, mission.targets[index].id, action
    )
}

mod health {
    use super::*;

    #[tokio::test]
    async fn reports_ok() {
        let server = setup();
        let response = server.get("/api/v1/health").await;
        response.assert_status_ok();
        response.assert_json(&json!({ "status": "ok" }));
    }
}

mod cats {
    use super::*;

    #[tokio::test]
    async fn creates_and_reads_a_cat() {
        let server = setup();
        let cat = create_test_cat(&server, "Whiskers").await;
        assert_eq!(cat.breed, "Bengal");
        assert_eq!(cat.salary, 1500.25);

        let response = server.get(&format!("/api/v1/cats/{}", cat.id)).await;
        response.assert_status_ok();
        let found: CatWithMission = response.json();
        assert_eq!(found.cat.name, "Whiskers");
        assert!(found.current_mission.is_none());
    }

    #[tokio::test]
    async fn rejects_unknown_breed() {
        let server = setup();
        let response = server
            .post("/api/v1/cats")
            .json(&json!({
                "name": "Garfield",
                "years_of_experience": 5,
                "breed": "Lasagna Tabby",
                "salary": 100
            }))
            .await;

        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert!(body.error.starts_with("breed must be one of the valid cat breeds"));
    }

    #[tokio::test]
    async fn rejects_writes_when_breed_catalogue_is_unreachable() {
        let server = setup_with_breeds(unreachable_breeds());

        let response = server
            .post("/api/v1/cats")
            .json(&json!({
                "name": "Whiskers",
                "years_of_experience": 5,
                "breed": "Bengal",
                "salary": 100
            }))
            .await;

        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert!(body.error.contains("could not validate breed"));

        let cats: Vec<CatWithMission> = server.get("/api/v1/cats").await.json();
        assert!(cats.is_empty());
    }

    #[tokio::test]
    async fn rejects_unrealistic_experience() {
        let server = setup();
        let response = server
            .post("/api/v1/cats")
            .json(&json!({
                "name": "Methuselah",
                "years_of_experience": 51,
                "breed": "Bengal",
                "salary": 100
            }))
            .await;
        response.assert_status_bad_request();
    }

    #[tokio::test]
    async fn ignores_client_supplied_hired_at() {
        let server = setup();
        let response = server
            .post("/api/v1/cats")
            .json(&json!({
                "name": "Whiskers",
                "years_of_experience": 5,
                "breed": "Bengal",
                "salary": 100,
                "hired_at": "1999-01-01T00:00:00Z"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let cat: Cat = response.json();
        assert!(cat.hired_at.timestamp() > 946_684_800);
    }

    #[tokio::test]
    async fn updates_salary_and_revalidates_breed() {
        let server = setup();
        let cat = create_test_cat(&server, "Whiskers").await;

        let response = server
            .patch(&format!("/api/v1/cats/{}", cat.id))
            .json(&json!({ "salary": 2000 }))
            .await;
        response.assert_status_ok();
        let updated: Cat = response.json();
        assert_eq!(updated.salary, 2000.0);
        assert_eq!(updated.hired_at, cat.hired_at);

        server
            .put(&format!("/api/v1/cats/{}", cat.id))
            .json(&json!({ "breed": "Dragon" }))
            .await
            .assert_status_bad_request();
    }

    #[tokio::test]
    async fn updating_a_missing_cat_is_not_found_before_breed_lookup() {
        let server = setup();
        let response = server
            .put(&format!("/api/v1/cats/{}", Uuid::new_v4()))
            .json(&json!({ "breed": "Nope" }))
            .await;
        response.assert_status_not_found();
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "Cat not found");

        let offline = setup_with_breeds(unreachable_breeds());
        offline
            .put(&format!("/api/v1/cats/{}", Uuid::new_v4()))
            .json(&json!({ "breed": "Bengal" }))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn lists_cats_filtered_by_breed() {
        let server = setup();
        create_test_cat(&server, "Whiskers").await;
        server
            .post("/api/v1/cats")
            .json(&json!({
                "name": "Shadow",
                "years_of_experience": 2,
                "breed": "Siamese",
                "salary": 800
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.get("/api/v1/cats?breed=Siamese").await;
        response.assert_status_ok();
        let cats: Vec<CatWithMission> = response.json();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].cat.name, "Shadow");
    }

    #[tokio::test]
    async fn deletes_a_cat() {
        let server = setup();
        let cat = create_test_cat(&server, "Whiskers").await;

        server
            .delete(&format!("/api/v1/cats/{}", cat.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get(&format!("/api/v1/cats/{}", cat.id))
            .await
            .assert_status_not_found();
    }
}

mod missions {
    use super::*;

    #[tokio::test]
    async fn creates_a_mission_with_targets() {
        let server = setup();
        let mission = create_test_mission(&server, "Operation Yarn", &["A", "B"]).await;

        assert!(!mission.mission.completed);
        assert_eq!(mission.targets.len(), 2);
        assert_eq!(mission.targets[0].name, "A");
        assert_eq!(mission.targets[0].country, "France");
    }

    #[tokio::test]
    async fn rejects_zero_or_four_targets() {
        let server = setup();
        for count in [0, 4] {
            let targets: Vec<_> = (0..count)
                .map(|i| json!({ "name": format!("T{i}"), "country": "X" }))
                .collect();
            let response = server
                .post("/api/v1/missions")
                .json(&json!({ "title": "Too many cooks", "targets": targets }))
                .await;

            response.assert_status_bad_request();
            let body: ErrorBody = response.json();
            assert_eq!(body.error, "1 to 3 targets required");
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_target_names() {
        let server = setup();
        let response = server
            .post("/api/v1/missions")
            .json(&json!({
                "title": "Twins",
                "targets": [
                    { "name": "A", "country": "X" },
                    { "name": "A", "country": "Y" }
                ]
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);

        let missions: Vec<MissionWithTargets> = server.get("/api/v1/missions").await.json();
        assert!(missions.is_empty());
    }

    #[tokio::test]
    async fn rejects_client_supplied_completed() {
        let server = setup();
        let response = server
            .post("/api/v1/missions")
            .json(&json!({
                "title": "Cheat",
                "completed": true,
                "targets": [{ "name": "A", "country": "X" }]
            }))
            .await;
        assert!(response.status_code().is_client_error());

        let mission = create_test_mission(&server, "Honest", &["A"]).await;
        let response = server
            .patch(&format!("/api/v1/missions/{}", mission.mission.id))
            .json(&json!({ "completed": true }))
            .await;
        assert!(response.status_code().is_client_error());

        let stored: MissionWithTargets = server
            .get(&format!("/api/v1/missions/{}", mission.mission.id))
            .await
            .json();
        assert!(!stored.mission.completed);
    }

    #[tokio::test]
    async fn updates_title() {
        let server = setup();
        let mission = create_test_mission(&server, "Old", &["A"]).await;

        let response = server
            .put(&format!("/api/v1/missions/{}", mission.mission.id))
            .json(&json!({ "title": "New" }))
            .await;
        response.assert_status_ok();
        let updated: MissionWithTargets = response.json();
        assert_eq!(updated.mission.title, "New");
    }

    #[tokio::test]
    async fn returns_not_found_for_missing_mission() {
        let server = setup();
        server
            .get(&format!("/api/v1/missions/{}", Uuid::new_v4()))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn delete_is_blocked_while_assigned() {
        let server = setup();
        let cat = create_test_cat(&server, "Whiskers").await;
        let mission = create_test_mission(&server, "X", &["A", "B"]).await;
        let path = format!("/api/v1/missions/{}", mission.mission.id);

        server
            .post(&format!("{path}/assign"))
            .json(&json!({ "cat_id": cat.id }))
            .await
            .assert_status_ok();

        let response = server.delete(&path).await;
        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "mission assigned, cannot delete");

        server
            .delete(&format!("{path}/assign"))
            .await
            .assert_status_ok();
        server
            .delete(&path)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        server.get(&path).await.assert_status_not_found();
        server
            .get(&format!("{path}/targets/{}", mission.targets[0].id))
            .await
            .assert_status_not_found();
    }
}

mod assignment {
    use super::*;

    #[tokio::test]
    async fn requires_cat_id() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A"]).await;

        let response = server
            .post(&format!("/api/v1/missions/{}/assign", mission.mission.id))
            .json(&json!({}))
            .await;
        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "missing cat_id");
    }

    #[tokio::test]
    async fn blank_cat_id_counts_as_missing() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A"]).await;

        let response = server
            .post(&format!("/api/v1/missions/{}/assign", mission.mission.id))
            .json(&json!({ "cat_id": "" }))
            .await;
        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "missing cat_id");
    }

    #[tokio::test]
    async fn malformed_cat_id_is_not_found() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A"]).await;

        let response = server
            .post(&format!("/api/v1/missions/{}/assign", mission.mission.id))
            .json(&json!({ "cat_id": "whiskers" }))
            .await;
        response.assert_status_not_found();
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "Cat not found");
    }

    #[tokio::test]
    async fn unknown_cat_is_not_found() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A"]).await;

        server
            .post(&format!("/api/v1/missions/{}/assign", mission.mission.id))
            .json(&json!({ "cat_id": Uuid::new_v4() }))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn cat_holds_one_active_mission_at_a_time() {
        let server = setup();
        let cat = create_test_cat(&server, "Whiskers").await;
        let x = create_test_mission(&server, "X", &["A"]).await;
        let y = create_test_mission(&server, "Y", &["B"]).await;

        server
            .post(&format!("/api/v1/missions/{}/assign", x.mission.id))
            .json(&json!({ "cat_id": cat.id }))
            .await
            .assert_status_ok();

        let response = server
            .post(&format!("/api/v1/missions/{}/assign", y.mission.id))
            .json(&json!({ "cat_id": cat.id }))
            .await;
        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "cat already has an active mission");

        let profile: CatWithMission = server
            .get(&format!("/api/v1/cats/{}", cat.id))
            .await
            .json();
        assert_eq!(
            profile.current_mission.map(|m| m.mission.id),
            Some(x.mission.id)
        );

        server
            .post(&target_path(&x, 0, "complete"))
            .await
            .assert_status_ok();

        let response = server
            .post(&format!("/api/v1/missions/{}/assign", y.mission.id))
            .json(&json!({ "cat_id": cat.id }))
            .await;
        response.assert_status_ok();
        let assigned: MissionWithTargets = response.json();
        assert_eq!(assigned.mission.assigned_cat_id, Some(cat.id));
    }

    #[tokio::test]
    async fn reassigning_the_same_cat_is_idempotent() {
        let server = setup();
        let cat = create_test_cat(&server, "Whiskers").await;
        let mission = create_test_mission(&server, "X", &["A"]).await;
        let path = format!("/api/v1/missions/{}/assign", mission.mission.id);

        for _ in 0..2 {
            server
                .post(&path)
                .json(&json!({ "cat_id": cat.id }))
                .await
                .assert_status_ok();
        }
    }
}

mod targets {
    use super::*;

    #[tokio::test]
    async fn completing_every_target_completes_the_mission() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A", "B"]).await;

        let response = server.post(&target_path(&mission, 0, "complete")).await;
        response.assert_status_ok();
        let first: TargetCompletion = response.json();
        assert!(first.target.completed);
        assert!(!first.mission_completed);

        let response = server.post(&target_path(&mission, 1, "complete")).await;
        response.assert_status_ok();
        let second: TargetCompletion = response.json();
        assert!(second.mission_completed);
        assert!(second.target.completed_at.is_some());

        let stored: MissionWithTargets = server
            .get(&format!("/api/v1/missions/{}", mission.mission.id))
            .await
            .json();
        assert!(stored.mission.completed);
    }

    #[tokio::test]
    async fn completing_twice_reports_already_completed() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A", "B"]).await;
        let path = target_path(&mission, 0, "complete");

        let first: TargetCompletion = server.post(&path).await.json();
        let response = server.post(&path).await;
        response.assert_status_ok();
        let second: TargetCompletion = response.json();

        assert!(second.already_completed);
        assert_eq!(second.target.completed_at, first.target.completed_at);
    }

    #[tokio::test]
    async fn unknown_target_is_not_found() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A"]).await;

        server
            .post(&format!(
                "/api/v1/missions/{}/targets/{}/complete",
                mission.mission.id,
                Uuid::new_v4()
            ))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn lists_and_reads_targets_through_their_mission() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A", "B"]).await;

        let targets: Vec<Target> = server
            .get(&format!("/api/v1/missions/{}/targets", mission.mission.id))
            .await
            .json();
        assert_eq!(targets.len(), 2);

        let response = server
            .get(&format!(
                "/api/v1/missions/{}/targets/{}",
                mission.mission.id, mission.targets[1].id
            ))
            .await;
        response.assert_status_ok();
        let target: Target = response.json();
        assert_eq!(target.name, "B");
    }

    #[tokio::test]
    async fn updates_notes_on_open_target() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A"]).await;

        let response = server
            .patch(&target_path(&mission, 0, "notes"))
            .json(&json!({ "notes": "Likes tuna" }))
            .await;
        response.assert_status_ok();
        let target: Target = response.json();
        assert_eq!(target.notes, "Likes tuna");
    }

    #[tokio::test]
    async fn notes_are_required() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A"]).await;

        let response = server
            .patch(&target_path(&mission, 0, "notes"))
            .json(&json!({}))
            .await;
        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "notes required");
    }

    #[tokio::test]
    async fn notes_lock_when_mission_is_completed() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A"]).await;
        server
            .post(&target_path(&mission, 0, "complete"))
            .await
            .assert_status_ok();

        let response = server
            .patch(&target_path(&mission, 0, "notes"))
            .json(&json!({ "notes": "too late" }))
            .await;
        response.assert_status_bad_request();
        let body: ErrorBody = response.json();
        assert_eq!(body.error, "cannot edit notes on completed target or mission");
    }

    #[tokio::test]
    async fn notes_lock_when_target_is_completed_but_mission_is_open() {
        let server = setup();
        let mission = create_test_mission(&server, "X", &["A", "B"]).await;
        server
            .post(&target_path(&mission, 0, "complete"))
            .await
            .assert_status_ok();

        server
            .patch(&target_path(&mission, 0, "notes"))
            .json(&json!({ "notes": "too late" }))
            .await
            .assert_status_bad_request();

        server
            .patch(&target_path(&mission, 1, "notes"))
            .json(&json!({ "notes": "still open" }))
            .await
            .assert_status_ok();
    }
}
