mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{days_from_today, TestApp};

#[tokio::test]
async fn empty_store_summary() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.admin_token().await?;

    let (status, body) = app.request(Method::GET, "/analytics", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_students"], 0);
    assert_eq!(body["data"]["percent_vaccinated"], 0.0);
    assert_eq!(body["data"]["upcoming_drives"], json!([]));
    Ok(())
}

#[tokio::test]
async fn summary_tracks_vaccinations_and_drives() -> Result<()> {
    let app = TestApp::spawn().await?;
    let token = app.admin_token().await?;

    let mut ids = vec![];
    for (i, name) in ["Asha", "Ravi", "Meera"].iter().enumerate() {
        let (_, body) = app
            .request(
                Method::POST,
                "/students",
                Some(&token),
                Some(json!({"name": name, "class_grade": "5", "student_id": format!("S-{}", i)})),
            )
            .await?;
        ids.push(body["data"]["id"].as_str().unwrap_or_default().to_string());
    }
    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/students/{}/vaccinate", ids[0]),
            Some(&token),
            Some(json!({"vaccine_name": "MMR", "date_of_vaccination": "2025-02-10"})),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);

    for payload in [
        json!({"vaccine_name": "MMR", "date": days_from_today(40), "available_doses": 30, "classes": "5"}),
        json!({"vaccine_name": "Polio", "date": days_from_today(20), "available_doses": 12, "classes": "5,6"}),
        json!({"vaccine_name": "BCG", "date": days_from_today(-10), "available_doses": 99, "classes": "5", "is_completed": true}),
    ] {
        let (status, body) = app.request(Method::POST, "/drives", Some(&token), Some(payload)).await?;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let (_, body) = app.request(Method::GET, "/analytics", Some(&token), None).await?;
    let summary = &body["data"];
    assert_eq!(summary["total_students"], 3);
    assert_eq!(summary["vaccinated_students"], 1);
    assert_eq!(summary["percent_vaccinated"], 33.33);
    // Completed drives no longer count toward open stock
    assert_eq!(summary["total_drives"], 2);
    assert_eq!(summary["available_doses"], 42);

    let upcoming: Vec<&str> = summary["upcoming_drives"]
        .as_array()
        .map(|drives| drives.iter().filter_map(|d| d["vaccine_name"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(upcoming, vec!["Polio", "MMR"]);
    Ok(())
}
