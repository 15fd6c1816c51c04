//! Local upstream servers and request fixtures for tests.

use api_shared::{ClinCalcGender, ClinCalcPreventRequest, MdCalcPreventRequest};
use axum::Router;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    drop(listener);
    format!("http://{addr}")
}

pub fn mdcalc_request() -> MdCalcPreventRequest {
    MdCalcPreventRequest {
        uom_system: true,
        model: 0,
        sex: true.into(),
        age: 55,
        tc: 213.0,
        hdl: 50.0,
        sbp: 142.0,
        diabetes: false.into(),
        smoker: true.into(),
        egfr: 88.5,
        htn_med: true.into(),
        statin: false.into(),
        bmi: 27.5,
    }
}

pub fn clincalc_request() -> ClinCalcPreventRequest {
    ClinCalcPreventRequest {
        age: 55,
        gender: ClinCalcGender::Male,
        total_cholesterol: 213.0,
        hdl_cholesterol: 50.0,
        systolic_bp: 142.0,
        bmi: 27.5,
        egfr: 88.5,
        diabetes: false,
        smoker: true,
        taking_antihypertensive: true,
        taking_statin: false,
    }
}
