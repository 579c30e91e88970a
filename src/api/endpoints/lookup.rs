//! Symptom reference lookup.

use axum::extract::Query;
use axum::Json;
use serde::Deserialize;

use crate::lookup::{filter_symptoms, SymptomInfo};

#[derive(Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub q: String,
}

/// `GET /api/lookup?q=`
pub async fn search(Query(query): Query<LookupQuery>) -> Json<Vec<SymptomInfo>> {
    Json(filter_symptoms(&query.q))
}
