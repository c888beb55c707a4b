//! `{data, meta}` envelopes returned by the admin API; errors use `error::ErrorBody`.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::CREATED,
        Json(SuccessOne {
            data,
            meta: None,
        }),
    )
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::OK,
        Json(SuccessOne {
            data,
            meta: None,
        }),
    )
}

pub fn success_one_with_meta<T: Serialize>(data: T, meta: serde_json::Value) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::OK,
        Json(SuccessOne {
            data,
            meta: Some(meta),
        }),
    )
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            meta: MetaCount { count },
        }),
    )
}
