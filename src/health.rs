//! `GET /health` liveness handler. Always `200 OK` with body `OK`,
//! independent of any configured project or backing store.

pub async fn health_handler() -> &'static str {
    "OK"
}
