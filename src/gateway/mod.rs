//! Request dispatch for configured routes.
//!
//! [`dispatch_handler`] is the Axum fallback that receives every
//! non-`/health` request. It matches the path against the route table,
//! extracts the identifier, consults the cache unless the client asked
//! to bypass it, and otherwise fetches from the bound [`DataSource`].
//! Submodules handle route matching ([`routing`]) and cache header
//! handling ([`headers`]).

pub mod headers;
pub mod routing;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use percent_encoding::percent_decode_str;

use self::headers::{bypass_requested, CacheStatus, X_CACHE_STATUS, X_CORRELATION_ID};
use self::routing::{extract_placeholder, RoutePattern, RouteTable};
use crate::config::model::{Config, SourceDescriptor};
use crate::error::StratumError;
use crate::pool::PoolRegistry;
use crate::server::AppState;
use crate::source::{DataSource, Outbound};

pub const NOT_FOUND_BODY: &str = "Not Found";
pub const INTERNAL_ERROR_BODY: &str = "Internal Server Error!";
pub const MISSING_ID_BODY: &str = "ID not found in URL";

/// A descriptor bound to its data source, with response headers
/// rendered once at startup.
pub struct BoundRoute {
    pub descriptor: SourceDescriptor,
    pub content_type: HeaderValue,
    pub cache_control: HeaderValue,
    pub source: DataSource,
}

impl BoundRoute {
    pub fn bind(
        descriptor: SourceDescriptor,
        registry: &Arc<PoolRegistry>,
        outbound: &Outbound,
    ) -> Result<(RoutePattern, Self), StratumError> {
        extract_placeholder(&descriptor.route)?;
        let pattern = RoutePattern::translate(&descriptor.route);

        let content_type = HeaderValue::from_str(&descriptor.content_type).map_err(|_| {
            StratumError::InvalidHeader {
                project: descriptor.name.clone(),
                name: header::CONTENT_TYPE.to_string(),
            }
        })?;
        let cache_control = headers::cache_control(descriptor.cache_ttl());
        let source = DataSource::from_descriptor(&descriptor, registry, outbound)?;

        Ok((
            pattern,
            Self {
                descriptor,
                content_type,
                cache_control,
                source,
            },
        ))
    }

    fn caching_enabled(&self) -> bool {
        !self.descriptor.cache_ttl().is_zero()
    }

    fn respond(&self, status: StatusCode, cache_status: CacheStatus, body: Bytes) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, self.content_type.clone());
        headers.insert(header::CACHE_CONTROL, self.cache_control.clone());
        headers.insert(X_CACHE_STATUS, cache_status.header_value());
        (status, headers, body).into_response()
    }
}

/// Bind every descriptor, in declaration order. Any failure is fatal.
pub fn build_routes(
    config: &Config,
    registry: &Arc<PoolRegistry>,
    outbound: &Outbound,
) -> Result<RouteTable<BoundRoute>, StratumError> {
    let mut table = RouteTable::new();
    for descriptor in &config.projects {
        let (pattern, route) = BoundRoute::bind(descriptor.clone(), registry, outbound)?;
        tracing::info!(
            project = %route.descriptor.name,
            route = %route.descriptor.route,
            pattern = %pattern,
            source = route.source.kind(),
            ttl_seconds = route.descriptor.cache_ttl_seconds,
            "route registered"
        );
        table.insert(pattern, route);
    }
    Ok(table)
}

pub async fn dispatch_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
) -> Response {
    let path = uri.path();
    let correlation_id = req_headers
        .get(X_CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    let response = match state.routes.match_path(path) {
        None => {
            tracing::debug!(
                correlation_id = %correlation_id,
                method = %method,
                path = %path,
                "no route matched"
            );
            text(StatusCode::NOT_FOUND, NOT_FOUND_BODY)
        }
        Some(_) if method != Method::GET && method != Method::HEAD => {
            let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            response
        }
        Some((pattern, route, captured)) => {
            let id = percent_decode_str(pattern.identifier(captured)).decode_utf8_lossy();
            if id.is_empty() {
                tracing::debug!(
                    correlation_id = %correlation_id,
                    project = %route.descriptor.name,
                    path = %path,
                    "empty identifier"
                );
                text(StatusCode::BAD_REQUEST, MISSING_ID_BODY)
            } else {
                serve(&state, route, &id, &req_headers, &correlation_id).await
            }
        }
    };

    with_correlation_id(response, &correlation_id)
}

async fn serve(
    state: &AppState,
    route: &BoundRoute,
    id: &str,
    req_headers: &HeaderMap,
    correlation_id: &str,
) -> Response {
    let project = route.descriptor.name.as_str();
    let cache_key = format!("{project}:{id}");
    let caching = route.caching_enabled();
    let bypass = bypass_requested(req_headers);

    if caching && !bypass {
        match state.cache.get(&cache_key).await {
            Ok(Some(cached)) => {
                state.stats.hits.fetch_add(1, Ordering::Relaxed);
                tracing::info!(
                    correlation_id = %correlation_id,
                    project = %project,
                    cache_key = %cache_key,
                    "cache hit"
                );
                return route.respond(StatusCode::OK, CacheStatus::Hit, cached);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    correlation_id = %correlation_id,
                    project = %project,
                    cache_key = %cache_key,
                    error = %e,
                    "cache lookup failed, treating as miss"
                );
            }
        }
    }

    let cache_status = if bypass {
        state.stats.bypasses.fetch_add(1, Ordering::Relaxed);
        CacheStatus::Bypass
    } else {
        state.stats.misses.fetch_add(1, Ordering::Relaxed);
        CacheStatus::Miss
    };
    tracing::info!(
        correlation_id = %correlation_id,
        project = %project,
        cache_key = %cache_key,
        cache_status = cache_status.as_str(),
        "fetching from source"
    );

    match route.source.fetch(id).await {
        Ok(Some(body)) => {
            if caching {
                match state
                    .cache
                    .set(&cache_key, &body, route.descriptor.cache_ttl())
                    .await
                {
                    Ok(()) => tracing::debug!(
                        correlation_id = %correlation_id,
                        cache_key = %cache_key,
                        "cache set"
                    ),
                    Err(e) => tracing::warn!(
                        correlation_id = %correlation_id,
                        project = %project,
                        cache_key = %cache_key,
                        error = %e,
                        "cache write failed"
                    ),
                }
            }
            route.respond(StatusCode::OK, cache_status, body)
        }
        Ok(None) => {
            state.stats.not_found.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                correlation_id = %correlation_id,
                project = %project,
                id = %id,
                "identifier not found"
            );
            with_cache_status(text(StatusCode::NOT_FOUND, NOT_FOUND_BODY), cache_status)
        }
        Err(e) => {
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                correlation_id = %correlation_id,
                project = %project,
                id = %id,
                error = %e,
                "fetch failed"
            );
            with_cache_status(
                text(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY),
                cache_status,
            )
        }
    }
}

fn text(status: StatusCode, body: &'static str) -> Response {
    (status, body).into_response()
}

fn with_cache_status(mut response: Response, cache_status: CacheStatus) -> Response {
    response
        .headers_mut()
        .insert(X_CACHE_STATUS, cache_status.header_value());
    response
}

fn with_correlation_id(mut response: Response, correlation_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(correlation_id) {
        response.headers_mut().insert(X_CORRELATION_ID, value);
    }
    response
}
