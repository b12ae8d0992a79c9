//! Remote API data source.

use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue, AUTHORIZATION};
use hyper::StatusCode;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use super::outbound::Outbound;
use crate::config::model::ApiAuth;
use crate::error::StratumError;

/// Bytes escaped when an identifier is placed into a URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

pub struct ApiSource {
    endpoint: String,
    token: String,
    auth: Option<(HeaderName, HeaderValue)>,
    outbound: Outbound,
}

impl ApiSource {
    /// Build the source, resolving the auth header once up front.
    pub fn new(
        project: &str,
        endpoint: &str,
        id_name: &str,
        auth: &ApiAuth,
        outbound: Outbound,
    ) -> Result<Self, StratumError> {
        Ok(Self {
            endpoint: endpoint.to_string(),
            token: format!("{{{id_name}}}"),
            auth: auth_header(project, auth)?,
            outbound,
        })
    }

    /// Replace the first `{<id>}` token in the endpoint with `id`,
    /// percent-encoded as a path segment.
    #[must_use]
    pub fn target_url(&self, id: &str) -> String {
        let encoded = utf8_percent_encode(id, PATH_SEGMENT).to_string();
        self.endpoint.replacen(&self.token, &encoded, 1)
    }

    pub async fn fetch(&self, id: &str) -> Result<Option<Bytes>, StratumError> {
        let url = self.target_url(id);
        let response = self.outbound.get(&url, self.auth.as_ref()).await?;

        match response.status {
            StatusCode::OK => Ok(Some(response.body)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(StratumError::UpstreamError { url, status }),
        }
    }
}

fn auth_header(
    project: &str,
    auth: &ApiAuth,
) -> Result<Option<(HeaderName, HeaderValue)>, StratumError> {
    let invalid = |name: &str| StratumError::InvalidHeader {
        project: project.to_string(),
        name: name.to_string(),
    };

    match auth {
        ApiAuth::None => Ok(None),
        ApiAuth::Bearer { secret } => {
            let mut value = HeaderValue::from_str(&format!("Bearer {secret}"))
                .map_err(|_| invalid(AUTHORIZATION.as_str()))?;
            value.set_sensitive(true);
            Ok(Some((AUTHORIZATION, value)))
        }
        ApiAuth::Header { header, secret } => {
            let name = header
                .parse::<HeaderName>()
                .map_err(|_| invalid(header))?;
            let mut value = HeaderValue::from_str(secret).map_err(|_| invalid(header))?;
            value.set_sensitive(true);
            Ok(Some((name, value)))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::server::build_http_client;

    fn outbound() -> Outbound {
        Outbound::new(build_http_client(), None, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn substitutes_first_token_only() {
        let source = ApiSource::new(
            "p",
            "http://up/users/{user_id}?again={user_id}",
            "user_id",
            &ApiAuth::None,
            outbound(),
        )
        .unwrap();
        assert_eq!(
            source.target_url("42"),
            "http://up/users/42?again={user_id}"
        );
    }

    #[tokio::test]
    async fn identifier_is_encoded_as_path_segment() {
        let source =
            ApiSource::new("p", "http://up/items/{id}", "id", &ApiAuth::None, outbound()).unwrap();
        assert_eq!(source.target_url("a b"), "http://up/items/a%20b");
        assert_eq!(source.target_url("café"), "http://up/items/caf%C3%A9");
        assert_eq!(source.target_url("../x?y"), "http://up/items/..%2Fx%3Fy");
        assert_eq!(source.target_url("100%"), "http://up/items/100%25");
        assert_eq!(source.target_url("a-b_c.d~e"), "http://up/items/a-b_c.d~e");
    }

    #[test]
    fn bearer_auth_builds_authorization_header() {
        let (name, value) = auth_header(
            "p",
            &ApiAuth::Bearer {
                secret: "tok".into(),
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(name, AUTHORIZATION);
        assert_eq!(value, "Bearer tok");
        assert!(value.is_sensitive());
    }

    #[test]
    fn custom_header_auth() {
        let (name, value) = auth_header(
            "p",
            &ApiAuth::Header {
                header: "X-Api-Key".into(),
                secret: "k".into(),
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(name.as_str(), "x-api-key");
        assert_eq!(value, "k");
    }

    #[test]
    fn no_auth_sends_nothing() {
        assert!(auth_header("p", &ApiAuth::None).unwrap().is_none());
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let err = auth_header(
            "p",
            &ApiAuth::Header {
                header: "bad header".into(),
                secret: "k".into(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, StratumError::InvalidHeader { .. }));
    }
}
