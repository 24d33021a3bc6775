//! Kubernetes adapters
//!
//! kube-rs implementations of the cluster ports, plus the label scheme every
//! devsync-managed object carries.

pub mod endpoint;
pub mod labels;
pub mod storage;

pub use endpoint::KubeEndpointClient;
pub use labels::Selector;
pub use storage::KubeStorageClient;

use crate::error::Error;
use kube::api::ListParams;

/// Translate conflict / not-found API responses into the typed variants
pub(crate) fn map_api_error(err: kube::Error, kind: &str, name: &str) -> Error {
    match err {
        kube::Error::Api(ref ae) if ae.code == 404 => Error::ResourceNotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(ref ae) if ae.code == 409 => Error::ResourceExists {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        other => Error::Kube(other),
    }
}

pub(crate) fn list_params(selector: &Selector) -> ListParams {
    ListParams::default().labels(&selector.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use kube::error::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "boom".into(),
            reason: "Test".into(),
            code,
        })
    }

    #[test]
    fn test_map_api_error() {
        assert_matches!(
            map_api_error(api_error(404), "Ingress", "web"),
            Error::ResourceNotFound { kind, name } if kind == "Ingress" && name == "web"
        );
        assert_matches!(
            map_api_error(api_error(409), "Ingress", "web"),
            Error::ResourceExists { .. }
        );
        let err = map_api_error(api_error(403), "Ingress", "web");
        assert_matches!(err, Error::Kube(_));
        assert!(!err.is_not_found());
    }
}
