//! OpenAPI documentation for the generic HTTP PDP server: served as
//! YAML at `/openapi.yaml`, with Swagger UI mounted at `/swagger-ui/*`.

use crate::http_server::{AuthorizeRequest, AuthorizeResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Manetu Policy Engine PDP",
        version = "0.1.0",
        description = "PORC-based authorization decision point: evaluates a principal/operation/resource/context request against a loaded PolicyDomain and returns an allow/deny decision."
    ),
    paths(crate::http_server::authorize),
    components(schemas(AuthorizeRequest, AuthorizeResponse))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_to_yaml() {
        let yaml = ApiDoc::openapi().to_yaml().unwrap();
        assert!(yaml.contains("Manetu Policy Engine PDP"));
    }
}
