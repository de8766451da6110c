use utoipa::OpenApi;

/// OpenAPI document generator.
///
/// Shared by the server (Swagger UI + `/api-docs/openapi.json`) and the
/// `export_openapi` binary.
#[derive(OpenApi)]
#[openapi(
    components(
        schemas(
            link_core::TokenResponse,
            link_core::ClientCredentials,
            link_core::OAuthUserInfo,
            link_core::AccountInfo,
            link_core::OAuth2Error,
        )
    ),
    tags(
        (name = "OAuth2", description = "Authorization, token, refresh and userinfo endpoints"),
        (name = "Client Management", description = "Client registration"),
        (name = "Account", description = "Registration, email verification and login"),
        (name = "Observability", description = "Health checks and metrics"),
    ),
    info(
        title = "SAST Link API",
        version = "0.1.0",
        description = "Account and OAuth2 identity service for SAST",
        license(
            name = "MIT OR Apache-2.0"
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_public_schemas() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let schemas = &json["components"]["schemas"];
        for name in ["TokenResponse", "ClientCredentials", "OAuthUserInfo", "AccountInfo"] {
            assert!(schemas.get(name).is_some(), "missing schema {name}");
        }
        assert_eq!(json["info"]["title"], "SAST Link API");
    }
}
