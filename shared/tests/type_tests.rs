/// Integration-level tests for the `shared` crate.
///
/// Each section tests one module; unit tests that are tightly coupled to
/// private helpers live inside the modules themselves (see `#[cfg(test)]`
/// blocks in `iden.rs` and `signature.rs`).
// ---------------------------------------------------------------------------
// JWT claims
// ---------------------------------------------------------------------------
#[cfg(test)]
mod jwt_tests {
    use shared::types::*;
    use uuid::Uuid;

    fn sample_user() -> UserJwtPayload {
        UserJwtPayload {
            sub: Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            email: "alice@example.com".to_string(),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
            role: UserRole::User,
        }
    }

    #[test]
    fn user_claims_json_contains_expected_keys() {
        let json = serde_json::to_value(sample_user()).unwrap();
        for key in &["sub", "email", "iat", "exp", "role"] {
            assert!(json.get(key).is_some(), "missing key: {}", key);
        }
        assert!(json["sub"].is_string());
    }

    #[test]
    fn roles_serialize_uppercase() {
        let mut c = sample_user();
        c.role = UserRole::Admin;
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["role"], "ADMIN");
        assert_eq!(UserRole::parse("USER"), Some(UserRole::User));
        assert_eq!(UserRole::parse("user"), None);
    }

    #[test]
    fn missing_claim_fails_to_deserialize() {
        let json = r#"{"sub":"550e8400-e29b-41d4-a716-446655440000","iat":1,"exp":2,"role":"USER"}"#;
        assert!(serde_json::from_str::<UserJwtPayload>(json).is_err());
    }

    #[test]
    fn permission_is_a_bare_number() {
        let c = FileAccessJwtPayload {
            sub: Uuid::new_v4(),
            iat: 1,
            exp: 2,
            perm: FilePermission::READ_WRITE,
        };
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["perm"], 3);
    }

    #[test]
    fn permission_bits() {
        assert!(FilePermission::READ_WRITE.contains(FilePermission::READ));
        assert!(FilePermission::READ_WRITE.contains(FilePermission::WRITE));
        assert!(!FilePermission::WRITE.contains(FilePermission::READ));
        assert!(FilePermission(1).is_valid());
        assert!(!FilePermission(0).is_valid());
        assert!(!FilePermission(4).is_valid());
    }

    #[test]
    fn share_request_defaults_to_short_read_grant() {
        let req: ShareRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.perm, FilePermission::READ);
        assert_eq!(req.ttl_secs, 300);
    }
}

// ---------------------------------------------------------------------------
// Sign-up validation
// ---------------------------------------------------------------------------
#[cfg(test)]
mod login_tests {
    use shared::types::login::*;

    fn body() -> SignUpBody {
        SignUpBody {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            password: "correct horse".to_string(),
        }
    }

    #[test]
    fn valid_body_passes() {
        assert_eq!(body().validate(), Ok(()));
    }

    #[test]
    fn name_limits_are_enforced() {
        let mut b = body();
        b.first_name = "x".repeat(MAX_FIRST_NAME + 1);
        assert_eq!(
            b.validate(),
            Err(SignUpError::FieldTooLong("first_name", MAX_FIRST_NAME))
        );

        let mut b = body();
        b.last_name = "x".repeat(MAX_LAST_NAME + 1);
        assert_eq!(
            b.validate(),
            Err(SignUpError::FieldTooLong("last_name", MAX_LAST_NAME))
        );

        let mut b = body();
        b.first_name = "x".repeat(MAX_FIRST_NAME);
        assert_eq!(b.validate(), Ok(()));
    }

    #[test]
    fn short_password_is_weak() {
        let mut b = body();
        b.password = "1234567".to_string();
        assert_eq!(b.validate(), Err(SignUpError::WeakPassword));
    }

    #[test]
    fn empty_fields_are_missing() {
        let mut b = body();
        b.last_name = "  ".to_string();
        assert_eq!(b.validate(), Err(SignUpError::MissingField("last_name")));
    }

    #[test]
    fn email_shapes() {
        for ok in ["a@b.io", "first.last@sub.example.com", "x_y-z@host-1.info"] {
            assert!(is_valid_email(ok), "{ok}");
        }
        for bad in [
            "plain",
            "@example.com",
            "a@example",
            "a@.com",
            "a@example.c",
            "a@example.museum",
            "a b@example.com",
            "a@@example.com",
        ] {
            assert!(!is_valid_email(bad), "{bad}");
        }
    }

    #[test]
    fn error_messages_name_the_field() {
        let msg = SignUpError::MissingField("email").to_message();
        assert!(msg.contains("email"));
    }
}

// ---------------------------------------------------------------------------
// Config files
// ---------------------------------------------------------------------------
#[cfg(test)]
mod settings_tests {
    use shared::config::*;
    use shared::types::settings::*;
    use std::io::Write;

    const NODE_TOML: &str = r#"
id = "0b8f4a52-7c1e-4d3a-9f0e-2a6b5c4d3e21"
key = "node-secret"

[app]
data_dir = "/var/lib/node"
"#;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn node_defaults_apply() {
        let file = write(NODE_TOML);
        let cfg = load_node_config(file.path()).unwrap();
        assert_eq!(cfg.app.port, 8080);
        assert!(cfg.app.tcp.enabled);
        assert_eq!(cfg.app.tcp.port, 2022);
        assert!(!cfg.app.tls.enabled);
        assert_eq!(cfg.app.http_addr(), "0.0.0.0:8080");
        assert_eq!(cfg.app.tcp_addr().as_deref(), Some("0.0.0.0:2022"));
    }

    #[test]
    fn empty_file_is_rejected() {
        let file = write("   \n");
        assert!(matches!(
            load_node_config(file.path()),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn bad_uuid_is_a_parse_error() {
        let file = write(&NODE_TOML.replace("0b8f4a52", "zzzz"));
        assert!(matches!(
            load_node_config(file.path()),
            Err(ConfigError::TomlParse(_))
        ));
    }

    #[test]
    fn short_key_is_rejected() {
        let file = write(&NODE_TOML.replace("node-secret", "k"));
        assert!(matches!(
            load_node_config(file.path()),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn tls_without_paths_is_rejected() {
        let file = write(&format!("{NODE_TOML}\n[app.tls]\nenabled = true\n"));
        assert!(load_node_config(file.path()).is_err());
    }

    #[test]
    fn saved_config_reloads_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, NODE_TOML).unwrap();

        let mut cfg = load_node_config(&path).unwrap();
        cfg.key = "rotated-secret".to_string();
        save_node_config(&path, &cfg).unwrap();

        assert_eq!(load_node_config(&path).unwrap(), cfg);
        assert!(!dir.path().join("node.toml.tmp").exists());
    }

    #[test]
    fn invalid_config_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, NODE_TOML).unwrap();

        let mut cfg = load_node_config(&path).unwrap();
        cfg.key = String::new();
        assert!(save_node_config(&path, &cfg).is_err());
        assert_eq!(load_node_config(&path).unwrap().key, "node-secret");
    }

    #[test]
    fn proxy_config_loads_with_defaults() {
        let file = write(
            r#"
key = "node-secret"

[auth]
jwt_hmac_key = "0123456789abcdef0123456789abcdef"
ed_private_key = "keys/ed.pem"
ed_public_key = "keys/ed.pub.pem"
"#,
        );
        let cfg = load_proxy_config(file.path()).unwrap();
        assert_eq!(cfg.server.addr(), "0.0.0.0:8080");
        assert_eq!(cfg.auth.user_token_secs(), 3600);
        assert!(!cfg.auth.allow_signup);
        assert_eq!(cfg.catalog.lookup_timeout_secs, 5);
    }

    #[test]
    fn short_hmac_key_is_rejected() {
        let file = write(
            r#"
key = "node-secret"

[auth]
jwt_hmac_key = "short"
ed_private_key = "a"
ed_public_key = "b"
"#,
        );
        assert!(load_proxy_config(file.path()).is_err());
    }

    #[test]
    fn user_token_minutes_is_bounded() {
        for minutes in ["0", "43201", "18446744073709551615"] {
            let file = write(&format!(
                r#"
key = "node-secret"

[auth]
jwt_hmac_key = "0123456789abcdef0123456789abcdef"
ed_private_key = "a"
ed_public_key = "b"
user_token_minutes = {minutes}
"#
            ));
            assert!(load_proxy_config(file.path()).is_err(), "{minutes}");
        }
    }

    #[test]
    fn user_token_secs_saturates() {
        let auth = ProxyAuthConfig {
            jwt_hmac_key: None,
            ed_private_key: "a".into(),
            ed_public_key: "b".into(),
            user_token_minutes: u64::MAX,
            allow_signup: false,
        };
        assert_eq!(auth.user_token_secs(), u64::MAX);
    }

    #[test]
    fn env_value_wins_over_file() {
        assert_eq!(
            pick_secret(Some("env".into()), Some("file")).as_deref(),
            Some("env")
        );
        assert_eq!(
            pick_secret(Some(String::new()), Some("file")).as_deref(),
            Some("file")
        );
        assert_eq!(pick_secret(None, Some("")), None);
        assert_eq!(pick_secret(None, None), None);
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------
#[cfg(test)]
mod json_error_tests {
    use shared::AppError;
    use shared::types::ErrorResponse;
    use std::collections::HashSet;

    #[test]
    fn error_response_new_sets_status_to_error() {
        let r = ErrorResponse::new(4042, "Not found");
        assert_eq!(r.status, "error");
        assert_eq!(r.code, 4042);
        assert_eq!(r.error, "Not found");
    }

    #[test]
    fn error_codes_are_unique() {
        let all = [
            AppError::Decode(shared::transport::DecodeError::Truncated),
            AppError::InvalidSignature,
            AppError::InvalidToken,
            AppError::ExpiredToken,
            AppError::InvalidAuthHeader,
            AppError::Unauthorized,
            AppError::AuthFailed,
            AppError::Forbidden,
            AppError::NotFound,
            AppError::InvalidUuid,
            AppError::MissingNonce,
            AppError::BadRequest("x".into()),
            AppError::SignupDisabled,
            AppError::Conflict,
            AppError::UpstreamUnavailable,
            AppError::Internal,
        ];
        let codes: HashSet<u32> = all.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), all.len());
    }
}
